use chrono::NaiveDate;

use crate::completions::Completions;

/// Consecutive completed days ending at `today`. A missing `today` breaks
/// the streak immediately.
pub fn streak(completions: &Completions, today: NaiveDate) -> u32 {
    let mut count = 0;
    let mut cursor = Some(today);

    while let Some(day) = cursor {
        if !completions.is_completed_on(day) {
            break;
        }
        count += 1;
        cursor = day.pred_opt();
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::week::date_key;
    use chrono::Duration;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn completed_back_from(today: NaiveDate, days: i64) -> Completions {
        (0..days)
            .map(|offset| date_key(today - Duration::days(offset)))
            .collect()
    }

    #[test]
    fn zero_when_today_missing() {
        let today = day(2026, 10, 14);
        let completions: Completions = ["2026-10-13", "2026-10-12"].into_iter().collect();
        assert_eq!(streak(&completions, today), 0);
    }

    #[test]
    fn counts_back_to_first_gap() {
        let today = day(2026, 10, 14);
        let completions: Completions =
            ["2026-10-14", "2026-10-13", "2026-10-11", "2026-10-10"].into_iter().collect();
        assert_eq!(streak(&completions, today), 2);
    }

    #[test]
    fn follows_recurrence_when_today_present() {
        let today = day(2026, 10, 14);
        let completions = completed_back_from(today, 5);
        let yesterday = today.pred_opt().unwrap();
        assert_eq!(streak(&completions, today), 1 + streak(&completions, yesterday));
    }

    #[test]
    fn crosses_month_and_year_boundaries() {
        let today = day(2027, 1, 2);
        let completions = completed_back_from(today, 40);
        assert_eq!(streak(&completions, today), 40);
    }

    #[test]
    fn long_streaks_are_not_capped() {
        let today = day(2026, 10, 14);
        let completions = completed_back_from(today, 1500);
        assert_eq!(streak(&completions, today), 1500);
    }

    #[test]
    fn stops_at_earliest_representable_date() {
        let today = NaiveDate::MIN;
        let completions: Completions = [date_key(today)].into_iter().collect();
        assert_eq!(streak(&completions, today), 1);
    }
}
