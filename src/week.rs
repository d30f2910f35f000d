use chrono::{Datelike, Duration, Local, NaiveDate};

pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Monday through Sunday of the week containing `reference`.
pub fn current_week_dates(reference: NaiveDate) -> [NaiveDate; 7] {
    let monday =
        reference - Duration::days(reference.weekday().num_days_from_monday() as i64);
    std::array::from_fn(|offset| monday + Duration::days(offset as i64))
}

pub fn date_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

pub fn parse_date_key(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_KEY_FORMAT).ok()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn week_starts_on_monday() {
        // 2026-10-14 is a Wednesday
        let dates = current_week_dates(day(2026, 10, 14));
        assert_eq!(dates[0], day(2026, 10, 12));
        assert_eq!(dates[6], day(2026, 10, 18));
        assert_eq!(dates[0].weekday(), Weekday::Mon);
        assert_eq!(dates[6].weekday(), Weekday::Sun);
    }

    #[test]
    fn sunday_belongs_to_preceding_monday() {
        let dates = current_week_dates(day(2026, 10, 18));
        assert_eq!(dates[0], day(2026, 10, 12));
    }

    #[test]
    fn week_dates_are_consecutive_and_contain_reference() {
        let reference = day(2026, 12, 31);
        let dates = current_week_dates(reference);
        assert!(dates.contains(&reference));
        for pair in dates.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::days(1));
        }
        assert_eq!(dates[6], day(2027, 1, 3));
    }

    #[test]
    fn date_key_is_zero_padded() {
        assert_eq!(date_key(day(2026, 3, 7)), "2026-03-07");
        assert_eq!(date_key(day(987, 11, 20)), "0987-11-20");
    }

    #[test]
    fn parses_date_keys() {
        assert_eq!(parse_date_key(" 2026-03-07 "), Some(day(2026, 3, 7)));
        assert_eq!(parse_date_key("2026-02-30"), None);
        assert_eq!(parse_date_key("yesterday"), None);
    }
}
