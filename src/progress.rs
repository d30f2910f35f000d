use chrono::NaiveDate;
use serde::Serialize;

use crate::completions::Completions;
use crate::goal::Goal;
use crate::week::current_week_dates;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WeeklyProgress {
    pub completed: u32,
    pub target: u32,
    pub percentage: u32,
}

/// Progress for the Monday-Sunday week containing `reference`.
///
/// Every completed day in the week counts toward `completed`, including days
/// the goal does not target. The percentage is rounded half-up and can exceed
/// 100. A goal with no days or a zero count yields all zeros.
pub fn weekly_progress(
    completions: &Completions,
    goal: &Goal,
    reference: NaiveDate,
) -> WeeklyProgress {
    let target = goal.target();
    if target == 0 {
        return WeeklyProgress::default();
    }

    let completed = current_week_dates(reference)
        .iter()
        .filter(|day| completions.is_completed_on(**day))
        .count() as u32;

    WeeklyProgress {
        completed,
        target,
        percentage: rounded_percentage(completed, target),
    }
}

fn rounded_percentage(completed: u32, target: u32) -> u32 {
    (100 * completed + target / 2) / target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::week::date_key;
    use chrono::Weekday;

    // Wednesday
    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 14).unwrap()
    }

    fn week_keys(indexes: &[usize]) -> Completions {
        let dates = current_week_dates(reference());
        indexes.iter().map(|i| date_key(dates[*i])).collect()
    }

    #[test]
    fn empty_specific_goal_is_zeroed() {
        let goal = Goal::specific(Vec::<Weekday>::new());
        let progress = weekly_progress(&week_keys(&[0, 1, 2]), &goal, reference());
        assert_eq!(progress, WeeklyProgress::default());
    }

    #[test]
    fn zero_count_goal_is_zeroed() {
        let progress = weekly_progress(&week_keys(&[0]), &Goal::count(0), reference());
        assert_eq!(progress, WeeklyProgress::default());
    }

    #[test]
    fn count_goal_rounds_half_up() {
        let progress = weekly_progress(&week_keys(&[1, 5]), &Goal::count(3), reference());
        assert_eq!(
            progress,
            WeeklyProgress {
                completed: 2,
                target: 3,
                percentage: 67
            }
        );
    }

    #[test]
    fn exact_half_rounds_up() {
        let progress = weekly_progress(&week_keys(&[3]), &Goal::count(8), reference());
        assert_eq!(progress.percentage, 13);
    }

    #[test]
    fn percentage_is_not_clamped() {
        let progress = weekly_progress(&week_keys(&[0, 1, 2, 3]), &Goal::count(2), reference());
        assert_eq!(
            progress,
            WeeklyProgress {
                completed: 4,
                target: 2,
                percentage: 200
            }
        );
    }

    #[test]
    fn only_current_week_counts() {
        let mut completions = week_keys(&[0]);
        completions = completions.set_completion("2026-10-11", true);
        completions = completions.set_completion("2026-10-19", true);
        let progress = weekly_progress(&completions, &Goal::count(1), reference());
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.percentage, 100);
    }

    #[test]
    fn non_target_days_still_count_as_completed() {
        let goal = Goal::specific([Weekday::Mon]);
        let progress = weekly_progress(&week_keys(&[0, 4]), &goal, reference());
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.target, 1);
        assert_eq!(progress.percentage, 200);
    }
}
