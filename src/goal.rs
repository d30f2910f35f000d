use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use serde::Serialize;

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyType {
    Specific,
    Count,
}

impl FrequencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencyType::Specific => "specific",
            FrequencyType::Count => "count",
        }
    }
}

impl FromStr for FrequencyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "specific" => Ok(FrequencyType::Specific),
            "count" => Ok(FrequencyType::Count),
            other => Err(format!("unknown frequency type: {other}")),
        }
    }
}

/// A person's weekly target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "frequency_type", rename_all = "lowercase")]
pub enum Goal {
    /// Only the listed weekdays count.
    Specific { days: BTreeSet<WeekdayName> },
    /// `target` completions per week on any days.
    Count { target: u8 },
}

impl Goal {
    pub fn specific<I: IntoIterator<Item = Weekday>>(days: I) -> Self {
        Goal::Specific {
            days: days.into_iter().map(WeekdayName).collect(),
        }
    }

    pub fn count(target: u8) -> Self {
        Goal::Count { target }
    }

    /// Days per week the goal asks for; 0 for a degenerate goal.
    pub fn target(&self) -> u32 {
        match self {
            Goal::Specific { days } => days.len() as u32,
            Goal::Count { target } => *target as u32,
        }
    }

    /// Builds a goal from stored columns. Only the column selected by
    /// `frequency_type` is read.
    pub fn from_columns(
        frequency_type: FrequencyType,
        specific_days: Option<&[String]>,
        target_count: Option<i32>,
    ) -> Self {
        match frequency_type {
            FrequencyType::Specific => Goal::Specific {
                days: specific_days
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|name| name.parse().ok())
                    .collect(),
            },
            FrequencyType::Count => Goal::Count {
                target: target_count
                    .and_then(|n| u8::try_from(n).ok())
                    .unwrap_or(0),
            },
        }
    }

    /// Column values for the store: the inactive column is `None`.
    pub fn to_columns(&self) -> (FrequencyType, Option<Vec<String>>, Option<i32>) {
        match self {
            Goal::Specific { days } => (
                FrequencyType::Specific,
                Some(days.iter().map(|day| day.to_string()).collect()),
                None,
            ),
            Goal::Count { target } => (FrequencyType::Count, None, Some(*target as i32)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Goal::Specific { days } => {
                let names: Vec<String> = days.iter().map(|day| day.to_string()).collect();
                format!("on {}", names.join(", "))
            }
            Goal::Count { target } => format!("{target}x per week"),
        }
    }
}

/// Weekday that orders Monday first and prints its full English name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekdayName(pub Weekday);

impl PartialOrd for WeekdayName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WeekdayName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .num_days_from_monday()
            .cmp(&other.0.num_days_from_monday())
    }
}

impl fmt::Display for WeekdayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(WEEKDAY_NAMES[self.0.num_days_from_monday() as usize])
    }
}

impl FromStr for WeekdayName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        WEEKDAY_NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(trimmed))
            .and_then(weekday_from_index)
            .map(WeekdayName)
            .ok_or_else(|| format!("unknown weekday: {trimmed}"))
    }
}

impl Serialize for WeekdayName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 0 = Monday .. 6 = Sunday.
pub fn weekday_from_index(index: usize) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

/// Whether a completion on `weekday_index` counts toward the goal. Count
/// goals have no fixed days, so every day is eligible.
pub fn is_target_day(goal: &Goal, weekday_index: usize) -> bool {
    let Some(weekday) = weekday_from_index(weekday_index) else {
        return false;
    };

    match goal {
        Goal::Specific { days } => days.contains(&WeekdayName(weekday)),
        Goal::Count { .. } => true,
    }
}

pub fn parse_weekdays(raw: &str) -> Result<BTreeSet<WeekdayName>, String> {
    raw.split(|c| c == ',' || c == ';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect()
}
