use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::week::date_key;

/// Date keys marked as done. A missing key means "not completed"; `false`
/// is never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, bool>", into = "BTreeMap<String, bool>")]
pub struct Completions {
    days: BTreeMap<String, bool>,
}

impl Completions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_completed(&self, key: &str) -> bool {
        self.days.get(key).copied().unwrap_or(false)
    }

    pub fn is_completed_on(&self, date: NaiveDate) -> bool {
        self.is_completed(&date_key(date))
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Copy of this map with `key` marked or cleared.
    pub fn set_completion(&self, key: &str, completed: bool) -> Completions {
        let mut next = self.clone();
        if completed {
            next.days.insert(key.to_string(), true);
        } else {
            next.days.remove(key);
        }
        next
    }
}

impl From<BTreeMap<String, bool>> for Completions {
    fn from(raw: BTreeMap<String, bool>) -> Self {
        Self {
            days: raw.into_iter().filter(|(_, done)| *done).collect(),
        }
    }
}

impl From<Completions> for BTreeMap<String, bool> {
    fn from(completions: Completions) -> Self {
        completions.days
    }
}

impl<K: Into<String>> FromIterator<K> for Completions {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self {
            days: iter.into_iter().map(|key| (key.into(), true)).collect(),
        }
    }
}

pub fn set_completion(completions: &Completions, key: &str, completed: bool) -> Completions {
    completions.set_completion(key, completed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marking_inserts_true() {
        let base = Completions::new();
        let next = set_completion(&base, "2026-10-12", true);
        assert!(next.is_completed("2026-10-12"));
        assert!(base.is_empty());
    }

    #[test]
    fn clearing_removes_key_instead_of_storing_false() {
        let base: Completions = ["2026-10-12", "2026-10-13"].into_iter().collect();
        let next = set_completion(&base, "2026-10-12", false);
        assert!(!next.is_completed("2026-10-12"));
        let raw: BTreeMap<String, bool> = next.into();
        assert!(!raw.contains_key("2026-10-12"));
        assert_eq!(raw.len(), 1);
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn set_then_clear_equals_original_minus_key() {
        let base: Completions = ["2026-10-10", "2026-10-11"].into_iter().collect();
        let key = "2026-10-11";
        let round_trip = set_completion(&set_completion(&base, key, true), key, false);
        assert!(!round_trip.is_completed(key));
        assert_eq!(round_trip, set_completion(&base, key, false));
        assert_eq!(round_trip.len(), 1);
        assert!(round_trip.is_completed("2026-10-10"));
    }

    #[test]
    fn clearing_missing_key_is_a_no_op() {
        let base: Completions = ["2026-10-10"].into_iter().collect();
        assert_eq!(set_completion(&base, "2026-01-01", false), base);
    }

    #[test]
    fn deserializing_drops_false_entries() {
        let parsed: Completions =
            serde_json::from_str(r#"{"2026-10-12": true, "2026-10-13": false}"#).unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(parsed.is_completed("2026-10-12"));
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            r#"{"2026-10-12":true}"#
        );
    }
}
