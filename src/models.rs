use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::completions::Completions;
use crate::goal::Goal;

pub const DEFAULT_EMOJI: &str = "🏆";
pub const MAX_TARGET_COUNT: u8 = 7;

#[derive(Debug, Clone, Serialize)]
pub struct Person {
    pub id: Uuid,
    pub name: String,
    pub goal_text: String,
    pub emoji: String,
    pub goal: Goal,
    pub completions: Completions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author: String,
    pub is_important: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),
    #[error("a specific-day goal needs at least one weekday")]
    NoTargetDays,
    #[error("weekly target must be between 1 and 7, got {0}")]
    TargetOutOfRange(u8),
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

fn emoji_or_default(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|emoji| !emoji.is_empty())
        .unwrap_or(DEFAULT_EMOJI)
        .to_string()
}

pub fn validate_goal(goal: &Goal) -> Result<(), ValidationError> {
    match goal {
        Goal::Specific { days } if days.is_empty() => Err(ValidationError::NoTargetDays),
        Goal::Count { target } if *target == 0 || *target > MAX_TARGET_COUNT => {
            Err(ValidationError::TargetOutOfRange(*target))
        }
        _ => Ok(()),
    }
}

/// A validated person ready to be stored. Ids and timestamps come from the
/// store.
#[derive(Debug, Clone)]
pub struct NewPerson {
    pub name: String,
    pub goal_text: String,
    pub emoji: String,
    pub goal: Goal,
}

impl NewPerson {
    pub fn new(
        name: &str,
        goal_text: &str,
        emoji: Option<&str>,
        goal: Goal,
    ) -> Result<Self, ValidationError> {
        validate_goal(&goal)?;
        Ok(Self {
            name: required("name", name)?,
            goal_text: required("goal", goal_text)?,
            emoji: emoji_or_default(emoji),
            goal,
        })
    }
}

/// Partial edit of a person. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct PersonUpdate {
    pub name: Option<String>,
    pub goal_text: Option<String>,
    pub emoji: Option<String>,
    pub goal: Option<Goal>,
    pub completions: Option<Completions>,
}

impl PersonUpdate {
    pub fn validated(self) -> Result<Self, ValidationError> {
        if let Some(goal) = &self.goal {
            validate_goal(goal)?;
        }
        Ok(Self {
            name: self.name.as_deref().map(|v| required("name", v)).transpose()?,
            goal_text: self
                .goal_text
                .as_deref()
                .map(|v| required("goal", v))
                .transpose()?,
            emoji: self.emoji.as_deref().map(|v| emoji_or_default(Some(v))),
            goal: self.goal,
            completions: self.completions,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.goal_text.is_none()
            && self.emoji.is_none()
            && self.goal.is_none()
            && self.completions.is_none()
    }

    pub fn apply_to(&self, person: &mut Person) {
        if let Some(name) = &self.name {
            person.name = name.clone();
        }
        if let Some(goal_text) = &self.goal_text {
            person.goal_text = goal_text.clone();
        }
        if let Some(emoji) = &self.emoji {
            person.emoji = emoji.clone();
        }
        if let Some(goal) = &self.goal {
            person.goal = goal.clone();
        }
        if let Some(completions) = &self.completions {
            person.completions = completions.clone();
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewAnnouncement {
    pub title: String,
    pub content: String,
    pub author: String,
    pub is_important: bool,
}

impl NewAnnouncement {
    pub fn new(
        title: &str,
        content: &str,
        author: &str,
        is_important: bool,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            title: required("title", title)?,
            content: required("content", content)?,
            author: required("author", author)?,
            is_important,
        })
    }
}

/// Full, ordered view of one collection as emitted by the store.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Persons(Vec<Person>),
    Announcements(Vec<Announcement>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    #[test]
    fn new_person_trims_and_defaults_emoji() {
        let person = NewPerson::new(" Avery ", " 30 min run ", None, Goal::count(3)).unwrap();
        assert_eq!(person.name, "Avery");
        assert_eq!(person.goal_text, "30 min run");
        assert_eq!(person.emoji, DEFAULT_EMOJI);

        let person = NewPerson::new("Avery", "run", Some("  "), Goal::count(3)).unwrap();
        assert_eq!(person.emoji, DEFAULT_EMOJI);
    }

    #[test]
    fn rejects_blank_text() {
        assert_eq!(
            NewPerson::new("   ", "run", None, Goal::count(3)).unwrap_err(),
            ValidationError::EmptyField("name")
        );
        assert_eq!(
            NewAnnouncement::new("Retreat", "Saturday 9am", "\t", false).unwrap_err(),
            ValidationError::EmptyField("author")
        );
    }

    #[test]
    fn rejects_degenerate_goals() {
        assert_eq!(
            NewPerson::new("Avery", "run", None, Goal::specific(Vec::<Weekday>::new()))
                .unwrap_err(),
            ValidationError::NoTargetDays
        );
        assert_eq!(
            NewPerson::new("Avery", "run", None, Goal::count(8)).unwrap_err(),
            ValidationError::TargetOutOfRange(8)
        );
        assert_eq!(
            NewPerson::new("Avery", "run", None, Goal::count(0)).unwrap_err(),
            ValidationError::TargetOutOfRange(0)
        );
    }

    #[test]
    fn update_only_touches_present_fields() {
        let mut person = Person {
            id: Uuid::new_v4(),
            name: "Avery".to_string(),
            goal_text: "run".to_string(),
            emoji: "💪".to_string(),
            goal: Goal::count(3),
            completions: Completions::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let update = PersonUpdate {
            goal_text: Some("  swim ".to_string()),
            goal: Some(Goal::specific([Weekday::Tue])),
            ..Default::default()
        }
        .validated()
        .unwrap();
        update.apply_to(&mut person);

        assert_eq!(person.name, "Avery");
        assert_eq!(person.emoji, "💪");
        assert_eq!(person.goal_text, "swim");
        assert_eq!(person.goal, Goal::specific([Weekday::Tue]));
    }

    #[test]
    fn update_rejects_blank_name() {
        let update = PersonUpdate {
            name: Some(" ".to_string()),
            ..Default::default()
        };
        assert_eq!(
            update.validated().unwrap_err(),
            ValidationError::EmptyField("name")
        );
        assert!(PersonUpdate::default().is_empty());
    }
}
