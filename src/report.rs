use std::fmt::Write;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

use crate::goal::{is_target_day, WEEKDAY_NAMES};
use crate::models::{Announcement, Person, Snapshot};
use crate::progress::{weekly_progress, WeeklyProgress};
use crate::streak::streak;
use crate::week::{current_week_dates, date_key};

#[derive(Debug, Clone, Serialize)]
pub struct DayCell {
    pub date_key: String,
    pub weekday: &'static str,
    pub day_of_month: u32,
    pub completed: bool,
    /// Whether the day can be toggled under the person's goal.
    pub actionable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonSummary {
    pub id: Uuid,
    pub name: String,
    pub emoji: String,
    pub goal_text: String,
    pub goal: String,
    pub week: Vec<DayCell>,
    pub progress: WeeklyProgress,
    pub streak: u32,
    pub total_completions: usize,
}

pub fn person_summary(person: &Person, today: NaiveDate) -> PersonSummary {
    let week = current_week_dates(today)
        .iter()
        .enumerate()
        .map(|(index, day)| DayCell {
            date_key: date_key(*day),
            weekday: WEEKDAY_NAMES[index],
            day_of_month: day.day(),
            completed: person.completions.is_completed_on(*day),
            actionable: is_target_day(&person.goal, index),
        })
        .collect();

    PersonSummary {
        id: person.id,
        name: person.name.clone(),
        emoji: person.emoji.clone(),
        goal_text: person.goal_text.clone(),
        goal: person.goal.describe(),
        week,
        progress: weekly_progress(&person.completions, &person.goal, today),
        streak: streak(&person.completions, today),
        total_completions: person.completions.len(),
    }
}

fn week_row(summary: &PersonSummary) -> String {
    summary
        .week
        .iter()
        .map(|cell| {
            let mark = if cell.completed {
                summary.emoji.clone()
            } else if cell.actionable {
                format!("{:>2}", cell.day_of_month)
            } else {
                " ·".to_string()
            };
            format!("{} {}", &cell.weekday[..2], mark)
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

fn write_announcements(output: &mut String, announcements: &[Announcement]) {
    let _ = writeln!(output, "## Announcements");

    if announcements.is_empty() {
        let _ = writeln!(output, "No announcements yet.");
        return;
    }

    for announcement in announcements {
        let marker = if announcement.is_important { "🚨 " } else { "" };
        let _ = writeln!(output, "### {}{}", marker, announcement.title);
        let _ = writeln!(output, "{}", announcement.content);
        let _ = writeln!(
            output,
            "_by {} on {}_",
            announcement.author,
            announcement.created_at.format("%Y-%m-%d %H:%M")
        );
        let _ = writeln!(output);
    }
}

fn write_person(output: &mut String, person: &Person, today: NaiveDate) {
    let summary = person_summary(person, today);
    let _ = writeln!(output, "### {} {}", summary.emoji, summary.name);
    let _ = writeln!(output, "{} ({})", summary.goal_text, summary.goal);
    let _ = writeln!(output);
    let _ = writeln!(output, "`{}`", week_row(&summary));
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "- This week: {}/{} days ({}%)",
        summary.progress.completed, summary.progress.target, summary.progress.percentage
    );
    let _ = writeln!(output, "- Streak: {} days", summary.streak);
    if person.completions.is_empty() {
        let _ = writeln!(output, "- No check-ins yet");
    } else {
        let _ = writeln!(output, "- Total check-ins: {}", summary.total_completions);
    }
    let _ = writeln!(
        output,
        "- Updated {}",
        person.updated_at.format("%Y-%m-%d %H:%M")
    );
    let _ = writeln!(output);
}

pub fn build_board(persons: &[Person], announcements: &[Announcement], today: NaiveDate) -> String {
    let dates = current_week_dates(today);
    let mut output = String::new();

    let _ = writeln!(output, "# Habit Board");
    let _ = writeln!(
        output,
        "Week of {} to {} (today {})",
        dates[0], dates[6], today
    );
    let _ = writeln!(output);
    write_announcements(&mut output, announcements);

    let _ = writeln!(output, "## Members");
    if persons.is_empty() {
        let _ = writeln!(output, "No members yet.");
    } else {
        for person in persons {
            write_person(&mut output, person, today);
        }
    }

    output
}

pub fn person_detail(person: &Person, today: NaiveDate) -> String {
    let mut output = String::new();
    write_person(&mut output, person, today);
    let _ = writeln!(output, "- Member since {}", person.created_at.format("%Y-%m-%d"));
    output
}

/// Latest view of both collections for a watcher. Nothing renders until each
/// collection has arrived at least once.
#[derive(Debug, Default)]
pub struct LiveBoard {
    persons: Option<Vec<Person>>,
    announcements: Option<Vec<Announcement>>,
}

impl LiveBoard {
    pub fn apply(&mut self, snapshot: Snapshot) {
        match snapshot {
            Snapshot::Persons(persons) => self.persons = Some(persons),
            Snapshot::Announcements(announcements) => self.announcements = Some(announcements),
        }
    }

    pub fn render(&self, today: NaiveDate) -> Option<String> {
        match (&self.persons, &self.announcements) {
            (Some(persons), Some(announcements)) => {
                Some(build_board(persons, announcements, today))
            }
            _ => None,
        }
    }
}

/// Members ordered by streak, then weekly percentage.
pub fn leaderboard(persons: &[Person], today: NaiveDate) -> Vec<PersonSummary> {
    let mut summaries: Vec<PersonSummary> = persons
        .iter()
        .map(|person| person_summary(person, today))
        .collect();
    summaries.sort_by(|a, b| {
        b.streak
            .cmp(&a.streak)
            .then(b.progress.percentage.cmp(&a.progress.percentage))
            .then(a.name.cmp(&b.name))
    });
    summaries
}

pub fn build_report(persons: &[Person], announcements: &[Announcement], today: NaiveDate) -> String {
    let mut output = build_board(persons, announcements, today);

    let _ = writeln!(output, "## Leaderboard");
    let ranked = leaderboard(persons, today);
    if ranked.is_empty() {
        let _ = writeln!(output, "No members yet.");
    } else {
        for (rank, summary) in ranked.iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. {} {} streak {} days, {}% of weekly goal",
                rank + 1,
                summary.emoji,
                summary.name,
                summary.streak,
                summary.progress.percentage
            );
        }
    }

    output
}
