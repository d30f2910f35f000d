use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{ArgGroup, Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod completions;
mod config;
mod db;
mod goal;
mod models;
mod progress;
mod report;
mod streak;
mod week;

use config::Config;
use db::RecordStore;
use goal::{parse_weekdays, Goal};
use models::{NewAnnouncement, NewPerson, PersonUpdate};

#[derive(Parser)]
#[command(name = "habit-tracker")]
#[command(about = "Group habit tracker with weekly goals and streaks", long_about = None)]
struct Cli {
    /// Reference date (YYYY-MM-DD) used instead of the local calendar date
    #[arg(long, global = true, value_parser = parse_day)]
    today: Option<NaiveDate>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("frequency")
        .args(["days", "count"])
        .multiple(false)
))]
struct GoalArgs {
    /// Weekdays that count, e.g. "Monday,Wednesday,Friday"
    #[arg(long)]
    days: Option<String>,
    /// Completions required per week on any days (1-7)
    #[arg(long)]
    count: Option<u8>,
}

impl GoalArgs {
    fn into_goal(self) -> anyhow::Result<Option<Goal>> {
        match (self.days, self.count) {
            (Some(days), _) => {
                let days = parse_weekdays(&days).map_err(|err| anyhow::anyhow!(err))?;
                Ok(Some(Goal::Specific { days }))
            }
            (None, Some(count)) => Ok(Some(Goal::count(count))),
            (None, None) => Ok(None),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a small demo group
    Seed,
    /// Import members from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Add a member with a weekly goal
    AddPerson {
        #[arg(long)]
        name: String,
        #[arg(long)]
        goal: String,
        #[arg(long)]
        emoji: Option<String>,
        #[command(flatten)]
        frequency: GoalArgs,
    },
    /// Change any subset of a member's fields
    EditPerson {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        goal: Option<String>,
        #[arg(long)]
        emoji: Option<String>,
        #[command(flatten)]
        frequency: GoalArgs,
    },
    /// Remove a member and their history
    DeletePerson {
        #[arg(long)]
        id: Uuid,
    },
    /// Mark a day as done, or clear it with --undo
    Toggle {
        #[arg(long)]
        id: Uuid,
        /// Day to mark (YYYY-MM-DD), defaults to today
        #[arg(long, value_parser = parse_day)]
        date: Option<NaiveDate>,
        #[arg(long)]
        undo: bool,
    },
    /// Show one member's week, progress and streak
    Show {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        json: bool,
    },
    /// List members with this week's progress and streaks
    List {
        #[arg(long)]
        json: bool,
    },
    /// Print the weekly board
    Board,
    /// Write the board and leaderboard to a markdown file
    Report {
        #[arg(long, default_value = "board.md")]
        out: PathBuf,
    },
    /// Post an announcement
    Announce {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        important: bool,
    },
    /// Remove an announcement
    DeleteAnnouncement {
        #[arg(long)]
        id: Uuid,
    },
    /// Redraw the board whenever the database changes
    Watch,
}

fn parse_day(value: &str) -> Result<NaiveDate, String> {
    week::parse_date_key(value).ok_or_else(|| format!("expected YYYY-MM-DD, got {value}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let store = RecordStore::open(&config).await?;

    let result = run(cli, &store).await;
    store.close().await;
    result
}

async fn run(cli: Cli, store: &RecordStore) -> anyhow::Result<()> {
    let today = cli.today.unwrap_or_else(week::today);

    match cli.command {
        Commands::InitDb => {
            store.migrate().await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            store.seed(today).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = store.import_csv(&csv).await?;
            println!("Inserted {inserted} members from {}.", csv.display());
        }
        Commands::AddPerson {
            name,
            goal,
            emoji,
            frequency,
        } => {
            let goal_policy = frequency
                .into_goal()?
                .context("either --days or --count is required")?;
            let person = NewPerson::new(&name, &goal, emoji.as_deref(), goal_policy)?;
            let created = store.add_person(&person).await?;
            println!("Added {} {} ({}).", created.emoji, created.name, created.id);
        }
        Commands::EditPerson {
            id,
            name,
            goal,
            emoji,
            frequency,
        } => {
            let update = PersonUpdate {
                name,
                goal_text: goal,
                emoji,
                goal: frequency.into_goal()?,
                completions: None,
            }
            .validated()?;
            if update.is_empty() {
                println!("Nothing to change.");
                return Ok(());
            }
            let updated = store.update_person(id, &update).await?;
            println!("Updated {} ({}).", updated.name, updated.goal.describe());
        }
        Commands::DeletePerson { id } => {
            if store.delete_person(id).await? {
                println!("Member deleted.");
            } else {
                println!("No member with id {id}.");
            }
        }
        Commands::Toggle { id, date, undo } => {
            let date = date.unwrap_or(today);
            let person = store.set_completion(id, date, !undo).await?;
            let summary = report::person_summary(&person, today);
            println!(
                "{} {} on {}: {}/{} this week ({}%), streak {} days.",
                if undo { "Cleared" } else { "Marked" },
                person.name,
                week::date_key(date),
                summary.progress.completed,
                summary.progress.target,
                summary.progress.percentage,
                summary.streak
            );
        }
        Commands::Show { id, json } => {
            let person = store.get_person(id).await?;
            if json {
                let summary = report::person_summary(&person, today);
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", report::person_detail(&person, today));
            }
        }
        Commands::List { json } => {
            let persons = store.list_persons().await?;
            let summaries: Vec<_> = persons
                .iter()
                .map(|person| report::person_summary(person, today))
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
                return Ok(());
            }

            if summaries.is_empty() {
                println!("No members yet.");
                return Ok(());
            }

            for summary in summaries {
                println!(
                    "- {} {} [{}] {}/{} this week ({}%), streak {} days ({})",
                    summary.emoji,
                    summary.name,
                    summary.goal,
                    summary.progress.completed,
                    summary.progress.target,
                    summary.progress.percentage,
                    summary.streak,
                    summary.id
                );
            }
        }
        Commands::Board => {
            let persons = store.list_persons().await?;
            let announcements = store.list_announcements().await?;
            print!("{}", report::build_board(&persons, &announcements, today));
        }
        Commands::Report { out } => {
            let persons = store.list_persons().await?;
            let announcements = store.list_announcements().await?;
            let report = report::build_report(&persons, &announcements, today);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Announce {
            title,
            content,
            author,
            important,
        } => {
            let announcement = NewAnnouncement::new(&title, &content, &author, important)?;
            let created = store.add_announcement(&announcement).await?;
            println!("Posted \"{}\" ({}).", created.title, created.id);
        }
        Commands::DeleteAnnouncement { id } => {
            if store.delete_announcement(id).await? {
                println!("Announcement deleted.");
            } else {
                println!("No announcement with id {id}.");
            }
        }
        Commands::Watch => watch(store, cli.today).await?,
    }

    Ok(())
}

async fn watch(store: &RecordStore, pinned_today: Option<NaiveDate>) -> anyhow::Result<()> {
    let mut snapshots = store.subscribe().await?;
    let mut live = report::LiveBoard::default();
    info!("watching for changes, press Ctrl-C to stop");

    loop {
        tokio::select! {
            snapshot = snapshots.recv() => {
                let snapshot = snapshot
                    .context("change feed closed unexpectedly")?
                    .context("change feed failed")?;
                live.apply(snapshot);
                let today = pinned_today.unwrap_or_else(week::today);
                if let Some(board) = live.render(today) {
                    println!("{board}");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}
