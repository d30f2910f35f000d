use anyhow::Context;
use chrono::{Duration, NaiveDate, Weekday};
use sqlx::postgres::{PgListener, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::completions::{self, Completions};
use crate::config::Config;
use crate::goal::{parse_weekdays, FrequencyType, Goal};
use crate::models::{Announcement, NewAnnouncement, NewPerson, Person, PersonUpdate, Snapshot};
use crate::week::date_key;

pub const CHANGE_CHANNEL: &str = "habit_tracker_changes";
const PERSONS_TABLE: &str = "persons";
const ANNOUNCEMENTS_TABLE: &str = "announcements";

const PERSON_COLUMNS: &str = "id, name, goal, emoji, frequency_type, specific_days, \
     target_count, completions, created_at, updated_at";

/// Handle to the backing Postgres database. Cloning shares the pool.
#[derive(Clone)]
pub struct RecordStore {
    pool: PgPool,
}

impl RecordStore {
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .context("failed to connect to Postgres")?;
        info!(max_connections = config.max_connections, "record store opened");
        Ok(Self { pool })
    }

    pub async fn close(self) {
        self.pool.close().await;
        info!("record store closed");
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to apply migrations")?;
        Ok(())
    }

    pub async fn list_persons(&self) -> anyhow::Result<Vec<Person>> {
        let query = format!(
            "SELECT {PERSON_COLUMNS} FROM habit_tracker.persons ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(person_from_row).collect()
    }

    pub async fn get_person(&self, id: Uuid) -> anyhow::Result<Person> {
        let query = format!("SELECT {PERSON_COLUMNS} FROM habit_tracker.persons WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        person_from_row(&found(id, row)?)
    }

    pub async fn add_person(&self, person: &NewPerson) -> anyhow::Result<Person> {
        let (frequency_type, specific_days, target_count) = person.goal.to_columns();
        let query = format!(
            r#"
            INSERT INTO habit_tracker.persons
            (id, name, goal, emoji, frequency_type, specific_days, target_count, completions)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PERSON_COLUMNS}
            "#
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(&person.name)
            .bind(&person.goal_text)
            .bind(&person.emoji)
            .bind(frequency_type.as_str())
            .bind(specific_days)
            .bind(target_count)
            .bind(Json(Completions::new()))
            .fetch_one(&self.pool)
            .await
            .context("failed to insert person")?;

        let created = person_from_row(&row)?;
        info!(person_id = %created.id, name = %created.name, "person added");
        Ok(created)
    }

    /// Applies only the fields present in `update` and refreshes `updated_at`.
    pub async fn update_person(&self, id: Uuid, update: &PersonUpdate) -> anyhow::Result<Person> {
        let mut tx = self.pool.begin().await?;
        let mut person = lock_person(&mut tx, id).await?;
        update.apply_to(&mut person);
        let updated = write_person(&mut tx, &person).await?;
        tx.commit().await?;

        debug!(person_id = %id, "person updated");
        Ok(updated)
    }

    /// Marks or clears one day and persists the resulting map.
    pub async fn set_completion(
        &self,
        id: Uuid,
        date: NaiveDate,
        completed: bool,
    ) -> anyhow::Result<Person> {
        let key = date_key(date);
        let mut tx = self.pool.begin().await?;
        let mut person = lock_person(&mut tx, id).await?;
        person.completions = completions::set_completion(&person.completions, &key, completed);
        let updated = write_person(&mut tx, &person).await?;
        tx.commit().await?;

        info!(person_id = %id, date = %key, completed, "completion toggled");
        Ok(updated)
    }

    pub async fn delete_person(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM habit_tracker.persons WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(person_id = %id, "person deleted");
        }
        Ok(deleted)
    }

    pub async fn list_announcements(&self) -> anyhow::Result<Vec<Announcement>> {
        let rows = sqlx::query(
            "SELECT id, title, content, author, is_important, created_at \
             FROM habit_tracker.announcements ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(announcement_from_row).collect()
    }

    pub async fn add_announcement(
        &self,
        announcement: &NewAnnouncement,
    ) -> anyhow::Result<Announcement> {
        let row = sqlx::query(
            r#"
            INSERT INTO habit_tracker.announcements (id, title, content, author, is_important)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, title, content, author, is_important, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&announcement.title)
        .bind(&announcement.content)
        .bind(&announcement.author)
        .bind(announcement.is_important)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert announcement")?;

        let created = announcement_from_row(&row)?;
        info!(announcement_id = %created.id, "announcement added");
        Ok(created)
    }

    pub async fn delete_announcement(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM habit_tracker.announcements WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn seed(&self, today: NaiveDate) -> anyhow::Result<()> {
        let recent = |offsets: &[i64]| -> Completions {
            offsets
                .iter()
                .map(|offset| date_key(today - Duration::days(*offset)))
                .collect()
        };

        let persons = vec![
            (
                Uuid::parse_str("6f1e2c1a-8d4b-4f3e-9a71-2b5c0e7d4a11")?,
                "Hana Seo",
                "30 minute morning run",
                "🏃",
                Goal::specific([Weekday::Mon, Weekday::Wed, Weekday::Fri]),
                recent(&[0, 1, 2, 4]),
            ),
            (
                Uuid::parse_str("b2a94e07-1c3f-4d6a-8e25-7f90c3d1b622")?,
                "Minjun Park",
                "Read one chapter of Proverbs",
                "📚",
                Goal::count(4),
                recent(&[1, 2, 3]),
            ),
            (
                Uuid::parse_str("e4c7d8b3-5a60-4b1f-a3d2-0c8e6f9b7733")?,
                "Grace Lim",
                "Practice worship guitar",
                "🎵",
                Goal::count(3),
                recent(&[0]),
            ),
        ];

        for (id, name, goal_text, emoji, goal, completions) in persons {
            let (frequency_type, specific_days, target_count) = goal.to_columns();
            sqlx::query(
                r#"
                INSERT INTO habit_tracker.persons
                (id, name, goal, emoji, frequency_type, specific_days, target_count, completions)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (id) DO UPDATE
                SET name = EXCLUDED.name,
                    goal = EXCLUDED.goal,
                    emoji = EXCLUDED.emoji,
                    frequency_type = EXCLUDED.frequency_type,
                    specific_days = EXCLUDED.specific_days,
                    target_count = EXCLUDED.target_count,
                    completions = EXCLUDED.completions,
                    updated_at = now()
                "#,
            )
            .bind(id)
            .bind(name)
            .bind(goal_text)
            .bind(emoji)
            .bind(frequency_type.as_str())
            .bind(specific_days)
            .bind(target_count)
            .bind(Json(completions))
            .execute(&self.pool)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO habit_tracker.announcements (id, title, content, author, is_important)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(Uuid::parse_str("9b1c2f44-6a0e-4a55-b8d4-5f1f6e2b7c10")?)
        .bind("Welcome")
        .bind("Mark each day you keep your commitment. Streaks reset on the first missed day.")
        .bind("Group leader")
        .bind(true)
        .execute(&self.pool)
        .await?;

        info!("seed data inserted");
        Ok(())
    }

    /// Inserts persons from a CSV file, skipping names that already exist.
    pub async fn import_csv(&self, csv_path: &std::path::Path) -> anyhow::Result<usize> {
        let file = std::fs::File::open(csv_path)
            .with_context(|| format!("failed to open {}", csv_path.display()))?;
        let persons = read_person_csv(file)?;
        let mut inserted = 0usize;

        for person in persons {
            let (frequency_type, specific_days, target_count) = person.goal.to_columns();
            let result = sqlx::query(
                r#"
                INSERT INTO habit_tracker.persons
                (id, name, goal, emoji, frequency_type, specific_days, target_count)
                SELECT $1, $2, $3, $4, $5, $6, $7
                WHERE NOT EXISTS (
                    SELECT 1 FROM habit_tracker.persons WHERE name = $2
                )
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&person.name)
            .bind(&person.goal_text)
            .bind(&person.emoji)
            .bind(frequency_type.as_str())
            .bind(specific_days)
            .bind(target_count)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                inserted += 1;
            } else {
                debug!(name = %person.name, "skipping existing person");
            }
        }

        Ok(inserted)
    }

    /// Streams ordered snapshots: both collections once, then the changed
    /// collection after every write, and both again after the listener
    /// reconnects. A failure is sent as the last item before the channel
    /// closes. The task ends when the receiver is dropped.
    pub async fn subscribe(&self) -> anyhow::Result<mpsc::Receiver<anyhow::Result<Snapshot>>> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .context("failed to open change listener")?;
        listener.listen(CHANGE_CHANNEL).await?;

        let (tx, rx) = mpsc::channel(16);
        let store = self.clone();

        tokio::spawn(async move {
            let mut pending = refresh_targets(None);

            loop {
                for table in pending {
                    if let Err(err) = store.send_snapshot(table, &tx).await {
                        warn!(error = %err, table, "snapshot refresh failed");
                        let _ = tx.send(Err(err)).await;
                        return;
                    }
                }

                pending = tokio::select! {
                    _ = tx.closed() => break,
                    notification = listener.try_recv() => match notification {
                        Ok(Some(notification)) => {
                            debug!(table = notification.payload(), "change notification");
                            refresh_targets(Some(notification.payload()))
                        }
                        Ok(None) => {
                            warn!("change listener reconnected, resyncing");
                            refresh_targets(None)
                        }
                        Err(err) => {
                            warn!(error = %err, "change listener failed");
                            let _ = tx
                                .send(Err(anyhow::Error::new(err).context("change listener failed")))
                                .await;
                            return;
                        }
                    },
                };
            }

            debug!("change listener stopped");
        });

        Ok(rx)
    }

    async fn send_snapshot(
        &self,
        table: &str,
        tx: &mpsc::Sender<anyhow::Result<Snapshot>>,
    ) -> anyhow::Result<()> {
        let snapshot = match table {
            PERSONS_TABLE => Snapshot::Persons(self.list_persons().await?),
            ANNOUNCEMENTS_TABLE => Snapshot::Announcements(self.list_announcements().await?),
            other => anyhow::bail!("unexpected change payload: {other}"),
        };
        // A closed receiver just means nobody is watching any more.
        let _ = tx.send(Ok(snapshot)).await;
        Ok(())
    }
}

/// Collections to re-read for a notification payload. `None` means the
/// listener lost its connection, so everything may be stale.
fn refresh_targets(payload: Option<&str>) -> Vec<&'static str> {
    match payload {
        Some(PERSONS_TABLE) => vec![PERSONS_TABLE],
        Some(ANNOUNCEMENTS_TABLE) => vec![ANNOUNCEMENTS_TABLE],
        Some(other) => {
            warn!(payload = other, "ignoring unknown change payload");
            Vec::new()
        }
        None => vec![PERSONS_TABLE, ANNOUNCEMENTS_TABLE],
    }
}

async fn lock_person(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> anyhow::Result<Person> {
    let query = format!(
        "SELECT {PERSON_COLUMNS} FROM habit_tracker.persons WHERE id = $1 FOR UPDATE"
    );
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    person_from_row(&found(id, row)?)
}

async fn write_person(tx: &mut Transaction<'_, Postgres>, person: &Person) -> anyhow::Result<Person> {
    let (frequency_type, specific_days, target_count) = person.goal.to_columns();
    let query = format!(
        r#"
        UPDATE habit_tracker.persons
        SET name = $2, goal = $3, emoji = $4, frequency_type = $5,
            specific_days = $6, target_count = $7, completions = $8, updated_at = now()
        WHERE id = $1
        RETURNING {PERSON_COLUMNS}
        "#
    );
    let row = sqlx::query(&query)
        .bind(person.id)
        .bind(&person.name)
        .bind(&person.goal_text)
        .bind(&person.emoji)
        .bind(frequency_type.as_str())
        .bind(specific_days)
        .bind(target_count)
        .bind(Json(&person.completions))
        .fetch_one(&mut **tx)
        .await
        .context("failed to update person")?;
    person_from_row(&row)
}

fn found<T>(id: Uuid, row: Option<T>) -> anyhow::Result<T> {
    row.with_context(|| format!("person not found: {id}"))
}

fn person_from_row(row: &PgRow) -> anyhow::Result<Person> {
    let frequency_type: String = row.try_get("frequency_type")?;
    let frequency_type: FrequencyType = frequency_type
        .parse()
        .map_err(|err: String| anyhow::anyhow!(err))?;
    let specific_days: Option<Vec<String>> = row.try_get("specific_days")?;
    let target_count: Option<i32> = row.try_get("target_count")?;
    let completions: Json<Completions> = row.try_get("completions")?;

    Ok(Person {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        goal_text: row.try_get("goal")?,
        emoji: row.try_get("emoji")?,
        goal: Goal::from_columns(frequency_type, specific_days.as_deref(), target_count),
        completions: completions.0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn announcement_from_row(row: &PgRow) -> anyhow::Result<Announcement> {
    Ok(Announcement {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        author: row.try_get("author")?,
        is_important: row.try_get("is_important")?,
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Debug, serde::Deserialize)]
struct CsvPerson {
    name: String,
    goal: String,
    emoji: Option<String>,
    frequency_type: String,
    specific_days: Option<String>,
    target_count: Option<u8>,
}

impl CsvPerson {
    fn into_new_person(self) -> anyhow::Result<NewPerson> {
        let frequency_type: FrequencyType = self
            .frequency_type
            .parse()
            .map_err(|err: String| anyhow::anyhow!(err))?;
        let goal = match frequency_type {
            FrequencyType::Specific => Goal::Specific {
                days: parse_weekdays(self.specific_days.as_deref().unwrap_or_default())
                    .map_err(|err| anyhow::anyhow!(err))?,
            },
            FrequencyType::Count => Goal::count(self.target_count.unwrap_or(0)),
        };
        Ok(NewPerson::new(
            &self.name,
            &self.goal,
            self.emoji.as_deref(),
            goal,
        )?)
    }
}

/// Parses and validates every row before anything is written.
pub fn read_person_csv<R: std::io::Read>(input: R) -> anyhow::Result<Vec<NewPerson>> {
    let mut reader = csv::Reader::from_reader(input);
    let headers = reader.headers().context("failed to read CSV header")?.clone();
    let mut record = csv::StringRecord::new();
    let mut persons = Vec::new();

    while reader.read_record(&mut record).context("failed to read CSV record")? {
        // Quoted fields may span lines, so use where the record starts.
        let line = record.position().map_or(0, |position| position.line());
        let row: CsvPerson = record
            .deserialize(Some(&headers))
            .with_context(|| format!("invalid CSV row on line {line}"))?;
        let person = row
            .into_new_person()
            .with_context(|| format!("invalid person on line {line}"))?;
        persons.push(person);
    }

    Ok(persons)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_both_goal_kinds_from_csv() {
        let input = "\
name,goal,emoji,frequency_type,specific_days,target_count
Avery Lee,Morning run,,specific,Monday;Wednesday;Friday,
Jules Moreno,Read a chapter,📚,count,,4
";
        let persons = read_person_csv(input.as_bytes()).unwrap();
        assert_eq!(persons.len(), 2);
        assert_eq!(
            persons[0].goal,
            Goal::specific([Weekday::Mon, Weekday::Wed, Weekday::Fri])
        );
        assert_eq!(persons[0].emoji, crate::models::DEFAULT_EMOJI);
        assert_eq!(persons[1].goal, Goal::count(4));
        assert_eq!(persons[1].emoji, "📚");
    }

    #[test]
    fn count_column_is_ignored_for_specific_goals() {
        let input = "\
name,goal,emoji,frequency_type,specific_days,target_count
Avery Lee,Morning run,,specific,Tuesday,5
";
        let persons = read_person_csv(input.as_bytes()).unwrap();
        assert_eq!(persons[0].goal, Goal::specific([Weekday::Tue]));
    }

    #[test]
    fn reports_start_line_of_multiline_records() {
        let input = "\
name,goal,emoji,frequency_type,specific_days,target_count
Hana Seo,\"Run
then stretch\",,count,,3
Minjun Park,Read a chapter,,count,,9
";
        let err = read_person_csv(input.as_bytes()).unwrap_err();
        assert_eq!(err.to_string(), "invalid person on line 4");

        let valid = "\
name,goal,emoji,frequency_type,specific_days,target_count
Hana Seo,\"Run
then stretch\",,count,,3
";
        let persons = read_person_csv(valid.as_bytes()).unwrap();
        assert_eq!(persons[0].goal_text, "Run\nthen stretch");
    }

    #[test]
    fn reconnect_refreshes_every_collection() {
        assert_eq!(refresh_targets(None), vec!["persons", "announcements"]);
        assert_eq!(refresh_targets(Some("persons")), vec!["persons"]);
        assert_eq!(refresh_targets(Some("announcements")), vec!["announcements"]);
        assert!(refresh_targets(Some("scholars")).is_empty());
    }

    #[test]
    fn missing_person_is_an_error() {
        let id = Uuid::new_v4();
        let err = found::<()>(id, None).unwrap_err();
        assert_eq!(err.to_string(), format!("person not found: {id}"));
        assert_eq!(found(id, Some(7)).unwrap(), 7);
    }

    #[test]
    fn rejects_invalid_rows() {
        let missing_days = "\
name,goal,emoji,frequency_type,specific_days,target_count
Avery Lee,Morning run,,specific,,
";
        assert!(read_person_csv(missing_days.as_bytes()).is_err());

        let bad_count = "\
name,goal,emoji,frequency_type,specific_days,target_count
Avery Lee,Morning run,,count,,9
";
        assert!(read_person_csv(bad_count.as_bytes()).is_err());

        let blank_name = "\
name,goal,emoji,frequency_type,specific_days,target_count
  ,Morning run,,count,,3
";
        assert!(read_person_csv(blank_name.as_bytes()).is_err());
    }
}
