pub mod queries;

use crate::analyzer::aggregator::parse_log_date;
use crate::analyzer::models::{CameraMoodEntry, RawLogEntry};
use anyhow::{Context, Result, anyhow};
use chrono::{NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetaRow {
    pub id: i64,
    pub user_id: String,
    pub window_end: String,
    pub generated_at: i64,
    pub md_path: String,
    pub json_path: String,
    pub html_path: String,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    pub fn upsert_user(&self, user_id: &str, display_name: Option<&str>) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO users (user_id, display_name) VALUES (?1, ?2)
                 ON CONFLICT(user_id)
                 DO UPDATE SET display_name=COALESCE(excluded.display_name, users.display_name)",
                params![user_id, display_name],
            )
            .context("Failed to upsert user")?;

        Ok(())
    }

    pub fn user_name(&self, user_id: &str) -> Result<Option<String>> {
        let name = self
            .conn
            .query_row(
                "SELECT display_name FROM users WHERE user_id = ?1",
                params![user_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .context("Failed to query user")?;

        Ok(name.flatten())
    }

    /// Stores one day of logs. A second write for the same user and day replaces the first.
    pub fn upsert_daily_log(&self, user_id: &str, entry: &RawLogEntry) -> Result<NaiveDate> {
        let date = parse_log_date(&entry.date)
            .ok_or_else(|| anyhow!("Invalid log date: {}", entry.date))?;
        let symptoms =
            serde_json::to_string(&entry.symptom_flags).context("Failed to serialize symptoms")?;

        self.conn
            .execute(
                "INSERT INTO daily_logs (user_id, date, mood_score, mood, pain_level, sleep_hours, mobility_category,
                   water_intake, exercise_minutes, energy_level, symptom_flags, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(user_id, date)
                 DO UPDATE SET mood_score=excluded.mood_score, mood=excluded.mood, pain_level=excluded.pain_level,
                   sleep_hours=excluded.sleep_hours, mobility_category=excluded.mobility_category,
                   water_intake=excluded.water_intake, exercise_minutes=excluded.exercise_minutes,
                   energy_level=excluded.energy_level, symptom_flags=excluded.symptom_flags,
                   recorded_at=excluded.recorded_at",
                params![
                    user_id,
                    date.format("%Y-%m-%d").to_string(),
                    entry.mood_score,
                    entry.mood,
                    entry.pain_level,
                    entry.sleep_hours,
                    entry.mobility_category,
                    entry.water_intake,
                    entry.exercise_minutes,
                    entry.energy_level,
                    symptoms,
                    Utc::now().timestamp(),
                ],
            )
            .context("Failed to upsert daily log")?;

        Ok(date)
    }

    pub fn logs_for_user_between(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RawLogEntry>> {
        let mut statement = self.conn.prepare(
            "SELECT user_id, date, mood_score, mood, pain_level, sleep_hours, mobility_category,
               water_intake, exercise_minutes, energy_level, symptom_flags
             FROM daily_logs
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date ASC",
        )?;

        let rows = statement
            .query_map(
                params![
                    user_id,
                    from.format("%Y-%m-%d").to_string(),
                    to.format("%Y-%m-%d").to_string()
                ],
                |row| {
                    let symptoms: String = row.get(10)?;
                    let symptom_flags: Vec<String> = serde_json::from_str(&symptoms).map_err(|error| {
                        rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(error))
                    })?;
                    Ok(RawLogEntry {
                        user_id: row.get(0)?,
                        date: row.get(1)?,
                        mood_score: row.get(2)?,
                        mood: row.get(3)?,
                        pain_level: row.get(4)?,
                        sleep_hours: row.get(5)?,
                        mobility_category: row.get(6)?,
                        water_intake: row.get(7)?,
                        exercise_minutes: row.get(8)?,
                        energy_level: row.get(9)?,
                        symptom_flags,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query daily logs")?;

        Ok(rows)
    }

    /// Stores one camera reading. The same capture time for a user is stored once.
    pub fn upsert_camera_mood(&self, user_id: &str, reading: &CameraMoodEntry) -> Result<NaiveDate> {
        let date = parse_log_date(&reading.date)
            .ok_or_else(|| anyhow!("Invalid camera mood date: {}", reading.date))?;

        self.conn
            .execute(
                "INSERT INTO camera_moods (user_id, captured_at, date, mood)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id, captured_at)
                 DO UPDATE SET date=excluded.date, mood=excluded.mood",
                params![
                    user_id,
                    reading.date.trim(),
                    date.format("%Y-%m-%d").to_string(),
                    reading.mood.trim()
                ],
            )
            .context("Failed to upsert camera mood")?;

        Ok(date)
    }

    pub fn camera_moods_for_user_between(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CameraMoodEntry>> {
        let mut statement = self.conn.prepare(
            "SELECT user_id, captured_at, mood
             FROM camera_moods
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY captured_at ASC",
        )?;

        let rows = statement
            .query_map(
                params![
                    user_id,
                    from.format("%Y-%m-%d").to_string(),
                    to.format("%Y-%m-%d").to_string()
                ],
                |row| {
                    Ok(CameraMoodEntry {
                        user_id: row.get(0)?,
                        date: row.get(1)?,
                        mood: row.get(2)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query camera moods")?;

        Ok(rows)
    }

    pub fn user_ids(&self) -> Result<Vec<String>> {
        let mut statement = self
            .conn
            .prepare("SELECT DISTINCT user_id FROM daily_logs ORDER BY user_id ASC")?;

        let rows = statement
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()
            .context("Failed to list users")?;

        Ok(rows)
    }

    pub fn latest_log_date(&self) -> Result<Option<String>> {
        let date = self
            .conn
            .query_row(
                "SELECT date FROM daily_logs ORDER BY date DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query latest log date")?;

        Ok(date)
    }

    pub fn latest_report_meta(&self) -> Result<Option<ReportMetaRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, user_id, window_end, generated_at, md_path, json_path, html_path
                 FROM reports ORDER BY generated_at DESC, id DESC LIMIT 1",
                [],
                |row| {
                    Ok(ReportMetaRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        window_end: row.get(2)?,
                        generated_at: row.get(3)?,
                        md_path: row.get(4)?,
                        json_path: row.get(5)?,
                        html_path: row.get(6)?,
                    })
                },
            )
            .optional()
            .context("Failed to query latest report")?;

        Ok(row)
    }

    pub fn upsert_report_meta(
        &self,
        user_id: &str,
        window_end: NaiveDate,
        generated_at: i64,
        md_path: &str,
        json_path: &str,
        html_path: &str,
    ) -> Result<()> {
        let window_end = window_end.format("%Y-%m-%d").to_string();
        self.conn
            .execute(
                "INSERT INTO reports (user_id, window_end, generated_at, md_path, json_path, html_path)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(user_id, window_end)
                 DO UPDATE SET generated_at=excluded.generated_at, md_path=excluded.md_path,
                   json_path=excluded.json_path, html_path=excluded.html_path",
                params![user_id, window_end, generated_at, md_path, json_path, html_path],
            )
            .context("Failed to upsert report metadata")?;

        Ok(())
    }
}
