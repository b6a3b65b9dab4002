use crate::analyzer::models::{CameraMoodEntry, RawLogEntry};
use crate::db::Database;
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

/// A log upload, either a bare array of entries or the survey app's envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogBundle {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub daily_logs: Vec<RawLogEntry>,
    #[serde(default)]
    pub camera_moods: Vec<CameraMoodEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LogFile {
    Entries(Vec<RawLogEntry>),
    Bundle(LogBundle),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub stored: usize,
    pub camera_readings: usize,
    pub skipped: usize,
}

impl LogBundle {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read log file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse log file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let parsed: LogFile = serde_json::from_str(content)?;

        Ok(match parsed {
            LogFile::Entries(daily_logs) => Self {
                daily_logs,
                ..Self::default()
            },
            LogFile::Bundle(bundle) => bundle,
        })
    }

    /// The user a record belongs to: its own id, then the bundle's, then the caller's.
    pub fn resolve_user<'a>(
        &'a self,
        own: Option<&'a str>,
        fallback: Option<&'a str>,
    ) -> Option<&'a str> {
        own.or(self.user_id.as_deref())
            .or(fallback)
            .map(str::trim)
            .filter(|user| !user.is_empty())
    }

    /// Daily logs that resolve to `user_id`, each stamped with that id. An envelope
    /// addressed to someone else yields nothing.
    pub fn daily_logs_for(&self, user_id: &str) -> Vec<RawLogEntry> {
        let user_id = user_id.trim();

        self.daily_logs
            .iter()
            .filter(|entry| {
                self.resolve_user(entry.user_id.as_deref(), Some(user_id)) == Some(user_id)
            })
            .map(|entry| RawLogEntry {
                user_id: Some(user_id.to_string()),
                ..entry.clone()
            })
            .collect()
    }

    pub fn camera_moods_for(&self, user_id: &str) -> Vec<CameraMoodEntry> {
        let user_id = user_id.trim();

        self.camera_moods
            .iter()
            .filter(|reading| {
                self.resolve_user(reading.user_id.as_deref(), Some(user_id)) == Some(user_id)
            })
            .map(|reading| CameraMoodEntry {
                user_id: Some(user_id.to_string()),
                ..reading.clone()
            })
            .collect()
    }

    // The envelope's display name only describes records that don't name their own user.
    fn display_name_for(&self, own: Option<&str>) -> Option<&str> {
        own.is_none().then_some(self.user_name.as_deref()).flatten()
    }
}

pub fn import_bundle(
    database: &Database,
    bundle: &LogBundle,
    fallback_user: Option<&str>,
) -> Result<ImportStats> {
    if bundle.daily_logs.is_empty() && bundle.camera_moods.is_empty() {
        bail!("Log file contains no daily logs or camera moods");
    }

    let mut stats = ImportStats::default();

    for (index, entry) in bundle.daily_logs.iter().enumerate() {
        let own = entry.user_id.as_deref();
        let Some(user_id) = bundle.resolve_user(own, fallback_user) else {
            warn!(index, "skipping log entry without a user id. pass --user to assign one");
            stats.skipped += 1;
            continue;
        };

        database.upsert_user(user_id, bundle.display_name_for(own))?;

        match database.upsert_daily_log(user_id, entry) {
            Ok(_) => stats.stored += 1,
            Err(error) => {
                warn!(index, user_id = %user_id, error = %error, "skipping log entry");
                stats.skipped += 1;
            }
        }
    }

    for (index, reading) in bundle.camera_moods.iter().enumerate() {
        let own = reading.user_id.as_deref();
        let Some(user_id) = bundle.resolve_user(own, fallback_user) else {
            warn!(index, "skipping camera mood without a user id. pass --user to assign one");
            stats.skipped += 1;
            continue;
        };

        database.upsert_user(user_id, bundle.display_name_for(own))?;

        match database.upsert_camera_mood(user_id, reading) {
            Ok(_) => stats.camera_readings += 1,
            Err(error) => {
                warn!(index, user_id = %user_id, error = %error, "skipping camera mood");
                stats.skipped += 1;
            }
        }
    }

    Ok(stats)
}
