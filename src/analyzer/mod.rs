pub mod aggregator;
pub mod cluster;
pub mod error;
pub mod models;
pub mod report;
pub mod summary;

use crate::ai;
use crate::analyzer::aggregator::{WeeklyWindow, build_weekly_window, window_start};
use crate::analyzer::cluster::{ClusterAssignment, analyze_clusters};
use crate::analyzer::error::AnalysisError;
use crate::analyzer::models::{CameraMoodEntry, RawLogEntry};
use crate::analyzer::report::{SavedReport, WeeklyReport};
use crate::analyzer::summary::{InsightSummary, build_insight_summary};
use crate::config::Config;
use crate::db::Database;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

pub const DEFAULT_MIN_DAYS_WITH_MOOD: usize = 3;
pub const DEFAULT_MODERATE_THRESHOLD: f64 = 0.5;
pub const DEFAULT_STRONG_THRESHOLD: f64 = 1.0;
pub const DEFAULT_KMEANS_SEED: u64 = 42;
pub const DEFAULT_KMEANS_RESTARTS: usize = 10;

/// The only knobs the weekly pipeline reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisSettings {
    pub min_days_with_mood: usize,
    pub moderate_threshold: f64,
    pub strong_threshold: f64,
    pub kmeans_seed: u64,
    pub kmeans_restarts: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            min_days_with_mood: DEFAULT_MIN_DAYS_WITH_MOOD,
            moderate_threshold: DEFAULT_MODERATE_THRESHOLD,
            strong_threshold: DEFAULT_STRONG_THRESHOLD,
            kmeans_seed: DEFAULT_KMEANS_SEED,
            kmeans_restarts: DEFAULT_KMEANS_RESTARTS,
        }
    }
}

impl AnalysisSettings {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(1..=aggregator::WINDOW_DAYS as usize).contains(&self.min_days_with_mood) {
            return Err(AnalysisError::InvalidSettings(format!(
                "min_days_with_mood must be between 1 and {}",
                aggregator::WINDOW_DAYS
            )));
        }
        if !(self.moderate_threshold > 0.0 && self.strong_threshold > self.moderate_threshold) {
            return Err(AnalysisError::InvalidSettings(
                "thresholds must satisfy 0 < moderate < strong".to_string(),
            ));
        }
        if self.kmeans_restarts == 0 {
            return Err(AnalysisError::InvalidSettings(
                "kmeans_restarts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct WeeklyAnalysis {
    pub window: WeeklyWindow,
    pub assignment: ClusterAssignment,
    pub summary: InsightSummary,
}

/// Runs aggregation, clustering and summarization for one user. Pure apart from logging.
pub fn analyze_week(
    entries: &[RawLogEntry],
    camera_moods: &[CameraMoodEntry],
    user_id: &str,
    window_end: NaiveDate,
    settings: &AnalysisSettings,
) -> Result<WeeklyAnalysis, AnalysisError> {
    settings.validate()?;

    let mut window = build_weekly_window(entries, user_id, window_end, settings)?;
    window.attach_camera_moods(camera_moods);
    let assignment = analyze_clusters(&window, settings);
    let summary = build_insight_summary(&window, &assignment, settings);

    Ok(WeeklyAnalysis {
        window,
        assignment,
        summary,
    })
}

pub fn generate_and_store_report(
    config: &Config,
    user_id: &str,
    window_end: NaiveDate,
) -> Result<(WeeklyReport, SavedReport)> {
    let database = Database::open(&config.db_path)?;
    let from = window_start(window_end);
    let entries = database.logs_for_user_between(user_id, from, window_end)?;
    let camera_moods = database.camera_moods_for_user_between(user_id, from, window_end)?;
    let user_name = database.user_name(user_id)?;

    let analysis = analyze_week(
        &entries,
        &camera_moods,
        user_id,
        window_end,
        &config.analysis_settings(),
    )?;
    info!(
        user_id = %user_id,
        days_with_data = analysis.summary.days_with_data,
        degenerate = analysis.summary.degenerate,
        "weekly analysis complete"
    );

    let narrative = ai::compose_narrative(config, &analysis.summary).unwrap_or_else(|error| {
        warn!(user_id = %user_id, error = %error, "AI narrative failed. fallback to rule-based suggestions");
        None
    });

    let report = report::build_weekly_report(analysis.summary, user_name, narrative);
    let saved = report::save_report_files(&report, &config.report_dir)?;

    database
        .upsert_report_meta(
            user_id,
            window_end,
            Utc::now().timestamp(),
            &saved.markdown_path.display().to_string(),
            &saved.json_path.display().to_string(),
            &saved.html_path.display().to_string(),
        )
        .with_context(|| format!("Failed to record report for {user_id}"))?;

    Ok((report, saved))
}

#[cfg(test)]
mod tests {
    use super::{AnalysisSettings, analyze_week, generate_and_store_report};
    use crate::analyzer::error::AnalysisError;
    use crate::analyzer::models::{CameraMoodEntry, MoodLabel, RawLogEntry};
    use crate::config::Config;
    use crate::db::Database;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).expect("valid date")
    }

    fn example_week() -> Vec<RawLogEntry> {
        [2.0, 2.0, 2.0, 5.0, 5.0, 5.0, 1.0]
            .into_iter()
            .zip([8.0, 7.0, 9.0, 2.0, 1.0, 2.0, 9.0])
            .enumerate()
            .map(|(offset, (mood, pain))| RawLogEntry {
                date: day(12 + offset as u32).format("%Y-%m-%d").to_string(),
                mood_score: Some(mood),
                pain_level: Some(pain),
                ..RawLogEntry::default()
            })
            .collect()
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let settings = AnalysisSettings {
            moderate_threshold: 1.5,
            strong_threshold: 1.0,
            ..AnalysisSettings::default()
        };

        let result = analyze_week(&example_week(), &[], "mina", day(18), &settings);
        assert!(matches!(result, Err(AnalysisError::InvalidSettings(_))));
    }

    #[test]
    fn end_to_end_week_produces_summary() {
        let analysis = analyze_week(&example_week(), &[], "mina", day(18), &AnalysisSettings::default())
            .expect("analysis");

        assert_eq!(analysis.summary.window_start, day(12));
        assert_eq!(analysis.summary.window_end, day(18));
        assert_eq!(analysis.window.slots.len(), 7);
        assert!(!analysis.assignment.is_degenerate());
    }

    #[test]
    fn stored_logs_produce_report_files() {
        let temp = tempfile::tempdir().expect("temp dir");
        let config = Config {
            db_path: temp.path().join("moodmirror.db"),
            report_dir: temp.path().join("reports"),
            ai_enabled: false,
            ..Config::default()
        };

        let database = Database::open(&config.db_path).expect("database");
        database.upsert_user("mina", Some("Mina")).expect("user");
        for entry in example_week() {
            database.upsert_daily_log("mina", &entry).expect("log stored");
        }

        let (report, saved) =
            generate_and_store_report(&config, "mina", day(18)).expect("report generated");

        assert_eq!(report.user_name, "Mina");
        assert!(report.narrative.is_none());
        assert!(saved.markdown_path.exists());
        assert!(saved.json_path.exists());
        assert!(saved.html_path.exists());

        let meta = database
            .latest_report_meta()
            .expect("meta query")
            .expect("meta row");
        assert_eq!(meta.user_id, "mina");
        assert_eq!(meta.window_end, "2026-10-18");
    }

    #[test]
    fn file_and_store_agree_on_malformed_last_write() {
        let settings = AnalysisSettings::default();
        let mut entries = example_week();
        entries.push(RawLogEntry {
            date: "2026-10-14".to_string(),
            mood_score: Some(9.0),
            ..RawLogEntry::default()
        });

        let from_file =
            analyze_week(&entries, &[], "mina", day(18), &settings).expect("file analysis");

        let temp = tempfile::tempdir().expect("temp dir");
        let database = Database::open(&temp.path().join("moodmirror.db")).expect("database");
        for entry in &entries {
            database.upsert_daily_log("mina", entry).expect("log stored");
        }
        let stored = database
            .logs_for_user_between("mina", day(12), day(18))
            .expect("stored logs");
        let from_store =
            analyze_week(&stored, &[], "mina", day(18), &settings).expect("store analysis");

        assert_eq!(from_file.summary.days_with_data, 6);
        assert_eq!(from_file.summary.dropped_entries, 1);
        assert_eq!(
            from_file.summary.days_with_data,
            from_store.summary.days_with_data
        );
        assert_eq!(
            from_file.summary.dropped_entries,
            from_store.summary.dropped_entries
        );
        assert_eq!(
            from_file.summary.mood_distribution,
            from_store.summary.mood_distribution
        );
    }

    #[test]
    fn stored_camera_moods_reach_the_report() {
        let temp = tempfile::tempdir().expect("temp dir");
        let config = Config {
            db_path: temp.path().join("moodmirror.db"),
            report_dir: temp.path().join("reports"),
            ai_enabled: false,
            ..Config::default()
        };

        let database = Database::open(&config.db_path).expect("database");
        for entry in example_week() {
            database.upsert_daily_log("mina", &entry).expect("log stored");
        }
        let reading = CameraMoodEntry {
            user_id: None,
            date: "2026-10-16T08:00:00".to_string(),
            mood: "Calm".to_string(),
        };
        database.upsert_camera_mood("mina", &reading).expect("camera stored");

        let (report, _) =
            generate_and_store_report(&config, "mina", day(18)).expect("report generated");

        assert_eq!(report.summary.camera_readings, 1);
        assert!(
            report
                .summary
                .mood_distribution
                .iter()
                .any(|share| share.label == MoodLabel::Calm)
        );
    }

    #[test]
    fn sparse_store_surfaces_insufficient_data() {
        let temp = tempfile::tempdir().expect("temp dir");
        let config = Config {
            db_path: temp.path().join("moodmirror.db"),
            report_dir: temp.path().join("reports"),
            ai_enabled: false,
            ..Config::default()
        };

        let database = Database::open(&config.db_path).expect("database");
        for entry in example_week().into_iter().take(2) {
            database.upsert_daily_log("mina", &entry).expect("log stored");
        }

        let error = generate_and_store_report(&config, "mina", day(18)).expect_err("too sparse");
        assert!(matches!(
            error.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::InsufficientData { .. })
        ));
    }
}
