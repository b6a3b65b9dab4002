use crate::analyzer::AnalysisSettings;
use crate::analyzer::error::{AnalysisError, MalformedEntryError};
use crate::analyzer::models::{
    CameraMoodEntry, DailyLogEntry, MobilityCategory, MoodLabel, RawLogEntry,
};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const WINDOW_DAYS: i64 = 7;

const MOOD_RANGE: (f64, f64) = (1.0, 5.0);
const PAIN_RANGE: (f64, f64) = (0.0, 10.0);
const SLEEP_RANGE: (f64, f64) = (0.0, 24.0);
const WATER_RANGE: (f64, f64) = (0.0, 30.0);
const EXERCISE_RANGE: (f64, f64) = (0.0, 1440.0);
const ENERGY_RANGE: (f64, f64) = (0.0, 10.0);

#[derive(Debug, Clone, Serialize)]
pub struct DaySlot {
    pub date: NaiveDate,
    pub entry: Option<DailyLogEntry>,
}

impl DaySlot {
    pub fn mood_score(&self) -> Option<u8> {
        self.entry.as_ref().and_then(|entry| entry.mood_score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Completeness {
    pub days_with_mood: usize,
    pub days_logged_without_mood: usize,
    pub days_missing: usize,
}

/// The trailing seven days for one user, one slot per calendar day in date order.
#[derive(Debug, Clone, Serialize)]
pub struct WeeklyWindow {
    pub user_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub slots: Vec<DaySlot>,
    /// Camera readings inside the window, in input order.
    pub camera_moods: Vec<MoodLabel>,
    pub warnings: Vec<MalformedEntryError>,
    pub duplicates_replaced: usize,
}

impl WeeklyWindow {
    /// Days that carry a mood score. Only these take part in clustering.
    pub fn valid_days(&self) -> impl Iterator<Item = &DailyLogEntry> {
        self.slots
            .iter()
            .filter_map(|slot| slot.entry.as_ref())
            .filter(|entry| entry.mood_score.is_some())
    }

    pub fn days_with_data(&self) -> usize {
        self.valid_days().count()
    }

    pub fn completeness(&self) -> Completeness {
        let days_with_mood = self.days_with_data();
        let logged = self.slots.iter().filter(|slot| slot.entry.is_some()).count();

        Completeness {
            days_with_mood,
            days_logged_without_mood: logged - days_with_mood,
            days_missing: self.slots.len() - logged,
        }
    }

    /// Keeps this user's camera readings that fall inside the window. Unreadable ones are
    /// skipped with a warning and do not count as dropped log entries.
    pub fn attach_camera_moods(&mut self, readings: &[CameraMoodEntry]) {
        for reading in readings {
            if !belongs_to(reading.user_id.as_deref(), &self.user_id) {
                continue;
            }

            let Some(date) = parse_log_date(&reading.date) else {
                warn!(
                    user_id = %self.user_id,
                    date = %reading.date,
                    "skipping camera mood with invalid date"
                );
                continue;
            };
            if date < self.start || date > self.end {
                continue;
            }

            match MoodLabel::parse(&reading.mood) {
                Some(label) => self.camera_moods.push(label),
                None => warn!(
                    user_id = %self.user_id,
                    mood = %reading.mood,
                    "skipping camera mood with unknown label"
                ),
            }
        }
    }
}

pub fn window_start(window_end: NaiveDate) -> NaiveDate {
    window_end - Duration::days(WINDOW_DAYS - 1)
}

pub fn build_weekly_window(
    entries: &[RawLogEntry],
    user_id: &str,
    window_end: NaiveDate,
    settings: &AnalysisSettings,
) -> Result<WeeklyWindow, AnalysisError> {
    let start = window_start(window_end);
    let mut warnings = Vec::new();
    let mut latest: BTreeMap<NaiveDate, (usize, &RawLogEntry)> = BTreeMap::new();
    let mut duplicates_replaced = 0;

    for (index, raw) in entries.iter().enumerate() {
        if !belongs_to(raw.user_id.as_deref(), user_id) {
            continue;
        }

        let Some(date) = parse_log_date(&raw.date) else {
            let reason = format!("invalid date '{}'", raw.date);
            let error = MalformedEntryError::new(index, &raw.date, reason);
            warn!(user_id = %user_id, error = %error, "dropping malformed log entry");
            warnings.push(error);
            continue;
        };

        if date < start || date > window_end {
            debug!(user_id = %user_id, date = %date, "log entry outside weekly window");
            continue;
        }

        // Later records for the same day replace earlier ones before validation,
        // so a malformed last write blanks the day the same way the log store does.
        if latest.insert(date, (index, raw)).is_some() {
            duplicates_replaced += 1;
        }
    }

    let mut by_date = BTreeMap::new();
    for (date, (index, raw)) in latest {
        match validate_entry(index, raw, user_id) {
            Ok(entry) => {
                by_date.insert(date, entry);
            }
            Err(error) => {
                warn!(user_id = %user_id, error = %error, "dropping malformed log entry");
                warnings.push(error);
            }
        }
    }

    let slots = (0..WINDOW_DAYS)
        .map(|offset| {
            let date = start + Duration::days(offset);
            DaySlot {
                date,
                entry: by_date.remove(&date),
            }
        })
        .collect::<Vec<_>>();

    let window = WeeklyWindow {
        user_id: user_id.to_string(),
        start,
        end: window_end,
        slots,
        camera_moods: Vec::new(),
        warnings,
        duplicates_replaced,
    };

    let days_with_data = window.days_with_data();
    if days_with_data < settings.min_days_with_mood {
        return Err(AnalysisError::InsufficientData {
            user_id: user_id.to_string(),
            days_with_data,
            required: settings.min_days_with_mood,
            dropped: window.warnings.len(),
        });
    }

    Ok(window)
}

pub fn validate_entry(
    index: usize,
    raw: &RawLogEntry,
    user_id: &str,
) -> Result<DailyLogEntry, MalformedEntryError> {
    let malformed = |reason: String| MalformedEntryError::new(index, &raw.date, reason);
    let in_range = |field: &str, value: Option<f64>, range: (f64, f64)| {
        value
            .map(|value| check_range(field, value, range))
            .transpose()
            .map_err(malformed)
    };

    let date = parse_log_date(&raw.date)
        .ok_or_else(|| malformed(format!("invalid date '{}'", raw.date)))?;

    let mood_score = match (raw.mood_score, raw.mood.as_deref().map(str::trim)) {
        (Some(score), _) => Some(coerce_mood(score).map_err(malformed)?),
        (None, Some(label)) if !label.is_empty() => Some(match MoodLabel::parse(label) {
            Some(mood) => mood.score(),
            None => {
                let score = label
                    .parse::<f64>()
                    .map_err(|_| malformed(format!("unknown mood '{label}'")))?;
                coerce_mood(score).map_err(malformed)?
            }
        }),
        _ => None,
    };

    let pain_level = in_range("pain_level", raw.pain_level, PAIN_RANGE)?;
    let sleep_hours = in_range("sleep_hours", raw.sleep_hours, SLEEP_RANGE)?;
    let water_intake = in_range("water_intake", raw.water_intake, WATER_RANGE)?;
    let exercise_minutes = in_range("exercise_minutes", raw.exercise_minutes, EXERCISE_RANGE)?;
    let energy_level = in_range("energy_level", raw.energy_level, ENERGY_RANGE)?;

    let mobility = match raw.mobility_category.as_deref().map(str::trim) {
        Some(category) if !category.is_empty() => Some(
            MobilityCategory::parse(category)
                .ok_or_else(|| malformed(format!("unknown mobility category '{category}'")))?,
        ),
        _ => None,
    };

    let symptom_flags = raw
        .symptom_flags
        .iter()
        .map(|flag| flag.trim().to_lowercase())
        .filter(|flag| !flag.is_empty())
        .collect();

    Ok(DailyLogEntry {
        user_id: user_id.to_string(),
        date,
        mood_score,
        pain_level,
        sleep_hours,
        mobility,
        water_intake,
        exercise_minutes,
        energy_level,
        symptom_flags,
    })
}

fn belongs_to(owner: Option<&str>, user_id: &str) -> bool {
    owner.is_none_or(|owner| owner.trim() == user_id)
}

/// Accepts `YYYY-MM-DD`, or a timestamp that starts with one.
pub fn parse_log_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok().or_else(|| {
        let (day, rest) = trimmed.split_at_checked(10)?;
        rest.starts_with(['T', ' '])
            .then(|| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
            .flatten()
    })
}

fn coerce_mood(value: f64) -> Result<u8, String> {
    let checked = check_range("mood_score", value, MOOD_RANGE)?;
    Ok(checked.round() as u8)
}

fn check_range(field: &str, value: f64, (min, max): (f64, f64)) -> Result<f64, String> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{field} {value} outside {min}..={max}"))
    }
}
