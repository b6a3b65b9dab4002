use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A daily log record exactly as the collector sent it. Nothing here is trusted yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLogEntry {
    #[serde(default)]
    pub user_id: Option<String>,
    pub date: String,
    #[serde(default)]
    pub mood_score: Option<f64>,
    /// Survey label (Sad, Anxious, Neutral, Calm, Happy) or a numeric string.
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default, alias = "pain")]
    pub pain_level: Option<f64>,
    #[serde(default, alias = "sleep")]
    pub sleep_hours: Option<f64>,
    #[serde(default, alias = "mobility")]
    pub mobility_category: Option<String>,
    /// Glasses of water.
    #[serde(default, alias = "water")]
    pub water_intake: Option<f64>,
    #[serde(default, alias = "exercise")]
    pub exercise_minutes: Option<f64>,
    /// Self-rated energy, 0 to 10.
    #[serde(default, alias = "energy")]
    pub energy_level: Option<f64>,
    #[serde(default, alias = "symptoms")]
    pub symptom_flags: Vec<String>,
}

/// A mood label read by the camera. A day may carry several; they only feed the
/// mood distribution, never a day slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraMoodEntry {
    #[serde(default)]
    pub user_id: Option<String>,
    /// `YYYY-MM-DD` or a timestamp starting with one.
    #[serde(alias = "timestamp", alias = "captured_at")]
    pub date: String,
    pub mood: String,
}

/// A validated log record, one per user per calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyLogEntry {
    pub user_id: String,
    pub date: NaiveDate,
    pub mood_score: Option<u8>,
    pub pain_level: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub mobility: Option<MobilityCategory>,
    pub water_intake: Option<f64>,
    pub exercise_minutes: Option<f64>,
    pub energy_level: Option<f64>,
    pub symptom_flags: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobilityCategory {
    Bedridden,
    Limited,
    Mobile,
}

impl MobilityCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "bedridden" | "bed" => Some(Self::Bedridden),
            "limited" => Some(Self::Limited),
            "mobile" => Some(Self::Mobile),
            _ => None,
        }
    }

    pub fn ordinal(self) -> f64 {
        match self {
            Self::Bedridden => 0.0,
            Self::Limited => 1.0,
            Self::Mobile => 2.0,
        }
    }
}

/// Survey mood labels, ordered from the lowest to the highest score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MoodLabel {
    Sad,
    Anxious,
    Neutral,
    Calm,
    Happy,
}

impl MoodLabel {
    pub const ALL: [MoodLabel; 5] = [
        MoodLabel::Sad,
        MoodLabel::Anxious,
        MoodLabel::Neutral,
        MoodLabel::Calm,
        MoodLabel::Happy,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "sad" => Some(Self::Sad),
            "anxious" => Some(Self::Anxious),
            "neutral" => Some(Self::Neutral),
            "calm" => Some(Self::Calm),
            "happy" => Some(Self::Happy),
            _ => None,
        }
    }

    pub fn from_score(score: u8) -> Option<Self> {
        Self::ALL.get(usize::from(score).checked_sub(1)?).copied()
    }

    pub fn score(self) -> u8 {
        match self {
            Self::Sad => 1,
            Self::Anxious => 2,
            Self::Neutral => 3,
            Self::Calm => 4,
            Self::Happy => 5,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Happy => "#4CAF50",
            Self::Calm => "#2196F3",
            Self::Anxious => "#FF9800",
            Self::Neutral => "#9E9E9E",
            Self::Sad => "#F44336",
        }
    }
}

impl fmt::Display for MoodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sad => "Sad",
            Self::Anxious => "Anxious",
            Self::Neutral => "Neutral",
            Self::Calm => "Calm",
            Self::Happy => "Happy",
        };
        f.write_str(name)
    }
}

/// Tracked dimensions of a day. Mood is always present on days used for clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Mood,
    Pain,
    Sleep,
    Mobility,
    Water,
    Exercise,
    Energy,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::Mood,
        Feature::Pain,
        Feature::Sleep,
        Feature::Mobility,
        Feature::Water,
        Feature::Exercise,
        Feature::Energy,
    ];

    pub fn value(self, entry: &DailyLogEntry) -> Option<f64> {
        match self {
            Self::Mood => entry.mood_score.map(f64::from),
            Self::Pain => entry.pain_level,
            Self::Sleep => entry.sleep_hours,
            Self::Mobility => entry.mobility.map(MobilityCategory::ordinal),
            Self::Water => entry.water_intake,
            Self::Exercise => entry.exercise_minutes,
            Self::Energy => entry.energy_level,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mood => "mood",
            Self::Pain => "pain",
            Self::Sleep => "sleep",
            Self::Mobility => "mobility",
            Self::Water => "water",
            Self::Exercise => "exercise",
            Self::Energy => "energy",
        }
    }

    /// Noun phrase used in generated statements.
    pub fn phrase(self) -> &'static str {
        match self {
            Self::Mood => "mood",
            Self::Pain => "pain",
            Self::Sleep => "sleep hours",
            Self::Mobility => "mobility",
            Self::Water => "water intake",
            Self::Exercise => "exercise minutes",
            Self::Energy => "energy",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
