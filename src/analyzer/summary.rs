use crate::analyzer::AnalysisSettings;
use crate::analyzer::aggregator::WeeklyWindow;
use crate::analyzer::cluster::{ClusterAssignment, ClusterLabel, ClusterOutcome, ClusterProfile};
use crate::analyzer::models::{Feature, MoodLabel};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Negligible,
    Moderate,
    Strong,
}

impl Strength {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Negligible => "negligible",
            Self::Moderate => "moderate",
            Self::Strong => "strong",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub days: usize,
    pub dates: Vec<NaiveDate>,
    pub mean_features: BTreeMap<Feature, f64>,
}

impl From<&ClusterProfile> for ClusterSummary {
    fn from(profile: &ClusterProfile) -> Self {
        Self {
            days: profile.days(),
            dates: profile.dates.clone(),
            mean_features: profile.means.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDelta {
    pub feature: Feature,
    pub better_mean: f64,
    pub worse_mean: f64,
    /// `better_mean - worse_mean` in the feature's own units.
    pub delta: f64,
    pub standardized_delta: f64,
    pub strength: Strength,
    /// The difference rests on imputed values only; strength is capped at moderate.
    pub imputed: bool,
    pub imputed_days: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodShare {
    pub label: MoodLabel,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomSignal {
    pub flag: String,
    pub worse_days: usize,
    pub better_days: usize,
}

/// Everything the narrative step is allowed to see about a week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightSummary {
    pub user_id: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub days_with_data: usize,
    pub days_logged_without_mood: usize,
    pub days_missing: usize,
    pub dropped_entries: usize,
    /// Camera mood readings counted in the distribution alongside survey days.
    pub camera_readings: usize,
    pub cluster_better: Option<ClusterSummary>,
    pub cluster_worse: Option<ClusterSummary>,
    pub uniform_week: Option<ClusterSummary>,
    pub feature_deltas: Vec<FeatureDelta>,
    pub correlates: Vec<String>,
    pub symptom_signals: Vec<SymptomSignal>,
    pub mood_distribution: Vec<MoodShare>,
    pub dominant_mood: Option<MoodLabel>,
    pub reduced_confidence: Vec<Feature>,
    pub degenerate: bool,
}

pub fn build_insight_summary(
    window: &WeeklyWindow,
    assignment: &ClusterAssignment,
    settings: &AnalysisSettings,
) -> InsightSummary {
    let completeness = window.completeness();
    let (mood_distribution, dominant_mood) = mood_distribution(window);
    let reduced_confidence = assignment
        .columns
        .iter()
        .filter(|column| column.imputed_count() > 0)
        .map(|column| column.feature)
        .collect::<Vec<_>>();

    let mut summary = InsightSummary {
        user_id: window.user_id.clone(),
        window_start: window.start,
        window_end: window.end,
        days_with_data: completeness.days_with_mood,
        days_logged_without_mood: completeness.days_logged_without_mood,
        days_missing: completeness.days_missing,
        dropped_entries: window.warnings.len(),
        camera_readings: window.camera_moods.len(),
        cluster_better: None,
        cluster_worse: None,
        uniform_week: None,
        feature_deltas: Vec::new(),
        correlates: Vec::new(),
        symptom_signals: Vec::new(),
        mood_distribution,
        dominant_mood,
        reduced_confidence,
        degenerate: assignment.is_degenerate(),
    };

    match &assignment.outcome {
        ClusterOutcome::Uniform { profile } => {
            summary.uniform_week = Some(ClusterSummary::from(profile));
        }
        ClusterOutcome::Split { better, worse, .. } => {
            summary.feature_deltas = feature_deltas(assignment, better, worse, settings);
            summary.correlates = correlates(&summary.feature_deltas);
            summary.symptom_signals = symptom_signals(window, assignment);
            summary.cluster_better = Some(ClusterSummary::from(better));
            summary.cluster_worse = Some(ClusterSummary::from(worse));
        }
    }

    summary
}

/// Labels a standardized difference. Imputation-driven differences never reach "strong".
pub fn classify_strength(standardized: f64, imputed: bool, settings: &AnalysisSettings) -> Strength {
    let magnitude = standardized.abs();
    let strength = if magnitude >= settings.strong_threshold {
        Strength::Strong
    } else if magnitude >= settings.moderate_threshold {
        Strength::Moderate
    } else {
        Strength::Negligible
    };

    if imputed {
        strength.min(Strength::Moderate)
    } else {
        strength
    }
}

fn feature_deltas(
    assignment: &ClusterAssignment,
    better: &ClusterProfile,
    worse: &ClusterProfile,
    settings: &AnalysisSettings,
) -> Vec<FeatureDelta> {
    assignment
        .columns
        .iter()
        .filter_map(|column| {
            let better_mean = better.mean_of(column.feature)?;
            let worse_mean = worse.mean_of(column.feature)?;
            let delta = better_mean - worse_mean;
            let standardized_delta = if column.std_dev > f64::EPSILON {
                delta / column.std_dev
            } else {
                0.0
            };

            let observed = |profile: &ClusterProfile| {
                profile
                    .observed
                    .get(&column.feature)
                    .copied()
                    .unwrap_or_default()
            };
            let imputed = observed(better) == 0 || observed(worse) == 0;

            Some(FeatureDelta {
                feature: column.feature,
                better_mean,
                worse_mean,
                delta,
                standardized_delta,
                strength: classify_strength(standardized_delta, imputed, settings),
                imputed,
                imputed_days: column.imputed_count(),
            })
        })
        .collect()
}

fn correlates(deltas: &[FeatureDelta]) -> Vec<String> {
    deltas
        .iter()
        .filter(|delta| delta.feature != Feature::Mood && delta.strength >= Strength::Moderate)
        .map(|delta| {
            let direction = if delta.delta > 0.0 { "higher" } else { "lower" };
            let mut statement = format!(
                "{direction} {} co-occurs with better mood days ({} difference: {:.1} vs {:.1})",
                delta.feature.phrase(),
                delta.strength.as_str(),
                delta.better_mean,
                delta.worse_mean
            );
            if delta.imputed_days > 0 {
                statement.push_str(&format!(
                    "; {} day(s) estimated from the weekly average",
                    delta.imputed_days
                ));
            }
            statement
        })
        .collect()
}

fn symptom_signals(window: &WeeklyWindow, assignment: &ClusterAssignment) -> Vec<SymptomSignal> {
    let mut tally: BTreeMap<&str, (usize, usize)> = BTreeMap::new();

    for entry in window.valid_days() {
        let Some(label) = assignment.label_for(entry.date) else {
            continue;
        };
        for flag in &entry.symptom_flags {
            let counts = tally.entry(flag.as_str()).or_default();
            match label {
                ClusterLabel::Worse => counts.0 += 1,
                ClusterLabel::Better => counts.1 += 1,
            }
        }
    }

    let mut signals = tally
        .into_iter()
        .filter(|(_, (worse, better))| worse > better)
        .map(|(flag, (worse_days, better_days))| SymptomSignal {
            flag: flag.to_string(),
            worse_days,
            better_days,
        })
        .collect::<Vec<_>>();

    signals.sort_by(|left, right| {
        (right.worse_days - right.better_days)
            .cmp(&(left.worse_days - left.better_days))
            .then_with(|| left.flag.cmp(&right.flag))
    });
    signals
}

/// Survey days and camera readings together. Clustering never sees the camera readings.
fn mood_distribution(window: &WeeklyWindow) -> (Vec<MoodShare>, Option<MoodLabel>) {
    let counts = window
        .valid_days()
        .filter_map(|entry| entry.mood_score.and_then(MoodLabel::from_score))
        .chain(window.camera_moods.iter().copied())
        .fold(BTreeMap::new(), |mut acc, label| {
            *acc.entry(label).or_insert(0_usize) += 1;
            acc
        });
    let total = counts.values().sum::<usize>();

    let mut shares = counts
        .into_iter()
        .map(|(label, count)| MoodShare {
            label,
            count,
            percentage: if total == 0 {
                0.0
            } else {
                count as f64 / total as f64 * 100.0
            },
        })
        .collect::<Vec<_>>();

    // Most frequent first; ties favour the lower mood so a bad week is not hidden.
    shares.sort_by(|left, right| {
        right
            .count
            .cmp(&left.count)
            .then_with(|| left.label.cmp(&right.label))
    });

    let dominant = shares.first().map(|share| share.label);
    (shares, dominant)
}

#[cfg(test)]
mod tests {
    use super::{Strength, build_insight_summary, classify_strength};
    use crate::analyzer::AnalysisSettings;
    use crate::analyzer::aggregator::build_weekly_window;
    use crate::analyzer::cluster::analyze_clusters;
    use crate::analyzer::models::{CameraMoodEntry, Feature, MoodLabel, RawLogEntry};
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).expect("valid date")
    }

    fn entry(offset: u32, mood: f64) -> RawLogEntry {
        RawLogEntry {
            date: day(12 + offset).format("%Y-%m-%d").to_string(),
            mood_score: Some(mood),
            ..RawLogEntry::default()
        }
    }

    fn summarize(entries: &[RawLogEntry]) -> super::InsightSummary {
        let settings = AnalysisSettings::default();
        let window = build_weekly_window(entries, "mina", day(18), &settings).expect("window");
        let assignment = analyze_clusters(&window, &settings);
        build_insight_summary(&window, &assignment, &settings)
    }

    fn example_week() -> Vec<RawLogEntry> {
        [2.0, 2.0, 2.0, 5.0, 5.0, 5.0, 1.0]
            .iter()
            .zip([8.0, 7.0, 9.0, 2.0, 1.0, 2.0, 9.0])
            .enumerate()
            .map(|(offset, (mood, pain))| RawLogEntry {
                pain_level: Some(pain),
                ..entry(offset as u32, *mood)
            })
            .collect()
    }

    #[test]
    fn example_week_labels_pain_strong() {
        let summary = summarize(&example_week());

        assert!(!summary.degenerate);
        assert_eq!(summary.days_with_data, 7);

        let better = summary.cluster_better.as_ref().expect("better cluster");
        let worse = summary.cluster_worse.as_ref().expect("worse cluster");
        assert_eq!(better.days, 3);
        assert_eq!(worse.days, 4);
        assert!((worse.mean_features[&Feature::Mood] - 1.75).abs() < 1e-9);
        assert!((better.mean_features[&Feature::Pain] - 5.0 / 3.0).abs() < 1e-9);

        let pain = summary
            .feature_deltas
            .iter()
            .find(|delta| delta.feature == Feature::Pain)
            .expect("pain delta");
        assert_eq!(pain.strength, Strength::Strong);
        assert!(pain.delta < 0.0);
        assert!(!pain.imputed);
        assert!(summary.correlates[0].starts_with("lower pain co-occurs"));
    }

    #[test]
    fn summary_is_stable_across_runs() {
        assert_eq!(summarize(&example_week()), summarize(&example_week()));
    }

    #[test]
    fn uniform_mood_is_degenerate_without_strong_claims() {
        let entries = (0..7)
            .map(|offset| RawLogEntry {
                pain_level: Some(f64::from(offset)),
                ..entry(offset, 4.0)
            })
            .collect::<Vec<_>>();
        let summary = summarize(&entries);

        assert!(summary.degenerate);
        assert!(summary.uniform_week.is_some());
        assert!(summary.cluster_better.is_none());
        assert!(
            summary
                .feature_deltas
                .iter()
                .all(|delta| delta.strength != Strength::Strong)
        );
        assert_eq!(summary.dominant_mood, Some(MoodLabel::Calm));
    }

    #[test]
    fn single_real_sleep_value_never_reads_strong() {
        let mut entries = example_week();
        entries[3].sleep_hours = Some(9.0);
        let summary = summarize(&entries);

        let sleep = summary
            .feature_deltas
            .iter()
            .find(|delta| delta.feature == Feature::Sleep)
            .expect("sleep delta");

        assert!(sleep.imputed);
        assert_eq!(sleep.imputed_days, 6);
        assert_ne!(sleep.strength, Strength::Strong);
        assert!(summary.reduced_confidence.contains(&Feature::Sleep));
    }

    #[test]
    fn imputed_differences_are_capped_at_moderate() {
        let settings = AnalysisSettings::default();

        assert_eq!(classify_strength(2.5, true, &settings), Strength::Moderate);
        assert_eq!(classify_strength(-2.5, false, &settings), Strength::Strong);
        assert_eq!(classify_strength(0.7, false, &settings), Strength::Moderate);
        assert_eq!(classify_strength(0.2, true, &settings), Strength::Negligible);
    }

    #[test]
    fn symptoms_concentrated_on_worse_days_are_flagged() {
        let mut entries = example_week();
        for index in [0, 1, 6] {
            entries[index].symptom_flags = vec!["Dizziness".to_string()];
        }
        entries[4].symptom_flags = vec!["cough".to_string()];

        let summary = summarize(&entries);

        assert_eq!(summary.symptom_signals.len(), 1);
        assert_eq!(summary.symptom_signals[0].flag, "dizziness");
        assert_eq!(summary.symptom_signals[0].worse_days, 3);
    }

    #[test]
    fn mood_distribution_sums_to_hundred_percent() {
        let summary = summarize(&example_week());
        let total = summary
            .mood_distribution
            .iter()
            .map(|share| share.percentage)
            .sum::<f64>();

        assert!((total - 100.0).abs() < 1e-9);
        assert_eq!(summary.dominant_mood, Some(MoodLabel::Anxious));
    }

    #[test]
    fn camera_moods_shift_distribution_but_not_clusters() {
        let settings = AnalysisSettings::default();
        let mut window =
            build_weekly_window(&example_week(), "mina", day(18), &settings).expect("window");
        let readings = (0..4)
            .map(|offset| CameraMoodEntry {
                user_id: None,
                date: day(12 + offset).format("%Y-%m-%dT10:00:00").to_string(),
                mood: "Happy".to_string(),
            })
            .collect::<Vec<_>>();
        window.attach_camera_moods(&readings);

        let assignment = analyze_clusters(&window, &settings);
        let summary = build_insight_summary(&window, &assignment, &settings);

        assert_eq!(summary.camera_readings, 4);
        assert_eq!(summary.dominant_mood, Some(MoodLabel::Happy));
        assert_eq!(summary.mood_distribution[0].count, 7);
        assert_eq!(summary.days_with_data, 7);
        assert_eq!(summary.cluster_better.as_ref().map(|cluster| cluster.days), Some(3));
    }
}
