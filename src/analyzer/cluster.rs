use crate::analyzer::AnalysisSettings;
use crate::analyzer::aggregator::WeeklyWindow;
use crate::analyzer::models::{DailyLogEntry, Feature};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const MAX_ITERATIONS: usize = 100;
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterLabel {
    Better,
    Worse,
}

/// One feature over the valid days of a window, after mean imputation.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureColumn {
    pub feature: Feature,
    pub values: Vec<f64>,
    pub imputed: Vec<bool>,
    pub mean: f64,
    pub std_dev: f64,
}

impl FeatureColumn {
    fn from_days(feature: Feature, days: &[&DailyLogEntry]) -> Option<Self> {
        let observed = days
            .iter()
            .filter_map(|day| feature.value(day))
            .collect::<Vec<_>>();
        if observed.is_empty() {
            return None;
        }

        let fill = mean(&observed);
        let (values, imputed) = days
            .iter()
            .map(|day| match feature.value(day) {
                Some(value) => (value, false),
                None => (fill, true),
            })
            .unzip::<_, _, Vec<_>, Vec<_>>();

        let std_dev = population_std(&values);

        Some(Self {
            feature,
            mean: mean(&values),
            std_dev,
            values,
            imputed,
        })
    }

    pub fn imputed_count(&self) -> usize {
        self.imputed.iter().filter(|flag| **flag).count()
    }

    fn standardized(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|value| {
                if self.std_dev < EPSILON {
                    0.0
                } else {
                    (value - self.mean) / self.std_dev
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterProfile {
    pub dates: Vec<NaiveDate>,
    pub means: BTreeMap<Feature, f64>,
    /// Non-imputed values per feature inside this cluster.
    pub observed: BTreeMap<Feature, usize>,
}

impl ClusterProfile {
    fn from_members(members: &[usize], dates: &[NaiveDate], columns: &[FeatureColumn]) -> Self {
        let means = columns
            .iter()
            .map(|column| {
                let values = members
                    .iter()
                    .map(|&index| column.values[index])
                    .collect::<Vec<_>>();
                (column.feature, mean(&values))
            })
            .collect();
        let observed = columns
            .iter()
            .map(|column| {
                let count = members
                    .iter()
                    .filter(|&&index| !column.imputed[index])
                    .count();
                (column.feature, count)
            })
            .collect();

        Self {
            dates: members.iter().map(|&index| dates[index]).collect(),
            means,
            observed,
        }
    }

    pub fn days(&self) -> usize {
        self.dates.len()
    }

    pub fn mean_of(&self, feature: Feature) -> Option<f64> {
        self.means.get(&feature).copied()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClusterOutcome {
    Split {
        labels: Vec<ClusterLabel>,
        better: ClusterProfile,
        worse: ClusterProfile,
        inertia: f64,
    },
    Uniform {
        profile: ClusterProfile,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterAssignment {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<FeatureColumn>,
    pub outcome: ClusterOutcome,
}

impl ClusterAssignment {
    pub fn is_degenerate(&self) -> bool {
        matches!(self.outcome, ClusterOutcome::Uniform { .. })
    }

    pub fn column(&self, feature: Feature) -> Option<&FeatureColumn> {
        self.columns.iter().find(|column| column.feature == feature)
    }

    pub fn label_for(&self, date: NaiveDate) -> Option<ClusterLabel> {
        let ClusterOutcome::Split { labels, .. } = &self.outcome else {
            return None;
        };
        let position = self.dates.iter().position(|day| *day == date)?;
        labels.get(position).copied()
    }
}

/// Splits the valid days of a window into better and worse mood clusters.
///
/// Missing pain, sleep and mobility values are filled with the window mean of the
/// feature before clustering, and the fill is remembered per day. A week where every
/// valid day has the same mood comes back as a single uniform profile.
pub fn analyze_clusters(window: &WeeklyWindow, settings: &AnalysisSettings) -> ClusterAssignment {
    let days = window.valid_days().collect::<Vec<_>>();
    let dates = days.iter().map(|day| day.date).collect::<Vec<_>>();
    let columns = Feature::ALL
        .iter()
        .filter_map(|feature| FeatureColumn::from_days(*feature, &days))
        .collect::<Vec<_>>();

    let every_day = (0..days.len()).collect::<Vec<_>>();
    let uniform = |columns: Vec<FeatureColumn>| {
        let profile = ClusterProfile::from_members(&every_day, &dates, &columns);
        ClusterAssignment {
            dates: dates.clone(),
            columns,
            outcome: ClusterOutcome::Uniform { profile },
        }
    };

    let mood_varies = columns
        .iter()
        .find(|column| column.feature == Feature::Mood)
        .is_some_and(|column| column.std_dev >= EPSILON);
    if days.len() < 2 || !mood_varies {
        debug!(user_id = %window.user_id, "uniform mood week; skipping split");
        return uniform(columns);
    }

    let standardized = columns
        .iter()
        .map(FeatureColumn::standardized)
        .collect::<Vec<_>>();
    let points = (0..days.len())
        .map(|row| standardized.iter().map(|column| column[row]).collect())
        .collect::<Vec<Vec<f64>>>();

    let fit = fit_two_means(&points, settings.kmeans_seed, settings.kmeans_restarts);

    let members = |cluster: usize| {
        fit.labels
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == cluster)
            .map(|(index, _)| index)
            .collect::<Vec<_>>()
    };
    let first = ClusterProfile::from_members(&members(0), &dates, &columns);
    let second = ClusterProfile::from_members(&members(1), &dates, &columns);

    let first_mood = first.mean_of(Feature::Mood).unwrap_or_default();
    let second_mood = second.mean_of(Feature::Mood).unwrap_or_default();
    if (first_mood - second_mood).abs() < EPSILON {
        debug!(user_id = %window.user_id, "clusters share a mean mood; treating week as uniform");
        return uniform(columns);
    }

    // K-Means indices carry no meaning; orientation comes from mean mood.
    let better_index = if first_mood > second_mood { 0 } else { 1 };
    let labels = fit
        .labels
        .iter()
        .map(|&cluster| {
            if cluster == better_index {
                ClusterLabel::Better
            } else {
                ClusterLabel::Worse
            }
        })
        .collect();
    let (better, worse) = if better_index == 0 {
        (first, second)
    } else {
        (second, first)
    };

    ClusterAssignment {
        dates,
        columns,
        outcome: ClusterOutcome::Split {
            labels,
            better,
            worse,
            inertia: fit.inertia,
        },
    }
}

#[derive(Debug, Clone)]
struct TwoMeansFit {
    labels: Vec<usize>,
    inertia: f64,
}

/// K-Means with k = 2, k-means++ seeding and a fixed seed. Each restart draws from the
/// same seeded generator, and the lowest inertia wins (earliest restart on ties).
fn fit_two_means(points: &[Vec<f64>], seed: u64, restarts: usize) -> TwoMeansFit {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut best: Option<TwoMeansFit> = None;

    for _ in 0..restarts.max(1) {
        let centers = seed_centers(points, &mut rng);
        let fit = lloyd(points, centers);

        if best
            .as_ref()
            .is_none_or(|current| fit.inertia < current.inertia - EPSILON)
        {
            best = Some(fit);
        }
    }

    best.unwrap_or_else(|| TwoMeansFit {
        labels: vec![0; points.len()],
        inertia: 0.0,
    })
}

fn seed_centers(points: &[Vec<f64>], rng: &mut StdRng) -> [Vec<f64>; 2] {
    let first_index = rng.gen_range(0..points.len());
    let first = points[first_index].clone();

    let distances = points
        .iter()
        .map(|point| squared_distance(point, &first))
        .collect::<Vec<_>>();
    let total = distances.iter().sum::<f64>();

    let second_index = if total < EPSILON {
        (first_index + 1) % points.len()
    } else {
        let target = rng.gen_range(0.0..total);
        let mut running = 0.0;
        distances
            .iter()
            .position(|distance| {
                running += distance;
                running > target
            })
            .unwrap_or(points.len() - 1)
    };

    [first, points[second_index].clone()]
}

fn lloyd(points: &[Vec<f64>], mut centers: [Vec<f64>; 2]) -> TwoMeansFit {
    let mut labels = vec![usize::MAX; points.len()];

    for _ in 0..MAX_ITERATIONS {
        let next = points
            .iter()
            .map(|point| nearest(point, &centers))
            .collect::<Vec<_>>();
        let changed = next != labels;
        labels = next;

        rebalance_empty_cluster(points, &centers, &mut labels);
        centers = [centroid(points, &labels, 0), centroid(points, &labels, 1)];

        if !changed {
            break;
        }
    }

    let inertia = points
        .iter()
        .zip(&labels)
        .map(|(point, &label)| squared_distance(point, &centers[label]))
        .sum();

    TwoMeansFit { labels, inertia }
}

fn nearest(point: &[f64], centers: &[Vec<f64>; 2]) -> usize {
    let to_first = squared_distance(point, &centers[0]);
    let to_second = squared_distance(point, &centers[1]);
    usize::from(to_second < to_first)
}

/// Moves the point farthest from its center into an empty cluster.
fn rebalance_empty_cluster(points: &[Vec<f64>], centers: &[Vec<f64>; 2], labels: &mut [usize]) {
    for cluster in 0..2 {
        if labels.contains(&cluster) || labels.len() < 2 {
            continue;
        }

        let farthest = labels
            .iter()
            .enumerate()
            .map(|(index, &label)| (index, squared_distance(&points[index], &centers[label])))
            .fold(None, |best: Option<(usize, f64)>, candidate| match best {
                Some(current) if current.1 >= candidate.1 => Some(current),
                _ => Some(candidate),
            });

        if let Some((index, _)) = farthest {
            labels[index] = cluster;
        }
    }
}

fn centroid(points: &[Vec<f64>], labels: &[usize], cluster: usize) -> Vec<f64> {
    let dims = points.first().map(Vec::len).unwrap_or_default();
    let members = points
        .iter()
        .zip(labels)
        .filter(|(_, label)| **label == cluster)
        .map(|(point, _)| point)
        .collect::<Vec<_>>();

    (0..dims)
        .map(|dim| mean(&members.iter().map(|point| point[dim]).collect::<Vec<_>>()))
        .collect()
}

fn squared_distance(left: &[f64], right: &[f64]) -> f64 {
    left.iter()
        .zip(right)
        .map(|(a, b)| (a - b).powi(2))
        .sum()
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let center = mean(values);
    let variance =
        values.iter().map(|value| (value - center).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::{ClusterLabel, ClusterOutcome, analyze_clusters, fit_two_means};
    use crate::analyzer::AnalysisSettings;
    use crate::analyzer::aggregator::build_weekly_window;
    use crate::analyzer::models::{Feature, RawLogEntry};
    use crate::analyzer::summary::build_insight_summary;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).expect("valid date")
    }

    fn week(moods: &[f64], pains: &[Option<f64>]) -> Vec<RawLogEntry> {
        moods
            .iter()
            .zip(pains)
            .enumerate()
            .map(|(offset, (mood, pain))| RawLogEntry {
                date: day(12 + offset as u32).format("%Y-%m-%d").to_string(),
                mood_score: Some(*mood),
                pain_level: *pain,
                ..RawLogEntry::default()
            })
            .collect()
    }

    fn example_week() -> Vec<RawLogEntry> {
        let pains = [8.0, 7.0, 9.0, 2.0, 1.0, 2.0, 9.0].map(Some);
        week(&[2.0, 2.0, 2.0, 5.0, 5.0, 5.0, 1.0], &pains)
    }

    #[test]
    fn splits_example_week_into_better_and_worse() {
        let settings = AnalysisSettings::default();
        let window =
            build_weekly_window(&example_week(), "mina", day(18), &settings).expect("window");
        let assignment = analyze_clusters(&window, &settings);

        let ClusterOutcome::Split { better, worse, .. } = &assignment.outcome else {
            panic!("expected a split week");
        };

        assert_eq!(worse.dates, vec![day(12), day(13), day(14), day(18)]);
        assert_eq!(better.dates, vec![day(15), day(16), day(17)]);
        assert!((worse.mean_of(Feature::Mood).expect("mood") - 1.75).abs() < 1e-9);
        assert!((worse.mean_of(Feature::Pain).expect("pain") - 8.25).abs() < 1e-9);
        assert!((better.mean_of(Feature::Mood).expect("mood") - 5.0).abs() < 1e-9);
        assert!((better.mean_of(Feature::Pain).expect("pain") - 5.0 / 3.0).abs() < 1e-9);
        assert_eq!(assignment.label_for(day(18)), Some(ClusterLabel::Worse));
        assert_eq!(assignment.label_for(day(16)), Some(ClusterLabel::Better));
    }

    #[test]
    fn orientation_follows_mood_not_cluster_index() {
        let settings = AnalysisSettings::default();
        let mut reversed = example_week();
        reversed.reverse();

        for seed in 0..16 {
            let settings = AnalysisSettings {
                kmeans_seed: seed,
                ..settings
            };
            let window =
                build_weekly_window(&reversed, "mina", day(18), &settings).expect("window");
            let assignment = analyze_clusters(&window, &settings);
            let ClusterOutcome::Split { better, worse, .. } = &assignment.outcome else {
                panic!("expected a split week");
            };

            assert!(
                better.mean_of(Feature::Mood) > worse.mean_of(Feature::Mood),
                "seed {seed} produced an inverted orientation"
            );
        }
    }

    #[test]
    fn repeated_runs_give_identical_partitions() {
        let settings = AnalysisSettings::default();
        let pains = [Some(3.0), None, Some(6.0), Some(2.0), None, Some(7.0), Some(4.0)];
        let entries = week(&[3.0, 4.0, 2.0, 5.0, 4.0, 1.0, 3.0], &pains);
        let window = build_weekly_window(&entries, "mina", day(18), &settings).expect("window");

        let first = analyze_clusters(&window, &settings);
        let second = analyze_clusters(&window, &settings);

        let labels = |outcome: &ClusterOutcome| match outcome {
            ClusterOutcome::Split { labels, .. } => labels.clone(),
            ClusterOutcome::Uniform { .. } => Vec::new(),
        };
        assert_eq!(labels(&first.outcome), labels(&second.outcome));
        assert!(!labels(&first.outcome).is_empty());
    }

    #[test]
    fn identical_moods_fall_back_to_uniform_week() {
        let settings = AnalysisSettings::default();
        let pains = [1.0, 9.0, 2.0, 8.0, 3.0, 7.0, 5.0].map(Some);
        let entries = week(&[3.0; 7], &pains);
        let window = build_weekly_window(&entries, "mina", day(18), &settings).expect("window");

        let assignment = analyze_clusters(&window, &settings);

        assert!(assignment.is_degenerate());
        assert_eq!(assignment.label_for(day(12)), None);
    }

    #[test]
    fn clusters_with_equal_mean_mood_fall_back_to_uniform_week() {
        let settings = AnalysisSettings::default();
        // Pain, sleep and mobility split the days into two groups, each holding a
        // mood of 1 and a mood of 5.
        let logged = |offset: u32, mood: f64, pain: f64, sleep: f64, mobility: &str| RawLogEntry {
            date: day(12 + offset).format("%Y-%m-%d").to_string(),
            mood_score: Some(mood),
            pain_level: Some(pain),
            sleep_hours: Some(sleep),
            mobility_category: Some(mobility.to_string()),
            ..RawLogEntry::default()
        };
        let entries = vec![
            logged(0, 1.0, 0.0, 9.0, "mobile"),
            logged(1, 5.0, 0.0, 9.0, "mobile"),
            logged(2, 1.0, 10.0, 2.0, "bedridden"),
            logged(3, 5.0, 10.0, 2.0, "bedridden"),
        ];
        let window = build_weekly_window(&entries, "mina", day(18), &settings).expect("window");

        let assignment = analyze_clusters(&window, &settings);
        let summary = build_insight_summary(&window, &assignment, &settings);

        assert!(assignment.is_degenerate());
        assert!(summary.degenerate);
        assert!(summary.feature_deltas.is_empty());
        assert_eq!(
            summary.uniform_week.as_ref().map(|profile| profile.days),
            Some(4)
        );
    }

    #[test]
    fn missing_values_are_imputed_with_window_mean() {
        let settings = AnalysisSettings::default();
        let pains = [Some(2.0), None, Some(6.0), None, None, None, None];
        let entries = week(&[2.0, 3.0, 4.0, 5.0, 1.0, 2.0, 4.0], &pains);
        let window = build_weekly_window(&entries, "mina", day(18), &settings).expect("window");

        let assignment = analyze_clusters(&window, &settings);
        let pain = assignment.column(Feature::Pain).expect("pain column");

        assert_eq!(pain.imputed_count(), 5);
        assert_eq!(pain.values[1], 4.0);
        assert!(assignment.column(Feature::Sleep).is_none());
    }

    #[test]
    fn two_means_separates_obvious_groups() {
        let points = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![5.0, 5.0],
            vec![5.1, 4.9],
        ];
        let fit = fit_two_means(&points, 42, 10);

        assert_eq!(fit.labels[0], fit.labels[1]);
        assert_eq!(fit.labels[2], fit.labels[3]);
        assert_ne!(fit.labels[0], fit.labels[2]);
    }
}
