use crate::analyzer::models::{Feature, MoodLabel};
use crate::analyzer::summary::{InsightSummary, Strength};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const NO_FACTOR_SUGGESTION: &str = "No immediate behavioral factors correlated with mood swings this week. Continue with current routines.";
const STEADY_WEEK_SUGGESTION: &str = "Mood stayed steady all week, so no single factor stood out. Keep the current routine and keep logging daily.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyReport {
    pub user_id: String,
    pub user_name: String,
    pub generated_at: String,
    pub summary: InsightSummary,
    pub narrative: Option<String>,
    pub suggestions: Vec<String>,
}

#[derive(Debug)]
pub struct SavedReport {
    pub markdown_path: PathBuf,
    pub json_path: PathBuf,
    pub html_path: PathBuf,
}

pub fn build_weekly_report(
    summary: InsightSummary,
    user_name: Option<String>,
    narrative: Option<String>,
) -> WeeklyReport {
    let generated_at: DateTime<Utc> = Utc::now();
    let suggestions = suggestions_for(&summary);

    WeeklyReport {
        user_id: summary.user_id.clone(),
        user_name: user_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| summary.user_id.clone()),
        generated_at: generated_at.to_rfc3339(),
        summary,
        narrative,
        suggestions,
    }
}

/// Rule-based recommendations, one per feature that separates better from worse days.
pub fn suggestions_for(summary: &InsightSummary) -> Vec<String> {
    if summary.degenerate {
        return vec![STEADY_WEEK_SUGGESTION.to_string()];
    }

    let suggestions = summary
        .feature_deltas
        .iter()
        .filter(|delta| delta.strength >= Strength::Moderate)
        .filter_map(|delta| {
            let text = match delta.feature {
                Feature::Mood => return None,
                Feature::Sleep => {
                    "Focus on consistent sleep, as it tracks closely with the better mood days."
                }
                Feature::Pain => {
                    "Monitor and manage pain levels closely, as lower pain accompanies a brighter mood."
                }
                Feature::Mobility => {
                    "Encourage getting up and moving around the home; better mobility goes together with better mood."
                }
                Feature::Water => {
                    "Encourage adequate daily hydration; mood is steadier on days with higher water intake."
                }
                Feature::Exercise => {
                    "Introduce light daily activity or stretching; physical movement goes together with better mood."
                }
                Feature::Energy => {
                    "Higher energy accompanies the better mood days. Check for daytime energy dips."
                }
            };
            let caveat = if delta.imputed {
                " (based on limited logs this week)"
            } else {
                ""
            };
            Some(format!("{text}{caveat}"))
        })
        .collect::<Vec<_>>();

    if suggestions.is_empty() {
        vec![NO_FACTOR_SUGGESTION.to_string()]
    } else {
        suggestions
    }
}

pub fn render_markdown(report: &WeeklyReport) -> String {
    let summary = &report.summary;

    let dominant = dominant_mood_line(summary);
    let distribution_rows = if summary.mood_distribution.is_empty() {
        "- No mood data".to_string()
    } else {
        summary
            .mood_distribution
            .iter()
            .map(|share| {
                format!(
                    "| {} | {} | {:.1}% |",
                    share.label, share.count, share.percentage
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let cluster_section = match (&summary.cluster_better, &summary.cluster_worse) {
        (Some(better), Some(worse)) => {
            let rows = summary
                .feature_deltas
                .iter()
                .map(|delta| {
                    format!(
                        "| {} | {:.2} | {:.2} | {:+.2} | {}{} |",
                        delta.feature,
                        delta.better_mean,
                        delta.worse_mean,
                        delta.delta,
                        delta.strength.as_str(),
                        if delta.imputed { " (imputed)" } else { "" }
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "- Better mood days: {}\n- Worse mood days: {}\n\n| Feature | Better | Worse | Delta | Strength |\n|---------|--------|-------|-------|----------|\n{}",
                better.days, worse.days, rows
            )
        }
        _ => "- Uniform week: mood did not vary enough to compare better and worse days".to_string(),
    };

    let correlate_rows = bullet_list(&summary.correlates, "No notable correlate detected");
    let symptom_rows = if summary.symptom_signals.is_empty() {
        "- None".to_string()
    } else {
        summary
            .symptom_signals
            .iter()
            .map(|signal| {
                format!(
                    "- {}: {} worse day(s), {} better day(s)",
                    signal.flag, signal.worse_days, signal.better_days
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    let confidence_line = if summary.reduced_confidence.is_empty() {
        String::new()
    } else {
        format!(
            "- Reduced confidence (values estimated on missing days): {}\n",
            summary
                .reduced_confidence
                .iter()
                .map(|feature| feature.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    };
    let narrative = report
        .narrative
        .as_deref()
        .unwrap_or("AI narrative unavailable this week.");

    format!(
        "# Weekly Mood Report - {} ({} to {})\n\n## Summary\n- Days with mood data: {}\n- Days logged without mood: {}\n- Days missing: {}\n- Dropped entries: {}\n- Camera mood readings: {}\n- {}\n{}\n## Mood Distribution\n| Mood | Count | Share |\n|------|------|-------|\n{}\n\n## Better vs Worse Days\n{}\n\n## Correlates\n{}\n\n## Symptoms on Worse Days\n{}\n\n## Recommendations\n{}\n\n## Narrative\n{}\n",
        report.user_name,
        summary.window_start,
        summary.window_end,
        summary.days_with_data,
        summary.days_logged_without_mood,
        summary.days_missing,
        summary.dropped_entries,
        summary.camera_readings,
        dominant,
        confidence_line,
        distribution_rows,
        cluster_section,
        correlate_rows,
        symptom_rows,
        bullet_list(&report.suggestions, "None"),
        narrative
    )
}

/// Caregiver email body. Delivery is left to whoever picks up the saved file.
pub fn render_html(report: &WeeklyReport) -> String {
    let summary = &report.summary;
    let dominant = summary.dominant_mood;
    let mood_color = dominant.map(MoodLabel::color).unwrap_or("#607D8B");
    let dominant_share = summary
        .mood_distribution
        .first()
        .map(|share| share.percentage)
        .unwrap_or_default();

    let distribution_items = summary
        .mood_distribution
        .iter()
        .map(|share| {
            let weight = if Some(share.label) == dominant {
                "bold"
            } else {
                "normal"
            };
            format!(
                r#"<li style="font-weight: {weight}; padding: 3px 0;"><span style="display: inline-block; width: 100px;">{}:</span> {} reading(s) <b>({:.1}%)</b></li>"#,
                share.label, share.count, share.percentage
            )
        })
        .collect::<String>();

    let suggestion_cards = report
        .suggestions
        .iter()
        .map(|suggestion| {
            format!(
                r#"<div style="background-color: #F0F8FF; border-left: 5px solid #00796b; padding: 12px; margin-bottom: 10px; border-radius: 8px;"><span style="font-weight: bold; color: #00796b;">Recommendation:</span><br>{}</div>"#,
                escape_html(suggestion)
            )
        })
        .collect::<String>();

    let narrative_block = report
        .narrative
        .as_deref()
        .map(|text| {
            format!(
                r#"<h3 style="color: #00796b;">This Week in Words</h3><p style="white-space: pre-wrap;">{}</p>"#,
                escape_html(text)
            )
        })
        .unwrap_or_default();

    let name = escape_html(&report.user_name);
    let dominant_name = dominant
        .map(|label| label.to_string())
        .unwrap_or_else(|| "Neutral".to_string());

    format!(
        r#"<html><body style="font-family: 'Segoe UI', Tahoma, sans-serif; background-color: #f4f7f6; padding: 20px;">
<div style="max-width: 600px; margin: 0 auto; background-color: #ffffff; border-radius: 12px; overflow: hidden;">
<div style="background-color: #00796b; padding: 20px; color: white;"><h2 style="margin: 0;">Weekly Mood Report for {name}</h2><span>{} to {}</span></div>
<div style="padding: 20px;">
<div style="background-color: {mood_color}; color: white; padding: 15px; border-radius: 8px; text-align: center; margin-bottom: 20px;">
<span style="font-size: 14px; display: block;">Dominant Mood</span><b style="font-size: 28px; display: block;">{dominant_name}</b><span style="font-size: 14px;">({dominant_share:.1}% of mood readings, {} of 7 days with data)</span>
</div>
<h3 style="color: #00796b;">Mood Distribution</h3><ul style="list-style: none; padding: 0; margin: 0;">{distribution_items}</ul>
<h3 style="color: #00796b;">Correlated Insights &amp; Recommendations</h3>{suggestion_cards}
{narrative_block}
</div>
<div style="background-color: #f0f0f0; padding: 15px; text-align: center; font-size: 12px; color: #777;">&mdash; MoodMirror &mdash;</div>
</div></body></html>
"#,
        summary.window_start, summary.window_end, summary.days_with_data
    )
}

pub fn save_report_files(report: &WeeklyReport, report_dir: &Path) -> Result<SavedReport> {
    fs::create_dir_all(report_dir).with_context(|| {
        format!(
            "Failed to create report directory: {}",
            report_dir.display()
        )
    })?;

    let stem = report_file_stem(&report.user_id, &report.summary.window_end.to_string());
    let markdown_path = report_dir.join(format!("{stem}.md"));
    let json_path = report_dir.join(format!("{stem}.json"));
    let html_path = report_dir.join(format!("{stem}.html"));

    fs::write(&markdown_path, render_markdown(report)).with_context(|| {
        format!(
            "Failed to write Markdown report: {}",
            markdown_path.display()
        )
    })?;

    let json_content =
        serde_json::to_string_pretty(report).context("Failed to serialize report JSON")?;
    fs::write(&json_path, json_content)
        .with_context(|| format!("Failed to write JSON report: {}", json_path.display()))?;

    fs::write(&html_path, render_html(report))
        .with_context(|| format!("Failed to write HTML report: {}", html_path.display()))?;

    Ok(SavedReport {
        markdown_path,
        json_path,
        html_path,
    })
}

fn report_file_stem(user_id: &str, window_end: &str) -> String {
    let safe_user = user_id
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect::<String>();

    format!("{safe_user}_{window_end}")
}

fn dominant_mood_line(summary: &InsightSummary) -> String {
    match (summary.dominant_mood, summary.mood_distribution.first()) {
        (Some(label), Some(share)) => {
            format!("Dominant mood: {label} ({:.1}% of mood readings)", share.percentage)
        }
        _ => "Dominant mood: none".to_string(),
    }
}

fn bullet_list(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        return format!("- {empty}");
    }

    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::{
        NO_FACTOR_SUGGESTION, build_weekly_report, escape_html, render_html, render_markdown,
        report_file_stem, save_report_files,
    };
    use crate::analyzer::models::{Feature, MoodLabel};
    use crate::analyzer::summary::{FeatureDelta, InsightSummary, MoodShare, Strength};
    use chrono::NaiveDate;

    fn summary() -> InsightSummary {
        InsightSummary {
            user_id: "mina".to_string(),
            window_start: NaiveDate::from_ymd_opt(2026, 10, 12).expect("date"),
            window_end: NaiveDate::from_ymd_opt(2026, 10, 18).expect("date"),
            days_with_data: 5,
            days_logged_without_mood: 1,
            days_missing: 1,
            dropped_entries: 0,
            camera_readings: 0,
            cluster_better: None,
            cluster_worse: None,
            uniform_week: None,
            feature_deltas: vec![FeatureDelta {
                feature: Feature::Pain,
                better_mean: 2.0,
                worse_mean: 8.0,
                delta: -6.0,
                standardized_delta: -1.8,
                strength: Strength::Strong,
                imputed: false,
                imputed_days: 0,
            }],
            correlates: vec!["lower pain co-occurs with better mood days".to_string()],
            symptom_signals: Vec::new(),
            mood_distribution: vec![MoodShare {
                label: MoodLabel::Sad,
                count: 5,
                percentage: 100.0,
            }],
            dominant_mood: Some(MoodLabel::Sad),
            reduced_confidence: Vec::new(),
            degenerate: false,
        }
    }

    #[test]
    fn pain_correlate_becomes_suggestion() {
        let report = build_weekly_report(summary(), Some("Mina".to_string()), None);

        assert_eq!(report.suggestions.len(), 1);
        assert!(report.suggestions[0].contains("pain"));
    }

    #[test]
    fn falls_back_when_nothing_stands_out() {
        let mut quiet = summary();
        quiet.feature_deltas[0].strength = Strength::Negligible;

        let report = build_weekly_report(quiet, None, None);

        assert_eq!(report.user_name, "mina");
        assert_eq!(report.suggestions, vec![NO_FACTOR_SUGGESTION.to_string()]);
    }

    #[test]
    fn markdown_and_html_mention_dominant_mood() {
        let report = build_weekly_report(
            summary(),
            Some("Mina <Kim>".to_string()),
            Some("A hard week with pain.".to_string()),
        );

        let markdown = render_markdown(&report);
        assert!(markdown.contains("# Weekly Mood Report - Mina <Kim> (2026-10-12 to 2026-10-18)"));
        assert!(markdown.contains("Dominant mood: Sad (100.0% of mood readings)"));
        assert!(markdown.contains("A hard week with pain."));

        let html = render_html(&report);
        assert!(html.contains("#F44336"));
        assert!(html.contains("Mina &lt;Kim&gt;"));
    }

    #[test]
    fn lifestyle_features_get_their_own_suggestions() {
        let mut active = summary();
        active.feature_deltas[0].feature = Feature::Water;
        let mut exercise = active.feature_deltas[0].clone();
        exercise.feature = Feature::Exercise;
        exercise.imputed = true;
        exercise.strength = Strength::Moderate;
        active.feature_deltas.push(exercise);

        let report = build_weekly_report(active, None, None);

        assert_eq!(report.suggestions.len(), 2);
        assert!(report.suggestions[0].contains("hydration"));
        assert!(report.suggestions[1].contains("stretching"));
        assert!(report.suggestions[1].ends_with("(based on limited logs this week)"));
    }

    #[test]
    fn html_escaping_covers_quotes() {
        assert_eq!(
            escape_html(r#"<a href="x">Mina's & Joon's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Mina&#39;s &amp; Joon&#39;s&lt;/a&gt;"
        );
    }

    #[test]
    fn file_stem_is_filesystem_safe() {
        assert_eq!(report_file_stem("mina/../x", "2026-10-18"), "mina____x_2026-10-18");
    }

    #[test]
    fn saves_all_three_files() {
        let temp = tempfile::tempdir().expect("temp dir");
        let report = build_weekly_report(summary(), None, None);

        let saved = save_report_files(&report, temp.path()).expect("saved");

        assert!(saved.markdown_path.ends_with("mina_2026-10-18.md"));
        let json = std::fs::read_to_string(&saved.json_path).expect("json readable");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(parsed["summary"]["feature_deltas"][0]["strength"], "strong");
        assert!(saved.html_path.exists());
    }
}
