use crate::analyzer::aggregator::WINDOW_DAYS;
use crate::config::{Config, default_report_dir, expand_home};
use crate::db::Database;
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, theme::ColorfulTheme};

pub fn run_onboarding() -> Result<Config> {
    println!("──────────────────────────────────────────");
    println!("  Welcome to MoodMirror onboarding.");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();
    let defaults = Config::default();

    println!("\n[1/4] Report output directory");
    let report_dir_input: String = Input::with_theme(&theme)
        .with_prompt("  Folder where weekly reports will be saved")
        .default(default_report_dir().display().to_string())
        .interact_text()
        .context("Failed to read report directory")?;
    let report_dir = expand_home(&report_dir_input);
    println!("  ✓ {}", report_dir.display());

    println!("\n[2/4] Minimum logged days");
    println!("  Weeks with fewer mood entries than this are skipped instead of reported.");
    let min_days_with_mood: usize = Input::with_theme(&theme)
        .with_prompt("  Days with a mood score required per week")
        .default(defaults.min_days_with_mood)
        .validate_with(|input: &usize| -> std::result::Result<(), String> {
            if (1..=WINDOW_DAYS as usize).contains(input) {
                Ok(())
            } else {
                Err(format!("Enter a number between 1 and {WINDOW_DAYS}"))
            }
        })
        .interact_text()
        .context("Failed to read minimum days")?;
    println!("  ✓ At least {min_days_with_mood} day(s) per week");

    println!("\n[3/4] AI caregiver narrative");
    let ai_enabled = Confirm::with_theme(&theme)
        .with_prompt("  Write a plain-language narrative with an AI model?")
        .default(true)
        .interact()
        .context("Failed to read AI preference")?;

    let ai_api_key = if ai_enabled {
        let key: String = Input::with_theme(&theme)
            .with_prompt("  API key (leave empty to use MOODMIRROR_AI_API_KEY)")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read AI API key")?;
        (!key.trim().is_empty()).then_some(key.trim().to_string())
    } else {
        None
    };

    let config = Config {
        report_dir,
        min_days_with_mood,
        ai_enabled,
        ai_api_key,
        ..defaults
    };

    println!("\n[4/4] Preparing local storage");
    config.ensure_bootstrap_files()?;
    config.save()?;
    let _ = Database::open(&config.db_path)?;
    println!("  ✓ Log store ready ({})", config.db_path.display());

    println!("\n──────────────────────────────────────────");
    println!("  Onboarding complete!");
    println!("  Import logs with MoodMirror import --file <logs.json>.");
    println!("──────────────────────────────────────────");

    Ok(config)
}
