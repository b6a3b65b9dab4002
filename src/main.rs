mod ai;
mod analyzer;
mod cli;
mod config;
mod db;
mod ingest;

use crate::analyzer::analyze_week;
use crate::analyzer::error::AnalysisError;
use crate::cli::onboard::run_onboarding;
use crate::cli::{AiCommands, Cli, Commands, ConfigCommands};
use crate::config::Config;
use crate::db::Database;
use crate::ingest::LogBundle;
use anyhow::{Context, Result, anyhow};
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => {
            let _ = run_onboarding()?;
            Ok(())
        }
        Commands::Config { command } => handle_config_command(command),
        Commands::Import { file, user } => handle_import(&file, user.as_deref()),
        Commands::Analyze { file, user, end } => handle_analyze(&file, &user, end),
        Commands::Report {
            user,
            all_users,
            end,
        } => handle_report(user, all_users, end).await,
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
        Commands::Ai { command } => handle_ai_command(command),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            let masked = if key.contains("api_key") {
                "***hidden***".to_string()
            } else {
                value
            };
            println!("Config saved: {key} = {masked}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_or_default_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_import(file: &Path, user: Option<&str>) -> Result<()> {
    let config = load_or_default_config()?;
    let bundle = LogBundle::load(file)?;
    let database = Database::open(&config.db_path)?;

    let stats = ingest::import_bundle(&database, &bundle, user)?;
    info!(
        stored = stats.stored,
        camera_readings = stats.camera_readings,
        skipped = stats.skipped,
        "log import finished"
    );

    println!(
        "Stored {} log entries and {} camera moods from {} ({} skipped).",
        stats.stored,
        stats.camera_readings,
        file.display(),
        stats.skipped
    );
    Ok(())
}

fn handle_analyze(file: &Path, user: &str, end: Option<String>) -> Result<()> {
    let config = load_or_default_config()?;
    let window_end = parse_optional_date(end)?;
    let bundle = LogBundle::load(file)?;

    let daily_logs = bundle.daily_logs_for(user);
    if daily_logs.is_empty() {
        warn!(user_id = %user, file = %file.display(), "log file holds no entries for this user");
    }

    let analysis = analyze_week(
        &daily_logs,
        &bundle.camera_moods_for(user),
        user,
        window_end,
        &config.analysis_settings(),
    )?;

    let output = serde_json::to_string_pretty(&analysis.summary)
        .context("Failed to serialize insight summary")?;
    println!("{output}");
    Ok(())
}

async fn handle_report(user: Option<String>, all_users: bool, end: Option<String>) -> Result<()> {
    let config = Arc::new(load_config()?);
    config.ensure_bootstrap_files()?;
    let window_end = parse_optional_date(end)?;

    let users = if all_users {
        Database::open(&config.db_path)?.user_ids()?
    } else {
        user.into_iter().collect()
    };

    if users.is_empty() {
        println!("No users with stored logs.");
        return Ok(());
    }

    // Users are independent; each run gets its own blocking task and its own DB handle.
    let mut tasks = JoinSet::new();
    for user_id in users {
        let config = Arc::clone(&config);
        tasks.spawn_blocking(move || {
            let result = analyzer::generate_and_store_report(&config, &user_id, window_end);
            (user_id, result)
        });
    }

    let mut failures = 0;
    while let Some(joined) = tasks.join_next().await {
        let (user_id, result) = joined.map_err(|error| anyhow!("report task failed: {error}"))?;

        match result {
            Ok((report, saved)) => {
                println!(
                    "Report generated: {} ({} to {})",
                    report.user_name, report.summary.window_start, report.summary.window_end
                );
                println!("- Markdown: {}", saved.markdown_path.display());
                println!("- JSON: {}", saved.json_path.display());
                println!("- HTML: {}", saved.html_path.display());
            }
            Err(error) => match error.downcast_ref::<AnalysisError>() {
                Some(AnalysisError::InsufficientData { .. }) => {
                    info!(user_id = %user_id, "skipping user this week");
                    println!("No report for {user_id} this week: {error}");
                }
                _ => {
                    warn!(user_id = %user_id, error = %error, "weekly report failed");
                    failures += 1;
                }
            },
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} weekly report(s) failed");
    }

    Ok(())
}

fn handle_status() -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;

    println!("MoodMirror status");
    println!("- users_with_logs: {}", database.user_ids()?.len());
    println!(
        "- latest_log_date: {}",
        database
            .latest_log_date()?
            .unwrap_or_else(|| "none".to_string())
    );
    println!(
        "- latest_report: {}",
        database
            .latest_report_meta()?
            .map(|meta| format!("{} ({})", meta.window_end, meta.user_id))
            .unwrap_or_else(|| "none".to_string())
    );
    println!("- ai_enabled: {}", config.ai_enabled);

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = load_or_default_config()?;

    match Database::open(&config.db_path) {
        Ok(_) => println!("[OK] SQLite reachable: {}", config.db_path.display()),
        Err(error) => {
            println!("[WARN] SQLite check failed: {error}");
            issues.push("db unreachable".to_string());
        }
    }

    if config.report_dir.exists() {
        println!("[OK] report dir exists: {}", config.report_dir.display());
    } else {
        println!("[WARN] report dir missing: {}", config.report_dir.display());
        issues.push("report dir missing".to_string());
    }

    match config.analysis_settings().validate() {
        Ok(()) => println!(
            "[OK] analysis settings valid (min days {}, thresholds {}/{})",
            config.min_days_with_mood, config.moderate_threshold, config.strong_threshold
        ),
        Err(error) => {
            println!("[WARN] {error}");
            issues.push("invalid analysis settings".to_string());
        }
    }

    if config.ai_enabled {
        if ai::has_api_key(&config) {
            println!("[OK] AI API key is configured");
        } else {
            println!("[WARN] AI is enabled but API key is missing");
            issues.push("ai api key missing".to_string());
        }
    } else {
        println!("[OK] AI feature disabled");
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_ai_command(command: AiCommands) -> Result<()> {
    match command {
        AiCommands::Test {
            key,
            base_url,
            model,
        } => {
            let mut config = load_or_default_config()?;

            if let Some(value) = key {
                config.ai_api_key = Some(value);
            }
            if let Some(value) = base_url {
                config.ai_api_base_url = value;
            }
            if let Some(value) = model {
                config.ai_model = value;
            }

            let response = ai::test_connection(&config)?;
            println!("AI API connection successful");
            println!("{response}");

            Ok(())
        }
    }
}

fn parse_optional_date(input: Option<String>) -> Result<NaiveDate> {
    input
        .as_deref()
        .map(|date| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date format: {date}. Example: 2026-10-18"))
        })
        .transpose()?
        .map_or_else(|| Ok(Local::now().date_naive()), Ok)
}

fn load_or_default_config() -> Result<Config> {
    Config::load().or_else(|_| {
        let config = Config::default();
        config.ensure_bootstrap_files()?;
        config.save()?;
        Ok(config)
    })
}

fn load_config() -> Result<Config> {
    Config::load()
        .with_context(|| "Config file not found. Run `MoodMirror onboard` first.".to_string())
}
