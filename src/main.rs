use anyhow::Result;
use clap::{Arg, Command};
use dotenvy::dotenv;
use std::env;
use std::fs;
use std::fs::OpenOptions;
use std::sync::Arc;

use focustrack::config::settings::{BackendKind, BackendSettings, Settings};
use focustrack::database::connection::Database;
use focustrack::engine::categorizer::Categorizer;
use focustrack::llm::backend::{AnthropicBackend, ChatBackend, OpenAiBackend};
use focustrack::llm::failover::FailoverRouter;
use focustrack::models::activity::ActivitySnapshot;
use focustrack::usage::tracker::UsageTracker;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("FocusTrack")
        .version("0.3.0")
        .about("Categorize activity snapshots against user-defined categories")
        .arg(
            Arg::new("user")
                .long("user")
                .value_name("USER_ID")
                .help("User to categorize for"),
        )
        .arg(
            Arg::new("snapshot")
                .long("snapshot")
                .value_name("FILE")
                .help("Path to an activity snapshot JSON file"),
        )
        .arg(
            Arg::new("usage-report")
                .long("usage-report")
                .value_name("DAYS")
                .num_args(0..=1)
                .default_missing_value("7")
                .help("Print recent token usage and exit"),
        )
        .get_matches();

    // Load .env file
    dotenv().ok();

    // Check if debug logging is enabled via .env
    let debug_enabled = env::var("DEBUG_LOGS_ENABLED")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    if debug_enabled {
        // Enable debug logging to app.log file
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open("app.log")
            .expect("Failed to open log file");

        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("focustrack=debug"),
        )
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

        log::info!("=== DEBUG LOGGING ENABLED ===");
        log::info!("Writing logs to app.log");
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")).init();
    }

    let settings = Settings::new()?;
    let tracker = Arc::new(UsageTracker::open(&settings.usage_dir)?);

    if let Some(days) = matches.get_one::<String>("usage-report") {
        let days: u32 = days.parse().unwrap_or(7);
        for (day, usage) in tracker.get_recent_usage(days)? {
            println!(
                "{}: {} tokens over {} requests ({} failures)",
                day, usage.total_tokens, usage.requests, usage.failures
            );
        }
        return Ok(());
    }

    let user_id = matches
        .get_one::<String>("user")
        .ok_or_else(|| anyhow::anyhow!("--user is required"))?;
    let snapshot_path = matches
        .get_one::<String>("snapshot")
        .ok_or_else(|| anyhow::anyhow!("--snapshot is required"))?;
    let snapshot: ActivitySnapshot = serde_json::from_str(&fs::read_to_string(snapshot_path)?)?;

    log::info!("Connecting to database...");
    let database = match Database::new(&settings.database_url).await {
        Ok(db) => {
            log::info!("Database connection successful");
            db
        }
        Err(e) => {
            eprintln!("❌ Failed to connect to database. Please check:");
            eprintln!("  - Database is running");
            eprintln!("  - .env file has correct DATABASE_URL");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    database.create_tables().await?;

    let backends = build_backends(&settings.backends)?;
    let router = FailoverRouter::new(backends, tracker.clone());
    let categorizer = Categorizer::new(Arc::new(database), Arc::new(router));

    let result = categorizer.categorize(user_id, &snapshot).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    tracker.flush()?;
    Ok(())
}

fn build_backends(settings: &[BackendSettings]) -> Result<Vec<Arc<dyn ChatBackend>>> {
    let mut backends: Vec<Arc<dyn ChatBackend>> = Vec::new();
    for backend in settings {
        match backend.kind {
            BackendKind::Anthropic => {
                backends.push(Arc::new(AnthropicBackend::new(
                    &backend.api_key,
                    &backend.model,
                )?));
            }
            BackendKind::OpenAi => {
                backends.push(Arc::new(OpenAiBackend::new(
                    &backend.base_url,
                    &backend.api_key,
                    &backend.model,
                )?));
            }
        }
    }
    log::info!("Configured {} LLM backend(s)", backends.len());
    Ok(backends)
}
