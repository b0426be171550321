//! CLI entry point for the low bridge alert monitor.
//!
//! Provides subcommands for running the monitoring loop, firing a manual
//! test alert on a vehicle, and inspecting the active configuration.

use anyhow::Result;
use clap::{Parser, Subcommand};
use low_bridge_alert::config::MonitorConfig;
use low_bridge_alert::monitor::Monitor;
use low_bridge_alert::webfleet::WebfleetClient;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "low-bridge-alert")]
#[command(about = "Monitors vehicles entering low-clearance zones and triggers their external buzzer", long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "low_bridge_config.json", global = true)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the event feed and alert vehicles entering restricted zones
    Monitor,
    /// Fire a single manual buzzer alert on a vehicle
    Trigger {
        /// Vehicle object number
        #[arg(value_name = "VEHICLE_ID")]
        vehicle: String,

        /// Location label recorded with the alert
        #[arg(short, long, default_value = "Test Bridge")]
        label: String,

        /// Reason recorded with the alert
        #[arg(short, long, default_value = "Manual test")]
        reason: String,

        /// Buzzer duration in seconds (defaults to the configured value)
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Print the active configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/low_bridge_alert.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("low_bridge_alert.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = MonitorConfig::load_or_create(&cli.config)?;

    match cli.command {
        Commands::Monitor => {
            let api = Arc::new(client_from_env()?);
            let mut monitor = Monitor::new(api, config);

            let shutdown = CancellationToken::new();
            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "Failed to listen for shutdown signal");
                    return;
                }
                info!("Shutdown requested, finishing current cycle");
                signal_token.cancel();
            });

            monitor.run(shutdown).await?;
        }
        Commands::Trigger {
            vehicle,
            label,
            reason,
            duration,
        } => {
            let api = Arc::new(client_from_env()?);
            let duration = duration.unwrap_or(config.buzzer_duration);
            let mut monitor = Monitor::new(api, config);

            let record = monitor
                .trigger_once(&vehicle, &label, &reason, duration)
                .await?;
            info!(
                vehicle_id = %record.vehicle_id,
                success = record.success,
                "Manual trigger complete"
            );
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Builds the Webfleet client from `WEBFLEET_*` environment variables.
fn client_from_env() -> Result<WebfleetClient> {
    let account = std::env::var("WEBFLEET_ACCOUNT")
        .map_err(|_| anyhow::anyhow!("WEBFLEET_ACCOUNT must be set"))?;
    let username = std::env::var("WEBFLEET_USERNAME")
        .map_err(|_| anyhow::anyhow!("WEBFLEET_USERNAME must be set"))?;
    let apikey = std::env::var("WEBFLEET_APIKEY")
        .map_err(|_| anyhow::anyhow!("WEBFLEET_APIKEY must be set"))?;
    let api_url = std::env::var("WEBFLEET_API_URL").ok();

    Ok(WebfleetClient::new(account, username, apikey, api_url)?)
}
