#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::run::RunOverrides;
use drawfetch::OutputFormat;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_CONFIG_ERROR: i32 = 1;
const EXIT_JOBS_FAILED: i32 = 2;

#[derive(Parser)]
#[command(name = "drawfetch")]
#[command(about = "Batch downloader for configurator-generated product drawings", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a drawing for every product in a batch file
    Run {
        /// Batch file (JSON)
        batch: PathBuf,

        /// Browser to use
        #[arg(short, long, default_value = "firefox")]
        browser: String,

        /// WebDriver URL (defaults to the browser's usual driver port)
        #[arg(long)]
        webdriver_url: Option<String>,

        /// Override download_settings.download_dir
        #[arg(long)]
        download_dir: Option<PathBuf>,

        /// Override download_settings.max_attempts
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Run browser headless (default)
        #[arg(long, overrides_with = "no_headless")]
        headless: bool,

        /// Run browser in visible mode (disables headless)
        #[arg(long = "no-headless", overrides_with = "headless")]
        no_headless: bool,

        /// Set viewport size (WIDTHxHEIGHT, e.g., 1920x1080)
        #[arg(long)]
        viewport: Option<String>,

        /// Only run the named product (repeatable)
        #[arg(long = "only", value_name = "NAME")]
        only: Vec<String>,

        /// Output format
        #[arg(short, long, default_value = "simple")]
        format: OutputFormat,
    },

    /// Parse a batch file and print it with defaults filled in
    Validate {
        /// Batch file (JSON)
        batch: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
    },

    /// Print the locator strategy table
    Targets {
        /// Output format
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => std::process::exit(EXIT_SUCCESS),
        Ok(false) => std::process::exit(EXIT_JOBS_FAILED),
        Err(err) => {
            // Output JSON error to stdout for programmatic consumption
            let error_json = json!({
                "error": true,
                "message": format!("{:#}", err),
                "exit_code": EXIT_CONFIG_ERROR
            });
            println!(
                "{}",
                serde_json::to_string(&error_json).unwrap_or_else(|_| "{}".to_string())
            );

            // Also log to stderr for human reading
            eprintln!("Error: {:#}", err);
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    }
}

/// Returns whether every Job succeeded
async fn run() -> Result<bool> {
    // Initialize tracing to stderr (so JSON output to stdout remains clean)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drawfetch=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };

    match cli.command {
        Commands::Run {
            batch,
            browser,
            webdriver_url,
            download_dir,
            max_attempts,
            headless: _,
            no_headless,
            viewport,
            only,
            format,
        } => {
            let overrides = RunOverrides {
                download_dir,
                max_attempts,
                only,
            };
            commands::run::handle_run(
                batch,
                browser,
                webdriver_url,
                !no_headless,
                viewport,
                overrides,
                format,
            )
            .await
        }

        Commands::Validate { batch, format } => {
            commands::validate::handle_validate(batch, format).await?;
            Ok(true)
        }

        Commands::Targets { format } => {
            commands::targets::handle_targets(format).await?;
            Ok(true)
        }
    }
}
