use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use drawfetch::{
    BatchFile, BatchOrchestrator, BatchParams, BatchReport, BrowserType, JobStatus,
    JsonLinesSink, MultiSink, OutputFormat, ReportSink, TracingSink, ViewportSize,
    WebDriverProvider, Workflow,
};

/// Command-line values that take precedence over the batch file
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub download_dir: Option<PathBuf>,
    pub max_attempts: Option<u32>,
    pub only: Vec<String>,
}

impl RunOverrides {
    pub fn apply(&self, batch: &mut BatchFile) -> Result<()> {
        if let Some(dir) = &self.download_dir {
            batch.download_settings.download_dir = dir.clone();
        }
        if let Some(max) = self.max_attempts {
            batch.download_settings.max_attempts = max;
        }
        batch.retain_products(&self.only)?;
        batch.validate()
    }
}

pub async fn handle_run(
    batch_path: PathBuf,
    browser: String,
    webdriver_url: Option<String>,
    headless: bool,
    viewport: Option<String>,
    overrides: RunOverrides,
    format: OutputFormat,
) -> Result<bool> {
    let mut batch = BatchFile::load(&batch_path)?;
    overrides.apply(&mut batch)?;

    let browser_type: BrowserType = browser.parse()?;
    let viewport = viewport
        .as_deref()
        .map(ViewportSize::parse)
        .transpose()?
        .unwrap_or_default();

    if batch.products.is_empty() {
        info!("No products to run in {}", batch_path.display());
    }
    info!(
        "Running {} product(s) against {} with {:?}",
        batch.products.len(),
        batch.target_url,
        browser_type
    );

    let provider = WebDriverProvider::new(browser_type, webdriver_url, headless, viewport);
    let workflow = Workflow::new(&batch.target_url, &batch.timeouts, &batch.download_settings);
    let sink: Box<dyn ReportSink> = match format {
        OutputFormat::Json => Box::new(
            MultiSink::new()
                .with(TracingSink)
                .with(JsonLinesSink::stdout()),
        ),
        OutputFormat::Simple => Box::new(TracingSink),
    };
    let orchestrator = BatchOrchestrator::new(
        provider,
        workflow,
        BatchParams::from_settings(&batch.download_settings),
        sink,
    );

    let report = orchestrator.run(batch.products).await;
    print_report(&report, format)?;
    Ok(report.all_succeeded())
}

fn print_report(report: &BatchReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            // Single line so the event stream stays one object per line
            println!(
                "{}",
                serde_json::to_string(report).context("Failed to serialize report")?
            );
        }
        OutputFormat::Simple => {
            println!("\nBatch complete:");
            println!("  ✓ {} product(s) downloaded", report.succeeded);
            if report.failed > 0 {
                println!("  ✗ {} product(s) failed", report.failed);
            }
            for job in &report.jobs {
                match job.status {
                    JobStatus::Succeeded => {
                        let artifact = job
                            .artifact
                            .as_ref()
                            .map(|p| p.display().to_string())
                            .unwrap_or_default();
                        println!(
                            "  {} -> {} (attempts: {})",
                            job.name, artifact, job.attempts_used
                        );
                    }
                    _ => {
                        let error = job
                            .last_error
                            .map(|k| k.to_string())
                            .unwrap_or_else(|| "unknown".to_string());
                        println!(
                            "  {} failed: {} (attempts: {})",
                            job.name, error, job.attempts_used
                        );
                    }
                }
                if !job.skipped_fields.is_empty() {
                    println!("    skipped: {}", job.skipped_fields.join(", "));
                }
            }
        }
    }
    Ok(())
}
