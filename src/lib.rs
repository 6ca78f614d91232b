//! # drawfetch
#![allow(clippy::uninlined_format_args)]
//!
//! Batch downloader for configurator-generated product drawings.
//!
//! For every product in a batch file, drawfetch opens a fresh browser
//! session, walks the product finder (select product, open the embedded
//! configurator, fill the specification fields, press the download control)
//! and waits until a new drawing has finished saving. Failed attempts are
//! retried with a fresh session up to a configured budget; the batch always
//! ends with a report.
//!
//! ## CLI Usage
//!
//! A WebDriver must already be running:
//!
//! ```bash
//! geckodriver --port 4444        # Firefox (default)
//! chromedriver --port 9515       # Chrome
//! ```
//!
//! ```bash
//! # Check a batch file and print it with defaults filled in
//! drawfetch validate products.json
//!
//! # Run every product in the batch
//! drawfetch run products.json
//!
//! # Only some products, in Chrome, with a visible window
//! drawfetch run products.json --only ARISE --only Gen3 --browser chrome --no-headless
//!
//! # Machine-readable progress (one JSON object per line) and final report
//! drawfetch run products.json --format json | jq 'select(.event == "attempt_failed")'
//!
//! # Show the versioned locator strategy table
//! drawfetch targets
//! ```
//!
//! Exit codes: `0` every product downloaded, `1` usage or configuration
//! error, `2` at least one product failed.
//!
//! ## Batch File
//!
//! ```json
//! {
//!   "target_url": "https://www.example.com/product-finder",
//!   "products": [
//!     { "name": "ARISE", "specs": { "载重(kg)": "1000", "速度(m/s)": "1.75" } }
//!   ],
//!   "download_settings": { "download_dir": "downloads", "max_attempts": 3 }
//! }
//! ```
//!
//! ## Library Usage
//!
//! ```no_run
//! use drawfetch::{BatchFile, BatchOrchestrator, BatchParams, BrowserType, TracingSink,
//!     ViewportSize, WebDriverProvider, Workflow};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let batch = BatchFile::load(std::path::Path::new("products.json"))?;
//! let provider = WebDriverProvider::new(BrowserType::Firefox, None, true, ViewportSize::default());
//! let workflow = Workflow::new(&batch.target_url, &batch.timeouts, &batch.download_settings);
//! let orchestrator = BatchOrchestrator::new(
//!     provider,
//!     workflow,
//!     BatchParams::from_settings(&batch.download_settings),
//!     Box::new(TracingSink),
//! );
//! let report = orchestrator.run(batch.products).await;
//! println!("{} succeeded, {} failed", report.succeeded, report.failed);
//! # Ok(())
//! # }
//! ```

/// Batch file loading and validation
pub mod config;

/// Error kinds and driver error classification
pub mod errors;

/// Progress events and reporting sinks
pub mod events;

/// Label matching and field classification
pub mod fields;

pub mod interact;
pub mod locator;

/// Download completion detection
pub mod monitor;

pub mod orchestrator;
pub mod resolver;

/// Browser capability traits
pub mod session;

/// Versioned locator strategy table
pub mod targets;

/// Job, report and CLI type definitions
pub mod types;

/// WebDriver browser control
pub mod webdriver;

pub mod workflow;

#[cfg(test)]
pub(crate) mod fake_session;

pub use config::{BatchFile, BatchParams, DownloadSettings, Timeouts};
pub use errors::{ErrorKind, SessionError, WorkflowError};
pub use events::{Event, JsonLinesSink, MemorySink, MultiSink, ReportSink, TracingSink};
pub use orchestrator::BatchOrchestrator;
pub use types::{BatchReport, JobReport, JobSpec, JobStatus, OutputFormat, Specification, ViewportSize};
pub use webdriver::{BrowserType, WebDriverProvider, WebDriverSession};
pub use workflow::{Workflow, WorkflowState};
