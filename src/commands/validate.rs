use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

use drawfetch::{BatchFile, OutputFormat};

pub async fn handle_validate(batch_path: PathBuf, format: OutputFormat) -> Result<()> {
    info!("Validating batch file {}", batch_path.display());
    let batch = BatchFile::load(&batch_path)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&batch)?);
        }
        OutputFormat::Simple => {
            let settings = &batch.download_settings;
            println!("Batch file OK: {}", batch_path.display());
            println!("Target: {}", batch.target_url);
            println!(
                "Downloads: {} (max attempts: {}, timeout: {}s)",
                settings.download_dir.display(),
                settings.max_attempts,
                settings.download_timeout_secs
            );
            println!("Products ({}):", batch.products.len());
            for product in &batch.products {
                println!("  {} ({} field(s))", product.name, product.specs.len());
            }
        }
    }
    Ok(())
}
