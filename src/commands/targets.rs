use anyhow::Result;

use drawfetch::targets::StrategyTable;
use drawfetch::{OutputFormat, Timeouts};

pub async fn handle_targets(format: OutputFormat) -> Result<()> {
    let description = StrategyTable::new(&Timeouts::default()).describe();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&description)?);
        }
        OutputFormat::Simple => {
            println!("Locator strategy table v{}", description.version);
            for target in &description.targets {
                println!("\n{}:", target.target);
                for (i, strategy) in target.strategies.iter().enumerate() {
                    println!("  {}. {}", i + 1, strategy);
                }
            }
        }
    }
    Ok(())
}
