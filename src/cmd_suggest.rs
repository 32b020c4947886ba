//! The `suggest` subcommand: model-backed restock suggestions.

use crate::config::Config;
use crate::factory;

/// Snapshots fed to the analysis: the latest plus up to five prior.
const SUGGEST_WINDOW: u32 = 6;

pub(crate) async fn handle_suggest(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let journal = factory::open_journal(config).await?;
    let mut records = journal.recent_snapshots(SUGGEST_WINDOW).await?;
    if records.is_empty() {
        println!("No detection history yet; run `restock history save` first.");
        return Ok(());
    }
    let current = records.remove(0).items;

    let engine = factory::build_engine(config)?;
    let analysis = engine.analyze_history(&records, &current).await;

    if analysis.suggestions.is_empty() {
        println!("Nothing looks depleted.");
    } else {
        println!("Suggested restock:");
        for deficit in &analysis.suggestions {
            println!("  {} x{}", deficit.item_key, deficit.quantity);
        }
        println!("\nOrder with: restock order --from-history");
    }

    if !analysis.thinking.is_empty() {
        println!("\nModel notes: {}", analysis.thinking);
    }

    Ok(())
}
