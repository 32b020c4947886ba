//! The `order` subcommand: resolve deficits and drive a storefront run.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use restock_core::{Orchestrator, OrchestratorOptions, ResolutionSource, resolve};
use restock_journal::Journal;
use restock_protocols::{
    Deficit, FailureKind, ItemCatalog, ItemOutcome, OrderRunResult, ProviderId, RunFailure,
    RunStatus,
};

use crate::config::Config;
use crate::factory;

/// How many snapshots to look back through in history mode.
const HISTORY_WINDOW: u32 = 6;

pub(crate) async fn handle_order(
    items: Vec<String>,
    provider: Option<ProviderId>,
    baseline: bool,
    from_history: bool,
    dry_run: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let journal = factory::open_journal(config).await?;
    let preference = journal.preference().await?;
    let provider = provider.unwrap_or(preference.preferred_provider);
    let catalog = ItemCatalog::standard();

    let deficits = if !items.is_empty() {
        parse_item_args(&items)?
    } else if from_history {
        resolve_from_history(&journal, &catalog).await?
    } else {
        resolve_from_baseline(&journal, &catalog, config, baseline).await?
    };

    if deficits.is_empty() {
        println!("Nothing to order: everything is stocked.");
        return Ok(());
    }

    println!("Ordering {} item(s) from {}:", deficits.len(), provider);
    for deficit in &deficits {
        println!("  {} x{}", deficit.item_key, deficit.quantity);
    }
    if dry_run {
        println!("\nDry run: no browser opened.");
        return Ok(());
    }

    let engine = factory::build_engine(config)?;
    let orchestrator = Orchestrator::new(engine).with_options(OrchestratorOptions {
        clear_cart_first: config.order.clear_cart_first,
        open_cart_after: config.order.open_cart_after,
    });
    let storefront = factory::build_storefront(provider, config);

    // Ctrl-C stops between items; the in-flight add still finishes.
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, stopping after the current item");
            signal_token.cancel();
        }
    });

    let result = orchestrator
        .place_order(storefront.as_ref(), &deficits, &preference, &catalog, cancel)
        .await;

    print_run_report(&result);

    if result.added_count() > 0 {
        println!("\nBrowser left open; review the cart and complete checkout there.");
    } else {
        if let Err(e) = storefront.close().await {
            warn!(error = %e, "Browser close failed");
        }
        if matches!(
            result.status,
            RunStatus::Failed(RunFailure::NeedsManualLogin)
        ) {
            println!("\nLogin required. Run `restock login {provider}` first.");
        }
    }

    Ok(())
}

/// Baseline mode: configured minimums vs the latest saved snapshot.
async fn resolve_from_baseline(
    journal: &Journal,
    catalog: &ItemCatalog,
    config: &Config,
    explicit: bool,
) -> Result<Vec<Deficit>, Box<dyn std::error::Error>> {
    if config.baseline.is_empty() {
        if explicit {
            return Err("no [baseline] section in the config file".into());
        }
        return Err(
            "nothing to resolve: pass items (e.g. `restock order milk=2`), configure a \
             [baseline] section, or use --from-history"
                .into(),
        );
    }

    let current = journal
        .latest_snapshot()
        .await?
        .map(|record| record.items)
        .ok_or("no detection snapshot saved; run `restock history save` first")?;

    Ok(resolve(
        &current,
        ResolutionSource::Baseline(&config.baseline),
        catalog,
    ))
}

/// History mode: the latest snapshot is "now", earlier ones say what
/// used to be stocked.
async fn resolve_from_history(
    journal: &Journal,
    catalog: &ItemCatalog,
) -> Result<Vec<Deficit>, Box<dyn std::error::Error>> {
    let mut records = journal.recent_snapshots(HISTORY_WINDOW).await?;
    if records.is_empty() {
        return Err("no detection history; run `restock history save` first".into());
    }
    let current = records.remove(0).items;

    Ok(resolve(
        &current,
        ResolutionSource::History(&records),
        catalog,
    ))
}

/// Parse `KEY` / `KEY=QTY` arguments into deficits.
fn parse_item_args(items: &[String]) -> Result<Vec<Deficit>, Box<dyn std::error::Error>> {
    let mut deficits = Vec::with_capacity(items.len());
    for raw in items {
        let (key, quantity) = match raw.split_once('=') {
            Some((key, count)) => {
                let quantity: u32 = count
                    .parse()
                    .map_err(|_| format!("bad quantity in '{raw}' (want e.g. milk=2)"))?;
                (key, quantity)
            }
            None => (raw.as_str(), 1),
        };
        if key.is_empty() {
            return Err(format!("empty item key in '{raw}'").into());
        }
        deficits.push(Deficit::new(key, quantity));
    }
    Ok(deficits)
}

fn print_run_report(result: &OrderRunResult) {
    println!("\nRun {}: {}", result.run_id, status_line(&result.status));
    for item in &result.items {
        match &item.outcome {
            ItemOutcome::Added {
                title,
                quantity,
                fallback_used,
            } => {
                let note = if *fallback_used {
                    " (first result; model unavailable)"
                } else {
                    ""
                };
                println!("  + {} x{}: {}{}", item.item_key, quantity, title, note);
            }
            ItemOutcome::NoCandidates => {
                println!("  - {}: no products found", item.item_key);
            }
            ItemOutcome::Failed { kind, message } => {
                println!(
                    "  ! {}: {} ({})",
                    item.item_key,
                    kind_label(*kind),
                    message
                );
            }
        }
    }
}

fn status_line(status: &RunStatus) -> String {
    match status {
        RunStatus::Completed => "completed".to_string(),
        RunStatus::PartiallyCompleted => "partially completed".to_string(),
        RunStatus::Aborted => "stopped by user".to_string(),
        RunStatus::Failed(RunFailure::NeedsManualLogin) => "failed: login required".to_string(),
        RunStatus::Failed(RunFailure::SessionSetup { message }) => {
            format!("failed: {message}")
        }
    }
}

fn kind_label(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::NeedsLogin => "login required",
        FailureKind::LayoutChanged => "site layout changed",
        FailureKind::ElementMissing => "page element missing",
        FailureKind::Network => "network error",
        FailureKind::Timeout => "timed out",
        FailureKind::Other => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_item_args_with_quantities() {
        let deficits = parse_item_args(&["milk=2".to_string(), "eggs=1".to_string()]).unwrap();
        assert_eq!(deficits.len(), 2);
        assert_eq!(deficits[0].item_key, "milk");
        assert_eq!(deficits[0].quantity, 2);
        assert_eq!(deficits[1].item_key, "eggs");
        assert_eq!(deficits[1].quantity, 1);
    }

    #[test]
    fn test_parse_bare_key_defaults_to_one() {
        let deficits = parse_item_args(&["cheese".to_string()]).unwrap();
        assert_eq!(deficits[0].item_key, "cheese");
        assert_eq!(deficits[0].quantity, 1);
    }

    #[test]
    fn test_parse_rejects_bad_quantity() {
        assert!(parse_item_args(&["milk=two".to_string()]).is_err());
        assert!(parse_item_args(&["milk=".to_string()]).is_err());
    }

    #[test]
    fn test_parse_rejects_empty_key() {
        assert!(parse_item_args(&["=2".to_string()]).is_err());
    }

    #[test]
    fn test_zero_quantity_clamps_to_one() {
        let deficits = parse_item_args(&["milk=0".to_string()]).unwrap();
        assert_eq!(deficits[0].quantity, 1);
    }
}
