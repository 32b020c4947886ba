//! The `history` subcommands: detection snapshot CRUD.

use std::collections::BTreeMap;

use chrono::Utc;

use restock_protocols::{DetectedItem, tally_detections};

use crate::cli::HistoryAction;
use crate::config::Config;
use crate::factory;

pub(crate) async fn handle_history_command(
    action: HistoryAction,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let journal = factory::open_journal(config).await?;

    match action {
        HistoryAction::List { limit, format } => {
            let records = journal.recent_snapshots(limit).await?;
            if records.is_empty() {
                println!("No snapshots saved.");
                return Ok(());
            }
            match format.as_str() {
                "json" => {
                    println!("{}", serde_json::to_string_pretty(&records)?);
                }
                _ => {
                    println!("{:<6} {:<12} {}", "ID", "DATE", "ITEMS");
                    println!("{}", "-".repeat(60));
                    for record in records {
                        let items = record
                            .items
                            .iter()
                            .map(|(key, count)| format!("{key}={count}"))
                            .collect::<Vec<_>>()
                            .join(", ");
                        println!("{:<6} {:<12} {}", record.id, record.date, items);
                    }
                }
            }
        }
        HistoryAction::Save { items, detections, date } => {
            let tally = match detections {
                Some(path) => {
                    let raw = tokio::fs::read_to_string(&path)
                        .await
                        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
                    let detected = parse_detections(&raw)?;
                    let preference = journal.preference().await?;
                    tally_detections(&detected, preference.detection_threshold)
                }
                None => parse_count_args(&items)?,
            };
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let id = journal.save_snapshot(date, tally).await?;
            println!("Saved snapshot {id} for {date}.");
        }
        HistoryAction::Delete { id } => {
            journal.delete_snapshot(id).await?;
            println!("Deleted snapshot {id}.");
        }
        HistoryAction::Clear => {
            let deleted = journal.clear_snapshots().await?;
            println!("Deleted {deleted} snapshot(s).");
        }
    }

    Ok(())
}

/// Parse detector output: a JSON array of detection records.
fn parse_detections(raw: &str) -> Result<Vec<DetectedItem>, Box<dyn std::error::Error>> {
    Ok(serde_json::from_str(raw).map_err(|e| format!("bad detections JSON: {e}"))?)
}

/// Parse `KEY=COUNT` pairs; a bare `KEY` counts as 1, and zero counts
/// are kept (they record that an item was seen absent).
fn parse_count_args(items: &[String]) -> Result<BTreeMap<String, u32>, Box<dyn std::error::Error>> {
    let mut tally = BTreeMap::new();
    for raw in items {
        let (key, count) = match raw.split_once('=') {
            Some((key, count)) => {
                let count: u32 = count
                    .parse()
                    .map_err(|_| format!("bad count in '{raw}' (want e.g. milk=2)"))?;
                (key, count)
            }
            None => (raw.as_str(), 1),
        };
        if key.is_empty() {
            return Err(format!("empty item key in '{raw}'").into());
        }
        tally.insert(key.to_string(), count);
    }
    Ok(tally)
}
