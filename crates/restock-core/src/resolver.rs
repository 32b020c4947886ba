//! Deficit resolution: decide what is missing and how much to order.
//!
//! Pure functions over the current detection tally. Two sources of
//! truth are supported: a fixed per-item baseline ("always keep two
//! milks") and the detection history ("milk was stocked before and is
//! gone now"). Neither touches a browser or the model.

use std::collections::BTreeMap;

use tracing::debug;

use restock_protocols::{Deficit, HistoryRecord, ItemCatalog};

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;

/// Where the resolver draws its notion of "normally stocked" from.
#[derive(Debug, Clone, Copy)]
pub enum ResolutionSource<'a> {
    /// Fixed per-item minimums. Anything counted below its minimum is a
    /// deficit of the difference.
    Baseline(&'a BTreeMap<String, u32>),
    /// Prior detection snapshots, most recent first. An item is a
    /// deficit only when some snapshot stocked it and the current
    /// detection has none at all.
    History(&'a [HistoryRecord]),
}

/// Compute the deficits between `current` detections and `source`.
///
/// Output order is deterministic: baseline mode follows the baseline's
/// key order, history mode the first-seen order across records.
/// Fixed-pack items resolve to a single pack regardless of the
/// computed shortfall.
pub fn resolve(
    current: &BTreeMap<String, u32>,
    source: ResolutionSource<'_>,
    catalog: &ItemCatalog,
) -> Vec<Deficit> {
    let deficits = match source {
        ResolutionSource::Baseline(baseline) => from_baseline(current, baseline, catalog),
        ResolutionSource::History(records) => from_history(current, records),
    };
    debug!(count = deficits.len(), "Resolved deficits");
    deficits
}

fn from_baseline(
    current: &BTreeMap<String, u32>,
    baseline: &BTreeMap<String, u32>,
    catalog: &ItemCatalog,
) -> Vec<Deficit> {
    baseline
        .iter()
        .filter_map(|(key, &required)| {
            let have = current.get(key).copied().unwrap_or(0);
            if have >= required {
                return None;
            }
            let quantity = if catalog.is_fixed_pack(key) {
                1
            } else {
                required - have
            };
            Some(Deficit::new(key.clone(), quantity))
        })
        .collect()
}

/// History mode reports an item only when it is completely gone: a
/// count that merely dropped (two milks down to one) is not a deficit.
/// Suggested quantity is always one; the history says nothing about
/// how many to buy.
fn from_history(current: &BTreeMap<String, u32>, records: &[HistoryRecord]) -> Vec<Deficit> {
    let mut stocked_before: Vec<&str> = Vec::new();
    for record in records {
        for key in record.items.keys() {
            if record.had(key) && !stocked_before.contains(&key.as_str()) {
                stocked_before.push(key);
            }
        }
    }

    stocked_before
        .into_iter()
        .filter(|key| current.get(*key).copied().unwrap_or(0) == 0)
        .map(|key| Deficit::new(key, 1))
        .collect()
}
