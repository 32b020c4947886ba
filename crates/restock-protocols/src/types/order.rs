//! Ordering pipeline types: deficits, candidates, decisions and run results.

use serde::{Deserialize, Serialize};

/// Closed set of supported storefront providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Getir,
    Migros,
    Akbal,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::Getir, ProviderId::Migros, ProviderId::Akbal];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Getir => "getir",
            ProviderId::Migros => "migros",
            ProviderId::Akbal => "akbal",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "getir" => Ok(ProviderId::Getir),
            "migros" => Ok(ProviderId::Migros),
            "akbal" => Ok(ProviderId::Akbal),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// One missing item the pipeline should restock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deficit {
    /// Catalog key of the missing item.
    pub item_key: String,
    /// Units to add to the cart. Always at least 1.
    pub quantity: u32,
}

impl Deficit {
    pub fn new(item_key: impl Into<String>, quantity: u32) -> Self {
        Self {
            item_key: item_key.into(),
            quantity: quantity.max(1),
        }
    }
}

/// A purchasable product scraped from a storefront results page.
///
/// Candidates are ephemeral: `handle` and `raw_index` are only meaningful
/// against the results page they were scraped from, inside the same session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCandidate {
    pub title: String,
    /// Parsed price in the storefront currency, when the page exposed one.
    pub price: Option<f64>,
    /// Raw price text as rendered, e.g. `₺129,90`.
    pub price_text: String,
    /// Per-measure price when shown (e.g. per liter), for value comparisons.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    /// Provider-scoped locator for the candidate's card on the results page.
    pub handle: String,
    /// Zero-based position in the results as presented.
    pub raw_index: usize,
}

impl ProductCandidate {
    /// Build a candidate from scraped card text, deriving `price` from the
    /// raw price text when it is parseable.
    pub fn from_scraped(
        title: impl Into<String>,
        price_text: impl Into<String>,
        handle: impl Into<String>,
        raw_index: usize,
    ) -> Self {
        let price_text = price_text.into();
        Self {
            title: title.into(),
            price: parse_price_text(&price_text),
            price_text,
            unit_price: None,
            handle: handle.into(),
            raw_index,
        }
    }
}

/// Parse a Turkish-formatted price out of storefront text.
///
/// Handles `₺129,90`, `1.299,00 TL` and plain `129.90`: the last
/// separator is the decimal point when one or two digits follow it,
/// otherwise it groups thousands. Returns `None` when the text holds
/// no digits.
pub fn parse_price_text(text: &str) -> Option<f64> {
    let mut run = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() || ((c == '.' || c == ',') && !run.is_empty()) {
            run.push(c);
        } else if !run.is_empty() {
            break;
        }
    }
    let run = run.trim_end_matches(['.', ',']);
    if run.is_empty() {
        return None;
    }

    let normalized = match run.rfind(['.', ',']) {
        None => run.to_string(),
        Some(pos) => {
            let head: String = run[..pos].chars().filter(char::is_ascii_digit).collect();
            let tail = &run[pos + 1..];
            if tail.len() <= 2 {
                format!("{head}.{tail}")
            } else {
                format!("{head}{tail}")
            }
        }
    };
    normalized.parse().ok()
}

/// The decision engine's resolved choice for one deficit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDecision {
    pub item_key: String,
    pub candidate: ProductCandidate,
    pub quantity: u32,
}

/// Kinds of per-item failure surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NeedsLogin,
    LayoutChanged,
    ElementMissing,
    Network,
    Timeout,
    Other,
}

/// Terminal outcome for one requested deficit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// The item landed in the cart.
    Added {
        title: String,
        quantity: u32,
        /// True when the engine fell back to the first candidate instead of
        /// a model-ranked choice.
        fallback_used: bool,
    },
    /// The search returned no candidates; nothing was ordered.
    NoCandidates,
    /// The item could not be added; the run moved on to the next item.
    Failed { kind: FailureKind, message: String },
}

/// Result row for one deficit in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub item_key: String,
    pub requested_quantity: u32,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

/// Why a run failed before any item was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RunFailure {
    /// The provider wants a human to complete its login flow first.
    NeedsManualLogin,
    /// Browser or navigation failure while opening the session.
    SessionSetup { message: String },
}

/// Terminal state of an ordering run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every requested item was added (vacuously true for zero deficits).
    Completed,
    /// At least one item could not be added.
    PartiallyCompleted,
    /// The run never got a usable session; no items were attempted.
    Failed(RunFailure),
    /// Cancelled between items; unattempted items are absent from the report.
    Aborted,
}

/// Full report of one ordering run against a single provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRunResult {
    pub run_id: String,
    pub provider: ProviderId,
    pub status: RunStatus,
    pub items: Vec<ItemResult>,
}

impl OrderRunResult {
    /// How many items actually landed in the cart.
    pub fn added_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item.outcome, ItemOutcome::Added { .. }))
            .count()
    }
}

#[cfg(test)]
#[path = "order_tests.rs"]
mod tests;
