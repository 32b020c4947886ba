//! Product selection and history analysis.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Deserialize;
use tracing::{debug, warn};

use restock_protocols::{
    Deficit, EngineError, HistoryRecord, ItemCatalog, OrderDecision, Preference, ProductCandidate,
};

use crate::client::{Completion, ModelClient};
use crate::extract::{JsonShape, extract_json};

/// The engine's answer for one deficit. Choosing never fails: when the
/// model is unreachable or answers with garbage, the first candidate in
/// presentation order is used and `fallback` is set.
#[derive(Debug, Clone)]
pub struct Decision {
    pub decision: OrderDecision,
    pub fallback: bool,
    pub rationale: Option<String>,
}

/// Restock suggestions derived from consumption history.
#[derive(Debug, Clone, Default)]
pub struct HistoryAnalysis {
    pub suggestions: Vec<Deficit>,
    /// Reasoning trace for display when the model is a thinking variant;
    /// empty otherwise. Never parsed for suggestions.
    pub thinking: String,
}

/// Expected completion for a product choice: 1-based candidate number
/// plus a short justification.
#[derive(Debug, Deserialize)]
struct ChoiceReply {
    choice: i64,
    #[serde(default, alias = "rationale")]
    reason: Option<String>,
}

/// One entry of the expected history-analysis array.
#[derive(Debug, Deserialize)]
struct SuggestionReply {
    item: String,
    #[serde(default = "default_suggestion_quantity")]
    quantity: u32,
}

fn default_suggestion_quantity() -> u32 {
    1
}

/// Decision layer between resolved deficits and storefront carts.
pub struct DecisionEngine<C> {
    client: C,
}

impl<C: ModelClient> DecisionEngine<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Pick one candidate for `deficit`.
    ///
    /// Returns `None` only when `candidates` is empty. A single candidate
    /// is taken without consulting the model. Fixed-pack items are always
    /// ordered as one pack whatever the computed deficit says.
    pub async fn choose_product(
        &self,
        deficit: &Deficit,
        candidates: &[ProductCandidate],
        preference: &Preference,
        catalog: &ItemCatalog,
    ) -> Option<Decision> {
        if candidates.is_empty() {
            return None;
        }

        let quantity = if catalog.is_fixed_pack(&deficit.item_key) {
            1
        } else {
            deficit.quantity
        };

        if candidates.len() == 1 {
            debug!(item = %deficit.item_key, "Single candidate, skipping model call");
            return Some(Decision {
                decision: OrderDecision {
                    item_key: deficit.item_key.clone(),
                    candidate: candidates[0].clone(),
                    quantity,
                },
                fallback: false,
                rationale: None,
            });
        }

        let prompt = choice_prompt(
            catalog.search_term(&deficit.item_key),
            candidates,
            &preference.preference_text(),
        );

        let (index, fallback, rationale) = match self.client.complete(&prompt).await {
            Ok(completion) => match parse_choice(&completion, candidates.len()) {
                Ok((index, reason)) => (index, false, reason),
                Err(e) => {
                    warn!(item = %deficit.item_key, error = %e, "Unusable model choice, taking first candidate");
                    (0, true, None)
                }
            },
            Err(e) => {
                warn!(item = %deficit.item_key, error = %e, "Model call failed, taking first candidate");
                (0, true, None)
            }
        };

        Some(Decision {
            decision: OrderDecision {
                item_key: deficit.item_key.clone(),
                candidate: candidates[index].clone(),
                quantity,
            },
            fallback,
            rationale,
        })
    }

    /// Suggest restock items from past snapshots and the current detection.
    ///
    /// Empty history means nothing to reason over and no model call. Any
    /// model failure degrades to an empty suggestion list; the caller
    /// decides whether that is worth reporting.
    pub async fn analyze_history(
        &self,
        records: &[HistoryRecord],
        current: &BTreeMap<String, u32>,
    ) -> HistoryAnalysis {
        if records.is_empty() {
            return HistoryAnalysis::default();
        }

        let prompt = history_prompt(records, current);
        let completion = match self.client.complete(&prompt).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!(error = %e, "History analysis call failed");
                return HistoryAnalysis::default();
            }
        };

        let thinking = completion.reasoning.clone().unwrap_or_default();

        // Suggestions come from the visible completion only. A thinking
        // model's trace routinely sketches arrays it later rejects.
        let suggestions = match extract_json(&completion.content, JsonShape::Array) {
            Ok(value) => match serde_json::from_value::<Vec<SuggestionReply>>(value) {
                Ok(replies) => replies
                    .into_iter()
                    .filter(|reply| !reply.item.trim().is_empty())
                    .map(|reply| Deficit::new(reply.item, reply.quantity))
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "Suggestion array has unexpected shape");
                    Vec::new()
                }
            },
            Err(e) => {
                debug!(error = %e, "No suggestion array in completion");
                Vec::new()
            }
        };

        HistoryAnalysis { suggestions, thinking }
    }
}

fn parse_choice(
    completion: &Completion,
    candidate_count: usize,
) -> Result<(usize, Option<String>), EngineError> {
    let value = extract_json(&completion.content, JsonShape::Object)?;
    let reply: ChoiceReply =
        serde_json::from_value(value).map_err(|e| EngineError::Parse(e.to_string()))?;

    if reply.choice < 1 || reply.choice as usize > candidate_count {
        return Err(EngineError::Parse(format!(
            "choice {} out of range 1..={candidate_count}",
            reply.choice
        )));
    }

    let reason = reply.reason.filter(|r| !r.trim().is_empty());
    Ok(((reply.choice - 1) as usize, reason))
}

fn choice_prompt(search_term: &str, candidates: &[ProductCandidate], preference: &str) -> String {
    let mut listing = String::new();
    for (i, candidate) in candidates.iter().enumerate() {
        let _ = writeln!(listing, "{}. {} - {}", i + 1, candidate.title, candidate.price_text);
    }

    format!(
        "You are buying groceries on a Turkish storefront.\n\n\
         Search term: \"{search_term}\"\n\n\
         Products found:\n{listing}\n\
         Selection criteria: {preference}\n\n\
         Reply with only a JSON object: {{\"choice\": <number between 1 and {count}>, \
         \"reason\": \"<one short sentence>\"}}",
        count = candidates.len()
    )
}

fn history_prompt(records: &[HistoryRecord], current: &BTreeMap<String, u32>) -> String {
    // Records arrive newest first; the summary reads oldest to newest so
    // the model sees consumption as a forward timeline.
    let mut timeline = String::new();
    for record in records.iter().rev() {
        let _ = writeln!(timeline, "- {}: {}", record.date.format("%b %d"), items_line(&record.items));
    }

    format!(
        "Fridge contents detected over time, oldest first:\n{timeline}\n\
         Current detection: {}\n\n\
         Which items does this household normally keep that are now completely \
         absent? Ignore items that are merely lower than usual.\n\
         Reply with only a JSON array: [{{\"item\": \"<item_key>\", \"quantity\": <number>}}, ...]. \
         Reply with [] if nothing is missing.",
        items_line(current)
    )
}

fn items_line(items: &BTreeMap<String, u32>) -> String {
    if items.is_empty() {
        return "nothing detected".to_string();
    }
    items
        .iter()
        .map(|(key, count)| format!("{key} x{count}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
