//! Detection history and user preference types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ProviderId;

/// One saved detection snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Journal-assigned id, unique and monotonically increasing.
    pub id: i64,
    /// The day the snapshot describes.
    pub date: NaiveDate,
    /// Per-class detected counts at that time.
    pub items: BTreeMap<String, u32>,
    pub created_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Whether `key` was present (count above zero) in this snapshot.
    pub fn had(&self, key: &str) -> bool {
        self.items.get(key).copied().unwrap_or(0) > 0
    }
}

/// How the engine should rank candidates when custom instructions say
/// nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    #[default]
    Cheapest,
    BestValue,
    Premium,
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::Cheapest => "cheapest",
            SelectionMode::BestValue => "best_value",
            SelectionMode::Premium => "premium",
        }
    }

    /// Stable token injected into engine prompts.
    pub fn prompt_token(&self) -> &'static str {
        match self {
            SelectionMode::Cheapest => "cheapest",
            SelectionMode::BestValue => "best value for money",
            SelectionMode::Premium => "premium quality",
        }
    }
}

impl std::str::FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cheapest" => Ok(SelectionMode::Cheapest),
            "best_value" | "best-value" => Ok(SelectionMode::BestValue),
            "premium" => Ok(SelectionMode::Premium),
            other => Err(format!("unknown selection mode: {other}")),
        }
    }
}

/// Singleton user preference record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    /// Free-text guidance appended to every product-selection prompt.
    #[serde(default)]
    pub custom_instructions: String,
    pub preferred_provider: ProviderId,
    /// Minimum detector confidence for a detection to count.
    pub detection_threshold: f32,
    pub selection_mode: SelectionMode,
}

impl Default for Preference {
    fn default() -> Self {
        Self {
            custom_instructions: String::new(),
            preferred_provider: ProviderId::Getir,
            detection_threshold: 0.4,
            selection_mode: SelectionMode::Cheapest,
        }
    }
}

impl Preference {
    /// Text handed to the decision engine: the mode token first, then any
    /// custom instructions.
    pub fn preference_text(&self) -> String {
        let instructions = self.custom_instructions.trim();
        if instructions.is_empty() {
            format!("Prefer the {} option.", self.selection_mode.prompt_token())
        } else {
            format!(
                "Prefer the {} option. {}",
                self.selection_mode.prompt_token(),
                instructions
            )
        }
    }

    /// Applies a partial update; `None` fields keep their value.
    pub fn apply(&mut self, patch: PreferencePatch) {
        if let Some(instructions) = patch.custom_instructions {
            self.custom_instructions = instructions;
        }
        if let Some(provider) = patch.preferred_provider {
            self.preferred_provider = provider;
        }
        if let Some(threshold) = patch.detection_threshold {
            self.detection_threshold = threshold;
        }
        if let Some(mode) = patch.selection_mode {
            self.selection_mode = mode;
        }
    }
}

/// Partial update for the preference record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferencePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_provider: Option<ProviderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_threshold: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection_mode: Option<SelectionMode>,
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
