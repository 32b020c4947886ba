use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use restock_protocols::EngineError;

use super::*;

/// Model that replays canned answers and records every prompt it saw.
struct ScriptedModel {
    replies: Mutex<VecDeque<Result<Completion, EngineError>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Result<Completion, EngineError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn prompts_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.prompts)
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<Completion, EngineError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(EngineError::EmptyCompletion))
    }
}

fn candidates(titles: &[&str]) -> Vec<ProductCandidate> {
    titles
        .iter()
        .enumerate()
        .map(|(i, title)| ProductCandidate {
            title: title.to_string(),
            price: Some(10.0 + i as f64),
            price_text: format!("₺{},00", 10 + i),
            unit_price: None,
            handle: format!("card-{i}"),
            raw_index: i,
        })
        .collect()
}

fn record(id: i64, ymd: (i32, u32, u32), items: &[(&str, u32)]) -> HistoryRecord {
    HistoryRecord {
        id,
        date: NaiveDate::from_ymd_opt(ymd.0, ymd.1, ymd.2).unwrap(),
        items: items.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_choose_respects_model_choice() {
    let model = ScriptedModel::new(vec![Ok(Completion::plain(
        r#"{"choice": 2, "reason": "cheapest per liter"}"#,
    ))]);
    let engine = DecisionEngine::new(model);

    let items = candidates(&["Süt A 1L", "Süt B 1L", "Süt C 1L"]);
    let decision = engine
        .choose_product(
            &Deficit::new("milk", 2),
            &items,
            &Preference::default(),
            &ItemCatalog::standard(),
        )
        .await
        .unwrap();

    assert_eq!(decision.decision.candidate.raw_index, 1);
    assert_eq!(decision.decision.quantity, 2);
    assert!(!decision.fallback);
    assert_eq!(decision.rationale.as_deref(), Some("cheapest per liter"));
}

#[tokio::test]
async fn test_choose_malformed_reply_falls_back_to_first() {
    let model = ScriptedModel::new(vec![Ok(Completion::plain(
        "I would probably take the second one, it looks fine.",
    ))]);
    let engine = DecisionEngine::new(model);

    let items = candidates(&["Süt A", "Süt B"]);
    let decision = engine
        .choose_product(
            &Deficit::new("milk", 1),
            &items,
            &Preference::default(),
            &ItemCatalog::standard(),
        )
        .await
        .unwrap();

    assert_eq!(decision.decision.candidate.raw_index, 0);
    assert!(decision.fallback);
    assert!(decision.rationale.is_none());
}

#[tokio::test]
async fn test_choose_out_of_range_falls_back() {
    let model = ScriptedModel::new(vec![Ok(Completion::plain(r#"{"choice": 7}"#))]);
    let engine = DecisionEngine::new(model);

    let items = candidates(&["A", "B", "C"]);
    let decision = engine
        .choose_product(
            &Deficit::new("milk", 1),
            &items,
            &Preference::default(),
            &ItemCatalog::standard(),
        )
        .await
        .unwrap();

    assert_eq!(decision.decision.candidate.raw_index, 0);
    assert!(decision.fallback);
}

#[tokio::test]
async fn test_choose_zero_is_out_of_range() {
    let model = ScriptedModel::new(vec![Ok(Completion::plain(r#"{"choice": 0}"#))]);
    let engine = DecisionEngine::new(model);

    let items = candidates(&["A", "B"]);
    let decision = engine
        .choose_product(
            &Deficit::new("milk", 1),
            &items,
            &Preference::default(),
            &ItemCatalog::standard(),
        )
        .await
        .unwrap();

    assert!(decision.fallback);
    assert_eq!(decision.decision.candidate.raw_index, 0);
}

#[tokio::test]
async fn test_choose_model_error_falls_back() {
    let model = ScriptedModel::new(vec![Err(EngineError::Api {
        status: 503,
        message: "overloaded".to_string(),
    })]);
    let engine = DecisionEngine::new(model);

    let items = candidates(&["A", "B"]);
    let decision = engine
        .choose_product(
            &Deficit::new("milk", 1),
            &items,
            &Preference::default(),
            &ItemCatalog::standard(),
        )
        .await
        .unwrap();

    assert_eq!(decision.decision.candidate.raw_index, 0);
    assert!(decision.fallback);
}

#[tokio::test]
async fn test_choose_single_candidate_skips_model() {
    let model = ScriptedModel::new(vec![]);
    let prompts = model.prompts_handle();
    let engine = DecisionEngine::new(model);

    let items = candidates(&["Only option"]);
    let decision = engine
        .choose_product(
            &Deficit::new("milk", 3),
            &items,
            &Preference::default(),
            &ItemCatalog::standard(),
        )
        .await
        .unwrap();

    assert!(prompts.lock().unwrap().is_empty());
    assert!(!decision.fallback);
    assert_eq!(decision.decision.quantity, 3);
}

#[tokio::test]
async fn test_choose_empty_candidates_is_none() {
    let engine = DecisionEngine::new(ScriptedModel::new(vec![]));
    let decision = engine
        .choose_product(
            &Deficit::new("milk", 1),
            &[],
            &Preference::default(),
            &ItemCatalog::standard(),
        )
        .await;
    assert!(decision.is_none());
}

#[tokio::test]
async fn test_choose_fixed_pack_orders_one() {
    let model = ScriptedModel::new(vec![Ok(Completion::plain(r#"{"choice": 2}"#))]);
    let engine = DecisionEngine::new(model);

    let items = candidates(&["Yumurta 10'lu", "Yumurta 15'li"]);
    let decision = engine
        .choose_product(
            &Deficit::new("eggs", 2),
            &items,
            &Preference::default(),
            &ItemCatalog::standard(),
        )
        .await
        .unwrap();

    assert_eq!(decision.decision.quantity, 1);
    assert_eq!(decision.decision.candidate.raw_index, 1);
}

#[tokio::test]
async fn test_choose_prompt_lists_candidates_and_preference() {
    let model = ScriptedModel::new(vec![Ok(Completion::plain(r#"{"choice": 1}"#))]);
    let prompts = model.prompts_handle();
    let engine = DecisionEngine::new(model);

    let mut preference = Preference::default();
    preference.custom_instructions = "No flavored milk.".to_string();

    let items = candidates(&["Süt A", "Süt B"]);
    engine
        .choose_product(
            &Deficit::new("milk", 1),
            &items,
            &preference,
            &ItemCatalog::standard(),
        )
        .await
        .unwrap();

    let recorded = prompts.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    let prompt = &recorded[0];
    assert!(prompt.contains("\"Süt\""));
    assert!(prompt.contains("1. Süt A"));
    assert!(prompt.contains("2. Süt B"));
    assert!(prompt.contains("Prefer the cheapest option."));
    assert!(prompt.contains("No flavored milk."));
    assert!(prompt.contains("between 1 and 2"));
}

#[tokio::test]
async fn test_choose_fenced_reply_is_parsed() {
    let model = ScriptedModel::new(vec![Ok(Completion::plain(
        "```json\n{\"choice\": 2, \"reason\": \"larger bottle\"}\n```",
    ))]);
    let engine = DecisionEngine::new(model);

    let items = candidates(&["A", "B"]);
    let decision = engine
        .choose_product(
            &Deficit::new("water_bottle", 2),
            &items,
            &Preference::default(),
            &ItemCatalog::standard(),
        )
        .await
        .unwrap();

    assert!(!decision.fallback);
    assert_eq!(decision.decision.candidate.raw_index, 1);
}

#[tokio::test]
async fn test_choose_rationale_field_alias() {
    let model = ScriptedModel::new(vec![Ok(Completion::plain(
        r#"{"choice": 1, "rationale": "fits the brief"}"#,
    ))]);
    let engine = DecisionEngine::new(model);

    let items = candidates(&["A", "B"]);
    let decision = engine
        .choose_product(
            &Deficit::new("milk", 1),
            &items,
            &Preference::default(),
            &ItemCatalog::standard(),
        )
        .await
        .unwrap();

    assert_eq!(decision.rationale.as_deref(), Some("fits the brief"));
}

#[tokio::test]
async fn test_history_empty_records_skips_model() {
    let model = ScriptedModel::new(vec![]);
    let prompts = model.prompts_handle();
    let engine = DecisionEngine::new(model);

    let analysis = engine.analyze_history(&[], &BTreeMap::new()).await;

    assert!(analysis.suggestions.is_empty());
    assert!(analysis.thinking.is_empty());
    assert!(prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_history_parses_suggestions() {
    let model = ScriptedModel::new(vec![Ok(Completion::plain(
        r#"Missing: [{"item": "milk", "quantity": 2}, {"item": "eggs", "quantity": 1}]"#,
    ))]);
    let engine = DecisionEngine::new(model);

    let records = vec![record(2, (2025, 12, 18), &[("milk", 2)]), record(1, (2025, 12, 16), &[("milk", 1)])];
    let analysis = engine.analyze_history(&records, &BTreeMap::new()).await;

    assert_eq!(analysis.suggestions.len(), 2);
    assert_eq!(analysis.suggestions[0], Deficit::new("milk", 2));
    assert_eq!(analysis.suggestions[1], Deficit::new("eggs", 1));
}

#[tokio::test]
async fn test_history_array_in_trace_is_ignored() {
    let model = ScriptedModel::new(vec![Ok(Completion::with_reasoning(
        "Nothing seems to be fully gone.",
        r#"Let me draft [{"item": "milk", "quantity": 1}]... no, milk is still there."#,
    ))]);
    let engine = DecisionEngine::new(model);

    let records = vec![record(1, (2025, 12, 16), &[("milk", 1)])];
    let analysis = engine.analyze_history(&records, &BTreeMap::new()).await;

    assert!(analysis.suggestions.is_empty());
    assert!(analysis.thinking.contains("draft"));
}

#[tokio::test]
async fn test_history_model_failure_is_empty_analysis() {
    let model = ScriptedModel::new(vec![Err(EngineError::Timeout(60))]);
    let engine = DecisionEngine::new(model);

    let records = vec![record(1, (2025, 12, 16), &[("milk", 1)])];
    let analysis = engine.analyze_history(&records, &BTreeMap::new()).await;

    assert!(analysis.suggestions.is_empty());
    assert!(analysis.thinking.is_empty());
}

#[tokio::test]
async fn test_history_wrong_entry_shape_is_empty() {
    let model = ScriptedModel::new(vec![Ok(Completion::plain(
        r#"[{"name": "milk", "qty": 1}]"#,
    ))]);
    let engine = DecisionEngine::new(model);

    let records = vec![record(1, (2025, 12, 16), &[("milk", 1)])];
    let analysis = engine.analyze_history(&records, &BTreeMap::new()).await;

    assert!(analysis.suggestions.is_empty());
}

#[tokio::test]
async fn test_history_quantity_defaults_and_clamps() {
    let model = ScriptedModel::new(vec![Ok(Completion::plain(
        r#"[{"item": "milk"}, {"item": "eggs", "quantity": 0}]"#,
    ))]);
    let engine = DecisionEngine::new(model);

    let records = vec![record(1, (2025, 12, 16), &[("milk", 1), ("eggs", 6)])];
    let analysis = engine.analyze_history(&records, &BTreeMap::new()).await;

    assert_eq!(analysis.suggestions[0], Deficit::new("milk", 1));
    assert_eq!(analysis.suggestions[1], Deficit::new("eggs", 1));
}

#[tokio::test]
async fn test_history_prompt_reads_oldest_to_newest() {
    let model = ScriptedModel::new(vec![Ok(Completion::plain("[]"))]);
    let prompts = model.prompts_handle();
    let engine = DecisionEngine::new(model);

    // Newest first, the way the journal returns them.
    let records = vec![
        record(3, (2025, 12, 18), &[("milk", 2), ("eggs", 6)]),
        record(2, (2025, 12, 16), &[("milk", 1)]),
    ];
    let mut current = BTreeMap::new();
    current.insert("eggs".to_string(), 3_u32);

    engine.analyze_history(&records, &current).await;

    let recorded = prompts.lock().unwrap();
    let prompt = &recorded[0];
    let older = prompt.find("Dec 16").unwrap();
    let newer = prompt.find("Dec 18").unwrap();
    assert!(older < newer);
    assert!(prompt.contains("eggs x6, milk x2"));
    assert!(prompt.contains("Current detection: eggs x3"));
}

#[tokio::test]
async fn test_history_blank_item_keys_are_dropped() {
    let model = ScriptedModel::new(vec![Ok(Completion::plain(
        r#"[{"item": "  ", "quantity": 2}, {"item": "milk", "quantity": 1}]"#,
    ))]);
    let engine = DecisionEngine::new(model);

    let records = vec![record(1, (2025, 12, 16), &[("milk", 1)])];
    let analysis = engine.analyze_history(&records, &BTreeMap::new()).await;

    assert_eq!(analysis.suggestions.len(), 1);
    assert_eq!(analysis.suggestions[0].item_key, "milk");
}
