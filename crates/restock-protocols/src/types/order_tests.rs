use super::*;

fn candidate(title: &str, index: usize) -> ProductCandidate {
    ProductCandidate {
        title: title.to_string(),
        price: Some(42.5),
        price_text: "₺42,50".to_string(),
        unit_price: None,
        handle: format!("card-{index}"),
        raw_index: index,
    }
}

#[test]
fn test_provider_id_round_trip() {
    for provider in ProviderId::ALL {
        let parsed: ProviderId = provider.as_str().parse().unwrap();
        assert_eq!(parsed, provider);
    }
}

#[test]
fn test_provider_id_parse_is_case_insensitive() {
    let parsed: ProviderId = "Migros".parse().unwrap();
    assert_eq!(parsed, ProviderId::Migros);
}

#[test]
fn test_provider_id_parse_unknown() {
    let result: Result<ProviderId, _> = "carrefour".parse();
    assert!(result.is_err());
}

#[test]
fn test_provider_id_serde_lowercase() {
    let json = serde_json::to_string(&ProviderId::Getir).unwrap();
    assert_eq!(json, "\"getir\"");
}

#[test]
fn test_deficit_quantity_is_clamped_to_one() {
    let deficit = Deficit::new("milk", 0);
    assert_eq!(deficit.quantity, 1);
}

#[test]
fn test_item_outcome_serde_tag() {
    let outcome = ItemOutcome::Added {
        title: "Süt 1L".to_string(),
        quantity: 2,
        fallback_used: false,
    };
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["outcome"], "added");
    assert_eq!(json["quantity"], 2);
}

#[test]
fn test_item_result_flattens_outcome() {
    let result = ItemResult {
        item_key: "milk".to_string(),
        requested_quantity: 1,
        outcome: ItemOutcome::NoCandidates,
    };
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["item_key"], "milk");
    assert_eq!(json["outcome"], "no_candidates");
}

#[test]
fn test_run_status_failed_serde() {
    let status = RunStatus::Failed(RunFailure::NeedsManualLogin);
    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["status"], "failed");
    assert_eq!(json["reason"], "needs_manual_login");
}

#[test]
fn test_added_count() {
    let result = OrderRunResult {
        run_id: "r1".to_string(),
        provider: ProviderId::Akbal,
        status: RunStatus::PartiallyCompleted,
        items: vec![
            ItemResult {
                item_key: "milk".to_string(),
                requested_quantity: 1,
                outcome: ItemOutcome::Added {
                    title: "Süt".to_string(),
                    quantity: 1,
                    fallback_used: true,
                },
            },
            ItemResult {
                item_key: "eggs".to_string(),
                requested_quantity: 1,
                outcome: ItemOutcome::Failed {
                    kind: FailureKind::Timeout,
                    message: "cart badge never settled".to_string(),
                },
            },
        ],
    };
    assert_eq!(result.added_count(), 1);
}

#[test]
fn test_candidate_round_trip() {
    let c = candidate("Süt 1L", 3);
    let json = serde_json::to_string(&c).unwrap();
    let back: ProductCandidate = serde_json::from_str(&json).unwrap();
    assert_eq!(back, c);
    assert_eq!(back.raw_index, 3);
}

#[test]
fn test_parse_price_symbol_and_comma() {
    assert_eq!(parse_price_text("₺129,90"), Some(129.90));
    assert_eq!(parse_price_text("₺12,5"), Some(12.5));
}

#[test]
fn test_parse_price_thousands_groups() {
    assert_eq!(parse_price_text("1.299,00 TL"), Some(1299.0));
    assert_eq!(parse_price_text("1.299"), Some(1299.0));
    assert_eq!(parse_price_text("2.149.500"), Some(2149500.0));
}

#[test]
fn test_parse_price_plain_formats() {
    assert_eq!(parse_price_text("129.90"), Some(129.90));
    assert_eq!(parse_price_text("45"), Some(45.0));
}

#[test]
fn test_parse_price_no_digits() {
    assert_eq!(parse_price_text("Sepete Ekle"), None);
    assert_eq!(parse_price_text(""), None);
    assert_eq!(parse_price_text("₺"), None);
}

#[test]
fn test_parse_price_trailing_separator() {
    assert_eq!(parse_price_text("12,"), Some(12.0));
}

#[test]
fn test_from_scraped_derives_price() {
    let c = ProductCandidate::from_scraped("Süt 1L", "₺42,50", "Süt 1L", 0);
    assert_eq!(c.price, Some(42.5));
    assert_eq!(c.price_text, "₺42,50");
    assert!(c.unit_price.is_none());
}

#[test]
fn test_from_scraped_unparseable_price_is_none() {
    let c = ProductCandidate::from_scraped("Süt 1L", "fiyat yok", "Süt 1L", 2);
    assert_eq!(c.price, None);
    assert_eq!(c.raw_index, 2);
}
