use super::*;
use chrono::TimeZone;

fn record(id: i64, items: &[(&str, u32)]) -> HistoryRecord {
    HistoryRecord {
        id,
        date: NaiveDate::from_ymd_opt(2025, 12, 18).unwrap(),
        items: items
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect(),
        created_at: Utc.with_ymd_and_hms(2025, 12, 18, 9, 30, 0).unwrap(),
    }
}

#[test]
fn test_had_requires_nonzero_count() {
    let rec = record(1, &[("milk", 2), ("eggs", 0)]);
    assert!(rec.had("milk"));
    assert!(!rec.had("eggs"));
    assert!(!rec.had("cheese"));
}

#[test]
fn test_preference_text_mode_only() {
    let pref = Preference::default();
    assert_eq!(pref.preference_text(), "Prefer the cheapest option.");
}

#[test]
fn test_preference_text_appends_instructions() {
    let pref = Preference {
        custom_instructions: "Lactose-free milk only.".to_string(),
        selection_mode: SelectionMode::Premium,
        ..Preference::default()
    };
    assert_eq!(
        pref.preference_text(),
        "Prefer the premium quality option. Lactose-free milk only."
    );
}

#[test]
fn test_preference_text_trims_whitespace_instructions() {
    let pref = Preference {
        custom_instructions: "   ".to_string(),
        ..Preference::default()
    };
    assert_eq!(pref.preference_text(), "Prefer the cheapest option.");
}

#[test]
fn test_patch_applies_only_set_fields() {
    let mut pref = Preference::default();
    pref.apply(PreferencePatch {
        selection_mode: Some(SelectionMode::BestValue),
        ..PreferencePatch::default()
    });
    assert_eq!(pref.selection_mode, SelectionMode::BestValue);
    assert_eq!(pref.preferred_provider, ProviderId::Getir);
    assert!((pref.detection_threshold - 0.4).abs() < f32::EPSILON);
}

#[test]
fn test_patch_full_update() {
    let mut pref = Preference::default();
    pref.apply(PreferencePatch {
        custom_instructions: Some("No plastic bottles.".to_string()),
        preferred_provider: Some(ProviderId::Migros),
        detection_threshold: Some(0.6),
        selection_mode: Some(SelectionMode::Premium),
    });
    assert_eq!(pref.preferred_provider, ProviderId::Migros);
    assert_eq!(pref.custom_instructions, "No plastic bottles.");
    assert!((pref.detection_threshold - 0.6).abs() < f32::EPSILON);
}

#[test]
fn test_selection_mode_parse() {
    assert_eq!(
        "best-value".parse::<SelectionMode>().unwrap(),
        SelectionMode::BestValue
    );
    assert!("fanciest".parse::<SelectionMode>().is_err());
}

#[test]
fn test_selection_mode_as_str_round_trip() {
    for mode in [
        SelectionMode::Cheapest,
        SelectionMode::BestValue,
        SelectionMode::Premium,
    ] {
        let parsed: SelectionMode = mode.as_str().parse().unwrap();
        assert_eq!(parsed, mode);
    }
}

#[test]
fn test_history_record_serde_round_trip() {
    let rec = record(7, &[("milk", 1)]);
    let json = serde_json::to_string(&rec).unwrap();
    let back: HistoryRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, rec);
}
