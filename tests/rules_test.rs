//! Rule document integration tests.
//!
//! Parses rule documents as they appear on disk and checks lookup order,
//! error reporting and condition evaluation against whole profiles.

use profileforge_common::{Document, Error};
use profileforge_rules::{evaluate, Condition, Lookup, RuleSet, SourceKind};
use serde_json::json;

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[test]
fn test_fixture_document_parses() {
    let rules = RuleSet::from_json(include_str!("fixtures/rules.json")).unwrap();

    assert_eq!(rules.len(), 8);
    assert_eq!(rules.dummy_rules().count(), 2);
    assert!(rules.has_rules_for("size"));
    assert!(!rules.has_rules_for("notify"));

    let names: Vec<&str> = rules.transform_names().into_iter().collect();
    assert_eq!(names, vec!["audio_volume_format", "profile_map"]);

    let size = rules.rules_for("size").next().unwrap();
    assert_eq!(size.source.kind, SourceKind::Scalar);
    assert_eq!(size.targets.len(), 2);
    assert_eq!(size.source.pattern.as_ref().unwrap().as_str(), "(\\d+)x(\\d+)");
}

#[test]
fn test_rules_for_same_path_keep_document_order() {
    let rules = RuleSet::from_value(&json!({
        "rules": [
            {"source": {"path": "bitrate"}, "target": {"path": "Settings.A"}},
            {"source": {"path": "size"}, "target": {"path": "Settings.B"}},
            {"source": {"path": "bitrate"}, "target": {"path": "Settings.C"}}
        ]
    }))
    .unwrap();

    let targets: Vec<&str> = rules
        .rules_for("bitrate")
        .map(|r| r.targets[0].path.as_str())
        .collect();
    assert_eq!(targets, vec!["Settings.A", "Settings.C"]);
    assert_eq!(rules.rules_for("framerate").count(), 0);
}

#[test]
fn test_invalid_rule_reports_its_index() {
    let err = RuleSet::from_value(&json!({
        "rules": [
            {"source": {"path": "size"}, "target": {"path": "Settings.A"}},
            {"source": {"path": "bitrate", "regex": "(unclosed"}, "target": {"path": "Settings.B"}}
        ]
    }))
    .unwrap_err();

    match err {
        Error::InvalidRule { index, path, .. } => {
            assert_eq!(index, 1);
            assert_eq!(path, "bitrate");
        }
        other => panic!("expected InvalidRule, got {:?}", other),
    }
}

#[test]
fn test_malformed_documents_rejected() {
    assert!(matches!(
        RuleSet::from_value(&json!([])),
        Err(Error::RuleDocument(_))
    ));
    assert!(matches!(
        RuleSet::from_value(&json!({"transformers": {}})),
        Err(Error::RuleDocument(_))
    ));
    assert!(RuleSet::from_value(&json!({
        "rules": [{"source": {"path": "size"}}]
    }))
    .is_err());
    assert!(RuleSet::from_json("{not json").is_err());
}

#[test]
fn test_transformer_tables_lookup() {
    let rules = RuleSet::from_json(include_str!("fixtures/rules.json")).unwrap();
    let tables = rules.transformers();

    assert_eq!(
        tables.lookup("profile_map", &json!("main")),
        Lookup::Hit(&json!("MAIN"))
    );
    assert_eq!(tables.lookup("profile_map", &json!("extended")), Lookup::Miss);
    assert_eq!(tables.lookup("level_map", &json!("4.1")), Lookup::NoTable);
}

// ---------------------------------------------------------------------------
// Conditions against whole profiles
// ---------------------------------------------------------------------------

fn condition(value: serde_json::Value) -> Condition {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_condition_reads_other_source_fields() {
    let profile = Document::from_value(json!({
        "output": "advanced_hls",
        "bitrate": "2500k",
        "size": "1280x720",
        "audio_codec": "dolby_heaac"
    }))
    .unwrap();

    let hls_and_he = condition(json!({
        "operator": "AND",
        "conditions": [
            {"operator": "in", "value": ["advanced_hls", "fmp4_hls"], "source_path": "output"},
            {"operator": "contains", "value": "heaac", "source_path": "audio_codec"}
        ]
    }));
    assert!(evaluate(&hls_and_he, None, &profile));

    let not_dash = condition(json!({
        "operator": "NOT",
        "condition": {"operator": "eq", "value": "advanced_dash", "source_path": "output"}
    }));
    assert!(evaluate(&not_dash, None, &profile));

    let has_framerate = condition(json!({"operator": "exists", "source_path": "framerate"}));
    assert!(!evaluate(&has_framerate, None, &profile));
}

#[test]
fn test_unknown_operator_is_false() {
    let profile = Document::from_value(json!({"size": "1280x720"})).unwrap();
    let odd = condition(json!({"operator": "matches", "value": "\\d+x\\d+"}));
    assert!(!evaluate(&odd, Some(&json!("1280x720")), &profile));

    let negated = condition(json!({"operator": "NOT", "condition": {"operator": "matches"}}));
    assert!(evaluate(&negated, Some(&json!("1280x720")), &profile));
}
