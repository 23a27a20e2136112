use async_trait::async_trait;
use std::sync::Arc;

use dedup::{DedupConfig, Deduplicator, LinkMode};
use extract::{CompletionRequest, LanguageModel};
use model::{EntityRecord, Provenance, Relationship};

struct Reply(Option<&'static str>);

#[async_trait]
impl LanguageModel for Reply {
    async fn complete(&self, _request: &CompletionRequest) -> Option<String> {
        self.0.map(str::to_string)
    }
}

fn entities() -> Vec<EntityRecord> {
    vec![
        EntityRecord::new("A", Some("Concept".into())),
        EntityRecord::new("B", Some("Concept".into())),
    ]
}

fn causes_and_leads_to(entities: &[EntityRecord]) -> Vec<Relationship> {
    vec![
        Relationship::new(entities[0].id.clone(), "causes", entities[1].id.clone(), Provenance::Explicit),
        Relationship::new(entities[0].id.clone(), "leads_to", entities[1].id.clone(), Provenance::Implicit),
    ]
}

fn dedup(reply: Option<&'static str>, semantic: bool, mode: LinkMode) -> Deduplicator {
    Deduplicator::new(
        Some(Arc::new(Reply(reply))),
        DedupConfig {
            semantic,
            mode,
            ..DedupConfig::default()
        },
    )
}

#[tokio::test]
async fn test_different_predicates_survive_without_semantic_stage() {
    let entities = entities();
    let (kept, stats) = dedup(Some(r#"{"kept": [0]}"#), false, LinkMode::Extraction)
        .deduplicate(causes_and_leads_to(&entities), &entities)
        .await;
    assert_eq!(kept.len(), 2);
    assert_eq!(stats.after_exact, 2);
    assert_eq!(stats.semantic_groups, 0);
}

#[tokio::test]
async fn test_semantic_stage_drops_equivalent_implicit() {
    let entities = entities();
    let (kept, stats) = dedup(Some(r#"{"kept": [0]}"#), true, LinkMode::Extraction)
        .deduplicate(causes_and_leads_to(&entities), &entities)
        .await;
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].predicate, "causes");
    assert_eq!(kept[0].provenance, Provenance::Explicit);
    assert_eq!(stats.semantic_groups, 1);
}

#[tokio::test]
async fn test_semantic_failure_keeps_everything() {
    let entities = entities();
    for reply in [None, Some("no idea"), Some(r#"{"kept": [5]}"#)] {
        let (kept, stats) = dedup(reply, true, LinkMode::Extraction)
            .deduplicate(causes_and_leads_to(&entities), &entities)
            .await;
        assert_eq!(kept.len(), 2);
        assert_eq!(stats.semantic_failures, 1);
    }
}

#[tokio::test]
async fn test_validity_skipped_in_generative_mode() {
    let entities = entities();
    let unknown = vec![Relationship::new("Heat", "causes", "Expansion", Provenance::Explicit)];

    let (kept, _) = dedup(None, false, LinkMode::Extraction)
        .deduplicate(unknown.clone(), &entities)
        .await;
    assert!(kept.is_empty());

    let (kept, _) = dedup(None, false, LinkMode::Generative)
        .deduplicate(unknown, &entities)
        .await;
    assert_eq!(kept.len(), 1);
}

#[tokio::test]
async fn test_names_rewritten_then_collapsed() {
    let entities = entities();
    let rels = vec![
        Relationship::new("a", "causes", "b", Provenance::Implicit),
        Relationship::new(entities[0].id.clone(), "causes", entities[1].id.clone(), Provenance::Explicit),
    ];
    let (kept, stats) = dedup(None, false, LinkMode::Extraction)
        .deduplicate(rels, &entities)
        .await;
    assert_eq!(stats.after_exact, 2);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].provenance, Provenance::Explicit);
}
