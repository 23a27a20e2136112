mod common;

use std::sync::Arc;

use cache::SourceCache;
use common::{complete, resolver, CannedLlm, FakeKb};
use extract::LanguageModel;
use model::{EntityRecord, LinkError, LinkStatus, Source, SourceResult, Tier, TierOutcome};
use resolve::ResolverConfig;

fn trail(resolution: &resolve::Resolution) -> Vec<String> {
    resolution.trail.iter().map(|e| e.to_string()).collect()
}

fn concept(name: &str) -> EntityRecord {
    EntityRecord::new(name, Some("Concept".to_string()))
}

fn refraction() -> SourceResult {
    complete(
        "https://en.wikipedia.org/wiki/Refraction",
        "Refraction",
        "Change in direction of a wave passing between media",
    )
}

#[tokio::test]
async fn test_interlanguage_link_rescues_foreign_name() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(SourceCache::new(dir.path()));
    let kb = Arc::new(
        FakeKb::default()
            .with_search("Refraction", refraction())
            .with_langlink("Lichtbrechung", "de", "Refraction"),
    );
    let resolver = resolver(kb.clone(), cache.clone(), None, &ResolverConfig::default());

    let resolution = resolver.resolve(&concept("Lichtbrechung")).await.unwrap();

    assert_eq!(
        trail(&resolution),
        vec!["cache:miss", "primary_linkage:miss", "direct_search:miss", "language_fallback:hit"]
    );
    assert_eq!(resolution.status, LinkStatus::Linked);
    assert_eq!(resolution.result.label_in("en"), Some("Refraction"));
    let via = resolution.result.matched_via.as_ref().unwrap();
    assert_eq!(via.tier, Tier::LanguageFallback);
    assert_eq!(via.query, "Refraction");
    assert_eq!(kb.searched_queries(), vec!["Lichtbrechung", "Refraction"]);
    assert_eq!(cache.stats().writes, 1);
}

#[tokio::test]
async fn test_second_resolution_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(SourceCache::new(dir.path()));
    let kb = Arc::new(
        FakeKb::default()
            .with_search("Refraction", refraction())
            .with_langlink("Lichtbrechung", "de", "Refraction"),
    );
    let resolver = resolver(kb.clone(), cache.clone(), None, &ResolverConfig::default());
    let entity = concept("Lichtbrechung");

    let first = resolver.resolve(&entity).await.unwrap();
    let calls_after_first = kb.searches_made();
    let second = resolver.resolve(&entity).await.unwrap();

    assert_eq!(kb.searches_made(), calls_after_first);
    assert_eq!(second.network_calls, 0);
    assert!(second.from_cache);
    assert_eq!(trail(&second), vec!["cache:hit"]);
    assert_eq!(second.result, first.result);
    // A hit does not rewrite the entry
    assert_eq!(cache.stats().writes, 1);
}

#[tokio::test]
async fn test_partial_result_is_not_linked_and_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(SourceCache::new(dir.path()));
    let partial = SourceResult::with_id("Q1").with_label("en", "Widget");
    let kb = Arc::new(FakeKb::default().with_search("Widget", partial));
    let config = ResolverConfig {
        language_fallback: false,
        synonym_fallback: false,
        ..ResolverConfig::default()
    };
    let resolver = resolver(kb, cache.clone(), None, &config);

    let mut entity = concept("Widget");
    let resolution = resolver.resolve(&entity).await.unwrap();
    assert_eq!(
        trail(&resolution),
        vec!["cache:miss", "primary_linkage:miss", "direct_search:partial"]
    );
    assert_eq!(resolution.status, LinkStatus::NotLinked);

    let status = resolution.apply_to(&mut entity, "en");
    assert_eq!(status, LinkStatus::NotLinked);
    assert_eq!(entity.source_result(Source::Wikipedia).unwrap().identifier(), Some("Q1"));
    assert_eq!(cache.stats().writes, 0);
}

#[tokio::test]
async fn test_primary_linkage_skips_search() {
    let cache = Arc::new(SourceCache::disabled());
    let url = "https://en.wikipedia.org/wiki/Berlin";
    let kb = Arc::new(FakeKb::default().with_lookup(
        url,
        complete(url, "Berlin", "Capital of Germany"),
    ));
    let resolver = resolver(kb.clone(), cache, None, &ResolverConfig::default());

    let mut entity = EntityRecord::new("Berlin", Some("Place".to_string()));
    let mut wikidata = SourceResult::with_id("http://www.wikidata.org/entity/Q64");
    wikidata.cross_refs.insert(Source::Wikipedia, url.to_string());
    entity.per_source_data.insert(Source::Wikidata, wikidata);

    let resolution = resolver.resolve(&entity).await.unwrap();
    assert_eq!(trail(&resolution), vec!["cache:miss", "primary_linkage:hit"]);
    assert_eq!(kb.lookups_made(), 1);
    assert_eq!(kb.searches_made(), 0);
}

#[tokio::test]
async fn test_transport_failure_recorded_and_cascade_continues() {
    let cache = Arc::new(SourceCache::disabled());
    let kb = Arc::new(
        FakeKb::default()
            .failing_on("Lichtbrechung", LinkError::Transport("HTTP 503".to_string()))
            .with_search("Refraction", refraction())
            .with_langlink("Lichtbrechung", "de", "Refraction"),
    );
    let resolver = resolver(kb, cache, None, &ResolverConfig::default());

    let resolution = resolver.resolve(&concept("Lichtbrechung")).await.unwrap();
    assert_eq!(
        trail(&resolution),
        vec!["cache:miss", "primary_linkage:miss", "direct_search:error", "language_fallback:hit"]
    );
    let failed = &resolution.trail[2];
    assert_eq!(failed.outcome, TierOutcome::Error);
    assert!(failed.detail.as_deref().unwrap().contains("503"));
}

#[tokio::test]
async fn test_zero_budget_stops_before_fallbacks() {
    let cache = Arc::new(SourceCache::disabled());
    let kb = Arc::new(FakeKb::default().with_langlink("Lichtbrechung", "de", "Refraction"));
    let config = ResolverConfig {
        max_fallback_attempts: 0,
        ..ResolverConfig::default()
    };
    let resolver = resolver(kb.clone(), cache, None, &config);

    let resolution = resolver.resolve(&concept("Lichtbrechung")).await.unwrap();
    assert_eq!(
        trail(&resolution),
        vec!["cache:miss", "primary_linkage:miss", "direct_search:miss"]
    );
    assert_eq!(resolution.status, LinkStatus::NotLinked);
    assert_eq!(kb.searches_made(), 1);
}

#[tokio::test]
async fn test_budget_shared_between_translation_and_synonyms() {
    let cache = Arc::new(SourceCache::disabled());
    let kb = Arc::new(
        FakeKb::default()
            .with_langlink("Lichtbrechung", "de", "Refraktion")
            .with_search("Light bending", refraction()),
    );
    let llm: Arc<dyn LanguageModel> = Arc::new(CannedLlm::new(
        r#"{"synonyms": ["Optical refraction", "Light bending", "Bending of light"]}"#,
    ));
    let config = ResolverConfig {
        max_fallback_attempts: 2,
        ..ResolverConfig::default()
    };
    let resolver = resolver(kb.clone(), cache, Some(llm), &config);

    let resolution = resolver.resolve(&concept("Lichtbrechung")).await.unwrap();

    // One translation search, then only one synonym fits in the budget
    assert_eq!(
        kb.searched_queries(),
        vec!["Lichtbrechung", "Refraktion", "Optical refraction"]
    );
    assert_eq!(resolution.status, LinkStatus::NotLinked);
    assert_eq!(
        trail(&resolution).last().map(String::as_str),
        Some("synonym_fallback:miss")
    );
}

#[tokio::test]
async fn test_synonym_completes_result() {
    let cache = Arc::new(SourceCache::disabled());
    let kb = Arc::new(FakeKb::default().with_search("Light bending", refraction()));
    let llm: Arc<dyn LanguageModel> = Arc::new(CannedLlm::new(
        r#"{"synonyms": ["Light bending", "Bending of light"]}"#,
    ));
    let resolver = resolver(kb.clone(), cache, Some(llm), &ResolverConfig::default());

    let resolution = resolver.resolve(&concept("Lichtbrechung")).await.unwrap();
    assert_eq!(
        trail(&resolution),
        vec![
            "cache:miss",
            "primary_linkage:miss",
            "direct_search:miss",
            "language_fallback:miss",
            "synonym_fallback:hit"
        ]
    );
    let via = resolution.result.matched_via.unwrap();
    assert_eq!(via.tier, Tier::SynonymFallback);
    assert_eq!(via.query, "Light bending");
}

#[tokio::test]
async fn test_linked_status_always_has_minimum_fields() {
    let cache = Arc::new(SourceCache::disabled());
    let kb = Arc::new(
        FakeKb::default()
            .with_search("Alpha", complete("A", "Alpha", "First letter"))
            .with_search("Beta", SourceResult::with_id("B").with_label("en", "Beta"))
            .with_search("Gamma", SourceResult::default().with_description("en", "Third letter")),
    );
    let resolver = resolver(kb, cache, None, &ResolverConfig::default());

    for name in ["Alpha", "Beta", "Gamma", "Delta"] {
        let mut entity = concept(name);
        let resolution = resolver.resolve(&entity).await.unwrap();
        resolution.apply_to(&mut entity, "en");
        if entity.is_linked(Source::Wikipedia) {
            let data = entity.source_result(Source::Wikipedia).unwrap();
            assert!(data.identifier().is_some());
            assert!(data.label_in("en").is_some());
            assert!(data.description_in("en").is_some());
        }
    }
}

#[tokio::test]
async fn test_fields_from_different_tiers_combine_into_link() {
    let cache = Arc::new(SourceCache::disabled());
    let kb = Arc::new(
        FakeKb::default()
            .with_search(
                "Lichtbrechung",
                SourceResult::with_id("https://en.wikipedia.org/wiki/Refraction").with_label("en", "Refraction"),
            )
            .with_search(
                "Refraction",
                SourceResult::with_id("https://en.wikipedia.org/wiki/Refraction_(optics)")
                    .with_description("en", "Change in direction of a wave"),
            )
            .with_langlink("Lichtbrechung", "de", "Refraction"),
    );
    let resolver = resolver(kb, cache, None, &ResolverConfig::default());

    let resolution = resolver.resolve(&concept("Lichtbrechung")).await.unwrap();
    assert_eq!(
        trail(&resolution),
        vec!["cache:miss", "primary_linkage:miss", "direct_search:partial", "language_fallback:hit"]
    );
    assert_eq!(resolution.status, LinkStatus::Linked);
    // The earlier tier's identifier is kept; the later one only fills gaps
    assert_eq!(
        resolution.result.identifier(),
        Some("https://en.wikipedia.org/wiki/Refraction")
    );
    assert_eq!(resolution.result.label_in("en"), Some("Refraction"));
    assert!(resolution.result.is_complete("en"));
}

#[tokio::test(start_paused = true)]
async fn test_slow_search_times_out_and_cascade_continues() {
    let cache = Arc::new(SourceCache::disabled());
    let kb = Arc::new(
        FakeKb::default()
            .sleeping_on("Lichtbrechung", std::time::Duration::from_secs(3600))
            .with_search("Refraction", refraction())
            .with_langlink("Lichtbrechung", "de", "Refraction"),
    );
    let resolver = resolver(kb.clone(), cache, None, &ResolverConfig::default());

    let resolution = resolver.resolve(&concept("Lichtbrechung")).await.unwrap();
    assert_eq!(
        trail(&resolution),
        vec!["cache:miss", "primary_linkage:miss", "direct_search:error", "language_fallback:hit"]
    );
    assert_eq!(resolution.status, LinkStatus::Linked);
    let timed_out = &resolution.trail[2];
    assert_eq!(timed_out.outcome, TierOutcome::Error);
    assert!(timed_out.detail.as_deref().unwrap().contains("after 20s"));
    assert_eq!(kb.searched_queries(), vec!["Lichtbrechung", "Refraction"]);
}
