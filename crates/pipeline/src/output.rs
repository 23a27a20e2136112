use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use dedup::{DedupStats, LinkMode};
use model::{EntityRecord, LinkStatus, Provenance, Relationship, Source, SourceResult, Tier};
use resolve::DispatchReport;

#[derive(Debug, Clone, Serialize)]
pub struct SourceView {
    pub status: LinkStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<SourceResult>,
    /// "tier:outcome" transitions in order
    pub trail: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityView {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    pub sources: BTreeMap<Source, SourceView>,
}

impl From<&EntityRecord> for EntityView {
    fn from(record: &EntityRecord) -> Self {
        let sources = record
            .status_by_source
            .iter()
            .map(|(source, status)| {
                let view = SourceView {
                    status: *status,
                    data: record.source_result(*source).cloned(),
                    trail: record.trail_for(*source).map(|e| e.to_string()).collect(),
                };
                (*source, view)
            })
            .collect();

        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            entity_type: record.entity_type.clone(),
            sources,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationshipView {
    pub subject: String,
    pub subject_id: String,
    pub predicate: String,
    pub object: String,
    pub object_id: String,
    pub inferred: Provenance,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl RelationshipView {
    fn new(relationship: &Relationship, names: &HashMap<&str, &str>) -> Self {
        let name = |id: &str| names.get(id).copied().unwrap_or(id).to_string();
        Self {
            subject: name(&relationship.subject_id),
            subject_id: relationship.subject_id.clone(),
            predicate: relationship.predicate.clone(),
            object: name(&relationship.object_id),
            object_id: relationship.object_id.clone(),
            inferred: relationship.provenance,
            confidence: relationship.confidence,
            evidence: relationship.evidence.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RelationshipStats {
    pub explicit: usize,
    pub implicit: usize,
    pub generated: usize,
    /// Extraction passes that produced nothing usable
    pub extraction_failures: usize,
    pub dedup: DedupStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunStatistics {
    pub run_id: String,
    pub mode: LinkMode,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub mentions: usize,
    pub entities: usize,
    /// Entities linked in at least one source
    pub linked: usize,
    pub cache_hits: usize,
    pub tier_hits: BTreeMap<Tier, usize>,
    pub sources: BTreeMap<Source, DispatchReport>,
    pub relationships: RelationshipStats,
}

impl RunStatistics {
    pub fn new(run_id: String, mode: LinkMode, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            mode,
            started_at,
            elapsed_ms: 0,
            mentions: 0,
            entities: 0,
            linked: 0,
            cache_hits: 0,
            tier_hits: BTreeMap::new(),
            sources: BTreeMap::new(),
            relationships: RelationshipStats::default(),
        }
    }

    pub fn record_source(&mut self, report: DispatchReport) {
        self.cache_hits += report.cache_hits;
        for (tier, hits) in &report.tier_hits {
            *self.tier_hits.entry(*tier).or_default() += hits;
        }
        self.sources.insert(report.source, report);
    }
}

/// The result handed back to callers: entities with per-source data,
/// surviving relationships and run statistics.
#[derive(Debug, Clone, Serialize)]
pub struct LinkingResult {
    pub entities: Vec<EntityView>,
    pub relationships: Vec<RelationshipView>,
    pub statistics: RunStatistics,
    #[serde(skip)]
    pub records: Vec<EntityRecord>,
}

impl LinkingResult {
    pub fn new(records: Vec<EntityRecord>, relationships: &[Relationship], statistics: RunStatistics) -> Self {
        let names: HashMap<&str, &str> = records
            .iter()
            .map(|r| (r.id.as_str(), r.name.as_str()))
            .collect();
        let relationships = relationships
            .iter()
            .map(|r| RelationshipView::new(r, &names))
            .collect();
        let entities = records.iter().map(EntityView::from).collect();

        Self {
            entities,
            relationships,
            statistics,
            records,
        }
    }
}
