use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;
use tracing::{debug, warn};

use extract::{extract_json, CompletionRequest, LanguageModel};
use model::Relationship;

pub const DEDUP_SYSTEM: &str = "You review relationships between two entities and remove \
redundant ones. Two relationships are redundant when they express the same fact with different \
wording. Keep the most specific phrasing. Respond with JSON only.";

static KEPT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)kept\s*:\s*([\d,\s]+)").expect("valid kept pattern"));

#[derive(Debug, Serialize)]
struct Candidate<'a> {
    index: usize,
    subject: &'a str,
    predicate: &'a str,
    object: &'a str,
    provenance: &'static str,
}

#[derive(Debug, Serialize)]
struct CandidateSet<'a> {
    entities: [&'a str; 2],
    candidates: Vec<Candidate<'a>>,
}

#[derive(Debug, Deserialize)]
struct KeptResponse {
    #[serde(default)]
    kept: Vec<Value>,
}

fn display<'a>(names: &'a HashMap<String, String>, id: &'a str) -> &'a str {
    names.get(id).map(String::as_str).unwrap_or(id)
}

/// Prompt listing every candidate of one entity pair under a stable index.
pub fn build_dedup_prompt(group: &[&Relationship], names: &HashMap<String, String>) -> String {
    let (a, b) = group[0].pair_key();

    let set = CandidateSet {
        entities: [display(names, &a), display(names, &b)],
        candidates: group
            .iter()
            .enumerate()
            .map(|(index, r)| Candidate {
                index,
                subject: display(names, &r.subject_id),
                predicate: &r.predicate,
                object: display(names, &r.object_id),
                provenance: r.provenance.as_str(),
            })
            .collect(),
    };
    let listing = serde_json::to_string_pretty(&set).unwrap_or_default();

    format!(
        r#"These relationships all connect the same two entities:

{listing}

Return the indices of the relationships to KEEP, dropping any that repeat the meaning of a kept one.
Prefer explicit over implicit when two are equivalent.

Respond with exactly:
{{"kept": [0, 2]}}"#
    )
}

/// Indices the model chose to keep, restricted to `0..len`. `None` when the
/// reply cannot be read or selects nothing.
pub fn parse_kept(response: &str, len: usize) -> Option<BTreeSet<usize>> {
    let from_json = extract_json(response)
        .and_then(|json| serde_json::from_str::<KeptResponse>(json).ok())
        .map(|r| {
            r.kept
                .iter()
                .filter_map(|v| match v {
                    Value::Number(n) => n.as_u64().map(|n| n as usize),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                })
                .collect::<Vec<usize>>()
        });

    let indices = match from_json {
        Some(indices) if !indices.is_empty() => indices,
        _ => KEPT_LINE
            .captures(response)?
            .get(1)?
            .as_str()
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect(),
    };

    let kept: BTreeSet<usize> = indices.into_iter().filter(|&i| i < len).collect();
    (!kept.is_empty()).then_some(kept)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SemanticOutcome {
    pub groups: usize,
    pub failures: usize,
}

/// Ask the model to prune each multi-relationship entity pair. Any group
/// whose reply is missing or unreadable keeps all of its relationships.
pub async fn collapse_semantic(
    llm: &dyn LanguageModel,
    relationships: Vec<Relationship>,
    names: &HashMap<String, String>,
    temperature: f32,
) -> (Vec<Relationship>, SemanticOutcome) {
    let mut groups: Vec<((String, String), Vec<usize>)> = Vec::new();
    for (index, relationship) in relationships.iter().enumerate() {
        let key = relationship.pair_key();
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(index),
            None => groups.push((key, vec![index])),
        }
    }

    let mut outcome = SemanticOutcome::default();
    let mut dropped: BTreeSet<usize> = BTreeSet::new();

    for (pair, members) in groups.iter().filter(|(_, m)| m.len() > 1) {
        outcome.groups += 1;
        let group: Vec<&Relationship> = members.iter().map(|&i| &relationships[i]).collect();
        let request = CompletionRequest::new(DEDUP_SYSTEM, build_dedup_prompt(&group, names))
            .with_temperature(temperature);

        let kept = match llm.complete(&request).await {
            Some(reply) => parse_kept(&reply, members.len()),
            None => None,
        };
        let Some(kept) = kept else {
            warn!(pair = ?pair, candidates = members.len(), "Semantic dedup unavailable, keeping all");
            outcome.failures += 1;
            continue;
        };

        for (position, &index) in members.iter().enumerate() {
            if !kept.contains(&position) {
                debug!(
                    subject = %relationships[index].subject_id,
                    predicate = %relationships[index].predicate,
                    object = %relationships[index].object_id,
                    "Dropping redundant relationship"
                );
                dropped.insert(index);
            }
        }
    }

    let survivors = relationships
        .into_iter()
        .enumerate()
        .filter(|(index, _)| !dropped.contains(index))
        .map(|(_, r)| r)
        .collect();
    (survivors, outcome)
}
