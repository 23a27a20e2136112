use tracing::debug;

use extract::find_entity;
use model::{EntityRecord, Relationship};

/// Keep relationships whose endpoints both name a known entity, rewriting the
/// endpoints to canonical entity ids. Self-loops created by the rewrite are dropped.
pub fn filter_valid(relationships: Vec<Relationship>, entities: &[EntityRecord]) -> Vec<Relationship> {
    relationships
        .into_iter()
        .filter_map(|mut relationship| {
            let subject = find_entity(&relationship.subject_id, entities);
            let object = find_entity(&relationship.object_id, entities);
            match (subject, object) {
                (Some(subject), Some(object)) if subject.id != object.id => {
                    relationship.subject_id = subject.id.clone();
                    relationship.object_id = object.id.clone();
                    Some(relationship)
                }
                _ => {
                    debug!(
                        subject = %relationship.subject_id,
                        object = %relationship.object_id,
                        "Dropping relationship with unknown endpoint"
                    );
                    None
                }
            }
        })
        .collect()
}
