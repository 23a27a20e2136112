use std::collections::HashMap;

use model::Relationship;

/// Collapse identical (subject, predicate, object) triples. An explicit
/// assertion replaces an implicit one on the same triple; otherwise the
/// first occurrence stays. Output keeps first-occurrence order.
pub fn collapse_exact(relationships: Vec<Relationship>) -> Vec<Relationship> {
    let mut slots: HashMap<(String, String, String), usize> = HashMap::new();
    let mut kept: Vec<Relationship> = Vec::with_capacity(relationships.len());

    for relationship in relationships {
        let key = relationship.triple_key();
        match slots.get(&key) {
            Some(&slot) => {
                if relationship.provenance.outranks(&kept[slot].provenance) {
                    kept[slot] = relationship;
                }
            }
            None => {
                slots.insert(key, kept.len());
                kept.push(relationship);
            }
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::Provenance;

    fn rel(s: &str, p: &str, o: &str, provenance: Provenance) -> Relationship {
        Relationship::new(s, p, o, provenance)
    }

    #[test]
    fn test_explicit_replaces_implicit() {
        let out = collapse_exact(vec![
            rel("a", "causes", "b", Provenance::Implicit).with_confidence(0.4),
            rel("a", "causes", "b", Provenance::Explicit).with_evidence("A causes B."),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].provenance, Provenance::Explicit);
        assert_eq!(out[0].evidence.as_deref(), Some("A causes B."));
    }

    #[test]
    fn test_first_of_equal_provenance_wins() {
        let out = collapse_exact(vec![
            rel("a", "causes", "b", Provenance::Explicit).with_evidence("first"),
            rel("a", "causes", "b", Provenance::Explicit).with_evidence("second"),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].evidence.as_deref(), Some("first"));
    }

    #[test]
    fn test_predicate_spelling_variants_collapse() {
        let out = collapse_exact(vec![
            rel("a", "part_of", "b", Provenance::Implicit),
            rel("a", "Part Of", "b", Provenance::Implicit),
        ]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_direction_matters() {
        let out = collapse_exact(vec![
            rel("a", "causes", "b", Provenance::Explicit),
            rel("b", "causes", "a", Provenance::Explicit),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_output_independent_of_input_order() {
        let input = vec![
            rel("a", "causes", "b", Provenance::Implicit),
            rel("c", "contains", "d", Provenance::Explicit),
            rel("a", "causes", "b", Provenance::Explicit),
            rel("c", "contains", "d", Provenance::Implicit),
            rel("e", "near", "f", Provenance::Implicit),
        ];
        let summarize = |rels: Vec<Relationship>| {
            let mut keys: Vec<_> = rels
                .into_iter()
                .map(|r| (r.triple_key(), r.provenance.as_str()))
                .collect();
            keys.sort();
            keys
        };

        let forward = summarize(collapse_exact(input.clone()));
        let mut reversed_input = input;
        reversed_input.reverse();
        let reversed = summarize(collapse_exact(reversed_input));

        assert_eq!(forward, reversed);
        assert_eq!(forward.len(), 3);
        assert!(forward.iter().filter(|(k, _)| k.0 != "e").all(|(_, p)| *p == "explicit"));
    }
}
