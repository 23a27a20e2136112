//! Name/type similarity used to group a batch into coherent windows.

use std::collections::BTreeSet;

use model::{normalize_key, EntityRecord};

const NAME_WEIGHT: f64 = 0.7;
const TYPE_WEIGHT: f64 = 0.3;

fn tokens(name: &str) -> BTreeSet<String> {
    normalize_key(name)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    shared / union
}

/// 0.7 x name-token Jaccard + 0.3 x type equality, in [0, 1].
pub fn similarity(a: &EntityRecord, b: &EntityRecord) -> f64 {
    let name = jaccard(&tokens(&a.name), &tokens(&b.name));
    let same_type = match (&a.entity_type, &b.entity_type) {
        (Some(x), Some(y)) => normalize_key(x) == normalize_key(y),
        _ => false,
    };
    NAME_WEIGHT * name + if same_type { TYPE_WEIGHT } else { 0.0 }
}

/// Greedy single-pass clustering over `candidates` (indices into `entities`).
/// Each entity joins the first cluster whose seed it resembles at or above
/// `threshold`; the output preserves input order inside and across clusters.
pub fn cluster_by_similarity(
    entities: &[EntityRecord],
    candidates: &[usize],
    threshold: f64,
) -> Vec<Vec<usize>> {
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    for &index in candidates {
        let entity = &entities[index];
        match clusters
            .iter_mut()
            .find(|cluster| similarity(&entities[cluster[0]], entity) >= threshold)
        {
            Some(cluster) => cluster.push(index),
            None => clusters.push(vec![index]),
        }
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str, kind: &str) -> EntityRecord {
        EntityRecord::new(name, Some(kind.to_string()))
    }

    #[test]
    fn test_similarity_weights() {
        let a = entity("Apple Inc", "Organization");
        let b = entity("Apple Inc", "organization");
        assert!((similarity(&a, &b) - 1.0).abs() < 1e-9);

        let c = entity("Apple Records", "Organization");
        // 1 shared token of 3
        let expected = 0.7 * (1.0 / 3.0) + 0.3;
        assert!((similarity(&a, &c) - expected).abs() < 1e-9);

        let d = entity("Banana", "Fruit");
        assert_eq!(similarity(&a, &d), 0.0);
    }

    #[test]
    fn test_type_only_match_stays_below_threshold() {
        let a = entity("Berlin", "Place");
        let b = entity("Paris", "Place");
        assert!(similarity(&a, &b) < 0.5);
    }

    #[test]
    fn test_clusters_group_similar_names() {
        let entities = vec![
            entity("Albert Einstein", "Person"),
            entity("Paris", "Place"),
            entity("Einstein", "Person"),
            entity("Paris Hilton", "Person"),
        ];
        let clusters = cluster_by_similarity(&entities, &[0, 1, 2, 3], 0.5);
        assert_eq!(clusters, vec![vec![0, 2], vec![1], vec![3]]);
    }

    #[test]
    fn test_clustering_only_uses_candidates() {
        let entities = vec![entity("A", "x"), entity("B", "y"), entity("C", "z")];
        let clusters = cluster_by_similarity(&entities, &[2, 0], 0.5);
        assert_eq!(clusters, vec![vec![2], vec![0]]);
    }
}
