use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

pub const SCENES_PER_QUERY: usize = 3;
pub const MAX_RETRIEVAL_QUERIES: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct RankedScene {
    /// Thumbnail reference of the scene.
    pub scene: String,
    pub similarity: f32,
    pub nominated: bool,
}

/// Scales a vector to unit length. Zero vectors are returned unchanged.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

fn by_score(a: &RankedScene, b: &RankedScene) -> Ordering {
    b.similarity
        .partial_cmp(&a.similarity)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.scene.cmp(&b.scene))
}

/// Picks up to `limit` scenes for one query.
///
/// Nominated scenes that have an embedding in `pool` always make the cut
/// when there are at least `limit` of them, and are then only reordered by
/// similarity. With fewer, every resolved nomination is kept and the
/// remaining slots go to the most similar non-nominated scenes.
pub fn rank_scenes(
    query: &[f32],
    nominated: &[String],
    pool: &BTreeMap<String, Vec<f32>>,
    limit: usize,
) -> Vec<RankedScene> {
    let mut seen = HashSet::new();
    let mut picked: Vec<RankedScene> = nominated
        .iter()
        .filter(|scene| seen.insert(scene.as_str()))
        .filter_map(|scene| {
            pool.get(scene).map(|embedding| RankedScene {
                scene: scene.clone(),
                similarity: cosine_similarity(query, embedding),
                nominated: true,
            })
        })
        .collect();
    picked.sort_by(by_score);

    if picked.len() >= limit {
        picked.truncate(limit);
        return picked;
    }

    let mut backfill: Vec<RankedScene> = pool
        .iter()
        .filter(|(scene, _)| !seen.contains(scene.as_str()))
        .map(|(scene, embedding)| RankedScene {
            scene: scene.clone(),
            similarity: cosine_similarity(query, embedding),
            nominated: false,
        })
        .collect();
    backfill.sort_by(by_score);
    backfill.truncate(limit - picked.len());

    picked.extend(backfill);
    picked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(entries: &[(&str, [f32; 2])]) -> BTreeMap<String, Vec<f32>> {
        entries.iter().map(|(k, v)| (k.to_string(), v.to_vec())).collect()
    }

    fn names(ranked: &[RankedScene]) -> Vec<&str> {
        ranked.iter().map(|r| r.scene.as_str()).collect()
    }

    #[test]
    fn test_cosine_basics() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_normalize() {
        let v = normalize(&[3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert_eq!(normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_many_nominations_stay_within_nominated_set() {
        let pool = pool(&[
            ("a", [1.0, 0.0]),
            ("b", [0.9, 0.1]),
            ("c", [0.5, 0.5]),
            ("d", [0.1, 0.9]),
            ("e", [0.0, 1.0]),
            ("best_unnominated", [1.0, 0.0]),
        ]);
        let nominated: Vec<String> = ["e", "d", "c", "b", "a"].iter().map(|s| s.to_string()).collect();
        let ranked = rank_scenes(&[1.0, 0.0], &nominated, &pool, 3);
        assert_eq!(names(&ranked), vec!["a", "b", "c"]);
        assert!(ranked.iter().all(|r| r.nominated));
    }

    #[test]
    fn test_single_nomination_backfilled_by_similarity() {
        let pool = pool(&[
            ("x", [0.0, 1.0]),
            ("near", [1.0, 0.1]),
            ("mid", [0.7, 0.7]),
            ("far", [-1.0, 0.0]),
        ]);
        let ranked = rank_scenes(&[1.0, 0.0], &["x".to_string()], &pool, 3);
        assert_eq!(names(&ranked), vec!["x", "near", "mid"]);
        assert!(ranked[0].nominated);
        assert!(!ranked[1].nominated && !ranked[2].nominated);
    }

    #[test]
    fn test_unresolved_nominations_are_ignored() {
        let pool = pool(&[("a", [1.0, 0.0]), ("b", [0.0, 1.0])]);
        let nominated = vec!["ghost".to_string(), "b".to_string(), "b".to_string()];
        let ranked = rank_scenes(&[1.0, 0.0], &nominated, &pool, 3);
        // Only two scenes exist in total.
        assert_eq!(names(&ranked), vec!["b", "a"]);
    }

    #[test]
    fn test_ties_break_by_name() {
        let pool = pool(&[("z", [1.0, 0.0]), ("m", [1.0, 0.0]), ("a", [1.0, 0.0])]);
        let ranked = rank_scenes(&[1.0, 0.0], &[], &pool, 2);
        assert_eq!(names(&ranked), vec!["a", "m"]);
    }

    #[test]
    fn test_empty_pool() {
        let ranked = rank_scenes(&[1.0], &["a".to_string()], &BTreeMap::new(), 3);
        assert!(ranked.is_empty());
    }
}
