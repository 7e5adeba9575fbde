//! Cosine scoring shared by both store variants.
//!
//! Vectors are scaled by `1 / (|v| + 1e-12)` before the dot product, so an
//! all-zero vector scores exactly 0 against anything.

use std::cmp::Ordering;

pub const NORM_EPS: f32 = 1e-12;

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

pub fn unit(v: &[f32]) -> Vec<f32> {
    let denom = l2_norm(v) + NORM_EPS;
    v.iter().map(|x| x / denom).collect()
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    dot(&unit(a), &unit(b))
}

/// Keeps the `k` best items by descending score. Input order breaks ties.
pub fn top_k<T>(mut scored: Vec<(T, f32)>, k: usize) -> Vec<(T, f32)> {
    // sort_by is stable
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_vector_scores_zero() {
        let s = cosine(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0]);
        assert_eq!(s, 0.0);
        assert!(!cosine(&[0.0; 3], &[0.0; 3]).is_nan());
    }

    #[test]
    fn parallel_vectors_score_one() {
        let s = cosine(&[1.0, 2.0], &[2.0, 4.0]);
        assert!((s - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ties_keep_input_order() {
        let ranked = top_k(vec![("a", 0.5), ("b", 0.9), ("c", 0.5), ("d", 0.5)], 3);
        let names: Vec<_> = ranked.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn k_larger_than_input_returns_everything() {
        assert_eq!(top_k(vec![(1, 0.1), (2, 0.2)], 10).len(), 2);
        assert!(top_k(vec![(1, 0.1)], 0).is_empty());
    }
}
