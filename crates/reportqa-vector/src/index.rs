//! Exact k-nearest-neighbour index.
//!
//! Every query scans all entries, so results are exact and deterministic.
//! Report-sized corpora are a few hundred chunks at most.

use std::cmp::Ordering;

use reportqa_core::types::{DistanceMetric, EmbeddedChunk};
use reportqa_core::{Error, Result};

/// One query result. `position` is the entry's insertion index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<'a> {
    pub position: usize,
    pub text: &'a str,
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Vec<EmbeddedChunk>,
    norms: Vec<f32>,
    dim: usize,
    metric: DistanceMetric,
}

impl VectorIndex {
    /// Build from a non-empty set of entries that all share one dimensionality.
    pub fn build(entries: Vec<EmbeddedChunk>, metric: DistanceMetric) -> Result<Self> {
        let dim = entries.first().map(|e| e.vector.len()).ok_or(Error::EmptyIndex)?;
        if dim == 0 {
            return Err(Error::InvalidArgument("index vectors must have at least one dimension".into()));
        }
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != dim) {
            return Err(Error::DimensionMismatch { expected: dim, actual: bad.vector.len() });
        }
        let norms = entries.iter().map(|e| l2_norm(&e.vector)).collect();
        Ok(Self { entries, norms, dim, metric })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn entries(&self) -> &[EmbeddedChunk] {
        &self.entries
    }

    /// The `min(k, len)` nearest entries, nearest first. Equal distances keep
    /// insertion order.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor<'_>>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be greater than 0".into()));
        }
        if vector.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: vector.len() });
        }
        let query_norm = l2_norm(vector);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(i, (entry, &norm))| (i, self.distance(vector, query_norm, &entry.vector, norm)))
            .collect();
        scored.sort_by(|a, b| match a.1.total_cmp(&b.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });
        scored.truncate(k);
        Ok(scored
            .into_iter()
            .map(|(position, distance)| Neighbor {
                position,
                text: &self.entries[position].text,
                distance,
            })
            .collect())
    }

    fn distance(&self, q: &[f32], q_norm: f32, v: &[f32], v_norm: f32) -> f32 {
        match self.metric {
            DistanceMetric::Euclidean => q
                .iter()
                .zip(v)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f32>()
                .sqrt(),
            DistanceMetric::Cosine => {
                if q_norm == 0.0 || v_norm == 0.0 {
                    return 1.0;
                }
                let dot: f32 = q.iter().zip(v).map(|(a, b)| a * b).sum();
                1.0 - dot / (q_norm * v_norm)
            }
        }
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(v: &[f32], text: &str) -> EmbeddedChunk {
        EmbeddedChunk { vector: v.to_vec(), text: text.to_string() }
    }

    #[test]
    fn empty_build_fails() {
        assert!(matches!(VectorIndex::build(vec![], DistanceMetric::Euclidean), Err(Error::EmptyIndex)));
    }

    #[test]
    fn mixed_dimensions_fail() {
        let err = VectorIndex::build(vec![entry(&[1.0, 0.0], "a"), entry(&[1.0], "b")], DistanceMetric::Euclidean)
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn euclidean_distances_are_true_distances() {
        let index = VectorIndex::build(vec![entry(&[3.0, 4.0], "far"), entry(&[0.0, 1.0], "near")], DistanceMetric::Euclidean)
            .unwrap();
        let hits = index.query(&[0.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].text, "near");
        assert!((hits[0].distance - 1.0).abs() < 1e-6);
        assert!((hits[1].distance - 5.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_ignores_magnitude() {
        let index = VectorIndex::build(vec![entry(&[10.0, 0.0], "x"), entry(&[0.0, 1.0], "y")], DistanceMetric::Cosine)
            .unwrap();
        let hits = index.query(&[1.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].text, "x");
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let index = VectorIndex::build(
            vec![entry(&[1.0, 0.0], "first"), entry(&[0.0, 1.0], "second"), entry(&[-1.0, 0.0], "third")],
            DistanceMetric::Euclidean,
        )
        .unwrap();
        let hits = index.query(&[0.0, 0.0], 3).unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.text).collect();
        assert_eq!(texts, ["first", "second", "third"]);
    }

    #[test]
    fn zero_k_and_wrong_dim_fail() {
        let index = VectorIndex::build(vec![entry(&[1.0, 0.0], "a")], DistanceMetric::Euclidean).unwrap();
        assert!(matches!(index.query(&[1.0, 0.0], 0), Err(Error::InvalidArgument(_))));
        assert!(matches!(index.query(&[1.0], 1), Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn index_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<VectorIndex>();
    }
}
