use crate::error::{RagError, Result};

/// Exact brute-force cosine index over unit-normalized vectors.
///
/// Rows are stored contiguously in insertion order; inner product of
/// unit vectors is cosine similarity, so scores stay in `[-1, 1]`.
/// Corpora are session-scoped and small, so linear scan is the whole
/// design.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Normalize and store the given vectors. All vectors must share
    /// one non-zero dimension.
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let dimension = vectors.first().map(|vector| vector.len()).unwrap_or(0);

        if !vectors.is_empty() && dimension == 0 {
            return Err(RagError::DimensionMismatch(
                "vectors have zero dimension".to_string(),
            ));
        }

        let mut data = Vec::with_capacity(vectors.len() * dimension);
        for (position, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(RagError::DimensionMismatch(format!(
                    "vector {} has dimension {} but the index expects {}",
                    position,
                    vector.len(),
                    dimension
                )));
            }
            data.extend(normalized(vector));
        }

        Ok(Self { dimension, data })
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Top-k positions by descending cosine similarity. Ties break
    /// toward the lower stored position. Returns all rows when the
    /// index holds fewer than `k`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch(format!(
                "query has dimension {} but the index expects {}",
                query.len(),
                self.dimension
            )));
        }

        let query = normalized(query);
        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, row)| (position, dot(row, &query)))
            .collect();

        scored.sort_by(|left, right| {
            right
                .1
                .total_cmp(&left.1)
                .then_with(|| left.0.cmp(&right.0))
        });
        scored.truncate(k);

        Ok(scored)
    }
}

fn dot(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right.iter())
        .map(|(a, b)| a * b)
        .sum()
}

fn normalized(vector: &[f32]) -> Vec<f32> {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        vector.iter().map(|value| value / magnitude).collect()
    } else {
        vector.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::VectorIndex;
    use crate::error::RagError;

    #[test]
    fn empty_index_returns_no_hits() {
        let index = VectorIndex::build(Vec::new()).unwrap();
        assert!(index.is_empty());
        assert!(index.search(&[1.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn nearest_vector_ranks_first() {
        let index = VectorIndex::build(vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.7, 0.7, 0.0],
        ])
        .unwrap();

        let hits = index.search(&[1.0, 0.1, 0.0], 3).unwrap();
        assert_eq!(hits[0].0, 0);
        assert!(hits[0].1 > hits[1].1);
    }

    #[test]
    fn scores_are_cosine_similarities_in_range() {
        let index = VectorIndex::build(vec![
            vec![3.0, 0.0],
            vec![-2.0, 0.0],
            vec![0.0, 5.0],
        ])
        .unwrap();

        let hits = index.search(&[10.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        for (_, score) in &hits {
            assert!((-1.0..=1.0).contains(score));
        }
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
        assert!((hits[2].1 + 1.0).abs() < 1e-6);
    }

    #[test]
    fn equal_scores_break_ties_by_stored_position() {
        let index = VectorIndex::build(vec![
            vec![0.0, 1.0],
            vec![2.0, 0.0],
            vec![1.0, 0.0],
        ])
        .unwrap();

        // Positions 1 and 2 normalize to the same vector.
        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(hits[0].0, 1);
        assert_eq!(hits[1].0, 2);
        assert_eq!(hits[0].1, hits[1].1);
    }

    #[test]
    fn k_larger_than_index_returns_everything() {
        let index = VectorIndex::build(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let hits = index.search(&[1.0, 1.0], 10).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn ragged_vectors_are_rejected() {
        let result = VectorIndex::build(vec![vec![1.0, 0.0], vec![1.0]]);
        assert!(matches!(result, Err(RagError::DimensionMismatch(_))));
    }

    #[test]
    fn mismatched_query_dimension_is_rejected() {
        let index = VectorIndex::build(vec![vec![1.0, 0.0]]).unwrap();
        let result = index.search(&[1.0, 0.0, 0.0], 1);
        assert!(matches!(result, Err(RagError::DimensionMismatch(_))));
    }

    #[test]
    fn sorted_descending() {
        let index = VectorIndex::build(vec![
            vec![1.0, 0.0],
            vec![0.5, 0.5],
            vec![0.0, 1.0],
            vec![-1.0, 0.0],
        ])
        .unwrap();

        let hits = index.search(&[1.0, 0.0], 4).unwrap();
        for pair in hits.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }
}
