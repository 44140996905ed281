//! Nearest-neighbor search exposed as a virtual relation.
//!
//! A host query engine consumes this as a row-producing callable: given an
//! index, a query vector and `k`, it yields `(identifier, distance)` rows
//! the host joins back to its own tables by identifier. The relation only
//! reads index state; any number of relations may run concurrently.

use vicinity_core::{Error as CoreError, Index, SearchHit};

use crate::Result;

/// A prepared k-nearest-neighbor row source over an index.
pub struct SearchRelation<'a> {
    index: &'a Index,
    query: Vec<u8>,
    k: usize,
    ef: Option<usize>,
}

impl<'a> SearchRelation<'a> {
    /// Prepare a search. The query's shape is validated here, so producing
    /// rows later cannot fail.
    pub fn new(index: &'a Index, query: impl Into<Vec<u8>>, k: usize) -> Result<Self> {
        let query = query.into();
        let options = index.options();
        if query.len() != options.bytes_per_vector() {
            return Err(CoreError::DimensionMismatch {
                expected: options.dims,
                actual: options.scalar_kind.dims_for(query.len()),
            }
            .into());
        }
        Ok(Self {
            index,
            query,
            k,
            ef: None,
        })
    }

    /// Override the index's default beam width for this relation.
    #[must_use]
    pub fn with_ef(mut self, ef: usize) -> Self {
        self.ef = Some(ef);
        self
    }

    /// Produce the result rows, ordered by `(distance, id)`.
    #[must_use]
    pub fn rows(&self) -> Vec<SearchHit> {
        let result = match self.ef {
            Some(ef) => self.index.search_with_ef(&self.query, self.k, ef),
            None => self.index.search(&self.query, self.k),
        };
        // shape was validated at construction; search cannot fail after it
        result.unwrap_or_default()
    }
}

impl IntoIterator for &SearchRelation<'_> {
    type Item = SearchHit;
    type IntoIter = std::vec::IntoIter<SearchHit>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows().into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vicinity_core::kernels::MetricKind;
    use vicinity_core::IndexOptions;

    fn f32_bytes(v: &[f32]) -> Vec<u8> {
        v.iter().flat_map(|x| x.to_le_bytes()).collect()
    }

    fn sample_index() -> Index {
        let index = Index::new(IndexOptions {
            dims: 2,
            metric: MetricKind::SqEuclidean,
            ..IndexOptions::default()
        })
        .unwrap();
        for i in 0..30u64 {
            index.insert(i, &f32_bytes(&[i as f32, 0.0])).unwrap();
        }
        index
    }

    #[test]
    fn yields_ordered_joinable_rows() {
        let index = sample_index();
        let relation = SearchRelation::new(&index, f32_bytes(&[10.2, 0.0]), 3).unwrap();
        let rows = relation.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].id, 10);
        assert!(rows[0].distance <= rows[1].distance);

        // iteration mirrors rows()
        let ids: Vec<u64> = (&relation).into_iter().map(|hit| hit.id).collect();
        assert_eq!(ids[0], 10);
    }

    #[test]
    fn query_shape_checked_at_construction() {
        let index = sample_index();
        assert!(SearchRelation::new(&index, f32_bytes(&[1.0, 2.0, 3.0]), 3).is_err());
    }

    #[test]
    fn explicit_beam_width_is_honored() {
        let index = sample_index();
        let relation = SearchRelation::new(&index, f32_bytes(&[0.0, 0.0]), 5)
            .unwrap()
            .with_ef(64);
        assert_eq!(relation.rows().len(), 5);
    }
}
