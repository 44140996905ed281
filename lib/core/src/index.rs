use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use vicinity_kernels::{Kernel, MetricKind, ScalarKind};

use crate::graph::Graph;
use crate::{Error, Result};

/// Configuration for an index. Dimensionality, element type and metric are
/// fixed for the index's lifetime; `seed` makes layer assignment - and with
/// it the whole graph shape - reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexOptions {
    pub dims: usize,
    pub scalar_kind: ScalarKind,
    pub metric: MetricKind,
    /// Neighbor-list bound per layer; layer 0 holds up to `2 * m`.
    pub m: usize,
    /// Beam width while linking new nodes.
    pub ef_construction: usize,
    /// Default beam width for searches; clamped up to `k` per query.
    pub ef_search: usize,
    pub seed: u64,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            dims: 128,
            scalar_kind: ScalarKind::F32,
            metric: MetricKind::Cosine,
            m: 16,
            ef_construction: 200,
            ef_search: 64,
            seed: 0x7A5C_1D3E,
        }
    }
}

impl IndexOptions {
    /// Bytes a single vector occupies in this index.
    #[inline]
    #[must_use]
    pub fn bytes_per_vector(&self) -> usize {
        self.scalar_kind.bytes_for(self.dims)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.dims == 0 {
            return Err(Error::InvalidOptions("dims must be positive".into()));
        }
        if self.m < 2 {
            return Err(Error::InvalidOptions("m must be at least 2".into()));
        }
        if self.ef_construction == 0 {
            return Err(Error::InvalidOptions(
                "ef_construction must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// One search result row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: u64,
    pub distance: f32,
}

/// Approximate nearest-neighbor index over a navigable proximity graph.
///
/// All methods take `&self`: structural mutation (insert, remove, compact,
/// reserve) serializes behind the write half of a read-write lock while
/// searches and reads share the read half. A search running concurrently
/// with an insert may miss the node being inserted, but never observes a
/// partially-linked one.
pub struct Index {
    options: IndexOptions,
    graph: RwLock<Graph>,
}

impl Index {
    /// Create an empty index. Fails when the options are inconsistent or no
    /// kernel exists for the `(scalar_kind, metric)` pair.
    pub fn new(options: IndexOptions) -> Result<Self> {
        options.validate()?;
        let kernel = Kernel::bind(options.scalar_kind, options.metric)?;
        Ok(Self {
            options,
            graph: RwLock::new(Graph::new(&options, kernel)),
        })
    }

    #[inline]
    #[must_use]
    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// Number of live (non-removed) vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.read().live
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.graph.read().id_to_slot.contains_key(&id)
    }

    /// Raw stored bytes for an identifier, if present.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<Vec<u8>> {
        let graph = self.graph.read();
        let slot = *graph.id_to_slot.get(&id)?;
        Some(graph.vector(slot).to_vec())
    }

    fn check_shape(&self, bytes: &[u8]) -> Result<()> {
        let expected = self.options.bytes_per_vector();
        if bytes.len() != expected {
            return Err(Error::DimensionMismatch {
                expected: self.options.dims,
                actual: self.options.scalar_kind.dims_for(bytes.len()),
            });
        }
        Ok(())
    }

    /// Insert a vector under a fresh identifier. Duplicate identifiers and
    /// shape mismatches are rejected before any shared state changes.
    pub fn insert(&self, id: u64, vector: &[u8]) -> Result<()> {
        self.check_shape(vector)?;
        self.graph.write().insert(id, vector)
    }

    /// k-nearest search with the configured default beam width.
    pub fn search(&self, query: &[u8], k: usize) -> Result<Vec<SearchHit>> {
        self.search_with_ef(query, k, self.options.ef_search)
    }

    /// k-nearest search with an explicit beam width. `ef` below `k` is
    /// clamped up to `k`; results are ordered by `(distance, id)` so equal
    /// distances yield deterministic output.
    pub fn search_with_ef(&self, query: &[u8], k: usize, ef: usize) -> Result<Vec<SearchHit>> {
        self.check_shape(query)?;
        let hits = self.graph.read().search(query, k, ef);
        Ok(hits
            .into_iter()
            .map(|(id, distance)| SearchHit { id, distance })
            .collect())
    }

    /// Remove an identifier. The node is tombstoned and every surviving
    /// neighbor is relinked; the identifier may be inserted again afterwards.
    pub fn remove(&self, id: u64) -> Result<()> {
        self.graph.write().remove(id)
    }

    /// Physically drop tombstoned nodes accumulated by [`Index::remove`].
    pub fn compact(&self) {
        self.graph.write().compact();
    }

    /// Pre-grow storage for `capacity` total vectors. Existing identifiers
    /// stay valid; concurrent searches are excluded for the duration of the
    /// growth, never corrupted by it.
    pub fn reserve(&self, capacity: usize) {
        self.graph.write().reserve(capacity);
    }

    /// Per-layer neighbor identifiers of a stored vector. Diagnostic
    /// surface: lets embedders and tests audit graph connectivity.
    pub fn neighbors(&self, id: u64) -> Result<Vec<Vec<u64>>> {
        let graph = self.graph.read();
        let slot = *graph.id_to_slot.get(&id).ok_or(Error::UnknownId(id))?;
        Ok(graph.nodes[slot as usize]
            .layers
            .iter()
            .map(|list| {
                list.iter()
                    .map(|&n| graph.nodes[n as usize].id)
                    .collect()
            })
            .collect())
    }

    /// All live identifiers, unordered.
    #[must_use]
    pub fn ids(&self) -> Vec<u64> {
        self.graph.read().id_to_slot.keys().copied().collect()
    }

    /// Serialize the index to a byte sink.
    pub fn save<W: std::io::Write>(&self, writer: W) -> Result<()> {
        crate::persist::save(&self.options, &self.graph.read(), writer)
    }

    /// Restore an index from a byte source. The distance kernel is
    /// re-selected for the machine doing the loading.
    pub fn load<R: std::io::Read>(reader: R) -> Result<Self> {
        let (options, graph) = crate::persist::load(reader)?;
        Ok(Self {
            options,
            graph: RwLock::new(graph),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_bytes(v: &[f32]) -> Vec<u8> {
        v.iter().flat_map(|x| x.to_le_bytes()).collect()
    }

    fn small_index() -> Index {
        Index::new(IndexOptions {
            dims: 4,
            metric: MetricKind::SqEuclidean,
            ..IndexOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn rejects_invalid_options() {
        assert!(Index::new(IndexOptions {
            dims: 0,
            ..IndexOptions::default()
        })
        .is_err());
        assert!(Index::new(IndexOptions {
            m: 1,
            ..IndexOptions::default()
        })
        .is_err());
        assert!(Index::new(IndexOptions {
            scalar_kind: ScalarKind::B1,
            metric: MetricKind::Cosine,
            ..IndexOptions::default()
        })
        .is_err());
    }

    #[test]
    fn shape_mismatch_detected_before_mutation() {
        let index = small_index();
        let err = index.insert(1, &f32_bytes(&[1.0, 2.0])).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 4, .. }));
        assert!(index.is_empty());
    }

    #[test]
    fn insert_get_remove_roundtrip() {
        let index = small_index();
        let v = f32_bytes(&[1.0, 2.0, 3.0, 4.0]);
        index.insert(42, &v).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.contains(42));
        assert_eq!(index.get(42).unwrap(), v);

        index.remove(42).unwrap();
        assert!(!index.contains(42));
        assert!(index.get(42).is_none());
        assert!(matches!(index.remove(42), Err(Error::UnknownId(42))));
    }

    #[test]
    fn ef_below_k_is_clamped_not_an_error() {
        let index = small_index();
        for i in 0..32u64 {
            index
                .insert(i, &f32_bytes(&[i as f32, 0.0, 0.0, 0.0]))
                .unwrap();
        }
        let hits = index
            .search_with_ef(&f32_bytes(&[0.0; 4]), 10, 1)
            .unwrap();
        assert_eq!(hits.len(), 10);
    }

    #[test]
    fn reserve_keeps_existing_vectors() {
        let index = small_index();
        index.insert(1, &f32_bytes(&[1.0, 0.0, 0.0, 0.0])).unwrap();
        index.reserve(10_000);
        assert_eq!(index.get(1).unwrap(), f32_bytes(&[1.0, 0.0, 0.0, 0.0]));
        let hits = index.search(&f32_bytes(&[1.0, 0.0, 0.0, 0.0]), 1).unwrap();
        assert_eq!(hits[0].id, 1);
    }

    #[test]
    fn concurrent_searches_during_inserts() {
        use std::sync::Arc;

        let index = Arc::new(
            Index::new(IndexOptions {
                dims: 8,
                metric: MetricKind::SqEuclidean,
                ..IndexOptions::default()
            })
            .unwrap(),
        );
        for i in 0..64u64 {
            let mut v = [0.0f32; 8];
            v[(i % 8) as usize] = i as f32;
            index.insert(i, &f32_bytes(&v)).unwrap();
        }

        let mut handles = Vec::new();
        for t in 0..4u64 {
            let index = Arc::clone(&index);
            handles.push(std::thread::spawn(move || {
                for i in 0..50u64 {
                    if t == 0 {
                        // one writer thread
                        let _ = index.insert(1000 + i, &f32_bytes(&[i as f32; 8]));
                    } else {
                        let hits = index.search(&f32_bytes(&[1.0; 8]), 5).unwrap();
                        assert!(hits.len() <= 5);
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(index.len(), 64 + 50);
    }
}
