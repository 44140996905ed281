//! # vicinity
//!
//! An embeddable approximate-nearest-neighbor search engine.
//!
//! vicinity keeps per-row vector embeddings in a navigable proximity graph
//! and exposes its distance kernels as named scalar functions, so a host
//! query engine can blend semantic similarity with geospatial and string
//! predicates over the same rows.
//!
//! ## Quick Start
//!
//! ```rust
//! use vicinity::prelude::*;
//!
//! // Create an index for 4-dimensional f32 vectors under cosine distance
//! let index = Index::new(IndexOptions {
//!     dims: 4,
//!     scalar_kind: ScalarKind::F32,
//!     metric: MetricKind::Cosine,
//!     ..IndexOptions::default()
//! }).unwrap();
//!
//! // Insert a vector as raw little-endian bytes
//! let vector: Vec<u8> = [0.1f32, 0.2, 0.3, 0.4]
//!     .iter()
//!     .flat_map(|x| x.to_le_bytes())
//!     .collect();
//! index.insert(1, &vector).unwrap();
//!
//! // Search
//! let hits = index.search(&vector, 10).unwrap();
//! assert_eq!(hits[0].id, 1);
//!
//! // Call distance kernels the way a query engine would
//! let registry = Registry::with_builtins().unwrap();
//! let edits = registry.invoke(
//!     "distance_levenshtein",
//!     &["GTR4521".into(), "GTR4512".into()],
//! ).unwrap();
//! assert_eq!(edits, ScalarValue::Int(2));
//! ```
//!
//! ## Crate Structure
//!
//! vicinity is composed of several crates:
//!
//! - [`vicinity-kernels`](https://docs.rs/vicinity-kernels) - SIMD-dispatched
//!   distance kernels (cosine, Euclidean, inner product, Hamming, Jaccard,
//!   haversine, Levenshtein)
//! - [`vicinity-core`](https://docs.rs/vicinity-core) - the proximity graph
//!   index with insertion, removal, search and binary persistence
//! - [`vicinity-extension`](https://docs.rs/vicinity-extension) - the metric
//!   registry and virtual search relation a host query engine consumes

// Re-export core types
pub use vicinity_core::{Error, Index, IndexOptions, Result, SearchHit};

// Re-export the kernel layer
pub use vicinity_kernels::{
    haversine_meters, levenshtein, Kernel, KernelError, MetricKind, ScalarKind, SimdLevel,
};

// Re-export the query-extension surface
pub use vicinity_extension::{
    ArgShape, ExtensionError, MetricDescriptor, Registry, ScalarValue, SearchRelation,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ArgShape, Error, ExtensionError, Index, IndexOptions, Kernel, KernelError,
        MetricDescriptor, MetricKind, Registry, Result, ScalarKind, ScalarValue, SearchHit,
        SearchRelation, SimdLevel,
    };
}
