//! # vicinity Core
//!
//! Core library for the vicinity search engine.
//!
//! This crate provides the proximity-graph index:
//!
//! - [`Index`] - multi-layer navigable graph over vector identifiers with
//!   approximate k-nearest-neighbor search, insertion, removal and binary
//!   persistence
//! - [`IndexOptions`] - dimensionality, element type, metric and graph
//!   parameters, fixed at creation
//! - [`SearchHit`] - one `(identifier, distance)` result row
//!
//! Distance kernels come from [`vicinity_kernels`] and are selected once at
//! index creation for the running CPU.
//!
//! ## Example
//!
//! ```rust
//! use vicinity_core::{Index, IndexOptions};
//! use vicinity_core::kernels::{MetricKind, ScalarKind};
//!
//! let index = Index::new(IndexOptions {
//!     dims: 4,
//!     scalar_kind: ScalarKind::F32,
//!     metric: MetricKind::Cosine,
//!     ..IndexOptions::default()
//! }).unwrap();
//!
//! let vector: Vec<u8> = [0.1f32, 0.2, 0.3, 0.4]
//!     .iter()
//!     .flat_map(|x| x.to_le_bytes())
//!     .collect();
//! index.insert(1, &vector).unwrap();
//!
//! let hits = index.search(&vector, 1).unwrap();
//! assert_eq!(hits[0].id, 1);
//! ```

pub mod error;
mod graph;
pub mod index;
mod persist;

pub use error::{Error, Result};
pub use index::{Index, IndexOptions, SearchHit};

/// Re-export of the kernel crate for embedders that bind kernels directly.
pub use vicinity_kernels as kernels;
