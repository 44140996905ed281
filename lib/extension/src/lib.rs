//! # vicinity Extension
//!
//! The seam between the vicinity engine and a host query engine.
//!
//! Two surfaces are exposed:
//!
//! - [`Registry`] binds distance kernels to fixed names with fixed operand
//!   signatures, so a host can call them as ordinary scalar functions over
//!   two columns of a row-set - `distance_cosine_f32(a.embedding,
//!   b.embedding)`, `distance_haversine_meters(a.lat, a.lon, b.lat, b.lon)`,
//!   `distance_levenshtein(a.plate, b.plate)`.
//! - [`SearchRelation`] exposes index search as a virtual relation: given a
//!   query vector and `k` it produces `(identifier, distance)` rows the host
//!   joins back to its own tables.
//!
//! Scalar evaluations are pure and freely parallel; relations only read
//! index state. The host-specific registration mechanism (loading this as a
//! database extension and wiring names into its function catalog) is an
//! adapter outside this crate.

use thiserror::Error;

pub mod registry;
pub mod relation;
mod scalar;
pub mod value;

pub use registry::{ArgShape, MetricDescriptor, Registry};
pub use relation::SearchRelation;
pub use value::ScalarValue;

pub type Result<T> = std::result::Result<T, ExtensionError>;

#[derive(Error, Debug)]
pub enum ExtensionError {
    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    #[error("metric already registered with a different signature: {name}")]
    SignatureConflict { name: String },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Kernel(#[from] vicinity_kernels::KernelError),

    #[error(transparent)]
    Core(#[from] vicinity_core::Error),
}
