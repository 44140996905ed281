//! Named distance functions a host engine can call as ordinary scalar
//! functions over row columns.

use std::collections::HashMap;

use ahash::RandomState;
use tracing::debug;
use vicinity_kernels::{Kernel, MetricKind, ScalarKind};

use crate::{ExtensionError, Result};

/// Declared operand signature of a registered metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    /// Two dense vectors of the given element type: a pair of blobs, a pair
    /// of text-encoded numeric lists, or an even run of scalar columns.
    Dense(ScalarKind),
    /// Two `(lat, lon)` coordinate pairs: four numeric scalars or two f64
    /// blobs.
    CoordinatePairs,
    /// Exactly two text operands.
    Texts,
}

/// A registered metric: fixed name, fixed operand signature, and the kernel
/// bound for this machine. Immutable after registration.
#[derive(Debug, Clone)]
pub struct MetricDescriptor {
    name: String,
    shape: ArgShape,
    metric: MetricKind,
    pub(crate) kernel: Option<Kernel>,
}

impl MetricDescriptor {
    /// A dense metric under the conventional name
    /// `distance_<metric>_<type>`, e.g. `distance_cosine_f32`.
    pub fn dense(scalar: ScalarKind, metric: MetricKind) -> Result<Self> {
        let kernel = Kernel::bind(scalar, metric)?;
        Ok(Self {
            name: format!("distance_{}_{}", metric.name(), scalar.suffix()),
            shape: ArgShape::Dense(scalar),
            metric,
            kernel: Some(kernel),
        })
    }

    /// Great-circle distance in meters, `distance_haversine_meters`.
    pub fn haversine_meters() -> Result<Self> {
        let kernel = Kernel::bind(ScalarKind::F64, MetricKind::Haversine)?;
        Ok(Self {
            name: "distance_haversine_meters".to_string(),
            shape: ArgShape::CoordinatePairs,
            metric: MetricKind::Haversine,
            kernel: Some(kernel),
        })
    }

    /// Edit distance over two text columns, `distance_levenshtein`.
    #[must_use]
    pub fn levenshtein() -> Self {
        Self {
            name: "distance_levenshtein".to_string(),
            shape: ArgShape::Texts,
            metric: MetricKind::Levenshtein,
            kernel: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn shape(&self) -> ArgShape {
        self.shape
    }

    #[inline]
    #[must_use]
    pub fn metric(&self) -> MetricKind {
        self.metric
    }

    fn same_signature(&self, other: &Self) -> bool {
        self.shape == other.shape && self.metric == other.metric
    }
}

/// The catalog of callable metrics. Registration is idempotent by name;
/// re-registering a name with a different signature is an error.
pub struct Registry {
    entries: HashMap<String, MetricDescriptor, RandomState>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::default(),
        }
    }

    /// The fixed builtin catalog: cosine, squared-Euclidean and
    /// inner-product over f64/f32/f16/i8, Hamming and Jaccard over binary
    /// vectors, haversine meters, and Levenshtein.
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();

        for scalar in [
            ScalarKind::F64,
            ScalarKind::F32,
            ScalarKind::F16,
            ScalarKind::I8,
        ] {
            for metric in [
                MetricKind::Cosine,
                MetricKind::SqEuclidean,
                MetricKind::InnerProduct,
            ] {
                registry.register(MetricDescriptor::dense(scalar, metric)?)?;
            }
        }

        registry.register(MetricDescriptor::dense(ScalarKind::B1, MetricKind::Hamming)?)?;
        registry.register(MetricDescriptor::dense(ScalarKind::B1, MetricKind::Jaccard)?)?;
        registry.register(MetricDescriptor::haversine_meters()?)?;
        registry.register(MetricDescriptor::levenshtein())?;

        Ok(registry)
    }

    pub fn register(&mut self, descriptor: MetricDescriptor) -> Result<()> {
        if let Some(existing) = self.entries.get(descriptor.name()) {
            if existing.same_signature(&descriptor) {
                return Ok(());
            }
            return Err(ExtensionError::SignatureConflict {
                name: descriptor.name().to_string(),
            });
        }
        debug!(name = descriptor.name(), "metric registered");
        self.entries
            .insert(descriptor.name().to_string(), descriptor);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MetricDescriptor> {
        self.entries.get(name)
    }

    pub fn resolve(&self, name: &str) -> Result<&MetricDescriptor> {
        self.entries
            .get(name)
            .ok_or_else(|| ExtensionError::UnknownMetric(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricDescriptor> {
        self.entries.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_resolves_conventional_names() {
        let registry = Registry::with_builtins().unwrap();
        for name in [
            "distance_cosine_f32",
            "distance_cosine_f16",
            "distance_cosine_i8",
            "distance_sqeuclidean_f64",
            "distance_inner_f32",
            "distance_hamming_binary",
            "distance_jaccard_binary",
            "distance_haversine_meters",
            "distance_levenshtein",
        ] {
            assert!(registry.get(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn registration_is_idempotent_by_name() {
        let mut registry = Registry::new();
        let d = MetricDescriptor::dense(ScalarKind::F32, MetricKind::Cosine).unwrap();
        registry.register(d.clone()).unwrap();
        registry.register(d).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn conflicting_signature_is_rejected() {
        let mut registry = Registry::new();
        registry
            .register(MetricDescriptor::dense(ScalarKind::F32, MetricKind::Cosine).unwrap())
            .unwrap();

        // same name, different element type
        let mut imposter =
            MetricDescriptor::dense(ScalarKind::F16, MetricKind::Cosine).unwrap();
        imposter.name = "distance_cosine_f32".to_string();

        assert!(matches!(
            registry.register(imposter),
            Err(ExtensionError::SignatureConflict { .. })
        ));
    }

    #[test]
    fn unknown_metric_errors() {
        let registry = Registry::new();
        assert!(matches!(
            registry.resolve("distance_chebyshev_f32"),
            Err(ExtensionError::UnknownMetric(_))
        ));
    }
}
