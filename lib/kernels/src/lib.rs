//! # vicinity Kernels
//!
//! Distance kernel library for the vicinity search engine.
//!
//! A kernel is a low-level routine computing one distance value between two
//! operands. Dense kernels work over raw little-endian byte buffers so the
//! same storage the index and host blobs use feeds them without copies. The
//! fastest implementation for the running CPU is picked once, when a
//! [`Kernel`] is bound - selection is a pure function of
//! `(ScalarKind, MetricKind, SimdLevel)` and per-call cost is one indirect
//! call.
//!
//! ```rust
//! use vicinity_kernels::{Kernel, MetricKind, ScalarKind};
//!
//! let kernel = Kernel::bind(ScalarKind::F32, MetricKind::Cosine).unwrap();
//! let a: Vec<u8> = [1.0f32, 0.0].iter().flat_map(|x| x.to_le_bytes()).collect();
//! let b: Vec<u8> = [0.0f32, 1.0].iter().flat_map(|x| x.to_le_bytes()).collect();
//! assert!((kernel.distance(&a, &b) - 1.0).abs() < 1e-6);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod geo;
mod quantized;
mod simd;
pub mod text;

pub use geo::{haversine_meters, EARTH_RADIUS_METERS};
pub use text::levenshtein;

pub type Result<T> = std::result::Result<T, KernelError>;

#[derive(Error, Debug)]
pub enum KernelError {
    #[error("operand shape mismatch: {left} bytes vs {right} bytes")]
    ShapeMismatch { left: usize, right: usize },

    #[error("no kernel for {metric:?} over {scalar:?} operands")]
    Unsupported {
        scalar: ScalarKind,
        metric: MetricKind,
    },
}

/// Element type of a dense vector. `B1` packs 8 dimensions per byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    F64,
    F32,
    F16,
    I8,
    B1,
}

impl ScalarKind {
    #[inline]
    #[must_use]
    pub fn bits_per_scalar(self) -> usize {
        match self {
            ScalarKind::F64 => 64,
            ScalarKind::F32 => 32,
            ScalarKind::F16 => 16,
            ScalarKind::I8 => 8,
            ScalarKind::B1 => 1,
        }
    }

    /// Buffer size in bytes for a vector of `dims` dimensions.
    #[inline]
    #[must_use]
    pub fn bytes_for(self, dims: usize) -> usize {
        (dims * self.bits_per_scalar() + 7) / 8
    }

    /// Dimensionality of a buffer of `bytes` bytes.
    #[inline]
    #[must_use]
    pub fn dims_for(self, bytes: usize) -> usize {
        bytes * 8 / self.bits_per_scalar()
    }

    /// Suffix used in scalar-function names, e.g. `f32` in
    /// `distance_cosine_f32`.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            ScalarKind::F64 => "f64",
            ScalarKind::F32 => "f32",
            ScalarKind::F16 => "f16",
            ScalarKind::I8 => "i8",
            ScalarKind::B1 => "binary",
        }
    }
}

/// Distance family. All kernels return distances: lower means more similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    Cosine,
    SqEuclidean,
    Euclidean,
    InnerProduct,
    Hamming,
    Jaccard,
    Haversine,
    Levenshtein,
}

impl MetricKind {
    /// Whether the metric runs over dense numeric buffers (as opposed to
    /// text operands).
    #[must_use]
    pub fn is_dense(self) -> bool {
        !matches!(self, MetricKind::Levenshtein)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            MetricKind::Cosine => "cosine",
            MetricKind::SqEuclidean => "sqeuclidean",
            MetricKind::Euclidean => "euclidean",
            MetricKind::InnerProduct => "inner",
            MetricKind::Hamming => "hamming",
            MetricKind::Jaccard => "jaccard",
            MetricKind::Haversine => "haversine",
            MetricKind::Levenshtein => "levenshtein",
        }
    }
}

/// Vector instruction sets a kernel can be specialized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdLevel {
    Avx2,
    Sse,
    Neon,
    Scalar,
}

impl SimdLevel {
    /// Detect the best level the running CPU supports.
    #[must_use]
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
                return SimdLevel::Avx2;
            }
            if is_x86_feature_detected!("sse") {
                return SimdLevel::Sse;
            }
        }

        #[cfg(target_arch = "aarch64")]
        {
            if std::arch::is_aarch64_feature_detected!("neon") {
                return SimdLevel::Neon;
            }
        }

        SimdLevel::Scalar
    }
}

/// A dense kernel: two equal-length raw buffers in, one distance out.
/// Dimensionality is implied by buffer length and [`ScalarKind`].
pub type DenseKernel = fn(&[u8], &[u8]) -> f32;

/// A bound kernel: metric + element type + the implementation selected for
/// this machine.
#[derive(Debug, Clone, Copy)]
pub struct Kernel {
    scalar: ScalarKind,
    metric: MetricKind,
    simd: SimdLevel,
    func: DenseKernel,
}

impl Kernel {
    /// Bind the fastest available implementation for the detected CPU.
    pub fn bind(scalar: ScalarKind, metric: MetricKind) -> Result<Self> {
        Self::bind_with(scalar, metric, SimdLevel::detect())
    }

    /// Bind for an explicit capability level. Levels the current
    /// architecture cannot honor fall back to the portable path.
    pub fn bind_with(scalar: ScalarKind, metric: MetricKind, simd: SimdLevel) -> Result<Self> {
        let func = select(scalar, metric, simd)
            .ok_or(KernelError::Unsupported { scalar, metric })?;
        Ok(Self {
            scalar,
            metric,
            simd,
            func,
        })
    }

    #[inline]
    #[must_use]
    pub fn scalar_kind(&self) -> ScalarKind {
        self.scalar
    }

    #[inline]
    #[must_use]
    pub fn metric(&self) -> MetricKind {
        self.metric
    }

    #[inline]
    #[must_use]
    pub fn simd_level(&self) -> SimdLevel {
        self.simd
    }

    /// Compute the distance between two buffers the caller has already
    /// validated. Shape agreement is the caller's contract.
    #[inline]
    pub fn distance(&self, a: &[u8], b: &[u8]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        (self.func)(a, b)
    }

    /// Shape-checked variant for operands arriving from untrusted input.
    pub fn distance_checked(&self, a: &[u8], b: &[u8]) -> Result<f32> {
        if a.len() != b.len() {
            return Err(KernelError::ShapeMismatch {
                left: a.len(),
                right: b.len(),
            });
        }
        Ok((self.func)(a, b))
    }
}

/// Turn a dot product and two squared norms into a cosine distance.
/// A zero-norm operand yields the maximal distance `1.0`, never NaN, so
/// orderings over mixed rows stay total.
#[inline]
pub(crate) fn cosine_from_parts(dot: f32, norm_a_sq: f32, norm_b_sq: f32) -> f32 {
    if norm_a_sq == 0.0 || norm_b_sq == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a_sq.sqrt() * norm_b_sq.sqrt())
}

fn euclidean_f32_scalar(a: &[u8], b: &[u8]) -> f32 {
    simd::sqeuclidean_f32_scalar(a, b).sqrt()
}

fn inner_f32_scalar(a: &[u8], b: &[u8]) -> f32 {
    1.0 - simd::dot_f32_scalar(a, b)
}

#[cfg(target_arch = "x86_64")]
fn euclidean_f32_avx2(a: &[u8], b: &[u8]) -> f32 {
    simd::sqeuclidean_f32_avx2(a, b).sqrt()
}

#[cfg(target_arch = "x86_64")]
fn inner_f32_avx2(a: &[u8], b: &[u8]) -> f32 {
    1.0 - simd::dot_f32_avx2(a, b)
}

#[cfg(target_arch = "x86_64")]
fn euclidean_f32_sse(a: &[u8], b: &[u8]) -> f32 {
    simd::sqeuclidean_f32_sse(a, b).sqrt()
}

#[cfg(target_arch = "x86_64")]
fn inner_f32_sse(a: &[u8], b: &[u8]) -> f32 {
    1.0 - simd::dot_f32_sse(a, b)
}

#[cfg(target_arch = "aarch64")]
fn euclidean_f32_neon(a: &[u8], b: &[u8]) -> f32 {
    simd::sqeuclidean_f32_neon(a, b).sqrt()
}

#[cfg(target_arch = "aarch64")]
fn inner_f32_neon(a: &[u8], b: &[u8]) -> f32 {
    1.0 - simd::dot_f32_neon(a, b)
}

fn select(scalar: ScalarKind, metric: MetricKind, simd: SimdLevel) -> Option<DenseKernel> {
    use MetricKind::*;
    use ScalarKind::*;

    let func: DenseKernel = match (scalar, metric) {
        (F32, Cosine) => match simd {
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Avx2 => simd::cosine_f32_avx2,
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Sse => simd::cosine_f32_sse,
            #[cfg(target_arch = "aarch64")]
            SimdLevel::Neon => simd::cosine_f32_neon,
            _ => simd::cosine_f32_scalar,
        },
        (F32, SqEuclidean) => match simd {
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Avx2 => simd::sqeuclidean_f32_avx2,
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Sse => simd::sqeuclidean_f32_sse,
            #[cfg(target_arch = "aarch64")]
            SimdLevel::Neon => simd::sqeuclidean_f32_neon,
            _ => simd::sqeuclidean_f32_scalar,
        },
        (F32, Euclidean) => match simd {
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Avx2 => euclidean_f32_avx2,
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Sse => euclidean_f32_sse,
            #[cfg(target_arch = "aarch64")]
            SimdLevel::Neon => euclidean_f32_neon,
            _ => euclidean_f32_scalar,
        },
        (F32, InnerProduct) => match simd {
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Avx2 => inner_f32_avx2,
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Sse => inner_f32_sse,
            #[cfg(target_arch = "aarch64")]
            SimdLevel::Neon => inner_f32_neon,
            _ => inner_f32_scalar,
        },

        (F64, Cosine) => quantized::cosine_f64,
        (F64, SqEuclidean) => quantized::sqeuclidean_f64,
        (F64, Euclidean) => quantized::euclidean_f64,
        (F64, InnerProduct) => quantized::inner_f64,
        (F64, Haversine) => geo::haversine_f64,

        (F16, Cosine) => quantized::cosine_f16,
        (F16, SqEuclidean) => quantized::sqeuclidean_f16,
        (F16, Euclidean) => quantized::euclidean_f16,
        (F16, InnerProduct) => quantized::inner_f16,

        (I8, Cosine) => quantized::cosine_i8,
        (I8, SqEuclidean) => quantized::sqeuclidean_i8,
        (I8, Euclidean) => quantized::euclidean_i8,
        (I8, InnerProduct) => quantized::inner_i8,

        (B1, Hamming) => quantized::hamming_b1,
        (B1, Jaccard) => quantized::jaccard_b1,

        _ => return None,
    };

    Some(func)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_bytes(v: &[f32]) -> Vec<u8> {
        v.iter().flat_map(|x| x.to_le_bytes()).collect()
    }

    #[test]
    fn cosine_of_vector_with_itself_is_zero() {
        let kernel = Kernel::bind(ScalarKind::F32, MetricKind::Cosine).unwrap();
        let v = f32_bytes(&[0.3, -1.2, 4.5, 0.01, 2.0]);
        assert!(kernel.distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn zero_norm_cosine_is_maximal_not_nan() {
        let kernel = Kernel::bind(ScalarKind::F32, MetricKind::Cosine).unwrap();
        let zero = f32_bytes(&[0.0; 8]);
        let v = f32_bytes(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(kernel.distance(&zero, &v), 1.0);
        assert_eq!(kernel.distance(&zero, &zero), 1.0);
    }

    #[test]
    fn unsupported_pairs_are_rejected() {
        assert!(Kernel::bind(ScalarKind::F32, MetricKind::Hamming).is_err());
        assert!(Kernel::bind(ScalarKind::B1, MetricKind::Cosine).is_err());
        assert!(Kernel::bind(ScalarKind::F32, MetricKind::Levenshtein).is_err());
    }

    #[test]
    fn accelerated_and_portable_selection_agree() {
        let a = f32_bytes(&(0..64).map(|i| (i as f32 * 0.7).sin()).collect::<Vec<_>>());
        let b = f32_bytes(&(0..64).map(|i| (i as f32 * 0.3).cos()).collect::<Vec<_>>());

        let fast = Kernel::bind(ScalarKind::F32, MetricKind::SqEuclidean).unwrap();
        let slow =
            Kernel::bind_with(ScalarKind::F32, MetricKind::SqEuclidean, SimdLevel::Scalar)
                .unwrap();
        assert!((fast.distance(&a, &b) - slow.distance(&a, &b)).abs() < 1e-3);
    }

    #[test]
    fn checked_distance_rejects_shape_mismatch() {
        let kernel = Kernel::bind(ScalarKind::F32, MetricKind::Cosine).unwrap();
        let a = f32_bytes(&[1.0, 2.0]);
        let b = f32_bytes(&[1.0, 2.0, 3.0]);
        assert!(matches!(
            kernel.distance_checked(&a, &b),
            Err(KernelError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn scalar_kind_geometry() {
        assert_eq!(ScalarKind::F32.bytes_for(256), 1024);
        assert_eq!(ScalarKind::F32.dims_for(1024), 256);
        assert_eq!(ScalarKind::B1.bytes_for(8), 1);
        assert_eq!(ScalarKind::B1.dims_for(2), 16);
        assert_eq!(ScalarKind::F16.bytes_for(3), 6);
    }
}
