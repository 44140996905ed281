//! Row-wise scalar evaluation of registered metrics.
//!
//! Hosts hand operands over in whichever encoding their rows carry: dense
//! vectors as blobs, as text-encoded numeric lists, or spread across an even
//! run of scalar columns. All shape validation happens here, before any
//! kernel runs.

use half::f16;
use rayon::prelude::*;
use vicinity_kernels::{geo, text, ScalarKind};

use crate::registry::{ArgShape, MetricDescriptor, Registry};
use crate::{ExtensionError, Result, ScalarValue};

impl Registry {
    /// Evaluate one row of operands under a registered metric name.
    pub fn invoke(&self, name: &str, args: &[ScalarValue]) -> Result<ScalarValue> {
        self.resolve(name)?.invoke(args)
    }

    /// Evaluate many rows. Evaluations are pure, so the batch fans out
    /// across the rayon pool.
    pub fn evaluate_rows(
        &self,
        name: &str,
        rows: &[Vec<ScalarValue>],
    ) -> Result<Vec<ScalarValue>> {
        let descriptor = self.resolve(name)?;
        rows.par_iter().map(|row| descriptor.invoke(row)).collect()
    }
}

impl MetricDescriptor {
    /// Evaluate one row of operands against this metric.
    pub fn invoke(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        match self.shape() {
            ArgShape::Texts => invoke_texts(args),
            ArgShape::CoordinatePairs => self.invoke_coordinates(args),
            ArgShape::Dense(scalar) => self.invoke_dense(scalar, args),
        }
    }

    fn bound_kernel(&self) -> Result<&vicinity_kernels::Kernel> {
        self.kernel.as_ref().ok_or_else(|| {
            ExtensionError::InvalidArguments("metric carries no dense kernel".to_string())
        })
    }

    fn invoke_dense(&self, scalar: ScalarKind, args: &[ScalarValue]) -> Result<ScalarValue> {
        let kernel = self.bound_kernel()?;

        match args {
            [ScalarValue::Blob(a), ScalarValue::Blob(b)] => {
                if a.len() != b.len() {
                    return Err(ExtensionError::InvalidArguments(
                        "vectors have different number of dimensions".to_string(),
                    ));
                }
                Ok(ScalarValue::Float(kernel.distance_checked(a, b)? as f64))
            }
            [ScalarValue::Text(a), ScalarValue::Text(b)] => {
                let va = parse_vector_text(a)?;
                let vb = parse_vector_text(b)?;
                if va.len() != vb.len() {
                    return Err(ExtensionError::InvalidArguments(
                        "vectors have different number of dimensions".to_string(),
                    ));
                }
                let ba = encode_vector(scalar, &va)?;
                let bb = encode_vector(scalar, &vb)?;
                Ok(ScalarValue::Float(kernel.distance(&ba, &bb) as f64))
            }
            _ => {
                if args.len() < 2 || args.len() % 2 != 0 {
                    return Err(ExtensionError::InvalidArguments(
                        "number of scalar columns must be divisible by two".to_string(),
                    ));
                }
                let numbers = coerce_numbers(args)?;
                let (first, second) = numbers.split_at(numbers.len() / 2);
                let ba = encode_vector(scalar, first)?;
                let bb = encode_vector(scalar, second)?;
                Ok(ScalarValue::Float(kernel.distance(&ba, &bb) as f64))
            }
        }
    }

    fn invoke_coordinates(&self, args: &[ScalarValue]) -> Result<ScalarValue> {
        match args {
            [ScalarValue::Blob(a), ScalarValue::Blob(b)] => {
                if a.len() != 16 || b.len() != 16 {
                    return Err(ExtensionError::InvalidArguments(
                        "coordinate blobs must hold two f64 values each".to_string(),
                    ));
                }
                let kernel = self.bound_kernel()?;
                Ok(ScalarValue::Float(kernel.distance_checked(a, b)? as f64))
            }
            _ if args.len() == 4 => {
                let numbers = coerce_numbers(args)?;
                Ok(ScalarValue::Float(geo::haversine_meters(
                    numbers[0], numbers[1], numbers[2], numbers[3],
                )))
            }
            _ => Err(ExtensionError::InvalidArguments(
                "expects (lat1, lon1, lat2, lon2) scalars or two coordinate blobs".to_string(),
            )),
        }
    }
}

fn invoke_texts(args: &[ScalarValue]) -> Result<ScalarValue> {
    match args {
        [ScalarValue::Text(a), ScalarValue::Text(b)] => {
            Ok(ScalarValue::Int(text::levenshtein(a, b) as i64))
        }
        _ => Err(ExtensionError::InvalidArguments(
            "expects two text arguments".to_string(),
        )),
    }
}

fn coerce_numbers(args: &[ScalarValue]) -> Result<Vec<f64>> {
    args.iter()
        .map(|v| {
            v.as_number().ok_or_else(|| {
                ExtensionError::InvalidArguments(
                    "scalar columns may only contain integers, floats, or NULLs".to_string(),
                )
            })
        })
        .collect()
}

/// Parse a text-encoded numeric list: a JSON array like `[0.1, 0.2]` or a
/// bare comma-separated run like `0.1, 0.2`.
fn parse_vector_text(s: &str) -> Result<Vec<f64>> {
    let trimmed = s.trim();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| {
            ExtensionError::InvalidArguments(format!("number can't be parsed: {e}"))
        });
    }
    trimmed
        .split(',')
        .map(|part| {
            part.trim().parse::<f64>().map_err(|_| {
                ExtensionError::InvalidArguments(format!(
                    "number can't be parsed: {:?}",
                    part.trim()
                ))
            })
        })
        .collect()
}

/// Pack parsed numbers into the element type the kernel was bound for.
fn encode_vector(scalar: ScalarKind, values: &[f64]) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(scalar.bytes_for(values.len()));
    match scalar {
        ScalarKind::F64 => {
            for &v in values {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
        }
        ScalarKind::F32 => {
            for &v in values {
                bytes.extend_from_slice(&(v as f32).to_le_bytes());
            }
        }
        ScalarKind::F16 => {
            for &v in values {
                bytes.extend_from_slice(&f16::from_f64(v).to_bits().to_le_bytes());
            }
        }
        ScalarKind::I8 => {
            for &v in values {
                bytes.push(v.clamp(i8::MIN as f64, i8::MAX as f64) as i8 as u8);
            }
        }
        ScalarKind::B1 => {
            return Err(ExtensionError::InvalidArguments(
                "binary vectors must be passed as blobs".to_string(),
            ));
        }
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_blob(v: &[f32]) -> ScalarValue {
        ScalarValue::Blob(v.iter().flat_map(|x| x.to_le_bytes()).collect())
    }

    fn builtins() -> Registry {
        Registry::with_builtins().unwrap()
    }

    #[test]
    fn cosine_blob_of_identical_vectors_is_zero() {
        let registry = builtins();
        let v = f32_blob(&[0.5, -0.25, 1.0, 2.0]);
        let out = registry
            .invoke("distance_cosine_f32", &[v.clone(), v])
            .unwrap();
        let ScalarValue::Float(d) = out else {
            panic!("expected float")
        };
        assert!(d.abs() < 1e-6);
    }

    #[test]
    fn text_encodings_agree_with_blobs() {
        let registry = builtins();
        let blob = registry
            .invoke(
                "distance_sqeuclidean_f32",
                &[f32_blob(&[1.0, 2.0, 3.0]), f32_blob(&[1.0, 2.0, 5.0])],
            )
            .unwrap();
        let json = registry
            .invoke(
                "distance_sqeuclidean_f32",
                &["[1, 2, 3]".into(), "[1, 2, 5]".into()],
            )
            .unwrap();
        let csv = registry
            .invoke(
                "distance_sqeuclidean_f32",
                &["1, 2, 3".into(), "1, 2, 5".into()],
            )
            .unwrap();
        assert_eq!(blob, json);
        assert_eq!(json, csv);
        let ScalarValue::Float(d) = blob else {
            panic!("expected float")
        };
        assert!((d - 4.0).abs() < 1e-6);
    }

    #[test]
    fn scalar_columns_split_into_two_halves() {
        let registry = builtins();
        // (1, 0) vs (0, 1) squared euclidean = 2, with NULL coercing to 0
        let out = registry
            .invoke(
                "distance_sqeuclidean_f32",
                &[
                    ScalarValue::Int(1),
                    ScalarValue::Null,
                    ScalarValue::Float(0.0),
                    ScalarValue::Int(1),
                ],
            )
            .unwrap();
        assert_eq!(out, ScalarValue::Float(2.0));
    }

    #[test]
    fn haversine_four_scalars_and_identical_points() {
        let registry = builtins();
        let same = registry
            .invoke(
                "distance_haversine_meters",
                &[
                    ScalarValue::Float(40.7128),
                    ScalarValue::Float(-74.0060),
                    ScalarValue::Float(40.7128),
                    ScalarValue::Float(-74.0060),
                ],
            )
            .unwrap();
        assert_eq!(same, ScalarValue::Float(0.0));

        let ny_la = registry
            .invoke(
                "distance_haversine_meters",
                &[
                    ScalarValue::Float(40.7128),
                    ScalarValue::Float(-74.0060),
                    ScalarValue::Float(34.0522),
                    ScalarValue::Float(-118.2437),
                ],
            )
            .unwrap();
        let ScalarValue::Float(d) = ny_la else {
            panic!("expected float")
        };
        assert!((3.90e6..4.00e6).contains(&d));
    }

    #[test]
    fn levenshtein_returns_integer_edits() {
        let registry = builtins();
        assert_eq!(
            registry
                .invoke("distance_levenshtein", &["GTR4521".into(), "GTR4512".into()])
                .unwrap(),
            ScalarValue::Int(2)
        );
        assert!(registry
            .invoke("distance_levenshtein", &[ScalarValue::Int(1), "x".into()])
            .is_err());
    }

    #[test]
    fn hamming_binary_blobs() {
        let registry = builtins();
        let out = registry
            .invoke(
                "distance_hamming_binary",
                &[
                    ScalarValue::Blob(vec![0b1111_0000]),
                    ScalarValue::Blob(vec![0b0000_1111]),
                ],
            )
            .unwrap();
        assert_eq!(out, ScalarValue::Float(8.0));
    }

    #[test]
    fn mismatched_dimensions_error_before_any_kernel_runs() {
        let registry = builtins();
        let err = registry
            .invoke(
                "distance_cosine_f32",
                &[f32_blob(&[1.0, 2.0]), f32_blob(&[1.0, 2.0, 3.0])],
            )
            .unwrap_err();
        assert!(matches!(err, ExtensionError::InvalidArguments(_)));

        assert!(registry
            .invoke("distance_cosine_f32", &["[1, 2]".into(), "[1]".into()])
            .is_err());
        assert!(registry
            .invoke("distance_cosine_f32", &[ScalarValue::Int(1)])
            .is_err());
    }

    #[test]
    fn batch_evaluation_matches_single_rows() {
        let registry = builtins();
        let rows: Vec<Vec<ScalarValue>> = (0..64)
            .map(|i| {
                vec![
                    f32_blob(&[i as f32, 1.0]),
                    f32_blob(&[i as f32 + 1.0, 1.0]),
                ]
            })
            .collect();
        let batch = registry
            .evaluate_rows("distance_sqeuclidean_f32", &rows)
            .unwrap();
        assert_eq!(batch.len(), 64);
        for (row, out) in rows.iter().zip(&batch) {
            assert_eq!(registry.invoke("distance_sqeuclidean_f32", row).unwrap(), *out);
        }
    }
}
