//! Source-specific normalization of extracted values
//!
//! A normalizer turns the raw field → JSON value mapping produced by path
//! evaluation into field → float. Named normalizers are selected from the
//! engine config; anything more exotic implements `Normalize` directly.

use crate::engine::Sample;
use crate::error::ExtractError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Field name → raw value selected by its path
pub type RawFields = BTreeMap<String, Value>;

/// Transform contract for per-source normalization
pub trait Normalize: Send + Sync + fmt::Debug {
    fn normalize(&self, raw: &RawFields) -> Result<Sample, ExtractError>;
}

/// Named normalizers available from configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Normalizer {
    /// Numbers pass through, numeric strings are parsed
    ParseNumeric,
    /// `value * factor`
    Scale { factor: f64 },
    /// `value * scale + offset`
    Affine { scale: f64, offset: f64 },
}

impl Normalize for Normalizer {
    fn normalize(&self, raw: &RawFields) -> Result<Sample, ExtractError> {
        raw.iter()
            .map(|(field, value)| {
                let x = parse_numeric(field, value)?;
                let y = match *self {
                    Normalizer::ParseNumeric => x,
                    Normalizer::Scale { factor } => x * factor,
                    Normalizer::Affine { scale, offset } => x * scale + offset,
                };
                Ok((field.clone(), finite(field, y)?))
            })
            .collect()
    }
}

/// Strict coercion used when a source has no normalizer
pub fn require_number(field: &str, value: &Value) -> Result<f64, ExtractError> {
    value.as_f64().ok_or_else(|| ExtractError::NotNumeric {
        field: field.to_string(),
        value: value.to_string(),
    })
}

fn parse_numeric(field: &str, value: &Value) -> Result<f64, ExtractError> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| ExtractError::Normalize {
            field: field.to_string(),
            reason: format!("{} is not representable as f64", n),
        }),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .ok_or_else(|| ExtractError::Normalize {
                field: field.to_string(),
                reason: format!("'{}' is not a number", s),
            }),
        other => Err(ExtractError::Normalize {
            field: field.to_string(),
            reason: format!("unsupported value {}", other),
        }),
    }
}

/// Reject NaN and infinities, which the ledger cannot store
pub fn finite(field: &str, value: f64) -> Result<f64, ExtractError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ExtractError::Normalize {
            field: field.to_string(),
            reason: format!("{} is not a finite number", value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn raw(pairs: &[(&str, Value)]) -> RawFields {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_parse_numeric_accepts_strings() {
        let sample = Normalizer::ParseNumeric
            .normalize(&raw(&[("bid", json!(" 1834.25 ")), ("ask", json!(1835.5))]))
            .unwrap();
        assert_eq!(sample["bid"], 1834.25);
        assert_eq!(sample["ask"], 1835.5);
    }

    #[test]
    fn test_affine_kelvin_to_celsius() {
        let kelvin = Normalizer::Affine { scale: 1.0, offset: -273.15 };
        let sample = kelvin.normalize(&raw(&[("temperature", json!(293.15))])).unwrap();
        assert_relative_eq!(sample["temperature"], 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_scale() {
        let cents = Normalizer::Scale { factor: 0.01 };
        let sample = cents.normalize(&raw(&[("price", json!("12345"))])).unwrap();
        assert_relative_eq!(sample["price"], 123.45, epsilon = 1e-9);
    }

    #[test]
    fn test_rejects_non_numeric() {
        let err = Normalizer::ParseNumeric
            .normalize(&raw(&[("price", json!("n/a"))]))
            .unwrap_err();
        assert!(matches!(err, ExtractError::Normalize { .. }));

        let err = Normalizer::ParseNumeric
            .normalize(&raw(&[("price", json!({ "nested": 1 }))]))
            .unwrap_err();
        assert!(matches!(err, ExtractError::Normalize { .. }));
    }

    #[test]
    fn test_rejects_non_finite_strings() {
        for quoted in ["NaN", "inf", "-infinity"] {
            let err = Normalizer::ParseNumeric
                .normalize(&raw(&[("price", json!(quoted))]))
                .unwrap_err();
            assert!(matches!(err, ExtractError::Normalize { .. }), "{} accepted", quoted);
        }
    }

    #[test]
    fn test_rejects_overflow() {
        let huge = Normalizer::Scale { factor: 1e300 };
        let err = huge.normalize(&raw(&[("price", json!(1e300))])).unwrap_err();
        assert!(matches!(err, ExtractError::Normalize { .. }));
    }

    #[test]
    fn test_require_number() {
        assert_eq!(require_number("p", &json!(3)).unwrap(), 3.0);
        assert!(matches!(
            require_number("p", &json!("3")),
            Err(ExtractError::NotNumeric { .. })
        ));
    }
}
