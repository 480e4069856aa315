//! Input coercion.
//!
//! Tool callers send shader inputs as arbitrary JSON; the engine wants typed
//! values. Coercion is driven by the declared ISF input kind when the shader
//! declares one, and falls back to shape inference (with a warning) for
//! undeclared names.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

use crate::engine::{InputKind, InputValue};

#[derive(Debug, Error, PartialEq)]
pub enum CoercionError {
    #[error("input '{name}': cannot coerce {found} to {expected}")]
    Mismatch {
        name: String,
        expected: &'static str,
        found: String,
    },

    #[error("input '{name}': cannot infer a type for {found}")]
    Uninferable { name: String, found: String },
}

/// Coerce one raw input value.
pub fn coerce(
    name: &str,
    raw: &Value,
    declared: Option<InputKind>,
) -> Result<InputValue, CoercionError> {
    match declared {
        Some(kind) => coerce_declared(name, raw, kind),
        None => infer(name, raw),
    }
}

fn coerce_declared(name: &str, raw: &Value, kind: InputKind) -> Result<InputValue, CoercionError> {
    let mismatch = || CoercionError::Mismatch {
        name: name.to_string(),
        expected: kind.as_str(),
        found: describe_value(raw),
    };

    match kind {
        InputKind::Bool => match raw {
            Value::Bool(b) => Ok(InputValue::Bool(*b)),
            Value::String(s) => parse_bool(s).map(InputValue::Bool).ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        InputKind::Long => match raw {
            Value::Number(n) => n.as_i64().map(InputValue::Long).ok_or_else(mismatch),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(InputValue::Long)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        InputKind::Float => match raw {
            Value::Number(n) => n.as_f64().map(InputValue::Float).ok_or_else(mismatch),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(InputValue::Float)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        InputKind::Point2d => parse_components::<2>(raw)
            .map(InputValue::Point2d)
            .ok_or_else(mismatch),
        InputKind::Color => parse_components::<4>(raw)
            .map(InputValue::Color)
            .ok_or_else(mismatch),
        InputKind::Image => match raw {
            Value::String(s) if !s.is_empty() => Ok(InputValue::Image(PathBuf::from(s))),
            _ => Err(mismatch()),
        },
    }
}

/// Shape inference for inputs the shader does not declare.
fn infer(name: &str, raw: &Value) -> Result<InputValue, CoercionError> {
    tracing::warn!(input = name, "input not declared by shader, inferring type");

    match raw {
        Value::Bool(b) => Ok(InputValue::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if !n.is_f64() {
                    return Ok(InputValue::Long(i));
                }
            }
            n.as_f64()
                .map(InputValue::Float)
                .ok_or_else(|| CoercionError::Uninferable {
                    name: name.to_string(),
                    found: describe_value(raw),
                })
        }
        Value::Array(items) if items.len() == 2 => {
            parse_components::<2>(raw)
                .map(InputValue::Point2d)
                .ok_or_else(|| CoercionError::Uninferable {
                    name: name.to_string(),
                    found: describe_value(raw),
                })
        }
        Value::Array(items) if items.len() == 4 => {
            parse_components::<4>(raw)
                .map(InputValue::Color)
                .ok_or_else(|| CoercionError::Uninferable {
                    name: name.to_string(),
                    found: describe_value(raw),
                })
        }
        other => Err(CoercionError::Uninferable {
            name: name.to_string(),
            found: describe_value(other),
        }),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse N numeric components from an array of numbers or a delimited string
/// ("0.1,0.2" or "0.1 0.2").
fn parse_components<const N: usize>(raw: &Value) -> Option<[f64; N]> {
    let parts: Vec<f64> = match raw {
        Value::Array(items) => items.iter().map(|v| v.as_f64()).collect::<Option<_>>()?,
        Value::String(s) => {
            let pieces: Vec<&str> = if s.contains(',') {
                s.split(',').map(str::trim).collect()
            } else {
                s.split_whitespace().collect()
            };
            pieces
                .iter()
                .map(|p| p.parse::<f64>().ok())
                .collect::<Option<_>>()?
        }
        _ => return None,
    };

    if parts.len() != N {
        return None;
    }

    let mut out = [0.0; N];
    out.copy_from_slice(&parts);
    Some(out)
}

fn describe_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "a boolean".to_string(),
        Value::Number(_) => "a number".to_string(),
        Value::String(s) => format!("string \"{}\"", s),
        Value::Array(items) => format!("an array of {}", items.len()),
        Value::Object(_) => "an object".to_string(),
    }
}
