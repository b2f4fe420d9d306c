use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Scalar written into a template field or a run name.
///
/// Plans spell values as plain YAML scalars; `5` is an integer, `1.17` a
/// float, `true` a boolean and anything quoted or non-numeric is text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisValue {
    /// Boolean flag rendered as `true`/`false`.
    Bool(bool),
    /// Integer rendered in decimal.
    Int(i64),
    /// Float rendered in shortest round-trip form with a fractional part.
    Float(f64),
    /// Text rendered verbatim.
    Text(String),
}

impl AxisValue {
    /// Text written into the template and used in run names.
    pub fn render(&self) -> String {
        match self {
            AxisValue::Bool(flag) => flag.to_string(),
            AxisValue::Int(value) => value.to_string(),
            AxisValue::Float(value) => {
                let mut text = value.to_string();
                if value.is_finite() && !text.contains('.') {
                    text.push_str(".0");
                }
                text
            }
            AxisValue::Text(text) => text.clone(),
        }
    }

    /// Whether the value can be written and hashed deterministically.
    pub fn is_finite(&self) -> bool {
        match self {
            AxisValue::Float(value) => value.is_finite(),
            _ => true,
        }
    }
}

impl Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<i64> for AxisValue {
    fn from(value: i64) -> Self {
        AxisValue::Int(value)
    }
}

impl From<i32> for AxisValue {
    fn from(value: i32) -> Self {
        AxisValue::Int(i64::from(value))
    }
}

impl From<f64> for AxisValue {
    fn from(value: f64) -> Self {
        AxisValue::Float(value)
    }
}

impl From<bool> for AxisValue {
    fn from(value: bool) -> Self {
        AxisValue::Bool(value)
    }
}

impl From<&str> for AxisValue {
    fn from(value: &str) -> Self {
        AxisValue::Text(value.to_string())
    }
}
