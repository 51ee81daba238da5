use crate::utils::error::{DbError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker the service writes for NULL cells in text results.
pub const NULL_MARKER: &str = "\\N";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl Value {
    /// Decodes one text cell according to the column's type string.
    pub fn decode(raw: &str, type_name: &str) -> Result<Self> {
        if raw == NULL_MARKER {
            return Ok(Value::Null);
        }

        let base_type = type_name
            .split(|c: char| c == '(' || c == '<')
            .next()
            .unwrap_or(type_name)
            .trim()
            .to_ascii_lowercase();

        let invalid = |e: &dyn fmt::Display| DbError::DecodeError {
            message: format!("cannot read '{}' as {}: {}", raw, type_name, e),
        };

        match base_type.as_str() {
            "tinyint" | "smallint" | "int" | "bigint" => {
                raw.trim().parse::<i64>().map(Value::Int).map_err(|e| invalid(&e))
            }
            "float" | "double" => raw
                .trim()
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|e| invalid(&e)),
            "boolean" => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(invalid(&"expected true or false")),
            },
            _ => Ok(Value::String(raw.to_string())),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
        }
    }
}

/// One result row, values in column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row(pub Vec<Value>);

impl Row {
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row(values)
    }
}

impl std::ops::Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}
