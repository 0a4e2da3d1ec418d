use std::{
    fmt::{self, Display},
    hash::{Hash, Hasher},
};

use crate::{ExcelError, ExcelErrorKind};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A resolved cell or interpreter value.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Number(f64),
    Text(String),
    Boolean(bool),
    Array(Vec<Vec<LiteralValue>>), // For array results
    Empty,                         // For empty cells/optional arguments

    Error(ExcelError),
}

impl Hash for LiteralValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            LiteralValue::Number(n) => n.to_bits().hash(state),
            LiteralValue::Text(s) => s.hash(state),
            LiteralValue::Boolean(b) => b.hash(state),
            LiteralValue::Array(a) => a.hash(state),
            LiteralValue::Empty => state.write_u8(0),
            LiteralValue::Error(e) => e.hash(state),
        }
    }
}

impl Eq for LiteralValue {}

impl Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Number(n) => write!(f, "{n}"),
            LiteralValue::Text(s) => write!(f, "{s}"),
            LiteralValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            LiteralValue::Error(e) => write!(f, "{}", e.kind),
            LiteralValue::Array(a) => write!(f, "{a:?}"),
            LiteralValue::Empty => write!(f, ""),
        }
    }
}

impl From<f64> for LiteralValue {
    fn from(n: f64) -> Self {
        LiteralValue::Number(n)
    }
}

impl From<bool> for LiteralValue {
    fn from(b: bool) -> Self {
        LiteralValue::Boolean(b)
    }
}

impl From<&str> for LiteralValue {
    fn from(s: &str) -> Self {
        LiteralValue::Text(s.to_string())
    }
}

impl From<ExcelErrorKind> for LiteralValue {
    fn from(kind: ExcelErrorKind) -> Self {
        LiteralValue::Error(ExcelError::new(kind))
    }
}

impl LiteralValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, LiteralValue::Empty)
    }

    pub fn error_kind(&self) -> Option<ExcelErrorKind> {
        match self {
            LiteralValue::Error(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Rows × columns of the value; scalars are 1×1.
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            LiteralValue::Array(rows) => (rows.len(), rows.first().map_or(0, Vec::len)),
            _ => (1, 1),
        }
    }

    /// Collapse a 1×1 array to its only element; other values are returned unchanged.
    pub fn into_scalar_if_single(self) -> LiteralValue {
        match self {
            LiteralValue::Array(mut rows) if rows.len() == 1 && rows[0].len() == 1 => {
                rows.swap_remove(0).swap_remove(0)
            }
            other => other,
        }
    }

    /// Numeric coercion used by arithmetic operators.
    ///
    /// Empty is zero, booleans are 0/1 and numeric text is parsed. Anything
    /// else is `#VALUE!`; errors are returned as-is.
    pub fn to_number(&self) -> Result<f64, ExcelError> {
        match self {
            LiteralValue::Number(n) => Ok(*n),
            LiteralValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            LiteralValue::Empty => Ok(0.0),
            LiteralValue::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                ExcelError::new(ExcelErrorKind::Value)
                    .with_message(format!("cannot convert '{s}' to a number"))
            }),
            LiteralValue::Error(e) => Err(e.clone()),
            LiteralValue::Array(_) => Err(ExcelError::new(ExcelErrorKind::Value)
                .with_message("array used where a single value was expected")),
        }
    }

    pub fn to_bool(&self) -> Result<bool, ExcelError> {
        match self {
            LiteralValue::Boolean(b) => Ok(*b),
            LiteralValue::Number(n) => Ok(*n != 0.0),
            LiteralValue::Empty => Ok(false),
            LiteralValue::Text(s) if s.eq_ignore_ascii_case("TRUE") => Ok(true),
            LiteralValue::Text(s) if s.eq_ignore_ascii_case("FALSE") => Ok(false),
            LiteralValue::Error(e) => Err(e.clone()),
            _ => Err(ExcelError::new(ExcelErrorKind::Value)),
        }
    }

    /// Text coercion used by `&`.
    pub fn to_text(&self) -> Result<String, ExcelError> {
        match self {
            LiteralValue::Error(e) => Err(e.clone()),
            LiteralValue::Array(_) => Err(ExcelError::new(ExcelErrorKind::Value)),
            other => Ok(other.to_string()),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            LiteralValue::Boolean(b) => *b,
            LiteralValue::Number(n) => *n != 0.0,
            LiteralValue::Text(s) => !s.is_empty(),
            LiteralValue::Array(arr) => !arr.is_empty(),
            LiteralValue::Error(_) => false,
            LiteralValue::Empty => false,
        }
    }
}
