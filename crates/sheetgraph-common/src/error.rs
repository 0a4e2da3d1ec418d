//! Spreadsheet error values.
//!
//! - **`ExcelErrorKind`** : the error codes a cell can evaluate to
//! - **`ErrorContext`**   : where the error first appeared
//! - **`ExcelErrorExtra`**: per-kind payload (e.g. `Spill`)
//! - **`ExcelError`**     : one struct that glues the three together
//!
//! Errors are ordinary cell values. They flow through the dependency graph
//! like numbers do, so a cell that reads an errored cell gets the same error.

use std::{error::Error, fmt};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{CellAddress, LiteralValue};

/// All recognised error codes.
///
/// Names are CamelCase while `Display` renders them the way a spreadsheet
/// shows them (`#DIV/0!`, `#CYCLE!`, …).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ExcelErrorKind {
    Null,
    Ref,
    Name,
    Value,
    Div,
    Na,
    Num,
    Error,
    Spill,
    Cycle,
}

impl fmt::Display for ExcelErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl ExcelErrorKind {
    pub const ALL: [ExcelErrorKind; 10] = [
        Self::Null,
        Self::Ref,
        Self::Name,
        Self::Value,
        Self::Div,
        Self::Na,
        Self::Num,
        Self::Error,
        Self::Spill,
        Self::Cycle,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Null => "#NULL!",
            Self::Ref => "#REF!",
            Self::Name => "#NAME?",
            Self::Value => "#VALUE!",
            Self::Div => "#DIV/0!",
            Self::Na => "#N/A",
            Self::Num => "#NUM!",
            Self::Error => "#ERROR!",
            Self::Spill => "#SPILL!",
            Self::Cycle => "#CYCLE!",
        }
    }

    /// Case-insensitive lookup of an error literal such as `#ref!`.
    pub fn from_code(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.code().eq_ignore_ascii_case(s))
    }
}

/// Location metadata any error may carry.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorContext {
    /// Cell whose formula first produced the error.
    pub origin: CellAddress,
}

/// Kind-specific payloads.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ExcelErrorExtra {
    #[default]
    None,

    /// `#SPILL!` – the size the array wanted to occupy.
    Spill {
        expected_rows: u32,
        expected_cols: u32,
    },
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExcelError {
    pub kind: ExcelErrorKind,
    pub message: Option<String>,
    pub context: Option<ErrorContext>,
    pub extra: ExcelErrorExtra,
}

/* ───────────────────── Constructors & helpers ─────────────────────── */

impl From<ExcelErrorKind> for ExcelError {
    fn from(kind: ExcelErrorKind) -> Self {
        Self {
            kind,
            message: None,
            context: None,
            extra: ExcelErrorExtra::None,
        }
    }
}

impl ExcelError {
    pub fn new(kind: ExcelErrorKind) -> Self {
        kind.into()
    }

    pub fn with_message<S: Into<String>>(mut self, msg: S) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Record the cell the error originated from.
    pub fn with_origin(mut self, origin: CellAddress) -> Self {
        self.context = Some(ErrorContext { origin });
        self
    }

    /// Like [`with_origin`](Self::with_origin) but keeps an origin that is already set.
    pub fn or_origin(self, origin: CellAddress) -> Self {
        if self.context.is_some() {
            self
        } else {
            self.with_origin(origin)
        }
    }

    pub fn with_extra(mut self, extra: ExcelErrorExtra) -> Self {
        self.extra = extra;
        self
    }

    pub fn origin(&self) -> Option<CellAddress> {
        self.context.as_ref().map(|ctx| ctx.origin)
    }
}

/* ───────────────────────── Display / Error ────────────────────────── */

impl fmt::Display for ExcelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if let Some(ref msg) = self.message {
            write!(f, ": {msg}")?;
        }

        if let Some(ref ctx) = self.context {
            write!(f, " [origin: {}]", ctx.origin)?;
        }

        match &self.extra {
            ExcelErrorExtra::None => {}
            ExcelErrorExtra::Spill {
                expected_rows,
                expected_cols,
            } => {
                write!(f, " [spill {expected_rows}×{expected_cols}]")?;
            }
        }

        Ok(())
    }
}

impl Error for ExcelError {}

impl From<ExcelError> for LiteralValue {
    fn from(error: ExcelError) -> Self {
        LiteralValue::Error(error)
    }
}

impl PartialEq<str> for ExcelErrorKind {
    fn eq(&self, other: &str) -> bool {
        self.code() == other
    }
}

impl PartialEq<&str> for ExcelError {
    fn eq(&self, other: &&str) -> bool {
        self.kind.code() == *other
    }
}
