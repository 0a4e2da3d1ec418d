use sheetgraph_common::{CellAddress, ExcelError, ExcelErrorKind, LiteralValue};

use crate::formula::Expr;
use crate::linker::link_formula;
use crate::traits::SheetResolver;

/// Cell input as a caller or serializer hands it over.
///
/// Text starting with `=` is a formula, error codes such as `#DIV/0!` are
/// error literals and any other text is stored verbatim.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawCellContent {
    #[default]
    Empty,
    Number(f64),
    Boolean(bool),
    Text(String),
}

impl From<f64> for RawCellContent {
    fn from(n: f64) -> Self {
        RawCellContent::Number(n)
    }
}

impl From<i32> for RawCellContent {
    fn from(n: i32) -> Self {
        RawCellContent::Number(n as f64)
    }
}

impl From<bool> for RawCellContent {
    fn from(b: bool) -> Self {
        RawCellContent::Boolean(b)
    }
}

impl From<&str> for RawCellContent {
    fn from(s: &str) -> Self {
        RawCellContent::Text(s.to_string())
    }
}

impl From<String> for RawCellContent {
    fn from(s: String) -> Self {
        RawCellContent::Text(s)
    }
}

impl<T: Into<RawCellContent>> From<Option<T>> for RawCellContent {
    fn from(v: Option<T>) -> Self {
        v.map_or(RawCellContent::Empty, Into::into)
    }
}

/// Content after parsing, as the graph stores it. Formulas are kept as
/// linked trees so they can be moved between cells without re-parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Empty,
    Value(LiteralValue),
    Formula(Expr),
}

impl CellContent {
    pub fn parse(raw: &RawCellContent, at: CellAddress, sheets: &dyn SheetResolver) -> Self {
        match raw {
            RawCellContent::Empty => CellContent::Empty,
            RawCellContent::Number(n) => CellContent::Value(LiteralValue::Number(*n)),
            RawCellContent::Boolean(b) => CellContent::Value(LiteralValue::Boolean(*b)),
            RawCellContent::Text(s) if s.is_empty() => CellContent::Empty,
            RawCellContent::Text(s) => match s.strip_prefix('=') {
                Some(body) if !body.trim().is_empty() => {
                    CellContent::Formula(link_formula(body, at, sheets))
                }
                _ => match ExcelErrorKind::from_code(s) {
                    Some(kind) => CellContent::Value(LiteralValue::Error(ExcelError::new(kind))),
                    None => CellContent::Value(LiteralValue::Text(s.clone())),
                },
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellContent::Empty)
    }
}
