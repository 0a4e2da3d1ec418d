//! sheetgraph-eval – core traits (object-safe)

use std::any::Any;
use std::borrow::Cow;
use std::fmt::Debug;
use std::sync::Arc;

use sheetgraph_common::{CellAddress, ExcelError, ExcelErrorKind, LiteralValue, RangeAddress, SheetId};

use crate::formula::Expr;
use crate::function::Function;
use crate::interpreter::Interpreter;

/* ───────────────────────────── Range ───────────────────────────── */

pub trait Range: Debug {
    fn get(&self, row: usize, col: usize) -> LiteralValue;
    fn dimensions(&self) -> (usize, usize);

    fn materialise(&self) -> Cow<'_, [Vec<LiteralValue>]> {
        let (rows, cols) = self.dimensions();
        Cow::Owned(
            (0..rows)
                .map(|r| (0..cols).map(|c| self.get(r, c)).collect())
                .collect(),
        )
    }

    fn iter_cells<'a>(&'a self) -> Box<dyn Iterator<Item = LiteralValue> + 'a> {
        let (rows, cols) = self.dimensions();
        Box::new((0..rows).flat_map(move |r| (0..cols).map(move |c| self.get(r, c))))
    }

    /// Values of the last row, for rolling aggregates.
    fn last_row(&self) -> Vec<LiteralValue> {
        let (rows, cols) = self.dimensions();
        match rows {
            0 => Vec::new(),
            n => (0..cols).map(|c| self.get(n - 1, c)).collect(),
        }
    }

    fn as_any(&self) -> &dyn Any;
}

/* simple Vec-backed range */
#[derive(Debug, Clone)]
pub struct InMemoryRange {
    data: Vec<Vec<LiteralValue>>,
}

impl InMemoryRange {
    pub fn new(d: Vec<Vec<LiteralValue>>) -> Self {
        Self { data: d }
    }

    pub fn into_rows(self) -> Vec<Vec<LiteralValue>> {
        self.data
    }
}

impl Range for InMemoryRange {
    fn get(&self, r: usize, c: usize) -> LiteralValue {
        self.data
            .get(r)
            .and_then(|row| row.get(c))
            .cloned()
            .unwrap_or(LiteralValue::Empty)
    }
    fn dimensions(&self) -> (usize, usize) {
        (self.data.len(), self.data.first().map_or(0, |r| r.len()))
    }
    fn materialise(&self) -> Cow<'_, [Vec<LiteralValue>]> {
        Cow::Borrowed(&self.data)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/* ────────────────────── ArgumentHandle helpers ───────────────────── */

pub type CowValue<'a> = Cow<'a, LiteralValue>;

pub enum EvaluatedArg<'a> {
    LiteralValue(CowValue<'a>),
    Range(Box<dyn Range>),
}

/// Lazy access to one call argument. Functions decide whether they want a
/// value, a range, or nothing at all (the branch `IF` does not take).
pub struct ArgumentHandle<'a, 'b> {
    expr: &'a Expr,
    interp: &'a Interpreter<'b>,
}

impl<'a, 'b> ArgumentHandle<'a, 'b> {
    pub(crate) fn new(expr: &'a Expr, interp: &'a Interpreter<'b>) -> Self {
        Self { expr, interp }
    }

    pub fn value(&self) -> Result<CowValue<'_>, ExcelError> {
        match self.expr {
            Expr::Number(n) => Ok(Cow::Owned(LiteralValue::Number(*n))),
            Expr::Empty => Ok(Cow::Owned(LiteralValue::Empty)),
            _ => self.interp.evaluate(self.expr).map(Cow::Owned),
        }
    }

    pub fn range(&self) -> Result<Box<dyn Range>, ExcelError> {
        match self.expr {
            Expr::Range(r) => {
                let range = self.interp.resolve_range_ref(r)?;
                self.interp.context.resolve_range(&range)
            }
            Expr::Cell(r) => {
                let addr = self.interp.resolve_cell_ref(r)?;
                let v = self.interp.context.resolve_cell(addr)?;
                Ok(Box::new(InMemoryRange::new(vec![vec![v]])))
            }
            Expr::Array(rows) => {
                let mut materialized = Vec::with_capacity(rows.len());
                for row in rows {
                    let mut materialized_row = Vec::with_capacity(row.len());
                    for cell in row {
                        materialized_row.push(self.interp.evaluate(cell)?);
                    }
                    materialized.push(materialized_row);
                }
                Ok(Box::new(InMemoryRange::new(materialized)))
            }
            _ => Err(ExcelError::new(ExcelErrorKind::Ref)
                .with_message(format!("Expected a range, got {:?}", self.expr))),
        }
    }

    pub fn value_or_range(&self) -> Result<EvaluatedArg<'_>, ExcelError> {
        match self.expr {
            Expr::Range(_) | Expr::Cell(_) | Expr::Array(_) => self.range().map(EvaluatedArg::Range),
            _ => self.value().map(EvaluatedArg::LiteralValue),
        }
    }

    pub fn expr(&self) -> &'a Expr {
        self.expr
    }

    /// `true` for an omitted argument such as the middle one in `IF(A1,,2)`.
    pub fn is_omitted(&self) -> bool {
        matches!(self.expr, Expr::Empty)
    }
}

/* ─────────────────────── Resolver super-trait ─────────────────────── */

/// Read access to cell contents during evaluation.
pub trait Resolver {
    fn resolve_cell(&self, addr: CellAddress) -> Result<LiteralValue, ExcelError>;

    /// Materialise a range. Open ranges stop at the sheet's used area.
    fn resolve_range(&self, range: &RangeAddress) -> Result<Box<dyn Range>, ExcelError>;

    /// A previously computed aggregate of `range` for `function`, if cached.
    fn cached_aggregate(&self, _range: &RangeAddress, _function: &str) -> Option<LiteralValue> {
        None
    }
}

/* ───────────────────── EvaluationContext = Resolver+Fns ───────────── */

pub trait FunctionProvider: Send + Sync {
    fn get_function(&self, name: &str) -> Option<Arc<dyn Function>>;
}

pub trait EvaluationContext: Resolver + FunctionProvider {}
impl<T> EvaluationContext for T where T: Resolver + FunctionProvider {}

/// Sheet id and name lookup used when linking and rendering formulas.
pub trait SheetResolver {
    fn sheet_id(&self, name: &str) -> Option<SheetId>;
    fn sheet_name(&self, id: SheetId) -> Option<&str>;
}
