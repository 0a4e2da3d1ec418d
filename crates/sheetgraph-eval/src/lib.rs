//! Spreadsheet dependency graph with incremental recalculation.
//!
//! [`Engine`] owns a workbook: cells, the graph linking formulas to the
//! cells and ranges they read, and the undo history. Structural edits are
//! recorded in a transformation log and formulas catch up with it the next
//! time they are read.

pub mod builtins;
pub mod engine;
pub mod formula;
pub mod function;
pub mod function_registry;
pub mod interpreter;
pub mod linker;
pub mod reference;
pub mod telemetry;
pub mod traits;
pub mod unparse;

pub use engine::{
    CellContent, ChangeSet, EditorError, Engine, EvalConfig, EvalResult, ExportedChange, RawCellContent,
};
pub use reference::{AxisRef, CellRef, RangeRef};
pub use sheetgraph_common::{CellAddress, ExcelError, ExcelErrorKind, LiteralValue, RangeAddress, SheetId};
