//! Common test helpers
use crate::engine::{ChangeSet, Engine, EvalConfig, RawCellContent};
use sheetgraph_common::{CellAddress, ExcelErrorKind, LiteralValue, RangeAddress};

pub fn n(v: f64) -> RawCellContent {
    RawCellContent::Number(v)
}

pub fn t(s: &str) -> RawCellContent {
    RawCellContent::from(s)
}

pub fn blank() -> RawCellContent {
    RawCellContent::Empty
}

/// A one-sheet workbook named `Sheet1`.
pub fn engine(rows: Vec<Vec<RawCellContent>>) -> Engine {
    engine_with(rows, EvalConfig::default())
}

pub fn engine_with(rows: Vec<Vec<RawCellContent>>, config: EvalConfig) -> Engine {
    crate::telemetry::init_tracing();
    let (engine, _) = Engine::build_from_sheets(&[("Sheet1", rows)], config).expect("workbook builds");
    engine
}

pub fn addr(engine: &Engine, text: &str) -> CellAddress {
    engine
        .parse_address(text)
        .unwrap_or_else(|| panic!("{text} is not a cell address"))
}

pub fn range(engine: &Engine, text: &str) -> RangeAddress {
    engine
        .parse_range(text)
        .unwrap_or_else(|| panic!("{text} is not a range"))
}

pub fn value(engine: &Engine, text: &str) -> LiteralValue {
    engine.get_cell_value(addr(engine, text))
}

pub fn formula(engine: &mut Engine, text: &str) -> Option<String> {
    let at = addr(engine, text);
    engine.get_cell_formula(at)
}

pub fn set(engine: &mut Engine, text: &str, content: impl Into<RawCellContent>) -> ChangeSet {
    let at = addr(engine, text);
    engine.set_cell_contents(at, content).expect("cell is writable")
}

pub fn num(v: f64) -> LiteralValue {
    LiteralValue::Number(v)
}

pub fn error_kind(value: &LiteralValue) -> Option<ExcelErrorKind> {
    match value {
        LiteralValue::Error(e) => Some(e.kind),
        _ => None,
    }
}

/// Addresses in a change set, rendered `A1`-style.
pub fn changed(changes: &ChangeSet) -> Vec<String> {
    changes.iter().map(|c| c.address.a1()).collect()
}
