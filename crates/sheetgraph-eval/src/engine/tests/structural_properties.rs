//! Structural edits that cancel out must leave the workbook as it was, and
//! edits that miss a range must not disturb its vertex.

use super::common::*;
use crate::engine::{Engine, EvalConfig, RawCellContent};
use proptest::prelude::*;
use sheetgraph_common::{CellAddress, LiteralValue, RangeAddress, SheetId};

const ROWS: u32 = 6;
const COLS: u32 = 4;

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: 64,
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

fn label(row: u32, col: u32) -> String {
    CellAddress::new(0, row, col).a1()
}

/// Mostly numbers, some blanks, some single-cell and range formulas.
fn arb_cell() -> impl Strategy<Value = RawCellContent> {
    prop_oneof![
        3 => (0..100i32).prop_map(|v| RawCellContent::Number(f64::from(v))),
        2 => Just(RawCellContent::Empty),
        2 => (0..ROWS, 0..COLS).prop_map(|(r, c)| RawCellContent::from(format!("={}+1", label(r, c)))),
        1 => (0..ROWS, 0..COLS, 0..ROWS, 0..COLS).prop_map(|(r1, c1, r2, c2)| {
            RawCellContent::from(format!(
                "=SUM({}:{})",
                label(r1.min(r2), c1.min(c2)),
                label(r1.max(r2), c1.max(c2))
            ))
        }),
    ]
}

fn arb_grid() -> impl Strategy<Value = Vec<Vec<RawCellContent>>> {
    prop::collection::vec(prop::collection::vec(arb_cell(), COLS as usize), ROWS as usize)
}

/// Values and formula text of every cell the grid can reach.
fn snapshot(e: &mut Engine) -> Vec<(String, LiteralValue, Option<String>)> {
    let sheet = e.sheet_id("Sheet1").expect("Sheet1 exists");
    let mut out = Vec::new();
    for row in 0..ROWS + 2 {
        for col in 0..COLS + 2 {
            let at = CellAddress::new(sheet, row, col);
            out.push((at.a1(), e.get_cell_value(at), e.get_cell_formula(at)));
        }
    }
    out
}

/// `Sheet1` holds numbers; `Other!A1` sums `range` so its vertex stays alive
/// whatever happens to `Sheet1`'s rows and columns.
fn engine_reading(range: &RangeAddress) -> Engine {
    let grid = (0..ROWS)
        .map(|r| (0..COLS).map(|c| n(f64::from(r * COLS + c))).collect())
        .collect();
    let sum = format!("=SUM(Sheet1!{}:{})", range.start().a1(), range.end().a1());
    let (e, _) = Engine::build_from_sheets(
        &[("Sheet1", grid), ("Other", vec![vec![t(&sum)]])],
        EvalConfig::default(),
    )
    .expect("workbook builds");
    e
}

fn band_edit(e: &mut Engine, sheet: SheetId, columns: bool, remove: bool, index: u32, count: u32) {
    let result = match (columns, remove) {
        (false, false) => e.add_rows(sheet, index, count),
        (false, true) => e.remove_rows(sheet, index, count),
        (true, false) => e.add_columns(sheet, index, count),
        (true, true) => e.remove_columns(sheet, index, count),
    };
    result.expect("band edit applies");
}

proptest! {
    #![proptest_config(config())]

    #[test]
    fn inserting_then_removing_rows_is_identity(
        grid in arb_grid(),
        index in 0..=ROWS,
        count in 1..3u32,
    ) {
        let mut e = engine(grid);
        let sheet = e.sheet_id("Sheet1").unwrap();
        let before = snapshot(&mut e);
        e.add_rows(sheet, index, count).unwrap();
        e.remove_rows(sheet, index, count).unwrap();
        prop_assert_eq!(snapshot(&mut e), before);
    }

    #[test]
    fn inserting_then_removing_columns_is_identity(
        grid in arb_grid(),
        index in 0..=COLS,
        count in 1..3u32,
    ) {
        let mut e = engine(grid);
        let sheet = e.sheet_id("Sheet1").unwrap();
        let before = snapshot(&mut e);
        e.add_columns(sheet, index, count).unwrap();
        e.remove_columns(sheet, index, count).unwrap();
        prop_assert_eq!(snapshot(&mut e), before);
    }

    #[test]
    fn undoing_a_row_removal_is_identity(
        grid in arb_grid(),
        index in 0..ROWS,
        count in 1..3u32,
    ) {
        let mut e = engine(grid);
        let sheet = e.sheet_id("Sheet1").unwrap();
        let before = snapshot(&mut e);
        e.remove_rows(sheet, index, count).unwrap();
        e.undo().unwrap();
        prop_assert_eq!(snapshot(&mut e), before);
    }

    #[test]
    fn edits_past_a_range_keep_its_vertex_and_bounds(
        (r1, c1) in (0..ROWS, 0..COLS),
        (height, width) in (1..4u32, 1..3u32),
        columns in any::<bool>(),
        remove in any::<bool>(),
        offset in 0..4u32,
        count in 1..3u32,
    ) {
        let mut e = engine_reading(&RangeAddress::new(0, r1, c1, r1 + height, c1 + width));
        let sheet = e.sheet_id("Sheet1").unwrap();
        let range = RangeAddress::new(sheet, r1, c1, r1 + height, c1 + width);
        let id = e.graph().get_range(&range);
        prop_assert!(id.is_some());

        let last = if columns { range.end_col } else { range.end_row };
        band_edit(&mut e, sheet, columns, remove, last + 1 + offset, count);

        prop_assert_eq!(e.graph().get_range(&range), id);
    }

    #[test]
    fn edits_before_a_range_keep_its_vertex(
        (r1, c1) in (2..ROWS, 2..COLS),
        (height, width) in (1..4u32, 1..3u32),
        columns in any::<bool>(),
        remove in any::<bool>(),
        offset in 0..4u32,
        count in 1..3u32,
    ) {
        let mut e = engine_reading(&RangeAddress::new(0, r1, c1, r1 + height, c1 + width));
        let sheet = e.sheet_id("Sheet1").unwrap();
        let range = RangeAddress::new(sheet, r1, c1, r1 + height, c1 + width);
        let id = e.graph().get_range(&range);
        prop_assert!(id.is_some());

        let first = if columns { range.start_col } else { range.start_row };
        prop_assume!(!remove || count <= first);
        let room = if remove { first - count } else { first };
        band_edit(&mut e, sheet, columns, remove, offset % (room + 1), count);

        let shifted = match (columns, remove) {
            (false, false) => RangeAddress::new(sheet, r1 + count, c1, r1 + height + count, c1 + width),
            (false, true) => RangeAddress::new(sheet, r1 - count, c1, r1 + height - count, c1 + width),
            (true, false) => RangeAddress::new(sheet, r1, c1 + count, r1 + height, c1 + width + count),
            (true, true) => RangeAddress::new(sheet, r1, c1 - count, r1 + height, c1 + width - count),
        };
        prop_assert_eq!(e.graph().get_range(&shifted), id);
    }
}
