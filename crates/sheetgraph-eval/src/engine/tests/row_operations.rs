use super::common::*;
use crate::engine::{EditorError, Engine, EvalConfig};
use sheetgraph_common::{ExcelErrorKind, LiteralValue, SheetId};

fn sheet1(e: &Engine) -> SheetId {
    e.sheet_id("Sheet1").unwrap()
}

#[test]
fn test_insert_rows() {
    // A1=10, A2=20, A3=30, A4=SUM(A1:A3)
    let mut e = engine(vec![
        vec![n(10.0)],
        vec![n(20.0)],
        vec![n(30.0)],
        vec![t("=SUM(A1:A3)")],
    ]);
    let s = sheet1(&e);

    // Insert 2 rows before row 2. Indices are 0-based.
    let changes = e.add_rows(s, 1, 2).unwrap();
    assert!(changes.is_empty(), "shifting alone changes no value: {changes:?}");

    assert_eq!(value(&e, "A1"), num(10.0));
    assert_eq!(value(&e, "A2"), LiteralValue::Empty);
    assert_eq!(value(&e, "A4"), num(20.0));
    assert_eq!(value(&e, "A5"), num(30.0));
    assert_eq!(value(&e, "A6"), num(60.0));
    // The range grows over the inserted rows
    assert_eq!(formula(&mut e, "A6").as_deref(), Some("=SUM(A1:A5)"));

    set(&mut e, "A2", 5.0);
    assert_eq!(value(&e, "A6"), num(65.0));
}

#[test]
fn test_insert_rows_below_range_leaves_it() {
    let mut e = engine(vec![vec![n(1.0), t("=SUM(A1:A2)")], vec![n(2.0)]]);
    let s = sheet1(&e);
    e.add_rows(s, 2, 1).unwrap();
    assert_eq!(formula(&mut e, "B1").as_deref(), Some("=SUM(A1:A2)"));
    set(&mut e, "A3", 100.0);
    assert_eq!(value(&e, "B1"), num(3.0));
}

#[test]
fn test_remove_rows_collapses_range() {
    let mut e = engine(vec![vec![t("=SUM(A2:A3)")], vec![n(2.0)], vec![n(3.0)]]);
    let s = sheet1(&e);
    assert_eq!(value(&e, "A1"), num(5.0));

    let changes = e.remove_rows(s, 2, 1).unwrap();
    assert_eq!(value(&e, "A1"), num(2.0));
    assert_eq!(formula(&mut e, "A1").as_deref(), Some("=SUM(A2:A2)"));
    let a1 = changes.get(addr(&e, "A1")).expect("A1 changed");
    assert_eq!((a1.old_value.clone(), a1.new_value.clone()), (num(5.0), num(2.0)));
}

#[test]
fn test_remove_rows_shifts_formulas_up() {
    let mut e = engine(vec![
        vec![n(1.0)],
        vec![n(2.0)],
        vec![n(3.0)],
        vec![t("=A1+A3")],
    ]);
    let s = sheet1(&e);
    e.remove_rows(s, 1, 1).unwrap();
    assert_eq!(value(&e, "A2"), num(3.0));
    assert_eq!(formula(&mut e, "A3").as_deref(), Some("=A1+A2"));
    assert_eq!(value(&e, "A3"), num(4.0));
    assert_eq!(value(&e, "A4"), LiteralValue::Empty);
}

#[test]
fn test_deleted_reference_becomes_ref_error() {
    let mut e = engine(vec![vec![t("=A3+1")], vec![], vec![n(7.0)]]);
    let s = sheet1(&e);
    e.remove_rows(s, 2, 1).unwrap();
    assert_eq!(error_kind(&value(&e, "A1")), Some(ExcelErrorKind::Ref));
    assert_eq!(formula(&mut e, "A1").as_deref(), Some("=#REF!+1"));

    // The error is permanent: new content at the old address is not read
    set(&mut e, "A3", 1.0);
    assert_eq!(error_kind(&value(&e, "A1")), Some(ExcelErrorKind::Ref));
}

#[test]
fn test_readers_of_removed_formulas_get_ref_errors() {
    let mut e = engine(vec![vec![n(1.0)], vec![t("=A1*2")], vec![t("=A2+1")]]);
    let s = sheet1(&e);
    assert_eq!(value(&e, "A3"), num(3.0));
    e.remove_rows(s, 1, 1).unwrap();
    assert_eq!(formula(&mut e, "A2").as_deref(), Some("=#REF!+1"));
    assert_eq!(error_kind(&value(&e, "A2")), Some(ExcelErrorKind::Ref));
}

#[test]
fn test_absolute_references_follow_their_cells() {
    let mut e = engine(vec![vec![blank(), t("=$A$3")], vec![], vec![n(4.0)]]);
    let s = sheet1(&e);
    e.add_rows(s, 0, 1).unwrap();
    assert_eq!(formula(&mut e, "B2").as_deref(), Some("=$A$4"));
    assert_eq!(value(&e, "B2"), num(4.0));
}

#[test]
fn test_whole_columns_ignore_row_edits() {
    let mut e = engine(vec![
        vec![n(1.0), t("=SUM(A:A)")],
        vec![n(2.0)],
        vec![n(3.0)],
    ]);
    let s = sheet1(&e);
    assert_eq!(value(&e, "B1"), num(6.0));
    e.remove_rows(s, 1, 1).unwrap();
    assert_eq!(formula(&mut e, "B1").as_deref(), Some("=SUM(A:A)"));
    assert_eq!(value(&e, "B1"), num(4.0));
}

#[test]
fn test_removing_empty_rows_changes_nothing() {
    let mut e = engine(vec![vec![n(1.0), t("=A1")]]);
    let s = sheet1(&e);
    let changes = e.remove_rows(s, 10, 5).unwrap();
    assert!(changes.is_empty());
    assert_eq!(value(&e, "B1"), num(1.0));
}

#[test]
fn test_invalid_row_edits_are_refused() {
    let config = EvalConfig {
        max_rows: 5,
        ..EvalConfig::default()
    };
    let mut e = engine_with(
        vec![vec![t("=A5")], vec![], vec![], vec![], vec![n(1.0)]],
        config,
    );
    let s = sheet1(&e);

    assert!(matches!(e.check_add_rows(s, 0, 0), Err(EditorError::InvalidArgs { .. })));
    assert!(matches!(e.check_add_rows(s, 5, 1), Err(EditorError::InvalidArgs { .. })));
    assert_eq!(e.check_add_rows(s + 3, 0, 1), Err(EditorError::UnknownSheet { sheet: s + 3 }));
    assert_eq!(
        e.add_rows(s, 0, 1),
        Err(EditorError::SheetSizeLimitExceeded {
            sheet: s,
            rows: 6,
            cols: 1
        })
    );
    // Refused edits leave the workbook alone
    assert_eq!(value(&e, "A5"), num(1.0));
    assert_eq!(formula(&mut e, "A1").as_deref(), Some("=A5"));
    assert!(e.check_remove_rows(s, 0, 1).is_ok());
}

#[test]
fn test_oversized_row_counts_are_refused() {
    let mut e = engine(vec![vec![n(1.0)], vec![n(2.0)], vec![t("=A1")]]);
    let s = sheet1(&e);
    let max = e.config().max_rows;

    assert!(matches!(e.remove_rows(s, 1, u32::MAX), Err(EditorError::InvalidArgs { .. })));
    assert!(matches!(e.add_rows(s, 1, u32::MAX), Err(EditorError::InvalidArgs { .. })));
    assert!(matches!(e.check_remove_rows(s, max - 1, 2), Err(EditorError::InvalidArgs { .. })));
    assert!(e.check_remove_rows(s, max - 1, 1).is_ok());

    assert!(!e.can_undo());
    assert_eq!(value(&e, "A2"), num(2.0));
    assert_eq!(formula(&mut e, "A3").as_deref(), Some("=A1"));
}

#[test]
fn test_referenced_cells_count_towards_the_row_limit() {
    let config = EvalConfig {
        max_rows: 10,
        ..EvalConfig::default()
    };
    let mut e = engine_with(vec![vec![t("=A8")]], config);
    let s = sheet1(&e);

    assert_eq!(
        e.add_rows(s, 0, 5),
        Err(EditorError::SheetSizeLimitExceeded {
            sheet: s,
            rows: 13,
            cols: 1
        })
    );
    assert_eq!(formula(&mut e, "A1").as_deref(), Some("=A8"));

    // Two more rows still fit
    e.add_rows(s, 0, 2).unwrap();
    assert_eq!(formula(&mut e, "A3").as_deref(), Some("=A10"));
    // A10 is tracked now, so even the last row is full
    assert!(matches!(
        e.check_add_rows(s, 9, 1),
        Err(EditorError::SheetSizeLimitExceeded { rows: 11, .. })
    ));
}

#[test]
fn test_growing_ranges_count_towards_the_row_limit() {
    let config = EvalConfig {
        max_rows: 10,
        ..EvalConfig::default()
    };
    let mut e = engine_with(vec![vec![t("=SUM(B2:B9)")]], config);
    let s = sheet1(&e);
    assert!(matches!(
        e.check_add_rows(s, 5, 2),
        Err(EditorError::SheetSizeLimitExceeded { rows: 11, .. })
    ));
    e.add_rows(s, 5, 1).unwrap();
    assert_eq!(formula(&mut e, "A1").as_deref(), Some("=SUM(B2:B10)"));
}
