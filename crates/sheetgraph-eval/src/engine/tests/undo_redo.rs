use super::common::*;
use crate::engine::EditorError;
use sheetgraph_common::{ExcelErrorKind, LiteralValue};

#[test]
fn undo_and_redo_a_cell_edit() {
    let mut e = engine(vec![vec![n(1.0), t("=A1*2")]]);
    set(&mut e, "A1", 5.0);
    assert_eq!(value(&e, "B1"), num(10.0));

    let changes = e.undo().unwrap();
    assert_eq!(value(&e, "A1"), num(1.0));
    assert_eq!(value(&e, "B1"), num(2.0));
    assert_eq!(changed(&changes), vec!["A1", "B1"]);
    assert!(e.can_redo());

    e.redo().unwrap();
    assert_eq!(value(&e, "B1"), num(10.0));
    assert!(!e.can_redo());
}

#[test]
fn new_edits_clear_redo() {
    let mut e = engine(vec![vec![n(1.0)]]);
    set(&mut e, "A1", 2.0);
    e.undo().unwrap();
    set(&mut e, "A2", 3.0);
    assert!(!e.can_redo());
    assert_eq!(e.redo(), Err(EditorError::NothingToRedo));
}

#[test]
fn empty_history_is_reported() {
    let mut e = engine(vec![vec![n(1.0)]]);
    assert!(!e.can_undo());
    assert_eq!(e.undo(), Err(EditorError::NothingToUndo));
    assert_eq!(e.redo(), Err(EditorError::NothingToRedo));
}

#[test]
fn undo_column_insert_restores_formulas() {
    let mut e = engine(vec![vec![n(1.0), t("=A1*2"), t("=SUM(A1:B1)")]]);
    let s = e.sheet_id("Sheet1").unwrap();
    e.add_columns(s, 1, 2).unwrap();
    assert_eq!(formula(&mut e, "E1").as_deref(), Some("=SUM(A1:D1)"));

    e.undo().unwrap();
    assert_eq!(formula(&mut e, "B1").as_deref(), Some("=A1*2"));
    assert_eq!(formula(&mut e, "C1").as_deref(), Some("=SUM(A1:B1)"));
    assert_eq!(value(&e, "C1"), num(3.0));
    assert_eq!(value(&e, "E1"), LiteralValue::Empty);

    e.redo().unwrap();
    assert_eq!(formula(&mut e, "D1").as_deref(), Some("=A1*2"));
    assert_eq!(value(&e, "E1"), num(3.0));
}

#[test]
fn undo_row_removal_restores_cells_and_readers() {
    let mut e = engine(vec![vec![n(1.0)], vec![t("=A1*2")], vec![t("=A2+1")]]);
    let s = e.sheet_id("Sheet1").unwrap();
    e.remove_rows(s, 1, 1).unwrap();
    assert_eq!(formula(&mut e, "A2").as_deref(), Some("=#REF!+1"));

    e.undo().unwrap();
    assert_eq!(formula(&mut e, "A2").as_deref(), Some("=A1*2"));
    assert_eq!(formula(&mut e, "A3").as_deref(), Some("=A2+1"));
    assert_eq!(value(&e, "A3"), num(3.0));

    // The restored reader is linked again
    set(&mut e, "A1", 10.0);
    assert_eq!(value(&e, "A3"), num(21.0));
}

#[test]
fn undo_restores_ranges_that_collapsed() {
    let mut e = engine(vec![
        vec![n(1.0), t("=SUM(A2:A3)")],
        vec![n(2.0)],
        vec![n(3.0)],
    ]);
    let s = e.sheet_id("Sheet1").unwrap();
    e.remove_rows(s, 1, 2).unwrap();
    assert_eq!(error_kind(&value(&e, "B1")), Some(ExcelErrorKind::Ref));

    e.undo().unwrap();
    assert_eq!(formula(&mut e, "B1").as_deref(), Some("=SUM(A2:A3)"));
    assert_eq!(value(&e, "B1"), num(5.0));
}

#[test]
fn a_batch_is_one_undo_step() {
    let mut e = engine(vec![vec![n(1.0), t("=A1+A2")], vec![n(2.0)]]);
    let (a1, a2) = (addr(&e, "A1"), addr(&e, "A2"));
    let changes = e
        .batch(|e| {
            e.set_cell_contents(a1, 10.0)?;
            // Values are brought up to date when the batch ends
            assert_eq!(e.get_cell_value(addr(e, "B1")), num(3.0));
            e.set_cell_contents(a2, 20.0)?;
            Ok(())
        })
        .unwrap();
    assert_eq!(value(&e, "B1"), num(30.0));
    assert_eq!(changed(&changes), vec!["A1", "B1", "A2"]);

    e.undo().unwrap();
    assert_eq!(value(&e, "A1"), num(1.0));
    assert_eq!(value(&e, "A2"), num(2.0));
    assert_eq!(value(&e, "B1"), num(3.0));
    assert!(!e.can_undo());
}

#[test]
fn undo_is_refused_inside_a_batch() {
    let mut e = engine(vec![vec![n(1.0)]]);
    set(&mut e, "A1", 2.0);
    let result = e.batch(|e| {
        assert!(matches!(e.undo(), Err(EditorError::InvalidArgs { .. })));
        assert!(matches!(e.redo(), Err(EditorError::InvalidArgs { .. })));
        Ok(())
    });
    assert!(result.is_ok());
    assert_eq!(value(&e, "A1"), num(2.0));
}

#[test]
fn a_failing_batch_keeps_earlier_edits() {
    let mut e = engine(vec![vec![t("=SEQUENCE(2)"), t("=A1+1")]]);
    let (b1, a2) = (addr(&e, "B1"), addr(&e, "A2"));
    let result = e.batch(|e| {
        e.set_cell_contents(b1, "=A1*10")?;
        e.set_cell_contents(a2, 1.0)?;
        Ok(())
    });
    assert!(matches!(result, Err(EditorError::OntoArray { .. })));
    assert_eq!(value(&e, "B1"), num(10.0));

    e.undo().unwrap();
    assert_eq!(value(&e, "B1"), num(2.0));
}

#[test]
fn sheet_edits_are_undoable() {
    let mut e = engine(vec![vec![n(1.0)]]);
    let s = e.sheet_id("Sheet1").unwrap();
    e.rename_sheet(s, "Inputs").unwrap();
    let added = e.add_sheet("Report").unwrap();

    e.undo().unwrap();
    assert_eq!(e.sheet_id("Report"), None);
    assert_eq!(e.sheet_name(added), None);
    e.undo().unwrap();
    assert_eq!(e.sheet_name(s), Some("Sheet1"));

    e.redo().unwrap();
    e.redo().unwrap();
    assert_eq!(e.sheet_name(s), Some("Inputs"));
    assert_eq!(e.sheet_id("Report"), Some(added));
}
