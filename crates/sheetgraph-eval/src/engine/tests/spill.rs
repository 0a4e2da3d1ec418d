use super::common::*;
use crate::engine::{EditorError, EvalConfig};
use sheetgraph_common::{ExcelErrorKind, LiteralValue};

#[test]
fn transpose_spills_and_protects_its_region() {
    let mut e = engine(vec![
        vec![t("=TRANSPOSE(C1:D2)"), blank(), n(1.0), n(2.0)],
        vec![blank(), blank(), n(3.0), n(4.0)],
    ]);
    assert_eq!(value(&e, "A1"), num(1.0));
    assert_eq!(value(&e, "B1"), num(3.0));
    assert_eq!(value(&e, "A2"), num(2.0));
    assert_eq!(value(&e, "B2"), num(4.0));

    let anchor = addr(&e, "A1");
    let b2 = addr(&e, "B2");
    assert_eq!(e.check_set_cell_contents(b2), Err(EditorError::OntoArray { anchor }));
    assert_eq!(e.set_cell_contents(b2, 5.0), Err(EditorError::OntoArray { anchor }));

    assert_eq!(value(&e, "B2"), num(4.0));
    assert_eq!(formula(&mut e, "A1").as_deref(), Some("=TRANSPOSE(C1:D2)"));
    assert_eq!(formula(&mut e, "B2"), None);
}

#[test]
fn spilled_cells_follow_their_inputs() {
    let mut e = engine(vec![
        vec![t("=TRANSPOSE(C1:D2)"), blank(), n(1.0), n(2.0)],
        vec![blank(), blank(), n(3.0), n(4.0)],
    ]);
    set(&mut e, "C2", 30.0);
    assert_eq!(value(&e, "B1"), num(30.0));
}

#[test]
fn blocked_spill_reports_spill_error_until_cleared() {
    let mut e = engine(vec![vec![t("=SEQUENCE(2)")], vec![t("x")]]);
    let LiteralValue::Error(err) = value(&e, "A1") else {
        panic!("expected #SPILL!, got {:?}", value(&e, "A1"));
    };
    assert_eq!(err.kind, ExcelErrorKind::Spill);
    assert_eq!(value(&e, "A2"), LiteralValue::Text("x".into()));

    let changes = set(&mut e, "A2", blank());
    assert_eq!(value(&e, "A1"), num(1.0));
    assert_eq!(value(&e, "A2"), num(2.0));
    assert_eq!(changed(&changes), vec!["A1", "A2"]);
}

#[test]
fn removing_the_blocking_row_lets_the_array_spill() {
    let mut e = engine(vec![vec![t("=SEQUENCE(2)")], vec![t("x")]]);
    let s = e.sheet_id("Sheet1").unwrap();
    assert_eq!(error_kind(&value(&e, "A1")), Some(ExcelErrorKind::Spill));
    e.remove_rows(s, 1, 1).unwrap();
    assert_eq!(value(&e, "A2"), num(2.0));
}

#[test]
fn shrinking_an_array_releases_cells() {
    let mut e = engine(vec![vec![t("=SEQUENCE(3)")]]);
    assert_eq!(value(&e, "A3"), num(3.0));
    set(&mut e, "A1", "=SEQUENCE(2)");
    assert_eq!(value(&e, "A2"), num(2.0));
    assert_eq!(value(&e, "A3"), LiteralValue::Empty);
    set(&mut e, "A3", 7.0);
    assert_eq!(value(&e, "A3"), num(7.0));
}

#[test]
fn replacing_the_anchor_clears_the_region() {
    let mut e = engine(vec![vec![t("=SEQUENCE(2,2)")]]);
    assert_eq!(value(&e, "B2"), num(4.0));
    set(&mut e, "A1", 1.0);
    assert_eq!(value(&e, "A1"), num(1.0));
    assert_eq!(value(&e, "B1"), LiteralValue::Empty);
    assert_eq!(value(&e, "B2"), LiteralValue::Empty);
}

#[test]
fn readers_of_spilled_cells_see_new_values() {
    let mut e = engine(vec![vec![t("=SEQUENCE(3)")], vec![], vec![blank(), t("=A3*10")]]);
    assert_eq!(value(&e, "B3"), num(30.0));
    set(&mut e, "A1", "=SEQUENCE(3,1,5)");
    assert_eq!(value(&e, "A3"), num(7.0));
    assert_eq!(value(&e, "B3"), num(70.0));
}

#[test]
fn arrays_past_the_sheet_edge_do_not_spill() {
    let config = EvalConfig {
        max_rows: 3,
        ..EvalConfig::default()
    };
    let e = engine_with(vec![vec![], vec![t("=SEQUENCE(5)")]], config);
    assert_eq!(error_kind(&value(&e, "A2")), Some(ExcelErrorKind::Spill));
    assert_eq!(value(&e, "A3"), LiteralValue::Empty);
}

#[test]
fn dimensions_include_spilled_cells() {
    let e = engine(vec![vec![t("=SEQUENCE(2,3)")]]);
    let s = e.sheet_id("Sheet1").unwrap();
    assert_eq!(e.get_sheet_dimensions(s), Ok((3, 2)));
}
