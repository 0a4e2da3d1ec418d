use super::common::*;
use crate::engine::EditorError;
use sheetgraph_common::LiteralValue;

fn text(s: &str) -> LiteralValue {
    LiteralValue::Text(s.into())
}

#[test]
fn swapping_rows_moves_contents_and_rebases_formulas() {
    let mut e = engine(vec![
        vec![n(1.0), t("=A1*10")],
        vec![n(2.0), t("=A2*10")],
        vec![],
        vec![],
        vec![blank(), blank(), t("=A1")],
    ]);
    let s = e.sheet_id("Sheet1").unwrap();
    let changes = e.swap_row_indexes(s, &[(0, 1), (1, 0)]).unwrap();

    assert_eq!(value(&e, "A1"), num(2.0));
    assert_eq!(value(&e, "B1"), num(20.0));
    assert_eq!(formula(&mut e, "B1").as_deref(), Some("=A1*10"));
    assert_eq!(value(&e, "B2"), num(10.0));
    // References from rows that did not move keep their address
    assert_eq!(formula(&mut e, "C5").as_deref(), Some("=A1"));
    assert_eq!(value(&e, "C5"), num(2.0));
    assert_eq!(changed(&changes), vec!["A1", "B1", "A2", "B2", "C5"]);
}

#[test]
fn row_order_lists_source_rows() {
    let mut e = engine(vec![vec![t("a")], vec![t("b")], vec![t("c")]]);
    let s = e.sheet_id("Sheet1").unwrap();
    e.set_row_order(s, &[2, 0, 1]).unwrap();
    assert_eq!(value(&e, "A1"), text("c"));
    assert_eq!(value(&e, "A2"), text("a"));
    assert_eq!(value(&e, "A3"), text("b"));

    assert!(e.set_row_order(s, &[0, 1, 2]).unwrap().is_empty());
}

#[test]
fn moves_must_form_a_permutation() {
    let mut e = engine(vec![vec![n(1.0)], vec![n(2.0)]]);
    let s = e.sheet_id("Sheet1").unwrap();
    for pairs in [&[(0, 1)][..], &[(0, 1), (0, 2), (1, 0)][..], &[(0, 1), (1, 1)][..]] {
        assert!(
            matches!(
                e.check_swap_row_indexes(s, pairs),
                Err(EditorError::InvalidPermutation { .. })
            ),
            "{pairs:?} should be refused"
        );
    }
    assert!(matches!(
        e.set_row_order(s, &[0, 0]),
        Err(EditorError::InvalidPermutation { .. })
    ));
    assert_eq!(
        e.check_swap_row_indexes(s + 1, &[]),
        Err(EditorError::UnknownSheet { sheet: s + 1 })
    );
    assert_eq!(value(&e, "A1"), num(1.0));
}

#[test]
fn rows_holding_arrays_stay_put() {
    let mut e = engine(vec![vec![t("=SEQUENCE(2)")], vec![], vec![n(3.0)], vec![n(4.0)]]);
    let s = e.sheet_id("Sheet1").unwrap();
    assert_eq!(
        e.swap_row_indexes(s, &[(1, 2), (2, 1)]),
        Err(EditorError::ArrayBoundary { anchor: addr(&e, "A1") })
    );
    e.swap_row_indexes(s, &[(2, 3), (3, 2)]).unwrap();
    assert_eq!(value(&e, "A3"), num(4.0));
    assert_eq!(value(&e, "A2"), num(2.0));
}

#[test]
fn reorders_are_undoable() {
    let mut e = engine(vec![vec![t("a")], vec![t("b")], vec![t("c")]]);
    let s = e.sheet_id("Sheet1").unwrap();
    e.set_row_order(s, &[1, 2, 0]).unwrap();
    assert_eq!(value(&e, "A1"), text("b"));

    e.undo().unwrap();
    assert_eq!(value(&e, "A1"), text("a"));
    assert_eq!(value(&e, "A2"), text("b"));
    assert_eq!(value(&e, "A3"), text("c"));

    e.redo().unwrap();
    assert_eq!(value(&e, "A3"), text("a"));
}
