use super::common::*;
use crate::engine::Engine;

fn formula_version(e: &Engine, text: &str) -> usize {
    let id = e.graph().vertex_at(addr(e, text)).expect("cell has a vertex");
    e.graph()
        .vertex(id)
        .kind
        .formula()
        .expect("cell holds a formula")
        .version
}

fn with_far_reference() -> Engine {
    let mut rows = vec![vec![]; 20];
    rows[0] = vec![blank(), blank(), blank(), blank(), blank(), t("=$C$20")];
    rows[19] = vec![blank(), blank(), n(7.0)];
    engine(rows)
}

#[test]
fn untouched_formulas_are_rewritten_on_read() {
    let mut e = with_far_reference();
    let s = e.sheet_id("Sheet1").unwrap();
    e.add_rows(s, 10, 2).unwrap();
    e.remove_rows(s, 3, 1).unwrap();

    assert_eq!(e.graph().transform_log().version(), 2);
    assert_eq!(formula_version(&e, "F1"), 0);
    assert_eq!(e.last_eval().computed_vertices, 0);
    assert_eq!(value(&e, "F1"), num(7.0));

    assert_eq!(formula(&mut e, "F1").as_deref(), Some("=$C$21"));
    assert_eq!(formula_version(&e, "F1"), 2);
}

#[test]
fn stale_formulas_read_the_right_cell() {
    let mut e = with_far_reference();
    let s = e.sheet_id("Sheet1").unwrap();
    e.add_rows(s, 10, 2).unwrap();
    e.remove_rows(s, 3, 1).unwrap();

    set(&mut e, "C21", 8.0);
    assert_eq!(value(&e, "F1"), num(8.0));
    set(&mut e, "C20", 100.0);
    assert_eq!(value(&e, "F1"), num(8.0));
}

#[test]
fn moved_formulas_are_rewritten_eagerly() {
    let mut e = engine(vec![vec![n(1.0)], vec![t("=A1+1")]]);
    let s = e.sheet_id("Sheet1").unwrap();
    e.add_rows(s, 1, 3).unwrap();
    assert_eq!(formula_version(&e, "A5"), 1);
    assert_eq!(value(&e, "A5"), num(2.0));
}

#[test]
fn new_formulas_start_at_the_current_version() {
    let mut e = engine(vec![vec![n(1.0)]]);
    let s = e.sheet_id("Sheet1").unwrap();
    e.add_columns(s, 0, 1).unwrap();
    e.add_columns(s, 0, 1).unwrap();
    set(&mut e, "D1", "=C1");
    assert_eq!(formula_version(&e, "D1"), 2);
    assert_eq!(value(&e, "D1"), num(1.0));
}
