use super::common::*;
use crate::engine::{Engine, EvalConfig, RawCellContent};
use sheetgraph_common::ExcelErrorKind;

fn column(values: impl IntoIterator<Item = f64>) -> Vec<Vec<RawCellContent>> {
    values.into_iter().map(|v| vec![n(v)]).collect()
}

#[test]
fn formulas_share_range_vertices() {
    let mut e = engine(vec![
        vec![n(1.0), t("=SUM(A1:A3)")],
        vec![n(2.0), t("=AVERAGE(A1:A3)")],
        vec![n(3.0)],
    ]);
    let a1_a3 = range(&e, "A1:A3");
    assert_eq!(value(&e, "B1"), num(6.0));
    assert_eq!(value(&e, "B2"), num(2.0));
    assert!(e.graph().get_range(&a1_a3).is_some());
    assert_eq!(e.graph().vertex_count(), 6);

    set(&mut e, "B1", RawCellContent::Empty);
    assert!(e.graph().get_range(&a1_a3).is_some());
    set(&mut e, "B2", RawCellContent::Empty);
    assert!(e.graph().get_range(&a1_a3).is_none());
    assert_eq!(e.graph().vertex_count(), 3);
}

#[test]
fn aggregates_skip_text_and_blanks() {
    let e = engine(vec![
        vec![n(3.0), t("=COUNT(A1:A4)"), t("=MIN(A1:A4)"), t("=MAX(A1:A4)"), t("=AVERAGE(A1:A4)")],
        vec![t("x")],
        vec![blank()],
        vec![n(-1.0)],
    ]);
    assert_eq!(value(&e, "B1"), num(2.0));
    assert_eq!(value(&e, "C1"), num(-1.0));
    assert_eq!(value(&e, "D1"), num(3.0));
    assert_eq!(value(&e, "E1"), num(1.0));
}

#[test]
fn errors_inside_ranges_propagate() {
    let mut e = engine(vec![vec![n(1.0), t("=SUM(A1:A2)")], vec![t("=1/0")]]);
    assert_eq!(error_kind(&value(&e, "B1")), Some(ExcelErrorKind::Div));
    set(&mut e, "A2", 4.0);
    assert_eq!(value(&e, "B1"), num(5.0));
}

#[test]
fn range_cache_matches_full_evaluation() {
    for use_range_cache in [true, false] {
        let config = EvalConfig {
            use_range_cache,
            ..EvalConfig::default()
        };
        let mut rows = column((1..=20).map(f64::from));
        rows[0].push(t("=SUM(A1:A20)"));
        rows[1].push(t("=SUM(A1:A19)"));
        rows[2].push(t("=COUNT(A1:A20)"));
        let mut e = engine_with(rows, config);
        assert_eq!(value(&e, "B1"), num(210.0), "cache {use_range_cache}");
        assert_eq!(value(&e, "B2"), num(190.0), "cache {use_range_cache}");
        assert_eq!(value(&e, "B3"), num(20.0), "cache {use_range_cache}");

        set(&mut e, "A20", RawCellContent::Empty);
        assert_eq!(value(&e, "B1"), num(190.0), "cache {use_range_cache}");
        assert_eq!(value(&e, "B3"), num(19.0), "cache {use_range_cache}");

        set(&mut e, "A5", 105.0);
        assert_eq!(value(&e, "B1"), num(290.0), "cache {use_range_cache}");
        assert_eq!(value(&e, "B2"), num(290.0), "cache {use_range_cache}");
    }
}

#[test]
fn open_ranges_pick_up_new_cells() {
    let mut e = engine(vec![vec![blank(), t("=SUM(A:A)"), t("=SUM(3:3)")]]);
    assert_eq!(value(&e, "B1"), num(0.0));
    set(&mut e, "A100", 5.0);
    assert_eq!(value(&e, "B1"), num(5.0));
    set(&mut e, "Z3", 2.0);
    set(&mut e, "A3", 1.0);
    assert_eq!(value(&e, "B1"), num(6.0));
    assert_eq!(value(&e, "C1"), num(3.0));
}

#[test]
fn ranges_read_spilled_cells() {
    let mut e = engine(vec![vec![t("=SEQUENCE(3)"), t("=SUM(A1:A3)")]]);
    assert_eq!(value(&e, "A3"), num(3.0));
    assert_eq!(value(&e, "B1"), num(6.0));

    set(&mut e, "A1", "=SEQUENCE(2)");
    assert_eq!(value(&e, "A3"), sheetgraph_common::LiteralValue::Empty);
    assert_eq!(value(&e, "B1"), num(3.0));
}

#[test]
fn ranges_on_other_sheets() {
    let (mut e, _) = Engine::build_from_sheets(
        &[
            ("Inputs", column([1.0, 2.0])),
            ("Report", vec![vec![t("=SUM(Inputs!A1:A2)")]]),
        ],
        EvalConfig::default(),
    )
    .unwrap();
    let report = e.parse_address("Report!A1").unwrap();
    assert_eq!(e.get_cell_value(report), num(3.0));
    let a2 = e.parse_address("Inputs!A2").unwrap();
    e.set_cell_contents(a2, 10.0).unwrap();
    assert_eq!(e.get_cell_value(report), num(11.0));
    assert_eq!(e.get_cell_formula(report).as_deref(), Some("=SUM(Inputs!A1:A2)"));
}
