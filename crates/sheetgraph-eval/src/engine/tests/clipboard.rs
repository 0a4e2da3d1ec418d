use super::common::*;
use crate::engine::EditorError;
use sheetgraph_common::LiteralValue;

#[test]
fn pasting_a_copy_rebases_relative_references() {
    let mut e = engine(vec![vec![n(1.0), t("=A1*2"), t("=$A$1")], vec![n(2.0)]]);
    e.copy(range(&e, "B1:C1")).unwrap();

    e.paste(addr(&e, "B2")).unwrap();
    assert_eq!(formula(&mut e, "B2").as_deref(), Some("=A2*2"));
    assert_eq!(formula(&mut e, "C2").as_deref(), Some("=$A$1"));
    assert_eq!(value(&e, "B2"), num(4.0));
    assert_eq!(value(&e, "C2"), num(1.0));

    // A copy stays on the clipboard
    assert!(!e.is_clipboard_empty());
    e.paste(addr(&e, "B5")).unwrap();
    assert_eq!(formula(&mut e, "B5").as_deref(), Some("=A5*2"));
    assert_eq!(value(&e, "B5"), num(0.0));
}

#[test]
fn a_copy_is_a_snapshot() {
    let mut e = engine(vec![vec![n(1.0)], vec![n(2.0)]]);
    e.copy(range(&e, "A1:A2")).unwrap();
    set(&mut e, "A1", 100.0);
    assert!(!e.is_clipboard_empty());

    let changes = e.paste(addr(&e, "D1")).unwrap();
    assert_eq!(value(&e, "D1"), num(1.0));
    assert_eq!(value(&e, "D2"), num(2.0));
    assert_eq!(changed(&changes), vec!["D1", "D2"]);
}

#[test]
fn pasting_a_cut_moves_the_cells_once() {
    let mut e = engine(vec![vec![n(1.0), t("=A1*2")], vec![n(2.0)]]);
    e.cut(range(&e, "A1:A2")).unwrap();
    // Cutting alone changes nothing
    assert_eq!(value(&e, "A1"), num(1.0));

    e.paste(addr(&e, "C1")).unwrap();
    assert_eq!(value(&e, "A1"), LiteralValue::Empty);
    assert_eq!(value(&e, "C1"), num(1.0));
    assert_eq!(value(&e, "C2"), num(2.0));
    assert_eq!(formula(&mut e, "B1").as_deref(), Some("=C1*2"));
    assert_eq!(value(&e, "B1"), num(2.0));

    assert!(e.is_clipboard_empty());
    assert_eq!(e.paste(addr(&e, "E1")), Err(EditorError::EmptyClipboard));
}

#[test]
fn other_edits_cancel_a_pending_cut() {
    let mut e = engine(vec![vec![n(1.0)]]);
    e.cut(range(&e, "A1")).unwrap();
    set(&mut e, "Z1", 3.0);
    assert!(e.is_clipboard_empty());

    e.copy(range(&e, "A1")).unwrap();
    set(&mut e, "Z1", 4.0);
    assert!(!e.is_clipboard_empty());
    e.clear_clipboard();
    assert!(e.is_clipboard_empty());
}

#[test]
fn pasting_needs_a_clipboard_and_a_writable_target() {
    let mut e = engine(vec![vec![t("=SEQUENCE(2,2)"), blank(), blank(), blank(), n(7.0)]]);
    assert_eq!(e.check_paste(addr(&e, "A5")), Err(EditorError::EmptyClipboard));

    e.copy(range(&e, "E1")).unwrap();
    assert_eq!(
        e.paste(addr(&e, "B2")),
        Err(EditorError::OntoArray { anchor: addr(&e, "A1") })
    );
    assert_eq!(value(&e, "B2"), num(4.0));
    assert!(e.check_paste(addr(&e, "C3")).is_ok());
}

#[test]
fn partially_copied_arrays_paste_as_values() {
    let mut e = engine(vec![vec![t("=SEQUENCE(3)")]]);
    e.copy(range(&e, "A2:A3")).unwrap();
    e.paste(addr(&e, "C1")).unwrap();
    assert_eq!(value(&e, "C1"), num(2.0));
    assert_eq!(value(&e, "C2"), num(3.0));
    assert_eq!(formula(&mut e, "C1"), None);

    e.copy(range(&e, "A1:A3")).unwrap();
    e.paste(addr(&e, "E1")).unwrap();
    assert_eq!(formula(&mut e, "E1").as_deref(), Some("=SEQUENCE(3)"));
    assert_eq!(value(&e, "E3"), num(3.0));
}

#[test]
fn pastes_are_undoable() {
    let mut e = engine(vec![vec![n(1.0), blank(), n(9.0)]]);
    e.copy(range(&e, "A1")).unwrap();
    e.paste(addr(&e, "C1")).unwrap();
    assert_eq!(value(&e, "C1"), num(1.0));
    e.undo().unwrap();
    assert_eq!(value(&e, "C1"), num(9.0));
}
