//! Render a stored [`Expr`] back to A1 formula text.

use sheetgraph_common::{CellAddress, column_label};
use sheetgraph_parse::quote_sheet_name;

use crate::formula::{Expr, UnaryOp};
use crate::reference::{AxisRef, CellRef, RangeRef};
use crate::traits::SheetResolver;

const REF_ERROR: &str = "#REF!";

const PREFIX_PREC: u8 = 6;
const POSTFIX_PREC: u8 = 7;
const ATOM_PREC: u8 = 8;

/// Formula text for `expr` read at `at`, without the leading `=`.
pub fn unparse(expr: &Expr, at: CellAddress, sheets: &dyn SheetResolver) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, at, sheets);
    out
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Binary { op, .. } => op.precedence(),
        Expr::Unary {
            op: UnaryOp::Percent,
            ..
        } => POSTFIX_PREC,
        Expr::Unary { .. } => PREFIX_PREC,
        // Leading signs bind like prefix operators.
        Expr::Number(n) if n.is_sign_negative() => PREFIX_PREC,
        _ => ATOM_PREC,
    }
}

fn write_child(out: &mut String, child: &Expr, needs_parens: bool, at: CellAddress, sheets: &dyn SheetResolver) {
    if needs_parens {
        out.push('(');
        write_expr(out, child, at, sheets);
        out.push(')');
    } else {
        write_expr(out, child, at, sheets);
    }
}

fn write_expr(out: &mut String, expr: &Expr, at: CellAddress, sheets: &dyn SheetResolver) {
    match expr {
        Expr::Number(n) => out.push_str(&n.to_string()),
        Expr::Text(s) => {
            out.push('"');
            out.push_str(&s.replace('"', "\"\""));
            out.push('"');
        }
        Expr::Boolean(b) => out.push_str(if *b { "TRUE" } else { "FALSE" }),
        Expr::Error(kind) => out.push_str(kind.code()),
        Expr::Empty => {}
        Expr::Cell(r) => write_cell(out, r, at, sheets),
        Expr::Range(r) => write_range(out, r, at, sheets),
        Expr::Unary { op, expr: inner } => {
            let p = precedence(expr);
            let child_p = precedence(inner);
            if *op == UnaryOp::Percent {
                write_child(out, inner, child_p < p, at, sheets);
                out.push('%');
            } else {
                out.push_str(op.symbol());
                write_child(out, inner, child_p < p, at, sheets);
            }
        }
        Expr::Binary { op, left, right } => {
            let p = op.precedence();
            write_child(out, left, precedence(left) < p, at, sheets);
            out.push_str(op.symbol());
            write_child(out, right, precedence(right) <= p, at, sheets);
        }
        Expr::Call { name, args } => {
            out.push_str(name);
            out.push('(');
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_expr(out, arg, at, sheets);
            }
            out.push(')');
        }
        Expr::Array(rows) => {
            out.push('{');
            for (i, row) in rows.iter().enumerate() {
                if i > 0 {
                    out.push(';');
                }
                for (j, e) in row.iter().enumerate() {
                    if j > 0 {
                        out.push(',');
                    }
                    write_expr(out, e, at, sheets);
                }
            }
            out.push('}');
        }
        Expr::Name(name) => out.push_str(name),
        Expr::Unparsed(text) => out.push_str(text),
    }
}

/// Writes the `Sheet!` prefix; `false` when the sheet no longer exists.
fn write_sheet(out: &mut String, sheet: Option<u16>, sheets: &dyn SheetResolver) -> bool {
    match sheet {
        None => true,
        Some(id) => match sheets.sheet_name(id) {
            Some(name) => {
                out.push_str(&quote_sheet_name(name));
                out.push('!');
                true
            }
            None => false,
        },
    }
}

fn dollar(out: &mut String, axis: AxisRef) {
    if axis.is_absolute() {
        out.push('$');
    }
}

fn write_cell(out: &mut String, r: &CellRef, at: CellAddress, sheets: &dyn SheetResolver) {
    let mut text = String::new();
    let Some(addr) = r.resolve(at) else {
        out.push_str(REF_ERROR);
        return;
    };
    if !write_sheet(&mut text, r.sheet, sheets) {
        out.push_str(REF_ERROR);
        return;
    }
    dollar(&mut text, r.col);
    text.push_str(&column_label(addr.col));
    dollar(&mut text, r.row);
    text.push_str(&(addr.row + 1).to_string());
    out.push_str(&text);
}

fn write_range(out: &mut String, r: &RangeRef, at: CellAddress, sheets: &dyn SheetResolver) {
    let mut text = String::new();
    let Some(range) = r.resolve(at) else {
        out.push_str(REF_ERROR);
        return;
    };
    if !write_sheet(&mut text, r.sheet, sheets) {
        out.push_str(REF_ERROR);
        return;
    }
    let col = |text: &mut String, axis: Option<AxisRef>, v: u32| {
        if let Some(a) = axis {
            dollar(text, a);
            text.push_str(&column_label(v));
        }
    };
    let row = |text: &mut String, axis: Option<AxisRef>, v: u32| {
        if let Some(a) = axis {
            dollar(text, a);
            text.push_str(&(v + 1).to_string());
        }
    };
    col(&mut text, r.start_col, range.start_col);
    row(&mut text, r.start_row, range.start_row);
    text.push(':');
    col(&mut text, r.end_col, range.end_col);
    row(&mut text, r.end_row, range.end_row);
    out.push_str(&text);
}
