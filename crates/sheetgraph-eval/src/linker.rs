//! Turn parser output into a stored [`Expr`].

use sheetgraph_common::{CellAddress, ExcelErrorKind, LiteralValue};
use sheetgraph_parse::{ASTNode, ASTNodeType, RangeBound, ReferenceType};

use crate::formula::{BinaryOp, Expr, UnaryOp};
use crate::reference::{AxisRef, CellRef, RangeRef};
use crate::traits::SheetResolver;

/// Parse `text` (without the leading `=`) and link it at `at`.
///
/// Text that does not parse is kept as [`Expr::Unparsed`].
pub fn link_formula(text: &str, at: CellAddress, sheets: &dyn SheetResolver) -> Expr {
    match sheetgraph_parse::parse(format!("={text}")) {
        Ok(ast) => link(&ast, at, sheets),
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(formula = text, error = %_e, "formula kept unparsed");
            Expr::Unparsed(text.to_string())
        }
    }
}

pub fn link(ast: &ASTNode, at: CellAddress, sheets: &dyn SheetResolver) -> Expr {
    match &ast.node_type {
        ASTNodeType::Literal(v) => literal(v),
        ASTNodeType::Reference { reference, .. } => link_reference(reference, at, sheets),
        ASTNodeType::UnaryOp { op, expr } => match UnaryOp::from_symbol(op) {
            Some(op) => Expr::Unary {
                op,
                expr: Box::new(link(expr, at, sheets)),
            },
            None => Expr::Error(ExcelErrorKind::Error),
        },
        ASTNodeType::BinaryOp { op, left, right } => match BinaryOp::from_symbol(op) {
            Some(op) => Expr::Binary {
                op,
                left: Box::new(link(left, at, sheets)),
                right: Box::new(link(right, at, sheets)),
            },
            None => Expr::Error(ExcelErrorKind::Error),
        },
        ASTNodeType::Function { name, args } => Expr::Call {
            name: name.to_ascii_uppercase(),
            args: args.iter().map(|a| link(a, at, sheets)).collect(),
        },
        ASTNodeType::Array(rows) => Expr::Array(
            rows.iter()
                .map(|row| row.iter().map(|e| link(e, at, sheets)).collect())
                .collect(),
        ),
    }
}

fn literal(v: &LiteralValue) -> Expr {
    match v {
        LiteralValue::Number(n) => Expr::Number(*n),
        LiteralValue::Text(s) => Expr::Text(s.clone()),
        LiteralValue::Boolean(b) => Expr::Boolean(*b),
        LiteralValue::Error(e) => Expr::Error(e.kind),
        LiteralValue::Empty => Expr::Empty,
        LiteralValue::Array(rows) => {
            Expr::Array(rows.iter().map(|r| r.iter().map(literal).collect()).collect())
        }
    }
}

fn link_reference(reference: &ReferenceType, at: CellAddress, sheets: &dyn SheetResolver) -> Expr {
    let sheet = match reference.sheet() {
        Some(name) => match sheets.sheet_id(name) {
            Some(id) => Some(id),
            None => return Expr::Error(ExcelErrorKind::Ref),
        },
        None => None,
    };
    match reference {
        ReferenceType::Cell {
            row,
            col,
            row_abs,
            col_abs,
            ..
        } => Expr::Cell(CellRef::new(
            sheet,
            AxisRef::encode(row - 1, at.row, *row_abs),
            AxisRef::encode(col - 1, at.col, *col_abs),
        )),
        ReferenceType::Range { start, end, .. } => {
            let rows = |b: &RangeBound| b.row.map(|r| AxisRef::encode(r - 1, at.row, b.row_abs));
            let cols = |b: &RangeBound| b.col.map(|c| AxisRef::encode(c - 1, at.col, b.col_abs));
            Expr::Range(RangeRef {
                sheet,
                start_row: rows(start),
                start_col: cols(start),
                end_row: rows(end),
                end_col: cols(end),
            })
        }
        ReferenceType::NamedRange(name) => Expr::Name(name.clone()),
    }
}
