//! Linked formula trees.
//!
//! [`Expr`] is what the graph stores for a formula cell: the parser's
//! [`ASTNode`](sheetgraph_parse::ASTNode) with every reference resolved to a
//! sheet id and converted to relative offsets (see [`crate::reference`]).

use sheetgraph_common::{CellAddress, ExcelErrorKind, RangeAddress};

use crate::reference::{CellRef, RangeRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Plus,
    Minus,
    Percent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl UnaryOp {
    pub fn from_symbol(op: &str) -> Option<Self> {
        Some(match op {
            "+" => UnaryOp::Plus,
            "-" => UnaryOp::Minus,
            "%" => UnaryOp::Percent,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Percent => "%",
        }
    }
}

impl BinaryOp {
    pub fn from_symbol(op: &str) -> Option<Self> {
        Some(match op {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "^" => BinaryOp::Pow,
            "&" => BinaryOp::Concat,
            "=" => BinaryOp::Eq,
            "<>" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            ">" => BinaryOp::Gt,
            "<=" => BinaryOp::Le,
            ">=" => BinaryOp::Ge,
            _ => return None,
        })
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
            BinaryOp::Concat => "&",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge
        )
    }

    /// Binding strength, higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            op if op.is_comparison() => 1,
            BinaryOp::Concat => 2,
            BinaryOp::Add | BinaryOp::Sub => 3,
            BinaryOp::Mul | BinaryOp::Div => 4,
            _ => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(ExcelErrorKind),
    /// An omitted argument, as in `IF(A1,,2)`.
    Empty,
    Cell(CellRef),
    Range(RangeRef),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Array(Vec<Vec<Expr>>),
    /// An identifier that is not a reference; there are no defined names so
    /// it evaluates to `#NAME?`.
    Name(String),
    /// Formula text that did not parse, kept verbatim (without `=`).
    Unparsed(String),
}

/// A reference after resolving it at the formula's address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    Cell(CellAddress),
    Range(RangeAddress),
}

impl Expr {
    /// Depth-first visit of every node.
    pub fn visit(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Unary { expr, .. } => expr.visit(f),
            Expr::Binary { left, right, .. } => {
                left.visit(f);
                right.visit(f);
            }
            Expr::Call { args, .. } => args.iter().for_each(|a| a.visit(f)),
            Expr::Array(rows) => rows.iter().flatten().for_each(|e| e.visit(f)),
            _ => {}
        }
    }

    /// Post-order mutable walk.
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut Expr)) {
        match self {
            Expr::Unary { expr, .. } => expr.visit_mut(f),
            Expr::Binary { left, right, .. } => {
                left.visit_mut(f);
                right.visit_mut(f);
            }
            Expr::Call { args, .. } => args.iter_mut().for_each(|a| a.visit_mut(f)),
            Expr::Array(rows) => rows.iter_mut().flatten().for_each(|e| e.visit_mut(f)),
            _ => {}
        }
        f(self);
    }

    /// References in source order, resolved at `at`. References that fall
    /// off the grid are skipped; they evaluate to `#REF!`.
    pub fn dependencies(&self, at: CellAddress) -> Vec<Dependency> {
        let mut out = Vec::new();
        self.visit(&mut |e| match e {
            Expr::Cell(r) => {
                if let Some(addr) = r.resolve(at) {
                    out.push(Dependency::Cell(addr));
                }
            }
            Expr::Range(r) => {
                if let Some(range) = r.resolve(at) {
                    out.push(Dependency::Range(range));
                }
            }
            _ => {}
        });
        out
    }
}

/// A formula as stored in the graph.
///
/// `address` and `version` describe the position the tree was last made
/// current for. Structural edits append to the transformation log without
/// touching the tree; the graph brings it up to date on the next read.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFormula {
    pub expr: Expr,
    pub address: CellAddress,
    pub version: usize,
}

impl StoredFormula {
    pub fn new(expr: Expr, address: CellAddress, version: usize) -> Self {
        Self {
            expr,
            address,
            version,
        }
    }
}
