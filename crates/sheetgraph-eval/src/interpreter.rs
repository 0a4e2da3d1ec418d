use crate::formula::{BinaryOp, Expr, UnaryOp};
use crate::function::Function;
use crate::reference::{CellRef, RangeRef};
use crate::traits::{ArgumentHandle, EvaluationContext};
use sheetgraph_common::{CellAddress, ExcelError, ExcelErrorKind, LiteralValue, RangeAddress};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::cmp::Ordering;

/// An aggregate computed during evaluation that the engine may keep on the
/// range vertex for `range`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateWrite {
    pub range: RangeAddress,
    pub function: &'static str,
    pub value: LiteralValue,
}

/// Evaluates one formula tree at one address.
pub struct Interpreter<'a> {
    pub context: &'a dyn EvaluationContext,
    at: CellAddress,
    use_range_cache: bool,
    cache_writes: RefCell<Vec<AggregateWrite>>,
}

impl<'a> Interpreter<'a> {
    pub fn new(context: &'a dyn EvaluationContext, at: CellAddress) -> Self {
        Self {
            context,
            at,
            use_range_cache: false,
            cache_writes: RefCell::new(Vec::new()),
        }
    }

    /// Read and extend rolling aggregates cached on range vertices.
    pub fn with_range_cache(mut self, enabled: bool) -> Self {
        self.use_range_cache = enabled;
        self
    }

    pub fn at(&self) -> CellAddress {
        self.at
    }

    pub fn take_cache_writes(&self) -> Vec<AggregateWrite> {
        std::mem::take(&mut *self.cache_writes.borrow_mut())
    }

    /* ===================  public  =================== */

    /// Evaluate a whole formula the way a cell shows it: errors become values
    /// tagged with this cell as origin, blanks become 0 and 1×1 arrays collapse.
    pub fn evaluate_formula(&self, expr: &Expr) -> LiteralValue {
        let value = match self.evaluate(expr) {
            Ok(v) => v.into_scalar_if_single(),
            Err(e) => LiteralValue::Error(e),
        };
        match value {
            LiteralValue::Error(e) => LiteralValue::Error(e.or_origin(self.at)),
            LiteralValue::Empty => LiteralValue::Number(0.0),
            LiteralValue::Array(rows) => LiteralValue::Array(
                rows.into_iter()
                    .map(|row| {
                        row.into_iter()
                            .map(|v| match v {
                                LiteralValue::Empty => LiteralValue::Number(0.0),
                                other => other,
                            })
                            .collect()
                    })
                    .collect(),
            ),
            other => other,
        }
    }

    pub fn evaluate(&self, expr: &Expr) -> Result<LiteralValue, ExcelError> {
        match expr {
            Expr::Number(n) => Ok(LiteralValue::Number(*n)),
            Expr::Text(s) => Ok(LiteralValue::Text(s.clone())),
            Expr::Boolean(b) => Ok(LiteralValue::Boolean(*b)),
            Expr::Error(kind) => Err(ExcelError::new(*kind)),
            Expr::Empty => Ok(LiteralValue::Empty),
            Expr::Cell(r) => {
                let addr = self.resolve_cell_ref(r)?;
                self.context.resolve_cell(addr)
            }
            Expr::Range(r) => self.eval_range(r),
            Expr::Unary { op, expr } => self.eval_unary(*op, expr),
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right),
            Expr::Call { name, args } => self.eval_function(name, args),
            Expr::Array(rows) => self.eval_array_literal(rows),
            Expr::Name(name) => Err(ExcelError::new(ExcelErrorKind::Name)
                .with_message(format!("unknown name '{name}'"))),
            Expr::Unparsed(_) => Err(ExcelError::new(ExcelErrorKind::Error)
                .with_message("formula could not be parsed")),
        }
    }

    /* ===================  reference  =================== */

    pub(crate) fn resolve_cell_ref(&self, r: &CellRef) -> Result<CellAddress, ExcelError> {
        r.resolve(self.at).ok_or_else(|| {
            ExcelError::new(ExcelErrorKind::Ref).with_message("reference is off the sheet")
        })
    }

    pub(crate) fn resolve_range_ref(&self, r: &RangeRef) -> Result<RangeAddress, ExcelError> {
        r.resolve(self.at).ok_or_else(|| {
            ExcelError::new(ExcelErrorKind::Ref).with_message("range is off the sheet")
        })
    }

    fn eval_range(&self, r: &RangeRef) -> Result<LiteralValue, ExcelError> {
        let range = self.resolve_range_ref(r)?;
        let data = self.context.resolve_range(&range)?.materialise().into_owned();
        Ok(LiteralValue::Array(data).into_scalar_if_single())
    }

    /* ===================  unary ops  =================== */

    fn eval_unary(&self, op: UnaryOp, expr: &Expr) -> Result<LiteralValue, ExcelError> {
        match self.evaluate(expr)? {
            LiteralValue::Array(arr) => Ok(map_array(arr, |v| unary_scalar(op, v))),
            other => Ok(unary_scalar(op, other)),
        }
    }

    /* ===================  binary ops  =================== */

    fn eval_binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<LiteralValue, ExcelError> {
        // Both sides are evaluated so the left error wins over the right one.
        let l = self.evaluate(left).unwrap_or_else(LiteralValue::Error);
        let r = self.evaluate(right).unwrap_or_else(LiteralValue::Error);
        Ok(broadcast_apply(l, r, |a, b| binary_scalar(op, a, b)))
    }

    /* ===================  function calls  =================== */

    fn eval_function(&self, name: &str, args: &[Expr]) -> Result<LiteralValue, ExcelError> {
        let Some(fun) = self.context.get_function(name) else {
            return Err(ExcelError::new(ExcelErrorKind::Name)
                .with_message(format!("unknown function {name}")));
        };
        let arity_ok = args.len() >= fun.min_args()
            && fun.max_args().is_none_or(|max| args.len() <= max);
        if !arity_ok {
            return Err(ExcelError::new(ExcelErrorKind::Na)
                .with_message(format!("{name} called with {} arguments", args.len())));
        }
        let handles: SmallVec<[ArgumentHandle<'_, 'a>; 4]> =
            args.iter().map(|e| ArgumentHandle::new(e, self)).collect();

        if self.use_range_cache && fun.rolling() && args.len() == 1 {
            if let Expr::Range(r) = &args[0] {
                if let Some(range) = r.resolve(self.at).filter(RangeAddress::is_finite) {
                    return self.rolling_aggregate(fun.as_ref(), &range, &handles);
                }
            }
        }
        fun.eval(&handles, self.context)
    }

    /// Evaluate a single-range aggregate, reusing a cached value for the same
    /// range or rolling one forward from the range minus its last row.
    fn rolling_aggregate(
        &self,
        fun: &dyn Function,
        range: &RangeAddress,
        handles: &[ArgumentHandle<'_, '_>],
    ) -> Result<LiteralValue, ExcelError> {
        let name = fun.name();
        if let Some(v) = self.context.cached_aggregate(range, name) {
            return Ok(v);
        }
        let mut value = None;
        if range.height() > 1 {
            let prefix = RangeAddress::new(
                range.sheet,
                range.start_row,
                range.start_col,
                range.end_row - 1,
                range.end_col,
            );
            if let Some(p) = self.context.cached_aggregate(&prefix, name) {
                let last = RangeAddress::new(
                    range.sheet,
                    range.end_row,
                    range.start_col,
                    range.end_row,
                    range.end_col,
                );
                let row = self.context.resolve_range(&last)?.last_row();
                value = fun.roll(&p, &row);
            }
        }
        let value = match value {
            Some(v) => v,
            None => fun.eval(handles, self.context).unwrap_or_else(LiteralValue::Error),
        };
        self.cache_writes.borrow_mut().push(AggregateWrite {
            range: *range,
            function: name,
            value: value.clone(),
        });
        Ok(value)
    }

    /* ===================  array literal  =================== */

    fn eval_array_literal(&self, rows: &[Vec<Expr>]) -> Result<LiteralValue, ExcelError> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut r = Vec::with_capacity(row.len());
            for cell in row {
                r.push(self.evaluate(cell).unwrap_or_else(LiteralValue::Error));
            }
            out.push(r);
        }
        Ok(LiteralValue::Array(out))
    }
}

/* ===================  helpers  =================== */

fn number(v: f64) -> LiteralValue {
    if v.is_finite() {
        LiteralValue::Number(v)
    } else {
        LiteralValue::Error(ExcelError::new(ExcelErrorKind::Num))
    }
}

fn unary_scalar(op: UnaryOp, v: LiteralValue) -> LiteralValue {
    let n = match v.to_number() {
        Ok(n) => n,
        Err(e) => return LiteralValue::Error(e),
    };
    number(match op {
        UnaryOp::Plus => n,
        UnaryOp::Minus => -n,
        UnaryOp::Percent => n / 100.0,
    })
}

fn binary_scalar(op: BinaryOp, l: LiteralValue, r: LiteralValue) -> LiteralValue {
    if let LiteralValue::Error(_) = l {
        return l;
    }
    if let LiteralValue::Error(_) = r {
        return r;
    }
    if op.is_comparison() {
        return LiteralValue::Boolean(compare(op, &l, &r));
    }
    if op == BinaryOp::Concat {
        return match (l.to_text(), r.to_text()) {
            (Ok(a), Ok(b)) => LiteralValue::Text(a + &b),
            (Err(e), _) | (_, Err(e)) => LiteralValue::Error(e),
        };
    }
    let (a, b) = match (l.to_number(), r.to_number()) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => return LiteralValue::Error(e),
    };
    match op {
        BinaryOp::Add => number(a + b),
        BinaryOp::Sub => number(a - b),
        BinaryOp::Mul => number(a * b),
        BinaryOp::Div if b == 0.0 => LiteralValue::Error(ExcelError::new(ExcelErrorKind::Div)),
        BinaryOp::Div => number(a / b),
        BinaryOp::Pow if (a == 0.0 && b == 0.0) || (a < 0.0 && b.fract() != 0.0) => {
            LiteralValue::Error(ExcelError::new(ExcelErrorKind::Num))
        }
        BinaryOp::Pow => number(a.powf(b)),
        _ => unreachable!("comparison and concat handled above"),
    }
}

/// Spreadsheet ordering: numbers < text < booleans; blanks take the type of
/// the other side; text compares case-insensitively.
fn compare(op: BinaryOp, l: &LiteralValue, r: &LiteralValue) -> bool {
    use LiteralValue::*;
    fn rank(v: &LiteralValue) -> u8 {
        match v {
            Number(_) => 0,
            Text(_) => 1,
            Boolean(_) => 2,
            _ => 3,
        }
    }
    let blank_like = |other: &LiteralValue| match other {
        Text(_) => Text(String::new()),
        Boolean(_) => Boolean(false),
        _ => Number(0.0),
    };
    let l = if l.is_empty() { blank_like(r) } else { l.clone() };
    let r = if r.is_empty() { blank_like(&l) } else { r.clone() };
    let ord = match (&l, &r) {
        (Number(a), Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Text(a), Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        (Boolean(a), Boolean(b)) => a.cmp(b),
        (a, b) => rank(a).cmp(&rank(b)),
    };
    match op {
        BinaryOp::Eq => ord == Ordering::Equal,
        BinaryOp::Ne => ord != Ordering::Equal,
        BinaryOp::Lt => ord == Ordering::Less,
        BinaryOp::Gt => ord == Ordering::Greater,
        BinaryOp::Le => ord != Ordering::Greater,
        BinaryOp::Ge => ord != Ordering::Less,
        _ => false,
    }
}

fn map_array<F>(arr: Vec<Vec<LiteralValue>>, f: F) -> LiteralValue
where
    F: Fn(LiteralValue) -> LiteralValue,
{
    LiteralValue::Array(
        arr.into_iter()
            .map(|row| row.into_iter().map(&f).collect())
            .collect(),
    )
}

fn shape(v: &LiteralValue) -> (usize, usize) {
    v.dimensions()
}

/// Element-wise application with scalar and 1-wide broadcasting. Mismatched
/// shapes yield `#VALUE!`.
fn broadcast_apply<F>(left: LiteralValue, right: LiteralValue, f: F) -> LiteralValue
where
    F: Fn(LiteralValue, LiteralValue) -> LiteralValue,
{
    let (ls, rs) = (shape(&left), shape(&right));
    let (l_arr, r_arr) = (
        matches!(left, LiteralValue::Array(_)),
        matches!(right, LiteralValue::Array(_)),
    );
    if !l_arr && !r_arr {
        return f(left, right);
    }
    let dim = |a: usize, b: usize| match (a, b) {
        (a, b) if a == b => Some(a),
        (1, b) => Some(b),
        (a, 1) => Some(a),
        _ => None,
    };
    let (Some(rows), Some(cols)) = (dim(ls.0, rs.0), dim(ls.1, rs.1)) else {
        return LiteralValue::Error(
            ExcelError::new(ExcelErrorKind::Value).with_message("array shapes do not match"),
        );
    };
    let pick = |v: &LiteralValue, s: (usize, usize), i: usize, j: usize| match v {
        LiteralValue::Array(a) => {
            let (i, j) = (if s.0 == 1 { 0 } else { i }, if s.1 == 1 { 0 } else { j });
            a.get(i)
                .and_then(|row| row.get(j))
                .cloned()
                .unwrap_or(LiteralValue::Empty)
        }
        scalar => scalar.clone(),
    };
    LiteralValue::Array(
        (0..rows)
            .map(|i| {
                (0..cols)
                    .map(|j| f(pick(&left, ls, i, j), pick(&right, rs, i, j)))
                    .collect()
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function_registry::FunctionRegistry;
    use crate::linker::link_formula;
    use crate::traits::{FunctionProvider, InMemoryRange, Range, Resolver, SheetResolver};
    use rustc_hash::FxHashMap;
    use sheetgraph_common::SheetId;
    use std::sync::Arc;

    #[derive(Default)]
    struct Grid {
        cells: FxHashMap<(u32, u32), LiteralValue>,
        cache: FxHashMap<(RangeAddress, String), LiteralValue>,
        functions: FunctionRegistry,
    }

    impl Grid {
        fn new(cells: &[((u32, u32), LiteralValue)]) -> Self {
            Self {
                cells: cells.iter().cloned().collect(),
                cache: FxHashMap::default(),
                functions: FunctionRegistry::with_builtins(),
            }
        }
    }

    impl Resolver for Grid {
        fn resolve_cell(&self, addr: CellAddress) -> Result<LiteralValue, ExcelError> {
            Ok(self
                .cells
                .get(&(addr.row, addr.col))
                .cloned()
                .unwrap_or(LiteralValue::Empty))
        }
        fn resolve_range(&self, range: &RangeAddress) -> Result<Box<dyn Range>, ExcelError> {
            let rows = (range.start_row..=range.end_row)
                .map(|r| {
                    (range.start_col..=range.end_col)
                        .map(|c| self.cells.get(&(r, c)).cloned().unwrap_or(LiteralValue::Empty))
                        .collect()
                })
                .collect();
            Ok(Box::new(InMemoryRange::new(rows)))
        }
        fn cached_aggregate(&self, range: &RangeAddress, function: &str) -> Option<LiteralValue> {
            self.cache.get(&(*range, function.to_string())).cloned()
        }
    }

    impl FunctionProvider for Grid {
        fn get_function(&self, name: &str) -> Option<Arc<dyn Function>> {
            self.functions.get(name)
        }
    }

    struct OneSheet;
    impl SheetResolver for OneSheet {
        fn sheet_id(&self, _: &str) -> Option<SheetId> {
            None
        }
        fn sheet_name(&self, _: SheetId) -> Option<&str> {
            None
        }
    }

    fn eval(grid: &Grid, text: &str) -> LiteralValue {
        let at = CellAddress::new(0, 9, 9);
        let expr = link_formula(text, at, &OneSheet);
        Interpreter::new(grid, at).evaluate_formula(&expr)
    }

    fn n(v: f64) -> LiteralValue {
        LiteralValue::Number(v)
    }

    #[test]
    fn arithmetic_and_precedence() {
        let grid = Grid::new(&[((0, 0), n(2.0)), ((1, 0), n(3.0))]);
        assert_eq!(eval(&grid, "A1+A2*2"), n(8.0));
        assert_eq!(eval(&grid, "-A1^2"), n(4.0));
        assert_eq!(eval(&grid, "50%"), n(0.5));
        assert_eq!(eval(&grid, "\"a\"&A1"), LiteralValue::Text("a2".into()));
        assert_eq!(eval(&grid, "B7"), n(0.0));
    }

    #[test]
    fn errors_propagate_with_origin() {
        let grid = Grid::new(&[((0, 0), n(1.0))]);
        let LiteralValue::Error(e) = eval(&grid, "A1/0+NOPE()") else {
            panic!("expected an error");
        };
        assert_eq!(e.kind, ExcelErrorKind::Div);
        assert_eq!(e.origin(), Some(CellAddress::new(0, 9, 9)));
        assert_eq!(eval(&grid, "NOPE()").error_kind(), Some(ExcelErrorKind::Name));
        assert_eq!(eval(&grid, "IF(1)").error_kind(), Some(ExcelErrorKind::Na));
        assert_eq!(eval(&grid, "foo").error_kind(), Some(ExcelErrorKind::Name));
    }

    #[test]
    fn comparisons_follow_type_order() {
        let grid = Grid::new(&[]);
        assert_eq!(eval(&grid, "\"abc\"=\"ABC\""), LiteralValue::Boolean(true));
        assert_eq!(eval(&grid, "1<\"a\""), LiteralValue::Boolean(true));
        assert_eq!(eval(&grid, "\"a\"<TRUE"), LiteralValue::Boolean(true));
        assert_eq!(eval(&grid, "A1=0"), LiteralValue::Boolean(true));
        assert_eq!(eval(&grid, "A1=\"\""), LiteralValue::Boolean(true));
    }

    #[test]
    fn arrays_broadcast() {
        let grid = Grid::new(&[((0, 0), n(1.0)), ((1, 0), n(2.0))]);
        assert_eq!(
            eval(&grid, "A1:A2*10"),
            LiteralValue::Array(vec![vec![n(10.0)], vec![n(20.0)]])
        );
        assert_eq!(
            eval(&grid, "{1,2}+{10;20}"),
            LiteralValue::Array(vec![vec![n(11.0), n(12.0)], vec![n(21.0), n(22.0)]])
        );
        assert_eq!(
            eval(&grid, "{1,2,3}+{1,2}").error_kind(),
            Some(ExcelErrorKind::Value)
        );
    }

    #[test]
    fn rolling_aggregates_reuse_the_prefix() {
        let mut grid = Grid::new(&[((0, 0), n(1.0)), ((1, 0), n(2.0)), ((2, 0), n(4.0))]);
        let prefix = RangeAddress::new(0, 0, 0, 1, 0);
        // Deliberately stale so the test can tell the cache was used.
        grid.cache.insert((prefix, "SUM".into()), n(100.0));

        let at = CellAddress::new(0, 9, 9);
        let expr = link_formula("SUM(A1:A3)", at, &OneSheet);
        let interp = Interpreter::new(&grid, at).with_range_cache(true);
        assert_eq!(interp.evaluate_formula(&expr), n(104.0));
        let writes = interp.take_cache_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].range, RangeAddress::new(0, 0, 0, 2, 0));

        let plain = Interpreter::new(&grid, at);
        assert_eq!(plain.evaluate_formula(&expr), n(7.0));
        assert!(plain.take_cache_writes().is_empty());
    }
}
