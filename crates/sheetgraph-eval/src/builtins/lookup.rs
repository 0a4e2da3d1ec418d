use crate::function::Function;
use crate::function_registry::FunctionRegistry;
use crate::traits::{ArgumentHandle, EvaluatedArg, EvaluationContext};
use sheetgraph_common::{ExcelError, LiteralValue};
use std::sync::Arc;

/* ─────────────────────────── TRANSPOSE() ──────────────────────────── */

/// Swap the rows and columns of a range or array.
#[derive(Debug)]
pub struct TransposeFn;

impl Function for TransposeFn {
    fn name(&self) -> &'static str {
        "TRANSPOSE"
    }
    fn min_args(&self) -> usize {
        1
    }

    fn eval<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn EvaluationContext,
    ) -> Result<LiteralValue, ExcelError> {
        let rows: Vec<Vec<LiteralValue>> = match args[0].value_or_range()? {
            EvaluatedArg::Range(range) => range.materialise().into_owned(),
            EvaluatedArg::LiteralValue(v) => match v.into_owned() {
                LiteralValue::Array(rows) => rows,
                LiteralValue::Error(e) => return Err(e),
                scalar => return Ok(scalar),
            },
        };
        let width = rows.first().map_or(0, Vec::len);
        let out: Vec<Vec<LiteralValue>> = (0..width)
            .map(|c| {
                rows.iter()
                    .map(|row| row.get(c).cloned().unwrap_or(LiteralValue::Empty))
                    .collect()
            })
            .collect();
        Ok(LiteralValue::Array(out))
    }
}

pub fn register_builtins(reg: &mut FunctionRegistry) {
    reg.register(Arc::new(TransposeFn));
}
