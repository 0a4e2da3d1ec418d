use crate::function::Function;
use crate::function_registry::FunctionRegistry;
use crate::traits::{ArgumentHandle, EvaluationContext};
use sheetgraph_common::{ExcelError, LiteralValue};
use std::sync::Arc;

/* ─────────────────────────── IF() ──────────────────────────── */

/// `IF(condition, when_true, [when_false])`. Only the chosen branch is
/// evaluated.
#[derive(Debug)]
pub struct IfFn;

impl Function for IfFn {
    fn name(&self) -> &'static str {
        "IF"
    }
    fn min_args(&self) -> usize {
        2
    }
    fn max_args(&self) -> Option<usize> {
        Some(3)
    }

    fn eval<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn EvaluationContext,
    ) -> Result<LiteralValue, ExcelError> {
        let condition = args[0].value()?;
        let branch = if condition.to_bool()? { 1 } else { 2 };
        match args.get(branch) {
            Some(arg) => Ok(arg.value()?.into_owned()),
            None => Ok(LiteralValue::Boolean(false)),
        }
    }
}

pub fn register_builtins(reg: &mut FunctionRegistry) {
    reg.register(Arc::new(IfFn));
}
