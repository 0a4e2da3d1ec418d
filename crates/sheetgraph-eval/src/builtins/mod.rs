pub mod logical;
pub mod lookup;
pub mod math;

use crate::function_registry::FunctionRegistry;
use crate::traits::{ArgumentHandle, EvaluatedArg};
use sheetgraph_common::{ExcelError, LiteralValue};

pub fn load_builtins(reg: &mut FunctionRegistry) {
    logical::register_builtins(reg);
    lookup::register_builtins(reg);
    math::register_builtins(reg);
}

/* ─────────────────────────── helpers ──────────────────────────── */

/// Feed every numeric input of an aggregate to `f`.
///
/// Inside ranges and arrays only numbers count and the first error wins.
/// Scalar arguments are coerced, so `SUM("2", TRUE)` is 3.
pub(crate) fn for_each_number(
    args: &[ArgumentHandle<'_, '_>],
    mut f: impl FnMut(f64),
) -> Result<(), ExcelError> {
    for arg in args {
        if arg.is_omitted() {
            continue;
        }
        match arg.value_or_range()? {
            EvaluatedArg::Range(range) => {
                for v in range.iter_cells() {
                    numeric_cell(&v, &mut f)?;
                }
            }
            EvaluatedArg::LiteralValue(v) => match v.as_ref() {
                LiteralValue::Array(rows) => {
                    for v in rows.iter().flatten() {
                        numeric_cell(v, &mut f)?;
                    }
                }
                scalar => f(scalar.to_number()?),
            },
        }
    }
    Ok(())
}

fn numeric_cell(v: &LiteralValue, f: &mut impl FnMut(f64)) -> Result<(), ExcelError> {
    match v {
        LiteralValue::Number(n) => f(*n),
        LiteralValue::Error(e) => return Err(e.clone()),
        _ => {}
    }
    Ok(())
}

/// Optional numeric argument with a default.
pub(crate) fn number_arg(
    args: &[ArgumentHandle<'_, '_>],
    index: usize,
    default: f64,
) -> Result<f64, ExcelError> {
    match args.get(index) {
        Some(arg) if !arg.is_omitted() => arg.value()?.to_number(),
        _ => Ok(default),
    }
}
