use super::{for_each_number, number_arg};
use crate::function::Function;
use crate::function_registry::FunctionRegistry;
use crate::traits::{ArgumentHandle, EvaluatedArg, EvaluationContext};
use sheetgraph_common::{ExcelError, ExcelErrorKind, LiteralValue};
use std::sync::Arc;

/* ─────────────────────────── SUM() ──────────────────────────── */

/// Adds numbers across scalars and ranges. Text and booleans inside ranges
/// are ignored; the first error encountered is returned.
#[derive(Debug)]
pub struct SumFn;

impl Function for SumFn {
    fn name(&self) -> &'static str {
        "SUM"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }

    fn eval<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn EvaluationContext,
    ) -> Result<LiteralValue, ExcelError> {
        let mut total = 0.0;
        for_each_number(args, |n| total += n)?;
        Ok(LiteralValue::Number(total))
    }

    fn rolling(&self) -> bool {
        true
    }

    fn roll(&self, prefix: &LiteralValue, last_row: &[LiteralValue]) -> Option<LiteralValue> {
        let &LiteralValue::Number(mut total) = prefix else {
            return Some(prefix.clone());
        };
        for v in last_row {
            match v {
                LiteralValue::Number(n) => total += n,
                LiteralValue::Error(e) => return Some(LiteralValue::Error(e.clone())),
                _ => {}
            }
        }
        Some(LiteralValue::Number(total))
    }
}

/* ─────────────────────────── COUNT() ──────────────────────────── */

/// Counts numeric values. Errors are not counted and do not propagate.
#[derive(Debug)]
pub struct CountFn;

impl Function for CountFn {
    fn name(&self) -> &'static str {
        "COUNT"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }

    fn eval<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn EvaluationContext,
    ) -> Result<LiteralValue, ExcelError> {
        let mut count = 0usize;
        for arg in args {
            if arg.is_omitted() {
                continue;
            }
            match arg.value_or_range() {
                Ok(EvaluatedArg::Range(range)) => {
                    count += range
                        .iter_cells()
                        .filter(|v| matches!(v, LiteralValue::Number(_)))
                        .count();
                }
                Ok(EvaluatedArg::LiteralValue(v)) => match v.as_ref() {
                    LiteralValue::Array(rows) => {
                        count += rows
                            .iter()
                            .flatten()
                            .filter(|v| matches!(v, LiteralValue::Number(_)))
                            .count();
                    }
                    LiteralValue::Number(_) | LiteralValue::Boolean(_) => count += 1,
                    LiteralValue::Text(s) if s.trim().parse::<f64>().is_ok() => count += 1,
                    _ => {}
                },
                Err(_) => {}
            }
        }
        Ok(LiteralValue::Number(count as f64))
    }

    fn rolling(&self) -> bool {
        true
    }

    fn roll(&self, prefix: &LiteralValue, last_row: &[LiteralValue]) -> Option<LiteralValue> {
        let LiteralValue::Number(count) = prefix else {
            return None;
        };
        let extra = last_row
            .iter()
            .filter(|v| matches!(v, LiteralValue::Number(_)))
            .count();
        Some(LiteralValue::Number(count + extra as f64))
    }
}

/* ─────────────────────────── AVERAGE() ──────────────────────────── */

#[derive(Debug)]
pub struct AverageFn;

impl Function for AverageFn {
    fn name(&self) -> &'static str {
        "AVERAGE"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }

    fn eval<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn EvaluationContext,
    ) -> Result<LiteralValue, ExcelError> {
        let (mut total, mut count) = (0.0, 0usize);
        for_each_number(args, |n| {
            total += n;
            count += 1;
        })?;
        if count == 0 {
            return Err(ExcelError::new(ExcelErrorKind::Div)
                .with_message("AVERAGE of no numeric values"));
        }
        Ok(LiteralValue::Number(total / count as f64))
    }
}

/* ─────────────────────────── MIN() / MAX() ──────────────────────────── */

fn extreme(
    args: &[ArgumentHandle<'_, '_>],
    pick: fn(f64, f64) -> f64,
) -> Result<LiteralValue, ExcelError> {
    let mut acc: Option<f64> = None;
    for_each_number(args, |n| acc = Some(acc.map_or(n, |a| pick(a, n))))?;
    Ok(LiteralValue::Number(acc.unwrap_or(0.0)))
}

#[derive(Debug)]
pub struct MinFn;

impl Function for MinFn {
    fn name(&self) -> &'static str {
        "MIN"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn EvaluationContext,
    ) -> Result<LiteralValue, ExcelError> {
        extreme(args, f64::min)
    }
}

#[derive(Debug)]
pub struct MaxFn;

impl Function for MaxFn {
    fn name(&self) -> &'static str {
        "MAX"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn variadic(&self) -> bool {
        true
    }
    fn eval<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn EvaluationContext,
    ) -> Result<LiteralValue, ExcelError> {
        extreme(args, f64::max)
    }
}

/* ─────────────────────────── SEQUENCE() ──────────────────────────── */

/// Largest array `SEQUENCE` will build.
const MAX_SEQUENCE_CELLS: f64 = 4_194_304.0;

/// `SEQUENCE(rows, [cols], [start], [step])`
#[derive(Debug)]
pub struct SequenceFn;

impl Function for SequenceFn {
    fn name(&self) -> &'static str {
        "SEQUENCE"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn max_args(&self) -> Option<usize> {
        Some(4)
    }

    fn eval<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        _ctx: &dyn EvaluationContext,
    ) -> Result<LiteralValue, ExcelError> {
        let rows = number_arg(args, 0, 1.0)?.trunc();
        let cols = number_arg(args, 1, 1.0)?.trunc();
        let start = number_arg(args, 2, 1.0)?;
        let step = number_arg(args, 3, 1.0)?;
        if rows < 1.0 || cols < 1.0 || rows * cols > MAX_SEQUENCE_CELLS {
            return Err(ExcelError::new(ExcelErrorKind::Num)
                .with_message(format!("SEQUENCE cannot build a {rows}×{cols} array")));
        }
        let (rows, cols) = (rows as usize, cols as usize);
        let out = (0..rows)
            .map(|r| {
                (0..cols)
                    .map(|c| LiteralValue::Number(start + step * (r * cols + c) as f64))
                    .collect()
            })
            .collect();
        Ok(LiteralValue::Array(out))
    }
}

pub fn register_builtins(reg: &mut FunctionRegistry) {
    reg.register(Arc::new(SumFn));
    reg.register(Arc::new(CountFn));
    reg.register(Arc::new(AverageFn));
    reg.register(Arc::new(MinFn));
    reg.register(Arc::new(MaxFn));
    reg.register(Arc::new(SequenceFn));
}
