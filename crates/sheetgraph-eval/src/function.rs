//! The core `Function` trait.

use sheetgraph_common::{ExcelError, LiteralValue};

use crate::traits::{ArgumentHandle, EvaluationContext};

/// Object-safe trait for spreadsheet functions.
pub trait Function: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn min_args(&self) -> usize {
        0
    }

    fn variadic(&self) -> bool {
        false
    }

    /// Upper bound on the argument count; `None` when variadic.
    fn max_args(&self) -> Option<usize> {
        if self.variadic() {
            None
        } else {
            Some(self.min_args())
        }
    }

    fn eval<'a, 'b>(
        &self,
        args: &'a [ArgumentHandle<'a, 'b>],
        ctx: &dyn EvaluationContext,
    ) -> Result<LiteralValue, ExcelError>;

    /* ─── rolling aggregates ─── */

    /// `true` when [`roll`](Self::roll) can extend a cached aggregate.
    fn rolling(&self) -> bool {
        false
    }

    /// Combine the aggregate of a range without its last row (`prefix`) with
    /// the values of that last row. Only called when [`rolling`](Self::rolling)
    /// is `true` and the function has a single range argument.
    fn roll(&self, _prefix: &LiteralValue, _last_row: &[LiteralValue]) -> Option<LiteralValue> {
        None
    }
}
