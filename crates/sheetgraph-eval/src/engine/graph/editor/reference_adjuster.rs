use sheetgraph_common::{CellAddress, ExcelErrorKind, SheetId};

use crate::engine::transform_log::Transformation;
use crate::formula::Expr;
use crate::reference::{CellRef, RangeRef};

/// Centralized reference adjustment logic for structural changes.
///
/// A reference is resolved where its formula used to be, pushed through the
/// edit, and re-encoded where the formula is now. Relative and absolute axes
/// both follow the cells they point at; a reference whose target is deleted
/// becomes `#REF!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceAdjuster;

impl ReferenceAdjuster {
    pub fn new() -> Self {
        Self
    }

    /// Rewrite `expr`, owned by the cell that moved from `old_at` to `new_at`.
    pub fn adjust_expr(
        &self,
        expr: &mut Expr,
        old_at: CellAddress,
        new_at: CellAddress,
        op: &Transformation,
    ) {
        expr.visit_mut(&mut |node| {
            let adjusted = match node {
                Expr::Cell(r) => self
                    .adjust_cell_ref(r, old_at, new_at, op)
                    .map(Expr::Cell),
                Expr::Range(r) => self
                    .adjust_range_ref(r, old_at, new_at, op)
                    .map(Expr::Range),
                _ => return,
            };
            *node = adjusted.unwrap_or(Expr::Error(ExcelErrorKind::Ref));
        });
    }

    /// Adjust a cell reference; `None` if the cell is deleted.
    pub fn adjust_cell_ref(
        &self,
        r: &CellRef,
        old_at: CellAddress,
        new_at: CellAddress,
        op: &Transformation,
    ) -> Option<CellRef> {
        let Some(ref_edited) = target_edited(op, r.sheet, old_at) else {
            return Some(*r);
        };
        let Some(cell) = r.resolve(old_at) else {
            return Some(*r);
        };
        let target = if ref_edited { op.map_cell(cell)? } else { cell };
        Some(r.rebase(target, new_at))
    }

    /// Adjust a range reference; `None` if the whole range is deleted.
    pub fn adjust_range_ref(
        &self,
        r: &RangeRef,
        old_at: CellAddress,
        new_at: CellAddress,
        op: &Transformation,
    ) -> Option<RangeRef> {
        let Some(ref_edited) = target_edited(op, r.sheet, old_at) else {
            return Some(*r);
        };
        let Some(range) = r.resolve(old_at) else {
            return Some(*r);
        };
        let target = if ref_edited { op.map_range(&range)? } else { range };
        Some(r.rebase(&target, new_at))
    }
}

/// `None` when `op` touches neither the formula's sheet nor the referenced
/// one; otherwise whether the referenced sheet is touched.
fn target_edited(op: &Transformation, sheet: Option<SheetId>, old_at: CellAddress) -> Option<bool> {
    let ref_edited = op.touches_sheet(sheet.unwrap_or(old_at.sheet));
    (ref_edited || op.touches_sheet(old_at.sheet)).then_some(ref_edited)
}
