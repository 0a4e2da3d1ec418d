//! Position-independent references stored inside formulas.
//!
//! A relative axis is kept as an offset from the cell that owns the formula,
//! so the same [`CellRef`] pasted somewhere else points somewhere else. An
//! absolute axis is a fixed 0-based index.

use sheetgraph_common::{CellAddress, RangeAddress, SheetId, UNBOUNDED};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisRef {
    Relative(i64),
    Absolute(u32),
}

impl AxisRef {
    /// Resolve against the owning cell's index on this axis.
    pub fn resolve(self, base: u32) -> Option<u32> {
        match self {
            AxisRef::Absolute(index) => Some(index),
            AxisRef::Relative(offset) => {
                let index = base as i64 + offset;
                (0..UNBOUNDED as i64).contains(&index).then_some(index as u32)
            }
        }
    }

    /// Encode `target` so it resolves to itself from `base`, keeping the anchor kind.
    pub fn rebase(self, target: u32, base: u32) -> AxisRef {
        match self {
            AxisRef::Absolute(_) => AxisRef::Absolute(target),
            AxisRef::Relative(_) => AxisRef::Relative(target as i64 - base as i64),
        }
    }

    pub fn is_absolute(self) -> bool {
        matches!(self, AxisRef::Absolute(_))
    }

    pub fn encode(target: u32, base: u32, absolute: bool) -> AxisRef {
        if absolute {
            AxisRef::Absolute(target)
        } else {
            AxisRef::Relative(target as i64 - base as i64)
        }
    }
}

/// `sheet: None` means "the sheet the formula lives on".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub sheet: Option<SheetId>,
    pub row: AxisRef,
    pub col: AxisRef,
}

impl CellRef {
    pub fn new(sheet: Option<SheetId>, row: AxisRef, col: AxisRef) -> Self {
        Self { sheet, row, col }
    }

    /// Address this reference points at when read from `at`; `None` when it
    /// falls off the grid.
    pub fn resolve(&self, at: CellAddress) -> Option<CellAddress> {
        Some(CellAddress::new(
            self.sheet.unwrap_or(at.sheet),
            self.row.resolve(at.row)?,
            self.col.resolve(at.col)?,
        ))
    }

    /// Re-encode so that, read from `at`, the reference points at `target`.
    pub fn rebase(&self, target: CellAddress, at: CellAddress) -> CellRef {
        CellRef {
            sheet: qualify(self.sheet, target.sheet, at.sheet),
            row: self.row.rebase(target.row, at.row),
            col: self.col.rebase(target.col, at.col),
        }
    }
}

/// A rectangular reference. Missing row bounds make a whole-column range,
/// missing column bounds a whole-row range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeRef {
    pub sheet: Option<SheetId>,
    pub start_row: Option<AxisRef>,
    pub start_col: Option<AxisRef>,
    pub end_row: Option<AxisRef>,
    pub end_col: Option<AxisRef>,
}

impl RangeRef {
    pub fn resolve(&self, at: CellAddress) -> Option<RangeAddress> {
        let sheet = self.sheet.unwrap_or(at.sheet);
        let axis = |a: Option<AxisRef>, base: u32, open: u32| match a {
            Some(a) => a.resolve(base),
            None => Some(open),
        };
        let start_row = axis(self.start_row, at.row, 0)?;
        let end_row = axis(self.end_row, at.row, UNBOUNDED)?;
        let start_col = axis(self.start_col, at.col, 0)?;
        let end_col = axis(self.end_col, at.col, UNBOUNDED)?;
        Some(RangeAddress::new(sheet, start_row, start_col, end_row, end_col))
    }

    /// Re-encode so that, read from `at`, the reference covers `target`.
    /// Open bounds stay open.
    pub fn rebase(&self, target: &RangeAddress, at: CellAddress) -> RangeRef {
        let rows = |a: Option<AxisRef>, v: u32| a.map(|a| a.rebase(v, at.row));
        let cols = |a: Option<AxisRef>, v: u32| a.map(|a| a.rebase(v, at.col));
        RangeRef {
            sheet: qualify(self.sheet, target.sheet, at.sheet),
            start_row: rows(self.start_row, target.start_row),
            start_col: cols(self.start_col, target.start_col),
            end_row: rows(self.end_row, target.end_row),
            end_col: cols(self.end_col, target.end_col),
        }
    }

    pub fn is_whole_columns(&self) -> bool {
        self.start_row.is_none()
    }

    pub fn is_whole_rows(&self) -> bool {
        self.start_col.is_none()
    }
}

/// Keep an explicit sheet qualifier, and add one when the target is no longer
/// on the formula's own sheet.
fn qualify(current: Option<SheetId>, target: SheetId, at: SheetId) -> Option<SheetId> {
    if current.is_some() || target != at {
        Some(target)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_refs_follow_the_owner() {
        let r = CellRef::new(None, AxisRef::Relative(-1), AxisRef::Absolute(0));
        assert_eq!(
            r.resolve(CellAddress::new(0, 4, 3)),
            Some(CellAddress::new(0, 3, 0))
        );
        assert_eq!(r.resolve(CellAddress::new(0, 0, 3)), None);
    }

    #[test]
    fn rebase_round_trips() {
        let r = CellRef::new(None, AxisRef::Relative(2), AxisRef::Relative(-1));
        let at = CellAddress::new(0, 1, 1);
        let target = r.resolve(at).unwrap();
        let moved = CellAddress::new(0, 10, 5);
        let rebased = r.rebase(target, moved);
        assert_eq!(rebased.resolve(moved), Some(target));
        assert_eq!(rebased.sheet, None);

        let other_sheet = CellAddress::new(1, 10, 5);
        assert_eq!(r.rebase(target, other_sheet).sheet, Some(0));
    }

    #[test]
    fn open_range_bounds() {
        let cols = RangeRef {
            sheet: Some(2),
            start_row: None,
            start_col: Some(AxisRef::Absolute(0)),
            end_row: None,
            end_col: Some(AxisRef::Relative(1)),
        };
        let resolved = cols.resolve(CellAddress::new(0, 7, 1)).unwrap();
        assert_eq!(resolved, RangeAddress::whole_columns(2, 0, 2));
        assert!(cols.is_whole_columns());
    }
}
