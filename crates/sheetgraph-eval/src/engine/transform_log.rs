//! Append-only log of structural edits.
//!
//! Stored formulas remember the log length they were last brought up to
//! date with; the entries after that are replayed on the next read.

use sheetgraph_common::{CellAddress, RangeAddress, SheetId, UNBOUNDED};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transformation {
    InsertRows {
        sheet: SheetId,
        index: u32,
        count: u32,
    },
    RemoveRows {
        sheet: SheetId,
        index: u32,
        count: u32,
    },
    InsertColumns {
        sheet: SheetId,
        index: u32,
        count: u32,
    },
    RemoveColumns {
        sheet: SheetId,
        index: u32,
        count: u32,
    },
    MoveCells {
        source: RangeAddress,
        target: CellAddress,
    },
    RemoveSheet {
        sheet: SheetId,
    },
}

#[derive(Clone, Copy)]
enum Axis {
    Row,
    Col,
}

/// Insert or remove a band of `count` indices starting at `index`.
#[derive(Clone, Copy)]
struct Band {
    index: u32,
    count: u32,
    insert: bool,
}

impl Band {
    /// One past the last index of the band.
    fn end(self) -> u64 {
        u64::from(self.index) + u64::from(self.count)
    }

    /// Indices pushed past the addressable grid fall off it.
    fn shift(self, v: u32) -> Option<u32> {
        v.checked_add(self.count).filter(|&n| n < UNBOUNDED)
    }

    fn map_index(self, v: u32) -> Option<u32> {
        if v < self.index {
            return Some(v);
        }
        if self.insert {
            return self.shift(v);
        }
        if u64::from(v) < self.end() { None } else { Some(v - self.count) }
    }

    /// Map the closed interval `[start, end]`.
    ///
    /// Inserting at or before `start` shifts the interval, inserting inside it
    /// (up to and including `end`) grows it. Removing a band that covers the
    /// interval drops it; partial overlaps clip to what is left.
    fn map_span(self, start: u32, end: u32) -> Option<(u32, u32)> {
        if self.insert {
            return if self.index <= start {
                Some((self.shift(start)?, self.shift(end)?))
            } else if self.index <= end {
                Some((start, self.shift(end)?))
            } else {
                Some((start, end))
            };
        }
        if end < self.index {
            return Some((start, end));
        }
        if u64::from(start) >= self.end() {
            return Some((start - self.count, end - self.count));
        }
        if start >= self.index && u64::from(end) < self.end() {
            return None;
        }
        let new_start = start.min(self.index);
        let new_end = if u64::from(end) >= self.end() { end - self.count } else { self.index - 1 };
        Some((new_start, new_end))
    }
}

impl Transformation {
    fn band(&self) -> Option<(SheetId, Axis, Band)> {
        use Transformation::*;
        let (sheet, axis, index, count, insert) = match *self {
            InsertRows { sheet, index, count } => (sheet, Axis::Row, index, count, true),
            RemoveRows { sheet, index, count } => (sheet, Axis::Row, index, count, false),
            InsertColumns { sheet, index, count } => (sheet, Axis::Col, index, count, true),
            RemoveColumns { sheet, index, count } => (sheet, Axis::Col, index, count, false),
            MoveCells { .. } | RemoveSheet { .. } => return None,
        };
        Some((sheet, axis, Band { index, count, insert }))
    }

    /// The region a move writes to.
    pub fn move_target(&self) -> Option<RangeAddress> {
        match *self {
            Transformation::MoveCells { source, target } => RangeAddress::with_size(
                target,
                source.height() as u32,
                source.width() as u32,
            ),
            _ => None,
        }
    }

    /// Sheets whose addresses this edit can change.
    pub fn sheets(&self) -> Vec<SheetId> {
        match *self {
            Transformation::MoveCells { source, target } if source.sheet != target.sheet => {
                vec![source.sheet, target.sheet]
            }
            Transformation::MoveCells { source, .. } => vec![source.sheet],
            Transformation::RemoveSheet { sheet } => vec![sheet],
            _ => self.band().map(|(s, _, _)| vec![s]).unwrap_or_default(),
        }
    }

    pub fn touches_sheet(&self, sheet: SheetId) -> bool {
        self.sheets().contains(&sheet)
    }

    /// Where a cell ends up; `None` when it is deleted or overwritten.
    pub fn map_cell(&self, addr: CellAddress) -> Option<CellAddress> {
        match *self {
            Transformation::RemoveSheet { sheet } => (addr.sheet != sheet).then_some(addr),
            Transformation::MoveCells { source, target } => {
                if source.contains(addr) {
                    return Some(CellAddress::new(
                        target.sheet,
                        target.row + (addr.row - source.start_row),
                        target.col + (addr.col - source.start_col),
                    ));
                }
                match self.move_target() {
                    Some(dest) if dest.contains(addr) => None,
                    _ => Some(addr),
                }
            }
            _ => {
                let (sheet, axis, band) = self.band()?;
                if addr.sheet != sheet {
                    return Some(addr);
                }
                Some(match axis {
                    Axis::Row => CellAddress::new(sheet, band.map_index(addr.row)?, addr.col),
                    Axis::Col => CellAddress::new(sheet, addr.row, band.map_index(addr.col)?),
                })
            }
        }
    }

    /// Where a range ends up; `None` when all of it is deleted.
    pub fn map_range(&self, range: &RangeAddress) -> Option<RangeAddress> {
        match *self {
            Transformation::RemoveSheet { sheet } => (range.sheet != sheet).then_some(*range),
            Transformation::MoveCells { source, target } => {
                if source.contains_range(range) {
                    range.translate(
                        target.sheet,
                        target.row as i64 - source.start_row as i64,
                        target.col as i64 - source.start_col as i64,
                    )
                } else {
                    Some(*range)
                }
            }
            _ => {
                let (sheet, axis, band) = self.band()?;
                if range.sheet != sheet {
                    return Some(*range);
                }
                let r = *range;
                match axis {
                    Axis::Row if r.is_whole_columns() => Some(r),
                    Axis::Row => {
                        let (s, e) = band.map_span(r.start_row, r.end_row)?;
                        Some(RangeAddress::new(sheet, s, r.start_col, e, r.end_col))
                    }
                    Axis::Col if r.is_whole_rows() => Some(r),
                    Axis::Col => {
                        let (s, e) = band.map_span(r.start_col, r.end_col)?;
                        Some(RangeAddress::new(sheet, r.start_row, s, r.end_row, e))
                    }
                }
            }
        }
    }

    /// The edit that puts addresses back. Content destroyed on the way is
    /// not part of it; a removed sheet has no inverse.
    pub fn inverse(&self) -> Option<Transformation> {
        use Transformation::*;
        Some(match *self {
            InsertRows { sheet, index, count } => RemoveRows { sheet, index, count },
            RemoveRows { sheet, index, count } => InsertRows { sheet, index, count },
            InsertColumns { sheet, index, count } => RemoveColumns { sheet, index, count },
            RemoveColumns { sheet, index, count } => InsertColumns { sheet, index, count },
            MoveCells { source, .. } => MoveCells {
                source: self.move_target()?,
                target: source.start(),
            },
            RemoveSheet { .. } => return None,
        })
    }
}

#[derive(Debug, Default, Clone)]
pub struct TransformLog {
    entries: Vec<Transformation>,
}

impl TransformLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version: the number of entries so far.
    pub fn version(&self) -> usize {
        self.entries.len()
    }

    pub fn push(&mut self, t: Transformation) -> usize {
        self.entries.push(t);
        self.entries.len()
    }

    /// Entries a formula at `version` has not seen yet.
    pub fn since(&self, version: usize) -> &[Transformation] {
        &self.entries[version.min(self.entries.len())..]
    }
}
