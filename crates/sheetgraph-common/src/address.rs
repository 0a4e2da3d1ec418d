//! Sheet-scoped cell and range addresses.
//!
//! All indices are 0-based. Whole-column and whole-row ranges keep their
//! open dimension at [`UNBOUNDED`].

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stable sheet identifier used across the workspace.
pub type SheetId = u16;

/// Marker for the open end of a whole-column or whole-row range.
pub const UNBOUNDED: u32 = u32::MAX;

/// Convert a 0-based column index to letters (`0 -> "A"`, `27 -> "AB"`).
pub fn column_label(col: u32) -> String {
    let mut n = col as u64 + 1;
    let mut buf = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        buf.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}

/// Inverse of [`column_label`]; `None` for empty or non-alphabetic input.
pub fn parse_column_label(label: &str) -> Option<u32> {
    if label.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for b in label.bytes() {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        n = n * 26 + (b.to_ascii_uppercase() - b'A' + 1) as u64;
        if n > u32::MAX as u64 {
            return None;
        }
    }
    Some((n - 1) as u32)
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    pub sheet: SheetId,
    pub row: u32,
    pub col: u32,
}

impl CellAddress {
    pub const fn new(sheet: SheetId, row: u32, col: u32) -> Self {
        Self { sheet, row, col }
    }

    /// Shift by signed offsets; `None` when the result would be negative.
    pub fn offset(self, drow: i64, dcol: i64) -> Option<Self> {
        let row = self.row as i64 + drow;
        let col = self.col as i64 + dcol;
        if row < 0 || col < 0 || row >= UNBOUNDED as i64 || col >= UNBOUNDED as i64 {
            return None;
        }
        Some(Self::new(self.sheet, row as u32, col as u32))
    }

    pub fn a1(&self) -> String {
        format!("{}{}", column_label(self.col), self.row + 1)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}!{}", self.sheet, self.a1())
    }
}

/// A rectangle on one sheet.
///
/// `end_row == UNBOUNDED` makes it a whole-column range, `end_col == UNBOUNDED`
/// a whole-row range. Bounds are always normalised so `start <= end`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RangeAddress {
    pub sheet: SheetId,
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl RangeAddress {
    pub fn new(sheet: SheetId, start_row: u32, start_col: u32, end_row: u32, end_col: u32) -> Self {
        Self {
            sheet,
            start_row: start_row.min(end_row),
            start_col: start_col.min(end_col),
            end_row: start_row.max(end_row),
            end_col: start_col.max(end_col),
        }
    }

    pub fn from_cells(start: CellAddress, end: CellAddress) -> Self {
        Self::new(start.sheet, start.row, start.col, end.row, end.col)
    }

    pub fn single(addr: CellAddress) -> Self {
        Self::new(addr.sheet, addr.row, addr.col, addr.row, addr.col)
    }

    pub fn whole_columns(sheet: SheetId, first: u32, last: u32) -> Self {
        Self::new(sheet, 0, first, UNBOUNDED, last)
    }

    pub fn whole_rows(sheet: SheetId, first: u32, last: u32) -> Self {
        Self::new(sheet, first, 0, last, UNBOUNDED)
    }

    /// A `rows × cols` rectangle anchored at `top_left`.
    pub fn with_size(top_left: CellAddress, rows: u32, cols: u32) -> Option<Self> {
        if rows == 0 || cols == 0 {
            return None;
        }
        let end_row = top_left.row.checked_add(rows - 1)?;
        let end_col = top_left.col.checked_add(cols - 1)?;
        Some(Self::new(top_left.sheet, top_left.row, top_left.col, end_row, end_col))
    }

    pub fn is_whole_columns(&self) -> bool {
        self.end_row == UNBOUNDED
    }

    pub fn is_whole_rows(&self) -> bool {
        self.end_col == UNBOUNDED
    }

    pub fn is_finite(&self) -> bool {
        !self.is_whole_columns() && !self.is_whole_rows()
    }

    pub fn start(&self) -> CellAddress {
        CellAddress::new(self.sheet, self.start_row, self.start_col)
    }

    pub fn end(&self) -> CellAddress {
        CellAddress::new(self.sheet, self.end_row, self.end_col)
    }

    pub fn height(&self) -> u64 {
        self.end_row as u64 - self.start_row as u64 + 1
    }

    pub fn width(&self) -> u64 {
        self.end_col as u64 - self.start_col as u64 + 1
    }

    pub fn contains(&self, addr: CellAddress) -> bool {
        addr.sheet == self.sheet
            && (self.start_row..=self.end_row).contains(&addr.row)
            && (self.start_col..=self.end_col).contains(&addr.col)
    }

    pub fn contains_range(&self, other: &RangeAddress) -> bool {
        other.sheet == self.sheet
            && self.start_row <= other.start_row
            && other.end_row <= self.end_row
            && self.start_col <= other.start_col
            && other.end_col <= self.end_col
    }

    pub fn intersects(&self, other: &RangeAddress) -> bool {
        self.sheet == other.sheet
            && self.start_row <= other.end_row
            && other.start_row <= self.end_row
            && self.start_col <= other.end_col
            && other.start_col <= self.end_col
    }

    /// Move the rectangle to `sheet` and shift it; unbounded dimensions stay unbounded.
    pub fn translate(&self, sheet: SheetId, drow: i64, dcol: i64) -> Option<Self> {
        let shift = |v: u32, d: i64| -> Option<u32> {
            if v == UNBOUNDED {
                return Some(UNBOUNDED);
            }
            let n = v as i64 + d;
            (n >= 0 && n < UNBOUNDED as i64).then_some(n as u32)
        };
        let (start_row, end_row) = if self.is_whole_columns() {
            (self.start_row, self.end_row)
        } else {
            (shift(self.start_row, drow)?, shift(self.end_row, drow)?)
        };
        let (start_col, end_col) = if self.is_whole_rows() {
            (self.start_col, self.end_col)
        } else {
            (shift(self.start_col, dcol)?, shift(self.end_col, dcol)?)
        };
        Some(Self::new(sheet, start_row, start_col, end_row, end_col))
    }

    /// Row-major iteration over the cells of a finite range.
    pub fn cells(&self) -> impl Iterator<Item = CellAddress> + '_ {
        let sheet = self.sheet;
        let cols = self.start_col..=self.end_col;
        (self.start_row..=self.end_row)
            .flat_map(move |r| cols.clone().map(move |c| CellAddress::new(sheet, r, c)))
    }
}

impl fmt::Display for RangeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_whole_columns() {
            write!(
                f,
                "#{}!{}:{}",
                self.sheet,
                column_label(self.start_col),
                column_label(self.end_col)
            )
        } else if self.is_whole_rows() {
            write!(f, "#{}!{}:{}", self.sheet, self.start_row + 1, self.end_row + 1)
        } else {
            write!(f, "#{}!{}:{}", self.sheet, self.start().a1(), self.end().a1())
        }
    }
}
