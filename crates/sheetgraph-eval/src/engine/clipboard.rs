//! The engine's single-slot clipboard.

use sheetgraph_common::{CellAddress, LiteralValue, RangeAddress};

use super::content::CellContent;
use super::graph::DependencyGraph;

/// At most one pending copy or cut.
#[derive(Debug, Clone, PartialEq)]
pub enum Clipboard {
    /// Contents captured when copying. Formulas keep their relative
    /// references, so pasting rebases them onto the target.
    Copy {
        source: RangeAddress,
        cells: Vec<Vec<CellContent>>,
    },
    /// Nothing is captured; pasting moves whatever the source holds then.
    Cut { source: RangeAddress },
}

impl Clipboard {
    pub fn copy(graph: &mut DependencyGraph, source: RangeAddress) -> Self {
        Clipboard::Copy {
            source,
            cells: snapshot(graph, &source),
        }
    }

    pub fn cut(source: RangeAddress) -> Self {
        Clipboard::Cut { source }
    }

    pub fn source(&self) -> RangeAddress {
        match self {
            Clipboard::Copy { source, .. } | Clipboard::Cut { source } => *source,
        }
    }

    pub fn is_cut(&self) -> bool {
        matches!(self, Clipboard::Cut { .. })
    }

    /// Where a paste at `target` writes.
    pub fn target_region(&self, target: CellAddress) -> Option<RangeAddress> {
        let source = self.source();
        RangeAddress::with_size(target, source.height() as u32, source.width() as u32)
    }

    /// Copied cells with their paste address, row-major.
    pub fn cells_at(&self, target: CellAddress) -> Vec<(CellAddress, CellContent)> {
        let Clipboard::Copy { cells, .. } = self else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (r, row) in cells.iter().enumerate() {
            for (c, content) in row.iter().enumerate() {
                out.push((
                    CellAddress::new(target.sheet, target.row + r as u32, target.col + c as u32),
                    content.clone(),
                ));
            }
        }
        out
    }
}

/// Contents of `range`. Arrays entirely inside it are copied as the array
/// formula; cells spilled by arrays reaching outside it are copied as their
/// values.
fn snapshot(graph: &mut DependencyGraph, range: &RangeAddress) -> Vec<Vec<CellContent>> {
    let mut rows = Vec::with_capacity(range.height() as usize);
    for row in range.start_row..=range.end_row {
        let mut cells = Vec::with_capacity(range.width() as usize);
        for col in range.start_col..=range.end_col {
            let addr = CellAddress::new(range.sheet, row, col);
            let content = match graph.array_owning(addr) {
                Some((_, region)) if !range.contains_range(&region) => match graph.cell_value(addr) {
                    LiteralValue::Empty => CellContent::Empty,
                    value => CellContent::Value(value),
                },
                _ => graph.cell_content(addr),
            };
            cells.push(content);
        }
        rows.push(cells);
    }
    rows
}
