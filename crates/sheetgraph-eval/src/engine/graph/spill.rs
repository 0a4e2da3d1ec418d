//! Formula results and array spill regions.
//!
//! A formula whose result is larger than one cell becomes an
//! [`ArrayVertex`] owning a rectangular region of the address mapping. The
//! region is claimed over empty placeholders and refused (`#SPILL!`) when
//! any other cell in it has content of its own.

use sheetgraph_common::{
    CellAddress, ExcelError, ExcelErrorExtra, ExcelErrorKind, LiteralValue, RangeAddress, SheetId,
};

use super::DependencyGraph;
use crate::engine::vertex::{ArrayVertex, FormulaCell, VertexId, VertexKind};

impl DependencyGraph {
    fn anchor_of(&self, id: VertexId) -> CellAddress {
        self.vertex_address(id)
            .unwrap_or_else(|| panic!("vertex {id:?} is not a cell"))
    }

    /// Store an evaluation result on a formula or array vertex.
    pub(crate) fn store_result(&mut self, id: VertexId, value: LiteralValue) {
        match value {
            LiteralValue::Array(rows) if rows.len() > 1 || rows.first().is_some_and(|r| r.len() > 1) => {
                self.store_array(id, rows)
            }
            LiteralValue::Array(rows) => {
                let single = rows
                    .into_iter()
                    .next()
                    .and_then(|r| r.into_iter().next())
                    .unwrap_or(LiteralValue::Error(ExcelError::new(ExcelErrorKind::Value)));
                self.store_scalar(id, single)
            }
            scalar => self.store_scalar(id, scalar),
        }
    }

    /// Mark a formula as part of a circular reference.
    pub(crate) fn store_cycle(&mut self, id: VertexId) {
        let at = self.anchor_of(id);
        self.store_scalar(
            id,
            LiteralValue::Error(
                ExcelError::new(ExcelErrorKind::Cycle)
                    .with_message("circular reference")
                    .with_origin(at),
            ),
        );
    }

    pub(crate) fn store_scalar(&mut self, id: VertexId, value: LiteralValue) {
        if matches!(self.store.vertex(id).kind, VertexKind::Array(_)) {
            self.release_spill(id);
        }
        self.spill_blocked.remove(&id);
        let at = self.anchor_of(id);
        self.record_old_value(at);
        if let VertexKind::Formula(f) = &mut self.store.vertex_mut(id).kind {
            f.value = Some(value);
        }
    }

    fn store_array(&mut self, id: VertexId, rows: Vec<Vec<LiteralValue>>) {
        let anchor = self.anchor_of(id);
        let height = rows.len() as u32;
        let width = rows.iter().map(Vec::len).max().unwrap_or(0) as u32;
        let wanted = RangeAddress::with_size(anchor, height, width);
        let in_bounds = wanted
            .filter(|r| r.end_row < self.config.max_rows && r.end_col < self.config.max_columns);

        let blocker = match in_bounds {
            Some(region) => self.spill_conflict(id, &region).map(|b| (region, Some(b))),
            None => Some((RangeAddress::single(anchor), None)),
        };
        if let Some((region, blocked_at)) = blocker {
            #[cfg(feature = "tracing")]
            tracing::debug!(%anchor, height, width, blocked_at = ?blocked_at, "spill blocked");
            let message = match blocked_at {
                Some(cell) => format!("spill range is blocked at {}", cell.a1()),
                None => "spill range extends past the sheet".to_string(),
            };
            let error = ExcelError::new(ExcelErrorKind::Spill)
                .with_message(message)
                .with_origin(anchor)
                .with_extra(ExcelErrorExtra::Spill {
                    expected_rows: height,
                    expected_cols: width,
                });
            self.store_scalar(id, LiteralValue::Error(error));
            self.spill_blocked.insert(id, region);
            return;
        }
        let Some(region) = in_bounds else {
            return;
        };
        self.spill_blocked.remove(&id);

        let old_region = match &self.store.vertex(id).kind {
            VertexKind::Array(a) => Some(a.region),
            _ => None,
        };
        for addr in region.cells() {
            self.record_old_value(addr);
        }
        if let Some(old) = old_region {
            for addr in old.cells() {
                self.record_old_value(addr);
            }
        }

        let vertex = self.store.vertex_mut(id);
        let kind = std::mem::replace(&mut vertex.kind, VertexKind::Empty { address: anchor });
        vertex.kind = match kind {
            VertexKind::Formula(f) => VertexKind::Array(ArrayVertex {
                formula: f.formula,
                values: rows,
                region,
            }),
            VertexKind::Array(a) => VertexKind::Array(ArrayVertex {
                formula: a.formula,
                values: rows,
                region,
            }),
            other => other,
        };

        if let Some(old) = old_region {
            let released: Vec<CellAddress> = old.cells().filter(|a| !region.contains(*a)).collect();
            if !released.is_empty() {
                self.unmap_spilled(id, &released);
            }
        }
        let claimed: Vec<CellAddress> = region
            .cells()
            .filter(|a| *a != anchor && old_region.is_none_or(|o| !o.contains(*a)))
            .collect();
        #[cfg(feature = "tracing")]
        if !claimed.is_empty() {
            tracing::debug!(%anchor, height, width, claimed = claimed.len(), "spill claimed");
        }
        for addr in claimed {
            self.claim_cell(id, addr);
        }
    }

    /// First cell of `region` holding content of its own.
    fn spill_conflict(&self, id: VertexId, region: &RangeAddress) -> Option<CellAddress> {
        let mut cells = self.cells_in(region);
        cells.sort();
        cells
            .into_iter()
            .find(|(_, owner)| *owner != id && !self.store.vertex(*owner).kind.is_empty_cell())
            .map(|(addr, _)| addr)
    }

    fn claim_cell(&mut self, anchor: VertexId, addr: CellAddress) {
        match self.vertex_at(addr) {
            Some(placeholder) => {
                let readers = self.transfer_dependents(placeholder, anchor);
                self.dirty.extend(readers);
                self.addresses.remove(addr);
                self.discard_vertex(placeholder);
            }
            None => {
                let ranges = self.connect_to_ranges(anchor, addr);
                self.dirty.extend(ranges);
            }
        }
        self.addresses.set(addr, anchor);
    }

    /// Give up every spilled cell and turn an array back into a plain
    /// formula.
    pub(crate) fn release_spill(&mut self, id: VertexId) {
        let region = match &self.store.vertex(id).kind {
            VertexKind::Array(a) => a.region,
            _ => return,
        };
        for addr in region.cells() {
            self.record_old_value(addr);
        }
        let vertex = self.store.vertex_mut(id);
        let kind = std::mem::replace(&mut vertex.kind, VertexKind::Empty { address: region.start() });
        vertex.kind = match kind {
            VertexKind::Array(a) => VertexKind::Formula(FormulaCell {
                formula: a.formula,
                value: None,
            }),
            other => other,
        };
        let cells: Vec<CellAddress> = region.cells().filter(|a| *a != region.start()).collect();
        #[cfg(feature = "tracing")]
        tracing::debug!(anchor = %region.start(), released = cells.len(), "spill released");
        self.unmap_spilled(id, &cells);
    }

    /// Unmap spilled cells and re-point readers that reached them through the
    /// anchor.
    fn unmap_spilled(&mut self, id: VertexId, cells: &[CellAddress]) {
        for &addr in cells {
            if self.addresses.get(addr) == Some(id) {
                self.addresses.remove(addr);
            }
        }
        let readers: Vec<VertexId> = self.store.vertex(id).dependents().collect();
        for reader in readers {
            match &self.store.vertex(reader).kind {
                VertexKind::Range(rv) => {
                    if cells.iter().any(|a| rv.range.contains(*a)) {
                        self.rebuild_range_members(reader);
                    }
                }
                VertexKind::Formula(_) | VertexKind::Array(_) if reader != id => {
                    self.detach_dependencies(reader);
                    self.link_dependencies(reader);
                    self.dirty.insert(reader);
                }
                _ => {}
            }
        }
    }

    /// Re-evaluate blocked arrays whose wanted region covers `addr`.
    pub(crate) fn wake_blocked_spills(&mut self, addr: CellAddress) {
        let woken: Vec<VertexId> = self
            .spill_blocked
            .iter()
            .filter(|(_, region)| region.contains(addr))
            .map(|(id, _)| *id)
            .collect();
        self.dirty.extend(woken);
    }

    /// Re-evaluate blocked arrays on `sheets`; used after structural edits
    /// move their regions.
    pub(crate) fn wake_blocked_spills_on(&mut self, sheets: &[SheetId]) {
        let woken: Vec<VertexId> = self
            .spill_blocked
            .iter()
            .filter(|(_, region)| sheets.contains(&region.sheet))
            .map(|(id, _)| *id)
            .collect();
        self.dirty.extend(woken);
    }
}
