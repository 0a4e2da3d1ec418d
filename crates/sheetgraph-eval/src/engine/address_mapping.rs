//! Per-sheet address → vertex lookup with a dense or sparse backing store.

use std::fmt::Debug;

use rustc_hash::FxHashMap;
use sheetgraph_common::{CellAddress, SheetId};

use super::vertex::VertexId;

/// How a sheet's cells are stored, decided once when the sheet is created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AddressMappingPolicy {
    AlwaysDense,
    AlwaysSparse,
    /// Dense when the initial content fills at least `threshold` of the
    /// sheet's bounding box.
    ByFillRatio { threshold: f64 },
}

impl Default for AddressMappingPolicy {
    fn default() -> Self {
        AddressMappingPolicy::ByFillRatio { threshold: 0.8 }
    }
}

impl AddressMappingPolicy {
    pub fn storage_for(&self, fill_ratio: f64) -> Box<dyn SheetStorage> {
        let dense = match *self {
            AddressMappingPolicy::AlwaysDense => true,
            AddressMappingPolicy::AlwaysSparse => false,
            AddressMappingPolicy::ByFillRatio { threshold } => fill_ratio >= threshold,
        };
        if dense {
            Box::<DenseStorage>::default()
        } else {
            Box::<SparseStorage>::default()
        }
    }
}

/* ───────────────────────────── storage ───────────────────────────── */

pub trait SheetStorage: Debug + Send + Sync {
    fn get(&self, row: u32, col: u32) -> Option<VertexId>;
    fn set(&mut self, row: u32, col: u32, id: VertexId);
    fn remove(&mut self, row: u32, col: u32) -> Option<VertexId>;
    /// All mapped cells as `(row, col, id)`.
    fn entries(&self) -> Vec<(u32, u32, VertexId)>;
    fn clear(&mut self);
    fn len(&self) -> usize;
    fn is_dense(&self) -> bool;
}

/// Row-major grid; O(1) access, memory proportional to the bounding box.
#[derive(Debug, Default)]
pub struct DenseStorage {
    rows: Vec<Vec<Option<VertexId>>>,
    len: usize,
}

impl SheetStorage for DenseStorage {
    fn get(&self, row: u32, col: u32) -> Option<VertexId> {
        self.rows.get(row as usize)?.get(col as usize).copied().flatten()
    }

    fn set(&mut self, row: u32, col: u32, id: VertexId) {
        let (r, c) = (row as usize, col as usize);
        if self.rows.len() <= r {
            self.rows.resize_with(r + 1, Vec::new);
        }
        let cells = &mut self.rows[r];
        if cells.len() <= c {
            cells.resize(c + 1, None);
        }
        if cells[c].replace(id).is_none() {
            self.len += 1;
        }
    }

    fn remove(&mut self, row: u32, col: u32) -> Option<VertexId> {
        let old = self
            .rows
            .get_mut(row as usize)?
            .get_mut(col as usize)?
            .take();
        if old.is_some() {
            self.len -= 1;
        }
        old
    }

    fn entries(&self) -> Vec<(u32, u32, VertexId)> {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(r, cells)| {
                cells
                    .iter()
                    .enumerate()
                    .filter_map(move |(c, id)| id.map(|id| (r as u32, c as u32, id)))
            })
            .collect()
    }

    fn clear(&mut self) {
        self.rows.clear();
        self.len = 0;
    }

    fn len(&self) -> usize {
        self.len
    }

    fn is_dense(&self) -> bool {
        true
    }
}

/// Hash map keyed by `(row, col)`; memory proportional to the content.
#[derive(Debug, Default)]
pub struct SparseStorage {
    cells: FxHashMap<(u32, u32), VertexId>,
}

impl SheetStorage for SparseStorage {
    fn get(&self, row: u32, col: u32) -> Option<VertexId> {
        self.cells.get(&(row, col)).copied()
    }

    fn set(&mut self, row: u32, col: u32, id: VertexId) {
        self.cells.insert((row, col), id);
    }

    fn remove(&mut self, row: u32, col: u32) -> Option<VertexId> {
        self.cells.remove(&(row, col))
    }

    fn entries(&self) -> Vec<(u32, u32, VertexId)> {
        self.cells.iter().map(|(&(r, c), &id)| (r, c, id)).collect()
    }

    fn clear(&mut self) {
        self.cells.clear();
    }

    fn len(&self) -> usize {
        self.cells.len()
    }

    fn is_dense(&self) -> bool {
        false
    }
}

/* ───────────────────────────── mapping ───────────────────────────── */

#[derive(Debug)]
pub struct AddressMapping {
    policy: AddressMappingPolicy,
    sheets: FxHashMap<SheetId, Box<dyn SheetStorage>>,
}

impl AddressMapping {
    pub fn new(policy: AddressMappingPolicy) -> Self {
        Self {
            policy,
            sheets: FxHashMap::default(),
        }
    }

    /// Register a sheet; `fill_ratio` feeds the storage policy.
    pub fn add_sheet(&mut self, sheet: SheetId, fill_ratio: f64) {
        self.sheets
            .entry(sheet)
            .or_insert_with(|| self.policy.storage_for(fill_ratio));
    }

    pub fn remove_sheet(&mut self, sheet: SheetId) -> Vec<(CellAddress, VertexId)> {
        self.sheets
            .remove(&sheet)
            .map(|s| {
                s.entries()
                    .into_iter()
                    .map(|(r, c, id)| (CellAddress::new(sheet, r, c), id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_sheet(&self, sheet: SheetId) -> bool {
        self.sheets.contains_key(&sheet)
    }

    pub fn is_dense(&self, sheet: SheetId) -> Option<bool> {
        self.sheets.get(&sheet).map(|s| s.is_dense())
    }

    pub fn get(&self, addr: CellAddress) -> Option<VertexId> {
        self.sheets.get(&addr.sheet)?.get(addr.row, addr.col)
    }

    /// Like [`get`](Self::get) for addresses that must be mapped.
    pub fn fetch(&self, addr: CellAddress) -> VertexId {
        self.get(addr)
            .unwrap_or_else(|| panic!("no vertex mapped at {addr}"))
    }

    pub fn set(&mut self, addr: CellAddress, id: VertexId) {
        match self.sheets.get_mut(&addr.sheet) {
            Some(storage) => storage.set(addr.row, addr.col, id),
            None => panic!("sheet {} is not registered in the address mapping", addr.sheet),
        }
    }

    pub fn remove(&mut self, addr: CellAddress) -> Option<VertexId> {
        self.sheets.get_mut(&addr.sheet)?.remove(addr.row, addr.col)
    }

    pub fn entries(&self, sheet: SheetId) -> Vec<(CellAddress, VertexId)> {
        self.sheets
            .get(&sheet)
            .map(|s| {
                s.entries()
                    .into_iter()
                    .map(|(r, c, id)| (CellAddress::new(sheet, r, c), id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self, sheet: SheetId) -> usize {
        self.sheets.get(&sheet).map_or(0, |s| s.len())
    }

    /// Re-key every cell of `sheets` through `f`. Cells mapped to `None` are
    /// dropped. Returns the entries whose address changed, at their new address.
    pub fn remap(
        &mut self,
        sheets: &[SheetId],
        f: impl Fn(CellAddress) -> Option<CellAddress>,
    ) -> Vec<(VertexId, CellAddress)> {
        let mut moved = Vec::new();
        let mut placed = Vec::new();
        for &sheet in sheets {
            let Some(storage) = self.sheets.get_mut(&sheet) else {
                continue;
            };
            for (row, col, id) in storage.entries() {
                let old = CellAddress::new(sheet, row, col);
                match f(old) {
                    Some(new) if new == old => {}
                    Some(new) => {
                        storage.remove(row, col);
                        moved.push((id, new));
                    }
                    None => {
                        storage.remove(row, col);
                    }
                }
            }
        }
        for &(id, new) in &moved {
            if let Some(storage) = self.sheets.get_mut(&new.sheet) {
                storage.set(new.row, new.col, id);
                placed.push((id, new));
            }
        }
        placed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(policy: AddressMappingPolicy) -> AddressMapping {
        let mut m = AddressMapping::new(policy);
        m.add_sheet(0, 1.0);
        m
    }

    #[test]
    fn policy_picks_storage_by_fill_ratio() {
        let mut m = AddressMapping::new(AddressMappingPolicy::default());
        m.add_sheet(0, 0.9);
        m.add_sheet(1, 0.1);
        assert_eq!(m.is_dense(0), Some(true));
        assert_eq!(m.is_dense(1), Some(false));
        assert_eq!(m.is_dense(2), None);
    }

    #[test]
    fn dense_and_sparse_agree() {
        for policy in [AddressMappingPolicy::AlwaysDense, AddressMappingPolicy::AlwaysSparse] {
            let mut m = mapping(policy);
            let a = CellAddress::new(0, 3, 2);
            m.set(a, VertexId(7));
            m.set(CellAddress::new(0, 0, 0), VertexId(1));
            assert_eq!(m.get(a), Some(VertexId(7)));
            assert_eq!(m.fetch(a), VertexId(7));
            assert_eq!(m.len(0), 2);
            assert_eq!(m.remove(a), Some(VertexId(7)));
            assert_eq!(m.get(a), None);
            assert_eq!(m.len(0), 1);
        }
    }

    #[test]
    fn remap_shifts_rows() {
        let mut m = mapping(AddressMappingPolicy::AlwaysDense);
        for row in 0..4 {
            m.set(CellAddress::new(0, row, 0), VertexId(row));
        }
        // Insert two rows at index 1.
        let moved = m.remap(&[0], |a| {
            Some(if a.row >= 1 { CellAddress::new(a.sheet, a.row + 2, a.col) } else { a })
        });
        assert_eq!(moved.len(), 3);
        assert_eq!(m.get(CellAddress::new(0, 0, 0)), Some(VertexId(0)));
        assert_eq!(m.get(CellAddress::new(0, 1, 0)), None);
        assert_eq!(m.get(CellAddress::new(0, 5, 0)), Some(VertexId(3)));
    }

    #[test]
    #[should_panic(expected = "no vertex mapped")]
    fn fetch_missing_panics() {
        mapping(AddressMappingPolicy::AlwaysSparse).fetch(CellAddress::new(0, 1, 1));
    }
}
