//! Dependency graph over cells, ranges and array anchors.
//!
//! Vertices live in an arena and are addressed by [`VertexId`]; edges, the
//! address mapping and the range mapping only ever hold ids. An edge
//! `a -> b` means `b` reads `a`.

use rustc_hash::{FxHashMap, FxHashSet};
use sheetgraph_common::{CellAddress, ExcelError, ExcelErrorKind, LiteralValue, RangeAddress, SheetId};

use super::EvalConfig;
use super::address_mapping::AddressMapping;
use super::changes::{ChangeCollector, ChangeSet};
use super::content::CellContent;
use super::range_mapping::RangeMapping;
use super::sheet_registry::SheetRegistry;
use super::transform_log::TransformLog;
use super::vertex::{RangeVertex, Vertex, VertexId, VertexKind};
use super::vertex_store::VertexStore;
use crate::formula::{Dependency, StoredFormula};
use editor::reference_adjuster::ReferenceAdjuster;

pub mod editor;
pub mod spill;

/// Finite ranges up to this many cells look their members up cell by cell;
/// larger and open ranges scan the sheet's mapped cells instead.
const CELLWISE_SCAN_LIMIT: u64 = 4096;

#[derive(Debug)]
pub struct DependencyGraph {
    store: VertexStore,
    addresses: AddressMapping,
    ranges: RangeMapping,
    sheets: SheetRegistry,
    log: TransformLog,
    dirty: FxHashSet<VertexId>,
    gc_candidates: FxHashSet<VertexId>,
    /// Formulas whose array result could not spill, with the region they
    /// asked for.
    spill_blocked: FxHashMap<VertexId, RangeAddress>,
    changes: ChangeCollector,
    config: EvalConfig,
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new(EvalConfig::default())
    }
}

impl DependencyGraph {
    pub fn new(config: EvalConfig) -> Self {
        Self {
            store: VertexStore::new(),
            addresses: AddressMapping::new(config.address_mapping),
            ranges: RangeMapping::new(),
            sheets: SheetRegistry::new(),
            log: TransformLog::new(),
            dirty: FxHashSet::default(),
            gc_candidates: FxHashSet::default(),
            spill_blocked: FxHashMap::default(),
            changes: ChangeCollector::new(),
            config,
        }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn vertices(&self) -> &VertexStore {
        &self.store
    }

    /// Panics if `id` is not live.
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        self.store.vertex(id)
    }

    pub fn vertex_count(&self) -> usize {
        self.store.len()
    }

    pub fn addresses(&self) -> &AddressMapping {
        &self.addresses
    }

    pub fn ranges(&self) -> &RangeMapping {
        &self.ranges
    }

    pub fn sheets(&self) -> &SheetRegistry {
        &self.sheets
    }

    pub fn transform_log(&self) -> &TransformLog {
        &self.log
    }

    /// Register a sheet; `None` if the name is taken.
    pub(crate) fn create_sheet(&mut self, name: &str, fill_ratio: f64) -> Option<SheetId> {
        let id = self.sheets.add(name)?;
        self.addresses.add_sheet(id, fill_ratio);
        Some(id)
    }

    /* ───────────────────────── vertices & edges ───────────────────────── */

    pub fn add_vertex(&mut self, kind: VertexKind) -> VertexId {
        let id = self.store.allocate(Vertex::new(kind));
        self.gc_candidates.insert(id);
        id
    }

    /// Remove a vertex the caller has already cut loose. Fails while any
    /// edge still points at or from it.
    pub fn remove_vertex(&mut self, id: VertexId) -> Result<VertexKind, ExcelError> {
        if self.store.vertex(id).has_edges() {
            return Err(ExcelError::new(ExcelErrorKind::Error)
                .with_message(format!("vertex {id:?} still has edges")));
        }
        self.dirty.remove(&id);
        self.gc_candidates.remove(&id);
        self.spill_blocked.remove(&id);
        Ok(self.store.free(id).kind)
    }

    /// `to` reads `from`.
    pub fn add_edge(&mut self, from: VertexId, to: VertexId) {
        assert!(
            self.store.contains(from) && self.store.contains(to),
            "edge {from:?} -> {to:?} between vertices that are not in the graph"
        );
        self.store.vertex_mut(from).dependents.insert(to);
        self.store.vertex_mut(to).dependencies.insert(from);
    }

    pub fn remove_edge(&mut self, from: VertexId, to: VertexId) -> bool {
        let removed = self.store.vertex_mut(to).dependencies.remove(&from);
        self.store.vertex_mut(from).dependents.remove(&to);
        if removed {
            self.gc_candidates.insert(from);
            self.gc_candidates.insert(to);
        }
        removed
    }

    pub fn exists_edge(&self, from: VertexId, to: VertexId) -> bool {
        self.store
            .get(to)
            .is_some_and(|v| v.dependencies.contains(&from))
    }

    /// Vertices that read `id`.
    pub fn adjacent_nodes(&self, id: VertexId) -> Vec<VertexId> {
        let mut out: Vec<VertexId> = self.store.vertex(id).dependents().collect();
        out.sort();
        out
    }

    /// Drop every edge into `id`.
    pub(crate) fn detach_dependencies(&mut self, id: VertexId) {
        let deps: Vec<VertexId> = self.store.vertex(id).dependencies().collect();
        for dep in deps {
            self.remove_edge(dep, id);
        }
    }

    /// Drop every edge of `id`, marking its readers dirty.
    pub(crate) fn isolate(&mut self, id: VertexId) {
        self.detach_dependencies(id);
        let dependents: Vec<VertexId> = self.store.vertex(id).dependents().collect();
        for dependent in dependents {
            self.dirty.insert(dependent);
            self.remove_edge(id, dependent);
        }
    }

    /// Cut a vertex loose and free it. The caller unmaps its address.
    pub(crate) fn discard_vertex(&mut self, id: VertexId) -> VertexKind {
        self.isolate(id);
        self.dirty.remove(&id);
        self.gc_candidates.remove(&id);
        self.spill_blocked.remove(&id);
        self.store.free(id).kind
    }

    /// Hand every reader of `from` over to `to`.
    pub(crate) fn transfer_dependents(&mut self, from: VertexId, to: VertexId) -> Vec<VertexId> {
        let dependents: Vec<VertexId> = self.store.vertex(from).dependents().collect();
        for &dependent in &dependents {
            self.remove_edge(from, dependent);
            if dependent != to {
                self.add_edge(to, dependent);
            }
        }
        dependents
    }

    /* ───────────────────────────── cells ───────────────────────────── */

    pub fn vertex_at(&self, addr: CellAddress) -> Option<VertexId> {
        self.addresses.get(addr)
    }

    /// Where a cell vertex currently sits. Formula addresses are replayed
    /// through the log without rewriting the tree.
    pub fn vertex_address(&self, id: VertexId) -> Option<CellAddress> {
        match &self.store.get(id)?.kind {
            VertexKind::Empty { address } | VertexKind::Value { address, .. } => Some(*address),
            VertexKind::Array(a) => Some(a.region.start()),
            VertexKind::Formula(f) => {
                let mut at = f.formula.address;
                for op in self.log.since(f.formula.version) {
                    at = op.map_cell(at)?;
                }
                Some(at)
            }
            VertexKind::Range(_) => None,
        }
    }

    /// The value a formula reading `addr` sees.
    pub fn cell_value(&self, addr: CellAddress) -> LiteralValue {
        let Some(id) = self.vertex_at(addr) else {
            return LiteralValue::Empty;
        };
        match &self.store.vertex(id).kind {
            VertexKind::Value { value, .. } => value.clone(),
            VertexKind::Formula(f) => f.value.clone().unwrap_or(LiteralValue::Empty),
            VertexKind::Array(a) => a.value_at(addr),
            VertexKind::Empty { .. } | VertexKind::Range(_) => LiteralValue::Empty,
        }
    }

    /// The vertex at `addr`, creating an empty placeholder if needed.
    pub fn get_or_create_cell(&mut self, addr: CellAddress) -> VertexId {
        if let Some(id) = self.vertex_at(addr) {
            return id;
        }
        let id = self.add_vertex(VertexKind::Empty { address: addr });
        self.addresses.set(addr, id);
        self.connect_to_ranges(id, addr);
        id
    }

    /// Make `id` a member of every range vertex covering `addr`.
    pub(crate) fn connect_to_ranges(&mut self, id: VertexId, addr: CellAddress) -> Vec<VertexId> {
        let covering: Vec<VertexId> = self
            .ranges
            .on_sheet(addr.sheet)
            .into_iter()
            .filter(|(r, _)| r.contains(addr))
            .map(|(_, rid)| rid)
            .collect();
        for &rid in &covering {
            self.add_edge(id, rid);
        }
        covering
    }

    /// Mapped cells inside `range`.
    pub fn cells_in(&self, range: &RangeAddress) -> Vec<(CellAddress, VertexId)> {
        if !self.addresses.has_sheet(range.sheet) {
            return Vec::new();
        }
        if range.is_finite() && range.height() * range.width() <= CELLWISE_SCAN_LIMIT {
            range
                .cells()
                .filter_map(|addr| self.vertex_at(addr).map(|id| (addr, id)))
                .collect()
        } else {
            self.addresses
                .entries(range.sheet)
                .into_iter()
                .filter(|(addr, _)| range.contains(*addr))
                .collect()
        }
    }

    fn member_ids(&self, range: &RangeAddress) -> Vec<VertexId> {
        let mut ids: Vec<VertexId> = self.cells_in(range).into_iter().map(|(_, id)| id).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /* ───────────────────────────── ranges ───────────────────────────── */

    pub fn get_range(&self, range: &RangeAddress) -> Option<VertexId> {
        self.ranges.get(range)
    }

    /// The vertex for exactly `range`, created with its members on first use.
    pub fn get_or_create_range(&mut self, range: RangeAddress) -> VertexId {
        if let Some(id) = self.ranges.get(&range) {
            return id;
        }
        let id = self.add_vertex(VertexKind::Range(RangeVertex {
            range,
            cache: FxHashMap::default(),
        }));
        self.ranges.set(range, id);
        for member in self.member_ids(&range) {
            self.add_edge(member, id);
        }
        id
    }

    /// Recompute which cells feed a range vertex.
    pub(crate) fn rebuild_range_members(&mut self, rid: VertexId) {
        let VertexKind::Range(rv) = &mut self.store.vertex_mut(rid).kind else {
            return;
        };
        rv.cache.clear();
        let range = rv.range;
        self.detach_dependencies(rid);
        for member in self.member_ids(&range) {
            self.add_edge(member, rid);
        }
        self.dirty.insert(rid);
    }

    /// Forget rolling aggregates on the given range vertices.
    pub(crate) fn clear_range_caches(&mut self, ids: &[VertexId]) {
        for &id in ids {
            if let Some(Vertex {
                kind: VertexKind::Range(rv),
                ..
            }) = self.store.get_mut(id)
            {
                rv.cache.clear();
            }
        }
    }

    pub(crate) fn store_aggregate(&mut self, range: &RangeAddress, function: &'static str, value: LiteralValue) {
        let Some(id) = self.ranges.get(range) else {
            return;
        };
        if let VertexKind::Range(rv) = &mut self.store.vertex_mut(id).kind {
            rv.cache.insert(function, value);
        }
    }

    pub fn cached_aggregate(&self, range: &RangeAddress, function: &str) -> Option<LiteralValue> {
        let id = self.ranges.get(range)?;
        match &self.store.vertex(id).kind {
            VertexKind::Range(rv) => rv.cache.get(function).cloned(),
            _ => None,
        }
    }

    /* ──────────────────────────── formulas ──────────────────────────── */

    /// Replay the transformation log entries a formula has not seen yet.
    pub fn refresh_formula(&mut self, id: VertexId) {
        let current = self.log.version();
        let Some(formula) = self.store.get_mut(id).and_then(|v| v.kind.formula_mut()) else {
            return;
        };
        if formula.version >= current {
            return;
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(
            vertex = id.0,
            pending = current - formula.version,
            "rewriting stale formula"
        );
        let adjuster = ReferenceAdjuster::new();
        for op in self.log.since(formula.version) {
            let old_at = formula.address;
            let new_at = op
                .map_cell(old_at)
                .unwrap_or_else(|| panic!("formula at {old_at} was deleted by {op:?} but is still in the graph"));
            adjuster.adjust_expr(&mut formula.expr, old_at, new_at, op);
            formula.address = new_at;
        }
        formula.version = current;
    }

    /// The up-to-date formula of a vertex.
    pub fn formula(&mut self, id: VertexId) -> Option<&StoredFormula> {
        self.refresh_formula(id);
        self.store.get(id)?.kind.formula()
    }

    /// Add edges from everything a formula reads.
    pub(crate) fn link_dependencies(&mut self, id: VertexId) {
        self.refresh_formula(id);
        let deps = match self.store.vertex(id).kind.formula() {
            Some(f) => f.expr.dependencies(f.address),
            None => return,
        };
        for dep in deps {
            let source = match dep {
                Dependency::Cell(addr) => {
                    if !self.sheets.contains(addr.sheet)
                        || addr.row >= self.config.max_rows
                        || addr.col >= self.config.max_columns
                    {
                        continue;
                    }
                    self.get_or_create_cell(addr)
                }
                Dependency::Range(range) => {
                    if !self.sheets.contains(range.sheet) {
                        continue;
                    }
                    self.get_or_create_range(range)
                }
            };
            self.add_edge(source, id);
        }
    }

    /// Snapshot of what a cell holds. Spilled cells other than the anchor
    /// hold nothing of their own.
    pub(crate) fn cell_content(&mut self, addr: CellAddress) -> CellContent {
        let Some(id) = self.vertex_at(addr) else {
            return CellContent::Empty;
        };
        self.refresh_formula(id);
        match &self.store.vertex(id).kind {
            VertexKind::Value { value, .. } => CellContent::Value(value.clone()),
            VertexKind::Formula(f) => CellContent::Formula(f.formula.expr.clone()),
            VertexKind::Array(a) if a.region.start() == addr => {
                CellContent::Formula(a.formula.expr.clone())
            }
            _ => CellContent::Empty,
        }
    }

    /* ───────────────────────────── dirty ───────────────────────────── */

    pub fn mark_dirty(&mut self, id: VertexId) {
        self.dirty.insert(id);
    }

    pub(crate) fn mark_dependents_dirty(&mut self, id: VertexId) {
        let dependents: Vec<VertexId> = self.store.vertex(id).dependents().collect();
        self.dirty.extend(dependents);
    }

    pub fn is_dirty(&self, id: VertexId) -> bool {
        self.dirty.contains(&id)
    }

    pub fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Drain the dirty set, dropping vertices removed since they were marked.
    pub(crate) fn take_dirty(&mut self) -> Vec<VertexId> {
        let mut out: Vec<VertexId> = self
            .dirty
            .drain()
            .filter(|id| self.store.contains(*id))
            .collect();
        out.sort();
        out
    }

    pub(crate) fn mark_all_formulas_dirty(&mut self) {
        let formulas: Vec<VertexId> = self
            .store
            .iter()
            .filter(|(_, v)| v.kind.is_formula())
            .map(|(id, _)| id)
            .collect();
        self.dirty.extend(formulas);
    }

    /* ───────────────────────────── changes ───────────────────────────── */

    pub(crate) fn record_old_value(&mut self, addr: CellAddress) {
        let old = self.cell_value(addr);
        self.changes.record(addr, old);
    }

    pub(crate) fn take_changes(&mut self) -> ChangeSet {
        let mut changes = std::mem::take(&mut self.changes);
        let set = changes.take(|addr| {
            if self.sheets.contains(addr.sheet) {
                self.cell_value(addr)
            } else {
                LiteralValue::Empty
            }
        });
        self.changes = changes;
        set
    }

    /* ─────────────────────── garbage collection ─────────────────────── */

    /// Remove placeholders nothing reads and range vertices no formula uses.
    /// Removing a range can orphan its member placeholders, which are then
    /// removed as well.
    pub fn collect_garbage(&mut self) -> usize {
        let mut removed = 0;
        while let Some(&id) = self.gc_candidates.iter().next() {
            self.gc_candidates.remove(&id);
            let Some(vertex) = self.store.get(id) else {
                continue;
            };
            match &vertex.kind {
                VertexKind::Empty { address } => {
                    let only_ranges_read_it = vertex
                        .dependents()
                        .all(|d| matches!(self.store.vertex(d).kind, VertexKind::Range(_)));
                    if !vertex.dependencies.is_empty() || !only_ranges_read_it {
                        continue;
                    }
                    let address = *address;
                    let ranges: Vec<VertexId> = vertex.dependents().collect();
                    for rid in ranges {
                        self.remove_edge(id, rid);
                        self.dirty.insert(rid);
                    }
                    if self.addresses.get(address) == Some(id) {
                        self.addresses.remove(address);
                    }
                }
                VertexKind::Range(rv) => {
                    if !vertex.dependents.is_empty() {
                        continue;
                    }
                    let range = rv.range;
                    self.detach_dependencies(id);
                    self.ranges.remove(&range);
                }
                _ => continue,
            }
            self.gc_candidates.remove(&id);
            self.dirty.remove(&id);
            self.store.free(id);
            removed += 1;
        }
        #[cfg(feature = "tracing")]
        if removed > 0 {
            tracing::debug!(removed, live = self.store.len(), "garbage collected vertices");
        }
        removed
    }

    /* ──────────────────────────── geometry ──────────────────────────── */

    /// `(rows, cols)` spanned by non-empty cells, spilled cells included.
    pub fn used_extent(&self, sheet: SheetId) -> (u32, u32) {
        self.addresses
            .entries(sheet)
            .into_iter()
            .filter(|(_, id)| !self.store.vertex(*id).kind.is_empty_cell())
            .fold((0, 0), |(rows, cols), (addr, _)| {
                (rows.max(addr.row + 1), cols.max(addr.col + 1))
            })
    }

    /// The largest row at or after `index` that inserting rows there would
    /// shift: any mapped cell, placeholders included, or the last row of a
    /// finite range vertex.
    pub fn last_row_from(&self, sheet: SheetId, index: u32) -> Option<u32> {
        self.last_shifted(sheet, index, |a| a.row, |r| (!r.is_whole_columns()).then_some(r.end_row))
    }

    /// Column counterpart of [`last_row_from`](Self::last_row_from).
    pub fn last_col_from(&self, sheet: SheetId, index: u32) -> Option<u32> {
        self.last_shifted(sheet, index, |a| a.col, |r| (!r.is_whole_rows()).then_some(r.end_col))
    }

    fn last_shifted(
        &self,
        sheet: SheetId,
        index: u32,
        cell: impl Fn(CellAddress) -> u32,
        range_end: impl Fn(&RangeAddress) -> Option<u32>,
    ) -> Option<u32> {
        let cells = self.addresses.entries(sheet).into_iter().map(|(addr, _)| cell(addr));
        let ranges = self
            .ranges
            .on_sheet(sheet)
            .into_iter()
            .filter_map(|(range, _)| range_end(&range));
        cells.chain(ranges).filter(|&v| v >= index).max()
    }

    /// Array formulas on `sheet`, with their spill regions.
    pub fn arrays_on(&self, sheet: SheetId) -> Vec<(VertexId, RangeAddress)> {
        let mut out: Vec<(VertexId, RangeAddress)> = self
            .addresses
            .entries(sheet)
            .into_iter()
            .filter_map(|(addr, id)| match &self.store.vertex(id).kind {
                VertexKind::Array(a) if a.region.start() == addr => Some((id, a.region)),
                _ => None,
            })
            .collect();
        out.sort_by_key(|(_, region)| *region);
        out
    }

    /// The array anchor owning `addr`, if `addr` is a spilled cell.
    pub fn array_owning(&self, addr: CellAddress) -> Option<(VertexId, RangeAddress)> {
        let id = self.vertex_at(addr)?;
        match &self.store.vertex(id).kind {
            VertexKind::Array(a) => Some((id, a.region)),
            _ => None,
        }
    }
}
