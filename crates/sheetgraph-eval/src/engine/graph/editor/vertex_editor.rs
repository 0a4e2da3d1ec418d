use rustc_hash::{FxHashMap, FxHashSet};
use sheetgraph_common::{CellAddress, LiteralValue, RangeAddress, SheetId};

use super::EditorError;
use super::undo_engine::{CellEdit, UndoEntry};
use crate::engine::content::CellContent;
use crate::engine::graph::DependencyGraph;
use crate::engine::transform_log::Transformation;
use crate::engine::vertex::{FormulaCell, VertexId, VertexKind};
use crate::formula::StoredFormula;

const FORBIDDEN_SHEET_CHARS: &[char] = &['[', ']', '*', '?', '/', '\\', ':'];

/// Exclusive write access to the dependency graph.
///
/// Every `check_*` method is a pure feasibility test. The mutating methods
/// run the same check first and refuse the edit with the same error, so a
/// refused edit never leaves the graph half-changed. Mutations return the
/// [`UndoEntry`] that describes them; recording it is the caller's business.
///
/// # Example
///
/// ```ignore
/// let mut editor = VertexEditor::new(&mut graph);
/// editor.check_add_rows(sheet, 2, 1)?;
/// let entry = editor.insert_rows(sheet, 2, 1)?;
/// undo.record(entry);
/// ```
pub struct VertexEditor<'g> {
    graph: &'g mut DependencyGraph,
}

impl<'g> VertexEditor<'g> {
    pub fn new(graph: &'g mut DependencyGraph) -> Self {
        Self { graph }
    }

    /* ───────────────────────── feasibility ───────────────────────── */

    fn check_sheet(&self, sheet: SheetId) -> Result<(), EditorError> {
        if self.graph.sheets.contains(sheet) {
            Ok(())
        } else {
            Err(EditorError::UnknownSheet { sheet })
        }
    }

    fn check_in_bounds(&self, addr: CellAddress) -> Result<(), EditorError> {
        let cfg = &self.graph.config;
        if addr.row >= cfg.max_rows || addr.col >= cfg.max_columns {
            return Err(EditorError::OutOfBounds {
                row: addr.row,
                col: addr.col,
            });
        }
        Ok(())
    }

    fn check_band(&self, sheet: SheetId, index: u32, count: u32, limit: u32) -> Result<(), EditorError> {
        self.check_sheet(sheet)?;
        if count == 0 {
            return Err(EditorError::InvalidArgs {
                reason: "count must be positive".to_string(),
            });
        }
        if index >= limit {
            return Err(EditorError::InvalidArgs {
                reason: format!("index {index} is past the sheet limit of {limit}"),
            });
        }
        if index.checked_add(count).is_none_or(|end| end > limit) {
            return Err(EditorError::InvalidArgs {
                reason: format!("{count} indices from {index} run past the sheet limit of {limit}"),
            });
        }
        Ok(())
    }

    /// A cell may be written unless it is a spilled cell of an array.
    pub fn check_set_cell(&self, addr: CellAddress) -> Result<(), EditorError> {
        self.check_sheet(addr.sheet)?;
        self.check_in_bounds(addr)?;
        match self.graph.array_owning(addr) {
            Some((_, region)) if region.start() != addr => Err(EditorError::OntoArray {
                anchor: region.start(),
            }),
            _ => Ok(()),
        }
    }

    /// Every cell of `target` must be writable.
    pub fn check_paste(&self, target: &RangeAddress) -> Result<(), EditorError> {
        self.check_sheet(target.sheet)?;
        self.check_in_bounds(target.end())?;
        for (addr, _) in self.graph.cells_in(target) {
            self.check_set_cell(addr)?;
        }
        Ok(())
    }

    pub fn check_add_rows(&self, sheet: SheetId, index: u32, count: u32) -> Result<(), EditorError> {
        let max = self.graph.config.max_rows;
        self.check_band(sheet, index, count, max)?;
        if let Some(last) = self.graph.last_row_from(sheet, index) {
            let rows = u64::from(last) + 1 + u64::from(count);
            if rows > u64::from(max) {
                let (_, cols) = self.graph.used_extent(sheet);
                return Err(EditorError::SheetSizeLimitExceeded {
                    sheet,
                    rows,
                    cols: u64::from(cols),
                });
            }
        }
        for (_, region) in self.graph.arrays_on(sheet) {
            if region.start_row < index && index <= region.end_row {
                return Err(EditorError::ArrayBoundary {
                    anchor: region.start(),
                });
            }
        }
        Ok(())
    }

    pub fn check_add_columns(&self, sheet: SheetId, index: u32, count: u32) -> Result<(), EditorError> {
        let max = self.graph.config.max_columns;
        self.check_band(sheet, index, count, max)?;
        if let Some(last) = self.graph.last_col_from(sheet, index) {
            let cols = u64::from(last) + 1 + u64::from(count);
            if cols > u64::from(max) {
                let (rows, _) = self.graph.used_extent(sheet);
                return Err(EditorError::SheetSizeLimitExceeded {
                    sheet,
                    rows: u64::from(rows),
                    cols,
                });
            }
        }
        for (_, region) in self.graph.arrays_on(sheet) {
            if region.start_col < index && index <= region.end_col {
                return Err(EditorError::ArrayBoundary {
                    anchor: region.start(),
                });
            }
        }
        Ok(())
    }

    pub fn check_remove_rows(&self, sheet: SheetId, index: u32, count: u32) -> Result<(), EditorError> {
        self.check_band(sheet, index, count, self.graph.config.max_rows)?;
        let last = index + (count - 1);
        for (_, region) in self.graph.arrays_on(sheet) {
            let overlaps = region.start_row <= last && region.end_row >= index;
            let inside = region.start_row >= index && region.end_row <= last;
            if overlaps && !inside {
                return Err(EditorError::ArrayBoundary {
                    anchor: region.start(),
                });
            }
        }
        Ok(())
    }

    pub fn check_remove_columns(&self, sheet: SheetId, index: u32, count: u32) -> Result<(), EditorError> {
        self.check_band(sheet, index, count, self.graph.config.max_columns)?;
        let last = index + (count - 1);
        for (_, region) in self.graph.arrays_on(sheet) {
            let overlaps = region.start_col <= last && region.end_col >= index;
            let inside = region.start_col >= index && region.end_col <= last;
            if overlaps && !inside {
                return Err(EditorError::ArrayBoundary {
                    anchor: region.start(),
                });
            }
        }
        Ok(())
    }

    /// Arrays must move whole and cannot be overwritten by the move.
    pub fn check_move_cells(&self, source: &RangeAddress, target: CellAddress) -> Result<(), EditorError> {
        self.check_sheet(source.sheet)?;
        self.check_sheet(target.sheet)?;
        if !source.is_finite() {
            return Err(EditorError::InvalidArgs {
                reason: "only finite ranges can be moved".to_string(),
            });
        }
        self.check_in_bounds(source.end())?;
        self.check_in_bounds(target)?;
        let dest = RangeAddress::with_size(target, source.height() as u32, source.width() as u32)
            .ok_or(EditorError::OutOfBounds {
                row: target.row,
                col: target.col,
            })?;
        self.check_in_bounds(dest.end())?;

        for (_, region) in self.graph.arrays_on(source.sheet) {
            if region.intersects(source) && !source.contains_range(&region) {
                return Err(EditorError::ArrayBoundary {
                    anchor: region.start(),
                });
            }
        }
        for (_, region) in self.graph.arrays_on(target.sheet) {
            if region.intersects(&dest) && !source.contains_range(&region) {
                return Err(EditorError::OntoArray {
                    anchor: region.start(),
                });
            }
        }
        Ok(())
    }

    /// `moves` are `(from, to)` row pairs that must form a permutation of
    /// the rows involved.
    pub fn check_reorder_rows(&self, sheet: SheetId, moves: &[(u32, u32)]) -> Result<(), EditorError> {
        self.check_sheet(sheet)?;
        let max = self.graph.config.max_rows;
        for &(from, to) in moves {
            if from >= max || to >= max {
                return Err(EditorError::OutOfBounds {
                    row: from.max(to),
                    col: 0,
                });
            }
        }
        let mut sources: Vec<u32> = moves.iter().map(|m| m.0).collect();
        let mut targets: Vec<u32> = moves.iter().map(|m| m.1).collect();
        sources.sort_unstable();
        targets.sort_unstable();
        if let Some(w) = sources.windows(2).find(|w| w[0] == w[1]) {
            return Err(EditorError::InvalidPermutation {
                reason: format!("row {} is moved twice", w[0]),
            });
        }
        if let Some(w) = targets.windows(2).find(|w| w[0] == w[1]) {
            return Err(EditorError::InvalidPermutation {
                reason: format!("row {} receives two rows", w[0]),
            });
        }
        if sources != targets {
            return Err(EditorError::InvalidPermutation {
                reason: "moved rows do not form a permutation".to_string(),
            });
        }
        for (_, region) in self.graph.arrays_on(sheet) {
            let touched = moves
                .iter()
                .any(|&(from, to)| from != to && from >= region.start_row && from <= region.end_row);
            if touched {
                return Err(EditorError::ArrayBoundary {
                    anchor: region.start(),
                });
            }
        }
        Ok(())
    }

    /// Sheet names are non-empty, avoid `[]*?/\:`, do not start or end with
    /// an apostrophe and are unique ignoring case. `except` may keep its own
    /// name.
    pub fn check_sheet_name(&self, name: &str, except: Option<SheetId>) -> Result<(), EditorError> {
        let invalid = |reason: &str| EditorError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if name.contains(FORBIDDEN_SHEET_CHARS) {
            return Err(invalid("name contains a forbidden character"));
        }
        if name.starts_with('\'') || name.ends_with('\'') {
            return Err(invalid("name cannot start or end with an apostrophe"));
        }
        match self.graph.sheets.get_id(name) {
            Some(id) if Some(id) != except => Err(invalid("name is already in use")),
            _ => Ok(()),
        }
    }

    /* ───────────────────────── cell contents ───────────────────────── */

    /// Replace what a cell holds. Unchecked: callers validate with
    /// [`check_set_cell`](Self::check_set_cell) first.
    pub fn write_cell(&mut self, addr: CellAddress, content: CellContent) -> CellEdit {
        let g = &mut *self.graph;
        if let Some((anchor, region)) = g.array_owning(addr) {
            if region.start() != addr {
                g.release_spill(anchor);
                g.dirty.insert(anchor);
            }
        }
        let old = g.cell_content(addr);
        g.record_old_value(addr);
        g.wake_blocked_spills(addr);

        let kind = match &content {
            CellContent::Empty => VertexKind::Empty { address: addr },
            CellContent::Value(value) => VertexKind::Value {
                address: addr,
                value: value.clone(),
            },
            CellContent::Formula(expr) => VertexKind::Formula(FormulaCell {
                formula: StoredFormula::new(expr.clone(), addr, g.log.version()),
                value: None,
            }),
        };

        match g.vertex_at(addr) {
            Some(id) => {
                if matches!(g.store.vertex(id).kind, VertexKind::Array(_)) {
                    g.release_spill(id);
                }
                if g.store.vertex(id).kind.is_formula() {
                    g.detach_dependencies(id);
                }
                g.store.vertex_mut(id).kind = kind;
                g.spill_blocked.remove(&id);
                match &content {
                    CellContent::Empty => {
                        g.gc_candidates.insert(id);
                    }
                    CellContent::Formula(_) => g.link_dependencies(id),
                    CellContent::Value(_) => {}
                }
                g.dirty.insert(id);
            }
            None if content.is_empty() => {}
            None => {
                let id = g.add_vertex(kind);
                g.addresses.set(addr, id);
                g.connect_to_ranges(id, addr);
                if matches!(content, CellContent::Formula(_)) {
                    g.link_dependencies(id);
                }
                g.dirty.insert(id);
            }
        }

        CellEdit {
            address: addr,
            old,
            new: content,
        }
    }

    /// Write several cells in order as one undoable edit.
    pub fn set_cells(&mut self, cells: Vec<(CellAddress, CellContent)>) -> Result<UndoEntry, EditorError> {
        for (addr, _) in &cells {
            self.check_set_cell(*addr)?;
        }
        let cells = cells
            .into_iter()
            .map(|(addr, content)| self.write_cell(addr, content))
            .collect();
        Ok(UndoEntry::SetCells { cells })
    }

    /* ───────────────────────── structural edits ───────────────────────── */

    pub fn insert_rows(&mut self, sheet: SheetId, index: u32, count: u32) -> Result<UndoEntry, EditorError> {
        self.check_add_rows(sheet, index, count)?;
        Ok(self.apply_structural(Transformation::InsertRows { sheet, index, count }))
    }

    pub fn remove_rows(&mut self, sheet: SheetId, index: u32, count: u32) -> Result<UndoEntry, EditorError> {
        self.check_remove_rows(sheet, index, count)?;
        Ok(self.apply_structural(Transformation::RemoveRows { sheet, index, count }))
    }

    pub fn insert_columns(&mut self, sheet: SheetId, index: u32, count: u32) -> Result<UndoEntry, EditorError> {
        self.check_add_columns(sheet, index, count)?;
        Ok(self.apply_structural(Transformation::InsertColumns { sheet, index, count }))
    }

    pub fn remove_columns(&mut self, sheet: SheetId, index: u32, count: u32) -> Result<UndoEntry, EditorError> {
        self.check_remove_columns(sheet, index, count)?;
        Ok(self.apply_structural(Transformation::RemoveColumns { sheet, index, count }))
    }

    pub fn move_cells(&mut self, source: RangeAddress, target: CellAddress) -> Result<UndoEntry, EditorError> {
        self.check_move_cells(&source, target)?;
        Ok(self.apply_structural(Transformation::MoveCells { source, target }))
    }

    /// Apply a row/column edit or a move, keeping what it destroys for undo.
    pub fn apply_structural(&mut self, op: Transformation) -> UndoEntry {
        let (removed, rewritten) = self.snapshot_destroyed(op);
        self.transform(op);
        UndoEntry::Structural {
            op,
            removed,
            rewritten,
        }
    }

    /// Content `op` deletes, and the formulas whose text its inverse would
    /// not bring back: readers of deleted cells and of ranges that do not
    /// survive the round trip.
    fn snapshot_destroyed(
        &mut self,
        op: Transformation,
    ) -> (Vec<(CellAddress, CellContent)>, Vec<(CellAddress, CellContent)>) {
        let inverse = op.inverse();
        let mut doomed: FxHashSet<VertexId> = FxHashSet::default();
        let mut removed = Vec::new();
        for sheet in op.sheets() {
            for (addr, id) in self.graph.addresses.entries(sheet) {
                if op.map_cell(addr).is_some() {
                    continue;
                }
                doomed.insert(id);
                let content = self.graph.cell_content(addr);
                if !content.is_empty() {
                    removed.push((addr, content));
                }
            }
        }
        let mut sources: Vec<VertexId> = doomed.iter().copied().collect();
        for sheet in op.sheets() {
            for (range, rid) in self.graph.ranges.on_sheet(sheet) {
                let round_trip = op
                    .map_range(&range)
                    .and_then(|r| inverse.and_then(|inv| inv.map_range(&r)));
                if round_trip != Some(range) {
                    sources.push(rid);
                }
            }
        }
        let rewritten = self.snapshot_readers(&sources, |id, _| !doomed.contains(&id));
        removed.sort_by_key(|(addr, _)| *addr);
        (removed, rewritten)
    }

    /// Formula readers of `sources` accepted by `keep`, with their content.
    fn snapshot_readers(
        &mut self,
        sources: &[VertexId],
        keep: impl Fn(VertexId, CellAddress) -> bool,
    ) -> Vec<(CellAddress, CellContent)> {
        let mut readers: Vec<VertexId> = Vec::new();
        for &source in sources {
            readers.extend(
                self.graph
                    .store
                    .vertex(source)
                    .dependents()
                    .filter(|r| self.graph.store.vertex(*r).kind.is_formula()),
            );
        }
        readers.sort();
        readers.dedup();
        let mut out = Vec::new();
        for id in readers {
            let Some(addr) = self.graph.vertex_address(id) else {
                continue;
            };
            if keep(id, addr) {
                let content = self.graph.cell_content(addr);
                out.push((addr, content));
            }
        }
        out.sort_by_key(|(addr, _)| *addr);
        out
    }

    /// Log `op` and bring the mappings in line with it. Formula trees are
    /// left alone; they catch up through the log when next read.
    fn transform(&mut self, op: Transformation) {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("structural_edit", ?op).entered();

        let g = &mut *self.graph;
        let sheets = op.sheets();

        let mut doomed: Vec<VertexId> = Vec::new();
        for &sheet in &sheets {
            for (addr, id) in g.addresses.entries(sheet) {
                if op.map_cell(addr).is_none() {
                    doomed.push(id);
                }
            }
        }
        doomed.sort();
        doomed.dedup();

        // A move reports the cells it vacates and overwrites.
        let move_regions = match op {
            Transformation::MoveCells { source, .. } => op.move_target().map(|dest| (source, dest)),
            _ => None,
        };
        let before_move: Vec<(CellAddress, LiteralValue)> = match move_regions {
            Some((source, dest)) => source
                .cells()
                .chain(dest.cells())
                .map(|addr| (addr, g.cell_value(addr)))
                .collect(),
            None => Vec::new(),
        };

        g.log.push(op);
        g.changes.remap(&op);
        for (addr, value) in before_move {
            g.changes.record(addr, value);
        }

        let placed = g.addresses.remap(&sheets, |addr| op.map_cell(addr));
        let mut moved: FxHashSet<VertexId> = FxHashSet::default();
        for (id, new_addr) in placed {
            if !moved.insert(id) {
                continue;
            }
            match &mut g.store.vertex_mut(id).kind {
                VertexKind::Empty { address } | VertexKind::Value { address, .. } => {
                    *address = new_addr;
                }
                VertexKind::Array(a) => {
                    let (height, width) = (a.region.height() as u32, a.region.width() as u32);
                    if let Some(region) = op
                        .map_cell(a.region.start())
                        .and_then(|start| RangeAddress::with_size(start, height, width))
                    {
                        a.region = region;
                    }
                    g.dirty.insert(id);
                }
                VertexKind::Formula(_) => {
                    g.dirty.insert(id);
                }
                VertexKind::Range(_) => {}
            }
        }

        #[cfg(feature = "tracing")]
        let removed = doomed.len();
        for id in doomed {
            if g.store.contains(id) {
                g.discard_vertex(id);
            }
        }

        let remap = g.ranges.remap(&sheets, |range| op.map_range(range));
        for (id, range) in remap.rekeyed {
            if let VertexKind::Range(rv) = &mut g.store.vertex_mut(id).kind {
                rv.range = range;
                rv.cache.clear();
            }
        }
        for id in remap.removed {
            g.discard_vertex(id);
        }
        for (duplicate, survivor) in remap.merged {
            g.transfer_dependents(duplicate, survivor);
            g.discard_vertex(duplicate);
        }

        if let Some((source, dest)) = move_regions {
            let touched: Vec<VertexId> = g
                .ranges
                .iter()
                .filter(|(r, _)| r.intersects(&source) || r.intersects(&dest))
                .map(|(_, id)| id)
                .collect();
            for rid in touched {
                g.rebuild_range_members(rid);
            }
        }

        g.wake_blocked_spills_on(&sheets);

        #[cfg(feature = "tracing")]
        tracing::debug!(moved = moved.len(), removed, version = g.log.version(), "structural edit applied");
    }

    /* ───────────────────────────── sheets ───────────────────────────── */

    pub fn add_sheet(&mut self, name: &str) -> Result<(SheetId, UndoEntry), EditorError> {
        self.check_sheet_name(name, None)?;
        let sheet = self
            .graph
            .create_sheet(name, 0.0)
            .ok_or_else(|| EditorError::InvalidName {
                name: name.to_string(),
                reason: "name is already in use".to_string(),
            })?;
        Ok((
            sheet,
            UndoEntry::AddSheet {
                sheet,
                name: name.to_string(),
            },
        ))
    }

    /// Remove a sheet. References into it become `#REF!`.
    pub fn remove_sheet(&mut self, sheet: SheetId) -> Result<UndoEntry, EditorError> {
        self.check_sheet(sheet)?;
        let name = self.graph.sheets.name(sheet).unwrap_or_default().to_string();

        let mut cells = Vec::new();
        let mut sources = Vec::new();
        for (addr, id) in self.graph.addresses.entries(sheet) {
            sources.push(id);
            let content = self.graph.cell_content(addr);
            if !content.is_empty() {
                cells.push((addr, content));
            }
        }
        cells.sort_by_key(|(addr, _)| *addr);
        sources.extend(self.graph.ranges.on_sheet(sheet).into_iter().map(|(_, id)| id));
        let rewritten = self.snapshot_readers(&sources, |_, addr| addr.sheet != sheet);

        self.drop_sheet(sheet);
        Ok(UndoEntry::RemoveSheet {
            sheet,
            name,
            cells,
            rewritten,
        })
    }

    fn drop_sheet(&mut self, sheet: SheetId) {
        self.transform(Transformation::RemoveSheet { sheet });
        self.graph.addresses.remove_sheet(sheet);
        self.graph.sheets.remove(sheet);
    }

    fn restore_sheet(&mut self, sheet: SheetId, name: &str) {
        self.graph.sheets.restore(sheet, name);
        self.graph.addresses.add_sheet(sheet, 0.0);
    }

    pub fn rename_sheet(&mut self, sheet: SheetId, new_name: &str) -> Result<UndoEntry, EditorError> {
        self.check_sheet(sheet)?;
        self.check_sheet_name(new_name, Some(sheet))?;
        let old_name = self
            .graph
            .sheets
            .rename(sheet, new_name)
            .ok_or(EditorError::UnknownSheet { sheet })?;
        Ok(UndoEntry::RenameSheet {
            sheet,
            old_name,
            new_name: new_name.to_string(),
        })
    }

    /* ───────────────────────────── rows ───────────────────────────── */

    /// Move row contents by `(from, to)` pairs. Formulas keep their relative
    /// references; references from other cells keep pointing at the same
    /// addresses.
    pub fn reorder_rows(&mut self, sheet: SheetId, moves: &[(u32, u32)]) -> Result<UndoEntry, EditorError> {
        self.check_reorder_rows(sheet, moves)?;
        let moves: Vec<(u32, u32)> = moves.iter().copied().filter(|(from, to)| from != to).collect();
        self.permute_rows(sheet, &moves);
        Ok(UndoEntry::ReorderRows { sheet, moves })
    }

    fn permute_rows(&mut self, sheet: SheetId, moves: &[(u32, u32)]) {
        let target: FxHashMap<u32, u32> = moves.iter().copied().collect();
        let mut snapshot = Vec::new();
        for (addr, _) in self.graph.addresses.entries(sheet) {
            let Some(&row) = target.get(&addr.row) else {
                continue;
            };
            let content = self.graph.cell_content(addr);
            if !content.is_empty() {
                snapshot.push((addr, CellAddress::new(sheet, row, addr.col), content));
            }
        }
        snapshot.sort_by_key(|(from, _, _)| *from);

        #[cfg(feature = "tracing")]
        tracing::debug!(sheet, rows = moves.len(), cells = snapshot.len(), "rows reordered");

        for (from, _, _) in &snapshot {
            self.write_cell(*from, CellContent::Empty);
        }
        for (_, to, content) in snapshot {
            self.write_cell(to, content);
        }
    }

    /* ───────────────────────────── undo ───────────────────────────── */

    /// Put the graph back to how it was before `entry` was applied.
    pub fn apply_inverse(&mut self, entry: &UndoEntry) {
        match entry {
            UndoEntry::SetCells { cells } => {
                for edit in cells.iter().rev() {
                    self.write_cell(edit.address, edit.old.clone());
                }
            }
            UndoEntry::Structural {
                op,
                removed,
                rewritten,
            } => {
                let inverse = op
                    .inverse()
                    .unwrap_or_else(|| panic!("structural undo entry holds {op:?}, which has no inverse"));
                self.transform(inverse);
                for (addr, content) in removed.iter().chain(rewritten) {
                    self.write_cell(*addr, content.clone());
                }
            }
            UndoEntry::AddSheet { sheet, .. } => self.drop_sheet(*sheet),
            UndoEntry::RemoveSheet {
                sheet,
                name,
                cells,
                rewritten,
            } => {
                self.restore_sheet(*sheet, name);
                for (addr, content) in cells.iter().chain(rewritten) {
                    self.write_cell(*addr, content.clone());
                }
            }
            UndoEntry::RenameSheet { sheet, old_name, .. } => {
                self.graph.sheets.rename(*sheet, old_name);
            }
            UndoEntry::ReorderRows { sheet, moves } => {
                let back: Vec<(u32, u32)> = moves.iter().map(|&(from, to)| (to, from)).collect();
                self.permute_rows(*sheet, &back);
            }
            UndoEntry::Batch(entries) => {
                for entry in entries.iter().rev() {
                    self.apply_inverse(entry);
                }
            }
        }
    }

    /// Apply `entry` again after it was undone.
    pub fn apply_forward(&mut self, entry: &UndoEntry) {
        match entry {
            UndoEntry::SetCells { cells } => {
                for edit in cells {
                    self.write_cell(edit.address, edit.new.clone());
                }
            }
            UndoEntry::Structural { op, .. } => {
                self.apply_structural(*op);
            }
            UndoEntry::AddSheet { sheet, name } => self.restore_sheet(*sheet, name),
            UndoEntry::RemoveSheet { sheet, .. } => self.drop_sheet(*sheet),
            UndoEntry::RenameSheet { sheet, new_name, .. } => {
                self.graph.sheets.rename(*sheet, new_name);
            }
            UndoEntry::ReorderRows { sheet, moves } => self.permute_rows(*sheet, moves),
            UndoEntry::Batch(entries) => {
                for entry in entries {
                    self.apply_forward(entry);
                }
            }
        }
    }
}
