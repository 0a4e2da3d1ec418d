use std::sync::Arc;

use sheetgraph_common::{CellAddress, ExcelError, ExcelErrorKind, LiteralValue, RangeAddress, SheetId};
use sheetgraph_parse::ReferenceType;

use super::EvalConfig;
use super::changes::ChangeSet;
use super::clipboard::Clipboard;
use super::content::{CellContent, RawCellContent};
use super::graph::DependencyGraph;
use super::graph::editor::{EditorError, UndoEngine, UndoEntry, VertexEditor};
use super::scheduler::Scheduler;
use super::vertex::VertexId;
use crate::function::Function;
use crate::function_registry::FunctionRegistry;
use crate::interpreter::Interpreter;
use crate::traits::{FunctionProvider, InMemoryRange, Range, Resolver};
use crate::unparse::unparse;

/// Counters for the last recompute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalResult {
    /// Formula vertices evaluated, each counted once per evaluation.
    pub computed_vertices: usize,
    /// Vertices that received `#CYCLE!`.
    pub cycle_vertices: usize,
    /// Scheduling rounds; more than one when spill regions moved.
    pub rounds: usize,
}

/// A workbook: the dependency graph plus everything needed to edit and
/// evaluate it.
///
/// Every mutating method validates first and returns the cells whose value
/// changed. Validation failures are returned as [`EditorError`] and leave the
/// workbook untouched.
pub struct Engine {
    graph: DependencyGraph,
    functions: FunctionRegistry,
    undo: UndoEngine,
    clipboard: Option<Clipboard>,
    batch_depth: usize,
    last_eval: EvalResult,
}

impl Engine {
    pub fn new(config: EvalConfig) -> Self {
        Self::with_functions(config, FunctionRegistry::with_builtins())
    }

    pub fn with_functions(config: EvalConfig, functions: FunctionRegistry) -> Self {
        Self {
            undo: UndoEngine::new(config.undo_limit),
            graph: DependencyGraph::new(config),
            functions,
            clipboard: None,
            batch_depth: 0,
            last_eval: EvalResult::default(),
        }
    }

    /// Build a workbook from named grids of raw contents and run a full
    /// evaluation. Every sheet is registered before any cell is written, so
    /// formulas may reference sheets listed after their own.
    pub fn build_from_sheets(
        sheets: &[(&str, Vec<Vec<RawCellContent>>)],
        config: EvalConfig,
    ) -> Result<(Self, ChangeSet), EditorError> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("build_from_sheets", sheets = sheets.len()).entered();

        let mut engine = Self::new(config);
        let mut ids = Vec::with_capacity(sheets.len());
        for (name, rows) in sheets {
            engine.editor().check_sheet_name(name, None)?;
            let capacity = rows.len() * rows.iter().map(Vec::len).max().unwrap_or(0);
            let filled = rows
                .iter()
                .flatten()
                .filter(|c| !matches!(c, RawCellContent::Empty))
                .count();
            let fill_ratio = if capacity == 0 {
                0.0
            } else {
                filled as f64 / capacity as f64
            };
            let id = engine
                .graph
                .create_sheet(name, fill_ratio)
                .ok_or_else(|| EditorError::InvalidName {
                    name: name.to_string(),
                    reason: "name is already in use".to_string(),
                })?;
            ids.push(id);
        }

        for ((_, rows), &sheet) in sheets.iter().zip(&ids) {
            for (r, row) in rows.iter().enumerate() {
                for (c, raw) in row.iter().enumerate() {
                    let addr = CellAddress::new(sheet, r as u32, c as u32);
                    let content = CellContent::parse(raw, addr, engine.graph.sheets());
                    if content.is_empty() {
                        continue;
                    }
                    let mut editor = engine.editor();
                    editor.check_set_cell(addr)?;
                    editor.write_cell(addr, content);
                }
            }
        }

        engine.graph.mark_all_formulas_dirty();
        let changes = engine.recompute();
        Ok((engine, changes))
    }

    fn editor(&mut self) -> VertexEditor<'_> {
        VertexEditor::new(&mut self.graph)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn config(&self) -> &EvalConfig {
        self.graph.config()
    }

    pub fn last_eval(&self) -> &EvalResult {
        &self.last_eval
    }

    /// Add or replace a function. Formulas pick it up the next time they are
    /// evaluated; [`recompute_all`](Self::recompute_all) applies it everywhere.
    pub fn register_function(&mut self, function: Arc<dyn Function>) {
        self.functions.register(function);
    }

    /* ───────────────────────── cell contents ───────────────────────── */

    pub fn set_cell_contents(
        &mut self,
        addr: CellAddress,
        content: impl Into<RawCellContent>,
    ) -> Result<ChangeSet, EditorError> {
        let content = CellContent::parse(&content.into(), addr, self.graph.sheets());
        let entry = self.editor().set_cells(vec![(addr, content)])?;
        Ok(self.commit(entry))
    }

    pub fn check_set_cell_contents(&mut self, addr: CellAddress) -> Result<(), EditorError> {
        self.editor().check_set_cell(addr)
    }

    /* ───────────────────────── structural edits ───────────────────────── */

    pub fn add_rows(&mut self, sheet: SheetId, index: u32, count: u32) -> Result<ChangeSet, EditorError> {
        let entry = self.editor().insert_rows(sheet, index, count)?;
        Ok(self.commit(entry))
    }

    pub fn check_add_rows(&mut self, sheet: SheetId, index: u32, count: u32) -> Result<(), EditorError> {
        self.editor().check_add_rows(sheet, index, count)
    }

    /// Remove `count` rows starting at the 0-based `index`.
    pub fn remove_rows(&mut self, sheet: SheetId, index: u32, count: u32) -> Result<ChangeSet, EditorError> {
        let entry = self.editor().remove_rows(sheet, index, count)?;
        Ok(self.commit(entry))
    }

    pub fn check_remove_rows(&mut self, sheet: SheetId, index: u32, count: u32) -> Result<(), EditorError> {
        self.editor().check_remove_rows(sheet, index, count)
    }

    pub fn add_columns(&mut self, sheet: SheetId, index: u32, count: u32) -> Result<ChangeSet, EditorError> {
        let entry = self.editor().insert_columns(sheet, index, count)?;
        Ok(self.commit(entry))
    }

    pub fn check_add_columns(&mut self, sheet: SheetId, index: u32, count: u32) -> Result<(), EditorError> {
        self.editor().check_add_columns(sheet, index, count)
    }

    pub fn remove_columns(&mut self, sheet: SheetId, index: u32, count: u32) -> Result<ChangeSet, EditorError> {
        let entry = self.editor().remove_columns(sheet, index, count)?;
        Ok(self.commit(entry))
    }

    pub fn check_remove_columns(&mut self, sheet: SheetId, index: u32, count: u32) -> Result<(), EditorError> {
        self.editor().check_remove_columns(sheet, index, count)
    }

    /// Move `source` so its top-left cell lands on `target`. References to
    /// moved cells follow them; references to overwritten cells become
    /// `#REF!`.
    pub fn move_cells(&mut self, source: RangeAddress, target: CellAddress) -> Result<ChangeSet, EditorError> {
        let entry = self.editor().move_cells(source, target)?;
        Ok(self.commit(entry))
    }

    pub fn check_move_cells(&mut self, source: RangeAddress, target: CellAddress) -> Result<(), EditorError> {
        self.editor().check_move_cells(&source, target)
    }

    /* ───────────────────────────── clipboard ───────────────────────────── */

    pub fn copy(&mut self, range: RangeAddress) -> Result<(), EditorError> {
        if !self.graph.sheets().contains(range.sheet) {
            return Err(EditorError::UnknownSheet { sheet: range.sheet });
        }
        if !range.is_finite() {
            return Err(EditorError::InvalidArgs {
                reason: "only finite ranges can be copied".to_string(),
            });
        }
        self.clipboard = Some(Clipboard::copy(&mut self.graph, range));
        Ok(())
    }

    /// Remember `range` for a later [`paste`](Self::paste), which moves it.
    pub fn cut(&mut self, range: RangeAddress) -> Result<(), EditorError> {
        self.editor().check_move_cells(&range, range.start())?;
        self.clipboard = Some(Clipboard::cut(range));
        Ok(())
    }

    pub fn check_paste(&mut self, target: CellAddress) -> Result<(), EditorError> {
        let clipboard = self.clipboard.as_ref().ok_or(EditorError::EmptyClipboard)?;
        let (is_cut, source, region) = (
            clipboard.is_cut(),
            clipboard.source(),
            clipboard.target_region(target),
        );
        if is_cut {
            return self.editor().check_move_cells(&source, target);
        }
        let region = region.ok_or(EditorError::OutOfBounds {
            row: target.row,
            col: target.col,
        })?;
        self.editor().check_paste(&region)
    }

    /// Paste the clipboard with its top-left cell at `target`. A cut is
    /// pasted once and then forgotten; a copy may be pasted again.
    pub fn paste(&mut self, target: CellAddress) -> Result<ChangeSet, EditorError> {
        self.check_paste(target)?;
        let Some(clipboard) = self.clipboard.clone() else {
            return Err(EditorError::EmptyClipboard);
        };
        let entry = match &clipboard {
            Clipboard::Cut { source } => {
                let entry = self.editor().move_cells(*source, target)?;
                self.clipboard = None;
                entry
            }
            Clipboard::Copy { .. } => self.editor().set_cells(clipboard.cells_at(target))?,
        };
        Ok(self.commit(entry))
    }

    pub fn clear_clipboard(&mut self) {
        self.clipboard = None;
    }

    pub fn is_clipboard_empty(&self) -> bool {
        self.clipboard.is_none()
    }

    /* ───────────────────────────── sheets ───────────────────────────── */

    pub fn add_sheet(&mut self, name: &str) -> Result<SheetId, EditorError> {
        let (sheet, entry) = self.editor().add_sheet(name)?;
        self.commit(entry);
        Ok(sheet)
    }

    pub fn check_add_sheet(&mut self, name: &str) -> Result<(), EditorError> {
        self.editor().check_sheet_name(name, None)
    }

    /// Remove a sheet and its contents. Formulas elsewhere that read it
    /// evaluate to `#REF!`.
    pub fn remove_sheet(&mut self, sheet: SheetId) -> Result<ChangeSet, EditorError> {
        let entry = self.editor().remove_sheet(sheet)?;
        Ok(self.commit(entry))
    }

    pub fn rename_sheet(&mut self, sheet: SheetId, new_name: &str) -> Result<(), EditorError> {
        let entry = self.editor().rename_sheet(sheet, new_name)?;
        self.commit(entry);
        Ok(())
    }

    pub fn check_rename_sheet(&mut self, sheet: SheetId, new_name: &str) -> Result<(), EditorError> {
        if !self.graph.sheets().contains(sheet) {
            return Err(EditorError::UnknownSheet { sheet });
        }
        self.editor().check_sheet_name(new_name, Some(sheet))
    }

    pub fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.graph.sheets().get_id(name)
    }

    pub fn sheet_name(&self, sheet: SheetId) -> Option<&str> {
        self.graph.sheets().name(sheet)
    }

    /* ───────────────────────────── rows ───────────────────────────── */

    /// Move row contents by `(from, to)` pairs forming a permutation.
    pub fn swap_row_indexes(&mut self, sheet: SheetId, pairs: &[(u32, u32)]) -> Result<ChangeSet, EditorError> {
        let entry = self.editor().reorder_rows(sheet, pairs)?;
        Ok(self.commit(entry))
    }

    pub fn check_swap_row_indexes(&mut self, sheet: SheetId, pairs: &[(u32, u32)]) -> Result<(), EditorError> {
        self.editor().check_reorder_rows(sheet, pairs)
    }

    /// `order[i]` is the row whose contents end up at row `i`.
    pub fn set_row_order(&mut self, sheet: SheetId, order: &[u32]) -> Result<ChangeSet, EditorError> {
        self.swap_row_indexes(sheet, &order_to_moves(order))
    }

    pub fn check_set_row_order(&mut self, sheet: SheetId, order: &[u32]) -> Result<(), EditorError> {
        self.check_swap_row_indexes(sheet, &order_to_moves(order))
    }

    /* ───────────────────────────── undo ───────────────────────────── */

    pub fn undo(&mut self) -> Result<ChangeSet, EditorError> {
        self.refuse_in_batch("undo")?;
        let entry = self.undo.pop_undo().ok_or(EditorError::NothingToUndo)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(?entry, "undo");
        self.editor().apply_inverse(&entry);
        self.undo.push_redo(entry);
        self.cancel_cut();
        Ok(self.settle())
    }

    pub fn redo(&mut self) -> Result<ChangeSet, EditorError> {
        self.refuse_in_batch("redo")?;
        let entry = self.undo.pop_redo().ok_or(EditorError::NothingToRedo)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(?entry, "redo");
        self.editor().apply_forward(&entry);
        self.undo.push_undo(entry);
        self.cancel_cut();
        Ok(self.settle())
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    fn refuse_in_batch(&self, what: &str) -> Result<(), EditorError> {
        if self.batch_depth > 0 {
            return Err(EditorError::InvalidArgs {
                reason: format!("{what} is not available inside a batch"),
            });
        }
        Ok(())
    }

    /* ───────────────────────────── batch ───────────────────────────── */

    /// Run several edits with a single recompute at the end. The edits form
    /// one undo step. If `f` fails, the edits it already made stay applied,
    /// the workbook is still recomputed and the error is returned.
    pub fn batch<F>(&mut self, f: F) -> Result<ChangeSet, EditorError>
    where
        F: FnOnce(&mut Engine) -> Result<(), EditorError>,
    {
        self.batch_depth += 1;
        self.undo.begin_batch();
        let outcome = f(self);
        self.batch_depth -= 1;
        if self.batch_depth > 0 {
            return outcome.map(|()| ChangeSet::default());
        }
        self.undo.end_batch();
        let changes = self.recompute();
        outcome.map(|()| changes)
    }

    /* ───────────────────────────── queries ───────────────────────────── */

    pub fn get_cell_value(&self, addr: CellAddress) -> LiteralValue {
        self.graph.cell_value(addr)
    }

    /// `=`-prefixed formula text of the cell at `addr`, as it reads at the
    /// cell's current position.
    pub fn get_cell_formula(&mut self, addr: CellAddress) -> Option<String> {
        let id = self.graph.vertex_at(addr)?;
        self.graph.refresh_formula(id);
        let formula = self.graph.vertex(id).kind.formula()?;
        if formula.address != addr {
            return None;
        }
        Some(format!(
            "={}",
            unparse(&formula.expr, formula.address, self.graph.sheets())
        ))
    }

    /// `(width, height)` of the area holding content, spill regions included.
    pub fn get_sheet_dimensions(&self, sheet: SheetId) -> Result<(u32, u32), EditorError> {
        if !self.graph.sheets().contains(sheet) {
            return Err(EditorError::UnknownSheet { sheet });
        }
        let (rows, cols) = self.graph.used_extent(sheet);
        Ok((cols, rows))
    }

    /// Parse `Sheet1!B2`. Unqualified addresses refer to the first sheet.
    pub fn parse_address(&self, text: &str) -> Option<CellAddress> {
        match ReferenceType::from_string(text).ok()? {
            ReferenceType::Cell { sheet, row, col, .. } => Some(CellAddress::new(
                self.resolve_sheet(sheet.as_deref())?,
                row.checked_sub(1)?,
                col.checked_sub(1)?,
            )),
            _ => None,
        }
    }

    /// Parse `A1:B3`, `C:D` or `2:4`, optionally sheet-qualified.
    pub fn parse_range(&self, text: &str) -> Option<RangeAddress> {
        let zero_based = |v: Option<u32>| v.and_then(|v| v.checked_sub(1));
        match ReferenceType::from_string(text).ok()? {
            ReferenceType::Cell { .. } => self.parse_address(text).map(RangeAddress::single),
            ReferenceType::Range { sheet, start, end } => {
                let sheet = self.resolve_sheet(sheet.as_deref())?;
                match (
                    zero_based(start.row),
                    zero_based(start.col),
                    zero_based(end.row),
                    zero_based(end.col),
                ) {
                    (Some(r1), Some(c1), Some(r2), Some(c2)) => Some(RangeAddress::new(sheet, r1, c1, r2, c2)),
                    (None, Some(c1), None, Some(c2)) => Some(RangeAddress::whole_columns(sheet, c1, c2)),
                    (Some(r1), None, Some(r2), None) => Some(RangeAddress::whole_rows(sheet, r1, r2)),
                    _ => None,
                }
            }
            ReferenceType::NamedRange(_) => None,
        }
    }

    fn resolve_sheet(&self, name: Option<&str>) -> Option<SheetId> {
        match name {
            Some(name) => self.graph.sheets().get_id(name),
            None => self.graph.sheets().ids().next(),
        }
    }

    /* ─────────────────────────── evaluation ─────────────────────────── */

    /// Record a successful edit and bring values up to date.
    fn commit(&mut self, entry: UndoEntry) -> ChangeSet {
        self.undo.record(entry);
        self.cancel_cut();
        self.settle()
    }

    fn cancel_cut(&mut self) {
        if self.clipboard.as_ref().is_some_and(Clipboard::is_cut) {
            self.clipboard = None;
        }
    }

    fn settle(&mut self) -> ChangeSet {
        self.graph.collect_garbage();
        if self.batch_depth > 0 {
            return ChangeSet::default();
        }
        self.recompute()
    }

    /// Mark every formula dirty and evaluate them all.
    pub fn recompute_all(&mut self) -> ChangeSet {
        self.graph.mark_all_formulas_dirty();
        self.recompute()
    }

    /// Evaluate the dirty closure. Storing an array result can claim or
    /// release spill cells and dirty their readers, so this runs in rounds
    /// until nothing is dirty or the round limit is hit.
    fn recompute(&mut self) -> ChangeSet {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("recompute").entered();

        let mut result = EvalResult::default();
        let max_rounds = self.graph.config().max_spill_passes.max(1);
        while self.graph.has_dirty() {
            if result.rounds == max_rounds {
                #[cfg(feature = "tracing")]
                tracing::warn!(rounds = result.rounds, "spill regions did not settle; vertices left dirty");
                break;
            }
            result.rounds += 1;

            let seeds = self.graph.take_dirty();
            let schedule = Scheduler::new(&self.graph).create_schedule(&seeds);
            let cyclic = schedule.cyclic_vertices();
            result.cycle_vertices += cyclic.len();
            self.graph.clear_range_caches(&schedule.order);

            for &id in &schedule.order {
                let is_formula = self
                    .graph
                    .vertices()
                    .get(id)
                    .is_some_and(|v| v.kind.is_formula());
                if !is_formula {
                    continue;
                }
                if cyclic.contains(&id) {
                    self.graph.store_cycle(id);
                } else {
                    self.evaluate_vertex(id);
                    result.computed_vertices += 1;
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            computed = result.computed_vertices,
            cycles = result.cycle_vertices,
            rounds = result.rounds,
            "recompute finished"
        );
        self.last_eval = result;
        self.graph.take_changes()
    }

    fn evaluate_vertex(&mut self, id: VertexId) {
        self.graph.refresh_formula(id);
        let Some(formula) = self.graph.vertex(id).kind.formula() else {
            return;
        };
        let at = formula.address;
        let view = GraphView {
            graph: &self.graph,
            functions: &self.functions,
        };
        let interpreter =
            Interpreter::new(&view, at).with_range_cache(self.graph.config().use_range_cache);
        let value = interpreter.evaluate_formula(&formula.expr);
        let writes = interpreter.take_cache_writes();

        for write in writes {
            self.graph.store_aggregate(&write.range, write.function, write.value);
        }
        self.graph.store_result(id, value);
    }
}

fn order_to_moves(order: &[u32]) -> Vec<(u32, u32)> {
    order
        .iter()
        .enumerate()
        .map(|(to, &from)| (from, to as u32))
        .collect()
}

/// Read-only view of the graph handed to the interpreter.
struct GraphView<'a> {
    graph: &'a DependencyGraph,
    functions: &'a FunctionRegistry,
}

fn missing_sheet(sheet: SheetId) -> ExcelError {
    ExcelError::new(ExcelErrorKind::Ref).with_message(format!("sheet {sheet} does not exist"))
}

impl Resolver for GraphView<'_> {
    fn resolve_cell(&self, addr: CellAddress) -> Result<LiteralValue, ExcelError> {
        if !self.graph.sheets().contains(addr.sheet) {
            return Err(missing_sheet(addr.sheet));
        }
        Ok(self.graph.cell_value(addr))
    }

    fn resolve_range(&self, range: &RangeAddress) -> Result<Box<dyn Range>, ExcelError> {
        if !self.graph.sheets().contains(range.sheet) {
            return Err(missing_sheet(range.sheet));
        }
        let (used_rows, used_cols) = self.graph.used_extent(range.sheet);
        let mut clipped = *range;
        if clipped.is_whole_columns() {
            clipped.end_row = used_rows.saturating_sub(1).max(clipped.start_row);
        }
        if clipped.is_whole_rows() {
            clipped.end_col = used_cols.saturating_sub(1).max(clipped.start_col);
        }
        let (height, width) = (clipped.height() as usize, clipped.width() as usize);
        let mut rows = vec![vec![LiteralValue::Empty; width]; height];
        for (addr, _) in self.graph.cells_in(&clipped) {
            let r = (addr.row - clipped.start_row) as usize;
            let c = (addr.col - clipped.start_col) as usize;
            rows[r][c] = self.graph.cell_value(addr);
        }
        Ok(Box::new(InMemoryRange::new(rows)))
    }

    fn cached_aggregate(&self, range: &RangeAddress, function: &str) -> Option<LiteralValue> {
        self.graph.cached_aggregate(range, function)
    }
}

impl FunctionProvider for GraphView<'_> {
    fn get_function(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions.get(name)
    }
}
