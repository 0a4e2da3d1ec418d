//! Undo/redo stacks.
//!
//! Every mutation records an [`UndoEntry`] describing the forward edit plus
//! whatever content it destroyed. [`VertexEditor::apply_inverse`] and
//! [`VertexEditor::apply_forward`] replay entries in either direction.
//!
//! [`VertexEditor::apply_inverse`]: super::VertexEditor::apply_inverse
//! [`VertexEditor::apply_forward`]: super::VertexEditor::apply_forward

use std::collections::VecDeque;

use sheetgraph_common::{CellAddress, SheetId};

use crate::engine::content::CellContent;
use crate::engine::transform_log::Transformation;

/// One cell write: what was there and what replaced it.
#[derive(Debug, Clone, PartialEq)]
pub struct CellEdit {
    pub address: CellAddress,
    pub old: CellContent,
    pub new: CellContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UndoEntry {
    SetCells {
        cells: Vec<CellEdit>,
    },
    /// Row/column insert or remove, or a move. `removed` holds the cells the
    /// edit deleted, `rewritten` the formulas whose text the inverse edit
    /// would not restore; both at their addresses before the edit.
    Structural {
        op: Transformation,
        removed: Vec<(CellAddress, CellContent)>,
        rewritten: Vec<(CellAddress, CellContent)>,
    },
    AddSheet {
        sheet: SheetId,
        name: String,
    },
    RemoveSheet {
        sheet: SheetId,
        name: String,
        cells: Vec<(CellAddress, CellContent)>,
        rewritten: Vec<(CellAddress, CellContent)>,
    },
    RenameSheet {
        sheet: SheetId,
        old_name: String,
        new_name: String,
    },
    /// `(from, to)` row moves forming a permutation.
    ReorderRows {
        sheet: SheetId,
        moves: Vec<(u32, u32)>,
    },
    Batch(Vec<UndoEntry>),
}

#[derive(Debug)]
pub struct UndoEngine {
    undo: VecDeque<UndoEntry>,
    redo: Vec<UndoEntry>,
    limit: usize,
    batch: Option<Vec<UndoEntry>>,
}

impl Default for UndoEngine {
    fn default() -> Self {
        Self::new(100)
    }
}

impl UndoEngine {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit,
            batch: None,
        }
    }

    /// Record a fresh forward edit. Clears the redo stack.
    pub fn record(&mut self, entry: UndoEntry) {
        self.redo.clear();
        match &mut self.batch {
            Some(batch) => batch.push(entry),
            None => self.push_undo(entry),
        }
    }

    /// Put an entry back on the undo stack without touching redo.
    pub fn push_undo(&mut self, entry: UndoEntry) {
        if self.limit == 0 {
            return;
        }
        self.undo.push_back(entry);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
    }

    pub fn pop_undo(&mut self) -> Option<UndoEntry> {
        self.undo.pop_back()
    }

    pub fn push_redo(&mut self, entry: UndoEntry) {
        self.redo.push(entry);
    }

    pub fn pop_redo(&mut self) -> Option<UndoEntry> {
        self.redo.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Collect entries into one step until [`end_batch`](Self::end_batch).
    pub fn begin_batch(&mut self) {
        if self.batch.is_none() {
            self.batch = Some(Vec::new());
        }
    }

    pub fn end_batch(&mut self) {
        let Some(mut entries) = self.batch.take() else {
            return;
        };
        if entries.len() > 1 {
            self.push_undo(UndoEntry::Batch(entries));
        } else if let Some(entry) = entries.pop() {
            self.push_undo(entry);
        }
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }
}
