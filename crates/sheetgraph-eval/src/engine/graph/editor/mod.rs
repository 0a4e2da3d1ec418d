pub mod reference_adjuster;
pub mod undo_engine;
pub mod vertex_editor;

pub use reference_adjuster::ReferenceAdjuster;
pub use undo_engine::{CellEdit, UndoEngine, UndoEntry};
pub use vertex_editor::VertexEditor;

use sheetgraph_common::{CellAddress, SheetId};

/// Why an edit was refused. A refused edit leaves the graph untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditorError {
    #[error("sheet {sheet} does not exist")]
    UnknownSheet { sheet: SheetId },

    #[error("invalid sheet name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("cell position out of bounds: row {row}, col {col}")]
    OutOfBounds { row: u32, col: u32 },

    #[error("invalid arguments: {reason}")]
    InvalidArgs { reason: String },

    #[error("sheet {sheet} would grow to {rows}x{cols}, past the configured limit")]
    SheetSizeLimitExceeded { sheet: SheetId, rows: u64, cols: u64 },

    #[error("cannot write into the spill region of the array at {}", anchor.a1())]
    OntoArray { anchor: CellAddress },

    #[error("edit would split the array at {}", anchor.a1())]
    ArrayBoundary { anchor: CellAddress },

    #[error("clipboard is empty")]
    EmptyClipboard,

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error("invalid row permutation: {reason}")]
    InvalidPermutation { reason: String },
}
