//! sheetgraph dependency graph engine
//!
//! Incremental formula evaluation with dependency tracking, lazy structural
//! rewriting and undo/redo.

pub mod address_mapping;
pub mod changes;
pub mod clipboard;
pub mod content;
pub mod eval;
pub mod graph;
pub mod range_mapping;
pub mod scheduler;
pub mod sheet_registry;
pub mod transform_log;
pub mod vertex;
pub mod vertex_store;

#[cfg(test)]
mod tests;

pub use address_mapping::{AddressMapping, AddressMappingPolicy};
pub use changes::{ChangeSet, ExportedChange};
pub use clipboard::Clipboard;
pub use content::{CellContent, RawCellContent};
pub use eval::{Engine, EvalResult};
pub use graph::DependencyGraph;
pub use graph::editor::{EditorError, UndoEngine, UndoEntry, VertexEditor};
pub use scheduler::{Schedule, Scheduler};
pub use sheet_registry::SheetRegistry;
pub use transform_log::{TransformLog, Transformation};
pub use vertex::{Vertex, VertexId, VertexKind};

/// Configuration for the evaluation engine
#[derive(Debug, Clone, PartialEq)]
pub struct EvalConfig {
    /// Rows a sheet may grow to.
    pub max_rows: u32,
    /// Columns a sheet may grow to.
    pub max_columns: u32,
    /// Per-sheet storage strategy for the address mapping.
    pub address_mapping: AddressMappingPolicy,
    /// Undo entries kept; the oldest are dropped first.
    pub undo_limit: usize,
    /// Keep rolling aggregates (SUM, COUNT) on range vertices.
    pub use_range_cache: bool,
    /// Scheduling rounds one recompute may take when spill regions move.
    pub max_spill_passes: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_rows: 1_048_576,
            max_columns: 16_384,
            address_mapping: AddressMappingPolicy::default(),
            undo_limit: 100,
            use_range_cache: true,
            max_spill_passes: 16,
        }
    }
}
