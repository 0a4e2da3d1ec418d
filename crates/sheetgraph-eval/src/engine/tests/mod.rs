mod common;

mod clipboard;
mod lazy_transform;
mod range_operations;
mod row_operations;
mod row_reorder;
mod spill;
mod structural_properties;
mod undo_redo;
