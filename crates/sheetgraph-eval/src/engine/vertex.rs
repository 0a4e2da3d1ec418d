use rustc_hash::{FxHashMap, FxHashSet};
use sheetgraph_common::{CellAddress, LiteralValue, RangeAddress};

use crate::formula::StoredFormula;

/// Arena index of a vertex. Ids of removed vertices are recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub u32);

impl VertexId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct FormulaCell {
    pub formula: StoredFormula,
    /// `None` until first evaluated.
    pub value: Option<LiteralValue>,
}

#[derive(Debug, Clone)]
pub struct RangeVertex {
    pub range: RangeAddress,
    /// Rolling aggregates by function name. Cleared whenever a member changes.
    pub cache: FxHashMap<&'static str, LiteralValue>,
}

/// An array formula that owns its spill region.
#[derive(Debug, Clone)]
pub struct ArrayVertex {
    pub formula: StoredFormula,
    pub values: Vec<Vec<LiteralValue>>,
    /// Cells claimed in the address mapping, anchor at the top left.
    pub region: RangeAddress,
}

impl ArrayVertex {
    /// Value of one cell of the region.
    pub fn value_at(&self, addr: CellAddress) -> LiteralValue {
        let r = (addr.row - self.region.start_row) as usize;
        let c = (addr.col - self.region.start_col) as usize;
        self.values
            .get(r)
            .and_then(|row| row.get(c))
            .cloned()
            .unwrap_or(LiteralValue::Empty)
    }
}

#[derive(Debug, Clone)]
pub enum VertexKind {
    /// Placeholder for a referenced cell without content.
    Empty { address: CellAddress },
    Value {
        address: CellAddress,
        value: LiteralValue,
    },
    Formula(FormulaCell),
    Range(RangeVertex),
    Array(ArrayVertex),
}

impl VertexKind {
    pub fn is_formula(&self) -> bool {
        matches!(self, VertexKind::Formula(_) | VertexKind::Array(_))
    }

    pub fn is_empty_cell(&self) -> bool {
        matches!(self, VertexKind::Empty { .. })
    }

    pub fn formula(&self) -> Option<&StoredFormula> {
        match self {
            VertexKind::Formula(f) => Some(&f.formula),
            VertexKind::Array(a) => Some(&a.formula),
            _ => None,
        }
    }

    pub fn formula_mut(&mut self) -> Option<&mut StoredFormula> {
        match self {
            VertexKind::Formula(f) => Some(&mut f.formula),
            VertexKind::Array(a) => Some(&mut a.formula),
            _ => None,
        }
    }
}

/// A graph node. `dependencies` are the vertices this one reads,
/// `dependents` the vertices that read this one.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub kind: VertexKind,
    pub(crate) dependencies: FxHashSet<VertexId>,
    pub(crate) dependents: FxHashSet<VertexId>,
}

impl Vertex {
    pub fn new(kind: VertexKind) -> Self {
        Self {
            kind,
            dependencies: FxHashSet::default(),
            dependents: FxHashSet::default(),
        }
    }

    pub fn dependencies(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.dependencies.iter().copied()
    }

    pub fn dependents(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.dependents.iter().copied()
    }

    pub fn has_edges(&self) -> bool {
        !self.dependencies.is_empty() || !self.dependents.is_empty()
    }
}
