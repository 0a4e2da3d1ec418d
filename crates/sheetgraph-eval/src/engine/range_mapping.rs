use rustc_hash::FxHashMap;
use sheetgraph_common::{RangeAddress, SheetId};

use super::vertex::VertexId;

/// Exact span → range vertex, so formulas reading the same range share one
/// vertex.
#[derive(Debug, Default, Clone)]
pub struct RangeMapping {
    ranges: FxHashMap<RangeAddress, VertexId>,
}

/// What a [`RangeMapping::remap`] did.
#[derive(Debug, Default, PartialEq)]
pub struct RangeRemap {
    /// Vertices whose span changed, with the new span.
    pub rekeyed: Vec<(VertexId, RangeAddress)>,
    /// Vertices whose span no longer exists.
    pub removed: Vec<VertexId>,
    /// `(duplicate, survivor)`: two spans collapsed onto one key.
    pub merged: Vec<(VertexId, VertexId)>,
}

impl RangeMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, range: &RangeAddress) -> Option<VertexId> {
        self.ranges.get(range).copied()
    }

    pub fn set(&mut self, range: RangeAddress, id: VertexId) {
        self.ranges.insert(range, id);
    }

    pub fn remove(&mut self, range: &RangeAddress) -> Option<VertexId> {
        self.ranges.remove(range)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RangeAddress, VertexId)> {
        self.ranges.iter().map(|(r, &id)| (r, id))
    }

    pub fn on_sheet(&self, sheet: SheetId) -> Vec<(RangeAddress, VertexId)> {
        self.ranges
            .iter()
            .filter(|(r, _)| r.sheet == sheet)
            .map(|(r, &id)| (*r, id))
            .collect()
    }

    /// Re-key spans on `sheets` through `f`.
    pub fn remap(
        &mut self,
        sheets: &[SheetId],
        f: impl Fn(&RangeAddress) -> Option<RangeAddress>,
    ) -> RangeRemap {
        let mut out = RangeRemap::default();
        let affected: Vec<(RangeAddress, VertexId)> = self
            .ranges
            .iter()
            .filter(|(r, _)| sheets.contains(&r.sheet))
            .map(|(r, &id)| (*r, id))
            .collect();
        let mut moved = Vec::new();
        for (old, id) in affected {
            match f(&old) {
                Some(new) if new == old => {}
                Some(new) => {
                    self.ranges.remove(&old);
                    moved.push((id, new));
                }
                None => {
                    self.ranges.remove(&old);
                    out.removed.push(id);
                }
            }
        }
        for (id, new) in moved {
            match self.ranges.get(&new) {
                Some(&survivor) => out.merged.push((id, survivor)),
                None => {
                    self.ranges.insert(new, id);
                    out.rekeyed.push((id, new));
                }
            }
        }
        out
    }
}
