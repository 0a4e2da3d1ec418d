//! Value changes reported back to callers.

use rustc_hash::FxHashMap;
use sheetgraph_common::{CellAddress, LiteralValue};

use super::transform_log::Transformation;

/// One cell whose value differs after an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedChange {
    pub address: CellAddress,
    pub old_value: LiteralValue,
    pub new_value: LiteralValue,
}

/// Changed cells ordered by sheet, row and column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: Vec<ExportedChange>,
}

impl ChangeSet {
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExportedChange> {
        self.changes.iter()
    }

    pub fn get(&self, address: CellAddress) -> Option<&ExportedChange> {
        self.changes
            .binary_search_by(|c| c.address.cmp(&address))
            .ok()
            .map(|i| &self.changes[i])
    }

    pub fn addresses(&self) -> Vec<CellAddress> {
        self.changes.iter().map(|c| c.address).collect()
    }
}

impl IntoIterator for ChangeSet {
    type Item = ExportedChange;
    type IntoIter = std::vec::IntoIter<ExportedChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a ExportedChange;
    type IntoIter = std::slice::Iter<'a, ExportedChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

/// Remembers the value each touched cell had before the current operation.
#[derive(Debug, Default, Clone)]
pub struct ChangeCollector {
    old: FxHashMap<CellAddress, LiteralValue>,
}

impl ChangeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the first value seen for `address`.
    pub fn record(&mut self, address: CellAddress, old: LiteralValue) {
        self.old.entry(address).or_insert(old);
    }

    pub fn is_empty(&self) -> bool {
        self.old.is_empty()
    }

    /// Follow cells through a structural edit. Deleted cells are forgotten.
    pub fn remap(&mut self, op: &Transformation) {
        let old = std::mem::take(&mut self.old);
        self.old = old
            .into_iter()
            .filter_map(|(addr, v)| op.map_cell(addr).map(|a| (a, v)))
            .collect();
    }

    /// Drain into a change set, keeping only cells whose value differs from
    /// `current`.
    pub fn take(&mut self, current: impl Fn(CellAddress) -> LiteralValue) -> ChangeSet {
        let mut changes: Vec<ExportedChange> = self
            .old
            .drain()
            .filter_map(|(address, old_value)| {
                let new_value = current(address);
                (!same_value(&old_value, &new_value)).then_some(ExportedChange {
                    address,
                    old_value,
                    new_value,
                })
            })
            .collect();
        changes.sort_by_key(|c| c.address);
        ChangeSet { changes }
    }
}

/// Errors compare by kind: a recomputed error keeps its identity even when
/// its origin moved.
fn same_value(a: &LiteralValue, b: &LiteralValue) -> bool {
    match (a, b) {
        (LiteralValue::Error(x), LiteralValue::Error(y)) => x.kind == y.kind,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetgraph_common::{ExcelError, ExcelErrorKind};

    #[test]
    fn unchanged_values_are_dropped_and_order_is_stable() {
        let mut c = ChangeCollector::new();
        let a1 = CellAddress::new(0, 0, 0);
        let b1 = CellAddress::new(0, 0, 1);
        let a2 = CellAddress::new(0, 1, 0);
        c.record(b1, LiteralValue::Number(1.0));
        c.record(a2, LiteralValue::Number(1.0));
        c.record(a1, LiteralValue::Empty);
        c.record(a1, LiteralValue::Number(9.0));
        let set = c.take(|addr| {
            if addr == a2 {
                LiteralValue::Number(1.0)
            } else {
                LiteralValue::Number(2.0)
            }
        });
        assert_eq!(set.addresses(), vec![a1, b1]);
        assert_eq!(set.get(a1).unwrap().old_value, LiteralValue::Empty);
        assert!(c.is_empty());
    }

    #[test]
    fn errors_compare_by_kind() {
        let with_origin = ExcelError::new(ExcelErrorKind::Ref).with_origin(CellAddress::new(0, 1, 1));
        assert!(same_value(
            &LiteralValue::Error(with_origin),
            &LiteralValue::Error(ExcelError::new(ExcelErrorKind::Ref))
        ));
    }

    #[test]
    fn keys_follow_structural_edits() {
        let mut c = ChangeCollector::new();
        c.record(CellAddress::new(0, 3, 0), LiteralValue::Number(1.0));
        c.record(CellAddress::new(0, 1, 0), LiteralValue::Number(1.0));
        c.remap(&Transformation::RemoveRows { sheet: 0, index: 1, count: 1 });
        let set = c.take(|_| LiteralValue::Empty);
        assert_eq!(set.addresses(), vec![CellAddress::new(0, 2, 0)]);
    }
}
