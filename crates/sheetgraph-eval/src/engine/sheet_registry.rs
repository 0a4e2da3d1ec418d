use rustc_hash::FxHashMap;
use sheetgraph_common::SheetId;

use crate::traits::SheetResolver;

/// Sheet names and ids. Names are unique ignoring ASCII case; ids are never
/// reused once handed out.
#[derive(Default, Debug, Clone)]
pub struct SheetRegistry {
    id_by_name: FxHashMap<String, SheetId>,
    name_by_id: Vec<Option<String>>,
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl SheetRegistry {
    pub fn new() -> Self {
        SheetRegistry::default()
    }

    /// Register `name` and return its fresh id; `None` if the name is taken.
    pub fn add(&mut self, name: &str) -> Option<SheetId> {
        if self.id_by_name.contains_key(&key(name)) {
            return None;
        }
        let id = self.name_by_id.len() as SheetId;
        self.name_by_id.push(Some(name.to_string()));
        self.id_by_name.insert(key(name), id);
        Some(id)
    }

    /// Bring back a removed sheet under its old id.
    pub fn restore(&mut self, id: SheetId, name: &str) {
        let idx = id as usize;
        if self.name_by_id.len() <= idx {
            self.name_by_id.resize(idx + 1, None);
        }
        self.name_by_id[idx] = Some(name.to_string());
        self.id_by_name.insert(key(name), id);
    }

    pub fn remove(&mut self, id: SheetId) -> Option<String> {
        let name = self.name_by_id.get_mut(id as usize)?.take()?;
        self.id_by_name.remove(&key(&name));
        Some(name)
    }

    pub fn rename(&mut self, id: SheetId, new_name: &str) -> Option<String> {
        let old = self.name_by_id.get(id as usize)?.clone()?;
        self.id_by_name.remove(&key(&old));
        self.id_by_name.insert(key(new_name), id);
        self.name_by_id[id as usize] = Some(new_name.to_string());
        Some(old)
    }

    pub fn name(&self, id: SheetId) -> Option<&str> {
        self.name_by_id.get(id as usize)?.as_deref()
    }

    pub fn get_id(&self, name: &str) -> Option<SheetId> {
        self.id_by_name.get(&key(name)).copied()
    }

    pub fn contains(&self, id: SheetId) -> bool {
        self.name(id).is_some()
    }

    /// Live sheets in id order.
    pub fn ids(&self) -> impl Iterator<Item = SheetId> + '_ {
        self.name_by_id
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| i as SheetId)
    }

    pub fn len(&self) -> usize {
        self.id_by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_by_name.is_empty()
    }
}

impl SheetResolver for SheetRegistry {
    fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.get_id(name)
    }

    fn sheet_name(&self, id: SheetId) -> Option<&str> {
        self.name(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_not_reused() {
        let mut reg = SheetRegistry::new();
        let a = reg.add("Sheet1").unwrap();
        assert_eq!(reg.add("SHEET1"), None);
        reg.remove(a);
        let b = reg.add("Sheet1").unwrap();
        assert_ne!(a, b);
        assert_eq!(reg.ids().collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn rename_and_restore() {
        let mut reg = SheetRegistry::new();
        let a = reg.add("Data").unwrap();
        assert_eq!(reg.rename(a, "Inputs").as_deref(), Some("Data"));
        assert_eq!(reg.get_id("inputs"), Some(a));
        assert_eq!(reg.get_id("Data"), None);
        reg.remove(a);
        reg.restore(a, "Inputs");
        assert_eq!(reg.name(a), Some("Inputs"));
    }
}
