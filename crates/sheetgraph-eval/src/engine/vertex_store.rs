use super::vertex::{Vertex, VertexId};

/// Arena of graph vertices addressed by [`VertexId`].
///
/// Freed slots are reused. Asking for a vertex that is not live is a
/// programming error and panics.
#[derive(Debug, Default, Clone)]
pub struct VertexStore {
    slots: Vec<Option<Vertex>>,
    free: Vec<u32>,
    live: usize,
}

impl VertexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            live: 0,
        }
    }

    pub fn allocate(&mut self, vertex: Vertex) -> VertexId {
        self.live += 1;
        if let Some(idx) = self.free.pop() {
            self.slots[idx as usize] = Some(vertex);
            return VertexId(idx);
        }
        self.slots.push(Some(vertex));
        VertexId((self.slots.len() - 1) as u32)
    }

    pub fn free(&mut self, id: VertexId) -> Vertex {
        let vertex = self
            .slots
            .get_mut(id.as_index())
            .and_then(Option::take)
            .unwrap_or_else(|| panic!("vertex {id:?} freed twice or never allocated"));
        self.free.push(id.0);
        self.live -= 1;
        vertex
    }

    pub fn get(&self, id: VertexId) -> Option<&Vertex> {
        self.slots.get(id.as_index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
        self.slots.get_mut(id.as_index()).and_then(Option::as_mut)
    }

    pub fn vertex(&self, id: VertexId) -> &Vertex {
        self.get(id)
            .unwrap_or_else(|| panic!("vertex {id:?} is not in the graph"))
    }

    pub fn vertex_mut(&mut self, id: VertexId) -> &mut Vertex {
        self.get_mut(id)
            .unwrap_or_else(|| panic!("vertex {id:?} is not in the graph"))
    }

    pub fn contains(&self, id: VertexId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (VertexId, &Vertex)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (VertexId(i as u32), v)))
    }

    pub fn ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.iter().map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::vertex::VertexKind;
    use sheetgraph_common::CellAddress;

    fn empty(row: u32) -> Vertex {
        Vertex::new(VertexKind::Empty {
            address: CellAddress::new(0, row, 0),
        })
    }

    #[test]
    fn slots_are_recycled() {
        let mut store = VertexStore::new();
        let a = store.allocate(empty(0));
        let b = store.allocate(empty(1));
        assert_eq!(store.len(), 2);
        store.free(a);
        assert!(!store.contains(a));
        let c = store.allocate(empty(2));
        assert_eq!(c, a);
        assert_eq!(store.ids().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    #[should_panic(expected = "is not in the graph")]
    fn missing_vertices_panic() {
        let store = VertexStore::new();
        store.vertex(VertexId(3));
    }
}
