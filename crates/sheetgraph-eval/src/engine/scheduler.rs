use super::graph::DependencyGraph;
use super::vertex::VertexId;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

pub struct Scheduler<'a> {
    graph: &'a DependencyGraph,
}

/// Evaluation order for one recompute round.
#[derive(Debug, Default)]
pub struct Schedule {
    /// Every vertex of the round; dependencies come before their readers.
    pub order: Vec<VertexId>,
    /// Strongly connected components that form a cycle, self-loops included.
    pub cycles: Vec<Vec<VertexId>>,
}

impl Schedule {
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn cyclic_vertices(&self) -> FxHashSet<VertexId> {
        self.cycles.iter().flatten().copied().collect()
    }
}

impl<'a> Scheduler<'a> {
    pub fn new(graph: &'a DependencyGraph) -> Self {
        Self { graph }
    }

    /// Order the dirty closure of `seeds`.
    ///
    /// Vertices Kahn's algorithm cannot place sit on or behind a cycle. Those
    /// are split into strongly connected components; cyclic components are
    /// reported and the rest are ordered behind them so they read the cycle
    /// error like any other value.
    pub fn create_schedule(&self, seeds: &[VertexId]) -> Schedule {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("create_schedule", seeds = seeds.len()).entered();

        let closure = self.dirty_closure(seeds);
        let members: FxHashSet<VertexId> = closure.iter().copied().collect();

        // 1. Kahn over the closure
        let mut pending: FxHashMap<VertexId, usize> = FxHashMap::default();
        for &v in &closure {
            let count = self
                .graph
                .vertex(v)
                .dependencies()
                .filter(|d| members.contains(d))
                .count();
            pending.insert(v, count);
        }
        let mut ready: VecDeque<VertexId> = closure
            .iter()
            .copied()
            .filter(|v| pending[v] == 0)
            .collect();
        let mut order = Vec::with_capacity(closure.len());
        while let Some(v) = ready.pop_front() {
            order.push(v);
            let mut readers: Vec<VertexId> = self
                .graph
                .vertex(v)
                .dependents()
                .filter(|d| members.contains(d))
                .collect();
            readers.sort();
            for reader in readers {
                if let Some(count) = pending.get_mut(&reader) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(reader);
                    }
                }
            }
        }

        // 2. Whatever is left sits on or behind a cycle
        if order.len() == closure.len() {
            return Schedule {
                order,
                cycles: Vec::new(),
            };
        }
        let placed: FxHashSet<VertexId> = order.iter().copied().collect();
        let leftover: Vec<VertexId> = closure
            .into_iter()
            .filter(|v| !placed.contains(v))
            .collect();
        let sccs = self.tarjan_scc(&leftover);
        let (cycles, _) = self.separate_cycles(&sccs);
        order.extend(sccs.into_iter().flatten());

        #[cfg(feature = "tracing")]
        tracing::debug!(
            leftover = leftover.len(),
            cycles = cycles.len(),
            "cycles detected"
        );
        Schedule { order, cycles }
    }

    /// `seeds` and everything that transitively reads them, in BFS order.
    pub fn dirty_closure(&self, seeds: &[VertexId]) -> Vec<VertexId> {
        let mut seen: FxHashSet<VertexId> = FxHashSet::default();
        let mut queue: VecDeque<VertexId> = VecDeque::new();
        let mut out = Vec::new();
        for &seed in seeds {
            if self.graph.vertices().contains(seed) && seen.insert(seed) {
                queue.push_back(seed);
            }
        }
        while let Some(v) = queue.pop_front() {
            out.push(v);
            let mut readers: Vec<VertexId> = self.graph.vertex(v).dependents().collect();
            readers.sort();
            for reader in readers {
                if seen.insert(reader) {
                    queue.push_back(reader);
                }
            }
        }
        out
    }

    /// Tarjan's strongly connected components algorithm, restricted to
    /// `vertices`. Components come out dependencies first.
    ///
    /// The depth-first walk keeps its own frame stack, so chain length is
    /// bounded by memory rather than by the thread's stack.
    pub fn tarjan_scc(&self, vertices: &[VertexId]) -> Vec<Vec<VertexId>> {
        let subset: FxHashSet<VertexId> = vertices.iter().copied().collect();
        let mut state = TarjanState::default();

        for &root in vertices {
            if state.indices.contains_key(&root) {
                continue;
            }
            state.open(root);
            let mut frames = vec![Frame::new(root, self.subset_dependencies(root, &subset))];

            while let Some(frame) = frames.last_mut() {
                let vertex = frame.vertex;
                let next = frame.dependencies.get(frame.next).copied();
                frame.next += 1;

                match next {
                    Some(dependency) if !state.indices.contains_key(&dependency) => {
                        state.open(dependency);
                        frames.push(Frame::new(dependency, self.subset_dependencies(dependency, &subset)));
                    }
                    Some(dependency) => {
                        if state.on_stack.contains(&dependency) {
                            let index = state.indices[&dependency];
                            state.lower(vertex, index);
                        }
                    }
                    None => {
                        frames.pop();
                        let lowlink = state.lowlinks[&vertex];
                        if let Some(parent) = frames.last() {
                            state.lower(parent.vertex, lowlink);
                        }
                        if lowlink == state.indices[&vertex] {
                            state.close(vertex);
                        }
                    }
                }
            }
        }

        state.sccs
    }

    fn subset_dependencies(&self, vertex: VertexId, subset: &FxHashSet<VertexId>) -> Vec<VertexId> {
        let mut dependencies: Vec<VertexId> = self
            .graph
            .vertex(vertex)
            .dependencies()
            .filter(|d| subset.contains(d))
            .collect();
        dependencies.sort();
        dependencies
    }

    fn separate_cycles(&self, sccs: &[Vec<VertexId>]) -> (Vec<Vec<VertexId>>, Vec<VertexId>) {
        let mut cycles = Vec::new();
        let mut acyclic = Vec::new();

        for scc in sccs {
            if scc.len() > 1 || (scc.len() == 1 && self.has_self_loop(scc[0])) {
                cycles.push(scc.clone());
            } else {
                acyclic.extend(scc.iter().copied());
            }
        }

        (cycles, acyclic)
    }

    fn has_self_loop(&self, vertex: VertexId) -> bool {
        self.graph
            .vertices()
            .get(vertex)
            .is_some_and(|v| v.dependencies.contains(&vertex))
    }
}

/// A vertex being visited and the next of its dependencies to look at.
struct Frame {
    vertex: VertexId,
    dependencies: Vec<VertexId>,
    next: usize,
}

impl Frame {
    fn new(vertex: VertexId, dependencies: Vec<VertexId>) -> Self {
        Self {
            vertex,
            dependencies,
            next: 0,
        }
    }
}

#[derive(Default)]
struct TarjanState {
    counter: usize,
    stack: Vec<VertexId>,
    indices: FxHashMap<VertexId, usize>,
    lowlinks: FxHashMap<VertexId, usize>,
    on_stack: FxHashSet<VertexId>,
    sccs: Vec<Vec<VertexId>>,
}

impl TarjanState {
    fn open(&mut self, vertex: VertexId) {
        self.indices.insert(vertex, self.counter);
        self.lowlinks.insert(vertex, self.counter);
        self.counter += 1;
        self.stack.push(vertex);
        self.on_stack.insert(vertex);
    }

    fn lower(&mut self, vertex: VertexId, to: usize) {
        if let Some(low) = self.lowlinks.get_mut(&vertex) {
            *low = (*low).min(to);
        }
    }

    /// `vertex` is the root of a component: pop the component off the stack.
    fn close(&mut self, vertex: VertexId) {
        let mut scc = Vec::new();
        while let Some(w) = self.stack.pop() {
            self.on_stack.remove(&w);
            scc.push(w);
            if w == vertex {
                break;
            }
        }
        scc.sort();
        self.sccs.push(scc);
    }
}
