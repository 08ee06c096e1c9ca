//! The branching, append-only record of committed effects.

use crate::internal::cell::{CellSlot, ErasedCell, downcast_cell};
use crate::public::cell::Cell;
use crate::public::resource::ResourceId;
use crate::public::schema::{CellId, Query};
use crate::{Duration, Instant};
use ahash::{AHashMap, AHashSet};
use slab::Slab;
use std::any::Any;
use std::cell::RefCell;
use std::sync::Arc;
use tracing::trace;

/// A handle to one node of a [History].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

struct HistoryNode {
    parent: Option<NodeId>,
    time: Instant,
    commit: Option<(CellId, Box<dyn Any>)>,
}

/// A persistent tree of simulation states.
///
/// Nodes are never changed after creation. [History::fork], [History::advance], and
/// [History::emit] all produce a new child and leave the parent as it was, so any node
/// can be read from at any time, no matter how many branches grew from it since.
///
/// Reads fold effects from the nearest memoized ancestor and cache the result per node.
pub struct History {
    cells: Arc<[CellSlot]>,
    nodes: Slab<HistoryNode>,
    origin: NodeId,
    states: RefCell<AHashMap<(NodeId, CellId), Box<dyn ErasedCell>>>,
    resources: RefCell<AHashMap<(ResourceId, NodeId), Box<dyn Any>>>,
}

impl History {
    pub(crate) fn new(cells: Arc<[CellSlot]>) -> Self {
        let mut nodes = Slab::new();
        let origin = NodeId(nodes.insert(HistoryNode {
            parent: None,
            time: Instant::ORIGIN,
            commit: None,
        }));
        History {
            cells,
            nodes,
            origin,
            states: RefCell::default(),
            resources: RefCell::default(),
        }
    }

    /// The root node, at [Instant::ORIGIN], where every cell holds its initial state.
    pub fn origin(&self) -> NodeId {
        self.origin
    }

    fn node(&self, node: NodeId) -> &HistoryNode {
        match self.nodes.get(node.0) {
            Some(n) => n,
            None => panic!("history node {node:?} was collected"),
        }
    }

    pub fn time(&self, node: NodeId) -> Instant {
        self.node(node).time
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(node.0)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, parent: NodeId, time: Instant, commit: Option<(CellId, Box<dyn Any>)>) -> NodeId {
        NodeId(self.nodes.insert(HistoryNode {
            parent: Some(parent),
            time,
            commit,
        }))
    }

    /// A new branch point, sharing everything before it.
    pub fn fork(&mut self, node: NodeId) -> NodeId {
        let time = self.time(node);
        self.push(node, time, None)
    }

    /// A descendant at a later time, with no new effects.
    pub fn advance(&mut self, node: NodeId, time: Instant) -> NodeId {
        let from = self.time(node);
        assert!(time >= from, "cannot advance history backward from {from} to {time}");
        self.push(node, time, None)
    }

    /// Records an event against a query's cell, returning the node that includes it.
    pub fn emit<E, C: Cell>(&mut self, node: NodeId, query: &Query<E, C>, event: E) -> NodeId {
        let effect = query.interpret(event);
        self.commit(node, query.cell(), Box::new(effect))
    }

    pub(crate) fn commit(&mut self, node: NodeId, cell: CellId, effect: Box<dyn Any>) -> NodeId {
        let time = self.time(node);
        trace!(cell = %self.cell_label(cell), %time, "commit");
        self.push(node, time, Some((cell, effect)))
    }

    pub(crate) fn cell_slot(&self, cell: CellId) -> &CellSlot {
        &self.cells[cell.index()]
    }

    pub(crate) fn cell_label(&self, cell: CellId) -> &str {
        &self.cell_slot(cell).label
    }

    /// The state of a query's cell at a node.
    pub fn ask<E, C: Cell>(&self, query: &Query<E, C>, node: NodeId) -> C {
        let state = self.state(query.cell(), node);
        downcast_cell::<C>(&*state).clone()
    }

    pub(crate) fn state(&self, cell: CellId, node: NodeId) -> Box<dyn ErasedCell> {
        if let Some(state) = self.states.borrow().get(&(node, cell)) {
            return state.duplicate_boxed();
        }

        let mut path = Vec::new();
        let mut cursor = node;
        let (mut state, mut time) = loop {
            if cursor != node {
                if let Some(state) = self.states.borrow().get(&(cursor, cell)) {
                    break (state.duplicate_boxed(), self.time(cursor));
                }
            }
            let current = self.node(cursor);
            match current.parent {
                Some(parent) => {
                    path.push(cursor);
                    cursor = parent;
                }
                None => break (self.cell_slot(cell).initial.duplicate_boxed(), current.time),
            }
        };

        for id in path.into_iter().rev() {
            let current = self.node(id);
            if current.time > time {
                state.step_erased(current.time - time);
                time = current.time;
            }
            if let Some((target, effect)) = &current.commit {
                if *target == cell {
                    state.react_erased(&**effect);
                }
            }
        }

        let result = state.duplicate_boxed();
        self.states.borrow_mut().insert((node, cell), state);
        result
    }

    /// The effects committed between `base` (exclusive) and `tip`, in commit order.
    pub(crate) fn commits_since(&self, tip: NodeId, base: NodeId) -> Vec<(CellId, &dyn Any)> {
        let mut commits = Vec::new();
        let mut cursor = tip;
        while cursor != base {
            let current = self.node(cursor);
            if let Some((cell, effect)) = &current.commit {
                commits.push((*cell, &**effect));
            }
            match current.parent {
                Some(parent) => cursor = parent,
                None => panic!("{base:?} is not an ancestor of {tip:?}"),
            }
        }
        commits.reverse();
        commits
    }

    pub(crate) fn memoized<T: Clone + 'static>(
        &self,
        resource: ResourceId,
        node: NodeId,
        compute: impl FnOnce() -> T,
    ) -> T {
        if let Some(value) = self
            .resources
            .borrow()
            .get(&(resource, node))
            .and_then(|v| v.downcast_ref::<T>())
        {
            return value.clone();
        }
        let value = compute();
        self.resources
            .borrow_mut()
            .insert((resource, node), Box::new(value.clone()));
        value
    }

    /// Drops every node that is not an ancestor of a live node, returning how many were removed.
    pub fn sweep(&mut self, live: &[NodeId]) -> usize {
        let mut reachable = AHashSet::with_capacity(self.nodes.len());
        reachable.insert(self.origin);
        for &node in live {
            let mut cursor = Some(node);
            while let Some(current) = cursor {
                if !reachable.insert(current) {
                    break;
                }
                cursor = self.nodes.get(current.0).and_then(|n| n.parent);
            }
        }
        let before = self.nodes.len();
        self.nodes.retain(|key, _| reachable.contains(&NodeId(key)));
        self.states
            .get_mut()
            .retain(|(node, _), _| reachable.contains(node));
        self.resources
            .get_mut()
            .retain(|(_, node), _| reachable.contains(node));
        before - self.nodes.len()
    }

    /// Time elapsed between a node and a later instant.
    pub(crate) fn elapsed(&self, node: NodeId, at: Instant) -> Duration {
        at - self.time(node)
    }
}
