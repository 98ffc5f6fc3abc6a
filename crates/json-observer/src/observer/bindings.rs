//! Back-reference side table.
//!
//! Maps a node's identity to the parent it was last seen under and its
//! local name there. Entries are pure addressing metadata: they hold weak
//! handles only, so a node removed from the graph is dropped as soon as
//! nothing else refers to it, and its entry is pruned by the next
//! [`Bindings::compact`].

use std::collections::{HashMap, HashSet};

use json_observer_value::{Node, NodeId, WeakNode};

use super::options::ObserverOptions;

const MIN_COMPACT_THRESHOLD: usize = 1024;

#[derive(Debug, Clone)]
struct Binding {
    parent: WeakNode,
    name: String,
    node: WeakNode,
}

#[derive(Debug)]
pub(crate) struct Bindings {
    root: NodeId,
    table: HashMap<NodeId, Binding>,
    threshold: usize,
}

impl Bindings {
    pub(crate) fn new(root: NodeId) -> Self {
        Self {
            root,
            table: HashMap::new(),
            threshold: MIN_COMPACT_THRESHOLD,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.table.len()
    }

    /// Points `node` at `(parent, name)` without visiting its children.
    ///
    /// The root is never bound, and a node is never bound under one of its
    /// own descendants, so walking parents always ends.
    pub(crate) fn bind(&mut self, node: &Node, parent: &Node, name: &str) {
        if node.id() == self.root || self.is_ancestor_or_self(node.id(), parent) {
            return;
        }
        match self.table.get_mut(&node.id()) {
            Some(binding) if binding.node.is_alive() => {
                if binding.parent.id() != parent.id() || binding.name != name {
                    binding.parent = parent.downgrade();
                    binding.name = name.to_string();
                }
            }
            _ => {
                self.table.insert(
                    node.id(),
                    Binding {
                        parent: parent.downgrade(),
                        name: name.to_string(),
                        node: node.downgrade(),
                    },
                );
            }
        }
    }

    pub(crate) fn is_bound(&self, node: &Node) -> bool {
        self.table.get(&node.id()).is_some_and(|b| b.node.is_alive())
    }

    /// Binds `node` under `parent` and every not yet visited composite
    /// below it under its container.
    ///
    /// Each node is visited at most once per call.
    pub(crate) fn attach(&mut self, node: &Node, parent: Option<(&Node, &str)>, options: &ObserverOptions) {
        let mut seen = HashSet::new();
        self.attach_inner(node, parent, options, &mut seen);
    }

    fn attach_inner(
        &mut self,
        node: &Node,
        parent: Option<(&Node, &str)>,
        options: &ObserverOptions,
        seen: &mut HashSet<NodeId>,
    ) {
        if !seen.insert(node.id()) {
            return;
        }
        if let Some((parent, name)) = parent {
            self.bind(node, parent, name);
        }
        for (name, child) in node.child_nodes() {
            if options.is_reserved(&name) || child.id() == self.root {
                continue;
            }
            if options.is_excluded(&child.clone().into()) {
                continue;
            }
            self.attach_inner(&child, Some((node, &name)), options, seen);
        }
    }

    /// Rebinds the direct composite children of `node` to their current
    /// names and attaches children that were never seen before.
    pub(crate) fn refresh(&mut self, node: &Node, options: &ObserverOptions) {
        for (name, child) in node.child_nodes() {
            if options.is_reserved(&name) || options.is_excluded(&child.clone().into()) {
                continue;
            }
            if self.is_bound(&child) {
                self.bind(&child, node, &name);
            } else {
                self.attach(&child, Some((node, &name)), options);
            }
        }
    }

    /// Whether `candidate` is `node` or one of its bound ancestors.
    fn is_ancestor_or_self(&self, candidate: NodeId, node: &Node) -> bool {
        let mut current = node.id();
        let mut hops = 0;
        loop {
            if current == candidate {
                return true;
            }
            match self.table.get(&current) {
                Some(binding) if hops <= self.table.len() => {
                    current = binding.parent.id();
                    hops += 1;
                }
                _ => return false,
            }
        }
    }

    /// Local names from the root down to `node`.
    ///
    /// For a node that is no longer connected to the root the walk stops at
    /// the first missing link and the names collected so far are returned.
    pub(crate) fn steps(&self, node: &Node) -> Vec<String> {
        let mut steps = Vec::new();
        let mut current = node.id();
        while current != self.root {
            let Some(binding) = self.table.get(&current) else {
                break;
            };
            if !binding.parent.is_alive() || steps.len() > self.table.len() {
                break;
            }
            steps.push(binding.name.clone());
            current = binding.parent.id();
        }
        steps.reverse();
        steps
    }

    pub(crate) fn parent(&self, node: &Node) -> Option<Node> {
        self.table.get(&node.id())?.parent.upgrade()
    }

    /// Drops entries of dead nodes. Returns how many were removed.
    pub(crate) fn compact(&mut self) -> usize {
        let before = self.table.len();
        self.table.retain(|_, binding| binding.node.is_alive());
        self.threshold = (self.table.len() * 2).max(MIN_COMPACT_THRESHOLD);
        before - self.table.len()
    }

    pub(crate) fn needs_compaction(&self) -> bool {
        self.table.len() >= self.threshold
    }
}
