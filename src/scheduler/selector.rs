use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    Online,
    Offline,
}

/// Point-in-time view of one candidate node, supplied by the caller before
/// each selection. The selector only reads snapshots, never mutates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: String,
    /// CPU utilization, 0–100.
    pub cpu_usage: f64,
    /// Memory utilization, 0–100.
    pub memory_usage: f64,
    pub active_jobs: u32,
    pub max_jobs: u32,
    /// Capability tags advertised by the node (e.g. "gpu", "arm64").
    pub tags: Vec<String>,
    pub status: NodeStatus,
}

impl NodeSnapshot {
    pub fn has_capacity(&self) -> bool {
        self.active_jobs < self.max_jobs
    }

    fn slot_ratio(&self) -> f64 {
        if self.max_jobs == 0 {
            1.0
        } else {
            f64::from(self.active_jobs) / f64::from(self.max_jobs)
        }
    }
}

/// Node-selection policy. Implementations receive the full candidate list
/// and return a reference to the chosen node, or `None` when no candidate
/// qualifies.
pub trait SelectionStrategy: Send + Sync {
    fn select<'a>(&self, nodes: &'a [NodeSnapshot]) -> Option<&'a NodeSnapshot>;
}

/// Picks the online node with free slots and the lowest load score.
///
/// The score weighs CPU at 0.4 and memory and slot occupancy at 0.3 each,
/// all on a 0–100 scale. Ties break by node ID so selection is reproducible.
#[derive(Debug, Default)]
pub struct LeastLoaded;

impl LeastLoaded {
    fn score(node: &NodeSnapshot) -> f64 {
        0.4 * node.cpu_usage + 0.3 * node.memory_usage + 0.3 * node.slot_ratio() * 100.0
    }
}

impl SelectionStrategy for LeastLoaded {
    fn select<'a>(&self, nodes: &'a [NodeSnapshot]) -> Option<&'a NodeSnapshot> {
        nodes
            .iter()
            .filter(|n| n.status == NodeStatus::Online && n.has_capacity())
            .min_by(|a, b| {
                Self::score(a)
                    .partial_cmp(&Self::score(b))
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.id.cmp(&b.id))
            })
    }
}

/// Chooses execution targets from a caller-supplied node snapshot.
///
/// Holds no connection to a node registry; callers refresh the view with
/// [`update_nodes`](Self::update_nodes) before selecting whenever node state
/// may have changed. `None` from [`select_node`](Self::select_node) means "no
/// capacity right now" and is an expected outcome, not a failure.
pub struct NodeSelector {
    nodes: Vec<NodeSnapshot>,
    strategy: Box<dyn SelectionStrategy>,
}

impl NodeSelector {
    pub fn new(strategy: Box<dyn SelectionStrategy>) -> Self {
        Self {
            nodes: Vec::new(),
            strategy,
        }
    }

    /// Selector with the least-loaded strategy.
    pub fn least_loaded() -> Self {
        Self::new(Box::new(LeastLoaded))
    }

    /// Replace the selector's view of available nodes.
    pub fn update_nodes(&mut self, nodes: Vec<NodeSnapshot>) {
        self.nodes = nodes;
    }

    pub fn nodes(&self) -> &[NodeSnapshot] {
        &self.nodes
    }

    /// Pick the best node for the next unit of work, or `None` when no node
    /// is online with free slots.
    pub fn select_node(&self) -> Option<&NodeSnapshot> {
        let selected = self.strategy.select(&self.nodes);
        match selected {
            Some(node) => {
                tracing::debug!(
                    node_id = %node.id,
                    active_jobs = node.active_jobs,
                    max_jobs = node.max_jobs,
                    "Node selected"
                );
            }
            None => {
                tracing::debug!(candidates = self.nodes.len(), "No eligible node");
            }
        }
        selected
    }
}

impl std::fmt::Debug for NodeSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeSelector")
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}
