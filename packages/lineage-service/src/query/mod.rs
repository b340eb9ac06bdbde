//! Graph queries over the edge table
//!
//! Level-by-level BFS. Every expanded node is one store round trip; there is
//! no adjacency cache, so cost grows with frontier size × depth.
//!
//! All reads return [`QueryOutcome`]: store failures are logged and
//! reported as `StoreUnavailable`, never raised.

mod model;
mod outcome;

pub use model::{ImpactReport, LineageNode, LineagePath};
pub use outcome::QueryOutcome;

use lineage_storage::{DatasetIdentifier, LineageEdge, LineageEvent, LineageStore, StorageError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Traversal direction along `source → target` edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow edges backward (target → source)
    Upstream,
    /// Follow edges forward (source → target)
    Downstream,
}

impl Direction {
    fn neighbor(self, edge: &LineageEdge) -> &DatasetIdentifier {
        match self {
            Direction::Upstream => &edge.source,
            Direction::Downstream => &edge.target,
        }
    }
}

type NodeKey = (String, String);

fn key_of(dataset: &DatasetIdentifier) -> NodeKey {
    (dataset.namespace().to_string(), dataset.name().to_string())
}

/// Depth settings the engine applies to every traversal
#[derive(Debug, Clone, Copy)]
pub struct DepthLimits {
    pub default_max_depth: usize,
    pub max_depth_limit: usize,
}

impl DepthLimits {
    /// `None` means the default; anything above the limit is cut down to it
    pub fn resolve(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_max_depth)
            .min(self.max_depth_limit)
    }
}

pub struct LineageQueryEngine {
    store: Arc<dyn LineageStore>,
    limits: DepthLimits,
}

impl LineageQueryEngine {
    pub fn new(store: Arc<dyn LineageStore>, limits: DepthLimits) -> Self {
        Self { store, limits }
    }

    /// Datasets feeding `namespace.name`, nearest first.
    ///
    /// `max_depth` of `None` uses the configured default; larger values
    /// are clamped to the configured limit.
    pub async fn get_upstream(
        &self,
        namespace: &str,
        name: &str,
        max_depth: Option<usize>,
    ) -> QueryOutcome<Vec<LineageNode>> {
        let depth = self.limits.resolve(max_depth);
        match self.traverse(namespace, name, depth, Direction::Upstream).await {
            Ok(nodes) => QueryOutcome::from_list(nodes),
            Err(e) => unavailable("upstream", namespace, name, e),
        }
    }

    /// Datasets fed by `namespace.name`, nearest first
    pub async fn get_downstream(
        &self,
        namespace: &str,
        name: &str,
        max_depth: Option<usize>,
    ) -> QueryOutcome<Vec<LineageNode>> {
        let depth = self.limits.resolve(max_depth);
        match self.traverse(namespace, name, depth, Direction::Downstream).await {
            Ok(nodes) => QueryOutcome::from_list(nodes),
            Err(e) => unavailable("downstream", namespace, name, e),
        }
    }

    /// First-found shortest path from source to target within `max_depth`
    /// edges. A dataset reaches itself with a zero-length path.
    pub async fn get_path(
        &self,
        source_namespace: &str,
        source_name: &str,
        target_namespace: &str,
        target_name: &str,
        max_depth: Option<usize>,
    ) -> QueryOutcome<LineagePath> {
        let depth = self.limits.resolve(max_depth);
        let source = (source_namespace.to_string(), source_name.to_string());
        let target = (target_namespace.to_string(), target_name.to_string());

        match self.shortest_path(source, target, depth).await {
            Ok(path) => path.into(),
            Err(e) => unavailable("path", source_namespace, source_name, e),
        }
    }

    /// Full downstream set of `namespace.name` grouped by depth and type.
    ///
    /// Always `Found` when the store answers, even with nothing downstream.
    pub async fn get_impact_analysis(
        &self,
        namespace: &str,
        name: &str,
        max_depth: Option<usize>,
    ) -> QueryOutcome<ImpactReport> {
        let depth = self.limits.resolve(max_depth);
        match self.traverse(namespace, name, depth, Direction::Downstream).await {
            Ok(nodes) => QueryOutcome::Found(ImpactReport::from_downstream(
                format!("{}.{}", namespace, name),
                nodes,
            )),
            Err(e) => unavailable("impact", namespace, name, e),
        }
    }

    /// Most recent persisted events first
    pub async fn get_recent_events(&self, limit: usize) -> QueryOutcome<Vec<LineageEvent>> {
        match self.store.find_recent_events(limit).await {
            Ok(events) => QueryOutcome::from_list(events),
            Err(e) => {
                warn!(limit, error = %e, "Recent events query failed");
                QueryOutcome::StoreUnavailable(e.to_string())
            }
        }
    }

    /// Most recent events of one job, across namespaces
    pub async fn get_job_history(&self, job_name: &str, limit: usize) -> QueryOutcome<Vec<LineageEvent>> {
        match self.store.find_events_by_job(job_name, limit).await {
            Ok(events) => QueryOutcome::from_list(events),
            Err(e) => {
                warn!(job_name, limit, error = %e, "Job history query failed");
                QueryOutcome::StoreUnavailable(e.to_string())
            }
        }
    }

    async fn neighbors(
        &self,
        (namespace, name): &NodeKey,
        direction: Direction,
    ) -> Result<Vec<LineageEdge>, StorageError> {
        match direction {
            Direction::Upstream => self.store.find_edges_by_target(namespace, name).await,
            Direction::Downstream => self.store.find_edges_by_source(namespace, name).await,
        }
    }

    /// Level-bounded BFS. The visited set spans the whole traversal and
    /// starts with the origin, so cycles never re-emit a node.
    pub async fn traverse(
        &self,
        namespace: &str,
        name: &str,
        max_depth: usize,
        direction: Direction,
    ) -> Result<Vec<LineageNode>, StorageError> {
        let origin: NodeKey = (namespace.to_string(), name.to_string());
        let mut visited: HashSet<NodeKey> = HashSet::from([origin.clone()]);
        let mut frontier = vec![origin];
        let mut nodes = Vec::new();

        for depth in 1..=max_depth {
            if frontier.is_empty() {
                break;
            }

            let mut next = Vec::new();
            for current in &frontier {
                for edge in self.neighbors(current, direction).await? {
                    let neighbor = direction.neighbor(&edge);
                    let key = key_of(neighbor);
                    if visited.insert(key.clone()) {
                        nodes.push(LineageNode::reached(
                            neighbor,
                            depth,
                            edge.transformation.clone(),
                        ));
                        next.push(key);
                    }
                }
            }
            frontier = next;
        }

        debug!(
            dataset = %format!("{}.{}", namespace, name),
            ?direction,
            max_depth,
            reached = nodes.len(),
            "Lineage traversal finished"
        );
        Ok(nodes)
    }

    async fn shortest_path(
        &self,
        source: NodeKey,
        target: NodeKey,
        max_depth: usize,
    ) -> Result<Option<LineagePath>, StorageError> {
        if source == target {
            return Ok(Some(LineagePath {
                nodes: vec![format!("{}.{}", source.0, source.1)],
            }));
        }

        let mut parents: HashMap<NodeKey, NodeKey> = HashMap::new();
        let mut visited: HashSet<NodeKey> = HashSet::from([source.clone()]);
        let mut frontier = vec![source.clone()];

        for _ in 0..max_depth {
            if frontier.is_empty() {
                break;
            }

            let mut next = Vec::new();
            for current in &frontier {
                for edge in self.neighbors(current, Direction::Downstream).await? {
                    let key = key_of(&edge.target);
                    if !visited.insert(key.clone()) {
                        continue;
                    }
                    parents.insert(key.clone(), current.clone());
                    if key == target {
                        return Ok(Some(rebuild_path(&parents, &source, key)));
                    }
                    next.push(key);
                }
            }
            frontier = next;
        }

        Ok(None)
    }
}

fn rebuild_path(parents: &HashMap<NodeKey, NodeKey>, source: &NodeKey, target: NodeKey) -> LineagePath {
    let mut chain = vec![target];
    while let Some(last) = chain.last() {
        if last == source {
            break;
        }
        match parents.get(last) {
            Some(parent) => chain.push(parent.clone()),
            None => break,
        }
    }
    chain.reverse();

    LineagePath {
        nodes: chain
            .into_iter()
            .map(|(namespace, name)| format!("{}.{}", namespace, name))
            .collect(),
    }
}

fn unavailable<T>(query: &str, namespace: &str, name: &str, error: StorageError) -> QueryOutcome<T> {
    warn!(
        query,
        dataset = %format!("{}.{}", namespace, name),
        error = %error,
        "Lineage query failed, store unavailable"
    );
    QueryOutcome::StoreUnavailable(error.to_string())
}
