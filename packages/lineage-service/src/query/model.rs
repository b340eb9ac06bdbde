use lineage_storage::{DatasetIdentifier, DatasetType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One dataset reached by a traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageNode {
    pub fqn: String,
    pub namespace: String,
    pub name: String,
    #[serde(rename = "type")]
    pub dataset_type: DatasetType,
    /// Hops from the start dataset (1 = direct neighbour)
    pub depth: usize,
    /// Transformation of the edge that first reached this node
    pub transformation: Option<String>,
}

impl LineageNode {
    pub(crate) fn reached(dataset: &DatasetIdentifier, depth: usize, transformation: Option<String>) -> Self {
        Self {
            fqn: dataset.fqn(),
            namespace: dataset.namespace().to_string(),
            name: dataset.name().to_string(),
            dataset_type: dataset.dataset_type(),
            depth,
            transformation,
        }
    }
}

/// Shortest path by edge count, as FQNs from source to target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineagePath {
    pub nodes: Vec<String>,
}

impl LineagePath {
    /// Number of edges
    pub fn len(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn source(&self) -> Option<&str> {
        self.nodes.first().map(String::as_str)
    }

    pub fn target(&self) -> Option<&str> {
        self.nodes.last().map(String::as_str)
    }
}

/// Everything downstream of a dataset, grouped for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub dataset: String,
    pub total_impacted: usize,
    /// Depth-1 subset of `downstream`
    pub direct_downstream: Vec<LineageNode>,
    pub by_depth: BTreeMap<usize, usize>,
    pub by_type: BTreeMap<DatasetType, usize>,
    pub downstream: Vec<LineageNode>,
}

impl ImpactReport {
    pub(crate) fn from_downstream(dataset: String, downstream: Vec<LineageNode>) -> Self {
        let mut by_depth = BTreeMap::new();
        let mut by_type = BTreeMap::new();
        for node in &downstream {
            *by_depth.entry(node.depth).or_insert(0) += 1;
            *by_type.entry(node.dataset_type).or_insert(0) += 1;
        }

        Self {
            dataset,
            total_impacted: downstream.len(),
            direct_downstream: downstream.iter().filter(|n| n.depth == 1).cloned().collect(),
            by_depth,
            by_type,
            downstream,
        }
    }

    pub fn max_depth_reached(&self) -> usize {
        self.by_depth.keys().next_back().copied().unwrap_or(0)
    }
}
