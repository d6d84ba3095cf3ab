//! Hierarchical scheduling trees and their reduction into unit-server clusters.
//!
//! A tree is produced by the scheduler under study and serialized as JSON with
//! the fields `id`, `cost`, `period`, `level` and `children`. Nodes with a zero
//! `cost` mark server boundaries: the utilization demanded by their subtree is
//! resolved there into a number of real servers.

use std::{fmt::Display, fs, path::Path};

use anyhow::{Context, Result};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::data::Cluster;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TreeError {
    #[error("Node {id} has a non-zero cost but a zero period")]
    ZeroPeriod { id: NodeId },
}

/// Opaque node identifier, kept in whatever JSON shape the producer used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Number(i64),
    Name(String),
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeId::Number(n) => write!(f, "{n}"),
            NodeId::Name(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedNode {
    pub id: NodeId,
    #[serde(rename = "cost")]
    pub rate_num: u64,
    #[serde(rename = "period")]
    pub rate_den: u64,
    pub level: u32,
    #[serde(default)]
    pub children: Vec<SchedNode>,
}

impl SchedNode {
    pub fn new(id: NodeId, rate_num: u64, rate_den: u64, level: u32) -> Self {
        SchedNode {
            id,
            rate_num,
            rate_den,
            level,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<SchedNode>) -> Self {
        self.children = children;
        self
    }

    #[must_use]
    pub fn is_boundary(&self) -> bool {
        self.rate_num == 0
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns `1 - cost/period`.
    ///
    /// This is the idle share of the node's rate, not its demand. The
    /// aggregated server counts of stored experiments were computed with it,
    /// so it must stay as is.
    pub fn utilization(&self) -> Result<f64, TreeError> {
        if self.rate_den == 0 {
            return Err(TreeError::ZeroPeriod {
                id: self.id.clone(),
            });
        }
        Ok(1.0 - (self.rate_num as f64 / self.rate_den as f64))
    }
}

/// Folds the utilization of `node`'s subtree into unit-server clusters.
///
/// Clusters are appended to `clusters` in post-order. The returned value is
/// the utilization the node hands up to its parent: zero for boundaries,
/// which are resolved in place.
pub fn reduce(node: &SchedNode, clusters: &mut Vec<Cluster>) -> Result<f64, TreeError> {
    if node.is_leaf() {
        if node.is_boundary() {
            trace!("boundary leaf {}", node.id);
            clusters.push(Cluster::new(1, 0));
            return Ok(0.0);
        }
        return node.utilization();
    }

    let mut sum = 0.0;
    for child in &node.children {
        sum += reduce(child, clusters)?;
    }

    if node.is_boundary() {
        let servers = sum.ceil() as u64;
        trace!(
            "server boundary {} at level {}: utilization {} -> {} servers",
            node.id,
            node.level,
            sum,
            servers
        );
        clusters.push(Cluster::new(servers, node.level));
        Ok(0.0)
    } else {
        Ok(sum)
    }
}

/// All clusters of the tree rooted at `root`.
pub fn unit_servers(root: &SchedNode) -> Result<Vec<Cluster>, TreeError> {
    let mut clusters = Vec::new();
    reduce(root, &mut clusters)?;
    debug!("tree {} reduced to {} clusters", root.id, clusters.len());
    Ok(clusters)
}

pub fn parse_tree(input: &str) -> Result<SchedNode> {
    serde_json::from_str(input).context("Failed to parse scheduling tree JSON")
}

pub fn read_tree(path: &Path) -> Result<SchedNode> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scheduling tree {}", path.display()))?;
    parse_tree(&content).with_context(|| format!("Invalid tree in {}", path.display()))
}

pub fn to_json(root: &SchedNode) -> Result<String> {
    serde_json::to_string(root).context("Failed to serialize scheduling tree")
}

#[cfg(test)]
mod test {
    use super::*;

    fn leaf(id: i64, cost: u64, period: u64) -> SchedNode {
        SchedNode::new(NodeId::Number(id), cost, period, 0)
    }

    #[test]
    fn leaf_returns_idle_share() {
        let node = leaf(1, 1, 4);
        let mut clusters = Vec::new();
        let util = reduce(&node, &mut clusters).unwrap();
        assert_eq!(util, 0.75);
        assert!(clusters.is_empty());
    }

    #[test]
    fn boundary_leaf_is_single_server() {
        let node = leaf(1, 0, 10);
        let mut clusters = Vec::new();
        let util = reduce(&node, &mut clusters).unwrap();
        assert_eq!(util, 0.0);
        assert_eq!(clusters, vec![Cluster::new(1, 0)]);
    }

    #[test]
    fn boundary_rounds_children_up() {
        // idle shares: 0.3, 0.4, 0.5
        let root = SchedNode::new(NodeId::Number(0), 0, 1, 2).with_children(vec![
            leaf(1, 7, 10),
            leaf(2, 3, 5),
            leaf(3, 1, 2),
        ]);
        let clusters = unit_servers(&root).unwrap();
        assert_eq!(clusters, vec![Cluster::new(2, 2)]);
    }

    #[test]
    fn pass_through_node_sums_children() {
        let node = SchedNode::new(NodeId::Number(0), 1, 2, 1)
            .with_children(vec![leaf(1, 1, 4), leaf(2, 1, 2)]);
        let mut clusters = Vec::new();
        let util = reduce(&node, &mut clusters).unwrap();
        assert_eq!(util, 1.25);
        assert!(clusters.is_empty());
    }

    #[test]
    fn resolved_boundaries_hand_up_nothing() {
        let inner = SchedNode::new(NodeId::Number(1), 0, 1, 1)
            .with_children(vec![leaf(2, 1, 4), leaf(3, 1, 4)]);
        let root = SchedNode::new(NodeId::Number(0), 0, 1, 2)
            .with_children(vec![inner, leaf(4, 1, 2)]);
        let clusters = unit_servers(&root).unwrap();
        // post-order: the inner boundary is emitted first
        assert_eq!(clusters, vec![Cluster::new(2, 1), Cluster::new(1, 2)]);
    }

    #[test]
    fn empty_boundary_keeps_zero_cluster() {
        let root = SchedNode::new(NodeId::Number(0), 0, 1, 1).with_children(vec![
            SchedNode::new(NodeId::Number(1), 0, 1, 0).with_children(vec![leaf(2, 1, 1)]),
        ]);
        let clusters = unit_servers(&root).unwrap();
        assert_eq!(clusters, vec![Cluster::new(0, 0), Cluster::new(0, 1)]);
    }

    #[test]
    fn tree_without_boundaries_has_no_clusters() {
        let root = SchedNode::new(NodeId::Number(0), 1, 2, 0).with_children(vec![leaf(1, 1, 2)]);
        assert!(unit_servers(&root).unwrap().is_empty());
    }

    #[test]
    fn zero_period_is_an_error() {
        let root = SchedNode::new(NodeId::Number(0), 0, 1, 1).with_children(vec![leaf(7, 1, 0)]);
        assert_eq!(
            unit_servers(&root),
            Err(TreeError::ZeroPeriod {
                id: NodeId::Number(7)
            })
        );
    }

    #[test]
    fn parse_nested_document() {
        let doc = r#"{
            "id": "root", "cost": 0, "period": 1, "level": 1,
            "children": [
                {"id": 1, "cost": 1, "period": 2, "level": 0, "children": []},
                {"id": 2, "cost": 1, "period": 4, "level": 0}
            ]
        }"#;
        let root = parse_tree(doc).unwrap();
        assert_eq!(root.id, NodeId::Name("root".to_string()));
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[1].rate_num, 1);
        assert_eq!(root.children[1].rate_den, 4);
        assert_eq!(unit_servers(&root).unwrap(), vec![Cluster::new(2, 1)]);
    }

    #[test]
    fn json_round_trip_keeps_structure() {
        let root = SchedNode::new(NodeId::Name("r".to_string()), 0, 1, 2).with_children(vec![
            SchedNode::new(NodeId::Number(10), 3, 7, 1)
                .with_children(vec![leaf(11, 1, 3), leaf(12, 2, 9)]),
            leaf(13, 5, 6),
        ]);
        let json = to_json(&root).unwrap();
        assert!(json.contains("\"cost\":3"));
        assert!(json.contains("\"period\":7"));
        let parsed = parse_tree(&json).unwrap();
        assert_eq!(parsed, root);
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(parse_tree(r#"{"id": 1, "cost": 1}"#).is_err());
        assert!(parse_tree(r#"{"id": 1, "cost": -1, "period": 2, "level": 0}"#).is_err());
    }
}
