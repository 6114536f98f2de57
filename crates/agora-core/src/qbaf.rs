//! Quantitative bipolar argumentation frameworks (one per persona per round)

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Role of a node in a persona's belief graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Root,
    Pro,
    Con,
    Evidence,
}

/// A claim with an intrinsic base score (τ) and a derived strength (σ)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QbafNode {
    pub id: String,
    pub claim: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Intrinsic plausibility τ
    pub base_score: f64,
    /// Dialectical strength σ, only ever written by the DF-QuAD engine
    pub dialectical_strength: f64,
    /// Provenance references
    #[serde(default)]
    pub grounding: Vec<String>,
    pub persona_id: String,
    pub depth: u32,
}

impl QbafNode {
    pub fn new(id: &str, claim: &str, node_type: NodeType, base_score: f64, persona_id: &str) -> Self {
        let base_score = base_score.clamp(0.0, 1.0);
        Self {
            id: id.to_string(),
            claim: claim.to_string(),
            node_type,
            base_score,
            dialectical_strength: base_score,
            grounding: Vec::new(),
            persona_id: persona_id.to_string(),
            depth: 0,
        }
    }

    /// Builder: set depth (distance from the root)
    pub fn at_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Attack,
    Support,
}

/// Directed edge from an attacker/supporter to its target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QbafEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub weight: f64,
}

impl QbafEdge {
    pub fn attack(from: &str, to: &str, weight: f64) -> Self {
        Self::new(from, to, EdgeType::Attack, weight)
    }

    pub fn support(from: &str, to: &str, weight: f64) -> Self {
        Self::new(from, to, EdgeType::Support, weight)
    }

    fn new(from: &str, to: &str, edge_type: EdgeType, weight: f64) -> Self {
        let kind = match edge_type {
            EdgeType::Attack => "att",
            EdgeType::Support => "sup",
        };
        Self {
            id: format!("{}-{}-{}", from, kind, to),
            from: from.to_string(),
            to: to.to_string(),
            edge_type,
            weight: weight.clamp(0.0, 1.0),
        }
    }
}

/// One persona's belief graph at one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaQbaf {
    pub persona_id: String,
    pub topic: String,
    pub root_claim: String,
    pub nodes: Vec<QbafNode>,
    pub edges: Vec<QbafEdge>,
    pub round: u32,
}

impl PersonaQbaf {
    /// Degenerate graph holding only the thesis. Used when extraction yields
    /// no usable edges so downstream engines stay total.
    pub fn single_root(persona_id: &str, topic: &str, root_claim: &str, base_score: f64) -> Self {
        Self {
            persona_id: persona_id.to_string(),
            topic: topic.to_string(),
            root_claim: root_claim.to_string(),
            nodes: vec![QbafNode::new(
                &root_id(persona_id),
                root_claim,
                NodeType::Root,
                base_score,
                persona_id,
            )],
            edges: Vec::new(),
            round: 0,
        }
    }

    /// Assemble a graph from extracted parts, dropping edges with dangling
    /// endpoints, self-loops and duplicate `(from, to, type)` triples. Falls
    /// back to [`PersonaQbaf::single_root`] when no usable edge survives or
    /// no root node exists.
    pub fn assemble(
        persona_id: &str,
        topic: &str,
        root_claim: &str,
        nodes: Vec<QbafNode>,
        edges: Vec<QbafEdge>,
    ) -> Self {
        let root_base = nodes
            .iter()
            .find(|n| n.node_type == NodeType::Root)
            .map(|n| n.base_score)
            .unwrap_or(0.5);

        let mut graph = Self {
            persona_id: persona_id.to_string(),
            topic: topic.to_string(),
            root_claim: root_claim.to_string(),
            nodes: Vec::new(),
            edges: Vec::new(),
            round: 0,
        };
        graph.extend(nodes, edges);

        if graph.edges.is_empty() || graph.root().is_none() {
            tracing::debug!(persona = persona_id, "degenerate QBAF, using single root");
            return Self::single_root(persona_id, topic, root_claim, root_base);
        }
        graph.recompute_depths();
        graph
    }

    pub fn root(&self) -> Option<&QbafNode> {
        self.nodes.iter().find(|n| n.node_type == NodeType::Root)
    }

    pub fn root_strength(&self) -> f64 {
        self.root().map(|r| r.dialectical_strength).unwrap_or(0.0)
    }

    pub fn node(&self, id: &str) -> Option<&QbafNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut QbafNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Edges pointing into `id`
    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a QbafEdge> + 'a {
        self.edges.iter().filter(move |e| e.to == id)
    }

    /// Copy of the graph with `id` and its incident edges removed
    pub fn without_node(&self, id: &str) -> Self {
        let mut next = self.clone();
        next.nodes.retain(|n| n.id != id);
        next.edges.retain(|e| e.from != id && e.to != id);
        next
    }

    /// Next round's snapshot with new nodes and edges appended. Nothing is
    /// removed, so earlier snapshots remain a prefix of later ones.
    pub fn append_round(&self, nodes: Vec<QbafNode>, edges: Vec<QbafEdge>) -> Self {
        let mut next = self.clone();
        next.round += 1;
        next.extend(nodes, edges);
        next.recompute_depths();
        next
    }

    fn extend(&mut self, nodes: Vec<QbafNode>, edges: Vec<QbafEdge>) {
        let mut ids: HashSet<String> = self.nodes.iter().map(|n| n.id.clone()).collect();
        let has_root = self.root().is_some();
        let mut root_seen = has_root;
        for node in nodes {
            if node.node_type == NodeType::Root {
                if root_seen {
                    continue;
                }
                root_seen = true;
            }
            if ids.insert(node.id.clone()) {
                self.nodes.push(node);
            }
        }

        let mut triples: HashSet<(String, String, EdgeType)> = self
            .edges
            .iter()
            .map(|e| (e.from.clone(), e.to.clone(), e.edge_type))
            .collect();
        for edge in edges {
            if edge.from == edge.to || !ids.contains(&edge.from) || !ids.contains(&edge.to) {
                tracing::debug!(edge = %edge.id, "dropping QBAF edge with stale endpoint");
                continue;
            }
            if triples.insert((edge.from.clone(), edge.to.clone(), edge.edge_type)) {
                self.edges.push(edge);
            }
        }
    }

    /// Depth = shortest edge distance to the root; unreachable nodes keep theirs
    pub fn recompute_depths(&mut self) {
        let Some(root) = self.root().map(|r| r.id.clone()) else {
            return;
        };
        let mut depth: HashMap<String, u32> = HashMap::from([(root.clone(), 0)]);
        let mut frontier = vec![root];
        while !frontier.is_empty() {
            let mut next_frontier = Vec::new();
            for target in &frontier {
                let d = depth[target];
                for edge in self.edges.iter().filter(|e| &e.to == target) {
                    if !depth.contains_key(&edge.from) {
                        depth.insert(edge.from.clone(), d + 1);
                        next_frontier.push(edge.from.clone());
                    }
                }
            }
            frontier = next_frontier;
        }
        for node in &mut self.nodes {
            if let Some(d) = depth.get(&node.id) {
                node.depth = *d;
            }
        }
    }

    /// Base scores keyed by node id
    pub fn base_scores(&self) -> HashMap<String, f64> {
        self.nodes.iter().map(|n| (n.id.clone(), n.base_score)).collect()
    }
}

/// Conventional id of a persona's root node
pub fn root_id(persona_id: &str) -> String {
    format!("{}-root", persona_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes() -> Vec<QbafNode> {
        vec![
            QbafNode::new("r", "Cities should ban cars", NodeType::Root, 0.6, "p1"),
            QbafNode::new("a", "Air quality improves", NodeType::Pro, 0.8, "p1"),
            QbafNode::new("b", "Deliveries get harder", NodeType::Con, 0.5, "p1"),
        ]
    }

    #[test]
    fn test_assemble_filters_bad_edges_and_sets_depth() {
        let qbaf = PersonaQbaf::assemble(
            "p1",
            "cars",
            "Cities should ban cars",
            nodes(),
            vec![
                QbafEdge::support("a", "r", 1.0),
                QbafEdge::support("a", "r", 0.5),
                QbafEdge::attack("b", "r", 1.0),
                QbafEdge::attack("ghost", "r", 1.0),
                QbafEdge::attack("b", "b", 1.0),
            ],
        );
        assert_eq!(qbaf.edges.len(), 2);
        assert_eq!(qbaf.node("a").unwrap().depth, 1);
        assert_eq!(qbaf.root().unwrap().depth, 0);
    }

    #[test]
    fn test_assemble_without_edges_falls_back_to_single_root() {
        let qbaf = PersonaQbaf::assemble("p1", "cars", "Cities should ban cars", nodes(), vec![]);
        assert_eq!(qbaf.nodes.len(), 1);
        assert_eq!(qbaf.root().unwrap().id, "p1-root");
        assert_eq!(qbaf.root().unwrap().base_score, 0.6);
    }

    #[test]
    fn test_append_round_is_append_only() {
        let base = PersonaQbaf::assemble(
            "p1",
            "cars",
            "Cities should ban cars",
            nodes(),
            vec![QbafEdge::support("a", "r", 1.0)],
        );
        let next = base.append_round(
            vec![QbafNode::new("c", "Noise drops", NodeType::Pro, 0.7, "p1")],
            vec![QbafEdge::support("c", "a", 1.0)],
        );
        assert_eq!(next.round, base.round + 1);
        assert_eq!(next.nodes.len(), base.nodes.len() + 1);
        assert_eq!(&next.nodes[..base.nodes.len()], &base.nodes[..]);
        assert_eq!(next.node("c").unwrap().depth, 2);
    }

    #[test]
    fn test_without_node_drops_incident_edges() {
        let qbaf = PersonaQbaf::assemble(
            "p1",
            "cars",
            "Cities should ban cars",
            nodes(),
            vec![QbafEdge::support("a", "r", 1.0), QbafEdge::attack("b", "r", 1.0)],
        );
        let pruned = qbaf.without_node("a");
        assert_eq!(pruned.nodes.len(), 2);
        assert_eq!(pruned.edges.len(), 1);
    }
}
