//! Merging two personas' belief graphs into one community graph
//!
//! The only non-deterministic input is the list of [`ClaimComparison`]s
//! produced by the text-comparison call. Everything here is a pure function
//! of the two graphs and that list.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use agora_core::{dfquad, EdgeType, NodeType, PersonaQbaf, QbafEdge, QbafNode};

/// How two claims from different personas relate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimRelationship {
    Agreement,
    Opposition,
    Related,
}

/// One judged pair: `a_node_id` from the first persona, `b_node_id` from the second
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimComparison {
    pub a_node_id: String,
    pub b_node_id: String,
    pub relationship: ClaimRelationship,
    pub confidence: f64,
    #[serde(default)]
    pub shared_topic: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Consensus,
    Crux,
    Neutral,
}

/// Back-reference to a source node by id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub persona_id: String,
    pub node_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityNode {
    pub id: String,
    pub claim: String,
    pub merged_from: Vec<SourceRef>,
    /// τ per persona
    pub base_scores: BTreeMap<String, f64>,
    pub community_strength: f64,
    /// Sample variance of the base scores; only defined for merged nodes
    pub variance: Option<f64>,
    pub relationship: Option<ClaimRelationship>,
    pub shared_topic: Option<String>,
    pub classification: Classification,
}

impl CommunityNode {
    pub fn is_merged(&self) -> bool {
        self.merged_from.len() >= 2
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityGraph {
    pub topic: String,
    pub persona_ids: Vec<String>,
    pub nodes: Vec<CommunityNode>,
    pub edges: Vec<QbafEdge>,
}

impl CommunityGraph {
    pub fn node(&self, id: &str) -> Option<&CommunityNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn cruxes(&self) -> impl Iterator<Item = &CommunityNode> {
        self.nodes
            .iter()
            .filter(|n| n.classification == Classification::Crux)
    }

    /// Fraction of nodes classified as crux
    pub fn crux_fraction(&self) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        self.cruxes().count() as f64 / self.nodes.len() as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityConfig {
    pub crux_variance_threshold: f64,
    pub consensus_variance_threshold: f64,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            crux_variance_threshold: 0.3,
            consensus_variance_threshold: 0.1,
        }
    }
}

/// Cross-persona pairs worth sending to the comparison call, shallowest first
pub fn candidate_pairs<'a>(
    a: &'a PersonaQbaf,
    b: &'a PersonaQbaf,
    limit: usize,
) -> Vec<(&'a QbafNode, &'a QbafNode)> {
    let mut pairs: Vec<(&QbafNode, &QbafNode)> = a
        .nodes
        .iter()
        .flat_map(|x| b.nodes.iter().map(move |y| (x, y)))
        .collect();
    pairs.sort_by_key(|(x, y)| x.depth + y.depth);
    pairs.truncate(limit);
    pairs
}

fn sample_variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    Some(values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0))
}

fn classify(
    sources: usize,
    relationship: Option<ClaimRelationship>,
    variance: Option<f64>,
    config: &CommunityConfig,
) -> Classification {
    if sources < 2 {
        return Classification::Neutral;
    }
    if relationship == Some(ClaimRelationship::Opposition) {
        return Classification::Crux;
    }
    match variance {
        Some(v) if v > config.crux_variance_threshold => Classification::Crux,
        Some(v) if v < config.consensus_variance_threshold => Classification::Consensus,
        _ => Classification::Neutral,
    }
}

/// Merge `a` and `b` using the judged comparisons.
///
/// Pairs are matched greedily by descending confidence, each node used at
/// most once; comparisons naming unknown nodes are ignored. Unmatched nodes
/// become singletons. Edges are remapped onto community ids with self-loops
/// and duplicate `(from, to, type)` triples dropped.
pub fn build_community_graph(
    a: &PersonaQbaf,
    b: &PersonaQbaf,
    comparisons: &[ClaimComparison],
    config: &CommunityConfig,
) -> CommunityGraph {
    let mut ranked: Vec<&ClaimComparison> = comparisons
        .iter()
        .filter(|c| a.contains(&c.a_node_id) && b.contains(&c.b_node_id))
        .collect();
    ranked.sort_by(|x, y| y.confidence.total_cmp(&x.confidence));

    let mut used_a: HashSet<&str> = HashSet::new();
    let mut used_b: HashSet<&str> = HashSet::new();
    let mut matches: HashMap<&str, &ClaimComparison> = HashMap::new();
    for comparison in ranked {
        if used_a.contains(comparison.a_node_id.as_str())
            || used_b.contains(comparison.b_node_id.as_str())
        {
            continue;
        }
        used_a.insert(&comparison.a_node_id);
        used_b.insert(&comparison.b_node_id);
        matches.insert(&comparison.a_node_id, comparison);
    }

    // (persona side, source id) -> community id
    let mut mapping: HashMap<(usize, &str), String> = HashMap::new();
    let mut nodes: Vec<CommunityNode> = Vec::new();
    let mut node_types: Vec<NodeType> = Vec::new();

    for node in &a.nodes {
        let id = format!("c{}", nodes.len());
        mapping.insert((0, node.id.as_str()), id.clone());
        let mut merged_from = vec![SourceRef {
            persona_id: a.persona_id.clone(),
            node_id: node.id.clone(),
        }];
        let mut base_scores = BTreeMap::from([(a.persona_id.clone(), node.base_score)]);
        let mut scores = vec![node.base_score];
        let (relationship, shared_topic) = match matches.get(node.id.as_str()) {
            Some(comparison) => {
                if let Some(partner) = b.node(&comparison.b_node_id) {
                    mapping.insert((1, partner.id.as_str()), id.clone());
                    merged_from.push(SourceRef {
                        persona_id: b.persona_id.clone(),
                        node_id: partner.id.clone(),
                    });
                    base_scores.insert(b.persona_id.clone(), partner.base_score);
                    scores.push(partner.base_score);
                }
                (Some(comparison.relationship), comparison.shared_topic.clone())
            }
            None => (None, None),
        };
        let variance = sample_variance(&scores);
        nodes.push(CommunityNode {
            id,
            claim: node.claim.clone(),
            classification: classify(merged_from.len(), relationship, variance, config),
            merged_from,
            base_scores,
            community_strength: 0.0,
            variance,
            relationship,
            shared_topic,
        });
        node_types.push(node.node_type);
    }

    for node in b.nodes.iter().filter(|n| !used_b.contains(n.id.as_str())) {
        let id = format!("c{}", nodes.len());
        mapping.insert((1, node.id.as_str()), id.clone());
        nodes.push(CommunityNode {
            id,
            claim: node.claim.clone(),
            merged_from: vec![SourceRef {
                persona_id: b.persona_id.clone(),
                node_id: node.id.clone(),
            }],
            base_scores: BTreeMap::from([(b.persona_id.clone(), node.base_score)]),
            community_strength: 0.0,
            variance: None,
            relationship: None,
            shared_topic: None,
            classification: Classification::Neutral,
        });
        node_types.push(node.node_type);
    }

    let mut triples: HashSet<(String, String, EdgeType)> = HashSet::new();
    let mut edges: Vec<QbafEdge> = Vec::new();
    for (side, graph) in [(0usize, a), (1usize, b)] {
        for edge in &graph.edges {
            let (Some(from), Some(to)) = (
                mapping.get(&(side, edge.from.as_str())),
                mapping.get(&(side, edge.to.as_str())),
            ) else {
                continue;
            };
            if from == to || !triples.insert((from.clone(), to.clone(), edge.edge_type)) {
                continue;
            }
            edges.push(match edge.edge_type {
                EdgeType::Attack => QbafEdge::attack(from, to, edge.weight),
                EdgeType::Support => QbafEdge::support(from, to, edge.weight),
            });
        }
    }

    // Community strength: DF-QuAD over the merged structure with mean τ
    let merged = PersonaQbaf {
        persona_id: "community".to_string(),
        topic: a.topic.clone(),
        root_claim: a.root_claim.clone(),
        nodes: nodes
            .iter()
            .zip(&node_types)
            .map(|(n, t)| {
                let mean = n.base_scores.values().sum::<f64>() / n.base_scores.len().max(1) as f64;
                QbafNode::new(&n.id, &n.claim, *t, mean, "community")
            })
            .collect(),
        edges: edges.clone(),
        round: a.round.max(b.round),
    };
    let sigma = dfquad::strengths(&merged);
    for node in &mut nodes {
        node.community_strength = sigma.get(&node.id).copied().unwrap_or(0.0);
    }

    let graph = CommunityGraph {
        topic: a.topic.clone(),
        persona_ids: vec![a.persona_id.clone(), b.persona_id.clone()],
        nodes,
        edges,
    };
    tracing::info!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        cruxes = graph.cruxes().count(),
        "community graph built"
    );
    graph
}
