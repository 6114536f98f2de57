//! DF-QuAD strength propagation
//!
//! Pure numeric: no I/O, no randomness. Every entry point takes a graph by
//! reference and returns fresh values.

use std::collections::{HashMap, VecDeque};

use crate::qbaf::{EdgeType, PersonaQbaf};

/// Tolerance below which attack and support are considered balanced
pub const EPSILON: f64 = 1e-9;

/// Probabilistic-sum aggregation: "at least one is effective".
///
/// `aggregate(&[]) == 0.0` and the result is independent of order.
pub fn aggregate(strengths: &[f64]) -> f64 {
    1.0 - strengths.iter().map(|s| 1.0 - s).product::<f64>()
}

/// Combine a base score with aggregated attack `a` and support `s`
pub fn combine(base: f64, attack: f64, support: f64) -> f64 {
    let diff = attack - support;
    if diff.abs() < EPSILON {
        base
    } else if diff > 0.0 {
        base - base * diff
    } else {
        // base + (1 - base)·(-diff), written so full support lands exactly on 1
        1.0 - (1.0 - base) * (1.0 + diff)
    }
}

/// Node ids ordered so every edge source precedes its target.
///
/// Nodes caught in a cycle cannot be ordered; they are appended in
/// declaration order and logged.
pub fn topological_order(qbaf: &PersonaQbaf) -> Vec<String> {
    let mut in_degree: HashMap<&str, usize> =
        qbaf.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
    for edge in &qbaf.edges {
        if let Some(d) = in_degree.get_mut(edge.to.as_str()) {
            *d += 1;
        }
    }

    let mut queue: VecDeque<&str> = qbaf
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| in_degree[id] == 0)
        .collect();
    let mut order: Vec<String> = Vec::with_capacity(qbaf.nodes.len());
    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());
        for edge in qbaf.edges.iter().filter(|e| e.from == id) {
            if let Some(d) = in_degree.get_mut(edge.to.as_str()) {
                *d -= 1;
                if *d == 0 {
                    queue.push_back(edge.to.as_str());
                }
            }
        }
    }

    if order.len() < qbaf.nodes.len() {
        tracing::warn!(
            persona = %qbaf.persona_id,
            unordered = qbaf.nodes.len() - order.len(),
            "QBAF contains a cycle; evaluating remaining nodes in declaration order"
        );
        for node in &qbaf.nodes {
            if !order.contains(&node.id) {
                order.push(node.id.clone());
            }
        }
    }
    order
}

/// Dialectical strength of every node, keyed by id
pub fn strengths(qbaf: &PersonaQbaf) -> HashMap<String, f64> {
    let mut sigma: HashMap<String, f64> = qbaf
        .nodes
        .iter()
        .map(|n| (n.id.clone(), n.base_score))
        .collect();

    for id in topological_order(qbaf) {
        let Some(node) = qbaf.node(&id) else { continue };
        let mut attackers = Vec::new();
        let mut supporters = Vec::new();
        for edge in qbaf.incoming(&id) {
            let effective = sigma.get(&edge.from).copied().unwrap_or(0.0) * edge.weight;
            match edge.edge_type {
                EdgeType::Attack => attackers.push(effective),
                EdgeType::Support => supporters.push(effective),
            }
        }
        if attackers.is_empty() && supporters.is_empty() {
            continue;
        }
        let value = combine(node.base_score, aggregate(&attackers), aggregate(&supporters));
        sigma.insert(id, value.clamp(0.0, 1.0));
    }
    sigma
}

/// Copy of the graph with every node's dialectical strength recomputed
pub fn evaluate(qbaf: &PersonaQbaf) -> PersonaQbaf {
    let sigma = strengths(qbaf);
    let mut next = qbaf.clone();
    for node in &mut next.nodes {
        if let Some(s) = sigma.get(&node.id) {
            node.dialectical_strength = *s;
        }
    }
    next
}

/// Strength of `root_id` after a full recompute
pub fn strength_of(qbaf: &PersonaQbaf, root_id: &str) -> f64 {
    strengths(qbaf).get(root_id).copied().unwrap_or(0.0)
}

/// `|σ(root with n) − σ(root without n)|`, by removing `n` and its incident
/// edges and recomputing from scratch. Removing the root itself, or a node
/// that is absent, has no measurable impact.
pub fn counterfactual_impact(qbaf: &PersonaQbaf, node_id: &str, root_id: &str) -> f64 {
    if node_id == root_id || !qbaf.contains(node_id) {
        return 0.0;
    }
    let with = strength_of(qbaf, root_id);
    let without = strength_of(&qbaf.without_node(node_id), root_id);
    (with - without).abs()
}
