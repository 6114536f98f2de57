//! Belief revision: minimally perturb base scores until the root's
//! propagated strength approaches a target.
//!
//! The search is coordinate-wise: every classified node is nudged each
//! iteration in the direction that closes the gap, scaled by its proximity
//! to the root. `combine` is non-smooth at `attack == support`, so no
//! closed-form solve is attempted.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::dfquad;
use crate::qbaf::{EdgeType, NodeType, PersonaQbaf};

/// Tuning for [`revise_beliefs`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionConfig {
    /// Base-score step per iteration before priority scaling
    pub step_size: f64,
    /// Stop once |target − σ(root)| falls below this
    pub epsilon: f64,
    pub max_iterations: u32,
    /// Largest root-strength move allowed per round when deriving a target
    pub max_round_shift: f64,
    /// Nodes moving less than this are left out of the shift report
    pub report_threshold: f64,
}

impl Default for RevisionConfig {
    fn default() -> Self {
        Self {
            step_size: 0.02,
            epsilon: 0.01,
            max_iterations: 50,
            max_round_shift: 0.2,
            report_threshold: 0.001,
        }
    }
}

/// Damp a raw judgment by the persona's revision resistance `R`:
/// `σ_current + (1 − R)·(σ_raw − σ_current)`, with the move clamped to
/// `±max_shift`.
pub fn revision_target(current: f64, raw: f64, resistance: f64, max_shift: f64) -> f64 {
    let resistance = resistance.clamp(0.0, 1.0);
    let delta = ((1.0 - resistance) * (raw - current)).clamp(-max_shift, max_shift);
    (current + delta).clamp(0.0, 1.0)
}

/// Effect of raising a node's base score on the root's strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Every path to the root crosses an even number of attacks
    Positive,
    /// Every path crosses an odd number of attacks
    Negative,
    /// Mixed parities, or no path to the root
    Neutral,
}

const EVEN: u8 = 0b01;
const ODD: u8 = 0b10;

/// Polarity of every non-root node
pub fn classify_polarity(qbaf: &PersonaQbaf) -> HashMap<String, Polarity> {
    let Some(root) = qbaf.root() else {
        return HashMap::new();
    };
    let mut memo: HashMap<String, u8> = HashMap::from([(root.id.clone(), EVEN)]);
    let mut visiting = HashSet::new();

    qbaf.nodes
        .iter()
        .filter(|n| n.node_type != NodeType::Root)
        .map(|n| {
            let mask = path_parities(qbaf, &n.id, &mut memo, &mut visiting);
            let polarity = match mask {
                EVEN => Polarity::Positive,
                ODD => Polarity::Negative,
                _ => Polarity::Neutral,
            };
            (n.id.clone(), polarity)
        })
        .collect()
}

/// Bitmask of attack-count parities over all paths from `id` to the root
fn path_parities(
    qbaf: &PersonaQbaf,
    id: &str,
    memo: &mut HashMap<String, u8>,
    visiting: &mut HashSet<String>,
) -> u8 {
    if let Some(mask) = memo.get(id) {
        return *mask;
    }
    if !visiting.insert(id.to_string()) {
        return 0;
    }
    let mut mask = 0;
    for edge in qbaf.edges.iter().filter(|e| e.from == id) {
        let downstream = path_parities(qbaf, &edge.to, memo, visiting);
        mask |= match edge.edge_type {
            EdgeType::Support => downstream,
            EdgeType::Attack => ((downstream & EVEN) << 1) | ((downstream & ODD) >> 1),
        };
    }
    visiting.remove(id);
    memo.insert(id.to_string(), mask);
    mask
}

/// Why the revision loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Converged,
    MaxIterations,
    /// No node has a definite polarity, so nothing can move the root
    NoMovableNodes,
}

/// Outcome of one revision, including its auditable cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionResult {
    /// Revised, re-evaluated graph
    pub qbaf: PersonaQbaf,
    pub target: f64,
    pub initial_strength: f64,
    pub final_strength: f64,
    pub iterations: u32,
    pub stop_reason: StopReason,
    /// Σ|Δτ| over all nodes
    pub total_shift: f64,
    /// Signed Δτ of nodes that moved more than the report threshold
    pub shifts: BTreeMap<String, f64>,
}

impl RevisionResult {
    pub fn converged(&self) -> bool {
        self.stop_reason == StopReason::Converged
    }
}

/// Nudge non-root base scores until σ(root) is within `epsilon` of `target`
/// or the iteration budget runs out
pub fn revise_beliefs(qbaf: &PersonaQbaf, target: f64, config: &RevisionConfig) -> RevisionResult {
    let target = target.clamp(0.0, 1.0);
    let Some(root_id) = qbaf.root().map(|r| r.id.clone()) else {
        let evaluated = dfquad::evaluate(qbaf);
        return RevisionResult {
            qbaf: evaluated,
            target,
            initial_strength: 0.0,
            final_strength: 0.0,
            iterations: 0,
            stop_reason: StopReason::NoMovableNodes,
            total_shift: 0.0,
            shifts: BTreeMap::new(),
        };
    };

    let polarity = classify_polarity(qbaf);
    let movable: Vec<(String, f64, f64)> = qbaf
        .nodes
        .iter()
        .filter_map(|n| {
            let sign = match polarity.get(&n.id)? {
                Polarity::Positive => 1.0,
                Polarity::Negative => -1.0,
                Polarity::Neutral => return None,
            };
            Some((n.id.clone(), sign, 1.0 / (n.depth as f64 + 1.0)))
        })
        .collect();

    let initial_strength = dfquad::strength_of(qbaf, &root_id);
    let mut working = qbaf.clone();
    let mut iterations = 0;
    let stop_reason = loop {
        let gap = target - dfquad::strength_of(&working, &root_id);
        if gap.abs() < config.epsilon {
            break StopReason::Converged;
        }
        if movable.is_empty() {
            break StopReason::NoMovableNodes;
        }
        if iterations >= config.max_iterations {
            break StopReason::MaxIterations;
        }
        iterations += 1;

        let direction = gap.signum();
        for (id, sign, priority) in &movable {
            if let Some(node) = working.node_mut(id) {
                let step = direction * sign * config.step_size * priority;
                node.base_score = (node.base_score + step).clamp(0.0, 1.0);
            }
        }
    };

    let revised = dfquad::evaluate(&working);
    let original = qbaf.base_scores();
    let mut total_shift = 0.0;
    let mut shifts = BTreeMap::new();
    for node in &revised.nodes {
        let delta = node.base_score - original.get(&node.id).copied().unwrap_or(node.base_score);
        total_shift += delta.abs();
        if delta.abs() > config.report_threshold {
            shifts.insert(node.id.clone(), delta);
        }
    }

    let final_strength = revised.root_strength();
    tracing::debug!(
        persona = %qbaf.persona_id,
        iterations,
        ?stop_reason,
        initial_strength,
        final_strength,
        target,
        total_shift,
        "belief revision finished"
    );
    metrics::counter!("agora_revision_iterations_total").increment(iterations as u64);

    RevisionResult {
        qbaf: revised,
        target,
        initial_strength,
        final_strength,
        iterations,
        stop_reason,
        total_shift,
        shifts,
    }
}
