//! Derived statistics over a completed belief-graph run

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::community::CommunityGraph;
use crate::crux::StructuralCrux;

/// Default root-strength delta below which a round counts as settled
pub const DEFAULT_CONVERGENCE_THRESHOLD: f64 = 0.01;

/// One persona's run, as recorded by the pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonaTrajectory {
    pub persona_id: String,
    /// Root strength before round 1, then after each round
    pub root_strengths: Vec<f64>,
    pub initial_nodes: usize,
    pub final_nodes: usize,
    /// Sum of total base-score shift over all revisions
    pub revision_cost: f64,
}

impl PersonaTrajectory {
    pub fn initial_strength(&self) -> f64 {
        self.root_strengths.first().copied().unwrap_or(0.0)
    }

    pub fn final_strength(&self) -> f64 {
        self.root_strengths.last().copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkMetrics {
    pub root_strength_delta: BTreeMap<String, f64>,
    /// Change in the standard deviation of root strengths, final minus initial
    pub stance_divergence_delta: f64,
    pub revision_cost_per_node: BTreeMap<String, f64>,
    /// Fraction of community nodes classified crux
    pub crux_localization_rate: f64,
    /// Fraction of persona nodes matched with a node of the other persona
    pub argument_coverage: f64,
    /// Relative node growth per persona
    pub graph_growth_rate: BTreeMap<String, f64>,
    /// Largest per-persona counterfactual contribution of the top crux
    pub top_crux_sensitivity: Option<f64>,
    /// First round from which every persona's root moved less than the
    /// threshold, counting only rounds that stay settled until the end.
    ///
    /// A late shift resets it: root strengths `[0.5, 0.5, 0.5, 0.6]` with a
    /// threshold of 0.05 give `None`, not `Some(1)`, because round 3 moved.
    pub convergence_round: Option<usize>,
    pub rounds: usize,
}

fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Round `r` (1-based) converged when every persona's `|σ_r − σ_{r−1}|` is
/// below `threshold` at `r` and at every later round
fn convergence_round(trajectories: &[PersonaTrajectory], threshold: f64) -> Option<usize> {
    let rounds = trajectories
        .iter()
        .map(|t| t.root_strengths.len().saturating_sub(1))
        .min()?;
    let settled = |r: usize| {
        trajectories
            .iter()
            .all(|t| (t.root_strengths[r] - t.root_strengths[r - 1]).abs() < threshold)
    };
    let mut first = None;
    for r in (1..=rounds).rev() {
        if !settled(r) {
            break;
        }
        first = Some(r);
    }
    first
}

pub fn aggregate_benchmarks(
    trajectories: &[PersonaTrajectory],
    community: &CommunityGraph,
    cruxes: &[StructuralCrux],
    convergence_threshold: f64,
) -> BenchmarkMetrics {
    let initial: Vec<f64> = trajectories.iter().map(|t| t.initial_strength()).collect();
    let last: Vec<f64> = trajectories.iter().map(|t| t.final_strength()).collect();

    let source_count: usize = community.nodes.iter().map(|n| n.merged_from.len()).sum();
    let matched_count: usize = community
        .nodes
        .iter()
        .filter(|n| n.is_merged())
        .map(|n| n.merged_from.len())
        .sum();

    let metrics = BenchmarkMetrics {
        root_strength_delta: trajectories
            .iter()
            .map(|t| (t.persona_id.clone(), t.final_strength() - t.initial_strength()))
            .collect(),
        stance_divergence_delta: std_dev(&last) - std_dev(&initial),
        revision_cost_per_node: trajectories
            .iter()
            .map(|t| (t.persona_id.clone(), t.revision_cost / t.final_nodes.max(1) as f64))
            .collect(),
        crux_localization_rate: community.crux_fraction(),
        argument_coverage: if source_count == 0 {
            0.0
        } else {
            matched_count as f64 / source_count as f64
        },
        graph_growth_rate: trajectories
            .iter()
            .map(|t| {
                let growth = t.final_nodes as f64 - t.initial_nodes as f64;
                (t.persona_id.clone(), growth / t.initial_nodes.max(1) as f64)
            })
            .collect(),
        top_crux_sensitivity: cruxes.first().map(|c| {
            c.persona_positions
                .values()
                .map(|p| p.contribution)
                .fold(0.0, f64::max)
        }),
        convergence_round: convergence_round(trajectories, convergence_threshold),
        rounds: trajectories
            .iter()
            .map(|t| t.root_strengths.len().saturating_sub(1))
            .max()
            .unwrap_or(0),
    };
    tracing::debug!(?metrics, "benchmarks aggregated");
    metrics
}
