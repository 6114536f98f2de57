//! Structural crux identification over a community graph

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use agora_core::{dfquad, PersonaQbaf};

use crate::community::{CommunityGraph, CommunityNode};

/// Bonus added to crux scores of nodes merged from both personas
const MERGE_BONUS: f64 = 0.1;
/// Base-score variance above which a crux is a base-score disagreement
const BASE_SCORE_VARIANCE: f64 = 0.05;
/// Impact difference above which a crux is a structural disagreement
const IMPACT_DIFFERENCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisagreementType {
    BaseScore,
    EdgeStructure,
    Both,
}

/// Where one persona stands on a crux
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaPosition {
    pub base_score: f64,
    pub dialectical_strength: f64,
    /// Counterfactual impact of the node on the persona's own root
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralCrux {
    pub id: String,
    /// Community node id
    pub node_id: String,
    pub claim: String,
    pub crux_score: f64,
    pub disagreement_type: DisagreementType,
    pub persona_positions: BTreeMap<String, PersonaPosition>,
    /// Human-readable counterfactual summary
    pub counterfactual: String,
    /// Filled in later by a free-text call; absent when that call fails
    pub settling_question: Option<String>,
}

/// Impact on `qbaf`'s root of the node's sources belonging to that persona
fn persona_position(
    node: &CommunityNode,
    qbaf: &PersonaQbaf,
    evaluated: &PersonaQbaf,
) -> Option<PersonaPosition> {
    let root = qbaf.root()?.id.clone();
    let sources: Vec<&str> = node
        .merged_from
        .iter()
        .filter(|s| s.persona_id == qbaf.persona_id)
        .map(|s| s.node_id.as_str())
        .collect();
    let first = evaluated.node(sources.first()?)?;
    let contribution = sources
        .iter()
        .map(|id| dfquad::counterfactual_impact(qbaf, id, &root))
        .sum::<f64>();
    Some(PersonaPosition {
        base_score: first.base_score,
        dialectical_strength: first.dialectical_strength,
        contribution,
    })
}

fn disagreement_type(variance: f64, impact_difference: f64) -> DisagreementType {
    match (
        variance > BASE_SCORE_VARIANCE,
        impact_difference > IMPACT_DIFFERENCE,
    ) {
        (true, true) => DisagreementType::Both,
        (false, true) => DisagreementType::EdgeStructure,
        _ => DisagreementType::BaseScore,
    }
}

/// Score every crux-classified community node and return the top `top_k`.
///
/// `cruxScore = |impactA − impactB|`, plus 0.1 when both personas
/// contributed a source node. Ties are broken by community node id.
pub fn identify_cruxes(
    community: &CommunityGraph,
    a: &PersonaQbaf,
    b: &PersonaQbaf,
    top_k: usize,
) -> Vec<StructuralCrux> {
    let evaluated_a = dfquad::evaluate(a);
    let evaluated_b = dfquad::evaluate(b);

    let mut scored: Vec<StructuralCrux> = community
        .cruxes()
        .map(|node| {
            let mut positions = BTreeMap::new();
            let impact_a = persona_position(node, a, &evaluated_a)
                .map(|p| {
                    let c = p.contribution;
                    positions.insert(a.persona_id.clone(), p);
                    c
                })
                .unwrap_or(0.0);
            let impact_b = persona_position(node, b, &evaluated_b)
                .map(|p| {
                    let c = p.contribution;
                    positions.insert(b.persona_id.clone(), p);
                    c
                })
                .unwrap_or(0.0);

            let difference = (impact_a - impact_b).abs();
            let bonus = if node.is_merged() { MERGE_BONUS } else { 0.0 };
            StructuralCrux {
                id: String::new(),
                node_id: node.id.clone(),
                claim: node.claim.clone(),
                crux_score: difference + bonus,
                disagreement_type: disagreement_type(node.variance.unwrap_or(0.0), difference),
                persona_positions: positions,
                counterfactual: format!(
                    "Removing \"{}\" shifts {}'s thesis by {:.3} and {}'s by {:.3}",
                    node.claim, a.persona_id, impact_a, b.persona_id, impact_b
                ),
                settling_question: None,
            }
        })
        .collect();

    scored.sort_by(|x, y| {
        y.crux_score
            .total_cmp(&x.crux_score)
            .then_with(|| x.node_id.cmp(&y.node_id))
    });
    scored.truncate(top_k);
    for (rank, crux) in scored.iter_mut().enumerate() {
        crux.id = format!("crux-{}", rank + 1);
    }

    metrics::counter!("agora_cruxes_identified_total").increment(scored.len() as u64);
    tracing::info!(count = scored.len(), "structural cruxes identified");
    scored
}
