//! Crux-candidate extraction from a qualitative argument graph
//!
//! Strategies are tried in order and the first non-empty tier wins:
//! assumptions behind contested arguments, UNDEC claims, most-attacked claims,
//! then highest-degree claims.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use agora_core::{ArgumentGraph, ArgumentId};

/// Strategy that produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CruxSource {
    SymmetricAssumption,
    UndecidedArgument,
    MostAttacked,
    Centrality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CruxCandidate {
    pub claim: String,
    pub source: CruxSource,
    /// Arguments the candidate was drawn from
    pub argument_ids: Vec<ArgumentId>,
}

/// Maximum candidates returned from the ranked tiers
const RANKED_LIMIT: usize = 3;

pub fn extract_crux_candidates(graph: &ArgumentGraph) -> Vec<CruxCandidate> {
    let tiers: [fn(&ArgumentGraph) -> Vec<CruxCandidate>; 4] =
        [symmetric_assumptions, undecided_claims, most_attacked, most_central];
    for tier in tiers {
        let candidates = tier(graph);
        if !candidates.is_empty() {
            tracing::debug!(source = ?candidates[0].source, count = candidates.len(), "crux candidates extracted");
            return candidates;
        }
    }
    Vec::new()
}

fn symmetric_assumptions(graph: &ArgumentGraph) -> Vec<CruxCandidate> {
    let frontier = graph.contested_frontier();
    let mut candidates: Vec<CruxCandidate> = Vec::new();
    for argument in graph.arguments.iter().filter(|a| frontier.contains(&a.id)) {
        for assumption in &argument.assumptions {
            match candidates.iter_mut().find(|c| &c.claim == assumption) {
                Some(existing) => existing.argument_ids.push(argument.id.clone()),
                None => candidates.push(CruxCandidate {
                    claim: assumption.clone(),
                    source: CruxSource::SymmetricAssumption,
                    argument_ids: vec![argument.id.clone()],
                }),
            }
        }
    }
    candidates
}

fn undecided_claims(graph: &ArgumentGraph) -> Vec<CruxCandidate> {
    graph
        .undecided()
        .into_iter()
        .map(|a| CruxCandidate {
            claim: a.claim.clone(),
            source: CruxSource::UndecidedArgument,
            argument_ids: vec![a.id.clone()],
        })
        .collect()
}

/// Rank arguments by a per-argument count, keeping declaration order on ties
fn ranked(
    graph: &ArgumentGraph,
    counts: &BTreeMap<&str, usize>,
    source: CruxSource,
) -> Vec<CruxCandidate> {
    let mut scored: Vec<(usize, usize)> = graph
        .arguments
        .iter()
        .enumerate()
        .filter_map(|(i, a)| counts.get(a.id.as_str()).map(|&c| (i, c)))
        .filter(|&(_, c)| c > 0)
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    scored
        .into_iter()
        .take(RANKED_LIMIT)
        .map(|(i, _)| {
            let argument = &graph.arguments[i];
            CruxCandidate {
                claim: argument.claim.clone(),
                source,
                argument_ids: vec![argument.id.clone()],
            }
        })
        .collect()
}

fn most_attacked(graph: &ArgumentGraph) -> Vec<CruxCandidate> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for attack in graph.valid_attacks() {
        *counts.entry(attack.to_arg_id.as_str()).or_default() += 1;
    }
    ranked(graph, &counts, CruxSource::MostAttacked)
}

fn most_central(graph: &ArgumentGraph) -> Vec<CruxCandidate> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for attack in &graph.attacks {
        *counts.entry(attack.from_arg_id.as_str()).or_default() += 1;
        *counts.entry(attack.to_arg_id.as_str()).or_default() += 1;
    }
    ranked(graph, &counts, CruxSource::Centrality)
}
