//! Argument graph store with value-semantics structural edits
//!
//! Every edit borrows the current graph and returns a new one. Derived fields
//! (`labelling`, `grounded_extension`, `preferred_extensions`) are stale after
//! an edit until [`ArgumentGraph::recompute_semantics`] is called.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::argument::{Argument, ArgumentId, Attack, AttackId, ValidationResult};
use crate::semantics::{DefeatFramework, Label, Semantics, DEFAULT_SEARCH_LIMIT};

/// Qualitative argumentation state for one debate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgumentGraph {
    pub topic: String,
    pub arguments: Vec<Argument>,
    pub attacks: Vec<Attack>,
    pub validation_results: Vec<ValidationResult>,
    pub labelling: BTreeMap<ArgumentId, Label>,
    pub grounded_extension: BTreeSet<ArgumentId>,
    pub preferred_extensions: Vec<BTreeSet<ArgumentId>>,
    /// Set when the preferred search was capped and only grounded is reported
    #[serde(default)]
    pub semantics_approximated: bool,
}

/// Structural difference between two graph snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDelta {
    pub added_arguments: Vec<Argument>,
    pub removed_arguments: Vec<ArgumentId>,
    pub added_attacks: Vec<Attack>,
    pub removed_attacks: Vec<AttackId>,
}

impl GraphDelta {
    pub fn is_empty(&self) -> bool {
        self.added_arguments.is_empty()
            && self.removed_arguments.is_empty()
            && self.added_attacks.is_empty()
            && self.removed_attacks.is_empty()
    }
}

impl ArgumentGraph {
    /// Create an empty graph for a topic
    pub fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            ..Default::default()
        }
    }

    pub fn argument(&self, id: &str) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.id == id)
    }

    pub fn attack(&self, id: &str) -> Option<&Attack> {
        self.attacks.iter().find(|a| a.id == id)
    }

    pub fn contains_argument(&self, id: &str) -> bool {
        self.argument(id).is_some()
    }

    /// Append arguments; ids already present are ignored
    pub fn add_arguments(&self, arguments: impl IntoIterator<Item = Argument>) -> Self {
        let mut next = self.clone();
        let mut seen: HashSet<ArgumentId> = next.arguments.iter().map(|a| a.id.clone()).collect();
        for argument in arguments {
            if seen.insert(argument.id.clone()) {
                next.arguments.push(argument);
            } else {
                tracing::debug!(id = %argument.id, "dropping duplicate argument");
            }
        }
        next
    }

    /// Append attacks, dropping dangling references, self-loops and duplicate ids
    pub fn add_attacks(&self, attacks: impl IntoIterator<Item = Attack>) -> Self {
        let mut next = self.clone();
        let mut seen: HashSet<AttackId> = next.attacks.iter().map(|a| a.id.clone()).collect();
        for attack in attacks {
            if attack.is_self_loop() {
                tracing::debug!(id = %attack.id, "dropping self-loop attack");
                continue;
            }
            if !next.contains_argument(&attack.from_arg_id)
                || !next.contains_argument(&attack.to_arg_id)
            {
                tracing::debug!(
                    id = %attack.id,
                    from = %attack.from_arg_id,
                    to = %attack.to_arg_id,
                    "dropping attack with dangling argument reference"
                );
                continue;
            }
            if seen.insert(attack.id.clone()) {
                next.attacks.push(attack);
            }
        }
        next
    }

    /// Record validation results; later results for the same attack win and
    /// results for unknown attacks are dropped
    pub fn add_validations(&self, results: impl IntoIterator<Item = ValidationResult>) -> Self {
        let mut next = self.clone();
        for result in results {
            if next.attack(&result.attack_id).is_none() {
                tracing::debug!(attack = %result.attack_id, "dropping validation for unknown attack");
                continue;
            }
            next.validation_results
                .retain(|existing| existing.attack_id != result.attack_id);
            next.validation_results.push(result);
        }
        next
    }

    /// Narrow an argument in place (a speaker refining their own position)
    pub fn update_argument(
        &self,
        id: &str,
        claim: Option<&str>,
        assumptions: Option<Vec<String>>,
    ) -> Self {
        let mut next = self.clone();
        if let Some(argument) = next.arguments.iter_mut().find(|a| a.id == id) {
            if let Some(claim) = claim {
                argument.claim = claim.to_string();
            }
            if let Some(assumptions) = assumptions {
                argument.assumptions = assumptions;
            }
        }
        next
    }

    /// Remove an argument together with every attack touching it
    pub fn remove_argument(&self, id: &str) -> Self {
        let mut next = self.clone();
        next.arguments.retain(|a| a.id != id);
        let removed: HashSet<AttackId> = next
            .attacks
            .iter()
            .filter(|a| a.from_arg_id == id || a.to_arg_id == id)
            .map(|a| a.id.clone())
            .collect();
        next.attacks.retain(|a| !removed.contains(&a.id));
        next.validation_results
            .retain(|v| !removed.contains(&v.attack_id));
        next
    }

    pub fn remove_attack(&self, id: &str) -> Self {
        let mut next = self.clone();
        next.attacks.retain(|a| a.id != id);
        next.validation_results.retain(|v| v.attack_id != id);
        next
    }

    /// Attacks with a `valid = true` validation result
    pub fn valid_attacks(&self) -> Vec<&Attack> {
        let valid: HashSet<&str> = self
            .validation_results
            .iter()
            .filter(|v| v.valid)
            .map(|v| v.attack_id.as_str())
            .collect();
        self.attacks
            .iter()
            .filter(|a| valid.contains(a.id.as_str()))
            .collect()
    }

    /// Arguments defeating `id` through a valid attack
    pub fn defeaters_of(&self, id: &str) -> Vec<&Argument> {
        self.valid_attacks()
            .into_iter()
            .filter(|a| a.to_arg_id == id)
            .filter_map(|a| self.argument(&a.from_arg_id))
            .collect()
    }

    pub fn defeat_framework(&self) -> DefeatFramework {
        DefeatFramework::new(
            self.arguments.iter().map(|a| a.id.clone()),
            self.valid_attacks()
                .into_iter()
                .map(|a| (a.from_arg_id.clone(), a.to_arg_id.clone())),
        )
    }

    /// Rebuild labelling and extensions from arguments and valid attacks
    pub fn recompute_semantics(&self) -> Self {
        self.recompute_semantics_with(DEFAULT_SEARCH_LIMIT)
    }

    pub fn recompute_semantics_with(&self, search_limit: usize) -> Self {
        let semantics = Semantics::compute(&self.defeat_framework(), search_limit);
        Self {
            labelling: semantics.labelling,
            grounded_extension: semantics.grounded_extension,
            preferred_extensions: semantics.preferred_extensions,
            semantics_approximated: semantics.approximated,
            ..self.clone()
        }
    }

    pub fn label_of(&self, id: &str) -> Option<Label> {
        self.labelling.get(id).copied()
    }

    /// Arguments in some but not all preferred extensions
    pub fn contested_frontier(&self) -> BTreeSet<ArgumentId> {
        if self.preferred_extensions.len() < 2 {
            return BTreeSet::new();
        }
        self.arguments
            .iter()
            .filter(|a| {
                let hits = self
                    .preferred_extensions
                    .iter()
                    .filter(|ext| ext.contains(&a.id))
                    .count();
                hits > 0 && hits < self.preferred_extensions.len()
            })
            .map(|a| a.id.clone())
            .collect()
    }

    /// Arguments labelled UNDEC
    pub fn undecided(&self) -> Vec<&Argument> {
        self.arguments
            .iter()
            .filter(|a| self.label_of(&a.id) == Some(Label::Undec))
            .collect()
    }

    /// Structural changes from `previous` to `self`
    pub fn diff(&self, previous: &ArgumentGraph) -> GraphDelta {
        let before_args: HashMap<&str, &Argument> =
            previous.arguments.iter().map(|a| (a.id.as_str(), a)).collect();
        let after_args: HashSet<&str> = self.arguments.iter().map(|a| a.id.as_str()).collect();
        let before_attacks: HashSet<&str> = previous.attacks.iter().map(|a| a.id.as_str()).collect();
        let after_attacks: HashSet<&str> = self.attacks.iter().map(|a| a.id.as_str()).collect();

        GraphDelta {
            added_arguments: self
                .arguments
                .iter()
                .filter(|a| !before_args.contains_key(a.id.as_str()))
                .cloned()
                .collect(),
            removed_arguments: previous
                .arguments
                .iter()
                .filter(|a| !after_args.contains(a.id.as_str()))
                .map(|a| a.id.clone())
                .collect(),
            added_attacks: self
                .attacks
                .iter()
                .filter(|a| !before_attacks.contains(a.id.as_str()))
                .cloned()
                .collect(),
            removed_attacks: previous
                .attacks
                .iter()
                .filter(|a| !after_attacks.contains(a.id.as_str()))
                .map(|a| a.id.clone())
                .collect(),
        }
    }
}
