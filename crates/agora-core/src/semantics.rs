//! Dung-style acceptability semantics over a defeat relation
//!
//! Arguments are interned into dense indices so the fixpoint and the
//! backtracking search work on plain vectors. Identifiers only reappear in
//! the [`Semantics`] result.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::argument::ArgumentId;

/// Default cap on backtracking steps for the preferred-extension search
pub const DEFAULT_SEARCH_LIMIT: usize = 50_000;

/// Acceptability label of a single argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    In,
    Out,
    Undec,
}

/// Abstract argumentation framework: arguments plus a defeat relation
#[derive(Debug, Clone, Default)]
pub struct DefeatFramework {
    ids: Vec<ArgumentId>,
    /// attackers[i] = indices of arguments defeating i
    attackers: Vec<Vec<usize>>,
    /// targets[i] = indices of arguments i defeats
    targets: Vec<Vec<usize>>,
}

impl DefeatFramework {
    /// Build a framework. Defeats naming unknown arguments are ignored.
    pub fn new<I, D>(ids: I, defeats: D) -> Self
    where
        I: IntoIterator<Item = ArgumentId>,
        D: IntoIterator<Item = (ArgumentId, ArgumentId)>,
    {
        let ids: Vec<ArgumentId> = ids.into_iter().collect();
        let index: HashMap<&str, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut attackers = vec![Vec::new(); ids.len()];
        let mut targets = vec![Vec::new(); ids.len()];
        for (from, to) in defeats {
            if let (Some(&f), Some(&t)) = (index.get(from.as_str()), index.get(to.as_str())) {
                if !attackers[t].contains(&f) {
                    attackers[t].push(f);
                    targets[f].push(t);
                }
            }
        }

        Self {
            ids,
            attackers,
            targets,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Grounded labelling as the least fixpoint of the characteristic function.
    ///
    /// An argument becomes IN once all its defeaters are OUT and OUT once any
    /// defeater is IN. Labels never move back, so the loop runs at most
    /// `len() + 1` sweeps.
    pub fn grounded_labels(&self) -> Vec<Label> {
        let mut labels = vec![Label::Undec; self.len()];
        loop {
            let mut changed = false;
            for i in 0..self.len() {
                if labels[i] != Label::Undec {
                    continue;
                }
                let defeaters = &self.attackers[i];
                if defeaters.iter().all(|&a| labels[a] == Label::Out) {
                    labels[i] = Label::In;
                    changed = true;
                } else if defeaters.iter().any(|&a| labels[a] == Label::In) {
                    labels[i] = Label::Out;
                    changed = true;
                }
            }
            if !changed {
                return labels;
            }
        }
    }

    /// All preferred extensions, or `None` if the search exceeded `limit` steps.
    ///
    /// The grounded extension is contained in every preferred extension and
    /// everything it defeats is excluded from all of them, so only the
    /// grounded-UNDEC arguments are branched on.
    pub fn preferred_indices(&self, limit: usize) -> Option<Vec<Vec<bool>>> {
        let grounded = self.grounded_labels();
        let mut members: Vec<bool> = grounded.iter().map(|l| *l == Label::In).collect();
        let undecided: Vec<usize> = grounded
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == Label::Undec)
            .map(|(i, _)| i)
            .collect();

        let mut search = Search {
            framework: self,
            undecided: &undecided,
            limit,
            steps: 0,
            admissible: Vec::new(),
        };
        if !search.explore(0, &mut members) {
            return None;
        }
        tracing::debug!(
            steps = search.steps,
            admissible = search.admissible.len(),
            "preferred extension search finished"
        );

        let candidates = search.admissible;
        let maximal = candidates
            .iter()
            .filter(|c| !candidates.iter().any(|other| is_proper_subset(c, other)))
            .cloned()
            .collect();
        Some(maximal)
    }

    fn is_conflict_free_with(&self, members: &[bool], candidate: usize) -> bool {
        if self.attackers[candidate].contains(&candidate) {
            return false;
        }
        !self.attackers[candidate].iter().any(|&a| members[a])
            && !self.targets[candidate].iter().any(|&t| members[t])
    }

    fn is_admissible(&self, members: &[bool]) -> bool {
        members.iter().enumerate().filter(|(_, m)| **m).all(|(i, _)| {
            self.attackers[i]
                .iter()
                .all(|&attacker| self.attackers[attacker].iter().any(|&d| members[d]))
        })
    }

    fn to_set(&self, members: &[bool]) -> BTreeSet<ArgumentId> {
        members
            .iter()
            .enumerate()
            .filter(|(_, m)| **m)
            .map(|(i, _)| self.ids[i].clone())
            .collect()
    }
}

struct Search<'a> {
    framework: &'a DefeatFramework,
    undecided: &'a [usize],
    limit: usize,
    steps: usize,
    admissible: Vec<Vec<bool>>,
}

impl Search<'_> {
    /// Returns false once the step budget is exhausted.
    fn explore(&mut self, pos: usize, members: &mut Vec<bool>) -> bool {
        self.steps += 1;
        if self.steps > self.limit {
            return false;
        }
        if pos == self.undecided.len() {
            if self.framework.is_admissible(members) {
                self.admissible.push(members.clone());
            }
            return true;
        }

        let candidate = self.undecided[pos];
        if self.framework.is_conflict_free_with(members, candidate) {
            members[candidate] = true;
            let within_budget = self.explore(pos + 1, members);
            members[candidate] = false;
            if !within_budget {
                return false;
            }
        }
        self.explore(pos + 1, members)
    }
}

fn is_proper_subset(a: &[bool], b: &[bool]) -> bool {
    a != b && a.iter().zip(b).all(|(x, y)| !*x || *y)
}

/// Full semantic picture of a framework
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Semantics {
    pub labelling: BTreeMap<ArgumentId, Label>,
    pub grounded_extension: BTreeSet<ArgumentId>,
    pub preferred_extensions: Vec<BTreeSet<ArgumentId>>,
    /// True when the preferred search hit its cap and fell back to grounded
    pub approximated: bool,
}

impl Semantics {
    /// Compute grounded and preferred extensions plus the combined labelling.
    ///
    /// An argument is IN when it belongs to every preferred extension, OUT
    /// when it belongs to none, and UNDEC otherwise. When the search is
    /// capped the grounded labelling is reported as is, since the grounded
    /// extension stands in for the unknown preferred ones.
    pub fn compute(framework: &DefeatFramework, search_limit: usize) -> Self {
        let grounded = framework.grounded_labels();
        let grounded_members: Vec<bool> = grounded.iter().map(|l| *l == Label::In).collect();
        let grounded_extension = framework.to_set(&grounded_members);

        let (preferred, approximated) = match framework.preferred_indices(search_limit) {
            Some(extensions) => (extensions, false),
            None => {
                tracing::warn!(
                    arguments = framework.len(),
                    search_limit,
                    "preferred extension search capped, falling back to grounded extension"
                );
                metrics::counter!("agora_preferred_search_fallbacks_total").increment(1);
                (vec![grounded_members], true)
            }
        };

        let labelling = (0..framework.len())
            .map(|i| {
                let label = if approximated {
                    grounded[i]
                } else {
                    let hits = preferred.iter().filter(|members| members[i]).count();
                    if hits == preferred.len() {
                        Label::In
                    } else if hits == 0 {
                        Label::Out
                    } else {
                        Label::Undec
                    }
                };
                (framework.ids[i].clone(), label)
            })
            .collect();

        Self {
            labelling,
            grounded_extension,
            preferred_extensions: preferred.iter().map(|m| framework.to_set(m)).collect(),
            approximated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framework(ids: &[&str], defeats: &[(&str, &str)]) -> DefeatFramework {
        DefeatFramework::new(
            ids.iter().map(|s| s.to_string()),
            defeats.iter().map(|(a, b)| (a.to_string(), b.to_string())),
        )
    }

    fn set(ids: &[&str]) -> BTreeSet<ArgumentId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unattacked_argument_is_in() {
        let semantics = Semantics::compute(&framework(&["A"], &[]), DEFAULT_SEARCH_LIMIT);
        assert_eq!(semantics.grounded_extension, set(&["A"]));
        assert_eq!(semantics.labelling["A"], Label::In);
    }

    #[test]
    fn test_single_defeat() {
        let semantics =
            Semantics::compute(&framework(&["A", "B"], &[("B", "A")]), DEFAULT_SEARCH_LIMIT);
        assert_eq!(semantics.grounded_extension, set(&["B"]));
        assert_eq!(semantics.labelling["A"], Label::Out);
        assert_eq!(semantics.labelling["B"], Label::In);
        assert_eq!(semantics.preferred_extensions, vec![set(&["B"])]);
    }

    #[test]
    fn test_reinstatement_chain() {
        // C defeats B, B defeats A: A is reinstated
        let fw = framework(&["A", "B", "C"], &[("B", "A"), ("C", "B")]);
        let semantics = Semantics::compute(&fw, DEFAULT_SEARCH_LIMIT);
        assert_eq!(semantics.grounded_extension, set(&["A", "C"]));
        assert_eq!(semantics.labelling["B"], Label::Out);
    }

    #[test]
    fn test_mutual_attack_has_two_preferred_extensions() {
        let fw = framework(&["A", "B", "C"], &[("A", "B"), ("B", "A"), ("A", "C"), ("B", "C")]);
        let semantics = Semantics::compute(&fw, DEFAULT_SEARCH_LIMIT);

        assert!(semantics.grounded_extension.is_empty());
        assert_eq!(semantics.preferred_extensions.len(), 2);
        assert!(semantics.preferred_extensions.contains(&set(&["A"])));
        assert!(semantics.preferred_extensions.contains(&set(&["B"])));
        assert_eq!(semantics.labelling["A"], Label::Undec);
        assert_eq!(semantics.labelling["B"], Label::Undec);
        // Defeated under both readings
        assert_eq!(semantics.labelling["C"], Label::Out);
    }

    #[test]
    fn test_odd_cycle_is_out_everywhere() {
        // The only preferred extension is empty, so nothing is in any of them
        let fw = framework(&["A", "B", "C"], &[("A", "B"), ("B", "C"), ("C", "A")]);
        let semantics = Semantics::compute(&fw, DEFAULT_SEARCH_LIMIT);
        assert_eq!(semantics.preferred_extensions, vec![BTreeSet::new()]);
        assert!(semantics.grounded_extension.is_empty());
        assert!(semantics.labelling.values().all(|l| *l == Label::Out));
    }

    #[test]
    fn test_odd_cycle_beside_unattacked_argument() {
        let fw = framework(
            &["A", "B", "C", "D"],
            &[("A", "B"), ("B", "C"), ("C", "A")],
        );
        let semantics = Semantics::compute(&fw, DEFAULT_SEARCH_LIMIT);
        assert_eq!(semantics.preferred_extensions, vec![set(&["D"])]);
        assert_eq!(semantics.labelling["D"], Label::In);
        assert_eq!(semantics.labelling["A"], Label::Out);
        assert_eq!(semantics.labelling["C"], Label::Out);
    }

    #[test]
    fn test_search_cap_falls_back_to_grounded() {
        let fw = framework(&["A", "B", "X"], &[("A", "B"), ("B", "A")]);
        let semantics = Semantics::compute(&fw, 1);
        assert!(semantics.approximated);
        assert_eq!(semantics.preferred_extensions, vec![set(&["X"])]);
        assert_eq!(semantics.labelling["X"], Label::In);
        assert_eq!(semantics.labelling["A"], Label::Undec);
        assert_eq!(semantics.labelling["B"], Label::Undec);
    }

    #[test]
    fn test_unknown_ids_are_ignored() {
        let fw = framework(&["A"], &[("Z", "A")]);
        assert_eq!(fw.grounded_labels(), vec![Label::In]);
    }
}
