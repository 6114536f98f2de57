//! Discrete arguments, attacks and attack validation

use serde::{Deserialize, Serialize};

/// Stable argument identifier
pub type ArgumentId = String;

/// Stable attack identifier
pub type AttackId = String;

/// A discrete argument put forward by one speaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    /// Unique ID
    pub id: ArgumentId,
    /// Participant who made the argument
    pub speaker_id: String,
    /// The conclusion being argued for
    pub claim: String,
    /// Explicit premises
    #[serde(default)]
    pub premises: Vec<String>,
    /// Unstated assumptions the claim depends on
    #[serde(default)]
    pub assumptions: Vec<String>,
    /// Cited evidence
    #[serde(default)]
    pub evidence: Vec<String>,
    /// Debate round the argument was crystallized in
    pub round: u32,
}

impl Argument {
    /// Create an argument with only a claim
    pub fn new(id: &str, speaker_id: &str, claim: &str, round: u32) -> Self {
        Self {
            id: id.to_string(),
            speaker_id: speaker_id.to_string(),
            claim: claim.to_string(),
            premises: Vec::new(),
            assumptions: Vec::new(),
            evidence: Vec::new(),
            round,
        }
    }

    /// Builder: attach premises
    pub fn with_premises(mut self, premises: &[&str]) -> Self {
        self.premises = premises.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Builder: attach assumptions
    pub fn with_assumptions(mut self, assumptions: &[&str]) -> Self {
        self.assumptions = assumptions.iter().map(|a| a.to_string()).collect();
        self
    }
}

/// How an attack engages its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackType {
    /// Contradicts the conclusion
    Rebut,
    /// Contests a premise or assumption
    Undermine,
    /// Denies that the premises support the conclusion
    Undercut,
}

/// Part of an argument an attack is aimed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Claim,
    Premise,
    Assumption,
}

/// Precise attack target within an argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackTarget {
    pub arg_id: ArgumentId,
    pub component: Component,
    /// Index into premises/assumptions (0 for the claim)
    #[serde(default)]
    pub index: usize,
}

/// A proposed attack from one argument on another.
///
/// Existence does not imply the attack holds: only attacks with a valid
/// [`ValidationResult`] take part in the defeat relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    pub id: AttackId,
    pub from_arg_id: ArgumentId,
    pub to_arg_id: ArgumentId,
    #[serde(rename = "type")]
    pub attack_type: AttackType,
    pub target: AttackTarget,
    /// The proposition asserted against the target
    pub counter_proposition: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    /// Proposer's confidence (0.0 - 1.0)
    pub confidence: f64,
    pub speaker_id: String,
    pub round: u32,
}

impl Attack {
    /// Create a rebuttal on the target's claim
    pub fn rebut(id: &str, from: &str, to: &str, speaker_id: &str, round: u32) -> Self {
        Self {
            id: id.to_string(),
            from_arg_id: from.to_string(),
            to_arg_id: to.to_string(),
            attack_type: AttackType::Rebut,
            target: AttackTarget {
                arg_id: to.to_string(),
                component: Component::Claim,
                index: 0,
            },
            counter_proposition: String::new(),
            rationale: String::new(),
            evidence: Vec::new(),
            confidence: 1.0,
            speaker_id: speaker_id.to_string(),
            round,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.from_arg_id == self.to_arg_id
    }
}

/// Judgment on whether a proposed attack logically holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub attack_id: AttackId,
    pub valid: bool,
    /// Strength of the attack if valid (0.0 - 1.0)
    pub attack_strength: f64,
    /// Free-text corrections from the validator
    #[serde(default)]
    pub corrections: Option<String>,
}

impl ValidationResult {
    /// Mark an attack as holding with the given strength
    pub fn accept(attack_id: &str, attack_strength: f64) -> Self {
        Self {
            attack_id: attack_id.to_string(),
            valid: true,
            attack_strength: attack_strength.clamp(0.0, 1.0),
            corrections: None,
        }
    }

    /// Mark an attack as not holding
    pub fn reject(attack_id: &str, corrections: &str) -> Self {
        Self {
            attack_id: attack_id.to_string(),
            valid: false,
            attack_strength: 0.0,
            corrections: Some(corrections.to_string()),
        }
    }
}
