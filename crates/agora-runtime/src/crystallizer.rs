//! Crystallization: distil a window of dialogue into arguments and attacks
//!
//! Two structured calls per crystallization. The extraction call proposes
//! arguments, attacks and refinements; the validation call judges each
//! proposed attack. Everything is written through the graph's structural
//! edits, so stale references are filtered rather than reported.

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use agora_adversarial::DialogueTurn;
use agora_core::{
    Argument, ArgumentGraph, Attack, AttackTarget, AttackType, Component, GraphDelta,
    ValidationResult, DEFAULT_SEARCH_LIMIT,
};
use agora_llm::{complete_structured, LlmError, LlmProvider};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractedArgument {
    key: String,
    speaker_id: String,
    claim: String,
    #[serde(default)]
    premises: Vec<String>,
    #[serde(default)]
    assumptions: Vec<String>,
    #[serde(default)]
    evidence: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractedAttack {
    from: String,
    to: String,
    #[serde(rename = "type")]
    attack_type: AttackType,
    #[serde(default = "default_component")]
    component: Component,
    #[serde(default)]
    index: usize,
    counter_proposition: String,
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    confidence: Option<f64>,
}

fn default_component() -> Component {
    Component::Claim
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Refinement {
    argument_id: String,
    speaker_id: String,
    #[serde(default)]
    claim: Option<String>,
    #[serde(default)]
    assumptions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct Extraction {
    #[serde(default)]
    arguments: Vec<ExtractedArgument>,
    #[serde(default)]
    attacks: Vec<ExtractedAttack>,
    #[serde(default)]
    refinements: Vec<Refinement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Verdict {
    attack_id: String,
    valid: bool,
    attack_strength: f64,
    #[serde(default)]
    corrections: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Verdicts {
    results: Vec<Verdict>,
}

fn extraction_schema() -> Value {
    let strings = json!({ "type": "array", "items": { "type": "string" } });
    json!({
        "type": "object",
        "required": ["arguments", "attacks"],
        "properties": {
            "arguments": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["key", "speakerId", "claim"],
                    "properties": {
                        "key": { "type": "string" },
                        "speakerId": { "type": "string" },
                        "claim": { "type": "string", "minLength": 1 },
                        "premises": strings,
                        "assumptions": strings,
                        "evidence": strings
                    }
                }
            },
            "attacks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["from", "to", "type", "counterProposition"],
                    "properties": {
                        "from": { "type": "string" },
                        "to": { "type": "string" },
                        "type": { "enum": ["rebut", "undermine", "undercut"] },
                        "component": { "enum": ["claim", "premise", "assumption"] },
                        "index": { "type": "integer", "minimum": 0 },
                        "counterProposition": { "type": "string" },
                        "rationale": { "type": "string" },
                        "confidence": { "type": "number", "minimum": 0, "maximum": 1 }
                    }
                }
            },
            "refinements": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["argumentId", "speakerId"],
                    "properties": {
                        "argumentId": { "type": "string" },
                        "speakerId": { "type": "string" },
                        "claim": { "type": "string" },
                        "assumptions": strings
                    }
                }
            }
        }
    })
}

fn validation_schema() -> Value {
    json!({
        "type": "object",
        "required": ["results"],
        "properties": {
            "results": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["attackId", "valid", "attackStrength"],
                    "properties": {
                        "attackId": { "type": "string" },
                        "valid": { "type": "boolean" },
                        "attackStrength": { "type": "number", "minimum": 0, "maximum": 1 },
                        "corrections": { "type": ["string", "null"] }
                    }
                }
            }
        }
    })
}

const EXTRACT_SYSTEM: &str = "[task:crystallize] You distil debate dialogue into discrete \
arguments and the attacks between them. Only record what the speakers actually said.";

const VALIDATE_SYSTEM: &str = "[task:validate-attacks] You judge whether each proposed attack \
logically holds against its target. Be strict: an attack that misreads its target is invalid.";

fn short_id(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..12])
}

/// Result of one crystallization
#[derive(Debug, Clone)]
pub struct Crystallization {
    /// New graph with semantics recomputed
    pub graph: ArgumentGraph,
    pub delta: GraphDelta,
    /// False when the validation call failed and no attack defeats yet
    pub validated: bool,
}

/// Runs crystallization calls against a provider
#[derive(Debug)]
pub struct Crystallizer<L: LlmProvider + ?Sized> {
    llm: Arc<L>,
    search_limit: usize,
}

impl<L: LlmProvider + ?Sized> Clone for Crystallizer<L> {
    fn clone(&self) -> Self {
        Self {
            llm: self.llm.clone(),
            search_limit: self.search_limit,
        }
    }
}

impl<L: LlmProvider + ?Sized> Crystallizer<L> {
    pub fn new(llm: Arc<L>) -> Self {
        Self {
            llm,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_search_limit(mut self, search_limit: usize) -> Self {
        self.search_limit = search_limit;
        self
    }

    /// Distil `window` into `graph`. A failed extraction call returns the
    /// error and the caller keeps its graph; a failed validation call keeps
    /// the new structure with no validations.
    pub async fn crystallize(
        &self,
        graph: &ArgumentGraph,
        window: &[DialogueTurn],
        round: u32,
    ) -> Result<Crystallization, LlmError> {
        let prompt = extraction_prompt(graph, window);
        let extraction: Extraction =
            complete_structured(self.llm.as_ref(), EXTRACT_SYSTEM, &prompt, &extraction_schema())
                .await?;

        let mut keys: HashMap<String, String> = HashMap::new();
        let arguments: Vec<Argument> = extraction
            .arguments
            .into_iter()
            .map(|a| {
                let id = short_id("arg");
                keys.insert(a.key, id.clone());
                Argument {
                    id,
                    speaker_id: a.speaker_id,
                    claim: a.claim,
                    premises: a.premises,
                    assumptions: a.assumptions,
                    evidence: a.evidence,
                    round,
                }
            })
            .collect();

        let mut next = graph.add_arguments(arguments);
        for refinement in extraction.refinements {
            let owned = next
                .argument(&refinement.argument_id)
                .is_some_and(|a| a.speaker_id == refinement.speaker_id);
            if !owned {
                tracing::debug!(argument = %refinement.argument_id, "ignoring refinement of another speaker's argument");
                continue;
            }
            next = next.update_argument(
                &refinement.argument_id,
                refinement.claim.as_deref(),
                refinement.assumptions,
            );
        }

        let resolve = |reference: &str| keys.get(reference).cloned().unwrap_or_else(|| reference.to_string());
        let attacks: Vec<Attack> = extraction
            .attacks
            .into_iter()
            .map(|a| {
                let from = resolve(&a.from);
                let to = resolve(&a.to);
                let speaker_id = next
                    .argument(&from)
                    .map(|arg| arg.speaker_id.clone())
                    .unwrap_or_default();
                Attack {
                    id: short_id("atk"),
                    target: AttackTarget {
                        arg_id: to.clone(),
                        component: a.component,
                        index: a.index,
                    },
                    from_arg_id: from,
                    to_arg_id: to,
                    attack_type: a.attack_type,
                    counter_proposition: a.counter_proposition,
                    rationale: a.rationale,
                    evidence: Vec::new(),
                    confidence: a.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
                    speaker_id,
                    round,
                }
            })
            .collect();
        let before = next.attacks.len();
        next = next.add_attacks(attacks);
        let proposed: Vec<Attack> = next.attacks[before..].to_vec();

        let validated = if proposed.is_empty() {
            true
        } else {
            match self.validate(&next, &proposed).await {
                Ok(results) => {
                    next = next.add_validations(results);
                    true
                }
                Err(e) => {
                    tracing::warn!(error = %e, attacks = proposed.len(), "attack validation failed; attacks stay unvalidated");
                    false
                }
            }
        };

        let next = next.recompute_semantics_with(self.search_limit);
        metrics::counter!("agora_crystallizations_total").increment(1);
        let delta = next.diff(graph);
        tracing::info!(
            round,
            added_arguments = delta.added_arguments.len(),
            added_attacks = delta.added_attacks.len(),
            validated,
            "crystallized dialogue window"
        );
        Ok(Crystallization {
            graph: next,
            delta,
            validated,
        })
    }

    async fn validate(
        &self,
        graph: &ArgumentGraph,
        attacks: &[Attack],
    ) -> Result<Vec<ValidationResult>, LlmError> {
        let mut prompt = String::from("Judge each attack.\n\n");
        for attack in attacks {
            let claim = |id: &str| graph.argument(id).map(|a| a.claim.clone()).unwrap_or_default();
            prompt.push_str(&format!(
                "- attackId: {}\n  attacker: \"{}\"\n  target: \"{}\"\n  type: {:?}\n  counter-proposition: \"{}\"\n",
                attack.id,
                claim(&attack.from_arg_id),
                claim(&attack.to_arg_id),
                attack.attack_type,
                attack.counter_proposition
            ));
        }
        let verdicts: Verdicts =
            complete_structured(self.llm.as_ref(), VALIDATE_SYSTEM, &prompt, &validation_schema())
                .await?;
        Ok(verdicts
            .results
            .into_iter()
            .map(|v| ValidationResult {
                attack_id: v.attack_id,
                valid: v.valid,
                attack_strength: v.attack_strength.clamp(0.0, 1.0),
                corrections: v.corrections,
            })
            .collect())
    }
}

fn extraction_prompt(graph: &ArgumentGraph, window: &[DialogueTurn]) -> String {
    let mut prompt = format!("Topic: {}\n\nExisting arguments:\n", graph.topic);
    if graph.arguments.is_empty() {
        prompt.push_str("(none)\n");
    }
    for argument in &graph.arguments {
        prompt.push_str(&format!(
            "- id: {} | speaker: {} | claim: {}\n",
            argument.id, argument.speaker_id, argument.claim
        ));
    }
    prompt.push_str("\nNew dialogue:\n");
    for turn in window {
        prompt.push_str(&format!(
            "[{}] {} ({:?}): {}\n",
            turn.index, turn.speaker_id, turn.move_type, turn.text
        ));
    }
    prompt.push_str(
        "\nGive each new argument a short local key. Attacks may reference local keys or \
         existing argument ids. Refinements may only narrow the speaker's own earlier arguments.",
    );
    prompt
}
