//! Live debate sessions
//!
//! One task drives the whole debate: pick a speaker, ask for a turn, fold it
//! into the controller, crystallize when due, advance the phase. The
//! controller state and the graph are threaded by value; nothing is shared.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use agora_adversarial::{
    extract_crux_candidates, ControllerState, CruxCandidate, DialogueTurn, MoveType, Phase,
    Transcript,
};
use agora_core::ArgumentGraph;
use agora_llm::{complete_structured, LlmError, LlmProvider};

use crate::config::DebateConfig;
use crate::crystallizer::Crystallizer;
use crate::error::RuntimeError;
use crate::events::{DebateEvent, EventSink};

/// A participant in a live debate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebaterSpec {
    pub id: String,
    pub name: String,
    /// Position the debater argues from
    pub stance: String,
}

impl DebaterSpec {
    pub fn new(id: &str, name: &str, stance: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            stance: stance.to_string(),
        }
    }
}

/// Everything a finished (or aborted) debate produced
#[derive(Debug, Clone)]
pub struct DebateOutcome {
    pub graph: ArgumentGraph,
    pub transcript: Transcript,
    pub phase_reached: Phase,
    pub crux_candidates: Vec<CruxCandidate>,
    pub skipped_turns: u32,
    /// Set when the debate ended before its budget
    pub terminated: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TurnReply {
    text: String,
    move_type: MoveType,
}

fn turn_schema() -> Value {
    json!({
        "type": "object",
        "required": ["text", "moveType"],
        "properties": {
            "text": { "type": "string", "minLength": 1 },
            "moveType": {
                "enum": [
                    "claim", "challenge", "support", "clarification",
                    "concession", "reframe", "crux_proposal"
                ]
            }
        }
    })
}

fn phase_guidance(phase: Phase) -> &'static str {
    match phase {
        Phase::Opening => "State your position and your strongest reason for it.",
        Phase::FreeExchange => "Respond to the other side. Challenge weak points and support your own.",
        Phase::CruxSeeking => {
            "Identify the single question that, if answered, would change someone's mind. \
             Propose it as a crux."
        }
        Phase::Resolution => "Summarise what was conceded, what remains open and why.",
    }
}

pub struct DebateSession<L: LlmProvider + ?Sized> {
    llm: Arc<L>,
    topic: String,
    debaters: Vec<DebaterSpec>,
    config: DebateConfig,
    crystallizer: Crystallizer<L>,
}

impl<L: LlmProvider + ?Sized> DebateSession<L> {
    pub fn new(
        llm: Arc<L>,
        topic: &str,
        debaters: Vec<DebaterSpec>,
        config: DebateConfig,
    ) -> Result<Self, RuntimeError> {
        if debaters.len() < 2 {
            return Err(RuntimeError::InvalidInput(format!(
                "a debate needs at least two participants, got {}",
                debaters.len()
            )));
        }
        let crystallizer = Crystallizer::new(llm.clone()).with_search_limit(config.search_limit);
        Ok(Self {
            llm,
            topic: topic.to_string(),
            debaters,
            config,
            crystallizer,
        })
    }

    fn debater(&self, id: &str) -> Option<&DebaterSpec> {
        self.debaters.iter().find(|d| d.id == id)
    }

    async fn take_turn(
        &self,
        speaker: &DebaterSpec,
        state: &ControllerState,
        transcript: &Transcript,
        hint: Option<String>,
    ) -> Result<TurnReply, LlmError> {
        let system = format!(
            "[task:debate-turn] You are {}, debating \"{}\". Your position: {}",
            speaker.name, self.topic, speaker.stance
        );
        let mut prompt = format!(
            "Phase {} ({}). {}\n",
            state.phase.number(),
            state.phase.as_str(),
            phase_guidance(state.phase)
        );
        let recent = transcript.tail(self.config.context_turns);
        if recent.is_empty() {
            prompt.push_str("\nYou speak first.\n");
        } else {
            prompt.push_str("\nRecent exchange:\n");
            for turn in recent {
                let name = self
                    .debater(&turn.speaker_id)
                    .map(|d| d.name.as_str())
                    .unwrap_or(turn.speaker_id.as_str());
                prompt.push_str(&format!("{}: {}\n", name, turn.text));
            }
        }
        if let Some(hint) = hint {
            prompt.push_str(&format!("\nModerator: {}\n", hint));
        }
        prompt.push_str("\nGive your next turn and classify the move it makes.");

        complete_structured(self.llm.as_ref(), &system, &prompt, &turn_schema()).await
    }

    /// Run the debate to its turn budget, or until too many consecutive
    /// turns fail.
    pub async fn run(&self, sink: &EventSink) -> DebateOutcome {
        let participants: Vec<String> = self.debaters.iter().map(|d| d.id.clone()).collect();
        let controller = &self.config.controller;
        let mut state = ControllerState::new(&participants);
        let mut transcript = Transcript {
            topic: self.topic.clone(),
            participants: participants.clone(),
            turns: Vec::new(),
        };
        let mut graph = ArgumentGraph::new(&self.topic);
        let mut round = 1u32;
        let mut consecutive_failures = 0u32;
        let mut skipped_turns = 0u32;
        let mut terminated = None;

        tracing::info!(
            topic = %self.topic,
            participants = participants.len(),
            budget = controller.turn_budget,
            "debate started"
        );

        while !state.budget_exhausted(controller) {
            let Some(speaker_id) = state.next_speaker() else {
                break;
            };
            let Some(speaker) = self.debater(&speaker_id) else {
                break;
            };
            let hint = state.steering_hint(&graph, &speaker_id);

            match self.take_turn(speaker, &state, &transcript, hint).await {
                Ok(reply) => {
                    consecutive_failures = 0;
                    let turn = transcript
                        .push(&speaker_id, &reply.text, reply.move_type, round)
                        .clone();
                    state = state.record_turn(&turn, &transcript.turns, controller);
                    sink.emit(DebateEvent::Turn { turn });
                }
                Err(e) => {
                    tracing::warn!(speaker = %speaker_id, error = %e, "turn skipped");
                    metrics::counter!("agora_turns_skipped_total").increment(1);
                    consecutive_failures += 1;
                    skipped_turns += 1;
                    sink.emit(DebateEvent::TurnSkipped {
                        speaker_id: speaker_id.clone(),
                        reason: e.to_string(),
                    });
                    state = state.pass(&speaker_id);
                    if consecutive_failures >= self.config.max_consecutive_failures {
                        terminated = Some(format!(
                            "{} consecutive turns failed; last error: {}",
                            consecutive_failures, e
                        ));
                        break;
                    }
                    continue;
                }
            }

            let window = transcript.tail(state.turns_since_last_crystallization as usize);
            if state.should_crystallize(window, controller) {
                if let Some(next) = self.crystallize(&graph, window, round, sink).await {
                    state = state.record_crystallization(next.contested_frontier().len());
                    graph = next;
                    round += 1;
                }
            }

            let advanced = state.advance_phase(controller);
            if advanced.phase != state.phase {
                sink.emit(DebateEvent::PhaseChanged {
                    from: state.phase,
                    to: advanced.phase,
                    turns_taken: advanced.turns_taken,
                });
            }
            state = advanced;
        }

        // turns since the last crystallization still belong in the graph
        if terminated.is_none() && state.turns_since_last_crystallization > 0 {
            let window = transcript.tail(state.turns_since_last_crystallization as usize);
            if let Some(next) = self.crystallize(&graph, window, round, sink).await {
                state = state.record_crystallization(next.contested_frontier().len());
                graph = next;
            }
        }

        if let Some(reason) = &terminated {
            sink.emit(DebateEvent::Terminated {
                phase_reached: state.phase.as_str().to_string(),
                reason: reason.clone(),
            });
        }

        let crux_candidates = extract_crux_candidates(&graph);
        tracing::info!(
            phase = state.phase.as_str(),
            turns = state.turns_taken,
            skipped_turns,
            arguments = graph.arguments.len(),
            crux_candidates = crux_candidates.len(),
            "debate finished"
        );
        DebateOutcome {
            graph,
            transcript,
            phase_reached: state.phase,
            crux_candidates,
            skipped_turns,
            terminated,
        }
    }

    /// Crystallize `window`, emitting events. `None` keeps the prior graph.
    async fn crystallize(
        &self,
        graph: &ArgumentGraph,
        window: &[DialogueTurn],
        round: u32,
        sink: &EventSink,
    ) -> Option<ArgumentGraph> {
        match self.crystallizer.crystallize(graph, window, round).await {
            Ok(result) => {
                if !result.delta.is_empty() {
                    sink.emit(DebateEvent::GraphDelta {
                        delta: result.delta.clone(),
                    });
                }
                sink.emit(DebateEvent::Crystallized {
                    round,
                    arguments: result.graph.arguments.len(),
                    attacks: result.graph.attacks.len(),
                    contested_frontier: result.graph.contested_frontier().len(),
                    validated: result.validated,
                });
                Some(result.graph)
            }
            Err(e) => {
                tracing::warn!(round, error = %e, "crystallization failed; graph unchanged");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_llm::MockProvider;

    #[test]
    fn test_single_debater_rejected() {
        let llm = Arc::new(MockProvider::failing());
        let result = DebateSession::new(
            llm,
            "t",
            vec![DebaterSpec::new("a", "A", "yes")],
            DebateConfig::default(),
        );
        assert!(matches!(result, Err(RuntimeError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_failing_generator_terminates_early() {
        let llm = Arc::new(MockProvider::failing());
        let session = DebateSession::new(
            llm.clone(),
            "t",
            vec![DebaterSpec::new("a", "A", "yes"), DebaterSpec::new("b", "B", "no")],
            DebateConfig::default(),
        )
        .unwrap();
        let (sink, mut rx) = EventSink::channel();
        let outcome = session.run(&sink).await;

        assert_eq!(outcome.skipped_turns, 4);
        assert!(outcome.transcript.is_empty());
        assert_eq!(outcome.phase_reached, Phase::Opening);
        assert!(outcome.terminated.is_some());
        assert_eq!(llm.calls(), 4);

        let events = crate::events::drain(&mut rx);
        let speakers: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                DebateEvent::TurnSkipped { speaker_id, .. } => Some(speaker_id.as_str()),
                _ => None,
            })
            .collect();
        // the floor still rotates past failed speakers
        assert_eq!(speakers, vec!["a", "b", "a", "b"]);
        assert!(matches!(events.last(), Some(DebateEvent::Terminated { .. })));
    }
}
