//! Debate controller: turn-taking, crystallization triggers and phases
//!
//! [`ControllerState`] is a plain value. Every transition borrows the
//! current state and returns the next one, so a debate's control history
//! can be replayed from its transcript alone.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use agora_core::{ArgumentGraph, Label};

use crate::dialogue::{DialogueTurn, MoveType};

/// Debate phases, strictly forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Opening = 1,
    FreeExchange = 2,
    CruxSeeking = 3,
    Resolution = 4,
}

impl Phase {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Opening => "opening",
            Phase::FreeExchange => "free_exchange",
            Phase::CruxSeeking => "crux_seeking",
            Phase::Resolution => "resolution",
        }
    }

    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Opening => Some(Phase::FreeExchange),
            Phase::FreeExchange => Some(Phase::CruxSeeking),
            Phase::CruxSeeking => Some(Phase::Resolution),
            Phase::Resolution => None,
        }
    }
}

/// Thresholds driving the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Total turns the debate may take
    pub turn_budget: u32,
    /// Never crystallize more often than this
    pub min_turns_between_crystallizations: u32,
    /// Always crystallize after this many turns
    pub max_turns_between_crystallizations: u32,
    /// Consecutive crystallizations with an unchanged frontier size before crux seeking
    pub frontier_stability_window: usize,
    /// Turns per comparison window in circling detection
    pub circling_window: usize,
    /// Token overlap above which the dialogue is circling
    pub circling_threshold: f64,
    /// Budget fraction after which phase 2 gives way to phase 3
    pub crux_seeking_fraction: f64,
    /// Budget fraction after which phase 3 gives way to phase 4
    pub resolution_fraction: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            turn_budget: 24,
            min_turns_between_crystallizations: 2,
            max_turns_between_crystallizations: 5,
            frontier_stability_window: 3,
            circling_window: 4,
            circling_threshold: 0.6,
            crux_seeking_fraction: 0.6,
            resolution_fraction: 0.85,
        }
    }
}

/// A concession recorded from the dialogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concession {
    pub speaker_id: String,
    pub turn_index: u32,
    pub text: String,
}

/// Controller state for one debate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    pub phase: Phase,
    pub participants: Vec<String>,
    pub turns_taken: u32,
    pub turns_since_last_crystallization: u32,
    /// Substantive moves since the last crystallization
    pub substantive_moves_in_window: Vec<MoveType>,
    /// Contested-frontier size recorded at each crystallization
    pub contested_frontier_history: Vec<usize>,
    pub concessions: Vec<Concession>,
    pub circling_detected: bool,
    pub speakers_seen: BTreeSet<String>,
    pub crux_proposers: BTreeSet<String>,
    pub last_speaker: Option<String>,
}

/// Round-robin: the participant after `last`, or the first one
pub fn next_speaker(participants: &[String], last: Option<&str>) -> Option<String> {
    if participants.is_empty() {
        return None;
    }
    let next = last
        .and_then(|l| participants.iter().position(|p| p == l))
        .map(|i| (i + 1) % participants.len())
        .unwrap_or(0);
    Some(participants[next].clone())
}

const STOPWORDS: &[&str] = &[
    "a", "about", "actually", "all", "also", "an", "and", "any", "are", "as", "at", "be",
    "because", "been", "but", "by", "can", "could", "do", "does", "for", "from", "had", "has",
    "have", "he", "her", "here", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "just", "more", "most", "my", "no", "not", "of", "on", "one", "only", "or", "our", "out",
    "she", "so", "some", "than", "that", "the", "their", "them", "then", "there", "these",
    "they", "this", "those", "to", "too", "very", "was", "we", "were", "what", "when", "which",
    "who", "why", "will", "with", "would", "you", "your",
];

fn content_tokens(turns: &[DialogueTurn]) -> BTreeSet<String> {
    turns
        .iter()
        .flat_map(|t| {
            t.text
                .split(|c: char| !c.is_alphanumeric())
                .map(|w| w.to_lowercase())
                .collect::<Vec<_>>()
        })
        .filter(|w| !w.is_empty() && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Compare the content vocabulary of the last `window` turns with the
/// `window` before them. Circling when more than `threshold` of the recent
/// vocabulary was already used.
pub fn detect_circling(turns: &[DialogueTurn], window: usize, threshold: f64) -> bool {
    if window == 0 || turns.len() < 2 * window {
        return false;
    }
    let split = turns.len() - window;
    let recent = content_tokens(&turns[split..]);
    let previous = content_tokens(&turns[split - window..split]);
    if recent.is_empty() {
        return false;
    }
    let overlap = recent.intersection(&previous).count() as f64 / recent.len() as f64;
    overlap > threshold
}

impl ControllerState {
    /// Fresh state at the start of a debate
    pub fn new(participants: &[String]) -> Self {
        Self {
            phase: Phase::Opening,
            participants: participants.to_vec(),
            turns_taken: 0,
            turns_since_last_crystallization: 0,
            substantive_moves_in_window: Vec::new(),
            contested_frontier_history: Vec::new(),
            concessions: Vec::new(),
            circling_detected: false,
            speakers_seen: BTreeSet::new(),
            crux_proposers: BTreeSet::new(),
            last_speaker: None,
        }
    }

    pub fn next_speaker(&self) -> Option<String> {
        next_speaker(&self.participants, self.last_speaker.as_deref())
    }

    /// Fold a new turn into the state. `history` is the full transcript
    /// including `turn`, used for circling detection.
    pub fn record_turn(
        &self,
        turn: &DialogueTurn,
        history: &[DialogueTurn],
        config: &ControllerConfig,
    ) -> Self {
        let mut next = self.clone();
        next.turns_taken += 1;
        next.turns_since_last_crystallization += 1;
        if turn.move_type.is_substantive() {
            next.substantive_moves_in_window.push(turn.move_type);
        }
        match turn.move_type {
            MoveType::Concession => next.concessions.push(Concession {
                speaker_id: turn.speaker_id.clone(),
                turn_index: turn.index,
                text: turn.text.clone(),
            }),
            MoveType::CruxProposal => {
                next.crux_proposers.insert(turn.speaker_id.clone());
            }
            _ => {}
        }
        next.speakers_seen.insert(turn.speaker_id.clone());
        next.last_speaker = Some(turn.speaker_id.clone());
        next.circling_detected =
            detect_circling(history, config.circling_window, config.circling_threshold);
        next
    }

    /// Hand the floor to the next participant without recording a turn
    pub fn pass(&self, speaker: &str) -> Self {
        Self {
            last_speaker: Some(speaker.to_string()),
            ..self.clone()
        }
    }

    /// Whether the trailing `window` of turns should be crystallized now
    pub fn should_crystallize(&self, window: &[DialogueTurn], config: &ControllerConfig) -> bool {
        if self.turns_since_last_crystallization < config.min_turns_between_crystallizations {
            return false;
        }
        let trigger_move = self
            .substantive_moves_in_window
            .iter()
            .any(|m| m.triggers_crystallization());
        let overdue =
            self.turns_since_last_crystallization >= config.max_turns_between_crystallizations;
        let claim_challenged = window.windows(2).any(|pair| {
            pair[0].move_type == MoveType::Claim && pair[1].move_type == MoveType::Challenge
        });
        trigger_move || overdue || claim_challenged
    }

    /// Reset the window after a crystallization and log the frontier size
    pub fn record_crystallization(&self, contested_frontier_size: usize) -> Self {
        let mut next = self.clone();
        next.turns_since_last_crystallization = 0;
        next.substantive_moves_in_window.clear();
        next.contested_frontier_history.push(contested_frontier_size);
        next
    }

    fn frontier_stable(&self, window: usize) -> bool {
        let history = &self.contested_frontier_history;
        window > 0
            && history.len() >= window
            && history[history.len() - window..]
                .windows(2)
                .all(|pair| pair[0] == pair[1])
    }

    fn budget_used(&self, config: &ControllerConfig) -> f64 {
        if config.turn_budget == 0 {
            return 1.0;
        }
        self.turns_taken as f64 / config.turn_budget as f64
    }

    /// Take at most one forward phase step if its exit condition holds
    pub fn advance_phase(&self, config: &ControllerConfig) -> Self {
        let ready = match self.phase {
            Phase::Opening => self
                .participants
                .iter()
                .all(|p| self.speakers_seen.contains(p)),
            Phase::FreeExchange => {
                self.frontier_stable(config.frontier_stability_window)
                    || self.circling_detected
                    || self.budget_used(config) >= config.crux_seeking_fraction
            }
            Phase::CruxSeeking => {
                self.participants
                    .iter()
                    .all(|p| self.crux_proposers.contains(p))
                    || self.budget_used(config) >= config.resolution_fraction
            }
            Phase::Resolution => false,
        };

        match (ready, self.phase.next()) {
            (true, Some(phase)) => {
                tracing::info!(from = ?self.phase, to = ?phase, turns = self.turns_taken, "phase transition");
                Self {
                    phase,
                    ..self.clone()
                }
            }
            _ => self.clone(),
        }
    }

    pub fn budget_exhausted(&self, config: &ControllerConfig) -> bool {
        self.turns_taken >= config.turn_budget
    }

    /// Advisory prompt for the next speaker. Never touches the graph.
    pub fn steering_hint(&self, graph: &ArgumentGraph, speaker: &str) -> Option<String> {
        match self.phase {
            Phase::Opening | Phase::Resolution => None,
            Phase::FreeExchange => {
                if self.circling_detected {
                    return Some(
                        "The exchange is repeating itself. Bring new evidence or narrow your claim."
                            .to_string(),
                    );
                }
                let frontier = graph.contested_frontier();
                if let Some(contested) = graph
                    .arguments
                    .iter()
                    .find(|a| frontier.contains(&a.id) && a.speaker_id != speaker)
                {
                    return Some(format!(
                        "Engage directly with the contested claim: \"{}\"",
                        contested.claim
                    ));
                }
                graph
                    .arguments
                    .iter()
                    .find(|a| a.speaker_id != speaker && graph.label_of(&a.id) == Some(Label::In))
                    .map(|a| {
                        format!(
                            "Your opponent's claim \"{}\" currently stands unrefuted. Challenge it or concede it.",
                            a.claim
                        )
                    })
            }
            Phase::CruxSeeking => {
                let undecided: Vec<&str> = graph
                    .undecided()
                    .iter()
                    .take(3)
                    .map(|a| a.claim.as_str())
                    .collect();
                let mut hint = String::from(
                    "Propose the single claim or assumption whose resolution would settle this disagreement.",
                );
                if !undecided.is_empty() {
                    hint.push_str(&format!(" Still unresolved: {}", undecided.join("; ")));
                }
                Some(hint)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::{Argument, Attack, ValidationResult};

    fn participants() -> Vec<String> {
        vec!["alice".to_string(), "bob".to_string()]
    }

    fn turn(index: u32, speaker: &str, text: &str, move_type: MoveType) -> DialogueTurn {
        DialogueTurn {
            index,
            speaker_id: speaker.to_string(),
            text: text.to_string(),
            move_type,
            round: 0,
        }
    }

    #[test]
    fn test_round_robin() {
        let p = participants();
        assert_eq!(next_speaker(&p, None).as_deref(), Some("alice"));
        assert_eq!(next_speaker(&p, Some("alice")).as_deref(), Some("bob"));
        assert_eq!(next_speaker(&p, Some("bob")).as_deref(), Some("alice"));
        assert_eq!(next_speaker(&p, Some("mallory")).as_deref(), Some("alice"));
        assert_eq!(next_speaker(&[], None), None);

        let state = ControllerState::new(&p).pass("alice");
        assert_eq!(state.next_speaker().as_deref(), Some("bob"));
        assert_eq!(state.turns_taken, 0);
    }

    #[test]
    fn test_crystallization_needs_two_turns() {
        let config = ControllerConfig::default();
        let t0 = turn(0, "alice", "I concede the point", MoveType::Concession);
        let state = ControllerState::new(&participants()).record_turn(&t0, &[t0.clone()], &config);
        assert!(!state.should_crystallize(&[t0.clone()], &config));

        let t1 = turn(1, "bob", "Thanks", MoveType::Clarification);
        let history = vec![t0, t1.clone()];
        let state = state.record_turn(&t1, &history, &config);
        assert!(state.should_crystallize(&history, &config));
    }

    #[test]
    fn test_claim_then_challenge_triggers() {
        let config = ControllerConfig::default();
        let history = vec![
            turn(0, "alice", "Tariffs protect jobs", MoveType::Claim),
            turn(1, "bob", "Evidence says otherwise", MoveType::Challenge),
        ];
        let state = history.iter().fold(ControllerState::new(&participants()), |s, t| {
            s.record_turn(t, &history, &config)
        });
        assert!(state.should_crystallize(&history, &config));
        let reset = state.record_crystallization(0);
        assert_eq!(reset.turns_since_last_crystallization, 0);
        assert!(!reset.should_crystallize(&[], &config));
    }

    #[test]
    fn test_overdue_crystallization() {
        let config = ControllerConfig::default();
        let history: Vec<DialogueTurn> = (0..5)
            .map(|i| turn(i, if i % 2 == 0 { "alice" } else { "bob" }, "more", MoveType::Support))
            .collect();
        let state = history.iter().fold(ControllerState::new(&participants()), |s, t| {
            s.record_turn(t, &history, &config)
        });
        assert!(state.should_crystallize(&history, &config));
    }

    #[test]
    fn test_phase_progression() {
        let config = ControllerConfig {
            turn_budget: 100,
            ..Default::default()
        };
        let t0 = turn(0, "alice", "opening", MoveType::Claim);
        let state = ControllerState::new(&participants()).record_turn(&t0, &[t0.clone()], &config);
        assert_eq!(state.advance_phase(&config).phase, Phase::Opening);

        let t1 = turn(1, "bob", "reply", MoveType::Claim);
        let state = state.record_turn(&t1, &[t0, t1.clone()], &config).advance_phase(&config);
        assert_eq!(state.phase, Phase::FreeExchange);

        let state = state
            .record_crystallization(2)
            .record_crystallization(2)
            .advance_phase(&config);
        assert_eq!(state.phase, Phase::FreeExchange);
        let state = state.record_crystallization(2).advance_phase(&config);
        assert_eq!(state.phase, Phase::CruxSeeking);

        let mut state = state;
        state.crux_proposers = participants().into_iter().collect();
        let state = state.advance_phase(&config);
        assert_eq!(state.phase, Phase::Resolution);
        assert_eq!(state.advance_phase(&config).phase, Phase::Resolution);
    }

    #[test]
    fn test_budget_forces_crux_seeking() {
        let config = ControllerConfig {
            turn_budget: 10,
            ..Default::default()
        };
        let mut state = ControllerState::new(&participants());
        state.phase = Phase::FreeExchange;
        state.turns_taken = 6;
        assert_eq!(state.advance_phase(&config).phase, Phase::CruxSeeking);
    }

    #[test]
    fn test_circling_detection() {
        let repeated = "carbon taxes reduce emissions efficiently";
        let turns: Vec<DialogueTurn> = (0..8)
            .map(|i| turn(i, "alice", repeated, MoveType::Claim))
            .collect();
        assert!(detect_circling(&turns, 4, 0.6));

        let mut fresh = turns[..4].to_vec();
        for (i, text) in ["nuclear baseload", "grid storage costs", "hydro limits", "solar curtailment"]
            .iter()
            .enumerate()
        {
            fresh.push(turn(4 + i as u32, "bob", text, MoveType::Claim));
        }
        assert!(!detect_circling(&fresh, 4, 0.6));
        assert!(!detect_circling(&turns[..7], 4, 0.6));
    }

    #[test]
    fn test_steering_hints_by_phase() {
        let graph = ArgumentGraph::new("t")
            .add_arguments(vec![
                Argument::new("A", "alice", "Rents fall with zoning reform", 1),
                Argument::new("B", "bob", "Supply takes a decade", 1),
            ])
            .add_attacks(vec![
                Attack::rebut("k1", "A", "B", "alice", 1),
                Attack::rebut("k2", "B", "A", "bob", 1),
            ])
            .add_validations(vec![
                ValidationResult::accept("k1", 0.5),
                ValidationResult::accept("k2", 0.5),
            ])
            .recompute_semantics();

        let mut state = ControllerState::new(&participants());
        assert_eq!(state.steering_hint(&graph, "alice"), None);

        state.phase = Phase::FreeExchange;
        let hint = state.steering_hint(&graph, "alice").unwrap();
        assert!(hint.contains("Supply takes a decade"));

        state.phase = Phase::CruxSeeking;
        assert!(state.steering_hint(&graph, "alice").unwrap().contains("Still unresolved"));

        state.phase = Phase::Resolution;
        assert_eq!(state.steering_hint(&graph, "bob"), None);
    }
}
