//! Dialogue turns exchanged between debaters

use serde::{Deserialize, Serialize};

/// What a turn does, as classified by the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveType {
    Claim,
    Challenge,
    Support,
    Clarification,
    Concession,
    Reframe,
    CruxProposal,
}

impl MoveType {
    /// Moves that change the state of the disagreement
    pub fn is_substantive(self) -> bool {
        !matches!(self, MoveType::Clarification)
    }

    /// Moves that warrant distilling the window immediately
    pub fn triggers_crystallization(self) -> bool {
        matches!(
            self,
            MoveType::Concession | MoveType::Reframe | MoveType::CruxProposal
        )
    }
}

/// A single utterance in the debate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueTurn {
    /// Position in the transcript (0-based)
    pub index: u32,
    pub speaker_id: String,
    pub text: String,
    pub move_type: MoveType,
    /// Crystallization round this turn belongs to
    pub round: u32,
}

/// Append-only record of a debate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub topic: String,
    pub participants: Vec<String>,
    pub turns: Vec<DialogueTurn>,
}

impl Transcript {
    pub fn new(topic: &str, participants: &[&str]) -> Self {
        Self {
            topic: topic.to_string(),
            participants: participants.iter().map(|p| p.to_string()).collect(),
            turns: Vec::new(),
        }
    }

    /// Append a turn, assigning it the next index
    pub fn push(
        &mut self,
        speaker_id: &str,
        text: &str,
        move_type: MoveType,
        round: u32,
    ) -> &DialogueTurn {
        let index = self.turns.len() as u32;
        self.turns.push(DialogueTurn {
            index,
            speaker_id: speaker_id.to_string(),
            text: text.to_string(),
            move_type,
            round,
        });
        &self.turns[self.turns.len() - 1]
    }

    /// The last `n` turns (fewer if the transcript is shorter)
    pub fn tail(&self, n: usize) -> &[DialogueTurn] {
        &self.turns[self.turns.len().saturating_sub(n)..]
    }

    pub fn last_speaker(&self) -> Option<&str> {
        self.turns.last().map(|t| t.speaker_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
