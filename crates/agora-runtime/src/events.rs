//! Append-only event stream for UI/transport collaborators
//!
//! Events carry owned snapshots, never references into live state.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use agora_adversarial::{
    BenchmarkMetrics, CommunityGraph, DialogueTurn, Phase, StructuralCrux,
};
use agora_core::{GraphDelta, RevisionResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DebateEvent {
    PhaseChanged {
        from: Phase,
        to: Phase,
        turns_taken: u32,
    },
    RoundStarted {
        round: u32,
    },
    Turn {
        turn: DialogueTurn,
    },
    TurnSkipped {
        speaker_id: String,
        reason: String,
    },
    GraphDelta {
        delta: GraphDelta,
    },
    Crystallized {
        round: u32,
        arguments: usize,
        attacks: usize,
        contested_frontier: usize,
        validated: bool,
    },
    Revision {
        persona_id: String,
        round: u32,
        result: Box<RevisionResult>,
    },
    RoundSkipped {
        persona_id: String,
        round: u32,
        reason: String,
    },
    CommunityGraphBuilt {
        graph: Box<CommunityGraph>,
    },
    CruxesIdentified {
        cruxes: Vec<StructuralCrux>,
    },
    Benchmarks {
        metrics: Box<BenchmarkMetrics>,
    },
    Terminated {
        phase_reached: String,
        reason: String,
    },
}

/// Sending half of the event stream. Cloning shares the channel.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<DebateEvent>>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DebateEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: DebateEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                tracing::debug!("event receiver dropped");
            }
        }
    }
}

/// Drain whatever is buffered without waiting
pub fn drain(rx: &mut mpsc::UnboundedReceiver<DebateEvent>) -> Vec<DebateEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
