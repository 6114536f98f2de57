//! # Agora Adversarial
//!
//! The adversarial layer on top of `agora-core`:
//! - [`controller`]: the debate state machine deciding who speaks, when to
//!   crystallize dialogue into arguments and when to change phase
//! - [`extraction`]: ranked fallback chain for crux candidates in a live debate
//! - [`community`]: merge two personas' belief graphs and classify each claim
//! - [`crux`]: rank structural cruxes by counterfactual impact
//! - [`benchmark`]: derived statistics over a finished run
//!
//! ```rust
//! use agora_adversarial::{ControllerConfig, ControllerState, MoveType, Transcript};
//!
//! let participants = vec!["alice".to_string(), "bob".to_string()];
//! let config = ControllerConfig::default();
//! let mut transcript = Transcript::new("rent control", &["alice", "bob"]);
//! let mut state = ControllerState::new(&participants);
//!
//! for (speaker, text, mv) in [
//!     ("alice", "Rent control keeps tenants housed", MoveType::Claim),
//!     ("bob", "It shrinks the rental supply", MoveType::Challenge),
//! ] {
//!     let turn = transcript.push(speaker, text, mv, 1).clone();
//!     state = state.record_turn(&turn, &transcript.turns, &config);
//! }
//! assert!(state.should_crystallize(&transcript.turns, &config));
//! ```

pub mod benchmark;
pub mod community;
pub mod controller;
pub mod crux;
pub mod dialogue;
pub mod extraction;

pub use benchmark::{
    aggregate_benchmarks, BenchmarkMetrics, PersonaTrajectory, DEFAULT_CONVERGENCE_THRESHOLD,
};
pub use community::{
    build_community_graph, candidate_pairs, ClaimComparison, ClaimRelationship, Classification,
    CommunityConfig, CommunityGraph, CommunityNode, SourceRef,
};
pub use controller::{
    detect_circling, next_speaker, Concession, ControllerConfig, ControllerState, Phase,
};
pub use crux::{identify_cruxes, DisagreementType, PersonaPosition, StructuralCrux};
pub use dialogue::{DialogueTurn, MoveType, Transcript};
pub use extraction::{extract_crux_candidates, CruxCandidate, CruxSource};
