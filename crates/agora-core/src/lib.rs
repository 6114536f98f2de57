//! # Agora Core
//!
//! Deterministic reasoning engines for multi-agent debate:
//! - [`ArgumentGraph`]: discrete arguments and attacks with value-semantics edits
//! - [`Semantics`]: grounded/preferred extensions and IN/OUT/UNDEC labelling
//! - [`PersonaQbaf`]: quantitative bipolar graph of one persona's beliefs
//! - [`dfquad`]: DF-QuAD strength propagation and counterfactual impact
//! - [`revise_beliefs`]: resistance-damped belief revision
//!
//! ## Quick Start
//!
//! ```rust
//! use agora_core::{Argument, ArgumentGraph, Attack, Label, ValidationResult};
//!
//! let graph = ArgumentGraph::new("four-day week")
//!     .add_arguments(vec![
//!         Argument::new("A", "alice", "A four-day week raises output", 1),
//!         Argument::new("B", "bob", "Output gains vanish after a year", 1),
//!     ])
//!     .add_attacks(vec![Attack::rebut("k1", "B", "A", "bob", 1)])
//!     .add_validations(vec![ValidationResult::accept("k1", 0.7)])
//!     .recompute_semantics();
//!
//! assert_eq!(graph.label_of("A"), Some(Label::Out));
//! assert_eq!(graph.label_of("B"), Some(Label::In));
//! ```
//!
//! ## DF-QuAD
//!
//! ```rust
//! use agora_core::dfquad::combine;
//!
//! // Pure attack pulls the base score toward 0
//! assert!((combine(0.5, 0.9, 0.0) - 0.05).abs() < 1e-12);
//! ```

pub mod argument;
pub mod dfquad;
pub mod graph;
pub mod qbaf;
pub mod revision;
pub mod semantics;

pub use argument::{
    Argument, ArgumentId, Attack, AttackId, AttackTarget, AttackType, Component, ValidationResult,
};
pub use graph::{ArgumentGraph, GraphDelta};
pub use qbaf::{root_id, EdgeType, NodeType, PersonaQbaf, QbafEdge, QbafNode};
pub use revision::{
    classify_polarity, revise_beliefs, revision_target, Polarity, RevisionConfig, RevisionResult,
    StopReason,
};
pub use semantics::{DefeatFramework, Label, Semantics, DEFAULT_SEARCH_LIMIT};
