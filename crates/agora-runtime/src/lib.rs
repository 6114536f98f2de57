//! # Agora Runtime
//!
//! Tokio-based debate sessions and belief-graph pipelines.
//!
//! - [`DebateSession`] runs a live debate: turns, crystallization into an
//!   argument graph, phase transitions
//! - [`BeliefPipeline`] runs two personas' QBAFs through rounds of moves and
//!   revision, then builds the community graph, cruxes and benchmarks
//!
//! Both report progress through an [`EventSink`].

pub mod config;
pub mod crystallizer;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod session;
pub mod telemetry;

pub use config::{BeliefConfig, DebateConfig, RuntimeConfig};
pub use crystallizer::{Crystallization, Crystallizer};
pub use error::RuntimeError;
pub use events::{drain, DebateEvent, EventSink};
pub use pipeline::{BeliefPipeline, PersonaSpec, PipelineOutcome, PipelineStage};
pub use session::{DebateOutcome, DebateSession, DebaterSpec};
pub use telemetry::init_tracing;
