//! # Agora Persistence
//!
//! Plain JSON dumps of run artifacts for offline inspection: persona QBAF
//! snapshots, community graphs, structural cruxes and benchmark metrics.
//! No binary format and no versioning beyond a `saved_at` timestamp.
//!
//! Backends:
//! - [`MemoryBackend`] for tests
//! - [`FileBackend`], one pretty-printed JSON file per key

pub mod artifact;
pub mod backend;

pub use artifact::{Artifact, ArtifactKind, ArtifactStore};
pub use backend::{FileBackend, MemoryBackend, StorageBackend, StorageError, StorageExt};
