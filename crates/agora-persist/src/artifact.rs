//! Run artifacts: QBAF snapshots, community graphs, cruxes and benchmarks

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;

use agora_adversarial::{BenchmarkMetrics, CommunityGraph, StructuralCrux};
use agora_core::PersonaQbaf;

use crate::backend::{StorageBackend, StorageError, StorageExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    PersonaQbaf,
    CommunityGraph,
    Cruxes,
    Benchmarks,
}

/// A persisted payload with the only metadata we keep: its timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact<T> {
    pub kind: ArtifactKind,
    pub run_id: String,
    pub saved_at: DateTime<Utc>,
    pub payload: T,
}

/// Typed artifact access over any storage backend
#[derive(Debug)]
pub struct ArtifactStore<B: StorageBackend + ?Sized> {
    backend: Arc<B>,
    prefix: String,
}

impl<B: StorageBackend + ?Sized> Clone for ArtifactStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            prefix: self.prefix.clone(),
        }
    }
}

impl<B: StorageBackend + ?Sized> ArtifactStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            prefix: "run:".to_string(),
        }
    }

    /// Fresh identifier for a run
    pub fn new_run_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn key(&self, run_id: &str, suffix: &str) -> String {
        format!("{}{}:{}", self.prefix, run_id, suffix)
    }

    async fn save<T: Serialize + Send + Sync>(
        &self,
        kind: ArtifactKind,
        run_id: &str,
        suffix: &str,
        payload: T,
    ) -> Result<(), StorageError> {
        let artifact = Artifact {
            kind,
            run_id: run_id.to_string(),
            saved_at: Utc::now(),
            payload,
        };
        self.backend.set(&self.key(run_id, suffix), &artifact).await
    }

    async fn load<T: DeserializeOwned>(
        &self,
        run_id: &str,
        suffix: &str,
    ) -> Result<Option<Artifact<T>>, StorageError> {
        self.backend.get(&self.key(run_id, suffix)).await
    }

    pub async fn save_qbaf(&self, run_id: &str, qbaf: &PersonaQbaf) -> Result<(), StorageError> {
        let suffix = format!("qbaf:{}:{:04}", qbaf.persona_id, qbaf.round);
        self.save(ArtifactKind::PersonaQbaf, run_id, &suffix, qbaf).await
    }

    pub async fn load_qbaf(
        &self,
        run_id: &str,
        persona_id: &str,
        round: u32,
    ) -> Result<Option<Artifact<PersonaQbaf>>, StorageError> {
        self.load(run_id, &format!("qbaf:{}:{:04}", persona_id, round))
            .await
    }

    /// Every stored snapshot for a persona, oldest round first
    pub async fn qbaf_history(
        &self,
        run_id: &str,
        persona_id: &str,
    ) -> Result<Vec<PersonaQbaf>, StorageError> {
        let prefix = self.key(run_id, &format!("qbaf:{}:", persona_id));
        let mut history = Vec::new();
        for key in self.backend.list_keys(&prefix).await? {
            let artifact: Option<Artifact<PersonaQbaf>> = self.backend.get(&key).await?;
            match artifact {
                Some(artifact) => history.push(artifact.payload),
                None => return Err(StorageError::NotFound(key)),
            }
        }
        history.sort_by_key(|q| q.round);
        Ok(history)
    }

    pub async fn save_community(
        &self,
        run_id: &str,
        graph: &CommunityGraph,
    ) -> Result<(), StorageError> {
        self.save(ArtifactKind::CommunityGraph, run_id, "community", graph)
            .await
    }

    pub async fn load_community(
        &self,
        run_id: &str,
    ) -> Result<Option<Artifact<CommunityGraph>>, StorageError> {
        self.load(run_id, "community").await
    }

    pub async fn save_cruxes(
        &self,
        run_id: &str,
        cruxes: &[StructuralCrux],
    ) -> Result<(), StorageError> {
        self.save(ArtifactKind::Cruxes, run_id, "cruxes", cruxes).await
    }

    pub async fn load_cruxes(
        &self,
        run_id: &str,
    ) -> Result<Option<Artifact<Vec<StructuralCrux>>>, StorageError> {
        self.load(run_id, "cruxes").await
    }

    pub async fn save_benchmarks(
        &self,
        run_id: &str,
        metrics: &BenchmarkMetrics,
    ) -> Result<(), StorageError> {
        self.save(ArtifactKind::Benchmarks, run_id, "benchmarks", metrics)
            .await
    }

    pub async fn load_benchmarks(
        &self,
        run_id: &str,
    ) -> Result<Option<Artifact<BenchmarkMetrics>>, StorageError> {
        self.load(run_id, "benchmarks").await
    }

    /// Distinct run ids with at least one artifact
    pub async fn list_runs(&self) -> Result<Vec<String>, StorageError> {
        let mut runs: Vec<String> = self
            .backend
            .list_keys(&self.prefix)
            .await?
            .iter()
            .filter_map(|k| k.strip_prefix(&self.prefix))
            .filter_map(|rest| rest.split(':').next())
            .map(str::to_string)
            .collect();
        runs.dedup();
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    #[tokio::test]
    async fn test_qbaf_history_ordered_by_round() {
        let store = ArtifactStore::new(Arc::new(MemoryBackend::new()));
        let run = ArtifactStore::<MemoryBackend>::new_run_id();
        let first = PersonaQbaf::single_root("alice", "t", "thesis", 0.6);
        let mut later = first.clone();
        for _ in 0..11 {
            later = later.append_round(Vec::new(), Vec::new());
        }

        store.save_qbaf(&run, &later).await.unwrap();
        store.save_qbaf(&run, &first).await.unwrap();

        let history = store.qbaf_history(&run, "alice").await.unwrap();
        assert_eq!(history.iter().map(|q| q.round).collect::<Vec<_>>(), vec![0, 11]);

        let loaded = store.load_qbaf(&run, "alice", 11).await.unwrap().unwrap();
        assert_eq!(loaded.kind, ArtifactKind::PersonaQbaf);
        assert_eq!(loaded.run_id, run);
        assert!(store.load_qbaf(&run, "bob", 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_runs() {
        let store = ArtifactStore::new(Arc::new(MemoryBackend::new()));
        let qbaf = PersonaQbaf::single_root("alice", "t", "thesis", 0.6);
        store.save_qbaf("r1", &qbaf).await.unwrap();
        store.save_qbaf("r2", &qbaf).await.unwrap();
        store
            .save_benchmarks("r1", &BenchmarkMetrics::default())
            .await
            .unwrap();
        assert_eq!(store.list_runs().await.unwrap(), vec!["r1", "r2"]);
    }
}
