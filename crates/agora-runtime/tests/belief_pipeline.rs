//! End-to-end belief-graph runs against a scripted generator

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use agora_adversarial::Classification;
use agora_llm::{LlmError, LlmProvider, LlmRequest, LlmResponse};
use agora_persist::{ArtifactStore, MemoryBackend, StorageBackend, StorageError};
use agora_runtime::{
    drain, BeliefConfig, BeliefPipeline, DebateEvent, EventSink, PersonaSpec, PipelineStage,
};

/// Answers a request with the first script entry whose keys all occur in
/// the system or user prompt. Comparison calls are answered by reading the
/// numbered pairs out of the prompt.
#[derive(Debug, Default)]
struct ScriptedProvider {
    script: Vec<(Vec<&'static str>, String)>,
    comparisons: Vec<(&'static str, &'static str, &'static str)>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn on(mut self, keys: &[&'static str], response: &str) -> Self {
        self.script.push((keys.to_vec(), response.to_string()));
        self
    }

    fn comparing(mut self, a: &'static str, b: &'static str, relationship: &'static str) -> Self {
        self.comparisons.push((a, b, relationship));
        self
    }

    fn compare_reply(&self, prompt: &str) -> String {
        let mut results = Vec::new();
        let mut current: Option<(usize, &str)> = None;
        for line in prompt.lines() {
            let trimmed = line.trim();
            if let Some(b) = trimmed.strip_prefix("B: ") {
                if let Some((index, a)) = current.take() {
                    for (x, y, relationship) in &self.comparisons {
                        if *x == a && *y == b {
                            results.push(serde_json::json!({
                                "pair": index,
                                "relationship": relationship,
                                "confidence": 0.9,
                                "sharedTopic": "nuclear power"
                            }));
                        }
                    }
                }
            } else if let Some((index, rest)) = trimmed.split_once(". A: ") {
                if let Ok(index) = index.parse() {
                    current = Some((index, rest));
                }
            }
        }
        serde_json::json!({ "comparisons": results }).to_string()
    }

    fn calls_containing(&self, needle: &str) -> usize {
        self.seen
            .lock()
            .map(|s| s.iter().filter(|p| p.contains(needle)).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let text = format!("{}\n{}", request.instructions, request.prompt);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(text.clone());
        }
        let content = if request.instructions.contains("[task:compare]") {
            self.compare_reply(&request.prompt)
        } else {
            self.script
                .iter()
                .find(|(keys, _)| keys.iter().all(|k| text.contains(k)))
                .map(|(_, response)| response.clone())
                .ok_or_else(|| LlmError::RequestFailed("unscripted request".to_string()))?
        };
        Ok(LlmResponse {
            content,
            model: "scripted".to_string(),
            completion_tokens: None,
            latency_ms: 0,
        })
    }
}

/// Memory storage that refuses writes whose key contains `refuse`
#[derive(Debug)]
struct RefusingBackend {
    inner: MemoryBackend,
    refuse: &'static str,
}

#[async_trait]
impl StorageBackend for RefusingBackend {
    fn name(&self) -> &str {
        "refusing"
    }

    async fn is_healthy(&self) -> bool {
        false
    }

    async fn set_value(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        if key.contains(self.refuse) {
            return Err(StorageError::Internal(format!("disk full writing {}", key)));
        }
        self.inner.set_value(key, value).await
    }

    async fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        self.inner.get_value(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        self.inner.delete(key).await
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list_keys(prefix).await
    }
}

const ANA_QBAF: &str = r#"{
    "rootClaim": "Nuclear power should expand",
    "nodes": [
        {"id": "root", "claim": "Nuclear power should expand", "type": "root", "baseScore": 0.6},
        {"id": "safe", "claim": "Nuclear is the safest source per TWh", "type": "pro", "baseScore": 0.8},
        {"id": "cost", "claim": "New plants are too expensive", "type": "con", "baseScore": 0.4}
    ],
    "edges": [
        {"from": "safe", "to": "root", "type": "support", "weight": 1.0},
        {"from": "cost", "to": "root", "type": "attack", "weight": 1.0}
    ]
}"#;

const BEN_QBAF: &str = r#"{
    "rootClaim": "Nuclear power should be phased out",
    "nodes": [
        {"id": "root", "claim": "Nuclear power should be phased out", "type": "root", "baseScore": 0.6},
        {"id": "waste", "claim": "Nuclear waste stays dangerous for millennia", "type": "pro", "baseScore": 0.7},
        {"id": "cost", "claim": "New plants are too expensive", "type": "pro", "baseScore": 0.9}
    ],
    "edges": [
        {"from": "waste", "to": "root", "type": "support", "weight": 1.0},
        {"from": "cost", "to": "root", "type": "support", "weight": 0.8}
    ]
}"#;

const ANA_MOVES: &str = r#"{"moves": [
    {"target": "ben-waste", "type": "attack", "claim": "Reprocessing shrinks waste volume",
     "baseScore": 0.7, "weight": 0.8},
    {"target": "ben-gone", "type": "attack", "claim": "Aimed at nothing", "baseScore": 0.5, "weight": 0.5}
]}"#;

const BEN_MOVES: &str = r#"{"moves": [
    {"target": "ana-safe", "type": "attack", "claim": "Accidents have long tails",
     "baseScore": 0.6, "weight": 0.7}
]}"#;

const QUESTION: &str = "What share of total lifetime cost does decommissioning add?";

fn personas() -> [PersonaSpec; 2] {
    [
        PersonaSpec::new("ana", "Ana", "Engineer who trusts safety statistics").with_resistance(0.3),
        PersonaSpec::new("ben", "Ben", "Activist focused on long-term risk").with_resistance(0.6),
    ]
}

fn full_script() -> ScriptedProvider {
    ScriptedProvider::default()
        .on(&["[task:extract-qbaf]", "(ana)"], ANA_QBAF)
        .on(&["[task:extract-qbaf]", "(ben)"], BEN_QBAF)
        .on(&["[task:moves]", "(ana)"], ANA_MOVES)
        .on(&["[task:moves]", "(ben)"], BEN_MOVES)
        .on(&["[task:judge]", "(ana)"], r#"{"strength": 0.45}"#)
        .on(&["[task:judge]", "(ben)"], r#"{"strength": 0.9}"#)
        .on(&["[task:settling-question]"], QUESTION)
        .comparing("Nuclear power should expand", "Nuclear power should be phased out", "opposition")
        .comparing("New plants are too expensive", "New plants are too expensive", "agreement")
}

#[tokio::test]
async fn test_two_persona_run_produces_every_artifact() {
    let llm = Arc::new(full_script());
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
    let store = ArtifactStore::new(backend);
    let config = BeliefConfig {
        rounds: 2,
        ..Default::default()
    };
    let pipeline = BeliefPipeline::new(llm.clone(), config).with_store(store.clone());
    let (sink, mut rx) = EventSink::channel();

    let outcome = pipeline.run(&personas(), "nuclear power", &sink).await.unwrap();

    // 1. Ran to completion with explicit resistance, so no estimate calls
    assert_eq!(outcome.stage_reached, PipelineStage::Benchmarks);
    assert!(outcome.terminated.is_none());
    assert_eq!(llm.calls_containing("[task:resistance]"), 0);

    // 2. One snapshot per round plus the initial one; later rounds extend
    //    earlier ones and opponents' moves land in the other graph
    for persona in ["ana", "ben"] {
        let history = &outcome.histories[persona];
        assert_eq!(history.len(), 3);
        assert_eq!(outcome.revisions[persona].len(), 2);
        for pair in history.windows(2) {
            assert_eq!(pair[1].round, pair[0].round + 1);
            assert!(pair[0].nodes.iter().all(|n| pair[1].contains(&n.id)));
        }
    }
    let ana = outcome.final_qbaf("ana").unwrap();
    assert!(ana.contains("ben-r1-m0") && ana.contains("ben-r2-m0"));
    let ben = outcome.final_qbaf("ben").unwrap();
    assert!(ben.contains("ana-r1-m0"));
    assert!(!ben.contains("ana-r1-m1"), "move on a stale node was kept");

    // 3. Revision toward the damped judgment, never past the round cap
    for result in &outcome.revisions["ana"] {
        assert!((result.target - result.initial_strength).abs() <= 0.2 + 1e-9);
    }

    // 4. Opposed roots merge into a crux that gets a settling question
    let community = outcome.community.as_ref().unwrap();
    let roots = community
        .nodes
        .iter()
        .find(|n| n.claim == "Nuclear power should expand")
        .unwrap();
    assert!(roots.is_merged());
    assert_eq!(roots.classification, Classification::Crux);
    assert!(!outcome.cruxes.is_empty());
    assert!(outcome.cruxes.iter().any(|c| c.node_id == roots.id));
    assert!(outcome
        .cruxes
        .iter()
        .all(|c| c.settling_question.as_deref() == Some(QUESTION)));

    let metrics = outcome.metrics.as_ref().unwrap();
    assert_eq!(metrics.rounds, 2);
    assert!(metrics.argument_coverage > 0.0);
    assert!(metrics.crux_localization_rate > 0.0);

    // 5. Events in stage order
    let events = drain(&mut rx);
    let rounds: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            DebateEvent::RoundStarted { round } => Some(*round),
            _ => None,
        })
        .collect();
    assert_eq!(rounds, vec![1, 2]);
    let revisions = events
        .iter()
        .filter(|e| matches!(e, DebateEvent::Revision { .. }))
        .count();
    assert_eq!(revisions, 4);
    let tail: Vec<&DebateEvent> = events.iter().rev().take(3).collect();
    assert!(matches!(tail[0], DebateEvent::Benchmarks { .. }));
    assert!(matches!(tail[1], DebateEvent::CruxesIdentified { .. }));
    assert!(matches!(tail[2], DebateEvent::CommunityGraphBuilt { .. }));

    // 6. Everything persisted under the run id
    assert_eq!(store.qbaf_history(&outcome.run_id, "ana").await.unwrap().len(), 3);
    assert!(store.load_community(&outcome.run_id).await.unwrap().is_some());
    assert!(store.load_cruxes(&outcome.run_id).await.unwrap().is_some());
    assert!(store.load_benchmarks(&outcome.run_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_failed_calls_degrade_one_persona() -> Result<(), Box<dyn std::error::Error>> {
    // Ben's extraction, move and judgment calls are all unscripted
    let llm = Arc::new(
        ScriptedProvider::default()
            .on(&["[task:extract-qbaf]", "(ana)"], ANA_QBAF)
            .on(&["[task:moves]", "(ana)"], ANA_MOVES)
            .on(&["[task:judge]", "(ana)"], r#"{"strength": 0.3}"#),
    );
    let dir = tempfile::tempdir()?;
    let config = BeliefConfig {
        rounds: 2,
        artifact_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let pipeline = BeliefPipeline::from_config(llm, config).await?;
    let (sink, mut rx) = EventSink::channel();

    let outcome = pipeline.run(&personas(), "nuclear power", &sink).await?;

    // Ben falls back to a bare thesis; Ana's moves all target stale nodes
    assert!(outcome.terminated.is_none());
    let ben = outcome.final_qbaf("ben").ok_or("no ben history")?;
    assert_eq!(ben.nodes.len(), 1);
    assert_eq!(ben.root_claim, "Activist focused on long-term risk");
    assert_eq!(outcome.histories["ben"].len(), 3);
    assert!(!outcome.revisions.contains_key("ben"));
    assert_eq!(outcome.revisions["ana"].len(), 2);

    let skipped: Vec<u32> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            DebateEvent::RoundSkipped { persona_id, round, .. } if persona_id == "ben" => {
                Some(round)
            }
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec![1, 2]);

    // No comparisons scripted, so nothing merges and no crux is found
    assert!(outcome.cruxes.is_empty());
    assert_eq!(outcome.metrics.as_ref().map(|m| m.argument_coverage), Some(0.0));

    // Artifacts landed on disk
    let reopened = ArtifactStore::new(Arc::new(agora_persist::FileBackend::open(dir.path()).await?));
    assert_eq!(reopened.list_runs().await?, vec![outcome.run_id.clone()]);
    assert_eq!(reopened.qbaf_history(&outcome.run_id, "ben").await?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_failed_final_write_keeps_computed_results() {
    let backend: Arc<dyn StorageBackend> = Arc::new(RefusingBackend {
        inner: MemoryBackend::new(),
        refuse: ":benchmarks",
    });
    let store = ArtifactStore::new(backend);
    let config = BeliefConfig {
        rounds: 1,
        ..Default::default()
    };
    let pipeline = BeliefPipeline::new(Arc::new(full_script()), config).with_store(store.clone());
    let (sink, mut rx) = EventSink::channel();

    let outcome = pipeline.run(&personas(), "nuclear power", &sink).await.unwrap();

    assert_eq!(outcome.stage_reached, PipelineStage::Benchmarks);
    assert!(outcome.terminated.as_deref().unwrap().contains("disk full"));
    assert_eq!(outcome.histories["ana"].len(), 2);
    assert!(outcome.community.is_some());
    assert!(!outcome.cruxes.is_empty());
    assert_eq!(outcome.metrics.as_ref().map(|m| m.rounds), Some(1));

    // Earlier artifacts are still in the store
    assert!(store.load_cruxes(&outcome.run_id).await.unwrap().is_some());
    assert!(store.load_benchmarks(&outcome.run_id).await.unwrap().is_none());

    match drain(&mut rx).last() {
        Some(DebateEvent::Terminated { phase_reached, .. }) => assert_eq!(phase_reached, "benchmarks"),
        other => panic!("expected termination, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_snapshot_write_stops_before_rounds() {
    let backend: Arc<dyn StorageBackend> = Arc::new(RefusingBackend {
        inner: MemoryBackend::new(),
        refuse: ":qbaf:",
    });
    let pipeline = BeliefPipeline::new(Arc::new(full_script()), BeliefConfig::default())
        .with_store(ArtifactStore::new(backend));
    let (sink, mut rx) = EventSink::channel();

    let outcome = pipeline.run(&personas(), "nuclear power", &sink).await.unwrap();

    assert_eq!(outcome.stage_reached, PipelineStage::Extraction);
    assert!(outcome.terminated.is_some());
    // Both evaluated round-0 graphs survive the failed write
    assert_eq!(outcome.final_qbaf("ana").map(|q| q.nodes.len()), Some(3));
    assert_eq!(outcome.final_qbaf("ben").map(|q| q.nodes.len()), Some(3));
    assert!(outcome.revisions.is_empty());
    assert!(outcome.community.is_none());

    let events = drain(&mut rx);
    assert!(!events.iter().any(|e| matches!(e, DebateEvent::RoundStarted { .. })));
    assert!(matches!(events.last(), Some(DebateEvent::Terminated { .. })));
}
