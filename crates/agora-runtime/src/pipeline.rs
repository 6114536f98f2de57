//! Belief-graph pipeline
//!
//! Two personas each hold a QBAF over the topic. Per round they exchange
//! moves against the other's graph, judge their own updated graph and
//! revise base scores toward the damped judgment. Afterwards the graphs are
//! merged into a community graph, cruxes are scored and benchmarks computed.
//!
//! Per-persona work inside a stage runs concurrently; stages are barriers.
//! A failed generator call degrades only the persona and stage it belongs to.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use agora_adversarial::{
    aggregate_benchmarks, build_community_graph, candidate_pairs, identify_cruxes,
    BenchmarkMetrics, ClaimComparison, ClaimRelationship, CommunityGraph, PersonaTrajectory,
    StructuralCrux,
};
use agora_core::{
    dfquad, revise_beliefs, revision_target, root_id, EdgeType, NodeType, PersonaQbaf, QbafEdge,
    QbafNode, RevisionResult,
};
use agora_llm::{complete_structured, complete_text, LlmError, LlmProvider};
use agora_persist::{ArtifactStore, FileBackend, StorageBackend, StorageError};

use crate::config::BeliefConfig;
use crate::error::RuntimeError;
use crate::events::{DebateEvent, EventSink};

/// A persona taking part in a belief-graph run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaSpec {
    pub id: String,
    pub name: String,
    /// Free-text description of what the persona believes and values
    pub worldview: String,
    /// Explicit revision resistance; estimated by the generator when unset
    pub revision_resistance: Option<f64>,
}

impl PersonaSpec {
    pub fn new(id: &str, name: &str, worldview: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            worldview: worldview.to_string(),
            revision_resistance: None,
        }
    }

    pub fn with_resistance(mut self, resistance: f64) -> Self {
        self.revision_resistance = Some(resistance.clamp(0.0, 1.0));
        self
    }
}

/// Last stage a run entered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Extraction,
    Rounds,
    Community,
    Cruxes,
    Benchmarks,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Extraction => "extraction",
            PipelineStage::Rounds => "rounds",
            PipelineStage::Community => "community",
            PipelineStage::Cruxes => "cruxes",
            PipelineStage::Benchmarks => "benchmarks",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_id: String,
    /// Evaluated QBAF snapshots per persona, round 0 first
    pub histories: BTreeMap<String, Vec<PersonaQbaf>>,
    pub revisions: BTreeMap<String, Vec<RevisionResult>>,
    pub community: Option<CommunityGraph>,
    pub cruxes: Vec<StructuralCrux>,
    pub metrics: Option<BenchmarkMetrics>,
    pub stage_reached: PipelineStage,
    pub terminated: Option<String>,
}

impl PipelineOutcome {
    /// Latest snapshot for a persona
    pub fn final_qbaf(&self, persona_id: &str) -> Option<&PersonaQbaf> {
        self.histories.get(persona_id).and_then(|h| h.last())
    }
}

// Wire formats

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractedNode {
    id: String,
    claim: String,
    #[serde(rename = "type")]
    node_type: NodeType,
    base_score: f64,
    #[serde(default)]
    grounding: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ExtractedEdge {
    from: String,
    to: String,
    #[serde(rename = "type")]
    edge_type: EdgeType,
    weight: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractedQbaf {
    root_claim: String,
    nodes: Vec<ExtractedNode>,
    #[serde(default)]
    edges: Vec<ExtractedEdge>,
}

#[derive(Debug, Deserialize)]
struct Resistance {
    resistance: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Move {
    target: String,
    #[serde(rename = "type")]
    edge_type: EdgeType,
    claim: String,
    base_score: f64,
    weight: f64,
}

#[derive(Debug, Deserialize)]
struct Moves {
    moves: Vec<Move>,
}

#[derive(Debug, Deserialize)]
struct Judgment {
    strength: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Comparison {
    pair: usize,
    relationship: ClaimRelationship,
    confidence: f64,
    #[serde(default)]
    shared_topic: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Comparisons {
    comparisons: Vec<Comparison>,
}

fn unit_interval() -> Value {
    json!({ "type": "number", "minimum": 0, "maximum": 1 })
}

fn extraction_schema() -> Value {
    json!({
        "type": "object",
        "required": ["rootClaim", "nodes", "edges"],
        "properties": {
            "rootClaim": { "type": "string", "minLength": 1 },
            "nodes": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["id", "claim", "type", "baseScore"],
                    "properties": {
                        "id": { "type": "string" },
                        "claim": { "type": "string" },
                        "type": { "enum": ["root", "pro", "con", "evidence"] },
                        "baseScore": unit_interval(),
                        "grounding": { "type": "array", "items": { "type": "string" } }
                    }
                }
            },
            "edges": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["from", "to", "type", "weight"],
                    "properties": {
                        "from": { "type": "string" },
                        "to": { "type": "string" },
                        "type": { "enum": ["attack", "support"] },
                        "weight": unit_interval()
                    }
                }
            }
        }
    })
}

fn resistance_schema() -> Value {
    json!({
        "type": "object",
        "required": ["resistance"],
        "properties": { "resistance": unit_interval() }
    })
}

fn moves_schema() -> Value {
    json!({
        "type": "object",
        "required": ["moves"],
        "properties": {
            "moves": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["target", "type", "claim", "baseScore", "weight"],
                    "properties": {
                        "target": { "type": "string" },
                        "type": { "enum": ["attack", "support"] },
                        "claim": { "type": "string", "minLength": 1 },
                        "baseScore": unit_interval(),
                        "weight": unit_interval()
                    }
                }
            }
        }
    })
}

fn judgment_schema() -> Value {
    json!({
        "type": "object",
        "required": ["strength"],
        "properties": { "strength": unit_interval() }
    })
}

fn comparison_schema() -> Value {
    json!({
        "type": "object",
        "required": ["comparisons"],
        "properties": {
            "comparisons": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["pair", "relationship", "confidence"],
                    "properties": {
                        "pair": { "type": "integer", "minimum": 0 },
                        "relationship": { "enum": ["agreement", "opposition", "related"] },
                        "confidence": unit_interval(),
                        "sharedTopic": { "type": ["string", "null"] }
                    }
                }
            }
        }
    })
}

fn describe_qbaf(qbaf: &PersonaQbaf) -> String {
    let mut text = String::new();
    for node in &qbaf.nodes {
        text.push_str(&format!(
            "- {} [{:?}, strength {:.2}]: {}\n",
            node.id, node.node_type, node.dialectical_strength, node.claim
        ));
    }
    for edge in &qbaf.edges {
        text.push_str(&format!("  {} {:?}s {}\n", edge.from, edge.edge_type, edge.to));
    }
    text
}

/// End the run at its current stage, keeping whatever was computed
fn terminate(mut outcome: PipelineOutcome, reason: String, sink: &EventSink) -> PipelineOutcome {
    tracing::warn!(
        run_id = %outcome.run_id,
        stage = outcome.stage_reached.as_str(),
        %reason,
        "belief pipeline terminated"
    );
    sink.emit(DebateEvent::Terminated {
        phase_reached: outcome.stage_reached.as_str().to_string(),
        reason: reason.clone(),
    });
    outcome.terminated = Some(reason);
    outcome
}

fn storage_failed(outcome: PipelineOutcome, error: StorageError, sink: &EventSink) -> PipelineOutcome {
    metrics::counter!("agora_artifact_write_failures_total").increment(1);
    terminate(outcome, format!("artifact store failed: {}", error), sink)
}

/// Runs the belief-graph pipeline for two personas
pub struct BeliefPipeline<L: LlmProvider + ?Sized> {
    llm: Arc<L>,
    config: BeliefConfig,
    store: Option<ArtifactStore<dyn StorageBackend>>,
}

impl<L: LlmProvider + ?Sized> BeliefPipeline<L> {
    /// Pipeline without persistence
    pub fn new(llm: Arc<L>, config: BeliefConfig) -> Self {
        Self {
            llm,
            config,
            store: None,
        }
    }

    /// Pipeline persisting to `config.artifact_dir` when it is set
    pub async fn from_config(llm: Arc<L>, config: BeliefConfig) -> Result<Self, RuntimeError> {
        let store = match &config.artifact_dir {
            Some(dir) => {
                let backend: Arc<dyn StorageBackend> = Arc::new(FileBackend::open(dir).await?);
                Some(ArtifactStore::new(backend))
            }
            None => None,
        };
        Ok(Self { llm, config, store })
    }

    pub fn with_store(mut self, store: ArtifactStore<dyn StorageBackend>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn run(
        &self,
        personas: &[PersonaSpec],
        topic: &str,
        sink: &EventSink,
    ) -> Result<PipelineOutcome, RuntimeError> {
        let [persona_a, persona_b] = personas else {
            return Err(RuntimeError::InvalidInput(format!(
                "the belief pipeline takes exactly two personas, got {}",
                personas.len()
            )));
        };
        if persona_a.id == persona_b.id {
            return Err(RuntimeError::InvalidInput(format!(
                "persona ids must differ: {}",
                persona_a.id
            )));
        }

        let run_id = ArtifactStore::<dyn StorageBackend>::new_run_id();
        let mut outcome = PipelineOutcome {
            run_id: run_id.clone(),
            histories: BTreeMap::new(),
            revisions: BTreeMap::new(),
            community: None,
            cruxes: Vec::new(),
            metrics: None,
            stage_reached: PipelineStage::Extraction,
            terminated: None,
        };
        tracing::info!(run_id = %run_id, topic, a = %persona_a.id, b = %persona_b.id, "belief pipeline started");

        // 1. extraction and resistance, both personas at once
        let (a, b) = tokio::join!(
            self.extract(persona_a, topic),
            self.extract(persona_b, topic)
        );
        let (mut qbaf_a, mut qbaf_b) = match (a, b) {
            (Err(ea), Err(eb)) => {
                let reason = format!("both extractions failed: {}; {}", ea, eb);
                return Ok(terminate(outcome, reason, sink));
            }
            (a, b) => (
                self.or_single_root(a, persona_a, topic),
                self.or_single_root(b, persona_b, topic),
            ),
        };
        let (resistance_a, resistance_b) =
            tokio::join!(self.resistance(persona_a, topic), self.resistance(persona_b, topic));

        qbaf_a = dfquad::evaluate(&qbaf_a);
        qbaf_b = dfquad::evaluate(&qbaf_b);
        outcome.histories.insert(persona_a.id.clone(), vec![qbaf_a.clone()]);
        outcome.histories.insert(persona_b.id.clone(), vec![qbaf_b.clone()]);
        for qbaf in [&qbaf_a, &qbaf_b] {
            if let Err(e) = self.persist_qbaf(&run_id, qbaf).await {
                return Ok(storage_failed(outcome, e, sink));
            }
        }

        // 2. rounds
        outcome.stage_reached = PipelineStage::Rounds;
        for round in 1..=self.config.rounds {
            sink.emit(DebateEvent::RoundStarted { round });
            tracing::info!(run_id = %run_id, round, "belief round started");

            let (moves_a, moves_b) = tokio::join!(
                self.moves(persona_a, &qbaf_a, &qbaf_b, round),
                self.moves(persona_b, &qbaf_b, &qbaf_a, round)
            );
            // each graph gains the opponent's moves
            let next_a = dfquad::evaluate(&qbaf_a.append_round(moves_b.0, moves_b.1));
            let next_b = dfquad::evaluate(&qbaf_b.append_round(moves_a.0, moves_a.1));

            let (revised_a, revised_b) = tokio::join!(
                self.revise(persona_a, next_a, &qbaf_b, resistance_a),
                self.revise(persona_b, next_b, &qbaf_a, resistance_b)
            );
            for (persona, (qbaf, revision)) in
                [(persona_a, revised_a), (persona_b, revised_b)]
            {
                match revision {
                    Ok(result) => {
                        sink.emit(DebateEvent::Revision {
                            persona_id: persona.id.clone(),
                            round,
                            result: Box::new(result.clone()),
                        });
                        outcome
                            .revisions
                            .entry(persona.id.clone())
                            .or_default()
                            .push(result);
                    }
                    Err(e) => {
                        tracing::warn!(persona = %persona.id, round, error = %e, "revision skipped");
                        sink.emit(DebateEvent::RoundSkipped {
                            persona_id: persona.id.clone(),
                            round,
                            reason: e.to_string(),
                        });
                    }
                }
                outcome
                    .histories
                    .entry(persona.id.clone())
                    .or_default()
                    .push(qbaf.clone());
                let persisted = self.persist_qbaf(&run_id, &qbaf).await;
                if persona.id == persona_a.id {
                    qbaf_a = qbaf;
                } else {
                    qbaf_b = qbaf;
                }
                if let Err(e) = persisted {
                    return Ok(storage_failed(outcome, e, sink));
                }
            }
        }

        // 3. community graph
        outcome.stage_reached = PipelineStage::Community;
        let comparisons = self.compare(&qbaf_a, &qbaf_b).await;
        let community = build_community_graph(&qbaf_a, &qbaf_b, &comparisons, &self.config.community);
        sink.emit(DebateEvent::CommunityGraphBuilt {
            graph: Box::new(community.clone()),
        });
        outcome.community = Some(community.clone());
        if let Some(store) = &self.store {
            if let Err(e) = store.save_community(&run_id, &community).await {
                return Ok(storage_failed(outcome, e, sink));
            }
        }

        // 4. cruxes with settling questions
        outcome.stage_reached = PipelineStage::Cruxes;
        let mut cruxes = identify_cruxes(&community, &qbaf_a, &qbaf_b, self.config.top_k_cruxes);
        let questions = join_all(cruxes.iter().map(|c| self.settling_question(c, topic))).await;
        for (crux, question) in cruxes.iter_mut().zip(questions) {
            crux.settling_question = question;
        }
        sink.emit(DebateEvent::CruxesIdentified {
            cruxes: cruxes.clone(),
        });
        outcome.cruxes = cruxes.clone();
        if let Some(store) = &self.store {
            if let Err(e) = store.save_cruxes(&run_id, &cruxes).await {
                return Ok(storage_failed(outcome, e, sink));
            }
        }

        // 5. benchmarks
        outcome.stage_reached = PipelineStage::Benchmarks;
        let trajectories: Vec<PersonaTrajectory> = [persona_a, persona_b]
            .iter()
            .map(|p| trajectory(&p.id, &outcome.histories, &outcome.revisions))
            .collect();
        let metrics = aggregate_benchmarks(
            &trajectories,
            &community,
            &cruxes,
            self.config.convergence_threshold,
        );
        sink.emit(DebateEvent::Benchmarks {
            metrics: Box::new(metrics.clone()),
        });
        outcome.metrics = Some(metrics.clone());
        if let Some(store) = &self.store {
            if let Err(e) = store.save_benchmarks(&run_id, &metrics).await {
                return Ok(storage_failed(outcome, e, sink));
            }
        }

        tracing::info!(
            run_id = %run_id,
            community_nodes = community.nodes.len(),
            cruxes = cruxes.len(),
            convergence_round = ?metrics.convergence_round,
            "belief pipeline finished"
        );
        Ok(outcome)
    }

    async fn persist_qbaf(&self, run_id: &str, qbaf: &PersonaQbaf) -> Result<(), StorageError> {
        if let Some(store) = &self.store {
            store.save_qbaf(run_id, qbaf).await?;
        }
        Ok(())
    }

    fn or_single_root(
        &self,
        extracted: Result<PersonaQbaf, LlmError>,
        persona: &PersonaSpec,
        topic: &str,
    ) -> PersonaQbaf {
        extracted.unwrap_or_else(|e| {
            tracing::warn!(persona = %persona.id, error = %e, "extraction failed; using single root");
            PersonaQbaf::single_root(&persona.id, topic, &persona.worldview, 0.5)
        })
    }

    async fn extract(&self, persona: &PersonaSpec, topic: &str) -> Result<PersonaQbaf, LlmError> {
        let system = format!(
            "[task:extract-qbaf] You are {} ({}). Worldview: {}",
            persona.name, persona.id, persona.worldview
        );
        let prompt = format!(
            "Topic: {}\n\nLay out your belief structure as a graph. Use the id \"root\" for your \
             overall thesis on the topic. Other nodes are pro or con arguments or evidence, each \
             with a base score for how plausible you find it on its own. Edges say which node \
             attacks or supports which, with a weight.",
            topic
        );
        let extracted: ExtractedQbaf =
            complete_structured(self.llm.as_ref(), &system, &prompt, &extraction_schema()).await?;

        let local = |id: &str| {
            if id == "root" {
                root_id(&persona.id)
            } else {
                format!("{}-{}", persona.id, id)
            }
        };
        let nodes = extracted
            .nodes
            .into_iter()
            .map(|n| {
                let id = if n.node_type == NodeType::Root {
                    root_id(&persona.id)
                } else {
                    local(&n.id)
                };
                let mut node = QbafNode::new(&id, &n.claim, n.node_type, n.base_score, &persona.id);
                node.grounding = n.grounding;
                node
            })
            .collect();
        let edges = extracted
            .edges
            .into_iter()
            .map(|e| match e.edge_type {
                EdgeType::Attack => QbafEdge::attack(&local(&e.from), &local(&e.to), e.weight),
                EdgeType::Support => QbafEdge::support(&local(&e.from), &local(&e.to), e.weight),
            })
            .collect();
        Ok(PersonaQbaf::assemble(
            &persona.id,
            topic,
            &extracted.root_claim,
            nodes,
            edges,
        ))
    }

    async fn resistance(&self, persona: &PersonaSpec, topic: &str) -> f64 {
        if let Some(r) = persona.revision_resistance {
            return r;
        }
        let system = format!("[task:resistance] You assess how firmly {} holds views.", persona.name);
        let prompt = format!(
            "Worldview: {}\nTopic: {}\n\nOn a scale from 0 (changes mind easily) to 1 (never \
             changes mind), how resistant is this persona to revising beliefs on this topic?",
            persona.worldview, topic
        );
        match complete_structured::<Resistance, _>(
            self.llm.as_ref(),
            &system,
            &prompt,
            &resistance_schema(),
        )
        .await
        {
            Ok(r) => r.resistance.clamp(0.0, 1.0),
            Err(e) => {
                tracing::warn!(persona = %persona.id, error = %e, "resistance estimate failed; using default");
                self.config.default_resistance
            }
        }
    }

    /// Moves `persona` makes against `opponent`'s graph, as nodes and edges
    /// ready to append to it. Stale targets are dropped; a failed call
    /// yields no moves.
    async fn moves(
        &self,
        persona: &PersonaSpec,
        own: &PersonaQbaf,
        opponent: &PersonaQbaf,
        round: u32,
    ) -> (Vec<QbafNode>, Vec<QbafEdge>) {
        let system = format!(
            "[task:moves] You are {} ({}). Worldview: {}",
            persona.name, persona.id, persona.worldview
        );
        let prompt = format!(
            "Your beliefs:\n{}\nYour opponent's beliefs:\n{}\nMake up to three moves. Each move \
             attacks or supports one of your opponent's nodes by id with a new claim.",
            describe_qbaf(own),
            describe_qbaf(opponent)
        );
        let moves = match complete_structured::<Moves, _>(
            self.llm.as_ref(),
            &system,
            &prompt,
            &moves_schema(),
        )
        .await
        {
            Ok(m) => m.moves,
            Err(e) => {
                tracing::warn!(persona = %persona.id, round, error = %e, "move call failed; no moves this round");
                return (Vec::new(), Vec::new());
            }
        };

        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for (i, m) in moves.into_iter().enumerate() {
            let Some(target) = opponent.node(&m.target) else {
                tracing::debug!(persona = %persona.id, target = %m.target, "dropping move on stale node");
                continue;
            };
            let id = format!("{}-r{}-m{}", persona.id, round, i);
            let (node_type, edge) = match m.edge_type {
                EdgeType::Attack => (NodeType::Con, QbafEdge::attack(&id, &target.id, m.weight)),
                EdgeType::Support => (NodeType::Pro, QbafEdge::support(&id, &target.id, m.weight)),
            };
            nodes.push(QbafNode::new(&id, &m.claim, node_type, m.base_score, &persona.id));
            edges.push(edge);
        }
        (nodes, edges)
    }

    /// Judge the updated graph and revise toward the damped judgment. On a
    /// failed call the graph is returned unrevised with the error.
    async fn revise(
        &self,
        persona: &PersonaSpec,
        qbaf: PersonaQbaf,
        opponent: &PersonaQbaf,
        resistance: f64,
    ) -> (PersonaQbaf, Result<RevisionResult, LlmError>) {
        let system = format!(
            "[task:judge] You are {} ({}). Worldview: {}",
            persona.name, persona.id, persona.worldview
        );
        let prompt = format!(
            "Your thesis: {}\n\nYour belief graph after this round's exchange:\n{}\nYour \
             opponent's position:\n{}\nHaving weighed the new arguments, how strongly do you now \
             hold your thesis, from 0 to 1?",
            qbaf.root_claim,
            describe_qbaf(&qbaf),
            describe_qbaf(opponent)
        );
        let judged = complete_structured::<Judgment, _>(
            self.llm.as_ref(),
            &system,
            &prompt,
            &judgment_schema(),
        )
        .await;
        match judged {
            Ok(judgment) => {
                let target = revision_target(
                    qbaf.root_strength(),
                    judgment.strength,
                    resistance,
                    self.config.revision.max_round_shift,
                );
                let result = revise_beliefs(&qbaf, target, &self.config.revision);
                tracing::debug!(
                    persona = %persona.id,
                    round = qbaf.round,
                    target,
                    final_strength = result.final_strength,
                    iterations = result.iterations,
                    "beliefs revised"
                );
                (result.qbaf.clone(), Ok(result))
            }
            Err(e) => (qbaf, Err(e)),
        }
    }

    async fn compare(&self, a: &PersonaQbaf, b: &PersonaQbaf) -> Vec<ClaimComparison> {
        let pairs = candidate_pairs(a, b, self.config.max_candidate_pairs);
        if pairs.is_empty() {
            return Vec::new();
        }
        let mut prompt = String::from(
            "For each numbered pair of claims, say whether they agree, oppose each other, or are \
             merely related, with your confidence. Omit pairs about different things.\n\n",
        );
        for (i, (x, y)) in pairs.iter().enumerate() {
            prompt.push_str(&format!("{}. A: {}\n   B: {}\n", i, x.claim, y.claim));
        }
        let system = "[task:compare] You compare claims made by two different people.";
        let reply = complete_structured::<Comparisons, _>(
            self.llm.as_ref(),
            system,
            &prompt,
            &comparison_schema(),
        )
        .await;
        match reply {
            Ok(reply) => reply
                .comparisons
                .into_iter()
                .filter_map(|c| {
                    let (x, y) = pairs.get(c.pair)?;
                    Some(ClaimComparison {
                        a_node_id: x.id.clone(),
                        b_node_id: y.id.clone(),
                        relationship: c.relationship,
                        confidence: c.confidence.clamp(0.0, 1.0),
                        shared_topic: c.shared_topic,
                    })
                })
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "comparison call failed; community graph will not merge");
                Vec::new()
            }
        }
    }

    async fn settling_question(&self, crux: &StructuralCrux, topic: &str) -> Option<String> {
        let prompt = format!(
            "Topic: {}\nDisputed claim: {}\n{}\n\nWrite one concrete, empirically answerable \
             question whose answer would settle this disagreement.",
            topic, crux.claim, crux.counterfactual
        );
        complete_text(
            self.llm.as_ref(),
            "[task:settling-question] Reply with the question only.",
            &prompt,
        )
        .await
        .inspect_err(|e| tracing::warn!(crux = %crux.id, error = %e, "no settling question"))
        .ok()
    }
}

fn trajectory(
    persona_id: &str,
    histories: &BTreeMap<String, Vec<PersonaQbaf>>,
    revisions: &BTreeMap<String, Vec<RevisionResult>>,
) -> PersonaTrajectory {
    let history = histories.get(persona_id).map(Vec::as_slice).unwrap_or_default();
    PersonaTrajectory {
        persona_id: persona_id.to_string(),
        root_strengths: history.iter().map(PersonaQbaf::root_strength).collect(),
        initial_nodes: history.first().map(|q| q.nodes.len()).unwrap_or(0),
        final_nodes: history.last().map(|q| q.nodes.len()).unwrap_or(0),
        revision_cost: revisions
            .get(persona_id)
            .map(|r| r.iter().map(|r| r.total_shift).sum::<f64>())
            .unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_llm::MockProvider;

    #[tokio::test]
    async fn test_requires_exactly_two_personas() {
        let pipeline = BeliefPipeline::new(Arc::new(MockProvider::failing()), BeliefConfig::default());
        let one = [PersonaSpec::new("a", "A", "w")];
        let err = pipeline.run(&one, "t", &EventSink::noop()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidInput(_)));

        let twins = [PersonaSpec::new("a", "A", "w"), PersonaSpec::new("a", "A2", "w")];
        let err = pipeline.run(&twins, "t", &EventSink::noop()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_both_extractions_failing_terminates() {
        let pipeline = BeliefPipeline::new(Arc::new(MockProvider::failing()), BeliefConfig::default());
        let personas = [PersonaSpec::new("a", "A", "w"), PersonaSpec::new("b", "B", "v")];
        let (sink, mut rx) = EventSink::channel();
        let outcome = pipeline.run(&personas, "t", &sink).await.unwrap();

        assert_eq!(outcome.stage_reached, PipelineStage::Extraction);
        assert!(outcome.terminated.is_some());
        assert!(outcome.histories.is_empty());
        assert!(outcome.metrics.is_none());
        let events = crate::events::drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [DebateEvent::Terminated { phase_reached, .. }] if phase_reached == "extraction"
        ));
    }

    #[test]
    fn test_trajectory_from_history() {
        let first = dfquad::evaluate(&PersonaQbaf::single_root("a", "t", "thesis", 0.4));
        let second = first.append_round(
            vec![QbafNode::new("b-r1-m0", "counter", NodeType::Con, 0.8, "b")],
            vec![QbafEdge::attack("b-r1-m0", &root_id("a"), 1.0)],
        );
        let second = dfquad::evaluate(&second);
        let histories = BTreeMap::from([("a".to_string(), vec![first, second])]);

        let t = trajectory("a", &histories, &BTreeMap::new());
        assert_eq!(t.root_strengths.len(), 2);
        assert!((t.initial_strength() - 0.4).abs() < 1e-9);
        assert!(t.final_strength() < 0.4);
        assert_eq!((t.initial_nodes, t.final_nodes), (1, 2));
        assert_eq!(t.revision_cost, 0.0);

        let missing = trajectory("z", &histories, &BTreeMap::new());
        assert!(missing.root_strengths.is_empty());
    }
}
