//! Community graph, crux ranking and benchmarks over two revised personas

use agora_adversarial::{
    aggregate_benchmarks, build_community_graph, identify_cruxes, ClaimComparison,
    ClaimRelationship, Classification, CommunityConfig, PersonaTrajectory,
    DEFAULT_CONVERGENCE_THRESHOLD,
};
use agora_core::{
    dfquad, revise_beliefs, root_id, NodeType, PersonaQbaf, QbafEdge, QbafNode, RevisionConfig,
};

fn persona(id: &str, thesis: f64, cost: f64, benefit: f64) -> PersonaQbaf {
    let root = root_id(id);
    let con = format!("{}-cost", id);
    let pro = format!("{}-benefit", id);
    PersonaQbaf::assemble(
        id,
        "congestion pricing",
        "Cities should adopt congestion pricing",
        vec![
            QbafNode::new(&root, "Cities should adopt congestion pricing", NodeType::Root, thesis, id),
            QbafNode::new(&con, "Pricing burdens low-income commuters", NodeType::Con, cost, id),
            QbafNode::new(&pro, "Pricing cuts travel times", NodeType::Pro, benefit, id),
        ],
        vec![
            QbafEdge::attack(&con, &root, 1.0),
            QbafEdge::support(&pro, &root, 0.8),
        ],
    )
}

fn comparison(a: &str, b: &str, relationship: ClaimRelationship, confidence: f64) -> ClaimComparison {
    ClaimComparison {
        a_node_id: a.to_string(),
        b_node_id: b.to_string(),
        relationship,
        confidence,
        shared_topic: None,
    }
}

#[test]
fn test_two_persona_run() {
    let urbanist = dfquad::evaluate(&persona("urbanist", 0.6, 0.2, 0.9));
    let skeptic = dfquad::evaluate(&persona("skeptic", 0.5, 0.95, 0.3));
    assert!(urbanist.root_strength() > skeptic.root_strength());

    // One revision round each, pulled toward the other side
    let config = RevisionConfig::default();
    let urbanist_revised = revise_beliefs(&urbanist, urbanist.root_strength() - 0.1, &config);
    let skeptic_revised = revise_beliefs(&skeptic, skeptic.root_strength() + 0.1, &config);
    assert!(urbanist_revised.total_shift >= 0.0);
    assert!(skeptic_revised.total_shift >= 0.0);

    let comparisons = vec![
        comparison("urbanist-root", "skeptic-root", ClaimRelationship::Opposition, 0.95),
        comparison("urbanist-cost", "skeptic-cost", ClaimRelationship::Agreement, 0.9),
        comparison("urbanist-benefit", "skeptic-benefit", ClaimRelationship::Related, 0.7),
    ];
    let community = build_community_graph(
        &urbanist_revised.qbaf,
        &skeptic_revised.qbaf,
        &comparisons,
        &CommunityConfig::default(),
    );
    assert_eq!(community.nodes.len(), 3);
    assert_eq!(community.edges.len(), 2);
    for node in &community.nodes {
        assert!(node.merged_from.len() == 2);
    }
    assert_eq!(community.nodes[0].classification, Classification::Crux);

    let cruxes = identify_cruxes(&community, &urbanist_revised.qbaf, &skeptic_revised.qbaf, 3);
    assert!(!cruxes.is_empty());
    for pair in cruxes.windows(2) {
        assert!(pair[0].crux_score >= pair[1].crux_score);
    }

    let trajectories = vec![
        PersonaTrajectory {
            persona_id: "urbanist".to_string(),
            root_strengths: vec![urbanist.root_strength(), urbanist_revised.final_strength],
            initial_nodes: urbanist.nodes.len(),
            final_nodes: urbanist_revised.qbaf.nodes.len(),
            revision_cost: urbanist_revised.total_shift,
        },
        PersonaTrajectory {
            persona_id: "skeptic".to_string(),
            root_strengths: vec![skeptic.root_strength(), skeptic_revised.final_strength],
            initial_nodes: skeptic.nodes.len(),
            final_nodes: skeptic_revised.qbaf.nodes.len(),
            revision_cost: skeptic_revised.total_shift,
        },
    ];
    let metrics = aggregate_benchmarks(&trajectories, &community, &cruxes, DEFAULT_CONVERGENCE_THRESHOLD);
    assert_eq!(metrics.rounds, 1);
    assert!(metrics.stance_divergence_delta < 0.0);
    assert!((metrics.argument_coverage - 1.0).abs() < 1e-12);
    assert!(metrics.crux_localization_rate > 0.0);
}

#[test]
fn test_degenerate_personas_still_merge() {
    let a = PersonaQbaf::assemble("a", "t", "thesis", Vec::new(), Vec::new());
    let b = PersonaQbaf::assemble("b", "t", "thesis", Vec::new(), Vec::new());
    assert_eq!(a.nodes.len(), 1);

    let community = build_community_graph(
        &dfquad::evaluate(&a),
        &dfquad::evaluate(&b),
        &[comparison("a-root", "b-root", ClaimRelationship::Agreement, 1.0)],
        &CommunityConfig::default(),
    );
    assert_eq!(community.nodes.len(), 1);
    assert_eq!(community.nodes[0].classification, Classification::Consensus);
    assert!((community.nodes[0].community_strength - 0.5).abs() < 1e-12);
}

#[test]
fn test_every_node_has_one_classification() {
    let a = persona("a", 0.9, 0.1, 0.5);
    let b = persona("b", 0.1, 0.9, 0.5);
    let comparisons = vec![comparison("a-root", "b-root", ClaimRelationship::Related, 0.5)];
    let community = build_community_graph(&a, &b, &comparisons, &CommunityConfig::default());
    for node in &community.nodes {
        if node.merged_from.len() < 2 {
            assert_ne!(node.classification, Classification::Consensus);
        }
    }
    // variance of (0.9, 0.1) is 0.32 > 0.3
    assert_eq!(community.nodes[0].classification, Classification::Crux);
}
