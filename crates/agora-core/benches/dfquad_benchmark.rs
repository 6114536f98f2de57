use agora_core::dfquad;
use agora_core::{NodeType, PersonaQbaf, QbafEdge, QbafNode};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Layered tree: every node of layer k has `fanout` children in layer k+1
fn generate_qbaf(layers: u32, fanout: usize) -> PersonaQbaf {
    let mut nodes = vec![QbafNode::new("n0", "root", NodeType::Root, 0.5, "bench")];
    let mut edges = Vec::new();
    let mut previous = vec!["n0".to_string()];
    let mut counter = 1;
    for layer in 1..=layers {
        let mut current = Vec::new();
        for parent in &previous {
            for child in 0..fanout {
                let id = format!("n{}", counter);
                counter += 1;
                let node_type = if child % 2 == 0 { NodeType::Pro } else { NodeType::Con };
                nodes.push(QbafNode::new(&id, &id, node_type, 0.5, "bench").at_depth(layer));
                edges.push(if child % 2 == 0 {
                    QbafEdge::support(&id, parent, 0.8)
                } else {
                    QbafEdge::attack(&id, parent, 0.8)
                });
                current.push(id);
            }
        }
        previous = current;
    }
    PersonaQbaf::assemble("bench", "bench", "root", nodes, edges)
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("dfquad::evaluate");
    for layers in [2u32, 3, 4].iter() {
        let qbaf = generate_qbaf(*layers, 3);
        group.bench_with_input(BenchmarkId::from_parameter(layers), &qbaf, |b, qbaf| {
            b.iter(|| dfquad::evaluate(black_box(qbaf)))
        });
    }
    group.finish();
}

fn bench_counterfactual(c: &mut Criterion) {
    let qbaf = generate_qbaf(3, 3);
    c.bench_function("dfquad::counterfactual_impact", |b| {
        b.iter(|| dfquad::counterfactual_impact(black_box(&qbaf), "n1", "n0"))
    });
}

criterion_group!(benches, bench_evaluate, bench_counterfactual);
criterion_main!(benches);
