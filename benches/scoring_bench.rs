//! Gene overlap scoring and link geometry over synthetic snapshots.

#![allow(missing_docs, unused_results)]

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use polyphony::anchor::{Anchor, AnchorCell, AnchorSnapshot, GeneRef, RankedGenes};
use polyphony::columns::{CellIndex, Embedding};
use polyphony::links::{LinkGeometryBuilder, LinkInputs};
use polyphony::scoring::{
    top_gene_score, CellPartition, GeneOverlapScorer, ReferenceRankings,
    ScoringInputs,
};

const GENES: usize = 2000;
const CELLS_PER_ANCHOR: usize = 50;
const CLUSTERS: usize = 20;

fn gene_names() -> Vec<String> {
    (0..GENES).map(|i| format!("gene{i}")).collect()
}

fn snapshot(anchors: usize) -> AnchorSnapshot {
    let unjustified = (0..anchors)
        .map(|a| Anchor {
            id: format!("qry-{a}"),
            reference_cluster_id: (a % CLUSTERS).to_string(),
            cells: (0..CELLS_PER_ANCHOR)
                .map(|c| AnchorCell::new(format!("c{}", a * CELLS_PER_ANCHOR + c)))
                .collect(),
            ranked_genes: RankedGenes {
                genes: (0..200).map(|g| GeneRef::Index((a * 7 + g * 3) % GENES)).collect(),
                scores: (0..200).map(|g| 200.0 - f64::from(g)).collect(),
            },
            median_anchor_distance: Some(0.5),
        })
        .collect();
    AnchorSnapshot {
        unjustified,
        ..AnchorSnapshot::default()
    }
}

fn rankings(genes: &[String]) -> ReferenceRankings {
    let names = (0..CLUSTERS)
        .map(|c| (0..200).map(|g| genes[(c * 11 + g * 5) % GENES].clone()).collect())
        .collect();
    let scores = (0..CLUSTERS)
        .map(|_| (0..200).map(|g| 200.0 - f64::from(g)).collect())
        .collect();
    ReferenceRankings::new((0..CLUSTERS).map(|c| c.to_string()).collect(), names, scores)
        .unwrap()
}

fn jaccard_benchmark(c: &mut Criterion) {
    let genes = gene_names();
    let q = &genes[..100];
    let r = &genes[50..150];
    c.bench_function("top_gene_score_100", |b| {
        b.iter(|| black_box(top_gene_score(black_box(q), black_box(r))))
    });
}

fn snapshot_benchmark(c: &mut Criterion) {
    let genes = gene_names();
    let reference = rankings(&genes);
    let scorer = GeneOverlapScorer::default();
    let mut group = c.benchmark_group("score_snapshot");

    for count in [10, 50, 200] {
        let snapshot = snapshot(count);
        let cell_ids: Vec<String> = (0..count * CELLS_PER_ANCHOR).map(|i| format!("c{i}")).collect();
        let labels = (0..cell_ids.len()).map(|i| format!("type{}", i % 8)).collect();
        let cells = CellIndex::new(cell_ids);
        let partition = CellPartition::new("Prediction", labels, &[], [60, 60, 60]);
        let inputs = ScoringInputs {
            query_genes: &genes,
            reference: &reference,
            query_cells: &cells,
            partition: &partition,
        };
        group.bench_function(format!("{count}_anchors"), |b| {
            b.iter(|| black_box(scorer.score_snapshot(&snapshot, &inputs)))
        });
    }
    group.finish();
}

fn links_benchmark(c: &mut Criterion) {
    let snapshot = snapshot(200);
    let n = 200 * CELLS_PER_ANCHOR;
    let cells = CellIndex::new((0..n).map(|i| format!("c{i}")).collect());
    let coords: Vec<f32> = (0..n).map(|i| i as f32 * 0.01).collect();
    let embedding = Embedding::new(coords.clone(), coords).unwrap();
    let reference_clusters: Vec<String> = (0..n).map(|i| (i % CLUSTERS).to_string()).collect();

    c.bench_function("links_200_anchors", |b| {
        b.iter(|| {
            black_box(LinkGeometryBuilder.build(&LinkInputs {
                snapshot: &snapshot,
                query_cells: &cells,
                query_embedding: &embedding,
                reference_embedding: &embedding,
                reference_clusters: &reference_clusters,
                scores: None,
            }))
        })
    });
}

criterion_group!(benches, jaccard_benchmark, snapshot_benchmark, links_benchmark);
criterion_main!(benches);
