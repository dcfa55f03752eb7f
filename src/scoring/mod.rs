//! Differential-gene overlap scoring of query anchors against their linked
//! reference clusters.
//!
//! For each anchor the top-N genes of the anchor and of its reference
//! cluster are compared with a Jaccard index expressed as a percentage
//! (`topGeneScore`). The report also carries per-gene ranks and scores on both
//! sides and the composition of the anchor's cells by predicted class.

mod reference;
mod separated;

use rustc_hash::{FxHashMap, FxHashSet};

pub use reference::{
    class_names, CellPartition, PartitionClass, RankedList,
    ReferenceRankings,
};
pub use separated::{rank_triangles, SeparatedGene, SeparatedGenes};

use crate::anchor::{Anchor, AnchorBucket, AnchorSnapshot};
use crate::columns::CellIndex;
use crate::coordination::Rgb;
use crate::options::ScoringOptions;

/// Number of top genes compared per side.
pub const DEFAULT_TOP_N: usize = 100;

/// A value observed on the query and on the reference side.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PerSide<T> {
    /// Query anchor side.
    pub query: T,
    /// Reference cluster side.
    pub reference: T,
}

/// One display gene of an anchor report.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneRow {
    /// Gene name.
    pub name: String,
    /// 1-based rank in each side's full list; `None` if absent.
    pub rank: PerSide<Option<usize>>,
    /// Raw score on each side; `None` if absent.
    pub score: PerSide<Option<f64>>,
    /// Whether the gene is in each side's top-N.
    pub significant: PerSide<bool>,
}

/// Share of an anchor's cells falling in one predicted class.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionProportion {
    /// Class label.
    pub name: String,
    /// Class display color.
    pub color: Rgb,
    /// Fraction of member cells in the class, in `[0, 1]`.
    pub proportion: f64,
}

/// Scoring result for one anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorGeneReport {
    /// Anchor id.
    pub id: String,
    /// Bucket the anchor was in.
    pub bucket: AnchorBucket,
    /// Linked reference cluster.
    pub reference_cluster_id: String,
    /// Jaccard overlap of the two top-N gene sets, in `[0, 100]`.
    pub top_gene_score: f64,
    /// Union of both top-N lists, query genes first.
    pub genes: Vec<GeneRow>,
    /// Median latent distance reported by the model.
    pub latent_dist: Option<f64>,
    /// Number of member cells.
    pub num_cells: usize,
    /// Member composition by predicted class, in partition class order.
    pub prediction_proportions: Vec<PredictionProportion>,
}

impl AnchorGeneReport {
    /// Display gene names, in row order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.genes.iter().map(|g| g.name.as_str())
    }
}

/// Reports for every anchor of a snapshot, in snapshot order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotScores {
    reports: Vec<AnchorGeneReport>,
    by_id: FxHashMap<String, usize>,
}

impl SnapshotScores {
    fn new(reports: Vec<AnchorGeneReport>) -> Self {
        let mut by_id = FxHashMap::default();
        for (i, r) in reports.iter().enumerate() {
            let _ = by_id.entry(r.id.clone()).or_insert(i);
        }
        Self { reports, by_id }
    }

    /// Report of anchor `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AnchorGeneReport> {
        self.reports.get(*self.by_id.get(id)?)
    }

    /// Reports of one bucket.
    pub fn bucket(
        &self,
        bucket: AnchorBucket,
    ) -> impl Iterator<Item = &AnchorGeneReport> {
        self.reports.iter().filter(move |r| r.bucket == bucket)
    }

    /// All reports.
    #[must_use]
    pub fn reports(&self) -> &[AnchorGeneReport] {
        &self.reports
    }

    /// Number of reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Whether there are no reports.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

/// Everything the scorer reads besides the anchors themselves.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInputs<'a> {
    /// Query gene (var) index the anchors' gene indices point into.
    pub query_genes: &'a [String],
    /// Differential genes of the reference clusters.
    pub reference: &'a ReferenceRankings,
    /// Query cell index.
    pub query_cells: &'a CellIndex,
    /// Query categorical partition (predicted class per cell).
    pub partition: &'a CellPartition,
}

/// Jaccard similarity of two name lists as a percentage in `[0, 100]`.
///
/// Duplicates are ignored. Two empty lists score 0.
#[must_use]
pub fn top_gene_score(query_top: &[String], reference_top: &[String]) -> f64 {
    let q: FxHashSet<&str> = query_top.iter().map(String::as_str).collect();
    let r: FxHashSet<&str> = reference_top.iter().map(String::as_str).collect();
    let union = q.union(&r).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = q.intersection(&r).count();
    intersection as f64 / union as f64 * 100.0
}

/// First position of every name.
fn positions(names: &[String]) -> FxHashMap<&str, usize> {
    let mut map =
        FxHashMap::with_capacity_and_hasher(names.len(), Default::default());
    for (i, n) in names.iter().enumerate() {
        let _ = map.entry(n.as_str()).or_insert(i);
    }
    map
}

/// Deterministic gene overlap scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneOverlapScorer {
    top_n: usize,
}

impl Default for GeneOverlapScorer {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_N)
    }
}

impl GeneOverlapScorer {
    /// Scorer comparing the top `top_n` genes per side.
    #[must_use]
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    /// Scorer configured from options.
    #[must_use]
    pub fn from_options(options: &ScoringOptions) -> Self {
        Self::new(options.top_n)
    }

    /// Number of top genes compared.
    #[must_use]
    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Compare one query gene list with one reference gene list.
    ///
    /// Returns the overlap score and the display rows for the union of both
    /// top-N lists (query top genes first, then reference-only ones).
    #[must_use]
    pub fn compare(
        &self,
        query: RankedList<'_>,
        reference: RankedList<'_>,
    ) -> (f64, Vec<GeneRow>) {
        let query_top = query.top(self.top_n);
        let reference_top = reference.top(self.top_n);
        let score = top_gene_score(query_top, reference_top);

        let query_pos = positions(query.names);
        let reference_pos = positions(reference.names);
        let query_top_set: FxHashSet<&str> =
            query_top.iter().map(String::as_str).collect();
        let reference_top_set: FxHashSet<&str> =
            reference_top.iter().map(String::as_str).collect();

        let mut seen = FxHashSet::default();
        let rows = query_top
            .iter()
            .chain(reference_top)
            .filter(|n| seen.insert(n.as_str()))
            .map(|name| {
                let q = query_pos.get(name.as_str()).copied();
                let r = reference_pos.get(name.as_str()).copied();
                GeneRow {
                    name: name.clone(),
                    rank: PerSide {
                        query: q.map(|i| i + 1),
                        reference: r.map(|i| i + 1),
                    },
                    score: PerSide {
                        query: q.and_then(|i| query.scores.get(i).copied()),
                        reference: r
                            .and_then(|i| reference.scores.get(i).copied()),
                    },
                    significant: PerSide {
                        query: query_top_set.contains(name.as_str()),
                        reference: reference_top_set.contains(name.as_str()),
                    },
                }
            })
            .collect();
        (score, rows)
    }

    /// Score one anchor against its linked reference cluster. An unknown
    /// reference cluster compares against an empty list.
    #[must_use]
    pub fn score_anchor(
        &self,
        bucket: AnchorBucket,
        anchor: &Anchor,
        inputs: &ScoringInputs<'_>,
    ) -> AnchorGeneReport {
        let (query_names, query_scores) =
            anchor.ranked_genes.resolve(inputs.query_genes);
        let query = RankedList {
            names: &query_names,
            scores: &query_scores,
        };
        let reference = inputs
            .reference
            .cluster(&anchor.reference_cluster_id)
            .unwrap_or_else(|| {
                log::debug!(
                    "anchor {} links unknown reference cluster {}",
                    anchor.id,
                    anchor.reference_cluster_id
                );
                RankedList::EMPTY
            });
        let (top_gene_score, genes) = self.compare(query, reference);

        AnchorGeneReport {
            id: anchor.id.clone(),
            bucket,
            reference_cluster_id: anchor.reference_cluster_id.clone(),
            top_gene_score,
            genes,
            latent_dist: anchor.median_anchor_distance,
            num_cells: anchor.cells.len(),
            prediction_proportions: prediction_proportions(
                anchor,
                inputs.query_cells,
                inputs.partition,
            ),
        }
    }

    /// Score every anchor of `snapshot`.
    #[must_use]
    pub fn score_snapshot(
        &self,
        snapshot: &AnchorSnapshot,
        inputs: &ScoringInputs<'_>,
    ) -> SnapshotScores {
        SnapshotScores::new(
            snapshot
                .iter()
                .map(|(bucket, anchor)| self.score_anchor(bucket, anchor, inputs))
                .collect(),
        )
    }
}

/// Member composition of `anchor` by partition class. Members missing from
/// the cell index count towards the total but towards no class.
#[must_use]
pub fn prediction_proportions(
    anchor: &Anchor,
    cells: &CellIndex,
    partition: &CellPartition,
) -> Vec<PredictionProportion> {
    let total = anchor.cells.len();
    let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
    for label in anchor
        .cell_ids()
        .filter_map(|id| partition.label(cells.position(id)?))
    {
        *counts.entry(label).or_default() += 1;
    }
    partition
        .classes()
        .iter()
        .map(|class| {
            let n = counts.get(class.name.as_str()).copied().unwrap_or(0);
            PredictionProportion {
                name: class.name.clone(),
                color: class.color,
                proportion: if total == 0 {
                    0.0
                } else {
                    n as f64 / total as f64
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::{AnchorCell, GeneRef, RankedGenes};

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| (*s).to_owned()).collect()
    }

    fn anchor(id: &str, ref_id: &str, cells: &[&str], genes: &[&str]) -> Anchor {
        Anchor {
            id: id.into(),
            reference_cluster_id: ref_id.into(),
            cells: cells.iter().map(|c| AnchorCell::new(*c)).collect(),
            ranked_genes: RankedGenes {
                genes: genes.iter().map(|g| GeneRef::Name((*g).to_owned())).collect(),
                scores: (0..genes.len()).rev().map(|s| s as f64).collect(),
            },
            median_anchor_distance: Some(0.3),
        }
    }

    #[test]
    fn jaccard_of_overlapping_lists() {
        let score = top_gene_score(&names(&["A", "B", "C"]), &names(&["B", "C", "D"]));
        assert_eq!(score, 50.0);
    }

    #[test]
    fn empty_side_scores_zero() {
        assert_eq!(top_gene_score(&[], &names(&["X", "Y"])), 0.0);
        assert_eq!(top_gene_score(&[], &[]), 0.0);
    }

    #[test]
    fn rows_carry_ranks_scores_and_significance() {
        let scorer = GeneOverlapScorer::new(2);
        let q_names = names(&["A", "B", "C"]);
        let r_names = names(&["C", "B", "D"]);
        let (score, rows) = scorer.compare(
            RankedList { names: &q_names, scores: &[3.0, 2.0, 1.0] },
            RankedList { names: &r_names, scores: &[9.0, 8.0, 7.0] },
        );
        // top-2: {A, B} vs {C, B}
        assert!((score - 100.0 / 3.0).abs() < 1e-9);
        let order: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(order, ["A", "B", "C"]);

        let c = &rows[2];
        assert_eq!(c.rank, PerSide { query: Some(3), reference: Some(1) });
        assert_eq!(c.score, PerSide { query: Some(1.0), reference: Some(9.0) });
        assert_eq!(c.significant, PerSide { query: false, reference: true });

        let a = &rows[0];
        assert_eq!(a.rank.reference, None);
        assert_eq!(a.score.reference, None);
    }

    #[test]
    fn snapshot_reports_with_missing_cluster_and_proportions() {
        let reference = ReferenceRankings::new(
            vec!["1".into()],
            vec![names(&["CD3E", "CD8A", "NKG7"])],
            vec![vec![5.0, 4.0, 3.0]],
        )
        .unwrap();
        let cells = CellIndex::new(names(&["c0", "c1", "c2", "c3"]));
        let partition = CellPartition::new(
            "Prediction",
            names(&["T", "T", "B", "B"]),
            &[],
            [60, 60, 60],
        );
        let inputs = ScoringInputs {
            query_genes: &[],
            reference: &reference,
            query_cells: &cells,
            partition: &partition,
        };
        let snapshot = AnchorSnapshot {
            unjustified: vec![
                anchor("qry-0", "1", &["c0", "c1", "c2", "missing"], &["CD3E", "CD8A"]),
                anchor("qry-1", "404", &[], &["MS4A1"]),
            ],
            ..AnchorSnapshot::default()
        };

        let scores = GeneOverlapScorer::default().score_snapshot(&snapshot, &inputs);
        assert_eq!(scores.len(), 2);

        let first = scores.get("qry-0").unwrap();
        assert!((first.top_gene_score - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(first.num_cells, 4);
        assert_eq!(first.latent_dist, Some(0.3));
        let props: Vec<_> = first
            .prediction_proportions
            .iter()
            .map(|p| (p.name.as_str(), p.proportion))
            .collect();
        assert_eq!(props, [("B", 0.25), ("T", 0.5)]);
        assert_eq!(first.prediction_proportions[0].color, [60, 60, 60]);

        let second = scores.get("qry-1").unwrap();
        assert_eq!(second.top_gene_score, 0.0);
        assert!(second.prediction_proportions.iter().all(|p| p.proportion == 0.0));
        assert_eq!(scores.bucket(AnchorBucket::Unjustified).count(), 2);
        assert_eq!(scores.bucket(AnchorBucket::Confirmed).count(), 0);
    }
}
