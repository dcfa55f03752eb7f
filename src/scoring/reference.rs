use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::columns::{CellIndex, Matrix};
use crate::coordination::{color_of, CellSetColor, CellSetPath, Rgb};
use crate::error::PolyphonyError;

/// Rank-ordered gene names and scores of one list, most significant first.
#[derive(Debug, Clone, Copy)]
pub struct RankedList<'a> {
    /// Gene names.
    pub names: &'a [String],
    /// Parallel scores.
    pub scores: &'a [f64],
}

impl RankedList<'static> {
    /// The empty list.
    pub const EMPTY: Self = Self {
        names: &[],
        scores: &[],
    };
}

impl<'a> RankedList<'a> {
    /// First `n` names.
    #[must_use]
    pub fn top(&self, n: usize) -> &'a [String] {
        &self.names[..n.min(self.names.len())]
    }
}

/// Differential genes of every reference cluster.
#[derive(Debug, Clone, Default)]
pub struct ReferenceRankings {
    clusters: CellIndex,
    names: Vec<Vec<String>>,
    scores: Vec<Vec<f64>>,
}

impl ReferenceRankings {
    /// Rankings from already-resolved rows, one per cluster id.
    ///
    /// # Errors
    ///
    /// Returns [`PolyphonyError::Column`] if the three inputs disagree on
    /// the number of clusters.
    pub fn new(
        cluster_ids: Vec<String>,
        names: Vec<Vec<String>>,
        scores: Vec<Vec<f64>>,
    ) -> Result<Self, PolyphonyError> {
        if cluster_ids.len() != names.len() || names.len() != scores.len() {
            return Err(PolyphonyError::Column(format!(
                "{} reference clusters, {} gene rows, {} score rows",
                cluster_ids.len(),
                names.len(),
                scores.len()
            )));
        }
        Ok(Self {
            clusters: CellIndex::new(cluster_ids),
            names,
            scores,
        })
    }

    /// Rankings from the raw columns: a `clusters x rank` matrix of gene
    /// indices, the matching score matrix, the cluster id of each row and
    /// the gene index the indices point into. Indices outside the gene
    /// index are dropped together with their score.
    ///
    /// # Errors
    ///
    /// Returns [`PolyphonyError::Column`] on mismatched shapes.
    pub fn from_columns(
        cluster_ids: &[String],
        gene_indices: &Matrix,
        scores: &Matrix,
        genes: &CellIndex,
    ) -> Result<Self, PolyphonyError> {
        if gene_indices.rows() != scores.rows()
            || gene_indices.cols() != scores.cols()
        {
            return Err(PolyphonyError::Column(format!(
                "gene matrix is {}x{}, score matrix is {}x{}",
                gene_indices.rows(),
                gene_indices.cols(),
                scores.rows(),
                scores.cols()
            )));
        }
        let mut names = Vec::with_capacity(gene_indices.rows());
        let mut row_scores = Vec::with_capacity(gene_indices.rows());
        for (gene_row, score_row) in (0..gene_indices.rows())
            .filter_map(|r| Some((gene_indices.row(r)?, scores.row(r)?)))
        {
            let (n, s): (Vec<String>, Vec<f64>) = gene_row
                .iter()
                .zip(score_row)
                .filter(|(i, _)| i.is_finite() && **i >= 0.0)
                .filter_map(|(&i, &s)| {
                    genes.id(i as usize).map(|name| (name.to_owned(), f64::from(s)))
                })
                .unzip();
            names.push(n);
            row_scores.push(s);
        }
        Self::new(cluster_ids.to_vec(), names, row_scores)
    }

    /// Ranked genes of cluster `id`, if the cluster is known.
    #[must_use]
    pub fn cluster(&self, id: &str) -> Option<RankedList<'_>> {
        let row = self.clusters.position(id)?;
        Some(RankedList {
            names: self.names.get(row)?,
            scores: self.scores.get(row)?,
        })
    }

    /// Number of clusters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Whether no cluster is ranked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// One class of the query's categorical partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionClass {
    /// Class label.
    pub name: String,
    /// Display color.
    pub color: Rgb,
}

/// Per-cell class labels of one categorical partition (query predictions,
/// reference cell types) with the class colors in effect.
#[derive(Debug, Clone, Default)]
pub struct CellPartition {
    parent: String,
    labels: Vec<String>,
    classes: Vec<PartitionClass>,
}

impl CellPartition {
    /// Partition named `parent` over per-cell `labels`. Classes are sorted
    /// by name, as in the cell-set tree; colors come from `colors`, else
    /// `fallback`.
    #[must_use]
    pub fn new(
        parent: impl Into<String>,
        labels: Vec<String>,
        colors: &[CellSetColor],
        fallback: Rgb,
    ) -> Self {
        let parent = parent.into();
        let classes = class_names(&labels)
            .into_iter()
            .map(|name| {
                let path = CellSetPath::new(parent.as_str(), name);
                PartitionClass {
                    color: color_of(colors, &path).unwrap_or(fallback),
                    name: path.name,
                }
            })
            .collect();
        Self {
            parent,
            labels,
            classes,
        }
    }

    /// Partition name.
    #[must_use]
    pub fn parent(&self) -> &str {
        &self.parent
    }

    /// Label of cell row `i`.
    #[must_use]
    pub fn label(&self, i: usize) -> Option<&str> {
        self.labels.get(i).map(String::as_str)
    }

    /// Per-cell labels.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Classes with their colors.
    #[must_use]
    pub fn classes(&self) -> &[PartitionClass] {
        &self.classes
    }

    /// `(class, size)` pairs in class order.
    #[must_use]
    pub fn class_sizes(&self) -> Vec<(String, usize)> {
        let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
        for label in &self.labels {
            *counts.entry(label.as_str()).or_default() += 1;
        }
        self.classes
            .iter()
            .map(|c| {
                (c.name.clone(), counts.get(c.name.as_str()).copied().unwrap_or(0))
            })
            .collect()
    }
}

/// Distinct values of `labels` in cell-set tree order, sorted by name.
#[must_use]
pub fn class_names(labels: &[String]) -> Vec<String> {
    let names: BTreeSet<&str> = labels.iter().map(String::as_str).collect();
    names.into_iter().map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rankings_from_index_matrix() {
        let genes = CellIndex::new(vec!["CD3E".into(), "MS4A1".into(), "NKG7".into()]);
        let indices = Matrix::from_rows(&[vec![0.0, 2.0], vec![1.0, 7.0]]).unwrap();
        let scores = Matrix::from_rows(&[vec![9.0, 4.0], vec![8.0, 1.0]]).unwrap();
        let rankings = ReferenceRankings::from_columns(
            &["0".into(), "1".into()],
            &indices,
            &scores,
            &genes,
        )
        .unwrap();

        let t = rankings.cluster("0").unwrap();
        assert_eq!(t.names, ["CD3E", "NKG7"]);
        assert_eq!(t.scores, [9.0, 4.0]);
        // Index 7 is outside the gene index.
        assert_eq!(rankings.cluster("1").unwrap().names, ["MS4A1"]);
        assert!(rankings.cluster("2").is_none());
    }

    #[test]
    fn mismatched_rankings_are_rejected() {
        assert!(ReferenceRankings::new(vec!["0".into()], vec![], vec![]).is_err());
    }

    #[test]
    fn partition_classes_follow_tree_order() {
        let colors = vec![CellSetColor {
            path: CellSetPath::new("Prediction", "B"),
            color: [1, 2, 3],
        }];
        let partition = CellPartition::new(
            "Prediction",
            vec!["T".into(), "NK".into(), "B".into(), "T".into()],
            &colors,
            [60, 60, 60],
        );
        let classes = partition.classes();
        assert_eq!(classes[0].name, "B");
        assert_eq!(classes[0].color, [1, 2, 3]);
        assert_eq!(classes[2].color, [60, 60, 60]);
        assert_eq!(
            partition.class_sizes(),
            [("B".into(), 1), ("NK".into(), 1), ("T".into(), 2)]
        );
    }
}
