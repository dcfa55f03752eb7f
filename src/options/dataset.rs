use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
/// Column paths inside one dataset's column source.
pub struct DatasetOptions {
    /// Per-cell reference cluster / cell type labels.
    pub cell_type: String,
    /// Per-cell predicted labels (query only).
    pub prediction: String,
    /// Per-cell anchor cluster assignment.
    pub anchor_cluster: String,
    /// Two-column 2D embedding.
    pub embedding: String,
    /// Differential gene matrix of gene indices (clusters x rank).
    pub diff_gene_names: String,
    /// Differential gene score matrix (clusters x rank).
    pub diff_gene_scores: String,
    /// Cluster ids labelling the rows of the differential gene matrices.
    pub diff_gene_clusters: String,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            cell_type: "obs/cell_type".into(),
            prediction: "obs/prediction".into(),
            anchor_cluster: "obs/anchor_cluster".into(),
            embedding: "obsm/X_umap".into(),
            diff_gene_names: "uns/rank_genes_groups/_names_indices".into(),
            diff_gene_scores: "uns/rank_genes_groups/_scores".into(),
            diff_gene_clusters: "uns/rank_genes_groups/_valid_cluster".into(),
        }
    }
}
