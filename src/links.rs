//! Query ↔ reference centroid links, one per anchor.
//!
//! Pure geometry for the drawing layer: the mean embedding position of an
//! anchor's query cells, the mean position of its linked reference cluster's
//! cells, and the attributes a link is styled by.

use glam::Vec2;

use crate::anchor::AnchorSnapshot;
use crate::columns::{CellIndex, Embedding};
use crate::resolver::cluster_members;
use crate::scoring::SnapshotScores;

/// One query/reference centroid pair.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorLink {
    /// Query anchor id.
    pub query_anchor_id: String,
    /// Linked reference cluster id.
    pub reference_cluster_id: String,
    /// Centroid of the query members.
    pub query: Vec2,
    /// Centroid of the reference cluster.
    pub reference: Vec2,
    /// Gene overlap score, when the anchor was scored.
    pub top_gene_score: Option<f64>,
    /// Query members with a position.
    pub query_size: usize,
    /// Reference cluster members with a position.
    pub reference_size: usize,
}

/// All links plus the largest endpoint sizes, for size normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnchorLinks {
    /// Links in snapshot order.
    pub links: Vec<AnchorLink>,
    /// Largest `query_size`.
    pub max_query_size: usize,
    /// Largest `reference_size`.
    pub max_reference_size: usize,
}

/// Inputs of [`LinkGeometryBuilder::build`].
#[derive(Debug, Clone, Copy)]
pub struct LinkInputs<'a> {
    /// Anchors of the current iteration.
    pub snapshot: &'a AnchorSnapshot,
    /// Query cell index.
    pub query_cells: &'a CellIndex,
    /// Query 2D embedding.
    pub query_embedding: &'a Embedding,
    /// Reference 2D embedding.
    pub reference_embedding: &'a Embedding,
    /// Reference per-cell anchor cluster ids.
    pub reference_clusters: &'a [String],
    /// Scores of the same snapshot, if computed.
    pub scores: Option<&'a SnapshotScores>,
}

/// Builds [`AnchorLinks`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkGeometryBuilder;

impl LinkGeometryBuilder {
    /// One link per anchor whose both sides have at least one positioned
    /// cell; anchors with an empty side are skipped.
    #[must_use]
    pub fn build(&self, inputs: &LinkInputs<'_>) -> AnchorLinks {
        let mut out = AnchorLinks::default();
        for (_, anchor) in inputs.snapshot.iter() {
            let query_points: Vec<Vec2> = anchor
                .cell_ids()
                .filter_map(|id| inputs.query_cells.position(id))
                .filter_map(|i| inputs.query_embedding.point(i))
                .collect();
            let reference_points: Vec<Vec2> =
                cluster_members(inputs.reference_clusters, &anchor.reference_cluster_id)
                    .into_iter()
                    .filter_map(|i| inputs.reference_embedding.point(i))
                    .collect();

            let (Some(query), Some(reference)) =
                (centroid(&query_points), centroid(&reference_points))
            else {
                log::debug!("anchor {} has no link: empty side", anchor.id);
                continue;
            };

            out.max_query_size = out.max_query_size.max(query_points.len());
            out.max_reference_size =
                out.max_reference_size.max(reference_points.len());
            out.links.push(AnchorLink {
                query_anchor_id: anchor.id.clone(),
                reference_cluster_id: anchor.reference_cluster_id.clone(),
                query,
                reference,
                top_gene_score: inputs
                    .scores
                    .and_then(|s| s.get(&anchor.id))
                    .map(|r| r.top_gene_score),
                query_size: query_points.len(),
                reference_size: reference_points.len(),
            });
        }
        out
    }
}

/// Arithmetic mean of `points`; `None` when empty.
#[must_use]
pub fn centroid(points: &[Vec2]) -> Option<Vec2> {
    if points.is_empty() {
        return None;
    }
    Some(points.iter().copied().sum::<Vec2>() / points.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::sample_snapshot;

    #[test]
    fn links_join_query_and_reference_centroids() {
        let snapshot = sample_snapshot();
        let cells = CellIndex::new((0..8).map(|i| format!("c{i}")).collect());
        let query_embedding = Embedding::new(
            (0..8).map(|i| i as f32).collect(),
            vec![0.0; 8],
        )
        .unwrap();
        // Reference cells: cluster 0 at rows 0-1, cluster 1 at row 2.
        let reference_embedding =
            Embedding::new(vec![10.0, 20.0, 30.0], vec![1.0, 3.0, 5.0]).unwrap();
        let reference_clusters: Vec<String> =
            ["0", "0", "1"].iter().map(|s| (*s).to_owned()).collect();

        let links = LinkGeometryBuilder.build(&LinkInputs {
            snapshot: &snapshot,
            query_cells: &cells,
            query_embedding: &query_embedding,
            reference_embedding: &reference_embedding,
            reference_clusters: &reference_clusters,
            scores: None,
        });

        // qry-2 links cluster 2, which has no reference cells.
        let ids: Vec<_> = links.links.iter().map(|l| l.query_anchor_id.as_str()).collect();
        assert_eq!(ids, ["qry-0", "qry-1", "user-0"]);

        let confirmed = &links.links[0];
        assert_eq!(confirmed.query, Vec2::new(0.5, 0.0));
        assert_eq!(confirmed.reference, Vec2::new(15.0, 2.0));
        assert_eq!(confirmed.reference_size, 2);
        assert_eq!(confirmed.top_gene_score, None);

        assert_eq!(links.max_query_size, 3);
        assert_eq!(links.max_reference_size, 2);
    }

    #[test]
    fn centroid_of_nothing_is_none() {
        assert_eq!(centroid(&[]), None);
        assert_eq!(
            centroid(&[Vec2::new(1.0, 1.0), Vec2::new(3.0, 5.0)]),
            Some(Vec2::new(2.0, 3.0))
        );
    }
}
