//! Resolution of a focused or highlighted anchor to concrete cells.
//!
//! Given an anchor id, [`AnchorSetOfInterestResolver`] finds the anchor's
//! query member rows, scans the reference per-cell cluster column for the
//! linked cluster's rows, and optionally suggests a 2D view framing the query
//! members. The reference scan is linear in the number of reference cells;
//! callers memoize on their inputs (see [`crate::views`]).

mod contour;

pub use contour::{contour_groups, ContourGroup};
use glam::Vec2;

use crate::anchor::AnchorSnapshot;
use crate::columns::{CellIndex, Embedding};
use crate::options::ViewportOptions;

/// Spans at or below this are treated as zero when fitting the view.
const MIN_SPAN: f32 = 1e-6;

/// Drawing surface size in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
}

impl Canvas {
    /// Canvas of `width x height` pixels.
    #[must_use]
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Suggested 2D camera: center in embedding space (y pointing down) and a
/// log2 zoom level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    /// View center.
    pub target: Vec2,
    /// Zoom level; `2^zoom` pixels per embedding unit.
    pub zoom: f32,
}

/// Cells of one anchor of interest in both datasets.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorSetOfInterest {
    /// Query anchor id.
    pub query_anchor_id: String,
    /// Linked reference cluster id.
    pub reference_cluster_id: String,
    /// Query rows of the member cells present in the cell index, in member
    /// order.
    pub query_indices: Vec<usize>,
    /// Reference rows assigned to the linked cluster, ascending.
    pub reference_indices: Vec<usize>,
    /// Suggested framing, when requested and the members have positions.
    pub view_state: Option<ViewState>,
}

/// Raw data the resolver reads.
#[derive(Debug, Clone, Copy)]
pub struct ResolverInputs<'a> {
    /// Anchors of the current iteration.
    pub snapshot: &'a AnchorSnapshot,
    /// Query cell index.
    pub query_cells: &'a CellIndex,
    /// Query 2D embedding.
    pub query_embedding: &'a Embedding,
    /// Reference per-cell anchor cluster ids.
    pub reference_clusters: &'a [String],
}

/// Whether a resolution should compute a view suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    /// Focused anchor: resolve cells and suggest a view.
    Focus,
    /// Hovered anchor: resolve cells only.
    Highlight,
}

/// Maps an anchor id to its member cells and an optional view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorSetOfInterestResolver {
    zoom_margin: f32,
    max_zoom: f32,
}

impl Default for AnchorSetOfInterestResolver {
    fn default() -> Self {
        Self::new(&ViewportOptions::default())
    }
}

impl AnchorSetOfInterestResolver {
    /// Resolver using the framing parameters in `options`.
    #[must_use]
    pub fn new(options: &ViewportOptions) -> Self {
        Self {
            zoom_margin: options.zoom_margin,
            max_zoom: options.max_zoom,
        }
    }

    /// Resolve `anchor_id`. `None` in, or an id not in the snapshot, yields
    /// `None`: nothing of interest.
    #[must_use]
    pub fn resolve(
        &self,
        anchor_id: Option<&str>,
        interest: Interest,
        inputs: &ResolverInputs<'_>,
        canvas: Canvas,
    ) -> Option<AnchorSetOfInterest> {
        let id = anchor_id?;
        let Some((_, anchor)) = inputs.snapshot.find(id) else {
            log::debug!("anchor of interest {id} is not in the snapshot");
            return None;
        };

        let query_indices: Vec<usize> = anchor
            .cell_ids()
            .filter_map(|cell| inputs.query_cells.position(cell))
            .collect();

        let view_state = match interest {
            Interest::Focus => {
                let points: Vec<Vec2> = query_indices
                    .iter()
                    .filter_map(|&i| inputs.query_embedding.point(i))
                    .collect();
                self.suggest_view(&points, canvas)
            }
            Interest::Highlight => None,
        };

        Some(AnchorSetOfInterest {
            query_anchor_id: anchor.id.clone(),
            reference_cluster_id: anchor.reference_cluster_id.clone(),
            reference_indices: cluster_members(
                inputs.reference_clusters,
                &anchor.reference_cluster_id,
            ),
            query_indices,
            view_state,
        })
    }

    /// View centered on the mean of `points` (y negated) with a zoom fitting
    /// their extent into `canvas`, minus the margin.
    ///
    /// Axes whose extent is zero are ignored when fitting; if no axis has
    /// extent the zoom is the configured maximum. The zoom never exceeds the
    /// maximum and is always finite. Returns `None` for no points.
    #[must_use]
    pub fn suggest_view(&self, points: &[Vec2], canvas: Canvas) -> Option<ViewState> {
        if points.is_empty() {
            return None;
        }
        let flipped = points.iter().map(|p| Vec2::new(p.x, -p.y));
        let (min, max, sum) = flipped.fold(
            (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY), Vec2::ZERO),
            |(min, max, sum), p| (min.min(p), max.max(p), sum + p),
        );
        let target = sum / points.len() as f32;
        let span = max - min;

        let fit = [(canvas.width, span.x), (canvas.height, span.y)]
            .into_iter()
            .filter(|&(_, s)| s > MIN_SPAN)
            .map(|(extent, s)| extent / s)
            .reduce(f32::min);

        let zoom = fit
            .map(|ratio| ratio.log2() - self.zoom_margin)
            .filter(|z| z.is_finite())
            .map_or(self.max_zoom, |z| z.min(self.max_zoom));

        Some(ViewState { target, zoom })
    }
}

/// Rows of `column` equal to `cluster_id`, ascending. A full scan.
#[must_use]
pub fn cluster_members(column: &[String], cluster_id: &str) -> Vec<usize> {
    column
        .iter()
        .enumerate()
        .filter(|(_, c)| c.as_str() == cluster_id)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::sample_snapshot;

    fn ids(n: usize) -> CellIndex {
        CellIndex::new((0..n).map(|i| format!("c{i}")).collect())
    }

    #[test]
    fn single_cell_view_is_finite() {
        let resolver = AnchorSetOfInterestResolver::default();
        let view = resolver
            .suggest_view(&[Vec2::new(10.0, 20.0)], Canvas::new(800.0, 600.0))
            .unwrap();
        assert_eq!(view.target, Vec2::new(10.0, -20.0));
        assert!(view.zoom.is_finite());
        assert_eq!(view.zoom, 8.0);
    }

    #[test]
    fn zoom_fits_tighter_axis_with_margin() {
        let resolver = AnchorSetOfInterestResolver::default();
        let view = resolver
            .suggest_view(
                &[Vec2::new(0.0, 0.0), Vec2::new(100.0, 10.0)],
                Canvas::new(800.0, 600.0),
            )
            .unwrap();
        assert_eq!(view.target, Vec2::new(50.0, -5.0));
        // min(800/100, 600/10) = 8 -> log2 = 3, minus margin 2.
        assert!((view.zoom - 1.0).abs() < 1e-6);
    }

    #[test]
    fn one_flat_axis_uses_the_other() {
        let resolver = AnchorSetOfInterestResolver::default();
        let view = resolver
            .suggest_view(
                &[Vec2::new(0.0, 5.0), Vec2::new(200.0, 5.0)],
                Canvas::new(800.0, 600.0),
            )
            .unwrap();
        // 800/200 = 4 -> log2 = 2, minus margin 2.
        assert!(view.zoom.abs() < 1e-6);
    }

    #[test]
    fn no_members_no_view() {
        let resolver = AnchorSetOfInterestResolver::default();
        assert!(resolver.suggest_view(&[], Canvas::new(800.0, 600.0)).is_none());
    }

    #[test]
    fn resolves_members_in_both_datasets() {
        let snapshot = sample_snapshot();
        let cells = ids(8);
        let embedding = Embedding::new(
            (0..8).map(|i| i as f32).collect(),
            (0..8).map(|i| i as f32 * 2.0).collect(),
        )
        .unwrap();
        let reference_clusters: Vec<String> =
            ["1", "0", "1", "2"].iter().map(|s| (*s).to_owned()).collect();
        let inputs = ResolverInputs {
            snapshot: &snapshot,
            query_cells: &cells,
            query_embedding: &embedding,
            reference_clusters: &reference_clusters,
        };
        let resolver = AnchorSetOfInterestResolver::default();
        let canvas = Canvas::new(800.0, 600.0);

        let focus = resolver
            .resolve(Some("qry-1"), Interest::Focus, &inputs, canvas)
            .unwrap();
        assert_eq!(focus.reference_cluster_id, "1");
        assert_eq!(focus.query_indices, [2, 3, 4]);
        assert_eq!(focus.reference_indices, [0, 2]);
        assert_eq!(focus.view_state.unwrap().target, Vec2::new(3.0, -6.0));

        let hover = resolver
            .resolve(Some("qry-1"), Interest::Highlight, &inputs, canvas)
            .unwrap();
        assert!(hover.view_state.is_none());

        assert!(resolver.resolve(None, Interest::Focus, &inputs, canvas).is_none());
        assert!(resolver
            .resolve(Some("nope"), Interest::Focus, &inputs, canvas)
            .is_none());
    }

    #[test]
    fn unknown_cells_are_skipped() {
        let mut snapshot = sample_snapshot();
        snapshot.confirmed[0]
            .cells
            .push(crate::anchor::AnchorCell::new("ghost"));
        let cells = ids(2);
        let embedding = Embedding::default();
        let inputs = ResolverInputs {
            snapshot: &snapshot,
            query_cells: &cells,
            query_embedding: &embedding,
            reference_clusters: &[],
        };
        let soi = AnchorSetOfInterestResolver::default()
            .resolve(Some("qry-0"), Interest::Focus, &inputs, Canvas::new(1.0, 1.0))
            .unwrap();
        assert_eq!(soi.query_indices, [0, 1]);
        assert!(soi.reference_indices.is_empty());
        // No embedding positions: nothing to frame.
        assert!(soi.view_state.is_none());
    }
}
