use crate::anchor::AnchorSnapshot;

/// Review progress of one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSummary {
    /// Anchors in the `confirmed` bucket.
    pub confirmed_sets: usize,
    /// Anchors across every bucket.
    pub total_sets: usize,
    /// Member cells of confirmed anchors.
    pub confirmed_cells: usize,
    /// Cells in the query dataset.
    pub total_cells: usize,
}

impl StatusSummary {
    /// Summarize `snapshot` against a query dataset of `total_cells` cells.
    #[must_use]
    pub fn from_snapshot(snapshot: &AnchorSnapshot, total_cells: usize) -> Self {
        Self {
            confirmed_sets: snapshot.confirmed.len(),
            total_sets: snapshot.len(),
            confirmed_cells: snapshot.confirmed.iter().map(|a| a.cells.len()).sum(),
            total_cells,
        }
    }

    /// Fraction of query cells covered by confirmed anchors; 0 for an empty
    /// dataset.
    #[must_use]
    pub fn confirmed_cell_fraction(&self) -> f64 {
        if self.total_cells == 0 {
            return 0.0;
        }
        self.confirmed_cells as f64 / self.total_cells as f64
    }
}
