use super::{AnchorGeneReport, GeneRow, PerSide};

/// Rank badge size: 3 for the top 10, 2 for the top 20, 1 for the top
/// 100, otherwise 0.
#[must_use]
pub fn rank_triangles(rank: Option<usize>) -> u8 {
    match rank {
        Some(1..=10) => 3,
        Some(11..=20) => 2,
        Some(21..=100) => 1,
        _ => 0,
    }
}

/// A display gene with its rank badges.
#[derive(Debug, Clone, PartialEq)]
pub struct SeparatedGene {
    /// The gene row.
    pub row: GeneRow,
    /// Badge size per side.
    pub triangles: PerSide<u8>,
}

/// An anchor's display genes split by which side's top-N they belong to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeparatedGenes {
    /// Significant on both sides.
    pub shared: Vec<SeparatedGene>,
    /// Significant for the query anchor only.
    pub query_only: Vec<SeparatedGene>,
    /// Significant for the reference cluster only.
    pub reference_only: Vec<SeparatedGene>,
}

impl SeparatedGenes {
    /// Split the rows of `report`, keeping row order within each group.
    #[must_use]
    pub fn from_report(report: &AnchorGeneReport) -> Self {
        let mut out = Self::default();
        for row in &report.genes {
            let gene = SeparatedGene {
                triangles: PerSide {
                    query: rank_triangles(row.rank.query),
                    reference: rank_triangles(row.rank.reference),
                },
                row: row.clone(),
            };
            match (row.significant.query, row.significant.reference) {
                (true, true) => out.shared.push(gene),
                (true, false) => out.query_only.push(gene),
                (false, true) => out.reference_only.push(gene),
                (false, false) => {}
            }
        }
        out
    }
}
