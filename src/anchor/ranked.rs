use serde::{Deserialize, Serialize};

/// A gene named either directly or by its index into the dataset's gene
/// (var) index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeneRef {
    /// Position in the gene index.
    Index(usize),
    /// Gene symbol.
    Name(String),
}

impl GeneRef {
    /// Resolve to a gene name, looking indices up in `gene_index`.
    ///
    /// Returns `None` for an index past the end of `gene_index`.
    #[must_use]
    pub fn resolve<'a>(&'a self, gene_index: &'a [String]) -> Option<&'a str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Index(i) => gene_index.get(*i).map(String::as_str),
        }
    }
}

/// Rank-ordered differential genes with their scores, most significant
/// first. `genes` and `scores` are parallel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RankedGenesWire", into = "RankedGenesColumns")]
pub struct RankedGenes {
    /// Genes in descending significance.
    pub genes: Vec<GeneRef>,
    /// Score of each gene.
    pub scores: Vec<f64>,
}

impl RankedGenes {
    /// Number of ranked genes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    /// Whether no genes are ranked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Resolve every gene to a name. Indices outside `gene_index` are dropped
    /// together with their score.
    #[must_use]
    pub fn resolve(&self, gene_index: &[String]) -> (Vec<String>, Vec<f64>) {
        self.genes
            .iter()
            .zip(&self.scores)
            .filter_map(|(g, &s)| g.resolve(gene_index).map(|n| (n.to_owned(), s)))
            .unzip()
    }
}

/// Column-oriented form, the canonical wire shape.
#[derive(Clone, Serialize, Deserialize)]
struct RankedGenesColumns {
    name_indice: Vec<GeneRef>,
    score: Vec<f64>,
}

#[derive(Deserialize)]
struct RankedGeneRow {
    name_indice: GeneRef,
    score: f64,
}

/// The service emits either a column object or a list of rows.
#[derive(Deserialize)]
#[serde(untagged)]
enum RankedGenesWire {
    Columns(RankedGenesColumns),
    Rows(Vec<RankedGeneRow>),
}

impl From<RankedGenesWire> for RankedGenes {
    fn from(wire: RankedGenesWire) -> Self {
        match wire {
            RankedGenesWire::Columns(c) => {
                let n = c.name_indice.len().min(c.score.len());
                let mut genes = c.name_indice;
                let mut scores = c.score;
                genes.truncate(n);
                scores.truncate(n);
                Self { genes, scores }
            }
            RankedGenesWire::Rows(rows) => rows
                .into_iter()
                .map(|r| (r.name_indice, r.score))
                .unzip::<_, _, Vec<_>, Vec<_>>()
                .into(),
        }
    }
}

impl From<(Vec<GeneRef>, Vec<f64>)> for RankedGenes {
    fn from((genes, scores): (Vec<GeneRef>, Vec<f64>)) -> Self {
        Self { genes, scores }
    }
}

impl From<RankedGenes> for RankedGenesColumns {
    fn from(r: RankedGenes) -> Self {
        Self {
            name_indice: r.genes,
            score: r.scores,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_indices_through_gene_index() {
        let gene_index: Vec<String> =
            ["CD3E", "MS4A1", "LYZ"].iter().map(|s| (*s).to_owned()).collect();
        let ranked = RankedGenes {
            genes: vec![
                GeneRef::Index(2),
                GeneRef::Name("NKG7".into()),
                GeneRef::Index(9),
            ],
            scores: vec![5.0, 4.0, 3.0],
        };
        let (names, scores) = ranked.resolve(&gene_index);
        assert_eq!(names, ["LYZ", "NKG7"]);
        assert_eq!(scores, [5.0, 4.0]);
    }

    #[test]
    fn mismatched_columns_are_truncated() {
        let ranked: RankedGenes =
            serde_json::from_str(r#"{"name_indice": ["A", "B", "C"], "score": [1.0, 0.5]}"#)
                .unwrap();
        assert_eq!(ranked.len(), 2);
    }
}
