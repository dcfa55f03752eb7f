use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[schemars(title = "Gene Scoring", inline)]
#[serde(default)]
/// Differential-gene overlap scoring parameters.
pub struct ScoringOptions {
    /// Number of top-ranked genes compared on each side.
    #[schemars(title = "Top Genes", range(min = 1, max = 1000), extend("step" = 10))]
    pub top_n: usize,
    /// Name of the query cell-set tree used for prediction proportions.
    #[schemars(title = "Partition")]
    pub partition_key: String,
    /// RGB used for classes without an assigned color.
    #[schemars(skip)]
    pub fallback_color: [u8; 3],
}

impl Default for ScoringOptions {
    fn default() -> Self {
        Self {
            top_n: 100,
            partition_key: "Prediction".into(),
            fallback_color: [60, 60, 60],
        }
    }
}
