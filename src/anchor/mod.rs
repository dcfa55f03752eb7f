//! Anchor data model: anchors, buckets, per-iteration snapshots and the
//! service state tracked per dataset role.
//!
//! An [`Anchor`] proposes that a group of query cells corresponds to one
//! reference cluster. Anchors are never mutated locally; every change goes
//! through the service and comes back in the [`AnchorSnapshot`] fetched for
//! the next iteration.

mod ranked;

use std::fmt;

pub use ranked::{GeneRef, RankedGenes};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Dataset role
// ---------------------------------------------------------------------------

/// Which of the two aligned datasets a value belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum DatasetRole {
    /// The fixed reference atlas.
    Reference,
    /// The evolving query dataset.
    Query,
}

impl fmt::Display for DatasetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => f.write_str("reference"),
            Self::Query => f.write_str("query"),
        }
    }
}

// ---------------------------------------------------------------------------
// Anchors
// ---------------------------------------------------------------------------

/// Mutually exclusive anchor categories.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AnchorBucket {
    /// Accepted by the user through a confirm operation.
    Confirmed,
    /// Proposed by the model and not yet reviewed.
    Unjustified,
    /// Drawn by the user with a lasso/brush.
    UserSelection,
}

impl AnchorBucket {
    /// All buckets in wire order.
    pub const ALL: [Self; 3] =
        [Self::Confirmed, Self::Unjustified, Self::UserSelection];

    /// Key used for this bucket in the service JSON.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Unjustified => "unjustified",
            Self::UserSelection => "user_selection",
        }
    }
}

impl fmt::Display for AnchorBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One member cell of an anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorCell {
    /// Query-dataset cell identifier.
    pub cell_id: String,
}

impl AnchorCell {
    /// Wrap a cell identifier.
    pub fn new(cell_id: impl Into<String>) -> Self {
        Self {
            cell_id: cell_id.into(),
        }
    }
}

/// A proposed correspondence between a group of query cells and one
/// reference cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// Identifier, unique within its bucket.
    pub id: String,
    /// Linked reference cluster. Numeric ids on the wire are coerced to
    /// strings.
    #[serde(rename = "anchor_ref_id", deserialize_with = "string_or_number")]
    pub reference_cluster_id: String,
    /// Member cells, in service order.
    #[serde(default)]
    pub cells: Vec<AnchorCell>,
    /// Differential genes of the member cells, most significant first.
    #[serde(rename = "rank_genes_groups", default)]
    pub ranked_genes: RankedGenes,
    /// Median latent distance reported by the model.
    #[serde(rename = "anchor_dist_median", default)]
    pub median_anchor_distance: Option<f64>,
}

impl Anchor {
    /// Iterate member cell ids in order.
    pub fn cell_ids(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|c| c.cell_id.as_str())
    }
}

/// Accept a JSON string or number and keep its string form.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(i) => i.to_string(),
        Raw::Float(x) => x.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Every anchor for one iteration, partitioned into buckets. Immutable once
/// fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorSnapshot {
    /// Anchors confirmed by the user.
    pub confirmed: Vec<Anchor>,
    /// Model proposals awaiting review.
    pub unjustified: Vec<Anchor>,
    /// User-drawn anchors.
    pub user_selection: Vec<Anchor>,
}

impl AnchorSnapshot {
    /// Anchors in one bucket.
    #[must_use]
    pub fn bucket(&self, bucket: AnchorBucket) -> &[Anchor] {
        match bucket {
            AnchorBucket::Confirmed => &self.confirmed,
            AnchorBucket::Unjustified => &self.unjustified,
            AnchorBucket::UserSelection => &self.user_selection,
        }
    }

    /// All anchors with their bucket, bucket by bucket in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (AnchorBucket, &Anchor)> {
        AnchorBucket::ALL
            .into_iter()
            .flat_map(move |b| self.bucket(b).iter().map(move |a| (b, a)))
    }

    /// Look up an anchor by id across all buckets.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<(AnchorBucket, &Anchor)> {
        self.iter().find(|(_, a)| a.id == id)
    }

    /// Bucket holding the anchor with `id`, if any.
    #[must_use]
    pub fn bucket_of(&self, id: &str) -> Option<AnchorBucket> {
        self.find(id).map(|(b, _)| b)
    }

    /// Total number of anchors across buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.confirmed.len() + self.unjustified.len() + self.user_selection.len()
    }

    /// Whether every bucket is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Next free user anchor name: `{prefix}{n}` for the smallest
    /// non-negative `n` not already used in the `user_selection` bucket.
    #[must_use]
    pub fn next_user_set_name(&self, prefix: &str) -> String {
        (0_usize..)
            .map(|n| format!("{prefix}{n}"))
            .find(|name| !self.user_selection.iter().any(|a| &a.id == name))
            .unwrap_or_else(|| format!("{prefix}0"))
    }
}

// ---------------------------------------------------------------------------
// Service state
// ---------------------------------------------------------------------------

/// Request status of the anchor or model service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ApiStatus {
    /// A request is in flight.
    Loading,
    /// Idle; the last request (if any) succeeded.
    #[default]
    Success,
    /// The last load failed and nothing has replaced it yet.
    Error,
}

/// Status plus the iteration the displayed data corresponds to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
    JsonSchema,
)]
pub struct ModelState {
    /// Current request status.
    pub status: ApiStatus,
    /// Monotonically increasing generation of backend data.
    pub iteration: u64,
}

impl ModelState {
    /// Idle state at `iteration`.
    #[must_use]
    pub fn at(iteration: u64) -> Self {
        Self {
            status: ApiStatus::Success,
            iteration,
        }
    }

    /// Whether a new mutation may start.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.status == ApiStatus::Success
    }

    /// Same iteration, marked as loading.
    #[must_use]
    pub fn loading(self) -> Self {
        Self {
            status: ApiStatus::Loading,
            ..self
        }
    }

    /// Next iteration, idle.
    #[must_use]
    pub fn advanced(self) -> Self {
        Self::at(self.iteration + 1)
    }
}

/// Payload returned by a model retrain request. Opaque beyond triggering an
/// iteration bump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact {
    /// Raw response body.
    pub payload: String,
}
