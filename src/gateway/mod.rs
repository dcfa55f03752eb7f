//! Boundary to the anchor/model service.
//!
//! [`AnchorGateway`] is the seam between the session logic and the network:
//! the HTTP implementation lives in [`http`] (feature `http`), tests drive an
//! in-memory backend. Mutations only side-effect the service; the caller is
//! responsible for bumping the iteration and re-fetching.

#[cfg(feature = "http")]
pub mod http;
#[cfg(test)]
pub(crate) mod testing;

use serde::{Deserialize, Serialize};

use crate::anchor::{AnchorCell, AnchorSnapshot, ModelArtifact};
use crate::error::FetchError;

/// Operations exposed by the anchor/model service.
///
/// Implementations block until the service answers; callers that must not
/// block run them through [`Dispatch::Background`](crate::store::Dispatch).
pub trait AnchorGateway: Send + Sync {
    /// Fetch every anchor for `iteration`.
    fn fetch_all(&self, iteration: u64) -> Result<AnchorSnapshot, FetchError>;

    /// Move an anchor to the `confirmed` bucket.
    fn confirm(&self, anchor_id: &str) -> Result<Acknowledgement, FetchError>;

    /// Replace an anchor's cell membership.
    fn refine(
        &self,
        anchor_id: &str,
        cells: &[AnchorCell],
    ) -> Result<Acknowledgement, FetchError>;

    /// Create a `user_selection` anchor.
    fn add(
        &self,
        anchor_id: &str,
        cells: &[AnchorCell],
    ) -> Result<Acknowledgement, FetchError>;

    /// Remove an anchor.
    fn delete(&self, anchor_id: &str) -> Result<Acknowledgement, FetchError>;

    /// Trigger model retraining towards `next_iteration`. Long-running.
    fn request_model_update(
        &self,
        next_iteration: u64,
    ) -> Result<ModelArtifact, FetchError>;
}

/// Acknowledgement body returned by a mutation. Not interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Acknowledgement(pub serde_json::Value);

/// One mutation request, as issued by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorMutation {
    /// Confirm an anchor.
    Confirm {
        /// Target anchor.
        anchor_id: String,
    },
    /// Replace an anchor's cells.
    Refine {
        /// Target anchor.
        anchor_id: String,
        /// New membership.
        cells: Vec<AnchorCell>,
    },
    /// Create a new user anchor.
    Add {
        /// Generated `user-{n}` name.
        anchor_id: String,
        /// Membership.
        cells: Vec<AnchorCell>,
    },
    /// Delete an anchor.
    Delete {
        /// Target anchor.
        anchor_id: String,
    },
}

impl AnchorMutation {
    /// Anchor the mutation targets.
    #[must_use]
    pub fn anchor_id(&self) -> &str {
        match self {
            Self::Confirm { anchor_id }
            | Self::Refine { anchor_id, .. }
            | Self::Add { anchor_id, .. }
            | Self::Delete { anchor_id } => anchor_id,
        }
    }

    /// Short operation name for logging.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Confirm { .. } => "confirm",
            Self::Refine { .. } => "refine",
            Self::Add { .. } => "add",
            Self::Delete { .. } => "delete",
        }
    }

    /// Send this mutation through `gateway`.
    ///
    /// # Errors
    ///
    /// Returns the gateway's [`FetchError`] unchanged.
    pub fn apply(
        &self,
        gateway: &dyn AnchorGateway,
    ) -> Result<Acknowledgement, FetchError> {
        match self {
            Self::Confirm { anchor_id } => gateway.confirm(anchor_id),
            Self::Refine { anchor_id, cells } => gateway.refine(anchor_id, cells),
            Self::Add { anchor_id, cells } => gateway.add(anchor_id, cells),
            Self::Delete { anchor_id } => gateway.delete(anchor_id),
        }
    }
}

// ── Wire bodies ──────────────────────────────────────────────────────────

/// Anchor payload of `refine` and `add` requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorBody {
    /// Anchor id.
    pub id: String,
    /// Member cells.
    pub cells: Vec<AnchorCell>,
}

/// Body of `PUT /anchor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum PutAnchorBody {
    /// `{operation: "confirm", anchor_id}`.
    Confirm {
        /// Target anchor.
        anchor_id: String,
    },
    /// `{operation: "refine", anchor: {id, cells}}`.
    Refine {
        /// Anchor with its new cells.
        anchor: AnchorBody,
    },
    /// `{operation: "add", anchor: {id, cells}}`.
    Add {
        /// Anchor to create.
        anchor: AnchorBody,
    },
}

/// Body of `DELETE /anchor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAnchorBody {
    /// Target anchor.
    pub anchor_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_bodies_match_service_shape() {
        let confirm = PutAnchorBody::Confirm {
            anchor_id: "qry-1".into(),
        };
        assert_eq!(
            serde_json::to_value(&confirm).unwrap(),
            serde_json::json!({"operation": "confirm", "anchor_id": "qry-1"})
        );

        let refine = PutAnchorBody::Refine {
            anchor: AnchorBody {
                id: "qry-1".into(),
                cells: vec![AnchorCell::new("c1"), AnchorCell::new("c2")],
            },
        };
        assert_eq!(
            serde_json::to_value(&refine).unwrap(),
            serde_json::json!({
                "operation": "refine",
                "anchor": {"id": "qry-1", "cells": [{"cell_id": "c1"}, {"cell_id": "c2"}]}
            })
        );

        let delete = DeleteAnchorBody {
            anchor_id: "user-0".into(),
        };
        assert_eq!(
            serde_json::to_value(&delete).unwrap(),
            serde_json::json!({"anchor_id": "user-0"})
        );
    }
}
