//! In-memory anchor service used by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use super::{Acknowledgement, AnchorGateway};
use crate::anchor::{
    Anchor, AnchorBucket, AnchorCell, AnchorSnapshot, ModelArtifact,
    RankedGenes,
};
use crate::error::FetchError;

pub(crate) const ENDPOINT: &str = "memory://anchor";

/// Applies mutations to an owned snapshot and counts every call.
pub(crate) struct MemoryBackend {
    snapshot: Mutex<AnchorSnapshot>,
    fetches: AtomicUsize,
    mutations: AtomicUsize,
    model_updates: AtomicUsize,
    held: Mutex<bool>,
    released: Condvar,
    fail_next: Mutex<Option<FetchError>>,
}

impl MemoryBackend {
    pub(crate) fn new(snapshot: AnchorSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            fetches: AtomicUsize::new(0),
            mutations: AtomicUsize::new(0),
            model_updates: AtomicUsize::new(0),
            held: Mutex::new(false),
            released: Condvar::new(),
            fail_next: Mutex::new(None),
        }
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub(crate) fn model_update_count(&self) -> usize {
        self.model_updates.load(Ordering::SeqCst)
    }

    /// Block every `fetch_all` until [`release`](Self::release).
    pub(crate) fn hold(&self) {
        *self.held.lock().unwrap() = true;
    }

    pub(crate) fn release(&self) {
        *self.held.lock().unwrap() = false;
        self.released.notify_all();
    }

    /// Make the next call of any kind fail with `error`.
    pub(crate) fn fail_next(&self, error: FetchError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    pub(crate) fn snapshot(&self) -> AnchorSnapshot {
        self.snapshot.lock().unwrap().clone()
    }

    fn take_failure(&self) -> Result<(), FetchError> {
        self.fail_next.lock().unwrap().take().map_or(Ok(()), Err)
    }

    fn mutate(
        &self,
        f: impl FnOnce(&mut AnchorSnapshot),
    ) -> Result<Acknowledgement, FetchError> {
        let _ = self.mutations.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;
        f(&mut self.snapshot.lock().unwrap());
        Ok(Acknowledgement(serde_json::json!({"status": "ok"})))
    }
}

fn remove(snapshot: &mut AnchorSnapshot, id: &str) -> Option<Anchor> {
    for bucket in [
        &mut snapshot.confirmed,
        &mut snapshot.unjustified,
        &mut snapshot.user_selection,
    ] {
        if let Some(pos) = bucket.iter().position(|a| a.id == id) {
            return Some(bucket.remove(pos));
        }
    }
    None
}

impl AnchorGateway for MemoryBackend {
    fn fetch_all(&self, _iteration: u64) -> Result<AnchorSnapshot, FetchError> {
        let _ = self.fetches.fetch_add(1, Ordering::SeqCst);
        let mut held = self.held.lock().unwrap();
        while *held {
            held = self.released.wait(held).unwrap();
        }
        drop(held);
        self.take_failure()?;
        Ok(self.snapshot())
    }

    fn confirm(&self, anchor_id: &str) -> Result<Acknowledgement, FetchError> {
        self.mutate(|s| {
            if let Some(anchor) = remove(s, anchor_id) {
                s.confirmed.push(anchor);
            }
        })
    }

    fn refine(
        &self,
        anchor_id: &str,
        cells: &[AnchorCell],
    ) -> Result<Acknowledgement, FetchError> {
        self.mutate(|s| {
            for bucket in AnchorBucket::ALL {
                let anchors = match bucket {
                    AnchorBucket::Confirmed => &mut s.confirmed,
                    AnchorBucket::Unjustified => &mut s.unjustified,
                    AnchorBucket::UserSelection => &mut s.user_selection,
                };
                if let Some(a) = anchors.iter_mut().find(|a| a.id == anchor_id) {
                    a.cells = cells.to_vec();
                }
            }
        })
    }

    fn add(
        &self,
        anchor_id: &str,
        cells: &[AnchorCell],
    ) -> Result<Acknowledgement, FetchError> {
        self.mutate(|s| {
            s.user_selection.push(Anchor {
                id: anchor_id.to_owned(),
                reference_cluster_id: String::new(),
                cells: cells.to_vec(),
                ranked_genes: RankedGenes::default(),
                median_anchor_distance: None,
            });
        })
    }

    fn delete(&self, anchor_id: &str) -> Result<Acknowledgement, FetchError> {
        self.mutate(|s| {
            let _ = remove(s, anchor_id);
        })
    }

    fn request_model_update(
        &self,
        next_iteration: u64,
    ) -> Result<ModelArtifact, FetchError> {
        let _ = self.model_updates.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;
        Ok(ModelArtifact {
            payload: format!("model {next_iteration}"),
        })
    }
}

/// Anchor with the given member cells, linked to `reference_cluster_id`.
pub(crate) fn anchor(
    id: &str,
    reference_cluster_id: &str,
    cells: &[&str],
) -> Anchor {
    Anchor {
        id: id.to_owned(),
        reference_cluster_id: reference_cluster_id.to_owned(),
        cells: cells.iter().map(|c| AnchorCell::new(*c)).collect(),
        ranked_genes: RankedGenes::default(),
        median_anchor_distance: Some(0.5),
    }
}

/// Small snapshot with one anchor per bucket.
pub(crate) fn sample_snapshot() -> AnchorSnapshot {
    AnchorSnapshot {
        confirmed: vec![anchor("qry-0", "0", &["c0", "c1"])],
        unjustified: vec![
            anchor("qry-1", "1", &["c2", "c3", "c4"]),
            anchor("qry-2", "2", &["c5"]),
        ],
        user_selection: vec![anchor("user-0", "1", &["c6", "c7"])],
    }
}

pub(crate) fn service_error() -> FetchError {
    FetchError::Service {
        endpoint: ENDPOINT.to_owned(),
        status: 500,
        headers: Vec::new(),
    }
}
