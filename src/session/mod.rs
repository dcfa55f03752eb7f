//! Anchor editing session: the add/edit state machine and the mutation
//! protocol.
//!
//! Every mutation takes the [`MutationLock`], marks the anchor service as
//! loading, and runs through the configured [`Dispatch`]. Completions come
//! back over a channel and are applied in [`AnchorSession::poll`] on the
//! owning thread: a success advances the iteration and fetches the new
//! snapshot, a failure is reported to the [`WarningSink`] and leaves the
//! iteration where it was so the user can retry.
//!
//! Snapshots are fetched only when the iteration changes or on an explicit
//! [`AnchorSession::reload`]; reading one never starts a request, so a failed
//! fetch stays failed until the user retries.
//!
//! ```text
//!            begin_add                 begin_edit(id)
//!   Explore ──────────► Add    Explore ──────────────► Edit(id)
//!      ▲                 │                                │
//!      └── commit / cancel / invalid selection ───────────┘
//! ```

mod command;
mod lock;
mod summary;

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

pub use command::AnchorCommand;
pub use lock::MutationLock;
pub use summary::StatusSummary;
use web_time::Instant;

use crate::anchor::{
    AnchorBucket, AnchorCell, AnchorSnapshot, ApiStatus, DatasetRole,
    ModelArtifact, ModelState,
};
use crate::coordination::{
    CellSelection, CellSetPath, Coordination, EditMode, EditTool,
};
use crate::error::{FetchError, LogWarnings, PolyphonyError, WarningSink};
use crate::gateway::{Acknowledgement, AnchorMutation};
use crate::options::{EditOptions, Options};
use crate::store::{AnchorStore, Dispatch, Pending};
use crate::util::palette::{seed_query_colors, seed_reference_colors};

/// Result of a request, delivered back to the session.
enum Completion {
    Mutation {
        mutation: AnchorMutation,
        outcome: Result<Acknowledgement, FetchError>,
    },
    ModelUpdate {
        iteration: u64,
        outcome: Result<Arc<ModelArtifact>, PolyphonyError>,
    },
}

/// Focus to restore once the settle delay has elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Refocus {
    anchor_id: String,
    at: Instant,
}

/// Snapshot request the session is waiting on.
struct SnapshotFetch {
    iteration: u64,
    pending: Pending<AnchorSnapshot>,
}

/// Query cell-set tree re-seeded whenever the editor resets.
#[derive(Debug, Clone, Default)]
struct QueryCellSets {
    parent: String,
    classes: Vec<String>,
}

/// Owns the coordination state and drives every anchor mutation.
pub struct AnchorSession {
    coordination: Coordination,
    store: AnchorStore,
    edit: EditOptions,
    dispatch: Dispatch,
    lock: MutationLock,
    warnings: Arc<dyn WarningSink>,
    completions_tx: mpsc::Sender<Completion>,
    completions_rx: mpsc::Receiver<Completion>,
    selection_deferred: bool,
    refocus: Option<Refocus>,
    fetch: Option<SnapshotFetch>,
    query_cell_sets: QueryCellSets,
}

impl AnchorSession {
    /// Session at iteration 0 against `store`. Starts fetching the first
    /// snapshot.
    #[must_use]
    pub fn new(store: AnchorStore, options: &Options, dispatch: Dispatch) -> Self {
        let (completions_tx, completions_rx) = mpsc::channel();
        let mut session = Self {
            coordination: Coordination::new(),
            store,
            edit: options.edit.clone(),
            dispatch,
            lock: MutationLock::new(),
            warnings: Arc::new(LogWarnings),
            completions_tx,
            completions_rx,
            selection_deferred: false,
            refocus: None,
            fetch: None,
            query_cell_sets: QueryCellSets::default(),
        };
        session.start_fetch(0);
        session
    }

    /// Report warnings to `sink` instead of the log.
    #[must_use]
    pub fn with_warnings(mut self, sink: Arc<dyn WarningSink>) -> Self {
        self.warnings = sink;
        self
    }

    // -- Accessors --

    /// Shared application state.
    #[must_use]
    pub fn coordination(&self) -> &Coordination {
        &self.coordination
    }

    /// Snapshot cache.
    #[must_use]
    pub fn store(&self) -> &AnchorStore {
        &self.store
    }

    /// Current anchor iteration.
    #[must_use]
    pub fn iteration(&self) -> u64 {
        self.coordination.anchor_api().iteration
    }

    /// Snapshot of the current iteration, if it has landed. Never starts a
    /// request.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<AnchorSnapshot>> {
        self.store.ready(self.iteration())
    }

    /// Fetch the current snapshot again after a failed load. Returns `false`
    /// if it is already loaded or still in flight.
    pub fn reload(&mut self) -> bool {
        self.check_fetch();
        if self.fetch.is_some() || self.snapshot().is_some() {
            return false;
        }
        log::info!("reloading anchors for iteration {}", self.iteration());
        self.start_fetch(self.iteration());
        true
    }

    fn start_fetch(&mut self, iteration: u64) {
        self.fetch = Some(SnapshotFetch {
            iteration,
            pending: self.store.get(iteration),
        });
    }

    /// Forget the tracked fetch once it lands, reporting a failure.
    fn check_fetch(&mut self) {
        let Some(fetch) = self.fetch.take() else {
            return;
        };
        match fetch.pending.try_get() {
            None => self.fetch = Some(fetch),
            Some(Ok(_)) => {}
            Some(Err(e)) => self.warnings.warn(&format!(
                "anchors for iteration {} could not be loaded: {e}",
                fetch.iteration
            )),
        }
    }

    /// Whether a mutation or retrain is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.lock.is_held()
    }

    /// Review progress of the current snapshot.
    #[must_use]
    pub fn status_summary(&self, total_cells: usize) -> Option<StatusSummary> {
        self.snapshot()
            .map(|s| StatusSummary::from_snapshot(&s, total_cells))
    }

    // -- Cell set colors --

    /// Seed reference colors by class size and query colors by name, and
    /// show every query class. The query classes are re-seeded on every
    /// editor reset.
    pub fn seed_cell_sets(
        &mut self,
        reference_parent: &str,
        reference_classes: &[(String, usize)],
        query_parent: &str,
        query_classes: Vec<String>,
    ) {
        let reference = seed_reference_colors(reference_parent, reference_classes);
        self.coordination.set_cell_set_selection(
            DatasetRole::Reference,
            reference.iter().map(|c| c.path.clone()).collect(),
        );
        self.coordination
            .set_cell_set_color(DatasetRole::Reference, reference);
        self.query_cell_sets = QueryCellSets {
            parent: query_parent.to_owned(),
            classes: query_classes,
        };
        self.reset_query_cell_sets();
    }

    fn reset_query_cell_sets(&mut self) {
        let QueryCellSets { parent, classes } = &self.query_cell_sets;
        let colors = seed_query_colors(
            parent,
            classes,
            self.coordination.role(DatasetRole::Reference).cell_set_color(),
        );
        let selection: Vec<CellSetPath> =
            colors.iter().map(|c| c.path.clone()).collect();
        self.coordination.set_cell_set_color(DatasetRole::Query, colors);
        self.coordination
            .set_cell_set_selection(DatasetRole::Query, selection);
        self.coordination
            .set_additional_cell_sets(DatasetRole::Query, None);
    }

    /// Clear the pending selection, restore query colors, and return to
    /// explore mode.
    fn reset_editor(&mut self) {
        self.reset_query_cell_sets();
        self.coordination.set_edit_mode(EditMode::Explore);
        self.coordination.set_edit_tool(None);
        self.selection_deferred = false;
    }

    // -- Focus --

    /// Focus `anchor_id` on `role`, or clear the focus if it is already
    /// focused there.
    pub fn toggle_focus(&mut self, role: DatasetRole, anchor_id: &str) {
        let next = match self.coordination.role(role).anchor_set_focus() {
            Some(current) if current == anchor_id => None,
            _ => Some(anchor_id.to_owned()),
        };
        self.coordination.set_anchor_set_focus(role, next);
    }

    /// Set or clear the hovered anchor on `role`.
    pub fn set_highlight(&mut self, role: DatasetRole, anchor_id: Option<String>) {
        self.coordination.set_anchor_set_highlight(role, anchor_id);
    }

    /// Clear focus and highlight on both datasets.
    pub fn clear_focus(&mut self) {
        for role in [DatasetRole::Reference, DatasetRole::Query] {
            self.coordination.set_anchor_set_focus(role, None);
            self.coordination.set_anchor_set_highlight(role, None);
        }
        self.refocus = None;
    }

    // -- Edit state machine --

    /// Enter add mode with an empty selection. Replaces any active edit.
    pub fn begin_add(&mut self) {
        log::debug!("edit mode: add");
        self.coordination
            .set_additional_cell_sets(DatasetRole::Query, None);
        self.coordination.set_edit_mode(EditMode::Add);
        self.coordination.set_edit_tool(Some(EditTool::Lasso));
        self.selection_deferred = false;
    }

    /// Enter edit mode for `anchor_id`, focusing it. Confirmed and unknown
    /// anchors are rejected.
    pub fn begin_edit(&mut self, anchor_id: &str) -> bool {
        let Some(snapshot) = self.snapshot() else {
            self.warnings
                .warn(&format!("cannot edit {anchor_id}: anchors are not loaded"));
            return false;
        };
        match snapshot.bucket_of(anchor_id) {
            None => {
                self.warnings
                    .warn(&format!("cannot edit {anchor_id}: no such anchor"));
                return false;
            }
            Some(AnchorBucket::Confirmed) => {
                self.warnings.warn(&format!(
                    "cannot edit {anchor_id}: confirmed anchors are final"
                ));
                return false;
            }
            Some(_) => {}
        }

        log::debug!("edit mode: edit {anchor_id}");
        self.coordination.set_anchor_set_highlight(DatasetRole::Query, None);
        self.coordination
            .set_anchor_set_focus(DatasetRole::Query, Some(anchor_id.to_owned()));
        self.coordination
            .set_additional_cell_sets(DatasetRole::Query, None);
        self.coordination.set_edit_mode(EditMode::Edit {
            anchor_id: anchor_id.to_owned(),
        });
        self.coordination.set_edit_tool(Some(EditTool::Lasso));
        self.selection_deferred = false;
        true
    }

    /// Leave add/edit mode without committing.
    pub fn cancel(&mut self) {
        log::debug!("edit cancelled");
        self.reset_editor();
    }

    /// Store a new lasso/brush selection and, in add or edit mode, commit it
    /// if it is valid.
    ///
    /// While a mutation is in flight the selection is kept and evaluated
    /// once the mutation completes. A selection that is not exactly one group
    /// of at least the minimum number of cells resets the editor to explore
    /// without any request, and returns `false`.
    pub fn set_selection(&mut self, selection: Option<CellSelection>) -> bool {
        self.coordination
            .set_additional_cell_sets(DatasetRole::Query, selection);
        self.evaluate_selection()
    }

    /// `false` only when an add/edit selection was rejected.
    fn evaluate_selection(&mut self) -> bool {
        let mode = self.coordination.edit_mode().clone();
        if mode == EditMode::Explore {
            return true;
        }
        if !self.coordination.anchor_api().is_idle() || self.lock.is_held() {
            log::debug!("selection deferred: anchor service busy");
            self.selection_deferred = true;
            return true;
        }

        let cells: Option<Vec<AnchorCell>> = self
            .coordination
            .role(DatasetRole::Query)
            .additional_cell_sets()
            .and_then(CellSelection::sole_group)
            .filter(|g| g.cell_ids.len() >= self.edit.min_selection_cells)
            .map(|g| g.cell_ids.iter().map(AnchorCell::new).collect());
        let Some(cells) = cells else {
            log::debug!("invalid selection, back to explore");
            self.reset_editor();
            return false;
        };

        let mutation = match mode {
            EditMode::Edit { anchor_id } => AnchorMutation::Refine { anchor_id, cells },
            EditMode::Add => {
                let Some(snapshot) = self.snapshot() else {
                    log::debug!("selection deferred: anchors are not loaded");
                    self.selection_deferred = true;
                    return true;
                };
                AnchorMutation::Add {
                    anchor_id: snapshot.next_user_set_name(&self.edit.user_set_prefix),
                    cells,
                }
            }
            EditMode::Explore => return true,
        };
        self.launch(mutation)
    }

    // -- Row actions --

    /// Confirm `anchor_id`. Ignored unless the service is idle.
    pub fn confirm(&mut self, anchor_id: &str) -> bool {
        self.launch(AnchorMutation::Confirm {
            anchor_id: anchor_id.to_owned(),
        })
    }

    /// Delete `anchor_id`. Ignored unless the service is idle.
    pub fn delete(&mut self, anchor_id: &str) -> bool {
        self.launch(AnchorMutation::Delete {
            anchor_id: anchor_id.to_owned(),
        })
    }

    /// Retrain the model towards the next model iteration. On success both
    /// the model and the anchor iteration advance.
    pub fn request_model_update(&mut self) -> bool {
        if !self.coordination.model_api().is_idle() || !self.lock.try_acquire() {
            log::warn!("model update rejected: a request is already in flight");
            return false;
        }
        let model = self.coordination.model_api();
        let iteration = model.iteration + 1;
        self.coordination.set_model_api(model.loading());
        log::info!("requesting model update to iteration {iteration}");

        let pending = self.store.model(iteration);
        let tx = self.completions_tx.clone();
        let spawned = self.dispatch.run("model-update", move || {
            let outcome = pending.wait();
            let _ = tx.send(Completion::ModelUpdate { iteration, outcome });
        });
        if let Err(e) = spawned {
            self.lock.release();
            self.coordination.set_model_api(model);
            self.warnings
                .warn(&format!("model update could not start: {e}"));
            return false;
        }
        true
    }

    fn launch(&mut self, mutation: AnchorMutation) -> bool {
        let state = self.coordination.anchor_api();
        if !state.is_idle() || !self.lock.try_acquire() {
            log::warn!(
                "{} of {} rejected: a request is already in flight",
                mutation.operation(),
                mutation.anchor_id()
            );
            return false;
        }
        log::info!("{} {}", mutation.operation(), mutation.anchor_id());
        self.coordination.set_anchor_api(state.loading());

        let gateway = Arc::clone(self.store.gateway());
        let tx = self.completions_tx.clone();
        let job_mutation = mutation.clone();
        let spawned = self.dispatch.run("anchor-mutation", move || {
            let outcome = job_mutation.apply(gateway.as_ref());
            let _ = tx.send(Completion::Mutation {
                mutation: job_mutation,
                outcome,
            });
        });
        if let Err(e) = spawned {
            self.lock.release();
            self.coordination.set_anchor_api(state);
            self.warnings.warn(&format!(
                "{} of {} could not start: {e}",
                mutation.operation(),
                mutation.anchor_id()
            ));
            return false;
        }
        true
    }

    // -- Frame loop --

    /// Apply every completion that has arrived, report a failed snapshot
    /// fetch, then run [`tick`](Self::tick). Returns the number of
    /// completions applied.
    pub fn poll(&mut self, now: Instant) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            match completion {
                Completion::Mutation { mutation, outcome } => {
                    self.finish_mutation(mutation, outcome, now);
                }
                Completion::ModelUpdate { iteration, outcome } => {
                    self.finish_model_update(iteration, outcome);
                }
            }
            applied += 1;
        }
        self.check_fetch();
        if self.selection_deferred && !self.lock.is_held() {
            self.selection_deferred = false;
            let _ = self.evaluate_selection();
        }
        let _ = self.tick(now);
        applied
    }

    /// Restore a pending refocus once its delay has elapsed. Returns whether
    /// the focus changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.refocus.take() {
            Some(refocus) if refocus.at <= now => {
                log::debug!("refocusing {}", refocus.anchor_id);
                self.coordination
                    .set_anchor_set_focus(DatasetRole::Query, Some(refocus.anchor_id));
                true
            }
            pending => {
                self.refocus = pending;
                false
            }
        }
    }

    fn advance_anchors(&mut self) {
        let next = self.coordination.anchor_api().advanced();
        self.coordination.set_anchor_api(next);
        log::info!("anchor iteration {}", next.iteration);
        self.start_fetch(next.iteration);
    }

    fn finish_mutation(
        &mut self,
        mutation: AnchorMutation,
        outcome: Result<Acknowledgement, FetchError>,
        now: Instant,
    ) {
        self.lock.release();
        if let Err(e) = outcome {
            let state = self.coordination.anchor_api();
            self.coordination.set_anchor_api(ModelState {
                status: ApiStatus::Success,
                ..state
            });
            self.warnings.warn(&format!(
                "{} of {} failed: {e}",
                mutation.operation(),
                mutation.anchor_id()
            ));
            return;
        }

        self.advance_anchors();
        match mutation {
            AnchorMutation::Refine { anchor_id, .. } => {
                self.reset_editor();
                self.coordination.set_anchor_set_focus(DatasetRole::Query, None);
                self.refocus = Some(Refocus {
                    anchor_id,
                    at: now + self.refocus_delay(),
                });
            }
            AnchorMutation::Add { .. } => {
                self.reset_editor();
                self.coordination.set_anchor_set_focus(DatasetRole::Query, None);
            }
            AnchorMutation::Delete { anchor_id } => {
                for role in [DatasetRole::Reference, DatasetRole::Query] {
                    if self.coordination.role(role).anchor_set_focus() == Some(anchor_id.as_str()) {
                        self.coordination.set_anchor_set_focus(role, None);
                    }
                }
            }
            AnchorMutation::Confirm { .. } => {}
        }
    }

    fn finish_model_update(
        &mut self,
        iteration: u64,
        outcome: Result<Arc<ModelArtifact>, PolyphonyError>,
    ) {
        self.lock.release();
        let model = self.coordination.model_api();
        match outcome {
            Ok(_) => {
                log::info!("model iteration {iteration}");
                self.coordination.set_model_api(ModelState::at(iteration));
                self.advance_anchors();
            }
            Err(PolyphonyError::Fetch(e)) if e.is_timeout() => {
                self.coordination.set_model_api(ModelState {
                    status: ApiStatus::Success,
                    ..model
                });
                self.warnings.warn(&format!("model update timed out: {e}"));
            }
            Err(e) => {
                self.coordination.set_model_api(ModelState {
                    status: ApiStatus::Success,
                    ..model
                });
                self.warnings.warn(&format!("model update failed: {e}"));
            }
        }
    }

    fn refocus_delay(&self) -> Duration {
        self.edit.refocus_delay()
    }
}
