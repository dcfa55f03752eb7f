use super::AnchorSession;
use crate::anchor::DatasetRole;
use crate::coordination::CellSelection;

/// A user-level operation on the anchor session.
///
/// Row actions, toolbar buttons, the lasso layer and the CLI all go through
/// the same commands:
///
/// ```ignore
/// AnchorCommand::Confirm { anchor_id: "qry-3".into() }.execute(&mut session);
/// AnchorCommand::BeginAdd.execute(&mut session);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorCommand {
    // ── Editing ─────────────────────────────────────────────────────
    /// Start drawing a new user anchor.
    BeginAdd,

    /// Start redrawing an existing, unconfirmed anchor.
    BeginEdit {
        /// Anchor to refine.
        anchor_id: String,
    },

    /// Leave add/edit mode without committing.
    Cancel,

    /// The lasso/brush selection changed.
    SetSelection {
        /// New selection, `None` when cleared.
        selection: Option<CellSelection>,
    },

    // ── Row actions ─────────────────────────────────────────────────
    /// Accept an anchor.
    Confirm {
        /// Target anchor.
        anchor_id: String,
    },

    /// Remove an anchor.
    Delete {
        /// Target anchor.
        anchor_id: String,
    },

    /// Retrain the model on the current anchors.
    UpdateModel,

    /// Retry loading the current snapshot after a failed fetch.
    Reload,

    // ── Focus ───────────────────────────────────────────────────────
    /// Focus an anchor, or unfocus it if it is already focused.
    Focus {
        /// Dataset whose focus changes.
        role: DatasetRole,
        /// Anchor to toggle.
        anchor_id: String,
    },

    /// Set or clear the hovered anchor.
    Highlight {
        /// Dataset whose highlight changes.
        role: DatasetRole,
        /// Hovered anchor, `None` on leave.
        anchor_id: Option<String>,
    },

    /// Clear focus and highlight on both datasets.
    ClearFocus,
}

impl AnchorCommand {
    /// Run this command. Returns `false` when the session rejected it (busy,
    /// unknown or confirmed anchor, invalid selection, nothing to reload).
    /// Rejections are logged.
    pub fn execute(self, session: &mut AnchorSession) -> bool {
        match self {
            Self::BeginAdd => {
                session.begin_add();
                true
            }
            Self::BeginEdit { anchor_id } => session.begin_edit(&anchor_id),
            Self::Cancel => {
                session.cancel();
                true
            }
            Self::SetSelection { selection } => session.set_selection(selection),
            Self::Confirm { anchor_id } => session.confirm(&anchor_id),
            Self::Delete { anchor_id } => session.delete(&anchor_id),
            Self::UpdateModel => session.request_model_update(),
            Self::Reload => session.reload(),
            Self::Focus { role, anchor_id } => {
                session.toggle_focus(role, &anchor_id);
                true
            }
            Self::Highlight { role, anchor_id } => {
                session.set_highlight(role, anchor_id);
                true
            }
            Self::ClearFocus => {
                session.clear_focus();
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::coordination::EditMode;
    use crate::gateway::testing::{sample_snapshot, MemoryBackend};
    use crate::options::Options;
    use crate::store::{AnchorStore, Dispatch};

    #[test]
    fn undersized_add_is_rejected() {
        let backend = Arc::new(MemoryBackend::new(sample_snapshot()));
        let store = AnchorStore::new(backend.clone(), Dispatch::Inline);
        let mut session = AnchorSession::new(store, &Options::default(), Dispatch::Inline);

        assert!(AnchorCommand::BeginAdd.execute(&mut session));
        let selection = Some(CellSelection::single("cli", ["c8"]));
        assert!(!AnchorCommand::SetSelection { selection }.execute(&mut session));
        assert_eq!(session.coordination().edit_mode(), &EditMode::Explore);
        assert!(!session.is_busy());
        assert_eq!(backend.mutation_count(), 0);
    }
}
