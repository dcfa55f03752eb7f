//! Explicit application state shared by the session and the views.
//!
//! Every field has a getter and a setter. Nothing subscribes to changes:
//! derived views key their memos on the values they read, so a setter that
//! changes a value is enough to trigger recomputation on the next read.

use crate::anchor::{DatasetRole, ModelState};

/// 8-bit RGB color.
pub type Rgb = [u8; 3];

/// `[parent, name]` path of a cell set, e.g. `["Prediction", "B cell"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellSetPath {
    /// Name of the partition (tree root).
    pub parent: String,
    /// Name of the class inside the partition.
    pub name: String,
}

impl CellSetPath {
    /// Path of class `name` under `parent`.
    pub fn new(parent: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            name: name.into(),
        }
    }
}

/// Color assigned to one cell set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellSetColor {
    /// Cell set the color applies to.
    pub path: CellSetPath,
    /// Display color.
    pub color: Rgb,
}

/// Look up the color assigned to `path`.
#[must_use]
pub fn color_of(colors: &[CellSetColor], path: &CellSetPath) -> Option<Rgb> {
    colors.iter().find(|c| &c.path == path).map(|c| c.color)
}

/// One named group of cells in a lasso/brush selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedGroup {
    /// Group label.
    pub name: String,
    /// Member cell ids.
    pub cell_ids: Vec<String>,
}

/// Transient lasso/brush selection produced by the pointing layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellSelection {
    /// Selected groups; a committable selection has exactly one.
    pub groups: Vec<SelectedGroup>,
}

impl CellSelection {
    /// Selection holding one group.
    pub fn single(
        name: impl Into<String>,
        cell_ids: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            groups: vec![SelectedGroup {
                name: name.into(),
                cell_ids: cell_ids.into_iter().map(Into::into).collect(),
            }],
        }
    }

    /// The only group, if there is exactly one.
    #[must_use]
    pub fn sole_group(&self) -> Option<&SelectedGroup> {
        match self.groups.as_slice() {
            [group] => Some(group),
            _ => None,
        }
    }
}

/// Interaction mode of the anchor editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EditMode {
    /// Browsing; row actions only.
    #[default]
    Explore,
    /// Drawing a new user anchor.
    Add,
    /// Redrawing an existing anchor's membership.
    Edit {
        /// Anchor being refined.
        anchor_id: String,
    },
}

/// Pointer tool active in the scatterplot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTool {
    /// Free-form lasso.
    Lasso,
}

/// Per-dataset coordination values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleState {
    cell_set_color: Vec<CellSetColor>,
    cell_set_selection: Vec<CellSetPath>,
    additional_cell_sets: Option<CellSelection>,
    anchor_set_focus: Option<String>,
    anchor_set_highlight: Option<String>,
}

impl RoleState {
    /// Colors assigned to cell sets.
    #[must_use]
    pub fn cell_set_color(&self) -> &[CellSetColor] {
        &self.cell_set_color
    }

    /// Cell sets currently shown.
    #[must_use]
    pub fn cell_set_selection(&self) -> &[CellSetPath] {
        &self.cell_set_selection
    }

    /// Pending lasso/brush selection.
    #[must_use]
    pub fn additional_cell_sets(&self) -> Option<&CellSelection> {
        self.additional_cell_sets.as_ref()
    }

    /// Focused anchor.
    #[must_use]
    pub fn anchor_set_focus(&self) -> Option<&str> {
        self.anchor_set_focus.as_deref()
    }

    /// Highlighted (hovered) anchor.
    #[must_use]
    pub fn anchor_set_highlight(&self) -> Option<&str> {
        self.anchor_set_highlight.as_deref()
    }
}

/// Shared state for both dataset roles plus the service status.
#[derive(Debug, Clone, Default)]
pub struct Coordination {
    reference: RoleState,
    query: RoleState,
    anchor_api: ModelState,
    model_api: ModelState,
    edit_mode: EditMode,
    edit_tool: Option<EditTool>,
}

impl Coordination {
    /// Default state at iteration 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- Per-role values --

    /// Values for one dataset role.
    #[must_use]
    pub fn role(&self, role: DatasetRole) -> &RoleState {
        match role {
            DatasetRole::Reference => &self.reference,
            DatasetRole::Query => &self.query,
        }
    }

    fn role_mut(&mut self, role: DatasetRole) -> &mut RoleState {
        match role {
            DatasetRole::Reference => &mut self.reference,
            DatasetRole::Query => &mut self.query,
        }
    }

    /// Set the cell set colors of `role`.
    pub fn set_cell_set_color(
        &mut self,
        role: DatasetRole,
        colors: Vec<CellSetColor>,
    ) {
        self.role_mut(role).cell_set_color = colors;
    }

    /// Set the shown cell sets of `role`.
    pub fn set_cell_set_selection(
        &mut self,
        role: DatasetRole,
        selection: Vec<CellSetPath>,
    ) {
        self.role_mut(role).cell_set_selection = selection;
    }

    /// Set (or clear) the pending lasso selection of `role`.
    pub fn set_additional_cell_sets(
        &mut self,
        role: DatasetRole,
        selection: Option<CellSelection>,
    ) {
        self.role_mut(role).additional_cell_sets = selection;
    }

    /// Set (or clear) the focused anchor of `role`.
    pub fn set_anchor_set_focus(
        &mut self,
        role: DatasetRole,
        anchor_id: Option<String>,
    ) {
        self.role_mut(role).anchor_set_focus = anchor_id;
    }

    /// Set (or clear) the highlighted anchor of `role`.
    pub fn set_anchor_set_highlight(
        &mut self,
        role: DatasetRole,
        anchor_id: Option<String>,
    ) {
        self.role_mut(role).anchor_set_highlight = anchor_id;
    }

    // -- Service status --

    /// Anchor service state.
    #[must_use]
    pub fn anchor_api(&self) -> ModelState {
        self.anchor_api
    }

    /// Set the anchor service state.
    pub fn set_anchor_api(&mut self, state: ModelState) {
        self.anchor_api = state;
    }

    /// Model service state.
    #[must_use]
    pub fn model_api(&self) -> ModelState {
        self.model_api
    }

    /// Set the model service state.
    pub fn set_model_api(&mut self, state: ModelState) {
        self.model_api = state;
    }

    // -- Editor --

    /// Current edit mode.
    #[must_use]
    pub fn edit_mode(&self) -> &EditMode {
        &self.edit_mode
    }

    /// Set the edit mode.
    pub fn set_edit_mode(&mut self, mode: EditMode) {
        self.edit_mode = mode;
    }

    /// Active pointer tool.
    #[must_use]
    pub fn edit_tool(&self) -> Option<EditTool> {
        self.edit_tool
    }

    /// Set (or clear) the pointer tool.
    pub fn set_edit_tool(&mut self, tool: Option<EditTool>) {
        self.edit_tool = tool;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::ApiStatus;

    #[test]
    fn setters_replace_values() {
        let mut c = Coordination::new();
        assert_eq!(c.anchor_api(), ModelState::at(0));

        c.set_anchor_set_focus(DatasetRole::Query, Some("qry-1".into()));
        assert_eq!(c.role(DatasetRole::Query).anchor_set_focus(), Some("qry-1"));
        c.set_anchor_set_focus(DatasetRole::Query, None);
        assert_eq!(c.role(DatasetRole::Query).anchor_set_focus(), None);

        c.set_anchor_api(ModelState::at(0).loading());
        assert_eq!(c.anchor_api().status, ApiStatus::Loading);
        c.set_edit_mode(EditMode::Add);
        assert_eq!(c.edit_mode(), &EditMode::Add);
    }

    #[test]
    fn roles_are_independent() {
        let mut c = Coordination::new();
        c.set_anchor_set_highlight(DatasetRole::Reference, Some("3".into()));
        assert_eq!(c.role(DatasetRole::Reference).anchor_set_highlight(), Some("3"));
        assert_eq!(c.role(DatasetRole::Query).anchor_set_highlight(), None);
    }

    #[test]
    fn sole_group_requires_exactly_one() {
        let one = CellSelection::single("Selection 1", ["a", "b"]);
        assert_eq!(one.sole_group().unwrap().cell_ids, ["a", "b"]);

        let mut two = one.clone();
        two.groups.push(one.groups[0].clone());
        assert!(two.sole_group().is_none());
        assert!(CellSelection::default().sole_group().is_none());
    }
}
