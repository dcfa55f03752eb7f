use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[schemars(title = "Editing", inline)]
#[serde(default)]
/// Anchor add/refine behaviour.
pub struct EditOptions {
    /// Delay before focus returns to a refined anchor, in milliseconds.
    #[schemars(title = "Refocus Delay", range(min = 0, max = 5000), extend("step" = 50))]
    pub refocus_delay_ms: u64,
    /// Smallest lasso selection accepted for add/refine.
    #[schemars(title = "Minimum Selection", range(min = 1, max = 100))]
    pub min_selection_cells: usize,
    /// Prefix of generated user anchor names.
    #[schemars(skip)]
    pub user_set_prefix: String,
}

impl EditOptions {
    /// Refocus delay as a [`Duration`].
    #[must_use]
    pub fn refocus_delay(&self) -> Duration {
        Duration::from_millis(self.refocus_delay_ms)
    }
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            refocus_delay_ms: 500,
            min_selection_cells: 2,
            user_set_prefix: "user-".into(),
        }
    }
}
