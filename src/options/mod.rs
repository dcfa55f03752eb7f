//! Runtime options with TOML file support.
//!
//! Service endpoint, editing behaviour, scoring parameters, viewport framing
//! and the per-dataset column layout are consolidated here. Every section is
//! `#[serde(default)]`, so a file overriding only `[api]` is valid.

mod api;
mod dataset;
mod edit;
mod scoring;
mod viewport;

use std::path::Path;

pub use api::ApiOptions;
pub use dataset::DatasetOptions;
pub use edit::EditOptions;
use schemars::JsonSchema;
pub use scoring::ScoringOptions;
use serde::{Deserialize, Serialize};
pub use viewport::ViewportOptions;

use crate::anchor::DatasetRole;
use crate::error::PolyphonyError;

/// Top-level options container.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema,
)]
#[serde(default)]
pub struct Options {
    /// Anchor/model service.
    pub api: ApiOptions,
    /// Add/refine behaviour.
    pub edit: EditOptions,
    /// Gene overlap scoring.
    pub scoring: ScoringOptions,
    /// Focus framing.
    pub viewport: ViewportOptions,
    /// Reference column layout.
    #[schemars(skip)]
    pub reference: DatasetOptions,
    /// Query column layout.
    #[schemars(skip)]
    pub query: DatasetOptions,
}

impl Options {
    /// Generate JSON Schema describing the UI-exposed options.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Options)
    }

    /// Column layout for one dataset role.
    #[must_use]
    pub fn dataset(&self, role: DatasetRole) -> &DatasetOptions {
        match role {
            DatasetRole::Reference => &self.reference,
            DatasetRole::Query => &self.query,
        }
    }

    /// Load options from a TOML file. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PolyphonyError::Io`] if the file cannot be read and
    /// [`PolyphonyError::OptionsParse`] if it is not valid options TOML.
    pub fn load(path: &Path) -> Result<Self, PolyphonyError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse options from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`PolyphonyError::OptionsParse`] if `content` is not valid
    /// TOML or a field has the wrong type.
    pub fn from_toml(content: &str) -> Result<Self, PolyphonyError> {
        toml::from_str(content)
            .map_err(|e| PolyphonyError::OptionsParse(e.to_string()))
    }

    /// Save options to a TOML file (pretty-printed), creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`PolyphonyError::OptionsParse`] if serialization fails and
    /// [`PolyphonyError::Io`] if the file or its directory cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), PolyphonyError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PolyphonyError::OptionsParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_toml() {
        let opts = Options::default();
        let toml_str = toml::to_string_pretty(&opts).unwrap();
        let parsed: Options = toml::from_str(&toml_str).unwrap();
        assert_eq!(opts, parsed);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
[api]
api_root = "https://align.example.org/api"

[query]
prediction = "obs/predicted_celltype"
"#;
        let opts = Options::from_toml(toml_str).unwrap();
        assert_eq!(opts.api.api_root, "https://align.example.org/api");
        assert_eq!(opts.api.model_update_timeout_secs, 600);
        assert_eq!(opts.edit.refocus_delay_ms, 500);
        assert_eq!(opts.scoring.top_n, 100);
        assert_eq!(
            opts.dataset(DatasetRole::Query).prediction,
            "obs/predicted_celltype"
        );
        assert_eq!(opts.dataset(DatasetRole::Reference).prediction, "obs/prediction");
    }

    #[test]
    fn invalid_toml_is_reported() {
        let err = Options::from_toml("[edit]\nrefocus_delay_ms = \"soon\"")
            .unwrap_err();
        assert!(matches!(err, PolyphonyError::OptionsParse(_)));
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join("polyphony-options-test");
        let path = dir.join("settings.toml");
        let mut opts = Options::default();
        opts.edit.refocus_delay_ms = 250;
        opts.save(&path).unwrap();
        let loaded = Options::load(&path).unwrap();
        assert_eq!(loaded, opts);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn schema_has_expected_properties() {
        let schema_value =
            serde_json::to_value(Options::json_schema()).unwrap();
        let props = schema_value["properties"].as_object().unwrap();

        assert!(props.contains_key("api"));
        assert!(props.contains_key("edit"));
        assert!(props.contains_key("scoring"));
        assert!(props.contains_key("viewport"));

        assert!(!props.contains_key("reference"));
        assert!(!props.contains_key("query"));

        let edit = &props["edit"]["properties"];
        assert!(edit.get("refocus_delay_ms").is_some());
        assert!(edit.get("user_set_prefix").is_none());
    }
}
