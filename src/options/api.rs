use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[schemars(title = "Service", inline)]
#[serde(default)]
/// Anchor/model service endpoint and request timeouts.
pub struct ApiOptions {
    /// Base URL; `/anchor` and `/model_update` are appended.
    #[schemars(title = "API Root")]
    pub api_root: String,
    /// Timeout for snapshot fetches and anchor mutations, in seconds.
    #[schemars(title = "Request Timeout", range(min = 1, max = 600))]
    pub request_timeout_secs: u64,
    /// Timeout for the model retrain request, in seconds.
    #[schemars(title = "Model Update Timeout", range(min = 1, max = 3600))]
    pub model_update_timeout_secs: u64,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            api_root: "http://localhost:7778/api".into(),
            request_timeout_secs: 30,
            model_update_timeout_secs: 600,
        }
    }
}
