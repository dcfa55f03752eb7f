use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Viewport", inline)]
#[serde(default)]
/// Framing of a focused anchor set.
pub struct ViewportOptions {
    /// Zoom levels subtracted from the tight fit around the member cells.
    #[schemars(title = "Zoom Margin", range(min = 0.0, max = 6.0), extend("step" = 0.5))]
    pub zoom_margin: f32,
    /// Upper zoom bound; also used when the members span no area.
    #[schemars(title = "Max Zoom", range(min = 1.0, max = 20.0), extend("step" = 0.5))]
    pub max_zoom: f32,
}

impl Default for ViewportOptions {
    fn default() -> Self {
        Self {
            zoom_margin: 2.0,
            max_zoom: 8.0,
        }
    }
}
