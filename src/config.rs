//! User-facing settings for a [`QuiltInterface`](crate::QuiltInterface).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{error::Result, quilt::ClippingLimits};

/// Settings read before `initialize`.
///
/// Every field has a default, so a config file only needs the keys it
/// changes:
///
/// ```
/// # use lightfield_renderer_glow::QuiltConfig;
/// let config = QuiltConfig::from_json(r#"{"device_type": "portrait", "multisamples": 4}"#)?;
/// assert_eq!(config.device_type.as_deref(), Some("portrait"));
/// assert_eq!(config.app_name, "lightfield");
/// # Ok::<(), lightfield_renderer_glow::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuiltConfig {
    /// Name announced to the display service.
    pub app_name: String,
    /// Which attached display to drive.
    pub device_index: usize,
    /// Device type to use regardless of what the hardware reports. `None`
    /// asks the hardware and falls back to `"large"`.
    pub device_type: Option<String>,
    /// Narrow each tile camera's clip range around the focal distance.
    pub use_clipping_limits: bool,
    /// Near plane limit as a multiple of the focal distance.
    pub near_clipping_limit: f64,
    /// Far plane limit as a multiple of the focal distance.
    pub far_clipping_limit: f64,
    /// MSAA samples requested for the tile framebuffer. Clamped to what the
    /// hardware supports.
    pub multisamples: i32,
    /// Show the quilt itself instead of the interleaved image, even with a
    /// display connected.
    pub quilt_preview: bool,
}

impl Default for QuiltConfig {
    fn default() -> Self {
        let limits = ClippingLimits::default();
        Self {
            app_name: "lightfield".to_owned(),
            device_index: 0,
            device_type: None,
            use_clipping_limits: false,
            near_clipping_limit: limits.near,
            far_clipping_limit: limits.far,
            multisamples: 0,
            quilt_preview: false,
        }
    }
}

impl QuiltConfig {
    /// Parse a JSON config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) on malformed input.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the file cannot be read and
    /// [`Error::Config`](crate::Error::Config) if it does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// The clipping limits to apply, or `None` when disabled.
    #[must_use]
    pub fn clipping_limits(&self) -> Option<ClippingLimits> {
        self.use_clipping_limits.then_some(ClippingLimits {
            near: self.near_clipping_limit,
            far: self.far_clipping_limit,
        })
    }
}
