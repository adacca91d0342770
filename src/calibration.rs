//! Display discovery and calibration.
//!
//! The display service protocol is not part of this crate. A
//! [`CalibrationProvider`] hands over the per-device numbers the compositor
//! needs; [`Offline`] and [`FixedCalibration`] cover the two cases that do not
//! need a running service.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    error::{LinkError, Result},
    types::{Position, Size},
};

/// Calibration constants of one connected display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCalibration {
    /// Desktop position of the display.
    pub window_position: Position,
    /// Native resolution of the display.
    pub window_size: Size,
    /// Physical aspect ratio reported by the display.
    pub display_aspect: f32,
    /// Lenticules per screen width.
    pub pitch: f32,
    /// Lens slant.
    pub tilt: f32,
    /// View phase offset.
    pub center: f32,
    /// Width of one subpixel in screen units.
    pub subp: f32,
    /// Total view cone in degrees.
    pub view_cone: f64,
    /// Fringe correction. Reported for diagnostics only.
    #[serde(default)]
    pub fringe: f32,
    /// Subpixel sample feeding red.
    #[serde(default)]
    pub ri: i32,
    /// Subpixel sample feeding blue.
    #[serde(default = "default_bi")]
    pub bi: i32,
    /// Whether the lens reverses the view order.
    #[serde(default)]
    pub inv_view: bool,
}

fn default_bi() -> i32 {
    2
}

/// Source of display presence and calibration.
///
/// Implementations wrap a vendor service. All calls happen on the render
/// thread; [`connect`](Self::connect) is called at most once per session and
/// [`disconnect`](Self::disconnect) closes it.
pub trait CalibrationProvider {
    /// Open a session on behalf of `app_name`.
    ///
    /// # Errors
    ///
    /// Returns the reason the service could not be reached.
    fn connect(&mut self, app_name: &str) -> Result<(), LinkError>;

    /// Number of displays attached.
    fn device_count(&self) -> usize;

    /// HDMI name of display `index`.
    fn device_name(&self, index: usize) -> Option<String>;

    /// Device-type id of display `index`, e.g. `"portrait"`.
    fn device_type(&self, index: usize) -> Option<String>;

    /// Calibration of display `index`.
    fn calibration(&self, index: usize) -> Option<DeviceCalibration>;

    /// Close the session. Must be safe to call when not connected.
    fn disconnect(&mut self);
}

/// A provider with no service behind it. Every handshake fails with
/// [`LinkError::NoService`], which leaves the interface in quilt-only mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct Offline;

impl CalibrationProvider for Offline {
    fn connect(&mut self, _app_name: &str) -> Result<(), LinkError> {
        Err(LinkError::NoService)
    }

    fn device_count(&self) -> usize {
        0
    }

    fn device_name(&self, _index: usize) -> Option<String> {
        None
    }

    fn device_type(&self, _index: usize) -> Option<String> {
        None
    }

    fn calibration(&self, _index: usize) -> Option<DeviceCalibration> {
        None
    }

    fn disconnect(&mut self) {}
}

/// One entry of a [`FixedCalibration`] file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedDevice {
    /// HDMI name.
    #[serde(default)]
    pub name: String,
    /// Device-type id, e.g. `"standard"`.
    pub device_type: String,
    /// Captured calibration.
    pub calibration: DeviceCalibration,
}

/// Calibration captured ahead of time, for machines without the service.
///
/// ```
/// # use lightfield_renderer_glow::{CalibrationProvider, FixedCalibration};
/// let mut provider = FixedCalibration::from_json(r#"{"devices": [{
///     "deviceType": "portrait",
///     "calibration": {
///         "windowPosition": {"x": 1920, "y": 0},
///         "windowSize": {"width": 1536, "height": 2048},
///         "displayAspect": 0.75, "pitch": 52.0, "tilt": -7.2,
///         "center": 0.12, "subp": 0.00022, "viewCone": 40.0
///     }
/// }]}"#)?;
/// provider.connect("demo")?;
/// assert_eq!(provider.device_type(0).as_deref(), Some("portrait"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixedCalibration {
    devices: Vec<FixedDevice>,
    #[serde(skip)]
    connected: bool,
}

impl FixedCalibration {
    /// Provider serving `devices`.
    #[must_use]
    pub fn new(devices: Vec<FixedDevice>) -> Self {
        Self {
            devices,
            connected: false,
        }
    }

    /// Parse a calibration file of the form `{"devices": [...]}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the text is not a
    /// valid calibration file.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Whether a session is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn device(&self, index: usize) -> Option<&FixedDevice> {
        self.devices.get(index).filter(|_| self.connected)
    }
}

impl CalibrationProvider for FixedCalibration {
    fn connect(&mut self, _app_name: &str) -> Result<(), LinkError> {
        self.connected = true;
        Ok(())
    }

    fn device_count(&self) -> usize {
        if self.connected { self.devices.len() } else { 0 }
    }

    fn device_name(&self, index: usize) -> Option<String> {
        self.device(index).map(|device| device.name.clone())
    }

    fn device_type(&self, index: usize) -> Option<String> {
        self.device(index).map(|device| device.device_type.clone())
    }

    fn calibration(&self, index: usize) -> Option<DeviceCalibration> {
        self.device(index).map(|device| device.calibration)
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

/// What the interface learned from the provider during `initialize`.
///
/// Read-only once populated.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationState {
    /// Index of the display in use.
    pub device_index: usize,
    /// Device type the display reported.
    pub device_type: Option<String>,
    /// Calibration of the display in use.
    pub calibration: DeviceCalibration,
}

/// Handshake with `provider` and read display `device_index`.
///
/// Logs every attached display at debug level.
pub(crate) fn probe(
    provider: &mut dyn CalibrationProvider,
    app_name: &str,
    device_index: usize,
) -> Result<CalibrationState, LinkError> {
    provider.connect(app_name)?;

    let count = provider.device_count();
    debug!("connected device count: {count}");
    if count == 0 {
        return Err(LinkError::NoDevices);
    }
    for index in 0..count {
        debug!("Device information for display {index}:");
        if let Some(name) = provider.device_name(index) {
            debug!("\tName: {name}");
        }
        if let Some(device_type) = provider.device_type(index) {
            debug!("\tType: {device_type}");
        }
        if let Some(cal) = provider.calibration(index) {
            debug!("\tPosition: {}, {}", cal.window_position.x, cal.window_position.y);
            debug!("\tSize: {}, {}", cal.window_size.width, cal.window_size.height);
            debug!("\tAspect ratio: {}", cal.display_aspect);
            debug!("\tpitch: {}", cal.pitch);
            debug!("\ttilt: {}", cal.tilt);
            debug!("\tcenter: {}", cal.center);
            debug!("\tsubp: {}", cal.subp);
            debug!("\tviewCone: {}", cal.view_cone);
            debug!("\tfringe: {}", cal.fringe);
            debug!("\tRI: {} BI: {} invView: {}", cal.ri, cal.bi, cal.inv_view);
        }
    }

    let calibration = provider
        .calibration(device_index)
        .ok_or(LinkError::NoDevices)?;
    Ok(CalibrationState {
        device_index,
        device_type: provider.device_type(device_index),
        calibration,
    })
}
