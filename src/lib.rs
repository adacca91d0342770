//! Quilt rendering and light-field compositing for [Looking Glass] displays,
//! using OpenGL via [glow].
//!
//! A light-field display shows a different image to each viewing angle. The
//! input it expects is a *quilt*: one texture holding a grid of views of the
//! same scene, each rendered from a camera shifted sideways along a view
//! cone. This crate renders those views into a quilt with
//! [`QuiltInterface`] and then composites the quilt onto the display with a
//! lenticular interleaving shader, using the per-unit calibration reported
//! by a [`CalibrationProvider`].
//!
//! # Features
//!
//! - **Device profiles** for every known display type, with quilt size,
//!   tile grid and aspect ratio (see [`device`]).
//! - **Off-axis tile cameras**: each tile shifts the camera along the view
//!   cone and skews the projection so the focal plane stays put.
//! - **Multisampled tiles** resolved into the quilt with a blit.
//! - **Preview mode** that draws the raw quilt instead of interleaving it.
//! - **Quilt export** to an image file and PNG sequence recording.
//! - **Backend-neutral core**: everything above is written against
//!   [`GraphicsContext`]. [`GlowContext`] implements it over OpenGL
//!   (feature `glow`, on by default).
//!
//! # Safety
//!
//! Creating a [`GlowContext`] is `unsafe`: the OpenGL context it wraps must
//! be current on the calling thread for as long as the wrapper is used.
//! Everything else is safe.
//!
//! [Looking Glass]: https://lookingglassfactory.com
//! [glow]: https://docs.rs/glow

mod calibration;
mod camera;
mod compositor;
mod config;
mod context;
pub mod device;
mod error;
mod export;
mod framebuffer;
mod geometry;
#[cfg(feature = "glow")]
mod gl;
mod interface;
mod quilt;
mod shaders;
#[cfg(test)]
mod testing;
mod types;
mod window;

pub use calibration::{
    CalibrationProvider, CalibrationState, DeviceCalibration, FixedCalibration, FixedDevice,
    Offline,
};
pub use camera::{adjust_camera, clamp_clipping_range, offset_angle, Camera, Scene};
pub use compositor::{CompositeMode, LightFieldCompositor};
pub use config::QuiltConfig;
pub use context::GraphicsContext;
pub use device::{DeviceProfile, TileGrid};
pub use error::{Error, GraphicsError, LinkError, Result};
pub use export::{rgba_to_rgb_top_down, save_rgb, FrameSink, PngSequenceSink};
pub use framebuffer::{
    effective_samples, FramebufferManager, FramebufferSet, QuiltTarget, RenderTarget,
};
pub use geometry::QuiltGeometry;
#[cfg(feature = "glow")]
pub use gl::GlowContext;
pub use interface::QuiltInterface;
pub use quilt::{render_quilt, ClippingLimits, RenderFn, ViewSettings};
pub use shaders::{LIGHTFIELD_FRAGMENT_SRC, QUAD_VERTEX_SRC, QUILT_FRAGMENT_SRC};
pub use types::{
    Attachment, Filter, FramebufferTarget, PixelFormat, Position, QuadVertex, Rect, Size,
    Uniform, Wrap, FULLSCREEN_QUAD,
};
pub use window::{LightFieldWindow, PlatformWindow};
