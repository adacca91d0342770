//! Driving a display window with a [`QuiltInterface`].
//!
//! One [`PlatformWindow`] implementation per windowing backend is all a host
//! needs; [`LightFieldWindow`] does the rest.

use std::path::{Path, PathBuf};

use crate::{
    calibration::{CalibrationProvider, Offline},
    camera::Scene,
    config::QuiltConfig,
    context::GraphicsContext,
    device,
    error::Result,
    interface::QuiltInterface,
    quilt::RenderFn,
    types::{FramebufferTarget, Position, Size},
};

/// The capabilities a light-field window needs from the host's windowing
/// layer.
pub trait PlatformWindow {
    /// Graphics context of the window.
    type Context: GraphicsContext;

    /// The window's context, made current.
    fn context(&mut self) -> &mut Self::Context;

    /// Drawable size in pixels.
    fn size(&self) -> Size;

    /// Resize the window.
    fn set_size(&mut self, size: Size);

    /// Move the window on the desktop.
    fn set_position(&mut self, position: Position);

    /// Show or hide the window decorations.
    fn set_borderless(&mut self, borderless: bool);

    /// Swap buffers.
    fn present(&mut self);
}

type ProviderFactory = Box<dyn FnMut() -> Box<dyn CalibrationProvider>>;

/// A window placed on a light-field display that renders scenes as quilts.
///
/// On creation the interface is initialized and the window is moved over the
/// display, sized to it and made borderless. GPU resources are released when
/// the window is dropped, while its context still exists.
pub struct LightFieldWindow<W: PlatformWindow> {
    window: W,
    interface: QuiltInterface<W::Context>,
    providers: ProviderFactory,
}

impl<W: PlatformWindow> std::fmt::Debug for LightFieldWindow<W>
where
    W: std::fmt::Debug,
    W::Context: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightFieldWindow")
            .field("window", &self.window)
            .field("interface", &self.interface)
            .finish_non_exhaustive()
    }
}

impl<W: PlatformWindow> LightFieldWindow<W> {
    /// Wrap `window`. `providers` is called for a fresh calibration provider
    /// now and whenever the device type changes.
    pub fn new(
        window: W,
        config: QuiltConfig,
        providers: impl FnMut() -> Box<dyn CalibrationProvider> + 'static,
    ) -> Self {
        let mut providers: ProviderFactory = Box::new(providers);
        let interface = QuiltInterface::new(config, providers());
        let mut this = Self {
            window,
            interface,
            providers,
        };
        this.place_window();
        this
    }

    /// Wrap `window` without a display service.
    pub fn offline(window: W, config: QuiltConfig) -> Self {
        Self::new(window, config, || Box::new(Offline))
    }

    fn place_window(&mut self) {
        self.interface.initialize();
        self.window.set_size(self.interface.display_size());
        self.window.set_position(self.interface.display_position());
        self.window.set_borderless(true);
    }

    /// Render `scene` as a quilt, composite it to the window and present.
    ///
    /// # Errors
    ///
    /// Returns allocation or shader failures from the interface.
    pub fn render<S: Scene + ?Sized>(&mut self, scene: &mut S) -> Result<()> {
        self.render_with(scene, None)
    }

    /// Like [`render`](Self::render), with a custom per-tile render callback.
    ///
    /// # Errors
    ///
    /// Returns allocation or shader failures from the interface.
    pub fn render_with<S: Scene + ?Sized>(
        &mut self,
        scene: &mut S,
        render: Option<RenderFn<'_, S>>,
    ) -> Result<()> {
        let ctx = self.window.context();
        self.interface.render_quilt(ctx, scene, render)?;
        ctx.bind_framebuffer(FramebufferTarget::Draw, None);
        self.interface.draw_light_field(ctx)?;
        self.window.present();
        Ok(())
    }

    /// Switch to another device type. The interface is torn down and rebuilt,
    /// which reconnects to the display service.
    pub fn set_device_type(&mut self, device_type: &str) {
        self.interface
            .release_graphics_resources(self.window.context());
        let config = QuiltConfig {
            device_type: Some(device_type.to_owned()),
            ..self.interface.config().clone()
        };
        self.interface = QuiltInterface::new(config, (self.providers)());
        self.place_window();
    }

    /// Registry ids of every known device type.
    #[must_use]
    pub fn device_types(&self) -> Vec<&'static str> {
        device::devices().map(|(id, _)| id).collect()
    }

    /// Enable or disable clip range narrowing.
    pub fn set_use_clipping_limits(&mut self, enabled: bool) {
        self.interface.set_use_clipping_limits(enabled);
    }

    /// Near plane limit as a multiple of the focal distance.
    pub fn set_near_clipping_limit(&mut self, limit: f64) {
        self.interface.set_near_clipping_limit(limit);
    }

    /// Far plane limit as a multiple of the focal distance.
    pub fn set_far_clipping_limit(&mut self, limit: f64) {
        self.interface.set_far_clipping_limit(limit);
    }

    /// Save the last rendered quilt.
    ///
    /// # Errors
    ///
    /// See [`QuiltInterface::save_quilt`].
    pub fn save_quilt(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.interface.save_quilt(self.window.context(), path)
    }

    /// Record every rendered quilt as PNGs in `dir`.
    ///
    /// # Errors
    ///
    /// See [`QuiltInterface::start_recording_quilt`].
    pub fn start_recording_quilt(&mut self, dir: impl Into<PathBuf>) -> Result<()> {
        self.interface.start_recording_quilt(dir)
    }

    /// Stop recording.
    ///
    /// # Errors
    ///
    /// See [`QuiltInterface::stop_recording_quilt`].
    pub fn stop_recording_quilt(&mut self) -> Result<()> {
        self.interface.stop_recording_quilt()
    }

    /// Free the interface's GPU resources now. They are recreated on the next
    /// render.
    pub fn release(&mut self) {
        self.interface
            .release_graphics_resources(self.window.context());
    }

    /// The quilt interface.
    #[must_use]
    pub fn interface(&self) -> &QuiltInterface<W::Context> {
        &self.interface
    }

    /// The quilt interface, mutably.
    pub fn interface_mut(&mut self) -> &mut QuiltInterface<W::Context> {
        &mut self.interface
    }

    /// The wrapped window.
    #[must_use]
    pub fn window(&self) -> &W {
        &self.window
    }
}

impl<W: PlatformWindow> Drop for LightFieldWindow<W> {
    fn drop(&mut self) {
        self.release();
    }
}
