//! The top-level facade a render window drives.

use std::path::{Path, PathBuf};

use log::{debug, error, warn};

use crate::{
    calibration::{self, CalibrationProvider, CalibrationState, Offline},
    camera::{self, Camera, Scene},
    compositor::{CompositeMode, LightFieldCompositor},
    config::QuiltConfig,
    context::GraphicsContext,
    device::{self, DeviceProfile, TileGrid, DEFAULT_DEVICE_TYPE},
    error::{Error, LinkError, Result},
    export::{self, FrameSink, PngSequenceSink, RecordingSession},
    framebuffer::{FramebufferManager, FramebufferSet},
    geometry::QuiltGeometry,
    quilt::{self, ClippingLimits, RenderFn, ViewSettings},
    types::{Position, Size},
};

const DEFAULT_DISPLAY_SIZE: Size = Size::new(1280, 720);
const DEFAULT_VIEW_ANGLE: f64 = 30.0;

#[derive(Debug, Clone, PartialEq)]
enum Link {
    Uninitialized,
    Disconnected,
    Connected(CalibrationState),
}

/// Quilt rendering and light-field compositing for one display.
///
/// The interface owns the quilt framebuffers, the compositing programs and
/// any active recording. Scenes and graphics contexts are borrowed per call.
///
/// # Lifecycle
///
/// [`initialize`](Self::initialize) must run before anything renders. It
/// talks to the calibration provider once: with a display attached the
/// interface adopts its size, position, view cone and device type; without one
/// it stays usable and composites the plain quilt, which is what offline
/// export wants. Device selection is fixed from then on; build a new
/// interface to switch devices.
///
/// Call [`release_graphics_resources`](Self::release_graphics_resources)
/// before the graphics context is destroyed.
///
/// ```
/// # use lightfield_renderer_glow::{QuiltConfig, QuiltInterface};
/// # fn demo<C: lightfield_renderer_glow::GraphicsContext>() {
/// let mut quilt = QuiltInterface::<C>::offline(QuiltConfig {
///     device_type: Some("portrait".into()),
///     ..QuiltConfig::default()
/// });
/// quilt.initialize();
/// assert_eq!(quilt.tile_count(), 48);
/// assert_eq!(quilt.quilt_file_suffix(), "_qs8x6");
/// # }
/// ```
pub struct QuiltInterface<C: GraphicsContext> {
    config: QuiltConfig,
    provider: Box<dyn CalibrationProvider>,
    link: Link,
    custom_profile: Option<DeviceProfile>,
    profile: DeviceProfile,
    geometry: QuiltGeometry,
    display_size: Size,
    display_position: Position,
    view_angle: f64,
    aspect_ratio: f64,
    framebuffers: FramebufferManager<C>,
    compositor: LightFieldCompositor<C>,
    recording: Option<RecordingSession>,
}

impl<C: GraphicsContext> std::fmt::Debug for QuiltInterface<C>
where
    C: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuiltInterface")
            .field("config", &self.config)
            .field("link", &self.link)
            .field("profile", &self.profile.id())
            .field("geometry", &self.geometry)
            .field("display_size", &self.display_size)
            .field("recording", &self.recording.is_some())
            .finish_non_exhaustive()
    }
}

impl<C: GraphicsContext> QuiltInterface<C> {
    /// Create an interface that will ask `provider` for a display.
    #[must_use]
    pub fn new(config: QuiltConfig, provider: Box<dyn CalibrationProvider>) -> Self {
        let profile = *device::default_profile();
        Self {
            framebuffers: FramebufferManager::new(config.multisamples),
            config,
            provider,
            link: Link::Uninitialized,
            custom_profile: None,
            profile,
            geometry: QuiltGeometry::new(&profile),
            display_size: DEFAULT_DISPLAY_SIZE,
            display_position: Position::default(),
            view_angle: DEFAULT_VIEW_ANGLE,
            aspect_ratio: profile.aspect_ratio(),
            compositor: LightFieldCompositor::new(),
            recording: None,
        }
    }

    /// Create an interface without a display service, for quilt export.
    #[must_use]
    pub fn offline(config: QuiltConfig) -> Self {
        Self::new(config, Box::new(Offline))
    }

    /// Connect to the display (if any) and settle the quilt layout.
    ///
    /// Does nothing when already initialized. Link failures are logged and
    /// leave the interface disconnected; they are never returned.
    pub fn initialize(&mut self) {
        if self.is_initialized() {
            return;
        }

        self.link = match calibration::probe(
            self.provider.as_mut(),
            &self.config.app_name,
            self.config.device_index,
        ) {
            Ok(state) => Link::Connected(state),
            Err(LinkError::NoDevices) => {
                debug!("display service has no device at index {}", self.config.device_index);
                self.provider.disconnect();
                Link::Disconnected
            }
            Err(err) => {
                error!("Client access error: {err}");
                self.provider.disconnect();
                Link::Disconnected
            }
        };

        let reported = match &self.link {
            Link::Connected(state) => state.device_type.clone(),
            Link::Uninitialized | Link::Disconnected => None,
        };
        self.profile = match (self.custom_profile, self.config.device_type.clone().or(reported)) {
            (Some(profile), _) => profile,
            (None, Some(device_type)) => *device::lookup(&device_type),
            (None, None) => {
                warn!("No Looking Glass device attached defaulting to '{DEFAULT_DEVICE_TYPE}'");
                *device::default_profile()
            }
        };
        self.geometry = QuiltGeometry::new(&self.profile);
        self.aspect_ratio = self.profile.aspect_ratio();

        if let Link::Connected(state) = &self.link {
            let calibration = state.calibration;
            self.view_angle = calibration.view_cone;
            self.display_size = calibration.window_size;
            self.display_position = calibration.window_position;
            let aspect = calibration.window_size.aspect_ratio();
            if aspect > 0.0 {
                self.aspect_ratio = aspect;
            }
        }

        debug!(
            "quilt initialized for '{}': {}x{} quilt, {}x{} tiles of {}x{}",
            self.profile.id(),
            self.geometry.quilt_size().width,
            self.geometry.quilt_size().height,
            self.geometry.tiles().cols(),
            self.geometry.tiles().rows(),
            self.geometry.render_size().width,
            self.geometry.render_size().height,
        );
    }

    /// Whether [`initialize`](Self::initialize) has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        !matches!(self.link, Link::Uninitialized)
    }

    /// Whether a calibrated display is in use.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self.link, Link::Connected(_))
    }

    /// Calibration of the display in use, if connected.
    #[must_use]
    pub fn calibration(&self) -> Option<&CalibrationState> {
        match &self.link {
            Link::Connected(state) => Some(state),
            Link::Uninitialized | Link::Disconnected => None,
        }
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn view_settings(&self) -> ViewSettings {
        ViewSettings {
            view_angle: self.view_angle,
            aspect_ratio: self.aspect_ratio,
            clipping_limits: self.config.clipping_limits(),
        }
    }

    /// Render every tile of `scene` into the quilt.
    ///
    /// `render` replaces the scene's own [`render`](Scene::render) for each
    /// tile. When a recording is active, one frame is written afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before `initialize`, or the
    /// allocation failure if the framebuffers cannot be created.
    pub fn render_quilt<S: Scene + ?Sized>(
        &mut self,
        ctx: &mut C,
        scene: &mut S,
        render: Option<RenderFn<'_, S>>,
    ) -> Result<()> {
        self.ensure_initialized()?;
        let view = self.view_settings();
        let geometry = self.geometry;
        let framebuffers = self.framebuffers.get_or_create(ctx, &geometry)?;
        quilt::render_quilt(ctx, framebuffers, &geometry, &view, scene, render);

        if self.recording.is_some() {
            self.write_quilt_movie_frame(ctx)?;
        }
        Ok(())
    }

    /// Composite the quilt into the bound draw framebuffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before `initialize`,
    /// [`Error::ResourcesReleased`] if no quilt has been rendered since the
    /// last release, or a shader build failure.
    pub fn draw_light_field(&mut self, ctx: &mut C) -> Result<()> {
        self.ensure_initialized()?;
        let texture = self.framebuffers.framebuffers()?.quilt.texture();
        self.draw_light_field_with(ctx, texture)
    }

    /// Composite an externally rendered quilt texture laid out like this
    /// interface's quilt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before `initialize`, or a shader
    /// build failure.
    pub fn draw_light_field_with(&mut self, ctx: &mut C, texture: C::Texture) -> Result<()> {
        self.ensure_initialized()?;
        let mode = match &self.link {
            Link::Connected(state) if !self.config.quilt_preview => {
                CompositeMode::LightField(&state.calibration)
            }
            _ => CompositeMode::Quilt,
        };
        self.compositor
            .draw(ctx, texture, mode, self.display_size, &self.geometry)?;
        Ok(())
    }

    /// The quilt framebuffers, allocated or resized as needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before `initialize`, or the
    /// allocation failure.
    pub fn framebuffers(&mut self, ctx: &mut C) -> Result<&FramebufferSet<C>> {
        self.ensure_initialized()?;
        let geometry = self.geometry;
        self.framebuffers.get_or_create(ctx, &geometry)
    }

    /// Lower-left pixel of `tile` in the quilt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTile`] for tiles outside the quilt.
    pub fn tile_position(&self, tile: usize) -> Result<Position> {
        self.geometry.tile_position(tile)
    }

    /// Move `camera` to its place in the view cone for `tile`. Returns the
    /// lateral offset applied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTile`] for tiles outside the quilt.
    pub fn adjust_camera(&self, camera: &mut Camera, tile: usize) -> Result<f64> {
        let count = self.geometry.tile_count();
        if tile >= count {
            return Err(Error::InvalidTile { tile, count });
        }
        Ok(camera::adjust_camera(
            camera,
            tile,
            self.geometry.tiles(),
            self.view_angle,
            self.aspect_ratio,
        ))
    }

    /// Free all GPU resources. Safe to call any number of times, in any state.
    pub fn release_graphics_resources(&mut self, ctx: &mut C) {
        self.framebuffers.release(ctx);
        self.compositor.release(ctx);
    }

    /// Write the current quilt to an image file.
    ///
    /// The name is used as given; see [`quilt_file_name`](Self::quilt_file_name)
    /// for the conventional layout suffix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] or [`Error::ResourcesReleased`] when
    /// there is no quilt, or the encoding failure.
    pub fn save_quilt(&mut self, ctx: &mut C, path: impl AsRef<Path>) -> Result<()> {
        self.ensure_initialized()?;
        let framebuffers = self.framebuffers.framebuffers()?;
        let size = framebuffers.quilt.size();
        let rgb = export::download_quilt(ctx, framebuffers)?;
        export::save_rgb(path.as_ref(), &rgb, size)
    }

    /// Start recording one PNG per rendered quilt into `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before `initialize`, or the error
    /// from creating the directory.
    pub fn start_recording_quilt(&mut self, dir: impl Into<PathBuf>) -> Result<()> {
        self.start_recording_with(Box::new(PngSequenceSink::new(dir)))
    }

    /// Start recording into `sink`. Ignored with a warning when already
    /// recording.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before `initialize`, or the sink's
    /// `begin` failure.
    pub fn start_recording_with(&mut self, sink: Box<dyn FrameSink>) -> Result<()> {
        self.ensure_initialized()?;
        if self.recording.is_some() {
            warn!("already recording the quilt");
            return Ok(());
        }
        self.recording = Some(RecordingSession::start(sink, self.geometry.quilt_size())?);
        Ok(())
    }

    /// Send the current quilt to the active recording. Does nothing when not
    /// recording.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourcesReleased`] if there is no quilt, or the sink's
    /// write failure.
    pub fn write_quilt_movie_frame(&mut self, ctx: &mut C) -> Result<()> {
        let Some(session) = self.recording.as_mut() else {
            return Ok(());
        };
        let rgb = export::download_quilt(ctx, self.framebuffers.framebuffers()?)?;
        session.write_frame(&rgb)
    }

    /// Finish the active recording. Ignored with a warning when not
    /// recording.
    ///
    /// # Errors
    ///
    /// Returns the sink's finish failure.
    pub fn stop_recording_quilt(&mut self) -> Result<()> {
        match self.recording.take() {
            Some(session) => session.finish(),
            None => {
                warn!("stop requested but the quilt is not being recorded");
                Ok(())
            }
        }
    }

    /// Whether a recording is active.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    fn before_initialize(&self, setting: &str) -> bool {
        if self.is_initialized() {
            warn!("{setting} is fixed once initialized; create a new interface to change it");
            false
        } else {
            true
        }
    }

    /// Choose which attached display to drive. Only effective before
    /// `initialize`.
    pub fn set_device_index(&mut self, index: usize) {
        if self.before_initialize("device index") {
            self.config.device_index = index;
        }
    }

    /// Pin the device type instead of asking the hardware. Only effective
    /// before `initialize`.
    pub fn set_device_type(&mut self, device_type: impl Into<String>) {
        if self.before_initialize("device type") {
            self.config.device_type = Some(device_type.into());
        }
    }

    /// Pin the device type by quilt quality preset (see
    /// [`device::quality_preset`]). Only effective before `initialize`.
    pub fn set_quilt_quality(&mut self, quality: u8) {
        self.set_device_type(device::quality_preset(quality).id());
    }

    /// Use a layout that is not in the registry. Takes precedence over any
    /// device type. Only effective before `initialize`.
    pub fn set_custom_profile(&mut self, profile: DeviceProfile) {
        if self.before_initialize("quilt profile") {
            self.custom_profile = Some(profile);
        }
    }

    /// Enable or disable clip range narrowing.
    pub fn set_use_clipping_limits(&mut self, enabled: bool) {
        self.config.use_clipping_limits = enabled;
    }

    /// Near plane limit as a multiple of the focal distance.
    pub fn set_near_clipping_limit(&mut self, limit: f64) {
        self.config.near_clipping_limit = limit;
    }

    /// Far plane limit as a multiple of the focal distance.
    pub fn set_far_clipping_limit(&mut self, limit: f64) {
        self.config.far_clipping_limit = limit;
    }

    /// Active clipping limits, `None` when disabled.
    #[must_use]
    pub fn clipping_limits(&self) -> Option<ClippingLimits> {
        self.config.clipping_limits()
    }

    /// Show the plain quilt even when a display is connected.
    pub fn set_quilt_preview(&mut self, preview: bool) {
        self.config.quilt_preview = preview;
    }

    /// Current settings.
    #[must_use]
    pub fn config(&self) -> &QuiltConfig {
        &self.config
    }

    /// Active quilt layout.
    #[must_use]
    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// Id of the active profile.
    #[must_use]
    pub fn device_type(&self) -> &str {
        self.profile.id()
    }

    /// Native resolution of the display.
    #[must_use]
    pub fn display_size(&self) -> Size {
        self.display_size
    }

    /// Desktop position of the display.
    #[must_use]
    pub fn display_position(&self) -> Position {
        self.display_position
    }

    /// Size each tile renders at.
    #[must_use]
    pub fn render_size(&self) -> Size {
        self.geometry.render_size()
    }

    /// Size of the quilt texture.
    #[must_use]
    pub fn quilt_size(&self) -> Size {
        self.geometry.quilt_size()
    }

    /// Tile grid of the quilt.
    #[must_use]
    pub fn tiles(&self) -> TileGrid {
        self.geometry.tiles()
    }

    /// Number of views in the quilt.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.geometry.tile_count()
    }

    /// View cone in degrees.
    #[must_use]
    pub fn view_angle(&self) -> f64 {
        self.view_angle
    }

    /// Aspect ratio used to shear tile cameras.
    #[must_use]
    pub fn aspect_ratio(&self) -> f64 {
        self.aspect_ratio
    }

    /// Quilt layout geometry.
    #[must_use]
    pub fn geometry(&self) -> &QuiltGeometry {
        &self.geometry
    }

    /// Layout suffix for quilt file names, e.g. `"_qs5x9"`.
    #[must_use]
    pub fn quilt_file_suffix(&self) -> String {
        self.geometry.file_suffix()
    }

    /// `path` with the layout suffix inserted before its extension.
    #[must_use]
    pub fn quilt_file_name(&self, path: impl AsRef<Path>) -> PathBuf {
        self.geometry.quilt_file_name(path.as_ref())
    }
}

impl<C: GraphicsContext> Drop for QuiltInterface<C> {
    fn drop(&mut self) {
        if let Some(session) = self.recording.take() {
            if let Err(err) = session.finish() {
                error!("failed to finish quilt recording: {err}");
            }
        }
        if self.is_connected() {
            self.provider.disconnect();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        calibration::{tests::PORTRAIT_JSON, DeviceCalibration, FixedCalibration},
        shaders,
        testing::{init_logging, Call, RecordingContext, TestScene},
        types::FramebufferTarget,
    };

    fn offline(device_type: &str) -> QuiltInterface<RecordingContext> {
        let mut quilt = QuiltInterface::offline(QuiltConfig {
            device_type: Some(device_type.to_owned()),
            ..QuiltConfig::default()
        });
        quilt.initialize();
        quilt
    }

    fn tiny() -> DeviceProfile {
        DeviceProfile::new(
            "tiny",
            "Tiny",
            Size::new(8, 4),
            TileGrid::new(4, 2).unwrap(),
            2.0,
        )
        .unwrap()
    }

    #[derive(Default)]
    struct Events(Rc<RefCell<Vec<&'static str>>>);

    struct SpyProvider {
        inner: FixedCalibration,
        events: Rc<RefCell<Vec<&'static str>>>,
    }

    impl CalibrationProvider for SpyProvider {
        fn connect(&mut self, app_name: &str) -> std::result::Result<(), LinkError> {
            self.events.borrow_mut().push("connect");
            self.inner.connect(app_name)
        }
        fn device_count(&self) -> usize {
            self.inner.device_count()
        }
        fn device_name(&self, index: usize) -> Option<String> {
            self.inner.device_name(index)
        }
        fn device_type(&self, index: usize) -> Option<String> {
            self.inner.device_type(index)
        }
        fn calibration(&self, index: usize) -> Option<DeviceCalibration> {
            self.inner.calibration(index)
        }
        fn disconnect(&mut self) {
            self.events.borrow_mut().push("disconnect");
            self.inner.disconnect();
        }
    }

    fn spy(json: &str) -> (Box<SpyProvider>, Events) {
        let events = Events::default();
        let provider = SpyProvider {
            inner: FixedCalibration::from_json(json).unwrap(),
            events: Rc::clone(&events.0),
        };
        (Box::new(provider), events)
    }

    #[test]
    fn calls_before_initialize_are_rejected() {
        let mut ctx = RecordingContext::new();
        let mut scene = TestScene::new(1);
        let mut quilt = QuiltInterface::<RecordingContext>::offline(QuiltConfig::default());

        assert!(matches!(
            quilt.render_quilt(&mut ctx, &mut scene, None),
            Err(Error::NotInitialized)
        ));
        assert!(matches!(quilt.draw_light_field(&mut ctx), Err(Error::NotInitialized)));
        assert!(matches!(
            quilt.start_recording_with(Box::new(PngSequenceSink::new("unused"))),
            Err(Error::NotInitialized)
        ));
        assert!(ctx.calls().is_empty());
        assert!(scene.renders.is_empty());
    }

    #[test]
    fn offline_defaults_to_large() {
        init_logging();
        let mut quilt = QuiltInterface::<RecordingContext>::offline(QuiltConfig::default());
        quilt.initialize();

        assert!(quilt.is_initialized());
        assert!(!quilt.is_connected());
        assert_eq!(quilt.device_type(), "large");
        assert_eq!(quilt.quilt_size(), Size::new(4096, 4096));
        assert_eq!(quilt.render_size(), Size::new(819, 455));
        assert_eq!(quilt.tile_count(), 45);
        assert_eq!(quilt.display_size(), Size::new(1280, 720));
        assert!((quilt.aspect_ratio() - 1.777).abs() < 1e-12);
        assert!((quilt.view_angle() - 30.0).abs() < 1e-12);
        assert_eq!(quilt.quilt_file_suffix(), "_qs5x9");
    }

    #[test]
    fn unknown_pinned_type_falls_back() {
        let quilt = offline("holodeck");
        assert_eq!(quilt.device_type(), "large");
    }

    #[test]
    fn connected_display_supplies_calibration() {
        let (provider, events) = spy(PORTRAIT_JSON);
        let mut quilt = QuiltInterface::<RecordingContext>::new(QuiltConfig::default(), provider);
        quilt.initialize();
        quilt.initialize();

        assert!(quilt.is_connected());
        assert_eq!(*events.0.borrow(), ["connect"], "handshake happens once");
        assert_eq!(quilt.device_type(), "portrait");
        assert_eq!(quilt.display_size(), Size::new(1536, 2048));
        assert_eq!(quilt.display_position(), Position::new(1920, 0));
        assert!((quilt.view_angle() - 40.0).abs() < 1e-12);
        assert!((quilt.aspect_ratio() - 0.75).abs() < 1e-12);
        assert_eq!(quilt.calibration().unwrap().device_index, 0);

        drop(quilt);
        assert_eq!(*events.0.borrow(), ["connect", "disconnect"]);
    }

    #[test]
    fn pinned_type_beats_hardware_and_is_fixed_after_initialize() {
        let (provider, _events) = spy(PORTRAIT_JSON);
        let mut quilt = QuiltInterface::<RecordingContext>::new(QuiltConfig::default(), provider);
        quilt.set_device_type("standard");
        quilt.initialize();
        assert_eq!(quilt.device_type(), "standard");
        assert!(quilt.is_connected());

        quilt.set_device_type("8k");
        quilt.set_custom_profile(tiny());
        assert_eq!(quilt.device_type(), "standard");
        assert_eq!(quilt.config().device_type.as_deref(), Some("standard"));
    }

    #[test]
    fn missing_device_index_disconnects() {
        let (provider, events) = spy(PORTRAIT_JSON);
        let mut quilt = QuiltInterface::<RecordingContext>::new(
            QuiltConfig {
                device_index: 2,
                ..QuiltConfig::default()
            },
            provider,
        );
        quilt.initialize();

        assert!(!quilt.is_connected());
        assert_eq!(quilt.device_type(), "large");
        assert_eq!(*events.0.borrow(), ["connect", "disconnect"]);
        drop(quilt);
        assert_eq!(events.0.borrow().len(), 2, "no second disconnect on drop");
    }

    #[test]
    fn quality_preset_pins_device_type() {
        let mut quilt = QuiltInterface::<RecordingContext>::offline(QuiltConfig::default());
        quilt.set_quilt_quality(0);
        quilt.initialize();
        assert_eq!(quilt.device_type(), "standard");
    }

    #[test]
    fn standard_quilt_end_to_end() {
        init_logging();
        let mut ctx = RecordingContext::new();
        let mut quilt = offline("standard");
        let mut scene = TestScene::new(1).with_log(ctx.log());
        ctx.bind_framebuffer(FramebufferTarget::Both, Some(99));

        quilt.render_quilt(&mut ctx, &mut scene, None).unwrap();

        assert_eq!(quilt.render_size(), Size::new(512, 256));
        assert_eq!(quilt.tile_count(), 32);
        assert_eq!(scene.renders.len(), 32);
        assert_eq!(ctx.count(|call| matches!(call, Call::Blit { .. })), 32);
        let origins: Vec<_> = ctx
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Blit { dst, .. } => Some(dst.origin),
                _ => None,
            })
            .collect();
        let expected: Vec<_> = (0..32).map(|tile| quilt.tile_position(tile).unwrap()).collect();
        assert_eq!(origins, expected);
        assert_eq!(ctx.bindings(), (Some(99), Some(99)));

        quilt.draw_light_field(&mut ctx).unwrap();
        let calls = ctx.calls();
        assert!(calls.iter().any(|call| matches!(
            call,
            Call::CompileProgram { fragment, .. } if fragment == shaders::QUILT_FRAGMENT_SRC
        )));
        let texture = quilt.framebuffers(&mut ctx).unwrap().quilt.texture();
        assert!(calls.contains(&Call::BindTexture {
            unit: 0,
            texture: Some(texture)
        }));
        assert!(matches!(
            calls.iter().rev().find(|call| matches!(call, Call::DrawQuad { .. })),
            Some(Call::DrawQuad { draw: Some(99), .. })
        ));

        quilt.release_graphics_resources(&mut ctx);
        assert_eq!(ctx.live_objects(), 0);
    }

    #[test]
    fn connected_draw_uses_light_field_unless_previewing() {
        let (provider, _events) = spy(PORTRAIT_JSON);
        let mut ctx = RecordingContext::new();
        let mut quilt = QuiltInterface::new(QuiltConfig::default(), provider);
        quilt.initialize();

        quilt.draw_light_field_with(&mut ctx, 5).unwrap();
        quilt.set_quilt_preview(true);
        quilt.draw_light_field_with(&mut ctx, 5).unwrap();

        let fragments: Vec<_> = ctx
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CompileProgram { fragment, .. } => Some(fragment),
                _ => None,
            })
            .collect();
        assert_eq!(
            fragments,
            [shaders::LIGHTFIELD_FRAGMENT_SRC, shaders::QUILT_FRAGMENT_SRC]
        );
        assert!(ctx
            .calls()
            .contains(&Call::Viewport(crate::types::Rect::from_size(Size::new(1536, 2048)))));
        quilt.release_graphics_resources(&mut ctx);
    }

    #[test]
    fn release_is_idempotent() {
        let mut ctx = RecordingContext::new();
        let mut quilt = offline("portrait");
        quilt.release_graphics_resources(&mut ctx);

        let mut scene = TestScene::new(1);
        quilt.render_quilt(&mut ctx, &mut scene, None).unwrap();
        quilt.draw_light_field(&mut ctx).unwrap();
        assert!(ctx.live_objects() > 0);

        quilt.release_graphics_resources(&mut ctx);
        assert!(matches!(quilt.draw_light_field(&mut ctx), Err(Error::ResourcesReleased)));
        quilt.release_graphics_resources(&mut ctx);
        assert_eq!(ctx.live_objects(), 0);

        // Asking again re-allocates.
        quilt.framebuffers(&mut ctx).unwrap();
        assert!(ctx.live_objects() > 0);
        quilt.release_graphics_resources(&mut ctx);
        assert_eq!(ctx.live_objects(), 0);
    }

    #[test]
    fn adjust_camera_centers_middle_tile() {
        let quilt = offline("large");
        let mut camera = crate::testing::framed_camera();
        let offset = quilt.adjust_camera(&mut camera, 22).unwrap();
        assert!(offset.abs() < 1e-12);
        assert!(camera.window_center[0].abs() < 1e-12);
        assert!(matches!(
            quilt.adjust_camera(&mut camera, 45),
            Err(Error::InvalidTile { tile: 45, count: 45 })
        ));
    }

    #[derive(Clone, Default)]
    struct MemorySink {
        frames: Rc<RefCell<Vec<Vec<u8>>>>,
        finished: Rc<RefCell<bool>>,
    }

    impl FrameSink for MemorySink {
        fn begin(&mut self, size: Size) -> Result<()> {
            assert_eq!(size, Size::new(8, 4));
            Ok(())
        }
        fn write_frame(&mut self, rgb: &[u8]) -> Result<()> {
            self.frames.borrow_mut().push(rgb.to_vec());
            Ok(())
        }
        fn finish(&mut self) -> Result<()> {
            *self.finished.borrow_mut() = true;
            Ok(())
        }
    }

    fn tiny_interface() -> QuiltInterface<RecordingContext> {
        let mut quilt = QuiltInterface::offline(QuiltConfig::default());
        quilt.set_custom_profile(tiny());
        quilt.initialize();
        quilt
    }

    #[test]
    fn recording_captures_one_frame_per_quilt() {
        let mut ctx = RecordingContext::new();
        let mut quilt = tiny_interface();
        let mut scene = TestScene::new(1);
        let sink = MemorySink::default();

        quilt.write_quilt_movie_frame(&mut ctx).unwrap();
        quilt.stop_recording_quilt().unwrap();

        quilt.start_recording_with(Box::new(sink.clone())).unwrap();
        quilt.start_recording_with(Box::new(MemorySink::default())).unwrap();
        assert!(quilt.is_recording());

        quilt.render_quilt(&mut ctx, &mut scene, None).unwrap();
        quilt.render_quilt(&mut ctx, &mut scene, None).unwrap();
        quilt.stop_recording_quilt().unwrap();
        quilt.render_quilt(&mut ctx, &mut scene, None).unwrap();

        assert!(!quilt.is_recording());
        assert!(*sink.finished.borrow());
        let frames = sink.frames.borrow();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].len(), 8 * 4 * 3);
        // Top row first: y = 3 in GL's bottom-up numbering.
        assert_eq!(&frames[0][..3], &[3, 0, 7]);
        quilt.release_graphics_resources(&mut ctx);
    }

    #[test]
    fn dropping_interface_finishes_recording() {
        let mut ctx = RecordingContext::new();
        let sink = MemorySink::default();
        let mut quilt = tiny_interface();
        quilt.start_recording_with(Box::new(sink.clone())).unwrap();
        quilt.release_graphics_resources(&mut ctx);
        drop(quilt);
        assert!(*sink.finished.borrow());
    }

    #[test]
    fn save_quilt_writes_rgb_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = RecordingContext::new();
        let mut quilt = tiny_interface();
        let mut scene = TestScene::new(1);

        let path = quilt.quilt_file_name(dir.path().join("still.png"));
        assert!(path.ends_with("still_qs4x2.png"));
        assert!(matches!(
            quilt.save_quilt(&mut ctx, &path),
            Err(Error::ResourcesReleased)
        ));

        quilt.render_quilt(&mut ctx, &mut scene, None).unwrap();
        quilt.save_quilt(&mut ctx, &path).unwrap();

        let image = image::open(&path).unwrap();
        assert_eq!(image.color(), image::ColorType::Rgb8);
        let image = image.to_rgb8();
        assert_eq!(image.dimensions(), (8, 4));
        assert_eq!(image.get_pixel(5, 0).0, [3, 5, 7]);
        assert_eq!(image.get_pixel(5, 3).0, [0, 5, 7]);
        quilt.release_graphics_resources(&mut ctx);
    }
}
