//! The tile loop: render every view and blit it into the quilt.

use crate::{
    camera::{self, Camera, Scene},
    context::GraphicsContext,
    framebuffer::FramebufferSet,
    geometry::QuiltGeometry,
    types::{Filter, FramebufferTarget, Rect, Size},
};

/// Near/far clipping limits as multiples of the focal distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClippingLimits {
    /// Near plane never closer than `distance * near`.
    pub near: f64,
    /// Far plane never further than `distance * far`.
    pub far: f64,
}

impl Default for ClippingLimits {
    fn default() -> Self {
        Self { near: 0.8, far: 1.2 }
    }
}

/// Per-quilt camera parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSettings {
    /// Total view cone in degrees.
    pub view_angle: f64,
    /// Display aspect ratio used to size the sheared frustum window.
    pub aspect_ratio: f64,
    /// Clip range narrowing, if enabled.
    pub clipping_limits: Option<ClippingLimits>,
}

impl ViewSettings {
    /// Configure `camera` for `tile`, starting from the untouched `original`.
    pub fn apply(&self, camera: &mut Camera, original: &Camera, tile: usize, geometry: &QuiltGeometry) {
        camera.clone_from(original);
        camera::adjust_camera(
            camera,
            tile,
            geometry.tiles(),
            self.view_angle,
            self.aspect_ratio,
        );
        if let Some(limits) = self.clipping_limits {
            camera.clipping_range = camera::clamp_clipping_range(
                camera.clipping_range,
                camera.distance(),
                limits.near,
                limits.far,
            );
        }
    }
}

/// Per-tile render callback. It must draw into whatever framebuffer is bound;
/// the second argument is the tile size.
pub type RenderFn<'a, S> = &'a mut dyn FnMut(&mut S, Size);

/// Swaps working cameras into a scene and puts the originals back on drop,
/// including when a render callback panics.
struct CameraSwap<'a, S: Scene + ?Sized> {
    scene: &'a mut S,
    originals: Vec<Camera>,
}

impl<'a, S: Scene + ?Sized> CameraSwap<'a, S> {
    fn install(scene: &'a mut S) -> Self {
        let count = scene.renderer_count();
        let mut originals = Vec::with_capacity(count);
        for renderer in 0..count {
            // Pin the eye so stereo-aware hosts do not alternate between tiles.
            scene.camera_mut(renderer).left_eye = true;
            let working = scene.camera_mut(renderer).clone();
            originals.push(scene.replace_camera(renderer, working));
        }
        Self { scene, originals }
    }
}

impl<S: Scene + ?Sized> Drop for CameraSwap<'_, S> {
    fn drop(&mut self) {
        for (renderer, original) in self.originals.drain(..).enumerate() {
            self.scene.replace_camera(renderer, original);
        }
    }
}

/// Saves the context's framebuffer bindings and restores them on drop, so a
/// panicking render callback leaves the stack balanced.
struct BindingScope<'a, C: GraphicsContext> {
    ctx: &'a mut C,
}

impl<'a, C: GraphicsContext> BindingScope<'a, C> {
    fn push(ctx: &'a mut C) -> Self {
        ctx.push_framebuffer_bindings();
        Self { ctx }
    }
}

impl<C: GraphicsContext> std::ops::Deref for BindingScope<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.ctx
    }
}

impl<C: GraphicsContext> std::ops::DerefMut for BindingScope<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.ctx
    }
}

impl<C: GraphicsContext> Drop for BindingScope<'_, C> {
    fn drop(&mut self) {
        self.ctx.pop_framebuffer_bindings();
    }
}

/// Render all tiles of the quilt.
///
/// For each tile, in raster order: reconfigure every renderer's camera, render
/// into the tile framebuffer, then blit the result into the tile's cell of the
/// quilt framebuffer. The caller's framebuffer bindings and the scene's
/// cameras are restored before returning.
pub fn render_quilt<C, S>(
    ctx: &mut C,
    framebuffers: &FramebufferSet<C>,
    geometry: &QuiltGeometry,
    view: &ViewSettings,
    scene: &mut S,
    mut render: Option<RenderFn<'_, S>>,
) where
    C: GraphicsContext,
    S: Scene + ?Sized,
{
    // Lazily created cameras have no framing yet; give them one up front so
    // the first quilt is not rendered from an arbitrary default.
    for renderer in 0..scene.renderer_count() {
        if !scene.has_active_camera(renderer) {
            scene.reset_camera(renderer);
        }
    }

    let swap = CameraSwap::install(scene);
    let render_size = geometry.render_size();
    let tile_rect = Rect::from_size(render_size);
    let render_fb = framebuffers.render.framebuffer();
    let quilt_fb = framebuffers.quilt.framebuffer();

    let mut ctx = BindingScope::push(ctx);
    ctx.bind_framebuffer(FramebufferTarget::Read, Some(render_fb));

    for (tile, dst) in (0..geometry.tile_count())
        .filter_map(|tile| geometry.tile_rect(tile).ok().map(|dst| (tile, dst)))
    {
        ctx.bind_framebuffer(FramebufferTarget::Draw, Some(render_fb));
        ctx.viewport(tile_rect);
        ctx.scissor(tile_rect);

        for (renderer, original) in swap.originals.iter().enumerate() {
            view.apply(swap.scene.camera_mut(renderer), original, tile, geometry);
        }

        match render.as_deref_mut() {
            Some(render) => render(&mut *swap.scene, render_size),
            None => swap.scene.render(render_size),
        }

        ctx.bind_framebuffer(FramebufferTarget::Draw, Some(quilt_fb));
        ctx.viewport(dst);
        ctx.scissor(dst);
        ctx.blit_color(tile_rect, dst, Filter::Linear);
    }

    drop(ctx);
    drop(swap);
}
