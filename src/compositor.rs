//! The final full-screen pass: quilt in, display image out.

use log::{debug, warn};

use crate::{
    calibration::DeviceCalibration,
    context::GraphicsContext,
    error::GraphicsError,
    geometry::QuiltGeometry,
    shaders,
    types::{Rect, Size, Uniform},
};

/// What the final pass should produce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompositeMode<'a> {
    /// Show the quilt unchanged. Used without a display and for previews.
    Quilt,
    /// Interleave the views for the calibrated display.
    LightField(&'a DeviceCalibration),
}

#[derive(Debug)]
struct QuiltPass<C: GraphicsContext> {
    program: C::Program,
    quilt: Option<C::UniformLocation>,
}

/// Cached uniform locations for the light-field program. Drivers may strip
/// uniforms the compiler proves unused, so each one is optional.
#[derive(Debug)]
struct LightFieldUniforms<C: GraphicsContext> {
    quilt: Option<C::UniformLocation>,
    pitch: Option<C::UniformLocation>,
    tilt: Option<C::UniformLocation>,
    center: Option<C::UniformLocation>,
    subp: Option<C::UniformLocation>,
    inv_view: Option<C::UniformLocation>,
    quilt_invert: Option<C::UniformLocation>,
    ri: Option<C::UniformLocation>,
    bi: Option<C::UniformLocation>,
    display_aspect: Option<C::UniformLocation>,
    quilt_aspect: Option<C::UniformLocation>,
    overscan: Option<C::UniformLocation>,
    tile: Option<C::UniformLocation>,
    view_portion: Option<C::UniformLocation>,
}

#[derive(Debug)]
struct LightFieldPass<C: GraphicsContext> {
    program: C::Program,
    uniforms: LightFieldUniforms<C>,
}

/// Draws the quilt texture to the bound framebuffer, either as-is or through
/// the lenticular interleaving shader.
///
/// Each program is compiled on first use and reused afterwards; a draw only
/// uploads uniforms and binds the texture. Call
/// [`release`](Self::release) before the context goes away.
#[derive(Debug)]
pub struct LightFieldCompositor<C: GraphicsContext> {
    quilt_pass: Option<QuiltPass<C>>,
    light_field_pass: Option<LightFieldPass<C>>,
}

impl<C: GraphicsContext> Default for LightFieldCompositor<C> {
    fn default() -> Self {
        Self {
            quilt_pass: None,
            light_field_pass: None,
        }
    }
}

fn set_uniform<C: GraphicsContext>(ctx: &mut C, location: Option<&C::UniformLocation>, value: Uniform) {
    if let Some(location) = location {
        ctx.set_uniform(location, value);
    }
}

impl<C: GraphicsContext> LightFieldCompositor<C> {
    /// Create a compositor with nothing compiled yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any program is currently held.
    #[must_use]
    pub fn has_programs(&self) -> bool {
        self.quilt_pass.is_some() || self.light_field_pass.is_some()
    }

    /// Draw `texture` over a `display_size` viewport of the bound draw
    /// framebuffer.
    ///
    /// Depth testing is disabled and depth writes are masked for the pass;
    /// depth writes are re-enabled afterwards.
    ///
    /// # Errors
    ///
    /// Returns the compile or link log if the program for `mode` has not been
    /// built yet and fails to build.
    pub fn draw(
        &mut self,
        ctx: &mut C,
        texture: C::Texture,
        mode: CompositeMode<'_>,
        display_size: Size,
        geometry: &QuiltGeometry,
    ) -> Result<(), GraphicsError> {
        let sampler = match mode {
            CompositeMode::Quilt => {
                let pass = self.quilt_pass(ctx)?;
                ctx.use_program(Some(pass.program));
                pass.quilt.clone()
            }
            CompositeMode::LightField(calibration) => {
                let pass = self.light_field_pass(ctx)?;
                ctx.use_program(Some(pass.program));
                upload_calibration(ctx, &pass.uniforms, calibration, geometry);
                pass.uniforms.quilt.clone()
            }
        };

        ctx.set_depth_mask(false);
        ctx.set_depth_test(false);

        let screen = Rect::from_size(display_size);
        ctx.viewport(screen);
        ctx.scissor(screen);

        ctx.bind_texture(0, Some(texture));
        set_uniform(ctx, sampler.as_ref(), Uniform::Int(0));

        ctx.draw_fullscreen_quad();

        ctx.bind_texture(0, None);
        ctx.use_program(None);
        ctx.set_depth_mask(true);
        Ok(())
    }

    fn quilt_pass(&mut self, ctx: &mut C) -> Result<&QuiltPass<C>, GraphicsError> {
        let pass = match self.quilt_pass.take() {
            Some(pass) => pass,
            None => {
                debug!("compiling quilt pass-through shader");
                let program =
                    ctx.compile_program(shaders::QUAD_VERTEX_SRC, shaders::QUILT_FRAGMENT_SRC)?;
                let quilt = ctx.uniform_location(program, "u_quilt");
                QuiltPass { program, quilt }
            }
        };
        Ok(self.quilt_pass.insert(pass))
    }

    fn light_field_pass(&mut self, ctx: &mut C) -> Result<&LightFieldPass<C>, GraphicsError> {
        let pass = match self.light_field_pass.take() {
            Some(pass) => pass,
            None => {
                debug!("compiling light-field shader");
                let program =
                    ctx.compile_program(shaders::QUAD_VERTEX_SRC, shaders::LIGHTFIELD_FRAGMENT_SRC)?;
                let mut location = |name: &str| ctx.uniform_location(program, name);
                let uniforms = LightFieldUniforms {
                    quilt: location("u_quilt"),
                    pitch: location("pitch"),
                    tilt: location("tilt"),
                    center: location("center"),
                    subp: location("subp"),
                    inv_view: location("invView"),
                    quilt_invert: location("quiltInvert"),
                    ri: location("ri"),
                    bi: location("bi"),
                    display_aspect: location("displayAspect"),
                    quilt_aspect: location("quiltAspect"),
                    overscan: location("overscan"),
                    tile: location("tile"),
                    view_portion: location("viewPortion"),
                };
                LightFieldPass { program, uniforms }
            }
        };
        Ok(self.light_field_pass.insert(pass))
    }

    /// Delete both programs. Safe to call repeatedly; the next draw
    /// recompiles.
    pub fn release(&mut self, ctx: &mut C) {
        if let Some(pass) = self.quilt_pass.take() {
            ctx.delete_program(pass.program);
        }
        if let Some(pass) = self.light_field_pass.take() {
            ctx.delete_program(pass.program);
        }
    }
}

#[expect(clippy::cast_precision_loss)]
fn upload_calibration<C: GraphicsContext>(
    ctx: &mut C,
    uniforms: &LightFieldUniforms<C>,
    calibration: &DeviceCalibration,
    geometry: &QuiltGeometry,
) {
    let tiles = geometry.tiles();
    set_uniform(ctx, uniforms.pitch.as_ref(), Uniform::Float(calibration.pitch));
    set_uniform(ctx, uniforms.tilt.as_ref(), Uniform::Float(calibration.tilt));
    set_uniform(ctx, uniforms.center.as_ref(), Uniform::Float(calibration.center));
    set_uniform(ctx, uniforms.subp.as_ref(), Uniform::Float(calibration.subp));
    set_uniform(
        ctx,
        uniforms.inv_view.as_ref(),
        Uniform::Int(i32::from(calibration.inv_view)),
    );
    set_uniform(ctx, uniforms.quilt_invert.as_ref(), Uniform::Int(0));
    set_uniform(ctx, uniforms.ri.as_ref(), Uniform::Int(calibration.ri));
    set_uniform(ctx, uniforms.bi.as_ref(), Uniform::Int(calibration.bi));
    // Views are rendered at the display's own aspect.
    set_uniform(
        ctx,
        uniforms.display_aspect.as_ref(),
        Uniform::Float(calibration.display_aspect),
    );
    set_uniform(
        ctx,
        uniforms.quilt_aspect.as_ref(),
        Uniform::Float(calibration.display_aspect),
    );
    set_uniform(ctx, uniforms.overscan.as_ref(), Uniform::Int(0));
    set_uniform(
        ctx,
        uniforms.tile.as_ref(),
        Uniform::Vec3([
            tiles.cols() as f32,
            tiles.rows() as f32,
            geometry.tile_count() as f32,
        ]),
    );
    set_uniform(
        ctx,
        uniforms.view_portion.as_ref(),
        Uniform::Vec2(geometry.view_portion()),
    );
}

impl<C: GraphicsContext> Drop for LightFieldCompositor<C> {
    fn drop(&mut self) {
        if self.has_programs() {
            warn!("light-field shader programs were not released before drop");
        }
    }
}
