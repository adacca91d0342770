//! [`GraphicsContext`] over OpenGL 3.1 via `glow`.

use std::{num::NonZeroU32, sync::Arc};

use glow::{HasContext, PixelPackData, PixelUnpackData};

use crate::{
    context::GraphicsContext,
    error::GraphicsError,
    shaders::{self, POSITION_ATTRIBUTE, TEX_COORD_ATTRIBUTE},
    types::{
        gl_size, Attachment, Filter, FramebufferTarget, PixelFormat, QuadVertex, Rect, Size,
        Uniform, Wrap, FULLSCREEN_QUAD,
    },
};

/// `(internal format, format, type)` for a pixel format.
fn gl_format(format: PixelFormat) -> (u32, u32, u32) {
    match format {
        PixelFormat::Rgba8 => (glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE),
        PixelFormat::Depth32F => (glow::DEPTH_COMPONENT32F, glow::DEPTH_COMPONENT, glow::FLOAT),
        PixelFormat::Depth24Stencil8 => (
            glow::DEPTH24_STENCIL8,
            glow::DEPTH_STENCIL,
            glow::UNSIGNED_INT_24_8,
        ),
    }
}

fn gl_attachment(attachment: Attachment) -> u32 {
    match attachment {
        Attachment::Color0 => glow::COLOR_ATTACHMENT0,
        Attachment::Depth => glow::DEPTH_ATTACHMENT,
        Attachment::DepthStencil => glow::DEPTH_STENCIL_ATTACHMENT,
    }
}

fn gl_target(target: FramebufferTarget) -> u32 {
    match target {
        FramebufferTarget::Both => glow::FRAMEBUFFER,
        FramebufferTarget::Read => glow::READ_FRAMEBUFFER,
        FramebufferTarget::Draw => glow::DRAW_FRAMEBUFFER,
    }
}

fn gl_filter(filter: Filter) -> u32 {
    match filter {
        Filter::Nearest => glow::NEAREST,
        Filter::Linear => glow::LINEAR,
    }
}

fn gl_wrap(wrap: Wrap) -> u32 {
    match wrap {
        Wrap::ClampToEdge => glow::CLAMP_TO_EDGE,
        Wrap::Repeat => glow::REPEAT,
    }
}

/// An OpenGL context the quilt pipeline can render with.
///
/// Besides forwarding to `glow`, this owns a static full-screen quad and the
/// framebuffer binding stack.
///
/// # Example
///
/// ```no_run
/// # use lightfield_renderer_glow::{GlowContext, QuiltConfig, QuiltInterface, Scene};
/// # use std::sync::Arc;
/// # fn example(gl: Arc<glow::Context>, scene: &mut impl Scene) -> lightfield_renderer_glow::Result<()> {
/// // With the window's context current:
/// let mut ctx = unsafe { GlowContext::new(gl, true) }?;
/// let mut quilt = QuiltInterface::offline(QuiltConfig::default());
/// quilt.initialize();
///
/// // Each frame:
/// quilt.render_quilt(&mut ctx, scene, None)?;
/// quilt.draw_light_field(&mut ctx)?;
///
/// // Before the context goes away:
/// quilt.release_graphics_resources(&mut ctx);
/// ctx.destroy();
/// # Ok(())
/// # }
/// ```
pub struct GlowContext {
    /// The OpenGL context, shared via [`Arc`] with the host.
    gl: Arc<glow::Context>,
    /// Vertex array holding [`FULLSCREEN_QUAD`].
    quad_vao: glow::VertexArray,
    /// Vertex buffer backing [`quad_vao`](Self::quad_vao).
    quad_vbo: glow::Buffer,
    /// Whether the default framebuffer carries a stencil buffer.
    stencil_capable: bool,
    /// Saved `(read, draw)` framebuffer bindings.
    bindings: Vec<(Option<glow::Framebuffer>, Option<glow::Framebuffer>)>,
}

impl std::fmt::Debug for GlowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlowContext")
            .field("stencil_capable", &self.stencil_capable)
            .field("binding_depth", &self.bindings.len())
            .finish_non_exhaustive()
    }
}

impl GlowContext {
    /// Wrap `gl` and upload the full-screen quad.
    ///
    /// Pass `stencil_capable = true` when the window's default framebuffer
    /// has a stencil buffer, so tile framebuffers get one too.
    ///
    /// # Safety
    ///
    /// The `gl` context must be current and valid, and must stay current on
    /// this thread whenever the returned value is used. The caller must call
    /// [`destroy`](Self::destroy) before the context is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::Allocation`] if the vertex array or buffer
    /// cannot be created.
    pub unsafe fn new(gl: Arc<glow::Context>, stencil_capable: bool) -> Result<Self, GraphicsError> {
        let (quad_vao, quad_vbo) = unsafe {
            let vao = gl.create_vertex_array().map_err(GraphicsError::Allocation)?;
            let vbo = match gl.create_buffer() {
                Ok(vbo) => vbo,
                Err(err) => {
                    gl.delete_vertex_array(vao);
                    return Err(GraphicsError::Allocation(err));
                }
            };

            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&FULLSCREEN_QUAD),
                glow::STATIC_DRAW,
            );

            // QuadVertex is 16 bytes, well within i32 range.
            #[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let stride = std::mem::size_of::<QuadVertex>() as i32;
            gl.enable_vertex_attrib_array(POSITION_ATTRIBUTE);
            gl.vertex_attrib_pointer_f32(POSITION_ATTRIBUTE, 2, glow::FLOAT, false, stride, 0);
            gl.enable_vertex_attrib_array(TEX_COORD_ATTRIBUTE);
            gl.vertex_attrib_pointer_f32(TEX_COORD_ATTRIBUTE, 2, glow::FLOAT, false, stride, 8);

            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            (vao, vbo)
        };

        Ok(Self {
            gl,
            quad_vao,
            quad_vbo,
            stencil_capable,
            bindings: Vec::new(),
        })
    }

    /// The wrapped context.
    #[must_use]
    pub fn gl(&self) -> &Arc<glow::Context> {
        &self.gl
    }

    /// Delete the objects this context created. Quilt resources are released
    /// separately through the interface.
    pub fn destroy(self) {
        unsafe {
            self.gl.delete_vertex_array(self.quad_vao);
            self.gl.delete_buffer(self.quad_vbo);
        }
    }

    fn current_binding(&self, parameter: u32) -> Option<glow::Framebuffer> {
        let raw = unsafe { self.gl.get_parameter_i32(parameter) };
        u32::try_from(raw)
            .ok()
            .and_then(NonZeroU32::new)
            .map(glow::NativeFramebuffer)
    }
}

impl GraphicsContext for GlowContext {
    type Framebuffer = glow::Framebuffer;
    type Texture = glow::Texture;
    type Renderbuffer = glow::Renderbuffer;
    type Program = glow::Program;
    type UniformLocation = glow::UniformLocation;

    fn max_samples(&self) -> i32 {
        unsafe { self.gl.get_parameter_i32(glow::MAX_SAMPLES) }
    }

    fn stencil_capable(&self) -> bool {
        self.stencil_capable
    }

    fn create_framebuffer(&mut self) -> Result<glow::Framebuffer, GraphicsError> {
        unsafe { self.gl.create_framebuffer() }.map_err(GraphicsError::Allocation)
    }

    fn delete_framebuffer(&mut self, framebuffer: glow::Framebuffer) {
        unsafe { self.gl.delete_framebuffer(framebuffer) };
    }

    fn create_texture(&mut self) -> Result<glow::Texture, GraphicsError> {
        unsafe { self.gl.create_texture() }.map_err(GraphicsError::Allocation)
    }

    fn texture_storage_2d(
        &mut self,
        texture: glow::Texture,
        size: Size,
        format: PixelFormat,
        filter: Filter,
        wrap: Wrap,
    ) {
        let gl = &self.gl;
        let (internal, external, ty) = gl_format(format);
        let filter = gl_filter(filter);
        let wrap = gl_wrap(wrap);

        // GL constant values are small enough that the casts are always safe.
        #[expect(clippy::cast_possible_wrap)]
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal as i32,
                gl_size(size.width),
                gl_size(size.height),
                0,
                external,
                ty,
                PixelUnpackData::Slice(None),
            );
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, wrap as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, wrap as i32);
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    fn delete_texture(&mut self, texture: glow::Texture) {
        unsafe { self.gl.delete_texture(texture) };
    }

    fn create_renderbuffer(&mut self) -> Result<glow::Renderbuffer, GraphicsError> {
        unsafe { self.gl.create_renderbuffer() }.map_err(GraphicsError::Allocation)
    }

    fn renderbuffer_storage(
        &mut self,
        renderbuffer: glow::Renderbuffer,
        samples: i32,
        format: PixelFormat,
        size: Size,
    ) {
        let gl = &self.gl;
        let (internal, _, _) = gl_format(format);
        let (w, h) = (gl_size(size.width), gl_size(size.height));
        unsafe {
            gl.bind_renderbuffer(glow::RENDERBUFFER, Some(renderbuffer));
            if samples > 0 {
                gl.renderbuffer_storage_multisample(glow::RENDERBUFFER, samples, internal, w, h);
            } else {
                gl.renderbuffer_storage(glow::RENDERBUFFER, internal, w, h);
            }
            gl.bind_renderbuffer(glow::RENDERBUFFER, None);
        }
    }

    fn delete_renderbuffer(&mut self, renderbuffer: glow::Renderbuffer) {
        unsafe { self.gl.delete_renderbuffer(renderbuffer) };
    }

    fn attach_texture(
        &mut self,
        framebuffer: glow::Framebuffer,
        attachment: Attachment,
        texture: glow::Texture,
    ) {
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            self.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                gl_attachment(attachment),
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );
        }
    }

    fn attach_renderbuffer(
        &mut self,
        framebuffer: glow::Framebuffer,
        attachment: Attachment,
        renderbuffer: glow::Renderbuffer,
    ) {
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            self.gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                gl_attachment(attachment),
                glow::RENDERBUFFER,
                Some(renderbuffer),
            );
        }
    }

    fn check_framebuffer(&mut self, framebuffer: glow::Framebuffer) -> Result<(), GraphicsError> {
        let status = unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            self.gl.check_framebuffer_status(glow::FRAMEBUFFER)
        };
        if status == glow::FRAMEBUFFER_COMPLETE {
            Ok(())
        } else {
            Err(GraphicsError::IncompleteFramebuffer { status })
        }
    }

    fn bind_framebuffer(&mut self, target: FramebufferTarget, framebuffer: Option<glow::Framebuffer>) {
        unsafe { self.gl.bind_framebuffer(gl_target(target), framebuffer) };
    }

    fn push_framebuffer_bindings(&mut self) {
        let read = self.current_binding(glow::READ_FRAMEBUFFER_BINDING);
        let draw = self.current_binding(glow::DRAW_FRAMEBUFFER_BINDING);
        self.bindings.push((read, draw));
    }

    fn pop_framebuffer_bindings(&mut self) {
        let Some((read, draw)) = self.bindings.pop() else {
            log::error!("framebuffer binding stack underflow");
            return;
        };
        unsafe {
            self.gl.bind_framebuffer(glow::READ_FRAMEBUFFER, read);
            self.gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, draw);
        }
    }

    fn viewport(&mut self, rect: Rect) {
        unsafe {
            self.gl.viewport(
                rect.origin.x,
                rect.origin.y,
                gl_size(rect.size.width),
                gl_size(rect.size.height),
            );
        }
    }

    fn scissor(&mut self, rect: Rect) {
        unsafe {
            self.gl.scissor(
                rect.origin.x,
                rect.origin.y,
                gl_size(rect.size.width),
                gl_size(rect.size.height),
            );
        }
    }

    fn set_depth_test(&mut self, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(glow::DEPTH_TEST);
            } else {
                self.gl.disable(glow::DEPTH_TEST);
            }
        }
    }

    fn set_depth_mask(&mut self, enabled: bool) {
        unsafe { self.gl.depth_mask(enabled) };
    }

    fn blit_color(&mut self, src: Rect, dst: Rect, filter: Filter) {
        unsafe {
            self.gl.blit_framebuffer(
                src.origin.x,
                src.origin.y,
                src.right(),
                src.top(),
                dst.origin.x,
                dst.origin.y,
                dst.right(),
                dst.top(),
                glow::COLOR_BUFFER_BIT,
                gl_filter(filter),
            );
        }
    }

    fn compile_program(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<glow::Program, GraphicsError> {
        unsafe { shaders::compile_program(&self.gl, vertex_src, fragment_src) }
    }

    fn delete_program(&mut self, program: glow::Program) {
        unsafe { self.gl.delete_program(program) };
    }

    fn uniform_location(&mut self, program: glow::Program, name: &str) -> Option<glow::UniformLocation> {
        unsafe { self.gl.get_uniform_location(program, name) }
    }

    fn use_program(&mut self, program: Option<glow::Program>) {
        unsafe { self.gl.use_program(program) };
    }

    fn set_uniform(&mut self, location: &glow::UniformLocation, value: Uniform) {
        let location = Some(location);
        unsafe {
            match value {
                Uniform::Int(v) => self.gl.uniform_1_i32(location, v),
                Uniform::Float(v) => self.gl.uniform_1_f32(location, v),
                Uniform::Vec2([x, y]) => self.gl.uniform_2_f32(location, x, y),
                Uniform::Vec3([x, y, z]) => self.gl.uniform_3_f32(location, x, y, z),
            }
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<glow::Texture>) {
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(glow::TEXTURE_2D, texture);
        }
    }

    fn draw_fullscreen_quad(&mut self) {
        unsafe {
            self.gl.bind_vertex_array(Some(self.quad_vao));
            self.gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4);
            self.gl.bind_vertex_array(None);
        }
    }

    fn read_pixels(&mut self, framebuffer: glow::Framebuffer, rect: Rect) -> Vec<u8> {
        let mut pixels = vec![0; rect.size.area() * 4];
        self.push_framebuffer_bindings();
        unsafe {
            self.gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(framebuffer));
            self.gl.read_buffer(glow::COLOR_ATTACHMENT0);
            self.gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
            self.gl.read_pixels(
                rect.origin.x,
                rect.origin.y,
                gl_size(rect.size.width),
                gl_size(rect.size.height),
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelPackData::Slice(Some(&mut pixels)),
            );
        }
        self.pop_framebuffer_bindings();
        pixels
    }
}
