//! The graphics operations the quilt renderer needs from its host.
//!
//! [`GlowContext`](crate::GlowContext) implements this over OpenGL. Keeping the
//! core behind a trait means the tile loop and framebuffer bookkeeping can be
//! driven by a recording context in tests, without a GPU.

use std::fmt::Debug;

use crate::{
    error::GraphicsError,
    types::{Attachment, Filter, FramebufferTarget, PixelFormat, Rect, Size, Uniform, Wrap},
};

/// A current graphics context with a resizable default framebuffer.
///
/// All calls happen on the thread that owns the context. Methods that change
/// GPU state take `&mut self`.
pub trait GraphicsContext {
    /// Framebuffer object handle.
    type Framebuffer: Copy + Eq + Debug;
    /// Texture handle.
    type Texture: Copy + Eq + Debug;
    /// Renderbuffer handle.
    type Renderbuffer: Copy + Eq + Debug;
    /// Linked shader program handle.
    type Program: Copy + Eq + Debug;
    /// Uniform location within a program.
    type UniformLocation: Clone + Debug;

    /// Largest multisample count the hardware supports.
    fn max_samples(&self) -> i32;

    /// Whether the default framebuffer has a stencil buffer, in which case
    /// offscreen targets should carry one too.
    fn stencil_capable(&self) -> bool;

    /// Create an empty framebuffer object.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::Allocation`] if the driver refuses.
    fn create_framebuffer(&mut self) -> Result<Self::Framebuffer, GraphicsError>;

    /// Delete a framebuffer object.
    fn delete_framebuffer(&mut self, framebuffer: Self::Framebuffer);

    /// Create an empty texture object.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::Allocation`] if the driver refuses.
    fn create_texture(&mut self) -> Result<Self::Texture, GraphicsError>;

    /// (Re)define the storage of a 2D texture and set its sampling state.
    fn texture_storage_2d(
        &mut self,
        texture: Self::Texture,
        size: Size,
        format: PixelFormat,
        filter: Filter,
        wrap: Wrap,
    );

    /// Delete a texture object.
    fn delete_texture(&mut self, texture: Self::Texture);

    /// Create an empty renderbuffer object.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::Allocation`] if the driver refuses.
    fn create_renderbuffer(&mut self) -> Result<Self::Renderbuffer, GraphicsError>;

    /// (Re)define the storage of a renderbuffer. `samples == 0` means single
    /// sampled.
    fn renderbuffer_storage(
        &mut self,
        renderbuffer: Self::Renderbuffer,
        samples: i32,
        format: PixelFormat,
        size: Size,
    );

    /// Delete a renderbuffer object.
    fn delete_renderbuffer(&mut self, renderbuffer: Self::Renderbuffer);

    /// Attach a texture to `framebuffer`.
    fn attach_texture(
        &mut self,
        framebuffer: Self::Framebuffer,
        attachment: Attachment,
        texture: Self::Texture,
    );

    /// Attach a renderbuffer to `framebuffer`.
    fn attach_renderbuffer(
        &mut self,
        framebuffer: Self::Framebuffer,
        attachment: Attachment,
        renderbuffer: Self::Renderbuffer,
    );

    /// Check that `framebuffer` is complete.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::IncompleteFramebuffer`] with the driver status.
    fn check_framebuffer(&mut self, framebuffer: Self::Framebuffer) -> Result<(), GraphicsError>;

    /// Bind `framebuffer` (or the default framebuffer for `None`).
    fn bind_framebuffer(&mut self, target: FramebufferTarget, framebuffer: Option<Self::Framebuffer>);

    /// Remember the current read and draw framebuffer bindings.
    fn push_framebuffer_bindings(&mut self);

    /// Restore the bindings saved by the matching
    /// [`push_framebuffer_bindings`](Self::push_framebuffer_bindings).
    fn pop_framebuffer_bindings(&mut self);

    /// Set the viewport.
    fn viewport(&mut self, rect: Rect);

    /// Set the scissor box.
    fn scissor(&mut self, rect: Rect);

    /// Enable or disable depth testing.
    fn set_depth_test(&mut self, enabled: bool);

    /// Enable or disable depth writes.
    fn set_depth_mask(&mut self, enabled: bool);

    /// Copy the color buffer of the bound read framebuffer into the bound draw
    /// framebuffer.
    fn blit_color(&mut self, src: Rect, dst: Rect, filter: Filter);

    /// Compile and link a program from vertex and fragment source.
    ///
    /// # Errors
    ///
    /// Returns the compile or link log on failure.
    fn compile_program(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<Self::Program, GraphicsError>;

    /// Delete a program.
    fn delete_program(&mut self, program: Self::Program);

    /// Look up a uniform by name.
    fn uniform_location(&mut self, program: Self::Program, name: &str)
    -> Option<Self::UniformLocation>;

    /// Make `program` current.
    fn use_program(&mut self, program: Option<Self::Program>);

    /// Upload a uniform to the current program.
    fn set_uniform(&mut self, location: &Self::UniformLocation, value: Uniform);

    /// Bind `texture` to texture unit `unit`.
    fn bind_texture(&mut self, unit: u32, texture: Option<Self::Texture>);

    /// Draw a quad covering the viewport with the current program. The quad
    /// feeds `a_position` (vec2, NDC) and `a_tex_coord` (vec2).
    fn draw_fullscreen_quad(&mut self);

    /// Read back RGBA8 pixels of `rect` from the color attachment of
    /// `framebuffer`, bottom row first.
    fn read_pixels(&mut self, framebuffer: Self::Framebuffer, rect: Rect) -> Vec<u8>;
}
