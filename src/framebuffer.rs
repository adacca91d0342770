//! Offscreen render targets for tile rendering and quilt assembly.
//!
//! Two targets are kept: a tile-sized framebuffer with color and depth
//! (multisampled when requested) that each view renders into, and a quilt-sized
//! framebuffer whose color texture collects all tiles and is later sampled by
//! the light-field shader.
//!
//! GPU handles are never freed by `Drop`, since the context may already be gone
//! by then. [`FramebufferManager::release`] must run while the context is still
//! current.

use log::{debug, error};

use crate::{
    context::GraphicsContext,
    error::{Error, GraphicsError, Result},
    geometry::QuiltGeometry,
    types::{Attachment, Filter, PixelFormat, Size, Wrap},
};

/// Normalize a requested multisample count against the hardware limit.
///
/// Counts above `max_samples` are clamped, and a count of one is turned into
/// zero because single-sample multisampling is just an expensive way to say
/// "none".
#[must_use]
pub fn effective_samples(requested: i32, max_samples: i32) -> i32 {
    let samples = requested.clamp(0, max_samples.max(0));
    if samples == 1 {
        0
    } else {
        samples
    }
}

/// Color storage of the tile framebuffer.
#[derive(Debug)]
enum ColorStorage<C: GraphicsContext> {
    /// Single sampled: a texture.
    Texture(C::Texture),
    /// Multisampled: a renderbuffer, resolved by the blit into the quilt.
    Multisampled(C::Renderbuffer),
}

impl<C: GraphicsContext> ColorStorage<C> {
    fn delete(self, ctx: &mut C) {
        match self {
            Self::Texture(texture) => ctx.delete_texture(texture),
            Self::Multisampled(renderbuffer) => ctx.delete_renderbuffer(renderbuffer),
        }
    }
}

/// The framebuffer each tile is rendered into.
#[derive(Debug)]
pub struct RenderTarget<C: GraphicsContext> {
    framebuffer: C::Framebuffer,
    color: ColorStorage<C>,
    depth: C::Renderbuffer,
    depth_format: PixelFormat,
    samples: i32,
    size: Size,
}

impl<C: GraphicsContext> RenderTarget<C> {
    /// Framebuffer handle.
    #[must_use]
    pub fn framebuffer(&self) -> C::Framebuffer {
        self.framebuffer
    }

    /// Multisample count, `0` when single sampled.
    #[must_use]
    pub fn samples(&self) -> i32 {
        self.samples
    }

    /// Current size.
    #[must_use]
    pub fn size(&self) -> Size {
        self.size
    }

    /// Create and size a target. Nothing created along the way outlives a
    /// failure.
    fn allocate(ctx: &mut C, size: Size, samples: i32) -> Result<Self, GraphicsError> {
        let framebuffer = ctx.create_framebuffer()?;
        let color = if samples > 0 {
            ctx.create_renderbuffer().map(ColorStorage::Multisampled)
        } else {
            ctx.create_texture().map(ColorStorage::Texture)
        };
        let color = match color {
            Ok(color) => color,
            Err(err) => {
                ctx.delete_framebuffer(framebuffer);
                return Err(err);
            }
        };
        let depth = match ctx.create_renderbuffer() {
            Ok(depth) => depth,
            Err(err) => {
                color.delete(ctx);
                ctx.delete_framebuffer(framebuffer);
                return Err(err);
            }
        };
        let depth_format = if ctx.stencil_capable() {
            PixelFormat::Depth24Stencil8
        } else {
            PixelFormat::Depth32F
        };

        let mut target = Self {
            framebuffer,
            color,
            depth,
            depth_format,
            samples,
            size: Size::default(),
        };
        if let Err(err) = target.define_storage(ctx, size) {
            target.delete(ctx);
            return Err(err);
        }
        Ok(target)
    }

    fn define_storage(&mut self, ctx: &mut C, size: Size) -> Result<(), GraphicsError> {
        match self.color {
            ColorStorage::Texture(texture) => {
                ctx.texture_storage_2d(
                    texture,
                    size,
                    PixelFormat::Rgba8,
                    Filter::Linear,
                    Wrap::ClampToEdge,
                );
                ctx.attach_texture(self.framebuffer, Attachment::Color0, texture);
            }
            ColorStorage::Multisampled(renderbuffer) => {
                ctx.renderbuffer_storage(renderbuffer, self.samples, PixelFormat::Rgba8, size);
                ctx.attach_renderbuffer(self.framebuffer, Attachment::Color0, renderbuffer);
            }
        }

        ctx.renderbuffer_storage(self.depth, self.samples, self.depth_format, size);
        let attachment = if self.depth_format == PixelFormat::Depth24Stencil8 {
            Attachment::DepthStencil
        } else {
            Attachment::Depth
        };
        ctx.attach_renderbuffer(self.framebuffer, attachment, self.depth);

        ctx.check_framebuffer(self.framebuffer)?;
        self.size = size;
        Ok(())
    }

    fn resize(&mut self, ctx: &mut C, size: Size) -> Result<(), GraphicsError> {
        if self.size == size {
            return Ok(());
        }
        debug!("resizing tile framebuffer to {}x{}", size.width, size.height);
        self.define_storage(ctx, size)
    }

    fn delete(self, ctx: &mut C) {
        self.color.delete(ctx);
        ctx.delete_renderbuffer(self.depth);
        ctx.delete_framebuffer(self.framebuffer);
    }
}

/// The framebuffer all tiles are blitted into.
#[derive(Debug)]
pub struct QuiltTarget<C: GraphicsContext> {
    framebuffer: C::Framebuffer,
    texture: C::Texture,
    size: Size,
}

impl<C: GraphicsContext> QuiltTarget<C> {
    /// Framebuffer handle.
    #[must_use]
    pub fn framebuffer(&self) -> C::Framebuffer {
        self.framebuffer
    }

    /// The quilt color texture, for sampling by the compositor or the host.
    #[must_use]
    pub fn texture(&self) -> C::Texture {
        self.texture
    }

    /// Current size.
    #[must_use]
    pub fn size(&self) -> Size {
        self.size
    }

    fn allocate(ctx: &mut C, size: Size) -> Result<Self, GraphicsError> {
        let framebuffer = ctx.create_framebuffer()?;
        let texture = match ctx.create_texture() {
            Ok(texture) => texture,
            Err(err) => {
                ctx.delete_framebuffer(framebuffer);
                return Err(err);
            }
        };
        let mut target = Self {
            framebuffer,
            texture,
            size: Size::default(),
        };
        if let Err(err) = target.define_storage(ctx, size) {
            target.delete(ctx);
            return Err(err);
        }
        Ok(target)
    }

    fn define_storage(&mut self, ctx: &mut C, size: Size) -> Result<(), GraphicsError> {
        ctx.texture_storage_2d(
            self.texture,
            size,
            PixelFormat::Rgba8,
            Filter::Linear,
            Wrap::Repeat,
        );
        ctx.attach_texture(self.framebuffer, Attachment::Color0, self.texture);
        ctx.check_framebuffer(self.framebuffer)?;
        self.size = size;
        Ok(())
    }

    fn resize(&mut self, ctx: &mut C, size: Size) -> Result<(), GraphicsError> {
        if self.size == size {
            return Ok(());
        }
        debug!("resizing quilt framebuffer to {}x{}", size.width, size.height);
        self.define_storage(ctx, size)
    }

    fn delete(self, ctx: &mut C) {
        ctx.delete_texture(self.texture);
        ctx.delete_framebuffer(self.framebuffer);
    }
}

/// Both offscreen targets.
#[derive(Debug)]
pub struct FramebufferSet<C: GraphicsContext> {
    /// Tile-sized target with depth.
    pub render: RenderTarget<C>,
    /// Quilt-sized color target.
    pub quilt: QuiltTarget<C>,
}

#[derive(Debug)]
enum State<C: GraphicsContext> {
    Unallocated,
    Live(FramebufferSet<C>),
    Released,
}

/// Owns the [`FramebufferSet`] and its lifecycle.
///
/// `Unallocated` → `Live` on the first [`get_or_create`](Self::get_or_create);
/// `Live` → `Released` on [`release`](Self::release). A released manager
/// re-allocates on the next `get_or_create`, but refuses to hand out handles
/// through [`framebuffers`](Self::framebuffers) until then.
#[derive(Debug)]
pub struct FramebufferManager<C: GraphicsContext> {
    state: State<C>,
    requested_samples: i32,
}

impl<C: GraphicsContext> Default for FramebufferManager<C> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<C: GraphicsContext> FramebufferManager<C> {
    /// Create a manager that will ask for `requested_samples` MSAA samples on
    /// the tile target.
    #[must_use]
    pub fn new(requested_samples: i32) -> Self {
        Self {
            state: State::Unallocated,
            requested_samples,
        }
    }

    /// Allocate the targets if needed and make sure they match `geometry`.
    ///
    /// The caller's framebuffer bindings are preserved.
    ///
    /// # Errors
    ///
    /// Propagates allocation or completeness failures. There is no retry: a
    /// quilt renderer without its targets cannot do anything useful.
    pub fn get_or_create(
        &mut self,
        ctx: &mut C,
        geometry: &QuiltGeometry,
    ) -> Result<&FramebufferSet<C>> {
        ctx.push_framebuffer_bindings();
        let result = self.ensure(ctx, geometry);
        ctx.pop_framebuffer_bindings();
        result?;

        match &self.state {
            State::Live(set) => Ok(set),
            State::Unallocated | State::Released => Err(Error::ResourcesReleased),
        }
    }

    fn ensure(&mut self, ctx: &mut C, geometry: &QuiltGeometry) -> Result<(), GraphicsError> {
        if let State::Live(set) = &mut self.state {
            set.render.resize(ctx, geometry.render_size())?;
            return set.quilt.resize(ctx, geometry.quilt_size());
        }

        let samples = effective_samples(self.requested_samples, ctx.max_samples());
        debug!(
            "allocating quilt framebuffers: tile {}x{} ({samples} samples), quilt {}x{}",
            geometry.render_size().width,
            geometry.render_size().height,
            geometry.quilt_size().width,
            geometry.quilt_size().height,
        );

        let render = RenderTarget::allocate(ctx, geometry.render_size(), samples)?;
        let quilt = match QuiltTarget::allocate(ctx, geometry.quilt_size()) {
            Ok(quilt) => quilt,
            Err(err) => {
                render.delete(ctx);
                return Err(err);
            }
        };
        self.state = State::Live(FramebufferSet { render, quilt });
        Ok(())
    }

    /// The live targets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourcesReleased`] if nothing is allocated.
    pub fn framebuffers(&self) -> Result<&FramebufferSet<C>> {
        match &self.state {
            State::Live(set) => Ok(set),
            State::Unallocated | State::Released => Err(Error::ResourcesReleased),
        }
    }

    /// Whether GPU handles are currently held.
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self.state, State::Live(_))
    }

    /// Whether [`release`](Self::release) ran after the last allocation.
    #[must_use]
    pub fn is_released(&self) -> bool {
        matches!(self.state, State::Released)
    }

    /// Free every GPU handle. Safe to call repeatedly and before anything was
    /// allocated.
    pub fn release(&mut self, ctx: &mut C) {
        if let State::Live(set) = std::mem::replace(&mut self.state, State::Released) {
            debug!("releasing quilt framebuffers");
            set.render.delete(ctx);
            set.quilt.delete(ctx);
        }
    }
}

impl<C: GraphicsContext> Drop for FramebufferManager<C> {
    fn drop(&mut self) {
        if self.is_live() {
            error!("quilt framebuffers should have been released before the context was dropped");
            if !std::thread::panicking() {
                debug_assert!(false, "FramebufferManager dropped with live GPU handles");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        device,
        testing::{Call, RecordingContext},
    };

    fn standard() -> QuiltGeometry {
        QuiltGeometry::new(device::lookup("standard"))
    }

    #[test]
    fn sample_count_is_normalized() {
        assert_eq!(effective_samples(0, 8), 0);
        assert_eq!(effective_samples(1, 8), 0);
        assert_eq!(effective_samples(4, 8), 4);
        assert_eq!(effective_samples(16, 8), 8);
        assert_eq!(effective_samples(4, 1), 0);
        assert_eq!(effective_samples(-3, 8), 0);
    }

    #[test]
    fn allocates_once_and_sizes_targets() {
        let mut ctx = RecordingContext::new();
        let mut manager = FramebufferManager::new(0);
        let geometry = standard();

        let (render_fb, quilt_fb) = {
            let set = manager.get_or_create(&mut ctx, &geometry).unwrap();
            assert_eq!(set.render.size(), Size::new(512, 256));
            assert_eq!(set.quilt.size(), Size::new(2048, 2048));
            assert_eq!(set.render.samples(), 0);
            (set.render.framebuffer(), set.quilt.framebuffer())
        };
        let created = ctx.count(|call| matches!(call, Call::CreateFramebuffer(_)));
        assert_eq!(created, 2);

        let set = manager.get_or_create(&mut ctx, &geometry).unwrap();
        assert_eq!(set.render.framebuffer(), render_fb);
        assert_eq!(set.quilt.framebuffer(), quilt_fb);
        assert_eq!(ctx.count(|call| matches!(call, Call::CreateFramebuffer(_))), 2);
        assert_eq!(ctx.binding_depth(), 0);

        manager.release(&mut ctx);
    }

    #[test]
    fn multisampling_uses_renderbuffer_color() {
        let mut ctx = RecordingContext::new();
        ctx.max_samples = 4;
        let mut manager = FramebufferManager::new(8);

        let samples = manager
            .get_or_create(&mut ctx, &standard())
            .unwrap()
            .render
            .samples();
        assert_eq!(samples, 4);
        assert!(ctx
            .calls()
            .iter()
            .any(|call| matches!(call, Call::RenderbufferStorage { samples: 4, format: PixelFormat::Rgba8, .. })));

        manager.release(&mut ctx);
    }

    #[test]
    fn stencil_capable_context_gets_packed_depth() {
        let mut ctx = RecordingContext::new();
        ctx.stencil = true;
        let mut manager = FramebufferManager::new(0);
        manager.get_or_create(&mut ctx, &standard()).unwrap();
        assert!(ctx.calls().iter().any(|call| matches!(
            call,
            Call::AttachRenderbuffer {
                attachment: Attachment::DepthStencil,
                ..
            }
        )));
        manager.release(&mut ctx);
    }

    #[test]
    fn geometry_change_resizes_in_place() {
        let mut ctx = RecordingContext::new();
        let mut manager = FramebufferManager::new(0);
        manager.get_or_create(&mut ctx, &standard()).unwrap();

        let portrait = QuiltGeometry::new(device::lookup("portrait"));
        let set = manager.get_or_create(&mut ctx, &portrait).unwrap();
        assert_eq!(set.render.size(), Size::new(420, 560));
        assert_eq!(set.quilt.size(), Size::new(3360, 3360));
        assert_eq!(ctx.count(|call| matches!(call, Call::CreateFramebuffer(_))), 2);

        manager.release(&mut ctx);
    }

    #[test]
    fn release_is_idempotent_and_frees_everything() {
        let mut ctx = RecordingContext::new();
        let mut manager = FramebufferManager::new(0);
        manager.release(&mut ctx);
        assert!(manager.is_released());

        manager.get_or_create(&mut ctx, &standard()).unwrap();
        assert!(manager.is_live());
        manager.release(&mut ctx);
        manager.release(&mut ctx);

        assert!(matches!(manager.framebuffers(), Err(Error::ResourcesReleased)));
        assert_eq!(ctx.live_objects(), 0, "leaked handles: {:?}", ctx.calls());
    }

    #[test]
    fn allocation_failure_propagates() {
        // Five objects in total: tile framebuffer, color, depth, then quilt
        // framebuffer and texture. Fail at every point in between.
        for samples in [0, 4] {
            for limit in 0..5 {
                let mut ctx = RecordingContext::new();
                ctx.fail_allocations_after = Some(limit);
                let mut manager = FramebufferManager::new(samples);
                let err = manager.get_or_create(&mut ctx, &standard()).unwrap_err();
                assert!(matches!(err, Error::Graphics(GraphicsError::Allocation(_))));
                assert!(!manager.is_live());
                assert_eq!(ctx.binding_depth(), 0);
                assert_eq!(
                    ctx.live_objects(),
                    0,
                    "handles left after failing at allocation {limit} ({samples} samples)"
                );
            }
        }
    }

    #[test]
    fn incomplete_framebuffer_frees_partial_targets() {
        // Handles are numbered from 1 in creation order: the tile framebuffer
        // is 1 and the quilt framebuffer is 4.
        for incomplete in [1, 4] {
            let mut ctx = RecordingContext::new();
            ctx.incomplete.insert(incomplete);
            let mut manager = FramebufferManager::new(0);
            let err = manager.get_or_create(&mut ctx, &standard()).unwrap_err();
            assert!(matches!(
                err,
                Error::Graphics(GraphicsError::IncompleteFramebuffer { .. })
            ));
            assert!(!manager.is_live());
            assert_eq!(ctx.live_objects(), 0, "framebuffer {incomplete} leaked handles");
        }
    }
}
