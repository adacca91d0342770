//! Test doubles: a [`GraphicsContext`] that records every call and a
//! [`Scene`] that records what it was asked to render.

use std::{
    cell::RefCell,
    collections::HashSet,
    rc::Rc,
};

use glam::DVec3;

use crate::{
    camera::{Camera, Scene},
    context::GraphicsContext,
    error::GraphicsError,
    types::{Attachment, Filter, FramebufferTarget, PixelFormat, Rect, Size, Uniform, Wrap},
};

/// One recorded context (or scene) call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateFramebuffer(u32),
    DeleteFramebuffer(u32),
    CreateTexture(u32),
    TextureStorage {
        texture: u32,
        size: Size,
        format: PixelFormat,
        filter: Filter,
        wrap: Wrap,
    },
    DeleteTexture(u32),
    CreateRenderbuffer(u32),
    RenderbufferStorage {
        renderbuffer: u32,
        samples: i32,
        format: PixelFormat,
        size: Size,
    },
    DeleteRenderbuffer(u32),
    AttachTexture {
        framebuffer: u32,
        attachment: Attachment,
        texture: u32,
    },
    AttachRenderbuffer {
        framebuffer: u32,
        attachment: Attachment,
        renderbuffer: u32,
    },
    CheckFramebuffer(u32),
    Bind {
        target: FramebufferTarget,
        framebuffer: Option<u32>,
    },
    PushBindings,
    PopBindings,
    Viewport(Rect),
    Scissor(Rect),
    DepthTest(bool),
    DepthMask(bool),
    Blit {
        read: Option<u32>,
        draw: Option<u32>,
        src: Rect,
        dst: Rect,
        filter: Filter,
    },
    CompileProgram {
        program: u32,
        fragment: String,
    },
    DeleteProgram(u32),
    UseProgram(Option<u32>),
    SetUniform {
        name: String,
        value: Uniform,
    },
    BindTexture {
        unit: u32,
        texture: Option<u32>,
    },
    DrawQuad {
        program: Option<u32>,
        draw: Option<u32>,
    },
    ReadPixels {
        framebuffer: u32,
        rect: Rect,
    },
    /// Recorded by [`TestScene::render`] when it shares the context log.
    Render {
        draw: Option<u32>,
        size: Size,
    },
}

/// Shared call log, so a scene can interleave its renders with context calls.
pub type CallLog = Rc<RefCell<Vec<Call>>>;

/// A graphics context that hands out integer handles and records calls.
#[derive(Debug)]
pub struct RecordingContext {
    log: CallLog,
    next_id: u32,
    live: HashSet<u32>,
    allocations: usize,
    read: Option<u32>,
    draw: Option<u32>,
    stack: Vec<(Option<u32>, Option<u32>)>,
    program: Option<u32>,
    pub max_samples: i32,
    pub stencil: bool,
    /// Number of successful allocations before every further one fails.
    pub fail_allocations_after: Option<usize>,
    pub fail_shader_compile: bool,
    /// Framebuffers whose completeness check fails.
    pub incomplete: HashSet<u32>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self {
            log: Rc::default(),
            next_id: 1,
            live: HashSet::new(),
            allocations: 0,
            read: None,
            draw: None,
            stack: Vec::new(),
            program: None,
            max_samples: 8,
            stencil: false,
            fail_allocations_after: None,
            fail_shader_compile: false,
            incomplete: HashSet::new(),
        }
    }

    pub fn log(&self) -> CallLog {
        Rc::clone(&self.log)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }

    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.log.borrow().iter().filter(|call| pred(call)).count()
    }

    pub fn binding_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn bindings(&self) -> (Option<u32>, Option<u32>) {
        (self.read, self.draw)
    }

    pub fn live_objects(&self) -> usize {
        self.live.len()
    }

    fn record(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }

    fn allocate(&mut self) -> Result<u32, GraphicsError> {
        if self
            .fail_allocations_after
            .is_some_and(|limit| self.allocations >= limit)
        {
            return Err(GraphicsError::Allocation("out of memory".into()));
        }
        self.allocations += 1;
        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id);
        Ok(id)
    }

    fn free(&mut self, id: u32) {
        assert!(self.live.remove(&id), "double free of handle {id}");
    }
}

impl GraphicsContext for RecordingContext {
    type Framebuffer = u32;
    type Texture = u32;
    type Renderbuffer = u32;
    type Program = u32;
    type UniformLocation = String;

    fn max_samples(&self) -> i32 {
        self.max_samples
    }

    fn stencil_capable(&self) -> bool {
        self.stencil
    }

    fn create_framebuffer(&mut self) -> Result<u32, GraphicsError> {
        let id = self.allocate()?;
        self.record(Call::CreateFramebuffer(id));
        Ok(id)
    }

    fn delete_framebuffer(&mut self, framebuffer: u32) {
        self.free(framebuffer);
        self.record(Call::DeleteFramebuffer(framebuffer));
    }

    fn create_texture(&mut self) -> Result<u32, GraphicsError> {
        let id = self.allocate()?;
        self.record(Call::CreateTexture(id));
        Ok(id)
    }

    fn texture_storage_2d(
        &mut self,
        texture: u32,
        size: Size,
        format: PixelFormat,
        filter: Filter,
        wrap: Wrap,
    ) {
        self.record(Call::TextureStorage {
            texture,
            size,
            format,
            filter,
            wrap,
        });
    }

    fn delete_texture(&mut self, texture: u32) {
        self.free(texture);
        self.record(Call::DeleteTexture(texture));
    }

    fn create_renderbuffer(&mut self) -> Result<u32, GraphicsError> {
        let id = self.allocate()?;
        self.record(Call::CreateRenderbuffer(id));
        Ok(id)
    }

    fn renderbuffer_storage(&mut self, renderbuffer: u32, samples: i32, format: PixelFormat, size: Size) {
        self.record(Call::RenderbufferStorage {
            renderbuffer,
            samples,
            format,
            size,
        });
    }

    fn delete_renderbuffer(&mut self, renderbuffer: u32) {
        self.free(renderbuffer);
        self.record(Call::DeleteRenderbuffer(renderbuffer));
    }

    fn attach_texture(&mut self, framebuffer: u32, attachment: Attachment, texture: u32) {
        self.record(Call::AttachTexture {
            framebuffer,
            attachment,
            texture,
        });
    }

    fn attach_renderbuffer(&mut self, framebuffer: u32, attachment: Attachment, renderbuffer: u32) {
        self.record(Call::AttachRenderbuffer {
            framebuffer,
            attachment,
            renderbuffer,
        });
    }

    fn check_framebuffer(&mut self, framebuffer: u32) -> Result<(), GraphicsError> {
        self.read = Some(framebuffer);
        self.draw = Some(framebuffer);
        self.record(Call::CheckFramebuffer(framebuffer));
        if self.incomplete.contains(&framebuffer) {
            return Err(GraphicsError::IncompleteFramebuffer { status: 0x8CD6 });
        }
        Ok(())
    }

    fn bind_framebuffer(&mut self, target: FramebufferTarget, framebuffer: Option<u32>) {
        match target {
            FramebufferTarget::Both => {
                self.read = framebuffer;
                self.draw = framebuffer;
            }
            FramebufferTarget::Read => self.read = framebuffer,
            FramebufferTarget::Draw => self.draw = framebuffer,
        }
        self.record(Call::Bind {
            target,
            framebuffer,
        });
    }

    fn push_framebuffer_bindings(&mut self) {
        self.stack.push((self.read, self.draw));
        self.record(Call::PushBindings);
    }

    fn pop_framebuffer_bindings(&mut self) {
        let (read, draw) = self.stack.pop().expect("unbalanced pop_framebuffer_bindings");
        self.read = read;
        self.draw = draw;
        self.record(Call::PopBindings);
    }

    fn viewport(&mut self, rect: Rect) {
        self.record(Call::Viewport(rect));
    }

    fn scissor(&mut self, rect: Rect) {
        self.record(Call::Scissor(rect));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.record(Call::DepthTest(enabled));
    }

    fn set_depth_mask(&mut self, enabled: bool) {
        self.record(Call::DepthMask(enabled));
    }

    fn blit_color(&mut self, src: Rect, dst: Rect, filter: Filter) {
        self.record(Call::Blit {
            read: self.read,
            draw: self.draw,
            src,
            dst,
            filter,
        });
    }

    fn compile_program(&mut self, _vertex_src: &str, fragment_src: &str) -> Result<u32, GraphicsError> {
        if self.fail_shader_compile {
            return Err(GraphicsError::ShaderCompile("syntax error".into()));
        }
        let program = self.allocate()?;
        self.record(Call::CompileProgram {
            program,
            fragment: fragment_src.to_owned(),
        });
        Ok(program)
    }

    fn delete_program(&mut self, program: u32) {
        self.free(program);
        self.record(Call::DeleteProgram(program));
    }

    fn uniform_location(&mut self, _program: u32, name: &str) -> Option<String> {
        Some(name.to_owned())
    }

    fn use_program(&mut self, program: Option<u32>) {
        self.program = program;
        self.record(Call::UseProgram(program));
    }

    fn set_uniform(&mut self, location: &String, value: Uniform) {
        self.record(Call::SetUniform {
            name: location.clone(),
            value,
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<u32>) {
        self.record(Call::BindTexture { unit, texture });
    }

    fn draw_fullscreen_quad(&mut self) {
        self.record(Call::DrawQuad {
            program: self.program,
            draw: self.draw,
        });
    }

    /// Pixel `(x, y)` reads back as `[y, x, 7, 255]` (truncated to bytes).
    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn read_pixels(&mut self, framebuffer: u32, rect: Rect) -> Vec<u8> {
        self.record(Call::ReadPixels { framebuffer, rect });
        let mut pixels = Vec::with_capacity(rect.size.area() * 4);
        for y in 0..rect.size.height {
            for x in 0..rect.size.width {
                pixels.extend_from_slice(&[y as u8, x as u8, 7, 255]);
            }
        }
        pixels
    }
}

/// What the scene saw on one `render` call.
#[derive(Debug, Clone)]
pub struct RenderRecord {
    pub size: Size,
    pub cameras: Vec<Camera>,
}

/// A scene of `n` renderers with plain cameras.
#[derive(Debug)]
pub struct TestScene {
    pub cameras: Vec<Camera>,
    pub created: Vec<bool>,
    pub resets: Vec<usize>,
    pub renders: Vec<RenderRecord>,
    log: Option<CallLog>,
}

impl TestScene {
    /// Every renderer starts with a camera 10 units away from the origin.
    pub fn new(renderers: usize) -> Self {
        Self {
            cameras: vec![framed_camera(); renderers],
            created: vec![true; renderers],
            resets: Vec::new(),
            renders: Vec::new(),
            log: None,
        }
    }

    /// Record renders into the context call log too.
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }
}

/// The framing `reset_camera` produces.
pub fn framed_camera() -> Camera {
    Camera {
        position: DVec3::new(0.0, 0.0, 10.0),
        clipping_range: [1.0, 100.0],
        left_eye: false,
        ..Camera::default()
    }
}

impl Scene for TestScene {
    fn renderer_count(&self) -> usize {
        self.cameras.len()
    }

    fn has_active_camera(&self, renderer: usize) -> bool {
        self.created[renderer]
    }

    fn reset_camera(&mut self, renderer: usize) {
        self.cameras[renderer] = framed_camera();
        self.created[renderer] = true;
        self.resets.push(renderer);
    }

    fn replace_camera(&mut self, renderer: usize, camera: Camera) -> Camera {
        std::mem::replace(&mut self.cameras[renderer], camera)
    }

    fn camera_mut(&mut self, renderer: usize) -> &mut Camera {
        &mut self.cameras[renderer]
    }

    fn render(&mut self, size: Size) {
        if let Some(log) = &self.log {
            let draw = log.borrow().iter().rev().find_map(|call| match call {
                Call::Bind {
                    target: FramebufferTarget::Draw | FramebufferTarget::Both,
                    framebuffer,
                } => Some(*framebuffer),
                _ => None,
            });
            log.borrow_mut().push(Call::Render {
                draw: draw.flatten(),
                size,
            });
        }
        self.renders.push(RenderRecord {
            size,
            cameras: self.cameras.clone(),
        });
    }
}

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}
