//! Plain value types shared by every component.
//!
//! Sizes and positions are in pixels. GL wants `i32` for most of them, so the
//! conversions live here instead of being sprinkled across call sites.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// A width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Create a size from its components.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels covered.
    #[must_use]
    pub const fn area(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Width over height. Zero height yields zero rather than infinity.
    #[must_use]
    pub fn aspect_ratio(self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            f64::from(self.width) / f64::from(self.height)
        }
    }
}

/// A pixel position, e.g. the top-left corner of a display or a tile origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl Position {
    /// Create a position from its components.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned pixel rectangle with a lower-left origin (GL convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    /// Lower-left corner.
    pub origin: Position,
    /// Extent.
    pub size: Size,
}

impl Rect {
    /// A rectangle anchored at the origin.
    #[must_use]
    pub const fn from_size(size: Size) -> Self {
        Self {
            origin: Position::new(0, 0),
            size,
        }
    }

    /// Exclusive right edge.
    #[must_use]
    pub fn right(&self) -> i32 {
        self.origin.x + gl_size(self.size.width)
    }

    /// Exclusive top edge.
    #[must_use]
    pub fn top(&self) -> i32 {
        self.origin.y + gl_size(self.size.height)
    }

    /// Whether two rectangles share at least one pixel.
    #[must_use]
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.origin.x < other.right()
            && other.origin.x < self.right()
            && self.origin.y < other.top()
            && other.origin.y < self.top()
    }
}

/// Framebuffer binding points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferTarget {
    /// Both read and draw.
    Both,
    /// `GL_READ_FRAMEBUFFER`.
    Read,
    /// `GL_DRAW_FRAMEBUFFER`.
    Draw,
}

/// Framebuffer attachment points used by the quilt targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// First color attachment.
    Color0,
    /// Depth only.
    Depth,
    /// Packed depth + stencil.
    DepthStencil,
}

/// Storage formats for textures and renderbuffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit RGBA color.
    Rgba8,
    /// 32-bit float depth.
    Depth32F,
    /// 24-bit depth with 8-bit stencil.
    Depth24Stencil8,
}

/// Texture sampling filter, also used for framebuffer blits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// Nearest texel.
    Nearest,
    /// Bilinear.
    Linear,
}

/// Texture coordinate wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrap {
    /// Clamp to the edge texel.
    ClampToEdge,
    /// Tile the texture.
    Repeat,
}

/// A uniform value uploaded to a shader program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Uniform {
    /// `int` / `bool` / `sampler2D`.
    Int(i32),
    /// `float`.
    Float(f32),
    /// `vec2`.
    Vec2([f32; 2]),
    /// `vec3`.
    Vec3([f32; 3]),
}

/// A vertex of the full-screen quad: clip-space position plus texture
/// coordinate.
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct QuadVertex {
    /// Normalized device coordinates.
    pub position: [f32; 2],
    /// Texture coordinates in `[0, 1]`.
    pub tex_coord: [f32; 2],
}

/// Triangle-strip covering the whole viewport.
pub const FULLSCREEN_QUAD: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, -1.0],
        tex_coord: [0.0, 0.0],
    },
    QuadVertex {
        position: [1.0, -1.0],
        tex_coord: [1.0, 0.0],
    },
    QuadVertex {
        position: [-1.0, 1.0],
        tex_coord: [0.0, 1.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
        tex_coord: [1.0, 1.0],
    },
];

/// Convert a `u32` to `i32` for GL API calls.
///
/// # Panics
///
/// Panics if `value > i32::MAX`. Quilt and display dimensions are far below
/// that.
#[must_use]
pub fn gl_size(value: u32) -> i32 {
    i32::try_from(value).expect("dimension exceeds i32::MAX")
}
