//! Error types.
//!
//! Configuration and hardware-link problems are recovered inside the
//! [`QuiltInterface`](crate::QuiltInterface) and only logged; what reaches the
//! caller as [`Error`] is either a GPU resource failure or API misuse.

/// Reasons the calibration link could not be established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// The display service is not running.
    #[error("HoloPlay Service not running")]
    NoService,
    /// The request could not be serialized.
    #[error("Client message could not be serialized")]
    Serialize,
    /// The service speaks an incompatible protocol version.
    #[error("Incompatible version of HoloPlay Service")]
    VersionMismatch,
    /// The interprocess pipe broke.
    #[error("Interprocess pipe broken")]
    PipeBroken,
    /// Sending to the service timed out.
    #[error("Interprocess pipe send timeout")]
    SendTimeout,
    /// Waiting on the service timed out.
    #[error("Interprocess pipe receive timeout")]
    ReceiveTimeout,
    /// The service reported something else.
    #[error("Unknown error")]
    Unknown,
    /// The service answered but reported no displays.
    #[error("no Looking Glass devices connected")]
    NoDevices,
}

/// Failures reported by a [`GraphicsContext`](crate::GraphicsContext).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphicsError {
    /// A GL object could not be created (usually out of memory or a lost
    /// context).
    #[error("GPU allocation failed: {0}")]
    Allocation(String),
    /// A framebuffer failed its completeness check after allocation.
    #[error("framebuffer incomplete (status {status:#06x})")]
    IncompleteFramebuffer {
        /// Raw status reported by the driver.
        status: u32,
    },
    /// A shader stage failed to compile.
    #[error("Shader compile error: {0}")]
    ShaderCompile(String),
    /// A program failed to link.
    #[error("Program link error: {0}")]
    ShaderLink(String),
}

/// Crate-level error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// GPU resource creation failed. There is no degraded mode for this.
    #[error(transparent)]
    Graphics(#[from] GraphicsError),
    /// A render, draw or export call was made before `initialize`.
    #[error("initialize must be called before rendering")]
    NotInitialized,
    /// Framebuffers were requested after `release` without re-allocating.
    #[error("graphics resources have been released")]
    ResourcesReleased,
    /// A tile grid with fewer than two views cannot sweep a view cone.
    #[error("invalid tile grid {cols}x{rows}: at least two tiles are required")]
    InvalidTileGrid {
        /// Columns requested.
        cols: u32,
        /// Rows requested.
        rows: u32,
    },
    /// A quilt size that cannot hold the requested grid.
    #[error("invalid quilt size {width}x{height}")]
    InvalidQuiltSize {
        /// Width requested.
        width: u32,
        /// Height requested.
        height: u32,
    },
    /// Tile index outside `[0, tile_count)`.
    #[error("tile {tile} out of range (quilt has {count} tiles)")]
    InvalidTile {
        /// Index requested.
        tile: usize,
        /// Tiles available.
        count: usize,
    },
    /// Pixel data did not match the quilt dimensions.
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    PixelBufferSize {
        /// Bytes expected.
        expected: usize,
        /// Bytes received.
        actual: usize,
    },
    /// Image encoding failed.
    #[error(transparent)]
    Image(#[from] image::ImageError),
    /// Filesystem access failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A configuration or calibration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result alias defaulting to the crate [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
