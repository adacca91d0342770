//! Quilt stills and frame recording.
//!
//! The quilt texture is read back with the pixel-download path, flipped to
//! top-down row order and stripped of alpha (the background would otherwise
//! come out transparent). What happens to the RGB buffer afterwards is up to a
//! [`FrameSink`].

use std::path::{Path, PathBuf};

use image::ExtendedColorType;
use log::debug;

use crate::{
    context::GraphicsContext,
    error::{Error, Result},
    framebuffer::FramebufferSet,
    types::{Rect, Size},
};

/// Convert bottom-up RGBA8 rows as GL returns them into top-down RGB8.
///
/// # Errors
///
/// Returns [`Error::PixelBufferSize`] if `rgba` does not hold exactly
/// `size` pixels.
pub fn rgba_to_rgb_top_down(rgba: &[u8], size: Size) -> Result<Vec<u8>> {
    let expected = size.area() * 4;
    if rgba.len() != expected {
        return Err(Error::PixelBufferSize {
            expected,
            actual: rgba.len(),
        });
    }

    let row_len = size.width as usize * 4;
    let mut rgb = Vec::with_capacity(size.area() * 3);
    if row_len == 0 {
        return Ok(rgb);
    }
    for row in rgba.chunks_exact(row_len).rev() {
        for pixel in row.chunks_exact(4) {
            rgb.extend_from_slice(&pixel[..3]);
        }
    }
    Ok(rgb)
}

/// Read the quilt framebuffer back as top-down RGB8.
pub(crate) fn download_quilt<C: GraphicsContext>(
    ctx: &mut C,
    framebuffers: &FramebufferSet<C>,
) -> Result<Vec<u8>> {
    let size = framebuffers.quilt.size();
    let rgba = ctx.read_pixels(framebuffers.quilt.framebuffer(), Rect::from_size(size));
    rgba_to_rgb_top_down(&rgba, size)
}

/// Encode a top-down RGB8 buffer to `path`. The format follows the
/// extension.
///
/// # Errors
///
/// Returns [`Error::Image`] if encoding or writing fails.
pub fn save_rgb(path: &Path, rgb: &[u8], size: Size) -> Result<()> {
    image::save_buffer(path, rgb, size.width, size.height, ExtendedColorType::Rgb8)?;
    Ok(())
}

/// Consumer of recorded quilt frames.
///
/// `begin` is called once with the quilt size, then `write_frame` once per
/// rendered quilt with a top-down RGB8 buffer, then `finish`.
pub trait FrameSink {
    /// Prepare for frames of `size`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot accept frames.
    fn begin(&mut self, size: Size) -> Result<()>;

    /// Consume one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame could not be written.
    fn write_frame(&mut self, rgb: &[u8]) -> Result<()>;

    /// Flush and close.
    ///
    /// # Errors
    ///
    /// Returns an error if the output could not be finalized.
    fn finish(&mut self) -> Result<()>;
}

/// Writes each frame to `frame_00000.png`, `frame_00001.png`, ... in a
/// directory. Feed the sequence to an external encoder for a movie.
#[derive(Debug)]
pub struct PngSequenceSink {
    dir: PathBuf,
    size: Size,
    frames: usize,
}

impl PngSequenceSink {
    /// Sink writing into `dir`, created on `begin` if missing.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            size: Size::default(),
            frames: 0,
        }
    }

    /// Frames written so far.
    #[must_use]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Path of frame `index`.
    #[must_use]
    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("frame_{index:05}.png"))
    }
}

impl FrameSink for PngSequenceSink {
    fn begin(&mut self, size: Size) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        self.size = size;
        self.frames = 0;
        Ok(())
    }

    fn write_frame(&mut self, rgb: &[u8]) -> Result<()> {
        save_rgb(&self.frame_path(self.frames), rgb, self.size)?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        debug!("wrote {} frames to {}", self.frames, self.dir.display());
        Ok(())
    }
}

/// An active recording.
pub(crate) struct RecordingSession {
    sink: Box<dyn FrameSink>,
}

impl std::fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSession").finish_non_exhaustive()
    }
}

impl RecordingSession {
    pub(crate) fn start(mut sink: Box<dyn FrameSink>, size: Size) -> Result<Self> {
        sink.begin(size)?;
        Ok(Self { sink })
    }

    pub(crate) fn write_frame(&mut self, rgb: &[u8]) -> Result<()> {
        self.sink.write_frame(rgb)
    }

    pub(crate) fn finish(mut self) -> Result<()> {
        self.sink.finish()
    }
}
