//! Quilt layout derived from a [`DeviceProfile`].

use std::path::{Path, PathBuf};

use crate::{
    device::{DeviceProfile, TileGrid},
    error::{Error, Result},
    types::{Position, Rect, Size},
};

/// Per-tile render size and tile count for a quilt.
///
/// The render size is the quilt size divided by the tile grid with integer
/// truncation. When the quilt is not evenly divisible the leftover pixels on
/// the right and top edges stay unused; [`view_portion`](Self::view_portion)
/// tells the light-field shader how much of the texture is real content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuiltGeometry {
    quilt_size: Size,
    tiles: TileGrid,
    render_size: Size,
}

impl QuiltGeometry {
    /// Compute the layout for `profile`.
    #[must_use]
    pub fn new(profile: &DeviceProfile) -> Self {
        let quilt_size = profile.quilt_size();
        let tiles = profile.tiles();
        Self {
            quilt_size,
            tiles,
            render_size: Size::new(
                quilt_size.width / tiles.cols(),
                quilt_size.height / tiles.rows(),
            ),
        }
    }

    /// Size of the whole quilt texture.
    #[must_use]
    pub fn quilt_size(&self) -> Size {
        self.quilt_size
    }

    /// Tile grid.
    #[must_use]
    pub fn tiles(&self) -> TileGrid {
        self.tiles
    }

    /// Size each tile is rendered at.
    #[must_use]
    pub fn render_size(&self) -> Size {
        self.render_size
    }

    /// Number of tiles (views) in the quilt.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles.count()
    }

    /// Lower-left pixel of `tile` inside the quilt.
    ///
    /// Tiles are laid out in raster order starting at the origin:
    /// `column = tile % cols`, `row = tile / cols`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTile`] if `tile >= tile_count()`.
    pub fn tile_position(&self, tile: usize) -> Result<Position> {
        let count = self.tile_count();
        if tile >= count {
            return Err(Error::InvalidTile { tile, count });
        }
        let cols = self.tiles.cols() as usize;
        let column = i32::try_from(tile % cols).map_err(|_| Error::InvalidTile { tile, count })?;
        let row = i32::try_from(tile / cols).map_err(|_| Error::InvalidTile { tile, count })?;
        let Size { width, height } = self.render_size;
        Ok(Position::new(
            column * crate::types::gl_size(width),
            row * crate::types::gl_size(height),
        ))
    }

    /// Destination rectangle of `tile` inside the quilt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTile`] if `tile >= tile_count()`.
    pub fn tile_rect(&self, tile: usize) -> Result<Rect> {
        Ok(Rect {
            origin: self.tile_position(tile)?,
            size: self.render_size,
        })
    }

    /// Fraction of the quilt texture covered by tiles, per axis.
    ///
    /// This is `1.0` when the quilt divides evenly and slightly less when
    /// truncation left padding.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn view_portion(&self) -> [f32; 2] {
        [
            (self.render_size.width * self.tiles.cols()) as f32 / self.quilt_size.width as f32,
            (self.render_size.height * self.tiles.rows()) as f32 / self.quilt_size.height as f32,
        ]
    }

    /// File-name suffix encoding the tile grid, e.g. `"_qs5x9"`.
    ///
    /// External quilt viewers parse this to recover the layout.
    #[must_use]
    pub fn file_suffix(&self) -> String {
        format!("_qs{}x{}", self.tiles.cols(), self.tiles.rows())
    }

    /// Insert [`file_suffix`](Self::file_suffix) before the extension of
    /// `path`: `quilt.png` becomes `quilt_qs5x9.png`.
    #[must_use]
    pub fn quilt_file_name(&self, path: &Path) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut name = format!("{stem}{}", self.file_suffix());
        if let Some(ext) = path.extension() {
            name.push('.');
            name.push_str(&ext.to_string_lossy());
        }
        path.with_file_name(name)
    }
}
