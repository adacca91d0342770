//! Built-in table of Looking Glass device profiles.
//!
//! The table is a `const`, so there is no lazy initialisation and no
//! first-lookup ordering to worry about. Every entry is checked at compile time
//! to have at least two tiles, which the per-tile view sweep divides by.

use log::warn;

use crate::{
    error::{Error, Result},
    types::Size,
};

/// Device type used when the requested one is unknown or none is available.
pub const DEFAULT_DEVICE_TYPE: &str = "large";

/// Columns and rows of the quilt tile grid. Always holds at least two tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileGrid {
    cols: u32,
    rows: u32,
}

impl TileGrid {
    /// Create a grid, rejecting anything with fewer than two tiles.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTileGrid`] when `cols * rows < 2`.
    pub fn new(cols: u32, rows: u32) -> Result<Self> {
        let grid = Self { cols, rows };
        if grid.count() < 2 {
            return Err(Error::InvalidTileGrid { cols, rows });
        }
        Ok(grid)
    }

    /// Tiles per row.
    #[must_use]
    pub const fn cols(self) -> u32 {
        self.cols
    }

    /// Tiles per column.
    #[must_use]
    pub const fn rows(self) -> u32 {
        self.rows
    }

    /// Total number of tiles (views).
    #[must_use]
    pub const fn count(self) -> usize {
        self.cols as usize * self.rows as usize
    }
}

/// Quilt layout for one kind of display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceProfile {
    id: &'static str,
    name: &'static str,
    quilt_size: Size,
    tiles: TileGrid,
    aspect_ratio: f64,
}

impl DeviceProfile {
    const fn preset(
        id: &'static str,
        name: &'static str,
        quilt: u32,
        cols: u32,
        rows: u32,
        aspect_ratio: f64,
    ) -> Self {
        Self {
            id,
            name,
            quilt_size: Size::new(quilt, quilt),
            tiles: TileGrid { cols, rows },
            aspect_ratio,
        }
    }

    /// Build a profile that is not part of the built-in table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTileGrid`] for grids with fewer than two tiles
    /// and [`Error::InvalidQuiltSize`] when the quilt cannot give every tile at
    /// least one pixel or does not fit GL's signed sizes.
    pub fn new(
        id: &'static str,
        name: &'static str,
        quilt_size: Size,
        tiles: TileGrid,
        aspect_ratio: f64,
    ) -> Result<Self> {
        let tiles = TileGrid::new(tiles.cols, tiles.rows)?;
        if quilt_size.width < tiles.cols
            || quilt_size.height < tiles.rows
            || i32::try_from(quilt_size.width).is_err()
            || i32::try_from(quilt_size.height).is_err()
        {
            return Err(Error::InvalidQuiltSize {
                width: quilt_size.width,
                height: quilt_size.height,
            });
        }
        Ok(Self {
            id,
            name,
            quilt_size,
            tiles,
            aspect_ratio,
        })
    }

    /// Registry key, e.g. `"standard"`.
    #[must_use]
    pub fn id(&self) -> &'static str {
        self.id
    }

    /// Human-readable product name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Size of the quilt texture in pixels.
    #[must_use]
    pub fn quilt_size(&self) -> Size {
        self.quilt_size
    }

    /// Tile grid of the quilt.
    #[must_use]
    pub fn tiles(&self) -> TileGrid {
        self.tiles
    }

    /// Aspect ratio of the physical display, used for camera adjustment when
    /// no device reports its own.
    #[must_use]
    pub fn aspect_ratio(&self) -> f64 {
        self.aspect_ratio
    }
}

/// Sorted by id.
const PROFILES: [DeviceProfile; 5] = [
    DeviceProfile::preset("65", "Looking Glass 65\"", 8192, 8, 9, 1.777),
    DeviceProfile::preset("8k", "Looking Glass 32\"", 8192, 5, 9, 1.777),
    DeviceProfile::preset("large", "Looking Glass 16\"", 4096, 5, 9, 1.777),
    DeviceProfile::preset("portrait", "Looking Glass Portrait", 3360, 8, 6, 0.75),
    DeviceProfile::preset("standard", "Looking Glass 8.9\"", 2048, 4, 8, 1.6),
];

const _: () = {
    let mut i = 0;
    while i < PROFILES.len() {
        let profile = PROFILES[i];
        assert!(profile.tiles.count() >= 2, "device profile with fewer than two tiles");
        assert!(profile.quilt_size.width >= profile.tiles.cols);
        assert!(profile.quilt_size.height >= profile.tiles.rows);
        assert!(profile.quilt_size.width <= i32::MAX as u32);
        assert!(profile.quilt_size.height <= i32::MAX as u32);
        i += 1;
    }
};

/// Look up a profile by exact id.
#[must_use]
pub fn find(device_type: &str) -> Option<&'static DeviceProfile> {
    PROFILES.iter().find(|profile| profile.id == device_type)
}

/// Look up a profile, falling back to the `"large"` profile with a warning
/// when `device_type` is unknown.
#[must_use]
pub fn lookup(device_type: &str) -> &'static DeviceProfile {
    find(device_type).unwrap_or_else(|| {
        warn!(
            "Unrecognized device type: '{device_type}', defaulting to setting for \
             '{DEFAULT_DEVICE_TYPE}' device"
        );
        default_profile()
    })
}

/// The profile used when nothing better is known.
#[must_use]
pub fn default_profile() -> &'static DeviceProfile {
    PROFILES
        .iter()
        .find(|profile| profile.id == DEFAULT_DEVICE_TYPE)
        .unwrap_or(&PROFILES[2])
}

/// All built-in profiles as `(id, display name)` pairs, in id order.
pub fn devices() -> impl Iterator<Item = (&'static str, &'static str)> {
    PROFILES.iter().map(|profile| (profile.id, profile.name))
}

/// Profile for a quilt quality preset: `0` is the 8.9" layout, `2` the 8K
/// layout, anything else the 16" layout.
#[must_use]
pub fn quality_preset(quality: u8) -> &'static DeviceProfile {
    match quality {
        0 => lookup("standard"),
        2 => lookup("8k"),
        _ => default_profile(),
    }
}

/// All built-in profiles.
#[must_use]
pub fn profiles() -> &'static [DeviceProfile] {
    &PROFILES
}
