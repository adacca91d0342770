//! Scene cameras and the per-tile camera offset.
//!
//! Each tile of the quilt sees the scene from a camera slid sideways along its
//! right vector. The look direction and up vector are kept, and the frustum is
//! sheared with an asymmetric window center so every view converges on the
//! original focal plane (the zero-parallax plane). This gives horizontal
//! parallax only, which is what lenticular displays reproduce.

use glam::DVec3;

use crate::{device::TileGrid, types::Size};

/// Camera state the quilt renderer reads and writes.
///
/// This is the narrow slice of a host camera that matters for tiling. A
/// [`Scene`] hands these out by value so the original can be put back
/// unchanged after the tile loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Eye position.
    pub position: DVec3,
    /// Point the camera looks at.
    pub focal_point: DVec3,
    /// Up direction.
    pub view_up: DVec3,
    /// Vertical field of view in degrees.
    pub view_angle: f64,
    /// Near and far clipping distances.
    pub clipping_range: [f64; 2],
    /// Frustum shear in normalized window coordinates.
    pub window_center: [f64; 2],
    /// Which eye a stereo-aware host should render for.
    pub left_eye: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: DVec3::new(0.0, 0.0, 1.0),
            focal_point: DVec3::ZERO,
            view_up: DVec3::Y,
            view_angle: 30.0,
            clipping_range: [0.01, 1000.01],
            window_center: [0.0, 0.0],
            left_eye: true,
        }
    }
}

impl Camera {
    /// Distance from the eye to the focal point.
    #[must_use]
    pub fn distance(&self) -> f64 {
        self.position.distance(self.focal_point)
    }

    /// Unit vector from the focal point towards the eye.
    #[must_use]
    pub fn view_plane_normal(&self) -> DVec3 {
        (self.position - self.focal_point).normalize_or_zero()
    }

    /// Unit-ish right vector, `view_up × view_plane_normal`.
    #[must_use]
    pub fn right(&self) -> DVec3 {
        self.view_up.cross(self.view_plane_normal())
    }
}

/// The host scene, seen as a list of renderers that each own one active
/// camera.
pub trait Scene {
    /// Number of renderers.
    fn renderer_count(&self) -> usize;

    /// Whether the renderer already has an active camera with a real framing.
    fn has_active_camera(&self, renderer: usize) -> bool;

    /// Give the renderer a default framing of its contents.
    fn reset_camera(&mut self, renderer: usize);

    /// Swap in a new active camera, returning the previous one.
    fn replace_camera(&mut self, renderer: usize, camera: Camera) -> Camera;

    /// Mutable access to the active camera.
    fn camera_mut(&mut self, renderer: usize) -> &mut Camera;

    /// Render every renderer into whatever framebuffer is currently bound,
    /// treating `target` as the size of the drawable.
    fn render(&mut self, target: Size);
}

/// View-cone offset angle of `tile` in radians.
///
/// Sweeps linearly from `-view_angle / 2` for tile `0` to `+view_angle / 2`
/// for the last tile. [`TileGrid`] always has at least two tiles, so the
/// sweep is never degenerate.
#[must_use]
#[expect(clippy::cast_precision_loss)]
pub fn offset_angle(tile: usize, tiles: TileGrid, view_angle_degrees: f64) -> f64 {
    let last = (tiles.count() - 1) as f64;
    (tile as f64 / last - 0.5) * view_angle_degrees.to_radians()
}

/// Move `camera` to the position of `tile` within the view cone.
///
/// `aspect_ratio` is the display aspect used to size the sheared window.
/// Returns the lateral offset that was applied, in world units.
pub fn adjust_camera(
    camera: &mut Camera,
    tile: usize,
    tiles: TileGrid,
    view_angle_degrees: f64,
    aspect_ratio: f64,
) -> f64 {
    let distance = camera.distance();
    let offset = distance * offset_angle(tile, tiles, view_angle_degrees).tan();

    let shift = camera.right() * offset;
    camera.position += shift;
    camera.focal_point += shift;

    let window_size = aspect_ratio * distance * (camera.view_angle.to_radians() / 2.0).tan();
    camera.window_center = [-offset / window_size, 0.0];

    offset
}

/// Tighten `range` to `[distance * near_limit, distance * far_limit]`.
///
/// Each bound only moves inward: a range that is already tighter is left as
/// is.
#[must_use]
pub fn clamp_clipping_range(
    range: [f64; 2],
    distance: f64,
    near_limit: f64,
    far_limit: f64,
) -> [f64; 2] {
    let [mut near, mut far] = range;
    if near < distance * near_limit {
        near = distance * near_limit;
    }
    if far > distance * far_limit {
        far = distance * far_limit;
    }
    [near, far]
}
