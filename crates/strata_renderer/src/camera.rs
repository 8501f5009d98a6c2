//! Camera state and primary ray generation.

use serde::{Deserialize, Serialize};
use strata_math::{Mat4, Mat4Ext, Ray, Vec2, Vec3};

use crate::error::{RenderError, RenderResult};
use crate::sampling::square_to_disk;

/// Camera for generating primary rays.
///
/// The host updates this once per frame; the renderer only reads it.
/// `transform` maps camera space (looking down -Z, +Y up) to world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub transform: Mat4,
    /// Vertical field of view in radians
    pub vfov: f32,
    /// Width / height of the image plane
    pub aspect: f32,
    /// Lens radius; 0 disables depth of field
    pub aperture: f32,
    /// Distance along the primary ray to the plane of perfect focus
    pub focus_distance: f32,
}

impl CameraState {
    /// Create a pinhole camera at `position` looking at `target`.
    pub fn look_at(position: Vec3, target: Vec3, up: Vec3, vfov_degrees: f32, aspect: f32) -> Self {
        Self {
            transform: Mat4::look_at_rh(position, target, up).inverse(),
            vfov: vfov_degrees.to_radians(),
            aspect,
            aperture: 0.0,
            focus_distance: (target - position).length().max(1e-3),
        }
    }

    /// Set lens settings.
    pub fn with_lens(mut self, aperture: f32, focus_distance: f32) -> Self {
        self.aperture = aperture;
        self.focus_distance = focus_distance;
        self
    }

    /// Set aspect ratio (e.g., on resize)
    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }

    /// Camera position in world space.
    pub fn position(&self) -> Vec3 {
        self.transform.transform_point3(Vec3::ZERO)
    }

    /// Reject values that would produce NaN rays.
    pub fn validate(&self) -> RenderResult<()> {
        if !self.transform.is_finite() {
            return Err(RenderError::InvalidCamera("transform is not finite".into()));
        }
        if !(self.vfov > 0.0 && self.vfov < std::f32::consts::PI) {
            return Err(RenderError::InvalidCamera(format!(
                "vertical fov {} must be in (0, pi)",
                self.vfov
            )));
        }
        if !(self.aspect.is_finite() && self.aspect > 0.0) {
            return Err(RenderError::InvalidCamera(format!(
                "aspect ratio {} must be positive",
                self.aspect
            )));
        }
        if !(self.aperture.is_finite() && self.aperture >= 0.0) {
            return Err(RenderError::InvalidCamera(format!(
                "aperture {} must not be negative",
                self.aperture
            )));
        }
        if self.aperture > 0.0 && !(self.focus_distance.is_finite() && self.focus_distance > 0.0) {
            return Err(RenderError::InvalidCamera(format!(
                "focus distance {} must be positive when aperture is set",
                self.focus_distance
            )));
        }
        Ok(())
    }

    /// Returns true if the two states would produce the same rays.
    pub fn approx_eq(&self, other: &CameraState) -> bool {
        const EPS: f32 = 1e-6;
        self.transform.abs_diff_eq(other.transform, EPS)
            && (self.vfov - other.vfov).abs() <= EPS
            && (self.aspect - other.aspect).abs() <= EPS
            && (self.aperture - other.aperture).abs() <= EPS
            && (self.focus_distance - other.focus_distance).abs() <= EPS
    }

    /// Generate the primary ray through pixel (x, y).
    ///
    /// `jitter` in [0,1)^2 picks the point inside the pixel; `lens` in
    /// [0,1)^2 picks the point on the aperture when depth of field is on.
    pub fn generate_ray(&self, x: u32, y: u32, resolution: (u32, u32), jitter: Vec2, lens: Vec2) -> Ray {
        let (width, height) = resolution;
        let ndc_x = ((x as f32 + jitter.x) / width as f32) * 2.0 - 1.0;
        let ndc_y = 1.0 - ((y as f32 + jitter.y) / height as f32) * 2.0;

        let half_height = (self.vfov * 0.5).tan();
        let view_dir = Vec3::new(ndc_x * half_height * self.aspect, ndc_y * half_height, -1.0);

        let origin = self.transform.transform_point3(Vec3::ZERO);
        let direction = self.transform.transform_direction(view_dir).normalize();

        if self.aperture <= 0.0 {
            return Ray::new(origin, direction);
        }

        let focal_point = origin + direction * self.focus_distance;
        let disk = square_to_disk(lens) * self.aperture;
        let right = self.transform.transform_direction(Vec3::X).normalize();
        let up = self.transform.transform_direction(Vec3::Y).normalize();
        let lens_origin = origin + right * disk.x + up * disk.y;

        Ray::new(lens_origin, focal_point - lens_origin)
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y, 45.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forward_camera() -> CameraState {
        CameraState::look_at(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y, 90.0, 1.0)
    }

    #[test]
    fn test_center_ray_points_forward() {
        let camera = forward_camera();
        let ray = camera.generate_ray(50, 50, (100, 100), Vec2::ZERO, Vec2::ZERO);

        assert!((ray.direction - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-4);
        assert!((ray.direction.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_corner_ray_matches_fov() {
        // 90 degree fov: the top-left corner points at (-1, 1, -1).
        let camera = forward_camera();
        let ray = camera.generate_ray(0, 0, (100, 100), Vec2::ZERO, Vec2::ZERO);
        let expected = Vec3::new(-1.0, 1.0, -1.0).normalize();

        assert!((ray.direction - expected).length() < 1e-4);
    }

    #[test]
    fn test_aspect_widens_horizontal_extent() {
        let camera = forward_camera().with_aspect(2.0);
        let ray = camera.generate_ray(0, 50, (200, 100), Vec2::ZERO, Vec2::ZERO);
        let expected = Vec3::new(-2.0, 0.0, -1.0).normalize();

        assert!((ray.direction - expected).length() < 1e-4);
    }

    #[test]
    fn test_depth_of_field_converges_on_focal_point() {
        let camera = forward_camera().with_lens(0.5, 4.0);
        let pinhole = camera.with_lens(0.0, 4.0);
        let reference = pinhole.generate_ray(30, 70, (100, 100), Vec2::splat(0.5), Vec2::ZERO);
        let focal_point = reference.at(4.0);

        for lens in [Vec2::new(0.1, 0.9), Vec2::new(0.8, 0.3), Vec2::new(0.5, 0.5)] {
            let ray = camera.generate_ray(30, 70, (100, 100), Vec2::splat(0.5), lens);
            let to_focus = focal_point - ray.origin;
            assert!(ray.direction.cross(to_focus.normalize()).length() < 1e-4);
            assert!((ray.origin - Vec3::ZERO).length() <= 0.5 + 1e-4);
        }
    }

    #[test]
    fn test_validate_rejects_negative_aperture() {
        let camera = forward_camera().with_lens(-0.1, 1.0);
        assert!(matches!(camera.validate(), Err(RenderError::InvalidCamera(_))));
        assert!(forward_camera().validate().is_ok());
    }

    #[test]
    fn test_approx_eq_detects_motion() {
        let a = forward_camera();
        let mut b = a;
        assert!(a.approx_eq(&b));

        b.transform = Mat4::from_translation(Vec3::new(0.0, 0.0, 0.01)) * b.transform;
        assert!(!a.approx_eq(&b));
    }
}
