use crate::Vec3;

/// A ray in 3D space with an origin and a unit direction.
///
/// The direction is normalized on construction. A zero-length direction
/// stays zero, and every intersection routine treats such a ray as a miss.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray, normalizing `direction`.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Create a ray from an already-normalized direction, skipping the
    /// normalization. Used when transforming rays between spaces, where the
    /// ray parameter must keep its meaning.
    #[inline]
    pub fn from_parts(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Returns true when the direction is zero and the ray cannot hit anything.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.direction.length_squared() < 1e-12
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_normalizes_direction() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 3.0, 4.0));
        assert!((ray.direction.length() - 1.0).abs() < 1e-6);
        assert!((ray.direction.y - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_ray_at() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);

        assert_eq!(ray.at(0.0), Vec3::ZERO);
        assert_eq!(ray.at(1.0), Vec3::X);
        assert_eq!(ray.at(2.0), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(ray.at(-1.0), Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_zero_direction_is_degenerate() {
        let ray = Ray::new(Vec3::ONE, Vec3::ZERO);
        assert!(ray.is_degenerate());
        assert_eq!(ray.direction, Vec3::ZERO);
    }

    #[test]
    fn test_from_parts_keeps_length() {
        let ray = Ray::from_parts(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(ray.at(1.0), Vec3::new(2.0, 0.0, 0.0));
    }
}
