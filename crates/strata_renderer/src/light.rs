//! Lights sampled by next event estimation.

use std::f32::consts::PI;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use strata_math::Vec3;

use crate::material::Color;
use crate::sampling::{gen_vec2, uniform_cone};

/// A light that can be sampled directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Light {
    /// One-sided parallelogram emitter; emits along `edge_u × edge_v`.
    Rect {
        corner: Vec3,
        edge_u: Vec3,
        edge_v: Vec3,
        radiance: Color,
    },
    /// Distant disc light. `direction` points towards the sun.
    Sun {
        direction: Vec3,
        radiance: Color,
        cos_half_angle: f32,
    },
}

/// A sampled direction towards a light.
#[derive(Debug, Clone, Copy)]
pub struct LightSample {
    /// Unit direction from the shading point to the light
    pub direction: Vec3,
    /// Distance to the sampled point (infinite for the sun)
    pub distance: f32,
    /// Incident radiance already divided by the sampling pdf
    /// (radiance times the solid-angle estimate)
    pub weight: Color,
}

impl Light {
    /// Sample the light as seen from `point`.
    ///
    /// Returns `None` when the point is behind a one-sided emitter.
    pub fn sample(&self, point: Vec3, rng: &mut dyn RngCore) -> Option<LightSample> {
        match *self {
            Light::Rect {
                corner,
                edge_u,
                edge_v,
                radiance,
            } => {
                let cross = edge_u.cross(edge_v);
                let area = cross.length();
                if area <= 0.0 {
                    return None;
                }
                let normal = cross / area;

                let uv = gen_vec2(rng);
                let target = corner + edge_u * uv.x + edge_v * uv.y;
                let offset = target - point;
                let distance_sq = offset.length_squared();
                if distance_sq < 1e-10 {
                    return None;
                }
                let distance = distance_sq.sqrt();
                let direction = offset / distance;

                let cos_light = -direction.dot(normal);
                if cos_light <= 0.0 {
                    return None;
                }

                let solid_angle = cos_light * area / distance_sq;
                Some(LightSample {
                    direction,
                    distance,
                    weight: radiance * solid_angle,
                })
            }
            Light::Sun {
                direction,
                radiance,
                cos_half_angle,
            } => Some(LightSample {
                direction: uniform_cone(direction, cos_half_angle, rng),
                distance: f32::INFINITY,
                weight: radiance,
            }),
        }
    }

    /// Radiance seen by a ray that escapes the scene in `direction`.
    ///
    /// Only the sun is visible this way; rectangle lights are ordinary
    /// emissive surfaces that the backend intersects.
    pub fn emitted_towards(&self, direction: Vec3) -> Color {
        match *self {
            Light::Sun {
                direction: sun,
                radiance,
                cos_half_angle,
            } if direction.dot(sun) >= cos_half_angle => {
                let solid_angle = 2.0 * PI * (1.0 - cos_half_angle);
                radiance / solid_angle.max(1e-6)
            }
            _ => Color::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ceiling_light() -> Light {
        Light::Rect {
            corner: Vec3::new(-0.5, 2.0, -0.5),
            edge_u: Vec3::new(1.0, 0.0, 0.0),
            edge_v: Vec3::new(0.0, 0.0, 1.0),
            radiance: Color::ONE,
        }
    }

    #[test]
    fn test_rect_light_solid_angle_estimate() {
        // A unit square 2 units above a point subtends about 0.2354 sr.
        let mut rng = StdRng::seed_from_u64(11);
        let light = ceiling_light();
        let n = 4000;
        let mut total = 0.0;
        for _ in 0..n {
            let s = light.sample(Vec3::ZERO, &mut rng).unwrap();
            assert!(s.direction.y > 0.0);
            total += s.weight.x;
        }
        let estimate = total / n as f32;
        assert!((estimate - 0.2354).abs() < 0.01, "estimate {estimate}");
    }

    #[test]
    fn test_rect_light_is_one_sided() {
        let mut rng = StdRng::seed_from_u64(12);
        assert!(ceiling_light().sample(Vec3::new(0.0, 3.0, 0.0), &mut rng).is_none());
    }

    #[test]
    fn test_sun_sample_stays_in_cone() {
        let mut rng = StdRng::seed_from_u64(13);
        let sun = Light::Sun {
            direction: Vec3::Y,
            radiance: Color::splat(3.0),
            cos_half_angle: 0.999,
        };
        let s = sun.sample(Vec3::ZERO, &mut rng).unwrap();
        assert!(s.direction.dot(Vec3::Y) >= 0.999 - 1e-4);
        assert!(s.distance.is_infinite());

        // Radiance times the disc solid angle gives back the sampled weight.
        let solid_angle = 2.0 * PI * (1.0 - 0.999);
        let seen = sun.emitted_towards(Vec3::Y);
        assert!((seen.x * solid_angle - 3.0).abs() < 1e-3);
        assert_eq!(sun.emitted_towards(Vec3::X), Color::ZERO);
    }
}
