//! Distance estimators for the ray-marched backend.
//!
//! Each estimator returns a lower bound (or close to one) on the distance
//! from a point to the surface; negative or zero means inside.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata_core::NoiseTexture;
use strata_math::{Vec2, Vec3, Vec4};

use crate::hittable::SurfaceTag;
use crate::material::{Color, Material};

/// Escape radius for the power fractals.
const BAILOUT: f32 = 2.0;

/// Mandelbox sphere-fold radii (squared).
const MIN_RADIUS_SQ: f32 = 0.25;
const FIXED_RADIUS_SQ: f32 = 1.0;

/// Power-n "bulb" fractal in spherical coordinates.
pub fn mandelbulb(p: Vec3, power: f32, iterations: u32) -> f32 {
    let mut z = p;
    let mut dr = 1.0;
    let mut r = 0.0;

    for _ in 0..iterations {
        r = z.length();
        if r > BAILOUT {
            break;
        }

        let theta = if r > 0.0 {
            (z.z / r).clamp(-1.0, 1.0).acos()
        } else {
            0.0
        };
        let phi = z.y.atan2(z.x);
        dr = r.powf(power - 1.0) * power * dr + 1.0;

        let zr = r.powf(power);
        let theta = theta * power;
        let phi = phi * power;
        z = zr * Vec3::new(theta.sin() * phi.cos(), phi.sin() * theta.sin(), theta.cos()) + p;
    }

    if r <= 0.0 {
        return 0.0;
    }
    0.5 * r.ln() * r / dr
}

/// Quaternion square.
fn quat_square(q: Vec4) -> Vec4 {
    Vec4::new(
        q.x * q.x - q.y * q.y - q.z * q.z - q.w * q.w,
        2.0 * q.x * q.y,
        2.0 * q.x * q.z,
        2.0 * q.x * q.w,
    )
}

/// 3D slice (w = 0) of the quaternion Julia set `z <- z^2 + c`.
pub fn quaternion_julia(p: Vec3, c: Vec4, iterations: u32) -> f32 {
    let mut z = p.extend(0.0);
    let mut dz = 1.0;

    for _ in 0..iterations {
        dz *= 2.0 * z.length();
        z = quat_square(z) + c;
        if z.length_squared() > 256.0 {
            break;
        }
    }

    let r = z.length();
    if r <= 0.0 || dz <= 0.0 {
        return 0.0;
    }
    0.5 * r * r.ln() / dz
}

/// Box-folding fractal.
pub fn mandelbox(p: Vec3, scale: f32, iterations: u32) -> f32 {
    let mut z = p;
    let mut dr = 1.0;

    for _ in 0..iterations {
        // Box fold
        z = z.clamp(Vec3::splat(-1.0), Vec3::ONE) * 2.0 - z;

        // Sphere fold
        let r2 = z.length_squared();
        if r2 < MIN_RADIUS_SQ {
            let f = FIXED_RADIUS_SQ / MIN_RADIUS_SQ;
            z *= f;
            dr *= f;
        } else if r2 < FIXED_RADIUS_SQ {
            let f = FIXED_RADIUS_SQ / r2;
            z *= f;
            dr *= f;
        }

        z = z * scale + p;
        dr = dr * scale.abs() + 1.0;
    }

    z.length() / dr.abs()
}

/// Fractional Brownian motion over a tiling noise texture, in [0, 1].
pub fn fbm(noise: &NoiseTexture, uv: Vec2, octaves: u32) -> f32 {
    let mut sum = 0.0;
    let mut norm = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;

    for _ in 0..octaves.max(1) {
        sum += amplitude * noise.sample(uv.x * frequency, uv.y * frequency);
        norm += amplitude;
        amplitude *= 0.5;
        frequency *= 2.0;
    }

    sum / norm
}

/// Seeded white-noise texture; bilinear sampling turns it into value noise.
pub fn default_height_noise() -> NoiseTexture {
    const SIZE: u32 = 256;
    let mut rng = StdRng::seed_from_u64(0x5eed);
    NoiseTexture::from_fn(SIZE, SIZE, |_, _| rng.gen::<f32>())
}

/// Height-field terrain with a water plane.
#[derive(Debug, Clone)]
pub struct TerrainField {
    pub noise: Arc<NoiseTexture>,
    pub height_scale: f32,
    /// Noise texture repeats per world unit
    pub frequency: f32,
    pub octaves: u32,
    pub water_level: f32,
    pub wave_amplitude: f32,
    /// Seconds, drives the wave pattern
    pub wave_time: f32,
}

impl TerrainField {
    /// Terrain height at (x, z).
    pub fn height(&self, x: f32, z: f32) -> f32 {
        fbm(&self.noise, Vec2::new(x, z) * self.frequency, self.octaves) * self.height_scale
    }

    /// Distance to the rocky surface alone.
    fn ground_distance(&self, p: Vec3) -> f32 {
        // Height fields are not Lipschitz-1; halve the vertical gap
        (p.y - self.height(p.x, p.z)) * 0.5
    }

    pub fn distance(&self, p: Vec3) -> f32 {
        self.ground_distance(p).min(p.y - self.water_level)
    }

    /// True if the water plane is the nearer surface at `p`.
    pub fn is_water(&self, p: Vec3) -> bool {
        p.y - self.water_level <= self.ground_distance(p)
    }

    /// Normal of the animated water surface at `p`.
    pub fn water_normal(&self, p: Vec3) -> Vec3 {
        const WAVES: [(Vec2, f32, f32); 2] = [
            (Vec2::new(1.1, 0.4), 1.3, 1.0),
            (Vec2::new(-0.5, 1.7), 2.1, 0.5),
        ];

        let xz = Vec2::new(p.x, p.z);
        let gradient = WAVES.iter().fold(Vec2::ZERO, |acc, (k, speed, weight)| {
            let phase = k.dot(xz) * 4.0 + speed * self.wave_time;
            acc + *k * (4.0 * weight * self.wave_amplitude * phase.cos())
        });
        Vec3::new(-gradient.x, 1.0, -gradient.y).normalize()
    }

    /// Rock, grass, snow or water depending on height and slope.
    pub fn surface(&self, p: Vec3, normal: Vec3) -> (Material, SurfaceTag) {
        if self.is_water(p) {
            return (
                Material::specular(Color::new(0.55, 0.7, 0.78), 0.02),
                SurfaceTag::Water,
            );
        }

        let relative = p.y / self.height_scale.max(1e-6);
        let albedo = if relative > 0.75 && normal.y > 0.7 {
            Color::new(0.9, 0.9, 0.92)
        } else if relative < 0.55 && normal.y > 0.8 {
            Color::new(0.22, 0.4, 0.12)
        } else {
            Color::new(0.4, 0.34, 0.28)
        };
        (Material::diffuse(albedo), SurfaceTag::Terrain)
    }
}

/// Distance function selected by the active mode.
#[derive(Debug, Clone)]
pub enum DistanceField {
    Mandelbulb { power: f32, iterations: u32 },
    QuaternionJulia { c: Vec4, iterations: u32 },
    Mandelbox { scale: f32, iterations: u32 },
    Terrain(TerrainField),
}

impl DistanceField {
    pub fn distance(&self, p: Vec3) -> f32 {
        match self {
            DistanceField::Mandelbulb { power, iterations } => mandelbulb(p, *power, *iterations),
            DistanceField::QuaternionJulia { c, iterations } => {
                quaternion_julia(p, *c, *iterations)
            }
            DistanceField::Mandelbox { scale, iterations } => mandelbox(p, *scale, *iterations),
            DistanceField::Terrain(terrain) => terrain.distance(p),
        }
    }

    /// Radius of a sphere around the origin that contains the whole
    /// surface. `None` for unbounded fields.
    pub fn bounding_radius(&self) -> Option<f32> {
        match self {
            DistanceField::Mandelbulb { .. } => Some(1.5),
            DistanceField::QuaternionJulia { .. } => Some(2.0),
            DistanceField::Mandelbox { scale, .. } => {
                let half_side = if *scale > 1.0 {
                    2.0 * (scale + 1.0) / (scale - 1.0)
                } else {
                    4.0
                };
                Some((half_side * 3.0f32.sqrt()).min(50.0))
            }
            DistanceField::Terrain(_) => None,
        }
    }

    /// Vertical range containing the surface, for unbounded fields.
    pub fn vertical_range(&self) -> Option<(f32, f32)> {
        match self {
            DistanceField::Terrain(t) => Some((
                t.water_level.min(0.0) - 0.01,
                t.height_scale.max(t.water_level) + t.wave_amplitude + 0.01,
            )),
            _ => None,
        }
    }
}
