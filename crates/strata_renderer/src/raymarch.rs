//! Ray-marched implicit scene backend (sphere tracing).

use serde::{Deserialize, Serialize};
use strata_math::{Interval, Ray, Vec3, Vec4};

use crate::backend::{SceneBackend, Sky};
use crate::distance::{DistanceField, TerrainField};
use crate::error::{RenderError, RenderResult};
use crate::hittable::{Intersection, SurfaceTag};
use crate::light::Light;
use crate::material::{Color, Material};

/// Sphere tracing controls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarchSettings {
    /// Iteration budget per ray
    pub max_steps: u32,
    /// Surface epsilon: distances below this count as a hit
    pub min_distance: f32,
    /// Fraction of the estimated distance advanced per step
    pub step_scale: f32,
    /// Rays give up beyond this distance
    pub max_distance: f32,
    /// Secant steps used to pull an overshooting hit back to the surface
    pub refine_steps: u32,
    /// Offset for central-difference normals
    pub normal_epsilon: f32,
}

impl Default for MarchSettings {
    fn default() -> Self {
        Self {
            max_steps: 200,
            min_distance: 1e-3,
            step_scale: 0.8,
            max_distance: 50.0,
            refine_steps: 4,
            normal_epsilon: 5e-4,
        }
    }
}

impl MarchSettings {
    pub fn validate(&self) -> RenderResult<()> {
        if self.max_steps == 0 {
            return Err(RenderError::parameter("max_steps", "must be at least 1"));
        }
        if !(self.min_distance > 0.0 && self.min_distance.is_finite()) {
            return Err(RenderError::parameter("min_distance", "must be positive"));
        }
        if !(self.step_scale > 0.0 && self.step_scale <= 1.0) {
            return Err(RenderError::parameter("step_scale", "must be in (0, 1]"));
        }
        if !(self.max_distance > self.min_distance) {
            return Err(RenderError::parameter(
                "max_distance",
                "must be larger than min_distance",
            ));
        }
        if !(self.normal_epsilon > 0.0 && self.normal_epsilon.is_finite()) {
            return Err(RenderError::parameter("normal_epsilon", "must be positive"));
        }
        Ok(())
    }
}

/// Region known to contain the whole surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarchBounds {
    Sphere { center: Vec3, radius: f32 },
    /// Horizontal slab `min_y <= y <= max_y`
    Slab { min_y: f32, max_y: f32 },
    Unbounded,
}

impl MarchBounds {
    /// Part of `[t_min, t_max]` where the ray is inside the bounds.
    fn clip(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<(f32, f32)> {
        let (lo, hi) = match *self {
            MarchBounds::Sphere { center, radius } => {
                let oc = ray.origin - center;
                let b = oc.dot(ray.direction);
                let c = oc.length_squared() - radius * radius;
                let discriminant = b * b - c;
                if discriminant < 0.0 {
                    return None;
                }
                let s = discriminant.sqrt();
                (-b - s, -b + s)
            }
            MarchBounds::Slab { min_y, max_y } => {
                let dy = ray.direction.y;
                if dy.abs() < 1e-8 {
                    if ray.origin.y < min_y || ray.origin.y > max_y {
                        return None;
                    }
                    (f32::NEG_INFINITY, f32::INFINITY)
                } else {
                    let t0 = (min_y - ray.origin.y) / dy;
                    let t1 = (max_y - ray.origin.y) / dy;
                    (t0.min(t1), t0.max(t1))
                }
            }
            MarchBounds::Unbounded => (f32::NEG_INFINITY, f32::INFINITY),
        };

        let lo = lo.max(t_min);
        let hi = hi.min(t_max);
        (lo <= hi).then_some((lo, hi))
    }
}

/// March `ray` through the distance estimator `de`.
///
/// Returns the hit distance, or `None` when the iteration budget, the
/// maximum distance or the bounds run out first.
pub fn sphere_trace(
    ray: &Ray,
    ray_t: Interval,
    settings: &MarchSettings,
    bounds: MarchBounds,
    de: impl Fn(Vec3) -> f32,
) -> Option<f32> {
    if ray.is_degenerate() {
        return None;
    }

    let (mut t, t_far) = bounds.clip(ray, ray_t.min, ray_t.max.min(settings.max_distance))?;
    let mut previous: Option<(f32, f32)> = None;

    for _ in 0..settings.max_steps {
        if t > t_far {
            return None;
        }

        let d = de(ray.at(t));
        if d < settings.min_distance {
            return Some(match previous {
                Some((t0, d0)) if d < 0.0 => refine(ray, &de, (t0, d0), (t, d), settings.refine_steps),
                _ => t,
            });
        }

        previous = Some((t, d));
        t += d * settings.step_scale;
    }

    None
}

/// Secant search between a point outside (`d > 0`) and one inside.
fn refine(ray: &Ray, de: &impl Fn(Vec3) -> f32, outside: (f32, f32), inside: (f32, f32), steps: u32) -> f32 {
    let (mut a, mut da) = outside;
    let (mut b, mut db) = inside;
    let mut t = b;

    for _ in 0..steps {
        t = a + (b - a) * da / (da - db);
        let d = de(ray.at(t));
        if d.abs() < 1e-7 {
            break;
        }
        if d < 0.0 {
            b = t;
            db = d;
        } else {
            a = t;
            da = d;
        }
    }

    t
}

/// Sun position over time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SunPath {
    /// Degrees above the horizon
    pub elevation: f32,
    /// Degrees around the vertical axis at time 0
    pub azimuth: f32,
    /// Degrees per second of azimuth motion
    pub speed: f32,
    pub intensity: f32,
}

impl SunPath {
    /// Half-angle of the sun disc, wide enough for soft shadows.
    const HALF_ANGLE_DEGREES: f32 = 1.5;

    pub fn direction(&self, time: f32) -> Vec3 {
        let elevation = self.elevation.to_radians();
        let azimuth = (self.azimuth + self.speed * time).to_radians();
        Vec3::new(
            elevation.cos() * azimuth.cos(),
            elevation.sin(),
            elevation.cos() * azimuth.sin(),
        )
    }

    pub fn light(&self, time: f32) -> Light {
        Light::Sun {
            direction: self.direction(time),
            radiance: Color::new(1.0, 0.96, 0.9) * self.intensity,
            cos_half_angle: Self::HALF_ANGLE_DEGREES.to_radians().cos(),
        }
    }
}

/// Parameter drift of animated fractals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drift {
    pub amplitude: f32,
    /// Radians per second
    pub speed: f32,
}

/// Scene defined by a distance estimator.
#[derive(Debug, Clone)]
pub struct RayMarchScene {
    field: DistanceField,
    /// Field at time 0, the reference for drift
    base: DistanceField,
    offset: Vec3,
    settings: MarchSettings,
    albedo: Color,
    animation: Option<Drift>,
    sun: SunPath,
    lights: Vec<Light>,
    sky: Sky,
    time: f32,
}

impl RayMarchScene {
    pub fn new(field: DistanceField, settings: MarchSettings, albedo: Color, sun: SunPath, sky: Sky) -> Self {
        Self {
            base: field.clone(),
            field,
            offset: Vec3::ZERO,
            settings,
            albedo,
            animation: None,
            lights: vec![sun.light(0.0)],
            sun,
            sky,
            time: 0.0,
        }
    }

    /// Translate the field so its origin sits at `offset`.
    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    /// Enable time variation; `None` keeps the scene static.
    pub fn with_animation(mut self, animation: Option<Drift>) -> Self {
        self.animation = animation;
        self
    }

    pub fn field(&self) -> &DistanceField {
        &self.field
    }

    pub fn settings(&self) -> &MarchSettings {
        &self.settings
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    fn distance(&self, p: Vec3) -> f32 {
        self.field.distance(p - self.offset)
    }

    fn bounds(&self) -> MarchBounds {
        if let Some(radius) = self.field.bounding_radius() {
            MarchBounds::Sphere {
                center: self.offset,
                radius,
            }
        } else if let Some((min_y, max_y)) = self.field.vertical_range() {
            MarchBounds::Slab { min_y, max_y }
        } else {
            MarchBounds::Unbounded
        }
    }

    /// Central-difference gradient of the field.
    fn estimate_normal(&self, p: Vec3) -> Vec3 {
        let e = self.settings.normal_epsilon;
        let dx = self.distance(p + Vec3::new(e, 0.0, 0.0)) - self.distance(p - Vec3::new(e, 0.0, 0.0));
        let dy = self.distance(p + Vec3::new(0.0, e, 0.0)) - self.distance(p - Vec3::new(0.0, e, 0.0));
        let dz = self.distance(p + Vec3::new(0.0, 0.0, e)) - self.distance(p - Vec3::new(0.0, 0.0, e));
        let n = Vec3::new(dx, dy, dz);
        if n.length_squared() > 0.0 {
            n.normalize()
        } else {
            Vec3::Y
        }
    }

    fn drifted(&self, time: f32, drift: Drift) -> DistanceField {
        let phase = (time * drift.speed).sin();
        match &self.base {
            DistanceField::Mandelbulb { power, iterations } => DistanceField::Mandelbulb {
                power: power + drift.amplitude * phase,
                iterations: *iterations,
            },
            DistanceField::QuaternionJulia { c, iterations } => DistanceField::QuaternionJulia {
                c: *c + Vec4::new(phase, (time * drift.speed).cos(), 0.5 * phase, 0.0) * drift.amplitude,
                iterations: *iterations,
            },
            DistanceField::Mandelbox { scale, iterations } => DistanceField::Mandelbox {
                scale: scale + drift.amplitude * phase,
                iterations: *iterations,
            },
            DistanceField::Terrain(terrain) => DistanceField::Terrain(TerrainField {
                wave_time: time,
                ..terrain.clone()
            }),
        }
    }
}

impl SceneBackend for RayMarchScene {
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Intersection> {
        let t = sphere_trace(ray, ray_t, &self.settings, self.bounds(), |p| self.distance(p))?;
        let p = ray.at(t);

        let (normal, material, tag) = match &self.field {
            DistanceField::Terrain(terrain) => {
                let local = p - self.offset;
                let normal = if terrain.is_water(local) {
                    terrain.water_normal(local)
                } else {
                    self.estimate_normal(p)
                };
                let (material, tag) = terrain.surface(local, normal);
                (normal, material, tag)
            }
            _ => (
                self.estimate_normal(p),
                Material::diffuse(self.albedo),
                SurfaceTag::Fractal,
            ),
        };

        Some(Intersection::new(ray, t, normal, material, tag))
    }

    fn is_dynamic(&self) -> bool {
        self.animation.is_some()
    }

    fn describe(&self) -> String {
        let name = match &self.field {
            DistanceField::Mandelbulb { .. } => "mandelbulb",
            DistanceField::QuaternionJulia { .. } => "quaternion julia",
            DistanceField::Mandelbox { .. } => "mandelbox",
            DistanceField::Terrain(_) => "terrain",
        };
        format!(
            "ray-marched {}: {} steps, epsilon {}, {}",
            name,
            self.settings.max_steps,
            self.settings.min_distance,
            if self.is_dynamic() { "animated" } else { "static" }
        )
    }

    fn lights(&self) -> &[Light] {
        &self.lights
    }

    fn background(&self, direction: Vec3) -> Color {
        self.sky.radiance(direction)
    }

    fn surface_epsilon(&self) -> f32 {
        self.settings.min_distance * 4.0
    }

    fn advance(&mut self, time: f32) {
        let Some(drift) = self.animation else {
            return;
        };
        self.time = time;
        self.field = self.drifted(time, drift);
        self.lights = vec![self.sun.light(time)];
    }
}
