//! Surface and volume materials.
//!
//! Materials are plain `Copy` values carried inside each [`Intersection`],
//! so the integrator can match on them without any indirection.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use strata_math::Vec3;

use crate::hittable::Intersection;
use crate::sampling::{
    cosine_hemisphere, gen_f32, reflect, refract, sample_henyey_greenstein, schlick, unit_sphere,
};

/// Color type alias (linear RGB)
pub type Color = Vec3;

/// A homogeneous participating medium.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Medium {
    /// Single-scattering colour
    pub albedo: Color,
    /// Scattering coefficient (events per unit length)
    pub density: f32,
    /// Absorption coefficient (per unit length)
    pub absorption: f32,
    /// Henyey–Greenstein asymmetry in (-1, 1)
    pub anisotropy: f32,
}

impl Medium {
    pub fn new(albedo: Color, density: f32, absorption: f32, anisotropy: f32) -> Self {
        Self {
            albedo,
            density: density.max(0.0),
            absorption: absorption.max(0.0),
            anisotropy: anisotropy.clamp(-0.999, 0.999),
        }
    }

    /// Total extinction coefficient.
    pub fn extinction(&self) -> f32 {
        self.density + self.absorption
    }

    /// Sample the distance to the next scattering event.
    ///
    /// Returns infinity for a medium that never scatters.
    pub fn sample_distance(&self, rng: &mut dyn RngCore) -> f32 {
        if self.density <= 0.0 {
            return f32::INFINITY;
        }
        -(1.0 - gen_f32(rng)).ln() / self.density
    }

    /// Beer–Lambert absorption over `distance`.
    ///
    /// Applied to path throughput; scattering is accounted for by the
    /// free-flight sampling probability.
    pub fn absorption_transmittance(&self, distance: f32) -> f32 {
        beer_lambert(self.absorption, distance)
    }

    /// Full transmittance over `distance`, used by shadow rays.
    pub fn transmittance(&self, distance: f32) -> f32 {
        beer_lambert(self.extinction(), distance)
    }

    /// Sample a new direction at a scattering event.
    pub fn sample_phase(&self, forward: Vec3, rng: &mut dyn RngCore) -> Vec3 {
        sample_henyey_greenstein(forward, self.anisotropy, rng)
    }
}

/// `exp(-coefficient * distance)`, exactly 1 for a clear medium even over
/// an infinite distance.
fn beer_lambert(coefficient: f32, distance: f32) -> f32 {
    if coefficient <= 0.0 {
        1.0
    } else {
        (-coefficient * distance).exp()
    }
}

/// Material variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Material {
    /// Lambertian surface
    Diffuse { albedo: Color },
    /// Mirror; `roughness` 0 = perfect mirror, 1 = very rough
    Specular { albedo: Color, roughness: f32 },
    /// Glass-like refractive surface
    Dielectric { ior: f32, tint: Color },
    /// Area light; emits from its front face only
    Emissive { radiance: Color },
    /// Boundary of a participating medium
    Volume(Medium),
}

/// Result of scattering a ray at a surface.
#[derive(Debug, Clone, Copy)]
pub struct Scatter {
    pub direction: Vec3,
    pub attenuation: Color,
    /// True for mirror and glass bounces, which direct lighting cannot sample
    pub specular: bool,
}

impl Material {
    /// Lambertian material with the given albedo.
    pub fn diffuse(albedo: Color) -> Self {
        Self::Diffuse { albedo }
    }

    /// Mirror with the given albedo and roughness.
    pub fn specular(albedo: Color, roughness: f32) -> Self {
        Self::Specular {
            albedo,
            roughness: roughness.clamp(0.0, 1.0),
        }
    }

    /// Clear glass with the given index of refraction.
    pub fn dielectric(ior: f32) -> Self {
        Self::Dielectric {
            ior,
            tint: Color::ONE,
        }
    }

    pub fn emissive(radiance: Color) -> Self {
        Self::Emissive { radiance }
    }

    /// Light emitted towards the viewer.
    pub fn emitted(&self, front_face: bool) -> Color {
        match self {
            Material::Emissive { radiance } if front_face => *radiance,
            _ => Color::ZERO,
        }
    }

    /// True if next event estimation applies at this surface.
    pub fn receives_direct_light(&self) -> bool {
        matches!(self, Material::Diffuse { .. })
    }

    /// Scatter an incoming ray at a surface hit.
    ///
    /// Returns `None` when the ray is absorbed. Diffuse attenuation is the
    /// albedo alone: the cosine-weighted pdf cancels the cosine term.
    /// Emitters and volume boundaries do not scatter.
    pub fn scatter(&self, direction: Vec3, hit: &Intersection, rng: &mut dyn RngCore) -> Option<Scatter> {
        match *self {
            Material::Diffuse { albedo } => Some(Scatter {
                direction: cosine_hemisphere(hit.normal, rng),
                attenuation: albedo,
                specular: false,
            }),
            Material::Specular { albedo, roughness } => {
                let reflected = reflect(direction, hit.normal);
                let scattered = (reflected + roughness * unit_sphere(rng)).normalize_or_zero();

                // Fuzz can push the reflection below the surface
                if scattered.dot(hit.normal) > 0.0 {
                    Some(Scatter {
                        direction: scattered,
                        attenuation: albedo,
                        specular: true,
                    })
                } else {
                    None
                }
            }
            Material::Dielectric { ior, tint } => {
                let ri = if hit.front_face { 1.0 / ior } else { ior };
                let cos_theta = (-direction).dot(hit.normal).min(1.0);

                let refracted = refract(direction, hit.normal, ri)
                    .filter(|_| gen_f32(rng) >= schlick(cos_theta, ri));
                let scattered = refracted.unwrap_or_else(|| reflect(direction, hit.normal));

                Some(Scatter {
                    direction: scattered,
                    attenuation: tint,
                    specular: true,
                })
            }
            Material::Emissive { .. } | Material::Volume(_) => None,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::diffuse(Color::splat(0.5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hittable::SurfaceTag;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use strata_math::Ray;

    fn floor_hit(material: Material) -> Intersection {
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -1.0, 0.0));
        Intersection::new(&ray, 1.0, Vec3::Y, material, SurfaceTag::Floor)
    }

    #[test]
    fn test_diffuse_scatters_above_surface() {
        let mut rng = StdRng::seed_from_u64(7);
        let material = Material::diffuse(Color::new(0.8, 0.2, 0.1));
        let hit = floor_hit(material);

        for _ in 0..200 {
            let s = material.scatter(-Vec3::Y, &hit, &mut rng).unwrap();
            assert!(s.direction.dot(Vec3::Y) >= 0.0);
            assert_eq!(s.attenuation, Color::new(0.8, 0.2, 0.1));
            assert!(!s.specular);
        }
    }

    #[test]
    fn test_perfect_mirror() {
        let mut rng = StdRng::seed_from_u64(8);
        let material = Material::specular(Color::ONE, 0.0);
        let hit = floor_hit(material);
        let incoming = Vec3::new(1.0, -1.0, 0.0).normalize();

        let s = material.scatter(incoming, &hit, &mut rng).unwrap();
        assert!((s.direction - Vec3::new(1.0, 1.0, 0.0).normalize()).length() < 1e-5);
        assert!(s.specular);
    }

    #[test]
    fn test_dielectric_only_emits_reflection_or_refraction() {
        let mut rng = StdRng::seed_from_u64(9);
        let material = Material::dielectric(1.5);
        let hit = floor_hit(material);
        let incoming = Vec3::new(0.3, -1.0, 0.0).normalize();

        let mut reflected = 0;
        for _ in 0..1000 {
            let s = material.scatter(incoming, &hit, &mut rng).unwrap();
            if s.direction.y > 0.0 {
                reflected += 1;
            }
        }
        // Near-normal incidence reflects roughly 4% of the time.
        assert!(reflected > 0 && reflected < 150, "reflected {reflected}");
    }

    #[test]
    fn test_emission_is_one_sided() {
        let light = Material::emissive(Color::splat(4.0));
        assert_eq!(light.emitted(true), Color::splat(4.0));
        assert_eq!(light.emitted(false), Color::ZERO);
        assert_eq!(Material::default().emitted(true), Color::ZERO);
    }

    #[test]
    fn test_medium_free_flight_mean() {
        // Mean free path is 1 / density.
        let mut rng = StdRng::seed_from_u64(10);
        let medium = Medium::new(Color::ONE, 2.0, 0.0, 0.0);
        let n = 20_000;
        let mean: f32 = (0..n).map(|_| medium.sample_distance(&mut rng)).sum::<f32>() / n as f32;
        assert!((mean - 0.5).abs() < 0.02, "mean {mean}");

        let clear = Medium::new(Color::ONE, 0.0, 0.5, 0.0);
        assert!(clear.sample_distance(&mut rng).is_infinite());
        assert!((clear.transmittance(2.0) - (-1.0f32).exp()).abs() < 1e-6);
    }
}
