//! Radiance integrator.
//!
//! Iterative path tracing with next event estimation, homogeneous media
//! and Russian roulette. All color math is linear; tone mapping happens
//! after accumulation.

use std::f32::consts::PI;

use rand::RngCore;
use strata_math::{Interval, Ray, Vec3};

use crate::backend::SceneBackend;
use crate::hittable::Intersection;
use crate::material::{Color, Material, Medium};
use crate::sampling::{gen_f32, henyey_greenstein};
use crate::settings::RenderSettings;

/// Survival probabilities below this end the path outright.
const MIN_SURVIVAL: f32 = 1e-3;

/// Volume boundaries a single path or shadow ray may cross.
const MAX_CROSSINGS: u32 = 64;

/// Monte Carlo path tracer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathTracer {
    /// Maximum scattering events per path
    pub max_bounces: u32,
    /// Bounce from which Russian roulette applies; `None` disables it
    pub roulette_start: Option<u32>,
    /// Sample lights directly at diffuse surfaces and in media
    pub direct_lighting: bool,
}

impl Default for PathTracer {
    fn default() -> Self {
        Self {
            max_bounces: 8,
            roulette_start: Some(3),
            direct_lighting: true,
        }
    }
}

impl PathTracer {
    pub fn new(settings: &RenderSettings) -> Self {
        Self {
            max_bounces: settings.max_bounces,
            roulette_start: settings.russian_roulette.then_some(settings.rr_start_bounce),
            direct_lighting: settings.direct_lighting,
        }
    }

    /// Estimate the radiance arriving along `ray`.
    pub fn trace<B: SceneBackend + ?Sized>(&self, scene: &B, ray: Ray, rng: &mut dyn RngCore) -> Color {
        let eps = scene.surface_epsilon();
        let ray_t = Interval::forward(eps * 0.1);

        let mut ray = ray;
        let mut radiance = Color::ZERO;
        let mut throughput = Color::ONE;
        let mut medium: Option<Medium> = None;
        // Emission is only added where direct lighting could not have found it
        let mut count_emission = true;
        let mut bounce = 0;
        let mut crossings = 0;

        while bounce < self.max_bounces {
            let hit = scene.intersect(&ray, ray_t);

            if let Some(m) = medium {
                let travel = hit.map_or(f32::INFINITY, |h| h.t);
                let flight = m.sample_distance(rng);

                if flight < travel {
                    let point = ray.at(flight);
                    throughput *= m.albedo * m.absorption_transmittance(flight);

                    if self.direct_lighting {
                        radiance += throughput * self.medium_direct(scene, point, ray.direction, &m, rng);
                    }
                    count_emission = !self.direct_lighting;

                    ray = Ray::new(point, m.sample_phase(ray.direction, rng));
                    if !self.survive(bounce, &mut throughput, rng) {
                        break;
                    }
                    bounce += 1;
                    continue;
                }

                throughput *= m.absorption_transmittance(travel);
            }

            let Some(hit) = hit else {
                radiance += throughput * scene.background(ray.direction);
                if count_emission {
                    for light in scene.lights() {
                        radiance += throughput * light.emitted_towards(ray.direction);
                    }
                }
                break;
            };

            match hit.material {
                Material::Emissive { .. } => {
                    if count_emission {
                        radiance += throughput * hit.material.emitted(hit.front_face);
                    }
                    break;
                }
                Material::Volume(boundary) => {
                    // Crossing a boundary is not a scattering event
                    crossings += 1;
                    if crossings > MAX_CROSSINGS {
                        break;
                    }
                    medium = hit.front_face.then_some(boundary);
                    ray = Ray::new(hit.spawn_origin(ray.direction, eps), ray.direction);
                    continue;
                }
                _ => {}
            }

            if self.direct_lighting && hit.material.receives_direct_light() {
                radiance += throughput * self.surface_direct(scene, &hit, medium, rng);
            }

            let Some(scatter) = hit.material.scatter(ray.direction, &hit, rng) else {
                break;
            };
            count_emission = scatter.specular || !self.direct_lighting;
            throughput *= scatter.attenuation;
            ray = Ray::new(hit.spawn_origin(scatter.direction, eps), scatter.direction);

            if !self.survive(bounce, &mut throughput, rng) {
                break;
            }
            bounce += 1;
        }

        if radiance.is_finite() {
            radiance
        } else {
            Color::ZERO
        }
    }

    /// Russian roulette after `bounce`. Returns false if the path ends.
    fn survive(&self, bounce: u32, throughput: &mut Color, rng: &mut dyn RngCore) -> bool {
        let Some(start) = self.roulette_start else {
            return true;
        };
        if bounce < start {
            return true;
        }

        let survival = throughput.max_element().min(1.0);
        if survival < MIN_SURVIVAL || gen_f32(rng) >= survival {
            return false;
        }
        *throughput /= survival;
        true
    }

    /// Direct light reflected by a diffuse surface.
    fn surface_direct<B: SceneBackend + ?Sized>(
        &self,
        scene: &B,
        hit: &Intersection,
        medium: Option<Medium>,
        rng: &mut dyn RngCore,
    ) -> Color {
        let Material::Diffuse { albedo } = hit.material else {
            return Color::ZERO;
        };
        let eps = scene.surface_epsilon();

        let mut total = Color::ZERO;
        for light in scene.lights() {
            let Some(sample) = light.sample(hit.point, rng) else {
                continue;
            };
            let cos = hit.normal.dot(sample.direction);
            if cos <= 0.0 {
                continue;
            }

            let origin = hit.spawn_origin(sample.direction, eps);
            let visibility = self.transmittance(scene, origin, sample.direction, sample.distance, medium);
            if visibility > 0.0 {
                total += albedo / PI * sample.weight * (cos * visibility);
            }
        }
        total
    }

    /// Direct light in-scattered at a point inside a medium.
    fn medium_direct<B: SceneBackend + ?Sized>(
        &self,
        scene: &B,
        point: Vec3,
        direction: Vec3,
        medium: &Medium,
        rng: &mut dyn RngCore,
    ) -> Color {
        let mut total = Color::ZERO;
        for light in scene.lights() {
            let Some(sample) = light.sample(point, rng) else {
                continue;
            };
            let phase = henyey_greenstein(direction.dot(sample.direction), medium.anisotropy);
            let visibility = self.transmittance(scene, point, sample.direction, sample.distance, Some(*medium));
            if visibility > 0.0 {
                total += sample.weight * (phase * visibility);
            }
        }
        total
    }

    /// Fraction of light that survives from `origin` to a light at
    /// `distance` along `direction`.
    ///
    /// Opaque surfaces block completely; volume boundaries are crossed and
    /// the media in between attenuate by Beer–Lambert.
    fn transmittance<B: SceneBackend + ?Sized>(
        &self,
        scene: &B,
        origin: Vec3,
        direction: Vec3,
        distance: f32,
        medium: Option<Medium>,
    ) -> f32 {
        let eps = scene.surface_epsilon();
        let mut origin = origin;
        let mut medium = medium;
        // Stop short of the light so its own surface does not occlude
        let mut remaining = distance - 2.0 * eps;
        let mut visibility = 1.0;

        for _ in 0..MAX_CROSSINGS {
            if remaining <= 0.0 {
                return visibility;
            }

            let ray = Ray::from_parts(origin, direction);
            let Some(hit) = scene.intersect(&ray, Interval::new(eps * 0.1, remaining)) else {
                if let Some(m) = medium {
                    visibility *= m.transmittance(remaining);
                }
                return visibility;
            };

            let Material::Volume(boundary) = hit.material else {
                return 0.0;
            };
            if let Some(m) = medium {
                visibility *= m.transmittance(hit.t);
            }
            medium = hit.front_face.then_some(boundary);
            origin = hit.spawn_origin(direction, eps);
            remaining -= hit.t;
        }

        0.0
    }
}
