//! Random sampling helpers shared by the camera and the integrator.
//!
//! Everything takes `&mut dyn RngCore` so callers can hand in whatever
//! generator they own (a per-row `SmallRng` while rendering, a seeded
//! `StdRng` in tests).

use std::f32::consts::PI;

use rand::RngCore;
use strata_math::{Vec2, Vec3};

/// Uniform float in [0, 1).
#[inline]
pub fn gen_f32(rng: &mut dyn RngCore) -> f32 {
    // 24 random mantissa bits, so the result never rounds up to 1.0
    (rng.next_u32() >> 8) as f32 * (1.0 / (1u32 << 24) as f32)
}

/// Two independent uniform floats in [0, 1).
#[inline]
pub fn gen_vec2(rng: &mut dyn RngCore) -> Vec2 {
    Vec2::new(gen_f32(rng), gen_f32(rng))
}

/// Map a point of the unit square onto the unit disk (concentric mapping).
pub fn square_to_disk(u: Vec2) -> Vec2 {
    let offset = u * 2.0 - Vec2::ONE;
    if offset.x == 0.0 && offset.y == 0.0 {
        return Vec2::ZERO;
    }

    let (r, theta) = if offset.x.abs() > offset.y.abs() {
        (offset.x, (PI / 4.0) * (offset.y / offset.x))
    } else {
        (offset.y, (PI / 2.0) - (PI / 4.0) * (offset.x / offset.y))
    };
    Vec2::new(theta.cos(), theta.sin()) * r
}

/// Cosine-weighted direction in the hemisphere around `normal`.
///
/// The pdf is `cos(theta) / PI`, which cancels the cosine and the 1/PI of a
/// Lambertian BRDF.
pub fn cosine_hemisphere(normal: Vec3, rng: &mut dyn RngCore) -> Vec3 {
    let d = square_to_disk(gen_vec2(rng));
    let z = (1.0 - d.length_squared()).max(0.0).sqrt();
    let (tangent, bitangent) = normal.any_orthonormal_pair();
    (tangent * d.x + bitangent * d.y + normal * z).normalize()
}

/// Uniform direction inside a cone of half-angle `acos(cos_max)` around `axis`.
pub fn uniform_cone(axis: Vec3, cos_max: f32, rng: &mut dyn RngCore) -> Vec3 {
    let u = gen_vec2(rng);
    let cos_theta = 1.0 - u.x * (1.0 - cos_max);
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = 2.0 * PI * u.y;
    let (tangent, bitangent) = axis.any_orthonormal_pair();
    (tangent * (sin_theta * phi.cos()) + bitangent * (sin_theta * phi.sin()) + axis * cos_theta)
        .normalize()
}

/// Uniformly distributed unit vector.
pub fn unit_sphere(rng: &mut dyn RngCore) -> Vec3 {
    let u = gen_vec2(rng);
    let z = 1.0 - 2.0 * u.x;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * u.y;
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

/// Henyey–Greenstein phase function.
///
/// `cos_theta` is the cosine between the propagation direction and the
/// scattered direction; positive `g` favours forward scattering.
pub fn henyey_greenstein(cos_theta: f32, g: f32) -> f32 {
    let denom = 1.0 + g * g - 2.0 * g * cos_theta;
    (1.0 - g * g) / (4.0 * PI * denom * denom.max(1e-8).sqrt())
}

/// Sample a scattered direction from the Henyey–Greenstein distribution
/// around the propagation direction `forward`.
pub fn sample_henyey_greenstein(forward: Vec3, g: f32, rng: &mut dyn RngCore) -> Vec3 {
    let u = gen_vec2(rng);
    let cos_theta = if g.abs() < 1e-3 {
        1.0 - 2.0 * u.x
    } else {
        let s = (1.0 - g * g) / (1.0 - g + 2.0 * g * u.x);
        ((1.0 + g * g - s * s) / (2.0 * g)).clamp(-1.0, 1.0)
    };
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = 2.0 * PI * u.y;
    let (tangent, bitangent) = forward.any_orthonormal_pair();
    (tangent * (sin_theta * phi.cos()) + bitangent * (sin_theta * phi.sin()) + forward * cos_theta)
        .normalize()
}

/// Reflect a vector about a normal.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Refract a unit vector through a surface with relative index `eta`.
///
/// Returns `None` on total internal reflection.
pub fn refract(uv: Vec3, n: Vec3, eta: f32) -> Option<Vec3> {
    let cos_theta = (-uv).dot(n).min(1.0);
    let sin2_theta = (1.0 - cos_theta * cos_theta).max(0.0);
    if eta * eta * sin2_theta > 1.0 {
        return None;
    }
    let r_out_perp = eta * (uv + cos_theta * n);
    let r_out_parallel = -(1.0 - r_out_perp.length_squared()).abs().sqrt() * n;
    Some((r_out_perp + r_out_parallel).normalize())
}

/// Schlick's approximation for Fresnel reflectance.
pub fn schlick(cosine: f32, eta: f32) -> f32 {
    let r0 = ((1.0 - eta) / (1.0 + eta)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cosine).clamp(0.0, 1.0).powi(5)
}

/// SplitMix64 finalizer, used to derive independent per-row seeds.
pub fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Seed for the random stream of one image row in one frame.
pub fn row_seed(frame: u64, row: u32) -> u64 {
    splitmix64(splitmix64(frame) ^ row as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_gen_f32_range() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..10_000 {
            let x = gen_f32(&mut rng);
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn test_square_to_disk_stays_in_disk() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..1000 {
            assert!(square_to_disk(gen_vec2(&mut rng)).length() <= 1.0 + 1e-5);
        }
    }

    #[test]
    fn test_cosine_hemisphere_mean_cosine() {
        // E[cos] under a cosine-weighted pdf is 2/3.
        let mut rng = StdRng::seed_from_u64(3);
        let normal = Vec3::new(0.3, 0.9, -0.1).normalize();
        let n = 20_000;
        let mut sum = 0.0;
        for _ in 0..n {
            let d = cosine_hemisphere(normal, &mut rng);
            let c = d.dot(normal);
            assert!(c >= -1e-5);
            sum += c;
        }
        assert!((sum / n as f32 - 2.0 / 3.0).abs() < 0.01);
    }

    #[test]
    fn test_uniform_cone_respects_angle() {
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..1000 {
            let d = uniform_cone(Vec3::Y, 0.95, &mut rng);
            assert!(d.dot(Vec3::Y) >= 0.95 - 1e-4);
        }
    }

    #[test]
    fn test_henyey_greenstein_normalized() {
        // Integrate p(cos) over the sphere: 2*PI * integral over cos in [-1, 1].
        for g in [-0.6, 0.0, 0.3, 0.8] {
            let steps = 20_000;
            let mut integral = 0.0;
            for i in 0..steps {
                let c = -1.0 + (i as f32 + 0.5) * 2.0 / steps as f32;
                integral += henyey_greenstein(c, g) * 2.0 / steps as f32;
            }
            integral *= 2.0 * PI;
            assert!((integral - 1.0).abs() < 0.01, "g={g} integral={integral}");
        }
    }

    #[test]
    fn test_hg_sampling_mean_cosine_is_g() {
        let mut rng = StdRng::seed_from_u64(5);
        let g = 0.6;
        let n = 40_000;
        let mut sum = 0.0;
        for _ in 0..n {
            sum += sample_henyey_greenstein(Vec3::Z, g, &mut rng).z;
        }
        assert!((sum / n as f32 - g).abs() < 0.02);
    }

    #[test]
    fn test_refract_total_internal_reflection() {
        let n = Vec3::Y;
        let grazing = Vec3::new(1.0, -0.1, 0.0).normalize();
        assert!(refract(grazing, n, 1.5).is_none());

        let straight = refract(-Vec3::Y, n, 1.0 / 1.5).unwrap();
        assert!((straight + Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_schlick_limits() {
        assert!((schlick(1.0, 1.5) - 0.04).abs() < 1e-3);
        assert!((schlick(0.0, 1.5) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_row_seeds_differ() {
        assert_ne!(row_seed(0, 0), row_seed(0, 1));
        assert_ne!(row_seed(0, 0), row_seed(1, 0));
    }
}
