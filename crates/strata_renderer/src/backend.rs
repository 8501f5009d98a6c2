//! The scene backend contract and the closed set of implementations.

use serde::{Deserialize, Serialize};
use strata_math::{Interval, Ray, Vec3};

use crate::analytic::AnalyticScene;
use crate::hittable::Intersection;
use crate::light::Light;
use crate::material::Color;
use crate::mesh_scene::MeshScene;
use crate::raymarch::RayMarchScene;

/// Capability shared by every scene intersection strategy.
///
/// Backends are read-only while a frame renders; time-varying state is only
/// touched through [`SceneBackend::advance`] between frames.
pub trait SceneBackend: Send + Sync {
    /// Nearest hit along `ray` within `ray_t`.
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Intersection>;

    /// True if the scene changes over time, so accumulation must restart
    /// every frame.
    fn is_dynamic(&self) -> bool;

    /// Short human-readable summary for logs and UIs.
    fn describe(&self) -> String;

    /// Lights sampled by next event estimation.
    fn lights(&self) -> &[Light];

    /// Radiance of rays leaving the scene.
    fn background(&self, direction: Vec3) -> Color;

    /// Offset used to lift secondary ray origins off surfaces.
    fn surface_epsilon(&self) -> f32 {
        1e-4
    }

    /// Move time-varying state to `time` seconds since the mode started.
    fn advance(&mut self, _time: f32) {}
}

/// Vertical sky gradient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sky {
    pub zenith: Color,
    pub horizon: Color,
}

impl Sky {
    pub const BLACK: Sky = Sky {
        zenith: Vec3::ZERO,
        horizon: Vec3::ZERO,
    };

    /// Bright daylight sky.
    pub fn daylight() -> Self {
        Self {
            zenith: Color::new(0.5, 0.71, 0.94),
            horizon: Color::new(0.98, 0.99, 1.0),
        }
    }

    /// Dim backdrop that lets a single sun dominate.
    pub fn dusk() -> Self {
        Self {
            zenith: Color::new(0.06, 0.08, 0.14),
            horizon: Color::new(0.28, 0.27, 0.3),
        }
    }

    pub fn radiance(&self, direction: Vec3) -> Color {
        let t = 0.5 * (direction.normalize_or_zero().y + 1.0);
        self.horizon.lerp(self.zenith, t)
    }
}

/// Which family of backend is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Analytic,
    RayMarched,
    Mesh,
}

/// The active backend, dispatched statically.
#[derive(Debug, Clone)]
pub enum ActiveBackend {
    Analytic(AnalyticScene),
    RayMarched(RayMarchScene),
    Mesh(MeshScene),
}

impl ActiveBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            ActiveBackend::Analytic(_) => BackendKind::Analytic,
            ActiveBackend::RayMarched(_) => BackendKind::RayMarched,
            ActiveBackend::Mesh(_) => BackendKind::Mesh,
        }
    }

    fn inner(&self) -> &dyn SceneBackend {
        match self {
            ActiveBackend::Analytic(s) => s,
            ActiveBackend::RayMarched(s) => s,
            ActiveBackend::Mesh(s) => s,
        }
    }
}

impl SceneBackend for ActiveBackend {
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Intersection> {
        match self {
            ActiveBackend::Analytic(s) => s.intersect(ray, ray_t),
            ActiveBackend::RayMarched(s) => s.intersect(ray, ray_t),
            ActiveBackend::Mesh(s) => s.intersect(ray, ray_t),
        }
    }

    fn is_dynamic(&self) -> bool {
        self.inner().is_dynamic()
    }

    fn describe(&self) -> String {
        self.inner().describe()
    }

    fn lights(&self) -> &[Light] {
        match self {
            ActiveBackend::Analytic(s) => s.lights(),
            ActiveBackend::RayMarched(s) => s.lights(),
            ActiveBackend::Mesh(s) => s.lights(),
        }
    }

    fn background(&self, direction: Vec3) -> Color {
        self.inner().background(direction)
    }

    fn surface_epsilon(&self) -> f32 {
        self.inner().surface_epsilon()
    }

    fn advance(&mut self, time: f32) {
        match self {
            ActiveBackend::Analytic(s) => s.advance(time),
            ActiveBackend::RayMarched(s) => s.advance(time),
            ActiveBackend::Mesh(s) => s.advance(time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sky_gradient_endpoints() {
        let sky = Sky::daylight();
        assert!((sky.radiance(Vec3::Y) - sky.zenith).length() < 1e-6);
        assert!((sky.radiance(-Vec3::Y) - sky.horizon).length() < 1e-6);
        assert_eq!(Sky::BLACK.radiance(Vec3::X), Color::ZERO);
    }
}
