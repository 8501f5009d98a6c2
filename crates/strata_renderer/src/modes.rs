//! Scene modes, their typed parameters, and the registry that builds a
//! backend for each mode.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata_core::NoiseTexture;
use strata_math::{Vec3, Vec4};

use crate::analytic::AnalyticScene;
use crate::backend::{ActiveBackend, BackendKind, Sky};
use crate::bvh::{Bvh, BvhStrategy};
use crate::camera::CameraState;
use crate::distance::{default_height_noise, DistanceField, TerrainField};
use crate::error::{RenderError, RenderResult};
use crate::material::{Color, Material};
use crate::mesh_scene::MeshScene;
use crate::raymarch::{Drift, MarchSettings, RayMarchScene, SunPath};

/// Named scene configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModeKind {
    Cornell,
    Mandelbulb,
    QuaternionJulia,
    Mandelbox,
    Terrain,
    Mesh,
}

impl ModeKind {
    pub const ALL: [ModeKind; 6] = [
        ModeKind::Cornell,
        ModeKind::Mandelbulb,
        ModeKind::QuaternionJulia,
        ModeKind::Mandelbox,
        ModeKind::Terrain,
        ModeKind::Mesh,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModeKind::Cornell => "cornell",
            ModeKind::Mandelbulb => "mandelbulb",
            ModeKind::QuaternionJulia => "quaternion-julia",
            ModeKind::Mandelbox => "mandelbox",
            ModeKind::Terrain => "terrain",
            ModeKind::Mesh => "mesh",
        }
    }

    pub fn backend_kind(self) -> BackendKind {
        match self {
            ModeKind::Cornell => BackendKind::Analytic,
            ModeKind::Mandelbulb
            | ModeKind::QuaternionJulia
            | ModeKind::Mandelbox
            | ModeKind::Terrain => BackendKind::RayMarched,
            ModeKind::Mesh => BackendKind::Mesh,
        }
    }

    /// Default parameters for this mode.
    pub fn default_params(self) -> ModeParams {
        match self {
            ModeKind::Cornell => ModeParams::Cornell(CornellParams::default()),
            ModeKind::Mandelbulb | ModeKind::QuaternionJulia | ModeKind::Mandelbox => {
                ModeParams::Fractal(FractalParams::for_kind(self))
            }
            ModeKind::Terrain => ModeParams::Terrain(TerrainParams::default()),
            ModeKind::Mesh => ModeParams::Mesh(MeshParams::default()),
        }
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModeKind {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ModeKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| RenderError::UnknownMode(s.to_string()))
    }
}

fn check(ok: bool, name: &'static str, reason: &str) -> RenderResult<()> {
    if ok {
        Ok(())
    } else {
        Err(RenderError::parameter(name, reason))
    }
}

fn check_color(color: Color, name: &'static str) -> RenderResult<()> {
    check(
        color.is_finite() && color.min_element() >= 0.0,
        name,
        "components must be finite and non-negative",
    )
}

fn check_exposure(exposure: f32) -> RenderResult<()> {
    check(exposure.is_finite() && exposure > 0.0, "exposure", "must be positive")
}

fn check_sun(sun: &SunPath) -> RenderResult<()> {
    check(
        (-90.0..=90.0).contains(&sun.elevation),
        "sun_elevation",
        "must be within [-90, 90] degrees",
    )?;
    check(sun.azimuth.is_finite(), "sun_azimuth", "must be finite")?;
    check(sun.speed.is_finite(), "sun_speed", "must be finite")?;
    check(
        sun.intensity.is_finite() && sun.intensity >= 0.0,
        "sun_intensity",
        "must be non-negative",
    )
}

/// Cornell box parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CornellParams {
    pub light_color: Color,
    pub light_intensity: f32,
    /// Degrees the boxes are turned about Y, in opposite directions
    pub box_rotation: f32,
    pub glass_sphere: bool,
    pub sphere_ior: f32,
    /// Scattering coefficient of the room fog; 0 disables it
    pub fog_density: f32,
    pub fog_anisotropy: f32,
    pub exposure: f32,
}

impl Default for CornellParams {
    fn default() -> Self {
        Self {
            light_color: Color::new(1.0, 0.85, 0.6),
            light_intensity: 15.0,
            box_rotation: 18.0,
            glass_sphere: false,
            sphere_ior: 1.5,
            fog_density: 0.0,
            fog_anisotropy: 0.3,
            exposure: 1.0,
        }
    }
}

impl CornellParams {
    pub fn validate(&self) -> RenderResult<()> {
        check_color(self.light_color, "light_color")?;
        check(
            self.light_intensity.is_finite() && self.light_intensity >= 0.0,
            "light_intensity",
            "must be non-negative",
        )?;
        check(self.box_rotation.is_finite(), "box_rotation", "must be finite")?;
        check(
            self.sphere_ior.is_finite() && self.sphere_ior >= 1.0,
            "sphere_ior",
            "must be at least 1",
        )?;
        check(
            self.fog_density.is_finite() && self.fog_density >= 0.0,
            "fog_density",
            "must be non-negative",
        )?;
        check(
            self.fog_anisotropy > -1.0 && self.fog_anisotropy < 1.0,
            "fog_anisotropy",
            "must be in (-1, 1)",
        )?;
        check_exposure(self.exposure)
    }
}

/// Parameters shared by the three fractal modes. Each mode reads the
/// fields that drive its own estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FractalParams {
    /// Mandelbulb exponent
    pub power: f32,
    /// Quaternion Julia constant
    pub julia_c: Vec4,
    /// Mandelbox fold scale
    pub box_scale: f32,
    pub iterations: u32,
    pub offset: Vec3,
    pub albedo: Color,
    pub animate: bool,
    pub drift_amplitude: f32,
    /// Radians per second
    pub drift_speed: f32,
    pub sun: SunPath,
    pub march: MarchSettings,
    pub exposure: f32,
}

impl FractalParams {
    pub fn for_kind(kind: ModeKind) -> Self {
        let base = Self {
            power: 8.0,
            julia_c: Vec4::new(-0.2, 0.6, 0.2, 0.0),
            box_scale: -1.5,
            iterations: 10,
            offset: Vec3::ZERO,
            albedo: Color::new(0.8, 0.62, 0.45),
            animate: true,
            drift_amplitude: 1.0,
            drift_speed: 0.3,
            sun: SunPath {
                elevation: 40.0,
                azimuth: 35.0,
                speed: 0.0,
                intensity: 3.0,
            },
            march: MarchSettings::default(),
            exposure: 1.0,
        };

        match kind {
            ModeKind::QuaternionJulia => Self {
                iterations: 12,
                albedo: Color::new(0.55, 0.65, 0.85),
                drift_amplitude: 0.1,
                drift_speed: 0.4,
                ..base
            },
            ModeKind::Mandelbox => Self {
                iterations: 12,
                albedo: Color::new(0.75, 0.75, 0.72),
                drift_amplitude: 0.2,
                drift_speed: 0.25,
                march: MarchSettings {
                    min_distance: 2e-3,
                    ..MarchSettings::default()
                },
                ..base
            },
            _ => base,
        }
    }

    pub fn validate(&self) -> RenderResult<()> {
        check(
            (1..=64).contains(&self.iterations),
            "iterations",
            "must be within [1, 64]",
        )?;
        check(
            self.power.is_finite() && self.power >= 2.0,
            "power",
            "must be at least 2",
        )?;
        check(self.julia_c.is_finite(), "julia_c", "must be finite")?;
        check(
            self.box_scale.is_finite() && self.box_scale.abs() >= 1e-3,
            "box_scale",
            "must be finite and non-zero",
        )?;
        check(self.offset.is_finite(), "offset", "must be finite")?;
        check_color(self.albedo, "albedo")?;
        check(
            self.drift_amplitude.is_finite() && self.drift_speed.is_finite(),
            "drift",
            "amplitude and speed must be finite",
        )?;
        check_sun(&self.sun)?;
        self.march.validate()?;
        check_exposure(self.exposure)
    }

    fn field(&self, kind: ModeKind) -> DistanceField {
        match kind {
            ModeKind::QuaternionJulia => DistanceField::QuaternionJulia {
                c: self.julia_c,
                iterations: self.iterations,
            },
            ModeKind::Mandelbox => DistanceField::Mandelbox {
                scale: self.box_scale,
                iterations: self.iterations,
            },
            _ => DistanceField::Mandelbulb {
                power: self.power,
                iterations: self.iterations,
            },
        }
    }
}

impl Default for FractalParams {
    fn default() -> Self {
        Self::for_kind(ModeKind::Mandelbulb)
    }
}

/// Noise terrain with a water plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TerrainParams {
    pub height_scale: f32,
    pub frequency: f32,
    pub octaves: u32,
    pub water_level: f32,
    pub wave_amplitude: f32,
    /// Moves the sun and the waves with time
    pub animate: bool,
    pub sun: SunPath,
    pub march: MarchSettings,
    pub exposure: f32,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            height_scale: 1.2,
            frequency: 0.15,
            octaves: 5,
            water_level: 0.35,
            wave_amplitude: 0.004,
            animate: true,
            sun: SunPath {
                elevation: 25.0,
                azimuth: 30.0,
                speed: 3.0,
                intensity: 3.0,
            },
            march: MarchSettings {
                min_distance: 2e-3,
                step_scale: 0.6,
                max_distance: 60.0,
                ..MarchSettings::default()
            },
            exposure: 1.0,
        }
    }
}

impl TerrainParams {
    pub fn validate(&self) -> RenderResult<()> {
        check(
            self.height_scale.is_finite() && self.height_scale > 0.0,
            "height_scale",
            "must be positive",
        )?;
        check(
            self.frequency.is_finite() && self.frequency > 0.0,
            "frequency",
            "must be positive",
        )?;
        check((1..=12).contains(&self.octaves), "octaves", "must be within [1, 12]")?;
        check(self.water_level.is_finite(), "water_level", "must be finite")?;
        check(
            self.wave_amplitude.is_finite() && self.wave_amplitude >= 0.0,
            "wave_amplitude",
            "must be non-negative",
        )?;
        check_sun(&self.sun)?;
        self.march.validate()?;
        check_exposure(self.exposure)
    }
}

/// Imported triangle mesh under a sun.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeshParams {
    pub albedo: Color,
    pub sun: SunPath,
    pub strategy: BvhStrategy,
    /// Largest side of the normalised mesh bounds
    pub target_extent: f32,
    pub exposure: f32,
}

impl Default for MeshParams {
    fn default() -> Self {
        Self {
            albedo: Color::splat(0.7),
            sun: SunPath {
                elevation: 50.0,
                azimuth: 40.0,
                speed: 0.0,
                intensity: 3.0,
            },
            strategy: BvhStrategy::default(),
            target_extent: 2.0,
            exposure: 1.0,
        }
    }
}

impl MeshParams {
    pub fn validate(&self) -> RenderResult<()> {
        check_color(self.albedo, "albedo")?;
        check_sun(&self.sun)?;
        check(
            self.target_extent.is_finite() && self.target_extent > 0.0,
            "target_extent",
            "must be positive",
        )?;
        check_exposure(self.exposure)
    }
}

/// Parameters of the active mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeParams {
    Cornell(CornellParams),
    Fractal(FractalParams),
    Terrain(TerrainParams),
    Mesh(MeshParams),
}

impl ModeParams {
    pub fn name(&self) -> &'static str {
        match self {
            ModeParams::Cornell(_) => "cornell",
            ModeParams::Fractal(_) => "fractal",
            ModeParams::Terrain(_) => "terrain",
            ModeParams::Mesh(_) => "mesh",
        }
    }

    pub fn exposure(&self) -> f32 {
        match self {
            ModeParams::Cornell(p) => p.exposure,
            ModeParams::Fractal(p) => p.exposure,
            ModeParams::Terrain(p) => p.exposure,
            ModeParams::Mesh(p) => p.exposure,
        }
    }

    pub fn validate(&self) -> RenderResult<()> {
        match self {
            ModeParams::Cornell(p) => p.validate(),
            ModeParams::Fractal(p) => p.validate(),
            ModeParams::Terrain(p) => p.validate(),
            ModeParams::Mesh(p) => p.validate(),
        }
    }

    /// True if these parameters can drive `kind`.
    pub fn fits(&self, kind: ModeKind) -> bool {
        matches!(
            (self, kind),
            (ModeParams::Cornell(_), ModeKind::Cornell)
                | (
                    ModeParams::Fractal(_),
                    ModeKind::Mandelbulb | ModeKind::QuaternionJulia | ModeKind::Mandelbox
                )
                | (ModeParams::Terrain(_), ModeKind::Terrain)
                | (ModeParams::Mesh(_), ModeKind::Mesh)
        )
    }

    /// Merge `patch` into these parameters.
    ///
    /// The merged set is validated before it replaces the current one, so a
    /// rejected patch leaves the parameters untouched. Returns true if the
    /// scene itself changed; exposure alone only affects presentation.
    pub fn apply(&mut self, patch: &ParameterPatch) -> RenderResult<bool> {
        let mut next = *self;
        let scene_changed = match (&mut next, patch) {
            (ModeParams::Cornell(p), ParameterPatch::Cornell(patch)) => patch.merge_into(p),
            (ModeParams::Fractal(p), ParameterPatch::Fractal(patch)) => patch.merge_into(p),
            (ModeParams::Terrain(p), ParameterPatch::Terrain(patch)) => patch.merge_into(p),
            (ModeParams::Mesh(p), ParameterPatch::Mesh(patch)) => patch.merge_into(p),
            (active, patch) => {
                return Err(RenderError::ModeMismatch {
                    patch: patch.name(),
                    active: active.name().to_string(),
                })
            }
        };

        next.validate()?;
        *self = next;
        Ok(scene_changed)
    }
}

/// Replace `slot` with `value` if one is given. Returns true on change.
fn merge<T: PartialEq + Copy>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) if *slot != value => {
            *slot = value;
            true
        }
        _ => false,
    }
}

/// Partial update of [`MarchSettings`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarchPatch {
    pub max_steps: Option<u32>,
    pub min_distance: Option<f32>,
    pub step_scale: Option<f32>,
    pub max_distance: Option<f32>,
    pub refine_steps: Option<u32>,
    pub normal_epsilon: Option<f32>,
}

impl MarchPatch {
    fn merge_into(&self, march: &mut MarchSettings) -> bool {
        let mut changed = merge(&mut march.max_steps, self.max_steps);
        changed |= merge(&mut march.min_distance, self.min_distance);
        changed |= merge(&mut march.step_scale, self.step_scale);
        changed |= merge(&mut march.max_distance, self.max_distance);
        changed |= merge(&mut march.refine_steps, self.refine_steps);
        changed |= merge(&mut march.normal_epsilon, self.normal_epsilon);
        changed
    }
}

/// Partial update of a [`SunPath`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SunPatch {
    pub elevation: Option<f32>,
    pub azimuth: Option<f32>,
    pub speed: Option<f32>,
    pub intensity: Option<f32>,
}

impl SunPatch {
    fn merge_into(&self, sun: &mut SunPath) -> bool {
        let mut changed = merge(&mut sun.elevation, self.elevation);
        changed |= merge(&mut sun.azimuth, self.azimuth);
        changed |= merge(&mut sun.speed, self.speed);
        changed |= merge(&mut sun.intensity, self.intensity);
        changed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CornellPatch {
    pub light_color: Option<Color>,
    pub light_intensity: Option<f32>,
    pub box_rotation: Option<f32>,
    pub glass_sphere: Option<bool>,
    pub sphere_ior: Option<f32>,
    pub fog_density: Option<f32>,
    pub fog_anisotropy: Option<f32>,
    pub exposure: Option<f32>,
}

impl CornellPatch {
    fn merge_into(&self, p: &mut CornellParams) -> bool {
        let mut changed = merge(&mut p.light_color, self.light_color);
        changed |= merge(&mut p.light_intensity, self.light_intensity);
        changed |= merge(&mut p.box_rotation, self.box_rotation);
        changed |= merge(&mut p.glass_sphere, self.glass_sphere);
        changed |= merge(&mut p.sphere_ior, self.sphere_ior);
        changed |= merge(&mut p.fog_density, self.fog_density);
        changed |= merge(&mut p.fog_anisotropy, self.fog_anisotropy);
        merge(&mut p.exposure, self.exposure);
        changed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FractalPatch {
    pub power: Option<f32>,
    pub julia_c: Option<Vec4>,
    pub box_scale: Option<f32>,
    pub iterations: Option<u32>,
    pub offset: Option<Vec3>,
    pub albedo: Option<Color>,
    pub animate: Option<bool>,
    pub drift_amplitude: Option<f32>,
    pub drift_speed: Option<f32>,
    pub sun: SunPatch,
    pub march: MarchPatch,
    pub exposure: Option<f32>,
}

impl FractalPatch {
    fn merge_into(&self, p: &mut FractalParams) -> bool {
        let mut changed = merge(&mut p.power, self.power);
        changed |= merge(&mut p.julia_c, self.julia_c);
        changed |= merge(&mut p.box_scale, self.box_scale);
        changed |= merge(&mut p.iterations, self.iterations);
        changed |= merge(&mut p.offset, self.offset);
        changed |= merge(&mut p.albedo, self.albedo);
        changed |= merge(&mut p.animate, self.animate);
        changed |= merge(&mut p.drift_amplitude, self.drift_amplitude);
        changed |= merge(&mut p.drift_speed, self.drift_speed);
        changed |= self.sun.merge_into(&mut p.sun);
        changed |= self.march.merge_into(&mut p.march);
        merge(&mut p.exposure, self.exposure);
        changed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TerrainPatch {
    pub height_scale: Option<f32>,
    pub frequency: Option<f32>,
    pub octaves: Option<u32>,
    pub water_level: Option<f32>,
    pub wave_amplitude: Option<f32>,
    pub animate: Option<bool>,
    pub sun: SunPatch,
    pub march: MarchPatch,
    pub exposure: Option<f32>,
}

impl TerrainPatch {
    fn merge_into(&self, p: &mut TerrainParams) -> bool {
        let mut changed = merge(&mut p.height_scale, self.height_scale);
        changed |= merge(&mut p.frequency, self.frequency);
        changed |= merge(&mut p.octaves, self.octaves);
        changed |= merge(&mut p.water_level, self.water_level);
        changed |= merge(&mut p.wave_amplitude, self.wave_amplitude);
        changed |= merge(&mut p.animate, self.animate);
        changed |= self.sun.merge_into(&mut p.sun);
        changed |= self.march.merge_into(&mut p.march);
        merge(&mut p.exposure, self.exposure);
        changed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeshPatch {
    pub albedo: Option<Color>,
    pub sun: SunPatch,
    pub strategy: Option<BvhStrategy>,
    pub target_extent: Option<f32>,
    pub exposure: Option<f32>,
}

impl MeshPatch {
    fn merge_into(&self, p: &mut MeshParams) -> bool {
        let mut changed = merge(&mut p.albedo, self.albedo);
        changed |= self.sun.merge_into(&mut p.sun);
        changed |= merge(&mut p.strategy, self.strategy);
        changed |= merge(&mut p.target_extent, self.target_extent);
        merge(&mut p.exposure, self.exposure);
        changed
    }

    /// True if the patch requires the BVH to be rebuilt.
    pub fn rebuilds_bvh(&self) -> bool {
        self.strategy.is_some() || self.target_extent.is_some()
    }
}

/// Partial parameter update, one variant per parameter family.
///
/// In JSON it is externally tagged: `{"cornell": {"fog_density": 0.2}}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterPatch {
    Cornell(CornellPatch),
    Fractal(FractalPatch),
    Terrain(TerrainPatch),
    Mesh(MeshPatch),
}

impl ParameterPatch {
    pub fn name(&self) -> &'static str {
        match self {
            ParameterPatch::Cornell(_) => "cornell",
            ParameterPatch::Fractal(_) => "fractal",
            ParameterPatch::Terrain(_) => "terrain",
            ParameterPatch::Mesh(_) => "mesh",
        }
    }
}

/// Shared inputs that outlive a single backend.
#[derive(Debug, Clone, Default)]
pub struct SceneAssets {
    /// Height noise for terrain; a seeded default is generated if absent
    pub height_noise: Option<Arc<NoiseTexture>>,
    /// Finished hierarchy of the loaded mesh
    pub mesh: Option<Arc<Bvh>>,
}

/// Backend constructor of a mode.
pub type BackendBuilder = fn(ModeKind, &ModeParams, &SceneAssets) -> RenderResult<ActiveBackend>;

/// A registered mode.
#[derive(Debug, Clone)]
pub struct ModeEntry {
    pub kind: ModeKind,
    pub defaults: ModeParams,
    pub build: BackendBuilder,
}

/// Maps every mode to its backend constructor and default parameters.
#[derive(Debug, Clone)]
pub struct ModeRegistry {
    entries: Vec<ModeEntry>,
}

impl ModeRegistry {
    /// Registry without any modes.
    pub fn empty() -> Self {
        Self { entries: Vec::new() }
    }

    /// Registry with every built-in mode.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for kind in ModeKind::ALL {
            let build: BackendBuilder = match kind {
                ModeKind::Cornell => build_cornell,
                ModeKind::Mandelbulb | ModeKind::QuaternionJulia | ModeKind::Mandelbox => {
                    build_fractal
                }
                ModeKind::Terrain => build_terrain,
                ModeKind::Mesh => build_mesh,
            };
            registry.register(ModeEntry {
                kind,
                defaults: kind.default_params(),
                build,
            });
        }
        registry
    }

    /// Add a mode, replacing any previous entry of the same kind.
    pub fn register(&mut self, entry: ModeEntry) {
        match self.entries.iter_mut().find(|e| e.kind == entry.kind) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn get(&self, kind: ModeKind) -> Option<&ModeEntry> {
        self.entries.iter().find(|e| e.kind == kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ModeKind> + '_ {
        self.entries.iter().map(|e| e.kind)
    }

    pub fn defaults(&self, kind: ModeKind) -> RenderResult<ModeParams> {
        self.get(kind)
            .map(|e| e.defaults)
            .ok_or_else(|| RenderError::UnknownMode(kind.to_string()))
    }

    /// Build the backend of `kind` from `params`.
    pub fn build(
        &self,
        kind: ModeKind,
        params: &ModeParams,
        assets: &SceneAssets,
    ) -> RenderResult<ActiveBackend> {
        let entry = self
            .get(kind)
            .ok_or_else(|| RenderError::UnknownMode(kind.to_string()))?;
        if !params.fits(kind) {
            return Err(RenderError::ModeMismatch {
                patch: params.name(),
                active: kind.to_string(),
            });
        }
        params.validate()?;
        (entry.build)(kind, params, assets)
    }

    /// Camera that frames the scene of `kind`.
    pub fn default_camera(kind: ModeKind, aspect: f32) -> CameraState {
        let (position, target, vfov) = match kind {
            ModeKind::Cornell => (Vec3::new(0.0, 1.0, 3.4), Vec3::new(0.0, 1.0, 0.0), 40.0),
            ModeKind::Mandelbulb => (Vec3::new(0.0, 0.4, 2.8), Vec3::ZERO, 45.0),
            ModeKind::QuaternionJulia => (Vec3::new(0.0, 0.0, 3.2), Vec3::ZERO, 45.0),
            ModeKind::Mandelbox => (Vec3::new(0.0, 2.0, 9.0), Vec3::ZERO, 50.0),
            ModeKind::Terrain => (Vec3::new(0.0, 2.2, 6.0), Vec3::new(0.0, 0.6, 0.0), 50.0),
            ModeKind::Mesh => (Vec3::new(0.0, 0.6, 3.5), Vec3::ZERO, 40.0),
        };
        CameraState::look_at(position, target, Vec3::Y, vfov, aspect)
    }
}

impl Default for ModeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn mismatch(kind: ModeKind, params: &ModeParams) -> RenderError {
    RenderError::ModeMismatch {
        patch: params.name(),
        active: kind.to_string(),
    }
}

fn build_cornell(kind: ModeKind, params: &ModeParams, _: &SceneAssets) -> RenderResult<ActiveBackend> {
    let ModeParams::Cornell(p) = params else {
        return Err(mismatch(kind, params));
    };
    Ok(ActiveBackend::Analytic(AnalyticScene::cornell_box(p)))
}

fn build_fractal(kind: ModeKind, params: &ModeParams, _: &SceneAssets) -> RenderResult<ActiveBackend> {
    let ModeParams::Fractal(p) = params else {
        return Err(mismatch(kind, params));
    };
    let drift = p.animate.then_some(Drift {
        amplitude: p.drift_amplitude,
        speed: p.drift_speed,
    });
    let scene = RayMarchScene::new(p.field(kind), p.march, p.albedo, p.sun, Sky::dusk())
        .with_offset(p.offset)
        .with_animation(drift);
    Ok(ActiveBackend::RayMarched(scene))
}

fn build_terrain(kind: ModeKind, params: &ModeParams, assets: &SceneAssets) -> RenderResult<ActiveBackend> {
    let ModeParams::Terrain(p) = params else {
        return Err(mismatch(kind, params));
    };
    let noise = assets
        .height_noise
        .clone()
        .unwrap_or_else(|| Arc::new(default_height_noise()));
    let field = DistanceField::Terrain(TerrainField {
        noise,
        height_scale: p.height_scale,
        frequency: p.frequency,
        octaves: p.octaves,
        water_level: p.water_level,
        wave_amplitude: p.wave_amplitude,
        wave_time: 0.0,
    });
    // Only the wave clock and the sun move; the field itself does not drift
    let animation = p.animate.then_some(Drift {
        amplitude: 0.0,
        speed: 1.0,
    });
    let scene = RayMarchScene::new(field, p.march, Color::ONE, p.sun, Sky::daylight())
        .with_animation(animation);
    Ok(ActiveBackend::RayMarched(scene))
}

fn build_mesh(kind: ModeKind, params: &ModeParams, assets: &SceneAssets) -> RenderResult<ActiveBackend> {
    let ModeParams::Mesh(p) = params else {
        return Err(mismatch(kind, params));
    };
    let scene = MeshScene::new(
        assets.mesh.clone(),
        Material::diffuse(p.albedo),
        p.sun.light(0.0),
        Sky::daylight(),
    );
    Ok(ActiveBackend::Mesh(scene))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SceneBackend;

    #[test]
    fn test_mode_names_parse() {
        for kind in ModeKind::ALL {
            assert_eq!(kind.name().parse::<ModeKind>().unwrap(), kind);
        }
        assert_eq!("Quaternion-Julia".parse::<ModeKind>().unwrap(), ModeKind::QuaternionJulia);
        assert!(matches!(
            "plasma".parse::<ModeKind>(),
            Err(RenderError::UnknownMode(name)) if name == "plasma"
        ));
    }

    #[test]
    fn test_exposure_is_presentation_only() {
        let mut params = ModeKind::Cornell.default_params();

        let exposure = ParameterPatch::Cornell(CornellPatch {
            exposure: Some(2.0),
            ..Default::default()
        });
        assert!(!params.apply(&exposure).unwrap());
        assert_eq!(params.exposure(), 2.0);

        let light = ParameterPatch::Cornell(CornellPatch {
            light_intensity: Some(30.0),
            ..Default::default()
        });
        assert!(params.apply(&light).unwrap());
        match params {
            ModeParams::Cornell(p) => assert_eq!(p.light_intensity, 30.0),
            other => panic!("unexpected params {other:?}"),
        }

        // Re-applying the same value changes nothing
        assert!(!params.apply(&light).unwrap());
    }

    #[test]
    fn test_invalid_patch_leaves_params_untouched() {
        let mut params = ModeKind::Cornell.default_params();
        let before = params;

        let patch = ParameterPatch::Cornell(CornellPatch {
            fog_density: Some(0.4),
            sphere_ior: Some(0.5),
            ..Default::default()
        });
        assert!(matches!(
            params.apply(&patch),
            Err(RenderError::InvalidParameter { name: "sphere_ior", .. })
        ));
        assert_eq!(params, before);
    }

    #[test]
    fn test_patch_for_other_mode_is_rejected() {
        let mut params = ModeKind::Terrain.default_params();
        let patch = ParameterPatch::Fractal(FractalPatch {
            power: Some(6.0),
            ..Default::default()
        });
        assert!(matches!(
            params.apply(&patch),
            Err(RenderError::ModeMismatch { patch: "fractal", .. })
        ));
    }

    #[test]
    fn test_nested_march_patch() {
        let mut params = ModeKind::Mandelbulb.default_params();
        let patch = ParameterPatch::Fractal(FractalPatch {
            march: MarchPatch {
                max_steps: Some(64),
                ..Default::default()
            },
            ..Default::default()
        });
        assert!(params.apply(&patch).unwrap());
        match params {
            ModeParams::Fractal(p) => {
                assert_eq!(p.march.max_steps, 64);
                assert_eq!(p.march.step_scale, MarchSettings::default().step_scale);
            }
            other => panic!("unexpected params {other:?}"),
        }
    }

    #[test]
    fn test_patch_from_json() {
        let patch: ParameterPatch =
            serde_json::from_str(r#"{"cornell": {"fog_density": 0.3, "glass_sphere": true}}"#).unwrap();
        let ParameterPatch::Cornell(cornell) = patch else {
            panic!("wrong variant");
        };
        assert_eq!(cornell.fog_density, Some(0.3));
        assert_eq!(cornell.glass_sphere, Some(true));
        assert_eq!(cornell.light_intensity, None);

        let typo = serde_json::from_str::<ParameterPatch>(r#"{"cornell": {"fog": 0.3}}"#);
        assert!(typo.is_err());
    }

    #[test]
    fn test_registry_builds_every_mode() {
        let registry = ModeRegistry::builtin();
        let assets = SceneAssets::default();

        for kind in ModeKind::ALL {
            let params = registry.defaults(kind).unwrap();
            let backend = registry.build(kind, &params, &assets).unwrap();
            assert_eq!(backend.kind(), kind.backend_kind(), "{kind}");
            assert!(!backend.lights().is_empty(), "{kind}");
        }

        let mesh = registry
            .build(ModeKind::Mesh, &ModeKind::Mesh.default_params(), &assets)
            .unwrap();
        assert!(mesh.describe().contains("no geometry"));
    }

    #[test]
    fn test_registry_rejects_mismatched_params() {
        let registry = ModeRegistry::builtin();
        let params = ModeKind::Cornell.default_params();
        assert!(matches!(
            registry.build(ModeKind::Terrain, &params, &SceneAssets::default()),
            Err(RenderError::ModeMismatch { .. })
        ));
        assert!(matches!(
            ModeRegistry::empty().build(ModeKind::Cornell, &params, &SceneAssets::default()),
            Err(RenderError::UnknownMode(_))
        ));
    }

    #[test]
    fn test_register_replaces_entry() {
        let mut registry = ModeRegistry::builtin();
        let defaults = CornellParams {
            glass_sphere: true,
            ..CornellParams::default()
        };
        registry.register(ModeEntry {
            kind: ModeKind::Cornell,
            defaults: ModeParams::Cornell(defaults),
            build: build_cornell,
        });

        assert_eq!(registry.kinds().count(), ModeKind::ALL.len());
        assert_eq!(
            registry.defaults(ModeKind::Cornell).unwrap(),
            ModeParams::Cornell(defaults)
        );
    }

    #[test]
    fn test_animation_follows_params() {
        let registry = ModeRegistry::builtin();
        let mut params = FractalParams::for_kind(ModeKind::Mandelbox);
        let animated = registry
            .build(ModeKind::Mandelbox, &ModeParams::Fractal(params), &SceneAssets::default())
            .unwrap();
        assert!(animated.is_dynamic());

        params.animate = false;
        let still = registry
            .build(ModeKind::Mandelbox, &ModeParams::Fractal(params), &SceneAssets::default())
            .unwrap();
        assert!(!still.is_dynamic());
        assert!(!registry
            .build(ModeKind::Cornell, &ModeKind::Cornell.default_params(), &SceneAssets::default())
            .unwrap()
            .is_dynamic());
    }
}
