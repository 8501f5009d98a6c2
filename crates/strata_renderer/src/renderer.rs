//! Renderer orchestrator.
//!
//! Ties the active scene backend, the path tracer, accumulation and the
//! adaptive quality controller together, one synchronous frame at a time:
//! camera update, render, accumulate, present.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rayon::prelude::*;
use strata_core::{Mesh, NoiseTexture};
use strata_math::Vec2;

use crate::accumulation::Accumulator;
use crate::backend::{ActiveBackend, SceneBackend};
use crate::bvh::{Bvh, BvhStrategy};
use crate::camera::CameraState;
use crate::distance::default_height_noise;
use crate::error::{RenderError, RenderResult};
use crate::film::{color_to_rgba, rgba_bytes, ImageBuffer};
use crate::integrator::PathTracer;
use crate::loader::{BuildStatus, MeshBuildTask};
use crate::material::Color;
use crate::modes::{MeshParams, ModeKind, ModeParams, ModeRegistry, ParameterPatch, SceneAssets};
use crate::quality::AdaptiveQuality;
use crate::sampling::{gen_vec2, row_seed};
use crate::settings::{RenderSettings, RendererConfig};

/// Statistics of the last rendered frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub frame_counter: u64,
    /// Frames blended since the last reset; 0 on a reset frame
    pub sample_counter: u32,
    pub is_moving: bool,
    /// Wall-clock time of the frame in seconds
    pub frame_time: f32,
    /// Resolution actually rendered
    pub resolution: (u32, u32),
    pub quality_scale: f32,
    pub mode: ModeKind,
}

/// A presented frame: tone-mapped pixels plus statistics.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[u8; 4]>,
    pub stats: FrameStats,
}

impl Frame {
    /// RGBA8 bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        rgba_bytes(&self.pixels)
    }
}

/// Progressive path tracing renderer.
pub struct Renderer {
    settings: RenderSettings,
    registry: ModeRegistry,
    mode: ModeKind,
    params: ModeParams,
    backend: ActiveBackend,
    assets: SceneAssets,
    mesh_source: Option<Arc<Mesh>>,
    mesh_task: Option<MeshBuildTask>,
    /// Strategy and extent of the latest hierarchy build
    mesh_build: Option<(BvhStrategy, f32)>,
    tracer: PathTracer,
    accumulation: Accumulator,
    quality: AdaptiveQuality,
    blue_noise: Option<Arc<NoiseTexture>>,
    samples: Vec<Color>,
    /// Seconds since the active mode was selected
    elapsed: f32,
    stats: FrameStats,
}

impl Renderer {
    /// Create a renderer with the built-in modes.
    pub fn new(config: RendererConfig) -> RenderResult<Self> {
        Self::with_registry(config, ModeRegistry::builtin())
    }

    /// Create a renderer over a custom mode registry.
    pub fn with_registry(config: RendererConfig, registry: ModeRegistry) -> RenderResult<Self> {
        config.validate()?;

        let assets = SceneAssets {
            height_noise: Some(Arc::new(default_height_noise())),
            mesh: None,
        };
        let mode = config.initial_mode;
        let params = registry.defaults(mode)?;
        let backend = registry.build(mode, &params, &assets)?;

        let settings = config.settings;
        let (width, height) = settings.scaled_resolution(1.0);
        info!("Renderer {}x{} in mode {}: {}", width, height, mode, backend.describe());

        Ok(Self {
            settings,
            registry,
            mode,
            params,
            backend,
            assets,
            mesh_source: None,
            mesh_task: None,
            mesh_build: None,
            tracer: PathTracer::new(&settings),
            accumulation: Accumulator::new(width, height),
            quality: AdaptiveQuality::new(config.quality),
            blue_noise: None,
            samples: vec![Color::ZERO; width as usize * height as usize],
            elapsed: 0.0,
            stats: FrameStats {
                frame_counter: 0,
                sample_counter: 0,
                is_moving: true,
                frame_time: 0.0,
                resolution: (width, height),
                quality_scale: 1.0,
                mode,
            },
        })
    }

    pub fn active_mode(&self) -> ModeKind {
        self.mode
    }

    pub fn params(&self) -> &ModeParams {
        &self.params
    }

    pub fn backend(&self) -> &ActiveBackend {
        &self.backend
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn registry(&self) -> &ModeRegistry {
        &self.registry
    }

    /// Statistics of the last frame.
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Accumulated linear image, before tone mapping.
    pub fn accumulated(&self) -> ImageBuffer {
        self.accumulation.to_image_buffer()
    }

    /// Camera that frames the active mode at the nominal aspect ratio.
    pub fn default_camera(&self) -> CameraState {
        ModeRegistry::default_camera(self.mode, self.settings.aspect())
    }

    /// Switch to `kind` with its default parameters.
    pub fn select_mode(&mut self, kind: ModeKind) -> RenderResult<()> {
        let params = self.registry.defaults(kind)?;
        let backend = self.registry.build(kind, &params, &self.assets)?;

        info!("Mode {} -> {}: {}", self.mode, kind, backend.describe());
        self.mode = kind;
        self.params = params;
        self.backend = backend;
        self.elapsed = 0.0;
        self.accumulation.force_reset();

        // Defaults may disagree with a hierarchy built under patched parameters
        if let (ModeParams::Mesh(p), Some(mesh)) = (params, self.mesh_source.clone()) {
            if self.mesh_build != Some((p.strategy, p.target_extent)) {
                self.start_mesh_build(mesh);
            }
        }
        Ok(())
    }

    pub fn select_mode_by_name(&mut self, name: &str) -> RenderResult<()> {
        self.select_mode(name.parse()?)
    }

    /// Merge a partial update into the active mode's parameters.
    ///
    /// The backend is rebuilt and accumulation restarts only if the scene
    /// changed. Returns whether it did.
    pub fn set_parameters(&mut self, patch: &ParameterPatch) -> RenderResult<bool> {
        let mut params = self.params;
        let scene_changed = params.apply(patch)?;

        if scene_changed {
            let mut backend = self.registry.build(self.mode, &params, &self.assets)?;
            backend.advance(self.elapsed);
            self.backend = backend;
            self.accumulation.force_reset();
            debug!("Parameters changed, rebuilt {}", self.backend.describe());
        }
        self.params = params;

        if let ParameterPatch::Mesh(mesh_patch) = patch {
            if scene_changed && mesh_patch.rebuilds_bvh() {
                if let Some(mesh) = self.mesh_source.clone() {
                    self.start_mesh_build(mesh);
                }
            }
        }
        Ok(scene_changed)
    }

    /// Replace the render settings.
    pub fn set_settings(&mut self, settings: RenderSettings) -> RenderResult<()> {
        settings.validate()?;
        self.settings = settings;
        self.tracer = PathTracer::new(&settings);
        self.quality.reset();
        self.accumulation.force_reset();
        self.sync_resolution(1.0);
        Ok(())
    }

    /// Change the nominal resolution.
    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        self.set_settings(RenderSettings {
            width,
            height,
            ..self.settings
        })
    }

    /// Blue-noise texture used for pixel jitter; `None` falls back to white
    /// noise.
    pub fn set_blue_noise(&mut self, noise: Option<NoiseTexture>) {
        self.blue_noise = noise.map(Arc::new);
        self.accumulation.force_reset();
    }

    /// Height noise for the terrain mode.
    pub fn set_height_noise(&mut self, noise: NoiseTexture) -> RenderResult<()> {
        self.assets.height_noise = Some(Arc::new(noise));
        if self.mode == ModeKind::Terrain {
            self.rebuild_backend()?;
        }
        Ok(())
    }

    /// Start building the hierarchy of `mesh` in the background. The mesh
    /// mode shows it once the build finishes.
    pub fn load_mesh(&mut self, mesh: Mesh) {
        let mesh = Arc::new(mesh);
        self.mesh_source = Some(Arc::clone(&mesh));
        self.start_mesh_build(mesh);
    }

    /// Build the hierarchy of `mesh` on the calling thread's behalf and
    /// install it before returning.
    pub fn load_mesh_blocking(&mut self, mesh: Mesh) -> bool {
        self.load_mesh(mesh);
        let Some(task) = self.mesh_task.take() else {
            return false;
        };
        match task.wait() {
            BuildStatus::Finished(bvh) => {
                self.install_bvh(bvh);
                true
            }
            _ => false,
        }
    }

    /// Abandon a running mesh build. The current geometry stays.
    pub fn cancel_mesh_load(&mut self) {
        if let Some(task) = self.mesh_task.take() {
            task.cancel();
            warn!("Cancelled BVH build of {} triangles", task.triangle_count());
        }
    }

    pub fn is_loading_mesh(&self) -> bool {
        self.mesh_task.is_some()
    }

    /// Render one frame with `camera`, `delta_time` seconds after the last.
    pub fn render_frame(&mut self, camera: &CameraState, delta_time: f32) -> RenderResult<Frame> {
        let start = Instant::now();
        camera.validate()?;
        if !(delta_time.is_finite() && delta_time >= 0.0) {
            return Err(RenderError::parameter("delta_time", "must be finite and non-negative"));
        }

        self.poll_mesh_task();

        self.elapsed += delta_time;
        let dynamic = self.backend.is_dynamic();
        if dynamic {
            self.backend.advance(self.elapsed);
        }

        // Reduced resolution only while the image restarts anyway; a still
        // view converges at full resolution
        let restarting = self.accumulation.needs_restart(camera, dynamic);
        let scale = if restarting { self.quality.scale() } else { 1.0 };
        self.sync_resolution(scale);
        let (width, height) = (self.accumulation.width(), self.accumulation.height());

        let is_moving = self.accumulation.begin_frame(camera, dynamic);
        let frame = self.accumulation.stats().frame_counter;
        self.trace_samples(camera, frame);
        self.accumulation.blend(&self.samples);
        self.accumulation.finish_frame();

        let tone = self.settings.tone_mapping;
        let exposure = self.params.exposure();
        let pixels: Vec<[u8; 4]> = self
            .accumulation
            .image()
            .par_iter()
            .map(|&c| color_to_rgba(c, tone, exposure))
            .collect();

        let frame_time = start.elapsed().as_secs_f32();
        // Takes effect on the next moving frame
        if is_moving {
            self.quality.update(frame_time);
        }

        let accumulation = self.accumulation.stats();
        self.stats = FrameStats {
            frame_counter: accumulation.frame_counter,
            sample_counter: accumulation.sample_counter,
            is_moving: accumulation.is_moving,
            frame_time,
            resolution: (width, height),
            quality_scale: scale,
            mode: self.mode,
        };

        Ok(Frame {
            width,
            height,
            pixels,
            stats: self.stats,
        })
    }

    /// One radiance sample per pixel into `self.samples`.
    fn trace_samples(&mut self, camera: &CameraState, frame: u64) {
        let width = self.accumulation.width();
        let height = self.accumulation.height();
        let frame_seed = self.settings.seed.wrapping_add(frame);

        // One shift per frame keeps the blue-noise pattern intact
        let mut frame_rng = SmallRng::seed_from_u64(row_seed(frame_seed, u32::MAX));
        let shift = gen_vec2(&mut frame_rng);

        let backend = &self.backend;
        let tracer = self.tracer;
        let blue_noise = self.blue_noise.as_deref();

        self.samples.resize(width as usize * height as usize, Color::ZERO);
        self.samples
            .par_chunks_mut(width as usize)
            .enumerate()
            .for_each(|(y, row)| {
                let y = y as u32;
                let mut rng = SmallRng::seed_from_u64(row_seed(frame_seed, y));
                for (x, out) in row.iter_mut().enumerate() {
                    let x = x as u32;
                    let jitter = match blue_noise {
                        Some(noise) => blue_noise_jitter(noise, x, y, shift),
                        None => gen_vec2(&mut rng),
                    };
                    let lens = gen_vec2(&mut rng);
                    let ray = camera.generate_ray(x, y, (width, height), jitter, lens);
                    *out = tracer.trace(backend, ray, &mut rng);
                }
            });
    }

    /// Match the accumulation buffers to the nominal resolution times `scale`.
    fn sync_resolution(&mut self, scale: f32) {
        let (width, height) = self.settings.scaled_resolution(scale);
        if (width, height) != (self.accumulation.width(), self.accumulation.height()) {
            self.accumulation.resize(width, height);
            self.samples = vec![Color::ZERO; width as usize * height as usize];
        }
    }

    fn rebuild_backend(&mut self) -> RenderResult<()> {
        let mut backend = self.registry.build(self.mode, &self.params, &self.assets)?;
        backend.advance(self.elapsed);
        self.backend = backend;
        self.accumulation.force_reset();
        Ok(())
    }

    /// Parameters used to build mesh hierarchies.
    fn mesh_params(&self) -> MeshParams {
        if let ModeParams::Mesh(p) = self.params {
            return p;
        }
        match self.registry.defaults(ModeKind::Mesh) {
            Ok(ModeParams::Mesh(p)) => p,
            _ => MeshParams::default(),
        }
    }

    fn start_mesh_build(&mut self, mesh: Arc<Mesh>) {
        self.cancel_mesh_load();
        let params = self.mesh_params();
        self.mesh_build = Some((params.strategy, params.target_extent));
        self.mesh_task = Some(MeshBuildTask::spawn(mesh, params.strategy, params.target_extent));
    }

    fn poll_mesh_task(&mut self) {
        let Some(task) = &self.mesh_task else {
            return;
        };
        match task.poll() {
            BuildStatus::Pending => {}
            BuildStatus::Finished(bvh) => {
                self.mesh_task = None;
                self.install_bvh(bvh);
            }
            BuildStatus::Cancelled => self.mesh_task = None,
        }
    }

    /// Swap in a finished hierarchy.
    fn install_bvh(&mut self, bvh: Arc<Bvh>) {
        info!(
            "Installed mesh BVH: {} triangles, {} nodes",
            bvh.triangles().len(),
            bvh.nodes().len()
        );
        self.assets.mesh = Some(Arc::clone(&bvh));
        if let ActiveBackend::Mesh(scene) = &mut self.backend {
            scene.set_bvh(Some(bvh));
            self.accumulation.force_reset();
        }
    }
}

/// Sub-pixel offset from a blue-noise texture, shifted per frame
/// (Cranley–Patterson rotation).
fn blue_noise_jitter(noise: &NoiseTexture, x: u32, y: u32, shift: Vec2) -> Vec2 {
    let (x, y) = (x as i64, y as i64);
    // Second dimension from a decorrelated offset into the same texture
    let u = Vec2::new(noise.texel(x, y), noise.texel(x + 37, y + 71));
    (u + shift).fract()
}
