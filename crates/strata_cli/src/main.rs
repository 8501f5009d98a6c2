use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use strata_core::{load_obj, NoiseTexture};
use strata_math::Mat4;
use strata_renderer::{ModeKind, ParameterPatch, Renderer, RendererConfig, ToneMapping};

#[derive(Debug, Parser)]
#[command(name = "strata", about = "Render progressive path traced frames to an image")]
struct Args {
    #[arg(short, long, help = "Scene mode (cornell, mandelbulb, quaternion-julia, mandelbox, terrain, mesh)")]
    mode: Option<ModeKind>,

    #[arg(long, help = "Renderer configuration as JSON")]
    config: Option<PathBuf>,
    #[arg(short = 'p', long, help = "Parameter patch as inline JSON, e.g. '{\"cornell\":{\"glass_sphere\":true}}'")]
    params: Option<String>,

    #[arg(long, help = "Output width in pixels")]
    width: Option<u32>,
    #[arg(long, help = "Output height in pixels")]
    height: Option<u32>,
    #[arg(short, long, default_value_t = 64, help = "Frames to accumulate")]
    frames: u32,
    #[arg(long, help = "Orbit the camera around the vertical axis by this many degrees per frame")]
    orbit: Option<f32>,
    #[arg(long, help = "Time step between frames in seconds (animates dynamic scenes)")]
    time_step: Option<f32>,
    #[arg(long, help = "Maximum path depth")]
    max_bounces: Option<u32>,
    #[arg(long, help = "Base random seed")]
    seed: Option<u64>,
    #[arg(long, value_enum, help = "Tone mapping curve")]
    tone_mapping: Option<ToneCurve>,
    #[arg(long, help = "Adaptive resolution scaling while the view moves [default: from --config, else on]")]
    adaptive: Option<bool>,

    #[arg(long, help = "OBJ mesh for the mesh mode")]
    mesh: Option<PathBuf>,
    #[arg(long, help = "Blue-noise texture for pixel jitter")]
    blue_noise: Option<PathBuf>,
    #[arg(long, help = "Grayscale height texture for the terrain mode")]
    height_noise: Option<PathBuf>,

    #[arg(short, long, default_value = "strata.png", help = "Output PNG")]
    output: PathBuf,
    #[arg(long, help = "Print the available modes with their defaults as JSON and exit")]
    list_modes: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ToneCurve {
    Filmic,
    Reinhard,
    Clamp,
}

impl From<ToneCurve> for ToneMapping {
    fn from(curve: ToneCurve) -> Self {
        match curve {
            ToneCurve::Filmic => ToneMapping::Filmic,
            ToneCurve::Reinhard => ToneMapping::Reinhard,
            ToneCurve::Clamp => ToneMapping::Clamp,
        }
    }
}

fn load_config(args: &Args) -> Result<RendererConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => RendererConfig::default(),
    };

    match (args.mode, &args.mesh) {
        (Some(mode), _) => config.initial_mode = mode,
        (None, Some(_)) => config.initial_mode = ModeKind::Mesh,
        (None, None) => {}
    }
    if let Some(width) = args.width {
        config.settings.width = width;
    }
    if let Some(height) = args.height {
        config.settings.height = height;
    }
    if let Some(max_bounces) = args.max_bounces {
        config.settings.max_bounces = max_bounces;
    }
    if let Some(seed) = args.seed {
        config.settings.seed = seed;
    }
    if let Some(curve) = args.tone_mapping {
        config.settings.tone_mapping = curve.into();
    }
    if let Some(enabled) = args.adaptive {
        config.quality.enabled = enabled;
    }
    Ok(config)
}

fn list_modes(renderer: &Renderer) -> Result<()> {
    let registry = renderer.registry();
    let mut modes = serde_json::Map::new();
    for kind in registry.kinds() {
        modes.insert(kind.to_string(), serde_json::to_value(registry.defaults(kind)?)?);
    }
    println!("{}", serde_json::to_string_pretty(&modes)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();
    if args.frames == 0 {
        bail!("--frames must be at least 1");
    }

    let config = load_config(&args)?;
    let mut renderer = Renderer::new(config)?;

    if args.list_modes {
        return list_modes(&renderer);
    }

    if let Some(path) = &args.blue_noise {
        renderer.set_blue_noise(Some(NoiseTexture::from_image(path)?));
    }
    if let Some(path) = &args.height_noise {
        renderer.set_height_noise(NoiseTexture::from_image(path)?)?;
    }
    if let Some(path) = &args.mesh {
        let mesh = load_obj(path)?;
        log::info!("Loaded {} ({} triangles)", path.display(), mesh.triangle_count());
        if !renderer.load_mesh_blocking(mesh) {
            bail!("BVH build for {} did not finish", path.display());
        }
    }
    if let Some(json) = &args.params {
        let patch: ParameterPatch = serde_json::from_str(json).context("parsing --params")?;
        renderer.set_parameters(&patch)?;
    }

    let base = renderer.default_camera();
    let time_step = args.time_step.unwrap_or(0.0);
    let start = Instant::now();

    let mut last = None;
    for i in 0..args.frames {
        let mut camera = base;
        if let Some(degrees) = args.orbit {
            // Every default camera looks at a point on the vertical axis
            camera.transform = Mat4::from_rotation_y((degrees * i as f32).to_radians()) * base.transform;
        }
        last = Some(renderer.render_frame(&camera, time_step)?);
    }
    let Some(frame) = last else {
        bail!("no frame rendered");
    };

    let stats = frame.stats;
    log::info!(
        "Rendered {} frames of {} in {:.2}s ({} accumulated, {}x{})",
        stats.frame_counter,
        stats.mode,
        start.elapsed().as_secs_f32(),
        stats.sample_counter + 1,
        stats.resolution.0,
        stats.resolution.1
    );

    let image = image::RgbaImage::from_raw(frame.width, frame.height, frame.as_bytes().to_vec())
        .context("frame buffer does not match its dimensions")?;
    image
        .save(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    log::info!("Saved {}", args.output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("strata").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_config_file_keeps_adaptive_quality() {
        let path = std::env::temp_dir().join(format!("strata_cli_config_{}.json", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        write!(file, r#"{{"quality": {{"enabled": true}}}}"#).unwrap();
        drop(file);

        let config = load_config(&parse(&["--config", path.to_str().unwrap()])).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(config.quality.enabled);

        let config = load_config(&parse(&["--adaptive", "false"])).unwrap();
        assert!(!config.quality.enabled);
    }

    #[test]
    fn test_tone_mapping_choices() {
        let config = load_config(&parse(&["--tone-mapping", "reinhard"])).unwrap();
        assert_eq!(config.settings.tone_mapping, ToneMapping::Reinhard);

        assert!(Args::try_parse_from(["strata", "--tone-mapping", "sepia"]).is_err());
    }
}
