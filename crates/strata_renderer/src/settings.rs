//! Renderer configuration.
//!
//! Every field has a default, so a partial JSON file is a valid config.

use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};
use crate::film::ToneMapping;
use crate::modes::ModeKind;

/// Output and light transport settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSettings {
    /// Nominal output width in pixels
    pub width: u32,
    /// Nominal output height in pixels
    pub height: u32,
    /// Multiplier on the nominal resolution (e.g. 0.5 renders at half size)
    pub pixel_density: f32,
    /// Maximum number of scattering events per path
    pub max_bounces: u32,
    /// First bounce at which Russian roulette may end a path
    pub rr_start_bounce: u32,
    pub russian_roulette: bool,
    /// Next event estimation towards the scene lights
    pub direct_lighting: bool,
    pub tone_mapping: ToneMapping,
    /// Mixed into every per-row random stream
    pub seed: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            pixel_density: 1.0,
            max_bounces: 8,
            rr_start_bounce: 3,
            russian_roulette: true,
            direct_lighting: true,
            tone_mapping: ToneMapping::Filmic,
            seed: 0,
        }
    }
}

impl RenderSettings {
    pub fn validate(&self) -> RenderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidResolution {
                width: self.width,
                height: self.height,
            });
        }
        if !(self.pixel_density.is_finite() && self.pixel_density > 0.0 && self.pixel_density <= 4.0) {
            return Err(RenderError::InvalidPixelDensity(self.pixel_density));
        }
        if self.max_bounces == 0 {
            return Err(RenderError::parameter("max_bounces", "must be at least 1"));
        }
        Ok(())
    }

    /// Resolution after applying pixel density and a quality scale.
    ///
    /// Never rounds down to zero.
    pub fn scaled_resolution(&self, scale: f32) -> (u32, u32) {
        let factor = self.pixel_density * scale;
        let w = ((self.width as f32 * factor).round() as u32).max(1);
        let h = ((self.height as f32 * factor).round() as u32).max(1);
        (w, h)
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Adaptive quality controller settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualitySettings {
    pub enabled: bool,
    /// Frame time budget in seconds
    pub target_frame_time: f32,
    /// Lowest allowed resolution scale
    pub min_scale: f32,
    /// Scale multiplier applied when a frame is over budget
    pub decrease_factor: f32,
    /// Scale multiplier applied when a frame is comfortably under budget
    pub increase_factor: f32,
    /// Fraction of the budget under which a frame counts as comfortable
    pub restore_threshold: f32,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            target_frame_time: 1.0 / 60.0,
            min_scale: 0.25,
            decrease_factor: 0.85,
            increase_factor: 1.05,
            restore_threshold: 0.8,
        }
    }
}

impl QualitySettings {
    pub fn validate(&self) -> RenderResult<()> {
        if !(self.target_frame_time.is_finite() && self.target_frame_time > 0.0) {
            return Err(RenderError::parameter("target_frame_time", "must be positive"));
        }
        if !(self.min_scale > 0.0 && self.min_scale <= 1.0) {
            return Err(RenderError::parameter("min_scale", "must be in (0, 1]"));
        }
        if !(self.decrease_factor > 0.0 && self.decrease_factor < 1.0) {
            return Err(RenderError::parameter("decrease_factor", "must be in (0, 1)"));
        }
        if !(self.increase_factor.is_finite() && self.increase_factor > 1.0) {
            return Err(RenderError::parameter("increase_factor", "must be above 1"));
        }
        if !(self.restore_threshold > 0.0 && self.restore_threshold < 1.0) {
            return Err(RenderError::parameter("restore_threshold", "must be in (0, 1)"));
        }
        Ok(())
    }
}

/// Everything needed to construct a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    pub settings: RenderSettings,
    pub quality: QualitySettings,
    pub initial_mode: ModeKind,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            settings: RenderSettings::default(),
            quality: QualitySettings::default(),
            initial_mode: ModeKind::Cornell,
        }
    }
}

impl RendererConfig {
    pub fn validate(&self) -> RenderResult<()> {
        self.settings.validate()?;
        self.quality.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(RendererConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_degenerate_resolution() {
        let settings = RenderSettings {
            width: 0,
            ..RenderSettings::default()
        };
        assert_eq!(
            settings.validate(),
            Err(RenderError::InvalidResolution { width: 0, height: 360 })
        );

        let settings = RenderSettings {
            pixel_density: -1.0,
            ..RenderSettings::default()
        };
        assert_eq!(settings.validate(), Err(RenderError::InvalidPixelDensity(-1.0)));
    }

    #[test]
    fn test_scaled_resolution() {
        let settings = RenderSettings {
            width: 200,
            height: 100,
            pixel_density: 0.5,
            ..RenderSettings::default()
        };
        assert_eq!(settings.scaled_resolution(1.0), (100, 50));
        assert_eq!(settings.scaled_resolution(0.5), (50, 25));
        assert_eq!(settings.scaled_resolution(0.0), (1, 1));
    }

    #[test]
    fn test_partial_json_config() {
        let config: RendererConfig = serde_json::from_str(
            r#"{"settings": {"width": 320, "tone_mapping": "reinhard"}, "initial_mode": "terrain"}"#,
        )
        .unwrap();
        assert_eq!(config.settings.width, 320);
        assert_eq!(config.settings.height, RenderSettings::default().height);
        assert_eq!(config.settings.tone_mapping, ToneMapping::Reinhard);
        assert_eq!(config.initial_mode, ModeKind::Terrain);
        assert!(config.quality.enabled);

        assert!(serde_json::from_str::<RendererConfig>(r#"{"setings": {}}"#).is_err());
    }
}
