//! Adaptive resolution scaling driven by measured frame time.

use log::debug;

use crate::settings::QualitySettings;

/// Keeps frame time near a target by scaling the render resolution.
#[derive(Debug, Clone)]
pub struct AdaptiveQuality {
    settings: QualitySettings,
    scale: f32,
}

impl AdaptiveQuality {
    pub fn new(settings: QualitySettings) -> Self {
        Self { settings, scale: 1.0 }
    }

    /// Current resolution multiplier in `[min_scale, 1]`.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn settings(&self) -> &QualitySettings {
        &self.settings
    }

    /// Back to full resolution.
    pub fn reset(&mut self) {
        self.scale = 1.0;
    }

    /// Feed the time the last frame took, in seconds. Returns true if the
    /// scale changed.
    pub fn update(&mut self, frame_time: f32) -> bool {
        let previous = self.scale;
        let s = &self.settings;

        self.scale = if !s.enabled {
            1.0
        } else if frame_time > s.target_frame_time {
            (self.scale * s.decrease_factor).max(s.min_scale)
        } else if frame_time < s.target_frame_time * s.restore_threshold {
            (self.scale * s.increase_factor).min(1.0)
        } else {
            self.scale
        };

        let changed = (self.scale - previous).abs() > 1e-6;
        if changed {
            debug!(
                "Quality scale {:.3} -> {:.3} (frame {:.2} ms, target {:.2} ms)",
                previous,
                self.scale,
                frame_time * 1000.0,
                s.target_frame_time * 1000.0
            );
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slow_frames_reduce_scale_to_minimum() {
        let mut quality = AdaptiveQuality::new(QualitySettings::default());
        assert!(quality.update(0.05));
        assert!(quality.scale() < 1.0);

        for _ in 0..100 {
            quality.update(0.05);
        }
        assert_eq!(quality.scale(), QualitySettings::default().min_scale);
        assert!(!quality.update(0.05));
    }

    #[test]
    fn test_fast_frames_restore_full_scale() {
        let mut quality = AdaptiveQuality::new(QualitySettings::default());
        for _ in 0..10 {
            quality.update(0.05);
        }
        for _ in 0..200 {
            quality.update(0.001);
        }
        assert_eq!(quality.scale(), 1.0);
    }

    #[test]
    fn test_frames_near_target_hold_scale() {
        let settings = QualitySettings::default();
        let mut quality = AdaptiveQuality::new(settings);
        quality.update(1.0);
        let held = quality.scale();

        assert!(!quality.update(settings.target_frame_time * 0.9));
        assert_eq!(quality.scale(), held);
    }

    #[test]
    fn test_disabled_stays_at_full_scale() {
        let mut quality = AdaptiveQuality::new(QualitySettings {
            enabled: false,
            ..QualitySettings::default()
        });
        assert!(!quality.update(10.0));
        assert_eq!(quality.scale(), 1.0);
    }
}
