//! Linear image storage and display encoding.
//!
//! Everything the integrator and accumulation produce is linear radiance;
//! tone mapping and gamma happen once, when pixels are handed out.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::material::Color;

/// Curve used to compress linear radiance into [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToneMapping {
    /// ACES-style filmic fit
    #[default]
    Filmic,
    Reinhard,
    /// Plain clamp, for debugging
    Clamp,
}

impl ToneMapping {
    #[inline]
    fn curve(self, x: f32) -> f32 {
        let x = x.max(0.0);
        match self {
            ToneMapping::Filmic => {
                let numerator = x * (2.51 * x + 0.03);
                let denominator = x * (2.43 * x + 0.59) + 0.14;
                (numerator / denominator).clamp(0.0, 1.0)
            }
            ToneMapping::Reinhard => x / (1.0 + x),
            ToneMapping::Clamp => x.min(1.0),
        }
    }

    pub fn apply(self, color: Color) -> Color {
        Color::new(self.curve(color.x), self.curve(color.y), self.curve(color.z))
    }
}

/// Display gamma.
const GAMMA: f32 = 2.2;

/// Apply gamma correction.
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.powf(1.0 / GAMMA)
    } else {
        0.0
    }
}

/// Convert a linear color to 8-bit RGBA.
pub fn color_to_rgba(color: Color, tone: ToneMapping, exposure: f32) -> [u8; 4] {
    // Non-finite samples would poison the byte conversion
    let color = if color.is_finite() { color } else { Color::ZERO };
    let mapped = tone.apply(color * exposure);
    let r = (255.999 * linear_to_gamma(mapped.x).clamp(0.0, 1.0)) as u8;
    let g = (255.999 * linear_to_gamma(mapped.y).clamp(0.0, 1.0)) as u8;
    let b = (255.999 * linear_to_gamma(mapped.z).clamp(0.0, 1.0)) as u8;
    [r, g, b, 255]
}

/// View RGBA pixels as a flat byte slice.
pub fn rgba_bytes(pixels: &[[u8; 4]]) -> &[u8] {
    bytemuck::cast_slice(pixels)
}

/// Row-major image of linear colors.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl ImageBuffer {
    /// Create a new image buffer filled with black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::ZERO; width as usize * height as usize],
        }
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Get the pixel at (x, y).
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[self.index(x, y)]
    }

    /// Set the pixel at (x, y).
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        let i = self.index(x, y);
        self.pixels[i] = color;
    }

    pub fn fill(&mut self, color: Color) {
        self.pixels.fill(color);
    }

    /// Mean color over all pixels.
    pub fn mean(&self) -> Color {
        if self.pixels.is_empty() {
            return Color::ZERO;
        }
        self.pixels.iter().copied().sum::<Color>() / self.pixels.len() as f32
    }

    /// Tone map and gamma encode every pixel.
    pub fn to_rgba(&self, tone: ToneMapping, exposure: f32) -> Vec<[u8; 4]> {
        self.pixels
            .par_iter()
            .map(|&c| color_to_rgba(c, tone, exposure))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curves_are_monotonic_and_bounded() {
        for tone in [ToneMapping::Filmic, ToneMapping::Reinhard, ToneMapping::Clamp] {
            let mut previous = -1.0;
            for i in 0..100 {
                let v = tone.curve(i as f32 * 0.1);
                assert!((0.0..=1.0).contains(&v));
                assert!(v >= previous, "{tone:?} at {i}");
                previous = v;
            }
            assert_eq!(tone.curve(-3.0), tone.curve(0.0));
        }
    }

    #[test]
    fn test_color_to_rgba() {
        assert_eq!(color_to_rgba(Color::ZERO, ToneMapping::Clamp, 1.0), [0, 0, 0, 255]);
        assert_eq!(color_to_rgba(Color::ONE, ToneMapping::Clamp, 1.0), [255, 255, 255, 255]);

        // Mid grey gamma encodes well above half
        let [r, ..] = color_to_rgba(Color::splat(0.5), ToneMapping::Clamp, 1.0);
        assert!(r > 180 && r < 190, "r = {r}");

        // Exposure scales before tone mapping
        let dim = color_to_rgba(Color::splat(0.2), ToneMapping::Reinhard, 1.0);
        let bright = color_to_rgba(Color::splat(0.2), ToneMapping::Reinhard, 4.0);
        assert!(bright[0] > dim[0]);

        assert_eq!(
            color_to_rgba(Color::new(f32::NAN, 1.0, 1.0), ToneMapping::Clamp, 1.0),
            [0, 0, 0, 255]
        );
    }

    #[test]
    fn test_image_buffer() {
        let mut image = ImageBuffer::new(4, 2);
        image.set(3, 1, Color::new(8.0, 0.0, 0.0));
        assert_eq!(image.get(3, 1).x, 8.0);
        assert_eq!(image.index(3, 1), 7);
        assert!((image.mean().x - 1.0).abs() < 1e-6);

        let rgba = image.to_rgba(ToneMapping::Clamp, 1.0);
        assert_eq!(rgba.len(), 8);
        assert_eq!(rgba_bytes(&rgba).len(), 32);
        assert_eq!(rgba_bytes(&rgba)[28], 255);
    }
}
