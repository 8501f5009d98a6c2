//! Read-only noise textures.
//!
//! The renderer consumes precomputed 2D noise as plain scalar arrays:
//! blue noise for sub-pixel jitter and value noise for terrain heights.
//! Both are loaded or generated by the host and never mutated afterwards.

use std::path::Path;

use thiserror::Error;

/// Errors that can occur during texture loading.
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Texture size {width}x{height} does not match {len} texels")]
    SizeMismatch { width: u32, height: u32, len: usize },

    #[error("Texture must not be empty")]
    Empty,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding error: {0}")]
    ImageError(#[from] image::ImageError),
}

pub type TextureResult<T> = Result<T, TextureError>;

/// A single-channel texture with wrap-around addressing.
#[derive(Clone, Debug)]
pub struct NoiseTexture {
    width: u32,
    height: u32,
    /// Row-major texels, normally in [0, 1]
    texels: Vec<f32>,
}

impl NoiseTexture {
    /// Create a texture from row-major texel values.
    pub fn new(width: u32, height: u32, texels: Vec<f32>) -> TextureResult<Self> {
        if width == 0 || height == 0 {
            return Err(TextureError::Empty);
        }
        if texels.len() != (width as usize) * (height as usize) {
            return Err(TextureError::SizeMismatch {
                width,
                height,
                len: texels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            texels,
        })
    }

    /// Build a texture by evaluating `f(x, y)` for every texel, row by row.
    ///
    /// Zero dimensions are bumped to one texel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let texels = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Self {
            width,
            height,
            texels,
        }
    }

    /// Create a texture from 8-bit luminance bytes.
    pub fn from_luma8(width: u32, height: u32, bytes: &[u8]) -> TextureResult<Self> {
        let texels = bytes.iter().map(|&b| b as f32 / 255.0).collect();
        Self::new(width, height, texels)
    }

    /// Decode an image file and keep its luminance.
    ///
    /// Noise textures are data, not colour, so no sRGB decoding is applied.
    pub fn from_image(path: impl AsRef<Path>) -> TextureResult<Self> {
        let path = path.as_ref();
        let luma = image::open(path)?.to_luma8();
        let (width, height) = luma.dimensions();

        log::debug!(
            "Loaded noise texture: {} ({}x{})",
            path.display(),
            width,
            height
        );

        Self::from_luma8(width, height, luma.as_raw())
    }

    /// Texture width in texels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Texture height in texels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw texel storage.
    pub fn texels(&self) -> &[f32] {
        &self.texels
    }

    /// Texel bytes, for hosts that upload the array elsewhere.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }

    /// Texel at integer coordinates, wrapping in both directions.
    pub fn texel(&self, x: i64, y: i64) -> f32 {
        let x = x.rem_euclid(self.width as i64) as usize;
        let y = y.rem_euclid(self.height as i64) as usize;
        self.texels[y * self.width as usize + x]
    }

    /// Bilinear sample at texture coordinates (one unit = whole texture).
    pub fn sample(&self, u: f32, v: f32) -> f32 {
        let x = u * self.width as f32 - 0.5;
        let y = v * self.height as f32 - 0.5;

        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let p00 = self.texel(x0, y0);
        let p10 = self.texel(x0 + 1, y0);
        let p01 = self.texel(x0, y0 + 1);
        let p11 = self.texel(x0 + 1, y0 + 1);

        let top = p00 + (p10 - p00) * fx;
        let bottom = p01 + (p11 - p01) * fx;
        top + (bottom - top) * fy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> NoiseTexture {
        NoiseTexture::new(2, 2, vec![0.0, 1.0, 1.0, 0.0]).unwrap()
    }

    #[test]
    fn test_rejects_size_mismatch() {
        let err = NoiseTexture::new(4, 4, vec![0.0; 3]).unwrap_err();
        assert!(matches!(err, TextureError::SizeMismatch { len: 3, .. }));
        assert!(matches!(NoiseTexture::new(0, 4, vec![]), Err(TextureError::Empty)));
    }

    #[test]
    fn test_texel_wraps() {
        let tex = checker();
        assert_eq!(tex.texel(0, 0), 0.0);
        assert_eq!(tex.texel(2, 0), 0.0);
        assert_eq!(tex.texel(-1, 0), 1.0);
        assert_eq!(tex.texel(1, -1), 0.0);
    }

    #[test]
    fn test_sample_hits_texel_centers() {
        let tex = checker();
        // Texel (1, 0) center is at u = 0.75, v = 0.25.
        assert!((tex.sample(0.75, 0.25) - 1.0).abs() < 1e-6);
        // Halfway between texel centers blends evenly.
        assert!((tex.sample(0.5, 0.25) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_from_fn_is_row_major() {
        let tex = NoiseTexture::from_fn(3, 2, |x, y| (y * 3 + x) as f32);
        assert_eq!(tex.texels(), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(tex.texel(2, 1), 5.0);
        assert_eq!(NoiseTexture::from_fn(0, 0, |_, _| 1.0).width(), 1);
    }

    #[test]
    fn test_from_luma8_scales_bytes() {
        let tex = NoiseTexture::from_luma8(2, 1, &[0, 255]).unwrap();
        assert_eq!(tex.texels(), &[0.0, 1.0]);
        assert_eq!(tex.as_bytes().len(), 8);
    }
}
