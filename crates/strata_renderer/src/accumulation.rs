//! Progressive accumulation of per-frame samples.
//!
//! Two buffers hold the running mean: `front` is the image from the last
//! finished frame, `back` receives the blend of `front` with the new
//! samples. [`Accumulator::finish_frame`] swaps them.

use log::debug;
use rayon::prelude::*;

use crate::camera::CameraState;
use crate::film::ImageBuffer;
use crate::material::Color;

/// Counters exposed after every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccumulationStats {
    /// Frames begun since construction; never reset
    pub frame_counter: u64,
    /// Frames blended since the last reset; 0 on a reset frame
    pub sample_counter: u32,
    /// True if this frame restarted accumulation
    pub is_moving: bool,
}

/// Double-buffered running average.
#[derive(Debug, Clone)]
pub struct Accumulator {
    width: u32,
    height: u32,
    front: Vec<Color>,
    back: Vec<Color>,
    stats: AccumulationStats,
    last_camera: Option<CameraState>,
    reset_pending: bool,
}

impl Accumulator {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            front: vec![Color::ZERO; len],
            back: vec![Color::ZERO; len],
            stats: AccumulationStats::default(),
            last_camera: None,
            reset_pending: true,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stats(&self) -> AccumulationStats {
        self.stats
    }

    /// Reallocate both buffers. Accumulation restarts on the next frame.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        debug!("Accumulation resized {}x{} -> {}x{}", self.width, self.height, width, height);
        let len = width as usize * height as usize;
        self.width = width;
        self.height = height;
        self.front = vec![Color::ZERO; len];
        self.back = vec![Color::ZERO; len];
        self.stats.sample_counter = 0;
        self.reset_pending = true;
    }

    /// Make the next frame start a fresh average (mode or scene change).
    pub fn force_reset(&mut self) {
        self.reset_pending = true;
    }

    fn camera_moved(&self, camera: &CameraState) -> bool {
        self.last_camera
            .as_ref()
            .map_or(true, |last| !last.approx_eq(camera))
    }

    /// Whether a frame with `camera` would restart the running mean.
    pub fn needs_restart(&self, camera: &CameraState, dynamic: bool) -> bool {
        self.camera_moved(camera) || dynamic || self.reset_pending
    }

    /// Start a frame and decide whether it continues the running mean.
    ///
    /// The average restarts if the camera moved, the scene is dynamic, or a
    /// reset was requested. Returns true on restart.
    pub fn begin_frame(&mut self, camera: &CameraState, dynamic: bool) -> bool {
        let moved = self.camera_moved(camera);
        let restart = moved || dynamic || self.reset_pending;

        self.stats.frame_counter += 1;
        self.stats.is_moving = restart;
        if restart {
            if self.stats.sample_counter > 0 {
                debug!(
                    "Accumulation reset after {} samples (moved: {}, dynamic: {}, forced: {})",
                    self.stats.sample_counter + 1,
                    moved,
                    dynamic,
                    self.reset_pending
                );
            }
            self.stats.sample_counter = 0;
        } else {
            self.stats.sample_counter += 1;
        }

        self.last_camera = Some(*camera);
        self.reset_pending = false;
        restart
    }

    /// Weight of this frame's sample in the running mean.
    #[inline]
    fn weight(&self) -> f32 {
        1.0 / (self.stats.sample_counter as f32 + 1.0)
    }

    /// Blend one pixel's new sample. Every pixel must be submitted (or
    /// [`Accumulator::blend`] called) once per frame.
    pub fn submit(&mut self, x: u32, y: u32, sample: Color) {
        let i = y as usize * self.width as usize + x as usize;
        self.back[i] = self.front[i].lerp(sample, self.weight());
    }

    /// Blend a full frame of samples, in parallel.
    pub fn blend(&mut self, samples: &[Color]) {
        debug_assert_eq!(samples.len(), self.back.len());
        let weight = self.weight();
        self.back
            .par_iter_mut()
            .zip(self.front.par_iter())
            .zip(samples.par_iter())
            .for_each(|((out, &previous), &sample)| {
                *out = previous.lerp(sample, weight);
            });
    }

    /// Publish the blended frame.
    pub fn finish_frame(&mut self) {
        std::mem::swap(&mut self.front, &mut self.back);
    }

    /// Accumulated linear image of the last finished frame.
    pub fn image(&self) -> &[Color] {
        &self.front
    }

    pub fn to_image_buffer(&self) -> ImageBuffer {
        ImageBuffer {
            width: self.width,
            height: self.height,
            pixels: self.front.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_math::Vec3;

    fn frame(acc: &mut Accumulator, camera: &CameraState, value: f32) -> AccumulationStats {
        acc.begin_frame(camera, false);
        let samples = vec![Color::splat(value); (acc.width() * acc.height()) as usize];
        acc.blend(&samples);
        acc.finish_frame();
        acc.stats()
    }

    #[test]
    fn test_running_mean() {
        let camera = CameraState::default();
        let mut acc = Accumulator::new(2, 2);

        let stats = frame(&mut acc, &camera, 1.0);
        assert_eq!(stats.sample_counter, 0);
        assert!(stats.is_moving);

        frame(&mut acc, &camera, 2.0);
        let stats = frame(&mut acc, &camera, 6.0);
        assert_eq!(stats.sample_counter, 2);
        assert_eq!(stats.frame_counter, 3);
        assert!(!stats.is_moving);
        assert!((acc.image()[3].x - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_sample_counter_increments_by_one() {
        let camera = CameraState::default();
        let mut acc = Accumulator::new(1, 1);
        for expected in 0..10 {
            assert_eq!(frame(&mut acc, &camera, 0.5).sample_counter, expected);
        }
    }

    #[test]
    fn test_reset_on_motion() {
        let camera = CameraState::default();
        let mut acc = Accumulator::new(1, 1);
        for _ in 0..5 {
            frame(&mut acc, &camera, 1.0);
        }

        let moved = CameraState::look_at(Vec3::new(0.1, 0.0, 5.0), Vec3::ZERO, Vec3::Y, 45.0, 1.0);
        let stats = frame(&mut acc, &moved, 4.0);
        assert_eq!(stats.sample_counter, 0);
        assert!(stats.is_moving);
        assert_eq!(acc.image()[0], Color::splat(4.0));
    }

    #[test]
    fn test_needs_restart_does_not_advance() {
        let camera = CameraState::default();
        let mut acc = Accumulator::new(1, 1);
        assert!(acc.needs_restart(&camera, false));
        frame(&mut acc, &camera, 1.0);

        assert!(!acc.needs_restart(&camera, false));
        assert!(acc.needs_restart(&camera, true));
        assert_eq!(acc.stats().frame_counter, 1);

        acc.force_reset();
        assert!(acc.needs_restart(&camera, false));
    }

    #[test]
    fn test_dynamic_scene_never_accumulates() {
        let camera = CameraState::default();
        let mut acc = Accumulator::new(1, 1);
        for _ in 0..3 {
            assert!(acc.begin_frame(&camera, true));
            assert_eq!(acc.stats().sample_counter, 0);
        }
    }

    #[test]
    fn test_force_reset_and_resize() {
        let camera = CameraState::default();
        let mut acc = Accumulator::new(2, 1);
        frame(&mut acc, &camera, 1.0);
        frame(&mut acc, &camera, 1.0);

        acc.force_reset();
        assert_eq!(frame(&mut acc, &camera, 1.0).sample_counter, 0);
        assert_eq!(frame(&mut acc, &camera, 1.0).sample_counter, 1);

        acc.resize(3, 2);
        assert_eq!(acc.image().len(), 6);
        let stats = frame(&mut acc, &camera, 1.0);
        assert_eq!(stats.sample_counter, 0);
        assert_eq!(stats.frame_counter, 5);
    }

    #[test]
    fn test_submit_matches_blend() {
        let camera = CameraState::default();
        let mut acc = Accumulator::new(2, 1);
        frame(&mut acc, &camera, 1.0);

        acc.begin_frame(&camera, false);
        acc.submit(0, 0, Color::splat(3.0));
        acc.submit(1, 0, Color::splat(5.0));
        acc.finish_frame();
        assert_eq!(acc.image(), &[Color::splat(2.0), Color::splat(3.0)]);
        assert_eq!(acc.to_image_buffer().get(1, 0), Color::splat(3.0));
    }
}
