use crate::{Interval, Ray, Vec3};

/// Axis-aligned bounding box, stored as one interval per axis.
///
/// Used by the BVH arena for node bounds and by the analytic backend for the
/// local-space slab test of oriented boxes.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

impl Aabb {
    /// Create an AABB from two corner points, padding flat axes.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        let mut aabb = Self::from_points_exact(a, b);
        aabb.pad_to_minimums();
        aabb
    }

    /// Create an AABB from two corner points without padding.
    pub fn from_points_exact(a: Vec3, b: Vec3) -> Self {
        Self {
            x: Interval::new(a.x.min(b.x), a.x.max(b.x)),
            y: Interval::new(a.y.min(b.y), a.y.max(b.y)),
            z: Interval::new(a.z.min(b.z), a.z.max(b.z)),
        }
    }

    /// Create an AABB that surrounds two other AABBs.
    pub fn surrounding(box0: &Aabb, box1: &Aabb) -> Self {
        Self {
            x: Interval::surrounding(&box0.x, &box1.x),
            y: Interval::surrounding(&box0.y, &box1.y),
            z: Interval::surrounding(&box0.z, &box1.z),
        }
    }

    /// Grow the box to include a point.
    pub fn include(&self, p: Vec3) -> Self {
        Self {
            x: Interval::new(self.x.min.min(p.x), self.x.max.max(p.x)),
            y: Interval::new(self.y.min.min(p.y), self.y.max.max(p.y)),
            z: Interval::new(self.z.min.min(p.z), self.z.max.max(p.z)),
        }
    }

    /// Minimum corner.
    pub fn min(&self) -> Vec3 {
        Vec3::new(self.x.min, self.y.min, self.z.min)
    }

    /// Maximum corner.
    pub fn max(&self) -> Vec3 {
        Vec3::new(self.x.max, self.y.max, self.z.max)
    }

    /// Get the interval for a specific axis (0=X, 1=Y, 2=Z).
    pub fn axis_interval(&self, n: usize) -> Interval {
        match n {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Entry and exit distances of the infinite line through `r`.
    ///
    /// The box is hit when `t_enter <= t_exit`. A zero direction component
    /// with the origin inside that slab makes `0 * inf` NaN; such slabs are
    /// treated as unbounded instead of poisoning the result.
    pub fn slab(&self, r: &Ray) -> (f32, f32) {
        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;

        for axis in 0..3 {
            let interval = self.axis_interval(axis);
            let inv = 1.0 / r.direction[axis];
            let mut t0 = (interval.min - r.origin[axis]) * inv;
            let mut t1 = (interval.max - r.origin[axis]) * inv;
            if t0.is_nan() {
                t0 = f32::NEG_INFINITY;
            }
            if t1.is_nan() {
                t1 = f32::INFINITY;
            }
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_enter = t_enter.max(t0);
            t_exit = t_exit.min(t1);
        }

        (t_enter, t_exit)
    }

    /// Test if a ray intersects this AABB within the given interval.
    pub fn hit(&self, r: &Ray, ray_t: Interval) -> bool {
        if r.is_degenerate() {
            return false;
        }
        let (t_enter, t_exit) = self.slab(r);
        let lo = t_enter.max(ray_t.min);
        let hi = t_exit.min(ray_t.max);
        lo <= hi
    }

    /// Distance to the box surface along the ray.
    ///
    /// Returns the entry distance, or the exit distance when the ray starts
    /// inside the box. `None` when the box is behind the ray or missed.
    pub fn hit_distance(&self, r: &Ray, ray_t: Interval) -> Option<f32> {
        if r.is_degenerate() {
            return None;
        }
        let (t_enter, t_exit) = self.slab(r);
        if t_enter > t_exit {
            return None;
        }
        if ray_t.surrounds(t_enter) {
            Some(t_enter)
        } else if ray_t.surrounds(t_exit) {
            Some(t_exit)
        } else {
            None
        }
    }

    /// Pad intervals to avoid zero-width AABBs (degenerate cases).
    fn pad_to_minimums(&mut self) {
        let delta = 0.0001;
        if self.x.size() < delta {
            self.x = self.x.expand(delta);
        }
        if self.y.size() < delta {
            self.y = self.y.expand(delta);
        }
        if self.z.size() < delta {
            self.z = self.z.expand(delta);
        }
    }

    /// Returns the index (0=X, 1=Y, 2=Z) of the axis with the longest extent.
    pub fn longest_axis(&self) -> usize {
        let x_size = self.x.size();
        let y_size = self.y.size();
        let z_size = self.z.size();

        if x_size > y_size && x_size > z_size {
            0
        } else if y_size > z_size {
            1
        } else {
            2
        }
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        (self.min() + self.max()) * 0.5
    }

    /// Length of each side.
    pub fn extent(&self) -> Vec3 {
        self.max() - self.min()
    }

    /// Returns true when no point has been added yet.
    pub fn is_empty(&self) -> bool {
        self.x.min > self.x.max || self.y.min > self.y.max || self.z.min > self.z.max
    }

    pub const EMPTY: Aabb = Aabb {
        x: Interval::EMPTY,
        y: Interval::EMPTY,
        z: Interval::EMPTY,
    };
}
