//! Background BVH construction for imported meshes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use log::{info, warn};
use strata_core::Mesh;

use crate::bvh::{triangles_from_mesh, Bvh, BvhStrategy};

/// Progress of a [`MeshBuildTask`].
#[derive(Debug, Clone)]
pub enum BuildStatus {
    Pending,
    Finished(Arc<Bvh>),
    /// Cancelled, or the worker went away without a result
    Cancelled,
}

/// A BVH build running on its own thread.
///
/// Dropping the task cancels the build.
#[derive(Debug)]
pub struct MeshBuildTask {
    cancel: Arc<AtomicBool>,
    receiver: Receiver<Option<Bvh>>,
    triangle_count: usize,
}

impl MeshBuildTask {
    /// Normalise `mesh` to `target_extent` and build its hierarchy in the
    /// background.
    pub fn spawn(mesh: Arc<Mesh>, strategy: BvhStrategy, target_extent: f32) -> Self {
        let cancel = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = mpsc::channel();
        let triangle_count = mesh.triangle_count();

        info!("Building {:?} BVH for {} triangles in the background", strategy, triangle_count);

        let worker_cancel = Arc::clone(&cancel);
        thread::spawn(move || {
            let normalized = Mesh::clone(&mesh).normalized(target_extent);
            let triangles = triangles_from_mesh(&normalized);
            let bvh = Bvh::build_cancellable(triangles, strategy, &worker_cancel)
                .filter(|_| !worker_cancel.load(Ordering::Relaxed));
            // The receiver may already be gone
            let _ = sender.send(bvh);
        });

        Self {
            cancel,
            receiver,
            triangle_count,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    /// Ask the worker to stop. The next poll reports `Cancelled`.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Check for a result without blocking.
    pub fn poll(&self) -> BuildStatus {
        if self.is_cancelled() {
            return BuildStatus::Cancelled;
        }
        match self.receiver.try_recv() {
            Ok(result) => Self::finish(result),
            Err(TryRecvError::Empty) => BuildStatus::Pending,
            Err(TryRecvError::Disconnected) => {
                warn!("BVH build worker exited without a result");
                BuildStatus::Cancelled
            }
        }
    }

    /// Block until the build finishes.
    pub fn wait(self) -> BuildStatus {
        if self.is_cancelled() {
            return BuildStatus::Cancelled;
        }
        match self.receiver.recv() {
            Ok(result) => Self::finish(result),
            Err(_) => {
                warn!("BVH build worker exited without a result");
                BuildStatus::Cancelled
            }
        }
    }

    fn finish(result: Option<Bvh>) -> BuildStatus {
        match result {
            Some(bvh) => BuildStatus::Finished(Arc::new(bvh)),
            None => {
                warn!("BVH build cancelled");
                BuildStatus::Cancelled
            }
        }
    }
}

impl Drop for MeshBuildTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_math::Vec3;

    fn quad_grid(n: u32) -> Mesh {
        let mut positions = Vec::new();
        let mut indices = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                positions.push(Vec3::new(i as f32, 0.0, j as f32));
            }
        }
        let row = n + 1;
        for j in 0..n {
            for i in 0..n {
                let a = j * row + i;
                indices.extend_from_slice(&[a, a + 1, a + row, a + 1, a + row + 1, a + row]);
            }
        }
        Mesh::new(positions, indices)
    }

    #[test]
    fn test_build_finishes() {
        let task = MeshBuildTask::spawn(Arc::new(quad_grid(8)), BvhStrategy::MedianSplit, 2.0);
        assert_eq!(task.triangle_count(), 128);

        let BuildStatus::Finished(bvh) = task.wait() else {
            panic!("build did not finish");
        };
        assert_eq!(bvh.triangles().len(), 128);
        assert!(bvh.validate().is_ok());

        // Normalised to the target extent around the origin
        let extent = bvh.bounds().extent();
        assert!((extent.x - 2.0).abs() < 1e-3 && (extent.z - 2.0).abs() < 1e-3);
        assert!(bvh.bounds().centroid().length() < 1e-3);
    }

    #[test]
    fn test_cancelled_build_reports_cancelled() {
        let task = MeshBuildTask::spawn(Arc::new(quad_grid(64)), BvhStrategy::MedianSplit, 2.0);
        task.cancel();
        assert!(task.is_cancelled());
        assert!(matches!(task.poll(), BuildStatus::Cancelled));
        assert!(matches!(task.wait(), BuildStatus::Cancelled));
    }
}
