use log::debug;
use nalgebra::Vector3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Checkpoint {
    pub position: Vector3<f64>,
    pub reached: bool,
}

/// Ordered waypoints between spawn and goal, consumed strictly in order.
#[derive(Debug, Clone, Default)]
pub struct CheckpointTrack {
    checkpoints: Vec<Checkpoint>,
    cursor: usize,
}

impl CheckpointTrack {
    /// Places `count` waypoints at `i / (count + 1)` along the segment, so none
    /// sits on either endpoint.
    pub fn generate(start: Vector3<f64>, end: Vector3<f64>, count: usize) -> Self {
        let checkpoints = (1..=count)
            .map(|i| {
                let t = i as f64 / (count + 1) as f64;
                Checkpoint {
                    position: start.lerp(&end, t),
                    reached: false,
                }
            })
            .collect();
        CheckpointTrack {
            checkpoints,
            cursor: 0,
        }
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Index of the next unreached checkpoint.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn next(&self) -> Option<&Checkpoint> {
        self.checkpoints.get(self.cursor)
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.checkpoints.len()
    }

    /// Marks the next checkpoint reached if `position` is strictly inside `radius`.
    ///
    /// Only the checkpoint under the cursor is tested, so at most one is
    /// consumed per call and none is ever skipped.
    pub fn advance_if_near(&mut self, position: &Vector3<f64>, radius: f64) -> Option<usize> {
        let index = self.cursor;
        let checkpoint = self.checkpoints.get_mut(index)?;
        if (checkpoint.position - position).norm() >= radius {
            return None;
        }

        checkpoint.reached = true;
        self.cursor += 1;
        debug!("Checkpoint {index} reached");
        Some(index)
    }
}
