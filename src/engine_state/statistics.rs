//! Per-tick performance record and the sinks that publish it.
//!
//! Timing values are smoothed with an exponential moving average that keeps
//! 99% of the prior value and folds in 1% of each new sample. Samples that are
//! not finite (a zero-length frame, a clock that went backwards) are dropped.

use std::time::Duration;

use web_time::Instant;

/// Weight kept from the previous average.
pub const EMA_PRIOR_WEIGHT: f64 = 0.99;
/// Weight given to each new sample.
pub const EMA_SAMPLE_WEIGHT: f64 = 0.01;

/// Smoothed timing and geometry figures, updated once per tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Statistics {
    /// Frames per second
    pub fps: f64,
    /// Vertex count of the most recently read back job
    pub vertices: u32,
    /// Milliseconds from dispatch to readback of a meshing job
    pub mesh_generation: f64,
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            fps: 60.0,
            vertices: 0,
            mesh_generation: 0.0,
        }
    }
}

impl Statistics {
    /// Folds the duration of the last tick into `fps`.
    pub fn record_frame_time(&mut self, frame_time: Duration) {
        let sample = 1.0 / frame_time.as_secs_f64();
        self.fps = moving_average(self.fps, sample);
    }

    /// Folds one job's dispatch-to-readback time into `mesh_generation`.
    pub fn record_mesh_generation(&mut self, elapsed: Duration) {
        let sample = elapsed.as_secs_f64() * 1000.0;
        self.mesh_generation = moving_average(self.mesh_generation, sample);
    }
}

/// Returns the next moving average, or `prior` unchanged if `sample` is not finite.
pub fn moving_average(prior: f64, sample: f64) -> f64 {
    if !sample.is_finite() {
        return prior;
    }
    prior * EMA_PRIOR_WEIGHT + sample * EMA_SAMPLE_WEIGHT
}

/// Receives the statistics record after every tick.
pub trait StatisticsSink {
    /// Called once per tick with the current record.
    fn publish(&mut self, statistics: &Statistics);
}

/// Logs the statistics at `info` level, at most once per interval.
pub struct LogStatisticsSink {
    interval: Duration,
    last_logged: Option<Instant>,
}

impl LogStatisticsSink {
    /// Logs the first record it receives, then at most once per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_logged: None,
        }
    }
}

impl StatisticsSink for LogStatisticsSink {
    fn publish(&mut self, statistics: &Statistics) {
        let now = Instant::now();
        if let Some(last_logged) = self.last_logged {
            if now.duration_since(last_logged) < self.interval {
                return;
            }
        }
        self.last_logged = Some(now);

        log::info!(
            "fps: {:.1} | vertices: {} | mesh generation: {:.3} ms",
            statistics.fps,
            statistics.vertices,
            statistics.mesh_generation
        );
    }
}
