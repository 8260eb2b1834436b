//! # Application State Management
//!
//! The headless tick runner. It handles:
//! - Generating the initial chunks around the configured origin
//! - Ticking the engine at a fixed interval until the meshing queue drains
//! - Publishing statistics after every tick
//! - Reporting the chunks a draw pass would receive

pub mod graphics_resources_builder;

use std::thread;
use std::time::Duration;

use cgmath::Point3;
use log::{debug, info};

use crate::{
    config::{Config, WorldConfig},
    engine_state::{
        rendering::{gpu::GpuBackend, meshing::MeshingError},
        statistics::StatisticsSink,
        voxels::coordinates::AXIS_EXTENT,
        EngineState,
    },
};

/// Owns the engine state and drives it from the composition root.
pub struct ApplicationState<B: GpuBackend, S: StatisticsSink> {
    /// The engine context being ticked
    pub engine_state: EngineState<B>,
    /// Receives the statistics record after every tick
    sink: S,
    world: WorldConfig,
    tick_interval: Duration,
    max_ticks: Option<u64>,
    ticks: u64,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks taken since the state was created
    pub ticks: u64,
    /// Meshing jobs swapped into their chunks
    pub jobs_completed: u64,
    /// Whether the queue drained before `max_ticks` was reached
    pub drained: bool,
}

impl<B: GpuBackend, S: StatisticsSink> ApplicationState<B, S> {
    /// Takes the world and runner settings from `config`.
    pub fn new(engine_state: EngineState<B>, sink: S, config: &Config) -> Self {
        Self {
            engine_state,
            sink,
            world: config.world.clone(),
            tick_interval: config.tick_interval(),
            max_ticks: config.runner.max_ticks,
            ticks: 0,
        }
    }

    /// Generates every chunk within `initial_radius` of the origin.
    ///
    /// Returns the number of chunks generated.
    pub fn generate_initial_chunks(&mut self) -> Result<usize, MeshingError> {
        let [x, y, z] = self.world.origin;
        let radius = self.world.initial_radius;
        let mut generated = 0;

        for x in ball_axis(x, radius) {
            for y in ball_axis(y, radius) {
                for z in ball_axis(z, radius) {
                    self.engine_state.generate_chunk(Point3::new(x, y, z))?;
                    generated += 1;
                }
            }
        }

        info!(
            "Generated {} chunks within radius {} of {:?}",
            generated, radius, self.world.origin
        );
        Ok(generated)
    }

    /// Ticks the engine until the meshing pipeline is idle or `max_ticks` is hit.
    ///
    /// # Errors
    /// The first pipeline error; the pipeline is faulted afterwards.
    pub fn run(&mut self) -> Result<RunSummary, MeshingError> {
        let drained = loop {
            if self.engine_state.meshing_pipeline.is_idle() {
                break true;
            }
            if self
                .max_ticks
                .is_some_and(|max_ticks| self.ticks >= max_ticks)
            {
                break false;
            }

            let ticked = self.engine_state.tick();
            self.ticks += 1;
            ticked?;
            self.sink.publish(&self.engine_state.statistics);

            if !self.tick_interval.is_zero() {
                thread::sleep(self.tick_interval);
            }
        };

        let summary = RunSummary {
            ticks: self.ticks,
            jobs_completed: self.engine_state.meshing_pipeline.jobs_completed(),
            drained,
        };
        info!("Run finished: {:?}", summary);
        Ok(summary)
    }

    /// Logs the chunks within `draw_radius` of the origin that have geometry.
    ///
    /// Returns the number of drawable chunks.
    pub fn log_visible_chunks(&self) -> usize {
        let origin = Point3::from(self.world.origin);
        let visible = self
            .engine_state
            .chunks_in_radius(origin, self.world.draw_radius);

        let mut drawable = 0;
        for chunk in &visible {
            let chunk = chunk.get();
            if chunk.is_drawable() {
                drawable += 1;
                debug!("Chunk {:?}: {} vertices", chunk.position(), chunk.vertex_count);
            }
        }

        info!(
            "{} chunks within draw radius {}, {} with geometry",
            visible.len(),
            self.world.draw_radius,
            drawable
        );
        drawable
    }

    /// The sink statistics are published to.
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

fn ball_axis(center: u32, radius: u32) -> std::ops::RangeInclusive<u32> {
    center.saturating_sub(radius)..=center.saturating_add(radius).min(AXIS_EXTENT - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::{
        rendering::{gpu::recording_backend::RecordingBackend, meshing::PipelinePhase},
        statistics::Statistics,
    };

    #[derive(Default)]
    struct CountingSink {
        published: usize,
        last: Option<Statistics>,
    }

    impl StatisticsSink for CountingSink {
        fn publish(&mut self, statistics: &Statistics) {
            self.published += 1;
            self.last = Some(*statistics);
        }
    }

    fn config(origin: [u32; 3], initial_radius: u32, max_ticks: Option<u64>) -> Config {
        let mut config = Config::default();
        config.world.origin = origin;
        config.world.initial_radius = initial_radius;
        config.runner.tick_interval_ms = 0;
        config.runner.max_ticks = max_ticks;
        config
    }

    fn application(
        config: &Config,
        backend: RecordingBackend,
    ) -> ApplicationState<RecordingBackend, CountingSink> {
        ApplicationState::new(EngineState::new(backend), CountingSink::default(), config)
    }

    #[test]
    fn initial_chunks_fill_the_ball() {
        let config = config([8, 8, 8], 1, None);
        let mut application = application(&config, RecordingBackend::new(1000));

        assert_eq!(application.generate_initial_chunks(), Ok(27));
        assert_eq!(application.engine_state.meshing_pipeline.queued_len(), 27);
    }

    #[test]
    fn initial_ball_is_clipped_at_the_domain_edge() {
        let config = config([0, 0, 0], 1, None);
        let mut application = application(&config, RecordingBackend::new(1000));

        assert_eq!(application.generate_initial_chunks(), Ok(8));
    }

    #[test]
    fn run_drains_the_queue() {
        let config = config([2, 2, 2], 1, None);
        let mut backend = RecordingBackend::new(1000);
        backend.script_vertex_counts(std::iter::repeat(36).take(27));
        let mut application = application(&config, backend);
        application.generate_initial_chunks().unwrap();

        let summary = application.run().unwrap();

        assert!(summary.drained);
        assert_eq!(summary.jobs_completed, 27);
        assert_eq!(application.sink().published as u64, summary.ticks);
        assert_eq!(application.sink().last.map(|last| last.vertices), Some(36));
        assert_eq!(application.log_visible_chunks(), 27);
    }

    #[test]
    fn run_stops_at_max_ticks() {
        let config = config([2, 2, 2], 1, Some(3));
        let mut application = application(&config, RecordingBackend::new(1000));
        application.generate_initial_chunks().unwrap();

        let summary = application.run().unwrap();

        assert!(!summary.drained);
        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.jobs_completed, 0);
    }

    #[test]
    fn overflowing_job_ends_the_run() {
        let config = config([0, 0, 0], 1, None);
        let mut backend = RecordingBackend::new(10);
        backend.script_vertex_counts([11, 6]);
        let mut application = application(&config, backend);
        application.generate_initial_chunks().unwrap();

        assert_eq!(
            application.run(),
            Err(MeshingError::ResourceExhaustion {
                chunk: crate::engine_state::voxels::coordinates::ChunkId::encode(cgmath::Point3::new(0, 0, 0)).unwrap(),
                vertex_count: 11,
                capacity: 10,
            })
        );

        let pipeline = &application.engine_state.meshing_pipeline;
        assert_eq!(pipeline.phase(), PipelinePhase::Faulted);
        assert_eq!(pipeline.jobs_completed(), 0);
        assert_eq!(pipeline.backend().submitted_jobs().len(), 1);
        assert_eq!(application.log_visible_chunks(), 0);
    }

    #[test]
    fn device_loss_ends_the_run() {
        let config = config([0, 0, 0], 0, None);
        let mut backend = RecordingBackend::new(10);
        backend.lose_device("removed");
        let mut application = application(&config, backend);
        application.generate_initial_chunks().unwrap();

        assert_eq!(
            application.run(),
            Err(MeshingError::DeviceUnavailable("removed".into()))
        );
    }
}
