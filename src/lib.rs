#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Mesher
//!
//! Streams cubic voxel chunks and regenerates their surface geometry on a GPU
//! compute pipeline, built with Rust and WGPU.
//!
//! ## Key Modules
//!
//! * `application_state` - Headless device acquisition and the tick runner
//! * `config` - JSON configuration with defaults for every field
//! * `core` - Shared single-threaded handles
//! * `engine_state` - Spatial index, meshing pipeline, statistics and the wgpu backend
//!
//! ## Architecture
//!
//! `run()` is the composition root. It loads the configuration, starts the
//! logger, acquires a device, builds the meshing backend and hands an
//! `EngineState` to the `ApplicationState` runner. Nothing is global: dropping
//! the runner tears down the pipeline, the index and every chunk buffer.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=debug cargo run --release -- voxel_mesher.json
//! ```

use std::error::Error;

use log::{info, warn};

use application_state::{graphics_resources_builder::create_graphics, ApplicationState};
use config::{Config, DEFAULT_CONFIG_PATH};
use engine_state::{
    rendering::gpu::WgpuMeshingBackend, statistics::LogStatisticsSink, EngineState,
};

pub mod application_state;
pub mod config;
pub mod core;
pub mod engine_state;

/// Runs the mesher until the initial chunks are meshed.
///
/// The configuration path is the first command line argument, falling back to
/// `voxel_mesher.json`; a missing or unreadable file means defaults.
pub fn run() -> Result<(), Box<dyn Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let (config, load_error) = match Config::load(&config_path) {
        Ok(config) => (config, None),
        Err(error) => (Config::default(), Some(error)),
    };

    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_filters(&config.logging.filter)
        .parse_env("RUST_LOG")
        .init();

    match load_error {
        None => info!("Loaded configuration from {}", config_path),
        Some(error) => warn!(
            "Failed to load {}: {}. Using defaults.",
            config_path, error
        ),
    }
    config.validate()?;

    let graphics = create_graphics(&config.meshing.grid_shader, &config.meshing.mesh_shader)?;
    let backend = WgpuMeshingBackend::new(
        graphics.device,
        graphics.queue,
        config.grid_params()?,
        &graphics.grid_shader,
        &graphics.mesh_shader,
    )?;

    let mut application = ApplicationState::new(
        EngineState::new(backend),
        LogStatisticsSink::new(config.statistics_interval()),
        &config,
    );

    application.generate_initial_chunks()?;
    application.run()?;
    application.log_visible_chunks();
    application
        .engine_state
        .meshing_pipeline
        .backend()
        .buffer_state()
        .log_analytics();

    Ok(())
}
