//! Configuration for the voxel mesher, read from a JSON file.
//!
//! Every field has a default, so a partial file (or `{}`) is valid.

use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine_state::{
    rendering::meshing::kernels::GridParams, voxels::coordinates::AXIS_EXTENT,
};

/// Path used when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "voxel_mesher.json";

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Grid and kernel settings
    #[serde(default)]
    pub meshing: MeshingConfig,
    /// Which chunks are generated and drawn
    #[serde(default)]
    pub world: WorldConfig,
    /// Tick loop settings
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Log filter and statistics cadence
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings the meshing backend is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshingConfig {
    /// Voxel grid extent per axis
    #[serde(default = "default_grid_size")]
    pub grid_size: [u32; 3],
    /// Scratch vertex capacity per voxel
    #[serde(default = "default_max_vertices_per_voxel")]
    pub max_vertices_per_voxel: u32,
    /// Path of the WGSL grid generation kernel
    #[serde(default = "default_grid_shader")]
    pub grid_shader: String,
    /// Path of the WGSL mesh extraction kernel
    #[serde(default = "default_mesh_shader")]
    pub mesh_shader: String,
}

/// Chunk coordinates the runner works around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Chunk around which the initial chunks are generated, below 16384 per axis
    #[serde(default = "default_origin")]
    pub origin: [u32; 3],
    /// Chebyshev radius of the initially generated chunks
    #[serde(default = "default_initial_radius")]
    pub initial_radius: u32,
    /// Chebyshev radius of the chunks handed to the draw pass
    #[serde(default = "default_draw_radius")]
    pub draw_radius: u32,
}

/// Headless tick loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Sleep between ticks; zero ticks back to back
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Stop after this many ticks even if work remains
    #[serde(default)]
    pub max_ticks: Option<u64>,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `env_logger` filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Minimum time between statistics log lines
    #[serde(default = "default_statistics_interval_ms")]
    pub statistics_interval_ms: u64,
}

fn default_grid_size() -> [u32; 3] {
    [64, 64, 64]
}
fn default_max_vertices_per_voxel() -> u32 {
    15
}
fn default_grid_shader() -> String {
    "assets/shaders/voxel_grid.wgsl".to_string()
}
fn default_mesh_shader() -> String {
    "assets/shaders/voxel_mesh.wgsl".to_string()
}
fn default_origin() -> [u32; 3] {
    [8, 8, 8]
}
fn default_initial_radius() -> u32 {
    1
}
fn default_draw_radius() -> u32 {
    2
}
fn default_tick_interval_ms() -> u64 {
    16
}
fn default_log_filter() -> String {
    "info".to_string()
}
fn default_statistics_interval_ms() -> u64 {
    1000
}

impl Default for MeshingConfig {
    fn default() -> Self {
        Self {
            grid_size: default_grid_size(),
            max_vertices_per_voxel: default_max_vertices_per_voxel(),
            grid_shader: default_grid_shader(),
            mesh_shader: default_mesh_shader(),
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            initial_radius: default_initial_radius(),
            draw_radius: default_draw_radius(),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_ticks: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            statistics_interval_ms: default_statistics_interval_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(contents: &str) -> Result<Self, Box<dyn Error>> {
        let config: Config = serde_json::from_str(contents)?;
        Ok(config)
    }

    /// Rejects settings the meshing backend cannot be built with.
    pub fn validate(&self) -> Result<(), Box<dyn Error>> {
        if self.meshing.grid_size.contains(&0) {
            return Err(format!(
                "meshing.grid_size must be non-zero on every axis, got {:?}",
                self.meshing.grid_size
            )
            .into());
        }
        if self.meshing.max_vertices_per_voxel == 0 {
            return Err("meshing.max_vertices_per_voxel must be non-zero".into());
        }
        if self.world.origin.iter().any(|&axis| axis >= AXIS_EXTENT) {
            return Err(format!(
                "world.origin must be below {} on every axis, got {:?}",
                AXIS_EXTENT, self.world.origin
            )
            .into());
        }
        self.grid_params()?;
        Ok(())
    }

    /// Kernel parameter block for the configured grid.
    pub fn grid_params(&self) -> Result<GridParams, Box<dyn Error>> {
        Ok(GridParams::new(
            self.meshing.grid_size,
            self.meshing.max_vertices_per_voxel,
        )?)
    }

    /// Sleep between runner ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.runner.tick_interval_ms)
    }

    /// Minimum time between statistics log lines.
    pub fn statistics_interval(&self) -> Duration {
        Duration::from_millis(self.logging.statistics_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meshing_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.meshing.grid_size, default_grid_size());
        assert_eq!(cfg.meshing.max_vertices_per_voxel, 15);
        assert_eq!(cfg.runner.max_ticks, None);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_document_uses_defaults() {
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = Config::from_json(
            r#"{ "meshing": { "grid_size": [256, 256, 256] }, "runner": { "max_ticks": 10 } }"#,
        )
        .unwrap();

        assert_eq!(cfg.meshing.grid_size, [256, 256, 256]);
        assert_eq!(cfg.meshing.mesh_shader, default_mesh_shader());
        assert_eq!(cfg.runner.max_ticks, Some(10));
        assert_eq!(cfg.runner.tick_interval_ms, 16);
        assert_eq!(cfg.world, WorldConfig::default());
    }

    #[test]
    fn degenerate_grids_are_rejected() {
        let mut cfg = Config::default();
        cfg.meshing.grid_size = [64, 0, 64];
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.meshing.max_vertices_per_voxel = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.meshing.grid_size = [4096, 4096, 4096];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn origin_outside_the_chunk_domain_is_rejected() {
        let mut cfg = Config::default();
        cfg.world.origin = [8, AXIS_EXTENT, 8];
        let error = cfg.validate().unwrap_err();
        assert!(error.to_string().contains("world.origin"));

        cfg.world.origin = [AXIS_EXTENT - 1, 0, AXIS_EXTENT - 1];
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(Config::from_json("{ not json").is_err());
        assert!(Config::load("does/not/exist.json").is_err());
    }
}
