//! Runtime configuration, built once at startup and handed to every unit.
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::ChunkDims;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub world: WorldSection,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WorldSection {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_world_height")]
    pub world_height: usize,
    #[serde(default = "default_voxel_size")]
    pub voxel_size: f32,
}
fn default_chunk_size() -> usize {
    16
}
fn default_world_height() -> usize {
    8
}
fn default_voxel_size() -> f32 {
    16.0
}
impl Default for WorldSection {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            world_height: default_world_height(),
            voxel_size: default_voxel_size(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_primary_name")]
    pub primary_name: String,
    #[serde(default = "default_random_id_len")]
    pub random_id_len: usize,
    #[serde(default = "default_wait_ms")]
    pub connection_wait_ms: u64,
    #[serde(default = "default_fingerprint_len")]
    pub fingerprint_len: usize,
}
fn default_primary_name() -> String {
    "Main".to_string()
}
fn default_random_id_len() -> usize {
    5
}
fn default_wait_ms() -> u64 {
    1000
}
fn default_fingerprint_len() -> usize {
    6
}
impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            primary_name: default_primary_name(),
            random_id_len: default_random_id_len(),
            connection_wait_ms: default_wait_ms(),
            fingerprint_len: default_fingerprint_len(),
        }
    }
}
impl ServiceConfig {
    #[inline]
    pub fn connection_wait(&self) -> Duration {
        Duration::from_millis(self.connection_wait_ms)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,
    #[serde(default = "default_recent_ttl_ms")]
    pub recent_ttl_ms: u64,
    #[serde(default = "default_gc_interval_ms")]
    pub gc_interval_ms: u64,
    #[serde(default = "default_max_recent")]
    pub max_recent: usize,
    #[serde(default = "default_seed")]
    pub seed: i32,
    #[serde(default = "default_gen_distance")]
    pub distance: i32,
}
fn default_workers() -> usize {
    2
}
fn default_queue_size() -> usize {
    256
}
fn default_recent_ttl_ms() -> u64 {
    10_000
}
fn default_gc_interval_ms() -> u64 {
    1000
}
fn default_max_recent() -> usize {
    1024
}
fn default_seed() -> i32 {
    1123
}
fn default_gen_distance() -> i32 {
    4
}
impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_size: default_queue_size(),
            wait_ms: default_wait_ms(),
            recent_ttl_ms: default_recent_ttl_ms(),
            gc_interval_ms: default_gc_interval_ms(),
            max_recent: default_max_recent(),
            seed: default_seed(),
            distance: default_gen_distance(),
        }
    }
}
impl GenerationConfig {
    #[inline]
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
    #[inline]
    pub fn recent_ttl(&self) -> Duration {
        Duration::from_millis(self.recent_ttl_ms)
    }
    #[inline]
    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_queue_size")]
    pub to_render_capacity: usize,
    #[serde(default = "default_finished_capacity")]
    pub finished_capacity: usize,
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,
    #[serde(default = "default_recent_ttl_ms")]
    pub recent_ttl_ms: u64,
    #[serde(default = "default_gc_interval_ms")]
    pub gc_interval_ms: u64,
    #[serde(default = "default_max_recent")]
    pub max_recent: usize,
    #[serde(default = "default_max_voxels_per_frame")]
    pub max_voxels_per_frame: usize,
    #[serde(default = "default_overflow_evict")]
    pub overflow_evict: usize,
    #[serde(default = "default_defer_delay_ms")]
    pub defer_delay_ms: u64,
    #[serde(default = "default_render_distance")]
    pub distance: i32,
}
fn default_finished_capacity() -> usize {
    64
}
fn default_max_voxels_per_frame() -> usize {
    1000
}
fn default_overflow_evict() -> usize {
    8
}
fn default_defer_delay_ms() -> u64 {
    5
}
fn default_render_distance() -> i32 {
    3
}
impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            to_render_capacity: default_queue_size(),
            finished_capacity: default_finished_capacity(),
            wait_ms: default_wait_ms(),
            recent_ttl_ms: default_recent_ttl_ms(),
            gc_interval_ms: default_gc_interval_ms(),
            max_recent: default_max_recent(),
            max_voxels_per_frame: default_max_voxels_per_frame(),
            overflow_evict: default_overflow_evict(),
            defer_delay_ms: default_defer_delay_ms(),
            distance: default_render_distance(),
        }
    }
}
impl RenderConfig {
    #[inline]
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
    #[inline]
    pub fn recent_ttl(&self) -> Duration {
        Duration::from_millis(self.recent_ttl_ms)
    }
    #[inline]
    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms)
    }
    #[inline]
    pub fn defer_delay(&self) -> Duration {
        Duration::from_millis(self.defer_delay_ms)
    }
}

impl Config {
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(src)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let src = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    #[inline]
    pub fn dims(&self) -> ChunkDims {
        ChunkDims::new(self.world.chunk_size, self.world.world_height)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, bool); 7] = [
            ("world.chunk_size", self.world.chunk_size > 0),
            ("world.world_height", self.world.world_height > 0),
            ("service.random_id_len", self.service.random_id_len > 0),
            ("generation.queue_size", self.generation.queue_size > 0),
            ("render.to_render_capacity", self.render.to_render_capacity > 0),
            ("render.finished_capacity", self.render.finished_capacity > 0),
            ("render.max_voxels_per_frame", self.render.max_voxels_per_frame > 0),
        ];
        for (field, ok) in checks {
            if !ok {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero",
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.dims(), ChunkDims::new(16, 8));
        assert_eq!(cfg.service.primary_name, "Main");
        assert_eq!(cfg.generation.workers, 2);
        assert_eq!(cfg.generation.recent_ttl(), Duration::from_secs(10));
        assert_eq!(cfg.render.max_voxels_per_frame, 1000);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            [world]
            chunk_size = 8

            [render]
            max_voxels_per_frame = 200
            "#,
        )
        .unwrap();
        assert_eq!(cfg.world.chunk_size, 8);
        assert_eq!(cfg.world.world_height, 8);
        assert_eq!(cfg.render.max_voxels_per_frame, 200);
        assert_eq!(cfg.render.finished_capacity, 64);
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let err = Config::from_toml_str("[world]\nworld_height = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "world.world_height",
                ..
            }
        ));
        assert!(matches!(
            Config::from_toml_str("[world]\nchunk_size = \"big\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
