//! Executor configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, SimtError};

/// Hardware limits the executor enforces on every launch.
///
/// Defaults match a current CUDA device (compute capability 7.x and later).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceLimits {
    pub max_threads_per_block: u32,
    pub max_block_dim: (u32, u32, u32),
    pub max_grid_dim: (u32, u32, u32),
    /// Shared memory available to one block, in bytes.
    pub max_shared_mem_bytes: usize,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_threads_per_block: 1024,
            max_block_dim: (1024, 1024, 64),
            max_grid_dim: (i32::MAX as u32, 65535, 65535),
            max_shared_mem_bytes: 48 * 1024,
        }
    }
}

/// How the executor schedules blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Size of a dedicated worker pool. `None` runs blocks on rayon's global pool.
    pub worker_threads: Option<usize>,

    /// When false, blocks execute one after another on the calling thread.
    pub parallel_blocks: bool,

    pub limits: DeviceLimits,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            parallel_blocks: true,
            limits: DeviceLimits::default(),
        }
    }
}

impl ExecutorConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Build a config from `SIMTK_WORKER_THREADS` and `SIMTK_SERIAL`.
    ///
    /// Unset, empty, zero or unparsable worker counts fall back to the global pool.
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var("SIMTK_WORKER_THREADS").ok().as_deref(),
            std::env::var("SIMTK_SERIAL").ok().as_deref(),
        )
    }

    fn from_vars(workers: Option<&str>, serial: Option<&str>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = workers {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.worker_threads = Some(n),
                Ok(_) => {}
                Err(_) if raw.trim().is_empty() => {}
                Err(_) => tracing::warn!(
                    value = raw,
                    "ignoring unparsable SIMTK_WORKER_THREADS"
                ),
            }
        }

        if let Some(raw) = serial {
            let raw = raw.trim().to_ascii_lowercase();
            if matches!(raw.as_str(), "1" | "true" | "yes") {
                config.parallel_blocks = false;
            }
        }

        config
    }

    /// Reject configurations no launch could satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == Some(0) {
            return Err(SimtError::Config("worker_threads must be positive".into()));
        }
        let l = &self.limits;
        if l.max_threads_per_block == 0 || l.max_shared_mem_bytes == 0 {
            return Err(SimtError::Config(
                "device limits must be non-zero".into(),
            ));
        }
        let (bx, by, bz) = l.max_block_dim;
        let (gx, gy, gz) = l.max_grid_dim;
        if [bx, by, bz, gx, gy, gz].contains(&0) {
            return Err(SimtError::Config(
                "block and grid dimension limits must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExecutorConfig::default();
        assert!(config.parallel_blocks);
        assert_eq!(config.worker_threads, None);
        assert_eq!(config.limits.max_threads_per_block, 1024);
        assert_eq!(config.limits.max_shared_mem_bytes, 49152);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = ExecutorConfig::from_json_str(r#"{"parallel_blocks": false}"#).unwrap();
        assert!(!config.parallel_blocks);
        assert_eq!(config.limits, DeviceLimits::default());

        let config = ExecutorConfig::from_json_str(
            r#"{"worker_threads": 3, "limits": {"max_threads_per_block": 256}}"#,
        )
        .unwrap();
        assert_eq!(config.worker_threads, Some(3));
        assert_eq!(config.limits.max_threads_per_block, 256);
        assert_eq!(config.limits.max_block_dim, (1024, 1024, 64));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ExecutorConfig::from_json_str("{not json"),
            Err(SimtError::Json(_))
        ));
        assert!(matches!(
            ExecutorConfig::from_json_str(r#"{"worker_threads": 0}"#),
            Err(SimtError::Config(_))
        ));
        assert!(matches!(
            ExecutorConfig::from_json_str(r#"{"limits": {"max_grid_dim": [0, 1, 1]}}"#),
            Err(SimtError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ExecutorConfig::from_json_file("/nonexistent/simtk.json"),
            Err(SimtError::Io(_))
        ));
    }

    #[test]
    fn test_from_vars() {
        let c = ExecutorConfig::from_vars(Some("4"), None);
        assert_eq!(c.worker_threads, Some(4));
        assert!(c.parallel_blocks);

        let c = ExecutorConfig::from_vars(Some("0"), Some("TRUE"));
        assert_eq!(c.worker_threads, None);
        assert!(!c.parallel_blocks);

        let c = ExecutorConfig::from_vars(Some("many"), Some("no"));
        assert_eq!(c.worker_threads, None);
        assert!(c.parallel_blocks);

        let c = ExecutorConfig::from_vars(Some(""), Some("yes"));
        assert_eq!(c.worker_threads, None);
        assert!(!c.parallel_blocks);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = ExecutorConfig {
            worker_threads: Some(2),
            parallel_blocks: false,
            limits: DeviceLimits::default(),
        };
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(ExecutorConfig::from_json_str(&text).unwrap(), config);
    }
}
