use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{JobError, JobResult};

/// Settings of one extraction job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Decode workers; each owns one input file at a time.
    pub workers: usize,
    /// Output writers.
    pub writers: usize,
    /// Capacity of the file queue and of the batch queue.
    pub queue_depth: usize,
    /// Write `.json.gz` instead of `.json`.
    pub compress_output: bool,
    /// An output file is rotated once appending would take it past this.
    pub max_output_bytes: u64,
    /// Emit `_deleted` lines for deleted documents.
    pub include_deleted: bool,
    pub output_dir: PathBuf,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            writers: 2,
            queue_depth: 16,
            compress_output: false,
            max_output_bytes: 256 * 1024 * 1024,
            include_deleted: true,
            output_dir: PathBuf::from("."),
        }
    }
}

impl ExtractConfig {
    pub fn from_toml_str(s: &str) -> JobResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| JobError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> JobResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> JobResult<String> {
        toml::to_string_pretty(self).map_err(|e| JobError::Config(e.to_string()))
    }

    pub fn validate(&self) -> JobResult<()> {
        let checks = [
            ("workers", self.workers as u64),
            ("writers", self.writers as u64),
            ("queue_depth", self.queue_depth as u64),
            ("max_output_bytes", self.max_output_bytes),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(JobError::Config(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ExtractConfig::default();
        assert_eq!(c.workers, 4);
        assert_eq!(c.writers, 2);
        assert_eq!(c.queue_depth, 16);
        assert_eq!(c.max_output_bytes, 256 * 1024 * 1024);
        assert!(!c.compress_output);
        assert!(c.include_deleted);
        assert_eq!(c.output_dir, PathBuf::from("."));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = ExtractConfig::from_toml_str("workers = 8\ncompress_output = true\n").unwrap();
        assert_eq!(c.workers, 8);
        assert!(c.compress_output);
        assert_eq!(c.writers, 2);
    }

    #[test]
    fn zero_values_are_rejected() {
        for text in ["workers = 0", "writers = 0", "queue_depth = 0", "max_output_bytes = 0"] {
            assert!(matches!(ExtractConfig::from_toml_str(text), Err(JobError::Config(_))));
        }
    }

    #[test]
    fn unknown_types_are_config_errors() {
        assert!(matches!(
            ExtractConfig::from_toml_str("workers = \"many\""),
            Err(JobError::Config(_))
        ));
    }

    #[test]
    fn toml_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uncouch.toml");
        let config = ExtractConfig {
            output_dir: dir.path().to_path_buf(),
            include_deleted: false,
            ..Default::default()
        };
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();
        assert_eq!(ExtractConfig::load(&path).unwrap(), config);
    }
}
