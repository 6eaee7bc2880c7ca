use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::types::{DEFAULT_LOOP_SECONDS, MAX_BLOCK_FRAMES, SAMPLE_RATE};

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub devices: DeviceConfig,

    #[serde(default)]
    pub engine: EngineConfig,
}

/// Device configuration
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Input device name or index; system default when unset.
    pub input: Option<String>,

    /// Output device name or index; system default when unset.
    pub output: Option<String>,
}

/// Engine configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Two-channel tracks and ports.
    #[serde(default = "default_stereo")]
    pub stereo: bool,

    /// Per-track loop capacity in seconds.
    #[serde(default = "default_seconds")]
    pub seconds: usize,

    /// Transport buffer size in frames.
    #[serde(default = "default_buffer_frames")]
    pub buffer_frames: u32,
}

fn default_stereo() -> bool {
    true
}

fn default_seconds() -> usize {
    DEFAULT_LOOP_SECONDS
}

fn default_buffer_frames() -> u32 {
    256
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stereo: default_stereo(),
            seconds: default_seconds(),
            buffer_frames: default_buffer_frames(),
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML in: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.engine.seconds == 0 || self.engine.seconds > 600 {
            anyhow::bail!(
                "Loop capacity must be between 1 and 600 seconds, got {}",
                self.engine.seconds
            );
        }

        let frames = self.engine.buffer_frames;
        if frames < 16 || frames as usize > MAX_BLOCK_FRAMES {
            anyhow::bail!(
                "Buffer size must be between 16 and {} frames, got {}",
                MAX_BLOCK_FRAMES,
                frames
            );
        }

        Ok(())
    }

    /// Per-track capacity in samples; `SAMPLE_LIMIT` with the defaults.
    pub fn max_idx(&self) -> usize {
        self.engine.seconds * SAMPLE_RATE as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SAMPLE_LIMIT;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.engine.stereo);
        assert_eq!(config.engine.seconds, DEFAULT_LOOP_SECONDS);
        assert_eq!(config.engine.buffer_frames, 256);
        assert!(config.devices.input.is_none());
        assert_eq!(config.max_idx(), SAMPLE_LIMIT);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = "\
devices:
  input: \"USB Audio\"
  output: \"1\"
engine:
  stereo: false
  seconds: 30
  buffer_frames: 128
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.devices.input.as_deref(), Some("USB Audio"));
        assert_eq!(config.devices.output.as_deref(), Some("1"));
        assert!(!config.engine.stereo);
        assert_eq!(config.max_idx(), 30 * 44_100);
        assert_eq!(config.engine.buffer_frames, 128);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "engine:\n  seconds: 10\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.engine.stereo);
        assert_eq!(config.engine.seconds, 10);
        assert_eq!(config.engine.buffer_frames, 256);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let zero_seconds: Config = serde_yaml::from_str("engine:\n  seconds: 0\n").unwrap();
        assert!(zero_seconds.validate().is_err());

        let huge_buffer: Config =
            serde_yaml::from_str("engine:\n  buffer_frames: 65536\n").unwrap();
        assert!(huge_buffer.validate().is_err());
    }
}
