//! Engine configuration loaded from a JSON5 file.

use serde::Deserialize;
use std::{fs, num::NonZeroUsize, path::Path, time::Duration};
use thiserror::Error;

/// The default configuration, also written out by the headless runner on request.
pub const DEFAULT_CONFIG: &str = include_str!("../package-content/quartz_config.json5");

/// Failure to load an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid JSON5 or has unexpected fields.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json5::Error),
    /// The values parsed but are out of range.
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Tunables for the tick scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Ticks per second the host drives [`advance_tick`](crate::ticks::TickScheduler::advance_tick) at.
    pub target_tps: u32,
    /// Maximum number of tracked sites, `None` for no cap.
    pub max_active_sites: Option<NonZeroUsize>,
    /// A site blocked for this many ticks is reported once in the log.
    pub blocked_warn_ticks: u64,
    /// Effects beyond this count in one cycle are dropped.
    pub max_effects_per_site: usize,
}

impl EngineConfig {
    /// Parses a JSON5 document and validates it.
    pub fn from_json5(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json5::from_str(source)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Loads the config at `path`, falling back to the defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let source = fs::read_to_string(path)?;
        Self::from_json5(&source)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(1..=1000).contains(&self.target_tps) {
            return Err("target_tps must be in range 1..=1000");
        }
        if self.blocked_warn_ticks == 0 {
            return Err("blocked_warn_ticks must be at least 1");
        }
        if !(1..=256).contains(&self.max_effects_per_site) {
            return Err("max_effects_per_site must be in range 1..=256");
        }
        Ok(())
    }

    /// Wall-clock length of one tick at the target rate.
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.target_tps.max(1)))
    }

    /// Number of whole ticks that fit in `duration` at the target rate.
    #[must_use]
    pub fn ticks_for(&self, duration: Duration) -> u64 {
        let per_tick = self.tick_duration().as_nanos();
        (duration.as_nanos() / per_tick) as u64
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_tps: 20,
            max_active_sites: None,
            blocked_warn_ticks: 1200,
            max_effects_per_site: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_default_matches_default_impl() {
        let parsed = EngineConfig::from_json5(DEFAULT_CONFIG).expect("default config parses");
        assert_eq!(parsed, EngineConfig::default());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config =
            EngineConfig::from_json5("{ max_active_sites: 8 }").expect("partial config parses");
        assert_eq!(config.max_active_sites.map(NonZeroUsize::get), Some(8));
        assert_eq!(config.target_tps, 20);
    }

    #[test]
    fn test_validation_rejects_zero_tps() {
        let err = EngineConfig::from_json5("{ target_tps: 0 }").expect_err("zero tps");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_field_is_parse_error() {
        let err = EngineConfig::from_json5("{ view_distance: 10 }").expect_err("unknown field");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_tick_helpers() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_duration(), Duration::from_millis(50));
        assert_eq!(config.ticks_for(Duration::from_secs(3)), 60);
        assert_eq!(config.ticks_for(Duration::from_millis(49)), 0);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = EngineConfig::load_or_default(Path::new("does/not/exist.json5"))
            .expect("missing file is not an error");
        assert_eq!(config, EngineConfig::default());
    }
}
