pub mod logging;
pub mod runtime;
pub mod types;

pub use logging::{LogFormat, LoggingConfig};
pub use runtime::{DrainMode, LatePolicy, RuntimeConfig};
pub use types::HumanDuration;

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// RillConfig — top-level configuration
// ---------------------------------------------------------------------------

/// Top-level engine configuration, deserialized from `rill.toml`.
///
/// Every section is optional; an empty file yields a fully defaulted
/// configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RillConfig {
    pub logging: LoggingConfig,
    pub runtime: RuntimeConfig,
}

impl RillConfig {
    /// Load and parse a config file from disk.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("config file '{}': {e}", path.display()))?;
        text.parse()
    }
}

impl FromStr for RillConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s).map_err(|e| anyhow::anyhow!("config parse error: {e}"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- 1. empty_config_defaults --------------------------------------------

    #[test]
    fn empty_config_defaults() {
        let config: RillConfig = "".parse().unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.runtime.late_policy, LatePolicy::Drop);
        assert_eq!(config.runtime.drain, DrainMode::Discard);
        assert_eq!(config.runtime.channel_capacity, 1024);
    }

    // -- 2. full_config_parses -----------------------------------------------

    #[test]
    fn full_config_parses() {
        let toml_str = r#"
[logging]
level = "debug"
format = "json"
file = "rill.log"

[runtime]
late_policy = "drop"
drain = "flush"
channel_capacity = 64
tick_interval = "250ms"
"#;
        let config: RillConfig = toml_str.parse().unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.runtime.drain, DrainMode::Flush);
        assert_eq!(config.runtime.channel_capacity, 64);
        assert_eq!(
            config.runtime.tick_interval.as_duration(),
            std::time::Duration::from_millis(250),
        );
    }

    // -- 3. unknown_drain_rejected -------------------------------------------

    #[test]
    fn unknown_drain_rejected() {
        let result: Result<RillConfig, _> = "[runtime]\ndrain = \"keep\"\n".parse();
        assert!(result.is_err());
    }
}
