//! Preset configurations
//!
//! Presets provide complete defaults for common deployment shapes.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::error::ConfigError;

/// Configuration preset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Interactive tooling: events visible within ~250ms
    ///
    /// - queue: 1 000, batch: 10, flush: 250ms
    LowLatency,

    /// General purpose
    ///
    /// - queue: 10 000, batch: 100, flush: 5s
    #[default]
    Balanced,

    /// Bulk backfills: large batches, fewer transactions
    ///
    /// - queue: 100 000, batch: 1 000, flush: 10s
    HighThroughput,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LowLatency => "low_latency",
            Self::Balanced => "balanced",
            Self::HighThroughput => "high_throughput",
        }
    }
}

impl FromStr for Preset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "low_latency" => Ok(Self::LowLatency),
            "balanced" => Ok(Self::Balanced),
            "high_throughput" => Ok(Self::HighThroughput),
            _ => Err(ConfigError::UnknownPreset(s.to_string())),
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_parsing() {
        assert_eq!("balanced".parse::<Preset>().unwrap(), Preset::Balanced);
        assert_eq!("Low-Latency".parse::<Preset>().unwrap(), Preset::LowLatency);
        assert_eq!(
            "high_throughput".parse::<Preset>().unwrap(),
            Preset::HighThroughput
        );
        assert!(matches!(
            "turbo".parse::<Preset>(),
            Err(ConfigError::UnknownPreset(name)) if name == "turbo"
        ));
    }

    #[test]
    fn test_default_is_balanced() {
        assert_eq!(Preset::default(), Preset::Balanced);
        assert_eq!(Preset::default().to_string(), "balanced");
    }
}
