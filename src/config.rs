use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings of a [`crate::BehaviorTree`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TreeConfig {
    /// Ticks per second of continuous execution.
    pub tick_rate: u32,
}

impl TreeConfig {
    pub const MIN_TICK_RATE: u32 = 1;
    pub const MAX_TICK_RATE: u32 = 60;
    pub const DEFAULT_TICK_RATE: u32 = 10;

    pub fn new(tick_rate: u32) -> Self {
        Self {
            tick_rate: Self::clamp_tick_rate(tick_rate),
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let config: Self = serde_yaml::from_str(yaml)?;
        Ok(Self::new(config.tick_rate))
    }

    pub fn clamp_tick_rate(rate: u32) -> u32 {
        rate.clamp(Self::MIN_TICK_RATE, Self::MAX_TICK_RATE)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / Self::clamp_tick_rate(self.tick_rate)
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            tick_rate: Self::DEFAULT_TICK_RATE,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_yaml() {
        assert_eq!(TreeConfig::from_yaml_str("tickRate: 30").unwrap().tick_rate, 30);
        assert_eq!(TreeConfig::from_yaml_str("tickRate: 500").unwrap().tick_rate, 60);
        assert_eq!(TreeConfig::from_yaml_str("tickRate: 0").unwrap().tick_rate, 1);
        assert_eq!(TreeConfig::from_yaml_str("{}").unwrap(), TreeConfig::default());
        assert!(TreeConfig::from_yaml_str("tickRate: fast").is_err());
    }

    #[test]
    fn test_interval() {
        assert_eq!(
            TreeConfig::new(10).tick_interval(),
            Duration::from_millis(100)
        );
    }
}
