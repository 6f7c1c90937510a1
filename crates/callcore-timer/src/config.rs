use std::time::Duration;

/// Session-timer configuration, named to match RFC 4028 vocabulary.
#[derive(Debug, Clone)]
pub struct Config {
    pub default_expires: u32,
    pub min_se: u32,
    pub max_se: u32,
    /// How often the background sweep runs. Defaults to 30s; exposed
    /// here so tests can drive a much shorter interval.
    pub cleanup_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_expires: 1800,
            min_se: 90,
            max_se: 7200,
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Clamp a requested Session-Expires value into `[min_se, max_se]`.
    /// A requested value of zero is treated as "not specified" and
    /// floors at `min_se`.
    pub fn clamp(&self, requested: u32) -> u32 {
        if requested == 0 {
            self.min_se
        } else {
            requested.clamp(self.min_se, self.max_se)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_requested_clamps_to_min_se() {
        let cfg = Config { min_se: 90, max_se: 7200, ..Config::default() };
        assert_eq!(cfg.clamp(0), 90);
    }

    #[test]
    fn below_min_clamps_up_and_above_max_clamps_down() {
        let cfg = Config { min_se: 90, max_se: 7200, ..Config::default() };
        assert_eq!(cfg.clamp(10), 90);
        assert_eq!(cfg.clamp(99999), 7200);
    }

    #[test]
    fn within_range_is_unchanged() {
        let cfg = Config { min_se: 90, max_se: 7200, ..Config::default() };
        assert_eq!(cfg.clamp(1800), 1800);
    }
}
