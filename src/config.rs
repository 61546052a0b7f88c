use crate::api::units::{DataRate, TimeDelta};

/// Lower bound any configured min bitrate is raised to.
pub const CONGESTION_CONTROLLER_MIN_BITRATE: DataRate = DataRate::from_bits_per_sec(5_000);
/// Upper bound used when no valid max bitrate is configured.
pub const DEFAULT_MAX_BITRATE: DataRate = DataRate::from_bits_per_sec(1_000_000_000);

/// Everything tunable about the send-side controller.
///
/// Normally these knobs are scattered over process-wide network settings and
/// field trial strings. Here they are one type safe value, built once and
/// passed by reference to each component.
#[derive(Clone, Debug)]
pub struct Config {
    /// Start, min and max bitrate of the session.
    pub bitrates: BitrateConfig,

    /// WebRTC-BweLossExperiment
    pub loss_thresholds: LossThresholds,

    /// WebRTC-Bwe-MaxRttLimit
    pub max_rtt_limit: RttBasedBackoffConfig,

    /// Multiple of the tracked link capacity the target may reach.
    pub link_capacity_safety_factor: f64,

    pub pacing: PacingConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = &self.loss_thresholds;
        if !(thresholds.low_loss_threshold >= 0.0
            && thresholds.high_loss_threshold <= 1.0
            && thresholds.low_loss_threshold <= thresholds.high_loss_threshold)
        {
            return Err(ConfigError::LossThresholds {
                low: thresholds.low_loss_threshold,
                high: thresholds.high_loss_threshold,
            });
        }

        let fraction = self.max_rtt_limit.drop_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ConfigError::DropFraction(fraction));
        }

        if self.pacing.interval <= TimeDelta::zero() || self.pacing.interval.is_infinite() {
            return Err(ConfigError::PacingInterval(self.pacing.interval));
        }

        if self.bitrates.start.is_zero() || self.bitrates.start.is_infinite() {
            return Err(ConfigError::StartBitrate(self.bitrates.start));
        }

        if !(self.link_capacity_safety_factor >= 1.0) {
            return Err(ConfigError::SafetyFactor(self.link_capacity_safety_factor));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bitrates: BitrateConfig::default(),
            loss_thresholds: LossThresholds::default(),
            max_rtt_limit: RttBasedBackoffConfig::default(),
            link_capacity_safety_factor: 1.5,
            pacing: PacingConfig::default(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BitrateConfig {
    pub start: DataRate,
    pub min: DataRate,
    pub max: DataRate,
}

impl Default for BitrateConfig {
    fn default() -> Self {
        Self {
            start: DataRate::from_kilobits_per_sec(2_000),
            min: CONGESTION_CONTROLLER_MIN_BITRATE,
            max: DEFAULT_MAX_BITRATE,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LossThresholds {
    /// Loss ratio at or below which the estimate ramps up.
    pub low_loss_threshold: f32,
    /// Loss ratio above which the estimate backs off.
    pub high_loss_threshold: f32,
    /// Loss is ignored while the target is below this rate.
    pub bitrate_threshold: DataRate,
}

impl Default for LossThresholds {
    fn default() -> Self {
        Self {
            low_loss_threshold: 0.02,
            high_loss_threshold: 0.1,
            bitrate_threshold: DataRate::zero(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RttBasedBackoffConfig {
    pub disabled: bool,              // Disabled
    pub configured_limit: TimeDelta, // limit
    pub drop_fraction: f64,          // fraction
    pub drop_interval: TimeDelta,    // interval
    pub bandwidth_floor: DataRate,   // floor
}

impl Default for RttBasedBackoffConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            configured_limit: TimeDelta::from_seconds(3),
            drop_fraction: 0.8,
            drop_interval: TimeDelta::from_seconds(1),
            bandwidth_floor: DataRate::from_kilobits_per_sec(5),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PacingConfig {
    /// Period of the publisher tick.
    pub interval: TimeDelta,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            interval: TimeDelta::from_millis(5),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("loss thresholds must satisfy 0 <= low <= high <= 1, got {low} and {high}")]
    LossThresholds { low: f32, high: f32 },

    #[error("rtt backoff drop fraction must be in (0, 1], got {0}")]
    DropFraction(f64),

    #[error("pacing interval must be positive and finite, got {0:?}")]
    PacingInterval(TimeDelta),

    #[error("start bitrate must be positive and finite, got {0:?}")]
    StartBitrate(DataRate),

    #[error("link capacity safety factor must be at least 1, got {0}")]
    SafetyFactor(f64),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = Config::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.bitrates.start, DataRate::from_kilobits_per_sec(2000));
        assert_eq!(config.pacing.interval, TimeDelta::from_millis(5));
        assert_eq!(config.max_rtt_limit.configured_limit, TimeDelta::from_seconds(3));
    }

    #[test]
    fn rejects_inverted_loss_thresholds() {
        let mut config = Config::default();
        config.loss_thresholds.low_loss_threshold = 0.2;
        assert_eq!(
            config.validate(),
            Err(ConfigError::LossThresholds {
                low: 0.2,
                high: 0.1
            })
        );
    }

    #[test]
    fn zero_low_loss_threshold_is_valid() {
        let mut config = Config::default();
        config.loss_thresholds.low_loss_threshold = 0.0;
        assert_eq!(config.validate(), Ok(()));

        config.loss_thresholds.low_loss_threshold = -0.1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LossThresholds { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_drop_fraction() {
        let mut config = Config::default();
        config.max_rtt_limit.drop_fraction = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::DropFraction(0.0)));

        config.max_rtt_limit.drop_fraction = 1.5;
        assert_eq!(config.validate(), Err(ConfigError::DropFraction(1.5)));

        config.max_rtt_limit.drop_fraction = 1.0;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_degenerate_pacing_and_start() {
        let mut config = Config::default();
        config.pacing.interval = TimeDelta::zero();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PacingInterval(_))
        ));

        let mut config = Config::default();
        config.bitrates.start = DataRate::zero();
        assert!(matches!(config.validate(), Err(ConfigError::StartBitrate(_))));
    }

    #[test]
    fn error_messages_name_the_knob() {
        let message = ConfigError::DropFraction(2.0).to_string();
        assert!(message.contains("drop fraction"));
    }
}
