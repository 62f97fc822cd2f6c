// ── Runtime bridge configuration ──
//
// Describes which controller to reach and which points to expose.
// Never touches disk: the CLI (via creskit-config) or an embedding host
// builds a `BridgeConfig` and hands it to `Bridge::new`.

use std::collections::HashSet;
use std::time::Duration;

use creskit_proto::PeerConfig;

use crate::error::CoreError;
use crate::model::PointConfig;

/// Default gap between retransmissions of unanswered gets.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(2000);

/// Everything a [`Bridge`](crate::Bridge) needs to run.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Controller address and reconnect tuning.
    pub peer: PeerConfig,
    /// Bridged devices. `(kind, id)` must be unique.
    pub points: Vec<PointConfig>,
    /// Period of the retry tick.
    pub retry_interval: Duration,
    /// Retransmissions before a get gives up. `None` = never give up.
    pub max_retries: Option<u32>,
    /// Issue the startup state read for kinds that have one.
    pub prime_on_start: bool,
}

impl BridgeConfig {
    pub fn new(peer: PeerConfig) -> Self {
        Self {
            peer,
            points: Vec::new(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_retries: None,
            prime_on_start: true,
        }
    }

    /// Builder-style point registration.
    #[must_use]
    pub fn with_point(mut self, point: PointConfig) -> Self {
        self.points.push(point);
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.retry_interval.is_zero() {
            return Err(CoreError::Config {
                message: "retry interval must be greater than zero".into(),
            });
        }

        let mut seen = HashSet::new();
        for point in &self.points {
            if point.id.is_empty() || point.id.contains([':', '*']) {
                return Err(CoreError::Config {
                    message: format!("{} has an invalid id {:?}", point.kind, point.id),
                });
            }
            if !seen.insert((point.kind, point.id.as_str())) {
                return Err(CoreError::Config {
                    message: format!("duplicate point {} {}", point.kind, point.id),
                });
            }
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PointKind;

    fn base() -> BridgeConfig {
        BridgeConfig::new(PeerConfig::new("10.0.0.2", 41794))
    }

    #[test]
    fn defaults() {
        let config = base();
        assert_eq!(config.retry_interval, Duration::from_millis(2000));
        assert!(config.max_retries.is_none());
        assert!(config.prime_on_start);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn same_id_in_different_kinds_is_fine() {
        let config = base()
            .with_point(PointConfig::new(PointKind::Lightbulb, "1", "Hall"))
            .with_point(PointConfig::new(PointKind::Switch, "1", "Porch"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn duplicate_point_is_rejected() {
        let config = base()
            .with_point(PointConfig::new(PointKind::Lock, "1", "Front"))
            .with_point(PointConfig::new(PointKind::Lock, "1", "Back"));
        assert!(matches!(config.validate(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn delimiter_in_id_is_rejected() {
        let config = base().with_point(PointConfig::new(PointKind::Lock, "1:2", "Front"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_retry_interval_is_rejected() {
        let mut config = base();
        config.retry_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
