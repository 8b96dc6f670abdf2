use crate::error::{QueueError, Result};

/// Runtime configuration for the queue core.
///
/// Values come from defaults, overridable through `CLINIQ_*` environment
/// variables. Per-clinic settings (operating mode, waitlist enablement)
/// travel with each call instead; this struct only holds process-wide knobs.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Minutes an absent patient may take to return before the grace
    /// deadline lapses.
    pub grace_period_minutes: i64,
    /// Capacity of the event broadcast channel.
    pub event_channel_capacity: usize,
    /// Priority subtracted when a fluid-mode patient returns late.
    pub late_arrival_priority_penalty: i32,
    /// Priority added when a hybrid-mode late arrival is routed to the waitlist.
    pub late_arrival_waitlist_boost: i32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            grace_period_minutes: 15,
            event_channel_capacity: 1000,
            late_arrival_priority_penalty: 10,
            late_arrival_waitlist_boost: 10,
        }
    }
}

impl CoreConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(grace) = std::env::var("CLINIQ_GRACE_PERIOD_MINUTES") {
            config.grace_period_minutes = grace.parse().map_err(|e| {
                QueueError::Configuration(format!("invalid grace_period_minutes: {e}"))
            })?;
        }

        if let Ok(capacity) = std::env::var("CLINIQ_EVENT_CHANNEL_CAPACITY") {
            config.event_channel_capacity = capacity.parse().map_err(|e| {
                QueueError::Configuration(format!("invalid event_channel_capacity: {e}"))
            })?;
        }

        if let Ok(penalty) = std::env::var("CLINIQ_LATE_ARRIVAL_PENALTY") {
            config.late_arrival_priority_penalty = penalty.parse().map_err(|e| {
                QueueError::Configuration(format!("invalid late_arrival_penalty: {e}"))
            })?;
        }

        if let Ok(boost) = std::env::var("CLINIQ_WAITLIST_BOOST") {
            config.late_arrival_waitlist_boost = boost.parse().map_err(|e| {
                QueueError::Configuration(format!("invalid waitlist_boost: {e}"))
            })?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.grace_period_minutes, 15);
        assert_eq!(config.event_channel_capacity, 1000);
    }

    #[test]
    fn test_from_env_rejects_garbage() {
        std::env::set_var("CLINIQ_GRACE_PERIOD_MINUTES", "soon");
        let result = CoreConfig::from_env();
        std::env::remove_var("CLINIQ_GRACE_PERIOD_MINUTES");
        assert!(matches!(result, Err(QueueError::Configuration(_))));
    }
}
