use std::time::Duration;

/// Timing knobs for the hub and its sweeper.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubConfig {
    /// How long a single poll waits for an event.
    pub poll_timeout: Duration,
    /// Inactivity after which a client entry is evicted.
    pub idle_threshold: Duration,
    /// How often the sweeper runs.
    pub sweep_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(30),
            idle_threshold: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}
