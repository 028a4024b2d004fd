use std::time::Duration;

/// Settings handed to the cycle services, distilled from the full
/// [`crate::infrastructure_config::Config`] at bootstrap.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Time between cycle *starts*; an overrunning cycle is followed
    /// immediately by the next one.
    pub cycle_interval: Duration,
    /// Cycle failures in a row before the engine gives up.
    pub max_consecutive_failures: u32,
    /// Floor for the hottest temperature bucket's tile count.
    pub min_hottest_bucket: usize,
}
