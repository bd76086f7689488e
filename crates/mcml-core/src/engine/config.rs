use thiserror::Error;

/// Photons handed to one worker at a time in parallel mode.
pub const DEFAULT_CHUNK_SIZE: u64 = 1_000;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// What happens to the secondary-event counter between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CounterPolicy {
    /// The counter lives for the whole simulation and is never reset.
    #[default]
    AccumulateAcrossRuns,
    /// The counter is zeroed at the start of every run.
    ResetPerRun,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub counter_policy: CounterPolicy,
    /// Seed for the random stream. `None` draws one from the OS.
    pub seed: Option<u64>,
    /// Write the scaled absorption grid next to each summary file.
    pub write_matrix: bool,
    /// Publish completion-time projections at 10, 100, 1000, ... photons.
    pub eta_checkpoints: bool,
    pub chunk_size: u64,
}

#[derive(Default)]
pub struct SimulationConfigBuilder {
    counter_policy: Option<CounterPolicy>,
    seed: Option<u64>,
    write_matrix: Option<bool>,
    eta_checkpoints: Option<bool>,
    chunk_size: Option<u64>,
}

impl SimulationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter_policy(mut self, policy: CounterPolicy) -> Self {
        self.counter_policy = Some(policy);
        self
    }
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
    pub fn write_matrix(mut self, enabled: bool) -> Self {
        self.write_matrix = Some(enabled);
        self
    }
    pub fn eta_checkpoints(mut self, enabled: bool) -> Self {
        self.eta_checkpoints = Some(enabled);
        self
    }
    pub fn chunk_size(mut self, size: u64) -> Self {
        self.chunk_size = Some(size);
        self
    }

    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let chunk_size = self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "chunk_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(SimulationConfig {
            counter_policy: self
                .counter_policy
                .ok_or(ConfigError::MissingParameter("counter_policy"))?,
            seed: self.seed,
            write_matrix: self
                .write_matrix
                .ok_or(ConfigError::MissingParameter("write_matrix"))?,
            eta_checkpoints: self.eta_checkpoints.unwrap_or(true),
            chunk_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_applies_defaults_for_optional_fields() {
        let config = SimulationConfigBuilder::new()
            .counter_policy(CounterPolicy::ResetPerRun)
            .write_matrix(false)
            .build()
            .unwrap();
        assert_eq!(config.counter_policy, CounterPolicy::ResetPerRun);
        assert_eq!(config.seed, None);
        assert!(!config.write_matrix);
        assert!(config.eta_checkpoints);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn build_fails_without_counter_policy() {
        let err = SimulationConfigBuilder::new()
            .write_matrix(true)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("counter_policy"));
    }

    #[test]
    fn build_fails_without_matrix_flag() {
        let err = SimulationConfigBuilder::new()
            .counter_policy(CounterPolicy::default())
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("write_matrix"));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = SimulationConfigBuilder::new()
            .counter_policy(CounterPolicy::default())
            .write_matrix(true)
            .chunk_size(0)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter {
                name: "chunk_size",
                ..
            }
        ));
    }

    #[test]
    fn default_policy_accumulates() {
        assert_eq!(CounterPolicy::default(), CounterPolicy::AccumulateAcrossRuns);
    }
}
