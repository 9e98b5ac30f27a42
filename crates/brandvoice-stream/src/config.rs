use std::time::Duration;

use crate::errors::AggregateError;

const FLUSH_DELAY_ENV: &str = "BRANDVOICE_FLUSH_DELAY_MS";
const MIN_GROWTH_ENV: &str = "BRANDVOICE_FLUSH_MIN_CHARS";
const GENERATE_URL_ENV: &str = "BRANDVOICE_GENERATE_URL";

/// Batching thresholds for a [`StreamAggregator`](crate::StreamAggregator).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Quiet period before a deferred emit fires, and the minimum spacing of
    /// throttled emits.
    pub flush_delay: Duration,
    /// Characters that must arrive since the last emit before a throttled
    /// emit may fire.
    pub min_growth: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            flush_delay: Duration::from_millis(300),
            min_growth: 100,
        }
    }
}

impl AggregatorConfig {
    /// Builds a config from `BRANDVOICE_FLUSH_DELAY_MS` and
    /// `BRANDVOICE_FLUSH_MIN_CHARS`, falling back to the defaults for unset
    /// variables.
    pub fn from_env() -> Result<Self, AggregateError> {
        let mut config = Self::default();
        if let Some(ms) = read_env_number(FLUSH_DELAY_ENV)? {
            config.flush_delay = Duration::from_millis(ms);
        }
        if let Some(chars) = read_env_number(MIN_GROWTH_ENV)? {
            config.min_growth = usize::try_from(chars).map_err(|_| {
                AggregateError::Config(format!("{MIN_GROWTH_ENV} is out of range"))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the flush delay.
    pub fn flush_delay(mut self, delay: Duration) -> Self {
        self.flush_delay = delay;
        self
    }

    /// Overrides the growth threshold.
    pub fn min_growth(mut self, chars: usize) -> Self {
        self.min_growth = chars;
        self
    }

    pub fn validate(&self) -> Result<(), AggregateError> {
        if self.flush_delay.is_zero() {
            return Err(AggregateError::Config(
                "flush_delay must be greater than 0".into(),
            ));
        }
        if self.min_growth == 0 {
            return Err(AggregateError::Config(
                "min_growth must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the generation endpoint client.
#[derive(Clone, Debug)]
pub struct GenerationClientConfig {
    /// Full URL of the streaming generation endpoint.
    pub endpoint: String,
    /// Timeout for establishing the response; body reads are not limited.
    pub connect_timeout: Duration,
}

impl GenerationClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout: Duration::from_secs(30),
        }
    }

    /// Builds a config from `BRANDVOICE_GENERATE_URL`.
    pub fn from_env() -> Result<Self, AggregateError> {
        let endpoint = std::env::var(GENERATE_URL_ENV).unwrap_or_default();
        if endpoint.trim().is_empty() {
            return Err(AggregateError::Config(format!(
                "missing {GENERATE_URL_ENV} for the generation client"
            )));
        }
        Ok(Self::new(endpoint))
    }

    /// Overrides the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

fn read_env_number(key: &str) -> Result<Option<u64>, AggregateError> {
    match std::env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| AggregateError::Config(format!("invalid {key}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}
