//! Window and runtime configuration from environment variables

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Upper bound on `window / width + 1`; the ring is allocated up front
pub const MAX_BUCKETS: usize = 1_000_000;

/// Shape of the trailing window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    /// Resolution of each time slice
    pub bucket_width: Duration,

    /// Length of the trailing window to aggregate
    pub window_duration: Duration,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            bucket_width: Duration::from_millis(100),
            window_duration: Duration::from_secs(60),
        }
    }
}

impl WindowConfig {
    pub fn new(bucket_width: Duration, window_duration: Duration) -> Result<Self, ConfigError> {
        let config = Self {
            bucket_width,
            window_duration,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `BUCKET_WIDTH_MS` (default: 100)
    /// - `WINDOW_DURATION_MS` (default: 60000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bucket_width_ms = parse_var("BUCKET_WIDTH_MS", defaults.bucket_width.as_millis() as u64)?;
        let window_duration_ms =
            parse_var("WINDOW_DURATION_MS", defaults.window_duration.as_millis() as u64)?;

        Self::new(
            Duration::from_millis(bucket_width_ms),
            Duration::from_millis(window_duration_ms),
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket_width.is_zero() {
            return Err(ConfigError::InvalidValue(
                "bucket width must be positive".to_string(),
            ));
        }

        if self.window_duration.is_zero() {
            return Err(ConfigError::InvalidValue(
                "window duration must be positive".to_string(),
            ));
        }

        if self.bucket_width > self.window_duration {
            return Err(ConfigError::InvalidValue(format!(
                "bucket width {:?} exceeds window duration {:?}",
                self.bucket_width, self.window_duration
            )));
        }

        if self.window_duration.as_nanos() % self.bucket_width.as_nanos() != 0 {
            return Err(ConfigError::InvalidValue(format!(
                "window duration {:?} is not a whole number of {:?} buckets",
                self.window_duration, self.bucket_width
            )));
        }

        // Ring arithmetic runs on signed nanoseconds
        if i64::try_from(self.window_duration.as_nanos()).is_err() {
            return Err(ConfigError::InvalidValue(format!(
                "window duration {:?} is too large",
                self.window_duration
            )));
        }

        let buckets = self.window_duration.as_nanos() / self.bucket_width.as_nanos() + 1;
        if buckets > MAX_BUCKETS as u128 {
            return Err(ConfigError::InvalidValue(format!(
                "window duration {:?} in {:?} buckets needs {} buckets, at most {} allowed",
                self.window_duration, self.bucket_width, buckets, MAX_BUCKETS
            )));
        }

        Ok(())
    }

    /// Number of buckets in the ring: `floor(window / width) + 1`
    pub fn capacity(&self) -> usize {
        (self.window_duration.as_nanos() / self.bucket_width.as_nanos()) as usize + 1
    }
}

/// Settings for the `window_runtime` binary
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub window: WindowConfig,

    /// Observation source, `None` reads stdin
    pub input_path: Option<PathBuf>,

    /// Snapshot destination, `None` writes stdout
    pub output_path: Option<PathBuf>,

    /// How often a snapshot is emitted (milliseconds)
    pub emission_interval_ms: u64,

    /// Channel buffer size between the reader and the ingestion loop
    pub channel_buffer: usize,
}

impl RuntimeConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables (plus those read by [`WindowConfig::from_env`]):
    /// - `OBSERVATIONS_INPUT` (default: `-`, stdin)
    /// - `SNAPSHOT_OUTPUT` (default: `-`, stdout)
    /// - `EMISSION_INTERVAL_MS` (default: 1000)
    /// - `INGEST_CHANNEL_BUFFER` (default: 10000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let window = WindowConfig::from_env()?;

        let emission_interval_ms = parse_var("EMISSION_INTERVAL_MS", 1_000u64)?;
        if emission_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "EMISSION_INTERVAL_MS must be positive".to_string(),
            ));
        }

        let channel_buffer = parse_var("INGEST_CHANNEL_BUFFER", 10_000usize)?;
        if channel_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "INGEST_CHANNEL_BUFFER must be positive".to_string(),
            ));
        }

        Ok(Self {
            window,
            input_path: path_var("OBSERVATIONS_INPUT"),
            output_path: path_var("SNAPSHOT_OUTPUT"),
            emission_interval_ms,
            channel_buffer,
        })
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(format!("{} must be a number, got '{}'", name, raw))
        }),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue(format!(
            "{} is not valid unicode",
            name
        ))),
    }
}

fn path_var(name: &str) -> Option<PathBuf> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "-")
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests below mutate process-wide environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for var in [
            "BUCKET_WIDTH_MS",
            "WINDOW_DURATION_MS",
            "OBSERVATIONS_INPUT",
            "SNAPSHOT_OUTPUT",
            "EMISSION_INTERVAL_MS",
            "INGEST_CHANNEL_BUFFER",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_capacity_matches_window_over_width_plus_one() {
        let config =
            WindowConfig::new(Duration::from_millis(100), Duration::from_secs(1)).unwrap();
        assert_eq!(config.capacity(), 11);

        assert_eq!(WindowConfig::default().capacity(), 601);
    }

    #[test]
    fn test_rejects_invalid_shapes() {
        assert!(WindowConfig::new(Duration::ZERO, Duration::from_secs(1)).is_err());
        assert!(WindowConfig::new(Duration::from_millis(100), Duration::ZERO).is_err());
        assert!(WindowConfig::new(Duration::from_secs(2), Duration::from_secs(1)).is_err());
        assert!(WindowConfig::new(Duration::from_millis(300), Duration::from_secs(1)).is_err());
        assert!(WindowConfig::new(Duration::from_secs(1), Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_rejects_oversized_ring() {
        let err = WindowConfig::new(Duration::from_millis(1), Duration::from_millis(1_000_000_000))
            .unwrap_err();
        assert!(err.to_string().contains("at most 1000000"), "{}", err);

        let widest =
            WindowConfig::new(Duration::from_millis(1), Duration::from_millis(999_999)).unwrap();
        assert_eq!(widest.capacity(), MAX_BUCKETS);
        assert!(WindowConfig::new(Duration::from_millis(1), Duration::from_millis(1_000_000)).is_err());

        let literal = WindowConfig {
            bucket_width: Duration::from_millis(1),
            window_duration: Duration::from_millis(1_000_000_000),
        };
        assert!(crate::window::WindowAggregator::new(literal).is_err());
    }

    #[test]
    fn test_default_config() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let config = RuntimeConfig::from_env().unwrap();

        assert_eq!(config.window, WindowConfig::default());
        assert_eq!(config.input_path, None);
        assert_eq!(config.output_path, None);
        assert_eq!(config.emission_interval_ms, 1_000);
        assert_eq!(config.channel_buffer, 10_000);
    }

    #[test]
    fn test_custom_config() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("BUCKET_WIDTH_MS", "250");
        env::set_var("WINDOW_DURATION_MS", "5000");
        env::set_var("OBSERVATIONS_INPUT", "/tmp/observations.jsonl");
        env::set_var("SNAPSHOT_OUTPUT", "-");
        env::set_var("EMISSION_INTERVAL_MS", "200");

        let config = RuntimeConfig::from_env().unwrap();

        assert_eq!(config.window.bucket_width, Duration::from_millis(250));
        assert_eq!(config.window.window_duration, Duration::from_secs(5));
        assert_eq!(config.window.capacity(), 21);
        assert_eq!(
            config.input_path,
            Some(PathBuf::from("/tmp/observations.jsonl"))
        );
        assert_eq!(config.output_path, None);
        assert_eq!(config.emission_interval_ms, 200);

        clear_env();
    }

    #[test]
    fn test_unparseable_value_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("WINDOW_DURATION_MS", "sixty");

        let err = WindowConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)));

        clear_env();
    }
}
