use std::path::PathBuf;
use std::time::Duration;

pub const ONSPD_CSV_FILEPATH: &str = "ONSPD_AUG_2025/Data/ONSPD_AUG_2025_UK.csv";
pub const POSTCODES_FILEPATH: &str = "postcodes.txt";
pub const MAPPING_FILEPATH: &str = "postcode-mapping.csv";

pub const POSTCODE_COLUMN: &str = "pcds";
pub const TERMINATION_COLUMN: &str = "doterm";

pub const TYPEAHEAD_URL: &str = "https://los.rightmove.co.uk/typeahead";
pub const TYPEAHEAD_LIMIT: u32 = 10;
pub const TYPEAHEAD_EXCLUDE: &str = "STREET";
pub const USER_AGENT: &str = "postcode-mapper (batch lookup)";

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAX_ATTEMPTS: u32 = 3;
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(500);
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);
pub const POOL_MAX_IDLE_PER_HOST: usize = 4;

/// Flush pending entries to disk after this many lookups.
pub const CHECKPOINT_INTERVAL: usize = 100;
/// Report position in the list every this many postcodes, skipped or not.
pub const PROGRESS_STRIDE: usize = 1000;

#[derive(Debug, Clone)]
pub struct ExtractConfig {
  pub source_path: PathBuf,
  pub destination_path: PathBuf,
  pub postcode_column: String,
  pub termination_column: String,
}

impl Default for ExtractConfig {
  fn default() -> Self {
    ExtractConfig {
      source_path: PathBuf::from(ONSPD_CSV_FILEPATH),
      destination_path: PathBuf::from(POSTCODES_FILEPATH),
      postcode_column: POSTCODE_COLUMN.to_string(),
      termination_column: TERMINATION_COLUMN.to_string(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub initial_delay: Duration,
  pub max_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    RetryPolicy {
      max_attempts: MAX_ATTEMPTS,
      initial_delay: INITIAL_RETRY_DELAY,
      max_delay: MAX_RETRY_DELAY,
    }
  }
}

impl RetryPolicy {
  /// Delay to wait after the given (1-based) failed attempt.
  pub fn backoff_delay(&self, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    self
      .initial_delay
      .saturating_mul(1 << exponent)
      .min(self.max_delay)
  }
}

#[derive(Debug, Clone)]
pub struct LookupConfig {
  pub base_url: String,
  pub limit: u32,
  pub exclude: String,
  pub timeout: Duration,
  pub retry: RetryPolicy,
}

impl Default for LookupConfig {
  fn default() -> Self {
    LookupConfig {
      base_url: TYPEAHEAD_URL.to_string(),
      limit: TYPEAHEAD_LIMIT,
      exclude: TYPEAHEAD_EXCLUDE.to_string(),
      timeout: REQUEST_TIMEOUT,
      retry: RetryPolicy::default(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct MapperConfig {
  pub postcodes_path: PathBuf,
  pub mapping_path: PathBuf,
  pub checkpoint_interval: usize,
  pub progress_stride: usize,
}

impl Default for MapperConfig {
  fn default() -> Self {
    MapperConfig {
      postcodes_path: PathBuf::from(POSTCODES_FILEPATH),
      mapping_path: PathBuf::from(MAPPING_FILEPATH),
      checkpoint_interval: CHECKPOINT_INTERVAL,
      progress_stride: PROGRESS_STRIDE,
    }
  }
}
