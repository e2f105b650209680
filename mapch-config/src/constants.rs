//! Defaults applied when neither the config file nor the environment
//! provides a value.

pub const DEFAULT_API_BASE_URL: &str = "https://map-ch.com";
pub const DEFAULT_IMAGE_BASE_URL: &str =
    "https://mapappp.s3.ap-northeast-3.amazonaws.com";
pub const DEFAULT_REGISTRATION_PATH: &str = "api/storeUser";

pub const DEFAULT_READ_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1_000;

pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_RESULT_LIMIT: u32 = 800;
pub const DEFAULT_NEAR_IDENTICAL_EPSILON: f64 = 0.0005;

pub const DEFAULT_BOARDS_PER_PAGE: u32 = 20;

/// Largest result cap the backend is known to honor.
pub const MAX_RESULT_LIMIT: u32 = 5_000;

pub const ENV_CONFIG_PATH: &str = "MAPCH_CONFIG";
