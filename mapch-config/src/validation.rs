use std::fmt;
use std::time::Duration;

use crate::constants::MAX_RESULT_LIMIT;
use crate::models::Config;

/// Non-fatal observations about a resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// The API is reached over plain HTTP.
    InsecureApiScheme { url: String },
    /// The backend caps results lower than the configured limit.
    ResultLimitAboveMax { configured: u32, max: u32 },
    /// Registration gets less time than ordinary reads.
    WriteTimeoutBelowRead { read: Duration, write: Duration },
    /// Viewport events will fire a fetch on every change.
    DebounceDisabled,
    /// Photo caching is off; every detail view refetches.
    CacheDisabled,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::InsecureApiScheme { url } => {
                write!(f, "API base URL {url} is not using https")
            }
            ConfigWarning::ResultLimitAboveMax { configured, max } => write!(
                f,
                "result limit {configured} exceeds the backend maximum {max}"
            ),
            ConfigWarning::WriteTimeoutBelowRead { read, write } => write!(
                f,
                "write timeout {}ms is shorter than read timeout {}ms",
                write.as_millis(),
                read.as_millis()
            ),
            ConfigWarning::DebounceDisabled => {
                f.write_str("viewport debounce is zero")
            }
            ConfigWarning::CacheDisabled => {
                f.write_str("photo cache is disabled")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigWarnings {
    items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn collect(config: &Config) -> Self {
        let mut items = Vec::new();
        if config.api.base_url.scheme() == "http" {
            items.push(ConfigWarning::InsecureApiScheme {
                url: config.api.base_url.to_string(),
            });
        }
        if config.map.result_limit > MAX_RESULT_LIMIT {
            items.push(ConfigWarning::ResultLimitAboveMax {
                configured: config.map.result_limit,
                max: MAX_RESULT_LIMIT,
            });
        }
        if config.http.write_timeout < config.http.read_timeout {
            items.push(ConfigWarning::WriteTimeoutBelowRead {
                read: config.http.read_timeout,
                write: config.http.write_timeout,
            });
        }
        if config.map.debounce.is_zero() {
            items.push(ConfigWarning::DebounceDisabled);
        }
        if !config.cache.enabled {
            items.push(ConfigWarning::CacheDisabled);
        }
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }

    pub fn contains(&self, warning: &ConfigWarning) -> bool {
        self.items.contains(warning)
    }
}
