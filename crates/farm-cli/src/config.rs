use std::collections::HashMap;
use std::path::PathBuf;

pub const CACHE_TTL_SECS: u64 = 30 * 60;
pub const DEFAULT_HISTORY_DAYS: usize = 10;
pub const MAX_HISTORY_DAYS: usize = 30;
/// Today plus the next two days.
pub const FORECAST_DAYS: usize = 3;
pub const DEFAULT_CITY: &str = "Guntur";

pub const FARM_CACHE_DIR_ENV: &str = "FARM_CACHE_DIR";
pub const FARM_CACHE_TTL_SECS_ENV: &str = "FARM_CACHE_TTL_SECS";
pub const FARM_HISTORY_DAYS_ENV: &str = "FARM_HISTORY_DAYS";
pub const FARM_DEFAULT_CITY_ENV: &str = "FARM_DEFAULT_CITY";
const ALFRED_WORKFLOW_CACHE_ENV: &str = "ALFRED_WORKFLOW_CACHE";
const ALFRED_WORKFLOW_DATA_ENV: &str = "ALFRED_WORKFLOW_DATA";
const HOME_ENV: &str = "HOME";

pub const PROVIDER_TIMEOUT_SECS: u64 = 3;
pub const PROVIDER_RETRY_MAX_ATTEMPTS: usize = 2;
pub const PROVIDER_RETRY_BASE_BACKOFF_MS: u64 = 200;

/// Local hour whose hourly sample stands in for a whole past day.
pub const OBSERVATION_HOUR: u32 = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub cache_dir: PathBuf,
    pub cache_ttl_secs: u64,
    pub history_days: usize,
    pub default_city: String,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self::from_pairs(std::env::vars())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            cache_dir: resolve_cache_dir(&map),
            cache_ttl_secs: resolve_cache_ttl_secs(&map),
            history_days: resolve_history_days(&map),
            default_city: resolve_default_city(&map),
        }
    }
}

fn non_empty<'a>(env_map: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    env_map
        .get(key)
        .map(String::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn resolve_cache_dir(env_map: &HashMap<String, String>) -> PathBuf {
    let home = env_map.get(HOME_ENV).map(String::as_str);
    non_empty(env_map, FARM_CACHE_DIR_ENV)
        .or_else(|| non_empty(env_map, ALFRED_WORKFLOW_CACHE_ENV))
        .or_else(|| non_empty(env_map, ALFRED_WORKFLOW_DATA_ENV))
        .map(|value| expand_home_path(value, home))
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("farmhub-farm-cli"))
}

fn expand_home_path(raw: &str, home: Option<&str>) -> String {
    let trimmed = raw.trim();
    let Some(home) = home.map(str::trim).filter(|value| !value.is_empty()) else {
        return trimmed.to_string();
    };

    let home = home.trim_end_matches('/');
    let mut expanded = trimmed.replace("$HOME", home);

    if expanded == "~" {
        expanded = home.to_string();
    } else if let Some(rest) = expanded.strip_prefix("~/") {
        expanded = format!("{home}/{rest}");
    }

    expanded
}

fn resolve_cache_ttl_secs(env_map: &HashMap<String, String>) -> u64 {
    non_empty(env_map, FARM_CACHE_TTL_SECS_ENV)
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(CACHE_TTL_SECS)
}

fn resolve_history_days(env_map: &HashMap<String, String>) -> usize {
    non_empty(env_map, FARM_HISTORY_DAYS_ENV)
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| (1..=MAX_HISTORY_DAYS).contains(value))
        .unwrap_or(DEFAULT_HISTORY_DAYS)
}

fn resolve_default_city(env_map: &HashMap<String, String>) -> String {
    non_empty(env_map, FARM_DEFAULT_CITY_ENV)
        .unwrap_or(DEFAULT_CITY)
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: PROVIDER_RETRY_MAX_ATTEMPTS,
            base_backoff_ms: PROVIDER_RETRY_BASE_BACKOFF_MS,
        }
    }
}

impl RetryPolicy {
    pub fn backoff_for_attempt(self, attempt: usize) -> u64 {
        if attempt <= 1 {
            return 0;
        }

        let shift = (attempt - 2).min(8);
        self.base_backoff_ms.saturating_mul(1_u64 << shift)
    }
}
