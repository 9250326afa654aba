use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::model::{CurrentConditions, ForecastDay, HistoryDay, HistoryLocation};

/// A cached payload stamped with its RFC 3339 fetch time.
pub trait CachedRecord: Serialize + DeserializeOwned {
    fn fetched_at(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub location: HistoryLocation,
    pub timezone: String,
    pub days: Vec<HistoryDay>,
    pub source: String,
    #[serde(default)]
    pub source_trace: Vec<String>,
    pub fetched_at: String,
}

impl CachedRecord for CacheRecord {
    fn fetched_at(&self) -> &str {
        &self.fetched_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastCacheRecord {
    pub location: HistoryLocation,
    pub timezone: String,
    pub current: CurrentConditions,
    pub days: Vec<ForecastDay>,
    pub source: String,
    pub fetched_at: String,
}

impl CachedRecord for ForecastCacheRecord {
    fn fetched_at(&self) -> &str {
        &self.fetched_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    pub age_secs: u64,
    pub is_fresh: bool,
}

pub fn history_cache_key(days: usize, location_key: &str) -> String {
    format!("history{days}-{location_key}")
}

pub fn forecast_cache_key(location_key: &str) -> String {
    format!("forecast-{location_key}")
}

pub fn cache_path(config_cache_dir: &Path, key: &str) -> PathBuf {
    config_cache_dir.join("farm-cli").join(format!("{key}.json"))
}

pub fn read_cache<T: CachedRecord>(path: &Path) -> io::Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let payload = fs::read_to_string(path)?;
    let parsed = serde_json::from_str::<T>(&payload).ok();
    if parsed.is_none() {
        tracing::warn!(path = %path.display(), "ignoring unreadable cache record");
    }
    Ok(parsed)
}

pub fn write_cache<T: CachedRecord>(path: &Path, record: &T) -> io::Result<()> {
    let payload = serde_json::to_vec(record)
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error.to_string()))?;
    write_atomic(path, &payload)
}

pub fn evaluate_freshness<T: CachedRecord>(
    record: &T,
    now: DateTime<Utc>,
    ttl_secs: u64,
) -> Freshness {
    let fetched_at = parse_fetched_at(record)
        .unwrap_or(now - chrono::Duration::seconds((ttl_secs + 1).try_into().unwrap_or(0)));
    let age_secs = now
        .signed_duration_since(fetched_at)
        .num_seconds()
        .max(0)
        .try_into()
        .unwrap_or(u64::MAX);

    Freshness {
        age_secs,
        is_fresh: age_secs <= ttl_secs,
    }
}

pub fn parse_fetched_at<T: CachedRecord>(record: &T) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(record.fetched_at())
        .ok()
        .map(|value| value.with_timezone(&Utc))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "cache path must have a parent directory",
        )
    })?;
    fs::create_dir_all(parent)?;

    let tmp_path = path.with_extension(format!("{}.tmp", std::process::id()));
    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}
