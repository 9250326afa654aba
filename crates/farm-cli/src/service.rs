use chrono::{DateTime, Days, NaiveDate, SecondsFormat, Utc};
use chrono_tz::Tz;
use farming_core::ConditionSummary;
use rand::Rng;

use crate::cache::{
    CacheRecord, ForecastCacheRecord, cache_path, evaluate_freshness, forecast_cache_key,
    history_cache_key, parse_fetched_at, read_cache, write_cache,
};
use crate::config::{FORECAST_DAYS, RuntimeConfig};
use crate::error::AppError;
use crate::fallback;
use crate::geocoding::{ResolvedLocation, city_query_cache_key};
use crate::model::{
    CacheMetadata, CurrentConditions, DataSource, ForecastDay, ForecastOutput, ForecastRequest,
    FreshnessStatus, HistoryDay, HistoryLocation, HistoryOutput, HistoryRequest, LocationQuery,
    round_observation,
};
use crate::providers::{ProviderApi, ProviderError, ProviderForecast, ProviderHistory};
use crate::weather_code;

/// Classified weather for the `request.days` days before today.
///
/// Order of preference: fresh cache, live provider data (gaps filled with
/// synthetic days), stale cache, fully synthetic history.
pub fn resolve_history<P, N, R>(
    config: &RuntimeConfig,
    providers: &P,
    now_fn: N,
    rng: &mut R,
    request: &HistoryRequest,
) -> Result<HistoryOutput, AppError>
where
    P: ProviderApi,
    N: Fn() -> DateTime<Utc>,
    R: Rng + ?Sized,
{
    let now = now_fn();
    let (location_key, mut resolved_location) = location_key(&request.location);
    let key = history_cache_key(request.days, &location_key);
    let path = cache_path(&config.cache_dir, &key);
    let meta = MetaContext {
        key,
        ttl_secs: config.cache_ttl_secs,
    };

    let cached =
        read_cache::<CacheRecord>(&path).map_err(|error| AppError::runtime(error.to_string()))?;
    let cached_state = cached.map(|record| {
        let freshness = evaluate_freshness(&record, now, config.cache_ttl_secs);
        (record, freshness.age_secs, freshness.is_fresh)
    });

    if let Some((record, age_secs, true)) = &cached_state {
        tracing::debug!(key = %meta.key, age_secs, "serving history from fresh cache");
        return Ok(build_output_from_record(
            record,
            FreshnessStatus::CacheFresh,
            *age_secs,
            &meta,
        ));
    }

    let location = match resolved_location.take() {
        Some(location) => location,
        None => match &cached_state {
            Some((record, _, _)) => location_from_cache(&record.location, &record.timezone),
            None => resolve_city(providers, &request.location)?,
        },
    };

    let mut trace = Vec::new();
    match providers.fetch_history(location.latitude, location.longitude, request.days) {
        Ok(history) => {
            let record = build_live_record(&location, request.days, history, now, rng, trace);
            if let Err(error) = write_cache(&path, &record) {
                tracing::warn!(path = %path.display(), %error, "failed to write history cache");
            }
            Ok(build_output_from_record(
                &record,
                FreshnessStatus::Live,
                0,
                &meta,
            ))
        }
        Err(error) => {
            tracing::warn!(%error, "history provider failed");
            trace.push(format!("open_meteo: {error}"));

            if let Some((record, age_secs, false)) = cached_state {
                return Ok(build_output_from_record(
                    &record,
                    FreshnessStatus::CacheStaleFallback,
                    age_secs,
                    &meta,
                ));
            }

            tracing::info!(days = request.days, "generating synthetic history");
            let record = build_synthetic_record(&location, request.days, now, rng, trace);
            Ok(build_output_from_record(
                &record,
                FreshnessStatus::SyntheticFallback,
                0,
                &meta,
            ))
        }
    }
}

/// Current conditions plus the daily outlook starting today.
///
/// Order of preference: fresh cache, live provider data, stale cache. There
/// is no synthetic forecast; with neither provider nor cache it fails.
pub fn resolve_forecast<P, N>(
    config: &RuntimeConfig,
    providers: &P,
    now_fn: N,
    request: &ForecastRequest,
) -> Result<ForecastOutput, AppError>
where
    P: ProviderApi,
    N: Fn() -> DateTime<Utc>,
{
    let now = now_fn();
    let (location_key, mut resolved_location) = location_key(&request.location);
    let key = forecast_cache_key(&location_key);
    let path = cache_path(&config.cache_dir, &key);
    let meta = MetaContext {
        key,
        ttl_secs: config.cache_ttl_secs,
    };

    let cached = read_cache::<ForecastCacheRecord>(&path)
        .map_err(|error| AppError::runtime(error.to_string()))?;
    let cached_state = cached.map(|record| {
        let freshness = evaluate_freshness(&record, now, config.cache_ttl_secs);
        (record, freshness.age_secs, freshness.is_fresh)
    });

    if let Some((record, age_secs, true)) = &cached_state {
        tracing::debug!(key = %meta.key, age_secs, "serving forecast from fresh cache");
        return Ok(build_forecast_output(
            record,
            FreshnessStatus::CacheFresh,
            *age_secs,
            &meta,
            Vec::new(),
        ));
    }

    let location = match resolved_location.take() {
        Some(location) => location,
        None => match &cached_state {
            Some((record, _, _)) => location_from_cache(&record.location, &record.timezone),
            None => resolve_city(providers, &request.location)?,
        },
    };

    match providers.fetch_forecast(location.latitude, location.longitude, FORECAST_DAYS) {
        Ok(forecast) => {
            let record = build_forecast_record(&location, forecast);
            if let Err(error) = write_cache(&path, &record) {
                tracing::warn!(path = %path.display(), %error, "failed to write forecast cache");
            }
            Ok(build_forecast_output(
                &record,
                FreshnessStatus::Live,
                0,
                &meta,
                Vec::new(),
            ))
        }
        Err(error) => {
            tracing::warn!(%error, "forecast provider failed");
            let trace = vec![format!("open_meteo: {error}")];

            match cached_state {
                Some((record, age_secs, false)) => Ok(build_forecast_output(
                    &record,
                    FreshnessStatus::CacheStaleFallback,
                    age_secs,
                    &meta,
                    trace,
                )),
                _ => Err(AppError::runtime_with_trace(
                    &format!("forecast unavailable for {}", location.name),
                    &trace,
                )),
            }
        }
    }
}

struct MetaContext {
    key: String,
    ttl_secs: u64,
}

/// Cache key part for a location, plus the location itself when it needs no
/// geocoding.
fn location_key(query: &LocationQuery) -> (String, Option<ResolvedLocation>) {
    match query {
        LocationQuery::City(city) => (city_query_cache_key(city), None),
        LocationQuery::Coordinates { lat, lon } => {
            let location = ResolvedLocation::from_coordinates(*lat, *lon);
            (location.cache_key(), Some(location))
        }
    }
}

/// An unknown city is the caller's mistake; any other lookup failure is a
/// provider problem.
fn resolve_city<P: ProviderApi>(
    providers: &P,
    location: &LocationQuery,
) -> Result<ResolvedLocation, AppError> {
    match location {
        LocationQuery::City(city) => providers.geocode_city(city).map_err(|error| match error {
            ProviderError::NotFound(_) => AppError::user(format!("city not found: {city}")),
            other => AppError::runtime_with_trace(
                &format!("failed to resolve city '{city}'"),
                &[other.to_string()],
            ),
        }),
        LocationQuery::Coordinates { lat, lon } => {
            Ok(ResolvedLocation::from_coordinates(*lat, *lon))
        }
    }
}

fn build_live_record<R: Rng + ?Sized>(
    location: &ResolvedLocation,
    days: usize,
    history: ProviderHistory,
    now: DateTime<Utc>,
    rng: &mut R,
    mut trace: Vec<String>,
) -> CacheRecord {
    let ProviderHistory {
        timezone: provider_timezone,
        fetched_at,
        days: provider_days,
    } = history;

    let timezone = pick_timezone(provider_timezone, location);

    let mut filled = 0usize;
    let history_days = past_dates(local_today(now, &timezone), days)
        .into_iter()
        .map(|date| match provider_days.iter().find(|day| day.date == date) {
            Some(day) => HistoryDay::classify(
                date,
                &day.observation,
                round_observation(&day.observation),
                weather_code::describe(day.weather_code),
                day.weather_code,
                DataSource::OpenMeteo,
            ),
            None => {
                filled += 1;
                fallback::synthetic_day(date, fallback::SyntheticDraws::sample(rng))
            }
        })
        .collect();

    if filled > 0 {
        tracing::info!(filled, "filled missing provider days with synthetic data");
        trace.push(format!(
            "open_meteo: {filled} day(s) missing, filled with synthetic data"
        ));
    }

    CacheRecord {
        location: location.to_output_location(),
        timezone,
        days: history_days,
        source: DataSource::OpenMeteo.as_str().to_string(),
        source_trace: trace,
        fetched_at: fetched_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

fn build_synthetic_record<R: Rng + ?Sized>(
    location: &ResolvedLocation,
    days: usize,
    now: DateTime<Utc>,
    rng: &mut R,
    trace: Vec<String>,
) -> CacheRecord {
    let dates = past_dates(local_today(now, &location.timezone), days);
    CacheRecord {
        location: location.to_output_location(),
        timezone: location.timezone.clone(),
        days: fallback::synthetic_days(&dates, rng),
        source: DataSource::Synthetic.as_str().to_string(),
        source_trace: trace,
        fetched_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

fn build_forecast_record(
    location: &ResolvedLocation,
    forecast: ProviderForecast,
) -> ForecastCacheRecord {
    let ProviderForecast {
        timezone: provider_timezone,
        fetched_at,
        current,
        days,
    } = forecast;

    ForecastCacheRecord {
        location: location.to_output_location(),
        timezone: pick_timezone(provider_timezone, location),
        current: CurrentConditions::classify(
            &current.observation,
            weather_code::describe(current.weather_code),
            current.weather_code,
        ),
        days: days
            .into_iter()
            .take(FORECAST_DAYS)
            .map(|day| {
                ForecastDay::new(
                    day.date,
                    day.temp_max_c,
                    day.temp_min_c,
                    weather_code::describe(day.weather_code),
                    day.weather_code,
                )
            })
            .collect(),
        source: DataSource::OpenMeteo.as_str().to_string(),
        fetched_at: fetched_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

fn build_output_from_record(
    record: &CacheRecord,
    freshness_status: FreshnessStatus,
    age_secs: u64,
    meta: &MetaContext,
) -> HistoryOutput {
    HistoryOutput {
        location: record.location.clone(),
        timezone: record.timezone.clone(),
        days: record.days.clone(),
        summary: ConditionSummary::from_conditions(record.days.iter().map(|day| day.condition)),
        source: record.source.clone(),
        source_trace: record.source_trace.clone(),
        fetched_at: normalized_fetched_at(parse_fetched_at(record)),
        freshness: meta.metadata(freshness_status, age_secs),
    }
}

fn build_forecast_output(
    record: &ForecastCacheRecord,
    freshness_status: FreshnessStatus,
    age_secs: u64,
    meta: &MetaContext,
    source_trace: Vec<String>,
) -> ForecastOutput {
    ForecastOutput {
        location: record.location.clone(),
        timezone: record.timezone.clone(),
        current: record.current.clone(),
        days: record.days.clone(),
        source: record.source.clone(),
        source_trace,
        fetched_at: normalized_fetched_at(parse_fetched_at(record)),
        freshness: meta.metadata(freshness_status, age_secs),
    }
}

impl MetaContext {
    fn metadata(&self, status: FreshnessStatus, age_secs: u64) -> CacheMetadata {
        CacheMetadata {
            status,
            key: self.key.clone(),
            ttl_secs: self.ttl_secs,
            age_secs,
        }
    }
}

fn normalized_fetched_at(parsed: Option<DateTime<Utc>>) -> String {
    parsed
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn location_from_cache(location: &HistoryLocation, timezone: &str) -> ResolvedLocation {
    ResolvedLocation {
        name: location.name.clone(),
        latitude: location.latitude,
        longitude: location.longitude,
        timezone: timezone.to_string(),
    }
}

fn pick_timezone(provider_timezone: String, location: &ResolvedLocation) -> String {
    if provider_timezone.trim().is_empty() {
        location.timezone.clone()
    } else {
        provider_timezone
    }
}

/// Today's date at the location. Unknown zone names fall back to UTC.
fn local_today(now: DateTime<Utc>, timezone: &str) -> NaiveDate {
    match timezone.trim().parse::<Tz>() {
        Ok(tz) => now.with_timezone(&tz).date_naive(),
        Err(_) => now.date_naive(),
    }
}

/// The `days` dates before `today`, oldest first.
fn past_dates(today: NaiveDate, days: usize) -> Vec<NaiveDate> {
    (1..=days)
        .rev()
        .filter_map(|offset| today.checked_sub_days(Days::new(offset as u64)))
        .collect()
}
