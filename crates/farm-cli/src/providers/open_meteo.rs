use chrono::{NaiveDate, NaiveDateTime, Timelike, Utc};
use farming_core::WeatherObservation;
use reqwest::blocking::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{OBSERVATION_HOUR, RetryPolicy};
use crate::geocoding::ResolvedLocation;

use super::{
    ProviderCurrent, ProviderError, ProviderForecast, ProviderForecastDay, ProviderHistory,
    ProviderHistoryDay, execute_with_retry,
};

const PROVIDER_NAME: &str = "open_meteo";
const GEOCODE_ENDPOINT: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_ENDPOINT: &str = "https://api.open-meteo.com/v1/forecast";
const HISTORY_HOURLY_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,rain,wind_speed_10m,weather_code";
const FORECAST_CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,rain,wind_speed_10m,weather_code";
const FORECAST_DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min";
const HOURLY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";
const DAILY_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Serialize)]
struct GeocodeQuery<'a> {
    name: &'a str,
    count: u8,
    language: &'a str,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    name: String,
    latitude: f64,
    longitude: f64,
    timezone: Option<String>,
}

#[derive(Debug, Serialize)]
struct HistoryQuery<'a> {
    latitude: f64,
    longitude: f64,
    timezone: &'a str,
    past_days: usize,
    forecast_days: usize,
    hourly: &'a str,
    wind_speed_unit: &'a str,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    timezone: Option<String>,
    hourly: Option<HistoryHourly>,
}

#[derive(Debug, Deserialize)]
struct HistoryHourly {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m: Vec<Option<f64>>,
    #[serde(default)]
    rain: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<i32>>,
}

#[derive(Debug, Serialize)]
struct ForecastQuery<'a> {
    latitude: f64,
    longitude: f64,
    timezone: &'a str,
    forecast_days: usize,
    current: &'a str,
    daily: &'a str,
    wind_speed_unit: &'a str,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    timezone: Option<String>,
    current: Option<ForecastCurrent>,
    daily: Option<ForecastDaily>,
}

#[derive(Debug, Deserialize)]
struct ForecastCurrent {
    temperature_2m: Option<f64>,
    relative_humidity_2m: Option<f64>,
    rain: Option<f64>,
    wind_speed_10m: Option<f64>,
    weather_code: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct ForecastDaily {
    #[serde(default)]
    time: Vec<String>,
    #[serde(default)]
    weather_code: Vec<Option<i32>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
}

pub fn fetch_geocode(
    client: &Client,
    city: &str,
    retry_policy: RetryPolicy,
) -> Result<ResolvedLocation, ProviderError> {
    execute_with_retry(
        PROVIDER_NAME,
        retry_policy,
        || fetch_geocode_once(client, city),
        std::thread::sleep,
    )
}

pub fn fetch_history(
    client: &Client,
    lat: f64,
    lon: f64,
    past_days: usize,
    retry_policy: RetryPolicy,
) -> Result<ProviderHistory, ProviderError> {
    execute_with_retry(
        PROVIDER_NAME,
        retry_policy,
        || fetch_history_once(client, lat, lon, past_days),
        std::thread::sleep,
    )
}

pub fn fetch_forecast(
    client: &Client,
    lat: f64,
    lon: f64,
    forecast_days: usize,
    retry_policy: RetryPolicy,
) -> Result<ProviderForecast, ProviderError> {
    execute_with_retry(
        PROVIDER_NAME,
        retry_policy,
        || fetch_forecast_once(client, lat, lon, forecast_days),
        std::thread::sleep,
    )
}

fn fetch_geocode_once(client: &Client, city: &str) -> Result<ResolvedLocation, ProviderError> {
    let query = GeocodeQuery {
        name: city,
        count: 1,
        language: "en",
        format: "json",
    };

    let body = execute_request(client.get(GEOCODE_ENDPOINT).query(&query))?;
    parse_geocode_response(&body, city)
}

fn fetch_history_once(
    client: &Client,
    lat: f64,
    lon: f64,
    past_days: usize,
) -> Result<ProviderHistory, ProviderError> {
    // forecast_days=1 keeps today in the series so the past days can be
    // told apart from it.
    let query = HistoryQuery {
        latitude: lat,
        longitude: lon,
        timezone: "auto",
        past_days,
        forecast_days: 1,
        hourly: HISTORY_HOURLY_FIELDS,
        wind_speed_unit: "ms",
    };

    tracing::debug!(lat, lon, past_days, "requesting open-meteo hourly history");
    let body = execute_request(client.get(FORECAST_ENDPOINT).query(&query))?;
    parse_history_response(&body, OBSERVATION_HOUR)
}

fn fetch_forecast_once(
    client: &Client,
    lat: f64,
    lon: f64,
    forecast_days: usize,
) -> Result<ProviderForecast, ProviderError> {
    let query = ForecastQuery {
        latitude: lat,
        longitude: lon,
        timezone: "auto",
        forecast_days,
        current: FORECAST_CURRENT_FIELDS,
        daily: FORECAST_DAILY_FIELDS,
        wind_speed_unit: "ms",
    };

    tracing::debug!(lat, lon, forecast_days, "requesting open-meteo forecast");
    let body = execute_request(client.get(FORECAST_ENDPOINT).query(&query))?;
    parse_forecast_response(&body)
}

fn execute_request(request: RequestBuilder) -> Result<String, ProviderError> {
    let response = request
        .send()
        .map_err(|error| ProviderError::Transport(error.to_string()))?;
    let status = response.status();
    let body = response
        .text()
        .map_err(|error| ProviderError::Transport(error.to_string()))?;

    if status.is_success() {
        return Ok(body);
    }

    let message = extract_error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });

    Err(ProviderError::Http {
        status: status.as_u16(),
        message,
    })
}

fn parse_geocode_response(body: &str, city: &str) -> Result<ResolvedLocation, ProviderError> {
    let payload: GeocodeResponse = serde_json::from_str(body)
        .map_err(|error| ProviderError::InvalidResponse(format!("geocode payload: {error}")))?;

    let Some(result) = payload.results.into_iter().next() else {
        return Err(ProviderError::NotFound(city.to_string()));
    };

    if result.name.trim().is_empty() {
        return Err(ProviderError::InvalidResponse(
            "geocode payload: empty location name".to_string(),
        ));
    }

    let timezone = result
        .timezone
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            ProviderError::InvalidResponse("geocode payload: missing timezone".to_string())
        })?;

    Ok(ResolvedLocation {
        name: result.name,
        latitude: result.latitude,
        longitude: result.longitude,
        timezone,
    })
}

fn parse_history_response(
    body: &str,
    observation_hour: u32,
) -> Result<ProviderHistory, ProviderError> {
    let payload: HistoryResponse = serde_json::from_str(body)
        .map_err(|error| ProviderError::InvalidResponse(format!("history payload: {error}")))?;

    let timezone = payload
        .timezone
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            ProviderError::InvalidResponse("history payload: missing timezone".to_string())
        })?;

    let hourly = payload
        .hourly
        .ok_or_else(|| ProviderError::InvalidResponse("history payload: missing hourly".into()))?;

    let days = build_history_days(hourly, observation_hour)?;

    Ok(ProviderHistory {
        timezone,
        fetched_at: Utc::now(),
        days,
    })
}

/// Picks the `observation_hour` sample of every day before the last day in
/// the series. Samples with a missing temperature, humidity, or wind value
/// are skipped; missing rain counts as none.
fn build_history_days(
    hourly: HistoryHourly,
    observation_hour: u32,
) -> Result<Vec<ProviderHistoryDay>, ProviderError> {
    let length = hourly.time.len();

    if hourly.temperature_2m.len() != length
        || hourly.relative_humidity_2m.len() != length
        || hourly.rain.len() != length
        || hourly.wind_speed_10m.len() != length
        || hourly.weather_code.len() != length
    {
        return Err(ProviderError::InvalidResponse(
            "history payload: hourly arrays length mismatch".to_string(),
        ));
    }

    let mut timestamps = Vec::with_capacity(length);
    for raw in &hourly.time {
        let parsed = NaiveDateTime::parse_from_str(raw.trim(), HOURLY_TIME_FORMAT).map_err(
            |error| {
                ProviderError::InvalidResponse(format!(
                    "history payload: bad timestamp '{raw}': {error}"
                ))
            },
        )?;
        timestamps.push(parsed);
    }

    let Some(today) = timestamps.iter().map(NaiveDateTime::date).max() else {
        return Ok(Vec::new());
    };

    let mut days: Vec<ProviderHistoryDay> = Vec::new();
    for (index, timestamp) in timestamps.iter().enumerate() {
        let date: NaiveDate = timestamp.date();
        if date >= today || timestamp.hour() != observation_hour {
            continue;
        }

        let (Some(temperature), Some(humidity), Some(wind_speed)) = (
            hourly.temperature_2m[index],
            hourly.relative_humidity_2m[index],
            hourly.wind_speed_10m[index],
        ) else {
            tracing::debug!(%date, "open-meteo sample incomplete, leaving day unfilled");
            continue;
        };

        let rainfall = hourly.rain[index].unwrap_or(0.0);
        days.push(ProviderHistoryDay {
            date,
            observation: WeatherObservation::new(temperature, humidity, rainfall, wind_speed),
            weather_code: hourly.weather_code[index],
        });
    }

    days.sort_by_key(|day| day.date);
    Ok(days)
}

fn parse_forecast_response(body: &str) -> Result<ProviderForecast, ProviderError> {
    let payload: ForecastResponse = serde_json::from_str(body)
        .map_err(|error| ProviderError::InvalidResponse(format!("forecast payload: {error}")))?;

    let timezone = payload
        .timezone
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            ProviderError::InvalidResponse("forecast payload: missing timezone".to_string())
        })?;

    let current = payload
        .current
        .ok_or_else(|| ProviderError::InvalidResponse("forecast payload: missing current".into()))
        .and_then(build_current)?;

    let daily = payload
        .daily
        .ok_or_else(|| ProviderError::InvalidResponse("forecast payload: missing daily".into()))?;

    Ok(ProviderForecast {
        timezone,
        fetched_at: Utc::now(),
        current,
        days: build_forecast_days(daily)?,
    })
}

fn build_current(current: ForecastCurrent) -> Result<ProviderCurrent, ProviderError> {
    let (Some(temperature), Some(humidity), Some(wind_speed)) = (
        current.temperature_2m,
        current.relative_humidity_2m,
        current.wind_speed_10m,
    ) else {
        return Err(ProviderError::InvalidResponse(
            "forecast payload: incomplete current conditions".to_string(),
        ));
    };

    Ok(ProviderCurrent {
        observation: WeatherObservation::new(
            temperature,
            humidity,
            current.rain.unwrap_or(0.0),
            wind_speed,
        ),
        weather_code: current.weather_code,
    })
}

/// Days without both extremes are dropped.
fn build_forecast_days(daily: ForecastDaily) -> Result<Vec<ProviderForecastDay>, ProviderError> {
    let length = daily.time.len();

    if daily.weather_code.len() != length
        || daily.temperature_2m_max.len() != length
        || daily.temperature_2m_min.len() != length
    {
        return Err(ProviderError::InvalidResponse(
            "forecast payload: daily arrays length mismatch".to_string(),
        ));
    }

    let mut days = Vec::with_capacity(length);
    for (index, raw) in daily.time.iter().enumerate() {
        let date = NaiveDate::parse_from_str(raw.trim(), DAILY_DATE_FORMAT).map_err(|error| {
            ProviderError::InvalidResponse(format!("forecast payload: bad date '{raw}': {error}"))
        })?;

        let (Some(temp_max_c), Some(temp_min_c)) =
            (daily.temperature_2m_max[index], daily.temperature_2m_min[index])
        else {
            tracing::debug!(%date, "open-meteo forecast day incomplete, dropping it");
            continue;
        };

        days.push(ProviderForecastDay {
            date,
            weather_code: daily.weather_code[index],
            temp_min_c,
            temp_max_c,
        });
    }

    Ok(days)
}

fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let from_json = serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|json| {
            for key in ["reason", "message", "error", "detail", "description"] {
                if let Some(value) = json.get(key).and_then(Value::as_str) {
                    let message = value.trim();
                    if !message.is_empty() {
                        return Some(message.to_string());
                    }
                }
            }
            None
        });

    from_json.or_else(|| Some(trimmed.to_string()))
}
