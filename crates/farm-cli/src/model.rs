use chrono::NaiveDate;
use farming_core::{
    ConditionAssessment, ConditionSummary, FarmingCondition, ObservationError, WeatherObservation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::MAX_HISTORY_DAYS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    OpenMeteo,
    Synthetic,
}

impl DataSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenMeteo => "open_meteo",
            Self::Synthetic => "synthetic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessStatus {
    Live,
    CacheFresh,
    CacheStaleFallback,
    SyntheticFallback,
}

impl FreshnessStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::CacheFresh => "cache_fresh",
            Self::CacheStaleFallback => "cache_stale_fallback",
            Self::SyntheticFallback => "synthetic_fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub status: FreshnessStatus,
    pub key: String,
    pub ttl_secs: u64,
    pub age_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// One classified day. Reported values are rounded for display; the
/// condition was computed from the unrounded observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryDay {
    pub date: String,
    pub label: String,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub rainfall_mm: f64,
    pub wind_speed_ms: f64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_code: Option<i32>,
    pub source: DataSource,
    pub condition: FarmingCondition,
    pub score: i32,
    pub advice: String,
}

pub const DAY_LABEL_FORMAT: &str = "%a, %b %-d";

impl HistoryDay {
    /// Classifies `raw` and records `reported` as the displayed values.
    pub fn classify(
        date: NaiveDate,
        raw: &WeatherObservation,
        reported: WeatherObservation,
        description: &str,
        weather_code: Option<i32>,
        source: DataSource,
    ) -> Self {
        let ConditionAssessment {
            condition,
            score,
            advice,
        } = raw.assess();

        Self {
            date: date.format("%Y-%m-%d").to_string(),
            label: date.format(DAY_LABEL_FORMAT).to_string(),
            temperature_c: reported.temperature,
            humidity_pct: reported.humidity,
            rainfall_mm: reported.rainfall,
            wind_speed_ms: reported.wind_speed,
            description: description.to_string(),
            weather_code,
            source,
            condition,
            score,
            advice,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryOutput {
    pub location: HistoryLocation,
    pub timezone: String,
    pub days: Vec<HistoryDay>,
    pub summary: ConditionSummary,
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_trace: Vec<String>,
    pub fetched_at: String,
    pub freshness: CacheMetadata,
}

/// Conditions right now, rated like a history day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub rainfall_mm: f64,
    pub wind_speed_ms: f64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_code: Option<i32>,
    pub condition: FarmingCondition,
    pub score: i32,
    pub advice: String,
}

impl CurrentConditions {
    pub fn classify(raw: &WeatherObservation, description: &str, weather_code: Option<i32>) -> Self {
        let ConditionAssessment {
            condition,
            score,
            advice,
        } = raw.assess();
        let reported = round_observation(raw);

        Self {
            temperature_c: reported.temperature,
            humidity_pct: reported.humidity,
            rainfall_mm: reported.rainfall,
            wind_speed_ms: reported.wind_speed,
            description: description.to_string(),
            weather_code,
            condition,
            score,
            advice,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: String,
    pub label: String,
    pub temp_max_c: f64,
    pub temp_min_c: f64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_code: Option<i32>,
}

impl ForecastDay {
    pub fn new(
        date: NaiveDate,
        temp_max_c: f64,
        temp_min_c: f64,
        description: &str,
        weather_code: Option<i32>,
    ) -> Self {
        Self {
            date: date.format("%Y-%m-%d").to_string(),
            label: date.format(DAY_LABEL_FORMAT).to_string(),
            temp_max_c: temp_max_c.round(),
            temp_min_c: temp_min_c.round(),
            description: description.to_string(),
            weather_code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutput {
    pub location: HistoryLocation,
    pub timezone: String,
    pub current: CurrentConditions,
    pub days: Vec<ForecastDay>,
    pub source: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_trace: Vec<String>,
    pub fetched_at: String,
    pub freshness: CacheMetadata,
}

/// Provider values rounded to one decimal for display.
pub fn round_observation(raw: &WeatherObservation) -> WeatherObservation {
    WeatherObservation::new(
        round1(raw.temperature),
        round1(raw.humidity),
        round1(raw.rainfall),
        round1(raw.wind_speed),
    )
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessOutput {
    pub observation: WeatherObservation,
    #[serde(flatten)]
    pub assessment: ConditionAssessment,
}

impl AssessOutput {
    pub fn new(observation: WeatherObservation) -> Self {
        Self {
            assessment: observation.assess(),
            observation,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    City(String),
    Coordinates { lat: f64, lon: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRequest {
    pub location: LocationQuery,
    pub days: usize,
}

impl LocationQuery {
    pub fn from_input(
        city: Option<&str>,
        lat: Option<f64>,
        lon: Option<f64>,
    ) -> Result<Self, ValidationError> {
        let has_city = city.is_some();
        let has_coords = lat.is_some() || lon.is_some();

        if has_city && has_coords {
            return Err(ValidationError::ConflictingLocationInput);
        }

        match (city, lat, lon) {
            (Some(raw_city), None, None) => Ok(LocationQuery::City(normalize_city(raw_city)?)),
            (None, Some(lat), Some(lon)) => {
                validate_coordinates(lat, lon)?;
                Ok(LocationQuery::Coordinates { lat, lon })
            }
            (None, None, None) => Err(ValidationError::MissingLocationInput),
            _ => Err(ValidationError::PartialCoordinates),
        }
    }
}

impl HistoryRequest {
    pub fn new(
        city: Option<&str>,
        lat: Option<f64>,
        lon: Option<f64>,
        days: usize,
    ) -> Result<Self, ValidationError> {
        let location = LocationQuery::from_input(city, lat, lon)?;

        if !(1..=MAX_HISTORY_DAYS).contains(&days) {
            return Err(ValidationError::InvalidDays(days));
        }

        Ok(Self { location, days })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub location: LocationQuery,
}

impl ForecastRequest {
    pub fn new(
        city: Option<&str>,
        lat: Option<f64>,
        lon: Option<f64>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            location: LocationQuery::from_input(city, lat, lon)?,
        })
    }
}

pub fn observation_from_input(
    temperature: f64,
    humidity: f64,
    rainfall: f64,
    wind_speed: f64,
) -> Result<WeatherObservation, ValidationError> {
    let observation = WeatherObservation::new(temperature, humidity, rainfall, wind_speed);
    observation.validate()?;
    Ok(observation)
}

pub fn normalize_city(raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::EmptyCity);
    }
    Ok(value.to_string())
}

pub fn validate_coordinates(lat: f64, lon: f64) -> Result<(), ValidationError> {
    if !((-90.0)..=90.0).contains(&lat) {
        return Err(ValidationError::InvalidLatitude(lat));
    }
    if !((-180.0)..=180.0).contains(&lon) {
        return Err(ValidationError::InvalidLongitude(lon));
    }
    Ok(())
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("missing location input: use --city or --lat/--lon")]
    MissingLocationInput,
    #[error("partial coordinates: provide both --lat and --lon")]
    PartialCoordinates,
    #[error("conflicting location input: use either --city or --lat/--lon")]
    ConflictingLocationInput,
    #[error("city must not be empty")]
    EmptyCity,
    #[error("invalid latitude: {0}")]
    InvalidLatitude(f64),
    #[error("invalid longitude: {0}")]
    InvalidLongitude(f64),
    #[error("days must be between 1 and 30, got {0}")]
    InvalidDays(usize),
    #[error(transparent)]
    InvalidObservation(#[from] ObservationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_request_accepts_city_input() {
        let request = HistoryRequest::new(Some("Guntur"), None, None, 10).expect("request");

        assert_eq!(request.location, LocationQuery::City("Guntur".to_string()));
        assert_eq!(request.days, 10);
    }

    #[test]
    fn model_request_accepts_coordinate_input() {
        let request = HistoryRequest::new(None, Some(16.3), Some(80.45), 3).expect("request");

        assert!(matches!(
            request.location,
            LocationQuery::Coordinates { .. }
        ));
    }

    #[test]
    fn model_rejects_missing_location_input() {
        let err = HistoryRequest::new(None, None, None, 10).expect_err("must fail");
        assert_eq!(err, ValidationError::MissingLocationInput);
    }

    #[test]
    fn model_rejects_partial_coordinates() {
        let err = HistoryRequest::new(None, Some(16.3), None, 10).expect_err("must fail");
        assert_eq!(err, ValidationError::PartialCoordinates);
    }

    #[test]
    fn model_rejects_conflicting_location_input() {
        let err =
            HistoryRequest::new(Some("Guntur"), Some(16.3), Some(80.45), 10).expect_err("fail");
        assert_eq!(err, ValidationError::ConflictingLocationInput);
    }

    #[test]
    fn model_rejects_invalid_latitude() {
        let err = HistoryRequest::new(None, Some(100.0), Some(80.0), 10).expect_err("must fail");
        assert_eq!(err, ValidationError::InvalidLatitude(100.0));
    }

    #[test]
    fn model_rejects_invalid_longitude() {
        let err = HistoryRequest::new(None, Some(16.0), Some(190.0), 10).expect_err("must fail");
        assert_eq!(err, ValidationError::InvalidLongitude(190.0));
    }

    #[test]
    fn model_rejects_out_of_range_days() {
        assert_eq!(
            HistoryRequest::new(Some("Guntur"), None, None, 0).expect_err("zero"),
            ValidationError::InvalidDays(0)
        );
        assert_eq!(
            HistoryRequest::new(Some("Guntur"), None, None, 31).expect_err("too many"),
            ValidationError::InvalidDays(31)
        );
    }

    #[test]
    fn model_normalize_city_trims_input() {
        assert_eq!(normalize_city("  Guntur  ").expect("city"), "Guntur");
        assert_eq!(normalize_city("   "), Err(ValidationError::EmptyCity));
    }

    #[test]
    fn model_observation_input_rejects_nan() {
        let err = observation_from_input(20.0, f64::NAN, 0.0, 3.0).expect_err("must fail");
        assert!(err.to_string().contains("humidity"));
    }

    #[test]
    fn model_history_day_classifies_raw_but_reports_rounded() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 15).expect("date");
        let raw = WeatherObservation::new(29.96, 70.4, 0.0, 8.04);
        let reported = WeatherObservation::new(30.0, 70.0, 0.0, 8.0);

        let day = HistoryDay::classify(
            date,
            &raw,
            reported,
            "clear sky",
            Some(0),
            DataSource::OpenMeteo,
        );

        assert_eq!(day.date, "2026-10-15");
        assert_eq!(day.label, "Thu, Oct 15");
        assert_eq!(day.temperature_c, 30.0);
        // Raw humidity 70.4 and wind 8.04 fall outside the top buckets.
        assert_eq!(day.score, 3 + 1 + 0 + 0);
        assert_eq!(day.condition, FarmingCondition::Good);
    }

    #[test]
    fn model_forecast_request_shares_location_rules() {
        let request = ForecastRequest::new(Some(" Guntur "), None, None).expect("request");
        assert_eq!(request.location, LocationQuery::City("Guntur".to_string()));

        assert_eq!(
            ForecastRequest::new(None, None, Some(80.4)).expect_err("partial"),
            ValidationError::PartialCoordinates
        );
    }

    #[test]
    fn model_current_conditions_rate_raw_values() {
        let raw = WeatherObservation::new(36.04, 58.26, 0.0, 3.56);
        let current = CurrentConditions::classify(&raw, "clear sky", Some(0));

        assert_eq!(current.temperature_c, 36.0);
        assert_eq!(current.humidity_pct, 58.3);
        assert_eq!(current.wind_speed_ms, 3.6);
        // 36.04 is past the hot threshold even though it displays as 36.0.
        assert_eq!(current.score, 1 + 2 + 0 + 1);
        assert_eq!(current.condition, FarmingCondition::Good);
        assert!(current.advice.contains("High temperature may stress plants."));
    }

    #[test]
    fn model_forecast_day_rounds_extremes() {
        let day = ForecastDay::new(
            NaiveDate::from_ymd_opt(2026, 10, 19).expect("date"),
            33.6,
            23.4,
            "rain",
            Some(61),
        );

        assert_eq!(day.label, "Mon, Oct 19");
        assert_eq!(day.temp_max_c, 34.0);
        assert_eq!(day.temp_min_c, 23.0);
    }

    #[test]
    fn model_assess_output_flattens_assessment() {
        let output = AssessOutput::new(WeatherObservation::new(25.0, 60.0, 5.0, 5.0));
        let value = serde_json::to_value(&output).expect("json");

        assert_eq!(value["condition"], serde_json::json!("excellent"));
        assert_eq!(value["score"], serde_json::json!(8));
        assert!(value["observation"].get("humidity").is_some());
    }
}
