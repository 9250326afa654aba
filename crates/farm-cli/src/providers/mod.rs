use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use farming_core::WeatherObservation;
use reqwest::blocking::Client;
use thiserror::Error;

use crate::config::{PROVIDER_TIMEOUT_SECS, RetryPolicy};
use crate::geocoding::ResolvedLocation;

pub mod open_meteo;

/// One past day as sampled by a provider, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderHistoryDay {
    pub date: NaiveDate,
    pub observation: WeatherObservation,
    pub weather_code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderHistory {
    pub timezone: String,
    pub fetched_at: DateTime<Utc>,
    /// Oldest first. Days the provider could not fill are absent.
    pub days: Vec<ProviderHistoryDay>,
}

/// Conditions at request time.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCurrent {
    pub observation: WeatherObservation,
    pub weather_code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderForecastDay {
    pub date: NaiveDate,
    pub weather_code: Option<i32>,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderForecast {
    pub timezone: String,
    pub fetched_at: DateTime<Utc>,
    pub current: ProviderCurrent,
    /// Starts with today.
    pub days: Vec<ProviderForecastDay>,
}

pub trait ProviderApi {
    fn geocode_city(&self, city: &str) -> Result<ResolvedLocation, ProviderError>;
    fn fetch_history(
        &self,
        lat: f64,
        lon: f64,
        past_days: usize,
    ) -> Result<ProviderHistory, ProviderError>;
    fn fetch_forecast(
        &self,
        lat: f64,
        lon: f64,
        forecast_days: usize,
    ) -> Result<ProviderForecast, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct HttpProviders {
    client: Client,
    retry_policy: RetryPolicy,
}

impl HttpProviders {
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .map_err(|error| ProviderError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            retry_policy: RetryPolicy::default(),
        })
    }
}

impl ProviderApi for HttpProviders {
    fn geocode_city(&self, city: &str) -> Result<ResolvedLocation, ProviderError> {
        open_meteo::fetch_geocode(&self.client, city, self.retry_policy)
    }

    fn fetch_history(
        &self,
        lat: f64,
        lon: f64,
        past_days: usize,
    ) -> Result<ProviderHistory, ProviderError> {
        open_meteo::fetch_history(&self.client, lat, lon, past_days, self.retry_policy)
    }

    fn fetch_forecast(
        &self,
        lat: f64,
        lon: f64,
        forecast_days: usize,
    ) -> Result<ProviderForecast, ProviderError> {
        open_meteo::fetch_forecast(&self.client, lat, lon, forecast_days, self.retry_policy)
    }
}

pub fn execute_with_retry<T, F, S>(
    provider_name: &'static str,
    policy: RetryPolicy,
    mut operation: F,
    mut sleep_fn: S,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Result<T, ProviderError>,
    S: FnMut(Duration),
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match operation() {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !error.retryable() || attempt == max_attempts {
                    return Err(error.with_provider(provider_name));
                }

                let delay = policy.backoff_for_attempt(attempt + 1);
                tracing::debug!(
                    provider = provider_name,
                    attempt,
                    delay_ms = delay,
                    %error,
                    "retrying provider request"
                );
                sleep_fn(Duration::from_millis(delay));
            }
        }
    }

    Err(ProviderError::InvalidResponse(format!(
        "{provider_name}: exhausted retry attempts"
    )))
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("http error ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("location not found: {0}")]
    NotFound(String),
}

impl ProviderError {
    pub fn retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_) => true,
            ProviderError::Http { status, .. } => *status == 429 || (500..=599).contains(status),
            ProviderError::InvalidResponse(_) => false,
            ProviderError::NotFound(_) => false,
        }
    }

    pub fn with_provider(self, provider: &'static str) -> Self {
        match self {
            ProviderError::Transport(message) => {
                ProviderError::Transport(format!("{provider}: {message}"))
            }
            ProviderError::Http { status, message } => ProviderError::Http {
                status,
                message: format!("{provider}: {message}"),
            },
            ProviderError::InvalidResponse(message) => {
                ProviderError::InvalidResponse(format!("{provider}: {message}"))
            }
            ProviderError::NotFound(message) => {
                ProviderError::NotFound(format!("{provider}: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn retry_recovers_history_after_server_error() {
        let attempts = Cell::new(0usize);
        let mut sleeps = Vec::new();

        let history = execute_with_retry(
            "open_meteo",
            RetryPolicy::default(),
            || {
                attempts.set(attempts.get() + 1);
                if attempts.get() == 1 {
                    return Err(ProviderError::Http {
                        status: 503,
                        message: "upstream busy".to_string(),
                    });
                }
                Ok(ProviderHistory {
                    timezone: "Asia/Kolkata".to_string(),
                    fetched_at: Utc::now(),
                    days: Vec::new(),
                })
            },
            |delay| sleeps.push(delay.as_millis()),
        )
        .expect("second attempt succeeds");

        assert_eq!(history.timezone, "Asia/Kolkata");
        assert_eq!(attempts.get(), 2);
        assert_eq!(sleeps, vec![200]);
    }

    #[test]
    fn retry_gives_up_on_unknown_city_without_sleeping() {
        let attempts = Cell::new(0usize);

        let error = execute_with_retry(
            "open_meteo",
            RetryPolicy::default(),
            || -> Result<ResolvedLocation, ProviderError> {
                attempts.set(attempts.get() + 1);
                Err(ProviderError::NotFound("Atlantis".to_string()))
            },
            |_| panic!("must not sleep"),
        )
        .expect_err("must fail");

        assert_eq!(attempts.get(), 1);
        assert_eq!(
            error,
            ProviderError::NotFound("open_meteo: Atlantis".to_string())
        );
    }

    #[test]
    fn retry_reports_last_transport_error_with_provider_prefix() {
        let error = execute_with_retry(
            "open_meteo",
            RetryPolicy::default(),
            || -> Result<ProviderForecast, ProviderError> {
                Err(ProviderError::Transport("timed out".to_string()))
            },
            |_| {},
        )
        .expect_err("must fail");

        assert_eq!(
            error.to_string(),
            "transport error: open_meteo: timed out"
        );
        assert!(
            !ProviderError::Http {
                status: 400,
                message: "bad past_days".to_string()
            }
            .retryable()
        );
    }
}
