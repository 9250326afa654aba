use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::{self, ConditionAssessment};

/// One day of weather as seen by the classifier.
///
/// Units: degrees Celsius, relative humidity in percent, rain accumulated over
/// one hour in millimeters, wind speed in meters per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: f64,
    pub wind_speed: f64,
}

impl WeatherObservation {
    pub fn new(temperature: f64, humidity: f64, rainfall: f64, wind_speed: f64) -> Self {
        Self {
            temperature,
            humidity,
            rainfall,
            wind_speed,
        }
    }

    pub fn assess(&self) -> ConditionAssessment {
        classifier::assess_observation(self)
    }

    /// Rejects NaN and infinite fields.
    ///
    /// Classification never calls this; it is total over every `f64`. Callers
    /// that take raw user input run it first.
    pub fn validate(&self) -> Result<(), ObservationError> {
        for (field, value) in self.fields() {
            if !value.is_finite() {
                return Err(ObservationError::NonFinite { field, value });
            }
        }
        Ok(())
    }

    fn fields(&self) -> [(&'static str, f64); 4] {
        [
            ("temperature", self.temperature),
            ("humidity", self.humidity),
            ("rainfall", self.rainfall),
            ("wind_speed", self.wind_speed),
        ]
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum ObservationError {
    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },
}
