//! Synthetic weather for days the provider could not supply.
//!
//! Values are drawn around typical growing-season weather: temperature
//! 20-30 °C, humidity 50-80 %, rain on roughly three days in ten, and a light
//! to moderate breeze. Days are classified on the raw draw and reported
//! rounded.

use chrono::NaiveDate;
use farming_core::WeatherObservation;
use rand::Rng;

use crate::model::{DataSource, HistoryDay};
use crate::weather_code::SYNTHETIC_DESCRIPTION;

const BASE_TEMPERATURE_C: f64 = 25.0;
const TEMPERATURE_SPREAD_C: f64 = 10.0;
const BASE_HUMIDITY_PCT: f64 = 50.0;
const HUMIDITY_SPREAD_PCT: f64 = 30.0;
const RAIN_CHANCE_THRESHOLD: f64 = 0.7;
const MAX_RAINFALL_MM: f64 = 15.0;
const BASE_WIND_MS: f64 = 2.0;
const WIND_SPREAD_MS: f64 = 8.0;

/// Uniform draws in `[0, 1)` that fully determine one synthetic day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticDraws {
    pub temperature: f64,
    pub humidity: f64,
    pub rain_chance: f64,
    pub rain_amount: f64,
    pub wind: f64,
}

impl SyntheticDraws {
    pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            temperature: rng.random(),
            humidity: rng.random(),
            rain_chance: rng.random(),
            rain_amount: rng.random(),
            wind: rng.random(),
        }
    }

    pub fn observation(&self) -> WeatherObservation {
        let rainfall = if self.rain_chance > RAIN_CHANCE_THRESHOLD {
            self.rain_amount * MAX_RAINFALL_MM
        } else {
            0.0
        };

        WeatherObservation::new(
            BASE_TEMPERATURE_C + (self.temperature - 0.5) * TEMPERATURE_SPREAD_C,
            BASE_HUMIDITY_PCT + self.humidity * HUMIDITY_SPREAD_PCT,
            rainfall,
            BASE_WIND_MS + self.wind * WIND_SPREAD_MS,
        )
    }
}

pub fn synthetic_day(date: NaiveDate, draws: SyntheticDraws) -> HistoryDay {
    let raw = draws.observation();
    HistoryDay::classify(
        date,
        &raw,
        reported_values(&raw),
        SYNTHETIC_DESCRIPTION,
        None,
        DataSource::Synthetic,
    )
}

pub fn synthetic_days<R: Rng + ?Sized>(dates: &[NaiveDate], rng: &mut R) -> Vec<HistoryDay> {
    dates
        .iter()
        .map(|date| synthetic_day(*date, SyntheticDraws::sample(rng)))
        .collect()
}

fn reported_values(raw: &WeatherObservation) -> WeatherObservation {
    WeatherObservation::new(
        raw.temperature.round(),
        raw.humidity.round(),
        round1(raw.rainfall),
        round1(raw.wind_speed),
    )
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
