use serde::{Deserialize, Serialize};

use crate::observation::WeatherObservation;

pub const DEFAULT_ADVICE: &str = "Good conditions for most farming activities.";

const EXCELLENT_MIN_SCORE: i32 = 6;
const GOOD_MIN_SCORE: i32 = 4;
const FAIR_MIN_SCORE: i32 = 2;

/// Ordinal rating; declaration order makes `Poor < Fair < Good < Excellent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FarmingCondition {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl FarmingCondition {
    pub const ALL: [FarmingCondition; 4] = [
        FarmingCondition::Excellent,
        FarmingCondition::Good,
        FarmingCondition::Fair,
        FarmingCondition::Poor,
    ];

    pub fn from_score(score: i32) -> Self {
        if score >= EXCELLENT_MIN_SCORE {
            Self::Excellent
        } else if score >= GOOD_MIN_SCORE {
            Self::Good
        } else if score >= FAIR_MIN_SCORE {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
        }
    }

    pub fn advice_prefix(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent conditions! ",
            Self::Good => "Good conditions. ",
            Self::Fair => "Fair conditions. ",
            Self::Poor => "Challenging conditions. ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionAssessment {
    pub condition: FarmingCondition,
    pub score: i32,
    pub advice: String,
}

type AdvisoryCheck = fn(&WeatherObservation) -> bool;

// Checked in order; every triggered sentence is kept.
const ADVISORIES: [(AdvisoryCheck, &str); 7] = [
    (|o: &WeatherObservation| o.temperature < 15.0, "Cold weather may slow crop growth."),
    (|o: &WeatherObservation| o.temperature > 35.0, "High temperature may stress plants."),
    (|o: &WeatherObservation| o.humidity < 40.0, "Low humidity - consider irrigation."),
    (|o: &WeatherObservation| o.humidity > 80.0, "High humidity may increase disease risk."),
    (|o: &WeatherObservation| o.rainfall > 25.0, "Heavy rainfall - ensure proper drainage."),
    (
        |o: &WeatherObservation| o.rainfall == 0.0 && o.humidity < 50.0,
        "Dry conditions - irrigation recommended.",
    ),
    (|o: &WeatherObservation| o.wind_speed > 15.0, "Strong winds may damage crops."),
];

pub fn assess(
    temperature: f64,
    humidity: f64,
    rainfall: f64,
    wind_speed: f64,
) -> ConditionAssessment {
    assess_observation(&WeatherObservation::new(
        temperature,
        humidity,
        rainfall,
        wind_speed,
    ))
}

pub(crate) fn assess_observation(observation: &WeatherObservation) -> ConditionAssessment {
    let score = score(observation);
    let condition = FarmingCondition::from_score(score);

    // The rating comes from the score, the sentences from raw thresholds. The
    // two are allowed to disagree (e.g. a cold but otherwise ideal day).
    let mut advice = String::from(condition.advice_prefix());
    advice.push_str(&advisory_text(observation));

    ConditionAssessment {
        condition,
        score,
        advice,
    }
}

pub fn score(observation: &WeatherObservation) -> i32 {
    temperature_points(observation.temperature)
        + humidity_points(observation.humidity)
        + rainfall_points(observation.rainfall)
        + wind_points(observation.wind_speed)
}

fn advisory_text(observation: &WeatherObservation) -> String {
    let mut text = String::new();
    for (check, sentence) in ADVISORIES {
        if check(observation) {
            text.push_str(sentence);
            text.push(' ');
        }
    }

    if text.is_empty() {
        text.push_str(DEFAULT_ADVICE);
    }
    text
}

fn temperature_points(celsius: f64) -> i32 {
    if (20.0..=30.0).contains(&celsius) {
        3
    } else if (15.0..=35.0).contains(&celsius) {
        2
    } else if (10.0..=40.0).contains(&celsius) {
        1
    } else {
        0
    }
}

fn humidity_points(percent: f64) -> i32 {
    if (50.0..=70.0).contains(&percent) {
        2
    } else if (40.0..=80.0).contains(&percent) {
        1
    } else {
        0
    }
}

fn rainfall_points(mm: f64) -> i32 {
    if mm > 0.0 && mm <= 10.0 {
        2
    } else if mm > 10.0 && mm <= 25.0 {
        1
    } else if mm > 50.0 {
        -1
    } else {
        0
    }
}

fn wind_points(meters_per_sec: f64) -> i32 {
    if (2.0..=8.0).contains(&meters_per_sec) {
        1
    } else if meters_per_sec > 15.0 {
        -1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_ideal_day_is_excellent_with_default_advice() {
        let result = assess(25.0, 60.0, 5.0, 5.0);

        assert_eq!(result.condition, FarmingCondition::Excellent);
        assert_eq!(result.score, 8);
        assert_eq!(
            result.advice,
            "Excellent conditions! Good conditions for most farming activities."
        );
    }

    #[test]
    fn classifier_cold_dry_windy_day_is_poor() {
        let result = assess(10.0, 30.0, 0.0, 20.0);

        assert_eq!(result.score, 0);
        assert_eq!(result.condition, FarmingCondition::Poor);
        assert_eq!(
            result.advice,
            "Challenging conditions. Cold weather may slow crop growth. \
             Low humidity - consider irrigation. Dry conditions - irrigation recommended. \
             Strong winds may damage crops. "
        );
    }

    #[test]
    fn classifier_hot_humid_flooded_day_is_poor() {
        let result = assess(40.0, 85.0, 60.0, 1.0);

        // +1 temperature (40 is inside [10, 40]), -1 rainfall.
        assert_eq!(result.score, 0);
        assert_eq!(result.condition, FarmingCondition::Poor);
        assert_eq!(
            result.advice,
            "Challenging conditions. High temperature may stress plants. \
             High humidity may increase disease risk. Heavy rainfall - ensure proper drainage. "
        );
    }

    #[test]
    fn classifier_is_idempotent() {
        let first = assess(17.3, 44.0, 0.0, 9.1);
        let second = assess(17.3, 44.0, 0.0, 9.1);
        assert_eq!(first, second);
    }

    #[test]
    fn classifier_score_never_rises_away_from_optimum_temperature() {
        let mut previous = i32::MAX;
        for offset in 0..=30_i32 {
            let offset = f64::from(offset);
            let above = score(&WeatherObservation::new(25.0 + offset, 60.0, 5.0, 5.0));
            let below = score(&WeatherObservation::new(25.0 - offset, 60.0, 5.0, 5.0));

            assert_eq!(above, below, "asymmetric at offset {offset}");
            assert!(above <= previous, "score rose at offset {offset}");
            previous = above;
        }
    }

    #[test]
    fn classifier_dry_advisory_requires_humidity_strictly_below_fifty() {
        let at_fifty = assess(25.0, 50.0, 0.0, 5.0);
        let below_fifty = assess(25.0, 49.0, 0.0, 5.0);

        assert!(!at_fifty.advice.contains("Dry conditions"));
        assert!(below_fifty.advice.contains("Dry conditions - irrigation recommended."));
    }

    #[test]
    fn classifier_rating_thresholds_map_scores() {
        assert_eq!(FarmingCondition::from_score(8), FarmingCondition::Excellent);
        assert_eq!(FarmingCondition::from_score(6), FarmingCondition::Excellent);
        assert_eq!(FarmingCondition::from_score(5), FarmingCondition::Good);
        assert_eq!(FarmingCondition::from_score(4), FarmingCondition::Good);
        assert_eq!(FarmingCondition::from_score(3), FarmingCondition::Fair);
        assert_eq!(FarmingCondition::from_score(2), FarmingCondition::Fair);
        assert_eq!(FarmingCondition::from_score(1), FarmingCondition::Poor);
        assert_eq!(FarmingCondition::from_score(-2), FarmingCondition::Poor);
    }

    #[test]
    fn classifier_rainfall_gap_scores_nothing() {
        let dry = score(&WeatherObservation::new(0.0, 0.0, 0.0, 0.0));
        let gap = score(&WeatherObservation::new(0.0, 0.0, 30.0, 0.0));
        let flood = score(&WeatherObservation::new(0.0, 0.0, 50.5, 0.0));

        assert_eq!(dry, 0);
        assert_eq!(gap, 0);
        assert_eq!(flood, -1);
    }

    #[test]
    fn classifier_interval_edges_score_as_documented() {
        // Each factor varies with the other three held at zero points.
        let temperature_cases = [
            (9.99, 0),
            (10.0, 1),
            (14.99, 1),
            (15.0, 2),
            (19.99, 2),
            (20.0, 3),
            (30.0, 3),
            (30.01, 2),
            (35.0, 2),
            (35.01, 1),
            (40.0, 1),
            (40.01, 0),
        ];
        for (celsius, expected) in temperature_cases {
            let observation = WeatherObservation::new(celsius, 0.0, 0.0, 0.0);
            assert_eq!(score(&observation), expected, "temperature {celsius}");
        }

        let humidity_cases = [
            (39.99, 0),
            (40.0, 1),
            (49.99, 1),
            (50.0, 2),
            (70.0, 2),
            (70.01, 1),
            (80.0, 1),
            (80.01, 0),
        ];
        for (percent, expected) in humidity_cases {
            let observation = WeatherObservation::new(0.0, percent, 0.0, 0.0);
            assert_eq!(score(&observation), expected, "humidity {percent}");
        }

        let rainfall_cases = [
            (0.0, 0),
            (0.01, 2),
            (10.0, 2),
            (10.01, 1),
            (25.0, 1),
            (25.01, 0),
            (50.0, 0),
            (50.01, -1),
        ];
        for (mm, expected) in rainfall_cases {
            let observation = WeatherObservation::new(0.0, 0.0, mm, 0.0);
            assert_eq!(score(&observation), expected, "rainfall {mm}");
        }

        let wind_cases = [
            (1.99, 0),
            (2.0, 1),
            (8.0, 1),
            (8.01, 0),
            (15.0, 0),
            (15.01, -1),
        ];
        for (meters_per_sec, expected) in wind_cases {
            let observation = WeatherObservation::new(0.0, 0.0, 0.0, meters_per_sec);
            assert_eq!(score(&observation), expected, "wind {meters_per_sec}");
        }
    }

    #[test]
    fn classifier_advisory_thresholds_are_strict() {
        // Score 2 + 1 + 1 + 0 on both edges; no sentence fires at the limits.
        for (temperature, humidity) in [(15.0, 40.0), (35.0, 80.0)] {
            let result = assess(temperature, humidity, 25.0, 15.0);
            assert_eq!(
                result.advice,
                "Good conditions. Good conditions for most farming activities.",
                "temperature {temperature}, humidity {humidity}"
            );
        }

        let past_low_edges = assess(14.99, 39.99, 25.01, 15.01);
        assert_eq!(
            past_low_edges.advice,
            "Challenging conditions. Cold weather may slow crop growth. \
             Low humidity - consider irrigation. Heavy rainfall - ensure proper drainage. \
             Strong winds may damage crops. "
        );

        let past_high_edges = assess(35.01, 80.01, 0.0, 5.0);
        assert!(
            past_high_edges
                .advice
                .contains("High temperature may stress plants. High humidity may increase disease risk. ")
        );
    }

    #[test]
    fn classifier_keeps_rating_and_advice_independent() {
        // Score 1 + 2 + 2 + 1 rates excellent while the cold check still fires.
        let result = assess(14.0, 60.0, 5.0, 5.0);

        assert_eq!(result.condition, FarmingCondition::Excellent);
        assert_eq!(
            result.advice,
            "Excellent conditions! Cold weather may slow crop growth. "
        );
    }

    #[test]
    fn classifier_non_finite_inputs_fall_through() {
        let result = assess(f64::NAN, f64::NAN, f64::NAN, f64::NAN);

        assert_eq!(result.score, 0);
        assert_eq!(result.condition, FarmingCondition::Poor);
        assert_eq!(
            result.advice,
            "Challenging conditions. Good conditions for most farming activities."
        );
    }

    #[test]
    fn classifier_condition_orders_by_favorability() {
        assert!(FarmingCondition::Excellent > FarmingCondition::Good);
        assert!(FarmingCondition::Good > FarmingCondition::Fair);
        assert!(FarmingCondition::Fair > FarmingCondition::Poor);
    }

    #[test]
    fn classifier_condition_serializes_snake_case() {
        let value = serde_json::to_value(FarmingCondition::Excellent).expect("json");
        assert_eq!(value, serde_json::json!("excellent"));
        assert_eq!(FarmingCondition::Fair.as_str(), "fair");
    }
}
