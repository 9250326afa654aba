//! Farming-condition classifier.
//!
//! - `observation`: the four-field daily weather input and its optional validation.
//! - `classifier`: scoring, rating thresholds, and advisory composition.
//! - `summary`: frequency counts over a run of ratings.

pub mod classifier;
pub mod observation;
pub mod summary;

pub use classifier::{ConditionAssessment, FarmingCondition, assess, score};
pub use observation::{ObservationError, WeatherObservation};
pub use summary::ConditionSummary;
