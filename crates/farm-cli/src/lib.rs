pub mod cache;
pub mod config;
pub mod error;
pub mod fallback;
pub mod geocoding;
pub mod logging;
pub mod model;
pub mod providers;
pub mod service;
pub mod weather_code;
