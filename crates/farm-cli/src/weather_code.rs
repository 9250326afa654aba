//! WMO weather interpretation codes as short lowercase descriptions.

pub const SYNTHETIC_DESCRIPTION: &str = "partly cloudy";
pub const UNKNOWN_DESCRIPTION: &str = "unknown conditions";

/// Description for an optional provider code; absent codes are unknown.
pub fn describe(code: Option<i32>) -> &'static str {
    code.map(description).unwrap_or(UNKNOWN_DESCRIPTION)
}

pub fn description(code: i32) -> &'static str {
    match code {
        0 => "clear sky",
        1 => "mainly clear",
        2 => "partly cloudy",
        3 => "overcast",
        45 | 48 => "fog",
        51 | 53 | 55 => "drizzle",
        56 | 57 => "freezing drizzle",
        61 | 63 | 65 => "rain",
        66 | 67 => "freezing rain",
        71 | 73 | 75 | 77 => "snow",
        80..=82 => "rain showers",
        85 | 86 => "snow showers",
        95 => "thunderstorm",
        96 | 99 => "thunderstorm with hail",
        _ => UNKNOWN_DESCRIPTION,
    }
}
