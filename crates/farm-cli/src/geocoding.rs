use crate::model::HistoryLocation;

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

impl ResolvedLocation {
    pub fn from_coordinates(lat: f64, lon: f64) -> Self {
        Self {
            name: coordinate_label(lat, lon),
            latitude: lat,
            longitude: lon,
            timezone: "UTC".to_string(),
        }
    }

    pub fn to_output_location(&self) -> HistoryLocation {
        HistoryLocation {
            name: self.name.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    pub fn cache_key(&self) -> String {
        let slug = slugify(&self.name);
        format!(
            "{}-{:.4}-{:.4}",
            slug,
            round4(self.latitude),
            round4(self.longitude)
        )
    }
}

/// Key for a city lookup before geocoding, so a fresh cache skips the
/// geocoding call entirely.
pub fn city_query_cache_key(city: &str) -> String {
    format!("city-{}", slugify(city))
}

pub fn coordinate_label(lat: f64, lon: f64) -> String {
    format!("{:.4},{:.4}", round4(lat), round4(lon))
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn slugify(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_dash = false;

    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            prev_dash = false;
            out.push(ch.to_ascii_lowercase());
            continue;
        }

        if !prev_dash {
            out.push('-');
            prev_dash = true;
        }
    }

    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geocoding_cache_key_includes_slug_and_coords() {
        let location = ResolvedLocation {
            name: "Guntur City".to_string(),
            latitude: 16.306652,
            longitude: 80.436539,
            timezone: "Asia/Kolkata".to_string(),
        };

        assert_eq!(location.cache_key(), "guntur-city-16.3067-80.4365");
    }

    #[test]
    fn geocoding_city_query_key_is_case_insensitive() {
        assert_eq!(city_query_cache_key("Guntur"), "city-guntur");
        assert_eq!(city_query_cache_key(" GUNTUR "), "city-guntur");
    }

    #[test]
    fn geocoding_coordinate_location_uses_label_and_utc() {
        let location = ResolvedLocation::from_coordinates(16.3066521, 80.4365123);

        assert_eq!(location.name, "16.3067,80.4365");
        assert_eq!(location.timezone, "UTC");
    }

    #[test]
    fn geocoding_slugify_cleans_non_ascii_boundaries() {
        let location = ResolvedLocation {
            name: "Guntur / Brodipet".to_string(),
            latitude: 16.3,
            longitude: 80.44,
            timezone: "Asia/Kolkata".to_string(),
        };

        assert_eq!(location.cache_key(), "guntur-brodipet-16.3000-80.4400");
    }
}
