//! Type definitions for the meteorite API
//! Records as stored remotely, plus the typed view computed at load time

use serde::{Deserialize, Deserializer, Serialize};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// One meteorite landing record.
///
/// Numeric fields stay text on the wire. Their typed values are parsed once
/// by [`Meteorite::hydrate`] and never serialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Meteorite {
    #[serde(default, deserialize_with = "text_field")]
    pub id: String,
    #[serde(default, deserialize_with = "text_field")]
    pub name: String,
    #[serde(rename = "recclass", default, deserialize_with = "text_field")]
    pub classification: String,
    /// Mass in grams, decimal text
    #[serde(default, deserialize_with = "text_field")]
    pub mass: String,
    #[serde(rename = "fall", default, deserialize_with = "text_field")]
    pub fall_type: String,
    /// Year, sometimes a full timestamp such as `1880-01-01T00:00:00.000`
    #[serde(default, deserialize_with = "text_field")]
    pub year: String,
    #[serde(default, deserialize_with = "text_field")]
    pub latitude: String,
    #[serde(default, deserialize_with = "text_field")]
    pub longitude: String,

    #[serde(skip)]
    parsed: ParsedFields,
}

/// Typed values cached next to the raw text
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ParsedFields {
    year: Option<i64>,
    mass: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl Meteorite {
    /// Compute the typed fields from the raw text. Called once per record
    /// when the dataset is materialized.
    pub fn hydrate(mut self) -> Self {
        self.parsed = ParsedFields {
            year: parse_leading_int(&self.year),
            mass: parse_leading_float(&self.mass),
            latitude: parse_leading_float(&self.latitude),
            longitude: parse_leading_float(&self.longitude),
        };
        self
    }

    /// Record with only `id` and `name` set. The `with_*` setters below keep
    /// the typed view in sync with the text they assign.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_classification(mut self, classification: impl Into<String>) -> Self {
        self.classification = classification.into();
        self
    }

    pub fn with_fall_type(mut self, fall_type: impl Into<String>) -> Self {
        self.fall_type = fall_type.into();
        self
    }

    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = year.into();
        self.hydrate()
    }

    pub fn with_mass(mut self, mass: impl Into<String>) -> Self {
        self.mass = mass.into();
        self.hydrate()
    }

    pub fn with_coordinates(mut self, latitude: impl Into<String>, longitude: impl Into<String>) -> Self {
        self.latitude = latitude.into();
        self.longitude = longitude.into();
        self.hydrate()
    }

    pub fn year_value(&self) -> Option<i64> {
        self.parsed.year
    }

    pub fn mass_value(&self) -> Option<f64> {
        self.parsed.mass
    }

    /// Both coordinates, only when both parse
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.parsed.latitude, self.parsed.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Accepts strings, numbers, booleans or null and keeps them as text.
fn text_field<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

// ============================================
// Text parsing
// ============================================

/// Integer at the start of `raw` (after trimming). `"1880-01-01"` gives 1880,
/// `"abc"` gives `None`.
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    s[..end].parse().ok()
}

/// Decimal number at the start of `raw` (after trimming), with optional
/// fraction and exponent. `"21.5 g"` gives 21.5.
pub fn parse_leading_float(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }

    let mut mantissa_digits = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        mantissa_digits += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        let mut frac_end = end + 1;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
            mantissa_digits += 1;
        }
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return None;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Lowercased, trimmed, accent-free form used for name matching.
pub fn normalize_name(raw: &str) -> String {
    raw.trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

// ============================================
// Filters
// ============================================

/// Geographic circle for radius searches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoCircle {
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_km: f64,
}

/// Immutable set of optional search predicates. `None` means no constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    pub classification: Option<String>,
    pub fall_type: Option<String>,
    /// Substring, matched accent- and case-insensitively
    pub name: Option<String>,
    pub year: Option<f64>,
    pub min_year: Option<f64>,
    pub max_year: Option<f64>,
    /// Exact mass, already parsed from the caller's text
    pub mass: Option<f64>,
    pub min_mass: Option<f64>,
    pub max_mass: Option<f64>,
    pub geo: Option<GeoCircle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_int() {
        assert_eq!(parse_leading_int("1880"), Some(1880));
        assert_eq!(parse_leading_int(" 1880-01-01T00:00:00.000 "), Some(1880));
        assert_eq!(parse_leading_int("-45"), Some(-45));
        assert_eq!(parse_leading_int("bad"), None);
        assert_eq!(parse_leading_int(""), None);
        assert_eq!(parse_leading_int("-"), None);
    }

    #[test]
    fn test_leading_float() {
        assert_eq!(parse_leading_float("21"), Some(21.0));
        assert_eq!(parse_leading_float("21.5 g"), Some(21.5));
        assert_eq!(parse_leading_float(".5"), Some(0.5));
        assert_eq!(parse_leading_float("-33.4"), Some(-33.4));
        assert_eq!(parse_leading_float("1e3"), Some(1000.0));
        assert_eq!(parse_leading_float("2e"), Some(2.0));
        assert_eq!(parse_leading_float("."), None);
        assert_eq!(parse_leading_float("n/a"), None);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Aïr "), "air");
        assert_eq!(normalize_name("Älmhult"), "almhult");
        assert_eq!(normalize_name("AACHEN"), "aachen");
    }

    #[test]
    fn test_deserialize_mixed_field_types() {
        let raw = r#"{"id":"1","name":"Aachen","recclass":"L5","mass":21,"fall":"Fell","year":"1880-01-01T00:00:00.000","latitude":50.775,"longitude":null}"#;
        let m: Meteorite = serde_json::from_str::<Meteorite>(raw).unwrap().hydrate();
        assert_eq!(m.mass, "21");
        assert_eq!(m.mass_value(), Some(21.0));
        assert_eq!(m.year_value(), Some(1880));
        assert_eq!(m.longitude, "");
        assert_eq!(m.coordinates(), None);
    }

    #[test]
    fn test_builder_keeps_typed_view_in_sync() {
        let m = Meteorite::new("7", "Abee")
            .with_year("1952-01-01T00:00:00.000")
            .with_mass("107000")
            .with_coordinates("54.21667", "-113.0");
        assert_eq!(m.year_value(), Some(1952));
        assert_eq!(m.mass_value(), Some(107000.0));
        assert_eq!(m.coordinates(), Some((54.21667, -113.0)));

        let m = m.with_mass("unknown");
        assert_eq!(m.mass_value(), None);
        assert_eq!(m.year_value(), Some(1952));
    }

    #[test]
    fn test_serialize_keeps_wire_names_only() {
        let m = Meteorite {
            id: "1".into(),
            classification: "L5".into(),
            fall_type: "Fell".into(),
            ..Default::default()
        }
        .hydrate();
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["recclass"], "L5");
        assert_eq!(json["fall"], "Fell");
        assert!(json.get("parsed").is_none());
    }
}
