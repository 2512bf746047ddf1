//! Filter Engine
//!
//! Pure narrowing passes over a record collection. Every pass keeps input
//! order, and passes compose as a logical AND. Records whose fields do not
//! parse are excluded from any pass that needs that field, never treated as
//! zero.

use crate::models::errors::{AppError, AppResult};
use crate::models::types::{normalize_name, FilterSpec, GeoCircle, Meteorite};
use crate::utils::constants::EARTH_RADIUS_KM;

/// Great-circle distance in kilometers between two lat/lon points (degrees)
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Build a search circle from optional parameters.
///
/// No parameter at all means no geographic constraint. Once any of them is
/// given, all three must be present and in range.
pub fn validate_geo(
    center_lat: Option<f64>,
    center_lon: Option<f64>,
    radius_km: Option<f64>,
    min_radius_km: f64,
    max_radius_km: f64,
) -> AppResult<Option<GeoCircle>> {
    if center_lat.is_none() && center_lon.is_none() && radius_km.is_none() {
        return Ok(None);
    }

    let invalid = || {
        AppError::bad_request(
            "Missing required location parameters: center_lat, center_long, and radius.",
        )
    };

    let (lat, lon, radius) = match (center_lat, center_lon, radius_km) {
        (Some(lat), Some(lon), Some(radius)) => (lat, lon, radius),
        _ => return Err(invalid()),
    };

    let lat_ok = (-90.0..=90.0).contains(&lat);
    let lon_ok = (-180.0..=180.0).contains(&lon);
    let radius_ok = radius > 0.0 && radius >= min_radius_km && radius <= max_radius_km;

    if !(lat_ok && lon_ok && radius_ok) {
        return Err(invalid());
    }

    Ok(Some(GeoCircle {
        center_lat: lat,
        center_lon: lon,
        radius_km: radius,
    }))
}

/// Exact year wins over the bounds; bounds are inclusive and independent.
pub fn matches_date(m: &Meteorite, year: Option<f64>, min_year: Option<f64>, max_year: Option<f64>) -> bool {
    if year.is_none() && min_year.is_none() && max_year.is_none() {
        return true;
    }
    let Some(y) = m.year_value() else {
        return false;
    };
    let y = y as f64;

    if let Some(exact) = year {
        return y == exact;
    }
    min_year.map_or(true, |min| y >= min) && max_year.map_or(true, |max| y <= max)
}

/// Exact mass and bounds all apply when given.
pub fn matches_mass(m: &Meteorite, mass: Option<f64>, min_mass: Option<f64>, max_mass: Option<f64>) -> bool {
    if mass.is_none() && min_mass.is_none() && max_mass.is_none() {
        return true;
    }
    let Some(value) = m.mass_value() else {
        return false;
    };

    mass.map_or(true, |exact| value == exact)
        && min_mass.map_or(true, |min| value >= min)
        && max_mass.map_or(true, |max| value <= max)
}

pub fn matches_location(m: &Meteorite, circle: &GeoCircle) -> bool {
    match m.coordinates() {
        Some((lat, lon)) => {
            haversine_km(circle.center_lat, circle.center_lon, lat, lon) <= circle.radius_km
        }
        None => false,
    }
}

/// Case-insensitive equality on a categorical field
fn equals_ignore_case(field: &str, wanted: &str) -> bool {
    field.trim().to_lowercase() == wanted.trim().to_lowercase()
}

/// Case- and accent-insensitive containment on the record name
fn name_contains(m: &Meteorite, needle: &str) -> bool {
    !m.name.is_empty() && normalize_name(&m.name).contains(&normalize_name(needle))
}

/// Apply every predicate of `spec` to `records`, keeping order.
pub fn apply<'a, I>(records: I, spec: &FilterSpec) -> Vec<&'a Meteorite>
where
    I: IntoIterator<Item = &'a Meteorite>,
{
    records
        .into_iter()
        .filter(|m| {
            spec.classification
                .as_deref()
                .map_or(true, |c| equals_ignore_case(&m.classification, c))
        })
        .filter(|m| {
            spec.fall_type
                .as_deref()
                .map_or(true, |f| equals_ignore_case(&m.fall_type, f))
        })
        .filter(|m| spec.name.as_deref().map_or(true, |n| name_contains(m, n)))
        .filter(|m| matches_date(m, spec.year, spec.min_year, spec.max_year))
        .filter(|m| matches_mass(m, spec.mass, spec.min_mass, spec.max_mass))
        .filter(|m| spec.geo.as_ref().map_or(true, |circle| matches_location(m, circle)))
        .collect()
}

/// First record with exactly this id
pub fn find_by_id<'a>(records: &'a [Meteorite], id: &str) -> Option<&'a Meteorite> {
    records.iter().find(|m| !m.id.is_empty() && m.id == id)
}

/// First record whose name matches ignoring case and accents
pub fn find_by_name<'a>(records: &'a [Meteorite], name: &str) -> Option<&'a Meteorite> {
    let wanted = normalize_name(name);
    records
        .iter()
        .find(|m| !m.name.is_empty() && normalize_name(&m.name) == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, year: &str, mass: &str, lat: &str, lon: &str) -> Meteorite {
        Meteorite::new(id, format!("M{}", id))
            .with_year(year)
            .with_mass(mass)
            .with_coordinates(lat, lon)
    }

    fn sample() -> Vec<Meteorite> {
        vec![
            record("a", "1880", "21", "", ""),
            record("b", "1999", "5", "", ""),
            record("c", "bad", "0", "", ""),
        ]
    }

    fn ids(found: &[&Meteorite]) -> Vec<String> {
        found.iter().map(|m| m.id.clone()).collect()
    }

    #[test]
    fn test_haversine_known_distances() {
        assert_eq!(haversine_km(0.0, 0.0, 0.0, 0.0), 0.0);
        let d = haversine_km(0.0, 0.0, 0.001, 0.001);
        assert!((d - 0.157).abs() < 0.001, "got {}", d);
        // Paris to London is roughly 344 km
        let d = haversine_km(48.8566, 2.3522, 51.5074, -0.1278);
        assert!((d - 343.5).abs() < 2.0, "got {}", d);
    }

    #[test]
    fn test_year_range() {
        let data = sample();
        let spec = FilterSpec {
            min_year: Some(1900.0),
            max_year: Some(2000.0),
            ..Default::default()
        };
        assert_eq!(ids(&apply(&data, &spec)), vec!["b"]);
    }

    #[test]
    fn test_exact_year_overrides_bounds() {
        let data = sample();
        let spec = FilterSpec {
            year: Some(1880.0),
            min_year: Some(1900.0),
            ..Default::default()
        };
        assert_eq!(ids(&apply(&data, &spec)), vec!["a"]);
    }

    #[test]
    fn test_unparsable_year_only_excluded_when_date_filter_active() {
        let data = sample();
        assert_eq!(apply(&data, &FilterSpec::default()).len(), 3);

        let spec = FilterSpec {
            max_year: Some(3000.0),
            ..Default::default()
        };
        assert_eq!(ids(&apply(&data, &spec)), vec!["a", "b"]);
    }

    #[test]
    fn test_mass_exact_and_bounds() {
        let data = sample();
        let spec = FilterSpec {
            mass: Some(21.0),
            ..Default::default()
        };
        assert_eq!(ids(&apply(&data, &spec)), vec!["a"]);

        let spec = FilterSpec {
            min_mass: Some(0.0),
            max_mass: Some(5.0),
            ..Default::default()
        };
        assert_eq!(ids(&apply(&data, &spec)), vec!["b", "c"]);
    }

    #[test]
    fn test_geo_radius() {
        let data = vec![
            record("near", "2000", "1", "0.001", "0.001"),
            record("far", "2000", "1", "10", "10"),
            record("nowhere", "2000", "1", "", "abc"),
        ];
        let spec = FilterSpec {
            geo: Some(GeoCircle {
                center_lat: 0.0,
                center_lon: 0.0,
                radius_km: 1.0,
            }),
            ..Default::default()
        };
        assert_eq!(ids(&apply(&data, &spec)), vec!["near"]);
    }

    #[test]
    fn test_validate_geo() {
        assert_eq!(validate_geo(None, None, None, 1.0, 5000.0).unwrap(), None);
        assert!(validate_geo(Some(0.0), Some(0.0), Some(1.0), 1.0, 5000.0)
            .unwrap()
            .is_some());

        // Partial triple
        assert!(validate_geo(Some(0.0), None, Some(1.0), 1.0, 5000.0).is_err());
        // Out of range
        assert!(validate_geo(Some(91.0), Some(0.0), Some(10.0), 1.0, 5000.0).is_err());
        assert!(validate_geo(Some(0.0), Some(-181.0), Some(10.0), 1.0, 5000.0).is_err());
        assert!(validate_geo(Some(0.0), Some(0.0), Some(0.5), 1.0, 5000.0).is_err());
        assert!(validate_geo(Some(0.0), Some(0.0), Some(6000.0), 1.0, 5000.0).is_err());
    }

    #[test]
    fn test_categorical_filters() {
        let mut data = sample();
        data[0].classification = "L5".into();
        data[0].fall_type = "Fell".into();
        data[1].classification = "H6".into();
        data[1].fall_type = "Found".into();

        let spec = FilterSpec {
            classification: Some("l5".into()),
            ..Default::default()
        };
        assert_eq!(ids(&apply(&data, &spec)), vec!["a"]);

        let spec = FilterSpec {
            fall_type: Some("FOUND".into()),
            ..Default::default()
        };
        assert_eq!(ids(&apply(&data, &spec)), vec!["b"]);
    }

    #[test]
    fn test_name_substring_ignores_accents() {
        let mut data = sample();
        data[0].name = "Älmhult".into();
        let spec = FilterSpec {
            name: Some("ALMH".into()),
            ..Default::default()
        };
        assert_eq!(ids(&apply(&data, &spec)), vec!["a"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let data = vec![
            record("1", "1900", "10", "45.0", "5.0"),
            record("2", "1950", "500", "45.1", "5.1"),
            record("3", "2001", "20", "46.0", "6.0"),
            record("4", "", "20", "45.0", "5.0"),
        ];
        let spec = FilterSpec {
            min_year: Some(1900.0),
            max_mass: Some(100.0),
            geo: Some(GeoCircle {
                center_lat: 45.0,
                center_lon: 5.0,
                radius_km: 200.0,
            }),
            ..Default::default()
        };

        let once = apply(&data, &spec);
        let twice = apply(once.iter().copied(), &spec);
        assert_eq!(ids(&once), ids(&twice));
        assert_eq!(ids(&once), vec!["1", "3"]);
    }

    #[test]
    fn test_lookup_by_id_and_name() {
        let mut data = sample();
        data[1].name = "Aïr".into();
        assert_eq!(find_by_id(&data, "b").map(|m| m.id.as_str()), Some("b"));
        assert!(find_by_id(&data, "zzz").is_none());
        assert_eq!(find_by_name(&data, "air").map(|m| m.id.as_str()), Some("b"));
        assert!(find_by_name(&data, "ai").is_none());
    }
}
