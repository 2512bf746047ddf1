//! API Request/Response Types

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::engine::filter::validate_geo;
use crate::engine::stats::DatasetStats;
use crate::models::config::ApiConfig;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{FilterSpec, Meteorite};

/// Success envelope: `{"success": ...}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { success: data }
    }
}

/// Failure envelope with a single descriptive field
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ErrorBody {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            warning: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            error: None,
            warning: Some(message.into()),
        }
    }
}

/// Trim a raw query value; blank means absent
pub fn trimmed_param(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Strict numeric query value; anything that is not a finite number is absent
pub fn numeric_param(value: Option<&str>) -> Option<f64> {
    trimmed_param(value)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

// ============================================
// Query extraction
// ============================================

/// Query string extractor where a repeated key keeps its first value.
///
/// Rejections are reported as JSON 400s through [`AppError`].
#[derive(Debug, Clone)]
pub struct FirstValueQuery<T>(pub T);

/// Collapse raw pairs into an object, first occurrence of each key wins
pub fn first_values(pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in pairs {
        map.entry(key).or_insert(Value::String(value));
    }
    map
}

#[async_trait]
impl<T, S> FromRequestParts<S> for FirstValueQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|e| AppError::bad_request(format!("Invalid query string: {}", e.body_text())))?;

        serde_json::from_value(Value::Object(first_values(pairs)))
            .map(FirstValueQuery)
            .map_err(|e| AppError::bad_request(format!("Invalid query parameters: {}", e)))
    }
}

// ============================================
// /random
// ============================================

#[derive(Debug, Default, Deserialize)]
pub struct RandomQuery {
    pub count: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordsData<'a> {
    pub count: usize,
    pub meteorites: Vec<&'a Meteorite>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// ============================================
// /get
// ============================================

#[derive(Debug, Default, Deserialize)]
pub struct LookupQuery {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Exactly one lookup key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Id(String),
    Name(String),
}

impl LookupQuery {
    pub fn into_lookup(self) -> AppResult<Lookup> {
        match (
            trimmed_param(self.id.as_deref()),
            trimmed_param(self.name.as_deref()),
        ) {
            (Some(id), None) => Ok(Lookup::Id(id)),
            (None, Some(name)) => Ok(Lookup::Name(name)),
            (None, None) => Err(AppError::bad_request(
                "Please provide either 'id' or 'name' as a query parameter.",
            )),
            (Some(_), Some(_)) => Err(AppError::bad_request(
                "Please provide either 'id' or 'name', not both.",
            )),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LookupData<'a> {
    pub meteorite: &'a Meteorite,
}

// ============================================
// /search
// ============================================

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub recclass: Option<String>,
    pub fall: Option<String>,
    pub name: Option<String>,
    pub year: Option<String>,
    #[serde(rename = "minYear")]
    pub min_year: Option<String>,
    #[serde(rename = "maxYear")]
    pub max_year: Option<String>,
    pub mass: Option<String>,
    #[serde(rename = "minMass")]
    pub min_mass: Option<String>,
    #[serde(rename = "maxMass")]
    pub max_mass: Option<String>,
    pub center_lat: Option<String>,
    pub center_long: Option<String>,
    pub radius: Option<String>,
}

impl SearchQuery {
    /// Turn raw parameters into a validated [`FilterSpec`].
    pub fn into_filter_spec(self, config: &ApiConfig) -> AppResult<FilterSpec> {
        let mass = match trimmed_param(self.mass.as_deref()) {
            Some(raw) => Some(
                raw.parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| AppError::bad_request("Parameter 'mass' must be a number."))?,
            ),
            None => None,
        };

        let geo = validate_geo(
            numeric_param(self.center_lat.as_deref()),
            numeric_param(self.center_long.as_deref()),
            numeric_param(self.radius.as_deref()),
            config.min_radius_km,
            config.max_radius_km,
        )?;

        Ok(FilterSpec {
            classification: trimmed_param(self.recclass.as_deref()),
            fall_type: trimmed_param(self.fall.as_deref()),
            name: trimmed_param(self.name.as_deref()),
            year: numeric_param(self.year.as_deref()),
            min_year: numeric_param(self.min_year.as_deref()),
            max_year: numeric_param(self.max_year.as_deref()),
            mass,
            min_mass: numeric_param(self.min_mass.as_deref()),
            max_mass: numeric_param(self.max_mass.as_deref()),
            geo,
        })
    }
}

// ============================================
// Stats / Health
// ============================================

pub type StatsData = DatasetStats;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dataset_loaded: bool,
    pub tracked_callers: usize,
}
