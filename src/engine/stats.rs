//! Dataset statistics
//!
//! One pass over the collection. Fields that do not parse only drop out of
//! the statistic that needs them; the record still counts in the total.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};

use crate::models::types::Meteorite;

/// Summary returned by `/stats`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DatasetStats {
    pub meteorites_count: usize,
    pub years: Vec<i64>,
    pub min_year: Option<i64>,
    pub max_year: Option<i64>,
    pub min_mass_g: Option<f64>,
    pub max_mass_g: Option<f64>,
    pub avg_mass_g: Option<f64>,
    pub recclasses: Vec<String>,
    pub recclasses_distribution: ClassDistribution,
    pub geolocated_count: usize,
    pub fall_counts: FallCounts,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct FallCounts {
    pub fell: usize,
    pub found: usize,
}

/// Classification counts, most frequent first. Ties keep first-appearance
/// order. Serialized as a JSON object in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassDistribution(pub Vec<(String, usize)>);

impl ClassDistribution {
    pub fn get(&self, class: &str) -> Option<usize> {
        self.0.iter().find(|(c, _)| c == class).map(|(_, n)| *n)
    }
}

impl Serialize for ClassDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (class, count) in &self.0 {
            map.serialize_entry(class, count)?;
        }
        map.end()
    }
}

/// Round to two decimals
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn compute(records: &[Meteorite]) -> DatasetStats {
    let mut years = BTreeSet::new();
    let mut min_mass: Option<f64> = None;
    let mut max_mass: Option<f64> = None;
    let mut total_mass = 0.0;
    let mut mass_count = 0usize;
    let mut fall_counts = FallCounts::default();
    let mut geolocated_count = 0;

    let mut class_order: Vec<(String, usize)> = Vec::new();
    let mut class_index: HashMap<String, usize> = HashMap::new();

    for m in records {
        if let Some(y) = m.year_value() {
            years.insert(y);
        }

        if let Some(mass) = m.mass_value().filter(|v| *v > 0.0) {
            min_mass = Some(min_mass.map_or(mass, |cur| cur.min(mass)));
            max_mass = Some(max_mass.map_or(mass, |cur| cur.max(mass)));
            total_mass += mass;
            mass_count += 1;
        }

        let class = m.classification.trim();
        if !class.is_empty() {
            match class_index.get(class) {
                Some(&i) => class_order[i].1 += 1,
                None => {
                    class_index.insert(class.to_string(), class_order.len());
                    class_order.push((class.to_string(), 1));
                }
            }
        }

        match m.fall_type.trim().to_lowercase().as_str() {
            "fell" => fall_counts.fell += 1,
            "found" => fall_counts.found += 1,
            _ => {}
        }

        if m.coordinates().is_some() {
            geolocated_count += 1;
        }
    }

    let mut recclasses: Vec<String> = class_order.iter().map(|(c, _)| c.clone()).collect();
    recclasses.sort();

    // Stable sort keeps first-appearance order among equal counts
    class_order.sort_by(|a, b| b.1.cmp(&a.1));

    let avg_mass_g = (mass_count > 0).then(|| round2(total_mass / mass_count as f64));

    DatasetStats {
        meteorites_count: records.len(),
        min_year: years.first().copied(),
        max_year: years.last().copied(),
        years: years.into_iter().collect(),
        min_mass_g: min_mass,
        max_mass_g: max_mass,
        avg_mass_g,
        recclasses,
        recclasses_distribution: ClassDistribution(class_order),
        geolocated_count,
        fall_counts,
    }
}
