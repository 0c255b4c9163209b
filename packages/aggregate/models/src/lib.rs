#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Point, POI, and category configuration types.
//!
//! Defines the TOML schema for proximity category definitions and the
//! in-memory records consumed and produced by the aggregator. Coordinates
//! are planar HK1980 grid easting/northing values in meters.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A property transaction location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetPoint {
    /// Easting in meters.
    pub easting: f64,
    /// Northing in meters.
    pub northing: f64,
}

impl TargetPoint {
    #[must_use]
    pub const fn new(easting: f64, northing: f64) -> Self {
        Self { easting, northing }
    }

    /// Returns the coordinate as an `[easting, northing]` pair.
    #[must_use]
    pub const fn coords(&self) -> [f64; 2] {
        [self.easting, self.northing]
    }
}

/// A tagged point of interest from the `GeoCom` table.
#[derive(Debug, Clone, PartialEq)]
pub struct PoiRecord {
    /// Easting in meters.
    pub easting: f64,
    /// Northing in meters.
    pub northing: f64,
    /// `GeoCom` class code (e.g. `"SCH"`, `"TRS"`).
    pub class: String,
    /// `GeoCom` type code within the class (e.g. `"PRI"`, `"MTA"`).
    pub poi_type: String,
}

impl PoiRecord {
    #[must_use]
    pub fn new(
        easting: f64,
        northing: f64,
        class: impl Into<String>,
        poi_type: impl Into<String>,
    ) -> Self {
        Self {
            easting,
            northing,
            class: class.into(),
            poi_type: poi_type.into(),
        }
    }

    /// Returns the coordinate as an `[easting, northing]` pair.
    #[must_use]
    pub const fn coords(&self) -> [f64; 2] {
        [self.easting, self.northing]
    }
}

/// A single class/type matching rule.
///
/// `types: None` matches every type of the class. `Some` must hold at least
/// one type; an empty whitelist is rejected during config validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Class code that must match exactly.
    pub class: String,
    /// Optional type whitelist within the class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<BTreeSet<String>>,
}

impl CategoryRule {
    /// A rule matching every type of `class`.
    #[must_use]
    pub fn any_type(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            types: None,
        }
    }

    /// A rule matching only the listed types of `class`.
    #[must_use]
    pub fn with_types<I, S>(class: impl Into<String>, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            class: class.into(),
            types: Some(types.into_iter().map(Into::into).collect()),
        }
    }

    #[must_use]
    pub fn matches(&self, poi: &PoiRecord) -> bool {
        poi.class == self.class
            && self
                .types
                .as_ref()
                .is_none_or(|types| types.contains(&poi.poi_type))
    }
}

/// A named POI category: the union of its rules, counted within `radius`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpec {
    /// Category name, used in the output column name.
    pub name: String,
    /// Search radius in meters.
    pub radius: f64,
    /// Rules combined with logical OR.
    pub rules: Vec<CategoryRule>,
}

impl CategorySpec {
    /// Returns `true` if any rule matches `poi`.
    #[must_use]
    pub fn matches(&self, poi: &PoiRecord) -> bool {
        self.rules.iter().any(|rule| rule.matches(poi))
    }

    /// Output column name, e.g. `category_Education_within_2000m`.
    #[must_use]
    pub fn column_name(&self) -> String {
        format!("category_{}_within_{}m", self.name, self.radius)
    }
}

/// The POI subclass used for the nearest-neighbor distance feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearestSpec {
    /// Short label used in the output column (e.g. `"mtr"`).
    pub name: String,
    /// Class code that must match exactly.
    pub class: String,
    /// Type code that must match exactly.
    #[serde(rename = "type")]
    pub poi_type: String,
}

impl NearestSpec {
    #[must_use]
    pub fn matches(&self, poi: &PoiRecord) -> bool {
        poi.class == self.class && poi.poi_type == self.poi_type
    }

    /// Output column name, e.g. `distance_to_nearest_mtr_km`.
    #[must_use]
    pub fn column_name(&self) -> String {
        format!("distance_to_nearest_{}_km", self.name)
    }
}

/// Complete description of one aggregation run, deserialized from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Radius in meters for the all-POI count.
    pub total_radius: f64,
    /// Special filter for the nearest-distance feature.
    pub nearest: NearestSpec,
    /// Categories in output column order.
    pub categories: Vec<CategorySpec>,
}

impl CategoryConfig {
    /// Output column name for the all-POI count, e.g. `total_poi_within_1000m`.
    #[must_use]
    pub fn total_column_name(&self) -> String {
        format!("total_poi_within_{}m", self.total_radius)
    }

    /// All feature column names in output order: total count, one count per
    /// category, nearest distance.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.categories.len() + 2);
        names.push(self.total_column_name());
        names.extend(self.categories.iter().map(CategorySpec::column_name));
        names.push(self.nearest.column_name());
        names
    }
}

/// Derived proximity features for one target point.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// Number of POIs of any kind within the total radius.
    pub total_count: usize,
    /// One count per configured category, in configuration order.
    pub category_counts: Vec<usize>,
    /// Distance in kilometers to the nearest special POI, or `+inf` when
    /// none exist.
    pub nearest_km: f64,
}

impl FeatureRow {
    /// Renders the row as cell strings in [`CategoryConfig::column_names`]
    /// order.
    #[must_use]
    pub fn to_cells(&self) -> Vec<String> {
        let mut cells = Vec::with_capacity(self.category_counts.len() + 2);
        cells.push(self.total_count.to_string());
        cells.extend(self.category_counts.iter().map(ToString::to_string));
        cells.push(self.nearest_km.to_string());
        cells
    }
}
