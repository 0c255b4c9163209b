#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Proximity feature aggregation for property transaction locations.
//!
//! For every target location this computes:
//!
//! * the number of POIs of any kind within the total radius,
//! * one POI count per configured category within that category's radius,
//! * the distance in kilometers to the nearest POI matching the special
//!   nearest filter (MTR stations by default).
//!
//! Each category's POI subset is filtered once and loaded into its own
//! R-tree. Category subsets are usually orders of magnitude smaller than
//! the full `GeoCom` table, so a per-category index keeps every radius query
//! proportional to the category's density instead of re-filtering a global
//! index for each target.
//!
//! Empty subsets are not errors. A category matching no POIs counts zero
//! everywhere; an empty nearest subset yields `f64::INFINITY`, meaning no
//! reference point exists.

pub mod config;
pub mod progress;

use std::sync::Arc;

use hk_proximity_aggregate_models::{CategoryConfig, FeatureRow, PoiRecord, TargetPoint};
use hk_proximity_spatial::PointIndex;
use thiserror::Error;

use crate::progress::ProgressCallback;

pub use config::ConfigError;

/// Native coordinate unit (meters) per output distance unit (kilometers).
pub const METERS_PER_KILOMETER: f64 = 1000.0;

/// Which input table a coordinate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Property transaction locations.
    Target,
    /// `GeoCom` points of interest.
    Poi,
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Target => f.write_str("target"),
            Self::Poi => f.write_str("POI"),
        }
    }
}

/// Errors that can occur during aggregation.
#[derive(Debug, Error)]
pub enum ProximityError {
    /// The configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A coordinate was NaN or infinite. Rows like this must be removed
    /// before aggregation.
    #[error("Non-finite coordinate in {kind} row {index}: ({easting}, {northing})")]
    NonFiniteCoordinate {
        /// Input table containing the row.
        kind: InputKind,
        /// Zero-based row position in that input.
        index: usize,
        /// Offending easting.
        easting: f64,
        /// Offending northing.
        northing: f64,
    },
}

/// Spatial index over one category's POI subset.
struct CategoryIndex {
    radius: f64,
    index: PointIndex,
}

/// Computes proximity features for `targets` against `pois`.
///
/// Returns exactly one [`FeatureRow`] per target, in input order. The
/// result is deterministic for identical inputs.
///
/// # Errors
///
/// * [`ProximityError::Config`] if `config` fails validation.
/// * [`ProximityError::NonFiniteCoordinate`] if any target or POI
///   coordinate is NaN or infinite. No features are computed in that case.
pub fn aggregate(
    targets: &[TargetPoint],
    pois: &[PoiRecord],
    config: &CategoryConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Vec<FeatureRow>, ProximityError> {
    config::validate(config)?;
    check_coordinates(targets.iter().map(TargetPoint::coords), InputKind::Target)?;
    check_coordinates(pois.iter().map(PoiRecord::coords), InputKind::Poi)?;

    progress.set_total(config.categories.len() as u64 + 2);

    progress.set_message(format!("Counting all POIs within {}m", config.total_radius));
    let total_index = PointIndex::build(pois.iter().map(PoiRecord::coords).collect());
    let total_counts = count_all(targets, &total_index, config.total_radius);
    progress.inc(1);

    let category_indexes: Vec<CategoryIndex> = config
        .categories
        .iter()
        .map(|category| {
            let subset = filter_coords(pois, |poi| category.matches(poi));
            log::info!(
                "Category {}: {} matching POIs, radius {}m",
                category.name,
                subset.len(),
                category.radius
            );
            if subset.is_empty() {
                log::warn!(
                    "Category {} matches no POIs; counts will be zero",
                    category.name
                );
            }
            CategoryIndex {
                radius: category.radius,
                index: PointIndex::build(subset),
            }
        })
        .collect();

    let mut category_counts: Vec<Vec<usize>> = Vec::with_capacity(category_indexes.len());
    for (category, entry) in config.categories.iter().zip(&category_indexes) {
        progress.set_message(format!("Counting {}", category.name));
        category_counts.push(count_all(targets, &entry.index, entry.radius));
        progress.inc(1);
    }

    progress.set_message(format!("Distance to nearest {}", config.nearest.name));
    let nearest_subset = filter_coords(pois, |poi| config.nearest.matches(poi));
    log::info!(
        "Nearest filter {} ({}/{}): {} matching POIs",
        config.nearest.name,
        config.nearest.class,
        config.nearest.poi_type,
        nearest_subset.len()
    );
    if nearest_subset.is_empty() {
        log::warn!(
            "Nearest filter {} matches no POIs; distances will be infinite",
            config.nearest.name
        );
    }
    let nearest_index = PointIndex::build(nearest_subset);
    let nearest_km: Vec<f64> = targets
        .iter()
        .map(|target| nearest_kilometers(&nearest_index, target.coords()))
        .collect();
    progress.inc(1);

    let rows = (0..targets.len())
        .map(|i| FeatureRow {
            total_count: total_counts[i],
            category_counts: category_counts.iter().map(|counts| counts[i]).collect(),
            nearest_km: nearest_km[i],
        })
        .collect();

    progress.finish(format!("Computed features for {} locations", targets.len()));

    Ok(rows)
}

/// Returns the coordinates of every POI accepted by `predicate`.
fn filter_coords(pois: &[PoiRecord], predicate: impl Fn(&PoiRecord) -> bool) -> Vec<[f64; 2]> {
    pois.iter()
        .filter(|poi| predicate(poi))
        .map(PoiRecord::coords)
        .collect()
}

fn count_all(targets: &[TargetPoint], index: &PointIndex, radius: f64) -> Vec<usize> {
    targets
        .iter()
        .map(|target| index.count_within(target.coords(), radius))
        .collect()
}

/// Nearest-neighbor distance in kilometers, or infinity for an empty index.
fn nearest_kilometers(index: &PointIndex, query: [f64; 2]) -> f64 {
    index
        .nearest_distance(query)
        .map_or(f64::INFINITY, |meters| meters / METERS_PER_KILOMETER)
}

fn check_coordinates(
    coords: impl Iterator<Item = [f64; 2]>,
    kind: InputKind,
) -> Result<(), ProximityError> {
    for (index, [easting, northing]) in coords.enumerate() {
        if !easting.is_finite() || !northing.is_finite() {
            return Err(ProximityError::NonFiniteCoordinate {
                kind,
                index,
                easting,
                northing,
            });
        }
    }
    Ok(())
}
