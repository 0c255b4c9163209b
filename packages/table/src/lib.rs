#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CSV input and output around the proximity aggregator.
//!
//! Property transaction tables keep every original column so the feature
//! columns can be appended and written back out. `GeoCom` POI tables only
//! keep coordinates and class/type codes. Rows with missing or unparsable
//! coordinates (or missing codes, for POIs) are dropped here, so only
//! finite coordinates ever reach the aggregator.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

pub use csv::StringRecord;
use hk_proximity_aggregate_models::{FeatureRow, PoiRecord, TargetPoint};

/// Column names for the property transaction table.
#[derive(Debug, Clone)]
pub struct TargetColumns {
    pub easting: String,
    pub northing: String,
}

impl Default for TargetColumns {
    fn default() -> Self {
        Self {
            easting: "easting".to_string(),
            northing: "northing".to_string(),
        }
    }
}

/// Column names for the `GeoCom` POI table.
#[derive(Debug, Clone)]
pub struct PoiColumns {
    pub easting: String,
    pub northing: String,
    pub class: String,
    pub poi_type: String,
}

impl Default for PoiColumns {
    fn default() -> Self {
        Self {
            easting: "EASTING".to_string(),
            northing: "NORTHING".to_string(),
            class: "CLASS".to_string(),
            poi_type: "TYPE".to_string(),
        }
    }
}

/// A cleaned property table: original cells plus parsed coordinates.
///
/// `rows[i]` and `points[i]` always describe the same property.
#[derive(Debug, Clone)]
pub struct TargetTable {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
    pub points: Vec<TargetPoint>,
}

impl TargetTable {
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Errors from reading or writing tables.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// CSV parsing or writing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error opening or creating a file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A required column is absent from the header.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// Flushing the CSV sink failed.
    #[error("Failed to flush output: {0}")]
    Flush(#[source] std::io::Error),

    /// Feature rows do not line up with table rows.
    #[error("Table has {rows} rows but {features} feature rows were supplied")]
    LengthMismatch {
        /// Rows in the table.
        rows: usize,
        /// Feature rows supplied.
        features: usize,
    },
}

/// Reads a property table from a CSV file.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, the CSV is unreadable, or
/// a coordinate column is missing.
pub fn load_targets(path: &Path, columns: &TargetColumns) -> Result<TargetTable, TableError> {
    let file = open(path)?;
    let table = read_targets(file, columns)?;
    log::info!("Loaded {} property rows from {}", table.len(), path.display());
    Ok(table)
}

/// Reads a property table from any CSV source.
///
/// Rows with an empty, unparsable, or non-finite coordinate are dropped.
///
/// # Errors
///
/// Returns an error if the header cannot be read or a coordinate column is
/// missing.
pub fn read_targets(reader: impl Read, columns: &TargetColumns) -> Result<TargetTable, TableError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let easting_idx = column_index(&headers, &columns.easting)?;
    let northing_idx = column_index(&headers, &columns.northing)?;

    let mut rows = Vec::new();
    let mut points = Vec::new();
    let mut malformed = 0u64;
    let mut dropped = 0u64;

    for (line, result) in csv_reader.records().enumerate() {
        let mut record = match result {
            Ok(r) => r,
            Err(e) => {
                log::debug!("  skipping malformed property row {line}: {e}");
                malformed += 1;
                continue;
            }
        };

        let coords = parse_coordinate(record.get(easting_idx))
            .zip(parse_coordinate(record.get(northing_idx)));
        let Some((easting, northing)) = coords else {
            log::debug!("  dropping property row {line}: invalid coordinates");
            dropped += 1;
            continue;
        };

        // Short rows are padded so every stored row matches the header width.
        while record.len() < headers.len() {
            record.push_field("");
        }

        points.push(TargetPoint::new(easting, northing));
        rows.push(record);
    }

    if malformed > 0 {
        log::warn!("Skipped {malformed} malformed property rows");
    }
    if dropped > 0 {
        log::info!("Dropped {dropped} property rows without usable coordinates");
    }

    Ok(TargetTable {
        headers,
        rows,
        points,
    })
}

/// Reads the `GeoCom` POI table from a CSV file.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, the CSV is unreadable, or
/// a required column is missing.
pub fn load_pois(path: &Path, columns: &PoiColumns) -> Result<Vec<PoiRecord>, TableError> {
    let file = open(path)?;
    let pois = read_pois(file, columns)?;
    log::info!("Loaded {} POIs from {}", pois.len(), path.display());
    Ok(pois)
}

/// Reads POI records from any CSV source.
///
/// Rows with a blank class or type, or an unusable coordinate, are dropped.
/// Other columns are ignored.
///
/// # Errors
///
/// Returns an error if the header cannot be read or a required column is
/// missing.
pub fn read_pois(reader: impl Read, columns: &PoiColumns) -> Result<Vec<PoiRecord>, TableError> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let easting_idx = column_index(&headers, &columns.easting)?;
    let northing_idx = column_index(&headers, &columns.northing)?;
    let class_idx = column_index(&headers, &columns.class)?;
    let type_idx = column_index(&headers, &columns.poi_type)?;

    let mut pois = Vec::new();
    let mut dropped = 0u64;

    for result in csv_reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                log::trace!("  skipping malformed POI row: {e}");
                dropped += 1;
                continue;
            }
        };

        let easting = parse_coordinate(record.get(easting_idx));
        let northing = parse_coordinate(record.get(northing_idx));
        let class = non_blank(record.get(class_idx));
        let poi_type = non_blank(record.get(type_idx));

        match (easting, northing, class, poi_type) {
            (Some(easting), Some(northing), Some(class), Some(poi_type)) => {
                pois.push(PoiRecord::new(easting, northing, class, poi_type));
            }
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        log::info!("Dropped {dropped} POI rows with missing coordinates or codes");
    }

    Ok(pois)
}

/// Writes `table` to a CSV file with the feature columns added.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written, or if
/// `features` does not have one row per table row.
pub fn save_enriched(
    path: &Path,
    table: &TargetTable,
    feature_columns: &[String],
    features: &[FeatureRow],
) -> Result<(), TableError> {
    let file = File::create(path).map_err(|e| TableError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    write_enriched(file, table, feature_columns, features).map_err(|e| match e {
        TableError::Flush(source) => TableError::Io {
            path: path.display().to_string(),
            source,
        },
        other => other,
    })?;
    log::info!("Saved {} enriched rows to {}", table.len(), path.display());
    Ok(())
}

/// Writes `table` with the feature columns added to any CSV sink.
///
/// A feature column whose name already appears in the header (a re-run on
/// an enriched file) overwrites that column; other feature columns are
/// appended in order.
///
/// # Errors
///
/// Returns an error if writing fails or if `features` does not have one row
/// per table row.
pub fn write_enriched(
    writer: impl Write,
    table: &TargetTable,
    feature_columns: &[String],
    features: &[FeatureRow],
) -> Result<(), TableError> {
    if table.rows.len() != features.len() {
        return Err(TableError::LengthMismatch {
            rows: table.rows.len(),
            features: features.len(),
        });
    }

    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header: Vec<&str> = table.headers.iter().collect();
    let mut positions = Vec::with_capacity(feature_columns.len());
    for name in feature_columns {
        if let Some(idx) = header.iter().position(|h| h.trim() == name.as_str()) {
            log::debug!("Overwriting existing column {name}");
            positions.push(idx);
        } else {
            positions.push(header.len());
            header.push(name);
        }
    }
    csv_writer.write_record(&header)?;

    for (row, feature) in table.rows.iter().zip(features) {
        let mut cells: Vec<String> = row.iter().map(str::to_string).collect();
        cells.resize(header.len(), String::new());
        for (&idx, cell) in positions.iter().zip(feature.to_cells()) {
            cells[idx] = cell;
        }
        csv_writer.write_record(&cells)?;
    }

    csv_writer.flush().map_err(TableError::Flush)?;

    Ok(())
}

fn open(path: &Path) -> Result<File, TableError> {
    File::open(path).map_err(|e| TableError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

fn column_index(headers: &StringRecord, name: &str) -> Result<usize, TableError> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| TableError::MissingColumn(name.to_string()))
}

/// Parses a coordinate cell, rejecting blanks, garbage, and non-finite values.
fn parse_coordinate(cell: Option<&str>) -> Option<f64> {
    cell.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn non_blank(cell: Option<&str>) -> Option<&str> {
    cell.map(str::trim).filter(|s| !s.is_empty())
}
