#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the property proximity feature tool.
//!
//! Loads a property transaction CSV and the `GeoCom` POI CSV, computes the
//! per-category POI counts and nearest-station distance for every property,
//! and writes the enriched table back out.
//!
//! Uses `indicatif-log-bridge` (via [`hk_proximity_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use hk_proximity_aggregate::{aggregate, config};
use hk_proximity_aggregate_models::{CategoryConfig, CategoryRule, FeatureRow};
use hk_proximity_cli_utils::IndicatifProgress;
use hk_proximity_table::{PoiColumns, StringRecord, TargetColumns, TargetTable};

const PREVIEW_LABEL_COLUMN: &str = "property_name";

#[derive(Parser)]
#[command(name = "hk_proximity", about = "POI proximity features for property transactions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich a property CSV with POI counts and nearest-station distance
    Run {
        /// Property transaction CSV with easting/northing columns
        #[arg(long)]
        targets: PathBuf,
        /// `GeoCom` POI CSV with EASTING, NORTHING, CLASS, TYPE columns
        #[arg(long)]
        pois: PathBuf,
        /// Where to write the enriched CSV
        #[arg(long)]
        output: PathBuf,
        /// Category config TOML (defaults to the embedded Hong Kong set)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the radius in meters for the all-POI count
        #[arg(long)]
        total_radius: Option<f64>,
        /// Easting column in the property CSV
        #[arg(long, default_value = "easting")]
        easting_column: String,
        /// Northing column in the property CSV
        #[arg(long, default_value = "northing")]
        northing_column: String,
        /// Number of enriched rows to print after saving
        #[arg(long, default_value = "5")]
        preview: usize,
    },
    /// List the configured POI categories
    Categories {
        /// Category config TOML (defaults to the embedded Hong Kong set)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = hk_proximity_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            targets,
            pois,
            output,
            config,
            total_radius,
            easting_column,
            northing_column,
            preview,
        } => {
            let mut category_config = resolve_config(config.as_deref())?;
            if let Some(radius) = total_radius {
                category_config.total_radius = radius;
            }

            let start = Instant::now();

            let columns = TargetColumns {
                easting: easting_column,
                northing: northing_column,
            };
            let table = hk_proximity_table::load_targets(&targets, &columns)?;
            let poi_records = hk_proximity_table::load_pois(&pois, &PoiColumns::default())?;

            let progress = IndicatifProgress::steps_bar(&multi, "Computing proximity features");
            let features = aggregate(&table.points, &poi_records, &category_config, &progress)?;

            let feature_columns = category_config.column_names();
            hk_proximity_table::save_enriched(&output, &table, &feature_columns, &features)?;

            log::info!(
                "Enriched {} properties in {:.1}s",
                table.len(),
                start.elapsed().as_secs_f64()
            );

            print_preview(&table, &feature_columns, &features, preview);
        }
        Commands::Categories { config } => {
            let category_config = resolve_config(config.as_deref())?;
            println!("{:<24} {:>8}  RULES", "CATEGORY", "RADIUS");
            println!("{}", "-".repeat(70));
            for category in &category_config.categories {
                let rules: Vec<String> = category.rules.iter().map(describe_rule).collect();
                println!(
                    "{:<24} {:>7}m  {}",
                    category.name,
                    category.radius,
                    rules.join(" | ")
                );
            }
            println!();
            println!(
                "Total POI radius: {}m; nearest {}: {}/{}",
                category_config.total_radius,
                category_config.nearest.name,
                category_config.nearest.class,
                category_config.nearest.poi_type
            );
        }
    }

    Ok(())
}

fn resolve_config(path: Option<&Path>) -> Result<CategoryConfig, config::ConfigError> {
    path.map_or_else(|| Ok(config::default_config()), config::load_config)
}

fn describe_rule(rule: &CategoryRule) -> String {
    rule.types.as_ref().map_or_else(
        || format!("{} (all types)", rule.class),
        |types| {
            let types: Vec<&str> = types.iter().map(String::as_str).collect();
            format!("{} [{}]", rule.class, types.join(", "))
        },
    )
}

fn print_preview(
    table: &TargetTable,
    feature_columns: &[String],
    features: &[FeatureRow],
    limit: usize,
) {
    if limit == 0 || features.is_empty() {
        return;
    }

    let label_idx = label_column(&table.headers);
    let label = table.headers.get(label_idx).unwrap_or("row");
    println!();
    println!("{label}\t{}", feature_columns.join("\t"));
    for (row, feature) in table.rows.iter().zip(features).take(limit) {
        println!(
            "{}\t{}",
            row.get(label_idx).unwrap_or_default(),
            feature.to_cells().join("\t")
        );
    }
}

/// Column identifying each property in the preview: `property_name` when
/// present, otherwise the first column.
fn label_column(headers: &StringRecord) -> usize {
    headers
        .iter()
        .position(|h| h.trim() == PREVIEW_LABEL_COLUMN)
        .unwrap_or(0)
}
