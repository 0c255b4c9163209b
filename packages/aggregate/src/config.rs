//! Loading and validation of category configurations.
//!
//! The Hong Kong `GeoCom` category set is embedded at compile time via
//! `include_str!`. Alternative configurations can be loaded from a TOML
//! file with the same schema. Every configuration passes through
//! [`validate`] before the aggregator sees it.

use std::collections::BTreeSet;
use std::path::Path;

use hk_proximity_aggregate_models::{CategoryConfig, CategoryRule};
use thiserror::Error;

/// Embedded default configuration.
const HONG_KONG_TOML: &str = include_str!("../configs/hong_kong.toml");

/// Errors that make a category configuration unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Path to the config file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The TOML did not match the configuration schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A rule lists `types = []`. Omit `types` to match every type.
    #[error("Category '{category}' has a rule for class '{class}' with an empty type whitelist")]
    EmptyTypeWhitelist {
        /// Category containing the rule.
        category: String,
        /// Class of the offending rule.
        class: String,
    },

    /// A category has no rules at all.
    #[error("Category '{0}' has no rules")]
    NoRules(String),

    /// Two categories share a name, so their output columns would collide.
    #[error("Duplicate category name: {0}")]
    DuplicateCategory(String),

    /// A name or class code is blank.
    #[error("Empty {field} in {context}")]
    EmptyField {
        /// Which field is blank.
        field: &'static str,
        /// Where it was found.
        context: String,
    },

    /// A radius is negative, NaN, or infinite.
    #[error("Invalid radius {radius} for {context}")]
    InvalidRadius {
        /// Offending value.
        radius: f64,
        /// Where it was found.
        context: String,
    },
}

/// Returns the embedded Hong Kong category configuration.
///
/// # Panics
///
/// Panics if the embedded TOML fails to parse or validate. It is a
/// compile-time constant, so a failure is a development error caught by
/// the tests below.
#[must_use]
pub fn default_config() -> CategoryConfig {
    from_toml_str(HONG_KONG_TOML)
        .unwrap_or_else(|e| panic!("Failed to load embedded Hong Kong config: {e}"))
}

/// Parses and validates a configuration from a TOML string.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for schema errors and any validation
/// error from [`validate`].
pub fn from_toml_str(toml_str: &str) -> Result<CategoryConfig, ConfigError> {
    let config: CategoryConfig = toml::de::from_str(toml_str)?;
    validate(&config)?;
    Ok(config)
}

/// Reads, parses, and validates a configuration file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
/// [`from_toml_str`].
pub fn load_config(path: &Path) -> Result<CategoryConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let config = from_toml_str(&contents)?;
    log::info!(
        "Loaded {} categories from {}",
        config.categories.len(),
        path.display()
    );
    Ok(config)
}

/// Checks every structural invariant of a configuration.
///
/// # Errors
///
/// Returns the first violation found, in configuration order.
pub fn validate(config: &CategoryConfig) -> Result<(), ConfigError> {
    check_radius(config.total_radius, "total POI count")?;

    let nearest = &config.nearest;
    let nearest_context = format!("nearest filter '{}'", nearest.name);
    check_non_empty(&nearest.name, "name", "nearest filter")?;
    check_non_empty(&nearest.class, "class", &nearest_context)?;
    check_non_empty(&nearest.poi_type, "type", &nearest_context)?;

    let mut seen = BTreeSet::new();
    for category in &config.categories {
        check_non_empty(&category.name, "name", "category")?;
        if !seen.insert(category.name.as_str()) {
            return Err(ConfigError::DuplicateCategory(category.name.clone()));
        }

        let context = format!("category '{}'", category.name);
        check_radius(category.radius, &context)?;

        if category.rules.is_empty() {
            return Err(ConfigError::NoRules(category.name.clone()));
        }
        for rule in &category.rules {
            check_rule(&category.name, rule)?;
        }
    }

    Ok(())
}

fn check_rule(category: &str, rule: &CategoryRule) -> Result<(), ConfigError> {
    check_non_empty(&rule.class, "class", &format!("category '{category}'"))?;

    if rule.types.as_ref().is_some_and(BTreeSet::is_empty) {
        return Err(ConfigError::EmptyTypeWhitelist {
            category: category.to_string(),
            class: rule.class.clone(),
        });
    }

    Ok(())
}

fn check_radius(radius: f64, context: &str) -> Result<(), ConfigError> {
    if radius.is_finite() && radius >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidRadius {
            radius,
            context: context.to_string(),
        })
    }
}

fn check_non_empty(value: &str, field: &'static str, context: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::EmptyField {
            field,
            context: context.to_string(),
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
total_radius = 1000.0

[nearest]
name = "mtr"
class = "TRS"
type = "MTA"

[[categories]]
name = "Education"
radius = 2000.0
rules = [{ class = "SCH" }]
"#;

    #[test]
    fn embedded_config_has_all_categories() {
        let config = default_config();
        let names: Vec<&str> = config.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Community_Facilities",
                "Education",
                "Recreation",
                "Medical",
                "Public_Market",
                "Religion",
                "Transportation",
                "Tourism",
            ]
        );
        assert!((config.total_radius - 1000.0).abs() < f64::EPSILON);
        assert_eq!(config.nearest.class, "TRS");
        assert_eq!(config.nearest.poi_type, "MTA");
    }

    #[test]
    fn embedded_transportation_combines_bus_and_rail() {
        let config = default_config();
        let transport = config
            .categories
            .iter()
            .find(|c| c.name == "Transportation")
            .unwrap();
        assert_eq!(
            transport.rules,
            vec![
                CategoryRule::any_type("BUS"),
                CategoryRule::with_types("TRS", ["MTA", "LRA"]),
            ]
        );
    }

    #[test]
    fn parses_minimal_config() {
        let config = from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.categories.len(), 1);
        assert_eq!(config.categories[0].rules[0], CategoryRule::any_type("SCH"));
    }

    #[test]
    fn rejects_empty_type_whitelist() {
        let toml_str = MINIMAL.replace(r#"{ class = "SCH" }"#, r#"{ class = "SCH", types = [] }"#);
        let err = from_toml_str(&toml_str).unwrap_err();
        assert!(
            matches!(
                &err,
                ConfigError::EmptyTypeWhitelist { category, class }
                    if category == "Education" && class == "SCH"
            ),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn rejects_category_without_rules() {
        let toml_str = MINIMAL.replace(r#"[{ class = "SCH" }]"#, "[]");
        assert!(matches!(
            from_toml_str(&toml_str),
            Err(ConfigError::NoRules(name)) if name == "Education"
        ));
    }

    #[test]
    fn rejects_negative_radius() {
        let toml_str = MINIMAL.replace("radius = 2000.0", "radius = -5.0");
        assert!(matches!(
            from_toml_str(&toml_str),
            Err(ConfigError::InvalidRadius { .. })
        ));
    }

    #[test]
    fn rejects_nan_total_radius() {
        let toml_str = MINIMAL.replace("total_radius = 1000.0", "total_radius = nan");
        assert!(matches!(
            from_toml_str(&toml_str),
            Err(ConfigError::InvalidRadius { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_category_names() {
        let toml_str = format!(
            "{MINIMAL}\n[[categories]]\nname = \"Education\"\nradius = 500.0\nrules = [{{ class = \"SCH\" }}]\n"
        );
        assert!(matches!(
            from_toml_str(&toml_str),
            Err(ConfigError::DuplicateCategory(name)) if name == "Education"
        ));
    }

    #[test]
    fn rejects_blank_nearest_type() {
        let toml_str = MINIMAL.replace(r#"type = "MTA""#, r#"type = " ""#);
        assert!(matches!(
            from_toml_str(&toml_str),
            Err(ConfigError::EmptyField { field: "type", .. })
        ));
    }

    #[test]
    fn reports_schema_errors() {
        assert!(matches!(
            from_toml_str("total_radius = \"far\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/proximity.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
