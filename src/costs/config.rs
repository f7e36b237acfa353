//! The cost configuration file, which fills gaps in the cost database and declares derived
//! technologies.
use crate::input::read_toml;
use anyhow::{Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Name of the cost configuration file expected next to the cost database
pub const COST_CONFIG_FILE_NAME: &str = "cost_config.toml";

/// A technology whose attributes are computed from other technologies
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Derivation {
    /// Copy attributes from another technology
    Inherit {
        /// Technology which receives the attributes
        technology: String,
        /// Technology to copy from
        from: String,
        /// Attributes to copy
        attributes: Vec<String>,
    },
    /// Capital cost as a weighted combination of two technologies
    Blend {
        /// The derived technology
        technology: String,
        /// Technology weighted by `share`
        first: String,
        /// Technology weighted by `1 - share`
        second: String,
        /// Weight of `first`, between 0 and 1
        share: f64,
    },
    /// A storage technology built from a storage medium and one or more conversion technologies.
    ///
    /// Its capital cost is the sum of the capital costs of `links` plus `max_hours` times that of
    /// `store`, where `max_hours` comes from the configuration's `max_hours` table.
    Storage {
        /// The derived technology
        technology: String,
        /// Storage medium technology (costed per unit of energy)
        store: String,
        /// Charging/discharging technologies (costed per unit of power)
        links: Vec<String>,
    },
}

impl Derivation {
    /// The technology produced by this derivation
    pub fn technology(&self) -> &str {
        match self {
            Derivation::Inherit { technology, .. }
            | Derivation::Blend { technology, .. }
            | Derivation::Storage { technology, .. } => technology,
        }
    }
}

/// Settings for building the technology cost table
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CostConfig {
    /// Values for attributes which a technology lacks
    pub fill_values: IndexMap<String, f64>,
    /// Storage duration in hours, per storage technology
    pub max_hours: IndexMap<String, f64>,
    /// Marginal costs which replace the computed ones
    #[serde(default)]
    pub marginal_cost: IndexMap<String, f64>,
    /// Capital costs which replace the computed ones
    #[serde(default)]
    pub capital_cost: IndexMap<String, f64>,
    /// Derived technologies
    #[serde(default)]
    pub derive: Vec<Derivation>,
}

impl CostConfig {
    /// Read and check a cost configuration file
    pub fn from_path(file_path: &Path) -> Result<Self> {
        let config: CostConfig = read_toml(file_path)?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut derived = HashSet::new();
        for derivation in &self.derive {
            let technology = derivation.technology();
            ensure!(
                derived.insert(technology),
                "Technology {technology} is derived more than once"
            );

            match derivation {
                Derivation::Blend {
                    technology, share, ..
                } => ensure!(
                    (0.0..=1.0).contains(share),
                    "Blend share for {technology} must be between 0 and 1"
                ),
                Derivation::Storage {
                    technology, links, ..
                } => {
                    ensure!(
                        !links.is_empty(),
                        "Storage technology {technology} needs at least one link technology"
                    );
                    ensure!(
                        self.max_hours.contains_key(technology),
                        "No max_hours given for storage technology {technology}"
                    );
                }
                Derivation::Inherit { .. } => {}
            }
        }
        for (technology, hours) in &self.max_hours {
            ensure!(
                *hours >= 0.0,
                "max_hours for {technology} must not be negative"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use std::fs;
    use tempfile::tempdir;

    fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(COST_CONFIG_FILE_NAME);
        fs::write(&file_path, contents).unwrap();
        (dir, file_path)
    }

    #[test]
    fn from_path_derivations() {
        let (_dir, file_path) = write_config(
            r#"
[fill_values]
FOM = 0

[max_hours]
battery = 6

[[derive]]
kind = "inherit"
technology = "OCGT"
from = "gas"
attributes = ["fuel"]

[[derive]]
kind = "storage"
technology = "battery"
store = "battery storage"
links = ["battery inverter"]
"#,
        );

        let config = CostConfig::from_path(&file_path).unwrap();
        assert_eq!(config.derive.len(), 2);
        assert_eq!(config.derive[0].technology(), "OCGT");
        assert_eq!(
            config.derive[1],
            Derivation::Storage {
                technology: "battery".into(),
                store: "battery storage".into(),
                links: vec!["battery inverter".into()],
            }
        );
        assert!(config.marginal_cost.is_empty());
    }

    #[test]
    fn from_path_storage_without_max_hours() {
        let (_dir, file_path) = write_config(
            r#"
fill_values = {}
max_hours = {}

[[derive]]
kind = "storage"
technology = "H2"
store = "hydrogen storage underground"
links = ["fuel cell", "electrolysis"]
"#,
        );

        assert_error!(
            CostConfig::from_path(&file_path),
            "No max_hours given for storage technology H2"
        );
    }

    #[test]
    fn from_path_shipped_config() {
        let file_path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("data")
            .join(COST_CONFIG_FILE_NAME);
        let config = CostConfig::from_path(&file_path).unwrap();
        assert!(
            config
                .derive
                .iter()
                .any(|derivation| derivation.technology() == "H2")
        );
    }

    #[test]
    fn from_path_duplicate_derivation() {
        let (_dir, file_path) = write_config(
            r#"
fill_values = {}
max_hours = {}

[[derive]]
kind = "inherit"
technology = "OCGT"
from = "gas"
attributes = ["fuel"]

[[derive]]
kind = "inherit"
technology = "OCGT"
from = "gas"
attributes = ["co2_emissions"]
"#,
        );

        assert_error!(
            CostConfig::from_path(&file_path),
            "Technology OCGT is derived more than once"
        );
    }

    #[test]
    fn from_path_missing_table() {
        let (_dir, file_path) = write_config("[fill_values]\nFOM = 0\n");
        assert!(CostConfig::from_path(&file_path).is_err());
    }
}
