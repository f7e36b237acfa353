//! The technology cost database.
//!
//! Costs are read from a flat CSV file with one row per (technology, attribute) pair. Units are
//! normalised to megawatts, missing values are filled in from the cost configuration and derived
//! attributes (annualised capital cost, marginal cost and the costs of derived technologies) are
//! computed once, when the table is loaded.
use crate::input::{input_err_msg, read_csv};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

pub mod config;
use config::{COST_CONFIG_FILE_NAME, CostConfig, Derivation};

/// Attribute name used in cost files for emissions intensity
const CO2_INTENSITY: &str = "CO2 intensity";

/// Unit marker for values given per kilowatt
const PER_KW: &str = "/kW";

/// Unit marker for values given per megawatt
const PER_MW: &str = "/MW";

/// An error looking up a value in the [`CostTable`]
#[derive(Debug, Clone, PartialEq)]
pub enum LookupError {
    /// The technology is not in the table
    MissingTechnology(String),
    /// The technology has no value for the attribute
    MissingAttribute {
        /// The technology
        technology: String,
        /// The attribute
        attribute: String,
    },
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::MissingTechnology(technology) => {
                write!(f, "Technology '{technology}' not found in cost database")
            }
            LookupError::MissingAttribute {
                technology,
                attribute,
            } => write!(
                f,
                "Attribute '{attribute}' not found for technology '{technology}' in cost database"
            ),
        }
    }
}

impl std::error::Error for LookupError {}

/// A single row of the cost file
#[derive(Debug, Deserialize)]
struct CostRecord {
    technology: String,
    #[serde(alias = "parameter")]
    attribute: String,
    value: Option<f64>,
    #[serde(default)]
    unit: String,
}

/// Values keyed by technology, then attribute
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostTable(IndexMap<String, IndexMap<String, f64>>);

impl CostTable {
    /// Build a table from (technology, attribute, value) triples
    pub fn from_entries<I, T, A>(entries: I) -> Self
    where
        I: IntoIterator<Item = (T, A, f64)>,
        T: Into<String>,
        A: Into<String>,
    {
        let mut table = Self::default();
        for (technology, attribute, value) in entries {
            table.set(&technology.into(), &attribute.into(), value);
        }

        table
    }

    /// Look up the value of an attribute for a technology
    pub fn get(&self, technology: &str, attribute: &str) -> Result<f64, LookupError> {
        let attributes = self
            .0
            .get(technology)
            .ok_or_else(|| LookupError::MissingTechnology(technology.to_string()))?;
        attributes
            .get(attribute)
            .copied()
            .ok_or_else(|| LookupError::MissingAttribute {
                technology: technology.to_string(),
                attribute: attribute.to_string(),
            })
    }

    /// Set a value, adding the technology if needed
    fn set(&mut self, technology: &str, attribute: &str, value: f64) {
        self.0
            .entry(technology.to_string())
            .or_default()
            .insert(attribute.to_string(), value);
    }

    /// Get a value, if present
    fn try_get(&self, technology: &str, attribute: &str) -> Option<f64> {
        self.0.get(technology)?.get(attribute).copied()
    }
}

/// Calculate the annuity factor for an asset with lifetime `n` years and discount rate `r`.
///
/// For example, `annuity(20.0, 0.05) * 20.0` is about 1.6.
pub fn annuity(n: f64, r: f64) -> f64 {
    if r > 0.0 {
        r / (1.0 - (1.0 + r).powf(-n))
    } else {
        1.0 / n
    }
}

/// Load the technology cost database.
///
/// # Arguments
///
/// * `costs_path` - Path to the cost CSV file
/// * `cost_config_path` - Path to the cost configuration. If `None`, `cost_config.toml` in the
///   same folder as the cost file is used.
/// * `years` - Length of the modelled period, used to annualise capital costs
pub fn load_costs(
    costs_path: &Path,
    cost_config_path: Option<&Path>,
    years: f64,
) -> Result<CostTable> {
    let default_config_path;
    let cost_config_path = if let Some(path) = cost_config_path {
        path
    } else {
        default_config_path = costs_path
            .parent()
            .unwrap_or(Path::new(""))
            .join(COST_CONFIG_FILE_NAME);
        &default_config_path
    };
    let config = CostConfig::from_path(cost_config_path)?;

    let mut table = read_cost_file(costs_path).with_context(|| input_err_msg(costs_path))?;
    derive_costs(&mut table, &config, years).with_context(|| {
        format!(
            "Error deriving costs using {}",
            cost_config_path.display()
        )
    })?;

    Ok(table)
}

/// Read the cost file, normalising units to megawatts
fn read_cost_file(costs_path: &Path) -> Result<CostTable> {
    let mut table = CostTable::default();
    for record in read_csv::<CostRecord>(costs_path)? {
        let Some(mut value) = record.value else {
            continue;
        };
        if record.unit.contains(PER_KW) {
            value *= 1e3;
            debug!(
                "Converted {} {} from {} to {}",
                record.technology,
                record.attribute,
                record.unit,
                record.unit.replace(PER_KW, PER_MW)
            );
        }

        let attribute = if record.attribute == CO2_INTENSITY {
            "co2_emissions"
        } else {
            record.attribute.as_str()
        };
        ensure!(
            table.try_get(&record.technology, attribute).is_none(),
            "Duplicate cost entry for technology '{}', attribute '{attribute}'",
            record.technology
        );
        table.set(&record.technology, attribute, value);
    }

    Ok(table)
}

/// Fill in missing values and compute derived attributes, in place
fn derive_costs(table: &mut CostTable, config: &CostConfig, years: f64) -> Result<()> {
    fill_missing(table, &config.fill_values);
    add_capital_costs(table, years)?;

    for derivation in &config.derive {
        if let Derivation::Inherit {
            technology,
            from,
            attributes,
        } = derivation
        {
            for attribute in attributes {
                let value = table.get(from, attribute)?;
                table.set(technology, attribute, value);
            }
        }
    }

    add_marginal_costs(table)?;

    for derivation in &config.derive {
        if let Derivation::Blend {
            technology,
            first,
            second,
            share,
        } = derivation
        {
            let capital_cost = share * table.get(first, "capital_cost")?
                + (1.0 - share) * table.get(second, "capital_cost")?;
            table.set(technology, "capital_cost", capital_cost);
        }
    }

    for derivation in &config.derive {
        if let Derivation::Storage {
            technology,
            store,
            links,
        } = derivation
        {
            let max_hours = *config
                .max_hours
                .get(technology)
                .with_context(|| format!("No max_hours given for {technology}"))?;
            let mut capital_cost = max_hours * table.get(store, "capital_cost")?;
            for link in links {
                capital_cost += table.get(link, "capital_cost")?;
            }
            table.set(technology, "capital_cost", capital_cost);
            table.set(technology, "marginal_cost", 0.0);
            table.set(technology, "co2_emissions", 0.0);
            table.set(technology, "max_hours", max_hours);
        }
    }

    for (technology, value) in &config.marginal_cost {
        table.set(technology, "marginal_cost", *value);
    }
    for (technology, value) in &config.capital_cost {
        table.set(technology, "capital_cost", *value);
    }

    Ok(())
}

/// Give every technology the configured fill value for each attribute it lacks
fn fill_missing(table: &mut CostTable, fill_values: &IndexMap<String, f64>) {
    for attributes in table.0.values_mut() {
        for (attribute, value) in fill_values {
            let attribute = if attribute == CO2_INTENSITY {
                "co2_emissions"
            } else {
                attribute.as_str()
            };
            attributes.entry(attribute.to_string()).or_insert(*value);
        }
    }
}

/// Annualised capital cost for every technology with an investment cost and lifetime
fn add_capital_costs(table: &mut CostTable, years: f64) -> Result<()> {
    for (technology, attributes) in &mut table.0 {
        let (Some(investment), Some(lifetime)) =
            (attributes.get("investment"), attributes.get("lifetime"))
        else {
            continue;
        };
        ensure!(
            *lifetime > 0.0,
            "Lifetime of technology '{technology}' must be positive"
        );
        let discount_rate = attributes.get("discount rate").copied().unwrap_or(0.0);
        let fom = attributes.get("FOM").copied().unwrap_or(0.0);

        let capital_cost = (annuity(*lifetime, discount_rate) + fom / 100.0) * investment * years;
        attributes.insert("capital_cost".to_string(), capital_cost);
    }

    Ok(())
}

/// Marginal cost for every technology with variable O&M, fuel cost and efficiency
fn add_marginal_costs(table: &mut CostTable) -> Result<()> {
    for (technology, attributes) in &mut table.0 {
        let (Some(vom), Some(fuel), Some(efficiency)) = (
            attributes.get("VOM"),
            attributes.get("fuel"),
            attributes.get("efficiency"),
        ) else {
            continue;
        };
        ensure!(
            *efficiency > 0.0,
            "Efficiency of technology '{technology}' must be positive"
        );

        let marginal_cost = vom + fuel / efficiency;
        attributes.insert("marginal_cost".to_string(), marginal_cost);
    }

    Ok(())
}
