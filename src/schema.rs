//! The attributes which each type of component may have.
//!
//! The schema is read from a table of attribute descriptors which is built into the program. It
//! is then extended with attributes which depend on the case file, such as extra link ports.
use crate::component::ComponentType;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;
use std::io::Read;

/// The built-in attribute descriptors
const BUILTIN_DESCRIPTORS: &str = include_str!("../data/component_attrs.csv");

/// Units of attributes which measure power or energy
const POWER_AND_ENERGY_UNITS: [&str; 2] = ["MW", "MWh"];

/// The kind of value an attribute holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, DeserializeLabeledStringEnum)]
pub enum AttributeKind {
    #[string = "string"]
    String,
    #[string = "float"]
    Float,
    #[string = "int"]
    Int,
    #[string = "boolean"]
    Boolean,
    /// A number, which may alternatively vary by snapshot
    #[string = "static or series"]
    StaticOrSeries,
    /// One value per snapshot
    #[string = "series"]
    Series,
    /// The name of a time series file
    #[string = "file"]
    File,
}

/// Whether an attribute is set by the user or computed by the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, DeserializeLabeledStringEnum)]
pub enum AttributeStatus {
    #[string = "Input (required)"]
    Required,
    #[string = "Input (optional)"]
    Optional,
    #[string = "Output"]
    Output,
}

/// A row of the descriptor table
#[derive(Debug, Deserialize)]
struct AttributeDescriptor {
    component: String,
    attribute: String,
    #[serde(rename = "type")]
    kind: AttributeKind,
    unit: String,
    default: String,
    description: String,
    status: AttributeStatus,
}

/// Metadata about a single attribute
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMeta {
    /// The kind of value
    pub kind: AttributeKind,
    /// Unit of the value (`n/a` if not applicable)
    pub unit: String,
    /// Default value, as text
    pub default: String,
    /// Human-readable description
    pub description: String,
    /// Input or output
    pub status: AttributeStatus,
}

impl AttributeMeta {
    fn new(kind: AttributeKind, unit: &str, default: &str, description: &str) -> Self {
        Self {
            kind,
            unit: unit.to_string(),
            default: default.to_string(),
            description: description.to_string(),
            status: AttributeStatus::Optional,
        }
    }

    /// Whether the attribute may be given in a case file
    pub fn is_input(&self) -> bool {
        self.status != AttributeStatus::Output
    }

    /// Whether the attribute measures power or energy
    pub fn is_power_or_energy(&self) -> bool {
        POWER_AND_ENERGY_UNITS.contains(&self.unit.as_str())
    }

    /// The default value as a number. An empty default means zero.
    pub fn default_number(&self) -> Result<f64> {
        if self.default.is_empty() {
            return Ok(0.0);
        }

        self.default
            .parse()
            .with_context(|| format!("Invalid numeric default '{}'", self.default))
    }

    /// The default value as a boolean. An empty default means false.
    pub fn default_bool(&self) -> Result<bool> {
        match self.default.to_lowercase().as_str() {
            "" | "false" => Ok(false),
            "true" => Ok(true),
            other => anyhow::bail!("Invalid boolean default '{other}'"),
        }
    }
}

/// Attribute metadata for one component type, keyed by attribute name
pub type ComponentAttributes = IndexMap<String, AttributeMeta>;

/// Attribute metadata for every component type
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSchema(IndexMap<ComponentType, ComponentAttributes>);

impl AttributeSchema {
    /// The schema built into the program
    pub fn builtin() -> Result<Self> {
        Self::from_reader(BUILTIN_DESCRIPTORS.as_bytes())
            .context("Invalid built-in component attribute table")
    }

    /// Read a schema from a descriptor table in CSV format.
    ///
    /// Every component type must have at least one attribute.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut schema: IndexMap<ComponentType, ComponentAttributes> = IndexMap::new();
        for descriptor in csv::Reader::from_reader(reader).deserialize() {
            let descriptor: AttributeDescriptor = descriptor?;
            let kind: ComponentType = descriptor.component.parse()?;
            let attributes = schema.entry(kind).or_default();
            ensure!(
                !attributes.contains_key(&descriptor.attribute),
                "Duplicate attribute {} for {kind}",
                descriptor.attribute
            );
            attributes.insert(
                descriptor.attribute,
                AttributeMeta {
                    kind: descriptor.kind,
                    unit: descriptor.unit,
                    default: descriptor.default,
                    description: descriptor.description,
                    status: descriptor.status,
                },
            );
        }

        for kind in ComponentType::ALL {
            ensure!(schema.contains_key(&kind), "No attributes given for {kind}");
        }

        Ok(Self(schema))
    }

    /// Add attributes which depend on the columns of the case file.
    ///
    /// Every `busN` column with `N >= 2` gives links an extra port, with attributes `busN`,
    /// `efficiencyN` and output `pN`. Generators and loads gain `time_series_file` and
    /// `normalization`.
    pub fn augment_from_header(&mut self, header: &[String]) {
        let links = self.attributes_mut(ComponentType::Link);
        for port in header.iter().filter_map(|name| extra_port_number(name)) {
            links
                .entry(format!("bus{port}"))
                .or_insert_with(|| {
                    AttributeMeta::new(
                        AttributeKind::String,
                        "n/a",
                        "",
                        &format!("Name of output bus {port}"),
                    )
                });
            links
                .entry(format!("efficiency{port}"))
                .or_insert_with(|| {
                    AttributeMeta::new(
                        AttributeKind::StaticOrSeries,
                        "per unit",
                        "1",
                        &format!("Efficiency of transfer from bus0 to bus{port}"),
                    )
                });
            links.entry(format!("p{port}")).or_insert_with(|| AttributeMeta {
                status: AttributeStatus::Output,
                ..AttributeMeta::new(
                    AttributeKind::Series,
                    "MW",
                    "0",
                    &format!("Power withdrawn at bus{port}"),
                )
            });
        }

        for kind in [ComponentType::Generator, ComponentType::Load] {
            let attributes = self.attributes_mut(kind);
            attributes
                .entry("time_series_file".to_string())
                .or_insert_with(|| {
                    AttributeMeta::new(
                        AttributeKind::File,
                        "n/a",
                        "",
                        "File with a time series for p_max_pu (generators) or p_set (loads)",
                    )
                });
            attributes
                .entry("normalization".to_string())
                .or_insert_with(|| {
                    AttributeMeta::new(
                        AttributeKind::Float,
                        "n/a",
                        "",
                        "Mean value to which the time series is rescaled",
                    )
                });
        }
    }

    /// The attributes of a component type
    pub fn attributes(&self, kind: ComponentType) -> &ComponentAttributes {
        &self.0[&kind]
    }

    fn attributes_mut(&mut self, kind: ComponentType) -> &mut ComponentAttributes {
        self.0.entry(kind).or_default()
    }

    /// Metadata for an attribute, if the component type has it
    pub fn get(&self, kind: ComponentType, attribute: &str) -> Option<&AttributeMeta> {
        self.0.get(&kind)?.get(attribute)
    }

    /// Whether the attribute may be given for the component type in a case file
    pub fn is_input(&self, kind: ComponentType, attribute: &str) -> bool {
        self.get(kind, attribute).is_some_and(AttributeMeta::is_input)
    }
}

/// The port number of a `busN` column, if `N >= 2`
fn extra_port_number(name: &str) -> Option<u32> {
    name.strip_prefix("bus")?
        .parse()
        .ok()
        .filter(|port| *port >= 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn builtin_schema() {
        let schema = AttributeSchema::builtin().unwrap();
        let meta = schema.get(ComponentType::Generator, "p_max_pu").unwrap();
        assert_eq!(meta.kind, AttributeKind::StaticOrSeries);
        assert_eq!(meta.default_number().unwrap(), 1.0);
        assert!(schema.is_input(ComponentType::Generator, "p_nom"));
        assert!(!schema.is_input(ComponentType::Generator, "p_nom_opt"));
        assert!(!schema.is_input(ComponentType::Link, "bus"));
    }

    #[rstest]
    #[case(ComponentType::Generator, "p_nom", true)]
    #[case(ComponentType::Store, "e_initial", true)]
    #[case(ComponentType::Generator, "marginal_cost", false)]
    #[case(ComponentType::Link, "efficiency", false)]
    fn is_power_or_energy(
        #[case] kind: ComponentType,
        #[case] attribute: &str,
        #[case] expected: bool,
    ) {
        let schema = AttributeSchema::builtin().unwrap();
        assert_eq!(
            schema.get(kind, attribute).unwrap().is_power_or_energy(),
            expected
        );
    }

    #[test]
    fn augment_from_header() {
        let mut schema = AttributeSchema::builtin().unwrap();
        let header = ["component", "name", "bus0", "bus1", "bus2", "bus3"].map(String::from);
        assert!(!schema.is_input(ComponentType::Link, "bus3"));

        schema.augment_from_header(&header);
        assert!(schema.is_input(ComponentType::Link, "bus2"));
        assert!(schema.is_input(ComponentType::Link, "efficiency3"));
        assert!(!schema.is_input(ComponentType::Link, "p3"));
        assert!(schema.is_input(ComponentType::Load, "time_series_file"));
        assert_eq!(
            schema.get(ComponentType::Generator, "time_series_file").unwrap().kind,
            AttributeKind::File
        );
        assert!(schema.is_input(ComponentType::Generator, "normalization"));
        assert!(!schema.is_input(ComponentType::Store, "time_series_file"));
    }

    #[rstest]
    #[case("bus2", Some(2))]
    #[case("bus10", Some(10))]
    #[case("bus1", None)]
    #[case("bus", None)]
    #[case("busy", None)]
    fn extra_port_numbers(#[case] name: &str, #[case] expected: Option<u32>) {
        assert_eq!(extra_port_number(name), expected);
    }

    #[test]
    fn from_reader_missing_component_type() {
        let table = "component,attribute,type,unit,default,description,status\n\
                     Bus,name,string,n/a,,Unique name,Input (required)\n";
        assert!(AttributeSchema::from_reader(table.as_bytes()).is_err());
    }

    #[test]
    fn default_values() {
        let meta = AttributeMeta::new(AttributeKind::Float, "MW", "inf", "");
        assert_eq!(meta.default_number().unwrap(), f64::INFINITY);
        let meta = AttributeMeta::new(AttributeKind::Boolean, "n/a", "False", "");
        assert!(!meta.default_bool().unwrap());
    }
}
