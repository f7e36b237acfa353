//! Components of the energy system and their attributes.
//!
//! Each row of a case file is first resolved into a loosely-typed [`ComponentRecord`]. Once time
//! series have been loaded, records are converted into strongly-typed [`Component`]s, with
//! defaults for absent attributes taken from the [`AttributeSchema`].
use crate::schema::{AttributeMeta, AttributeSchema, ComponentAttributes};
use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// The type of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ComponentType {
    /// A node at which energy balances
    Bus,
    /// An energy carrier, such as electricity or gas
    Carrier,
    /// Supplies power to a bus
    Generator,
    /// Withdraws power from a bus
    Load,
    /// Storage with a fixed ratio of energy to power capacity
    StorageUnit,
    /// Storage of energy only, with no limit on power
    Store,
    /// Transfers power between two or more buses
    Link,
}

impl ComponentType {
    /// All component types
    pub const ALL: [ComponentType; 7] = [
        ComponentType::Bus,
        ComponentType::Carrier,
        ComponentType::Generator,
        ComponentType::Load,
        ComponentType::StorageUnit,
        ComponentType::Store,
        ComponentType::Link,
    ];

    /// The name of the component type as written in case files
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentType::Bus => "Bus",
            ComponentType::Carrier => "Carrier",
            ComponentType::Generator => "Generator",
            ComponentType::Load => "Load",
            ComponentType::StorageUnit => "StorageUnit",
            ComponentType::Store => "Store",
            ComponentType::Link => "Link",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ComponentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        ComponentType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .with_context(|| format!("Unknown component type: {s}"))
    }
}

/// A resolved attribute value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A number
    Number(f64),
    /// A boolean
    Bool(bool),
    /// Text, such as a bus name
    Text(String),
    /// A time series file which has not been loaded yet
    File(PathBuf),
    /// One value per snapshot
    Series(Vec<f64>),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Number(value) => write!(f, "{value}"),
            AttributeValue::Bool(value) => write!(f, "{value}"),
            AttributeValue::Text(value) => write!(f, "{value}"),
            AttributeValue::File(path) => write!(f, "{}", path.display()),
            AttributeValue::Series(values) => write!(f, "<series of {} values>", values.len()),
        }
    }
}

/// The attributes of a component, as read from one row of a case file
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRecord {
    /// The type of component
    pub kind: ComponentType,
    /// Name, unique among components of the same type
    pub name: String,
    /// Technology used for cost database lookups
    pub technology: String,
    /// Resolved attributes, in column order
    pub attributes: IndexMap<String, AttributeValue>,
}

impl ComponentRecord {
    /// Create a record with no attributes.
    ///
    /// The technology is the part of the name before the first `%`.
    pub fn new(kind: ComponentType, name: &str) -> Self {
        let technology = name.split('%').next().unwrap_or_default().trim();
        Self {
            kind,
            name: name.to_string(),
            technology: technology.to_string(),
            attributes: IndexMap::new(),
        }
    }

    /// The text value of an attribute, if it has one
    pub fn text(&self, attribute: &str) -> Option<&str> {
        match self.attributes.get(attribute)? {
            AttributeValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

/// A value which is either constant or varies by snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum Profile {
    /// The same value for every snapshot
    Static(f64),
    /// One value per snapshot
    Series(Vec<f64>),
}

impl Profile {
    /// The value at snapshot `t`
    pub fn at(&self, t: usize) -> f64 {
        match self {
            Profile::Static(value) => *value,
            Profile::Series(values) => values[t],
        }
    }

    /// Whether the value varies by snapshot
    pub fn is_series(&self) -> bool {
        matches!(self, Profile::Series(_))
    }
}

/// Schema-valid attributes without a dedicated field
pub type ExtraAttributes = IndexMap<String, AttributeValue>;

/// A node at which energy balances
#[derive(Debug, Clone, PartialEq)]
pub struct Bus {
    pub name: String,
    pub carrier: String,
    pub v_nom: f64,
    pub extra: ExtraAttributes,
}

/// An energy carrier
#[derive(Debug, Clone, PartialEq)]
pub struct Carrier {
    pub name: String,
    pub co2_emissions: f64,
    pub extra: ExtraAttributes,
}

/// Supplies power to a bus, up to `p_max_pu` times its capacity
#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    pub name: String,
    pub bus: String,
    pub carrier: String,
    pub p_nom: f64,
    pub p_nom_extendable: bool,
    pub p_nom_min: f64,
    pub p_nom_max: f64,
    pub p_min_pu: Profile,
    pub p_max_pu: Profile,
    pub marginal_cost: Profile,
    pub capital_cost: f64,
    pub extra: ExtraAttributes,
}

/// A fixed demand at a bus
#[derive(Debug, Clone, PartialEq)]
pub struct Load {
    pub name: String,
    pub bus: String,
    pub carrier: String,
    pub p_set: Profile,
    pub extra: ExtraAttributes,
}

/// Storage whose energy capacity is `max_hours` times its power capacity
#[derive(Debug, Clone, PartialEq)]
pub struct StorageUnit {
    pub name: String,
    pub bus: String,
    pub carrier: String,
    pub p_nom: f64,
    pub p_nom_extendable: bool,
    pub p_nom_min: f64,
    pub p_nom_max: f64,
    /// Charging limit per unit of capacity (negative)
    pub p_min_pu: Profile,
    /// Discharging limit per unit of capacity
    pub p_max_pu: Profile,
    pub marginal_cost: Profile,
    pub capital_cost: f64,
    pub max_hours: f64,
    pub efficiency_store: f64,
    pub efficiency_dispatch: f64,
    /// Fraction of the state of charge lost per hour
    pub standing_loss: f64,
    pub state_of_charge_initial: f64,
    pub cyclic_state_of_charge: bool,
    pub extra: ExtraAttributes,
}

/// Storage of energy with no separate power limit
#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    pub name: String,
    pub bus: String,
    pub carrier: String,
    pub e_nom: f64,
    pub e_nom_extendable: bool,
    pub e_nom_min: f64,
    pub e_nom_max: f64,
    pub e_min_pu: Profile,
    pub e_max_pu: Profile,
    pub e_initial: f64,
    pub e_cyclic: bool,
    pub marginal_cost: Profile,
    pub capital_cost: f64,
    pub standing_loss: f64,
    pub extra: ExtraAttributes,
}

/// An additional output of a [`Link`]
#[derive(Debug, Clone, PartialEq)]
pub struct LinkPort {
    pub bus: String,
    pub efficiency: Profile,
}

/// Withdraws power from `bus0` and delivers it, less losses, to `bus1` (and any further ports)
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub name: String,
    pub bus0: String,
    pub bus1: String,
    pub carrier: String,
    pub efficiency: Profile,
    pub p_nom: f64,
    pub p_nom_extendable: bool,
    pub p_nom_min: f64,
    pub p_nom_max: f64,
    pub p_min_pu: Profile,
    pub p_max_pu: Profile,
    pub marginal_cost: Profile,
    pub capital_cost: f64,
    /// Ports `bus2`, `bus3`, ... in order
    pub extra_ports: Vec<LinkPort>,
    pub extra: ExtraAttributes,
}

/// A component of any type
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Bus(Bus),
    Carrier(Carrier),
    Generator(Generator),
    Load(Load),
    StorageUnit(StorageUnit),
    Store(Store),
    Link(Link),
}

impl Component {
    /// Convert a record into a component.
    ///
    /// Attributes absent from the record take their default value from the schema. All time
    /// series must already have been loaded.
    pub fn from_record(record: ComponentRecord, schema: &AttributeSchema) -> Result<Self> {
        let kind = record.kind;
        let name = record.name.clone();
        let mut reader = AttributeReader {
            record,
            schema: schema.attributes(kind),
        };
        let component = reader
            .read()
            .with_context(|| format!("Invalid attributes for {kind} {name}"))?;

        Ok(component)
    }

    /// The component's name
    pub fn name(&self) -> &str {
        match self {
            Component::Bus(c) => &c.name,
            Component::Carrier(c) => &c.name,
            Component::Generator(c) => &c.name,
            Component::Load(c) => &c.name,
            Component::StorageUnit(c) => &c.name,
            Component::Store(c) => &c.name,
            Component::Link(c) => &c.name,
        }
    }

    /// The component's type
    pub fn kind(&self) -> ComponentType {
        match self {
            Component::Bus(_) => ComponentType::Bus,
            Component::Carrier(_) => ComponentType::Carrier,
            Component::Generator(_) => ComponentType::Generator,
            Component::Load(_) => ComponentType::Load,
            Component::StorageUnit(_) => ComponentType::StorageUnit,
            Component::Store(_) => ComponentType::Store,
            Component::Link(_) => ComponentType::Link,
        }
    }
}

/// Takes attributes out of a record, falling back on schema defaults
struct AttributeReader<'a> {
    record: ComponentRecord,
    schema: &'a ComponentAttributes,
}

impl AttributeReader<'_> {
    fn read(&mut self) -> Result<Component> {
        let name = self.record.name.clone();
        let component = match self.record.kind {
            ComponentType::Bus => Component::Bus(Bus {
                name,
                carrier: self.text("carrier")?,
                v_nom: self.number("v_nom")?,
                extra: self.finish()?,
            }),
            ComponentType::Carrier => Component::Carrier(Carrier {
                name,
                co2_emissions: self.number("co2_emissions")?,
                extra: self.finish()?,
            }),
            ComponentType::Generator => Component::Generator(Generator {
                name,
                bus: self.required_text("bus")?,
                carrier: self.text("carrier")?,
                p_nom: self.number("p_nom")?,
                p_nom_extendable: self.flag("p_nom_extendable")?,
                p_nom_min: self.number("p_nom_min")?,
                p_nom_max: self.number("p_nom_max")?,
                p_min_pu: self.profile("p_min_pu")?,
                p_max_pu: self.profile("p_max_pu")?,
                marginal_cost: self.profile("marginal_cost")?,
                capital_cost: self.number("capital_cost")?,
                extra: self.finish()?,
            }),
            ComponentType::Load => Component::Load(Load {
                name,
                bus: self.required_text("bus")?,
                carrier: self.text("carrier")?,
                p_set: self.profile("p_set")?,
                extra: self.finish()?,
            }),
            ComponentType::StorageUnit => Component::StorageUnit(StorageUnit {
                name,
                bus: self.required_text("bus")?,
                carrier: self.text("carrier")?,
                p_nom: self.number("p_nom")?,
                p_nom_extendable: self.flag("p_nom_extendable")?,
                p_nom_min: self.number("p_nom_min")?,
                p_nom_max: self.number("p_nom_max")?,
                p_min_pu: self.profile("p_min_pu")?,
                p_max_pu: self.profile("p_max_pu")?,
                marginal_cost: self.profile("marginal_cost")?,
                capital_cost: self.number("capital_cost")?,
                max_hours: self.number("max_hours")?,
                efficiency_store: self.number("efficiency_store")?,
                efficiency_dispatch: self.number("efficiency_dispatch")?,
                standing_loss: self.number("standing_loss")?,
                state_of_charge_initial: self.number("state_of_charge_initial")?,
                cyclic_state_of_charge: self.flag("cyclic_state_of_charge")?,
                extra: self.finish()?,
            }),
            ComponentType::Store => Component::Store(Store {
                name,
                bus: self.required_text("bus")?,
                carrier: self.text("carrier")?,
                e_nom: self.number("e_nom")?,
                e_nom_extendable: self.flag("e_nom_extendable")?,
                e_nom_min: self.number("e_nom_min")?,
                e_nom_max: self.number("e_nom_max")?,
                e_min_pu: self.profile("e_min_pu")?,
                e_max_pu: self.profile("e_max_pu")?,
                e_initial: self.number("e_initial")?,
                e_cyclic: self.flag("e_cyclic")?,
                marginal_cost: self.profile("marginal_cost")?,
                capital_cost: self.number("capital_cost")?,
                standing_loss: self.number("standing_loss")?,
                extra: self.finish()?,
            }),
            ComponentType::Link => {
                let mut link = Link {
                    name,
                    bus0: self.required_text("bus0")?,
                    bus1: self.required_text("bus1")?,
                    carrier: self.text("carrier")?,
                    efficiency: self.profile("efficiency")?,
                    p_nom: self.number("p_nom")?,
                    p_nom_extendable: self.flag("p_nom_extendable")?,
                    p_nom_min: self.number("p_nom_min")?,
                    p_nom_max: self.number("p_nom_max")?,
                    p_min_pu: self.profile("p_min_pu")?,
                    p_max_pu: self.profile("p_max_pu")?,
                    marginal_cost: self.profile("marginal_cost")?,
                    capital_cost: self.number("capital_cost")?,
                    extra_ports: Vec::new(),
                    extra: ExtraAttributes::new(),
                };
                for port in 2.. {
                    let bus = format!("bus{port}");
                    if !self.record.attributes.contains_key(&bus) {
                        break;
                    }
                    link.extra_ports.push(LinkPort {
                        bus: self.required_text(&bus)?,
                        efficiency: self.profile(&format!("efficiency{port}"))?,
                    });
                }
                link.extra = self.finish()?;
                Component::Link(link)
            }
        };

        Ok(component)
    }

    /// The schema entry for an attribute
    fn meta(&self, attribute: &str) -> Result<&AttributeMeta> {
        self.schema
            .get(attribute)
            .with_context(|| format!("Unknown attribute: {attribute}"))
    }

    fn take(&mut self, attribute: &str) -> Option<AttributeValue> {
        self.record.attributes.shift_remove(attribute)
    }

    fn text(&mut self, attribute: &str) -> Result<String> {
        match self.take(attribute) {
            Some(AttributeValue::Text(value)) => Ok(value),
            Some(AttributeValue::Number(value)) => Ok(value.to_string()),
            Some(other) => bail!("Attribute {attribute} must be text (got '{other}')"),
            None => Ok(self.meta(attribute)?.default.clone()),
        }
    }

    fn required_text(&mut self, attribute: &str) -> Result<String> {
        let value = self.text(attribute)?;
        if value.is_empty() {
            bail!("Missing required attribute {attribute}");
        }

        Ok(value)
    }

    fn number(&mut self, attribute: &str) -> Result<f64> {
        match self.take(attribute) {
            Some(AttributeValue::Number(value)) => Ok(value),
            Some(other) => bail!("Attribute {attribute} must be a number (got '{other}')"),
            None => self.meta(attribute)?.default_number(),
        }
    }

    fn flag(&mut self, attribute: &str) -> Result<bool> {
        match self.take(attribute) {
            Some(AttributeValue::Bool(value)) => Ok(value),
            Some(AttributeValue::Number(value)) => Ok(value != 0.0),
            Some(other) => bail!("Attribute {attribute} must be true or false (got '{other}')"),
            None => self.meta(attribute)?.default_bool(),
        }
    }

    fn profile(&mut self, attribute: &str) -> Result<Profile> {
        match self.take(attribute) {
            Some(AttributeValue::Number(value)) => Ok(Profile::Static(value)),
            Some(AttributeValue::Series(values)) => Ok(Profile::Series(values)),
            Some(AttributeValue::File(path)) => bail!(
                "Time series file {} for attribute {attribute} was not loaded",
                path.display()
            ),
            Some(other) => bail!("Attribute {attribute} must be a number (got '{other}')"),
            None => Ok(Profile::Static(self.meta(attribute)?.default_number()?)),
        }
    }

    /// The attributes which have not been read
    fn finish(&mut self) -> Result<ExtraAttributes> {
        let extra = std::mem::take(&mut self.record.attributes);
        for (attribute, value) in &extra {
            if let AttributeValue::File(path) = value {
                bail!(
                    "Time series file {} for attribute {attribute} was not loaded",
                    path.display()
                );
            }
        }

        Ok(extra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use rstest::rstest;

    fn record(kind: ComponentType, name: &str, attributes: &[(&str, AttributeValue)]) -> ComponentRecord {
        let mut record = ComponentRecord::new(kind, name);
        record.attributes = attributes
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect();
        record
    }

    #[rstest]
    #[case("Generator", ComponentType::Generator)]
    #[case("storageunit", ComponentType::StorageUnit)]
    #[case(" Link ", ComponentType::Link)]
    fn component_type_from_str(#[case] s: &str, #[case] expected: ComponentType) {
        assert_eq!(s.parse::<ComponentType>().unwrap(), expected);
    }

    #[test]
    fn component_type_unknown() {
        assert_error!(
            "Transformer".parse::<ComponentType>(),
            "Unknown component type: Transformer"
        );
    }

    #[rstest]
    #[case("solar-utility % site A", "solar-utility")]
    #[case("battery", "battery")]
    #[case("  OCGT %", "OCGT")]
    fn technology_from_name(#[case] name: &str, #[case] technology: &str) {
        assert_eq!(
            ComponentRecord::new(ComponentType::Generator, name).technology,
            technology
        );
    }

    #[test]
    fn generator_defaults_from_schema() {
        let schema = AttributeSchema::builtin().unwrap();
        let record = record(
            ComponentType::Generator,
            "gas",
            &[
                ("bus", AttributeValue::Text("electricity".into())),
                ("marginal_cost", AttributeValue::Number(50.0)),
                ("p_max_pu", AttributeValue::Series(vec![0.5, 1.0])),
            ],
        );

        let Component::Generator(generator) = Component::from_record(record, &schema).unwrap()
        else {
            panic!("Expected a generator");
        };
        assert_eq!(generator.bus, "electricity");
        assert_eq!(generator.marginal_cost, Profile::Static(50.0));
        assert_eq!(generator.p_max_pu.at(1), 1.0);
        assert_eq!(generator.p_min_pu, Profile::Static(0.0));
        assert_eq!(generator.p_nom_max, f64::INFINITY);
        assert!(!generator.p_nom_extendable);
        assert!(generator.extra.is_empty());
    }

    #[test]
    fn link_extra_ports() {
        let mut schema = AttributeSchema::builtin().unwrap();
        schema.augment_from_header(&["bus2".to_string()]);
        let record = record(
            ComponentType::Link,
            "chp",
            &[
                ("bus0", AttributeValue::Text("gas".into())),
                ("bus1", AttributeValue::Text("electricity".into())),
                ("bus2", AttributeValue::Text("heat".into())),
                ("efficiency2", AttributeValue::Number(0.4)),
            ],
        );

        let Component::Link(link) = Component::from_record(record, &schema).unwrap() else {
            panic!("Expected a link");
        };
        assert_eq!(
            link.extra_ports,
            [LinkPort {
                bus: "heat".into(),
                efficiency: Profile::Static(0.4)
            }]
        );
    }

    #[test]
    fn missing_bus_is_error() {
        let schema = AttributeSchema::builtin().unwrap();
        let record = record(ComponentType::Load, "demand", &[]);
        let err = Component::from_record(record, &schema).unwrap_err();
        assert_eq!(err.to_string(), "Invalid attributes for Load demand");
        assert_eq!(
            err.chain().nth(1).unwrap().to_string(),
            "Missing required attribute bus"
        );
    }

    #[test]
    fn unloaded_file_is_error() {
        let schema = AttributeSchema::builtin().unwrap();
        let record = record(
            ComponentType::Load,
            "demand",
            &[
                ("bus", AttributeValue::Text("electricity".into())),
                ("p_set", AttributeValue::File("load.csv".into())),
            ],
        );
        assert!(Component::from_record(record, &schema).is_err());
    }
}
