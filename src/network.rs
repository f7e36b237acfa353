//! Assembling resolved component records into a network ready for optimisation.
use crate::component::{
    AttributeValue, Bus, Carrier, Component, ComponentRecord, ComponentType, Generator, Link,
    Load, StorageUnit, Store,
};
use crate::input::{Case, format_items_with_cap};
use crate::input::case_config::CaseConfig;
use crate::input::time_series::load_time_series;
use crate::schema::AttributeSchema;
use anyhow::{Context, Result, bail, ensure};
use chrono::NaiveDateTime;
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use log::{debug, info, warn};

/// Attributes which are never multiplied by the numerics scaling factor
const UNSCALED_ATTRIBUTE_PREFIXES: [&str; 3] = ["efficiency", "standing_loss", "max_hours"];

/// What to do with a component whose time series cannot be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeSeriesPolicy {
    /// Log a warning and leave the component out of the network
    #[default]
    Skip,
    /// Abort the run
    Strict,
}

/// An energy system, with all attributes resolved and power/energy values scaled
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    /// Timestamps at which the system is modelled
    pub snapshots: Vec<NaiveDateTime>,
    /// Duration of each snapshot in hours
    pub snapshot_weighting: f64,
    /// The factor by which power and energy values have been multiplied
    pub numerics_scaling: f64,
    pub buses: IndexMap<String, Bus>,
    pub carriers: IndexMap<String, Carrier>,
    pub generators: IndexMap<String, Generator>,
    pub loads: IndexMap<String, Load>,
    pub storage_units: IndexMap<String, StorageUnit>,
    pub stores: IndexMap<String, Store>,
    pub links: IndexMap<String, Link>,
    /// Time series which were multiplied by the scaling factor, as (type, name, attribute)
    pub scaled_series: IndexSet<(ComponentType, String, String)>,
}

impl Network {
    fn new(config: &CaseConfig) -> Self {
        Self {
            snapshots: config.snapshots(),
            snapshot_weighting: config.snapshot_weighting(),
            numerics_scaling: config.numerics_scaling,
            buses: IndexMap::new(),
            carriers: IndexMap::new(),
            generators: IndexMap::new(),
            loads: IndexMap::new(),
            storage_units: IndexMap::new(),
            stores: IndexMap::new(),
            links: IndexMap::new(),
            scaled_series: IndexSet::new(),
        }
    }

    /// The total number of modelled hours
    pub fn total_hours(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let len = self.snapshots.len() as f64;
        len * self.snapshot_weighting
    }

    /// Whether the given time series was scaled by the numerics scaling factor
    pub fn is_scaled_series(&self, kind: ComponentType, name: &str, attribute: &str) -> bool {
        self.scaled_series
            .contains(&(kind, name.to_string(), attribute.to_string()))
    }

    /// Add a component to the network, returning an error if the name is already in use
    fn add(&mut self, component: Component) -> Result<()> {
        let kind = component.kind();
        let name = component.name().to_string();
        let duplicate = match component {
            Component::Bus(c) => self.buses.insert(name.clone(), c).is_some(),
            Component::Carrier(c) => self.carriers.insert(name.clone(), c).is_some(),
            Component::Generator(c) => self.generators.insert(name.clone(), c).is_some(),
            Component::Load(c) => self.loads.insert(name.clone(), c).is_some(),
            Component::StorageUnit(c) => self.storage_units.insert(name.clone(), c).is_some(),
            Component::Store(c) => self.stores.insert(name.clone(), c).is_some(),
            Component::Link(c) => self.links.insert(name.clone(), c).is_some(),
        };
        ensure!(!duplicate, "Duplicate {kind} name: {name}");

        Ok(())
    }

    /// Buses referenced by components, in order of first reference
    fn referenced_buses(&self) -> IndexSet<&str> {
        let generators = self.generators.values().map(|g| g.bus.as_str());
        let loads = self.loads.values().map(|l| l.bus.as_str());
        let storage_units = self.storage_units.values().map(|s| s.bus.as_str());
        let stores = self.stores.values().map(|s| s.bus.as_str());
        let links = self.links.values().flat_map(|l| {
            [l.bus0.as_str(), l.bus1.as_str()]
                .into_iter()
                .chain(l.extra_ports.iter().map(|port| port.bus.as_str()))
        });

        generators
            .chain(loads)
            .chain(storage_units)
            .chain(stores)
            .chain(links)
            .collect()
    }

    /// Carriers referenced by components, in order of first reference
    fn referenced_carriers(&self) -> IndexSet<&str> {
        self.buses
            .values()
            .map(|c| c.carrier.as_str())
            .chain(self.generators.values().map(|c| c.carrier.as_str()))
            .chain(self.loads.values().map(|c| c.carrier.as_str()))
            .chain(self.storage_units.values().map(|c| c.carrier.as_str()))
            .chain(self.stores.values().map(|c| c.carrier.as_str()))
            .chain(self.links.values().map(|c| c.carrier.as_str()))
            .filter(|carrier| !carrier.is_empty())
            .collect()
    }
}

/// Build the network for a case.
///
/// Time series files are loaded, default attributes are added, power and energy values are
/// multiplied by the case's numerics scaling factor and any buses or carriers which are referred
/// to but not declared are created.
///
/// # Arguments
///
/// * `case` - The resolved case
/// * `policy` - What to do with components whose time series cannot be loaded
pub fn assemble_network(case: &Case, policy: TimeSeriesPolicy) -> Result<Network> {
    let mut network = Network::new(&case.config);
    ensure!(!network.snapshots.is_empty(), "The case has no snapshots");
    info!(
        "Modelling {} snapshots from {} to {}",
        network.snapshots.len(),
        network.snapshots[0],
        network.snapshots[network.snapshots.len() - 1]
    );

    for record in &case.records {
        let mut record = record.clone();
        let normalization = take_time_series_options(&mut record)?;
        match attach_time_series(&mut record, normalization, &case.config, &network.snapshots) {
            Ok(()) => {}
            Err(TimeSeriesError::Invalid(err)) => return Err(err),
            Err(TimeSeriesError::Unavailable(err)) => match policy {
                TimeSeriesPolicy::Skip => {
                    warn!("Skipping {} {}: {err:#}", record.kind, record.name);
                    continue;
                }
                TimeSeriesPolicy::Strict => return Err(err),
            },
        }

        add_extendable_defaults(&mut record);
        let scaled = scale_record(&mut record, &case.schema, network.numerics_scaling);
        for attribute in scaled {
            network
                .scaled_series
                .insert((record.kind, record.name.clone(), attribute));
        }

        let component = Component::from_record(record, &case.schema)?;
        network.add(component)?;
    }

    add_implicit_components(&mut network, &case.schema)?;

    Ok(network)
}

/// Why the time series of a component could not be attached
enum TimeSeriesError {
    /// The file could not be read or does not cover the snapshots
    Unavailable(anyhow::Error),
    /// The series was read but cannot be used as declared
    Invalid(anyhow::Error),
}

/// Check the time series settings of a record and remove them from its attributes.
///
/// A generator's `time_series_file` becomes its `p_max_pu` and a load's becomes its `p_set`.
/// Returns the `normalization` target, if any.
fn take_time_series_options(record: &mut ComponentRecord) -> Result<Option<f64>> {
    let normalization = match record.attributes.shift_remove("normalization") {
        None => None,
        Some(AttributeValue::Number(value)) if value.is_finite() => Some(value),
        Some(other) => bail!(
            "normalization for {} {} must be a number (got '{other}')",
            record.kind,
            record.name
        ),
    };

    if let Some(value) = record.attributes.shift_remove("time_series_file") {
        let target = match record.kind {
            ComponentType::Generator => "p_max_pu",
            ComponentType::Load => "p_set",
            kind => bail!("{kind} {} cannot have a time_series_file", record.name),
        };
        let AttributeValue::File(path) = value else {
            bail!(
                "time_series_file for {} {} must be a .csv file (got '{value}')",
                record.kind,
                record.name
            );
        };
        record
            .attributes
            .insert(target.to_string(), AttributeValue::File(path));
    }

    Ok(normalization)
}

/// Replace references to time series files with the series themselves.
///
/// If `normalization` is given, each series is rescaled to have that mean.
fn attach_time_series(
    record: &mut ComponentRecord,
    normalization: Option<f64>,
    config: &CaseConfig,
    snapshots: &[NaiveDateTime],
) -> Result<(), TimeSeriesError> {
    for (attribute, value) in &mut record.attributes {
        let AttributeValue::File(path) = value else {
            continue;
        };

        let file_path = config.input_path.join(&*path);
        let mut series = load_time_series(&file_path, config.datetime_start, config.datetime_end)
            .with_context(|| {
                format!(
                    "Could not load time series for attribute {attribute} of {} {}",
                    record.kind, record.name
                )
            })
            .map_err(TimeSeriesError::Unavailable)?;
        if let Some(target) = normalization {
            series
                .normalise(target)
                .with_context(|| {
                    format!(
                        "Could not normalise time series for attribute {attribute} of {} {}",
                        record.kind, record.name
                    )
                })
                .map_err(TimeSeriesError::Invalid)?;
        }
        debug!(
            "{} {}: loaded {} values for {attribute} from {}",
            record.kind,
            record.name,
            series.len(),
            file_path.display()
        );
        let values = series
            .align(snapshots)
            .map_err(TimeSeriesError::Unavailable)?;
        *value = AttributeValue::Series(values);
    }

    Ok(())
}

/// Make capacity extendable for components which do not give one
fn add_extendable_defaults(record: &mut ComponentRecord) {
    let (capacity, extendable) = match record.kind {
        ComponentType::Generator | ComponentType::StorageUnit | ComponentType::Link => {
            ("p_nom", "p_nom_extendable")
        }
        ComponentType::Store => ("e_nom", "e_nom_extendable"),
        _ => return,
    };

    if !record.attributes.contains_key(capacity) && !record.attributes.contains_key(extendable) {
        record
            .attributes
            .insert(extendable.to_string(), AttributeValue::Bool(true));
    }
}

/// Whether an attribute is multiplied by the numerics scaling factor
fn is_scaled_attribute(kind: ComponentType, attribute: &str, schema: &AttributeSchema) -> bool {
    if UNSCALED_ATTRIBUTE_PREFIXES
        .iter()
        .any(|prefix| attribute.starts_with(prefix))
    {
        return false;
    }

    schema
        .get(kind, attribute)
        .is_some_and(|meta| meta.is_power_or_energy())
}

/// Multiply power and energy attributes by `factor`.
///
/// Returns the names of the scaled time series.
fn scale_record(
    record: &mut ComponentRecord,
    schema: &AttributeSchema,
    factor: f64,
) -> Vec<String> {
    let mut scaled_series = Vec::new();
    for (attribute, value) in &mut record.attributes {
        if !is_scaled_attribute(record.kind, attribute, schema) {
            continue;
        }

        match value {
            AttributeValue::Number(value) => *value *= factor,
            AttributeValue::Series(values) => {
                for value in values.iter_mut() {
                    *value *= factor;
                }
                scaled_series.push(attribute.clone());
            }
            _ => {}
        }
    }

    scaled_series
}

/// Create buses and carriers which are referred to but not declared
fn add_implicit_components(network: &mut Network, schema: &AttributeSchema) -> Result<()> {
    let buses = network
        .referenced_buses()
        .into_iter()
        .filter(|bus| !network.buses.contains_key(*bus))
        .map(ToString::to_string)
        .collect_vec();
    if !buses.is_empty() {
        info!(
            "Adding buses which are not declared: {}",
            format_items_with_cap(&buses)
        );
    }
    for bus in buses {
        let record = ComponentRecord::new(ComponentType::Bus, &bus);
        network.add(Component::from_record(record, schema)?)?;
    }

    let carriers = network
        .referenced_carriers()
        .into_iter()
        .filter(|carrier| !network.carriers.contains_key(*carrier))
        .map(ToString::to_string)
        .collect_vec();
    for carrier in carriers {
        debug!("Adding carrier {carrier}");
        let record = ComponentRecord::new(ComponentType::Carrier, &carrier);
        network.add(Component::from_record(record, schema)?)?;
    }

    Ok(())
}
