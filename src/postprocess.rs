//! Reshape a solved network into report tables.
//!
//! All power, energy and monetary values are divided by the case's numerics scaling factor so
//! that reports are in the units of the case file. Per-unit values (capacity factors) are left
//! alone unless the corresponding input series was itself scaled.
use crate::component::ComponentType;
use crate::input::case_config::CaseConfig;
use crate::network::Network;
use crate::solver::SolvedNetwork;
use chrono::NaiveDateTime;
use itertools::Itertools;
use serde::Serialize;
use std::fmt;

/// Format used for snapshot timestamps in reports
const SNAPSHOT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single value in a report table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TableValue {
    Number(f64),
    Text(String),
}

impl TableValue {
    /// The value as a number, if it is one
    pub fn as_number(&self) -> Option<f64> {
        match self {
            TableValue::Number(value) => Some(*value),
            TableValue::Text(_) => None,
        }
    }
}

impl fmt::Display for TableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableValue::Number(value) => write!(f, "{value}"),
            TableValue::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<f64> for TableValue {
    fn from(value: f64) -> Self {
        TableValue::Number(value)
    }
}

impl From<&str> for TableValue {
    fn from(value: &str) -> Self {
        TableValue::Text(value.to_string())
    }
}

impl From<String> for TableValue {
    fn from(value: String) -> Self {
        TableValue::Text(value)
    }
}

/// A table of values with named columns
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<TableValue>>,
}

impl Table {
    /// Create an empty table with the given columns
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. It must have one value per column.
    fn push_row(&mut self, row: Vec<TableValue>) {
        assert_eq!(row.len(), self.columns.len(), "Row length must match columns");
        self.rows.push(row);
    }

    /// The index of the named column
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// The value in the given row and named column
    pub fn get(&self, row: usize, column: &str) -> Option<&TableValue> {
        self.rows.get(row)?.get(self.column_index(column)?)
    }
}

/// The tables reported for a solved case
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTables {
    /// Input series per snapshot (capacity factors and loads)
    pub time_inputs: Table,
    /// A single row summarising the whole case
    pub case_results: Table,
    /// One row per generator, storage unit, store and link
    pub component_results: Table,
    /// Results per snapshot
    pub time_results: Table,
}

impl ReportTables {
    /// The tables along with their names
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Table)> {
        [
            ("time inputs", &self.time_inputs),
            ("case results", &self.case_results),
            ("component results", &self.component_results),
            ("time results", &self.time_results),
        ]
        .into_iter()
    }
}

/// The units used for column names
struct Units<'a> {
    currency: &'a str,
    power: &'a str,
    time: &'a str,
}

/// Summary statistics for one component, in unscaled units
#[derive(Default)]
struct ComponentSummary {
    carrier: String,
    optimal_capacity: f64,
    installed_capacity: f64,
    supply: f64,
    withdrawal: f64,
    curtailment: f64,
    capacity_factor: f64,
    capital_expenditure: f64,
    /// Total over all snapshots
    operational_expenditure: f64,
}

/// Build the report tables for a solved network.
///
/// # Arguments
///
/// * `network` - The network which was solved
/// * `solved` - The solution
/// * `config` - The case configuration, which gives the units used in column names
pub fn postprocess(network: &Network, solved: &SolvedNetwork, config: &CaseConfig) -> ReportTables {
    let units = Units {
        currency: &config.currency,
        power: &config.power_unit,
        time: &config.time_unit,
    };
    let summaries = summarise_components(network, solved);

    ReportTables {
        time_inputs: time_inputs(network),
        case_results: case_results(network, solved, &summaries, &units),
        component_results: component_results(&summaries, &units, network.total_hours()),
        time_results: time_results(network, solved),
    }
}

fn format_snapshot(snapshot: &NaiveDateTime) -> TableValue {
    snapshot.format(SNAPSHOT_FORMAT).to_string().into()
}

/// Divide by the scaling factor
fn unscale(network: &Network, value: f64) -> f64 {
    value / network.numerics_scaling
}

/// Sum of `weighting * value` over all snapshots
fn weighted_sum<I: IntoIterator<Item = f64>>(network: &Network, values: I) -> f64 {
    values.into_iter().sum::<f64>() * network.snapshot_weighting
}

/// Energy supplied divided by the energy which could have been supplied at full capacity
fn capacity_factor(network: &Network, energy: f64, capacity: f64) -> f64 {
    let available = capacity * network.total_hours();
    if available > 0.0 {
        energy / available
    } else {
        0.0
    }
}

fn time_inputs(network: &Network) -> Table {
    let columns = std::iter::once("snapshot".to_string())
        .chain(network.generators.keys().map(|name| format!("{name} capacity factor")))
        .chain(network.loads.keys().map(|name| format!("{name} load")));
    let mut table = Table::new(columns);

    for (t, snapshot) in network.snapshots.iter().enumerate() {
        let mut row = vec![format_snapshot(snapshot)];
        for (name, generator) in &network.generators {
            let mut value = generator.p_max_pu.at(t);
            if network.is_scaled_series(ComponentType::Generator, name, "p_max_pu") {
                value = unscale(network, value);
            }
            row.push(value.into());
        }
        for load in network.loads.values() {
            row.push(unscale(network, load.p_set.at(t)).into());
        }
        table.push_row(row);
    }

    table
}

/// Per-component statistics, keyed by type and name
fn summarise_components(
    network: &Network,
    solved: &SolvedNetwork,
) -> Vec<(ComponentType, String, ComponentSummary)> {
    let mut summaries = Vec::new();

    for (name, result) in &solved.generators {
        let generator = &network.generators[name];
        let supply = weighted_sum(network, result.p.iter().map(|p| p.max(0.0)));
        let withdrawal = weighted_sum(network, result.p.iter().map(|p| (-p).max(0.0)));
        let available = result
            .p
            .iter()
            .enumerate()
            .map(|(t, p)| (generator.p_max_pu.at(t) * result.p_nom_opt - p).max(0.0));
        let operational = result
            .p
            .iter()
            .enumerate()
            .map(|(t, p)| generator.marginal_cost.at(t) * p);
        summaries.push((
            ComponentType::Generator,
            name.clone(),
            ComponentSummary {
                carrier: generator.carrier.clone(),
                optimal_capacity: unscale(network, result.p_nom_opt),
                installed_capacity: unscale(network, generator.p_nom),
                supply: unscale(network, supply),
                withdrawal: unscale(network, withdrawal),
                curtailment: unscale(network, weighted_sum(network, available)),
                capacity_factor: capacity_factor(network, supply, result.p_nom_opt),
                capital_expenditure: unscale(network, generator.capital_cost * result.p_nom_opt),
                operational_expenditure: unscale(network, weighted_sum(network, operational)),
            },
        ));
    }

    for (name, result) in &solved.storage_units {
        let unit = &network.storage_units[name];
        let supply = weighted_sum(network, result.p_dispatch.iter().copied());
        let operational = result
            .p_dispatch
            .iter()
            .enumerate()
            .map(|(t, p)| unit.marginal_cost.at(t) * p);
        summaries.push((
            ComponentType::StorageUnit,
            name.clone(),
            ComponentSummary {
                carrier: unit.carrier.clone(),
                optimal_capacity: unscale(network, result.p_nom_opt),
                installed_capacity: unscale(network, unit.p_nom),
                supply: unscale(network, supply),
                withdrawal: unscale(network, weighted_sum(network, result.p_store.iter().copied())),
                capacity_factor: capacity_factor(network, supply, result.p_nom_opt),
                capital_expenditure: unscale(network, unit.capital_cost * result.p_nom_opt),
                operational_expenditure: unscale(network, weighted_sum(network, operational)),
                ..ComponentSummary::default()
            },
        ));
    }

    for (name, result) in &solved.stores {
        let store = &network.stores[name];
        let supply = weighted_sum(network, result.p.iter().map(|p| p.max(0.0)));
        let withdrawal = weighted_sum(network, result.p.iter().map(|p| (-p).max(0.0)));
        let operational = result
            .p
            .iter()
            .enumerate()
            .map(|(t, p)| store.marginal_cost.at(t) * p);
        summaries.push((
            ComponentType::Store,
            name.clone(),
            ComponentSummary {
                carrier: store.carrier.clone(),
                optimal_capacity: unscale(network, result.e_nom_opt),
                installed_capacity: unscale(network, store.e_nom),
                supply: unscale(network, supply),
                withdrawal: unscale(network, withdrawal),
                capacity_factor: capacity_factor(network, supply, result.e_nom_opt),
                capital_expenditure: unscale(network, store.capital_cost * result.e_nom_opt),
                operational_expenditure: unscale(network, weighted_sum(network, operational)),
                ..ComponentSummary::default()
            },
        ));
    }

    for (name, result) in &solved.links {
        let link = &network.links[name];
        let withdrawal = weighted_sum(network, result.p0.iter().copied());
        let supply = weighted_sum(
            network,
            result.p0.iter().enumerate().map(|(t, p)| link.efficiency.at(t) * p),
        );
        let operational = result
            .p0
            .iter()
            .enumerate()
            .map(|(t, p)| link.marginal_cost.at(t) * p);
        summaries.push((
            ComponentType::Link,
            name.clone(),
            ComponentSummary {
                carrier: link.carrier.clone(),
                optimal_capacity: unscale(network, result.p_nom_opt),
                installed_capacity: unscale(network, link.p_nom),
                supply: unscale(network, supply),
                withdrawal: unscale(network, withdrawal),
                capacity_factor: capacity_factor(network, withdrawal.abs(), result.p_nom_opt),
                capital_expenditure: unscale(network, link.capital_cost * result.p_nom_opt),
                operational_expenditure: unscale(network, weighted_sum(network, operational)),
                ..ComponentSummary::default()
            },
        ));
    }

    summaries
}

fn case_results(
    network: &Network,
    solved: &SolvedNetwork,
    summaries: &[(ComponentType, String, ComponentSummary)],
    units: &Units,
) -> Table {
    let total_cost: f64 = summaries
        .iter()
        .map(|(_, _, s)| s.capital_expenditure + s.operational_expenditure)
        .sum();
    let mut table = Table::new([
        format!("objective [{}]", units.currency),
        format!("system cost [{}/{}]", units.currency, units.time),
    ]);
    table.push_row(vec![
        unscale(network, solved.objective).into(),
        (total_cost / network.total_hours()).into(),
    ]);

    table
}

/// Operational expenditure is reported per unit time
fn component_results(
    summaries: &[(ComponentType, String, ComponentSummary)],
    units: &Units,
    total_hours: f64,
) -> Table {
    let Units {
        currency,
        power,
        time,
    } = units;
    let mut table = Table::new([
        "component".to_string(),
        "name".to_string(),
        "carrier".to_string(),
        format!("Optimal Capacity [{power}]"),
        format!("Installed Capacity [{power}]"),
        format!("Supply [{power}{time}]"),
        format!("Withdrawal [{power}{time}]"),
        format!("Curtailment [{power}{time}]"),
        "Capacity Factor".to_string(),
        format!("Capital Expenditure [{currency}]"),
        format!("Operational Expenditure [{currency}/{time}]"),
    ]);

    for (kind, name, summary) in summaries {
        table.push_row(vec![
            kind.as_str().into(),
            name.as_str().into(),
            summary.carrier.as_str().into(),
            summary.optimal_capacity.into(),
            summary.installed_capacity.into(),
            summary.supply.into(),
            summary.withdrawal.into(),
            summary.curtailment.into(),
            summary.capacity_factor.into(),
            summary.capital_expenditure.into(),
            (summary.operational_expenditure / total_hours).into(),
        ]);
    }

    table
}

fn time_results(network: &Network, solved: &SolvedNetwork) -> Table {
    let columns = std::iter::once("snapshot".to_string())
        .chain(solved.generators.keys().map(|name| format!("{name} dispatch")))
        .chain(solved.loads.keys().map(|name| format!("{name} load")))
        .chain(solved.storage_units.keys().flat_map(|name| {
            [
                format!("{name} charged"),
                format!("{name} discharged"),
                format!("{name} state of charge"),
            ]
        }))
        .chain(solved.stores.keys().map(|name| format!("{name} state of charge")))
        .chain(solved.links.keys().map(|name| format!("{name} flow")))
        .collect_vec();
    let mut table = Table::new(columns);

    for (t, snapshot) in network.snapshots.iter().enumerate() {
        let mut row = vec![format_snapshot(snapshot)];
        let mut push = |value: f64| row.push(unscale(network, value).into());
        for result in solved.generators.values() {
            push(result.p[t]);
        }
        for load in solved.loads.values() {
            push(load[t]);
        }
        for result in solved.storage_units.values() {
            push(result.p_store[t]);
            push(result.p_dispatch[t]);
            push(result.state_of_charge[t]);
        }
        for result in solved.stores.values() {
            push(result.e[t]);
        }
        for result in solved.links.values() {
            push(result.p0[t]);
        }
        table.push_row(row);
    }

    table
}
