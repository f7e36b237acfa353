//! Fixtures for tests
use crate::component::{Bus, ExtraAttributes, Generator, Load, Profile, StorageUnit};
use crate::costs::CostTable;
use crate::input::case_config::{CaseConfig, parse_datetime};
use crate::input::{Case, load_case, read_case_file};
use crate::network::Network;
use crate::sheet::{Cell, Row};
use indexmap::{IndexMap, IndexSet};
use rstest::fixture;
use std::fs;
use std::path::{Path, PathBuf};

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Name of the case file written by [`write_demo_case`]
const DEMO_CASE_FILE_NAME: &str = "demo.csv";

const COSTS_CSV: &str = "\
technology,attribute,value,unit,source
solar-utility,investment,400,EUR/kWel,
solar-utility,lifetime,25,years,
solar-utility,FOM,2,%/year,
solar-rooftop,investment,800,EUR/kWel,
solar-rooftop,lifetime,25,years,
gas,fuel,20,EUR/MWh_th,
gas,CO2 intensity,0.2,tCO2/MWh_th,
OCGT,VOM,4,EUR/MWh,
OCGT,efficiency,0.4,per unit,
OCGT,investment,450,EUR/kWel,
OCGT,lifetime,25,years,
onwind,investment,1100,EUR/kWel,
onwind,lifetime,30,years,
onwind,VOM,,EUR/MWh,missing value
battery storage,investment,150,EUR/kWh,
battery storage,lifetime,20,years,
battery inverter,investment,100,EUR/kWel,
battery inverter,lifetime,20,years,
";

const COST_CONFIG_TOML: &str = r#"
[fill_values]
FOM = 0
VOM = 0
efficiency = 1
fuel = 0
"discount rate" = 0
"CO2 intensity" = 0
lifetime = 25
investment = 0

[max_hours]
battery = 6

[marginal_cost]
onwind = 1.5

[[derive]]
kind = "inherit"
technology = "OCGT"
from = "gas"
attributes = ["fuel", "co2_emissions"]

[[derive]]
kind = "blend"
technology = "solar"
first = "solar-rooftop"
second = "solar-utility"
share = 0.15

[[derive]]
kind = "storage"
technology = "battery"
store = "battery storage"
links = ["battery inverter"]
"#;

const SOLAR_CSV_HEADER: &str = "\
Capacity factors for a utility-scale solar park
BEGIN_DATA
day,month,year,hour,value
";

fn text(s: &str) -> Cell {
    Cell::Text(s.to_string())
}

/// Rows of a valid case configuration section (without the sentinel rows)
pub fn case_config_rows() -> Vec<Row> {
    [
        ("numerics_scaling", Cell::Number(1000.0)),
        ("datetime_start", text("2019-01-01 00:00")),
        ("datetime_end", text("2019-01-01 23:00")),
        ("input_path", text("data")),
        ("output_path", text("results")),
        ("case_name", text("demo")),
        ("solver", text("highs")),
        ("currency", text("EUR")),
        ("power_unit", text("MW")),
        ("time_unit", text("h")),
        ("logging_level", text("info")),
        ("delta_t", Cell::Empty),
        ("no_time_steps", Cell::Empty),
        ("costs_path", text("costs.csv")),
    ]
    .into_iter()
    .map(|(key, value)| vec![text(key), value])
    .collect()
}

#[fixture]
pub fn case_config() -> CaseConfig {
    CaseConfig::from_rows(&case_config_rows(), Path::new("/cases")).unwrap()
}

/// Write `costs.csv` and `cost_config.toml` to `dir`, returning the path of the cost file
pub fn write_cost_files(dir: &Path) -> PathBuf {
    let costs_path = dir.join("costs.csv");
    fs::write(&costs_path, COSTS_CSV).unwrap();
    fs::write(dir.join("cost_config.toml"), COST_CONFIG_TOML).unwrap();
    costs_path
}

#[fixture]
pub fn cost_table() -> CostTable {
    CostTable::from_entries([
        ("battery", "capital_cost", 100.0),
        ("battery", "marginal_cost", 0.5),
    ])
}

/// Write a case with one bus, a solar generator and a flat load to `dir`.
///
/// The case also includes a commented-out generator. Returns the path of the case file.
pub fn write_demo_case(dir: &Path) -> PathBuf {
    write_cost_files(dir);

    let mut solar = SOLAR_CSV_HEADER.to_string();
    for hour in 1..=24 {
        // Never zero, so that the flat load can always be met
        let value = if (8..=18).contains(&hour) { 0.6 } else { 0.1 };
        solar.push_str(&format!("1,1,2019,{hour},{value}\n"));
    }
    fs::write(dir.join("solar.csv"), solar).unwrap();

    let case = "\
CASE_DATA
numerics_scaling,1000
datetime_start,2019-01-01 01:00
datetime_end,2019-01-02 00:00
input_path,.
output_path,results
case_name,demo
solver,highs
currency,EUR
power_unit,MW
time_unit,h
logging_level,info
delta_t,
no_time_steps,
costs_path,costs.csv
END_CASE_DATA

COMPONENT_DATA
component,name,bus,carrier,p_set,capital_cost,marginal_cost,time_series_file
Bus,electricity,,AC,,,,
Generator,solar-utility % field,electricity,solar,,db,0,solar.csv
Load,demand,electricity,,0.5,,,
#Generator,old gas plant,electricity,gas,,,50,
END_COMPONENT_DATA
";
    let case_path = dir.join(DEMO_CASE_FILE_NAME);
    fs::write(&case_path, case).unwrap();
    case_path
}

/// Read and resolve a case file
pub fn demo_case(case_path: &Path) -> Case {
    load_case(&read_case_file(case_path).unwrap(), None).unwrap()
}

/// An extendable generator with no costs, attached to bus `electricity`
pub fn generator(name: &str) -> Generator {
    Generator {
        name: name.to_string(),
        bus: "electricity".to_string(),
        carrier: String::new(),
        p_nom: 0.0,
        p_nom_extendable: true,
        p_nom_min: 0.0,
        p_nom_max: f64::INFINITY,
        p_min_pu: Profile::Static(0.0),
        p_max_pu: Profile::Static(1.0),
        marginal_cost: Profile::Static(0.0),
        capital_cost: 0.0,
        extra: ExtraAttributes::new(),
    }
}

/// An extendable, lossless storage unit with no costs and one hour of storage
pub fn storage_unit(name: &str) -> StorageUnit {
    StorageUnit {
        name: name.to_string(),
        bus: String::new(),
        carrier: String::new(),
        p_nom: 0.0,
        p_nom_extendable: true,
        p_nom_min: 0.0,
        p_nom_max: f64::INFINITY,
        p_min_pu: Profile::Static(-1.0),
        p_max_pu: Profile::Static(1.0),
        marginal_cost: Profile::Static(0.0),
        capital_cost: 0.0,
        max_hours: 1.0,
        efficiency_store: 1.0,
        efficiency_dispatch: 1.0,
        standing_loss: 0.0,
        state_of_charge_initial: 0.0,
        cyclic_state_of_charge: false,
        extra: ExtraAttributes::new(),
    }
}

/// A network with two hourly snapshots, a gas generator and a 5 MW load on a single bus.
///
/// The generator has a capital cost of 10 and a marginal cost of 2.
pub fn simple_network() -> Network {
    let gas = Generator {
        carrier: "gas".to_string(),
        marginal_cost: Profile::Static(2.0),
        capital_cost: 10.0,
        ..generator("gas")
    };
    let demand = Load {
        name: "demand".to_string(),
        bus: "electricity".to_string(),
        carrier: String::new(),
        p_set: Profile::Static(5.0),
        extra: ExtraAttributes::new(),
    };
    let bus = Bus {
        name: "electricity".to_string(),
        carrier: "AC".to_string(),
        v_nom: 1.0,
        extra: ExtraAttributes::new(),
    };

    Network {
        snapshots: vec![
            parse_datetime("2019-01-01 01:00").unwrap(),
            parse_datetime("2019-01-01 02:00").unwrap(),
        ],
        snapshot_weighting: 1.0,
        numerics_scaling: 1.0,
        buses: IndexMap::from([(bus.name.clone(), bus)]),
        carriers: IndexMap::new(),
        generators: IndexMap::from([(gas.name.clone(), gas)]),
        loads: IndexMap::from([(demand.name.clone(), demand)]),
        storage_units: IndexMap::new(),
        stores: IndexMap::new(),
        links: IndexMap::new(),
        scaled_series: IndexSet::new(),
    }
}
