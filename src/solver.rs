//! The boundary between the network and the optimisation backend.
use crate::network::Network;
use anyhow::{Result, bail};
use indexmap::IndexMap;
use std::error::Error;
use std::fmt;

mod highs;
pub use self::highs::HighsSolver;

/// An optimisation backend
pub trait Solver: fmt::Debug {
    /// The solver's name, as given in case files
    fn name(&self) -> &'static str;

    /// Find the least-cost dispatch and capacities for the network.
    ///
    /// This may take a long time for large networks.
    fn solve(&self, network: &Network) -> Result<SolvedNetwork, SolverError>;
}

/// Get the solver with the given name (case-insensitive)
pub fn create_solver(name: &str) -> Result<Box<dyn Solver>> {
    match name.trim().to_lowercase().as_str() {
        "highs" => Ok(Box::new(HighsSolver)),
        other => bail!("Unsupported solver: {other}. Supported solvers: highs"),
    }
}

/// Defines the possible errors that can occur when running the solver
#[derive(Debug, Clone, PartialEq)]
pub enum SolverError {
    /// The problem passed to the solver was malformed.
    ///
    /// Users should not be able to trigger this error.
    Incoherent(String),
    /// An optimal solution could not be found (e.g. the problem is infeasible)
    NonOptimal(String),
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::Incoherent(status) => write!(f, "Incoherent model: {status}"),
            SolverError::NonOptimal(status) => {
                write!(f, "Could not find optimal result: {status}")
            }
        }
    }
}

impl Error for SolverError {}

/// Results for a generator
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorResult {
    /// Optimal capacity
    pub p_nom_opt: f64,
    /// Output per snapshot
    pub p: Vec<f64>,
}

/// Results for a storage unit
#[derive(Debug, Clone, PartialEq)]
pub struct StorageUnitResult {
    /// Optimal power capacity
    pub p_nom_opt: f64,
    /// Discharging power per snapshot
    pub p_dispatch: Vec<f64>,
    /// Charging power per snapshot
    pub p_store: Vec<f64>,
    /// State of charge at the end of each snapshot
    pub state_of_charge: Vec<f64>,
}

/// Results for a store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreResult {
    /// Optimal energy capacity
    pub e_nom_opt: f64,
    /// Power delivered to the bus per snapshot (negative when charging)
    pub p: Vec<f64>,
    /// Energy level at the end of each snapshot
    pub e: Vec<f64>,
}

/// Results for a link
#[derive(Debug, Clone, PartialEq)]
pub struct LinkResult {
    /// Optimal capacity
    pub p_nom_opt: f64,
    /// Power withdrawn from `bus0` per snapshot
    pub p0: Vec<f64>,
}

/// The solution of a network, in the network's (scaled) units
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedNetwork {
    /// Value of the objective function
    pub objective: f64,
    pub generators: IndexMap<String, GeneratorResult>,
    /// Consumption per snapshot
    pub loads: IndexMap<String, Vec<f64>>,
    pub storage_units: IndexMap<String, StorageUnitResult>,
    pub stores: IndexMap<String, StoreResult>,
    pub links: IndexMap<String, LinkResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;

    #[test]
    fn create_solver_by_name() {
        assert_eq!(create_solver("HiGHS").unwrap().name(), "highs");
        assert_error!(
            create_solver("gurobi"),
            "Unsupported solver: gurobi. Supported solvers: highs"
        );
    }

    #[test]
    fn solver_error_display() {
        assert_eq!(
            SolverError::NonOptimal("Infeasible".into()).to_string(),
            "Could not find optimal result: Infeasible"
        );
    }
}
