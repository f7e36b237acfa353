//! Capacity expansion and dispatch as a linear programme, solved with HiGHS.
//!
//! Each snapshot has an energy balance for every bus. Generators, storage units, stores and links
//! have one or more activity variables per snapshot, limited by their capacity, which is either
//! fixed or (for extendable components) a decision variable costed at the capital cost.
use super::{
    GeneratorResult, LinkResult, SolvedNetwork, Solver, SolverError, StorageUnitResult,
    StoreResult,
};
use crate::component::Profile;
use crate::network::Network;
use ::highs::{HighsModelStatus, RowProblem as Problem, Sense};
use indexmap::IndexMap;
use log::debug;
use std::ops::RangeInclusive;

/// Bounds for a variable which may take any value
const FREE: RangeInclusive<f64> = f64::NEG_INFINITY..=f64::INFINITY;

const NON_NEGATIVE: RangeInclusive<f64> = 0.0..=f64::INFINITY;

/// Solves networks using the HiGHS LP solver
#[derive(Debug, Clone, Copy, Default)]
pub struct HighsSolver;

impl Solver for HighsSolver {
    fn name(&self) -> &'static str {
        "highs"
    }

    fn solve(&self, network: &Network) -> Result<SolvedNetwork, SolverError> {
        let mut problem = Problem::default();
        let variables = VariableMap::new(&mut problem, network);
        add_storage_unit_constraints(&mut problem, network, &variables);
        add_store_constraints(&mut problem, network, &variables);
        add_energy_balance_constraints(&mut problem, network, &variables);
        debug!(
            "Solving problem with {} variables and {} constraints",
            problem.num_cols(),
            problem.num_rows()
        );

        let solved = solve_optimal(problem.optimise(Sense::Minimise))?;
        let solution = solved.get_solution();
        Ok(variables.read_solution(network, solution.columns(), solved.objective_value()))
    }
}

/// Try to solve the model, returning an error if the model is incoherent or result is non-optimal
fn solve_optimal(model: ::highs::Model) -> Result<::highs::SolvedModel, SolverError> {
    let solved = model
        .try_solve()
        .map_err(|status| SolverError::Incoherent(format!("{status:?}")))?;

    match solved.status() {
        HighsModelStatus::Optimal => Ok(solved),
        status => Err(SolverError::NonOptimal(format!("{status:?}"))),
    }
}

/// A column of the problem, with its index for reading the solution
#[derive(Clone, Copy)]
struct Variable {
    col: ::highs::Col,
    idx: usize,
}

impl Variable {
    fn add(problem: &mut Problem, cost: f64, bounds: RangeInclusive<f64>) -> Self {
        // This line **must** come before we add the column
        let idx = problem.num_cols();
        let col = problem.add_column(cost, bounds);
        Self { col, idx }
    }

    fn value(self, columns: &[f64]) -> f64 {
        columns[self.idx]
    }
}

/// The capacity of a component
#[derive(Clone, Copy)]
enum Capacity {
    Fixed(f64),
    Extendable(Variable),
}

impl Capacity {
    fn new(
        problem: &mut Problem,
        extendable: bool,
        fixed: f64,
        bounds: RangeInclusive<f64>,
        capital_cost: f64,
    ) -> Self {
        if extendable {
            Capacity::Extendable(Variable::add(problem, capital_cost, bounds))
        } else {
            Capacity::Fixed(fixed)
        }
    }

    fn value(self, columns: &[f64]) -> f64 {
        match self {
            Capacity::Fixed(value) => value,
            Capacity::Extendable(var) => var.value(columns),
        }
    }
}

/// Add the constraint `var <= pu * capacity`
fn add_upper_limit(problem: &mut Problem, var: Variable, capacity: Capacity, pu: f64) {
    match capacity {
        Capacity::Fixed(value) => problem.add_row(..=pu * value, [(var.col, 1.0)]),
        Capacity::Extendable(cap) => problem.add_row(..=0.0, [(var.col, 1.0), (cap.col, -pu)]),
    }
}

/// Add the constraint `var >= pu * capacity`
fn add_lower_limit(problem: &mut Problem, var: Variable, capacity: Capacity, pu: f64) {
    match capacity {
        Capacity::Fixed(value) => problem.add_row(pu * value.., [(var.col, 1.0)]),
        Capacity::Extendable(cap) => problem.add_row(..=0.0, [(var.col, -1.0), (cap.col, pu)]),
    }
}

/// Add one variable per snapshot, with a cost of `weighting * marginal_cost`
fn add_dispatch_variables(
    problem: &mut Problem,
    network: &Network,
    marginal_cost: Option<&Profile>,
    bounds: &RangeInclusive<f64>,
) -> Vec<Variable> {
    (0..network.snapshots.len())
        .map(|t| {
            let cost = marginal_cost.map_or(0.0, |cost| network.snapshot_weighting * cost.at(t));
            Variable::add(problem, cost, bounds.clone())
        })
        .collect()
}

struct GeneratorVariables {
    capacity: Capacity,
    p: Vec<Variable>,
}

struct StorageUnitVariables {
    capacity: Capacity,
    p_dispatch: Vec<Variable>,
    p_store: Vec<Variable>,
    state_of_charge: Vec<Variable>,
}

struct StoreVariables {
    capacity: Capacity,
    p: Vec<Variable>,
    e: Vec<Variable>,
}

struct LinkVariables {
    capacity: Capacity,
    p: Vec<Variable>,
}

/// The variables of the problem, by component
struct VariableMap {
    generators: IndexMap<String, GeneratorVariables>,
    storage_units: IndexMap<String, StorageUnitVariables>,
    stores: IndexMap<String, StoreVariables>,
    links: IndexMap<String, LinkVariables>,
}

impl VariableMap {
    /// Add variables for every component, along with their capacity limits
    fn new(problem: &mut Problem, network: &Network) -> Self {
        let n = network.snapshots.len();

        let mut generators = IndexMap::new();
        for (name, generator) in &network.generators {
            let capacity = Capacity::new(
                problem,
                generator.p_nom_extendable,
                generator.p_nom,
                generator.p_nom_min..=generator.p_nom_max,
                generator.capital_cost,
            );
            let p = add_dispatch_variables(problem, network, Some(&generator.marginal_cost), &FREE);
            for t in 0..n {
                add_upper_limit(problem, p[t], capacity, generator.p_max_pu.at(t));
                add_lower_limit(problem, p[t], capacity, generator.p_min_pu.at(t));
            }
            generators.insert(name.clone(), GeneratorVariables { capacity, p });
        }

        let mut storage_units = IndexMap::new();
        for (name, unit) in &network.storage_units {
            let capacity = Capacity::new(
                problem,
                unit.p_nom_extendable,
                unit.p_nom,
                unit.p_nom_min..=unit.p_nom_max,
                unit.capital_cost,
            );
            let p_dispatch = add_dispatch_variables(
                problem,
                network,
                Some(&unit.marginal_cost),
                &NON_NEGATIVE,
            );
            let p_store = add_dispatch_variables(problem, network, None, &NON_NEGATIVE);
            let state_of_charge = add_dispatch_variables(problem, network, None, &NON_NEGATIVE);
            for t in 0..n {
                add_upper_limit(problem, p_dispatch[t], capacity, unit.p_max_pu.at(t));
                add_upper_limit(problem, p_store[t], capacity, -unit.p_min_pu.at(t));
                add_upper_limit(problem, state_of_charge[t], capacity, unit.max_hours);
            }
            storage_units.insert(
                name.clone(),
                StorageUnitVariables {
                    capacity,
                    p_dispatch,
                    p_store,
                    state_of_charge,
                },
            );
        }

        let mut stores = IndexMap::new();
        for (name, store) in &network.stores {
            let capacity = Capacity::new(
                problem,
                store.e_nom_extendable,
                store.e_nom,
                store.e_nom_min..=store.e_nom_max,
                store.capital_cost,
            );
            let p = add_dispatch_variables(problem, network, Some(&store.marginal_cost), &FREE);
            let e = add_dispatch_variables(problem, network, None, &FREE);
            for t in 0..n {
                add_upper_limit(problem, e[t], capacity, store.e_max_pu.at(t));
                add_lower_limit(problem, e[t], capacity, store.e_min_pu.at(t));
            }
            stores.insert(name.clone(), StoreVariables { capacity, p, e });
        }

        let mut links = IndexMap::new();
        for (name, link) in &network.links {
            let capacity = Capacity::new(
                problem,
                link.p_nom_extendable,
                link.p_nom,
                link.p_nom_min..=link.p_nom_max,
                link.capital_cost,
            );
            let p = add_dispatch_variables(problem, network, Some(&link.marginal_cost), &FREE);
            for t in 0..n {
                add_upper_limit(problem, p[t], capacity, link.p_max_pu.at(t));
                add_lower_limit(problem, p[t], capacity, link.p_min_pu.at(t));
            }
            links.insert(name.clone(), LinkVariables { capacity, p });
        }

        Self {
            generators,
            storage_units,
            stores,
            links,
        }
    }

    /// Read the values of all variables from the solution
    fn read_solution(&self, network: &Network, columns: &[f64], objective: f64) -> SolvedNetwork {
        let values = |vars: &[Variable]| vars.iter().map(|var| var.value(columns)).collect();

        SolvedNetwork {
            objective,
            generators: self
                .generators
                .iter()
                .map(|(name, vars)| {
                    let result = GeneratorResult {
                        p_nom_opt: vars.capacity.value(columns),
                        p: values(&vars.p),
                    };
                    (name.clone(), result)
                })
                .collect(),
            loads: network
                .loads
                .iter()
                .map(|(name, load)| {
                    let p = (0..network.snapshots.len()).map(|t| load.p_set.at(t)).collect();
                    (name.clone(), p)
                })
                .collect(),
            storage_units: self
                .storage_units
                .iter()
                .map(|(name, vars)| {
                    let result = StorageUnitResult {
                        p_nom_opt: vars.capacity.value(columns),
                        p_dispatch: values(&vars.p_dispatch),
                        p_store: values(&vars.p_store),
                        state_of_charge: values(&vars.state_of_charge),
                    };
                    (name.clone(), result)
                })
                .collect(),
            stores: self
                .stores
                .iter()
                .map(|(name, vars)| {
                    let result = StoreResult {
                        e_nom_opt: vars.capacity.value(columns),
                        p: values(&vars.p),
                        e: values(&vars.e),
                    };
                    (name.clone(), result)
                })
                .collect(),
            links: self
                .links
                .iter()
                .map(|(name, vars)| {
                    let result = LinkResult {
                        p_nom_opt: vars.capacity.value(columns),
                        p0: values(&vars.p),
                    };
                    (name.clone(), result)
                })
                .collect(),
        }
    }
}

/// The fraction of stored energy retained over one snapshot
fn retention(standing_loss: f64, weighting: f64) -> f64 {
    (1.0 - standing_loss).powf(weighting)
}

/// Add a storage continuity constraint for each snapshot.
///
/// `level[t] - retained * level[t - 1] + Σ coeff * flow[t] = 0`. Before the first snapshot the
/// level is `initial`, or the final level if `cyclic`.
fn add_continuity_constraints(
    problem: &mut Problem,
    level: &[Variable],
    flows: &[(&[Variable], f64)],
    retained: f64,
    initial: f64,
    cyclic: bool,
) {
    let n = level.len();
    for t in 0..n {
        let mut terms = Vec::with_capacity(flows.len() + 2);
        let mut rhs = 0.0;
        if t > 0 {
            terms.push((level[t].col, 1.0));
            terms.push((level[t - 1].col, -retained));
        } else if cyclic && n == 1 {
            terms.push((level[0].col, 1.0 - retained));
        } else if cyclic {
            terms.push((level[0].col, 1.0));
            terms.push((level[n - 1].col, -retained));
        } else {
            terms.push((level[0].col, 1.0));
            rhs = retained * initial;
        }
        for (vars, coeff) in flows {
            terms.push((vars[t].col, *coeff));
        }

        problem.add_row(rhs..=rhs, terms);
    }
}

fn add_storage_unit_constraints(problem: &mut Problem, network: &Network, variables: &VariableMap) {
    let w = network.snapshot_weighting;
    for (name, unit) in &network.storage_units {
        let vars = &variables.storage_units[name];
        add_continuity_constraints(
            problem,
            &vars.state_of_charge,
            &[
                (&vars.p_store, -w * unit.efficiency_store),
                (&vars.p_dispatch, w / unit.efficiency_dispatch),
            ],
            retention(unit.standing_loss, w),
            unit.state_of_charge_initial,
            unit.cyclic_state_of_charge,
        );
    }
}

fn add_store_constraints(problem: &mut Problem, network: &Network, variables: &VariableMap) {
    let w = network.snapshot_weighting;
    for (name, store) in &network.stores {
        let vars = &variables.stores[name];
        add_continuity_constraints(
            problem,
            &vars.e,
            &[(&vars.p, w)],
            retention(store.standing_loss, w),
            store.e_initial,
            store.e_cyclic,
        );
    }
}

/// Supply must equal demand at every bus, in every snapshot
fn add_energy_balance_constraints(
    problem: &mut Problem,
    network: &Network,
    variables: &VariableMap,
) {
    for bus in network.buses.keys() {
        for t in 0..network.snapshots.len() {
            let mut terms = Vec::new();
            for (name, generator) in &network.generators {
                if generator.bus == *bus {
                    terms.push((variables.generators[name].p[t].col, 1.0));
                }
            }
            for (name, unit) in &network.storage_units {
                if unit.bus == *bus {
                    let vars = &variables.storage_units[name];
                    terms.push((vars.p_dispatch[t].col, 1.0));
                    terms.push((vars.p_store[t].col, -1.0));
                }
            }
            for (name, store) in &network.stores {
                if store.bus == *bus {
                    terms.push((variables.stores[name].p[t].col, 1.0));
                }
            }
            for (name, link) in &network.links {
                let col = variables.links[name].p[t].col;
                if link.bus0 == *bus {
                    terms.push((col, -1.0));
                }
                if link.bus1 == *bus {
                    terms.push((col, link.efficiency.at(t)));
                }
                for port in &link.extra_ports {
                    if port.bus == *bus {
                        terms.push((col, port.efficiency.at(t)));
                    }
                }
            }

            let demand: f64 = network
                .loads
                .values()
                .filter(|load| load.bus == *bus)
                .map(|load| load.p_set.at(t))
                .sum();
            if terms.is_empty() && demand == 0.0 {
                continue;
            }
            problem.add_row(demand..=demand, terms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::simple_network;
    use float_cmp::assert_approx_eq;

    #[test]
    fn solve_generator_and_load() {
        let network = simple_network();
        let solved = HighsSolver.solve(&network).unwrap();

        // 5 MW of demand in each of 2 snapshots, capital cost 10, marginal cost 2
        let gas = &solved.generators["gas"];
        assert_approx_eq!(f64, gas.p_nom_opt, 5.0, epsilon = 1e-6);
        assert_approx_eq!(f64, gas.p[1], 5.0, epsilon = 1e-6);
        assert_approx_eq!(f64, solved.objective, 10.0 * 5.0 + 2.0 * 5.0 * 2.0, epsilon = 1e-6);
        assert_eq!(solved.loads["demand"], [5.0, 5.0]);
    }

    #[test]
    fn storage_shifts_cheap_energy() {
        let mut network = simple_network();
        // Cheap in the first snapshot, unavailable in the second
        let gas = network.generators.get_mut("gas").unwrap();
        gas.p_max_pu = Profile::Series(vec![1.0, 0.0]);
        let mut battery = crate::fixture::storage_unit("battery");
        battery.bus = "electricity".into();
        battery.capital_cost = 1.0;
        battery.max_hours = 2.0;
        network.storage_units.insert("battery".into(), battery);

        let solved = HighsSolver.solve(&network).unwrap();
        let battery = &solved.storage_units["battery"];
        assert_approx_eq!(f64, battery.p_store[0], 5.0, epsilon = 1e-6);
        assert_approx_eq!(f64, battery.p_dispatch[1], 5.0, epsilon = 1e-6);
        assert_approx_eq!(f64, battery.state_of_charge[0], 5.0, epsilon = 1e-6);
        assert_approx_eq!(f64, solved.generators["gas"].p[0], 10.0, epsilon = 1e-6);
    }

    #[test]
    fn infeasible_network() {
        let mut network = simple_network();
        let gas = network.generators.get_mut("gas").unwrap();
        gas.p_nom_extendable = false;
        gas.p_nom = 1.0;

        assert!(matches!(
            HighsSolver.solve(&network),
            Err(SolverError::NonOptimal(_))
        ));
    }
}
