/// Calibrates a building description against actual fuel and electricity use by adjusting
/// the properties that are hardest to know: heat loss, the split between heating systems,
/// and the non-heating electric loads.
use crate::core::energy_model::model_building;
use crate::core::units::{fuel_units_to_mmbtu, kwh_to_mmbtu};
use crate::errors::{CalculationError, HpCalcError, InvalidInputError};
use crate::input::{BuildingDescription, EnergyModelFitInputs, Fuel};
use crate::library::ReferenceData;
use crate::output::{DetailedModelResults, EnergyModelFitResults, FuelFitError};
use argmin::core::{CostFunction, Executor, State, TerminationReason};
use argmin::solver::neldermead::NelderMead;
use tracing::{debug, info, warn};

pub(crate) const MAX_ITERATIONS: u64 = 600;
const SD_TOLERANCE: f64 = 1e-10;

/// Size of each step away from the initial point when building the starting simplex, as a
/// fraction of the parameter's range.
const INITIAL_STEP: f64 = 0.1;

/// Objective added per unit of distance outside the parameter bounds.
const OUT_OF_BOUNDS_PENALTY: f64 = 1e6;

/// Squared monthly electric errors are weighted so they carry as much as squared annual
/// errors do.
const MONTHLY_ERROR_WEIGHT: f64 = 12.0;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Parameter {
    UaPerFt2,
    PrimaryLoadFrac,
    MiscElecKwhPerDay,
    MiscElecSeasonality,
    EvMilesPerKwh,
    EvSeasonality,
    SolarKwhPerKw,
}

impl Parameter {
    const ALL: [Parameter; 7] = [
        Parameter::UaPerFt2,
        Parameter::PrimaryLoadFrac,
        Parameter::MiscElecKwhPerDay,
        Parameter::MiscElecSeasonality,
        Parameter::EvMilesPerKwh,
        Parameter::EvSeasonality,
        Parameter::SolarKwhPerKw,
    ];

    fn apply(&self, building: &mut BuildingDescription, value: f64) {
        match self {
            Parameter::UaPerFt2 => building.ua_per_ft2 = value,
            Parameter::PrimaryLoadFrac => *building = building.with_primary_load_frac(value),
            Parameter::MiscElecKwhPerDay => building.misc_elec_kwh_per_day = value,
            Parameter::MiscElecSeasonality => building.misc_elec_seasonality = value,
            Parameter::EvMilesPerKwh => building.ev_miles_per_kwh = value,
            Parameter::EvSeasonality => building.ev_seasonality = value,
            Parameter::SolarKwhPerKw => building.solar_kwh_per_kw = value,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ParameterRange {
    parameter: Parameter,
    initial: f64,
    lower: f64,
    upper: f64,
    /// Whether the parameter can affect the modeled use of this building
    free: bool,
}

impl ParameterRange {
    fn to_unit(&self, value: f64) -> f64 {
        (value - self.lower) / (self.upper - self.lower)
    }

    fn from_unit(&self, unit: f64) -> f64 {
        self.lower + unit.clamp(0.0, 1.0) * (self.upper - self.lower)
    }
}

/// The parameters adjusted for a building and their bounds.
#[derive(Clone, Debug, PartialEq)]
struct ParameterSpace {
    ranges: Vec<ParameterRange>,
}

impl ParameterSpace {
    fn for_building(building: &BuildingDescription) -> Self {
        let has_secondary = building.conventional_heat.secondary.is_some();
        let misc_initial = 5.72 + 0.00329 * building.bldg_floor_area;

        let ranges = Parameter::ALL
            .into_iter()
            .map(|parameter| {
                let (initial, lower, upper, free) = match parameter {
                    Parameter::UaPerFt2 => (0.19, 0.096, 0.52, true),
                    Parameter::PrimaryLoadFrac if has_secondary => (0.75, 0.4, 1.0, true),
                    Parameter::PrimaryLoadFrac => (1.0, 0.4, 1.0, false),
                    Parameter::MiscElecKwhPerDay => {
                        (misc_initial, misc_initial / 2.0, misc_initial * 2.0, true)
                    }
                    Parameter::MiscElecSeasonality => (0.15, -0.1, 0.30, true),
                    Parameter::EvMilesPerKwh => {
                        (3.0, 2.0, 3.5, building.ev_charging_miles_per_day > 0.0)
                    }
                    Parameter::EvSeasonality => {
                        (0.0, -0.15, 0.15, building.ev_charging_miles_per_day > 0.0)
                    }
                    Parameter::SolarKwhPerKw => (650.0, 450.0, 950.0, building.solar_kw > 0.0),
                };
                ParameterRange {
                    parameter,
                    initial,
                    lower,
                    upper,
                    free,
                }
            })
            .collect();

        Self { ranges }
    }

    fn free(&self) -> impl Iterator<Item = &ParameterRange> {
        self.ranges.iter().filter(|range| range.free)
    }

    /// Initial position of the free parameters in the unit cube.
    fn initial_unit(&self) -> Vec<f64> {
        self.free().map(|range| range.to_unit(range.initial)).collect()
    }

    /// Nelder-Mead starting simplex: the initial point plus one step along each axis, stepping
    /// backwards where a forward step would leave the cube.
    fn initial_simplex(&self) -> Vec<Vec<f64>> {
        let start = self.initial_unit();
        let mut simplex = vec![start.clone()];
        for axis in 0..start.len() {
            let mut vertex = start.clone();
            vertex[axis] += if start[axis] + INITIAL_STEP <= 1.0 {
                INITIAL_STEP
            } else {
                -INITIAL_STEP
            };
            simplex.push(vertex);
        }
        simplex
    }

    /// The building with the free parameters set from a point in the unit cube (clamped into
    /// it) and the fixed ones at their initial values.
    fn building_at(&self, base: &BuildingDescription, unit: &[f64]) -> BuildingDescription {
        let mut building = base.clone();
        let mut unit = unit.iter();
        for range in &self.ranges {
            let value = if range.free {
                range.from_unit(unit.next().copied().unwrap_or(0.0))
            } else {
                range.initial
            };
            range.parameter.apply(&mut building, value);
        }
        building
    }
}

/// Squared distance of a point outside the unit cube.
fn out_of_bounds(unit: &[f64]) -> f64 {
    unit.iter().map(|u| (u - u.clamp(0.0, 1.0)).powi(2)).sum()
}

/// Actual use, in MMBTU.
#[derive(Clone, Debug, PartialEq)]
struct ActualUse {
    elec_by_month: [f64; 12],
    fuel_by_type: Vec<(Fuel, f64)>,
}

impl ActualUse {
    fn new(inputs: &EnergyModelFitInputs, reference: &ReferenceData) -> Result<Self, InvalidInputError> {
        let fuel_by_type = inputs
            .actual_fuel_by_type
            .iter()
            .filter(|(fuel, _)| {
                if fuel.is_electricity() {
                    warn!("Ignoring annual electricity in actual fuel use; monthly readings are used instead");
                }
                !fuel.is_electricity()
            })
            .map(|(fuel, units)| {
                let info = reference.fuel(*fuel).map_err(|_| {
                    InvalidInputError::unknown(format!("actual_fuel_by_type.{fuel}"), "fuel", fuel)
                })?;
                Ok((*fuel, fuel_units_to_mmbtu(*units, info.btus)))
            })
            .collect::<Result<Vec<_>, InvalidInputError>>()?;

        Ok(Self {
            elec_by_month: inputs.electric_use_by_month.map(kwh_to_mmbtu),
            fuel_by_type,
        })
    }

    /// Weighted sum of squared errors of the modeled use, MMBTU^2
    fn error(&self, results: &DetailedModelResults) -> f64 {
        let monthly_elec = results
            .monthly_results
            .iter()
            .zip(self.elec_by_month)
            .map(|(month, actual)| {
                let modeled = month.fuel_use_mmbtu.sum_key1().get(&Fuel::Electricity).copied().unwrap_or(0.0);
                (modeled - actual).powi(2)
            })
            .sum::<f64>();

        let annual_fuel = results.annual_results.fuel_use_mmbtu.sum_key1();
        let fuel = self
            .fuel_by_type
            .iter()
            .map(|(fuel, actual)| (annual_fuel.get(fuel).copied().unwrap_or(0.0) - actual).powi(2))
            .sum::<f64>();

        MONTHLY_ERROR_WEIGHT * monthly_elec + fuel
    }
}

struct Calibration<'a> {
    base: &'a BuildingDescription,
    reference: &'a ReferenceData,
    space: &'a ParameterSpace,
    actual: &'a ActualUse,
}

impl CostFunction for Calibration<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, unit: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        let building = self.space.building_at(self.base, unit);
        let results = model_building(&building, self.reference)?;

        Ok(self.actual.error(&results) + OUT_OF_BOUNDS_PENALTY * out_of_bounds(unit))
    }
}

/// Finds the building description that best reproduces the actual use. Failing to converge
/// within the iteration limit is not an error; the best point found is returned with
/// `converged` false.
pub fn fit_model(
    inputs: &EnergyModelFitInputs,
    reference: &ReferenceData,
) -> Result<EnergyModelFitResults, HpCalcError> {
    inputs.validate()?;
    let base = &inputs.building_description;
    let actual = ActualUse::new(inputs, reference)?;
    let space = ParameterSpace::for_building(base);

    // surface input problems as such before they get wrapped up by the optimizer
    model_building(&space.building_at(base, &space.initial_unit()), reference)?;

    let calibration = Calibration {
        base,
        reference,
        space: &space,
        actual: &actual,
    };
    let solver = NelderMead::new(space.initial_simplex())
        .with_sd_tolerance(SD_TOLERANCE)
        .map_err(CalculationError::new)?;
    let result = Executor::new(calibration, solver)
        .configure(|state| state.max_iters(MAX_ITERATIONS))
        .run()
        .map_err(CalculationError::new)?;

    let state = result.state();
    let best = state
        .get_best_param()
        .cloned()
        .unwrap_or_else(|| space.initial_unit());
    let converged = matches!(
        state.get_termination_reason(),
        Some(TerminationReason::SolverConverged)
    );
    let iterations = state.get_iter();
    let residual = state.get_best_cost();
    if converged {
        info!(iterations, residual, "Energy model fit converged");
    } else {
        info!(iterations, residual, "Energy model fit stopped before converging");
    }

    let building_description = space.building_at(base, &best);
    debug!(ua_per_ft2 = building_description.ua_per_ft2, "Fitted building");
    let fitted = model_building(&building_description, reference)?;

    Ok(EnergyModelFitResults {
        fit_errors: fit_errors(inputs, &fitted),
        building_description,
        converged,
        iterations,
        residual,
    })
}

/// Actual and modeled annual use of each fuel with actual use given, then electricity, in
/// fuel units.
fn fit_errors(inputs: &EnergyModelFitInputs, fitted: &DetailedModelResults) -> Vec<FuelFitError> {
    let modeled_units = fitted.annual_results.fuel_use_units.sum_key1();
    let modeled = |fuel: Fuel| modeled_units.get(&fuel).copied().unwrap_or(0.0);

    inputs
        .actual_fuel_by_type
        .iter()
        .filter(|(fuel, _)| !fuel.is_electricity())
        .map(|(fuel, actual)| (*fuel, *actual))
        .chain([(Fuel::Electricity, inputs.electric_use_by_month.iter().sum::<f64>())])
        .map(|(fuel, actual)| FuelFitError {
            fuel,
            actual,
            modeled: modeled(fuel),
            rel_error: relative_error(actual, modeled(fuel)),
        })
        .collect()
}

fn relative_error(actual: f64, modeled: f64) -> f64 {
    if actual == 0.0 {
        0.0
    } else {
        (modeled - actual) / actual
    }
}
