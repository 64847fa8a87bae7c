/// COP and maximum output capacity of a heat pump as a function of outdoor air temperature.
use crate::core::hspf_convert::convert_to_hspf;
use crate::core::interp::interp;
use crate::errors::InvalidInputError;
use crate::input::{HeatPump, HeatPumpSource};

// Air-source COP vs. outdoor temperature (deg F) averaged from field studies, with COPs
// derated by 0.9 and a shallower low-temperature drop-off taken from cold chamber testing.
const TEMPS_FIT: [f64; 21] = [
    -20.0, -14.0, -10.0, -6.2, -1.9, 2.0, 6.0, 10.8, 14.2, 18.1, 22.0, 25.7, 29.9, 34.5, 38.1,
    41.8, 46.0, 50.0, 54.0, 58.0, 61.0,
];
const COPS_FIT: [f64; 21] = [
    1.06, 1.21, 1.30, 1.39, 1.49, 1.58, 1.70, 1.84, 1.93, 2.03, 2.13, 2.21, 2.25, 2.44, 2.59,
    2.70, 2.79, 2.91, 2.99, 3.09, 3.16,
];

/// Average original-HSPF of the units behind the field study curve.
const BASE_HSPF: f64 = 11.33;

/// The field studies were done with a 70 F indoor temperature.
const FIELD_STUDY_SETPOINT: f64 = 70.0;

/// Ground temperature minus entering water temperature, deg F
const GROUND_EWT_DELTA_T: f64 = 6.0;

/// Fractional COP change per deg F of entering water temperature
const EWT_COP_ADJ: f64 = 0.0113;

/// Matched arrays of outdoor temperature (deg F), COP and maximum output (Btu/hour).
#[derive(Clone, Debug, PartialEq)]
pub struct PerformanceCurve {
    temps: Vec<f64>,
    cops: Vec<f64>,
    max_outputs: Vec<f64>,
}

impl PerformanceCurve {
    pub fn cop_at(&self, outdoor_temp: f64) -> f64 {
        interp(outdoor_temp, &self.temps, &self.cops)
    }

    pub fn max_output_at(&self, outdoor_temp: f64) -> f64 {
        interp(outdoor_temp, &self.temps, &self.max_outputs)
    }

    pub fn temps(&self) -> &[f64] {
        &self.temps
    }
}

/// Builds the performance curve for a heat pump. `ground_temp` is only used by ground and
/// water source units.
pub fn performance_curve(
    heat_pump: &HeatPump,
    indoor_heat_setpoint: f64,
    ground_temp: f64,
) -> Result<PerformanceCurve, InvalidInputError> {
    match heat_pump.source_type {
        HeatPumpSource::Air => {
            let max_out_5f = heat_pump.max_out_5f.ok_or_else(|| {
                InvalidInputError::field("heat_pump.max_out_5f", "a value is required")
            })?;
            let hspf = heat_pump.hspf.map(|hspf| convert_to_hspf(hspf, heat_pump.hspf_type));
            air_source_performance(hspf, heat_pump.cop_32f, max_out_5f, indoor_heat_setpoint)
        }
        HeatPumpSource::Ground | HeatPumpSource::Water => {
            let cop_32f = heat_pump.cop_32f.ok_or_else(|| {
                InvalidInputError::field("heat_pump.cop_32f", "a value is required")
            })?;
            let max_out_32f = heat_pump.max_out_32f.ok_or_else(|| {
                InvalidInputError::field("heat_pump.max_out_32f", "a value is required")
            })?;
            Ok(ground_source_performance(
                cop_32f,
                max_out_32f,
                indoor_heat_setpoint,
                ground_temp,
            ))
        }
    }
}

/// `hspf` is an original-HSPF rating; when absent, the curve is scaled to match `cop_32f`.
fn air_source_performance(
    hspf: Option<f64>,
    cop_32f: Option<f64>,
    max_out_5f: f64,
    indoor_heat_setpoint: f64,
) -> Result<PerformanceCurve, InvalidInputError> {
    // HSPF correlates weakly with field performance, so its effect is dampened
    let cop_adj_mult = match (hspf, cop_32f) {
        (Some(hspf), _) => (hspf / BASE_HSPF).sqrt(),
        (None, Some(cop_32f)) => cop_32f / interp(32.0, &TEMPS_FIT, &COPS_FIT),
        (None, None) => {
            return Err(InvalidInputError::field(
                "heat_pump.hspf",
                "an air-source heat pump needs either an HSPF or a COP at 32 F",
            ))
        }
    };

    let cops = COPS_FIT.iter().map(|cop| cop * cop_adj_mult).collect::<Vec<_>>();

    // the rated 5 F capacity assumes a 70 F indoor temperature, so take the reference COP
    // from the unshifted temperatures
    let cop_5f = interp(5.0, &TEMPS_FIT, &cops);
    let max_outputs = cops.iter().map(|cop| cop / cop_5f * max_out_5f).collect();

    let temps = TEMPS_FIT
        .iter()
        .map(|t| t + (indoor_heat_setpoint - FIELD_STUDY_SETPOINT))
        .collect();

    Ok(PerformanceCurve {
        temps,
        cops,
        max_outputs,
    })
}

/// COP and capacity are taken as independent of outdoor temperature and set by the ground
/// temperature instead.
fn ground_source_performance(
    cop_32f: f64,
    max_out_32f: f64,
    indoor_heat_setpoint: f64,
    ground_temp: f64,
) -> PerformanceCurve {
    let ewt = ground_temp - GROUND_EWT_DELTA_T;
    let cop = cop_32f * (1.0 + EWT_COP_ADJ * (ewt - 32.0 + FIELD_STUDY_SETPOINT - indoor_heat_setpoint));
    let max_output = max_out_32f * cop / cop_32f;

    PerformanceCurve {
        temps: TEMPS_FIT.to_vec(),
        cops: vec![cop; TEMPS_FIT.len()],
        max_outputs: vec![max_output; TEMPS_FIT.len()],
    }
}
