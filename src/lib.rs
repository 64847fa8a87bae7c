#![allow(clippy::too_many_arguments)]

pub mod calculator;
pub mod core;
pub mod errors;
pub mod input;
pub mod library;
pub mod output;
pub mod read_weather_file;
mod simulation_time;
mod statistics;

#[cfg(test)]
mod tests;

pub use crate::calculator::{Calculator, ErrorKind, ErrorReporter, ErrorResponse, TracingErrorReporter};
pub use crate::errors::{HpCalcError, InvalidInputError};
pub use crate::library::{FileReferenceSource, Library, ReferenceData, ReferenceDataSource};

use crate::input::ingest_request;
use crate::output::{write_json, Output};
use std::io::Read;
use strum_macros::{Display, EnumString};
use tracing::info;

/// The calculations and reference-data queries a request can ask for.
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, PartialEq)]
#[strum(serialize_all = "kebab-case")]
pub enum Operation {
    EnergyModel,
    FitModel,
    AnalyzeRetrofit,
    AnalyzeCashFlow,
    Cities,
    Utilities,
    Fuels,
    FuelPrice,
}

/// Reads a JSON request for `operation`, runs it and writes either the result or the
/// `ErrorResponse` to `output`. A request that cannot be parsed is an `Err`; a calculation
/// that fails returns its `ErrorResponse` after writing it. `input` is not read by the
/// listing queries.
pub fn run_request(
    calculator: &Calculator,
    operation: Operation,
    input: impl Read,
    output: &impl Output,
) -> anyhow::Result<Option<ErrorResponse>> {
    info!(%operation, "Running request");

    let outcome = match operation {
        Operation::EnergyModel => calculator
            .energy_model(&ingest_request(input)?)
            .map(|results| write_json(output, &results)),
        Operation::FitModel => calculator
            .fit_model(&ingest_request(input)?)
            .map(|results| write_json(output, results.as_ref())),
        Operation::AnalyzeRetrofit => calculator
            .analyze_retrofit(&ingest_request(input)?)
            .map(|results| write_json(output, &results)),
        Operation::AnalyzeCashFlow => calculator
            .analyze_cash_flow(&ingest_request(input)?)
            .map(|results| write_json(output, &results)),
        Operation::Cities => calculator.cities().map(|cities| write_json(output, &cities)),
        Operation::Utilities => calculator
            .utilities()
            .map(|utilities| write_json(output, &utilities)),
        Operation::Fuels => calculator.fuels().map(|fuels| write_json(output, &fuels)),
        Operation::FuelPrice => calculator
            .fuel_price(&ingest_request(input)?)
            .map(|price| write_json(output, &price)),
    };

    match outcome {
        Ok(written) => {
            written?;
            Ok(None)
        }
        Err(response) => {
            write_json(output, &response)?;
            Ok(Some(response))
        }
    }
}
