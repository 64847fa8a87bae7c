//! The service boundary: runs each calculation against the current reference snapshot and
//! turns any failure into an `ErrorResponse` a caller can show.
use crate::core::econ::{analyze_cash_flow, CashFlowAnalysis, CashFlowInputs};
use crate::core::energy_model::model_building;
use crate::core::fit_cache::FitCache;
use crate::core::fit_model::fit_model;
use crate::core::retrofit_analysis::analyze_retrofit;
use crate::errors::{CalculationError, HpCalcError};
use crate::input::{
    BuildingDescription, EnergyModelFitInputs, FuelPriceRequest, RetrofitAnalysisInputs,
};
use crate::library::{Choice, Library, ReferenceData};
use crate::output::{
    DetailedModelResults, EnergyModelFitResults, FuelPrice, RetrofitAnalysisResults,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

const INTERNAL_ERROR_MESSAGE: &str =
    "An unexpected error occurred during the calculation. It has been reported.";

/// Receives the full detail of every unexpected failure seen at the boundary.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, operation: &str, error: &HpCalcError, at: DateTime<Utc>);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, operation: &str, error: &HpCalcError, at: DateTime<Utc>) {
        error!(operation, %at, "{error:?}");
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    InternalError,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
    /// The offending input field, for invalid input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    fn from_error(error: &HpCalcError, timestamp: DateTime<Utc>) -> Self {
        match error {
            HpCalcError::InvalidRequest(input_error) => Self {
                kind: ErrorKind::InvalidInput,
                message: input_error.to_string(),
                field: Some(input_error.field_name().to_string()),
                timestamp,
            },
            _ => Self {
                kind: ErrorKind::InternalError,
                message: INTERNAL_ERROR_MESSAGE.to_string(),
                field: None,
                timestamp,
            },
        }
    }
}

pub struct Calculator {
    library: Library,
    fit_cache: FitCache,
    reporter: Box<dyn ErrorReporter>,
}

impl Calculator {
    pub fn new(library: Library) -> Self {
        Self {
            library,
            fit_cache: FitCache::default(),
            reporter: Box::new(TracingErrorReporter),
        }
    }

    pub fn with_fit_cache(mut self, fit_cache: FitCache) -> Self {
        self.fit_cache = fit_cache;
        self
    }

    pub fn with_error_reporter(mut self, reporter: impl ErrorReporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Swaps in fresh reference data, returning its version. Cached fits were keyed on the
    /// old version and can never be hit again, so they are dropped.
    pub fn refresh_library(&self) -> anyhow::Result<u64> {
        let version = self.library.refresh()?.version();
        self.fit_cache.clear();
        Ok(version)
    }

    pub fn cities(&self) -> Result<Vec<Choice>, ErrorResponse> {
        self.run("cities", |reference| Ok(reference.cities()))
    }

    pub fn utilities(&self) -> Result<Vec<Choice>, ErrorResponse> {
        self.run("utilities", |reference| Ok(reference.utilities()))
    }

    pub fn fuels(&self) -> Result<Vec<Choice>, ErrorResponse> {
        self.run("fuels", |reference| Ok(reference.fuels()))
    }

    pub fn fuel_price(&self, request: &FuelPriceRequest) -> Result<FuelPrice, ErrorResponse> {
        self.run("fuel_price", |reference| {
            let price = reference.fuel_price(request.fuel, request.city_id)?;
            Ok(FuelPrice {
                fuel: request.fuel,
                city_id: request.city_id,
                price,
                unit: reference.fuel(request.fuel)?.unit.clone(),
            })
        })
    }

    pub fn energy_model(
        &self,
        building: &BuildingDescription,
    ) -> Result<DetailedModelResults, ErrorResponse> {
        self.run("energy_model", |reference| {
            Ok(model_building(building, reference)?)
        })
    }

    pub fn fit_model(
        &self,
        inputs: &EnergyModelFitInputs,
    ) -> Result<Arc<EnergyModelFitResults>, ErrorResponse> {
        self.run("fit_model", |reference| {
            let key = FitCache::key(inputs, reference.version())
                .map_err(|e| HpCalcError::from(CalculationError::new(e)))?;
            self.fit_cache
                .get_or_try_insert_with(key, || fit_model(inputs, reference))
        })
    }

    pub fn analyze_retrofit(
        &self,
        inputs: &RetrofitAnalysisInputs,
    ) -> Result<RetrofitAnalysisResults, ErrorResponse> {
        self.run("analyze_retrofit", |reference| analyze_retrofit(inputs, reference))
    }

    pub fn analyze_cash_flow(
        &self,
        inputs: &CashFlowInputs,
    ) -> Result<CashFlowAnalysis, ErrorResponse> {
        self.run("analyze_cash_flow", |_| Ok(analyze_cash_flow(inputs)?))
    }

    fn run<T>(
        &self,
        operation: &str,
        calculation: impl FnOnce(&ReferenceData) -> Result<T, HpCalcError>,
    ) -> Result<T, ErrorResponse> {
        let reference = self.library.snapshot();
        let outcome = catch_unwind(AssertUnwindSafe(|| calculation(reference.as_ref())))
            .unwrap_or_else(|panic| Err(HpCalcError::PanicInCalculation(panic_message(panic))));

        outcome.map_err(|error| {
            let now = Utc::now();
            if error.is_invalid_request() {
                debug!(operation, "{error}");
            } else {
                self.reporter.report(operation, &error, now);
            }
            ErrorResponse::from_error(&error, now)
        })
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}
