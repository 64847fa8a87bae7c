use crate::input::Fuel;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HpCalcError {
    #[error("Request was considered invalid due to error: {0}")]
    InvalidRequest(#[from] InvalidInputError),
    #[error("Error identified during calculation: {0}")]
    FailureInCalculation(#[from] CalculationError),
    #[error("Uncaught error during calculation: {0}")]
    PanicInCalculation(String),
}

impl HpCalcError {
    /// Whether the error was caused by the caller's input rather than by the engine.
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, HpCalcError::InvalidRequest(_))
    }
}

/// An input problem, always naming the offending field so callers can report it back.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum InvalidInputError {
    #[error("{field}: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("{field}: no {kind} exists with id {id}")]
    UnknownReference {
        field: String,
        kind: &'static str,
        id: String,
    },
    #[error("energy_prices.fuel_price_overrides: no price for {fuel} is available in city '{city}'")]
    MissingFuelPrice { fuel: Fuel, city: String },
}

impl InvalidInputError {
    pub(crate) fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown(field: impl Into<String>, kind: &'static str, id: impl ToString) -> Self {
        Self::UnknownReference {
            field: field.into(),
            kind,
            id: id.to_string(),
        }
    }

    pub fn field_name(&self) -> &str {
        match self {
            InvalidInputError::InvalidField { field, .. } => field,
            InvalidInputError::UnknownReference { field, .. } => field,
            InvalidInputError::MissingFuelPrice { .. } => "energy_prices.fuel_price_overrides",
        }
    }
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct CalculationError {
    error: anyhow::Error,
}

impl CalculationError {
    pub(crate) fn new(error: anyhow::Error) -> Self {
        Self { error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    fn should_name_field_in_message() {
        let error = InvalidInputError::field("heat_pump.off_months", "month 13 is not in 1-12");
        assert_eq!(
            error.to_string(),
            "heat_pump.off_months: month 13 is not in 1-12"
        );
        assert_eq!(error.field_name(), "heat_pump.off_months");
    }

    #[rstest]
    fn should_wrap_input_errors_as_invalid_requests() {
        let error: HpCalcError = InvalidInputError::unknown("city_id", "city", 42).into();
        assert!(error.is_invalid_request());
        assert_eq!(
            error.to_string(),
            "Request was considered invalid due to error: city_id: no city exists with id 42"
        );
    }
}
