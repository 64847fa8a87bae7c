use crate::core::econ::cash_flow::CashFlowItem;
use crate::core::solvers::roots_on_grid;
use crate::errors::InvalidInputError;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub const YEAR_COLUMN: &str = "Year";
pub const NET_CASH_COLUMN: &str = "Net Cash";

const IRR_XTOL: f64 = 1e-10;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CashFlowInputs {
    /// Years of operation after year 0
    pub duration: u32,
    /// Needed for the NPV, discounted payback and benefit/cost ratio
    #[serde(default)]
    pub discount_rate: Option<f64>,
    pub cash_flow_items: Vec<CashFlowItem>,
}

impl CashFlowInputs {
    pub fn validate(&self) -> Result<(), InvalidInputError> {
        if let Some(rate) = self.discount_rate {
            if !rate.is_finite() || rate <= -1.0 {
                return Err(InvalidInputError::field(
                    "discount_rate",
                    format!("{rate} must be a number greater than -1"),
                ));
            }
        }
        self.cash_flow_items
            .iter()
            .enumerate()
            .try_for_each(|(idx, item)| item.validate(&format!("cash_flow_items[{idx}]")))
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CashFlowAnalysis {
    /// "Year", one column per item and "Net Cash", each with a value for every year
    pub cash_flow_table: IndexMap<String, Vec<f64>>,
    pub irr: Option<f64>,
    pub npv: Option<f64>,
    /// Years
    pub simple_payback: Option<f64>,
    /// Years
    pub discounted_payback: Option<f64>,
    pub bc_ratio: Option<f64>,
}

/// Tabulates the cash flows and calculates the investment measures. No value in the
/// result is NaN or infinite; measures that cannot be determined are `None`.
pub fn analyze_cash_flow(inputs: &CashFlowInputs) -> Result<CashFlowAnalysis, InvalidInputError> {
    inputs.validate()?;

    let duration = inputs.duration;
    let mut cash_flow_table = IndexMap::new();
    cash_flow_table.insert(
        YEAR_COLUMN.to_string(),
        (0..=duration).map(f64::from).collect(),
    );

    let mut net_cash = vec![0.0; duration as usize + 1];
    for item in &inputs.cash_flow_items {
        let flow = item.cash_flow(duration);
        for (net, cash) in net_cash.iter_mut().zip(&flow) {
            *net += cash;
        }
        let label = unique_label(&cash_flow_table, item.label());
        cash_flow_table.insert(label, flow);
    }

    let irr = irr(&net_cash);
    let (npv, discounted_payback, bc_ratio) = match inputs.discount_rate {
        Some(rate) => {
            let discounted = discounted(&net_cash, rate);
            let npv = discounted.iter().sum::<f64>();
            let initial = net_cash.first().copied().unwrap_or(0.0);
            let bc_ratio = (initial < 0.0).then(|| {
                let cost = -initial;
                (npv + cost) / cost
            });
            (Some(npv), payback(&discounted), bc_ratio)
        }
        None => (None, None, None),
    };
    let simple_payback = payback(&net_cash);

    cash_flow_table.insert(NET_CASH_COLUMN.to_string(), net_cash);

    Ok(CashFlowAnalysis {
        cash_flow_table,
        irr: finite_or_none(irr),
        npv: finite_or_none(npv),
        simple_payback: finite_or_none(simple_payback),
        discounted_payback: finite_or_none(discounted_payback),
        bc_ratio: finite_or_none(bc_ratio),
    })
}

fn unique_label(table: &IndexMap<String, Vec<f64>>, label: &str) -> String {
    let reserved = |candidate: &str| table.contains_key(candidate) || candidate == NET_CASH_COLUMN;
    if !reserved(label) {
        return label.to_string();
    }
    (2..)
        .map(|n| format!("{label} ({n})"))
        .find(|candidate| !reserved(candidate))
        .unwrap_or_else(|| label.to_string())
}

fn discounted(cash: &[f64], rate: f64) -> Vec<f64> {
    cash.iter()
        .enumerate()
        .map(|(year, value)| value / (1.0 + rate).powi(year as i32))
        .collect()
}

pub fn npv(cash: &[f64], rate: f64) -> f64 {
    discounted(cash, rate).iter().sum()
}

/// The internal rate of return: the rate closest to zero at which the NPV of `cash` is
/// zero, searching rates from -99% to 1000%.
pub fn irr(cash: &[f64]) -> Option<f64> {
    if cash.iter().all(|value| *value == 0.0) {
        return None;
    }
    let grid = irr_search_grid();

    roots_on_grid(|rate| npv(cash, rate), &grid, IRR_XTOL)
        .into_iter()
        .filter(|rate| rate.is_finite())
        .min_by(|a, b| a.abs().total_cmp(&b.abs()))
}

fn irr_search_grid() -> Vec<f64> {
    // finer steps near zero, where realistic rates of return lie
    let fine = (-99..100).map(|pct| pct as f64 / 100.0);
    let coarse = (10..=100).map(|tenths| tenths as f64 / 10.0);
    fine.chain(coarse).dedup().collect()
}

/// Years until the cumulative cash first becomes non-negative for good, interpolating
/// within the year it happens. `Some(0.0)` if the cumulative cash is never negative, which
/// includes all-zero cash, and `None` if it ends negative or there is no cash at all.
pub fn payback(cash: &[f64]) -> Option<f64> {
    let cumulative = cash
        .iter()
        .scan(0.0, |total, value| {
            *total += value;
            Some(*total)
        })
        .collect::<Vec<_>>();

    let final_value = *cumulative.last()?;
    if cumulative.iter().all(|total| *total >= 0.0) {
        return Some(0.0);
    }
    if final_value < 0.0 {
        return None;
    }

    let (year, (before, after)) = cumulative
        .iter()
        .tuple_windows()
        .enumerate()
        .filter(|(_, (before, after))| **before < 0.0 && **after >= 0.0)
        .last()?;

    Some(year as f64 + -before / (after - before))
}

fn finite_or_none(value: Option<f64>) -> Option<f64> {
    value.filter(|value| value.is_finite())
}
