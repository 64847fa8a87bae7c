/// Energy, emissions and financial impact of a retrofit, from models of the building before
/// and after it.
use crate::core::econ::{analyze_cash_flow, CashFlowInputs, CashFlowItem};
use crate::core::energy_model::model_building;
use crate::errors::HpCalcError;
use crate::input::{prefix_field, Fuel, PriceForecast, RetrofitAnalysisInputs, RetrofitCost};
use crate::library::ReferenceData;
use crate::output::{
    DetailedModelResults, FuelChange, MiscRetrofitResults, RetrofitAnalysisResults,
};
use indexmap::IndexMap;
use tracing::debug;

/// Vehicle miles per lb of CO2, from the EPA greenhouse gas equivalencies calculator.
const DRIVING_MILES_PER_LB_CO2: f64 = 1396.0 / 1208.0;

pub fn co2_to_driving_miles(co2_lbs: f64) -> f64 {
    DRIVING_MILES_PER_LB_CO2 * co2_lbs
}

/// Annual payment (negative) that repays `principal` over `years` at `rate`.
pub fn loan_payment(rate: f64, years: u32, principal: f64) -> f64 {
    if years == 0 {
        return -principal;
    }
    let n = years as f64;
    if rate == 0.0 {
        return -principal / n;
    }
    let growth = (1.0 + rate).powf(n);
    -principal * rate * growth / (growth - 1.0)
}

pub fn analyze_retrofit(
    inputs: &RetrofitAnalysisInputs,
    reference: &ReferenceData,
) -> Result<RetrofitAnalysisResults, HpCalcError> {
    inputs.validate()?;

    let (base_case, with_retrofit) = rayon::join(
        || model_building(&inputs.pre_bldg, reference).map_err(|e| prefix_field("pre_bldg", e)),
        || model_building(&inputs.post_bldg, reference).map_err(|e| prefix_field("post_bldg", e)),
    );
    let (base_case, with_retrofit) = (base_case?, with_retrofit?);

    let fuel_change = fuel_change(&base_case, &with_retrofit);
    let misc = misc_results(inputs, &base_case, &with_retrofit, &fuel_change);

    let cash_flow_inputs = CashFlowInputs {
        duration: inputs.retrofit_cost.retrofit_life,
        discount_rate: Some(inputs.economic_inputs.discount_rate),
        cash_flow_items: cash_flow_items(inputs, &base_case, &with_retrofit),
    };
    debug!(items = cash_flow_inputs.cash_flow_items.len(), "Analyzing retrofit cash flow");
    let financial = analyze_cash_flow(&cash_flow_inputs)?;

    Ok(RetrofitAnalysisResults {
        misc,
        financial,
        base_case_detail: base_case,
        with_retrofit_detail: with_retrofit,
        fuel_change,
    })
}

/// Change in each fuel used before or after the retrofit.
fn fuel_change(base_case: &DetailedModelResults, with_retrofit: &DetailedModelResults) -> FuelChange {
    let base_units = base_case.annual_results.fuel_use_units.sum_key1();
    let retrofit_units = with_retrofit.annual_results.fuel_use_units.sum_key1();
    let base_cost = &base_case.annual_results.fuel_cost;
    let retrofit_cost = &with_retrofit.annual_results.fuel_cost;

    let mut fuels = base_units.keys().chain(retrofit_units.keys()).copied().collect::<Vec<Fuel>>();
    fuels.sort();
    fuels.dedup();

    let change = |before: &IndexMap<Fuel, f64>, after: &IndexMap<Fuel, f64>| {
        fuels
            .iter()
            .map(|fuel| {
                let delta = after.get(fuel).copied().unwrap_or(0.0) - before.get(fuel).copied().unwrap_or(0.0);
                (*fuel, delta)
            })
            .collect::<IndexMap<_, _>>()
    };

    FuelChange {
        units: change(&base_units, &retrofit_units),
        cost: change(base_cost, retrofit_cost),
    }
}

fn misc_results(
    inputs: &RetrofitAnalysisInputs,
    base_case: &DetailedModelResults,
    with_retrofit: &DetailedModelResults,
    fuel_change: &FuelChange,
) -> MiscRetrofitResults {
    let co2_lbs_saved = base_case.annual_results.co2_lbs - with_retrofit.annual_results.co2_lbs;
    let incremental = |fuel: Fuel| {
        let units = fuel_change.units.get(&fuel).copied().unwrap_or(0.0);
        let cost = fuel_change.cost.get(&fuel).copied().unwrap_or(0.0);
        (units != 0.0).then(|| cost / units).filter(|price| price.is_finite())
    };

    MiscRetrofitResults {
        co2_lbs_saved,
        co2_driving_miles_saved: co2_to_driving_miles(co2_lbs_saved),
        fuel_price_incremental: incremental(inputs.pre_bldg.conventional_heat.primary.heat_fuel_id),
        elec_rate_incremental: incremental(Fuel::Electricity),
    }
}

fn price_flow(label: &str, amount: f64, forecast: &PriceForecast) -> CashFlowItem {
    match forecast {
        PriceForecast::EscalationRate(rate) => CashFlowItem::EscalatingFlow {
            label: label.to_string(),
            amount,
            escalation_rate: *rate,
            end_year: None,
        },
        // the multipliers start at year 1
        PriceForecast::Multipliers(multipliers) => CashFlowItem::PatternFlow {
            label: label.to_string(),
            amount,
            pattern: std::iter::once(0.0).chain(multipliers.iter().copied()).collect(),
        },
    }
}

fn investment_items(cost: &RetrofitCost) -> Vec<CashFlowItem> {
    let loan_amount = cost.loan_amount();
    let mut items = vec![];

    match (loan_amount > 0.0, cost.loan_term, cost.loan_interest) {
        (true, Some(term), Some(interest)) => {
            items.push(CashFlowItem::InitialAmount {
                label: "Retrofit Downpayment".to_string(),
                amount: -(cost.capital_cost - loan_amount),
            });
            items.push(CashFlowItem::EscalatingFlow {
                label: "Loan Payment".to_string(),
                amount: loan_payment(interest, term, loan_amount),
                escalation_rate: 0.0,
                end_year: Some(term),
            });
        }
        _ => items.push(CashFlowItem::InitialAmount {
            label: "Retrofit Cost".to_string(),
            amount: -cost.capital_cost,
        }),
    }

    if cost.rebate_amount > 0.0 {
        items.push(CashFlowItem::InitialAmount {
            label: "Rebate".to_string(),
            amount: cost.rebate_amount,
        });
    }

    items
}

fn cash_flow_items(
    inputs: &RetrofitAnalysisInputs,
    base_case: &DetailedModelResults,
    with_retrofit: &DetailedModelResults,
) -> Vec<CashFlowItem> {
    let economics = &inputs.economic_inputs;
    let annual_cost = |results: &DetailedModelResults, fuel: Fuel| {
        results.annual_results.fuel_cost.get(&fuel).copied().unwrap_or(0.0)
    };

    let mut items = investment_items(&inputs.retrofit_cost);

    let elec_cost_chg =
        annual_cost(with_retrofit, Fuel::Electricity) - annual_cost(base_case, Fuel::Electricity);
    items.push(price_flow("Electricity Cost", -elec_cost_chg, &economics.elec_rate_forecast));

    let fuel_cost_chg = with_retrofit.annual_results.fuel_total_cost
        - base_case.annual_results.fuel_total_cost
        - elec_cost_chg;
    if fuel_cost_chg != 0.0 {
        items.push(price_flow("Fuel Cost", -fuel_cost_chg, &economics.fuel_price_forecast));
    }

    items.push(CashFlowItem::EscalatingFlow {
        label: "Operating Cost Change".to_string(),
        amount: -inputs.retrofit_cost.op_cost_chg,
        escalation_rate: economics.inflation_rate,
        end_year: None,
    });

    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn cost() -> RetrofitCost {
        RetrofitCost {
            capital_cost: 6000.0,
            rebate_amount: 0.0,
            retrofit_life: 14,
            op_cost_chg: 0.0,
            frac_financed: 0.0,
            loan_term: None,
            loan_interest: None,
        }
    }

    #[rstest]
    #[case(0.05, 10, 1000.0, -129.504575)]
    #[case(0.0, 4, 1000.0, -250.0)]
    #[case(0.1, 1, 1000.0, -1100.0)]
    fn should_calculate_annuity_payment(
        #[case] rate: f64,
        #[case] years: u32,
        #[case] principal: f64,
        #[case] expected: f64,
    ) {
        assert_relative_eq!(loan_payment(rate, years, principal), expected, max_relative = 1e-6);
    }

    #[test]
    fn should_convert_co2_to_miles() {
        assert_relative_eq!(co2_to_driving_miles(1208.0), 1396.0, max_relative = 1e-12);
    }

    #[rstest]
    fn should_pay_full_cost_up_front_without_loan(cost: RetrofitCost) {
        assert_eq!(
            investment_items(&cost),
            vec![CashFlowItem::InitialAmount {
                label: "Retrofit Cost".to_string(),
                amount: -6000.0
            }]
        );
    }

    #[rstest]
    fn should_finance_part_of_cost(mut cost: RetrofitCost) {
        cost.rebate_amount = 1000.0;
        cost.frac_financed = 0.5;
        cost.loan_term = Some(5);
        cost.loan_interest = Some(0.0);

        let items = investment_items(&cost);
        assert_eq!(items.len(), 3);
        assert_eq!(
            items[0],
            CashFlowItem::InitialAmount {
                label: "Retrofit Downpayment".to_string(),
                amount: -3500.0
            }
        );
        assert_eq!(
            items[1],
            CashFlowItem::EscalatingFlow {
                label: "Loan Payment".to_string(),
                amount: -500.0,
                escalation_rate: 0.0,
                end_year: Some(5)
            }
        );
        assert_eq!(items[2].label(), "Rebate");
        assert_eq!(items[1].cash_flow(7), vec![0.0, -500.0, -500.0, -500.0, -500.0, -500.0, 0.0, 0.0]);
    }

    #[test]
    fn should_prefix_multipliers_with_year_zero() {
        let item = price_flow(
            "Electricity Cost",
            -100.0,
            &PriceForecast::Multipliers(vec![1.0, 1.1]),
        );
        let flow = item.cash_flow(3);
        assert_eq!(flow[0], 0.0);
        assert_eq!(flow[1], -100.0);
        assert_relative_eq!(flow[2], -110.0, max_relative = 1e-12);
        assert_relative_eq!(flow[3], -110.0, max_relative = 1e-12);
    }
}
