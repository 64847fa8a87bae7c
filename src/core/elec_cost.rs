/// Monthly electric bills under a block rate schedule, with the Alaska Power Cost
/// Equalization (PCE) credit.
use crate::input::EnergyPrices;
use crate::library::{RateBlock, Utility};
use serde::Serialize;

/// Components of one monthly bill, $
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ElecBill {
    pub energy_charge: f64,
    pub demand_charge: f64,
    pub pce_credit: f64,
    pub customer_charge: f64,
    pub sales_tax: f64,
    pub total: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ElecCostCalc {
    utility: Utility,
    sales_tax: f64,
    pce_limit: Option<f64>,
}

impl ElecCostCalc {
    /// `pce_limit` is the monthly kWh eligible for PCE; `None` means no limit.
    pub fn new(utility: Utility, sales_tax: f64, pce_limit: Option<f64>) -> Self {
        Self {
            utility,
            sales_tax,
            pce_limit,
        }
    }

    /// Applies the building's rate, PCE, customer charge and CO2 overrides to a copy of
    /// `utility`.
    pub fn for_building(utility: &Utility, prices: &EnergyPrices, sales_tax: f64) -> Self {
        let mut utility = utility.clone();
        if let Some(rate) = prices.elec_rate_override {
            utility.blocks = vec![RateBlock {
                limit: None,
                rate,
            }];
            // the override rate already includes any demand charge
            utility.demand_charge = Some(0.0);
        }
        if let Some(pce) = prices.pce_rate_override {
            utility.pce = Some(pce);
        }
        if let Some(customer_chg) = prices.customer_charge_override {
            utility.customer_chg = Some(customer_chg);
        }
        if let Some(co2) = prices.co2_lbs_per_kwh_override {
            utility.co2 = Some(co2);
        }

        Self::new(utility, sales_tax, prices.pce_limit)
    }

    /// lbs of CO2 per kWh, zero if unknown
    pub fn co2_lbs_per_kwh(&self) -> f64 {
        self.utility.co2.unwrap_or(0.0)
    }

    pub fn monthly_cost(&self, kwh: f64, demand_kw: f64) -> f64 {
        self.monthly_bill(kwh, demand_kw).total
    }

    /// Net negative use (solar exceeding load) is billed as zero energy.
    pub fn monthly_bill(&self, kwh: f64, demand_kw: f64) -> ElecBill {
        let kwh = kwh.max(0.0);

        let energy_charge = self.energy_charge(kwh);
        let demand_charge = demand_kw.max(0.0) * self.utility.demand_charge.unwrap_or(0.0);
        let pce_kwh = match self.pce_limit {
            Some(limit) => kwh.min(limit.max(0.0)),
            None => kwh,
        };
        let pce_credit = pce_kwh * self.utility.pce.unwrap_or(0.0);
        let customer_charge = self.utility.customer_chg.unwrap_or(0.0);

        let pre_tax = energy_charge + demand_charge - pce_credit + customer_charge;
        let sales_tax = pre_tax * self.sales_tax;

        ElecBill {
            energy_charge,
            demand_charge,
            pce_credit,
            customer_charge,
            sales_tax,
            total: pre_tax + sales_tax,
        }
    }

    fn energy_charge(&self, kwh: f64) -> f64 {
        let mut charge = 0.0;
        let mut block_start = 0.0;
        let mut last_rate = 0.0;
        for block in &self.utility.blocks {
            let block_end = block.limit.unwrap_or(f64::INFINITY);
            let kwh_in_block = (kwh.min(block_end) - block_start).max(0.0);
            charge += kwh_in_block * block.rate;
            last_rate = block.rate;
            if kwh <= block_end {
                return charge;
            }
            block_start = block_end;
        }

        // schedules whose final block has a limit continue at the final rate
        charge + (kwh - block_start).max(0.0) * last_rate
    }
}
