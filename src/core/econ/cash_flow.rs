/// Year-indexed cash flows. Year 0 is the time of the investment; later years are the
/// ends of each year of operation.
use crate::errors::InvalidInputError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CashFlowItem {
    /// A single amount in year 0.
    InitialAmount { label: String, amount: f64 },
    /// `amount` in year 1, changing by `escalation_rate` each following year. Nothing
    /// flows after `end_year`, if given.
    EscalatingFlow {
        label: String,
        amount: f64,
        #[serde(default)]
        escalation_rate: f64,
        #[serde(default)]
        end_year: Option<u32>,
    },
    /// `amount` times a multiplier for each year starting at year 0. The last multiplier
    /// continues for any years beyond the end of the pattern.
    PatternFlow {
        label: String,
        amount: f64,
        pattern: Vec<f64>,
    },
    /// `amount` every `period` years (years `period`, `2 * period`, ...), escalating from
    /// the value it would have in year 0.
    PeriodicAmount {
        label: String,
        amount: f64,
        period: u32,
        #[serde(default)]
        escalation_rate: f64,
    },
}

impl CashFlowItem {
    pub fn label(&self) -> &str {
        match self {
            CashFlowItem::InitialAmount { label, .. }
            | CashFlowItem::EscalatingFlow { label, .. }
            | CashFlowItem::PatternFlow { label, .. }
            | CashFlowItem::PeriodicAmount { label, .. } => label,
        }
    }

    pub(crate) fn validate(&self, field: &str) -> Result<(), InvalidInputError> {
        let finite = |name: &str, value: f64| {
            if value.is_finite() {
                Ok(())
            } else {
                Err(InvalidInputError::field(
                    format!("{field}.{name}"),
                    format!("{value} is not a finite number"),
                ))
            }
        };
        let rate = |value: f64| {
            finite("escalation_rate", value)?;
            if value > -1.0 {
                Ok(())
            } else {
                Err(InvalidInputError::field(
                    format!("{field}.escalation_rate"),
                    "escalation rate must be greater than -1",
                ))
            }
        };

        match self {
            CashFlowItem::InitialAmount { amount, .. } => finite("amount", *amount),
            CashFlowItem::EscalatingFlow {
                amount,
                escalation_rate,
                ..
            } => {
                finite("amount", *amount)?;
                rate(*escalation_rate)
            }
            CashFlowItem::PatternFlow {
                amount, pattern, ..
            } => {
                finite("amount", *amount)?;
                pattern.iter().try_for_each(|mult| finite("pattern", *mult))
            }
            CashFlowItem::PeriodicAmount {
                amount,
                period,
                escalation_rate,
                ..
            } => {
                finite("amount", *amount)?;
                rate(*escalation_rate)?;
                if *period == 0 {
                    return Err(InvalidInputError::field(
                        format!("{field}.period"),
                        "period must be at least one year",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Cash in each of years 0 to `duration` inclusive.
    pub fn cash_flow(&self, duration: u32) -> Vec<f64> {
        let years = 0..=duration;
        match self {
            CashFlowItem::InitialAmount { amount, .. } => years
                .map(|year| if year == 0 { *amount } else { 0.0 })
                .collect(),
            CashFlowItem::EscalatingFlow {
                amount,
                escalation_rate,
                end_year,
                ..
            } => years
                .map(|year| match year {
                    0 => 0.0,
                    year if end_year.is_some_and(|end| year > end) => 0.0,
                    year => amount * (1.0 + escalation_rate).powi(year as i32 - 1),
                })
                .collect(),
            CashFlowItem::PatternFlow {
                amount, pattern, ..
            } => years
                .map(|year| {
                    let mult = pattern
                        .get(year as usize)
                        .or(pattern.last())
                        .copied()
                        .unwrap_or(0.0);
                    amount * mult
                })
                .collect(),
            CashFlowItem::PeriodicAmount {
                amount,
                period,
                escalation_rate,
                ..
            } => years
                .map(|year| {
                    if year > 0 && *period > 0 && year % period == 0 {
                        amount * (1.0 + escalation_rate).powi(year as i32)
                    } else {
                        0.0
                    }
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    #[case(CashFlowItem::InitialAmount { label: "Cost".into(), amount: -5000.0 })]
    #[case(CashFlowItem::EscalatingFlow { label: "Savings".into(), amount: 300.0, escalation_rate: 0.03, end_year: None })]
    #[case(CashFlowItem::PatternFlow { label: "Fuel".into(), amount: 10.0, pattern: vec![0.0, 1.0] })]
    #[case(CashFlowItem::PeriodicAmount { label: "Overhaul".into(), amount: -800.0, period: 5, escalation_rate: 0.0 })]
    fn should_cover_years_zero_to_duration(#[case] item: CashFlowItem) {
        assert_eq!(item.cash_flow(12).len(), 13);
        assert_eq!(item.cash_flow(0).len(), 1);
    }

    #[test]
    fn should_put_initial_amount_in_year_zero() {
        let item = CashFlowItem::InitialAmount {
            label: "Retrofit Cost".into(),
            amount: -5000.0,
        };
        assert_eq!(item.cash_flow(3), vec![-5000.0, 0.0, 0.0, 0.0]);
        assert_eq!(item.label(), "Retrofit Cost");
    }

    #[test]
    fn should_hold_unescalated_flow_constant_from_year_one() {
        let item = CashFlowItem::EscalatingFlow {
            label: "Savings".into(),
            amount: 250.0,
            escalation_rate: 0.0,
            end_year: None,
        };
        assert_eq!(item.cash_flow(4), vec![0.0, 250.0, 250.0, 250.0, 250.0]);
    }

    #[test]
    fn should_escalate_and_end_flow() {
        let item = CashFlowItem::EscalatingFlow {
            label: "Loan Payment".into(),
            amount: 100.0,
            escalation_rate: 0.1,
            end_year: Some(2),
        };
        let flow = item.cash_flow(4);
        assert_eq!(flow[0], 0.0);
        assert_relative_eq!(flow[1], 100.0, max_relative = 1e-12);
        assert_relative_eq!(flow[2], 110.0, max_relative = 1e-12);
        assert_eq!(&flow[3..], &[0.0, 0.0]);
    }

    #[test]
    fn should_extend_pattern_with_last_value() {
        let item = CashFlowItem::PatternFlow {
            label: "Electricity Cost".into(),
            amount: -100.0,
            pattern: vec![0.0, 1.0, 1.5],
        };
        assert_eq!(item.cash_flow(5), vec![0.0, -100.0, -150.0, -150.0, -150.0, -150.0]);
    }

    #[test]
    fn should_truncate_pattern_to_duration() {
        let item = CashFlowItem::PatternFlow {
            label: "Electricity Cost".into(),
            amount: 2.0,
            pattern: vec![1.0, 2.0, 3.0, 4.0, 5.0],
        };
        assert_eq!(item.cash_flow(2), vec![2.0, 4.0, 6.0]);

        let empty = CashFlowItem::PatternFlow {
            label: "Nothing".into(),
            amount: 2.0,
            pattern: vec![],
        };
        assert_eq!(empty.cash_flow(2), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn should_repeat_periodic_amount() {
        let item = CashFlowItem::PeriodicAmount {
            label: "Overhaul".into(),
            amount: -800.0,
            period: 3,
            escalation_rate: 0.0,
        };
        assert_eq!(
            item.cash_flow(7),
            vec![0.0, 0.0, 0.0, -800.0, 0.0, 0.0, -800.0, 0.0]
        );
    }

    #[test]
    fn should_reject_zero_period() {
        let item = CashFlowItem::PeriodicAmount {
            label: "Overhaul".into(),
            amount: -800.0,
            period: 0,
            escalation_rate: 0.0,
        };
        assert_eq!(
            item.validate("cash_flow_items[2]").unwrap_err().field_name(),
            "cash_flow_items[2].period"
        );
    }

    #[test]
    fn should_deserialize_tagged_items() {
        let item: CashFlowItem = serde_json::from_str(
            r#"{"kind": "escalating_flow", "label": "Fuel Cost", "amount": 120.0, "escalation_rate": 0.033}"#,
        )
        .unwrap();
        assert_eq!(
            item,
            CashFlowItem::EscalatingFlow {
                label: "Fuel Cost".into(),
                amount: 120.0,
                escalation_rate: 0.033,
                end_year: None,
            }
        );
    }
}
