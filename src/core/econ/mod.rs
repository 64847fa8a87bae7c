pub mod analysis;
pub mod cash_flow;

pub use analysis::{analyze_cash_flow, CashFlowAnalysis, CashFlowInputs};
pub use cash_flow::CashFlowItem;
