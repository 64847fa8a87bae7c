pub mod aggregator;
pub mod dict2d;
pub mod econ;
pub mod elec_cost;
pub mod energy_model;
pub mod fit_cache;
pub mod fit_model;
pub mod heat_pump_performance;
pub mod hspf_convert;
pub mod interp;
pub mod retrofit_analysis;
pub(crate) mod solvers;
pub mod units;
