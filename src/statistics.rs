/// A simple statistics module with utility functions such as the calculation of quantiles.
use statrs::statistics::{Data, OrderStatistics};

/// The `tau` quantile (0.0 - 1.0) of the given values, interpolating linearly between the
/// order statistics either side of `(n - 1) * tau` (Hyndman & Fan type 7).
pub fn quantile(numbers: &[f64], tau: f64) -> f64 {
    if numbers.is_empty() {
        return f64::NAN;
    }
    let mut data = Data::new(numbers.to_vec());

    let position = (numbers.len() - 1) as f64 * tau.clamp(0.0, 1.0);
    let lower = position.floor();
    let fraction = position - lower;
    // order statistics are 1-based
    let below = data.order_statistic(lower as usize + 1);
    if fraction == 0.0 {
        return below;
    }
    let above = data.order_statistic(lower as usize + 2);

    below + fraction * (above - below)
}
