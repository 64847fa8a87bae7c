use roots::{find_root_brent, SimpleConvergency};

/// Finds a root of `func` between `a` and `b`, which must bracket a sign change.
pub(crate) fn brent_root(func: impl Fn(f64) -> f64, a: f64, b: f64, xtol: f64) -> anyhow::Result<f64> {
    let mut convergency = SimpleConvergency {
        eps: xtol,
        max_iter: 100,
    };

    find_root_brent::<f64, _>(a, b, func, &mut convergency).map_err(|e| anyhow::anyhow!(e))
}

/// Every root of `func` that can be located by scanning the ascending `grid` for sign
/// changes, in ascending order. Grid points where `func` is exactly zero are roots too.
pub(crate) fn roots_on_grid(func: impl Fn(f64) -> f64, grid: &[f64], xtol: f64) -> Vec<f64> {
    let values = grid.iter().map(|x| func(*x)).collect::<Vec<_>>();
    let mut roots = vec![];

    for (idx, (x, value)) in grid.iter().zip(&values).enumerate() {
        if *value == 0.0 {
            roots.push(*x);
            continue;
        }
        let Some((next_x, next_value)) = grid.get(idx + 1).zip(values.get(idx + 1)) else {
            break;
        };
        if !value.is_finite() || !next_value.is_finite() || *next_value == 0.0 {
            continue;
        }
        if value.signum() != next_value.signum() {
            if let Ok(root) = brent_root(&func, *x, *next_x, xtol) {
                roots.push(root);
            }
        }
    }

    roots
}
