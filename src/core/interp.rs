/// Piecewise linear interpolation of `x` over the points `(xs, ys)`, where `xs` is increasing.
/// Values of `x` outside the range of `xs` take the first or last `ys` value.
pub fn interp(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    let n = xs.len().min(ys.len());
    if n == 0 {
        return f64::NAN;
    }
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }

    // first index with xs[i] > x; guaranteed to be in 1..n by the checks above
    let upper = xs[..n].partition_point(|&xp| xp <= x);
    let lower = upper - 1;
    let (x0, x1, y0, y1) = (xs[lower], xs[upper], ys[lower], ys[upper]);

    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}
