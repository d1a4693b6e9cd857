//! Quadrature rules for the one-dimensional domain `[-1, 1]`.

use crate::{Error, Rule};
use std::f64::consts::PI;

/// Legendre polynomial `p_n` and its predecessor `p_{n - 1}` at a point.
///
/// The derivative formula divides by `x^2 - 1`, so it is only valid in the open interval (-1, 1).
#[derive(Debug, Default)]
struct LegendreRecurrence {
    n: usize,
    x: f64,
    p_n: f64,
    p_n_minus_1: f64,
}

impl LegendreRecurrence {
    fn evaluate(n: usize, x: f64) -> Self {
        // m P_m(x) = (2m - 1) x P_{m - 1}(x) - (m - 1) P_{m - 2}(x)
        let mut p_n = 1.0;
        let mut p_n_minus_1 = 0.0;
        for m in 1..=n {
            let m = m as f64;
            let p_n_minus_2 = p_n_minus_1;
            p_n_minus_1 = p_n;
            p_n = ((2.0 * m - 1.0) * x * p_n_minus_1 - (m - 1.0) * p_n_minus_2) / m;
        }

        Self {
            n,
            x,
            p_n,
            p_n_minus_1,
        }
    }

    fn value(&self) -> f64 {
        self.p_n
    }

    fn derivative(&self) -> f64 {
        // dp_n/dx = n (x p_n - p_{n - 1}) / (x^2 - 1)
        let n = self.n as f64;
        n * (self.x * self.p_n - self.p_n_minus_1) / (self.x * self.x - 1.0)
    }
}

/// Gauss quadrature for the reference interval [-1, 1].
///
/// Given `n` points, the rule integrates polynomials of degree up to `2 n - 1` exactly.
/// Points are returned in descending order.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss(num_points: usize) -> Rule<1> {
    try_gauss(num_points).expect("number of points must be positive")
}

/// Same as [`gauss`], but returns an error instead of panicking when no rule exists.
pub fn try_gauss(num_points: usize) -> Result<Rule<1>, Error> {
    let n = num_points;
    if n == 0 {
        return Err(Error::NoRuleAvailable);
    }

    // Roots are symmetric about the origin, so only the first half is computed with Newton's
    // method, starting from the classical cosine estimate
    let half = (n + 1) / 2;
    let mut points = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);
    for i in 0..half {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut recurrence = LegendreRecurrence::evaluate(n, x);
        loop {
            let dx = -recurrence.value() / recurrence.derivative();
            x += dx;
            recurrence = LegendreRecurrence::evaluate(n, x);
            if dx.abs() <= 1e-15 {
                break;
            }
        }

        let dp = recurrence.derivative();
        points.push([x]);
        weights.push(2.0 / ((1.0 - x * x) * dp * dp));
    }

    for i in half..n {
        let mirror = n - i - 1;
        points.push([-points[mirror][0]]);
        weights.push(weights[mirror]);
    }

    debug_assert_eq!(points.len(), n);
    Ok((weights, points))
}
