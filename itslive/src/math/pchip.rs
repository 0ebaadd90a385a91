//! Piecewise cubic Hermite interpolation with Fritsch-Carlson slopes.
//!
//! The interpolant is monotone wherever the data are, so resampled
//! paths never overshoot their vertices.

use crate::C;

pub(crate) struct Pchip {
    x: Vec<C>,
    y: Vec<C>,
    slopes: Vec<C>,
}

impl Pchip {
    /// Returns `None` unless `x` is strictly increasing, has at least
    /// one sample, and matches `y` in length.
    pub(crate) fn new(x: Vec<C>, y: Vec<C>) -> Option<Self> {
        if x.is_empty() || x.len() != y.len() || x.windows(2).any(|w| w[1] <= w[0]) {
            return None;
        }
        let slopes = slopes(&x, &y);
        Some(Self { x, y, slopes })
    }

    /// Evaluates at `t`, clamping to the end values outside the data.
    pub(crate) fn eval(&self, t: C) -> C {
        let n = self.x.len();
        if n == 1 || t <= self.x[0] {
            return self.y[0];
        }
        if t >= self.x[n - 1] {
            return self.y[n - 1];
        }
        let k = self.x.partition_point(|&xk| xk <= t) - 1;
        let h = self.x[k + 1] - self.x[k];
        let s = (t - self.x[k]) / h;
        let s2 = s * s;
        let s3 = s2 * s;
        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;
        h00 * self.y[k]
            + h10 * h * self.slopes[k]
            + h01 * self.y[k + 1]
            + h11 * h * self.slopes[k + 1]
    }
}

fn slopes(x: &[C], y: &[C]) -> Vec<C> {
    let n = x.len();
    if n == 1 {
        return vec![0.0];
    }
    let h: Vec<C> = x.windows(2).map(|w| w[1] - w[0]).collect();
    let delta: Vec<C> = y
        .windows(2)
        .zip(&h)
        .map(|(w, h)| (w[1] - w[0]) / h)
        .collect();
    if n == 2 {
        return vec![delta[0]; 2];
    }

    let mut d = vec![0.0; n];
    for k in 1..n - 1 {
        if delta[k - 1] * delta[k] > 0.0 {
            let w1 = 2.0 * h[k] + h[k - 1];
            let w2 = h[k] + 2.0 * h[k - 1];
            d[k] = (w1 + w2) / (w1 / delta[k - 1] + w2 / delta[k]);
        }
    }
    d[0] = end_slope(h[0], h[1], delta[0], delta[1]);
    d[n - 1] = end_slope(h[n - 2], h[n - 3], delta[n - 2], delta[n - 3]);
    d
}

/// One-sided three-point slope, limited to keep the end interval
/// monotone.
fn end_slope(h0: C, h1: C, delta0: C, delta1: C) -> C {
    let d = ((2.0 * h0 + h1) * delta0 - h0 * delta1) / (h0 + h1);
    if d.signum() != delta0.signum() || delta0 == 0.0 {
        0.0
    } else if delta0.signum() != delta1.signum() && d.abs() > 3.0 * delta0.abs() {
        3.0 * delta0
    } else {
        d
    }
}

#[cfg(test)]
mod tests {
    use super::Pchip;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_interpolates_vertices() {
        let x = vec![0.0, 1.0, 2.5, 4.0];
        let y = vec![3.0, -1.0, 2.0, 2.0];
        let p = Pchip::new(x.clone(), y.clone()).unwrap();
        for (x, y) in x.iter().zip(&y) {
            assert_abs_diff_eq!(p.eval(*x), *y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_linear_data_is_reproduced() {
        let x = vec![0.0, 1.0, 3.0, 6.0];
        let y: Vec<f64> = x.iter().map(|x| 2.0 * x - 1.0).collect();
        let p = Pchip::new(x, y).unwrap();
        for t in [0.25, 1.7, 4.4, 5.9] {
            assert_abs_diff_eq!(p.eval(t), 2.0 * t - 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_monotone_no_overshoot() {
        let x = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let y = vec![0.0, 0.0, 1.0, 1.0, 1.0];
        let p = Pchip::new(x, y).unwrap();
        let mut prev = p.eval(0.0);
        for i in 1..=400 {
            let v = p.eval(f64::from(i) / 100.0);
            assert!(v >= prev - 1e-12 && (0.0..=1.0).contains(&v));
            prev = v;
        }
    }

    #[test]
    fn test_rejects_unsorted() {
        assert!(Pchip::new(vec![0.0, 0.0], vec![1.0, 2.0]).is_none());
        assert!(Pchip::new(vec![], vec![]).is_none());
    }
}
