use crate::C;

/// Numerical derivative of `f` with respect to the (not necessarily
/// uniform) sample positions `x`.
///
/// Second order central differences in the interior and one-sided
/// first order differences at both ends. Repeated positions produce
/// non-finite output at the affected samples.
pub(crate) fn gradient(f: &[C], x: &[C]) -> Vec<C> {
    debug_assert_eq!(f.len(), x.len());
    let n = f.len();
    match n {
        0 => return Vec::new(),
        1 => return vec![C::NAN],
        _ => (),
    }
    let mut out = Vec::with_capacity(n);
    out.push((f[1] - f[0]) / (x[1] - x[0]));
    for i in 1..n - 1 {
        let h0 = x[i] - x[i - 1];
        let h1 = x[i + 1] - x[i];
        out.push(
            (h0 * h0 * f[i + 1] - h1 * h1 * f[i - 1] + (h1 * h1 - h0 * h0) * f[i])
                / (h0 * h1 * (h0 + h1)),
        );
    }
    out.push((f[n - 1] - f[n - 2]) / (x[n - 1] - x[n - 2]));
    out
}
