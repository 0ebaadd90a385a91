//! Embedded Bogacki-Shampine 3(2) Runge-Kutta step.

use geo::geometry::Coord;

pub(crate) struct RkStep {
    /// Third order solution.
    pub(crate) end: Coord<f64>,

    /// Derivative at `end`, reusable as the next step's first stage.
    pub(crate) slope: Coord<f64>,

    /// Distance between the third and second order solutions.
    pub(crate) error: f64,
}

/// Takes one step of size `h` from `start`, where `slope` is `f(start)`.
///
/// Returns `None` if `f` is undefined at any stage.
pub(crate) fn bogacki_shampine<F>(
    f: &mut F,
    start: Coord<f64>,
    slope: Coord<f64>,
    h: f64,
) -> Option<RkStep>
where
    F: FnMut(Coord<f64>) -> Option<Coord<f64>>,
{
    let k1 = slope;
    let k2 = f(start + k1 * (h / 2.0))?;
    let k3 = f(start + k2 * (3.0 * h / 4.0))?;
    let end = start + (k1 * (2.0 / 9.0) + k2 * (1.0 / 3.0) + k3 * (4.0 / 9.0)) * h;
    let k4 = f(end)?;
    let lower = start
        + (k1 * (7.0 / 24.0) + k2 * (1.0 / 4.0) + k3 * (1.0 / 3.0) + k4 * (1.0 / 8.0)) * h;
    let diff = end - lower;
    Some(RkStep {
        end,
        slope: k4,
        error: diff.x.hypot(diff.y),
    })
}

#[cfg(test)]
mod tests {
    use super::bogacki_shampine;
    use approx::assert_abs_diff_eq;
    use geo::coord;

    #[test]
    fn test_circle() {
        // Unit speed rotation about the origin.
        let mut f = |p: geo::Coord<f64>| {
            let r = p.x.hypot(p.y);
            Some(coord! { x: -p.y / r, y: p.x / r })
        };
        let mut p = coord! { x: 1.0, y: 0.0 };
        let mut k = f(p).unwrap();
        let h = 0.01;
        let steps = (std::f64::consts::FRAC_PI_2 / h).round() as usize;
        for _ in 0..steps {
            let step = bogacki_shampine(&mut f, p, k, h).unwrap();
            assert!(step.error < 1e-5);
            p = step.end;
            k = step.slope;
        }
        let arc = steps as f64 * h;
        assert_abs_diff_eq!(p.x, arc.cos(), epsilon = 1e-5);
        assert_abs_diff_eq!(p.y, arc.sin(), epsilon = 1e-5);
    }

    #[test]
    fn test_undefined_stage() {
        let mut f = |p: geo::Coord<f64>| (p.x < 0.5).then_some(coord! { x: 1.0, y: 0.0 });
        let start = coord! { x: 0.0, y: 0.0 };
        assert!(bogacki_shampine(&mut f, start, coord! { x: 1.0, y: 0.0 }, 1.0).is_none());
        assert!(bogacki_shampine(&mut f, start, coord! { x: 1.0, y: 0.0 }, 0.1).is_some());
    }
}
