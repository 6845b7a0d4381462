//! Bracketed root-finding (Brent's method).
//!
//! One root-find runs per pixel per grid cell, so this is the hot path of the
//! whole engine. Brent's method combines bisection with inverse quadratic
//! interpolation: it keeps bisection's guaranteed convergence for a valid
//! bracket while converging superlinearly on smooth functions like our
//! low-order polynomials.
//!
//! The bracket endpoints may arrive in either order (a decreasing ratio
//! curve hands us its extremum densities reversed); we order them internally.

/// The bracket does not straddle a sign change, so no root can be located.
///
/// Per-pixel policy: the caller records the pixel as unsolved (NaN) and
/// moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoSignChange;

const MAX_ITER: usize = 100;
const EPS: f64 = f64::EPSILON;

/// Find a root of `f` within `[a, b]` (endpoints in either order).
///
/// Requires `f(a)` and `f(b)` to have opposite signs; an endpoint that is
/// exactly zero is returned directly. `tol` is the absolute convergence
/// tolerance on the abscissa.
pub fn brent_root<F: Fn(f64) -> f64>(f: F, a: f64, b: f64, tol: f64) -> Result<f64, NoSignChange> {
    let (mut a, mut b) = if a <= b { (a, b) } else { (b, a) };
    let mut fa = f(a);
    let mut fb = f(b);

    if fa == 0.0 {
        return Ok(a);
    }
    if fb == 0.0 {
        return Ok(b);
    }
    if fa.signum() == fb.signum() || !fa.is_finite() || !fb.is_finite() {
        return Err(NoSignChange);
    }

    let mut c = a;
    let mut fc = fa;
    let mut d = b - a;
    let mut e = d;

    for _ in 0..MAX_ITER {
        if (fb > 0.0) == (fc > 0.0) {
            // Root is bracketed by [a, b]; reset the contrapoint.
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol1 = 2.0 * EPS * b.abs() + 0.5 * tol;
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol1 || fb == 0.0 {
            return Ok(b);
        }

        if e.abs() >= tol1 && fa.abs() > fb.abs() {
            // Attempt inverse quadratic interpolation (secant when a == c).
            let s = fb / fa;
            let (mut p, mut q);
            if a == c {
                p = 2.0 * xm * s;
                q = 1.0 - s;
            } else {
                let r1 = fa / fc;
                let r2 = fb / fc;
                p = s * (2.0 * xm * r1 * (r1 - r2) - (b - a) * (r2 - 1.0));
                q = (r1 - 1.0) * (r2 - 1.0) * (s - 1.0);
            }
            if p > 0.0 {
                q = -q;
            }
            p = p.abs();
            let min1 = 3.0 * xm * q - (tol1 * q).abs();
            let min2 = (e * q).abs();
            if 2.0 * p < min1.min(min2) {
                e = d;
                d = p / q;
            } else {
                d = xm;
                e = d;
            }
        } else {
            d = xm;
            e = d;
        }

        a = b;
        fa = fb;
        if d.abs() > tol1 {
            b += d;
        } else {
            b += tol1.copysign(xm);
        }
        fb = f(b);
    }

    Ok(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_root_of_linear_function() {
        let root = brent_root(|x| 0.5 * x + 1.0 - 2.0, 0.0, 8.0, 1e-12).unwrap();
        assert!((root - 2.0).abs() < 1e-9);
    }

    #[test]
    fn finds_root_of_cubic() {
        // x^3 - 2x - 5 has a root near 2.0945514815.
        let root = brent_root(|x| x * x * x - 2.0 * x - 5.0, 2.0, 3.0, 1e-12).unwrap();
        assert!((root - 2.094_551_481_5).abs() < 1e-8);
    }

    #[test]
    fn accepts_reversed_bracket() {
        let root = brent_root(|x| x - 1.5, 4.0, 0.0, 1e-12).unwrap();
        assert!((root - 1.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_bracket_without_sign_change() {
        assert_eq!(brent_root(|x| x * x + 1.0, -1.0, 1.0, 1e-12), Err(NoSignChange));
    }

    #[test]
    fn returns_endpoint_when_it_is_already_a_root() {
        let root = brent_root(|x| x - 2.0, 2.0, 5.0, 1e-12).unwrap();
        assert_eq!(root, 2.0);
    }
}
