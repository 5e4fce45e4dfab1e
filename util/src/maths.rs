//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Evaluate a polynomial at `value`.
///
/// Coefficients are ordered lowest power first, so `[c0, c1, c2]` is
/// `c0 + c1*x + c2*x^2`. An empty coefficient slice evaluates to zero.
pub fn poly_eval<T>(coeffs: &[T], value: T) -> T
where
    T: Float
{
    // Horner's method
    coeffs.iter().rev().fold(T::zero(), |acc, &c| acc * value + c)
}

/// Evaluate the first derivative of a polynomial at `value`.
///
/// Coefficients are ordered lowest power first, as in `poly_eval`.
pub fn poly_deriv_eval<T>(coeffs: &[T], value: T) -> T
where
    T: Float
{
    let mut res = T::zero();
    let mut power = T::one();

    for (i, &c) in coeffs.iter().enumerate().skip(1) {
        let n = match T::from(i) {
            Some(n) => n,
            None => return T::nan()
        };
        res = res + n * c * power;
        power = power * value;
    }

    res
}

/// Clamp a value into `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float
{
    value.max(min).min(max)
}

/// Wrap an angle into the range `[-pi, pi)`.
pub fn wrap_to_pi<T>(value: T) -> T
where
    T: Float
{
    let pi = T::from(std::f64::consts::PI).unwrap_or_else(T::nan);
    rem_euclid(value + pi, pi + pi) - pi
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()` if `lhs` is much smaller than `rhs.abs()` in
/// magnitude and `lhs < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const PI: f64 = std::f64::consts::PI;

    #[test]
    fn test_poly_eval() {
        let coeffs = [1.0, -2.0, 0.5, 0.25];

        assert_eq!(poly_eval(&coeffs, 0.0), 1.0);
        // 1 - 4 + 2 + 2
        assert_eq!(poly_eval(&coeffs, 2.0), 1.0);
        assert_eq!(poly_eval::<f64>(&[], 3.0), 0.0);

        // -2 + 2*0.5*x + 3*0.25*x^2 at x = 2
        assert_eq!(poly_deriv_eval(&coeffs, 2.0), 3.0);
        assert_eq!(poly_deriv_eval(&[4.0], 2.0), 0.0);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(2.0, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-2.0, -1.0, 1.0), -1.0);
        assert_eq!(clamp(0.5, -1.0, 1.0), 0.5);
    }

    #[test]
    fn test_wrap_to_pi() {
        assert!((wrap_to_pi(0.5) - 0.5f64).abs() < 1e-12);
        assert!((wrap_to_pi(2.0 * PI + 0.5) - 0.5).abs() < 1e-12);
        assert!((wrap_to_pi(-2.0 * PI - 0.5) + 0.5).abs() < 1e-12);
        assert!((wrap_to_pi(PI + 0.1) - (-PI + 0.1)).abs() < 1e-12);
    }
}
