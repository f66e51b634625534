//! Two-tier epsilon comparison for `f32` and `f64`.
//!
//! Tier one is an absolute bound: `|x - y| <= epsilon`. When that fails and a
//! non-zero epsilon was requested, tier two accepts differences within one
//! machine epsilon of the larger magnitude, which keeps large operands from
//! failing on representation noise. An epsilon of zero means exact IEEE
//! equality. NaN equals NaN; infinities only equal themselves.

macro_rules! epsilon_compare {
    ($name:ident, $ty:ty) => {
        #[must_use]
        pub fn $name(x: $ty, y: $ty, epsilon: $ty) -> bool {
            if x.is_nan() || y.is_nan() {
                return x.is_nan() && y.is_nan();
            }
            if x.is_infinite() || y.is_infinite() {
                return x == y;
            }
            let diff = (x - y).abs();
            if diff <= epsilon {
                return true;
            }
            if epsilon == 0.0 {
                return false;
            }
            diff <= x.abs().max(y.abs()) * <$ty>::EPSILON
        }
    };
}

epsilon_compare!(float_compare, f32);
epsilon_compare!(double_compare, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_finite_values_always_compare_equal() {
        for x in [0.0, -0.0, 1.0e-30, -3.5, 1.0e30, f64::MAX, f64::MIN_POSITIVE] {
            for eps in [0.0, 1.0e-12, 0.5] {
                assert!(double_compare(x, x, eps), "{x} {eps}");
            }
        }
    }

    #[test]
    fn zero_epsilon_is_exact() {
        assert!(double_compare(0.0, -0.0, 0.0));
        assert!(!double_compare(1.0, 1.0 + f64::EPSILON, 0.0));
        assert!(!float_compare(1.0e10, 1.0e10 + 1024.0, 0.0));
    }

    #[test]
    fn nan_and_infinity_conventions() {
        assert!(double_compare(f64::NAN, f64::NAN, 0.0));
        assert!(!double_compare(f64::NAN, 1.0, 1.0));
        assert!(double_compare(f64::INFINITY, f64::INFINITY, 0.0));
        assert!(!double_compare(f64::INFINITY, f64::NEG_INFINITY, f64::MAX));
        assert!(!float_compare(f32::INFINITY, f32::MAX, 1.0));
    }

    #[test]
    fn absolute_tier_covers_small_magnitudes() {
        assert!(float_compare(0.1, 0.1005, 0.001));
        assert!(!float_compare(0.1, 0.2, 0.001));
    }

    #[test]
    fn relative_tier_covers_large_magnitudes() {
        let big = 1.0e20_f64;
        let next = f64::from_bits(big.to_bits() + 1);
        assert!(double_compare(big, next, 1.0e-9));
        assert!(!double_compare(big, big * 1.001, 1.0e-9));
    }
}
