use num_traits::{Float, FromPrimitive, Num, NumCast, One, ToPrimitive, Zero};
use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

/// Truncated Taylor series for forward-mode AD of arbitrary order.
///
/// `coeffs[k]` holds f^(k)(x0) / k!, so a `Jet<5>` carries the value and the
/// first four derivatives of a scalar function along one direction. All
/// arithmetic is exact series arithmetic, so there is no step size and no
/// subtractive cancellation.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Jet<const N: usize> {
    pub coeffs: [f64; N],
}

impl<const N: usize> Jet<N> {
    pub fn constant(value: f64) -> Self {
        let mut coeffs = [0.0; N];
        coeffs[0] = value;
        Self { coeffs }
    }

    /// The independent variable, seeded with unit first derivative.
    pub fn variable(value: f64) -> Self {
        let mut jet = Self::constant(value);
        if N > 1 {
            jet.coeffs[1] = 1.0;
        }
        jet
    }

    pub fn value(&self) -> f64 {
        self.coeffs[0]
    }

    /// k-th derivative (not the Taylor coefficient).
    pub fn derivative(&self, k: usize) -> f64 {
        self.coeffs[k] * factorial(k)
    }

    /// Value followed by all carried derivatives.
    pub fn derivatives(&self) -> [f64; N] {
        std::array::from_fn(|k| self.derivative(k))
    }

    fn scale(self, factor: f64) -> Self {
        Self {
            coeffs: self.coeffs.map(|c| c * factor),
        }
    }

    fn is_constant(&self) -> bool {
        self.coeffs.iter().skip(1).all(|&c| c == 0.0)
    }

    /// Evaluates g(self) given g and its derivatives at `self.value()`.
    /// `outer[m]` is g^(m)(x0).
    fn compose(self, outer: [f64; N]) -> Self {
        let mut h = self;
        h.coeffs[0] = 0.0;
        let mut out = Self::constant(outer[0]);
        let mut h_pow = Self::constant(1.0);
        for m in 1..N {
            h_pow = h_pow * h;
            out = out + h_pow.scale(outer[m] / factorial(m));
        }
        out
    }

    /// Series of d/dσ. The top coefficient is lost to truncation.
    fn differentiate(self) -> Self {
        let mut coeffs = [0.0; N];
        for k in 1..N {
            coeffs[k - 1] = k as f64 * self.coeffs[k];
        }
        Self { coeffs }
    }

    /// Antiderivative with constant term `value`.
    fn integrate(self, value: f64) -> Self {
        let mut coeffs = [0.0; N];
        coeffs[0] = value;
        for k in 1..N {
            coeffs[k] = self.coeffs[k - 1] / k as f64;
        }
        Self { coeffs }
    }

    /// f(self) for f known only through f(x0) and the series of f'(self).
    fn chain(self, value: f64, outer_prime: Self) -> Self {
        (outer_prime * self.differentiate()).integrate(value)
    }

    /// x^r for a constant real exponent.
    fn pow_real(self, r: f64, value: f64) -> Self {
        let x0 = self.value();
        let mut falling = 1.0;
        let outer = std::array::from_fn(|m| {
            if m > 0 {
                falling *= r - (m - 1) as f64;
            }
            if m == 0 {
                value
            } else if falling == 0.0 {
                0.0
            } else {
                falling * value / x0.powi(m as i32)
            }
        });
        self.compose(outer)
    }
}

fn factorial(k: usize) -> f64 {
    (1..=k).map(|i| i as f64).product()
}

/// Evaluates `f` at `x` with a seeded jet and returns the value and the first
/// `N - 1` derivatives.
pub fn derivatives<const N: usize, F>(f: F, x: f64) -> [f64; N]
where
    F: Fn(Jet<N>) -> Jet<N>,
{
    f(Jet::variable(x)).derivatives()
}

impl<const N: usize> From<f64> for Jet<N> {
    fn from(value: f64) -> Self {
        Self::constant(value)
    }
}

impl<const N: usize> Zero for Jet<N> {
    fn zero() -> Self {
        Self::constant(0.0)
    }
    fn is_zero(&self) -> bool {
        self.coeffs.iter().all(|&c| c == 0.0)
    }
}

impl<const N: usize> One for Jet<N> {
    fn one() -> Self {
        Self::constant(1.0)
    }
}

impl<const N: usize> Add for Jet<N> {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            coeffs: std::array::from_fn(|k| self.coeffs[k] + rhs.coeffs[k]),
        }
    }
}

impl<const N: usize> Sub for Jet<N> {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            coeffs: std::array::from_fn(|k| self.coeffs[k] - rhs.coeffs[k]),
        }
    }
}

impl<const N: usize> Mul for Jet<N> {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        // Cauchy product, truncated at order N-1
        let mut coeffs = [0.0; N];
        for k in 0..N {
            for i in 0..=k {
                coeffs[k] += self.coeffs[i] * rhs.coeffs[k - i];
            }
        }
        Self { coeffs }
    }
}

impl<const N: usize> Div for Jet<N> {
    type Output = Self;
    fn div(self, rhs: Self) -> Self {
        let b0 = rhs.coeffs[0];
        let mut coeffs = [0.0; N];
        for k in 0..N {
            let mut acc = self.coeffs[k];
            for i in 1..=k {
                acc -= rhs.coeffs[i] * coeffs[k - i];
            }
            coeffs[k] = acc / b0;
        }
        Self { coeffs }
    }
}

impl<const N: usize> Neg for Jet<N> {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            coeffs: self.coeffs.map(|c| -c),
        }
    }
}

impl<const N: usize> Rem for Jet<N> {
    type Output = Self;
    fn rem(self, rhs: Self) -> Self {
        // a mod b = a - trunc(a/b) * b, with the quotient locally constant
        let n = (self.value() / rhs.value()).trunc();
        self - rhs.scale(n)
    }
}

impl<const N: usize> AddAssign for Jet<N> {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}
impl<const N: usize> SubAssign for Jet<N> {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}
impl<const N: usize> MulAssign for Jet<N> {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}
impl<const N: usize> DivAssign for Jet<N> {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}
impl<const N: usize> RemAssign for Jet<N> {
    fn rem_assign(&mut self, rhs: Self) {
        *self = *self % rhs;
    }
}

impl<const N: usize> Num for Jet<N> {
    type FromStrRadixErr = ();
    fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
        f64::from_str_radix(str, radix)
            .map(Self::constant)
            .map_err(|_| ())
    }
}

impl<const N: usize> ToPrimitive for Jet<N> {
    fn to_i64(&self) -> Option<i64> {
        self.value().to_i64()
    }
    fn to_u64(&self) -> Option<u64> {
        self.value().to_u64()
    }
    fn to_f64(&self) -> Option<f64> {
        Some(self.value())
    }
}

impl<const N: usize> FromPrimitive for Jet<N> {
    fn from_i64(n: i64) -> Option<Self> {
        Some(Self::constant(n as f64))
    }
    fn from_u64(n: u64) -> Option<Self> {
        Some(Self::constant(n as f64))
    }
    fn from_f64(n: f64) -> Option<Self> {
        Some(Self::constant(n))
    }
}

impl<const N: usize> NumCast for Jet<N> {
    fn from<T: ToPrimitive>(n: T) -> Option<Self> {
        n.to_f64().map(Self::constant)
    }
}

impl<const N: usize> Float for Jet<N> {
    fn nan() -> Self {
        Self::constant(f64::NAN)
    }
    fn infinity() -> Self {
        Self::constant(f64::INFINITY)
    }
    fn neg_infinity() -> Self {
        Self::constant(f64::NEG_INFINITY)
    }
    fn neg_zero() -> Self {
        Self::constant(-0.0)
    }
    fn min_value() -> Self {
        Self::constant(f64::MIN)
    }
    fn min_positive_value() -> Self {
        Self::constant(f64::MIN_POSITIVE)
    }
    fn max_value() -> Self {
        Self::constant(f64::MAX)
    }
    fn is_nan(self) -> bool {
        self.value().is_nan()
    }
    fn is_infinite(self) -> bool {
        self.value().is_infinite()
    }
    fn is_finite(self) -> bool {
        self.value().is_finite()
    }
    fn is_normal(self) -> bool {
        self.value().is_normal()
    }
    fn classify(self) -> std::num::FpCategory {
        self.value().classify()
    }
    fn floor(self) -> Self {
        Self::constant(self.value().floor())
    }
    fn ceil(self) -> Self {
        Self::constant(self.value().ceil())
    }
    fn round(self) -> Self {
        Self::constant(self.value().round())
    }
    fn trunc(self) -> Self {
        Self::constant(self.value().trunc())
    }
    fn fract(self) -> Self {
        self - self.trunc()
    }
    fn abs(self) -> Self {
        if self.value() < 0.0 {
            -self
        } else {
            self
        }
    }
    fn signum(self) -> Self {
        Self::constant(self.value().signum())
    }
    fn is_sign_positive(self) -> bool {
        self.value().is_sign_positive()
    }
    fn is_sign_negative(self) -> bool {
        self.value().is_sign_negative()
    }
    fn mul_add(self, a: Self, b: Self) -> Self {
        self * a + b
    }
    fn recip(self) -> Self {
        Self::one() / self
    }

    fn powi(self, n: i32) -> Self {
        let mut acc = Self::one();
        for _ in 0..n.unsigned_abs() {
            acc = acc * self;
        }
        if n < 0 {
            acc.recip()
        } else {
            acc
        }
    }

    fn powf(self, n: Self) -> Self {
        if n.is_constant() {
            let r = n.value();
            self.pow_real(r, self.value().powf(r))
        } else {
            // x^y = exp(y * ln(x))
            (n * self.ln()).exp()
        }
    }

    fn sqrt(self) -> Self {
        self.pow_real(0.5, self.value().sqrt())
    }

    fn exp(self) -> Self {
        let e = self.value().exp();
        self.compose([e; N])
    }

    fn exp2(self) -> Self {
        self.scale(std::f64::consts::LN_2).exp()
    }
    fn ln(self) -> Self {
        let x0 = self.value();
        let outer = std::array::from_fn(|m| {
            if m == 0 {
                x0.ln()
            } else {
                let sign = if m % 2 == 1 { 1.0 } else { -1.0 };
                sign * factorial(m - 1) / x0.powi(m as i32)
            }
        });
        self.compose(outer)
    }
    fn log(self, base: Self) -> Self {
        self.ln() / base.ln()
    }
    fn log2(self) -> Self {
        self.ln().scale(std::f64::consts::LOG2_E)
    }
    fn log10(self) -> Self {
        self.ln().scale(std::f64::consts::LOG10_E)
    }

    fn max(self, other: Self) -> Self {
        if self.value() > other.value() {
            self
        } else {
            other
        }
    }
    fn min(self, other: Self) -> Self {
        if self.value() < other.value() {
            self
        } else {
            other
        }
    }

    fn abs_sub(self, other: Self) -> Self {
        if self.value() > other.value() {
            self - other
        } else {
            Self::zero()
        }
    }

    fn cbrt(self) -> Self {
        self.pow_real(1.0 / 3.0, self.value().cbrt())
    }
    fn hypot(self, other: Self) -> Self {
        let mut out = (self * self + other * other).sqrt();
        out.coeffs[0] = self.value().hypot(other.value());
        out
    }

    fn sin(self) -> Self {
        let (s, c) = self.value().sin_cos();
        let cycle = [s, c, -s, -c];
        self.compose(std::array::from_fn(|m| cycle[m % 4]))
    }
    fn cos(self) -> Self {
        let (s, c) = self.value().sin_cos();
        let cycle = [c, -s, -c, s];
        self.compose(std::array::from_fn(|m| cycle[m % 4]))
    }
    fn tan(self) -> Self {
        self.sin() / self.cos()
    }
    fn asin(self) -> Self {
        let prime = (Self::one() - self * self).powf(Self::constant(-0.5));
        self.chain(self.value().asin(), prime)
    }
    fn acos(self) -> Self {
        let prime = -(Self::one() - self * self).powf(Self::constant(-0.5));
        self.chain(self.value().acos(), prime)
    }
    fn atan(self) -> Self {
        let prime = (Self::one() + self * self).recip();
        self.chain(self.value().atan(), prime)
    }
    fn atan2(self, other: Self) -> Self {
        // d atan2(y, x) = (x dy - y dx) / (x^2 + y^2)
        let (y, x) = (self, other);
        let rate = (x * y.differentiate() - y * x.differentiate()) / (x * x + y * y);
        rate.integrate(y.value().atan2(x.value()))
    }
    fn sin_cos(self) -> (Self, Self) {
        (self.sin(), self.cos())
    }

    fn exp_m1(self) -> Self {
        let mut out = self.exp();
        out.coeffs[0] = self.value().exp_m1();
        out
    }
    fn ln_1p(self) -> Self {
        let mut out = (Self::one() + self).ln();
        out.coeffs[0] = self.value().ln_1p();
        out
    }
    fn sinh(self) -> Self {
        let (s, c) = (self.value().sinh(), self.value().cosh());
        self.compose(std::array::from_fn(|m| if m % 2 == 0 { s } else { c }))
    }
    fn cosh(self) -> Self {
        let (s, c) = (self.value().sinh(), self.value().cosh());
        self.compose(std::array::from_fn(|m| if m % 2 == 0 { c } else { s }))
    }
    fn tanh(self) -> Self {
        self.sinh() / self.cosh()
    }
    fn asinh(self) -> Self {
        let prime = (Self::one() + self * self).powf(Self::constant(-0.5));
        self.chain(self.value().asinh(), prime)
    }
    fn acosh(self) -> Self {
        let prime = (self * self - Self::one()).powf(Self::constant(-0.5));
        self.chain(self.value().acosh(), prime)
    }
    fn atanh(self) -> Self {
        let prime = (Self::one() - self * self).recip();
        self.chain(self.value().atanh(), prime)
    }

    fn integer_decode(self) -> (u64, i16, i8) {
        self.value().integer_decode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol * (1.0 + expected.abs()),
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn polynomial_derivatives_are_exact() {
        // f(x) = x^4 - 3x^2 + 2 at x = 1.5
        let d = derivatives::<5, _>(|x| x.powi(4) - Jet::constant(3.0) * x * x + Jet::constant(2.0), 1.5);
        assert_close(d[0], 1.5f64.powi(4) - 3.0 * 2.25 + 2.0, 1e-15);
        assert_close(d[1], 4.0 * 1.5f64.powi(3) - 6.0 * 1.5, 1e-15);
        assert_close(d[2], 12.0 * 2.25 - 6.0, 1e-15);
        assert_close(d[3], 24.0 * 1.5, 1e-15);
        assert_close(d[4], 24.0, 1e-15);
    }

    #[test]
    fn log_matches_closed_form() {
        // d^k/dx^k ln(x) = (-1)^(k-1) (k-1)! / x^k
        let x = 0.7;
        let d = derivatives::<5, _>(|v| v.ln(), x);
        assert_close(d[1], 1.0 / x, 1e-14);
        assert_close(d[2], -1.0 / (x * x), 1e-14);
        assert_close(d[3], 2.0 / x.powi(3), 1e-14);
        assert_close(d[4], -6.0 / x.powi(4), 1e-14);
    }

    #[test]
    fn quotient_and_log_of_vdw_term() {
        // f(x) = -ln(1 - b x) has f^(k) = (k-1)! b^k / (1 - b x)^k
        let b = 3e-5;
        let x = 9000.0;
        let d = derivatives::<5, _>(|v| -(Jet::one() - Jet::constant(b) * v).ln(), x);
        let w = 1.0 - b * x;
        for k in 1..5 {
            let expected = factorial(k - 1) * b.powi(k as i32) / w.powi(k as i32);
            assert_close(d[k], expected, 1e-12);
        }
    }

    #[test]
    fn exp_sin_cos_agree_with_identities() {
        let x = 0.3;
        let e = derivatives::<5, _>(|v| v.exp(), x);
        for k in 0..5 {
            assert_close(e[k], x.exp(), 1e-14);
        }
        let s = derivatives::<4, _>(|v| v.sin(), x);
        assert_close(s[1], x.cos(), 1e-14);
        assert_close(s[2], -x.sin(), 1e-14);
        assert_close(s[3], -x.cos(), 1e-14);
        let one = derivatives::<5, _>(|v| v.sin() * v.sin() + v.cos() * v.cos(), x);
        assert_close(one[0], 1.0, 1e-14);
        for k in 1..5 {
            assert!(one[k].abs() < 1e-13);
        }
    }

    #[test]
    fn sqrt_and_powf_match_power_rule() {
        let x = 2.0;
        let d = derivatives::<4, _>(|v| v.sqrt(), x);
        assert_close(d[1], 0.5 / x.sqrt(), 1e-14);
        assert_close(d[2], -0.25 * x.powf(-1.5), 1e-14);
        assert_close(d[3], 0.375 * x.powf(-2.5), 1e-14);

        let p = derivatives::<3, _>(|v| v.powf(Jet::constant(2.5)), x);
        assert_close(p[1], 2.5 * x.powf(1.5), 1e-14);
        assert_close(p[2], 3.75 * x.sqrt(), 1e-14);
    }

    #[test]
    fn inverse_trig_first_derivatives() {
        let x = 0.4;
        let atan = derivatives::<3, _>(|v| v.atan(), x);
        assert_close(atan[1], 1.0 / (1.0 + x * x), 1e-14);
        assert_close(atan[2], -2.0 * x / (1.0 + x * x).powi(2), 1e-14);

        let asin = derivatives::<2, _>(|v| v.asin(), x);
        assert_close(asin[1], 1.0 / (1.0 - x * x).sqrt(), 1e-14);

        let atan2 = derivatives::<2, _>(|v| v.atan2(Jet::constant(2.0)), x);
        assert_close(atan2[0], x.atan2(2.0), 1e-14);
        assert_close(atan2[1], 2.0 / (4.0 + x * x), 1e-14);
    }

    #[test]
    fn powi_handles_zero_base() {
        let d = derivatives::<5, _>(|v| v.powi(2), 0.0);
        assert_eq!(d, [0.0, 0.0, 2.0, 0.0, 0.0]);
        let inv = derivatives::<3, _>(|v| v.powi(-1), 2.0);
        assert_close(inv[1], -0.25, 1e-15);
        assert_close(inv[2], 0.25, 1e-15);
    }

    #[test]
    fn rem_keeps_slope() {
        let d = derivatives::<2, _>(|v| v % Jet::constant(1.0), 2.25);
        assert_close(d[0], 0.25, 1e-15);
        assert_close(d[1], 1.0, 1e-15);
    }
}
