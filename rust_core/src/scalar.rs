use std::fmt::{self, Display};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

use crate::dual::Dual;

/// A numeric value held in the store or produced by a model.
///
/// Arithmetic promotes the way forward-mode AD needs it to: two reals stay
/// real, a real mixed with a dual becomes a dual, and two duals combine lane
/// by lane (their widths must agree).
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Real(f64),
    Dual(Dual),
}

impl Scalar {
    /// The real part. Defined for both variants.
    #[inline]
    pub fn real(&self) -> f64 {
        match self {
            Scalar::Real(v) => *v,
            Scalar::Dual(d) => d.value(),
        }
    }

    #[inline]
    pub fn is_dual(&self) -> bool {
        matches!(self, Scalar::Dual(_))
    }

    /// Lane count, or `None` for a plain real.
    #[inline]
    pub fn width(&self) -> Option<usize> {
        match self {
            Scalar::Real(_) => None,
            Scalar::Dual(d) => Some(d.width()),
        }
    }

    #[inline]
    fn unary(&self, value: f64, deriv: f64) -> Scalar {
        match self {
            Scalar::Real(_) => Scalar::Real(value),
            Scalar::Dual(d) => Scalar::Dual(d.chain(value, deriv)),
        }
    }

    pub fn exp(&self) -> Scalar {
        let e = self.real().exp();
        self.unary(e, e)
    }

    pub fn ln(&self) -> Scalar {
        let x = self.real();
        self.unary(x.ln(), 1.0 / x)
    }

    pub fn ln_1p(&self) -> Scalar {
        let x = self.real();
        self.unary(x.ln_1p(), 1.0 / (1.0 + x))
    }

    pub fn sqrt(&self) -> Scalar {
        let s = self.real().sqrt();
        self.unary(s, 0.5 / s)
    }

    pub fn square(&self) -> Scalar {
        let x = self.real();
        self.unary(x * x, 2.0 * x)
    }

    pub fn recip(&self) -> Scalar {
        let inv = 1.0 / self.real();
        self.unary(inv, -inv * inv)
    }

    pub fn powi(&self, n: i32) -> Scalar {
        if n == 0 {
            return self.unary(1.0, 0.0);
        }
        let x = self.real();
        self.unary(x.powi(n), n as f64 * x.powi(n - 1))
    }

    pub fn powf(&self, n: f64) -> Scalar {
        if n == 0.0 {
            return self.unary(1.0, 0.0);
        }
        let x = self.real();
        self.unary(x.powf(n), n * x.powf(n - 1.0))
    }

    pub fn sin(&self) -> Scalar {
        let x = self.real();
        self.unary(x.sin(), x.cos())
    }

    pub fn cos(&self) -> Scalar {
        let x = self.real();
        self.unary(x.cos(), -x.sin())
    }

    pub fn tanh(&self) -> Scalar {
        let t = self.real().tanh();
        self.unary(t, 1.0 - t * t)
    }

    /// Derivative is taken as 0 at the kink.
    pub fn abs(&self) -> Scalar {
        let x = self.real();
        let slope = if x == 0.0 { 0.0 } else { x.signum() };
        self.unary(x.abs(), slope)
    }

    pub fn sigmoid(&self) -> Scalar {
        let s = 1.0 / (1.0 + (-self.real()).exp());
        self.unary(s, s * (1.0 - s))
    }
}

impl Default for Scalar {
    fn default() -> Self {
        Scalar::Real(0.0)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Real(v)
    }
}

impl From<Dual> for Scalar {
    fn from(d: Dual) -> Self {
        Scalar::Dual(d)
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Real(v) => write!(f, "{}", v),
            Scalar::Dual(d) => write!(f, "{}", d),
        }
    }
}

/// Apply a binary function given its value and partials `da`, `db`.
#[inline]
fn lift(a: &Scalar, b: &Scalar, value: f64, da: f64, db: f64) -> Scalar {
    match (a, b) {
        (Scalar::Real(_), Scalar::Real(_)) => Scalar::Real(value),
        (Scalar::Dual(x), Scalar::Real(_)) => Scalar::Dual(x.chain(value, da)),
        (Scalar::Real(_), Scalar::Dual(y)) => Scalar::Dual(y.chain(value, db)),
        (Scalar::Dual(x), Scalar::Dual(y)) => Scalar::Dual(x.combine(y, value, da, db)),
    }
}

fn add_kernel(a: &Scalar, b: &Scalar) -> Scalar {
    lift(a, b, a.real() + b.real(), 1.0, 1.0)
}

fn sub_kernel(a: &Scalar, b: &Scalar) -> Scalar {
    lift(a, b, a.real() - b.real(), 1.0, -1.0)
}

fn mul_kernel(a: &Scalar, b: &Scalar) -> Scalar {
    let (x, y) = (a.real(), b.real());
    lift(a, b, x * y, y, x)
}

fn div_kernel(a: &Scalar, b: &Scalar) -> Scalar {
    let (x, y) = (a.real(), b.real());
    lift(a, b, x / y, 1.0 / y, -x / (y * y))
}

macro_rules! scalar_binop {
    ($trait:ident, $method:ident, $kernel:ident) => {
        impl $trait<&Scalar> for &Scalar {
            type Output = Scalar;
            #[inline]
            fn $method(self, rhs: &Scalar) -> Scalar {
                $kernel(self, rhs)
            }
        }

        impl $trait<Scalar> for Scalar {
            type Output = Scalar;
            #[inline]
            fn $method(self, rhs: Scalar) -> Scalar {
                $kernel(&self, &rhs)
            }
        }

        impl $trait<&Scalar> for Scalar {
            type Output = Scalar;
            #[inline]
            fn $method(self, rhs: &Scalar) -> Scalar {
                $kernel(&self, rhs)
            }
        }

        impl $trait<Scalar> for &Scalar {
            type Output = Scalar;
            #[inline]
            fn $method(self, rhs: Scalar) -> Scalar {
                $kernel(self, &rhs)
            }
        }

        impl $trait<f64> for Scalar {
            type Output = Scalar;
            #[inline]
            fn $method(self, rhs: f64) -> Scalar {
                $kernel(&self, &Scalar::Real(rhs))
            }
        }

        impl $trait<f64> for &Scalar {
            type Output = Scalar;
            #[inline]
            fn $method(self, rhs: f64) -> Scalar {
                $kernel(self, &Scalar::Real(rhs))
            }
        }

        impl $trait<Scalar> for f64 {
            type Output = Scalar;
            #[inline]
            fn $method(self, rhs: Scalar) -> Scalar {
                $kernel(&Scalar::Real(self), &rhs)
            }
        }

        impl $trait<&Scalar> for f64 {
            type Output = Scalar;
            #[inline]
            fn $method(self, rhs: &Scalar) -> Scalar {
                $kernel(&Scalar::Real(self), rhs)
            }
        }
    };
}

scalar_binop!(Add, add, add_kernel);
scalar_binop!(Sub, sub, sub_kernel);
scalar_binop!(Mul, mul, mul_kernel);
scalar_binop!(Div, div, div_kernel);

impl Neg for Scalar {
    type Output = Scalar;
    #[inline]
    fn neg(self) -> Scalar {
        self.unary(-self.real(), -1.0)
    }
}

impl Neg for &Scalar {
    type Output = Scalar;
    #[inline]
    fn neg(self) -> Scalar {
        self.unary(-self.real(), -1.0)
    }
}

impl AddAssign<Scalar> for Scalar {
    fn add_assign(&mut self, rhs: Scalar) {
        *self = add_kernel(self, &rhs);
    }
}

impl AddAssign<&Scalar> for Scalar {
    fn add_assign(&mut self, rhs: &Scalar) {
        *self = add_kernel(self, rhs);
    }
}

impl SubAssign<Scalar> for Scalar {
    fn sub_assign(&mut self, rhs: Scalar) {
        *self = sub_kernel(self, &rhs);
    }
}

impl Sum for Scalar {
    fn sum<I: Iterator<Item = Scalar>>(iter: I) -> Self {
        iter.fold(Scalar::Real(0.0), |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Scalar> for Scalar {
    fn sum<I: Iterator<Item = &'a Scalar>>(iter: I) -> Self {
        iter.fold(Scalar::Real(0.0), |acc, x| acc + x)
    }
}
