//! Log-density terms for common distributions, written over [`Scalar`] so
//! the same model code serves plain evaluation and seeded forward passes.
//!
//! Shape parameters that only enter through normalising constants are
//! plain `f64`; the constants are computed once in real arithmetic.

use statrs::function::gamma::ln_gamma;

use crate::scalar::Scalar;

const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

fn out_of_support() -> Scalar {
    Scalar::Real(f64::NEG_INFINITY)
}

// ── Normal ──────────────────────────────────────────────────────────

pub fn normal(x: &Scalar, mu: &Scalar, sigma: &Scalar) -> Scalar {
    let z = (x - mu) / sigma;
    -0.5 * z.square() - sigma.ln() - LN_SQRT_2PI
}

// ── HalfNormal (x ≥ 0) ──────────────────────────────────────────────

pub fn half_normal(x: &Scalar, sigma: &Scalar) -> Scalar {
    if x.real() < 0.0 {
        return out_of_support();
    }
    let z = x / sigma;
    -0.5 * z.square() - sigma.ln() - LN_SQRT_2PI + std::f64::consts::LN_2
}

// ── Exponential (x ≥ 0) ─────────────────────────────────────────────

pub fn exponential(x: &Scalar, rate: &Scalar) -> Scalar {
    if x.real() < 0.0 {
        return out_of_support();
    }
    rate.ln() - rate * x
}

// ── Gamma (x > 0), shape/rate parameterisation ──────────────────────

pub fn gamma(x: &Scalar, shape: f64, rate: f64) -> Scalar {
    if x.real() <= 0.0 {
        return out_of_support();
    }
    let norm = shape * rate.ln() - ln_gamma(shape);
    (shape - 1.0) * x.ln() - rate * x + norm
}

// ── Beta (0 < x < 1) ────────────────────────────────────────────────

pub fn beta(x: &Scalar, alpha: f64, beta: f64) -> Scalar {
    let v = x.real();
    if v <= 0.0 || v >= 1.0 {
        return out_of_support();
    }
    let ln_beta_fn = ln_gamma(alpha) + ln_gamma(beta) - ln_gamma(alpha + beta);
    (alpha - 1.0) * x.ln() + (beta - 1.0) * (1.0 - x).ln() - ln_beta_fn
}

// ── StudentT ────────────────────────────────────────────────────────

pub fn student_t(x: &Scalar, nu: f64, mu: &Scalar, sigma: &Scalar) -> Scalar {
    let norm = ln_gamma(0.5 * (nu + 1.0))
        - ln_gamma(0.5 * nu)
        - 0.5 * (nu * std::f64::consts::PI).ln();
    let z = (x - mu) / sigma;
    norm - sigma.ln() - 0.5 * (nu + 1.0) * (z.square() / nu).ln_1p()
}

// ── Uniform (lower < x < upper) ─────────────────────────────────────

/// Flat density: contributes no sensitivity inside the support.
pub fn uniform(x: &Scalar, lower: f64, upper: f64) -> Scalar {
    let v = x.real();
    if v <= lower || v >= upper {
        return out_of_support();
    }
    Scalar::Real(-(upper - lower).ln())
}
