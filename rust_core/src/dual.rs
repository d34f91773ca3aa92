//! Forward-mode dual numbers with a runtime number of tangent lanes.
//!
//! The lane count is only known once a chunk has been planned, so partials
//! live in a `Vec` rather than a const-generic array. Two duals can only be
//! combined when they carry the same number of lanes.

use std::fmt::{self, Display};

/// A real value paired with its partial derivatives along each seeded lane.
#[derive(Debug, Clone, PartialEq)]
pub struct Dual {
    value: f64,
    partials: Vec<f64>,
}

impl Dual {
    #[inline]
    pub fn new(value: f64, partials: Vec<f64>) -> Self {
        Self { value, partials }
    }

    /// A constant with `width` zero lanes.
    #[inline]
    pub fn constant(value: f64, width: usize) -> Self {
        Self {
            value,
            partials: vec![0.0; width],
        }
    }

    /// Build a dual whose partials are a copy of `seed`.
    ///
    /// The seeder reuses one buffer for every scalar it writes, so the copy
    /// here is what keeps each stored dual independent of that buffer.
    #[inline]
    pub fn seeded(value: f64, seed: &[f64]) -> Self {
        Self {
            value,
            partials: seed.to_vec(),
        }
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[inline]
    pub fn partials(&self) -> &[f64] {
        &self.partials
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.partials.len()
    }

    /// Chain rule for a unary function: given `f(x)` and `f'(x)`.
    #[inline]
    pub(crate) fn chain(&self, value: f64, deriv: f64) -> Self {
        Self {
            value,
            partials: self.partials.iter().map(|d| d * deriv).collect(),
        }
    }

    /// Chain rule for a binary function with partial derivatives `da`, `db`.
    ///
    /// Panics when the lane counts differ; that can only happen if values
    /// seeded for different chunks are mixed.
    #[inline]
    pub(crate) fn combine(&self, other: &Dual, value: f64, da: f64, db: f64) -> Self {
        assert_eq!(
            self.width(),
            other.width(),
            "cannot combine duals of width {} and {}",
            self.width(),
            other.width()
        );
        Self {
            value,
            partials: self
                .partials
                .iter()
                .zip(other.partials.iter())
                .map(|(a, b)| da * a + db * b)
                .collect(),
        }
    }
}

impl Display for Dual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)?;
        for (i, d) in self.partials.iter().enumerate() {
            write!(f, " + {}\u{03b5}{}", d, i)?;
        }
        Ok(())
    }
}
