use std::collections::HashMap;
use std::fmt::{self, Display};
use std::ops::Index;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::store::VarKey;

/// Partial derivatives of the negative log density, one vector per key.
///
/// Keeps insertion order, which for a computed gradient is the order the
/// keys were selected in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GradientMap {
    entries: Vec<(VarKey, Vec<f64>)>,
    key_to_entry: HashMap<VarKey, usize>,
}

impl GradientMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            entries: Vec::with_capacity(n),
            key_to_entry: HashMap::with_capacity(n),
        }
    }

    /// Insert or replace the entry for `key`, returning the old vector.
    pub fn insert(&mut self, key: VarKey, grad: Vec<f64>) -> Option<Vec<f64>> {
        match self.key_to_entry.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, grad)),
            None => {
                self.key_to_entry.insert(key.clone(), self.entries.len());
                self.entries.push((key, grad));
                None
            }
        }
    }

    pub fn get(&self, key: &VarKey) -> Option<&[f64]> {
        self.key_to_entry
            .get(key)
            .map(|&i| self.entries[i].1.as_slice())
    }

    pub fn contains_key(&self, key: &VarKey) -> bool {
        self.key_to_entry.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &VarKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VarKey, &[f64])> {
        self.entries.iter().map(|(k, g)| (k, g.as_slice()))
    }

    /// All partials concatenated in insertion order.
    pub fn flatten(&self) -> Vec<f64> {
        self.entries
            .iter()
            .flat_map(|(_, g)| g.iter().copied())
            .collect()
    }
}

impl Index<&VarKey> for GradientMap {
    type Output = [f64];

    fn index(&self, key: &VarKey) -> &[f64] {
        match self.get(key) {
            Some(g) => g,
            None => panic!("no gradient for `{}`", key),
        }
    }
}

impl FromIterator<(VarKey, Vec<f64>)> for GradientMap {
    fn from_iter<I: IntoIterator<Item = (VarKey, Vec<f64>)>>(iter: I) -> Self {
        let mut map = GradientMap::new();
        for (k, g) in iter {
            map.insert(k, g);
        }
        map
    }
}

impl Display for GradientMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, g)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {:?}", k, g)?;
        }
        f.write_str("}")
    }
}

/// How much the validator logs when it finds a non-finite partial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLevel {
    Silent,
    /// Name the offending keys.
    #[default]
    Summary,
    /// Dump the whole map.
    Full,
}

/// True iff every partial in `grad` is finite.
///
/// A failed check is a diagnostic, not an error: the caller decides whether
/// to retry, reject the step or abort.
pub fn verify_gradient(grad: &GradientMap, level: ReportLevel) -> bool {
    let offending: Vec<String> = grad
        .iter()
        .filter(|(_, g)| g.iter().any(|d| !d.is_finite()))
        .map(|(k, _)| k.to_string())
        .collect();

    if offending.is_empty() {
        return true;
    }

    match level {
        ReportLevel::Silent => {}
        ReportLevel::Summary => warn!(
            "non-finite gradient for {} of {} variables: {}",
            offending.len(),
            grad.len(),
            offending.join(", ")
        ),
        ReportLevel::Full => warn!("non-finite gradient: {}", grad),
    }
    false
}
