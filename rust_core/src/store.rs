use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scalar::Scalar;

/// Identifies one named random variable, possibly an indexed element of a
/// larger container (`theta[2]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarKey {
    symbol: String,
    indices: Vec<usize>,
}

impl VarKey {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            indices: Vec::new(),
        }
    }

    pub fn indexed(symbol: impl Into<String>, indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            symbol: symbol.into(),
            indices: indices.into_iter().collect(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }
}

impl Display for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)?;
        if !self.indices.is_empty() {
            let idx: Vec<String> = self.indices.iter().map(|i| i.to_string()).collect();
            write!(f, "[{}]", idx.join(","))?;
        }
        Ok(())
    }
}

impl From<&str> for VarKey {
    fn from(symbol: &str) -> Self {
        VarKey::new(symbol)
    }
}

/// Tag assigning a variable to one sampler. `GroupId::GLOBAL` (0) marks
/// variables not owned by any particular sampler.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GroupId(pub u32);

impl GroupId {
    pub const GLOBAL: GroupId = GroupId(0);

    pub fn is_global(self) -> bool {
        self == Self::GLOBAL
    }
}

#[derive(Debug, Clone)]
struct Entry {
    key: VarKey,
    group: GroupId,
    values: Vec<Scalar>,
    /// Real parts of `values`, filled lazily by `real_values`. Must be
    /// cleared whenever a position of `values` is rewritten.
    reals: OnceCell<Vec<f64>>,
}

/// Ordered mapping from variable key to its scalar values, plus the
/// log-density accumulator written by model evaluation.
///
/// Entries keep insertion order; that order is what key selection, chunk
/// planning and gradient flattening all follow.
#[derive(Debug, Clone)]
pub struct VarStore {
    entries: Vec<Entry>,
    key_to_entry: HashMap<VarKey, usize>,
    log_density: Scalar,
}

impl VarStore {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            key_to_entry: HashMap::new(),
            log_density: Scalar::Real(0.0),
        }
    }

    /// Append a variable with real initial values.
    pub fn push(&mut self, key: VarKey, group: GroupId, values: Vec<f64>) -> Result<()> {
        if self.key_to_entry.contains_key(&key) {
            return Err(Error::DuplicateVariable(key));
        }
        self.key_to_entry.insert(key.clone(), self.entries.len());
        self.entries.push(Entry {
            key,
            group,
            values: values.into_iter().map(Scalar::Real).collect(),
            reals: OnceCell::new(),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &VarKey) -> bool {
        self.key_to_entry.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &VarKey> {
        self.entries.iter().map(|e| &e.key)
    }

    /// Keys with their group tags, in insertion order.
    pub fn iter_groups(&self) -> impl Iterator<Item = (&VarKey, GroupId)> {
        self.entries.iter().map(|e| (&e.key, e.group))
    }

    fn entry(&self, key: &VarKey) -> Result<&Entry> {
        self.key_to_entry
            .get(key)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| Error::UnknownVariable(key.clone()))
    }

    fn entry_mut(&mut self, key: &VarKey) -> Result<&mut Entry> {
        match self.key_to_entry.get(key) {
            Some(&i) => Ok(&mut self.entries[i]),
            None => Err(Error::UnknownVariable(key.clone())),
        }
    }

    pub fn group(&self, key: &VarKey) -> Result<GroupId> {
        Ok(self.entry(key)?.group)
    }

    pub fn dim(&self, key: &VarKey) -> Result<usize> {
        Ok(self.entry(key)?.values.len())
    }

    pub fn values(&self, key: &VarKey) -> Result<&[Scalar]> {
        Ok(&self.entry(key)?.values)
    }

    pub fn scalar(&self, key: &VarKey, position: usize) -> Result<&Scalar> {
        let entry = self.entry(key)?;
        entry
            .values
            .get(position)
            .ok_or_else(|| Error::PositionOutOfRange {
                key: key.clone(),
                position,
                dim: entry.values.len(),
            })
    }

    /// Real parts of a variable's values, whatever their current variant.
    pub fn real_values(&self, key: &VarKey) -> Result<&[f64]> {
        let entry = self.entry(key)?;
        Ok(entry
            .reals
            .get_or_init(|| entry.values.iter().map(Scalar::real).collect()))
    }

    /// Replace one position, discarding derived state cached for the entry
    /// first so later reads see the new variant.
    pub fn overwrite(&mut self, key: &VarKey, position: usize, value: Scalar) -> Result<()> {
        let entry = self.entry_mut(key)?;
        let dim = entry.values.len();
        if position >= dim {
            return Err(Error::PositionOutOfRange {
                key: key.clone(),
                position,
                dim,
            });
        }
        entry.reals.take();
        entry.values[position] = value;
        Ok(())
    }

    /// Overwrite every position of `key` with plain reals.
    pub fn set_reals(&mut self, key: &VarKey, values: &[f64]) -> Result<()> {
        let dim = self.dim(key)?;
        if values.len() != dim {
            return Err(Error::LengthMismatch {
                expected: dim,
                got: values.len(),
            });
        }
        for (position, &v) in values.iter().enumerate() {
            self.overwrite(key, position, Scalar::Real(v))?;
        }
        Ok(())
    }

    pub fn log_density(&self) -> &Scalar {
        &self.log_density
    }

    /// Reset the accumulator. The variant and width of `zero` fix the type
    /// every subsequent `accumulate` promotes into.
    pub fn reset_log_density(&mut self, zero: Scalar) {
        self.log_density = zero;
    }

    pub fn accumulate(&mut self, term: Scalar) {
        self.log_density += term;
    }

    pub fn total_dim(&self, keys: &[VarKey]) -> Result<usize> {
        keys.iter().map(|k| self.dim(k)).sum()
    }

    /// Concatenate the real parts of `keys`, in order.
    pub fn flatten_reals(&self, keys: &[VarKey]) -> Result<Vec<f64>> {
        let mut flat = Vec::with_capacity(self.total_dim(keys)?);
        for key in keys {
            flat.extend_from_slice(self.real_values(key)?);
        }
        Ok(flat)
    }

    /// Inverse of `flatten_reals`.
    pub fn unflatten_reals(&mut self, keys: &[VarKey], flat: &[f64]) -> Result<()> {
        let expected = self.total_dim(keys)?;
        if flat.len() != expected {
            return Err(Error::LengthMismatch {
                expected,
                got: flat.len(),
            });
        }
        let mut offset = 0;
        for key in keys {
            let dim = self.dim(key)?;
            self.set_reals(key, &flat[offset..offset + dim])?;
            offset += dim;
        }
        Ok(())
    }
}

impl Default for VarStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dual::Dual;

    fn store() -> VarStore {
        let mut s = VarStore::new();
        s.push(VarKey::new("mu"), GroupId::GLOBAL, vec![0.5]).unwrap();
        s.push(VarKey::new("theta"), GroupId(1), vec![1.0, 2.0, 3.0])
            .unwrap();
        s
    }

    #[test]
    fn test_push_rejects_duplicates() {
        let mut s = store();
        let err = s
            .push(VarKey::new("mu"), GroupId(2), vec![1.0])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateVariable(k) if k.symbol() == "mu"));
    }

    #[test]
    fn test_keys_keep_insertion_order() {
        let s = store();
        let keys: Vec<String> = s.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["mu", "theta"]);
        assert_eq!(s.dim(&VarKey::new("theta")).unwrap(), 3);
        assert_eq!(s.total_dim(&s.keys().cloned().collect::<Vec<_>>()).unwrap(), 4);
    }

    #[test]
    fn test_overwrite_discards_cached_reals() {
        let mut s = store();
        let theta = VarKey::new("theta");
        assert_eq!(s.real_values(&theta).unwrap(), &[1.0, 2.0, 3.0]);

        s.overwrite(&theta, 1, Scalar::Dual(Dual::new(7.0, vec![1.0])))
            .unwrap();
        assert_eq!(s.real_values(&theta).unwrap(), &[1.0, 7.0, 3.0]);
        assert!(s.scalar(&theta, 1).unwrap().is_dual());
    }

    #[test]
    fn test_out_of_range_and_unknown() {
        let mut s = store();
        let err = s
            .overwrite(&VarKey::new("mu"), 1, Scalar::Real(0.0))
            .unwrap_err();
        assert!(matches!(err, Error::PositionOutOfRange { position: 1, dim: 1, .. }));
        assert!(matches!(
            s.dim(&VarKey::new("sigma")),
            Err(Error::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_flatten_roundtrip_and_length_check() {
        let mut s = store();
        let keys: Vec<VarKey> = s.keys().cloned().collect();
        assert_eq!(s.flatten_reals(&keys).unwrap(), vec![0.5, 1.0, 2.0, 3.0]);

        s.unflatten_reals(&keys, &[9.0, 8.0, 7.0, 6.0]).unwrap();
        assert_eq!(s.real_values(&VarKey::new("theta")).unwrap(), &[8.0, 7.0, 6.0]);

        let err = s.unflatten_reals(&keys, &[1.0]).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { expected: 4, got: 1 }));
    }

    #[test]
    fn test_accumulate_follows_zero_type() {
        let mut s = store();
        s.reset_log_density(Scalar::Dual(Dual::constant(0.0, 2)));
        s.accumulate(Scalar::Real(-1.5));
        assert_eq!(s.log_density().width(), Some(2));
        assert_eq!(s.log_density().real(), -1.5);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(VarKey::indexed("theta", [1, 2]).to_string(), "theta[1,2]");
        assert_eq!(VarKey::from("x").to_string(), "x");
    }
}
