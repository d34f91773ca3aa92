use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::store::{GroupId, VarKey, VarStore};

/// The sampler context a gradient is taken for: the sampler's group plus
/// the symbols of global variables it also owns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub group: GroupId,
    #[serde(default)]
    pub space: BTreeSet<String>,
}

impl Selection {
    pub fn new(group: GroupId) -> Self {
        Self {
            group,
            space: BTreeSet::new(),
        }
    }

    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.space.extend(symbols.into_iter().map(Into::into));
        self
    }

    /// A variable is selected when it belongs to this group, or when it is
    /// global and its symbol is in the space.
    pub fn admits(&self, key: &VarKey, group: GroupId) -> bool {
        group == self.group || (group.is_global() && self.space.contains(key.symbol()))
    }
}

/// Keys of `store` admitted by `selection`, in store order. `None` admits
/// every key.
pub fn select_keys(store: &VarStore, selection: Option<&Selection>) -> Vec<VarKey> {
    store
        .iter_groups()
        .filter(|(key, group)| selection.map_or(true, |s| s.admits(key, *group)))
        .map(|(key, _)| key.clone())
        .collect()
}
