use crate::error::Result;
use crate::scalar::Scalar;
use crate::selection::Selection;
use crate::store::VarStore;

/// A probabilistic model that adds its log-joint density into a store.
///
/// Implementations read variable values from the store and call
/// [`VarStore::accumulate`] for every density term. They must work with
/// whatever variant the store holds (real or dual), which `Scalar`
/// arithmetic takes care of.
pub trait Model {
    fn evaluate(&self, store: &mut VarStore, selection: Option<&Selection>) -> anyhow::Result<()>;
}

impl<F> Model for F
where
    F: Fn(&mut VarStore, Option<&Selection>) -> anyhow::Result<()>,
{
    fn evaluate(&self, store: &mut VarStore, selection: Option<&Selection>) -> anyhow::Result<()> {
        self(store, selection)
    }
}

/// Evaluate `model` over `store` with the accumulator reset to `zero`.
///
/// `zero` pins the accumulator's type before any term is added, so a pass
/// seeded with width-`D` duals always ends with a width-`D` dual (or a real
/// if the model never touched a seeded value).
pub fn run_model<M: Model + ?Sized>(
    model: &M,
    store: &mut VarStore,
    selection: Option<&Selection>,
    zero: Scalar,
) -> Result<()> {
    store.reset_log_density(zero);
    model.evaluate(store, selection)?;
    Ok(())
}
