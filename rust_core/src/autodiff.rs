//! Chunked forward-mode gradients of a model's log-joint density.
//!
//! The selected keys are split into chunks of bounded scalar dimension. For
//! each chunk the working store is re-seeded (one-hot duals for the chunk,
//! plain reals elsewhere), the model is run once, and the partials of the
//! resulting log density are sliced back out per key. Chunks run strictly
//! one after another on a single private copy of the store.

use std::collections::HashSet;

use log::{debug, trace};

use crate::chunk::{plan_chunks, Chunk};
use crate::config::GradientConfig;
use crate::dual::Dual;
use crate::error::{Error, Result};
use crate::gradient::GradientMap;
use crate::model::{run_model, Model};
use crate::scalar::Scalar;
use crate::selection::{select_keys, Selection};
use crate::store::{VarKey, VarStore};

/// Rewrite every selected key's values for one chunk's forward pass.
///
/// Chunk members become duals of width `chunk.dim` with a one-hot seed at
/// their chunk-local lane (keys in chunk order, positions in key order).
/// Every other selected key is written back as a plain real so it carries
/// no sensitivity into this pass.
pub fn seed_chunk(store: &mut VarStore, selected: &[VarKey], chunk: &Chunk) -> Result<()> {
    let actual = store.total_dim(&chunk.keys)?;
    if actual != chunk.dim {
        return Err(Error::LengthMismatch {
            expected: chunk.dim,
            got: actual,
        });
    }

    let members: HashSet<&VarKey> = chunk.keys.iter().collect();
    let mut seed = vec![0.0; chunk.dim];
    let mut lane = 0;

    for key in &chunk.keys {
        for position in 0..store.dim(key)? {
            let value = store.scalar(key, position)?.real();
            seed[lane] = 1.0;
            store.overwrite(key, position, Scalar::Dual(Dual::seeded(value, &seed)))?;
            seed[lane] = 0.0;
            lane += 1;
        }
    }

    for key in selected.iter().filter(|k| !members.contains(k)) {
        for position in 0..store.dim(key)? {
            let value = store.scalar(key, position)?.real();
            store.overwrite(key, position, Scalar::Real(value))?;
        }
    }

    trace!("seeded {} keys over {} lanes", chunk.keys.len(), chunk.dim);
    Ok(())
}

/// Slice the negated partials of `log_density` back into `grad`, one entry
/// per chunk key, using the lane layout of [`seed_chunk`].
///
/// A real `log_density` means the model never read a seeded value, so every
/// partial is zero.
pub fn extract_chunk(
    log_density: &Scalar,
    chunk: &Chunk,
    store: &VarStore,
    grad: &mut GradientMap,
) -> Result<()> {
    let zeros;
    let partials: &[f64] = match log_density {
        Scalar::Real(_) => {
            zeros = vec![0.0; chunk.dim];
            &zeros
        }
        Scalar::Dual(d) if d.width() == chunk.dim => d.partials(),
        Scalar::Dual(d) => {
            return Err(Error::LengthMismatch {
                expected: chunk.dim,
                got: d.width(),
            })
        }
    };

    let mut offset = 0;
    for key in &chunk.keys {
        let dim = store.dim(key)?;
        if offset + dim > partials.len() {
            return Err(Error::LengthMismatch {
                expected: offset + dim,
                got: partials.len(),
            });
        }
        let g = partials[offset..offset + dim].iter().map(|d| -d).collect();
        let previous = grad.insert(key.clone(), g);
        debug_assert!(previous.is_none(), "gradient for {} written twice", key);
        offset += dim;
    }
    Ok(())
}

/// Run every chunk over `work`. Returns the gradient and, if at least one
/// chunk ran, the real part of the last log density seen.
fn chunked_pass<M: Model + ?Sized>(
    work: &mut VarStore,
    model: &M,
    selection: Option<&Selection>,
    config: &GradientConfig,
) -> Result<(Option<f64>, GradientMap)> {
    config.validate()?;

    let selected = select_keys(work, selection);
    let chunks = plan_chunks(&selected, |key| work.dim(key), config.chunk_width)?;
    debug!(
        "gradient over {} keys in {} chunks (width {})",
        selected.len(),
        chunks.len(),
        config.chunk_width
    );

    let mut grad = GradientMap::with_capacity(selected.len());
    let mut value = None;

    for (i, chunk) in chunks.iter().enumerate() {
        trace!("chunk {}/{}: dim {}", i + 1, chunks.len(), chunk.dim);
        seed_chunk(work, &selected, chunk)?;
        run_model(
            model,
            work,
            selection,
            Scalar::Dual(Dual::constant(0.0, chunk.dim)),
        )?;
        extract_chunk(work.log_density(), chunk, work, &mut grad)?;
        value = Some(work.log_density().real());
    }

    Ok((value, grad))
}

/// Gradient of the negative log-joint density of `model` with respect to
/// the keys of `store` admitted by `selection`.
///
/// `store` is never modified; all seeding happens on a private copy. An
/// empty selection yields an empty map without evaluating the model.
pub fn gradient<M: Model + ?Sized>(
    store: &VarStore,
    model: &M,
    selection: Option<&Selection>,
    config: &GradientConfig,
) -> Result<GradientMap> {
    let mut work = store.clone();
    let (_, grad) = chunked_pass(&mut work, model, selection, config)?;
    Ok(grad)
}

/// Like [`gradient`], also returning the log-joint density at the point.
pub fn value_and_gradient<M: Model + ?Sized>(
    store: &VarStore,
    model: &M,
    selection: Option<&Selection>,
    config: &GradientConfig,
) -> Result<(f64, GradientMap)> {
    let mut work = store.clone();
    let (value, grad) = chunked_pass(&mut work, model, selection, config)?;
    let value = match value {
        Some(v) => v,
        None => {
            run_model(model, &mut work, selection, Scalar::Real(0.0))?;
            work.log_density().real()
        }
    };
    Ok((value, grad))
}

/// Plain real evaluation of the log-joint density.
pub fn log_density<M: Model + ?Sized>(
    store: &VarStore,
    model: &M,
    selection: Option<&Selection>,
) -> Result<f64> {
    let mut work = store.clone();
    run_model(model, &mut work, selection, Scalar::Real(0.0))?;
    Ok(work.log_density().real())
}
