use crate::error::Result;
use crate::store::VarKey;

/// A run of consecutive selected keys differentiated in one forward pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub keys: Vec<VarKey>,
    /// Total scalar dimension of `keys`; also the dual width for the pass.
    pub dim: usize,
}

/// Split `keys` into consecutive chunks of total dimension at most `width`.
///
/// Greedy left to right: a key that would push the running total past
/// `width` closes the current chunk first. The check only fires on a
/// non-empty chunk, so a key wider than `width` ends up alone in an
/// oversized chunk rather than failing.
pub fn plan_chunks<F>(keys: &[VarKey], mut dim_of: F, width: usize) -> Result<Vec<Chunk>>
where
    F: FnMut(&VarKey) -> Result<usize>,
{
    let mut chunks = Vec::new();
    let mut current = Chunk {
        keys: Vec::new(),
        dim: 0,
    };

    for key in keys {
        let dim = dim_of(key)?;
        if current.dim + dim > width && !current.keys.is_empty() {
            chunks.push(std::mem::replace(
                &mut current,
                Chunk {
                    keys: Vec::new(),
                    dim: 0,
                },
            ));
        }
        current.keys.push(key.clone());
        current.dim += dim;
    }

    if !current.keys.is_empty() {
        chunks.push(current);
    }
    Ok(chunks)
}
