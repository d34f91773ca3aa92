use log::{debug, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::config::GradientConfig;
use crate::error::Result;
use crate::hmc::{self, ChainResult, HmcConfig};
use crate::model::Model;
use crate::selection::{select_keys, Selection};
use crate::store::VarStore;

/// Configuration for the multi-chain sampler.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub num_chains: usize,
    pub num_draws: usize,
    pub num_warmup: usize,
    pub step_size: f64,
    pub num_leapfrog_steps: usize,
    pub seed: u64,
    /// Number of threads. 0 means use Rayon's default (all cores).
    pub num_threads: usize,
    pub gradient: GradientConfig,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            num_chains: 4,
            num_draws: 1000,
            num_warmup: 500,
            step_size: 0.1,
            num_leapfrog_steps: 15,
            seed: 42,
            num_threads: 0,
            gradient: GradientConfig::default(),
        }
    }
}

/// Result of sampling across all chains.
#[derive(Debug, Clone)]
pub struct SampleResult {
    /// samples[chain][draw][param]
    pub samples: Vec<Vec<Vec<f64>>>,
    pub accept_rates: Vec<f64>,
    pub invalid_gradients: Vec<usize>,
    /// One name per flattened coordinate: `x` for scalars, `theta.1` for
    /// the second element of a vector-valued `theta`.
    pub param_names: Vec<String>,
}

impl SampleResult {
    /// Get posterior mean for each parameter.
    pub fn mean(&self) -> Vec<f64> {
        let n_params = self.param_names.len();
        let mut sums = vec![0.0; n_params];
        let mut count = 0usize;

        for chain in &self.samples {
            for draw in chain {
                for (i, v) in draw.iter().enumerate() {
                    sums[i] += v;
                }
                count += 1;
            }
        }

        sums.iter().map(|s| s / count as f64).collect()
    }

    /// Get posterior standard deviation for each parameter.
    pub fn std(&self) -> Vec<f64> {
        let means = self.mean();
        let n_params = self.param_names.len();
        let mut sum_sq = vec![0.0; n_params];
        let mut count = 0usize;

        for chain in &self.samples {
            for draw in chain {
                for (i, v) in draw.iter().enumerate() {
                    let diff = v - means[i];
                    sum_sq[i] += diff * diff;
                }
                count += 1;
            }
        }

        sum_sq.iter().map(|s| (s / count as f64).sqrt()).collect()
    }
}

fn param_names(store: &VarStore, selection: Option<&Selection>) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for key in select_keys(store, selection) {
        let dim = store.dim(&key)?;
        if dim == 1 {
            names.push(key.to_string());
        } else {
            names.extend((0..dim).map(|i| format!("{}.{}", key, i)));
        }
    }
    Ok(names)
}

/// Run parallel HMC chains, each from its own copy of `store`.
///
/// Each chain gets a deterministic RNG seeded from `config.seed + chain_index`,
/// guaranteeing reproducible results regardless of thread scheduling. Within
/// a chain every gradient is still computed chunk by chunk, sequentially.
pub fn sample<M>(
    store: &VarStore,
    model: &M,
    selection: Option<&Selection>,
    config: &SamplerConfig,
) -> Result<SampleResult>
where
    M: Model + Sync + ?Sized,
{
    config.gradient.validate()?;

    if config.num_threads > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_threads)
            .build_global()
        {
            warn!(
                "could not set up a {}-thread pool, using the existing one: {}",
                config.num_threads, e
            );
        }
    }

    let param_names = param_names(store, selection)?;

    let hmc_config = HmcConfig {
        step_size: config.step_size,
        num_leapfrog_steps: config.num_leapfrog_steps,
        num_draws: config.num_draws,
        num_warmup: config.num_warmup,
        ..HmcConfig::default()
    };

    debug!(
        "sampling {} chains over {} coordinates",
        config.num_chains,
        param_names.len()
    );

    let stores: Vec<VarStore> = (0..config.num_chains).map(|_| store.clone()).collect();

    let results: Vec<ChainResult> = stores
        .into_par_iter()
        .enumerate()
        .map(|(chain_idx, mut chain_store)| {
            let mut rng = ChaCha8Rng::seed_from_u64(config.seed + chain_idx as u64);
            hmc::run_chain(
                &mut chain_store,
                model,
                selection,
                &hmc_config,
                &config.gradient,
                &mut rng,
            )
        })
        .collect::<Result<_>>()?;

    Ok(SampleResult {
        samples: results.iter().map(|r| r.samples.clone()).collect(),
        accept_rates: results.iter().map(|r| r.accept_rate).collect(),
        invalid_gradients: results.iter().map(|r| r.invalid_gradients).collect(),
        param_names,
    })
}
