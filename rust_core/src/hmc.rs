use log::debug;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::autodiff::value_and_gradient;
use crate::config::GradientConfig;
use crate::error::{Error, Result};
use crate::gradient::verify_gradient;
use crate::model::Model;
use crate::selection::{select_keys, Selection};
use crate::store::{VarKey, VarStore};

/// Configuration for the HMC sampler.
#[derive(Debug, Clone)]
pub struct HmcConfig {
    pub step_size: f64,
    pub num_leapfrog_steps: usize,
    pub num_draws: usize,
    pub num_warmup: usize,
    pub target_accept: f64,
}

impl Default for HmcConfig {
    fn default() -> Self {
        Self {
            step_size: 0.01,
            num_leapfrog_steps: 20,
            num_draws: 1000,
            num_warmup: 500,
            target_accept: 0.65,
        }
    }
}

/// Result of a single HMC chain run.
#[derive(Debug, Clone)]
pub struct ChainResult {
    /// One flattened position per draw, laid out like `select_keys` order.
    pub samples: Vec<Vec<f64>>,
    pub accept_rate: f64,
    /// Proposals dropped because a gradient failed validation.
    pub invalid_gradients: usize,
}

/// Log density and flattened gradient of the negative log density at `q`,
/// or `None` when the gradient is not finite.
fn evaluate<M: Model + ?Sized>(
    store: &mut VarStore,
    keys: &[VarKey],
    q: &[f64],
    model: &M,
    selection: Option<&Selection>,
    grad_config: &GradientConfig,
) -> Result<Option<(f64, Vec<f64>)>> {
    store.unflatten_reals(keys, q)?;
    let (logp, grad) = value_and_gradient(store, model, selection, grad_config)?;
    if !logp.is_finite() || !verify_gradient(&grad, grad_config.report) {
        return Ok(None);
    }
    Ok(Some((logp, grad.flatten())))
}

/// Run a single HMC chain over the keys of `store` admitted by `selection`.
///
/// The chain starts from the store's current values and leaves the store at
/// the last retained position. A proposal whose gradient fails validation
/// is rejected like any other.
pub fn run_chain<M: Model + ?Sized>(
    store: &mut VarStore,
    model: &M,
    selection: Option<&Selection>,
    config: &HmcConfig,
    grad_config: &GradientConfig,
    rng: &mut ChaCha8Rng,
) -> Result<ChainResult> {
    let keys = select_keys(store, selection);
    let mut q = store.flatten_reals(&keys)?;
    let dim = q.len();
    let total_iters = config.num_warmup + config.num_draws;

    let (mut logp_current, mut grad_current) =
        evaluate(store, &keys, &q, model, selection, grad_config)?.ok_or(Error::NonFiniteStart)?;

    let mut samples = Vec::with_capacity(config.num_draws);
    let mut accepted = 0u64;
    let mut total = 0u64;
    let mut invalid_gradients = 0usize;

    // Dual-averaging step-size adaptation during warmup
    let mut step_size = config.step_size;
    let mu = (10.0 * step_size).ln();
    let gamma = 0.05;
    let t0 = 10.0;
    let kappa = 0.75;
    let mut log_eps_bar = 0.0f64;
    let mut h_bar = 0.0f64;

    for iter in 0..total_iters {
        let is_warmup = iter < config.num_warmup;

        let p: Vec<f64> = (0..dim).map(|_| StandardNormal.sample(rng)).collect();

        let mut q_prop = q.clone();
        let mut p_prop = p.clone();
        let mut grad = grad_current.clone();
        let mut logp_prop = logp_current;
        let mut valid = true;

        // Gradients are of the negative log density, so momentum moves
        // against them.
        for i in 0..dim {
            p_prop[i] -= 0.5 * step_size * grad[i];
        }

        for step in 0..config.num_leapfrog_steps {
            for i in 0..dim {
                q_prop[i] += step_size * p_prop[i];
            }

            match evaluate(store, &keys, &q_prop, model, selection, grad_config)? {
                Some((lp, g)) => {
                    logp_prop = lp;
                    grad = g;
                }
                None => {
                    valid = false;
                    break;
                }
            }

            if step + 1 < config.num_leapfrog_steps {
                for i in 0..dim {
                    p_prop[i] -= step_size * grad[i];
                }
            }
        }

        let log_accept_ratio = if valid {
            for i in 0..dim {
                p_prop[i] -= 0.5 * step_size * grad[i];
            }
            let ke_current: f64 = p.iter().map(|pi| 0.5 * pi * pi).sum();
            let ke_prop: f64 = p_prop.iter().map(|pi| 0.5 * pi * pi).sum();
            (-logp_current + ke_current) - (-logp_prop + ke_prop)
        } else {
            invalid_gradients += 1;
            f64::NEG_INFINITY
        };
        let accept_prob = if log_accept_ratio.is_nan() {
            0.0
        } else {
            log_accept_ratio.min(0.0).exp()
        };

        total += 1;
        if log_accept_ratio.is_finite() && rng.gen::<f64>().ln() < log_accept_ratio {
            q = q_prop;
            logp_current = logp_prop;
            grad_current = grad;
            accepted += 1;
        }

        if is_warmup {
            let m = (iter + 1) as f64;
            let w = 1.0 / (m + t0);
            h_bar = (1.0 - w) * h_bar + w * (config.target_accept - accept_prob);
            let log_eps = mu - (m.sqrt() / gamma) * h_bar;
            step_size = log_eps.exp();
            let m_pow = m.powf(-kappa);
            log_eps_bar = m_pow * log_eps + (1.0 - m_pow) * log_eps_bar;
        }

        if iter + 1 == config.num_warmup {
            step_size = log_eps_bar.exp();
            debug!("warmup finished, step size {:.4}", step_size);
        }

        if !is_warmup {
            samples.push(q.clone());
        }
    }

    store.unflatten_reals(&keys, &q)?;

    Ok(ChainResult {
        samples,
        accept_rate: if total > 0 {
            accepted as f64 / total as f64
        } else {
            0.0
        },
        invalid_gradients,
    })
}
