use chunkgrad_core::distributions::normal;
use chunkgrad_core::sampler::{sample, SamplerConfig};
use chunkgrad_core::{GradientConfig, GroupId, Scalar, Selection, VarKey, VarStore};

/// theta[i] ~ N(loc[i], 1), independently.
struct ShiftedNormal {
    loc: Vec<f64>,
}

impl chunkgrad_core::Model for ShiftedNormal {
    fn evaluate(&self, store: &mut VarStore, _: Option<&Selection>) -> anyhow::Result<()> {
        let theta = store.values(&VarKey::new("theta"))?.to_vec();
        for (t, m) in theta.iter().zip(&self.loc) {
            store.accumulate(normal(t, &Scalar::Real(*m), &Scalar::Real(1.0)));
        }
        Ok(())
    }
}

fn config() -> SamplerConfig {
    SamplerConfig {
        num_chains: 2,
        num_draws: 800,
        num_warmup: 300,
        step_size: 0.2,
        num_leapfrog_steps: 10,
        seed: 7,
        num_threads: 0,
        gradient: GradientConfig::with_chunk_width(2),
    }
}

#[test]
fn test_posterior_mean_recovered() {
    let mut store = VarStore::new();
    store
        .push(VarKey::new("theta"), GroupId(1), vec![0.0, 0.0, 0.0])
        .unwrap();
    let model = ShiftedNormal {
        loc: vec![3.0, -1.0, 0.5],
    };

    let result = sample(&store, &model, Some(&Selection::new(GroupId(1))), &config()).unwrap();

    assert_eq!(result.param_names, vec!["theta.0", "theta.1", "theta.2"]);
    assert_eq!(result.samples.len(), 2);
    assert_eq!(result.samples[0].len(), 800);
    assert!(result.invalid_gradients.iter().all(|&n| n == 0));

    let mean = result.mean();
    for (m, expected) in mean.iter().zip([3.0, -1.0, 0.5]) {
        assert!((m - expected).abs() < 0.3, "mean {} vs {}", m, expected);
    }
    let std = result.std();
    assert!(std.iter().all(|s| *s > 0.5 && *s < 1.5), "std {:?}", std);
}

#[test]
fn test_sampling_is_reproducible() {
    let mut store = VarStore::new();
    store.push(VarKey::new("theta"), GroupId(1), vec![0.0]).unwrap();
    let model = ShiftedNormal { loc: vec![1.0] };
    let cfg = SamplerConfig {
        num_draws: 50,
        num_warmup: 20,
        ..config()
    };

    let a = sample(&store, &model, None, &cfg).unwrap();
    let b = sample(&store, &model, None, &cfg).unwrap();
    assert_eq!(a.samples, b.samples);
    assert_eq!(a.param_names, vec!["theta"]);
}

#[test]
fn test_changing_thread_count_keeps_sampling() {
    let mut store = VarStore::new();
    store.push(VarKey::new("theta"), GroupId(1), vec![0.0]).unwrap();
    let model = ShiftedNormal { loc: vec![1.0] };
    let base = SamplerConfig {
        num_draws: 20,
        num_warmup: 10,
        ..config()
    };

    // The second call cannot resize the global pool; it warns and carries on.
    let first = sample(&store, &model, None, &SamplerConfig { num_threads: 2, ..base.clone() });
    let second = sample(&store, &model, None, &SamplerConfig { num_threads: 3, ..base });
    assert_eq!(first.unwrap().samples.len(), 2);
    assert_eq!(second.unwrap().samples.len(), 2);
}
