use approx::assert_relative_eq;
use chunkgrad_core::distributions::{half_normal, normal};
use chunkgrad_core::{
    gradient, log_density, value_and_gradient, verify_gradient, GradientConfig, GroupId, Model,
    ReportLevel, Scalar, Selection, VarKey, VarStore,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// log p = -Σ (v - center)^2 over every value in the store.
struct SquaredDeviation {
    center: f64,
}

impl Model for SquaredDeviation {
    fn evaluate(&self, store: &mut VarStore, _: Option<&Selection>) -> anyhow::Result<()> {
        let keys: Vec<VarKey> = store.keys().cloned().collect();
        let mut total = Scalar::Real(0.0);
        for key in &keys {
            for v in store.values(key)? {
                total += (v - self.center).square();
            }
        }
        store.accumulate(-total);
        Ok(())
    }
}

/// Hierarchical normal: mu ~ N(0, 5), tau ~ HalfNormal(2),
/// theta[i] ~ N(mu, tau), y[i] ~ N(theta[i], 1).
struct Hierarchical {
    y: Vec<f64>,
}

impl Model for Hierarchical {
    fn evaluate(&self, store: &mut VarStore, _: Option<&Selection>) -> anyhow::Result<()> {
        let mu = store.scalar(&VarKey::new("mu"), 0)?.clone();
        let tau = store.scalar(&VarKey::new("tau"), 0)?.clone();
        let theta = store.values(&VarKey::new("theta"))?.to_vec();

        store.accumulate(normal(&mu, &Scalar::Real(0.0), &Scalar::Real(5.0)));
        store.accumulate(half_normal(&tau, &Scalar::Real(2.0)));
        for (t, y) in theta.iter().zip(&self.y) {
            store.accumulate(normal(t, &mu, &tau));
            store.accumulate(normal(&Scalar::Real(*y), t, &Scalar::Real(1.0)));
        }
        Ok(())
    }
}

fn random_store(rng: &mut ChaCha8Rng, n_keys: usize) -> VarStore {
    let mut store = VarStore::new();
    for i in 0..n_keys {
        let dim = rng.gen_range(0..5);
        let values = (0..dim).map(|_| rng.gen_range(-3.0..3.0)).collect();
        let group = GroupId(rng.gen_range(0..3));
        store.push(VarKey::indexed("v", [i]), group, values).unwrap();
    }
    store
}

fn hierarchical_store() -> VarStore {
    let mut store = VarStore::new();
    store.push(VarKey::new("mu"), GroupId(1), vec![0.3]).unwrap();
    store.push(VarKey::new("tau"), GroupId(1), vec![1.2]).unwrap();
    store
        .push(VarKey::new("theta"), GroupId(2), vec![0.1, -0.4, 0.9, 1.5])
        .unwrap();
    store
}

#[test]
fn test_chunking_is_transparent() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let store = random_store(&mut rng, 12);
    let all: Vec<VarKey> = store.keys().cloned().collect();
    let total = store.total_dim(&all).unwrap().max(1);
    let model = SquaredDeviation { center: 0.7 };

    let fine = gradient(&store, &model, None, &GradientConfig::with_chunk_width(1)).unwrap();
    let single =
        gradient(&store, &model, None, &GradientConfig::with_chunk_width(total)).unwrap();
    let mid = gradient(&store, &model, None, &GradientConfig::with_chunk_width(3)).unwrap();

    for key in &all {
        let expected: Vec<f64> = store
            .real_values(key)
            .unwrap()
            .iter()
            .map(|v| 2.0 * (v - 0.7))
            .collect();
        for grad in [&fine, &single, &mid] {
            let g = &grad[key];
            assert_eq!(g.len(), expected.len());
            for (a, b) in g.iter().zip(&expected) {
                assert_relative_eq!(*a, *b, max_relative = 1e-9);
            }
        }
    }
}

#[test]
fn test_gradient_lengths_match_store() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let store = random_store(&mut rng, 20);
    let grad = gradient(
        &store,
        &SquaredDeviation { center: 0.0 },
        None,
        &GradientConfig::with_chunk_width(4),
    )
    .unwrap();
    assert_eq!(grad.len(), store.len());
    for key in store.keys() {
        assert_eq!(grad[key].len(), store.dim(key).unwrap());
    }
    let order: Vec<&VarKey> = grad.keys().collect();
    let expected: Vec<&VarKey> = store.keys().collect();
    assert_eq!(order, expected);
}

#[test]
fn test_group_selection_restricts_keys() {
    let store = hierarchical_store();
    let model = Hierarchical {
        y: vec![0.5, -0.2, 1.1, 2.0],
    };

    let sel_a = Selection::new(GroupId(1));
    let grad = gradient(&store, &model, Some(&sel_a), &GradientConfig::default()).unwrap();
    let keys: Vec<String> = grad.keys().map(|k| k.to_string()).collect();
    assert_eq!(keys, vec!["mu", "tau"]);

    let sel_b = Selection::new(GroupId(2));
    let grad = gradient(&store, &model, Some(&sel_b), &GradientConfig::default()).unwrap();
    let keys: Vec<String> = grad.keys().map(|k| k.to_string()).collect();
    assert_eq!(keys, vec!["theta"]);
}

#[test]
fn test_matches_finite_differences() {
    let store = hierarchical_store();
    let model = Hierarchical {
        y: vec![0.5, -0.2, 1.1, 2.0],
    };
    let keys: Vec<VarKey> = store.keys().cloned().collect();
    let (value, grad) =
        value_and_gradient(&store, &model, None, &GradientConfig::with_chunk_width(2)).unwrap();
    assert_relative_eq!(value, log_density(&store, &model, None).unwrap(), epsilon = 1e-12);

    let base = store.flatten_reals(&keys).unwrap();
    let analytic = grad.flatten();
    let eps = 1e-6;
    for i in 0..base.len() {
        let mut plus = store.clone();
        let mut minus = store.clone();
        let mut q = base.clone();
        q[i] += eps;
        plus.unflatten_reals(&keys, &q).unwrap();
        q[i] -= 2.0 * eps;
        minus.unflatten_reals(&keys, &q).unwrap();
        let numeric = -(log_density(&plus, &model, None).unwrap()
            - log_density(&minus, &model, None).unwrap())
            / (2.0 * eps);
        assert!(
            (analytic[i] - numeric).abs() < 1e-5,
            "coordinate {}: analytic={}, numerical={}",
            i,
            analytic[i],
            numeric
        );
    }
}

#[test]
fn test_non_finite_gradient_is_reported_not_raised() {
    let mut store = VarStore::new();
    store.push(VarKey::new("x"), GroupId::GLOBAL, vec![0.0]).unwrap();
    store.push(VarKey::new("y"), GroupId::GLOBAL, vec![1.0]).unwrap();

    fn model(store: &mut VarStore, _: Option<&Selection>) -> anyhow::Result<()> {
        let x = store.scalar(&VarKey::new("x"), 0)?.clone();
        let y = store.scalar(&VarKey::new("y"), 0)?.clone();
        // d/dx ln(x) at 0 is infinite
        store.accumulate(x.ln() + y);
        Ok(())
    }

    let grad = gradient(&store, &model, None, &GradientConfig::with_chunk_width(1)).unwrap();
    assert!(!verify_gradient(&grad, ReportLevel::Silent));
    assert_eq!(&grad[&VarKey::new("y")], &[-1.0]);
}
