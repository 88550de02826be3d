//! Common test utilities for the cserm test suite.
//!
//! Small deterministic causal worlds and reduced experiment configurations
//! shared by the integration tests.

#![allow(dead_code)]

use cserm::{
    AgentBatch,
    app::ExperimentConfig,
    causal::{
        BestResponseSolver, CostModel, GroundTruthLabeler, SolverConfig, StructuralMechanism,
        TrickyFeature,
    },
    model::{Arch, ModelSpec},
    pipeline::{CausalData, CausalEnvironment},
    types::FeaturePartition,
};
use ndarray::{Array1, Array2, array};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;

/// Linear classifier with the given weights followed by the bias.
pub fn linear(params: &[f64]) -> Box<dyn cserm::model::Classifier> {
    let mut model = ModelSpec::new(Arch::Linear, params.len() - 1, 0)
        .build()
        .unwrap();
    model
        .set_parameters(Array1::from(params.to_vec()).view())
        .unwrap();
    model
}

/// Partition with causal `[0, 1]`, effect `[2]` and one unobserved column.
pub fn partition() -> FeaturePartition {
    FeaturePartition::new(vec![0, 1], vec![2], vec![3], 4).unwrap()
}

/// World over [`partition`]: isotropic cost, scalar mechanism and a labeler
/// driven mostly by the causal features.
pub fn environment() -> CausalEnvironment {
    let labeler = GroundTruthLabeler::new(
        linear(&[1.0, 1.0, 0.5, 0.0, 0.2]),
        TrickyFeature {
            threshold: -1.0,
            ..TrickyFeature::default()
        },
    );
    let solver = BestResponseSolver::new(
        CostModel::isotropic(2, 2.0).unwrap(),
        SolverConfig::default(),
    )
    .unwrap();
    let mechanism = StructuralMechanism::new(array![[0.8]]).unwrap();
    CausalEnvironment::new(solver, mechanism, labeler)
}

/// `n` Gaussian agents in `env`, effect derived and labelled by ground truth.
pub fn agents(env: &CausalEnvironment, n: usize, seed: u64) -> AgentBatch {
    let mut rng = StdRng::seed_from_u64(seed);
    let causal: Array2<f64> = Array2::from_shape_simple_fn((n, 2), || rng.sample(StandardNormal));
    let latent: Array2<f64> = Array2::from_shape_simple_fn((n, 2), || rng.sample(StandardNormal));
    let effect = env.mechanism.derive_effect(latent.view()).unwrap();
    let labels = env
        .labeler
        .label_batch(causal.view(), effect.view(), latent.view())
        .unwrap();
    AgentBatch::new(partition().layout(), causal, effect, latent, labels).unwrap()
}

pub fn causal_data(env: &CausalEnvironment, clean: usize, val: usize, test: usize) -> CausalData {
    CausalData {
        train: agents(env, clean, 101),
        val: agents(env, val, 202),
        test: agents(env, test, 303),
    }
}

/// Seven raw columns, three causal and two effect, with small sample counts
/// and short fits.
pub fn small_config() -> ExperimentConfig {
    ExperimentConfig::default()
        .with_features(vec![0, 1, 2], vec![3, 4], 7)
        .with_samples(60, 20, 30, 40)
        .with_time_steps(3)
        .with_epochs(3)
        .with_h_arch(None)
        .with_max_partitions(2)
}
