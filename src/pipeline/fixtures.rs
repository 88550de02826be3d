//! Small deterministic causal worlds for unit tests

use ndarray::{Array2, array};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;

use super::environment::CausalEnvironment;
use crate::{
    agents::AgentBatch,
    causal::{
        BestResponseSolver, CostModel, GroundTruthLabeler, SolverConfig, StructuralMechanism,
        TrickyFeature,
    },
    model::{Arch, ModelSpec},
    types::FeaturePartition,
};

/// Two causal features, one effect feature, one extra latent.
pub(crate) fn environment() -> CausalEnvironment {
    let mut base = ModelSpec::new(Arch::Linear, 4, 0).build().unwrap();
    base.set_parameters(array![1.0, 1.0, 0.5, 0.0, 0.2].view())
        .unwrap();
    let labeler = GroundTruthLabeler::new(
        base,
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

pub(crate) fn agents(env: &CausalEnvironment, n: usize, seed: u64) -> AgentBatch {
    let layout = FeaturePartition::new(vec![0, 1], vec![2], vec![3], 4)
        .unwrap()
        .layout();
    let mut rng = StdRng::seed_from_u64(seed);
    let causal: Array2<f64> = Array2::from_shape_simple_fn((n, 2), || rng.sample(StandardNormal));
    let latent: Array2<f64> = Array2::from_shape_simple_fn((n, 2), || rng.sample(StandardNormal));
    let effect = env.mechanism.derive_effect(latent.view()).unwrap();
    let labels = env
        .labeler
        .label_batch(causal.view(), effect.view(), latent.view())
        .unwrap();
    AgentBatch::new(layout, causal, effect, latent, labels).unwrap()
}
