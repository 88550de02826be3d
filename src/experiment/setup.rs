//! Data pipeline: from a raw labelled dataset to clean, pool, validation and
//! test agents living in one causal world

use ndarray::s;
use rand::{SeedableRng, rngs::StdRng};
use tracing::{debug, info};

use crate::{
    Error, Result,
    agents::AgentBatch,
    app::ExperimentConfig,
    causal::{GroundTruthLabeler, StructuralMechanism},
    data::{Dataset, permutation, split_point},
    model::{Arch, Classifier, Loss, ModelSpec},
    pipeline::{CausalData, LabelledSet, NonStrategicTrainer},
    ports::DatasetSource,
    types::FeaturePartition,
};

/// Everything one partition's trainers need.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub partition: FeaturePartition,
    pub mechanism: StructuralMechanism,
    pub labeler: GroundTruthLabeler,
    /// Accuracy of `h*` on its held-out split of the raw data.
    pub h_star_accuracy: f64,
    /// `train` is the clean seed set.
    pub data: CausalData,
    /// Clean seed set followed by the pool, as the SERM baseline sees it.
    pub full_train: AgentBatch,
    pub pool: AgentBatch,
}

/// Build the causal world for `partition`.
///
/// Everything here runs from `config.data_seed`, so every partition of every
/// run sees the same mechanism draw and shuffle for a given dataset.
///
/// # Errors
///
/// Returns [`Error::InvalidDataset`] when the balanced data cannot supply the
/// clean seed set or leaves validation or test empty, and propagates loader
/// and `h*` training failures.
pub fn data_setup(
    config: &ExperimentConfig,
    source: &dyn DatasetSource,
    partition: &FeaturePartition,
) -> Result<PreparedData> {
    let mut rng = StdRng::seed_from_u64(config.data_seed);
    let mechanism = StructuralMechanism::random(partition.effect_dim(), &mut rng)?;

    if source.total_dim() != partition.total_dim() {
        return Err(Error::DimensionMismatch {
            context: format!("dataset from {}", source.describe()),
            expected: partition.total_dim(),
            got: source.total_dim(),
        });
    }
    let dataset = source.load(config.data_seed, &partition.column_order())?;

    let (h_star, h_star_accuracy) = fit_h_star(config, &dataset, partition)?;
    let labeler = GroundTruthLabeler::new(h_star, config.tricky);

    let agents = build_agents(&dataset, partition, &mechanism, &labeler)?;
    let balanced = balance_classes(&agents);
    let shuffled = balanced.select(&permutation(balanced.len(), &mut rng));
    debug!(
        rows = agents.len(),
        balanced = shuffled.len(),
        positives = shuffled.positives(),
        "balanced agent population"
    );

    let (val_test_frac, test_frac) = config.split_fractions();
    let (n_train, _) = split_point(shuffled.len(), val_test_frac)?;
    let full_train = shuffled.slice(0, n_train);
    let val_test = shuffled.slice(n_train, shuffled.len());
    let (n_val, _) = split_point(val_test.len(), test_frac)?;
    let val = val_test.slice(0, n_val);
    let test = val_test.slice(n_val, val_test.len());

    if full_train.len() < config.n_clean {
        return Err(Error::InvalidDataset {
            message: format!(
                "{} training agents after balancing, {} needed for the clean seed set",
                full_train.len(),
                config.n_clean
            ),
        });
    }
    if val.is_empty() || test.is_empty() {
        return Err(Error::InvalidDataset {
            message: format!(
                "validation ({}) and test ({}) sets must be non-empty",
                val.len(),
                test.len()
            ),
        });
    }

    let clean = full_train.slice(0, config.n_clean);
    let pool = full_train.slice(config.n_clean, full_train.len());
    info!(
        partition = %partition,
        clean = clean.len(),
        pool = pool.len(),
        val = val.len(),
        test = test.len(),
        "prepared causal data"
    );

    Ok(PreparedData {
        partition: partition.clone(),
        mechanism,
        labeler,
        h_star_accuracy,
        data: CausalData {
            train: clean,
            val,
            test,
        },
        full_train,
        pool,
    })
}

/// Fit the linear ground-truth base model over `[causal | latent]`.
fn fit_h_star(
    config: &ExperimentConfig,
    dataset: &Dataset,
    partition: &FeaturePartition,
) -> Result<(Box<dyn Classifier>, f64)> {
    let (train, test) = dataset.split(0.2)?;
    let (train, val) = train.split(0.4)?;
    let as_set = |d: &Dataset| LabelledSet::new(d.features().to_owned(), d.labels().to_owned());

    let model = ModelSpec::new(Arch::Linear, partition.total_dim(), config.data_seed).build()?;
    let mut trainer = NonStrategicTrainer::new(
        model,
        as_set(&train)?,
        as_set(&val)?,
        as_set(&test)?,
        Loss::Logistic,
        config.h_star_fit_config(),
        config.data_seed,
    );
    trainer.train(config.h_star.epochs, config.h_star.early_stop)?;
    let accuracy = trainer.test().accuracy;
    info!(accuracy, "h* fitted");
    Ok((trainer.into_model(), accuracy))
}

/// Rows laid out `causal ++ effect ++ unobserved` become agents: the leading
/// causal columns stay, the rest is latent, and the effect block is derived
/// from the latent parents through the mechanism.
fn build_agents(
    dataset: &Dataset,
    partition: &FeaturePartition,
    mechanism: &StructuralMechanism,
    labeler: &GroundTruthLabeler,
) -> Result<AgentBatch> {
    let k = partition.causal_dim();
    let features = dataset.features();
    let causal = features.slice(s![.., ..k]).to_owned();
    let latent = features.slice(s![.., k..]).to_owned();
    let effect = mechanism.derive_effect(latent.view())?;
    let labels = labeler.label_batch(causal.view(), effect.view(), latent.view())?;
    AgentBatch::new(partition.layout(), causal, effect, latent, labels)
}

/// `min(#pos, #neg)` agents of each class, positives first, each class in
/// its original order.
fn balance_classes(agents: &AgentBatch) -> AgentBatch {
    let (pos, neg): (Vec<usize>, Vec<usize>) =
        (0..agents.len()).partition(|&i| agents.labels()[i] > 0.0);
    let keep = pos.len().min(neg.len());
    let indices: Vec<usize> = pos[..keep].iter().chain(&neg[..keep]).copied().collect();
    agents.select(&indices)
}
