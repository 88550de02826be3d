//! Round-based retraining: growth, selection, rollback and reporting.

mod common;

use std::sync::{Arc, Mutex};

use cserm::{
    Error, Result, SequentialPopulationDistribution,
    pipeline::{
        FitConfig, IterativeCausalStrategicTrainer, MetricsObserver, RoundRecord, RoundSchedule,
        RoundStats, RoundStatus, TrainerConfig, TrainerPhase, select_best,
    },
    ports::{ResultsSource, RoundObserver},
};

fn trainer(pool: usize) -> IterativeCausalStrategicTrainer {
    let env = common::environment();
    let data = common::causal_data(&env, 80, 60, 60);
    let distribution = SequentialPopulationDistribution::new(common::agents(&env, pool, 404));
    let config = TrainerConfig::default()
        .with_seed(5)
        .with_fit(FitConfig::default().with_epochs(4));
    IterativeCausalStrategicTrainer::new(config, env, distribution, data).unwrap()
}

/// Records the order of hook calls.
#[derive(Clone, Default)]
struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }
}

impl RoundObserver for EventLog {
    fn on_training_start(&mut self, total_rounds: usize) -> Result<()> {
        self.push(format!("start:{total_rounds}"));
        Ok(())
    }

    fn on_initial_fit(&mut self, _stats: &RoundStats) -> Result<()> {
        self.push("initial".to_string());
        Ok(())
    }

    fn on_round_start(&mut self, round: usize) -> Result<()> {
        self.push(format!("round:{round}"));
        Ok(())
    }

    fn on_round_end(&mut self, record: &RoundRecord) -> Result<()> {
        self.push(format!("end:{}", record.round));
        Ok(())
    }

    fn on_training_end(&mut self) -> Result<()> {
        self.push("finish".to_string());
        Ok(())
    }
}

const SCHEDULE: RoundSchedule = RoundSchedule {
    time_steps: 4,
    n_samples_per_round: 25,
};

#[test]
fn every_round_adds_its_agents() {
    let mut t = trainer(100);
    t.train(&SCHEDULE).unwrap();

    assert_eq!(t.phase(), TrainerPhase::Finalized);
    assert_eq!(t.training_set().len(), 80 + 4 * 25);
    assert_eq!(t.distribution().remaining(), 0);
    let sizes: Vec<usize> = t
        .records()
        .iter()
        .map(|r| r.stats.as_ref().unwrap().n_train)
        .collect();
    assert_eq!(sizes, vec![105, 130, 155, 180]);
}

#[test]
fn observers_see_hooks_in_order() {
    let log = EventLog::default();
    let mut t = trainer(100).with_observer(Box::new(log.clone()));
    t.train(&RoundSchedule {
        time_steps: 2,
        n_samples_per_round: 10,
    })
    .unwrap();

    assert_eq!(
        log.events(),
        vec![
            "start:2", "initial", "round:0", "end:0", "round:1", "end:1", "finish"
        ]
    );
}

#[test]
fn chosen_round_maximises_validation_accuracy() {
    let mut t = trainer(100);
    let results = t.train(&SCHEDULE).unwrap().clone();

    let accs: Vec<f64> = results
        .records
        .iter()
        .map(|r| r.stats.as_ref().unwrap().accuracy_val)
        .collect();
    assert_eq!(results.chosen_round, select_best(&accs));
    let chosen = results.chosen_round.unwrap();
    assert!(accs.iter().all(|&a| a <= accs[chosen]));
    assert!(accs[..chosen].iter().all(|&a| a < accs[chosen]));
    assert_eq!(t.classifier().parameters().to_vec(), results.chosen_model.parameters);
}

#[test]
fn results_source_reports_chosen_stats_and_trajectory() {
    let mut t = trainer(100);
    t.train(&SCHEDULE).unwrap();

    let (chosen, trajectory) = t.collect_results("CSERM").unwrap();
    assert_eq!(chosen.label, "CSERM");
    assert_eq!(trajectory.len(), 4);
    let acc = chosen.accuracy_test().unwrap();
    assert!((0.0..=1.0).contains(&acc));
    let round = chosen.chosen_round.unwrap();
    assert_eq!(trajectory[round]["accuracy_test"], acc);
    assert_eq!(trajectory[round]["round"], round as f64);
}

#[test]
fn auxiliary_model_is_reported_when_enabled() {
    let mut t = trainer(100);
    let results = t.train(&SCHEDULE).unwrap();
    let stats = results.records[0].stats.as_ref().unwrap();
    assert!(stats.h_accuracy_val.is_some());
    assert!(stats.h_accuracy_test.is_some());
}

#[test]
fn runs_are_reproducible() {
    let mut a = trainer(100);
    let mut b = trainer(100);
    let ra = a.train(&SCHEDULE).unwrap().clone();
    let rb = b.train(&SCHEDULE).unwrap().clone();
    assert_eq!(ra, rb);
}

#[test]
fn short_pool_fails_before_any_round() {
    let metrics = MetricsObserver::new();
    let mut t = trainer(99).with_observer(Box::new(metrics.clone()));
    let err = t.train(&SCHEDULE).unwrap_err();

    assert!(matches!(err, Error::InsufficientPool { available: 99, .. }));
    assert_eq!(t.phase(), TrainerPhase::Initialized);
    assert!(t.records().is_empty());
    assert_eq!(metrics.summary().total_rounds, 0);
}

#[test]
fn diverging_round_is_rolled_back_and_reported() {
    let env = common::environment();
    let data = common::causal_data(&env, 80, 60, 60);
    let mut pool = common::agents(&env, 50, 404);
    let poisoned = pool.slice(25, 50);
    let bad = poisoned
        .with_manipulation(
            poisoned.causal().mapv(|_| f64::INFINITY),
            poisoned.effect().to_owned(),
            poisoned.labels().to_owned(),
        )
        .unwrap();
    pool.truncate(25);
    pool.append(&bad).unwrap();

    let metrics = MetricsObserver::new();
    let config = TrainerConfig::default().with_fit(FitConfig::default().with_epochs(3));
    let mut t = IterativeCausalStrategicTrainer::new(
        config,
        env,
        SequentialPopulationDistribution::new(pool),
        data,
    )
    .unwrap()
    .with_observer(Box::new(metrics.clone()));

    let err = t
        .train(&RoundSchedule {
            time_steps: 2,
            n_samples_per_round: 25,
        })
        .unwrap_err();

    assert!(matches!(err, Error::TrainingDiverged { round: 1, .. }));
    assert!(err.is_numerical());
    assert_eq!(t.training_set().len(), 80 + 25);
    assert_eq!(t.records().len(), 2);
    assert!(t.records()[0].is_completed());
    assert!(matches!(t.records()[1].status, RoundStatus::Diverged { .. }));
    assert_eq!(
        t.classifier().parameters().to_vec(),
        t.records()[1].deployed.parameters
    );
    assert!(t.results().is_none());
    let summary = metrics.summary();
    assert_eq!(summary.completed_rounds, 1);
    assert_eq!(summary.diverged_rounds, 1);
}
