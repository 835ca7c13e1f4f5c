//! Task runner dispatch against port doubles.

mod common;

use std::sync::Arc;

use tidewatch_core::pipeline::{PipelineMode, StoreOverrides, TrainingConfig};
use tidewatch_core::{EngineSettings, Pipeline, TaskKind};
use tidewatch_engine::{SkipReason, TaskOutcome, TaskRunner};

use common::{minutely, now, MockConfigs, MockFactory, MockModel, MockStore};

const SERIES: &str = "queue_depth";

fn runner(pipelines: Vec<Pipeline>) -> (TaskRunner, Arc<MockFactory>) {
    let store = MockStore::new(minutely(SERIES, now(), 120, 4.0));
    let model = MockModel::new(4.0, 2.0);
    let factory = MockFactory::new(model, store);
    let runner = TaskRunner::new(
        MockConfigs::with(pipelines),
        factory.clone(),
        EngineSettings::default(),
    );
    (runner, factory)
}

#[tokio::test]
async fn missing_pipeline_is_a_no_op() {
    let (runner, factory) = runner(Vec::new());

    let outcome = runner.run(TaskKind::Forecast, "ghost", now()).await.unwrap();

    assert_eq!(outcome, TaskOutcome::Skipped(SkipReason::NotFound));
    assert_eq!(factory.store.fetches(), 0);
}

#[tokio::test]
async fn disabled_pipeline_is_a_no_op() {
    let mut p = Pipeline::new("q", SERIES);
    p.enabled = false;
    let (runner, factory) = runner(vec![p]);

    let outcome = runner.run(TaskKind::Anomaly, "q", now()).await.unwrap();

    assert_eq!(outcome, TaskOutcome::Skipped(SkipReason::Disabled));
    assert_eq!(factory.store.fetches(), 0);
}

#[tokio::test]
async fn mode_excludes_forecast() {
    let mut p = Pipeline::new("q", SERIES);
    p.mode = PipelineMode::AnomalyOnly;
    let (runner, factory) = runner(vec![p]);

    let outcome = runner.run(TaskKind::Forecast, "q", now()).await.unwrap();

    assert_eq!(outcome, TaskOutcome::Skipped(SkipReason::ModeExcludes));
    assert_eq!(factory.model.predictions(), 0);
}

#[tokio::test]
async fn forecast_task_writes_rows() {
    let (runner, factory) = runner(vec![Pipeline::new("q", SERIES)]);

    let outcome = runner.run(TaskKind::Forecast, "q", now()).await.unwrap();

    assert_eq!(outcome, TaskOutcome::Forecast { rows_written: 90 });
    assert_eq!(factory.store.write_calls(), 1);
}

#[tokio::test]
async fn anomaly_task_returns_scores() {
    let (runner, _factory) = runner(vec![Pipeline::new("q", SERIES)]);

    let outcome = runner.run(TaskKind::Anomaly, "q", now()).await.unwrap();

    match outcome {
        TaskOutcome::Anomaly(series) => {
            assert_eq!(series.len(), 1);
            assert_eq!(series[0].anomalous(), 0);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn training_task_returns_model_id() {
    let mut p = Pipeline::new("q", SERIES);
    p.training = Some(TrainingConfig::default());
    let (runner, factory) = runner(vec![p]);

    let outcome = runner.run(TaskKind::Training, "q", now()).await.unwrap();

    assert_eq!(outcome, TaskOutcome::Trained(Some("model-v2".into())));
    assert_eq!(factory.model.trainings(), 1);
}

#[tokio::test]
async fn training_task_without_training_block_returns_none() {
    let (runner, factory) = runner(vec![Pipeline::new("q", SERIES)]);

    let outcome = runner.run(TaskKind::Training, "q", now()).await.unwrap();

    assert_eq!(outcome, TaskOutcome::Trained(None));
    assert_eq!(factory.store.fetches(), 0);
}

#[tokio::test]
async fn store_endpoints_honour_pipeline_overrides() {
    let mut p = Pipeline::new("q", SERIES);
    p.store = StoreOverrides {
        read_url: Some("http://replica:8428".into()),
        write_url: None,
    };
    let (runner, factory) = runner(vec![p]);

    runner.run(TaskKind::Forecast, "q", now()).await.unwrap();

    let endpoints = factory.endpoints.lock().unwrap().clone();
    assert_eq!(endpoints[0].read_url, "http://replica:8428");
    assert_eq!(endpoints[0].write_url, "http://replica:8428/api/v1/write");
}
