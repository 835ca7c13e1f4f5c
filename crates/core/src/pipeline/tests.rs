//! Tests for the pipeline model.

#[cfg(test)]
mod tests {
    use crate::error::{DurationError, PipelineError};
    use crate::pipeline::{
        AnomalyTechnique, ModelKind, Pipeline, PipelineMode, SeriesType, TrainingConfig,
    };
    use crate::schedule::TaskKind;

    fn base() -> Pipeline {
        Pipeline::new("cpu", "up")
    }

    fn field_of(err: PipelineError) -> &'static str {
        match err {
            PipelineError::Duration { field, .. } => field,
            PipelineError::Cron { field, .. } => field,
            PipelineError::Invalid { field, .. } => field,
        }
    }

    // -- defaults ----------------------------------------------------------

    #[test]
    fn defaults_match_documented_values() {
        let p = base();
        assert!(p.enabled);
        assert_eq!(p.step, "1m");
        assert_eq!(p.context_window, "1h");
        assert_eq!(p.prediction_horizon, "15m");
        assert_eq!(p.mode, PipelineMode::ForecastAndAnomaly);
        assert_eq!(p.series_type, SeriesType::Univariate);
        assert_eq!(p.forecast.schedule, "*/5 * * * *");
        assert_eq!(p.anomaly.schedule, "*/1 * * * *");
        assert_eq!(p.anomaly.technique, AnomalyTechnique::ConfidenceInterval);
        assert_eq!(p.anomaly.confidence_level, 0.95);
        assert_eq!(p.anomaly.threshold, 3.0);
        assert_eq!(p.model.kind, ModelKind::Local);
        assert_eq!(p.output.metric_prefix, "tidewatch_");
        assert!(p.training.is_none());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn yaml_with_only_required_fields_uses_defaults() {
        let p: Pipeline = serde_yaml::from_str("name: cpu\nquery: up\n").unwrap();
        assert_eq!(p, base());
    }

    #[test]
    fn yaml_missing_query_is_rejected() {
        assert!(serde_yaml::from_str::<Pipeline>("name: broken\n").is_err());
    }

    #[test]
    fn model_type_field_is_renamed() {
        let yaml = "name: p\nquery: up\nmodel:\n  type: remote\n  endpoint: http://m:8000\n";
        let p: Pipeline = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(p.model.kind, ModelKind::Remote);
        assert!(p.validate().is_ok());
    }

    // -- prediction length -------------------------------------------------

    #[test]
    fn prediction_length_is_horizon_over_step() {
        let mut p = base();
        p.step = "1m".into();
        p.context_window = "1h".into();
        p.prediction_horizon = "15m".into();
        assert_eq!(p.prediction_length().unwrap(), 15);
    }

    #[test]
    fn prediction_length_truncates() {
        let mut p = base();
        p.step = "2m".into();
        p.prediction_horizon = "5m".into();
        assert_eq!(p.prediction_length().unwrap(), 2);
    }

    #[test]
    fn prediction_length_below_one_is_an_error() {
        let mut p = base();
        p.step = "1h".into();
        p.prediction_horizon = "30m".into();
        assert_eq!(field_of(p.prediction_length().unwrap_err()), "prediction_horizon");
    }

    // -- validation --------------------------------------------------------

    #[test]
    fn invalid_duration_names_the_field() {
        let mut p = base();
        p.context_window = "1h30m".into();
        match p.validate().unwrap_err() {
            PipelineError::Duration { field, source } => {
                assert_eq!(field, "context_window");
                assert!(matches!(source, DurationError::InvalidMagnitude(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn zero_step_is_invalid() {
        let mut p = base();
        p.step = "0s".into();
        assert_eq!(field_of(p.validate().unwrap_err()), "step");
    }

    #[test]
    fn oversized_windows_are_invalid() {
        let mut p = base();
        p.context_window = "99999999d".into();
        assert_eq!(field_of(p.validate().unwrap_err()), "context_window");

        let mut p = base();
        p.training = Some(TrainingConfig {
            window: "36501d".into(),
            ..TrainingConfig::default()
        });
        assert_eq!(field_of(p.validate().unwrap_err()), "training.window");

        let mut p = base();
        p.context_window = "36500d".into();
        assert!(p.validate().is_ok());
    }

    #[test]
    fn horizon_shorter_than_step_is_invalid() {
        let mut p = base();
        p.step = "5m".into();
        p.prediction_horizon = "1m".into();
        assert_eq!(field_of(p.validate().unwrap_err()), "prediction_horizon");
    }

    #[test]
    fn invalid_cron_is_rejected() {
        let mut p = base();
        p.anomaly.schedule = "every minute".into();
        assert!(matches!(
            p.validate().unwrap_err(),
            PipelineError::Cron { field: "anomaly.schedule", .. }
        ));
    }

    #[test]
    fn training_schedule_and_window_are_validated() {
        let mut p = base();
        p.training = Some(TrainingConfig {
            window: "30x".into(),
            ..TrainingConfig::default()
        });
        assert_eq!(field_of(p.validate().unwrap_err()), "training.window");

        p.training = Some(TrainingConfig {
            schedule: "* *".into(),
            ..TrainingConfig::default()
        });
        assert_eq!(field_of(p.validate().unwrap_err()), "training.schedule");
    }

    #[test]
    fn name_with_braces_is_rejected() {
        let p = Pipeline::new("bad{name}", "up");
        assert_eq!(field_of(p.validate().unwrap_err()), "name");
        assert_eq!(field_of(Pipeline::new("", "up").validate().unwrap_err()), "name");
    }

    #[test]
    fn remote_model_requires_endpoint() {
        let mut p = base();
        p.model.kind = ModelKind::Remote;
        assert_eq!(field_of(p.validate().unwrap_err()), "model.endpoint");
    }

    #[test]
    fn confidence_level_and_threshold_bounds() {
        let mut p = base();
        p.anomaly.confidence_level = 1.0;
        assert_eq!(field_of(p.validate().unwrap_err()), "anomaly.confidence_level");

        let mut p = base();
        p.anomaly.threshold = 0.0;
        assert_eq!(field_of(p.validate().unwrap_err()), "anomaly.threshold");
    }

    #[test]
    fn quantile_override_bounds() {
        let mut p = base();
        p.forecast.quantiles = Some(vec![0.5, 1.5]);
        assert_eq!(field_of(p.validate().unwrap_err()), "forecast.quantiles");

        p.forecast.quantiles = Some(vec![0.9, 0.1, 0.5]);
        assert!(p.validate().is_ok());
        assert_eq!(p.quantile_levels(), vec![0.1, 0.5, 0.9]);
    }

    #[test]
    fn covariate_pipeline_needs_covariates() {
        let mut p = base();
        p.series_type = SeriesType::Covariate;
        assert_eq!(field_of(p.validate().unwrap_err()), "covariates");
    }

    // -- task helpers ------------------------------------------------------

    #[test]
    fn task_enabled_respects_master_switch() {
        let mut p = base();
        assert!(p.task_enabled(TaskKind::Forecast));
        assert!(p.task_enabled(TaskKind::Anomaly));
        assert!(!p.task_enabled(TaskKind::Training));

        p.training = Some(TrainingConfig::default());
        assert!(p.task_enabled(TaskKind::Training));

        p.enabled = false;
        for kind in TaskKind::ALL {
            assert!(!p.task_enabled(kind), "{kind}");
        }
    }

    #[test]
    fn source_metric_strips_selector() {
        let p = Pipeline::new("p", r#"http_requests_total{job="api"}"#);
        assert_eq!(p.source_metric(), "http_requests_total");
        assert_eq!(p.output_base_name(), "tidewatch_p");
    }
}
