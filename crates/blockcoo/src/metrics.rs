//! Experiment metrics logging.
//!
//! An [`ExperimentLogger`] records nested JSON metrics against a step
//! counter and forwards them to a [`MetricsSink`]. The step is the number of
//! training samples seen: a `"train_step"` event carries it as
//! `train.samples`, which is removed from the record and becomes the step
//! for that and every later event.
//!
//! # Example
//!
//! ```
//! use blockcoo::metrics::{ExperimentLogger, MemorySink};
//! use serde_json::json;
//!
//! let configs = [json!({"lr": 0.1})];
//! let mut logger = ExperimentLogger::start(MemorySink::default(), "demo", &configs).unwrap();
//! logger.log("train_step", json!({"train": {"samples": 128, "loss": 2.5}})).unwrap();
//! logger.log("valid", json!({"valid": {"loss": 2.7}})).unwrap();
//!
//! let sink = logger.into_sink();
//! assert_eq!(sink.records[0].0, 128);
//! assert_eq!(sink.records[0].1["train"], json!({"loss": 2.5}));
//! assert_eq!(sink.records[1].0, 128);
//! ```

use std::io::Write;

use serde_json::{Map, Value, json};
use tracing::info;

use crate::config::ExperimentConfig;
use crate::error::MetricsError;

/// Event name whose record carries the sample count.
pub const TRAIN_STEP_EVENT: &str = "train_step";

/// Destination of logged metrics.
pub trait MetricsSink: Send {
    /// Called once with the merged run arguments.
    fn init(&mut self, project: &str, args: &Map<String, Value>) -> Result<(), MetricsError>;

    /// Record `data` at `step`.
    fn log(&mut self, step: u64, data: &Map<String, Value>) -> Result<(), MetricsError>;

    /// Set a run-level summary value.
    fn summary(&mut self, key: &str, value: &Value) -> Result<(), MetricsError>;
}

/// Emits every record as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn init(&mut self, project: &str, args: &Map<String, Value>) -> Result<(), MetricsError> {
        let config = Value::Object(args.clone());
        info!(project, config = %config, "metrics run started");
        Ok(())
    }

    fn log(&mut self, step: u64, data: &Map<String, Value>) -> Result<(), MetricsError> {
        let data = Value::Object(data.clone());
        info!(step, data = %data, "metrics");
        Ok(())
    }

    fn summary(&mut self, key: &str, value: &Value) -> Result<(), MetricsError> {
        info!(key, value = %value, "metrics summary");
        Ok(())
    }
}

/// Writes one JSON object per line.
///
/// Lines are tagged by `"kind"`: `"init"`, `"log"` or `"summary"`.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, line: &Value) -> Result<(), MetricsError> {
        serde_json::to_writer(&mut self.writer, line)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> MetricsSink for JsonLinesSink<W> {
    fn init(&mut self, project: &str, args: &Map<String, Value>) -> Result<(), MetricsError> {
        self.write_line(&json!({"kind": "init", "project": project, "config": args}))
    }

    fn log(&mut self, step: u64, data: &Map<String, Value>) -> Result<(), MetricsError> {
        self.write_line(&json!({"kind": "log", "step": step, "data": data}))
    }

    fn summary(&mut self, key: &str, value: &Value) -> Result<(), MetricsError> {
        self.write_line(&json!({"kind": "summary", "key": key, "value": value}))
    }
}

/// Keeps everything in memory.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MemorySink {
    pub project: Option<String>,
    pub args: Map<String, Value>,
    pub records: Vec<(u64, Map<String, Value>)>,
    pub summary: Map<String, Value>,
}

impl MetricsSink for MemorySink {
    fn init(&mut self, project: &str, args: &Map<String, Value>) -> Result<(), MetricsError> {
        self.project = Some(project.to_string());
        self.args = args.clone();
        Ok(())
    }

    fn log(&mut self, step: u64, data: &Map<String, Value>) -> Result<(), MetricsError> {
        self.records.push((step, data.clone()));
        Ok(())
    }

    fn summary(&mut self, key: &str, value: &Value) -> Result<(), MetricsError> {
        self.summary.insert(key.to_string(), value.clone());
        Ok(())
    }
}

/// Step-tracking front end to a [`MetricsSink`].
#[derive(Debug)]
pub struct ExperimentLogger<S: MetricsSink> {
    sink: S,
    args: Map<String, Value>,
    step: u64,
}

impl<S: MetricsSink> ExperimentLogger<S> {
    /// Merge `configs` (JSON objects, later keys win) into the run arguments
    /// and initialise the sink.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::MalformedRecord`] if a config is not a JSON
    /// object, plus any sink error.
    pub fn start(mut sink: S, project: &str, configs: &[Value]) -> Result<Self, MetricsError> {
        let mut args = Map::new();
        for config in configs {
            match config {
                Value::Object(fields) => args.extend(fields.clone()),
                other => {
                    return Err(MetricsError::MalformedRecord(format!(
                        "run config must be a JSON object, got {}",
                        other
                    )));
                }
            }
        }
        sink.init(project, &args)?;
        info!(project, num_args = args.len(), "experiment logger started");
        Ok(Self { sink, args, step: 0 })
    }

    /// Start from an [`ExperimentConfig`], flattened with
    /// [`ExperimentConfig::to_args`].
    pub fn from_config(sink: S, config: &ExperimentConfig) -> Result<Self, MetricsError> {
        let args = config
            .to_args()
            .map_err(|e| MetricsError::MalformedRecord(e.to_string()))?;
        Self::start(sink, &config.project, &[Value::Object(args)])
    }

    /// Log `data` for `event` at the current step.
    ///
    /// For [`TRAIN_STEP_EVENT`], `data.train.samples` is removed and becomes
    /// the new step.
    ///
    /// # Errors
    ///
    /// - [`MetricsError::MalformedRecord`] if `data` is not an object, or a
    ///   train step lacks a non-negative integer `train.samples`.
    /// - [`MetricsError::StepRegression`] if that count is below the current
    ///   step.
    pub fn log(&mut self, event: &str, data: Value) -> Result<(), MetricsError> {
        let Value::Object(mut record) = data else {
            return Err(MetricsError::MalformedRecord(format!(
                "event '{}' data must be a JSON object",
                event
            )));
        };

        if event == TRAIN_STEP_EVENT {
            let samples = record
                .get_mut("train")
                .and_then(Value::as_object_mut)
                .and_then(|train| train.remove("samples"))
                .and_then(|samples| samples.as_u64())
                .ok_or_else(|| {
                    MetricsError::MalformedRecord(
                        "train_step data must contain an integer train.samples".to_string(),
                    )
                })?;
            if samples < self.step {
                return Err(MetricsError::StepRegression {
                    step: samples,
                    previous: self.step,
                });
            }
            self.step = samples;
        }

        self.sink.log(self.step, &record)
    }

    pub fn summary(&mut self, key: &str, value: Value) -> Result<(), MetricsError> {
        self.sink.summary(key, &value)
    }

    /// Current step (samples seen).
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn args(&self) -> &Map<String, Value> {
        &self.args
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configs_merge_in_order() {
        let logger = ExperimentLogger::start(
            MemorySink::default(),
            "run",
            &[json!({"a": 1, "b": 2}), json!({"b": 3})],
        )
        .unwrap();
        assert_eq!(logger.args()["a"], 1);
        assert_eq!(logger.args()["b"], 3);
        assert_eq!(logger.sink().project.as_deref(), Some("run"));
    }

    #[test]
    fn test_non_object_config_rejected() {
        let err =
            ExperimentLogger::start(MemorySink::default(), "run", &[json!([1, 2])]).unwrap_err();
        assert!(matches!(err, MetricsError::MalformedRecord(_)));
    }

    #[test]
    fn test_step_regression() {
        let mut logger = ExperimentLogger::start(MemorySink::default(), "run", &[]).unwrap();
        logger.log("train_step", json!({"train": {"samples": 64}})).unwrap();
        logger.log("train_step", json!({"train": {"samples": 64}})).unwrap();
        let err = logger
            .log("train_step", json!({"train": {"samples": 32}}))
            .unwrap_err();
        assert!(matches!(
            err,
            MetricsError::StepRegression {
                step: 32,
                previous: 64
            }
        ));
        assert_eq!(logger.step(), 64);
        assert_eq!(logger.sink().records.len(), 2);
    }

    #[test]
    fn test_train_step_requires_samples() {
        let mut logger = ExperimentLogger::start(MemorySink::default(), "run", &[]).unwrap();
        assert!(logger.log("train_step", json!({"train": {"loss": 1.0}})).is_err());
        assert!(logger.log("eval", json!(3)).is_err());
        // Other events need no sample count
        logger.log("eval", json!({"acc": 0.5})).unwrap();
        let expected = json!({"acc": 0.5}).as_object().unwrap().clone();
        assert_eq!(logger.sink().records, vec![(0, expected)]);
    }

    #[test]
    fn test_json_lines_sink() {
        let sink = JsonLinesSink::new(Vec::new());
        let mut logger = ExperimentLogger::start(sink, "run", &[json!({"lr": 0.5})]).unwrap();
        logger.log("train_step", json!({"train": {"samples": 10, "loss": 1.5}})).unwrap();
        logger.summary("n_emb_parameters", json!(1000)).unwrap();

        let out = String::from_utf8(logger.into_sink().into_inner()).unwrap();
        let lines: Vec<Value> = out.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], json!({"kind": "init", "project": "run", "config": {"lr": 0.5}}));
        assert_eq!(lines[1], json!({"kind": "log", "step": 10, "data": {"train": {"loss": 1.5}}}));
        assert_eq!(lines[2]["value"], 1000);
    }

    #[test]
    fn test_from_config() {
        let logger =
            ExperimentLogger::from_config(TracingSink, &ExperimentConfig::default()).unwrap();
        assert_eq!(logger.args()["block_size"], 16);
    }

    #[test]
    fn test_tracing_sink_logs_and_summarises() {
        let mut logger =
            ExperimentLogger::start(TracingSink, "run", &[json!({"lr": 0.5})]).unwrap();
        logger
            .log("train_step", json!({"train": {"samples": 8, "loss": 0.25}}))
            .unwrap();
        logger.log("valid", json!({"valid": {"loss": 0.5}})).unwrap();
        logger.summary("best_loss", json!(0.25)).unwrap();
        assert_eq!(logger.step(), 8);
        assert_eq!(logger.args()["lr"], 0.5);
    }
}
