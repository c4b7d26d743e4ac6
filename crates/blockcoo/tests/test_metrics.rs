//! Experiment logging written to a JSON-lines file.

use std::fs::File;
use std::io::{BufRead, BufReader};

use blockcoo::config::ExperimentConfig;
use blockcoo::metrics::{ExperimentLogger, JsonLinesSink};
use serde_json::{Value, json};
use tempfile::tempdir;

#[test]
fn test_training_run_log_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metrics.jsonl");

    let config = ExperimentConfig {
        project: "char-lm".to_string(),
        ..ExperimentConfig::default()
    };
    let sink = JsonLinesSink::new(File::create(&path).unwrap());
    let mut logger = ExperimentLogger::from_config(sink, &config).unwrap();

    for step in 1..=3u64 {
        logger
            .log(
                "train_step",
                json!({"train": {"samples": step * 32, "loss": 3.0 / step as f64}}),
            )
            .unwrap();
    }
    logger.log("valid", json!({"valid": {"loss": 1.2}})).unwrap();
    logger.summary("nnz_blocks", json!(42)).unwrap();
    drop(logger);

    let lines: Vec<Value> = BufReader::new(File::open(&path).unwrap())
        .lines()
        .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
        .collect();
    assert_eq!(lines.len(), 6);

    assert_eq!(lines[0]["kind"], "init");
    assert_eq!(lines[0]["project"], "char-lm");
    assert_eq!(lines[0]["config"]["density"], 0.1);

    let steps: Vec<u64> = lines[1..5].iter().map(|l| l["step"].as_u64().unwrap()).collect();
    assert_eq!(steps, vec![32, 64, 96, 96]);
    assert!(lines[1]["data"]["train"].get("samples").is_none());
    assert_eq!(lines[4]["data"], json!({"valid": {"loss": 1.2}}));

    assert_eq!(lines[5], json!({"kind": "summary", "key": "nnz_blocks", "value": 42}));
}
