//! Covers the worker's CLI/config layering writing a file `config.rs` then
//! reads back (flags still win), combined with the task registry lifecycle
//! that a real worker process would drive with that config.

use std::fs;

use cirrus_parse::config::parse_args;
use cirrus_parse::vm::CancelToken;
use cirrus_parse::worker::TaskRegistry;

fn temp_config_path(name: &str) -> std::path::PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("cirrus-parse-worker-test-{name}-{}.yaml", std::process::id()));
    path
}

#[test]
fn flags_win_over_the_file_layer_but_fill_in_the_rest() {
    let path = temp_config_path("precedence");
    fs::write(
        &path,
        "name: file-worker\ntoken: file-token\nlabels:\n  pool: file-pool\n",
    )
    .unwrap();

    let args = vec![
        "--file".to_string(),
        path.to_string_lossy().into_owned(),
        "--name".to_string(),
        "flag-worker".to_string(),
    ];
    let config = parse_args(&args).unwrap();

    assert_eq!(config.name, "flag-worker", "flag should win over the file value");
    assert_eq!(config.token.as_deref(), Some("file-token"), "file should fill in what flags left unset");
    assert_eq!(config.labels.get("pool"), Some(&"file-pool".to_string()));

    fs::remove_file(&path).ok();
}

#[test]
fn a_worker_config_drives_a_task_registry_through_a_full_run_and_cancel_cycle() {
    let args = vec!["--name".to_string(), "ci-worker-1".to_string()];
    let config = parse_args(&args).unwrap();
    assert_eq!(config.name, "ci-worker-1");

    let mut registry = TaskRegistry::new();
    let cancel = CancelToken::new();
    registry.run("task-1".to_string(), cancel.clone());
    assert_eq!(registry.running_tasks(), vec!["task-1".to_string()]);

    registry.stop("task-1");
    assert!(cancel.is_cancelled());

    registry.completion_sender().send("task-1".to_string()).unwrap();
    registry.reap_completions();
    assert!(registry.running_tasks().is_empty());
}
