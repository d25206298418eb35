use callgraph_studio::callstack::{CancellationToken, Symbol};
use callgraph_studio::commands::{
    execute_analyze, execute_analyze_with, validate_report_file, AnalyzeArgs,
};
use callgraph_studio::output::read_report;
use callgraph_studio::utils::config::GroupBy;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const EVENTS: &str = r#"{
  "end": 300,
  "events": [
    {"ts": 0,   "pid": 1, "tid": 10, "kind": "entry", "symbol": "main"},
    {"ts": 10,  "pid": 1, "tid": 10, "kind": "entry", "symbol": "work"},
    {"ts": 30,  "pid": 1, "tid": 10, "kind": "exit"},
    {"ts": 50,  "pid": 1, "tid": 10, "kind": "entry", "symbol": "work"},
    {"ts": 60,  "pid": 1, "tid": 10, "kind": "exit"},
    {"ts": 100, "pid": 1, "tid": 10, "kind": "exit"},
    {"ts": 0,   "pid": 1, "tid": 11, "kind": "entry", "symbol": "main"},
    {"ts": 40,  "pid": 1, "tid": 11, "kind": "exit"},
    {"ts": 120, "pid": 2, "tid": 20, "kind": "entry", "symbol": 4096},
    {"ts": 130, "pid": 2, "tid": 20, "kind": "entry", "symbol": 2.5},
    {"ts": 140, "pid": 2, "tid": 20, "kind": "exit"},
    {"ts": 150, "pid": 2, "tid": 20, "kind": "exit"},
    {"ts": 200, "pid": 2, "tid": 20, "kind": "entry", "symbol": "idle"}
  ]
}"#;

fn write_input(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("events.json");
    fs::write(&path, contents).unwrap();
    path
}

fn args(input: &Path, output: &Path) -> AnalyzeArgs {
    AnalyzeArgs {
        input: input.to_path_buf(),
        output: Some(output.to_path_buf()),
        ..Default::default()
    }
}

#[test]
fn test_analyze_writes_aggregated_report() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, EVENTS);
    let output = dir.path().join("out/report.json");

    let report = execute_analyze(args(&input, &output)).unwrap();
    let loaded = read_report(&output).unwrap();
    assert_eq!(loaded.scopes.len(), report.scopes.len());
    assert_eq!(loaded.failures, report.failures);

    assert!(report.complete);
    assert_eq!(report.group_by, "process");
    assert_eq!((report.window.start, report.window.end), (0, 300));

    let ids: Vec<i32> = report.scopes.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![1, 2]);

    // Both threads of process 1 fold into one `main`
    let process1 = &report.scopes[0];
    assert_eq!(process1.roots.len(), 1);
    let main = &process1.roots[0];
    assert_eq!(main.symbol, Symbol::from("main"));
    assert_eq!(main.call_count, 2);
    assert_eq!(main.duration, 140);
    assert_eq!(main.self_time, 110);
    assert_eq!(main.duration_stats.min, Some(40));
    assert_eq!(main.duration_stats.max, Some(100));

    let work = &main.children[0];
    assert_eq!(work.symbol, Symbol::from("work"));
    assert_eq!(work.call_count, 2);
    assert_eq!(work.duration, 30);
    assert_eq!(process1.hot_nodes[0].path, "main");

    // The float symbol fails its root; the call still open at the end survives
    let process2 = &report.scopes[1];
    let symbols: Vec<&Symbol> = process2.roots.iter().map(|n| &n.symbol).collect();
    assert_eq!(symbols, vec![&Symbol::from("idle")]);
    assert_eq!(process2.roots[0].duration, 101);

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].process_id, 2);
    assert_eq!(report.failures[0].start, Some(120));
    assert!(report.failures[0].message.contains("double"));
}

#[test]
fn test_analyze_by_thread_and_window() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, EVENTS);
    let output = dir.path().join("report.json");

    let report = execute_analyze(AnalyzeArgs {
        group_by: Some(GroupBy::Thread),
        start: Some(0),
        end: Some(110),
        ..args(&input, &output)
    })
    .unwrap();

    let ids: Vec<i32> = report.scopes.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![10, 11]);
    assert_eq!(report.scopes[0].roots[0].duration, 100);
    assert_eq!(report.scopes[1].roots[0].duration, 40);
    assert!(report.failures.is_empty());
}

#[test]
fn test_config_file_sets_defaults() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, EVENTS);
    let config = dir.path().join("analysis.toml");
    fs::write(&config, "group_by = \"thread\"\nwindow_start = 190\n").unwrap();

    let report = execute_analyze(AnalyzeArgs {
        input,
        output: None,
        config: Some(config),
        ..Default::default()
    })
    .unwrap();

    assert_eq!(report.group_by, "thread");
    let ids: Vec<i32> = report.scopes.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![20]);
}

#[test]
fn test_cancelled_analysis_is_incomplete() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, EVENTS);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = execute_analyze_with(
        AnalyzeArgs {
            input,
            output: None,
            ..Default::default()
        },
        &cancel,
    )
    .unwrap();

    assert!(!report.complete);
    assert!(report.scopes.is_empty());
}

#[test]
fn test_invalid_events_rejected() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, r#"{"events": [{"ts": 0, "pid": 1}]}"#);

    let result = execute_analyze(AnalyzeArgs {
        input,
        output: None,
        ..Default::default()
    });
    assert!(result.is_err());
}

#[test]
fn test_validate_written_report() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, EVENTS);
    let output = dir.path().join("report.json");

    execute_analyze(args(&input, &output)).unwrap();
    assert!(validate_report_file(&output).is_ok());

    fs::write(&output, "{\"version\": \"0.1\"}").unwrap();
    assert!(validate_report_file(&output).is_err());
}
