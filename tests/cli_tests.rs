//! Integration tests for the CLI commands that don't spawn tests

use std::fs;

use qttest_utils::cli::commands::sources;
use qttest_utils::cli::{Cli, Command, ExitCode};
use serde_json::json;

use clap::Parser;

fn write_codemodel(dir: &std::path::Path) -> std::path::PathBuf {
    let model = json!({
        "projects": [{
            "name": "qt_test",
            "targets": [{
                "name": "test1",
                "type": "EXECUTABLE",
                "sourceDirectory": "/src/test1",
                "artifacts": ["/build/test1"],
                "fileGroups": [
                    {"language": "CXX", "isGenerated": true, "sources": ["test1_autogen/mocs_compilation.cpp"]},
                    {"language": "CXX", "sources": ["test1.cpp", "test1_autogen/mocs_compilation.cpp"]}
                ]
            }]
        }]
    });
    let path = dir.join("codemodel.json");
    fs::write(&path, model.to_string()).unwrap();
    path
}

#[test]
fn test_sources_for_known_executable() {
    let dir = tempfile::tempdir().unwrap();
    let codemodel = write_codemodel(dir.path());
    assert_eq!(sources(&codemodel, "/build/test1", false).unwrap(), ExitCode::SUCCESS);
}

#[test]
fn test_sources_workaround_matches_basename() {
    let dir = tempfile::tempdir().unwrap();
    let codemodel = write_codemodel(dir.path());
    assert!(sources(&codemodel, "/elsewhere/test1", false).is_err());
    assert_eq!(sources(&codemodel, "/elsewhere/test1", true).unwrap(), ExitCode::SUCCESS);
}

#[test]
fn test_sources_reports_bad_json() {
    let dir = tempfile::tempdir().unwrap();
    let codemodel = dir.path().join("codemodel.json");
    fs::write(&codemodel, "{ not json").unwrap();

    let err = sources(&codemodel, "/build/test1", false).unwrap_err();
    assert_eq!(err.exit_code, ExitCode::FAILURE);
    assert!(!err.message.is_empty());

    let missing = sources(&dir.path().join("missing.json"), "/build/test1", false).unwrap_err();
    assert!(missing.message.starts_with("Error reading"));
}

#[test]
fn test_run_output_dir_flag() {
    let cli = Cli::try_parse_from(["qttest", "run", "build", "--output-dir", "logs", "-s"]).unwrap();
    let Command::Run {
        output_dir, show_output, ..
    } = cli.command
    else {
        panic!("Expected Run command");
    };
    assert_eq!(output_dir, Some(std::path::PathBuf::from("logs")));
    assert!(show_output);
}
