//! Command implementations
//!
//! Each function returns `CliResult<ExitCode>`; printing the outcome is their job, exiting is not.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use qttest_core::codemodel::{cpp_files_for_executable, parse_codemodel, target_name_for_executable};
use regex::Regex;

use super::report::{TestReporter, TestSummary};
use super::{CliError, CliResult, DiscoveryArgs, ExitCode};
use crate::config::RunnerConfig;
use crate::error::QtTestError;
use crate::process::OutputSink;
use crate::qttest::{DirectoryScanDiscovery, QtTests};

/// Seeds the config from the environment and applies the discovery flags.
pub fn runner_config(args: &DiscoveryArgs, verbose: bool) -> RunnerConfig {
    let mut config = RunnerConfig::from_env().with_verbose(verbose);
    if let Some(ctest) = &args.ctest {
        config = config.with_ctest_program(ctest);
    }
    if let Some(ldd) = &args.ldd {
        config = config.with_ldd_program(ldd);
    }
    config
}

fn compile(pattern: Option<&str>) -> CliResult<Option<Regex>> {
    pattern
        .map(Regex::new)
        .transpose()
        .map_err(|e| CliError::from(QtTestError::from(e)))
}

/// Finds the executables of the build directory and applies the filters, cheapest first.
pub async fn discover(args: &DiscoveryArgs, config: RunnerConfig) -> CliResult<QtTests> {
    let exclude = compile(args.exclude.as_deref())?;
    let only = compile(args.only.as_deref())?;

    let mut tests = QtTests::with_config(config);
    let found = if args.scan {
        tests.discover(&DirectoryScanDiscovery, &args.build_dir).await?
    } else {
        tests.discover_via_cmake(&args.build_dir).await?
    };
    tracing::debug!(found, "discovered executables");

    if let Some(re) = &exclude {
        tests.remove_matching(re);
    }
    if let Some(re) = &only {
        tests.maintain_matching(re);
    }
    if !args.no_link_check {
        tests.remove_non_linking().await;
    }
    if args.help_check {
        tests.remove_by_running_help().await;
    }
    Ok(tests)
}

/// `qttest list`
pub async fn list(args: &DiscoveryArgs, config: RunnerConfig) -> CliResult<ExitCode> {
    let tests = discover(args, config).await?;
    print!("{}", tests.dump_executable_paths());
    Ok(ExitCode::SUCCESS)
}

/// `qttest slots`
pub async fn slots(args: &DiscoveryArgs, config: RunnerConfig) -> CliResult<ExitCode> {
    let mut tests = discover(args, config).await?;
    print!("{}", tests.dump_test_slots().await);
    Ok(ExitCode::SUCCESS)
}

/// `qttest which`
pub async fn which(args: &DiscoveryArgs, config: RunnerConfig, slot: &str) -> CliResult<ExitCode> {
    let mut tests = discover(args, config).await?;
    tests.parse_all_slots().await;

    let found = tests.executables_containing_slot(slot);
    if found.is_empty() {
        return Err(CliError::failure(format!("No executable has a slot named '{slot}'")));
    }
    for test in found {
        println!("{}", test.filename.display());
    }
    Ok(ExitCode::SUCCESS)
}

/// `qttest sources`
pub fn sources(codemodel: &Path, executable: &str, workaround: bool) -> CliResult<ExitCode> {
    let json = fs::read_to_string(codemodel)
        .map_err(|e| CliError::failure(format!("Error reading {}: {}", codemodel.display(), e)))?;
    let model = parse_codemodel(&json).map_err(QtTestError::from)?;

    let target = target_name_for_executable(executable, &model, workaround);
    let files = cpp_files_for_executable(executable, &model, workaround);
    if target.is_none() && files.is_empty() {
        return Err(CliError::failure(format!("No CMake target produces '{executable}'")));
    }

    if let Some(target) = target {
        println!("target: {target}");
    }
    for file in files {
        println!("{}", file.display());
    }
    Ok(ExitCode::SUCCESS)
}

/// `qttest run`
pub async fn run(
    args: &DiscoveryArgs,
    config: RunnerConfig,
    slot: Option<&str>,
    stop_on_fail: bool,
    show_output: bool,
    reporter: &mut impl TestReporter,
) -> CliResult<ExitCode> {
    let mut tests = discover(args, config.with_echo_stdout(show_output)).await?;
    if show_output {
        let sink: OutputSink = Arc::new(|chunk: &str| print!("{chunk}"));
        for test in &mut tests.executables {
            test.output_sink = Some(sink.clone());
        }
    }
    run_tests(&mut tests, slot, stop_on_fail, reporter).await
}

/// Runs every executable (or every executable having `slot`) and reports as it goes.
///
/// Fails when any slot failed, unexpectedly passed or aborted, or when an executable failed without a
/// slot to blame.
pub async fn run_tests(
    tests: &mut QtTests,
    slot: Option<&str>,
    stop_on_fail: bool,
    reporter: &mut impl TestReporter,
) -> CliResult<ExitCode> {
    let start_time = Instant::now();
    tests.parse_all_slots().await;

    let targets: Vec<usize> = tests
        .executables
        .iter()
        .enumerate()
        .filter(|(_, test)| slot.is_none_or(|name| test.slot_by_name(name).is_some()))
        .map(|(idx, _)| idx)
        .collect();

    if targets.is_empty() {
        if let Some(name) = slot {
            return Err(CliError::failure(format!("No executable has a slot named '{name}'")));
        }
        eprintln!("No tests collected");
        return Ok(ExitCode::SUCCESS); // "no tests collected" is not a failure
    }

    let slot_count = match slot {
        Some(_) => targets.len(),
        None => targets
            .iter()
            .map(|&idx| tests.executables[idx].slots.as_ref().map_or(0, Vec::len))
            .sum(),
    };
    reporter.on_collection_complete(targets.len(), slot_count);

    let mut summary = TestSummary::default();
    for idx in targets {
        let test = &mut tests.executables[idx];
        reporter.on_executable_start(test);

        let report = match test.run_test(slot, None).await {
            Ok(report) => report,
            Err(e) => {
                reporter.on_executable_error(test, &e);
                summary.record_error();
                if stop_on_fail {
                    break;
                }
                continue;
            }
        };

        for (name, outcome) in &report.outcomes {
            reporter.on_slot_complete(test, name, outcome);
        }
        reporter.on_executable_complete(test, &report);
        summary.record(&report);

        if stop_on_fail && report.is_failure() {
            break;
        }
    }

    summary.duration = start_time.elapsed();
    reporter.on_run_complete(&summary);

    if summary.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        // Tests failed - return error with empty message (summary already printed)
        Err(CliError::new("", ExitCode::FAILURE))
    }
}
