mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

use check_it_all::config::{FileErrorPolicy, MimeSource, RunConfig};
use check_it_all::filter::{MatchKind, RuleSpec};
use check_it_all::hasher::fingerprint;
use check_it_all::policy::Category;
use check_it_all::scanner::{ExtensionGuess, MimeResolver};
use check_it_all::{AdmissionEngine, Analyzer, Error, Filter, Policy, RiskLevel, SilentReporter, Verdict};
use common::MockAnalyzer;

fn run_config() -> RunConfig {
    RunConfig {
        poll_interval_ms: 1,
        prescan_workers: 2,
        submit_workers: 4,
        queue_depth: 4,
        mime: MimeSource::Extension,
        ..RunConfig::default()
    }
}

fn submit_all() -> Filter {
    Filter::submit_all(Arc::new(ExtensionGuess)).unwrap()
}

fn engine(mock: &Arc<MockAnalyzer>, filter: Filter, policy: Policy) -> AdmissionEngine {
    AdmissionEngine::new(mock.clone(), filter)
        .with_policy(policy)
        .with_run_config(run_config())
}

/// Layout:
///   root/
///     unsupported.txt    ("unsupported")
///     clean/
///       no_risk.txt      ("no_risk_found")
///     nested/deeper/
///       medium.txt       ("medium_risk")
///       high.txt         ("high_risk")
fn create_four_file_tree(root: &Path) {
    fs::create_dir_all(root.join("clean")).unwrap();
    fs::create_dir_all(root.join("nested/deeper")).unwrap();
    fs::write(root.join("unsupported.txt"), "unsupported").unwrap();
    fs::write(root.join("clean/no_risk.txt"), "no_risk_found").unwrap();
    fs::write(root.join("nested/deeper/medium.txt"), "medium_risk").unwrap();
    fs::write(root.join("nested/deeper/high.txt"), "high_risk").unwrap();
}

#[test]
fn test_four_file_scenario() {
    let tmp = tempdir().unwrap();
    create_four_file_tree(tmp.path());

    let mock = Arc::new(MockAnalyzer::new().with_arrived_polls(1).with_processing_polls(1));
    let policy = Policy::uniform(false)
        .with(Category::Unscannable, true)
        .with(Category::MediumRisk, true);

    let outcome = engine(&mock, submit_all(), policy)
        .run(tmp.path(), &SilentReporter)
        .unwrap();

    assert_eq!(outcome.files_found, 4);
    assert_eq!(outcome.stats.rejected, 1, "Only the high risk file is rejected");
    assert_eq!(outcome.stats.admitted, 3);
    assert_eq!(outcome.stats.submitted, 4);
    assert_eq!(outcome.stats.uploaded, 4);
    assert!(!outcome.is_success());
    assert_eq!(outcome.to_string(), "Found 1 inadmissible files");

    assert_eq!(mock.registrations(), 1);
    assert_eq!(mock.uploads(), 4);
    // Arrived, Processing, Done for each sample
    assert_eq!(mock.verdict_queries(), 12);
}

#[test]
fn test_empty_directory_is_success() {
    let tmp = tempdir().unwrap();
    let mock = Arc::new(MockAnalyzer::new());

    let outcome = engine(&mock, submit_all(), Policy::default())
        .run(tmp.path(), &SilentReporter)
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.files_found, 0);
    assert_eq!(outcome.to_string(), "All 0 files are admissible");
    assert_eq!(mock.registrations(), 1);
    assert_eq!(mock.uploads(), 0);
}

#[test]
fn test_already_registered_client_is_not_fatal() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("a.txt"), "no_risk_found").unwrap();
    let mock = Arc::new(MockAnalyzer::new());
    mock.register().unwrap();

    let outcome = engine(&mock, submit_all(), Policy::default())
        .run(tmp.path(), &SilentReporter)
        .unwrap();
    assert!(outcome.is_success());
    assert_eq!(mock.registrations(), 2);
}

#[test]
fn test_oversize_follows_big_file_policy() {
    for admit in [true, false] {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("big.txt"), "high_risk ".repeat(10)).unwrap();
        fs::write(tmp.path().join("small.txt"), "ok").unwrap();

        let mock = Arc::new(MockAnalyzer::new());
        let run = RunConfig {
            max_file_size: 10,
            ..run_config()
        };
        let outcome = AdmissionEngine::new(mock.clone(), submit_all())
            .with_policy(Policy::default().with(Category::BigFile, admit))
            .with_run_config(run)
            .run(tmp.path(), &SilentReporter)
            .unwrap();

        assert_eq!(outcome.stats.oversize, 1);
        assert_eq!(outcome.stats.submitted, 1, "Only the small file reaches submission");
        assert_eq!(mock.uploads(), 1, "Oversize files are never uploaded");
        assert_eq!(outcome.is_success(), admit);
    }
}

#[test]
fn test_size_limit_is_inclusive() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("exact.txt"), "0123456789").unwrap();

    let mock = Arc::new(MockAnalyzer::new());
    let run = RunConfig {
        max_file_size: 10,
        ..run_config()
    };
    let outcome = AdmissionEngine::new(mock.clone(), submit_all())
        .with_policy(Policy::default().with(Category::BigFile, false))
        .with_run_config(run)
        .run(tmp.path(), &SilentReporter)
        .unwrap();

    assert_eq!(outcome.stats.oversize, 0);
    assert_eq!(mock.uploads(), 1);
    assert!(outcome.is_success());
}

#[test]
fn test_duplicate_content_uploaded_once_polled_twice() {
    let tmp = tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("copy")).unwrap();
    fs::write(tmp.path().join("report.txt"), "low_risk payload").unwrap();
    fs::write(tmp.path().join("copy/report.txt"), "low_risk payload").unwrap();

    let mock = Arc::new(MockAnalyzer::new());
    let policy = Policy::default().with(Category::LowRisk, true);
    let outcome = engine(&mock, submit_all(), policy)
        .run(tmp.path(), &SilentReporter)
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.stats.admitted, 2);
    assert_eq!(mock.uploads(), 1);
    assert_eq!(outcome.stats.uploaded, 1);
    assert_eq!(mock.duplicate_checks(), 2);
    assert_eq!(mock.verdict_queries(), 2);
}

#[test]
fn test_ignored_files_are_never_hashed_or_uploaded() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("payload.skip"), "high_risk").unwrap();
    fs::write(tmp.path().join("clean.txt"), "no_risk_found").unwrap();

    let filter = Filter::from_specs(
        vec![
            RuleSpec {
                submit: false,
                kind: MatchKind::Path,
                value: "*.skip".to_string(),
            },
            RuleSpec {
                submit: true,
                kind: MatchKind::Path,
                value: "*".to_string(),
            },
        ],
        Arc::new(ExtensionGuess),
    )
    .unwrap();

    let mock = Arc::new(MockAnalyzer::new());
    let outcome = engine(&mock, filter, Policy::default())
        .run(tmp.path(), &SilentReporter)
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.stats.ignored, 1);
    assert_eq!(outcome.stats.submitted, 1);
    assert_eq!(mock.uploads(), 1);
    assert_eq!(mock.duplicate_checks(), 1);
}

#[test]
fn test_filter_without_match_ignores_everything() {
    let tmp = tempdir().unwrap();
    create_four_file_tree(tmp.path());

    let filter = Filter::new(Vec::new(), Arc::new(ExtensionGuess));
    let mock = Arc::new(MockAnalyzer::new());
    let outcome = engine(&mock, filter, Policy::uniform(false))
        .run(tmp.path(), &SilentReporter)
        .unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.stats.ignored, 4);
    assert_eq!(mock.uploads(), 0);
    assert_eq!(mock.verdict_queries(), 0);
}

#[test]
fn test_skip_prefixes_are_not_walked() {
    let tmp = tempdir().unwrap();
    create_four_file_tree(tmp.path());

    let mock = Arc::new(MockAnalyzer::new());
    let run = RunConfig {
        skip_prefixes: vec![tmp.path().join("nested")],
        ..run_config()
    };
    let outcome = AdmissionEngine::new(mock.clone(), submit_all())
        .with_run_config(run)
        .run(tmp.path(), &SilentReporter)
        .unwrap();

    assert_eq!(outcome.files_found, 2);
    assert!(outcome.is_success());
}

#[test]
fn test_result_independent_of_pool_sizes() {
    let tmp = tempdir().unwrap();
    let contents = ["high_risk", "medium_risk", "low_risk", "unsupported", "no_risk_found"];
    for i in 0..40 {
        let dir = tmp.path().join(format!("d{}", i % 4));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(format!("f{}.txt", i)),
            format!("{} #{}", contents[i % contents.len()], i),
        )
        .unwrap();
    }
    let policy = Policy::uniform(false).with(Category::LowRisk, true);

    let mut results = Vec::new();
    for (prescan_workers, submit_workers, queue_depth) in [(1, 8, 1), (8, 1, 1), (3, 5, 16)] {
        let mock = Arc::new(MockAnalyzer::new().with_arrived_polls(1));
        let run = RunConfig {
            prescan_workers,
            submit_workers,
            queue_depth,
            ..run_config()
        };
        let outcome = AdmissionEngine::new(mock.clone(), submit_all())
            .with_policy(policy)
            .with_run_config(run)
            .run(tmp.path(), &SilentReporter)
            .unwrap();
        assert_eq!(mock.uploads(), 40);
        results.push(outcome.stats);
    }

    // high, medium and unsupported are rejected: 3 of every 5 files
    assert_eq!(results[0].rejected, 24);
    assert_eq!(results[0].admitted, 16);
    assert!(results.iter().all(|stats| *stats == results[0]));
}

#[test]
fn test_known_sample_is_not_uploaded() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("known.txt");
    fs::write(&path, "harmless looking").unwrap();
    let fp = fingerprint(&path).unwrap();

    let mock = Arc::new(MockAnalyzer::new().with_known_sample(Verdict::done(
        fp.to_uppercase(),
        RiskLevel::HighRisk,
    )));
    let outcome = engine(&mock, submit_all(), Policy::default())
        .run(tmp.path(), &SilentReporter)
        .unwrap();

    assert_eq!(mock.uploads(), 0);
    assert_eq!(outcome.stats.uploaded, 0);
    assert_eq!(outcome.stats.rejected, 1);
}

#[test]
fn test_error_and_timeout_statuses_follow_policy() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("a.txt"), "scan_error").unwrap();
    fs::write(tmp.path().join("b.txt"), "scan_timeout").unwrap();

    let mock = Arc::new(MockAnalyzer::new());
    let outcome = engine(&mock, submit_all(), Policy::uniform(false).with(Category::Error, true))
        .run(tmp.path(), &SilentReporter)
        .unwrap();
    assert_eq!(outcome.stats.admitted, 1);
    assert_eq!(outcome.stats.rejected, 1);
}

#[test]
fn test_out_of_range_risk_is_rejected() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("odd.txt"), "bad_rating").unwrap();

    let mock = Arc::new(MockAnalyzer::new());
    let outcome = engine(&mock, submit_all(), Policy::uniform(true))
        .run(tmp.path(), &SilentReporter)
        .unwrap();
    assert_eq!(outcome.stats.rejected, 1);
}

#[test]
fn test_poll_limit_yields_timeout() {
    for admit in [true, false] {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("slow.txt"), "no_risk_found").unwrap();

        let mock = Arc::new(MockAnalyzer::new().with_arrived_polls(1000));
        let run = RunConfig {
            max_polls: Some(3),
            ..run_config()
        };
        let outcome = AdmissionEngine::new(mock.clone(), submit_all())
            .with_policy(Policy::default().with(Category::Timeout, admit))
            .with_run_config(run)
            .run(tmp.path(), &SilentReporter)
            .unwrap();

        assert_eq!(mock.verdict_queries(), 3);
        assert_eq!(outcome.is_success(), admit);
    }
}

#[test]
fn test_not_found_aborts_run() {
    let tmp = tempdir().unwrap();
    create_four_file_tree(tmp.path());

    let mock = Arc::new(MockAnalyzer::new().forgetting_uploads());
    let result = engine(&mock, submit_all(), Policy::uniform(true)).run(tmp.path(), &SilentReporter);
    assert!(matches!(result, Err(Error::SampleNotFound { .. })));
}

#[test]
fn test_missing_root_aborts_run() {
    let tmp = tempdir().unwrap();
    let mock = Arc::new(MockAnalyzer::new());
    let result = engine(&mock, submit_all(), Policy::default())
        .run(&tmp.path().join("missing"), &SilentReporter);
    assert!(matches!(result, Err(Error::Walk { .. })));
}

#[test]
fn test_invalid_run_config_fails_before_registration() {
    let tmp = tempdir().unwrap();
    let mock = Arc::new(MockAnalyzer::new());
    let run = RunConfig {
        queue_depth: 0,
        ..run_config()
    };
    let result = AdmissionEngine::new(mock.clone(), submit_all())
        .with_run_config(run)
        .run(tmp.path(), &SilentReporter);
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
    assert_eq!(mock.registrations(), 0);
}

/// Resolves by extension but fails for any file named `broken.*`.
struct BrokenMime;

impl MimeResolver for BrokenMime {
    fn resolve(&self, path: &Path) -> Result<String, Error> {
        let broken = path
            .file_stem()
            .is_some_and(|stem| stem.to_string_lossy() == "broken");
        if broken {
            return Err(Error::Mime {
                path: path.to_path_buf(),
                reason: "unreadable".to_string(),
            });
        }
        ExtensionGuess.resolve(path)
    }
}

fn mime_filter() -> Filter {
    Filter::from_specs(
        vec![RuleSpec {
            submit: true,
            kind: MatchKind::Mime,
            value: "*".to_string(),
        }],
        Arc::new(BrokenMime),
    )
    .unwrap()
}

#[test]
fn test_per_file_error_rejects_file_when_configured() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("broken.txt"), "no_risk_found").unwrap();
    fs::write(tmp.path().join("fine.txt"), "no_risk_found").unwrap();

    let mock = Arc::new(MockAnalyzer::new());
    let run = RunConfig {
        on_file_error: FileErrorPolicy::Reject,
        ..run_config()
    };
    let outcome = AdmissionEngine::new(mock.clone(), mime_filter())
        .with_run_config(run)
        .run(tmp.path(), &SilentReporter)
        .unwrap();

    assert_eq!(outcome.stats.file_errors, 1);
    assert_eq!(outcome.stats.rejected, 1);
    assert_eq!(outcome.stats.admitted, 1);
    assert_eq!(mock.uploads(), 1);
}

#[test]
fn test_per_file_error_aborts_by_default() {
    let tmp = tempdir().unwrap();
    fs::write(tmp.path().join("broken.txt"), "no_risk_found").unwrap();

    let mock = Arc::new(MockAnalyzer::new());
    let result = engine(&mock, mime_filter(), Policy::default()).run(tmp.path(), &SilentReporter);
    assert!(matches!(result, Err(Error::Mime { .. })));
}

/// Make `path` unreadable. Returns `false` when the process can still read
/// it anyway (running as root), in which case the caller skips its test.
#[cfg(unix)]
fn make_unreadable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o000)).unwrap();
    fs::File::open(path).is_err()
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_rejected_when_configured() {
    let tmp = tempdir().unwrap();
    let locked = tmp.path().join("locked.txt");
    fs::write(&locked, "no_risk_found").unwrap();
    fs::write(tmp.path().join("fine.txt"), "no_risk_found").unwrap();
    if !make_unreadable(&locked) {
        return;
    }

    let mock = Arc::new(MockAnalyzer::new());
    let run = RunConfig {
        on_file_error: FileErrorPolicy::Reject,
        ..run_config()
    };
    let outcome = AdmissionEngine::new(mock.clone(), submit_all())
        .with_run_config(run)
        .run(tmp.path(), &SilentReporter)
        .unwrap();

    assert_eq!(outcome.files_found, 2);
    assert_eq!(outcome.stats.submitted, 2);
    assert_eq!(outcome.stats.file_errors, 1);
    assert_eq!(outcome.stats.rejected, 1);
    assert_eq!(outcome.stats.admitted, 1);
    assert_eq!(mock.uploads(), 1, "The unreadable file is never uploaded");
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_aborts_by_default() {
    let tmp = tempdir().unwrap();
    let locked = tmp.path().join("locked.txt");
    fs::write(&locked, "no_risk_found").unwrap();
    if !make_unreadable(&locked) {
        return;
    }

    let mock = Arc::new(MockAnalyzer::new());
    let result = engine(&mock, submit_all(), Policy::default()).run(tmp.path(), &SilentReporter);
    assert!(matches!(result, Err(Error::Fingerprint { .. })));
    assert_eq!(mock.uploads(), 0);
}
