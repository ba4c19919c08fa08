//! End-to-end gate runs over report files on disk.

mod common;

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use common::{temp_db_url, temp_dir, unreachable_db_url, CoberturaBuilder};
use covgate::adapters::audit::{build_audit_sink, JsonlAuditSink, MemoryAuditSink};
use covgate::adapters::sqlite::{create_pool, Migrator, SqliteAuditSink};
use covgate::domain::models::{
    AuditConfig, AuditSinkKind, GateSettings, OverridePolicy, OverrideRecord, ReportId,
    ReportSource, RunMetadata, RunStatus, TestOutcome, ThresholdConfig, Verdict,
};
use covgate::services::{verify_audit_log, GateRequest, GateService};
use covgate::{AuditSink, ConfigLoader, GateError};

const REASON: &str = "approved by release manager, see ticket X";

/// Report A: 100 lines, 80 covered. Report B: 100 lines, 85 covered,
/// 90 lines shared with A.
fn overlapping_reports(dir: &std::path::Path) -> Vec<ReportSource> {
    let a = CoberturaBuilder::new()
        .lines("Core.cs", 1, 20, 0)
        .lines("Core.cs", 21, 80, 3)
        .write_to(dir, "a.cobertura.xml");
    let b = CoberturaBuilder::new()
        .lines("Core.cs", 11, 10, 0)
        .lines("Core.cs", 21, 75, 1)
        .lines("Core.cs", 96, 5, 0)
        .lines("Core.cs", 101, 10, 2)
        .write_to(dir, "b.cobertura.xml");
    vec![ReportSource::path(a), ReportSource::path(b)]
}

/// One report aggregating to 172/208 lines and 86/104 branches (82.69% each),
/// plus a second report that only repeats a subset with lower counts.
fn below_threshold_reports(dir: &std::path::Path) -> Vec<ReportSource> {
    let mut full = CoberturaBuilder::new()
        .lines("Service.cs", 1, 129, 1)
        .lines("Service.cs", 130, 27, 0);
    for number in 157..200 {
        full = full.branch("Service.cs", number, 1, 2, 2);
    }
    for number in 200..209 {
        full = full.branch("Service.cs", number, 0, 0, 2);
    }

    let mut partial = CoberturaBuilder::new().lines("Service.cs", 1, 100, 0);
    for number in 157..200 {
        partial = partial.branch("Service.cs", number, 1, 1, 2);
    }

    vec![
        ReportSource::path(full.write_to(dir, "unit.cobertura.xml")),
        ReportSource::path(partial.write_to(dir, "integration.cobertura.xml")),
    ]
}

fn gated(overrides: OverridePolicy) -> GateSettings {
    GateSettings {
        thresholds: ThresholdConfig::new(Some(90.0), Some(85.0)).unwrap(),
        overrides,
        metadata: RunMetadata {
            run_id: Some("4711".to_string()),
            git_ref: Some("refs/heads/main".to_string()),
            ..RunMetadata::default()
        },
        ..GateSettings::default()
    }
}

#[tokio::test]
async fn test_overlapping_reports_are_not_double_counted() {
    common::setup_test_logging();
    let dir = temp_dir();

    let service = GateService::new(GateSettings::default(), Arc::new(MemoryAuditSink::new()));
    let summary = service
        .run(GateRequest {
            reports: overlapping_reports(dir.path()),
            tests: TestOutcome::passed(),
        })
        .await
        .unwrap();

    assert_eq!(summary.coverage.lines_valid(), 110);
    assert_eq!(summary.coverage.lines_covered(), 90);
    assert_eq!(summary.coverage.line_pct(), 81.82);
    assert_eq!(summary.coverage.method(), "union_by_file_line");
    assert_eq!(summary.coverage_sources.len(), 2);
    assert_eq!(summary.verdict, Verdict::NoThreshold);
    assert_eq!(summary.status, RunStatus::Ok);
}

#[tokio::test]
async fn test_coverage_failed_without_override() {
    let dir = temp_dir();
    let log = dir.path().join("logs/ci/coverage-override.jsonl");

    let service = GateService::new(
        gated(OverridePolicy::disabled()),
        Arc::new(JsonlAuditSink::new(&log)),
    );
    let summary = service
        .run(GateRequest {
            reports: below_threshold_reports(dir.path()),
            tests: TestOutcome::passed(),
        })
        .await
        .unwrap();

    assert_eq!(summary.coverage.line_pct(), 82.69);
    assert_eq!(summary.coverage.branch_pct(), 82.69);
    assert_eq!(summary.coverage.branches_valid(), 104);
    assert_eq!(summary.verdict, Verdict::CoverageFail);
    assert!(!summary.threshold_ok);
    assert_eq!(summary.status, RunStatus::CoverageFailed);
    assert_eq!(summary.exit_code(), 2);
    assert!(summary.applied_override.is_none());
    assert!(!log.exists(), "no audit record without an accepted override");
}

#[tokio::test]
async fn test_override_appends_exactly_one_record() {
    let dir = temp_dir();
    let log = dir.path().join("logs/ci/coverage-override.jsonl");

    let service = GateService::new(
        gated(OverridePolicy::new(true, Some(REASON))),
        Arc::new(JsonlAuditSink::new(&log)),
    );
    let summary = service
        .run(GateRequest {
            reports: below_threshold_reports(dir.path()),
            tests: TestOutcome::passed(),
        })
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::CoverageOverridden);
    assert_eq!(summary.exit_code(), 0);

    let contents = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1);

    let record: OverrideRecord = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(record.status, RunStatus::CoverageOverridden);
    assert_eq!(record.line_pct, 82.69);
    assert_eq!(record.branch_pct, 82.69);
    assert_eq!(record.lines_min, Some(90.0));
    assert_eq!(record.branches_min, Some(85.0));
    assert_eq!(record.override_reason, REASON);
    assert_eq!(record.run_id.as_deref(), Some("4711"));

    let report = verify_audit_log(BufReader::new(File::open(&log).unwrap()));
    assert!(report.is_valid(true), "{:?}", report.issues);
    assert_eq!(report.valid_entries, 1);
}

#[tokio::test]
async fn test_overrides_accumulate_in_the_log() {
    let dir = temp_dir();
    let log = dir.path().join("coverage-override.jsonl");
    let sink = Arc::new(JsonlAuditSink::new(&log));

    for reason in ["first approval", "second approval"] {
        let service = GateService::new(gated(OverridePolicy::new(true, Some(reason))), sink.clone());
        let summary = service
            .run(GateRequest {
                reports: below_threshold_reports(dir.path()),
                tests: TestOutcome::passed(),
            })
            .await
            .unwrap();
        assert_eq!(summary.status, RunStatus::CoverageOverridden);
    }

    let contents = std::fs::read_to_string(&log).unwrap();
    let reasons: Vec<String> = contents
        .lines()
        .map(|line| serde_json::from_str::<OverrideRecord>(line).unwrap().override_reason)
        .collect();
    assert_eq!(reasons, vec!["first approval", "second approval"]);
}

#[tokio::test]
async fn test_override_cannot_mask_failed_tests() {
    let dir = temp_dir();
    let log = dir.path().join("coverage-override.jsonl");

    let service = GateService::new(
        gated(OverridePolicy::new(true, Some(REASON))),
        Arc::new(JsonlAuditSink::new(&log)),
    );
    let summary = service
        .run(GateRequest {
            reports: below_threshold_reports(dir.path()),
            tests: TestOutcome::from_exit_code(1),
        })
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::TestsFailed);
    assert_eq!(summary.exit_code(), 1);
    assert_eq!(summary.verdict, Verdict::CoverageFail);
    assert!(!log.exists());
}

#[tokio::test]
async fn test_unwritable_audit_log_fails_the_run() {
    let dir = temp_dir();
    // A directory where the log file should be makes every append fail.
    let log = dir.path().join("taken");
    std::fs::create_dir_all(&log).unwrap();

    let service = GateService::new(
        gated(OverridePolicy::new(true, Some(REASON))),
        Arc::new(JsonlAuditSink::new(&log)),
    );
    let result = service
        .run(GateRequest {
            reports: below_threshold_reports(dir.path()),
            tests: TestOutcome::passed(),
        })
        .await;

    assert!(matches!(result, Err(GateError::Audit(_))));
}

#[tokio::test]
async fn test_malformed_report_is_excluded() {
    let dir = temp_dir();
    let good = CoberturaBuilder::new()
        .lines("Api.cs", 1, 4, 1)
        .write_to(dir.path(), "good.xml");
    let truncated = dir.path().join("truncated.xml");
    let body = CoberturaBuilder::new().lines("Other.cs", 1, 50, 1).build();
    std::fs::write(&truncated, &body[..body.len() / 2]).unwrap();
    let missing = dir.path().join("missing.xml");

    let service = GateService::new(GateSettings::default(), Arc::new(MemoryAuditSink::new()));
    let summary = service
        .run(GateRequest {
            reports: vec![
                ReportSource::path(&good),
                ReportSource::path(&truncated),
                ReportSource::path(&missing),
            ],
            tests: TestOutcome::passed(),
        })
        .await
        .unwrap();

    assert_eq!(summary.coverage.lines_valid(), 4);
    assert_eq!(summary.coverage.lines_covered(), 4);
    assert_eq!(summary.coverage_sources, vec![ReportId::from(good.as_path())]);
    let excluded: Vec<_> = summary.report_errors.iter().map(|e| e.report.clone()).collect();
    assert_eq!(
        excluded,
        vec![
            ReportId::from(truncated.as_path()),
            ReportId::from(missing.as_path())
        ]
    );
}

#[tokio::test]
async fn test_unparseable_branch_is_reported() {
    let dir = temp_dir();
    let report = CoberturaBuilder::new()
        .branch("Parser.cs", 1, 1, 1, 2)
        .raw_branch("Parser.cs", 2, 1, "garbage")
        .write_to(dir.path(), "report.xml");

    let service = GateService::new(GateSettings::default(), Arc::new(MemoryAuditSink::new()));
    let summary = service
        .run(GateRequest {
            reports: vec![ReportSource::path(report)],
            tests: TestOutcome::passed(),
        })
        .await
        .unwrap();

    assert_eq!(summary.coverage.lines_valid(), 2);
    assert_eq!(summary.coverage.branches_valid(), 2);
    assert_eq!(summary.coverage.branches_covered(), 1);
    assert_eq!(summary.branch_parse_failures.len(), 1);
    assert_eq!(summary.branch_parse_failures[0].line_number, 2);
    assert_eq!(summary.branch_parse_failures[0].raw, "garbage");
}

#[tokio::test]
async fn test_sqlite_audit_trail() {
    let dir = temp_dir();
    let (_db_dir, url) = temp_db_url();

    let pool = create_pool(&url, None).await.unwrap();
    Migrator::new(pool.clone())
        .run_embedded_migrations()
        .await
        .unwrap();
    let sink = Arc::new(SqliteAuditSink::new(pool));

    let service = GateService::new(gated(OverridePolicy::new(true, Some(REASON))), sink.clone());
    let summary = service
        .run(GateRequest {
            reports: below_threshold_reports(dir.path()),
            tests: TestOutcome::passed(),
        })
        .await
        .unwrap();
    assert_eq!(summary.status, RunStatus::CoverageOverridden);

    let records = sink.list().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].override_reason, REASON);
    assert_eq!(records[0].line_pct, 82.69);
    assert_eq!(records[0].git_ref.as_deref(), Some("refs/heads/main"));
}

#[tokio::test]
async fn test_summary_json_shape() {
    let dir = temp_dir();
    let service = GateService::new(
        gated(OverridePolicy::new(true, Some(REASON))),
        Arc::new(MemoryAuditSink::new()),
    );
    let summary = service
        .run(GateRequest {
            reports: below_threshold_reports(dir.path()),
            tests: TestOutcome::passed(),
        })
        .await
        .unwrap();

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["status"], "coverage_overridden");
    assert_eq!(json["threshold_ok"], false);
    assert_eq!(json["coverage"]["lines_covered"], 172);
    assert_eq!(json["coverage"]["lines_valid"], 208);
    assert_eq!(json["coverage"]["line_pct"], 82.69);
    assert_eq!(json["coverage"]["method"], "union_by_file_line");
    assert_eq!(json["override"]["reason"], REASON);
    assert!(json.get("report_errors").is_none());
}

#[tokio::test]
async fn test_config_file_drives_the_gate() {
    let dir = temp_dir();
    let log = dir.path().join("audit/overrides.jsonl");
    let config_path = dir.path().join("config.yaml");
    std::fs::write(
        &config_path,
        format!(
            "gate:\n  lines_min: 90\n  branches_min: \"85\"\n  override_allow: \"true\"\n  override_reason: \"{REASON}\"\naudit:\n  sink: jsonl\n  path: {}\n",
            log.display()
        ),
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&config_path).unwrap();
    let settings = GateSettings::try_from(&config).unwrap();
    assert_eq!(settings.thresholds.lines_min.minimum(), Some(90.0));
    assert_eq!(settings.thresholds.branches_min.minimum(), Some(85.0));
    assert!(settings.overrides.allow);

    let sink = build_audit_sink(&config.audit);
    let summary = GateService::new(settings, sink)
        .run(GateRequest {
            reports: below_threshold_reports(dir.path()),
            tests: TestOutcome::passed(),
        })
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::CoverageOverridden);
    assert_eq!(std::fs::read_to_string(&log).unwrap().lines().count(), 1);
}

#[tokio::test]
async fn test_sqlite_sink_from_config() {
    let (_db_dir, url) = temp_db_url();
    let sink = build_audit_sink(&AuditConfig {
        sink: AuditSinkKind::Sqlite,
        database_url: url,
        ..AuditConfig::default()
    });

    let record = OverrideRecord::new(
        REASON,
        &covgate::AggregateSnapshot::from_counts(172, 208, 86, 104),
        &ThresholdConfig::new(Some(90.0), Some(85.0)).unwrap(),
        &RunMetadata::default(),
    );
    sink.append(&record).await.unwrap();
}

#[tokio::test]
async fn test_unreachable_database_does_not_fail_a_passing_run() {
    let dir = temp_dir();
    let (_db_dir, url) = unreachable_db_url();
    let sink = build_audit_sink(&AuditConfig {
        sink: AuditSinkKind::Sqlite,
        database_url: url,
        ..AuditConfig::default()
    });

    let settings = GateSettings {
        thresholds: ThresholdConfig::new(Some(80.0), None).unwrap(),
        overrides: OverridePolicy::new(true, Some(REASON)),
        ..GateSettings::default()
    };
    let summary = GateService::new(settings, sink)
        .run(GateRequest {
            reports: overlapping_reports(dir.path()),
            tests: TestOutcome::passed(),
        })
        .await
        .unwrap();

    assert_eq!(summary.verdict, Verdict::Pass);
    assert_eq!(summary.status, RunStatus::Ok);
    assert!(summary.applied_override.is_none());
}

#[tokio::test]
async fn test_unreachable_database_fails_an_overridden_run() {
    let dir = temp_dir();
    let (_db_dir, url) = unreachable_db_url();
    let sink = build_audit_sink(&AuditConfig {
        sink: AuditSinkKind::Sqlite,
        database_url: url,
        ..AuditConfig::default()
    });

    let result = GateService::new(gated(OverridePolicy::new(true, Some(REASON))), sink)
        .run(GateRequest {
            reports: below_threshold_reports(dir.path()),
            tests: TestOutcome::passed(),
        })
        .await;

    assert!(matches!(result, Err(GateError::Audit(_))));
}
