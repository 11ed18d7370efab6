//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use mcqforge::providers::{GenerateProvider, Prompt};
use mcqforge::{
    CacheStore, ForgeError, GenerationClient, GenerationParams, LoadController, Pipeline,
    PipelineConfig, Preset, Result, RetryConfig, UnitKind, UnitReport, WorkUnit, telemetry,
};

// ============================================================================
// Mock providers
// ============================================================================

struct ValidProvider;

#[async_trait]
impl GenerateProvider for ValidProvider {
    fn name(&self) -> &str {
        "valid"
    }

    async fn generate(&self, _prompt: &Prompt) -> Result<String> {
        Ok("What is GDP?\n1. A\n2. B\n3. C\n4. D\n?\n**Answer:** 1) A\n> **Explanation:** E"
            .to_string())
    }
}

struct OverloadedProvider;

#[async_trait]
impl GenerateProvider for OverloadedProvider {
    fn name(&self) -> &str {
        "overloaded"
    }

    async fn generate(&self, _prompt: &Prompt) -> Result<String> {
        Err(ForgeError::Api {
            status: 503,
            message: "busy".into(),
        })
    }
}

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Sum counter values for `name` carrying label `label=value`.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Check if any histogram entries exist for a given metric name.
fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

fn gauge_value(snapshot: &SnapshotVec, name: &str) -> Option<f64> {
    snapshot
        .iter()
        .find(|(key, _, _, _)| key.kind() == MetricKind::Gauge && key.key().name() == name)
        .and_then(|(_, _, _, value)| match value {
            DebugValue::Gauge(v) => Some(v.into_inner()),
            _ => None,
        })
}

fn pipeline(provider: Arc<dyn GenerateProvider>, cache_dir: &std::path::Path) -> Pipeline {
    let params = GenerationParams::resolve("llama3:8b", "ECON1101", Preset::Exam, None, None);
    let client = GenerationClient::new(
        provider,
        RetryConfig::new()
            .max_attempts(2)
            .initial_delay(Duration::from_millis(1))
            .jitter(Duration::ZERO),
        Arc::new(LoadController::default()),
    );
    Pipeline::new(
        client,
        Arc::new(CacheStore::open(cache_dir).unwrap()),
        Arc::new(params),
        PipelineConfig::default(),
    )
}

fn unit() -> WorkUnit {
    WorkUnit::new(
        0,
        "W02 Growth.md",
        UnitKind::Lecture,
        "Gross domestic product measures the value of final output.",
    )
}

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` ensures the sync `with_local_recorder` closure stays
/// on the current thread while `block_on` drives the inner async work.
fn recorded<F, T>(recorder: &DebuggingRecorder, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    metrics::with_local_recorder(recorder, || {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
    })
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn generated_unit_records_request_cache_and_outcome_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let pipeline = pipeline(Arc::new(ValidProvider), dir.path());

    let report: UnitReport = recorded(&recorder, pipeline.process_unit(unit()));
    assert!(report.outcome.status.is_success());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 1);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "status", "ok"),
        1
    );
    assert!(has_histogram(&snapshot, telemetry::REQUEST_DURATION_SECONDS));
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_WRITES_TOTAL), 1);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::UNITS_TOTAL, "status", "generated"),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn cache_hit_records_hit_and_no_request() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(Arc::new(ValidProvider), dir.path());
    // Warm the cache outside the recorder
    pipeline.process_unit(unit()).await;

    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorded(&recorder, pipeline.process_unit(unit()));

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 0);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::UNITS_TOTAL, "status", "cache_hit"),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn transient_failures_record_retries_and_errors() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let pipeline = pipeline(Arc::new(OverloadedProvider), dir.path());

    recorded(&recorder, pipeline.process_unit(unit()));

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "status", "error"),
        2
    );
    assert_eq!(counter_total(&snapshot, telemetry::RETRIES_TOTAL), 1);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::UNITS_TOTAL, "status", "failed"),
        1
    );
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_WRITES_TOTAL), 0);
}

#[test]
fn throttle_changes_publish_the_multiplier_gauge() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        let ctl = LoadController::default();
        ctl.record_utilization(Some(95));
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(gauge_value(&snapshot, telemetry::THROTTLE_MULTIPLIER), Some(1.5));
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(Arc::new(ValidProvider), dir.path());
    let report = pipeline.process_unit(unit()).await;
    assert!(report.outcome.status.is_success());
}
