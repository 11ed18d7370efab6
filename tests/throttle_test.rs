use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use mcqforge::throttle::{UtilizationProbe, spawn_sampler};
use mcqforge::{LoadController, ThrottleConfig};

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[tokio::test(start_paused = true)]
async fn errors_above_threshold_raise_the_multiplier() {
    let ctl = LoadController::default();

    // Up to the threshold is still healthy
    for _ in 0..5 {
        ctl.record_error();
    }
    assert_close(ctl.recommend_delay_multiplier(), 1.0);

    ctl.record_error();
    assert_close(ctl.recommend_delay_multiplier(), 1.5);
    ctl.record_error();
    assert_close(ctl.recommend_delay_multiplier(), 2.25);
    assert_eq!(ctl.snapshot().recent_errors, 7);
}

#[tokio::test(start_paused = true)]
async fn sustained_pressure_is_monotonic_and_capped() {
    let ctl = LoadController::default();
    let mut previous = ctl.recommend_delay_multiplier();
    for _ in 0..20 {
        ctl.record_utilization(Some(97));
        let current = ctl.recommend_delay_multiplier();
        assert!(current >= previous);
        previous = current;
    }
    assert_close(previous, 8.0);
}

#[tokio::test(start_paused = true)]
async fn recovery_is_gradual_once_errors_age_out() {
    let ctl = LoadController::default();
    for _ in 0..8 {
        ctl.record_error();
    }
    let peak = ctl.recommend_delay_multiplier();
    assert!(peak > 1.0);

    // Still inside the window: pressure persists
    tokio::time::advance(Duration::from_secs(30)).await;
    ctl.record_latency(Duration::from_millis(100));
    assert!(ctl.recommend_delay_multiplier() > peak);
    let raised = ctl.recommend_delay_multiplier();

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(ctl.snapshot().recent_errors, 0);

    // One healthy sample does not snap back to baseline
    ctl.record_latency(Duration::from_millis(100));
    let after_one = ctl.recommend_delay_multiplier();
    assert_close(after_one, raised * 0.85);
    assert!(after_one > 1.0);

    let mut previous = after_one;
    for _ in 0..50 {
        ctl.record_latency(Duration::from_millis(100));
        let current = ctl.recommend_delay_multiplier();
        assert!(current <= previous);
        assert!(current >= 1.0);
        previous = current;
    }
    assert_close(previous, 1.0);
}

#[tokio::test(start_paused = true)]
async fn cool_gpu_decays_faster() {
    let warm = LoadController::default();
    let cool = LoadController::default();
    for ctl in [&warm, &cool] {
        ctl.record_utilization(Some(95));
        ctl.record_utilization(Some(95));
    }
    warm.record_utilization(Some(50));
    cool.record_utilization(Some(10));

    assert_close(warm.recommend_delay_multiplier(), 2.25 * 0.85);
    assert_close(cool.recommend_delay_multiplier(), 2.25 * 0.7);
}

#[tokio::test(start_paused = true)]
async fn slow_responses_are_pressure() {
    let ctl = LoadController::new(ThrottleConfig {
        latency_target: Duration::from_millis(500),
        ..Default::default()
    });
    ctl.record_latency(Duration::from_secs(2));
    assert_close(ctl.recommend_delay_multiplier(), 1.5);
    assert_eq!(ctl.snapshot().mean_latency, Some(Duration::from_secs(2)));
}

#[tokio::test(start_paused = true)]
async fn error_window_holds_at_most_window_size() {
    let ctl = LoadController::new(ThrottleConfig {
        window_size: 4,
        error_threshold: 100,
        ..Default::default()
    });
    for _ in 0..10 {
        ctl.record_error();
    }
    assert_eq!(ctl.snapshot().recent_errors, 4);
}

#[tokio::test(start_paused = true)]
async fn shared_controller_is_consistent_across_tasks() {
    let ctl = Arc::new(LoadController::default());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let ctl = Arc::clone(&ctl);
        handles.push(tokio::spawn(async move {
            for _ in 0..10 {
                ctl.record_utilization(Some(99));
                let m = ctl.recommend_delay_multiplier();
                assert!((1.0..=8.0).contains(&m));
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_close(ctl.recommend_delay_multiplier(), 8.0);
}

struct FixedProbe(Option<u8>);

#[async_trait]
impl UtilizationProbe for FixedProbe {
    async fn sample(&self) -> Option<u8> {
        self.0
    }
}

#[tokio::test(start_paused = true)]
async fn sampler_feeds_readings_until_cancelled() {
    let ctl = Arc::new(LoadController::default());
    let cancel = CancellationToken::new();
    let handle = spawn_sampler(
        Arc::clone(&ctl),
        Arc::new(FixedProbe(Some(90))),
        Duration::from_secs(5),
        cancel.clone(),
    );

    // First tick fires immediately, then every 5 s
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_close(ctl.recommend_delay_multiplier(), 1.5 * 1.5 * 1.5);
    assert_eq!(ctl.snapshot().utilization, Some(90));

    cancel.cancel();
    handle.await.unwrap();

    let settled = ctl.recommend_delay_multiplier();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_close(ctl.recommend_delay_multiplier(), settled);
}

#[tokio::test(start_paused = true)]
async fn failed_probe_drops_utilization() {
    let ctl = Arc::new(LoadController::default());
    ctl.record_utilization(Some(95));
    let cancel = CancellationToken::new();
    let handle = spawn_sampler(
        Arc::clone(&ctl),
        Arc::new(FixedProbe(None)),
        Duration::from_secs(5),
        cancel.clone(),
    );
    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();
    handle.await.unwrap();

    assert_eq!(ctl.snapshot().utilization, None);
}
