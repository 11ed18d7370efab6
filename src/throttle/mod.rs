//! Adaptive request throttling.
//!
//! [`LoadController`] watches three live signals (request latency, recent
//! errors and GPU utilization) and publishes a delay multiplier that the
//! generation client applies to pacing and backoff. One controller is built
//! per run and shared by handle with every worker.
//!
//! # Policy
//!
//! Every recorded signal re-evaluates the multiplier:
//!
//! - **Pressure** (errors in window above threshold, mean latency above
//!   target, or utilization above `gpu_high`) multiplies it by `step_up`,
//!   capped at `max_multiplier`.
//! - **Healthy** signals multiply it by `decay` (or `cool_decay` when the
//!   GPU is known to be below `gpu_low`), floored at 1.0.
//!
//! Decay is multiplicative, so one good sample after a burst of pressure
//! never snaps the factor straight back to baseline.
//!
//! # Concurrency
//!
//! Signal windows sit behind a short-lived mutex. The published multiplier
//! is an `AtomicU64` holding `f64` bits, so
//! [`recommend_delay_multiplier`](LoadController::recommend_delay_multiplier)
//! never blocks. Readers may observe a value one evaluation old.

pub mod probe;

pub use probe::{NvidiaSmiProbe, UtilizationProbe, parse_utilization, spawn_sampler};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::telemetry;

/// Thresholds and step sizes for [`LoadController`].
#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleConfig {
    /// Mean latency above this counts as pressure. Default: 1.5 s.
    pub latency_target: Duration,
    /// More errors than this inside `error_window` counts as pressure. Default: 5.
    pub error_threshold: usize,
    /// Span over which errors are counted. Default: 60 s.
    pub error_window: Duration,
    /// Utilization (percent) above which the GPU is saturated. Default: 80.
    pub gpu_high: u8,
    /// Utilization (percent) below which the GPU is cool. Default: 35.
    pub gpu_low: u8,
    /// Latency samples (and error timestamps) retained. Default: 50.
    pub window_size: usize,
    /// Upper bound on the multiplier. Default: 8.0.
    pub max_multiplier: f64,
    /// Growth factor under pressure. Default: 1.5.
    pub step_up: f64,
    /// Decay factor when healthy. Default: 0.85.
    pub decay: f64,
    /// Decay factor when healthy and the GPU is cool. Default: 0.7.
    pub cool_decay: f64,
    /// Base pause before each request, scaled by `multiplier - 1`.
    /// Default: 250 ms.
    pub pacing_delay: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            latency_target: Duration::from_millis(1500),
            error_threshold: 5,
            error_window: Duration::from_secs(60),
            gpu_high: 80,
            gpu_low: 35,
            window_size: 50,
            max_multiplier: 8.0,
            step_up: 1.5,
            decay: 0.85,
            cool_decay: 0.7,
            pacing_delay: Duration::from_millis(250),
        }
    }
}

/// Point-in-time view of the controller, for logging.
#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleSnapshot {
    pub mean_latency: Option<Duration>,
    pub recent_errors: usize,
    pub utilization: Option<u8>,
    pub multiplier: f64,
}

#[derive(Debug)]
struct Signals {
    latencies: VecDeque<Duration>,
    errors: VecDeque<Instant>,
    utilization: Option<u8>,
    factor: f64,
}

impl Signals {
    fn mean_latency(&self) -> Option<Duration> {
        if self.latencies.is_empty() {
            return None;
        }
        let total: Duration = self.latencies.iter().sum();
        Some(total / self.latencies.len() as u32)
    }

    fn prune_errors(&mut self, window: Duration) {
        let now = Instant::now();
        while let Some(&oldest) = self.errors.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.errors.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Process-wide load feedback loop. See the [module docs](self).
pub struct LoadController {
    config: ThrottleConfig,
    signals: Mutex<Signals>,
    /// Current multiplier as `f64` bits.
    multiplier: AtomicU64,
}

impl LoadController {
    pub fn new(config: ThrottleConfig) -> Self {
        let window = config.window_size.max(1);
        Self {
            signals: Mutex::new(Signals {
                latencies: VecDeque::with_capacity(window),
                errors: VecDeque::with_capacity(window),
                utilization: None,
                factor: 1.0,
            }),
            multiplier: AtomicU64::new(1.0_f64.to_bits()),
            config,
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Signals> {
        // A panic while holding the lock cannot leave the windows invalid.
        self.signals.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the duration of a request that reached the endpoint.
    pub fn record_latency(&self, latency: Duration) {
        let mut signals = self.lock();
        if signals.latencies.len() >= self.config.window_size.max(1) {
            signals.latencies.pop_front();
        }
        signals.latencies.push_back(latency);
        self.evaluate(&mut signals);
    }

    /// Record one failed request.
    pub fn record_error(&self) {
        let mut signals = self.lock();
        signals.prune_errors(self.config.error_window);
        if signals.errors.len() >= self.config.window_size.max(1) {
            signals.errors.pop_front();
        }
        signals.errors.push_back(Instant::now());
        self.evaluate(&mut signals);
    }

    /// Record a utilization reading. `None` means the probe was unavailable
    /// and utilization drops out of the policy.
    pub fn record_utilization(&self, percent: Option<u8>) {
        let mut signals = self.lock();
        signals.utilization = percent.map(|p| p.min(100));
        self.evaluate(&mut signals);
    }

    /// Current delay multiplier, always in `1.0..=max_multiplier`.
    ///
    /// Lock-free.
    pub fn recommend_delay_multiplier(&self) -> f64 {
        f64::from_bits(self.multiplier.load(Ordering::Relaxed))
    }

    /// Pause to take before issuing a request. Zero at baseline.
    pub fn pacing_delay(&self) -> Duration {
        let excess = self.recommend_delay_multiplier() - 1.0;
        if excess <= 0.0 {
            return Duration::ZERO;
        }
        self.config.pacing_delay.mul_f64(excess)
    }

    pub fn snapshot(&self) -> ThrottleSnapshot {
        let mut signals = self.lock();
        signals.prune_errors(self.config.error_window);
        ThrottleSnapshot {
            mean_latency: signals.mean_latency(),
            recent_errors: signals.errors.len(),
            utilization: signals.utilization,
            multiplier: signals.factor,
        }
    }

    fn evaluate(&self, signals: &mut Signals) {
        let cfg = &self.config;
        signals.prune_errors(cfg.error_window);

        let error_pressure = signals.errors.len() > cfg.error_threshold;
        let latency_pressure = signals
            .mean_latency()
            .is_some_and(|mean| mean > cfg.latency_target);
        let gpu_pressure = signals.utilization.is_some_and(|u| u > cfg.gpu_high);

        let previous = signals.factor;
        signals.factor = if error_pressure || latency_pressure || gpu_pressure {
            (previous * cfg.step_up).min(cfg.max_multiplier)
        } else {
            let cool = signals.utilization.is_some_and(|u| u < cfg.gpu_low);
            let decay = if cool { cfg.cool_decay } else { cfg.decay };
            (previous * decay).max(1.0)
        };

        if signals.factor != previous {
            self.multiplier
                .store(signals.factor.to_bits(), Ordering::Relaxed);
            metrics::gauge!(telemetry::THROTTLE_MULTIPLIER).set(signals.factor);
            debug!(
                from = previous,
                to = signals.factor,
                errors = signals.errors.len(),
                gpu = ?signals.utilization,
                "throttle multiplier changed"
            );
        }
    }
}

impl Default for LoadController {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}

impl std::fmt::Debug for LoadController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadController")
            .field("multiplier", &self.recommend_delay_multiplier())
            .field("config", &self.config)
            .finish()
    }
}
