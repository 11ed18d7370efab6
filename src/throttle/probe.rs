//! Hardware utilization probes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::LoadController;

/// Source of GPU utilization readings.
///
/// Returning `None` means "unknown" (tool missing, no GPU, timeout). That is
/// a normal condition, never an error.
#[async_trait]
pub trait UtilizationProbe: Send + Sync {
    async fn sample(&self) -> Option<u8>;
}

/// Probe backed by `nvidia-smi`.
#[derive(Debug, Clone)]
pub struct NvidiaSmiProbe {
    timeout: Duration,
}

impl NvidiaSmiProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for NvidiaSmiProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl UtilizationProbe for NvidiaSmiProbe {
    async fn sample(&self) -> Option<u8> {
        let output = Command::new("nvidia-smi")
            .args([
                "--query-gpu=utilization.gpu",
                "--format=csv,noheader,nounits",
            ])
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, output).await {
            Ok(Ok(out)) if out.status.success() => {
                parse_utilization(&String::from_utf8_lossy(&out.stdout))
            }
            Ok(Ok(out)) => {
                debug!(status = %out.status, "nvidia-smi exited unsuccessfully");
                None
            }
            Ok(Err(e)) => {
                debug!(error = %e, "nvidia-smi unavailable");
                None
            }
            Err(_) => {
                debug!(timeout = ?self.timeout, "nvidia-smi timed out");
                None
            }
        }
    }
}

/// Parse the first line of `nvidia-smi` CSV output as a percentage.
pub fn parse_utilization(stdout: &str) -> Option<u8> {
    let first = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
    let value: u32 = first.trim_end_matches('%').trim().parse().ok()?;
    u8::try_from(value.min(100)).ok()
}

/// Refresh `controller` from `probe` every `interval` until `cancel` fires.
pub fn spawn_sampler(
    controller: Arc<LoadController>,
    probe: Arc<dyn UtilizationProbe>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let reading = probe.sample().await;
                    controller.record_utilization(reading);
                }
            }
        }
        debug!("utilization sampler stopped");
    })
}
