//! Unit orchestration and the bounded worker pool.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::state::{Event, Phase, UnitState};
use crate::cache::{CacheEntry, CacheStore, key_for};
use crate::cleaner::clean_ai_output;
use crate::output::write_failure_log;
use crate::providers::GenerationClient;
use crate::telemetry;
use crate::types::{
    GenerationOutcome, GenerationParams, GenerationRequest, OutcomeStatus, RunReport, RunStats,
    UnitReport, WorkUnit,
};
use crate::validate::validate;
use crate::Result;

/// Pool size and per-unit limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Concurrent workers. Default: 4.
    pub workers: usize,
    /// Questions requested per unit. Default: 2.
    pub questions_per_unit: usize,
    /// Excerpts are truncated to this many characters. Default: 6000.
    pub max_excerpt_chars: usize,
    /// Units with shorter excerpts are skipped. Default: 20.
    pub min_excerpt_chars: usize,
    /// Refine attempts after a rejected generation. Default: 1.
    pub refine_attempts: u32,
    /// Failure logs for permanently failed units go here when set.
    pub error_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            questions_per_unit: 2,
            max_excerpt_chars: 6000,
            min_excerpt_chars: 20,
            refine_attempts: 1,
            error_dir: None,
        }
    }
}

/// Result of driving one unit to a terminal phase.
struct Finished {
    status: OutcomeStatus,
    text: Option<String>,
    rejected: Option<String>,
    error: Option<String>,
}

/// Generation pipeline for one run.
///
/// Cheap to clone: the client, cache store and parameters are shared. The
/// cache store and the client's load controller are the only shared
/// mutable state, and both synchronize internally.
#[derive(Clone)]
pub struct Pipeline {
    client: GenerationClient,
    cache: Arc<CacheStore>,
    params: Arc<GenerationParams>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        client: GenerationClient,
        cache: Arc<CacheStore>,
        params: Arc<GenerationParams>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            client,
            cache,
            params,
            config,
        }
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one unit through key derivation, cache lookup, generation,
    /// validation and bounded refinement.
    ///
    /// Never fails: every error ends the unit as
    /// [`OutcomeStatus::FailedPermanently`].
    pub async fn process_unit(&self, unit: WorkUnit) -> UnitReport {
        let started = Instant::now();
        let mut state = UnitState::new(self.config.refine_attempts);

        let finished = match self.drive(&unit, &mut state).await {
            Ok(finished) => finished,
            Err(e) => {
                error!(unit = %unit.name, phase = state.phase.name(), error = %e, "unit aborted");
                Finished {
                    status: OutcomeStatus::FailedPermanently,
                    text: None,
                    rejected: None,
                    error: Some(e.to_string()),
                }
            }
        };

        metrics::counter!(telemetry::UNITS_TOTAL, "status" => finished.status.as_str())
            .increment(1);
        match finished.status {
            OutcomeStatus::FailedPermanently => warn!(
                unit = %unit.name,
                attempts = state.attempts,
                error = finished.error.as_deref().unwrap_or("unknown"),
                "unit failed"
            ),
            status => debug!(
                unit = %unit.name,
                status = status.as_str(),
                attempts = state.attempts,
                "unit finished"
            ),
        }

        let outcome = GenerationOutcome {
            unit_id: unit.name.clone(),
            status: finished.status,
            attempts: state.attempts,
            refines: state.refines_used,
            elapsed: started.elapsed(),
            last_defects: state.last_defects,
            error: finished.error,
        };
        let report = UnitReport {
            unit,
            outcome,
            text: finished.text,
            rejected: finished.rejected,
        };
        if report.outcome.status == OutcomeStatus::FailedPermanently {
            self.log_failure(&report);
        }
        report
    }

    fn log_failure(&self, report: &UnitReport) {
        let Some(dir) = self.config.error_dir.as_deref() else {
            return;
        };
        match write_failure_log(dir, &self.params.subject, report) {
            Ok(path) => {
                debug!(unit = %report.unit.name, path = %path.display(), "failure log written")
            }
            Err(e) => warn!(unit = %report.unit.name, error = %e, "failed to write failure log"),
        }
    }

    async fn drive(&self, unit: &WorkUnit, state: &mut UnitState) -> Result<Finished> {
        let request = GenerationRequest::new(
            &unit.excerpt,
            self.config.max_excerpt_chars,
            self.config.questions_per_unit,
            Arc::clone(&self.params),
        );
        let key = key_for(&self.params, &request.excerpt);
        state.apply(Event::KeyDerived)?;

        if let Some(entry) = self.cache.lookup(&key) {
            state.apply(Event::CacheHit)?;
            return Ok(Finished {
                status: OutcomeStatus::CacheHit,
                text: Some(entry.text),
                rejected: None,
                error: None,
            });
        }
        state.apply(Event::CacheMiss)?;
        state.apply(Event::Generate)?;

        let mut reply = self.client.generate(&request).await;
        let mut rejected: Option<String> = None;
        loop {
            let text = match reply {
                Ok(text) => text,
                Err(e) => {
                    state.apply(Event::GenerationFailed)?;
                    return Ok(Finished {
                        status: OutcomeStatus::FailedPermanently,
                        text: None,
                        rejected,
                        error: Some(e.to_string()),
                    });
                }
            };
            state.apply(Event::TextReceived)?;

            let verdict = validate(&text);
            if verdict.accepted {
                state.apply(Event::Accept)?;
                let cleaned = clean_ai_output(&text);
                let entry = CacheEntry::new(
                    key.clone(),
                    cleaned.clone(),
                    self.params.model.clone(),
                    self.params.subject.clone(),
                );
                if let Err(e) = self.cache.store(&key, &entry) {
                    warn!(unit = %unit.name, error = %e, "failed to cache accepted text");
                }
                let status = if state.refines_used == 0 {
                    OutcomeStatus::Generated
                } else {
                    OutcomeStatus::SelfCorrected
                };
                return Ok(Finished {
                    status,
                    text: Some(cleaned),
                    rejected: None,
                    error: None,
                });
            }

            debug!(unit = %unit.name, defects = ?verdict.defects, "generation rejected");
            state.apply(Event::Reject(verdict.defects))?;
            if state.apply(Event::Retry)? == Phase::FailedPermanent {
                let defects: Vec<&str> = state.last_defects.iter().map(|d| d.as_str()).collect();
                return Ok(Finished {
                    status: OutcomeStatus::FailedPermanently,
                    text: None,
                    rejected: Some(text),
                    error: Some(format!(
                        "still invalid after {} refine attempt(s): {}",
                        state.refines_used,
                        defects.join(", ")
                    )),
                });
            }
            reply = self
                .client
                .refine(&self.params, &text, &state.last_defects)
                .await;
            rejected = Some(text);
        }
    }

    /// Process `units` with at most `workers` units in flight.
    ///
    /// Units whose excerpt is shorter than `min_excerpt_chars` are skipped.
    /// No new unit starts once `cancel` fires; units already in flight
    /// finish, and units never started are counted as cancelled. A unit
    /// whose task panics is reported as failed. Reports come back ordered
    /// by unit sequence.
    pub async fn run(&self, units: Vec<WorkUnit>, cancel: CancellationToken) -> RunReport {
        let started = Instant::now();
        let mut stats = RunStats {
            total: units.len(),
            questions_per_unit: self.config.questions_per_unit,
            ..Default::default()
        };

        let (runnable, skipped): (Vec<_>, Vec<_>) = units
            .into_iter()
            .partition(|u| u.excerpt.trim().chars().count() >= self.config.min_excerpt_chars);
        stats.skipped = skipped.len();
        for unit in &skipped {
            debug!(unit = %unit.name, "excerpt too short, skipping");
        }

        let workers = self.config.workers.clamp(1, runnable.len().max(1));
        info!(units = runnable.len(), workers, "starting generation");

        let permits = Arc::new(Semaphore::new(workers));
        let mut queue = VecDeque::from(runnable);
        let mut in_flight: HashMap<tokio::task::Id, WorkUnit> = HashMap::new();
        let mut join_set: JoinSet<UnitReport> = JoinSet::new();
        while let Some(unit) = queue.pop_front() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = Arc::clone(&permits).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                queue.push_front(unit);
                break;
            };
            let pipeline = self.clone();
            let handle = join_set.spawn({
                let unit = unit.clone();
                async move {
                    let report = pipeline.process_unit(unit).await;
                    drop(permit);
                    report
                }
            });
            in_flight.insert(handle.id(), unit);
        }

        let mut reports = Vec::new();
        while let Some(joined) = join_set.join_next_with_id().await {
            match joined {
                Ok((id, report)) => {
                    in_flight.remove(&id);
                    reports.push(report);
                }
                Err(e) => {
                    let Some(unit) = in_flight.remove(&e.id()) else {
                        error!(error = %e, "unit task failed");
                        continue;
                    };
                    error!(unit = %unit.name, error = %e, "unit task failed");
                    reports.push(self.crashed(unit, e.to_string()));
                }
            }
        }

        stats.cancelled = queue.len();
        if stats.cancelled > 0 {
            warn!(cancelled = stats.cancelled, "run cancelled before all units started");
        }

        reports.sort_by_key(|r| r.unit.seq);
        for report in &reports {
            stats.record(&report.outcome);
        }
        stats.elapsed = started.elapsed();

        let snapshot = self.client.throttle().snapshot();
        info!(
            cache_hits = stats.cache_hits,
            generated = stats.generated,
            self_corrected = stats.self_corrected,
            failed = stats.failed,
            multiplier = snapshot.multiplier,
            "generation finished"
        );

        RunReport {
            units: reports,
            stats,
        }
    }

    /// Report for a unit whose task panicked.
    fn crashed(&self, unit: WorkUnit, error: String) -> UnitReport {
        metrics::counter!(
            telemetry::UNITS_TOTAL,
            "status" => OutcomeStatus::FailedPermanently.as_str()
        )
        .increment(1);
        let report = UnitReport {
            outcome: GenerationOutcome {
                unit_id: unit.name.clone(),
                status: OutcomeStatus::FailedPermanently,
                attempts: 0,
                refines: 0,
                elapsed: Duration::ZERO,
                last_defects: Vec::new(),
                error: Some(error),
            },
            unit,
            text: None,
            rejected: None,
        };
        self.log_failure(&report);
        report
    }
}
