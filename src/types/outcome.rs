//! Per-unit outcomes and run-level statistics.

use std::time::Duration;

use serde::Serialize;

use super::request::WorkUnit;
use super::validation::DefectKind;

/// Terminal status of one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Served from the cache with no generation call.
    CacheHit,
    /// Accepted on the first generation.
    Generated,
    /// Accepted after one or more refine attempts.
    SelfCorrected,
    /// Retry ceiling or refine ceiling exhausted. Excluded from output.
    FailedPermanently,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CacheHit => "cache_hit",
            Self::Generated => "generated",
            Self::SelfCorrected => "self_corrected",
            Self::FailedPermanently => "failed",
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::FailedPermanently)
    }
}

/// What happened to one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    pub unit_id: String,
    pub status: OutcomeStatus,
    /// Generation calls issued (initial plus refines). Zero for cache hits.
    pub attempts: u32,
    /// Refine calls among `attempts`.
    pub refines: u32,
    pub elapsed: Duration,
    /// Defects of the last rejected text, if the unit failed on validation.
    pub last_defects: Vec<DefectKind>,
    /// Failure reason for `FailedPermanently`.
    pub error: Option<String>,
}

/// Outcome plus the accepted, cleaned text for output assembly.
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub unit: WorkUnit,
    pub outcome: GenerationOutcome,
    pub text: Option<String>,
    /// Raw text of the last rejected generation, kept for failure logs.
    pub rejected: Option<String>,
}

/// Aggregated counts for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub total: usize,
    /// Units whose excerpt was below the minimum length.
    pub skipped: usize,
    pub cache_hits: usize,
    pub generated: usize,
    pub self_corrected: usize,
    pub failed: usize,
    /// Units never started because the run was cancelled.
    pub cancelled: usize,
    pub refine_attempts: u32,
    pub refine_successes: u32,
    /// Generation calls across all units.
    pub attempts: u32,
    /// Questions requested per unit, for throughput.
    pub questions_per_unit: usize,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl RunStats {
    /// Fold one unit outcome into the totals.
    pub fn record(&mut self, outcome: &GenerationOutcome) {
        match outcome.status {
            OutcomeStatus::CacheHit => self.cache_hits += 1,
            OutcomeStatus::Generated => self.generated += 1,
            OutcomeStatus::SelfCorrected => {
                self.self_corrected += 1;
                self.refine_successes += 1;
            }
            OutcomeStatus::FailedPermanently => self.failed += 1,
        }
        self.attempts += outcome.attempts;
        self.refine_attempts += outcome.refines;
    }

    /// Units that produced usable text.
    pub fn succeeded(&self) -> usize {
        self.cache_hits + self.generated + self.self_corrected
    }

    /// Questions produced per minute of wall time, cache hits included.
    pub fn questions_per_minute(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        (self.succeeded() * self.questions_per_unit) as f64 * 60.0 / secs
    }
}

/// Everything a run produced, ordered by unit sequence.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub units: Vec<UnitReport>,
    pub stats: RunStats,
}

impl RunReport {
    /// Accepted sections as `(heading, text)` in unit order.
    pub fn sections(&self) -> impl Iterator<Item = (String, &str)> {
        self.units
            .iter()
            .filter_map(|r| r.text.as_deref().map(|t| (r.unit.heading(), t)))
    }

    /// Identifiers of units that failed permanently.
    pub fn failed_units(&self) -> Vec<&str> {
        self.units
            .iter()
            .filter(|r| r.outcome.status == OutcomeStatus::FailedPermanently)
            .map(|r| r.outcome.unit_id.as_str())
            .collect()
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: OutcomeStatus, attempts: u32, refines: u32) -> GenerationOutcome {
        GenerationOutcome {
            unit_id: "u".into(),
            status,
            attempts,
            refines,
            elapsed: Duration::ZERO,
            last_defects: vec![],
            error: None,
        }
    }

    #[test]
    fn record_counts_by_status() {
        let mut stats = RunStats::default();
        stats.record(&outcome(OutcomeStatus::CacheHit, 0, 0));
        stats.record(&outcome(OutcomeStatus::Generated, 1, 0));
        stats.record(&outcome(OutcomeStatus::SelfCorrected, 2, 1));
        stats.record(&outcome(OutcomeStatus::FailedPermanently, 3, 2));

        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.generated, 1);
        assert_eq!(stats.self_corrected, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.attempts, 6);
        assert_eq!(stats.refine_attempts, 3);
        assert_eq!(stats.refine_successes, 1);
        assert_eq!(stats.succeeded(), 3);
    }

    #[test]
    fn throughput_zero_without_elapsed() {
        let stats = RunStats {
            generated: 5,
            ..Default::default()
        };
        assert_eq!(stats.questions_per_minute(), 0.0);
    }

    #[test]
    fn throughput_per_minute() {
        let stats = RunStats {
            cache_hits: 2,
            generated: 3,
            self_corrected: 1,
            failed: 4,
            questions_per_unit: 2,
            elapsed: Duration::from_secs(120),
            ..Default::default()
        };
        assert!((stats.questions_per_minute() - 6.0).abs() < f64::EPSILON);
    }
}
