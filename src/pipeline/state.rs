//! Per-unit generation state machine.
//!
//! ```text
//! Pending ─▶ KeyDerived ─┬▶ CacheHit                       (terminal)
//!                        └▶ CacheMiss ─▶ Generating ─▶ Validating ─┬▶ Accepted (terminal)
//!                                          ▲   │                   └▶ Rejected
//!                                          │   └▶ FailedPermanent  (terminal)
//!                                          └──── Retry ◀───────────────┘
//! ```
//!
//! `Retry` from `Rejected` re-enters `Generating` while refine budget
//! remains and lands in `FailedPermanent` otherwise. Every other event is
//! only valid in the phase shown; anything else is an
//! [`InvalidTransition`](crate::ForgeError::InvalidTransition).

use crate::types::DefectKind;
use crate::{ForgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    KeyDerived,
    CacheHit,
    CacheMiss,
    Generating,
    Validating,
    Accepted,
    Rejected,
    FailedPermanent,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::KeyDerived => "key_derived",
            Self::CacheHit => "cache_hit",
            Self::CacheMiss => "cache_miss",
            Self::Generating => "generating",
            Self::Validating => "validating",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::FailedPermanent => "failed_permanent",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::CacheHit | Self::Accepted | Self::FailedPermanent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Cache key computed.
    KeyDerived,
    CacheHit,
    CacheMiss,
    /// Initial generation call issued.
    Generate,
    /// The generation call returned text.
    TextReceived,
    /// The generation call failed for good (retries exhausted or permanent error).
    GenerationFailed,
    Accept,
    Reject(Vec<DefectKind>),
    /// Decide what follows a rejection.
    Retry,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Self::KeyDerived => "key_derived",
            Self::CacheHit => "cache_hit",
            Self::CacheMiss => "cache_miss",
            Self::Generate => "generate",
            Self::TextReceived => "text_received",
            Self::GenerationFailed => "generation_failed",
            Self::Accept => "accept",
            Self::Reject(_) => "reject",
            Self::Retry => "retry",
        }
    }
}

/// Explicit state of one unit: phase plus attempt accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitState {
    pub phase: Phase,
    /// Generation calls issued so far (initial plus refines).
    pub attempts: u32,
    /// Refine calls issued so far.
    pub refines_used: u32,
    /// Maximum refine calls allowed.
    pub refine_ceiling: u32,
    /// Defects of the most recent rejection.
    pub last_defects: Vec<DefectKind>,
}

impl UnitState {
    pub fn new(refine_ceiling: u32) -> Self {
        Self {
            phase: Phase::Pending,
            attempts: 0,
            refines_used: 0,
            refine_ceiling,
            last_defects: Vec::new(),
        }
    }

    /// Apply `event`, returning the new phase.
    pub fn apply(&mut self, event: Event) -> Result<Phase> {
        use Phase::*;

        let next = match (self.phase, &event) {
            (Pending, Event::KeyDerived) => KeyDerived,
            (KeyDerived, Event::CacheHit) => CacheHit,
            (KeyDerived, Event::CacheMiss) => CacheMiss,
            (CacheMiss, Event::Generate) => {
                self.attempts += 1;
                Generating
            }
            (Generating, Event::TextReceived) => Validating,
            (Generating, Event::GenerationFailed) => FailedPermanent,
            (Validating, Event::Accept) => {
                self.last_defects.clear();
                Accepted
            }
            (Validating, Event::Reject(defects)) => {
                self.last_defects = defects.clone();
                Rejected
            }
            (Rejected, Event::Retry) if self.refines_used < self.refine_ceiling => {
                self.refines_used += 1;
                self.attempts += 1;
                Generating
            }
            (Rejected, Event::Retry) => FailedPermanent,
            (phase, event) => {
                return Err(ForgeError::InvalidTransition {
                    phase: phase.name(),
                    event: event.name(),
                });
            }
        };
        self.phase = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_rejected(state: &mut UnitState) {
        state.apply(Event::KeyDerived).unwrap();
        state.apply(Event::CacheMiss).unwrap();
        state.apply(Event::Generate).unwrap();
        state.apply(Event::TextReceived).unwrap();
        state
            .apply(Event::Reject(vec![DefectKind::WrongOptionCount]))
            .unwrap();
    }

    #[test]
    fn cache_hit_is_terminal_with_no_attempts() {
        let mut state = UnitState::new(1);
        state.apply(Event::KeyDerived).unwrap();
        assert_eq!(state.apply(Event::CacheHit).unwrap(), Phase::CacheHit);
        assert!(state.phase.is_terminal());
        assert_eq!(state.attempts, 0);
        assert!(state.apply(Event::Generate).is_err());
    }

    #[test]
    fn retry_within_budget_regenerates() {
        let mut state = UnitState::new(2);
        to_rejected(&mut state);
        assert_eq!(state.last_defects, vec![DefectKind::WrongOptionCount]);
        assert_eq!(state.apply(Event::Retry).unwrap(), Phase::Generating);
        assert_eq!(state.attempts, 2);
        assert_eq!(state.refines_used, 1);
    }

    #[test]
    fn retry_without_budget_fails() {
        let mut state = UnitState::new(0);
        to_rejected(&mut state);
        assert_eq!(state.apply(Event::Retry).unwrap(), Phase::FailedPermanent);
        assert_eq!(state.attempts, 1);
    }

    #[test]
    fn budget_is_exact() {
        let mut state = UnitState::new(2);
        to_rejected(&mut state);
        for _ in 0..2 {
            assert_eq!(state.apply(Event::Retry).unwrap(), Phase::Generating);
            state.apply(Event::TextReceived).unwrap();
            state
                .apply(Event::Reject(vec![DefectKind::MissingExplanation]))
                .unwrap();
        }
        assert_eq!(state.apply(Event::Retry).unwrap(), Phase::FailedPermanent);
        assert_eq!(state.refines_used, 2);
        assert_eq!(state.attempts, 3);
    }

    #[test]
    fn invalid_transition_is_reported() {
        let mut state = UnitState::new(1);
        let err = state.apply(Event::Accept).unwrap_err();
        assert!(matches!(
            err,
            ForgeError::InvalidTransition {
                phase: "pending",
                event: "accept"
            }
        ));
        assert_eq!(state.phase, Phase::Pending);
    }
}
