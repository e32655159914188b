//! Relabeling of composition sets that appear during a sweep.
//!
//! When the grid minimizer splits a phase, the engine reports two instances
//! (`FCC_A1#1`, `FCC_A1_AUTO#2`) in place of the parent (`FCC_A1`), and may
//! hand out the instance names inconsistently between solves. A
//! `RelabelPolicy` decides, step by step, which instance's value belongs under
//! which key so each series follows one physical phase.

use std::fmt;

/// The two keys a split phase is recorded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitRole {
    /// The non-`AUTO` instance, which inherits the parent's history.
    Continuation,
    /// The `AUTO` instance, zero before the split.
    Branch,
}

/// What the engine reported for both instances of a split at one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitObservation<'a> {
    pub parent: &'a str,
    pub continuation: &'a str,
    pub branch: &'a str,
    /// Tracer fraction in the instance the engine named `continuation`.
    pub continuation_tracer: f64,
    /// Tracer fraction in the instance the engine named `branch`.
    pub branch_tracer: f64,
    pub step: usize,
}

/// Decision for one split at one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// Record each value under the name the engine gave it.
    AsReturned,
    /// Exchange the two values (and their probes).
    Swapped,
}

/// Strategy deciding which instance's value goes under which key.
pub trait RelabelPolicy: fmt::Debug {
    fn assign(&self, split: &SplitObservation<'_>) -> Assignment;
}

/// Rank instances by tracer fraction: the richer one always goes to `richer`.
///
/// When both tracers are zero there is nothing to rank and values stay as
/// returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracerRank {
    pub richer: SplitRole,
}

impl Default for TracerRank {
    fn default() -> Self {
        Self {
            richer: SplitRole::Branch,
        }
    }
}

impl RelabelPolicy for TracerRank {
    fn assign(&self, split: &SplitObservation<'_>) -> Assignment {
        let (c, b) = (split.continuation_tracer, split.branch_tracer);
        if c == 0.0 && b == 0.0 {
            return Assignment::AsReturned;
        }
        let misplaced = match self.richer {
            SplitRole::Branch => c > b,
            SplitRole::Continuation => b > c,
        };
        if misplaced {
            Assignment::Swapped
        } else {
            Assignment::AsReturned
        }
    }
}

/// Keep the engine's names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoRelabel;

impl RelabelPolicy for NoRelabel {
    fn assign(&self, _split: &SplitObservation<'_>) -> Assignment {
        Assignment::AsReturned
    }
}

/// Dynamic-shape tracking settings.
#[derive(Debug)]
pub struct TrackedSplit {
    /// Component whose fraction tells the split instances apart.
    pub tracer: String,
    pub policy: Box<dyn RelabelPolicy>,
}

impl TrackedSplit {
    /// Track splits by `tracer` with the default `TracerRank` policy.
    pub fn new(tracer: impl Into<String>) -> Self {
        Self {
            tracer: tracer.into(),
            policy: Box::new(TracerRank::default()),
        }
    }

    pub fn with_policy(mut self, policy: impl RelabelPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }
}

/// Whether a temperature sweep follows composition-set splits.
#[derive(Debug, Default)]
pub enum SplitTracking {
    /// Fixed shape: keys exactly as returned, late keys zero-backfilled.
    #[default]
    Disabled,
    Enabled(TrackedSplit),
}

/// Bookkeeping for one split during a sweep.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SplitState {
    pub(crate) parent: String,
    /// The parent is no longer reported under its plain name; if it comes
    /// back its values go to the continuation.
    pub(crate) superseded: bool,
    pub(crate) continuation: Option<String>,
    pub(crate) branch: Option<String>,
    pub(crate) first_step: usize,
}
