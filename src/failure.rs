// src/failure.rs

//! Failure policy for multi-step and multi-user operations

use crate::error::{Error, Result};
use tracing::warn;

/// How an operation reacts to a failed step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort on the first failure
    FailFast,
    /// Keep going; report the first failure and log the rest
    BestEffort,
}

/// Collects step failures according to a `FailurePolicy`
///
/// Call sites hand each failure to [`FailureAggregator::handle`] and
/// propagate its result with `?`. Under `FailFast` that returns the error
/// immediately; under `BestEffort` it records the first error, logs later
/// ones through `tracing`, and lets the caller move on.
#[derive(Debug)]
pub struct FailureAggregator {
    policy: FailurePolicy,
    first: Option<Error>,
    logged: usize,
}

impl FailureAggregator {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            policy,
            first: None,
            logged: 0,
        }
    }

    pub fn fail_fast() -> Self {
        Self::new(FailurePolicy::FailFast)
    }

    pub fn best_effort() -> Self {
        Self::new(FailurePolicy::BestEffort)
    }

    /// Route one failure through the policy
    pub fn handle(&mut self, err: Error) -> Result<()> {
        match self.policy {
            FailurePolicy::FailFast => Err(err),
            FailurePolicy::BestEffort => {
                if self.first.is_none() {
                    self.first = Some(err);
                } else {
                    self.logged += 1;
                    warn!("{}", err);
                }
                Ok(())
            }
        }
    }

    /// Unwrap a step result, routing its error through the policy
    ///
    /// `Ok(None)` means the step failed but the caller should continue.
    pub fn check<T>(&mut self, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) => self.handle(err).map(|()| None),
        }
    }

    /// Number of failures recorded so far
    pub fn failures(&self) -> usize {
        self.logged + usize::from(self.first.is_some())
    }

    /// Finish the operation: the first recorded failure, if any
    pub fn finish(self) -> Result<()> {
        match self.first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
