//! Error types shared by solvers and the runtime.

use crate::solution::LifecycleError;
use thiserror::Error;

/// Outcome reported by a solver whose `solve` did not finish normally.
///
/// `Aborted` is a recognized negative outcome and ends the invocation in `ABORTED`; every other
/// variant ends it in `ERROR`.
#[derive(Debug, Error)]
pub enum SolveError {
	#[error("Aborted: {0}")]
	Aborted(String),

	#[error(transparent)]
	Lifecycle(#[from] LifecycleError),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl SolveError {
	pub fn aborted(reason: impl Into<String>) -> Self {
		Self::Aborted(reason.into())
	}
}
