//! Solution lifecycle.
//!
//! A [`Solution`] is created when an invocation begins and is written only by that invocation.
//! Its status follows a single-entry state machine with three terminal states:
//!
//! ```text
//! Created -> Computing -> Solved | Error | Aborted
//! ```
//!
//! Exactly one terminal transition is accepted; later ones return
//! [`LifecycleError::AlreadyTerminal`] and leave the solution untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

static NEXT_SOLUTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique, monotonically increasing solution identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SolutionId(u64);

impl SolutionId {
	/// Draws the next identity from the process-wide generator.
	pub fn next() -> Self {
		Self(NEXT_SOLUTION_ID.fetch_add(1, Ordering::Relaxed))
	}

	pub fn value(self) -> u64 {
		self.0
	}
}

impl fmt::Display for SolutionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for SolutionId {
	type Err = std::num::ParseIntError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.parse().map(Self)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolutionStatus {
	Created,
	Computing,
	/// The problem has been solved and the result is attached.
	Solved,
	/// An unexpected fault occurred while solving.
	Error,
	/// The solver deliberately reported a negative outcome.
	Aborted,
}

impl SolutionStatus {
	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Solved | Self::Error | Self::Aborted)
	}

	pub fn is_success(self) -> bool {
		self == Self::Solved
	}
}

impl fmt::Display for SolutionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Created => write!(f, "CREATED"),
			Self::Computing => write!(f, "COMPUTING"),
			Self::Solved => write!(f, "SOLVED"),
			Self::Error => write!(f, "ERROR"),
			Self::Aborted => write!(f, "ABORTED"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
	#[error("Solution {id} already reached terminal status {status}")]
	AlreadyTerminal {
		id: SolutionId,
		status: SolutionStatus,
	},
	#[error("Invalid transition for solution {id} from {from} to {to}")]
	InvalidTransition {
		id: SolutionId,
		from: SolutionStatus,
		to: SolutionStatus,
	},
}

/// Result and status record of one solve invocation.
#[derive(Debug, Clone, Serialize)]
pub struct Solution<T> {
	id: SolutionId,
	status: SolutionStatus,
	kind_id: String,
	solver_id: Option<String>,
	parent: Option<SolutionId>,
	data: Option<T>,
	debug: String,
	execution_millis: u64,
}

impl<T> Solution<T> {
	/// Creates a solution in `Created` with a fresh identity.
	pub fn new(kind_id: impl Into<String>) -> Self {
		Self {
			id: SolutionId::next(),
			status: SolutionStatus::Created,
			kind_id: kind_id.into(),
			solver_id: None,
			parent: None,
			data: None,
			debug: String::new(),
			execution_millis: 0,
		}
	}

	/// Creates a solution that is already in `Error`, for invocations that never reached a solver.
	pub fn failed(kind_id: impl Into<String>, diagnostic: impl Into<String>) -> Self {
		let mut solution = Self::new(kind_id);
		solution.status = SolutionStatus::Error;
		solution.debug = diagnostic.into();
		solution
	}

	pub fn with_solver(mut self, solver_id: impl Into<String>) -> Self {
		self.solver_id = Some(solver_id.into());
		self
	}

	pub fn with_parent(mut self, parent: Option<SolutionId>) -> Self {
		self.parent = parent;
		self
	}

	/// Keeps `id` instead of the freshly drawn identity.
	pub fn with_id(mut self, id: SolutionId) -> Self {
		self.id = id;
		self
	}

	pub fn id(&self) -> SolutionId {
		self.id
	}

	pub fn status(&self) -> SolutionStatus {
		self.status
	}

	pub fn kind_id(&self) -> &str {
		&self.kind_id
	}

	pub fn solver_id(&self) -> Option<&str> {
		self.solver_id.as_deref()
	}

	pub fn parent(&self) -> Option<SolutionId> {
		self.parent
	}

	pub fn data(&self) -> Option<&T> {
		self.data.as_ref()
	}

	pub fn into_data(self) -> Option<T> {
		self.data
	}

	pub fn debug(&self) -> &str {
		&self.debug
	}

	pub fn execution_millis(&self) -> u64 {
		self.execution_millis
	}

	pub fn is_solved(&self) -> bool {
		self.status.is_success()
	}

	/// Appends a line to the diagnostic trail.
	pub fn push_debug(&mut self, text: impl AsRef<str>) {
		if !self.debug.is_empty() {
			self.debug.push('\n');
		}
		self.debug.push_str(text.as_ref());
	}

	pub fn record_execution_time(&mut self, elapsed: Duration) {
		self.execution_millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
	}

	/// `Created -> Computing`.
	pub fn start(&mut self) -> Result<(), LifecycleError> {
		self.transition(SolutionStatus::Computing)
	}

	/// `Computing -> Solved`, attaching the result.
	pub fn complete(&mut self, data: T) -> Result<(), LifecycleError> {
		self.transition(SolutionStatus::Solved)?;
		self.data = Some(data);
		Ok(())
	}

	/// `Computing -> Error`. The diagnostic is appended to the trail.
	pub fn fail(&mut self, diagnostic: impl AsRef<str>) -> Result<(), LifecycleError> {
		self.transition(SolutionStatus::Error)?;
		self.push_debug(diagnostic);
		Ok(())
	}

	/// `Computing -> Aborted`. The diagnostic is appended to the trail.
	pub fn abort(&mut self, diagnostic: impl AsRef<str>) -> Result<(), LifecycleError> {
		self.transition(SolutionStatus::Aborted)?;
		self.push_debug(diagnostic);
		Ok(())
	}

	/// Converts the result payload, keeping identity, status and diagnostics.
	pub fn map_data<U>(self, f: impl FnOnce(T) -> U) -> Solution<U> {
		Solution {
			id: self.id,
			status: self.status,
			kind_id: self.kind_id,
			solver_id: self.solver_id,
			parent: self.parent,
			data: self.data.map(f),
			debug: self.debug,
			execution_millis: self.execution_millis,
		}
	}

	fn transition(&mut self, to: SolutionStatus) -> Result<(), LifecycleError> {
		use SolutionStatus::*;

		let from = self.status;
		if from.is_terminal() {
			warn!(
				solution_id = %self.id,
				"Ignoring transition to {} on terminal solution ({})", to, from
			);
			return Err(LifecycleError::AlreadyTerminal {
				id: self.id,
				status: from,
			});
		}

		let valid = matches!(
			(from, to),
			(Created, Computing) | (Computing, Solved) | (Computing, Error) | (Computing, Aborted)
		);
		if !valid {
			return Err(LifecycleError::InvalidTransition {
				id: self.id,
				from,
				to,
			});
		}

		self.status = to;
		Ok(())
	}
}

impl<T: Serialize> Solution<T> {
	/// Snapshot for the solution store, with the payload rendered as JSON.
	pub fn to_record(&self) -> SolutionRecord {
		let data = match self.data.as_ref().map(serde_json::to_value).transpose() {
			Ok(data) => data,
			Err(e) => {
				warn!(solution_id = %self.id, "Failed to serialize solution data: {}", e);
				None
			}
		};

		SolutionRecord {
			id: self.id,
			status: self.status,
			kind_id: self.kind_id.clone(),
			solver_id: self.solver_id.clone(),
			parent: self.parent,
			data,
			debug: self.debug.clone(),
			execution_millis: self.execution_millis,
			updated_at: Utc::now(),
		}
	}
}

/// Serializable snapshot of a solution, as kept by the solution store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionRecord {
	pub id: SolutionId,
	pub status: SolutionStatus,
	pub kind_id: String,
	pub solver_id: Option<String>,
	pub parent: Option<SolutionId>,
	pub data: Option<serde_json::Value>,
	pub debug: String,
	pub execution_millis: u64,
	pub updated_at: DateTime<Utc>,
}
