// solver-core/src/error.rs

use solver_storage::StorageError;
use solver_types::{SettingViolation, SolutionId};
use thiserror::Error;

/// Configuration problems found while building the catalog. These prevent startup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
	#[error("Problem kind '{0}' is registered twice")]
	DuplicateKind(String),

	#[error("Solver '{solver}' is registered twice for problem kind '{kind}'")]
	DuplicateSolver { kind: String, solver: String },

	#[error("Problem kind '{0}' is not registered")]
	UnknownKind(String),

	#[error("Problem kind '{0}' was registered with different input or output types")]
	KindTypeMismatch(String),

	#[error("Solver '{solver}' declares a sub-routine on unregistered problem kind '{kind}'")]
	UnknownSubRoutineKind { solver: String, kind: String },

	#[error("Solver '{solver}' declares an invalid settings schema: {reason}")]
	InvalidSchema { solver: String, reason: String },
}

#[derive(Error, Debug)]
pub enum EngineError {
	#[error("Unknown problem kind: {0}")]
	UnknownKind(String),

	#[error("Problem kind '{0}' does not have the requested input or output types")]
	KindTypeMismatch(String),

	#[error("Invalid input for problem kind '{kind}': {reason}")]
	InvalidInput { kind: String, reason: String },

	#[error("Invalid settings for {target}: {}", join_violations(.violations))]
	InvalidSettings {
		target: String,
		violations: Vec<SettingViolation>,
	},

	#[error("Unknown solver '{solver}' for problem kind '{kind}'")]
	UnknownSolver { kind: String, solver: String },

	#[error("No solver registered for problem kind '{0}'")]
	NoSolver(String),

	#[error("No registered solver for problem kind '{0}' can handle the input")]
	NoAdmissibleSolver(String),

	#[error("Selection failed: {0}")]
	Selection(String),

	#[error("Unknown solution: {0}")]
	UnknownSolution(SolutionId),

	#[error("Configuration error: {0}")]
	Config(String),

	#[error(transparent)]
	Registry(#[from] RegistryError),

	#[error(transparent)]
	Storage(#[from] StorageError),
}

impl EngineError {
	/// Malformed request: unknown kind or solver, undecodable input, rejected settings.
	pub fn is_validation(&self) -> bool {
		matches!(
			self,
			Self::UnknownKind(_)
				| Self::KindTypeMismatch(_)
				| Self::InvalidInput { .. }
				| Self::InvalidSettings { .. }
				| Self::UnknownSolver { .. }
		)
	}

	/// The kind exists but nothing registered for it can run the request.
	pub fn is_resolution(&self) -> bool {
		matches!(self, Self::NoSolver(_) | Self::NoAdmissibleSolver(_))
	}
}

fn join_violations(violations: &[SettingViolation]) -> String {
	violations
		.iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join("; ")
}
