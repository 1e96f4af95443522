//! Execution collaborator for solvers that delegate work to external programs.
//!
//! The runtime treats execution as an opaque dependency: a solver hands a [`CommandSpec`] and its
//! working files to the [`ExecutionService`], and folds the returned [`ExecutionResult`] into its
//! Solution.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solver_types::{LifecycleError, Solution, SolutionId};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod process;
}

/// Placeholder replaced by the path of the job's input file in command arguments.
pub const INPUT_FILE_PATH: &str = "INPUT_FILE_PATH";
/// Placeholder replaced by the path of the job's output file in command arguments.
pub const OUTPUT_FILE_PATH: &str = "OUTPUT_FILE_PATH";

#[derive(Debug, Error)]
pub enum ExecutionError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Failed to spawn {program}: {reason}")]
	Spawn { program: String, reason: String },
	#[error("Command {program} timed out after {timeout:?}")]
	Timeout { program: String, timeout: Duration },
	#[error("Invalid working file name: {0}")]
	InvalidFileName(String),
}

/// Identifies the job a command belongs to; each job gets its own working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobKey {
	pub kind_id: String,
	pub solution_id: SolutionId,
}

impl JobKey {
	pub fn new(kind_id: impl Into<String>, solution_id: SolutionId) -> Self {
		Self {
			kind_id: kind_id.into(),
			solution_id,
		}
	}
}

/// A file written into the job directory before the command runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingFile {
	pub name: String,
	pub contents: String,
}

impl WorkingFile {
	pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			contents: contents.into(),
		}
	}
}

/// The program to run and how its files are wired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
	pub program: String,
	#[serde(default)]
	pub args: Vec<String>,
	#[serde(default)]
	pub env: BTreeMap<String, String>,
	/// Working file whose path substitutes `INPUT_FILE_PATH`.
	pub input_file: Option<String>,
	/// When set, output is read from this file (its path substitutes `OUTPUT_FILE_PATH`)
	/// instead of stdout.
	pub output_file: Option<String>,
}

impl CommandSpec {
	pub fn new(program: impl Into<String>) -> Self {
		Self {
			program: program.into(),
			..Default::default()
		}
	}

	pub fn arg(mut self, arg: impl Into<String>) -> Self {
		self.args.push(arg.into());
		self
	}

	pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.env.insert(key.into(), value.into());
		self
	}

	pub fn with_input_file(mut self, name: impl Into<String>) -> Self {
		self.input_file = Some(name.into());
		self
	}

	pub fn with_output_file(mut self, name: impl Into<String>) -> Self {
		self.output_file = Some(name.into());
		self
	}
}

/// Outcome of running a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
	pub success: bool,
	pub output: Option<String>,
	pub debug: String,
}

impl ExecutionResult {
	/// Folds the outcome into `solution`, which must be computing.
	///
	/// Success with output completes the solution. Success without output and failure both fail
	/// it with the debug text.
	pub fn apply_to(self, solution: &mut Solution<String>) -> Result<(), LifecycleError> {
		self.apply_with(solution, Ok)
	}

	/// Like [`apply_to`](Self::apply_to), converting the textual output with `parse`.
	pub fn apply_with<T>(
		self,
		solution: &mut Solution<T>,
		parse: impl FnOnce(String) -> Result<T, String>,
	) -> Result<(), LifecycleError> {
		if !self.debug.is_empty() {
			solution.push_debug(&self.debug);
		}
		if !self.success {
			let reason = if self.debug.is_empty() {
				"Unknown error occurred."
			} else {
				"Command failed"
			};
			return solution.fail(reason);
		}
		match self.output.map(parse) {
			Some(Ok(data)) => solution.complete(data),
			Some(Err(reason)) => solution.fail(format!("Could not read command output: {}", reason)),
			None => solution.fail("Solution was found, but could not retrieve solution data"),
		}
	}
}

#[async_trait]
pub trait ExecutionInterface: Send + Sync {
	/// Writes `files` into the job directory, runs `command`, and reports its outcome.
	///
	/// A command that runs and exits non-zero is a successful call returning `success: false`.
	async fn run(
		&self,
		job: &JobKey,
		command: &CommandSpec,
		files: &[WorkingFile],
	) -> Result<ExecutionResult, ExecutionError>;
}

pub struct ExecutionService {
	executor: Box<dyn ExecutionInterface>,
}

impl ExecutionService {
	pub fn new(executor: Box<dyn ExecutionInterface>) -> Self {
		Self { executor }
	}

	pub async fn run(
		&self,
		job: &JobKey,
		command: &CommandSpec,
		files: &[WorkingFile],
	) -> Result<ExecutionResult, ExecutionError> {
		tracing::debug!(
			kind = %job.kind_id,
			solution_id = %job.solution_id,
			program = %command.program,
			"Running external command"
		);
		self.executor.run(job, command, files).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use solver_types::SolutionStatus;

	fn computing() -> Solution<String> {
		let mut solution = Solution::new("command");
		solution.start().unwrap();
		solution
	}

	#[test]
	fn test_apply_success_with_output() {
		let mut solution = computing();
		ExecutionResult {
			success: true,
			output: Some("42".into()),
			debug: String::new(),
		}
		.apply_to(&mut solution)
		.unwrap();
		assert_eq!(solution.status(), SolutionStatus::Solved);
		assert_eq!(solution.data().map(String::as_str), Some("42"));
	}

	#[test]
	fn test_apply_success_without_output_fails() {
		let mut solution = computing();
		ExecutionResult {
			success: true,
			output: None,
			debug: String::new(),
		}
		.apply_to(&mut solution)
		.unwrap();
		assert_eq!(solution.status(), SolutionStatus::Error);
		assert!(solution.debug().contains("could not retrieve"));
	}

	#[test]
	fn test_apply_failure_keeps_debug() {
		let mut solution = computing();
		ExecutionResult {
			success: false,
			output: Some("partial".into()),
			debug: "exit status 2: bad input".into(),
		}
		.apply_to(&mut solution)
		.unwrap();
		assert_eq!(solution.status(), SolutionStatus::Error);
		assert!(solution.debug().starts_with("exit status 2: bad input"));
		assert!(solution.data().is_none());
	}

	#[test]
	fn test_apply_with_parse_error() {
		let mut solution: Solution<u64> = Solution::new("count");
		solution.start().unwrap();
		ExecutionResult {
			success: true,
			output: Some("many".into()),
			debug: String::new(),
		}
		.apply_with(&mut solution, |s| s.trim().parse().map_err(|e| format!("{}", e)))
		.unwrap();
		assert_eq!(solution.status(), SolutionStatus::Error);
	}
}
