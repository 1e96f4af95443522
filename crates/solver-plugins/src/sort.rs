//! `sort-lines`, solved in process or by an external `sort` command.

use async_trait::async_trait;
use solver_core::{SolveContext, Solver};
use solver_execution::{CommandSpec, ExecutionService, JobKey, WorkingFile, INPUT_FILE_PATH};
use solver_types::{SettingDefinition, SettingsSchema, Solution, SolveError};
use std::sync::Arc;
use tracing::info;

/// Sorts lines in memory.
pub struct NativeSortSolver;

#[async_trait]
impl Solver<String, String> for NativeSortSolver {
	fn id(&self) -> &str {
		"sort-native"
	}

	fn name(&self) -> &str {
		"In-process sort"
	}

	fn settings_schema(&self) -> SettingsSchema {
		SettingsSchema::new(vec![
			SettingDefinition::boolean("reverse", false).with_description("Sort descending")
		])
	}

	fn suitability(&self, _input: &String) -> f64 {
		1.0
	}

	async fn solve(
		&self,
		input: String,
		solution: &mut Solution<String>,
		ctx: &SolveContext,
	) -> Result<(), SolveError> {
		let mut lines: Vec<&str> = input.lines().collect();
		lines.sort_unstable();
		if ctx.settings().boolean("reverse").unwrap_or(false) {
			lines.reverse();
		}

		let mut output = lines.join("\n");
		if !lines.is_empty() {
			output.push('\n');
		}
		solution.complete(output)?;
		Ok(())
	}
}

/// Runs an external command over the input text.
///
/// The input is written to a working file in the job directory; the command's output becomes
/// the result.
pub struct CommandSolver {
	id: String,
	name: String,
	command: CommandSpec,
	executor: Arc<ExecutionService>,
}

impl CommandSolver {
	const INPUT_FILE: &'static str = "input.txt";

	pub fn new(
		id: impl Into<String>,
		name: impl Into<String>,
		command: CommandSpec,
		executor: Arc<ExecutionService>,
	) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			command: command.with_input_file(Self::INPUT_FILE),
			executor,
		}
	}

	/// `sort <input file>`, with the C locale so that ordering matches a byte-wise sort.
	pub fn sort(executor: Arc<ExecutionService>) -> Self {
		Self::new(
			"sort-command",
			"External sort",
			CommandSpec::new("sort")
				.arg(INPUT_FILE_PATH)
				.env("LC_ALL", "C"),
			executor,
		)
	}
}

#[async_trait]
impl Solver<String, String> for CommandSolver {
	fn id(&self) -> &str {
		&self.id
	}

	fn name(&self) -> &str {
		&self.name
	}

	fn description(&self) -> &str {
		"Delegates to an external program"
	}

	async fn solve(
		&self,
		input: String,
		solution: &mut Solution<String>,
		ctx: &SolveContext,
	) -> Result<(), SolveError> {
		let job = JobKey::new(solution.kind_id(), ctx.solution_id());
		let files = [WorkingFile::new(Self::INPUT_FILE, input)];

		let result = self
			.executor
			.run(&job, &self.command, &files)
			.await
			.map_err(anyhow::Error::from)?;
		info!(
			solution_id = %ctx.solution_id(),
			program = %self.command.program,
			success = result.success,
			"Command finished"
		);

		result.apply_to(solution)?;
		Ok(())
	}
}
