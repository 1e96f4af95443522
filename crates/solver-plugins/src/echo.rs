//! `echo` and `delegate`: the smallest solver and the smallest composition of solvers.

use crate::ECHO;
use async_trait::async_trait;
use solver_core::{SolveContext, Solver};
use solver_types::{
	SettingDefinition, SettingsSchema, Solution, SolveError, SubRoutineDefinition, SubRoutineInfo,
};
use tracing::debug;

const ECHO_CALL: SubRoutineDefinition<String, String> =
	SubRoutineDefinition::new(ECHO, "echo", "Produces the answer");

/// Returns its input, optionally upper-cased and repeated.
pub struct EchoSolver;

#[async_trait]
impl Solver<String, String> for EchoSolver {
	fn id(&self) -> &str {
		"echo"
	}

	fn name(&self) -> &str {
		"Echo"
	}

	fn description(&self) -> &str {
		"Returns the input text"
	}

	fn settings_schema(&self) -> SettingsSchema {
		SettingsSchema::new(vec![
			SettingDefinition::boolean("uppercase", false)
				.with_description("Upper-case the text before returning it"),
			SettingDefinition::integer("repeat", 1, 10, Some(1))
				.with_description("How many space separated copies to return"),
		])
	}

	async fn solve(
		&self,
		input: String,
		solution: &mut Solution<String>,
		ctx: &SolveContext,
	) -> Result<(), SolveError> {
		let settings = ctx.settings();
		let text = if settings.boolean("uppercase").unwrap_or(false) {
			input.to_uppercase()
		} else {
			input
		};
		let repeat = usize::try_from(settings.integer("repeat").unwrap_or(1)).unwrap_or(1);

		solution.complete(vec![text; repeat].join(" "))?;
		Ok(())
	}
}

/// Hands its input to whichever solver serves `echo` and adopts that answer.
pub struct DelegateSolver;

#[async_trait]
impl Solver<String, String> for DelegateSolver {
	fn id(&self) -> &str {
		"delegate"
	}

	fn name(&self) -> &str {
		"Delegate"
	}

	fn description(&self) -> &str {
		"Answers with the result of an echo sub-routine"
	}

	fn sub_routines(&self) -> Vec<SubRoutineInfo> {
		vec![ECHO_CALL.info()]
	}

	async fn solve(
		&self,
		input: String,
		solution: &mut Solution<String>,
		ctx: &SolveContext,
	) -> Result<(), SolveError> {
		let answer = ctx.run_sub_routine(&ECHO_CALL, input).await;
		debug!(sub_solution = %answer.id(), status = %answer.status(), "Echo finished");
		solution.push_debug(format!("echo answered in solution {}", answer.id()));

		let status = answer.status();
		let reason = answer.debug().to_string();
		match answer.into_data() {
			Some(text) if status.is_success() => {
				solution.complete(text)?;
				Ok(())
			}
			_ => Err(SolveError::aborted(format!(
				"Echo sub-routine ended {}: {}",
				status, reason
			))),
		}
	}
}
