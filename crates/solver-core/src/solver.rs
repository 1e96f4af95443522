//! The contract every solver plugin implements.

use crate::resolver::SubRoutineResolver;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solver_types::{
	CancellationToken, ProblemData, Settings, SettingsSchema, Solution, SolutionId, SolveError,
	SubRoutineDefinition, SubRoutineInfo,
};

/// A plugin that solves one problem kind.
///
/// The runtime creates the [`Solution`] and moves it to `Computing` before calling
/// [`solve`](Solver::solve); the solver is its only writer until `solve` returns. A solver
/// normally finishes by calling `complete`, `fail` or `abort` on it. Returning
/// `Err(SolveError::Aborted)` ends the solution in `ABORTED`, any other error in `ERROR`, and
/// returning `Ok` without a terminal transition is treated as an error. A sub-routine that could
/// not be resolved ends the solution in `ERROR` no matter how the solver finishes.
#[async_trait]
pub trait Solver<I, O>: Send + Sync
where
	I: ProblemData,
	O: ProblemData,
{
	/// Unique within the problem kind.
	fn id(&self) -> &str;

	fn name(&self) -> &str;

	fn description(&self) -> &str {
		""
	}

	fn settings_schema(&self) -> SettingsSchema {
		SettingsSchema::empty()
	}

	/// Problem kinds this solver may delegate to while solving.
	fn sub_routines(&self) -> Vec<SubRoutineInfo> {
		Vec::new()
	}

	/// Hard filter used by selection.
	fn can_handle(&self, _input: &I) -> bool {
		true
	}

	/// Soft ranking among solvers that can handle the input. Higher is better.
	fn suitability(&self, _input: &I) -> f64 {
		0.0
	}

	async fn solve(
		&self,
		input: I,
		solution: &mut Solution<O>,
		ctx: &SolveContext,
	) -> Result<(), SolveError>;
}

/// Type-erased description of a registered solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverInfo {
	pub id: String,
	pub name: String,
	pub description: String,
	pub kind_id: String,
	pub settings: SettingsSchema,
	pub sub_routines: Vec<SubRoutineInfo>,
}

impl SolverInfo {
	pub fn of<I: ProblemData, O: ProblemData>(kind_id: &str, solver: &dyn Solver<I, O>) -> Self {
		Self {
			id: solver.id().to_string(),
			name: solver.name().to_string(),
			description: solver.description().to_string(),
			kind_id: kind_id.to_string(),
			settings: solver.settings_schema(),
			sub_routines: solver.sub_routines(),
		}
	}
}

/// Everything a running solver gets besides its input: validated settings, the sub-routine
/// resolver bound to this invocation, and the invocation's cancellation signal.
pub struct SolveContext {
	solution_id: SolutionId,
	settings: Settings,
	resolver: SubRoutineResolver,
	token: CancellationToken,
}

impl SolveContext {
	pub(crate) fn new(
		solution_id: SolutionId,
		settings: Settings,
		resolver: SubRoutineResolver,
		token: CancellationToken,
	) -> Self {
		Self {
			solution_id,
			settings,
			resolver,
			token,
		}
	}

	pub fn solution_id(&self) -> SolutionId {
		self.solution_id
	}

	pub fn settings(&self) -> &Settings {
		&self.settings
	}

	pub fn token(&self) -> &CancellationToken {
		&self.token
	}

	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}

	pub fn resolver(&self) -> &SubRoutineResolver {
		&self.resolver
	}

	/// Runs a solver for the definition's kind and waits for its terminal solution.
	///
	/// Never fails: resolution problems come back as a solution in `ERROR`, and the calling
	/// invocation will end in `ERROR` as well regardless of what it reports afterwards.
	pub async fn run_sub_routine<I2, O2>(
		&self,
		definition: &SubRoutineDefinition<I2, O2>,
		input: I2,
	) -> Solution<O2>
	where
		I2: ProblemData,
		O2: ProblemData,
	{
		self.resolver.run(definition, input).await
	}
}
