//! Turns sub-routine definitions into delegated solve calls.

use crate::runtime::{Invocation, Runtime};
use crate::selector;
use crate::solver::Solver;
use crate::SolveRequest;
use solver_types::{
	CancellationToken, ProblemData, Settings, Solution, SolutionId, SubRoutineDefinition,
	SubRoutineInfo,
};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tracing::warn;

/// First sub-routine resolution failure of an invocation. Once set, the invocation ends in
/// `ERROR` with this diagnostic whatever its solver reports.
pub(crate) type ResolutionFault = Arc<OnceLock<String>>;

/// Resolver bound to one running invocation.
///
/// It only runs sub-routines the calling solver declared and refuses any kind already on the
/// active call path. Each child runs on its own task with a cancellation token derived from the
/// caller's, so cancelling or timing out the caller also stops its children, and a child keeps
/// running to its terminal status even if the caller stops waiting for it.
pub struct SubRoutineResolver {
	runtime: Arc<Runtime>,
	caller: SolutionId,
	path: Vec<&'static str>,
	declared: Vec<SubRoutineInfo>,
	sub_requests: BTreeMap<String, SolveRequest>,
	token: CancellationToken,
	children: mpsc::Sender<()>,
	fault: ResolutionFault,
}

impl SubRoutineResolver {
	#[allow(clippy::too_many_arguments)]
	pub(crate) fn new(
		runtime: Arc<Runtime>,
		caller: SolutionId,
		path: Vec<&'static str>,
		declared: Vec<SubRoutineInfo>,
		sub_requests: BTreeMap<String, SolveRequest>,
		token: CancellationToken,
		children: mpsc::Sender<()>,
		fault: ResolutionFault,
	) -> Self {
		Self {
			runtime,
			caller,
			path,
			declared,
			sub_requests,
			token,
			children,
			fault,
		}
	}

	/// Kinds on the active call path, the caller's kind last.
	pub fn call_path(&self) -> &[&'static str] {
		&self.path
	}

	pub fn declared(&self) -> &[SubRoutineInfo] {
		&self.declared
	}

	/// Selects a solver for the definition's kind, runs it and waits for its terminal solution.
	///
	/// Undeclared sub-routines, dependency cycles, unknown kinds, rejected settings and kinds
	/// without an admissible solver all yield a solution in `ERROR` whose diagnostic names the
	/// problem. Such a failure is also fatal to the caller: its invocation ends in `ERROR` with
	/// the same diagnostic once its solver returns. The sub-routine's solver comes from the
	/// caller's request for that kind when one was given, otherwise the selector decides with
	/// empty settings.
	pub async fn run<I, O>(&self, definition: &SubRoutineDefinition<I, O>, input: I) -> Solution<O>
	where
		I: ProblemData,
		O: ProblemData,
	{
		let kind_id = definition.kind().id();

		match self.prepare(definition, &input) {
			Ok((solver, settings, request)) => {
				let solution = Solution::new(kind_id)
					.with_solver(solver.id())
					.with_parent(Some(self.caller));
				let id = solution.id();
				let solver_id = solver.id().to_string();
				let mut path = self.path.clone();
				path.push(kind_id);

				let invocation = Invocation {
					solver,
					input,
					settings,
					solution,
					path,
					token: self.token.child(),
					deadline: self.runtime.sub_routine_timeout,
					sub_requests: request.sub_requests,
					status: None,
				};
				let runtime = self.runtime.clone();
				let guard = self.children.clone();
				let task = tokio::spawn(async move {
					let solution = runtime.invoke(invocation).await;
					drop(guard);
					solution
				});

				match task.await {
					Ok(solution) => solution,
					Err(e) => Solution::failed(kind_id, format!("Sub-routine task failed: {}", e))
						.with_id(id)
						.with_solver(solver_id)
						.with_parent(Some(self.caller)),
				}
			}
			Err(reason) => {
				warn!(
					caller = %self.caller,
					kind = kind_id,
					label = definition.label(),
					"Sub-routine not run: {}", reason
				);
				self.fault
					.set(format!(
						"Sub-routine '{}' could not be resolved: {}",
						definition.label(),
						reason
					))
					.ok();
				let solution = Solution::failed(kind_id, reason).with_parent(Some(self.caller));
				self.runtime.finish(&solution).await;
				solution
			}
		}
	}

	fn prepare<I, O>(
		&self,
		definition: &SubRoutineDefinition<I, O>,
		input: &I,
	) -> Result<(Arc<dyn Solver<I, O>>, Settings, SolveRequest), String>
	where
		I: ProblemData,
		O: ProblemData,
	{
		let kind_id = definition.kind().id();
		let info = definition.info();

		if !self.declared.iter().any(|declared| declared.matches(&info)) {
			return Err(format!(
				"Sub-routine '{}' on problem kind '{}' was not declared by the calling solver",
				definition.label(),
				kind_id
			));
		}

		if self.path.contains(&kind_id) {
			return Err(format!(
				"Dependency cycle detected: {} -> {}",
				self.path.join(" -> "),
				kind_id
			));
		}

		let registry = self
			.runtime
			.catalog
			.registry(definition.kind())
			.map_err(|e| e.to_string())?;
		let request = self.sub_requests.get(kind_id).cloned().unwrap_or_default();
		let (solver, settings) =
			selector::select(&registry, self.runtime.strategy.as_ref(), input, &request)
				.map_err(|e| e.to_string())?;

		Ok((solver, settings, request))
	}
}
