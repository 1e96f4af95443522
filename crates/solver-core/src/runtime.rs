//! Drives individual solve invocations.
//!
//! Each invocation runs its solver on a dedicated task, so that a panicking solver still leaves a
//! terminal solution behind. The solver future is raced against the invocation's cancellation
//! token and its deadline; whichever finishes first decides the outcome. An invocation reaches
//! its terminal status only after every sub-routine it started has settled.

use crate::catalog::ProblemCatalog;
use crate::error::EngineError;
use crate::event_bus::{EventBus, SolutionEvent};
use crate::handle::SolutionHandle;
use crate::registry::ProblemRegistry;
use crate::resolver::{ResolutionFault, SubRoutineResolver};
use crate::selector::{self, SelectionStrategy};
use crate::solver::{SolveContext, Solver};
use crate::SolveRequest;
use solver_storage::StorageService;
use solver_types::{
	CancellationToken, ProblemData, Settings, Solution, SolutionStatus, SolveError,
};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

pub(crate) const SOLUTIONS_NAMESPACE: &str = "solutions";

/// Shared state behind the engine and every resolver.
pub(crate) struct Runtime {
	pub(crate) catalog: Arc<ProblemCatalog>,
	pub(crate) strategy: Box<dyn SelectionStrategy>,
	pub(crate) storage: StorageService,
	pub(crate) events: EventBus,
	pub(crate) sub_routine_timeout: Option<Duration>,
	pub(crate) top_level_timeout: Option<Duration>,
	/// Retention of terminal records.
	pub(crate) record_ttl: Option<Duration>,
}

/// One solver run, fully resolved.
pub(crate) struct Invocation<I, O> {
	pub(crate) solver: Arc<dyn Solver<I, O>>,
	pub(crate) input: I,
	pub(crate) settings: Settings,
	/// Freshly created, still in `Created`.
	pub(crate) solution: Solution<O>,
	/// Kinds on the active call path, this invocation's kind last.
	pub(crate) path: Vec<&'static str>,
	pub(crate) token: CancellationToken,
	pub(crate) deadline: Option<Duration>,
	pub(crate) sub_requests: BTreeMap<String, SolveRequest>,
	pub(crate) status: Option<watch::Sender<SolutionStatus>>,
}

enum Outcome {
	Finished(Result<(), SolveError>),
	Cancelled,
	DeadlineExceeded(Duration),
}

/// Aborts the wrapped task when dropped before completion.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
	fn drop(&mut self) {
		self.0.abort();
	}
}

impl<T> Future for AbortOnDrop<T> {
	type Output = Result<T, JoinError>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.get_mut().0).poll(cx)
	}
}

impl Runtime {
	/// Selects a solver, records the new solution and starts it in the background.
	pub(crate) async fn submit<I: ProblemData, O: ProblemData>(
		self: &Arc<Self>,
		registry: &ProblemRegistry<I, O>,
		input: I,
		request: SolveRequest,
	) -> Result<SolutionHandle<O>, EngineError> {
		let (solver, settings) =
			selector::select(registry, self.strategy.as_ref(), &input, &request)?;

		let kind_id = registry.kind().id();
		let solver_id = solver.id().to_string();
		let solution = Solution::new(kind_id).with_solver(solver_id.as_str());
		let id = solution.id();
		self.record(&solution).await;

		let token = CancellationToken::new();
		let (status_tx, status_rx) = watch::channel(SolutionStatus::Created);
		info!(solution_id = %id, kind = kind_id, solver = %solver_id, "Submitted solve");

		let invocation = Invocation {
			solver,
			input,
			settings,
			solution,
			path: vec![kind_id],
			token: token.clone(),
			deadline: self.top_level_timeout,
			sub_requests: request.sub_requests,
			status: Some(status_tx),
		};
		let task = tokio::spawn(self.clone().invoke(invocation));

		Ok(SolutionHandle::new(
			id, kind_id, solver_id, status_rx, token, task,
		))
	}

	/// Runs one invocation to its terminal status.
	pub(crate) async fn invoke<I: ProblemData, O: ProblemData>(
		self: Arc<Self>,
		invocation: Invocation<I, O>,
	) -> Solution<O> {
		let Invocation {
			solver,
			input,
			settings,
			mut solution,
			path,
			token,
			deadline,
			sub_requests,
			status,
		} = invocation;

		let id = solution.id();
		let parent = solution.parent();
		let kind_id = solution.kind_id().to_string();
		let solver_id = solver.id().to_string();
		let span = info_span!("solve", solution_id = %id, kind = %kind_id, solver = %solver_id);

		if let Err(e) = solution.start() {
			span.in_scope(|| error!("Cannot start solution: {}", e));
			return solution;
		}
		self.record(&solution).await;
		self.events
			.publish(SolutionEvent::Started {
				id,
				parent,
				kind: kind_id.clone(),
				solver: solver_id.clone(),
			})
			.ok();
		if let Some(status) = &status {
			status.send_replace(SolutionStatus::Computing);
		}

		// Every sub-routine task holds a sender; recv() yields None once all of them finished.
		let (children_tx, mut children_rx) = mpsc::channel::<()>(1);
		let fault = ResolutionFault::default();
		let declared =
			selector::guard_hook(&kind_id, &solver_id, "sub_routines", || solver.sub_routines())
				.unwrap_or_default();
		let resolver = SubRoutineResolver::new(
			self.clone(),
			id,
			path,
			declared,
			sub_requests,
			token.clone(),
			children_tx,
			fault.clone(),
		);
		let ctx = SolveContext::new(id, settings, resolver, token.clone());

		let work = async move {
			let started = Instant::now();
			let outcome = {
				let solve = solver.solve(input, &mut solution, &ctx);
				let expiry = async {
					match deadline {
						Some(limit) => {
							tokio::time::sleep(limit).await;
							limit
						}
						None => std::future::pending().await,
					}
				};
				tokio::select! {
					biased;
					_ = ctx.token().cancelled() => Outcome::Cancelled,
					limit = expiry => Outcome::DeadlineExceeded(limit),
					result = solve => Outcome::Finished(result),
				}
			};
			let mut solution = settle(solution, outcome, fault.get().map(String::as_str));
			solution.record_execution_time(started.elapsed());
			solution
		}
		.instrument(span.clone());

		let solution = match AbortOnDrop(tokio::spawn(work)).await {
			Ok(solution) => solution,
			Err(e) => {
				let reason = panic_message(e);
				span.in_scope(|| error!("Solver task failed: {}", reason));
				Solution::failed(kind_id.as_str(), reason)
					.with_id(id)
					.with_solver(solver_id.as_str())
					.with_parent(parent)
			}
		};

		// Sub-routines still running at this point were abandoned by the solver.
		token.cancel();
		while children_rx.recv().await.is_some() {}

		span.in_scope(|| {
			info!(
				status = %solution.status(),
				elapsed_ms = solution.execution_millis(),
				"Solve finished"
			)
		});
		self.finish(&solution).await;
		if let Some(status) = status {
			status.send_replace(solution.status());
		}
		solution
	}

	/// Stores the terminal record and announces it.
	pub(crate) async fn finish<O: ProblemData>(&self, solution: &Solution<O>) {
		self.record(solution).await;
		self.events
			.publish(SolutionEvent::Finished {
				id: solution.id(),
				parent: solution.parent(),
				kind: solution.kind_id().to_string(),
				status: solution.status(),
			})
			.ok();
	}

	/// Writes the latest record. Only terminal records expire.
	pub(crate) async fn record<O: ProblemData>(&self, solution: &Solution<O>) {
		let id = solution.id();
		let ttl = if solution.status().is_terminal() {
			self.record_ttl
		} else {
			None
		};
		if let Err(e) = self
			.storage
			.store_with_ttl(SOLUTIONS_NAMESPACE, &id.to_string(), &solution.to_record(), ttl)
			.await
		{
			warn!(solution_id = %id, "Failed to record solution: {}", e);
		}
	}
}

/// Applies the outcome unless the solver already reached a terminal status itself. A failed
/// sub-routine resolution then overrules whatever the solver finished with.
fn settle<O>(mut solution: Solution<O>, outcome: Outcome, fault: Option<&str>) -> Solution<O> {
	let finished = matches!(outcome, Outcome::Finished(_));
	let result = match outcome {
		Outcome::Finished(Ok(())) if solution.status().is_terminal() => Ok(()),
		Outcome::Finished(Ok(())) => solution.fail("Solver finished without reporting a result"),
		Outcome::Finished(Err(SolveError::Aborted(reason))) => solution.abort(reason),
		Outcome::Finished(Err(e)) => solution.fail(format!("{:#}", e)),
		Outcome::Cancelled => solution.abort("Cancelled"),
		Outcome::DeadlineExceeded(limit) => {
			solution.abort(format!("Deadline of {}ms exceeded", limit.as_millis()))
		}
	};
	if let Err(e) = result {
		warn!("Outcome not applied: {}", e);
	}

	match fault {
		Some(reason) if finished => overrule(solution, reason),
		_ => solution,
	}
}

/// Replaces a settled solution with an `ERROR` one under the same identity. The solver's
/// diagnostics are kept after `reason`, its result is dropped.
fn overrule<O>(solution: Solution<O>, reason: &str) -> Solution<O> {
	warn!(
		solution_id = %solution.id(),
		reported = %solution.status(),
		"Overruling solver outcome: {}", reason
	);
	let mut failed = Solution::failed(solution.kind_id(), reason)
		.with_id(solution.id())
		.with_parent(solution.parent());
	if let Some(solver_id) = solution.solver_id() {
		failed = failed.with_solver(solver_id);
	}
	if !solution.debug().is_empty() {
		failed.push_debug(solution.debug());
	}
	failed
}

fn panic_message(error: JoinError) -> String {
	if !error.is_panic() {
		return format!("Solver task stopped: {}", error);
	}
	let payload = error.into_panic();
	let message = payload
		.downcast_ref::<&str>()
		.map(|s| s.to_string())
		.or_else(|| payload.downcast_ref::<String>().cloned())
		.unwrap_or_else(|| "unknown panic payload".to_string());
	format!("Solver panicked: {}", message)
}
