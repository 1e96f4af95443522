//! Caller-side handle on a submitted solve.

use solver_types::{CancellationToken, ProblemData, Solution, SolutionId, SolutionStatus};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::warn;

/// Non-blocking handle returned by a top-level submit.
///
/// Dropping the handle does not stop the computation.
pub struct SolutionHandle<O> {
	id: SolutionId,
	kind_id: String,
	solver_id: String,
	status: watch::Receiver<SolutionStatus>,
	token: CancellationToken,
	task: JoinHandle<Solution<O>>,
}

impl<O: ProblemData> SolutionHandle<O> {
	pub(crate) fn new(
		id: SolutionId,
		kind_id: impl Into<String>,
		solver_id: impl Into<String>,
		status: watch::Receiver<SolutionStatus>,
		token: CancellationToken,
		task: JoinHandle<Solution<O>>,
	) -> Self {
		Self {
			id,
			kind_id: kind_id.into(),
			solver_id: solver_id.into(),
			status,
			token,
			task,
		}
	}

	pub fn id(&self) -> SolutionId {
		self.id
	}

	pub fn kind_id(&self) -> &str {
		&self.kind_id
	}

	/// The solver chosen for this solve.
	pub fn solver_id(&self) -> &str {
		&self.solver_id
	}

	/// Latest observed status.
	pub fn status(&self) -> SolutionStatus {
		*self.status.borrow()
	}

	/// Receiver notified on every status change.
	pub fn status_updates(&self) -> watch::Receiver<SolutionStatus> {
		self.status.clone()
	}

	/// Requests cancellation of this solve and all of its sub-routines. The solution ends in
	/// `ABORTED` unless it already reached a terminal status.
	pub fn cancel(&self) {
		self.token.cancel();
	}

	pub fn is_finished(&self) -> bool {
		self.task.is_finished()
	}

	/// Waits for the terminal solution.
	pub async fn wait(self) -> Solution<O> {
		let result = self.task.await;
		settle_join(result, self.id, &self.kind_id, &self.solver_id)
	}

	/// Re-types the handle so that the result is delivered as JSON.
	pub(crate) fn into_json(self) -> SolutionHandle<serde_json::Value> {
		let Self {
			id,
			kind_id,
			solver_id,
			status,
			token,
			task,
		} = self;

		let task = {
			let kind_id = kind_id.clone();
			let solver_id = solver_id.clone();
			tokio::spawn(async move {
				settle_join(task.await, id, &kind_id, &solver_id).map_data(|data| {
					serde_json::to_value(data).unwrap_or_else(|e| {
						warn!(solution_id = %id, "Failed to render solution data: {}", e);
						serde_json::Value::Null
					})
				})
			})
		};

		SolutionHandle {
			id,
			kind_id,
			solver_id,
			status,
			token,
			task,
		}
	}
}

fn settle_join<O>(
	result: Result<Solution<O>, JoinError>,
	id: SolutionId,
	kind_id: &str,
	solver_id: &str,
) -> Solution<O> {
	match result {
		Ok(solution) => solution,
		Err(e) => Solution::failed(kind_id, format!("Solve task failed: {}", e))
			.with_id(id)
			.with_solver(solver_id),
	}
}
