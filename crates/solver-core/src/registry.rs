//! Per-kind registry of solvers and example instances.

use crate::error::RegistryError;
use crate::solver::{Solver, SolverInfo};
use solver_types::{ProblemData, ProblemInstance, ProblemKind};
use std::sync::Arc;

/// Solvers and examples registered for one problem kind.
///
/// Filled while the catalog is built and read-only afterwards. Solvers keep their registration
/// order, which selection uses to break ties.
pub struct ProblemRegistry<I, O> {
	kind: ProblemKind<I, O>,
	solvers: Vec<Arc<dyn Solver<I, O>>>,
	examples: Vec<ProblemInstance<I>>,
}

impl<I: ProblemData, O: ProblemData> ProblemRegistry<I, O> {
	pub fn new(kind: ProblemKind<I, O>) -> Self {
		Self {
			kind,
			solvers: Vec::new(),
			examples: Vec::new(),
		}
	}

	pub fn kind(&self) -> &ProblemKind<I, O> {
		&self.kind
	}

	/// Adds a solver. Solver ids must be unique within the kind.
	pub fn add_solver(&mut self, solver: Arc<dyn Solver<I, O>>) -> Result<(), RegistryError> {
		if self.solver(solver.id()).is_some() {
			return Err(RegistryError::DuplicateSolver {
				kind: self.kind.id().to_string(),
				solver: solver.id().to_string(),
			});
		}
		self.solvers.push(solver);
		Ok(())
	}

	pub fn add_example(&mut self, name: impl Into<String>, input: I) {
		self.examples
			.push(ProblemInstance::example(&self.kind, name, input));
	}

	pub fn solvers(&self) -> &[Arc<dyn Solver<I, O>>] {
		&self.solvers
	}

	pub fn solver(&self, id: &str) -> Option<&Arc<dyn Solver<I, O>>> {
		self.solvers.iter().find(|solver| solver.id() == id)
	}

	pub fn examples(&self) -> &[ProblemInstance<I>] {
		&self.examples
	}

	pub fn example(&self, name: &str) -> Option<&ProblemInstance<I>> {
		self.examples.iter().find(|example| example.name == name)
	}

	pub fn is_empty(&self) -> bool {
		self.solvers.is_empty()
	}

	pub fn solver_infos(&self) -> Vec<SolverInfo> {
		self.solvers
			.iter()
			.map(|solver| SolverInfo::of(self.kind.id(), solver.as_ref()))
			.collect()
	}
}
