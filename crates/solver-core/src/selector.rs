//! Solver selection ("meta-solver").
//!
//! Selection runs in two stages. [`select`] filters the registry down to admissible solvers
//! (those that can handle the input and accept the supplied settings) and a
//! [`SelectionStrategy`] then picks one of them.

use crate::error::EngineError;
use crate::registry::ProblemRegistry;
use crate::solver::Solver;
use crate::SolveRequest;
use dashmap::DashMap;
use rand::Rng;
use solver_config::SelectionPolicy;
use solver_types::{ProblemData, Settings, SettingViolation};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// An admissible solver as seen by a strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'a> {
	pub solver_id: &'a str,
	/// Position in the registry; lower means registered earlier.
	pub registration_index: usize,
	pub suitability: f64,
}

/// Picks one solver among admissible candidates.
pub trait SelectionStrategy: Send + Sync {
	fn name(&self) -> &'static str;

	/// Returns an index into `candidates`, which is never empty.
	fn choose(&self, kind_id: &str, candidates: &[Candidate<'_>]) -> usize;
}

/// Highest suitability wins; ties go to the earliest registration.
#[derive(Debug, Default)]
pub struct HighestSuitability;

impl SelectionStrategy for HighestSuitability {
	fn name(&self) -> &'static str {
		"suitability"
	}

	fn choose(&self, _kind_id: &str, candidates: &[Candidate<'_>]) -> usize {
		let score = |c: &Candidate<'_>| {
			if c.suitability.is_nan() {
				f64::NEG_INFINITY
			} else {
				c.suitability
			}
		};

		let mut best = 0;
		for (index, candidate) in candidates.iter().enumerate().skip(1) {
			let current = &candidates[best];
			let better = score(candidate) > score(current)
				|| (score(candidate) == score(current)
					&& candidate.registration_index < current.registration_index);
			if better {
				best = index;
			}
		}
		best
	}
}

/// Uniformly random among admissible solvers.
#[derive(Debug, Default)]
pub struct RandomSelection;

impl SelectionStrategy for RandomSelection {
	fn name(&self) -> &'static str {
		"random"
	}

	fn choose(&self, _kind_id: &str, candidates: &[Candidate<'_>]) -> usize {
		rand::thread_rng().gen_range(0..candidates.len())
	}
}

/// Rotates through admissible solvers, with a separate counter per problem kind.
#[derive(Debug, Default)]
pub struct RoundRobin {
	counters: DashMap<String, usize>,
}

impl SelectionStrategy for RoundRobin {
	fn name(&self) -> &'static str {
		"round-robin"
	}

	fn choose(&self, kind_id: &str, candidates: &[Candidate<'_>]) -> usize {
		let mut counter = self.counters.entry(kind_id.to_string()).or_insert(0);
		let index = *counter % candidates.len();
		*counter = counter.wrapping_add(1);
		index
	}
}

pub fn create_strategy(policy: SelectionPolicy) -> Box<dyn SelectionStrategy> {
	match policy {
		SelectionPolicy::Suitability => Box::new(HighestSuitability),
		SelectionPolicy::Random => Box::new(RandomSelection),
		SelectionPolicy::RoundRobin => Box::new(RoundRobin::default()),
	}
}

/// Runs a plugin hook on the caller's stack, turning a panic into `None`.
pub(crate) fn guard_hook<T>(
	kind_id: &str,
	owner: &str,
	hook: &'static str,
	f: impl FnOnce() -> T,
) -> Option<T> {
	match panic::catch_unwind(AssertUnwindSafe(f)) {
		Ok(value) => Some(value),
		Err(_) => {
			warn!(kind = kind_id, owner, hook, "Hook panicked");
			None
		}
	}
}

/// Chooses a solver for `input` and validates the request's settings against it.
///
/// An explicitly requested solver bypasses the strategy but must exist, handle the input and
/// accept the settings. Otherwise the strategy picks among solvers that can handle the input
/// and accept the settings. When some solver can handle the input but none accepts the
/// settings, the violations of the first such solver are reported. A solver whose
/// `can_handle`, `settings_schema` or `suitability` panics is not admissible.
pub fn select<I: ProblemData, O: ProblemData>(
	registry: &ProblemRegistry<I, O>,
	strategy: &dyn SelectionStrategy,
	input: &I,
	request: &SolveRequest,
) -> Result<(Arc<dyn Solver<I, O>>, Settings), EngineError> {
	let kind_id = registry.kind().id();

	if let Some(solver_id) = &request.solver_id {
		let solver = registry
			.solver(solver_id)
			.ok_or_else(|| EngineError::UnknownSolver {
				kind: kind_id.to_string(),
				solver: solver_id.clone(),
			})?;
		let handles = guard_hook(kind_id, solver_id, "can_handle", || solver.can_handle(input));
		if handles != Some(true) {
			return Err(EngineError::NoAdmissibleSolver(kind_id.to_string()));
		}
		let schema = guard_hook(kind_id, solver_id, "settings_schema", || {
			solver.settings_schema()
		})
		.ok_or_else(|| EngineError::NoAdmissibleSolver(kind_id.to_string()))?;
		let settings = schema
			.validate(&request.settings)
			.map_err(|violations| EngineError::InvalidSettings {
				target: format!("solver '{}'", solver_id),
				violations,
			})?;
		return Ok((solver.clone(), settings));
	}

	if registry.is_empty() {
		return Err(EngineError::NoSolver(kind_id.to_string()));
	}

	let mut admissible = Vec::new();
	let mut first_rejection: Option<Vec<SettingViolation>> = None;
	for (index, solver) in registry.solvers().iter().enumerate() {
		let solver_id = solver.id();
		if guard_hook(kind_id, solver_id, "can_handle", || solver.can_handle(input)) != Some(true) {
			continue;
		}
		let Some(schema) =
			guard_hook(kind_id, solver_id, "settings_schema", || solver.settings_schema())
		else {
			continue;
		};
		match schema.validate(&request.settings) {
			Ok(settings) => {
				if let Some(suitability) =
					guard_hook(kind_id, solver_id, "suitability", || solver.suitability(input))
				{
					admissible.push((index, solver, settings, suitability));
				}
			}
			Err(violations) => {
				first_rejection.get_or_insert(violations);
			}
		}
	}

	if admissible.is_empty() {
		return Err(match first_rejection {
			Some(violations) => EngineError::InvalidSettings {
				target: format!("problem kind '{}'", kind_id),
				violations,
			},
			None => EngineError::NoAdmissibleSolver(kind_id.to_string()),
		});
	}

	let candidates: Vec<Candidate<'_>> = admissible
		.iter()
		.map(|(index, solver, _, suitability)| Candidate {
			solver_id: solver.id(),
			registration_index: *index,
			suitability: *suitability,
		})
		.collect();

	let choice = guard_hook(kind_id, strategy.name(), "choose", || {
		strategy.choose(kind_id, &candidates)
	})
	.ok_or_else(|| EngineError::Selection(format!("strategy '{}' panicked", strategy.name())))?;
	if choice >= candidates.len() {
		return Err(EngineError::Selection(format!(
			"strategy '{}' chose candidate {} of {}",
			strategy.name(),
			choice,
			candidates.len()
		)));
	}
	debug!(
		kind = kind_id,
		solver = candidates[choice].solver_id,
		strategy = strategy.name(),
		admissible = candidates.len(),
		"Selected solver"
	);
	drop(candidates);

	let (_, solver, settings, _) = admissible.swap_remove(choice);
	Ok((solver.clone(), settings))
}
