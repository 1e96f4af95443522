//! Confidence scoring as a chain of responsibility.
//!
//! Calculators are consulted in registration order and the first one that supports a solver
//! produces its estimate. When none does, the unknown sentinel is returned. Confidence is advisory
//! and never consulted by selection.

use crate::solver::SolverInfo;
use solver_types::Confidence;
use std::collections::BTreeMap;

pub trait ConfidenceCalculator: Send + Sync {
	fn supports(&self, solver: &SolverInfo) -> bool;

	fn calculate(&self, solver: &SolverInfo) -> Confidence;
}

#[derive(Default)]
pub struct ConfidenceService {
	calculators: Vec<Box<dyn ConfidenceCalculator>>,
}

impl ConfidenceService {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a calculator after all previously registered ones.
	pub fn with_calculator(mut self, calculator: Box<dyn ConfidenceCalculator>) -> Self {
		self.calculators.push(calculator);
		self
	}

	pub fn score(&self, solver: &SolverInfo) -> Confidence {
		self.calculators
			.iter()
			.find(|calculator| calculator.supports(solver))
			.map(|calculator| calculator.calculate(solver))
			.unwrap_or_else(|| Confidence::unknown("no calculator registered"))
	}
}

/// Fixed scores per solver id, typically taken from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticConfidence {
	scores: BTreeMap<String, f64>,
}

impl StaticConfidence {
	pub fn new(scores: BTreeMap<String, f64>) -> Self {
		Self { scores }
	}
}

impl ConfidenceCalculator for StaticConfidence {
	fn supports(&self, solver: &SolverInfo) -> bool {
		self.scores.contains_key(&solver.id)
	}

	fn calculate(&self, solver: &SolverInfo) -> Confidence {
		match self.scores.get(&solver.id) {
			Some(score) => Confidence::known(*score).with_factor("source", "configured"),
			None => Confidence::unknown("no configured score"),
		}
	}
}
