//! Orchestration core of the solver toolbox.
//!
//! Problem kinds are registered in a [`ProblemCatalog`], each with its own [`ProblemRegistry`]
//! of interchangeable [`Solver`]s. The [`SolverEngine`] selects a solver for a submitted
//! instance and runs it as an asynchronous task; running solvers delegate to solvers of other
//! kinds through the [`SubRoutineResolver`] bound to their [`SolveContext`].

pub mod catalog;
pub mod confidence;
pub mod engine;
pub mod error;
pub mod event_bus;
pub mod handle;
pub mod registry;
pub mod resolver;
mod runtime;
pub mod selector;
pub mod solver;

pub use catalog::{CatalogBuilder, ExampleInfo, ProblemCatalog};
pub use confidence::{ConfidenceCalculator, ConfidenceService, StaticConfidence};
pub use engine::{SolveRequest, SolverBuilder, SolverEngine};
pub use error::{EngineError, RegistryError};
pub use event_bus::{EventBus, SolutionEvent};
pub use handle::SolutionHandle;
pub use registry::ProblemRegistry;
pub use resolver::SubRoutineResolver;
pub use selector::{
	create_strategy, Candidate, HighestSuitability, RandomSelection, RoundRobin,
	SelectionStrategy,
};
pub use solver::{SolveContext, Solver, SolverInfo};

