//! Bundled problem kinds and solvers.
//!
//! [`register_bundled`] adds every kind below, its solvers and its example instances to a
//! [`CatalogBuilder`]. Solvers that shell out receive the shared [`ExecutionService`].

use solver_core::CatalogBuilder;
use solver_execution::ExecutionService;
use solver_types::ProblemKind;
use std::sync::Arc;

pub mod echo;
pub mod sort;
pub mod text;

pub use echo::{DelegateSolver, EchoSolver};
pub use sort::{CommandSolver, NativeSortSolver};
pub use text::{TextStats, TextStatsSolver, WordCountSolver};

pub const ECHO: ProblemKind<String, String> =
	ProblemKind::new("echo", "Returns the input text, optionally transformed");

pub const DELEGATE: ProblemKind<String, String> =
	ProblemKind::new("delegate", "Answers by handing the input to an echo solver");

pub const WORD_COUNT: ProblemKind<String, u64> =
	ProblemKind::new("word-count", "Counts the words of a text");

pub const TEXT_STATS: ProblemKind<String, TextStats> =
	ProblemKind::new("text-stats", "Summarizes a text: words, lines, characters");

pub const SORT_LINES: ProblemKind<String, String> =
	ProblemKind::new("sort-lines", "Sorts the lines of a text");

/// Registers the bundled kinds, solvers and examples.
pub fn register_bundled(builder: CatalogBuilder, executor: Arc<ExecutionService>) -> CatalogBuilder {
	builder
		.with_kind(ECHO)
		.with_kind(DELEGATE)
		.with_kind(WORD_COUNT)
		.with_kind(TEXT_STATS)
		.with_kind(SORT_LINES)
		.with_solver(&ECHO, EchoSolver)
		.with_solver(&DELEGATE, DelegateSolver)
		.with_solver(&WORD_COUNT, WordCountSolver)
		.with_solver(&TEXT_STATS, TextStatsSolver)
		.with_solver(&SORT_LINES, NativeSortSolver)
		.with_solver(&SORT_LINES, CommandSolver::sort(executor))
		.with_example(&ECHO, "greeting", "hello".to_string())
		.with_example(&DELEGATE, "greeting", "world".to_string())
		.with_example(
			&WORD_COUNT,
			"pangram",
			"The quick brown fox jumps over the lazy dog".to_string(),
		)
		.with_example(
			&TEXT_STATS,
			"haiku",
			"An old silent pond\nA frog jumps into the pond\nSplash! Silence again".to_string(),
		)
		.with_example(&SORT_LINES, "fruits", "pear\napple\nfig\n".to_string())
}
