//! Common types for the solver toolbox.
//!
//! Problem kinds and their sub-routine definitions, the settings model, the solution lifecycle and
//! the confidence value type live here so that solver plugins can depend on them without pulling
//! in the runtime.

pub mod cancellation;
pub mod confidence;
pub mod errors;
pub mod problem;
pub mod settings;
pub mod solution;

pub use cancellation::CancellationToken;
pub use confidence::Confidence;
pub use errors::SolveError;
pub use problem::{
	KindDescriptor, ProblemData, ProblemInstance, ProblemKind, SubRoutineDefinition,
	SubRoutineInfo,
};
pub use settings::{
	SettingDefinition, SettingKind, SettingValue, Settings, SettingsInput, SettingsSchema,
	SettingViolation,
};
pub use solution::{LifecycleError, Solution, SolutionId, SolutionRecord, SolutionStatus};
