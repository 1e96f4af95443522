//! `word-count` and `text-stats`.

use crate::WORD_COUNT;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solver_core::{SolveContext, Solver};
use solver_types::{
	SettingDefinition, SettingsSchema, Solution, SolveError, SubRoutineDefinition, SubRoutineInfo,
};

const COUNT_WORDS: SubRoutineDefinition<String, u64> =
	SubRoutineDefinition::new(WORD_COUNT, "words", "Counts the words of the text");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStats {
	pub words: u64,
	pub lines: u64,
	pub characters: u64,
	pub longest_word: String,
}

/// Counts whitespace separated words of at least `min_length` characters.
pub struct WordCountSolver;

#[async_trait]
impl Solver<String, u64> for WordCountSolver {
	fn id(&self) -> &str {
		"word-count"
	}

	fn name(&self) -> &str {
		"Word counter"
	}

	fn description(&self) -> &str {
		"Splits on whitespace and counts the pieces"
	}

	fn settings_schema(&self) -> SettingsSchema {
		SettingsSchema::new(vec![SettingDefinition::integer(
			"min_length",
			1,
			64,
			Some(1),
		)
		.with_description("Shortest word that is counted, in characters")])
	}

	async fn solve(
		&self,
		input: String,
		solution: &mut Solution<u64>,
		ctx: &SolveContext,
	) -> Result<(), SolveError> {
		let min_length = usize::try_from(ctx.settings().integer("min_length").unwrap_or(1))
			.unwrap_or(1);
		let count = input
			.split_whitespace()
			.filter(|word| word.chars().count() >= min_length)
			.count();

		solution.complete(u64::try_from(count).unwrap_or(u64::MAX))?;
		Ok(())
	}
}

/// Summarizes a text, leaving the word count to a `word-count` solver.
pub struct TextStatsSolver;

#[async_trait]
impl Solver<String, TextStats> for TextStatsSolver {
	fn id(&self) -> &str {
		"text-stats"
	}

	fn name(&self) -> &str {
		"Text statistics"
	}

	fn sub_routines(&self) -> Vec<SubRoutineInfo> {
		vec![COUNT_WORDS.info()]
	}

	fn can_handle(&self, input: &String) -> bool {
		!input.trim().is_empty()
	}

	async fn solve(
		&self,
		input: String,
		solution: &mut Solution<TextStats>,
		ctx: &SolveContext,
	) -> Result<(), SolveError> {
		let counted = ctx.run_sub_routine(&COUNT_WORDS, input.clone()).await;
		let words = match (counted.status().is_success(), counted.data()) {
			(true, Some(words)) => *words,
			_ => {
				return Err(SolveError::aborted(format!(
					"Word count ended {}: {}",
					counted.status(),
					counted.debug()
				)))
			}
		};

		let longest_word = input
			.split_whitespace()
			.fold("", |longest, word| {
				if word.chars().count() > longest.chars().count() {
					word
				} else {
					longest
				}
			})
			.to_string();

		solution.complete(TextStats {
			words,
			lines: u64::try_from(input.lines().count()).unwrap_or(u64::MAX),
			characters: u64::try_from(input.chars().count()).unwrap_or(u64::MAX),
			longest_word,
		})?;
		Ok(())
	}
}
