//! Event bus for solution lifecycle notifications.
//!
//! Every invocation publishes `Started` when it begins computing and `Finished` once it reached
//! a terminal status. Events carry the parent solution id, so subscribers can reconstruct the
//! sub-routine call graph of a top-level solve.

use serde::{Deserialize, Serialize};
use solver_types::{SolutionId, SolutionStatus};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SolutionEvent {
	Started {
		id: SolutionId,
		parent: Option<SolutionId>,
		kind: String,
		solver: String,
	},
	Finished {
		id: SolutionId,
		parent: Option<SolutionId>,
		kind: String,
		status: SolutionStatus,
	},
}

impl SolutionEvent {
	pub fn id(&self) -> SolutionId {
		match self {
			Self::Started { id, .. } | Self::Finished { id, .. } => *id,
		}
	}
}

/// Event bus for broadcasting solution events to multiple subscribers.
///
/// Events published while nobody is subscribed are dropped; slow subscribers lag and lose the
/// oldest events once the channel capacity is exceeded.
pub struct EventBus {
	sender: broadcast::Sender<SolutionEvent>,
}

impl EventBus {
	/// Creates a new EventBus with the specified channel capacity.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Creates a new subscriber receiving every event published after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<SolutionEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event to all current subscribers.
	///
	/// Returns an error if there are no active subscribers, which callers usually ignore.
	pub fn publish(
		&self,
		event: SolutionEvent,
	) -> Result<(), broadcast::error::SendError<SolutionEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}

impl Clone for EventBus {
	fn clone(&self) -> Self {
		Self {
			sender: self.sender.clone(),
		}
	}
}
