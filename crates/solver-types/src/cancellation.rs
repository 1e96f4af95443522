//! Hierarchical cancellation signal.
//!
//! A token observes its own flag and the flags of every ancestor it was derived from, so
//! cancelling a parent invocation reaches every child and grandchild still in flight while a
//! child can be cancelled without touching its parent.

use futures::future::select_all;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct CancellationToken {
	sender: Arc<watch::Sender<bool>>,
	/// Own receiver first, followed by the receivers of all ancestors.
	chain: Vec<watch::Receiver<bool>>,
}

impl CancellationToken {
	pub fn new() -> Self {
		let (sender, receiver) = watch::channel(false);
		Self {
			sender: Arc::new(sender),
			chain: vec![receiver],
		}
	}

	/// Derives a token that is cancelled whenever this one is.
	pub fn child(&self) -> Self {
		let (sender, receiver) = watch::channel(false);
		let mut chain = Vec::with_capacity(self.chain.len() + 1);
		chain.push(receiver);
		chain.extend(self.chain.iter().cloned());
		Self {
			sender: Arc::new(sender),
			chain,
		}
	}

	pub fn cancel(&self) {
		self.sender.send_replace(true);
	}

	pub fn is_cancelled(&self) -> bool {
		self.chain.iter().any(|rx| *rx.borrow())
	}

	/// Resolves once this token or any ancestor is cancelled.
	pub async fn cancelled(&self) {
		if self.is_cancelled() {
			return;
		}

		let waits = self.chain.iter().cloned().map(|mut rx| {
			Box::pin(async move {
				// A dropped ancestor can no longer cancel us.
				if rx.wait_for(|cancelled| *cancelled).await.is_err() {
					std::future::pending::<()>().await;
				}
			})
		});
		select_all(waits).await;
	}
}

impl Default for CancellationToken {
	fn default() -> Self {
		Self::new()
	}
}
