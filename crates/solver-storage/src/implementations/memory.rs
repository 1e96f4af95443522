//! In-memory storage backend.
//!
//! Entries live in a concurrent map for the lifetime of the process. Expired entries are treated
//! as absent and dropped lazily when touched.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

struct Entry {
	value: Vec<u8>,
	expires_at: Option<Instant>,
}

impl Entry {
	fn is_expired(&self, now: Instant) -> bool {
		self.expires_at.is_some_and(|at| at <= now)
	}
}

/// Memory-backed storage keyed by `namespace:id`.
#[derive(Default)]
pub struct MemoryStorage {
	entries: DashMap<String, Entry>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let now = Instant::now();
		if let Some(entry) = self.entries.get(key) {
			if !entry.is_expired(now) {
				return Ok(entry.value.clone());
			}
		}
		if self.entries.remove_if(key, |_, entry| entry.is_expired(now)).is_some() {
			debug!(key, "Dropped expired entry");
		}
		Err(StorageError::NotFound)
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let expires_at = ttl.map(|ttl| Instant::now() + ttl);
		self.entries
			.insert(key.to_string(), Entry { value, expires_at });
		Ok(())
	}
}

/// Factory function to create a storage backend from the `[storage]` configuration table.
///
/// The memory backend has no parameters of its own.
pub fn create_storage(config: &toml::Value) -> Box<dyn StorageInterface> {
	let backend = config.get("backend").and_then(|v| v.as_str()).unwrap_or("memory");
	if backend != "memory" {
		warn!(backend, "Unsupported storage backend, falling back to memory");
	}
	Box::new(MemoryStorage::new())
}
