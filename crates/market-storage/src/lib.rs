//! Storage module for the marketplace backend.
//!
//! This module provides the document store every other component reads and
//! writes through. Backends only deal in raw bytes keyed by `namespace:id`;
//! the typed [`StorageService`] layers JSON serialization and
//! revision-guarded transactions on top.
//!
//! A transaction is a batch of puts and deletes, each carrying a
//! [`Precondition`] on the key's current value. Backends apply a batch
//! all-or-nothing: if any precondition fails, nothing is written and
//! [`StorageError::Conflict`] is returned.

use async_trait::async_trait;
use market_types::{ConfigSchema, ImplementationRegistry};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Error that occurs when a requested item is not found.
	#[error("Not found")]
	NotFound,
	/// A precondition of a batch did not hold; nothing was written.
	#[error("Conflicting write on key '{0}'")]
	Conflict(String),
	/// Error that occurs during serialization/deserialization.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Error that occurs in the storage backend.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Error that occurs during configuration validation.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Condition a key's current value must satisfy for a batch to apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precondition {
	/// No condition.
	Any,
	/// The key must not exist.
	Absent,
	/// The key must hold exactly these bytes.
	Matches(Vec<u8>),
}

impl Precondition {
	/// Checks the precondition against the current value of a key.
	pub fn holds(&self, current: Option<&[u8]>) -> bool {
		match (self, current) {
			(Precondition::Any, _) => true,
			(Precondition::Absent, None) => true,
			(Precondition::Matches(expected), Some(actual)) => expected.as_slice() == actual,
			_ => false,
		}
	}
}

/// One write of a batch. A `value` of `None` deletes the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
	pub key: String,
	pub value: Option<Vec<u8>>,
	pub precondition: Precondition,
}

/// Trait defining the low-level interface for storage backends.
///
/// Keys have the form `namespace:id`.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes with optional time-to-live.
	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Applies a batch atomically.
	///
	/// All preconditions are checked against the state before the batch;
	/// if one fails, no entry is applied and `Conflict` names its key.
	async fn commit(&self, batch: Vec<BatchEntry>) -> Result<(), StorageError>;

	/// Lists all live keys starting with `prefix` (a `namespace:` prefix).
	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Removes expired entries from storage (optional operation).
	/// Returns the number of entries removed.
	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		Ok(0)
	}

	/// Completes any batch interrupted by a crash. Returns the number of
	/// entries replayed.
	async fn recover(&self) -> Result<usize, StorageError> {
		Ok(0)
	}
}

/// Type alias for storage factory functions.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage implementations.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

fn make_key(namespace: &str, id: &str) -> String {
	format!("{}:{}", namespace, id)
}

/// The stored bytes of a record as it was read, or its absence.
///
/// A write guarded by a revision only applies if the record is still
/// exactly as it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision(Option<Vec<u8>>);

impl Revision {
	/// Revision of a record that does not exist.
	pub fn absent() -> Self {
		Self(None)
	}

	pub fn is_absent(&self) -> bool {
		self.0.is_none()
	}

	fn precondition(&self) -> Precondition {
		match &self.0 {
			Some(bytes) => Precondition::Matches(bytes.clone()),
			None => Precondition::Absent,
		}
	}
}

/// A deserialized record together with the revision it was read at.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
	pub value: T,
	pub revision: Revision,
}

/// A set of typed writes committed together by [`StorageService::commit`].
#[derive(Debug, Default)]
pub struct Transaction {
	entries: Vec<BatchEntry>,
}

impl Transaction {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	fn push<T: Serialize>(
		&mut self,
		namespace: &str,
		id: &str,
		data: &T,
		precondition: Precondition,
	) -> Result<&mut Self, StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.entries.push(BatchEntry {
			key: make_key(namespace, id),
			value: Some(bytes),
			precondition,
		});
		Ok(self)
	}

	/// Writes `data` if the record is still at `expected`.
	pub fn put<T: Serialize>(
		&mut self,
		namespace: &str,
		id: &str,
		data: &T,
		expected: &Revision,
	) -> Result<&mut Self, StorageError> {
		self.push(namespace, id, data, expected.precondition())
	}

	/// Writes `data` only if no record exists yet.
	pub fn insert<T: Serialize>(
		&mut self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<&mut Self, StorageError> {
		self.push(namespace, id, data, Precondition::Absent)
	}

	/// Writes `data` unconditionally.
	pub fn upsert<T: Serialize>(
		&mut self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<&mut Self, StorageError> {
		self.push(namespace, id, data, Precondition::Any)
	}

	/// Deletes the record if it is still at `expected`.
	pub fn delete(&mut self, namespace: &str, id: &str, expected: &Revision) -> &mut Self {
		self.entries.push(BatchEntry {
			key: make_key(namespace, id),
			value: None,
			precondition: expected.precondition(),
		});
		self
	}
}

/// High-level storage service that provides typed operations.
///
/// The StorageService wraps a low-level storage backend and provides
/// convenient methods for storing and retrieving typed data with
/// automatic serialization/deserialization.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Stores a serializable value without time-to-live, overwriting any
	/// existing record.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.set_bytes(&make_key(namespace, id), bytes, None)
			.await
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		Ok(self.load(namespace, id).await?.value)
	}

	/// Retrieves a value together with the revision it was read at.
	pub async fn load<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<Versioned<T>, StorageError> {
		let bytes = self.backend.get_bytes(&make_key(namespace, id)).await?;
		let value =
			serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))?;
		Ok(Versioned {
			value,
			revision: Revision(Some(bytes)),
		})
	}

	/// Like [`load`](Self::load), but an absent record yields `None` with an
	/// absent revision instead of `NotFound`.
	pub async fn load_optional<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<(Option<T>, Revision), StorageError> {
		match self.load(namespace, id).await {
			Ok(Versioned { value, revision }) => Ok((Some(value), revision)),
			Err(StorageError::NotFound) => Ok((None, Revision::absent())),
			Err(e) => Err(e),
		}
	}

	/// Removes a value from storage.
	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&make_key(namespace, id)).await
	}

	/// Checks if a value exists in storage.
	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&make_key(namespace, id)).await
	}

	/// Retrieves every record of a namespace, ordered by id.
	///
	/// Records removed between listing and reading are skipped.
	pub async fn list<T: DeserializeOwned>(
		&self,
		namespace: &str,
	) -> Result<Vec<T>, StorageError> {
		let prefix = format!("{}:", namespace);
		let mut keys = self.backend.list_keys(&prefix).await?;
		keys.sort();

		let mut values = Vec::with_capacity(keys.len());
		for key in keys {
			match self.backend.get_bytes(&key).await {
				Ok(bytes) => values.push(
					serde_json::from_slice(&bytes)
						.map_err(|e| StorageError::Serialization(e.to_string()))?,
				),
				Err(StorageError::NotFound) => continue,
				Err(e) => return Err(e),
			}
		}
		Ok(values)
	}

	/// Commits a transaction atomically.
	pub async fn commit(&self, transaction: Transaction) -> Result<(), StorageError> {
		if transaction.is_empty() {
			return Ok(());
		}
		self.backend.commit(transaction.entries).await
	}

	/// Removes expired entries from storage.
	///
	/// Returns the number of entries that were removed.
	pub async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.backend.cleanup_expired().await
	}

	/// Replays any batch a crash left half-applied.
	pub async fn recover(&self) -> Result<usize, StorageError> {
		self.backend.recover().await
	}
}
