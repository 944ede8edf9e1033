//! In-memory storage backend.
//!
//! Nothing survives a restart, which suits tests and local runs. All
//! entries sit behind one read-write lock, so a batch is checked and applied
//! under a single write guard. Entries written with a TTL stop being visible
//! once it lapses and are dropped by [`StorageInterface::cleanup_expired`].

use crate::{BatchEntry, StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use market_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug)]
struct Slot {
	bytes: Vec<u8>,
	expires_at: Option<Instant>,
}

impl Slot {
	fn live(&self, now: Instant) -> bool {
		self.expires_at.is_none_or(|deadline| now < deadline)
	}
}

#[derive(Default)]
pub struct MemoryStorage {
	slots: RwLock<HashMap<String, Slot>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let slots = self.slots.read().await;
		match slots.get(key) {
			Some(slot) if slot.live(Instant::now()) => Ok(slot.bytes.clone()),
			_ => Err(StorageError::NotFound),
		}
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let expires_at = ttl
			.filter(|ttl| !ttl.is_zero())
			.map(|ttl| Instant::now() + ttl);
		self.slots.write().await.insert(
			key.to_string(),
			Slot {
				bytes: value,
				expires_at,
			},
		);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.slots.write().await.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let now = Instant::now();
		Ok(self
			.slots
			.read()
			.await
			.get(key)
			.is_some_and(|slot| slot.live(now)))
	}

	async fn commit(&self, batch: Vec<BatchEntry>) -> Result<(), StorageError> {
		let mut slots = self.slots.write().await;
		let now = Instant::now();

		for entry in &batch {
			let current = slots
				.get(&entry.key)
				.filter(|slot| slot.live(now))
				.map(|slot| slot.bytes.as_slice());
			if !entry.precondition.holds(current) {
				return Err(StorageError::Conflict(entry.key.clone()));
			}
		}

		for BatchEntry { key, value, .. } in batch {
			match value {
				Some(bytes) => {
					slots.insert(
						key,
						Slot {
							bytes,
							expires_at: None,
						},
					);
				},
				None => {
					slots.remove(&key);
				},
			}
		}
		Ok(())
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let now = Instant::now();
		let slots = self.slots.read().await;
		Ok(slots
			.iter()
			.filter(|(key, slot)| key.starts_with(prefix) && slot.live(now))
			.map(|(key, _)| key.clone())
			.collect())
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		let now = Instant::now();
		let mut slots = self.slots.write().await;
		let before = slots.len();
		slots.retain(|_, slot| slot.live(now));
		Ok(before - slots.len())
	}
}

/// The memory backend takes no options.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	MemoryStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;
	Ok(Box::new(MemoryStorage::new()))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Precondition;
	use std::sync::Arc;

	fn guarded(key: &str, value: Option<&[u8]>, precondition: Precondition) -> BatchEntry {
		BatchEntry {
			key: key.to_string(),
			value: value.map(<[u8]>::to_vec),
			precondition,
		}
	}

	#[tokio::test]
	async fn test_set_get_delete() {
		let storage = MemoryStorage::new();
		storage
			.set_bytes("products:p1", b"apple".to_vec(), None)
			.await
			.unwrap();
		assert_eq!(storage.get_bytes("products:p1").await.unwrap(), b"apple");

		storage.delete("products:p1").await.unwrap();
		assert!(!storage.exists("products:p1").await.unwrap());
		assert!(matches!(
			storage.get_bytes("products:p1").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_commit_applies_puts_and_deletes() {
		let storage = MemoryStorage::new();
		storage
			.set_bytes("carts:u1", b"[1]".to_vec(), None)
			.await
			.unwrap();

		storage
			.commit(vec![
				guarded("orders:o1", Some(b"{}"), Precondition::Absent),
				guarded("carts:u1", None, Precondition::Matches(b"[1]".to_vec())),
			])
			.await
			.unwrap();

		assert!(storage.exists("orders:o1").await.unwrap());
		assert!(!storage.exists("carts:u1").await.unwrap());
	}

	#[tokio::test]
	async fn test_failed_precondition_writes_nothing() {
		let storage = MemoryStorage::new();
		storage
			.set_bytes("products:p1", b"3".to_vec(), None)
			.await
			.unwrap();

		let result = storage
			.commit(vec![
				guarded("orders:o1", Some(b"{}"), Precondition::Absent),
				guarded("products:p1", Some(b"1"), Precondition::Matches(b"2".to_vec())),
			])
			.await;

		assert!(matches!(result, Err(StorageError::Conflict(key)) if key == "products:p1"));
		assert!(!storage.exists("orders:o1").await.unwrap());
		assert_eq!(storage.get_bytes("products:p1").await.unwrap(), b"3");
	}

	#[tokio::test]
	async fn test_concurrent_guarded_writes_only_one_wins() {
		let storage = Arc::new(MemoryStorage::new());
		storage
			.set_bytes("products:p1", b"5".to_vec(), None)
			.await
			.unwrap();

		let handles: Vec<_> = (0..8u8)
			.map(|n| {
				let storage = Arc::clone(&storage);
				tokio::spawn(async move {
					storage
						.commit(vec![guarded(
							"products:p1",
							Some(&[n]),
							Precondition::Matches(b"5".to_vec()),
						)])
						.await
				})
			})
			.collect();

		let mut wins = 0;
		for handle in handles {
			if handle.await.unwrap().is_ok() {
				wins += 1;
			}
		}
		assert_eq!(wins, 1);
	}

	#[tokio::test]
	async fn test_list_keys_by_prefix() {
		let storage = MemoryStorage::new();
		for key in ["orders:a", "orders:b", "accepted_orders:a"] {
			storage.set_bytes(key, vec![], None).await.unwrap();
		}

		let mut keys = storage.list_keys("orders:").await.unwrap();
		keys.sort();
		assert_eq!(keys, vec!["orders:a", "orders:b"]);
	}

	#[tokio::test]
	async fn test_expired_entries_are_hidden_and_swept() {
		let storage = MemoryStorage::new();
		storage
			.set_bytes("carts:u1", b"[]".to_vec(), Some(Duration::from_millis(20)))
			.await
			.unwrap();
		storage
			.set_bytes("carts:u2", b"[]".to_vec(), None)
			.await
			.unwrap();

		tokio::time::sleep(Duration::from_millis(50)).await;

		assert!(!storage.exists("carts:u1").await.unwrap());
		assert_eq!(storage.list_keys("carts:").await.unwrap(), vec!["carts:u2"]);
		assert_eq!(storage.cleanup_expired().await.unwrap(), 1);
		assert_eq!(storage.cleanup_expired().await.unwrap(), 0);
	}

	#[test]
	fn test_factory_rejects_non_table_config() {
		assert!(create_storage(&toml::Value::Integer(1)).is_err());
		assert!(create_storage(&toml::Value::Table(toml::Table::new())).is_ok());
	}
}
