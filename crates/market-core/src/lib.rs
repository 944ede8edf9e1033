//! Core marketplace engine.
//!
//! Coordinates customers, store owners and riders around a shared catalog,
//! per-user carts and the order lifecycle. Every component reads and writes
//! the durable store directly; multi-record changes are committed as one
//! revision-guarded transaction.

pub mod builder;
pub mod catalog;
pub mod directory;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod state;

pub use builder::{BuilderError, MarketBuilder, MarketFactories};
pub use catalog::{AddOutcome, CatalogStore};
pub use directory::Directory;
pub use engine::MarketEngine;
pub use error::MarketError;
pub use handlers::{CartUpdate, ReviewOutcome};

#[cfg(test)]
pub(crate) mod test_utils {
	use crate::MarketEngine;
	use async_trait::async_trait;
	use market_config::builders::ConfigBuilder;
	use market_storage::implementations::memory::MemoryStorage;
	use market_storage::{BatchEntry, StorageError, StorageInterface, StorageService};
	use market_types::{ConfigSchema, NewProduct};
	use std::future::Future;
	use std::pin::Pin;
	use std::str::FromStr;
	use std::sync::{Arc, Mutex};
	use std::time::Duration;

	type Rival = Pin<Box<dyn Future<Output = ()> + Send>>;

	/// Write that runs after an operation has read its records but before
	/// its batch is committed.
	#[derive(Clone, Default)]
	pub struct Interleave(Arc<Mutex<Option<Rival>>>);

	impl Interleave {
		pub fn before_next_commit(&self, rival: impl Future<Output = ()> + Send + 'static) {
			*self.0.lock().unwrap() = Some(Box::pin(rival));
		}

		fn take(&self) -> Option<Rival> {
			self.0.lock().unwrap().take()
		}
	}

	/// Memory backend that lets an [`Interleave`] slip in ahead of a commit.
	struct InterleavedStorage {
		inner: MemoryStorage,
		interleave: Interleave,
	}

	#[async_trait]
	impl StorageInterface for InterleavedStorage {
		async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
			self.inner.get_bytes(key).await
		}

		async fn set_bytes(
			&self,
			key: &str,
			value: Vec<u8>,
			ttl: Option<Duration>,
		) -> Result<(), StorageError> {
			self.inner.set_bytes(key, value, ttl).await
		}

		async fn delete(&self, key: &str) -> Result<(), StorageError> {
			self.inner.delete(key).await
		}

		async fn exists(&self, key: &str) -> Result<bool, StorageError> {
			self.inner.exists(key).await
		}

		async fn commit(&self, batch: Vec<BatchEntry>) -> Result<(), StorageError> {
			if let Some(rival) = self.interleave.take() {
				rival.await;
			}
			self.inner.commit(batch).await
		}

		async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
			self.inner.list_keys(prefix).await
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			self.inner.config_schema()
		}
	}

	/// Engine whose next commit can be preceded by a competing operation.
	pub fn interleaved_engine() -> (MarketEngine, Interleave) {
		let interleave = Interleave::default();
		let storage = StorageService::new(Box::new(InterleavedStorage {
			inner: MemoryStorage::new(),
			interleave: interleave.clone(),
		}));
		let engine = MarketEngine::new(ConfigBuilder::new().build(), Arc::new(storage));
		(engine, interleave)
	}

	pub fn memory_storage() -> Arc<StorageService> {
		Arc::new(StorageService::new(Box::new(MemoryStorage::new())))
	}

	pub fn engine(restock_on_reject: bool) -> MarketEngine {
		let config = ConfigBuilder::new()
			.restock_on_reject(restock_on_reject)
			.build();
		MarketEngine::new(config, memory_storage())
	}

	pub fn new_product(name: &str, price: &str, stock: u64) -> NewProduct {
		NewProduct {
			name: name.to_string(),
			description: format!("{} description", name),
			price: rust_decimal::Decimal::from_str(price).unwrap(),
			image_url: format!("https://img.example/{}.png", name.to_lowercase()),
			store_name: "Corner Shop".to_string(),
			stock,
		}
	}
}
