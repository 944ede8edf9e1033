//! File-based storage backend.
//!
//! Each record lives in `<storage_path>/<namespace>/<id>.bin`, prefixed with a
//! fixed-size header carrying its expiry. Single writes go through a temp
//! file and a rename. Batches are first written to a journal, then applied,
//! then the journal is removed; a journal left behind by a crash is replayed
//! before the next batch and on startup, so a batch is never seen
//! half-applied after recovery.
//!
//! The directory is owned by one process at a time through an exclusive
//! lock on `<storage_path>/.lock`.

use crate::{BatchEntry, StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use fs2::FileExt;
use market_types::{
	current_timestamp, ConfigSchema, Field, FieldType, ImplementationRegistry, Schema,
	StorageKey, ValidationError,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::sync::Mutex;

const JOURNAL_FILE: &str = "journal.json";
const LOCK_FILE: &str = ".lock";

#[allow(clippy::doc_nested_refdefs)]
/// Fixed-size file header for TTL support.
///
/// Binary layout (64 bytes total):
/// - [0-3]: Magic bytes "MKTS"
/// - [4-5]: Version (u16, little-endian)
/// - [6-13]: Expiration timestamp (u64, little-endian, Unix seconds, 0 = never)
/// - [14-63]: Reserved
#[derive(Debug, Clone)]
struct FileHeader {
	version: u16,
	expires_at: u64,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"MKTS";
	const VERSION: u16 = 1;
	const SIZE: usize = 64;

	fn new(ttl: Duration) -> Self {
		let expires_at = if ttl.is_zero() {
			0
		} else {
			current_timestamp().saturating_add(ttl.as_secs())
		};

		Self {
			version: Self::VERSION,
			expires_at,
		}
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.expires_at.to_le_bytes());
		bytes
	}

	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE {
			return Err(StorageError::Backend("File too small for header".into()));
		}
		if &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Missing file header".into()));
		}

		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}

		let mut expires_bytes = [0u8; 8];
		expires_bytes.copy_from_slice(&bytes[6..14]);

		Ok(Self {
			version,
			expires_at: u64::from_le_bytes(expires_bytes),
		})
	}

	fn is_expired(&self) -> bool {
		self.expires_at != 0 && current_timestamp() >= self.expires_at
	}
}

/// TTL configuration per namespace, read from `ttl_<namespace>` keys.
#[derive(Debug, Clone, Default)]
pub struct TtlConfig {
	ttls: HashMap<StorageKey, Duration>,
}

impl TtlConfig {
	/// Creates TTL config from TOML configuration.
	pub fn from_config(config: &toml::Value) -> Self {
		let mut ttls = HashMap::new();

		if let Some(table) = config.as_table() {
			for storage_key in StorageKey::all() {
				let config_key = format!("ttl_{}", storage_key.as_str());
				if let Some(ttl_value) = table
					.get(&config_key)
					.and_then(|v| v.as_integer())
					.filter(|v| *v > 0)
				{
					ttls.insert(storage_key, Duration::from_secs(ttl_value as u64));
				}
			}
		}

		Self { ttls }
	}

	fn get_ttl(&self, storage_key: StorageKey) -> Duration {
		self.ttls
			.get(&storage_key)
			.copied()
			.unwrap_or(Duration::ZERO)
	}
}

fn sanitize(component: &str) -> String {
	component.replace(['/', '\\', ':', '.'], "_")
}

fn backend_err(e: impl std::fmt::Display) -> StorageError {
	StorageError::Backend(e.to_string())
}

/// File-based storage implementation.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
	/// TTL configuration for different namespaces.
	ttl_config: TtlConfig,
	/// Serializes writers so a batch's checks and writes are not interleaved.
	write_lock: Mutex<()>,
	/// Held for the lifetime of the backend; dropping it releases the lock.
	_dir_lock: std::fs::File,
}

impl FileStorage {
	/// Opens (creating if needed) a storage directory and takes its
	/// exclusive lock.
	pub fn open(base_path: PathBuf, ttl_config: TtlConfig) -> Result<Self, StorageError> {
		std::fs::create_dir_all(&base_path).map_err(backend_err)?;

		let lock_file = std::fs::OpenOptions::new()
			.create(true)
			.truncate(false)
			.write(true)
			.open(base_path.join(LOCK_FILE))
			.map_err(backend_err)?;
		FileExt::try_lock_exclusive(&lock_file).map_err(|e| {
			StorageError::Backend(format!(
				"Storage directory {} is locked by another process: {}",
				base_path.display(),
				e
			))
		})?;

		Ok(Self {
			base_path,
			ttl_config,
			write_lock: Mutex::new(()),
			_dir_lock: lock_file,
		})
	}

	/// Maps `namespace:id` to `<base>/<namespace>/<id>.bin`.
	fn get_file_path(&self, key: &str) -> PathBuf {
		let (namespace, id) = key.split_once(':').unwrap_or(("_", key));
		self.base_path
			.join(sanitize(namespace))
			.join(format!("{}.bin", sanitize(id)))
	}

	fn journal_path(&self) -> PathBuf {
		self.base_path.join(JOURNAL_FILE)
	}

	/// Gets the TTL for a given key based on its namespace.
	fn get_ttl_for_key(&self, key: &str) -> Duration {
		let namespace = key.split(':').next().unwrap_or("");
		namespace
			.parse::<StorageKey>()
			.map(|sk| self.ttl_config.get_ttl(sk))
			.unwrap_or(Duration::ZERO)
	}

	/// Reads the payload of a record, treating expired records as absent.
	async fn read_payload(&self, path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
		let data = match fs::read(path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(backend_err(e)),
		};

		match FileHeader::deserialize(&data) {
			Ok(header) if header.is_expired() => Ok(None),
			Ok(_) => Ok(Some(data[FileHeader::SIZE..].to_vec())),
			// Files written without a header are returned as-is
			Err(_) => Ok(Some(data)),
		}
	}

	async fn write_payload(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), StorageError> {
		let path = self.get_file_path(key);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).await.map_err(backend_err)?;
		}

		let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
		file_data.extend_from_slice(&FileHeader::new(ttl).serialize());
		file_data.extend_from_slice(value);

		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, file_data).await.map_err(backend_err)?;
		fs::rename(&temp_path, &path).await.map_err(backend_err)
	}

	async fn remove_payload(&self, key: &str) -> Result<(), StorageError> {
		match fs::remove_file(self.get_file_path(key)).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(backend_err(e)),
		}
	}

	async fn apply(&self, batch: &[BatchEntry]) -> Result<(), StorageError> {
		for entry in batch {
			match &entry.value {
				Some(value) => {
					self.write_payload(&entry.key, value, self.get_ttl_for_key(&entry.key))
						.await?
				},
				None => self.remove_payload(&entry.key).await?,
			}
		}
		Ok(())
	}

	/// Applies and clears a leftover journal. Caller must hold the write lock.
	async fn replay_journal(&self) -> Result<usize, StorageError> {
		let journal = match fs::read(self.journal_path()).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
			Err(e) => return Err(backend_err(e)),
		};

		let batch: Vec<BatchEntry> = serde_json::from_slice(&journal)
			.map_err(|e| StorageError::Serialization(format!("Corrupt journal: {}", e)))?;

		tracing::warn!(entries = batch.len(), "Replaying interrupted storage batch");
		self.apply(&batch).await?;
		fs::remove_file(self.journal_path())
			.await
			.map_err(backend_err)?;
		Ok(batch.len())
	}

	async fn write_journal(&self, batch: &[BatchEntry]) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(batch).map_err(|e| StorageError::Serialization(e.to_string()))?;
		let temp_path = self.journal_path().with_extension("tmp");
		fs::write(&temp_path, bytes).await.map_err(backend_err)?;
		fs::rename(&temp_path, self.journal_path())
			.await
			.map_err(backend_err)
	}

	async fn namespace_dirs(&self) -> Result<Vec<PathBuf>, StorageError> {
		let mut dirs = Vec::new();
		let mut entries = fs::read_dir(&self.base_path).await.map_err(backend_err)?;
		while let Some(entry) = entries.next_entry().await.map_err(backend_err)? {
			if entry.file_type().await.map_err(backend_err)?.is_dir() {
				dirs.push(entry.path());
			}
		}
		Ok(dirs)
	}

	/// Removes all expired files from storage.
	async fn cleanup_expired_files(&self) -> Result<usize, StorageError> {
		let _guard = self.write_lock.lock().await;
		let mut removed = 0;

		for dir in self.namespace_dirs().await? {
			let mut entries = fs::read_dir(&dir).await.map_err(backend_err)?;
			while let Some(entry) = entries.next_entry().await.map_err(backend_err)? {
				let path = entry.path();
				if path.extension() != Some(std::ffi::OsStr::new("bin")) {
					continue;
				}
				let data = match fs::read(&path).await {
					Ok(data) => data,
					Err(e) => {
						tracing::debug!("Skipping file {:?}: could not be read: {}", path, e);
						continue;
					},
				};
				if let Ok(header) = FileHeader::deserialize(&data) {
					if header.is_expired() {
						match fs::remove_file(&path).await {
							Ok(_) => removed += 1,
							Err(e) => {
								tracing::warn!("Failed to remove expired file {:?}: {}", path, e)
							},
						}
					}
				}
			}
		}
		Ok(removed)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.read_payload(&self.get_file_path(key))
			.await?
			.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let _guard = self.write_lock.lock().await;
		let ttl = ttl.unwrap_or_else(|| self.get_ttl_for_key(key));
		self.write_payload(key, &value, ttl).await
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let _guard = self.write_lock.lock().await;
		self.remove_payload(key).await
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(self
			.read_payload(&self.get_file_path(key))
			.await?
			.is_some())
	}

	async fn commit(&self, batch: Vec<BatchEntry>) -> Result<(), StorageError> {
		let _guard = self.write_lock.lock().await;
		self.replay_journal().await?;

		for entry in &batch {
			let current = self.read_payload(&self.get_file_path(&entry.key)).await?;
			if !entry.precondition.holds(current.as_deref()) {
				return Err(StorageError::Conflict(entry.key.clone()));
			}
		}

		self.write_journal(&batch).await?;
		self.apply(&batch).await?;
		fs::remove_file(self.journal_path())
			.await
			.map_err(backend_err)
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let (namespace, id_prefix) = prefix.split_once(':').unwrap_or((prefix, ""));
		let dir = self.base_path.join(sanitize(namespace));

		let mut entries = match fs::read_dir(&dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(backend_err(e)),
		};

		let mut keys = Vec::new();
		while let Some(entry) = entries.next_entry().await.map_err(backend_err)? {
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("bin")) {
				continue;
			}
			let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
				continue;
			};
			if id.starts_with(id_prefix) && self.read_payload(&path).await?.is_some() {
				keys.push(format!("{}:{}", namespace, id));
			}
		}
		Ok(keys)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.cleanup_expired_files().await
	}

	async fn recover(&self) -> Result<usize, StorageError> {
		let _guard = self.write_lock.lock().await;
		self.replay_journal().await
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let mut optional_fields = vec![Field::new("storage_path", FieldType::String)
			.with_validator(|v| match v.as_str() {
				Some(s) if s.trim().is_empty() => Err("must not be empty".into()),
				_ => Ok(()),
			})];

		for storage_key in StorageKey::all() {
			optional_fields.push(Field::new(
				format!("ttl_{}", storage_key.as_str()),
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			));
		}

		Schema::new(vec![], optional_fields).validate(config)
	}
}

/// Factory function to create a storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for file storage (default: "./data/storage")
/// - `ttl_<namespace>`: TTL in seconds for a namespace, e.g. `ttl_carts` (default: 0, never)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage")
		.to_string();

	Ok(Box::new(FileStorage::open(
		PathBuf::from(storage_path),
		TtlConfig::from_config(config),
	)?))
}

/// Registry for the file backend.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
