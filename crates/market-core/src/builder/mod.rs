//! Builder pattern for constructing the marketplace engine.
//!
//! Storage backends are pluggable: the builder receives a map of factory
//! functions keyed by implementation name, instantiates every configured
//! implementation and keeps the primary one.

use crate::engine::MarketEngine;
use market_config::Config;
use market_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
}

/// Container for the factory functions needed to build a MarketEngine.
pub struct MarketFactories<SF> {
	pub storage_factories: HashMap<String, SF>,
}

/// Builder for constructing a MarketEngine with pluggable storage.
pub struct MarketBuilder {
	config: Config,
}

impl MarketBuilder {
	/// Creates a new MarketBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the MarketEngine using the given storage factories.
	pub fn build<SF>(self, factories: MarketFactories<SF>) -> Result<MarketEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			let Some(factory) = factories.storage_factories.get(name) else {
				tracing::warn!(component = "storage", implementation = %name, "Unknown implementation, skipping");
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					storage_impls.insert(name.clone(), implementation);
					let is_primary = &self.config.storage.primary == name;
					tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
				},
				Err(e) => {
					tracing::error!(
						component = "storage",
						implementation = %name,
						error = %e,
						"Failed to create storage implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create storage implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		let primary = &self.config.storage.primary;
		let backend = storage_impls.remove(primary).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' failed to load or has invalid configuration",
				primary
			))
		})?;

		let storage = Arc::new(StorageService::new(backend));
		Ok(MarketEngine::new(self.config, storage))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use market_config::builders::ConfigBuilder;
	use market_storage::implementations::{file, memory};
	use market_storage::StorageFactory;

	fn factories() -> MarketFactories<StorageFactory> {
		MarketFactories {
			storage_factories: HashMap::from([
				("memory".to_string(), memory::create_storage as StorageFactory),
				("file".to_string(), file::create_storage as StorageFactory),
			]),
		}
	}

	#[tokio::test]
	async fn test_build_with_memory_storage() {
		let engine = MarketBuilder::new(ConfigBuilder::new().build())
			.build(factories())
			.unwrap();
		let user = engine.create_user("customer").await.unwrap();
		assert_eq!(engine.get_user(&user.user_id).await.unwrap(), user);
	}

	#[tokio::test]
	async fn test_build_with_file_storage() {
		let dir = tempfile::tempdir().unwrap();
		let mut table = toml::Table::new();
		table.insert(
			"storage_path".into(),
			toml::Value::String(dir.path().to_string_lossy().into_owned()),
		);
		let config = ConfigBuilder::new()
			.storage("file", toml::Value::Table(table))
			.build();

		let engine = MarketBuilder::new(config).build(factories()).unwrap();
		engine.initialize().await.unwrap();
		let user = engine.create_user("rider").await.unwrap();
		assert_eq!(engine.get_user(&user.user_id).await.unwrap(), user);
	}

	#[test]
	fn test_missing_primary_factory_fails() {
		let config = ConfigBuilder::new()
			.storage("redis", toml::Value::Table(toml::Table::new()))
			.build();
		assert!(matches!(
			MarketBuilder::new(config).build(factories()),
			Err(BuilderError::Config(_))
		));
	}

	#[test]
	fn test_invalid_storage_config_fails() {
		let mut table = toml::Table::new();
		table.insert("storage_path".into(), toml::Value::String(String::new()));
		let config = ConfigBuilder::new()
			.storage("file", toml::Value::Table(table))
			.build();
		assert!(MarketBuilder::new(config).build(factories()).is_err());
	}
}
