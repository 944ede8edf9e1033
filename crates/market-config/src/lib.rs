//! Configuration for the marketplace backend.
//!
//! A configuration is a TOML document with four sections: `service`,
//! `storage`, `orders` and the optional `api`. It can be split across files
//! with a top-level `include` (see [`Config::from_file`]), and string values
//! may reference environment variables as `${VAR}` or `${VAR:-default}`.
//! Parsing always ends with [`Config::validate`].

#[cfg(any(test, feature = "testing"))]
pub mod builders;
mod loader;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// The default rendering echoes the whole input back.
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub service: ServiceConfig,
	pub storage: StorageConfig,
	#[serde(default)]
	pub orders: OrdersConfig,
	pub api: Option<ApiConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Instance identifier, used in logs.
	pub id: String,
}

/// Storage backend selection.
///
/// Every entry in `implementations` is instantiated at startup; the one named
/// by `primary` backs the engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	pub primary: String,
	pub implementations: HashMap<String, toml::Value>,
	/// Seconds between sweeps of expired records.
	#[serde(default = "default_cleanup_interval_seconds")]
	pub cleanup_interval_seconds: u64,
}

/// Order lifecycle policies.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OrdersConfig {
	/// Return reserved units to stock when an owner rejects an order.
	#[serde(default)]
	pub restock_on_reject: bool,
}

/// HTTP API server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Upper bound on request bodies, in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// Permissive CORS when absent.
	pub cors: Option<CorsConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	pub allowed_origins: Vec<String>,
}

fn default_cleanup_interval_seconds() -> u64 {
	3600
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	1024 * 1024
}

const MAX_CONFIG_BYTES: usize = 1024 * 1024;

/// Substitutes `${VAR}` and `${VAR:-default}` references.
///
/// A reference to an unset variable without a default is an error. Inputs
/// above 1MB are refused before the pattern runs.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	if input.len() > MAX_CONFIG_BYTES {
		return Err(ConfigError::Validation(format!(
			"Configuration is {} bytes, the limit is {}",
			input.len(),
			MAX_CONFIG_BYTES
		)));
	}

	let pattern = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Invalid variable pattern: {}", e)))?;

	let mut missing = None;
	let resolved = pattern.replace_all(input, |caps: &Captures| {
		let name = &caps[1];
		match (std::env::var(name), caps.get(2)) {
			(Ok(value), _) => value,
			(Err(_), Some(default)) => default.as_str().to_string(),
			(Err(_), None) => {
				missing.get_or_insert_with(|| name.to_string());
				String::new()
			},
		}
	});

	match missing {
		Some(name) => Err(ConfigError::Validation(format!(
			"Environment variable '{}' not found",
			name
		))),
		None => Ok(resolved.into_owned()),
	}
}

impl Config {
	/// Loads a configuration file together with the files it includes.
	///
	/// Includes are resolved relative to the file's directory.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path = Path::new(path);
		let dir = match path.parent() {
			Some(parent) if !parent.as_os_str().is_empty() => parent,
			_ => Path::new("."),
		};
		let file_name = path
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path.display())))?;
		loader::IncludeLoader::new(dir).load(file_name).await
	}

	/// Deserializes and validates an already env-resolved TOML table.
	pub(crate) fn from_table(table: toml::Table) -> Result<Self, ConfigError> {
		let config: Config = toml::Value::Table(table).try_into()?;
		config.validate()?;
		Ok(config)
	}

	/// Checks the constraints serde cannot express.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let invalid = |msg: String| Err(ConfigError::Validation(msg));

		if self.service.id.trim().is_empty() {
			return invalid("service.id cannot be empty".into());
		}
		if !self.storage.implementations.contains_key(&self.storage.primary) {
			return invalid(format!(
				"Primary storage '{}' is not among the configured implementations",
				self.storage.primary
			));
		}
		if self.storage.cleanup_interval_seconds == 0 {
			return invalid("storage.cleanup_interval_seconds must be greater than zero".into());
		}
		if let Some(api) = &self.api {
			if api.enabled && api.port == 0 {
				return invalid("api.port cannot be 0 when the API is enabled".into());
			}
			if api.timeout_seconds == 0 {
				return invalid("api.timeout_seconds must be greater than zero".into());
			}
			if api.max_request_size == 0 {
				return invalid("api.max_request_size must be greater than zero".into());
			}
		}
		Ok(())
	}
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let table: toml::Table = toml::from_str(&resolve_env_vars(s)?)?;
		if table.contains_key("include") {
			return Err(ConfigError::Validation(
				"`include` is only supported when loading from a file".into(),
			));
		}
		Self::from_table(table)
	}
}
