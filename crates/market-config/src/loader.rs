//! Loader for configurations split across several files.
//!
//! The entry file may list other files under `include`, either as a single
//! string or an array. Included files are read relative to the entry file's
//! directory and their top-level sections are merged in. A section may only
//! be defined once across the whole set, and a file may only be read once.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

const INCLUDE_KEY: &str = "include";

pub(crate) struct IncludeLoader {
	root: PathBuf,
	seen: HashSet<PathBuf>,
	owners: HashMap<String, PathBuf>,
}

impl IncludeLoader {
	pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			seen: HashSet::new(),
			owners: HashMap::new(),
		}
	}

	/// Reads the entry file plus its includes and builds the validated config.
	pub(crate) async fn load(mut self, entry: impl AsRef<Path>) -> Result<Config, ConfigError> {
		let entry = self.locate(entry.as_ref())?;
		let mut merged = self.read_table(&entry).await?;

		let includes = match merged.remove(INCLUDE_KEY) {
			Some(value) => include_list(value)?,
			None => Vec::new(),
		};
		self.claim_sections(&merged, &entry)?;

		for include in includes {
			let path = self.locate(&include)?;
			let mut table = self.read_table(&path).await?;
			if table.remove(INCLUDE_KEY).is_some() {
				return Err(ConfigError::Validation(format!(
					"Nested includes are not supported ({})",
					path.display()
				)));
			}
			self.claim_sections(&table, &path)?;
			merged.extend(table);
		}

		Config::from_table(merged)
	}

	async fn read_table(&mut self, path: &Path) -> Result<toml::Table, ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await?;
		if !self.seen.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Configuration file {} is included more than once",
				canonical.display()
			)));
		}

		let raw = tokio::fs::read_to_string(&canonical).await?;
		Ok(toml::from_str(&resolve_env_vars(&raw)?)?)
	}

	fn claim_sections(&mut self, table: &toml::Table, source: &Path) -> Result<(), ConfigError> {
		for section in table.keys() {
			if let Some(owner) = self.owners.get(section) {
				return Err(ConfigError::Validation(format!(
					"Section '{}' is defined in both {} and {}",
					section,
					owner.display(),
					source.display()
				)));
			}
			self.owners.insert(section.clone(), source.to_path_buf());
		}
		Ok(())
	}

	fn locate(&self, path: &Path) -> Result<PathBuf, ConfigError> {
		let located = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.root.join(path)
		};
		if located.is_file() {
			Ok(located)
		} else {
			Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", located.display()),
			)))
		}
	}
}

fn include_list(value: toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	let entries = match value {
		toml::Value::String(single) => return Ok(vec![PathBuf::from(single)]),
		toml::Value::Array(entries) => entries,
		_ => {
			return Err(ConfigError::Validation(
				"`include` must be a path or a list of paths".into(),
			))
		},
	};

	entries
		.into_iter()
		.map(|entry| {
			entry.as_str().map(PathBuf::from).ok_or_else(|| {
				ConfigError::Validation("`include` entries must be strings".into())
			})
		})
		.collect()
}
