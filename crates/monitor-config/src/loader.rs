//! Multi-file configuration loading.
//!
//! A file may pull in others through `include`, given as one path or a list
//! of paths relative to the including file's directory. Included files may
//! include further files. Top-level sections from every file are merged into
//! one document, and a section defined by two files is rejected rather than
//! silently overridden.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use toml::Table;

/// Loads a configuration file together with its includes.
pub struct ConfigLoader {
	base_path: PathBuf,
	/// Canonical paths of files already read
	visited: HashSet<PathBuf>,
	/// Top-level section name to the file that defined it
	origins: HashMap<String, PathBuf>,
	merged: Table,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			visited: HashSet::new(),
			origins: HashMap::new(),
			merged: Table::new(),
		}
	}

	/// Loads `config_path` and everything it includes, then parses and
	/// validates the merged document.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let root = existing(self.base_path.join(config_path))?;
		self.merge_file(root).await?;

		// Environment references were resolved per file while merging
		let config: Config = toml::Value::Table(std::mem::take(&mut self.merged)).try_into()?;
		config.validate()?;
		Ok(config)
	}

	/// Reads one file, merges its sections, then follows its includes
	/// depth first.
	async fn merge_file(&mut self, path: PathBuf) -> Result<(), ConfigError> {
		let mut pending = vec![path];

		while let Some(path) = pending.pop() {
			let canonical = tokio::fs::canonicalize(&path).await.map_err(|e| {
				ConfigError::Io(std::io::Error::new(
					e.kind(),
					format!("Cannot resolve path {}: {}", path.display(), e),
				))
			})?;
			if !self.visited.insert(canonical.clone()) {
				return Err(ConfigError::Validation(format!(
					"Circular include detected: {} was already loaded",
					canonical.display()
				)));
			}

			let raw = tokio::fs::read_to_string(&canonical).await?;
			let mut table: Table = toml::from_str(&resolve_env_vars(&raw)?)?;

			let includes = match table.remove("include") {
				Some(value) => include_list(value)?,
				None => Vec::new(),
			};
			let dir = canonical.parent().unwrap_or(Path::new(".")).to_path_buf();

			for (section, value) in table {
				if let Some(first) = self.origins.get(&section) {
					return Err(ConfigError::Validation(format!(
						"Duplicate section '{}' found in {} and {}. \
						Each top-level section must be unique across all configuration files.",
						section,
						first.display(),
						canonical.display()
					)));
				}
				self.origins.insert(section.clone(), canonical.clone());
				self.merged.insert(section, value);
			}

			// Reversed so includes are processed in the order they are listed
			for include in includes.into_iter().rev() {
				pending.push(existing(dir.join(include))?);
			}
		}

		Ok(())
	}
}

fn existing(path: PathBuf) -> Result<PathBuf, ConfigError> {
	if path.exists() {
		Ok(path)
	} else {
		Err(ConfigError::Io(std::io::Error::new(
			std::io::ErrorKind::NotFound,
			format!("Configuration file not found: {}", path.display()),
		)))
	}
}

/// Reads `include` as either a single path or an array of paths.
fn include_list(value: toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
	match value {
		toml::Value::String(path) => Ok(vec![PathBuf::from(path)]),
		toml::Value::Array(items) => items
			.into_iter()
			.map(|item| match item {
				toml::Value::String(path) => Ok(PathBuf::from(path)),
				_ => Err(ConfigError::Validation(
					"Include array must contain only strings".into(),
				)),
			})
			.collect(),
		_ => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}
