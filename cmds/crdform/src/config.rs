//! Provider configuration.
//!
//! Settings come from a `.crdform.yaml` file, found by searching from the
//! working directory upward to the filesystem root, and from command line flags,
//! which take precedence.

use std::{
	fs,
	path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::k8s::{apply::ApplyDefaults, client::ConnectionSettings};

/// The name of the config file crdform looks for
pub const CONFIG_FILE_NAME: &str = ".crdform.yaml";

/// Root configuration structure for .crdform.yaml
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
	/// Path to a kubeconfig file; the default kubeconfig or in-cluster
	/// configuration is used when unset.
	#[serde(default)]
	pub kubeconfig: Option<PathBuf>,

	/// Kubeconfig context; the current context is used when unset.
	#[serde(default)]
	pub context: Option<String>,

	#[serde(default)]
	pub field_manager: Option<String>,

	#[serde(default)]
	pub force_conflicts: Option<bool>,

	/// Never connect to a cluster; only manifest rendering is available.
	#[serde(default)]
	pub offline: bool,

	/// Extra catalog files. Relative paths are resolved against the directory
	/// of the config file.
	#[serde(default)]
	pub catalogs: Vec<PathBuf>,
}

impl ProviderConfig {
	/// Load config by searching from the given directory upward
	pub fn load_from_directory(start_dir: &Path) -> Result<Option<Self>> {
		if let Some(config_path) = find_config_file(start_dir) {
			let config = Self::load_from_file(&config_path)?;
			Ok(Some(config))
		} else {
			Ok(None)
		}
	}

	/// Load config from a specific file path
	pub fn load_from_file(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.with_context(|| format!("failed to read config file: {}", path.display()))?;
		let mut config: ProviderConfig = serde_yaml_with_quirks::from_str(&content)
			.with_context(|| format!("failed to parse config file: {}", path.display()))?;

		if let Some(base) = path.parent() {
			config.kubeconfig = config.kubeconfig.map(|p| base.join(p));
			config.catalogs = config.catalogs.into_iter().map(|p| base.join(p)).collect();
		}
		Ok(config)
	}

	/// Merge `overrides` over this config: set values win, `offline` is sticky
	/// and catalogs accumulate.
	pub fn merge_from(&mut self, overrides: ProviderConfig) {
		if overrides.kubeconfig.is_some() {
			self.kubeconfig = overrides.kubeconfig;
		}
		if overrides.context.is_some() {
			self.context = overrides.context;
		}
		if overrides.field_manager.is_some() {
			self.field_manager = overrides.field_manager;
		}
		if overrides.force_conflicts.is_some() {
			self.force_conflicts = overrides.force_conflicts;
		}
		self.offline |= overrides.offline;
		self.catalogs.extend(overrides.catalogs);
	}

	pub fn apply_defaults(&self) -> ApplyDefaults {
		let defaults = ApplyDefaults::default();
		ApplyDefaults {
			field_manager: self
				.field_manager
				.clone()
				.filter(|m| !m.is_empty())
				.unwrap_or(defaults.field_manager),
			force_conflicts: self.force_conflicts.unwrap_or(defaults.force_conflicts),
		}
	}

	pub fn connection_settings(&self) -> ConnectionSettings {
		ConnectionSettings {
			kubeconfig: self.kubeconfig.clone(),
			context: self.context.clone(),
		}
	}
}

/// Search for a config file starting from `start_dir` and walking up to the filesystem root
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
	let mut current = start_dir.to_path_buf();

	if let Ok(canonical) = current.canonicalize() {
		current = canonical;
	}

	loop {
		let config_path = current.join(CONFIG_FILE_NAME);
		if config_path.exists() {
			return Some(config_path);
		}

		match current.parent() {
			Some(parent) if parent != current => current = parent.to_path_buf(),
			_ => return None,
		}
	}
}

#[cfg(test)]
mod tests {
	use indoc::indoc;
	use tempfile::TempDir;

	use super::*;

	#[test]
	fn test_find_config_in_parent_dir() {
		let temp = TempDir::new().unwrap();
		let config_path = temp.path().join(CONFIG_FILE_NAME);
		fs::write(&config_path, "offline: true").unwrap();

		let subdir = temp.path().join("envs").join("prod");
		fs::create_dir_all(&subdir).unwrap();

		let found = find_config_file(&subdir);
		// Compare file names only to avoid canonicalization issues on macOS
		assert_eq!(found.unwrap().file_name(), config_path.file_name());
	}

	#[test]
	fn test_no_config_found() {
		let temp = TempDir::new().unwrap();
		assert!(ProviderConfig::load_from_directory(temp.path())
			.unwrap()
			.is_none());
	}

	#[test]
	fn test_load_config_resolves_relative_paths() {
		let temp = TempDir::new().unwrap();
		let config_path = temp.path().join(CONFIG_FILE_NAME);
		fs::write(
			&config_path,
			indoc! {"
				kubeconfig: kube/config
				context: staging
				fieldManager: platform
				forceConflicts: true
				catalogs:
				  - catalogs/monitoring.yaml
			"},
		)
		.unwrap();

		let config = ProviderConfig::load_from_file(&config_path).unwrap();
		assert_eq!(config.kubeconfig, Some(temp.path().join("kube/config")));
		assert_eq!(config.context.as_deref(), Some("staging"));
		assert_eq!(
			config.catalogs,
			vec![temp.path().join("catalogs/monitoring.yaml")]
		);
		assert_eq!(
			config.apply_defaults(),
			ApplyDefaults {
				field_manager: "platform".into(),
				force_conflicts: true,
			}
		);
	}

	#[test]
	fn test_load_config_empty_object() {
		let temp = TempDir::new().unwrap();
		let config_path = temp.path().join(CONFIG_FILE_NAME);
		fs::write(&config_path, "{}").unwrap();

		let config = ProviderConfig::load_from_file(&config_path).unwrap();
		assert_eq!(config, ProviderConfig::default());
		assert_eq!(config.apply_defaults(), ApplyDefaults::default());
	}

	#[test]
	fn test_load_config_rejects_bad_yaml() {
		let temp = TempDir::new().unwrap();
		let config_path = temp.path().join(CONFIG_FILE_NAME);
		fs::write(&config_path, "offline: [").unwrap();

		let err = ProviderConfig::load_from_file(&config_path).unwrap_err();
		assert!(err.to_string().starts_with("failed to parse config file"));
	}

	#[test]
	fn test_flags_override_file() {
		let mut config = ProviderConfig {
			context: Some("staging".into()),
			field_manager: Some("platform".into()),
			catalogs: vec!["a.yaml".into()],
			..Default::default()
		};
		config.merge_from(ProviderConfig {
			context: Some("prod".into()),
			offline: true,
			catalogs: vec!["b.yaml".into()],
			..Default::default()
		});

		assert_eq!(config.context.as_deref(), Some("prod"));
		assert_eq!(config.field_manager.as_deref(), Some("platform"));
		assert!(config.offline);
		assert_eq!(config.catalogs, vec![PathBuf::from("a.yaml"), PathBuf::from("b.yaml")]);
	}
}
