//! Utilities for command handlers.

use std::{
	fs,
	io::{self, ErrorKind, Read, Write},
	path::{Path, PathBuf},
	sync::Arc,
};

use anyhow::{Context, Result};
use clap::Args;
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Level};

use crate::{
	catalog::Catalog,
	config::ProviderConfig,
	error::ConfigurationError,
	k8s::client::{ClusterConnection, KubeDynamicClient},
	provider::Provider,
};

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
	/// Config file; `.crdform.yaml` is searched upward from the working
	/// directory when unset
	#[arg(long, global = true)]
	pub config: Option<PathBuf>,

	/// Path to the kubeconfig file
	#[arg(long, global = true)]
	pub kubeconfig: Option<PathBuf>,

	/// Kubeconfig context to use
	#[arg(long, global = true)]
	pub context: Option<String>,

	/// Field manager for server-side apply
	#[arg(long, global = true)]
	pub field_manager: Option<String>,

	/// Take ownership of conflicting fields on apply; `--force-conflicts=false`
	/// turns off a value set in the config file
	#[arg(long, global = true, num_args = 0..=1, default_missing_value = "true")]
	pub force_conflicts: Option<bool>,

	/// Never contact a cluster
	#[arg(long, global = true)]
	pub offline: bool,

	/// Log level (trace, debug, info, warn, error); overrides RUST_LOG
	#[arg(long, global = true)]
	pub log_level: Option<Level>,
}

impl GlobalArgs {
	fn overrides(&self) -> ProviderConfig {
		ProviderConfig {
			kubeconfig: self.kubeconfig.clone(),
			context: self.context.clone(),
			field_manager: self.field_manager.clone(),
			force_conflicts: self.force_conflicts,
			offline: self.offline,
			catalogs: Vec::new(),
		}
	}

	/// The config file (explicit or discovered) with flags merged over it.
	pub fn load_config(&self) -> Result<ProviderConfig> {
		let mut config = match &self.config {
			Some(path) => ProviderConfig::load_from_file(path)?,
			None => {
				let cwd = std::env::current_dir().context("getting current directory")?;
				ProviderConfig::load_from_directory(&cwd)?.unwrap_or_default()
			}
		};
		config.merge_from(self.overrides());
		debug!(?config, "loaded configuration");
		Ok(config)
	}
}

/// The built-in catalog plus every catalog file named in the config.
pub fn load_catalog(config: &ProviderConfig) -> Result<Catalog, ConfigurationError> {
	let mut catalog = Catalog::builtin()?;
	for path in &config.catalogs {
		catalog.merge(Catalog::from_file(path)?)?;
	}
	debug!(types = catalog.len(), "catalog loaded");
	Ok(catalog)
}

/// Build the provider, connecting to the cluster unless configured offline.
pub async fn build_provider(
	config: &ProviderConfig,
	cancel: CancellationToken,
) -> Result<Provider<KubeDynamicClient>> {
	let catalog = load_catalog(config)?;
	let defaults = config.apply_defaults();

	let provider = if config.offline {
		debug!("offline mode, not connecting");
		Provider::offline(catalog, defaults)
	} else {
		let connection = ClusterConnection::connect(&config.connection_settings())
			.await
			.map_err(ConfigurationError::Connection)?;
		Provider::new(Arc::new(connection.dynamic_client()), catalog, defaults)
	};
	Ok(provider.with_cancellation(cancel))
}

/// A token cancelled on the first Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
	let token = CancellationToken::new();
	let child = token.clone();
	tokio::spawn(async move {
		match tokio::signal::ctrl_c().await {
			Ok(()) => {
				warn!("interrupted, cancelling");
				child.cancel();
			}
			Err(err) => warn!(error = %err, "cannot listen for Ctrl-C"),
		}
	});
	token
}

/// Read a YAML or JSON document from a file, or from stdin when `path` is `-`.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
	let content = if path == Path::new("-") {
		let mut buf = String::new();
		io::stdin()
			.read_to_string(&mut buf)
			.context("reading stdin")?;
		buf
	} else {
		fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
	};
	serde_yaml_with_quirks::from_str(&content)
		.with_context(|| format!("parsing {}", path.display()))
}

/// Pretty JSON followed by a newline.
pub fn write_json<W: Write, T: Serialize>(mut writer: W, value: &T) -> Result<()> {
	serde_json::to_writer_pretty(&mut writer, value).context("writing output")?;
	writeln!(writer)?;
	writer.flush()?;
	Ok(())
}

/// A writer wrapper that silently handles broken pipe errors.
///
/// When the underlying writer returns a broken pipe error (EPIPE), this wrapper
/// converts it to a successful write, so `crdform types | head -1` exits cleanly.
pub struct BrokenPipeGuard<W> {
	inner: W,
}

impl<W> BrokenPipeGuard<W> {
	pub fn new(inner: W) -> Self {
		Self { inner }
	}
}

impl<W: Write> Write for BrokenPipeGuard<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		match self.inner.write(buf) {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(buf.len()),
			other => other,
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		match self.inner.flush() {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
			other => other,
		}
	}
}

#[cfg(test)]
mod tests {
	use clap::Parser;
	use indoc::indoc;
	use rstest::rstest;
	use tempfile::TempDir;

	use super::*;
	use crate::model::ResourceState;

	struct ClosedPipe;

	impl Write for ClosedPipe {
		fn write(&mut self, _: &[u8]) -> io::Result<usize> {
			Err(io::Error::from(ErrorKind::BrokenPipe))
		}

		fn flush(&mut self) -> io::Result<()> {
			Err(io::Error::from(ErrorKind::BrokenPipe))
		}
	}

	#[test]
	fn test_broken_pipe_is_swallowed() {
		let mut guard = BrokenPipeGuard::new(ClosedPipe);
		assert_eq!(guard.write(b"abc").unwrap(), 3);
		guard.flush().unwrap();
	}

	#[test]
	fn test_flags_override_config_file() {
		let temp = TempDir::new().unwrap();
		let path = temp.path().join("crdform.yaml");
		fs::write(&path, "fieldManager: platform\ncontext: staging\n").unwrap();

		let args = GlobalArgs {
			config: Some(path),
			context: Some("prod".into()),
			force_conflicts: Some(true),
			..Default::default()
		};
		let config = args.load_config().unwrap();
		assert_eq!(config.context.as_deref(), Some("prod"));
		assert_eq!(config.field_manager.as_deref(), Some("platform"));
		assert_eq!(config.force_conflicts, Some(true));
	}

	#[test]
	fn test_unset_force_flag_keeps_file_value() {
		let temp = TempDir::new().unwrap();
		let path = temp.path().join("crdform.yaml");
		fs::write(&path, "forceConflicts: true\n").unwrap();

		let args = GlobalArgs {
			config: Some(path),
			..Default::default()
		};
		assert_eq!(args.load_config().unwrap().force_conflicts, Some(true));
	}

	#[derive(Parser)]
	struct Cli {
		#[command(flatten)]
		global: GlobalArgs,
	}

	#[rstest]
	#[case(&[], None)]
	#[case(&["--force-conflicts"], Some(true))]
	#[case(&["--force-conflicts=true"], Some(true))]
	#[case(&["--force-conflicts=false"], Some(false))]
	fn test_force_conflicts_flag(#[case] flags: &[&str], #[case] expected: Option<bool>) {
		let cli = Cli::try_parse_from(std::iter::once("crdform").chain(flags.iter().copied())).unwrap();
		assert_eq!(cli.global.force_conflicts, expected);
	}

	#[test]
	fn test_force_flag_can_turn_off_file_value() {
		let temp = TempDir::new().unwrap();
		let path = temp.path().join("crdform.yaml");
		fs::write(&path, "forceConflicts: true\n").unwrap();

		let cli = Cli::try_parse_from([
			"crdform",
			"--config",
			path.to_str().unwrap(),
			"--force-conflicts=false",
		])
		.unwrap();
		assert_eq!(cli.global.load_config().unwrap().force_conflicts, Some(false));
	}

	#[test]
	fn test_extra_catalogs_are_merged() {
		let temp = TempDir::new().unwrap();
		let path = temp.path().join("widgets.yaml");
		fs::write(
			&path,
			indoc! {"
				types:
				  - group: example.com
				    version: v1
				    kind: Widget
				    plural: widgets
				    namespaced: true
			"},
		)
		.unwrap();

		let config = ProviderConfig {
			catalogs: vec![path],
			..Default::default()
		};
		let catalog = load_catalog(&config).unwrap();
		assert_eq!(catalog.len(), Catalog::builtin().unwrap().len() + 1);
		assert!(catalog.lookup("k8s_example_com_widget_v1").is_ok());
	}

	#[test]
	fn test_read_state_document_from_json() {
		let temp = TempDir::new().unwrap();
		let path = temp.path().join("state.json");
		fs::write(
			&path,
			r#"{"apiVersion": "example.com/v1", "kind": "Widget", "metadata": {"name": "w1"}, "fieldManager": "team-a"}"#,
		)
		.unwrap();

		let state: ResourceState = read_document(&path).unwrap();
		assert_eq!(state.model.metadata.name, "w1");
		assert_eq!(state.field_manager.as_deref(), Some("team-a"));
	}

	#[test]
	fn test_write_json_ends_with_newline() {
		let mut out = Vec::new();
		write_json(&mut out, &serde_json::json!({"a": 1})).unwrap();
		assert_eq!(String::from_utf8(out).unwrap(), "{\n  \"a\": 1\n}\n");
	}
}
