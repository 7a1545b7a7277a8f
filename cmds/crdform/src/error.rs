//! Error taxonomy shared by every resource operation, and its rendering as
//! user-facing diagnostics.

use std::{error::Error as StdError, fmt, path::PathBuf, time::Duration};

use k8s::{schema::SchemaError, schema::Violation, ImportIdError, ResourceIdentity};
use thiserror::Error;

use crate::k8s::client::{ClientError, ConnectionError};

/// Problems with configuration or input, detected before or instead of an API call.
#[derive(Debug, Error)]
pub enum ConfigurationError {
	#[error("{operation} requires a cluster connection, but the provider is in offline mode")]
	Offline { operation: &'static str },

	#[error(transparent)]
	MalformedImportId(#[from] ImportIdError),

	#[error("unknown resource type `{0}`")]
	UnknownType(String),

	#[error("expected {expected}, got {got}")]
	UnexpectedType { expected: String, got: String },

	#[error("invalid identity for {resource_type}: {reason}")]
	InvalidIdentity {
		resource_type: String,
		reason: &'static str,
	},

	#[error("invalid JSONPath expression `{expression}`: {message}")]
	InvalidJsonPath { expression: String, message: String },

	#[error("invalid duration `{value}`")]
	InvalidDuration {
		value: String,
		#[source]
		source: humantime::DurationError,
	},

	#[error("{type_name} does not match its schema:\n{}", format_violations(.violations))]
	SchemaViolations {
		type_name: String,
		violations: Vec<Violation>,
	},

	#[error("resource type `{0}` is defined more than once")]
	DuplicateType(String),

	#[error("parsing catalog {origin}")]
	CatalogParse {
		origin: String,
		#[source]
		source: serde_yaml_with_quirks::Error,
	},

	#[error("reading catalog {}", .path.display())]
	CatalogRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error(transparent)]
	Catalog(#[from] SchemaError),

	#[error("connecting to the cluster")]
	Connection(#[source] ConnectionError),
}

fn format_violations(violations: &[Violation]) -> String {
	violations
		.iter()
		.map(|v| format!("  * {v}"))
		.collect::<Vec<_>>()
		.join("\n")
}

/// Failure of a single resource operation.
///
/// Nothing is retried: each variant is surfaced to the caller as-is.
#[derive(Debug, Error)]
pub enum OperationError {
	#[error("{resource_type} {identity} not found")]
	NotFound {
		resource_type: String,
		identity: ResourceIdentity,
	},

	#[error("applying {resource_type} {identity}")]
	ApplyFailed {
		resource_type: String,
		identity: ResourceIdentity,
		#[source]
		source: ClientError,
	},

	#[error("reading {resource_type} {identity}")]
	FetchFailed {
		resource_type: String,
		identity: ResourceIdentity,
		#[source]
		source: ClientError,
	},

	#[error("deleting {resource_type} {identity}")]
	DeleteFailed {
		resource_type: String,
		identity: ResourceIdentity,
		#[source]
		source: ClientError,
	},

	#[error("serializing {resource_type}")]
	MarshalFailed {
		resource_type: String,
		#[source]
		source: Box<dyn StdError + Send + Sync>,
	},

	#[error("decoding {resource_type} returned by the server")]
	UnmarshalFailed {
		resource_type: String,
		#[source]
		source: serde_json::Error,
	},

	#[error(
		"timed out after {} waiting for {what} on {resource_type} {identity}",
		humantime::format_duration(*.timeout)
	)]
	WaitTimeoutExceeded {
		resource_type: String,
		identity: ResourceIdentity,
		what: String,
		timeout: Duration,
	},

	#[error("{what} is not satisfied on {resource_type} {identity}")]
	WaitConditionUnmet {
		resource_type: String,
		identity: ResourceIdentity,
		what: String,
	},

	#[error("cancelled while waiting for {what} on {resource_type} {identity}")]
	Cancelled {
		resource_type: String,
		identity: ResourceIdentity,
		what: String,
	},

	#[error(transparent)]
	Configuration(#[from] ConfigurationError),
}

impl OperationError {
	pub fn is_not_found(&self) -> bool {
		matches!(self, OperationError::NotFound { .. })
	}
}

/// A user-facing report of a failed operation: what went wrong, what was being
/// attempted, and the raw error from the layer below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
	pub summary: String,
	pub detail: String,
}

const REPORT_BUG: &str = "Please report this issue to the provider developers.";

impl Diagnostic {
	pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
		Self {
			summary: summary.into(),
			detail: detail.into(),
		}
	}
}

impl From<&OperationError> for Diagnostic {
	fn from(err: &OperationError) -> Self {
		use OperationError::*;

		let raw = error_chain(err);
		match err {
			NotFound {
				resource_type,
				identity,
			} => Diagnostic::error(
				"Resource not found",
				format!("{resource_type} {identity} does not exist in the cluster."),
			),
			ApplyFailed {
				resource_type,
				identity,
				..
			} => Diagnostic::error(
				"Unable to apply resource",
				format!(
					"An unexpected error occurred while applying {resource_type} {identity} \
					 with server-side apply. Please check the raw error below.\n\nError: {raw}"
				),
			),
			FetchFailed {
				resource_type,
				identity,
				..
			} => Diagnostic::error(
				"Unable to read resource",
				format!(
					"An unexpected error occurred while reading {resource_type} {identity}. \
					 Please check the raw error below.\n\nError: {raw}"
				),
			),
			DeleteFailed {
				resource_type,
				identity,
				..
			} => Diagnostic::error(
				"Unable to delete resource",
				format!(
					"An unexpected error occurred while deleting {resource_type} {identity}. \
					 Please check the raw error below.\n\nError: {raw}"
				),
			),
			MarshalFailed { .. } => Diagnostic::error(
				"Unable to marshal resource",
				format!("The resource could not be converted to JSON.\n\nError: {raw}\n\n{REPORT_BUG}"),
			),
			UnmarshalFailed { .. } => Diagnostic::error(
				"Unable to unmarshal resource",
				format!(
					"The object returned by the API server could not be decoded.\n\nError: {raw}"
				),
			),
			WaitTimeoutExceeded { .. } => Diagnostic::error("Timed out waiting for resource", raw),
			WaitConditionUnmet { .. } => Diagnostic::error("Wait condition not met", raw),
			Cancelled { .. } => Diagnostic::error("Operation cancelled", raw),
			Configuration(config) => config.into(),
		}
	}
}

impl From<&ConfigurationError> for Diagnostic {
	fn from(err: &ConfigurationError) -> Self {
		use ConfigurationError::*;

		let raw = error_chain(err);
		match err {
			Offline { .. } => Diagnostic::error(
				"Provider in offline mode",
				format!("{raw}. Disable offline mode or use a manifest data source instead."),
			),
			MalformedImportId(_) => Diagnostic::error("Unexpected import identifier", raw),
			UnknownType(_) => Diagnostic::error("Unknown resource type", raw),
			UnexpectedType { .. } => Diagnostic::error(
				"Unexpected configuration type",
				format!("{raw}. {REPORT_BUG}"),
			),
			SchemaViolations { .. } => Diagnostic::error("Invalid resource configuration", raw),
			Connection(_) => Diagnostic::error("Unable to connect to the cluster", raw),
			_ => Diagnostic::error("Invalid configuration", raw),
		}
	}
}

impl fmt::Display for Diagnostic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Error: {}\n\n{}", self.summary, self.detail)
	}
}

/// Join an error and all of its sources with `: `.
pub fn error_chain(err: &dyn StdError) -> String {
	let mut parts = vec![err.to_string()];
	let mut source = err.source();
	while let Some(cause) = source {
		parts.push(cause.to_string());
		source = cause.source();
	}
	parts.join(": ")
}
