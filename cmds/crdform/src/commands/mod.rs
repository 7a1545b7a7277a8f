//! Command line handlers.

use crate::error::{error_chain, ConfigurationError, Diagnostic, OperationError};

pub mod apply;
pub mod delete;
pub mod import;
pub mod manifest;
pub mod read;
pub mod refresh;
pub mod schema;
pub mod types;
pub mod util;
pub mod wait;

/// The diagnostic to print for a failed command.
///
/// Provider errors anywhere in the chain get their own diagnostic; anything
/// else is reported with its full chain.
pub fn report(err: &anyhow::Error) -> Diagnostic {
	for cause in err.chain() {
		if let Some(op) = cause.downcast_ref::<OperationError>() {
			return op.into();
		}
		if let Some(config) = cause.downcast_ref::<ConfigurationError>() {
			return config.into();
		}
	}
	Diagnostic::error("Command failed", error_chain(err.as_ref()))
}
