//! Server-side apply of a single custom resource.

use k8s::ResourceType;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::client::Applyable;
use crate::{error::OperationError, model::ResourceModel};

/// Field manager used when neither the resource nor the provider names one.
pub const DEFAULT_FIELD_MANAGER: &str = "crdform";

/// Provider-wide apply settings, used where a resource leaves them unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyDefaults {
	pub field_manager: String,
	pub force_conflicts: bool,
}

impl Default for ApplyDefaults {
	fn default() -> Self {
		Self {
			field_manager: DEFAULT_FIELD_MANAGER.to_string(),
			force_conflicts: false,
		}
	}
}

/// Per-resource apply settings; `None` (or an empty field manager) falls back
/// to the provider defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOptions {
	pub field_manager: Option<String>,
	pub force_conflicts: Option<bool>,
}

/// Apply settings with every default filled in, as sent with a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedApplyOptions {
	pub field_manager: String,
	pub force_conflicts: bool,
}

impl ApplyOptions {
	pub fn resolve(&self, defaults: &ApplyDefaults) -> ResolvedApplyOptions {
		ResolvedApplyOptions {
			field_manager: self
				.field_manager
				.as_deref()
				.filter(|m| !m.is_empty())
				.unwrap_or(&defaults.field_manager)
				.to_string(),
			force_conflicts: self.force_conflicts.unwrap_or(defaults.force_conflicts),
		}
	}
}

/// Creates or updates objects of one type with server-side apply.
///
/// Exactly one patch is sent per call. Conflicts and validation failures are
/// returned as [`OperationError::ApplyFailed`] and never retried.
pub struct ApplyCoordinator<'a, C: ?Sized> {
	client: &'a C,
	resource_type: &'a ResourceType,
	defaults: &'a ApplyDefaults,
}

impl<'a, C: Applyable + ?Sized> ApplyCoordinator<'a, C> {
	pub fn new(client: &'a C, resource_type: &'a ResourceType, defaults: &'a ApplyDefaults) -> Self {
		Self {
			client,
			resource_type,
			defaults,
		}
	}

	/// Apply `model` and return the object as stored by the server.
	#[instrument(skip_all, fields(
		resource_type = %self.resource_type,
		name = %model.metadata.name,
	))]
	pub async fn apply(
		&self,
		model: &ResourceModel,
		options: &ApplyOptions,
	) -> Result<ResourceModel, OperationError> {
		let identity = model.identity(self.resource_type)?;
		let resource_type = self.resource_type.to_string();

		let body = model
			.for_apply(self.resource_type)
			.to_object()
			.map_err(|source| OperationError::MarshalFailed {
				resource_type: resource_type.clone(),
				source: source.into(),
			})?;

		let options = options.resolve(self.defaults);
		debug!(
			field_manager = %options.field_manager,
			force_conflicts = options.force_conflicts,
			"applying object"
		);

		let response = self
			.client
			.apply(self.resource_type, &identity, &body, &options)
			.await
			.map_err(|source| OperationError::ApplyFailed {
				resource_type: resource_type.clone(),
				identity: identity.clone(),
				source,
			})?;

		ResourceModel::from_object(response).map_err(|source| OperationError::UnmarshalFailed {
			resource_type,
			source,
		})
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use rstest::rstest;
	use serde_json::json;

	use super::*;
	use crate::test_utils::{sample_widget, widget_type, FakeClient, Reply};

	#[rstest]
	#[case(None, None, "crdform", false)]
	#[case(Some(""), None, "crdform", false)]
	#[case(Some("team-a"), Some(true), "team-a", true)]
	#[case(None, Some(false), "crdform", false)]
	fn test_resolve_falls_back_to_defaults(
		#[case] field_manager: Option<&str>,
		#[case] force_conflicts: Option<bool>,
		#[case] expected_manager: &str,
		#[case] expected_force: bool,
	) {
		let options = ApplyOptions {
			field_manager: field_manager.map(str::to_string),
			force_conflicts,
		};
		assert_eq!(
			options.resolve(&ApplyDefaults::default()),
			ResolvedApplyOptions {
				field_manager: expected_manager.into(),
				force_conflicts: expected_force,
			}
		);
	}

	#[test]
	fn test_resolve_uses_provider_defaults() {
		let defaults = ApplyDefaults {
			field_manager: "platform".into(),
			force_conflicts: true,
		};
		let resolved = ApplyOptions::default().resolve(&defaults);
		assert_eq!(resolved.field_manager, "platform");
		assert!(resolved.force_conflicts);
	}

	#[tokio::test]
	async fn test_apply_sends_single_patch_with_injected_type() {
		let client = FakeClient::new();
		let rt = widget_type();
		let defaults = ApplyDefaults::default();
		let mut model = sample_widget();
		model.api_version = String::new();
		model.kind = String::new();

		let applied = ApplyCoordinator::new(&client, &rt, &defaults)
			.apply(&model, &ApplyOptions::default())
			.await
			.unwrap();

		let calls = client.applies();
		assert_eq!(calls.len(), 1);
		assert_eq!(calls[0].body["apiVersion"], json!("example.com/v1"));
		assert_eq!(calls[0].body["kind"], json!("Widget"));
		assert_eq!(calls[0].options.field_manager, "crdform");
		assert!(applied.metadata.uid.is_some());
	}

	#[tokio::test]
	async fn test_apply_conflict_is_not_retried() {
		let client = FakeClient::new().with_apply(Reply::Failure(409));
		let rt = widget_type();
		let defaults = ApplyDefaults::default();

		let result = ApplyCoordinator::new(&client, &rt, &defaults)
			.apply(&sample_widget(), &ApplyOptions::default())
			.await;

		assert_matches!(result, Err(OperationError::ApplyFailed { .. }));
		assert_eq!(client.applies().len(), 1);
	}

	#[tokio::test]
	async fn test_apply_rejects_missing_name_before_calling_server() {
		let client = FakeClient::new();
		let rt = widget_type();
		let defaults = ApplyDefaults::default();
		let mut model = sample_widget();
		model.metadata.name.clear();

		let result = ApplyCoordinator::new(&client, &rt, &defaults)
			.apply(&model, &ApplyOptions::default())
			.await;

		assert_matches!(result, Err(OperationError::Configuration(_)));
		assert!(client.applies().is_empty());
	}
}
