//! Offline rendering of a resource model as a YAML manifest.

use k8s::ResourceType;
use tracing::instrument;

use crate::{
	error::OperationError,
	model::ResourceModel,
	yaml,
};

/// Render `model` as it would be sent to the cluster.
///
/// The object's identity is checked against the type's scope, but nothing is
/// sent anywhere.
#[instrument(skip_all, fields(resource_type = %resource_type))]
pub fn render(resource_type: &ResourceType, model: &ResourceModel) -> Result<String, OperationError> {
	model.identity(resource_type)?;

	let marshal = |source: Box<dyn std::error::Error + Send + Sync>| {
		OperationError::MarshalFailed {
			resource_type: resource_type.to_string(),
			source,
		}
	};
	let object = model
		.for_apply(resource_type)
		.to_object()
		.map_err(|err| marshal(err.into()))?;
	yaml::to_yaml(&object).map_err(|err| marshal(err.into()))
}
