//! In-memory representation of a custom resource and its provider state.

use std::collections::BTreeMap;

use k8s::{ResourceIdentity, ResourceType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
	error::ConfigurationError,
	k8s::{
		apply::ApplyOptions,
		delete::DeletionPropagation,
		wait::{AbsenceWait, WaitCondition},
	},
};

/// Top-level fields owned by the server that are never part of the model.
const SERVER_OWNED_FIELDS: &[&str] = &["status"];

/// Object metadata as far as the provider manages it.
///
/// `uid`, `resourceVersion`, `generation` and `creationTimestamp` are computed:
/// read back from the server, never sent. Other server-owned metadata such as
/// `managedFields` is dropped on decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
	#[serde(default)]
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub namespace: Option<String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub labels: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub annotations: BTreeMap<String, String>,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub uid: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub resource_version: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub generation: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub creation_timestamp: Option<String>,
}

impl ObjectMetadata {
	fn clear_computed(&mut self) {
		self.uid = None;
		self.resource_version = None;
		self.generation = None;
		self.creation_timestamp = None;
	}
}

/// A custom resource: `apiVersion`, `kind`, `metadata`, an optional `spec`
/// and any other top-level payload fields the type defines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceModel {
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub api_version: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub kind: String,
	#[serde(default)]
	pub metadata: ObjectMetadata,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub spec: Option<Value>,
	/// Payload fields outside of `spec`, e.g. `data` or `rules`.
	#[serde(flatten)]
	pub payload: Map<String, Value>,
}

impl ResourceModel {
	/// Decode an object as returned by the API server, dropping server-owned
	/// top-level fields.
	pub fn from_object(object: Value) -> Result<Self, serde_json::Error> {
		let mut model: ResourceModel = serde_json::from_value(object)?;
		for field in SERVER_OWNED_FIELDS {
			model.payload.remove(*field);
		}
		Ok(model)
	}

	pub fn to_object(&self) -> Result<Value, serde_json::Error> {
		serde_json::to_value(self)
	}

	/// The body sent to the API server: `apiVersion`/`kind` forced to the
	/// resource type, computed metadata removed.
	pub fn for_apply(&self, resource_type: &ResourceType) -> Self {
		let mut model = self.clone();
		model.api_version = resource_type.api_version();
		model.kind = resource_type.kind.clone();
		model.metadata.clear_computed();
		for field in SERVER_OWNED_FIELDS {
			model.payload.remove(*field);
		}
		model
	}

	/// Identity of this object, checked against the scope of its type.
	pub fn identity(
		&self,
		resource_type: &ResourceType,
	) -> Result<ResourceIdentity, ConfigurationError> {
		let invalid = |reason| ConfigurationError::InvalidIdentity {
			resource_type: resource_type.to_string(),
			reason,
		};

		if self.metadata.name.is_empty() {
			return Err(invalid("metadata.name must not be empty"));
		}
		match (resource_type.is_namespaced(), self.metadata.namespace.as_deref()) {
			(true, Some(ns)) if !ns.is_empty() => Ok(ResourceIdentity::namespaced(
				ns,
				self.metadata.name.clone(),
			)),
			(true, _) => Err(invalid("metadata.namespace is required for namespaced kinds")),
			(false, None) => Ok(ResourceIdentity::cluster(self.metadata.name.clone())),
			(false, Some(_)) => Err(invalid(
				"metadata.namespace must not be set for cluster-scoped kinds",
			)),
		}
	}
}

/// Everything the provider records about one managed resource: the object
/// itself plus how it is applied, awaited and deleted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceState {
	/// `namespace/name` or `name`, set once the object exists.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub field_manager: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub force_conflicts: Option<bool>,
	/// Conditions that must all hold after create or update.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub wait_for_upsert: Vec<WaitCondition>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub wait_for_delete: Option<AbsenceWait>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub deletion_propagation: Option<DeletionPropagation>,

	#[serde(flatten)]
	pub model: ResourceModel,
}

impl ResourceState {
	pub fn new(model: ResourceModel) -> Self {
		Self {
			model,
			..Default::default()
		}
	}

	pub fn apply_options(&self) -> ApplyOptions {
		ApplyOptions {
			field_manager: self.field_manager.clone(),
			force_conflicts: self.force_conflicts,
		}
	}

	/// Replace the object with what the server returned, keeping the
	/// provider-side settings.
	pub fn with_model(&self, model: ResourceModel, identity: &ResourceIdentity) -> Self {
		Self {
			id: Some(identity.to_string()),
			model,
			..self.clone()
		}
	}
}
