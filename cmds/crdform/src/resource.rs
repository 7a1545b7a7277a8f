//! Lifecycle of one managed resource type: create, read, update, delete and
//! import, plus the data source read.
//!
//! A single implementation serves every type in the catalog; the type only
//! contributes its coordinates and attribute table.

use k8s::{schema::TypeSchema, ResourceIdentity, ResourceType};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::{
	error::{ConfigurationError, OperationError},
	k8s::{
		apply::{ApplyCoordinator, ApplyDefaults},
		client::DynamicClient,
		delete::DeleteCoordinator,
		fetch::Fetcher,
		wait::{ConditionWaiter, WaitCondition},
	},
	model::{ResourceModel, ResourceState},
};

/// Check a model against the attribute table of its type.
pub fn validate_model(schema: &TypeSchema, model: &ResourceModel) -> Result<(), OperationError> {
	let resource_type = schema.resource_type();
	let object = model
		.to_object()
		.map_err(|source| OperationError::MarshalFailed {
			resource_type: resource_type.to_string(),
			source: source.into(),
		})?;

	let violations = schema.validate(&object);
	if violations.is_empty() {
		Ok(())
	} else {
		Err(ConfigurationError::SchemaViolations {
			type_name: resource_type.type_name(),
			violations,
		}
		.into())
	}
}

pub struct Resource<'p, C: ?Sized> {
	client: &'p C,
	schema: &'p TypeSchema,
	resource_type: ResourceType,
	defaults: &'p ApplyDefaults,
	cancel: CancellationToken,
}

impl<'p, C: DynamicClient + ?Sized> Resource<'p, C> {
	pub fn new(
		client: &'p C,
		schema: &'p TypeSchema,
		defaults: &'p ApplyDefaults,
		cancel: CancellationToken,
	) -> Self {
		Self {
			client,
			resource_type: schema.resource_type(),
			schema,
			defaults,
			cancel,
		}
	}

	pub fn resource_type(&self) -> &ResourceType {
		&self.resource_type
	}

	pub async fn create(&self, state: &ResourceState) -> Result<ResourceState, OperationError> {
		self.upsert(state).await
	}

	pub async fn update(&self, state: &ResourceState) -> Result<ResourceState, OperationError> {
		self.upsert(state).await
	}

	/// Apply the state's object, then wait for each upsert condition in order.
	#[instrument(skip_all, fields(resource_type = %self.resource_type))]
	async fn upsert(&self, state: &ResourceState) -> Result<ResourceState, OperationError> {
		validate_model(self.schema, &state.model)?;
		let identity = state.model.identity(&self.resource_type)?;

		let applied = ApplyCoordinator::new(self.client, &self.resource_type, self.defaults)
			.apply(&state.model, &state.apply_options())
			.await?;
		info!(id = %identity, "applied");

		let waiter = ConditionWaiter::new(self.client, &self.resource_type, self.cancel.clone());
		for condition in &state.wait_for_upsert {
			waiter.wait_for(&identity, condition).await?;
		}

		Ok(state.with_model(applied, &identity))
	}

	/// Refresh the state from the cluster.
	///
	/// Returns `None` when the object no longer exists.
	#[instrument(skip_all, fields(resource_type = %self.resource_type))]
	pub async fn read(&self, state: &ResourceState) -> Result<Option<ResourceState>, OperationError> {
		let identity = self.state_identity(state)?;
		match Fetcher::new(self.client, &self.resource_type)
			.fetch(&identity)
			.await
		{
			Ok(model) => Ok(Some(state.with_model(model, &identity))),
			Err(err) if err.is_not_found() => {
				debug!(id = %identity, "object vanished");
				Ok(None)
			}
			Err(err) => Err(err),
		}
	}

	#[instrument(skip_all, fields(resource_type = %self.resource_type))]
	pub async fn delete(&self, state: &ResourceState) -> Result<(), OperationError> {
		let identity = self.state_identity(state)?;
		DeleteCoordinator::new(self.client, &self.resource_type, self.cancel.clone())
			.delete(
				&identity,
				state.deletion_propagation,
				state.wait_for_delete.as_ref(),
			)
			.await?;
		info!(id = %identity, "deleted");
		Ok(())
	}

	/// Adopt an existing object by its import id.
	///
	/// A malformed id fails before any request is made.
	#[instrument(skip(self), fields(resource_type = %self.resource_type))]
	pub async fn import(&self, id: &str) -> Result<ResourceState, OperationError> {
		let identity = self.parse_id(id)?;
		let model = Fetcher::new(self.client, &self.resource_type)
			.fetch(&identity)
			.await?;
		Ok(ResourceState {
			id: Some(identity.to_string()),
			..ResourceState::new(model)
		})
	}

	/// Data source read: the live object, which must exist.
	pub async fn read_data_source(
		&self,
		identity: &ResourceIdentity,
	) -> Result<ResourceModel, OperationError> {
		Fetcher::new(self.client, &self.resource_type)
			.fetch(identity)
			.await
	}

	pub async fn wait(
		&self,
		identity: &ResourceIdentity,
		condition: &WaitCondition,
	) -> Result<(), OperationError> {
		ConditionWaiter::new(self.client, &self.resource_type, self.cancel.clone())
			.wait_for(identity, condition)
			.await
	}

	pub fn parse_id(&self, id: &str) -> Result<ResourceIdentity, ConfigurationError> {
		Ok(ResourceIdentity::parse_import_id(
			id,
			self.resource_type.scope,
		)?)
	}

	/// Identity from the recorded `id`, falling back to the object's metadata.
	fn state_identity(&self, state: &ResourceState) -> Result<ResourceIdentity, ConfigurationError> {
		match &state.id {
			Some(id) => self.parse_id(id),
			None => state.model.identity(&self.resource_type),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use assert_matches::assert_matches;
	use serde_json::json;

	use super::*;
	use crate::{
		catalog::Catalog,
		k8s::{
			delete::DeletionPropagation,
			wait::{AbsenceWait, WaitCondition},
		},
		test_utils::{sample_widget, FakeClient, Reply},
	};

	const WIDGETS: &str = "
types:
  - group: example.com
    version: v1
    kind: Widget
    plural: widgets
    namespaced: true
    attributes:
      - path: spec.size
        type: int64
        required: true
      - path: spec.color
        type: string
        validators:
          - oneOf: [red, blue]
";

	fn catalog() -> Catalog {
		Catalog::from_yaml(WIDGETS, "test").unwrap()
	}

	fn schema(catalog: &Catalog) -> &TypeSchema {
		catalog.lookup("k8s_example_com_widget_v1").unwrap().0
	}

	#[tokio::test]
	async fn test_create_returns_state_with_id_and_computed_fields() {
		let catalog = catalog();
		let client = FakeClient::new().with_gets(vec![Reply::Object(json!({
			"metadata": {"name": "w1", "namespace": "ns1"},
			"status": {"phase": "Ready"}
		}))]);
		let defaults = ApplyDefaults::default();
		let resource = Resource::new(&client, schema(&catalog), &defaults, CancellationToken::new());

		let state = ResourceState {
			field_manager: Some("team-a".into()),
			wait_for_upsert: vec![WaitCondition {
				expected_value: Some("Ready".into()),
				..WaitCondition::new("{.status.phase}")
			}],
			..ResourceState::new(sample_widget())
		};

		let created = resource.create(&state).await.unwrap();
		assert_eq!(created.id.as_deref(), Some("ns1/w1"));
		assert_eq!(created.field_manager.as_deref(), Some("team-a"));
		assert!(created.model.metadata.uid.is_some());
		assert_eq!(client.applies()[0].options.field_manager, "team-a");
		assert_eq!(client.get_count(), 1);
	}

	#[tokio::test]
	async fn test_create_rejects_schema_violations_before_apply() {
		let catalog = catalog();
		let client = FakeClient::new();
		let defaults = ApplyDefaults::default();
		let resource = Resource::new(&client, schema(&catalog), &defaults, CancellationToken::new());

		let mut model = sample_widget();
		model.spec = Some(json!({"color": "green"}));

		let result = resource.create(&ResourceState::new(model)).await;
		assert_matches!(
			result,
			Err(OperationError::Configuration(ConfigurationError::SchemaViolations { violations, .. }))
				if violations.len() == 2
		);
		assert!(client.applies().is_empty());
	}

	#[tokio::test]
	async fn test_read_vanished_resource() {
		let catalog = catalog();
		let client = FakeClient::new().with_gets(vec![Reply::NotFound]);
		let defaults = ApplyDefaults::default();
		let resource = Resource::new(&client, schema(&catalog), &defaults, CancellationToken::new());

		let state = ResourceState {
			id: Some("ns1/w1".into()),
			..ResourceState::new(sample_widget())
		};
		assert_matches!(resource.read(&state).await, Ok(None));
	}

	#[tokio::test]
	async fn test_read_keeps_provider_settings() {
		let catalog = catalog();
		let client = FakeClient::new().with_gets(vec![Reply::Object(json!({
			"apiVersion": "example.com/v1",
			"kind": "Widget",
			"metadata": {"name": "w1", "namespace": "ns1", "uid": "u1"},
			"spec": {"size": 5}
		}))]);
		let defaults = ApplyDefaults::default();
		let resource = Resource::new(&client, schema(&catalog), &defaults, CancellationToken::new());

		let state = ResourceState {
			id: Some("ns1/w1".into()),
			deletion_propagation: Some(DeletionPropagation::Background),
			..ResourceState::new(sample_widget())
		};
		let refreshed = resource.read(&state).await.unwrap().unwrap();
		assert_eq!(refreshed.model.spec, Some(json!({"size": 5})));
		assert_eq!(
			refreshed.deletion_propagation,
			Some(DeletionPropagation::Background)
		);
	}

	#[tokio::test]
	async fn test_read_surfaces_other_failures() {
		let catalog = catalog();
		let client = FakeClient::new().with_gets(vec![Reply::Failure(500)]);
		let defaults = ApplyDefaults::default();
		let resource = Resource::new(&client, schema(&catalog), &defaults, CancellationToken::new());

		let result = resource.read(&ResourceState::new(sample_widget())).await;
		assert_matches!(result, Err(OperationError::FetchFailed { .. }));
	}

	#[tokio::test]
	async fn test_import_malformed_id_makes_no_request() {
		let catalog = catalog();
		let client = FakeClient::new();
		let defaults = ApplyDefaults::default();
		let resource = Resource::new(&client, schema(&catalog), &defaults, CancellationToken::new());

		let result = resource.import("name1").await;
		assert_matches!(
			result,
			Err(OperationError::Configuration(ConfigurationError::MalformedImportId(_)))
		);
		assert_eq!(client.get_count(), 0);
	}

	#[tokio::test]
	async fn test_import_missing_object_is_an_error() {
		let catalog = catalog();
		let client = FakeClient::new().with_gets(vec![Reply::NotFound]);
		let defaults = ApplyDefaults::default();
		let resource = Resource::new(&client, schema(&catalog), &defaults, CancellationToken::new());

		assert_matches!(
			resource.import("ns1/name1").await,
			Err(OperationError::NotFound { .. })
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_delete_uses_state_settings() {
		let catalog = catalog();
		let client = FakeClient::new().with_gets(vec![Reply::NotFound]);
		let defaults = ApplyDefaults::default();
		let resource = Resource::new(&client, schema(&catalog), &defaults, CancellationToken::new());

		let state = ResourceState {
			id: Some("ns1/w1".into()),
			deletion_propagation: Some(DeletionPropagation::Orphan),
			wait_for_delete: Some(AbsenceWait {
				timeout: Duration::from_secs(10),
				poll_interval: Duration::from_secs(1),
			}),
			..ResourceState::new(sample_widget())
		};
		resource.delete(&state).await.unwrap();

		assert_eq!(client.deletes(), vec![Some(DeletionPropagation::Orphan)]);
		assert_eq!(client.get_count(), 1);
	}
}
