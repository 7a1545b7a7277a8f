//! Provider facade: the configured client, catalog and apply defaults shared by
//! every resource.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
	catalog::{Catalog, TypeKind},
	error::{ConfigurationError, OperationError},
	k8s::{apply::ApplyDefaults, client::DynamicClient},
	manifest,
	model::ResourceModel,
	resource::{validate_model, Resource},
};

pub struct Provider<C: ?Sized> {
	/// `None` in offline mode.
	client: Option<Arc<C>>,
	catalog: Catalog,
	defaults: ApplyDefaults,
	cancel: CancellationToken,
}

impl<C: DynamicClient + ?Sized> Provider<C> {
	pub fn new(client: Arc<C>, catalog: Catalog, defaults: ApplyDefaults) -> Self {
		Self {
			client: Some(client),
			catalog,
			defaults,
			cancel: CancellationToken::new(),
		}
	}

	/// A provider that can only render manifests.
	pub fn offline(catalog: Catalog, defaults: ApplyDefaults) -> Self {
		Self {
			client: None,
			catalog,
			defaults,
			cancel: CancellationToken::new(),
		}
	}

	/// Cancel waits of every resource handed out when `cancel` fires.
	pub fn with_cancellation(self, cancel: CancellationToken) -> Self {
		Self { cancel, ..self }
	}

	pub fn is_offline(&self) -> bool {
		self.client.is_none()
	}

	pub fn catalog(&self) -> &Catalog {
		&self.catalog
	}

	pub fn defaults(&self) -> &ApplyDefaults {
		&self.defaults
	}

	/// The resource (and data source) of a type name.
	pub fn resource(&self, type_name: &str) -> Result<Resource<'_, C>, ConfigurationError> {
		let (schema, kind) = self.catalog.lookup(type_name)?;
		if kind == TypeKind::Manifest {
			return Err(ConfigurationError::UnexpectedType {
				expected: "a resource type".to_string(),
				got: format!("manifest type `{type_name}`"),
			});
		}
		let client = self
			.client
			.as_deref()
			.ok_or(ConfigurationError::Offline {
				operation: "managing resources",
			})?;
		Ok(Resource::new(
			client,
			schema,
			&self.defaults,
			self.cancel.clone(),
		))
	}

	/// Render a model of a type as YAML. Works offline; the type name may carry
	/// the manifest suffix.
	pub fn render_manifest(
		&self,
		type_name: &str,
		model: &ResourceModel,
	) -> Result<String, OperationError> {
		let (schema, _) = self.catalog.lookup(type_name)?;
		validate_model(schema, model)?;
		manifest::render(&schema.resource_type(), model)
	}
}
