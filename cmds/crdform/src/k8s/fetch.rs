//! Reading a single object back from the cluster.

use k8s::{ResourceIdentity, ResourceType};
use serde_json::Value;
use tracing::instrument;

use super::client::Gettable;
use crate::{error::OperationError, model::ResourceModel};

pub struct Fetcher<'a, C: ?Sized> {
	client: &'a C,
	resource_type: &'a ResourceType,
}

impl<'a, C: Gettable + ?Sized> Fetcher<'a, C> {
	pub fn new(client: &'a C, resource_type: &'a ResourceType) -> Self {
		Self {
			client,
			resource_type,
		}
	}

	/// Fetch the raw object, including `status`.
	///
	/// A missing object is [`OperationError::NotFound`]; any other failure is
	/// [`OperationError::FetchFailed`].
	#[instrument(skip_all, fields(resource_type = %self.resource_type, id = %identity))]
	pub async fn fetch_object(&self, identity: &ResourceIdentity) -> Result<Value, OperationError> {
		self.client
			.get(self.resource_type, identity)
			.await
			.map_err(|source| match source {
				source if source.is_not_found() => OperationError::NotFound {
					resource_type: self.resource_type.to_string(),
					identity: identity.clone(),
				},
				source => OperationError::FetchFailed {
					resource_type: self.resource_type.to_string(),
					identity: identity.clone(),
					source,
				},
			})
	}

	/// Fetch and decode the object into a model.
	pub async fn fetch(&self, identity: &ResourceIdentity) -> Result<ResourceModel, OperationError> {
		let object = self.fetch_object(identity).await?;
		ResourceModel::from_object(object).map_err(|source| OperationError::UnmarshalFailed {
			resource_type: self.resource_type.to_string(),
			source,
		})
	}
}
