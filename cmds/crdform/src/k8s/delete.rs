//! Deleting a single object, optionally waiting until it is gone.

use k8s::{ResourceIdentity, ResourceType};
use kube::api::PropagationPolicy;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::{
	client::DynamicClient,
	wait::{AbsenceWait, ConditionWaiter},
};
use crate::error::OperationError;

/// How dependents of a deleted object are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionPropagation {
	Orphan,
	Background,
	Foreground,
}

impl From<DeletionPropagation> for PropagationPolicy {
	fn from(value: DeletionPropagation) -> Self {
		match value {
			DeletionPropagation::Orphan => PropagationPolicy::Orphan,
			DeletionPropagation::Background => PropagationPolicy::Background,
			DeletionPropagation::Foreground => PropagationPolicy::Foreground,
		}
	}
}

pub struct DeleteCoordinator<'a, C: ?Sized> {
	client: &'a C,
	resource_type: &'a ResourceType,
	cancel: CancellationToken,
}

impl<'a, C: DynamicClient + ?Sized> DeleteCoordinator<'a, C> {
	pub fn new(client: &'a C, resource_type: &'a ResourceType, cancel: CancellationToken) -> Self {
		Self {
			client,
			resource_type,
			cancel,
		}
	}

	/// Delete the object. An object that is already gone counts as deleted.
	///
	/// With `wait` set, returns only once a read reports the object missing.
	#[instrument(skip_all, fields(resource_type = %self.resource_type, id = %identity))]
	pub async fn delete(
		&self,
		identity: &ResourceIdentity,
		propagation: Option<DeletionPropagation>,
		wait: Option<&AbsenceWait>,
	) -> Result<(), OperationError> {
		match self
			.client
			.delete(self.resource_type, identity, propagation)
			.await
		{
			Ok(()) => debug!(?propagation, "delete accepted"),
			Err(err) if err.is_not_found() => {
				debug!("object already gone");
				return Ok(());
			}
			Err(source) => {
				return Err(OperationError::DeleteFailed {
					resource_type: self.resource_type.to_string(),
					identity: identity.clone(),
					source,
				})
			}
		}

		match wait {
			Some(wait) => {
				ConditionWaiter::new(self.client, self.resource_type, self.cancel.clone())
					.wait_for_absence(identity, wait)
					.await
			}
			None => Ok(()),
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
		k8s::client::ClientError,
		test_utils::{widget_type, FakeClient, Reply},
	};

	fn id() -> ResourceIdentity {
		ResourceIdentity::namespaced("ns1", "w1")
	}

	#[tokio::test]
	async fn test_delete_missing_object_succeeds() {
		let client = FakeClient::new().with_delete(Reply::NotFound);
		let rt = widget_type();

		DeleteCoordinator::new(&client, &rt, CancellationToken::new())
			.delete(&id(), None, Some(&AbsenceWait::default()))
			.await
			.unwrap();

		assert_eq!(client.get_count(), 0);
	}

	#[tokio::test]
	async fn test_delete_passes_propagation() {
		let client = FakeClient::new();
		let rt = widget_type();

		DeleteCoordinator::new(&client, &rt, CancellationToken::new())
			.delete(&id(), Some(DeletionPropagation::Foreground), None)
			.await
			.unwrap();

		assert_eq!(
			client.deletes(),
			vec![Some(DeletionPropagation::Foreground)]
		);
	}

	#[tokio::test]
	async fn test_delete_failure() {
		let client = FakeClient::new().with_delete(Reply::Failure(403));
		let rt = widget_type();

		let result = DeleteCoordinator::new(&client, &rt, CancellationToken::new())
			.delete(&id(), None, None)
			.await;

		assert_matches!(
			result,
			Err(OperationError::DeleteFailed { source: ClientError::Api { code: 403, .. }, .. })
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_delete_times_out_while_object_lingers() {
		let lingering = Reply::Object(json!({
			"metadata": {"name": "w1", "namespace": "ns1", "deletionTimestamp": "2024-01-01T00:00:00Z"}
		}));
		let client = FakeClient::new().with_gets(vec![lingering]);
		let rt = widget_type();
		let wait = AbsenceWait {
			timeout: Duration::from_secs(10),
			poll_interval: Duration::from_secs(4),
		};

		let result = DeleteCoordinator::new(&client, &rt, CancellationToken::new())
			.delete(&id(), None, Some(&wait))
			.await;

		assert_matches!(result, Err(OperationError::WaitTimeoutExceeded { what, .. }) if what == "deletion");
	}

	#[test]
	fn test_propagation_serde_names() {
		let parsed: DeletionPropagation = serde_json::from_value(json!("Orphan")).unwrap();
		assert_eq!(parsed, DeletionPropagation::Orphan);
	}
}
