//! Helper functions for mock Kubernetes testing.

use serde_json::{json, Value};

/// Timestamp written into every object the mock server creates.
pub const CREATION_TIMESTAMP: &str = "2024-01-01T00:00:00Z";

/// Deep merge two JSON values (patch into base).
pub fn merge_json(base: Value, patch: Value) -> Value {
	match (base, patch) {
		(Value::Object(mut base_map), Value::Object(patch_map)) => {
			for (key, patch_value) in patch_map {
				let base_value = base_map.remove(&key).unwrap_or(Value::Null);
				base_map.insert(key, merge_json(base_value, patch_value));
			}
			Value::Object(base_map)
		}
		(_, patch) => patch,
	}
}

/// Whether applying `patch` would change a field of `existing` under `spec`.
///
/// Re-applying values that are already present is not a conflict, mirroring
/// shared field ownership in server-side apply.
pub fn spec_conflicts(existing: &Value, patch: &Value) -> bool {
	let Some(patch_spec) = patch.get("spec") else {
		return false;
	};
	let current = existing.get("spec").cloned().unwrap_or(Value::Null);
	merge_json(current.clone(), patch_spec.clone()) != current
}

/// Fill in the metadata fields the API server owns.
pub fn populate_server_fields(object: &mut Value, revision: u64, spec_changed: bool) {
	let Some(metadata) = object.get_mut("metadata").and_then(Value::as_object_mut) else {
		return;
	};
	metadata
		.entry("uid")
		.or_insert_with(|| json!(format!("00000000-0000-0000-0000-{revision:012}")));
	metadata
		.entry("creationTimestamp")
		.or_insert_with(|| json!(CREATION_TIMESTAMP));
	metadata.insert("resourceVersion".into(), json!(revision.to_string()));

	let generation = metadata
		.get("generation")
		.and_then(Value::as_i64)
		.unwrap_or(0);
	if generation == 0 || spec_changed {
		metadata.insert("generation".into(), json!(generation + 1));
	}
}

/// Build a `Status` failure body as returned by the API server.
pub fn failure_status(code: u16, reason: &str, message: &str) -> Value {
	json!({
		"kind": "Status",
		"apiVersion": "v1",
		"metadata": {},
		"status": "Failure",
		"message": message,
		"reason": reason,
		"code": code
	})
}
