//! YAML rendering of objects.

use serde_json::{Map, Value};
use tracing::instrument;

/// Sort all object keys recursively in lexical order.
pub fn sort_json_keys(value: Value) -> Value {
	match value {
		Value::Object(map) => {
			let mut entries: Vec<(String, Value)> = map.into_iter().collect();
			entries.sort_by(|(a, _), (b, _)| a.cmp(b));
			Value::Object(
				entries
					.into_iter()
					.map(|(k, v)| (k, sort_json_keys(v)))
					.collect::<Map<_, _>>(),
			)
		}
		Value::Array(items) => Value::Array(items.into_iter().map(sort_json_keys).collect()),
		other => other,
	}
}

/// Render a value as a single YAML document with sorted keys and no leading
/// `---` marker.
#[instrument(skip_all)]
pub fn to_yaml(value: &Value) -> Result<String, serde_yaml_with_quirks::Error> {
	let sorted = sort_json_keys(value.clone());
	let rendered = serde_yaml_with_quirks::to_string(&sorted)?;

	let mut body = rendered
		.strip_prefix("---\n")
		.or_else(|| rendered.strip_prefix("---"))
		.unwrap_or(&rendered)
		.trim_start_matches(' ')
		.to_string();
	if !body.ends_with('\n') {
		body.push('\n');
	}
	Ok(body)
}

#[cfg(test)]
mod tests {
	use indoc::indoc;
	use serde_json::json;

	use super::*;

	#[test]
	fn test_sort_json_keys_is_recursive() {
		let sorted = sort_json_keys(json!({
			"spec": {"b": 1, "a": [{"z": 1, "y": 2}]},
			"apiVersion": "v1"
		}));
		assert_eq!(
			serde_json::to_string(&sorted).unwrap(),
			r#"{"apiVersion":"v1","spec":{"a":[{"y":2,"z":1}],"b":1}}"#
		);
	}

	#[test]
	fn test_to_yaml_has_no_document_marker() {
		let rendered = to_yaml(&json!({
			"kind": "Widget",
			"apiVersion": "example.com/v1",
			"metadata": {"name": "w1"}
		}))
		.unwrap();

		assert_eq!(
			rendered,
			indoc! {"
				apiVersion: example.com/v1
				kind: Widget
				metadata:
				  name: w1
			"}
		);
	}
}
