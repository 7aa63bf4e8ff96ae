//! Ordered shape adapters for the identity service's permission payloads.
//!
//! The per-user permission endpoint has shipped at least four payload shapes
//! across identity-service versions. Each adapter recognizes exactly one
//! shape and returns the raw permission keys; they are tried in order and
//! the first match wins. A payload matching no adapter is rejected by the
//! caller rather than silently treated as empty.

use serde_json::Value;
use tracing::warn;

use drivelane_domain::Permission;

/// One recognizer: returns the raw keys when the payload has its shape.
type ShapeAdapter = fn(&Value) -> Option<Vec<String>>;

/// Adapters in precedence order; the canonical shape is tried first.
const SHAPE_ADAPTERS: &[ShapeAdapter] = &[
    canonical_object,
    bare_array,
    nested_under_data,
    nested_under_data_permissions,
];

/// Extracts raw permission keys from a payload of any known shape.
#[must_use]
pub(super) fn extract_permission_keys(payload: &Value) -> Option<Vec<String>> {
    SHAPE_ADAPTERS
        .iter()
        .find_map(|adapter| adapter(payload))
}

/// Parses raw keys into known permissions, skipping unknown keys.
///
/// An unknown key means the identity service is ahead of this build; it is
/// logged and dropped so the rest of the grant set stays usable.
#[must_use]
pub(super) fn parse_known_permissions(keys: &[String]) -> Vec<Permission> {
    let mut permissions = Vec::new();
    for key in keys {
        match Permission::from_transport(key) {
            Ok(permission) => {
                if !permissions.contains(&permission) {
                    permissions.push(permission);
                }
            }
            Err(_) => warn!(key, "skipping unknown permission key from directory"),
        }
    }

    permissions
}

/// Canonical shape: `{"permissions": [{"permission_key": ..}, ..]}`.
fn canonical_object(payload: &Value) -> Option<Vec<String>> {
    let entries = payload.get("permissions")?.as_array()?;
    keys_from_entries(entries)
}

/// Bare array of entries: `[{"permission_key": ..}, ..]` or `["key", ..]`.
fn bare_array(payload: &Value) -> Option<Vec<String>> {
    keys_from_entries(payload.as_array()?)
}

/// Entries nested one level down: `{"data": [..]}`.
fn nested_under_data(payload: &Value) -> Option<Vec<String>> {
    keys_from_entries(payload.get("data")?.as_array()?)
}

/// Entries nested two levels down: `{"data": {"permissions": [..]}}`.
fn nested_under_data_permissions(payload: &Value) -> Option<Vec<String>> {
    keys_from_entries(payload.get("data")?.get("permissions")?.as_array()?)
}

/// Reads keys out of a list whose entries are objects or bare strings.
fn keys_from_entries(entries: &[Value]) -> Option<Vec<String>> {
    let mut keys = Vec::with_capacity(entries.len());
    for entry in entries {
        let key = entry
            .as_str()
            .or_else(|| entry.get("permission_key").and_then(Value::as_str))
            .or_else(|| entry.get("key").and_then(Value::as_str))?;
        keys.push(key.to_owned());
    }

    Some(keys)
}
