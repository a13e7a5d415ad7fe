//! Deep merge for YAML documents.
//!
//! Mappings merge key-by-key with the overlay taking precedence. Sequences and
//! scalars are replaced entirely, never concatenated. Key order follows the
//! base document, with overlay-only keys appended in overlay order.

use serde_yaml::Value;

/// How a null in the overlay is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullPolicy {
    /// An explicit null replaces the base value (composition semantics).
    #[default]
    Replace,
    /// A null means "not specified" and keeps the base value (settings tiers).
    KeepBase,
}

/// Deep merge two YAML values, with `overlay` taking precedence over `base`.
///
/// ```
/// use hydra_compose::config::deep_merge;
///
/// let base: serde_yaml::Value = serde_yaml::from_str("db: {host: localhost, port: 5432}").unwrap();
/// let overlay: serde_yaml::Value = serde_yaml::from_str("db: {port: 6543}").unwrap();
/// let merged = deep_merge(base, overlay);
/// assert_eq!(merged["db"]["host"].as_str(), Some("localhost"));
/// assert_eq!(merged["db"]["port"].as_u64(), Some(6543));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    deep_merge_with(base, overlay, NullPolicy::Replace)
}

/// Deep merge with an explicit [`NullPolicy`].
pub fn deep_merge_with(base: Value, overlay: Value, nulls: NullPolicy) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(slot) => {
                        let base_value = std::mem::replace(slot, Value::Null);
                        *slot = deep_merge_with(base_value, overlay_value, nulls);
                    }
                    None => {
                        if nulls == NullPolicy::KeepBase && overlay_value.is_null() {
                            continue;
                        }
                        base_map.insert(key, overlay_value);
                    }
                }
            }
            Value::Mapping(base_map)
        }
        (base, Value::Null) if nulls == NullPolicy::KeepBase => base,
        (_, overlay) => overlay,
    }
}

/// Merge multiple values in order, with later values taking precedence.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>, nulls: NullPolicy) -> Value {
    values
        .into_iter()
        .fold(Value::Null, |acc, next| match acc {
            // The fold seed must not swallow the first layer under KeepBase.
            Value::Null => next,
            acc => deep_merge_with(acc, next, nulls),
        })
}
