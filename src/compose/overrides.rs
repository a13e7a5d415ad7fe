//! Override-string parsing.
//!
//! Overrides are entered free-form as `key=value`, optionally prefixed with
//! `+` (add a new key), `++` (add or overwrite) or `~` (remove).

use crate::error::ComposeError;
use serde_yaml::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideKind {
    /// `key=value`: change an existing key.
    Assign,
    /// `+key=value`: add a key that must not exist yet.
    Append,
    /// `++key=value`: add or overwrite.
    ForceAdd,
    /// `~key` or `~key=value`: remove.
    Delete,
}

/// One parsed override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub kind: OverrideKind,
    pub key: String,
    /// Raw value text; `None` only for `~key`.
    pub value: Option<String>,
}

impl Override {
    /// Parse a raw override string.
    pub fn parse(raw: &str) -> Result<Self, ComposeError> {
        let trimmed = raw.trim();
        let invalid = || ComposeError::InvalidOverride(raw.to_string());

        if let Some(rest) = trimmed.strip_prefix('~') {
            let (key, value) = match rest.split_once('=') {
                Some((key, value)) => (key, Some(value.to_string())),
                None => (rest, None),
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(invalid());
            }
            return Ok(Self {
                kind: OverrideKind::Delete,
                key: key.to_string(),
                value,
            });
        }

        let (kind, body) = if let Some(rest) = trimmed.strip_prefix("++") {
            (OverrideKind::ForceAdd, rest)
        } else if let Some(rest) = trimmed.strip_prefix('+') {
            (OverrideKind::Append, rest)
        } else {
            (OverrideKind::Assign, trimmed)
        };

        let (key, value) = body.split_once('=').ok_or_else(invalid)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            kind,
            key: key.to_string(),
            value: Some(value.to_string()),
        })
    }

    /// Dotted key segments.
    pub fn segments(&self) -> Vec<&str> {
        self.key.split('.').collect()
    }

    /// The value parsed as YAML (see [`parse_value`]).
    pub fn parsed_value(&self) -> Value {
        self.value.as_deref().map(parse_value).unwrap_or(Value::Null)
    }
}

impl fmt::Display for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            OverrideKind::Assign => "",
            OverrideKind::Append => "+",
            OverrideKind::ForceAdd => "++",
            OverrideKind::Delete => "~",
        };
        match self.value {
            Some(ref value) => write!(f, "{prefix}{}={value}", self.key),
            None => write!(f, "{prefix}{}", self.key),
        }
    }
}

/// Interpret an override value.
///
/// Scalars are typed as YAML would type them (`5`, `true`, `null`, `'x'`).
/// Collections are only accepted in flow form (`[1, 2]`, `{a: 1}`), so text
/// such as `a: b` stays a plain string. Empty input is an empty string.
pub fn parse_value(raw: &str) -> Value {
    let text = raw.trim();
    if text.is_empty() {
        return Value::String(String::new());
    }
    match serde_yaml::from_str::<Value>(text) {
        Ok(value @ (Value::Sequence(_) | Value::Mapping(_))) => {
            if text.starts_with('[') || text.starts_with('{') {
                value
            } else {
                Value::String(text.to_string())
            }
        }
        Ok(Value::Tagged(_)) | Err(_) => Value::String(text.to_string()),
        Ok(value) => value,
    }
}

/// Normalize an override for the manual strategy.
///
/// Removal overrides are dropped, `+`/`++` prefixes stripped, and strings
/// without `=` rejected. Returns the cleaned `(key, value)` pair.
pub fn normalize_for_fallback(raw: &str) -> Option<(String, String)> {
    let trimmed = raw.trim();
    if trimmed.starts_with('~') {
        return None;
    }
    let (key, value) = trimmed.split_once('=')?;
    let key = key
        .strip_prefix("++")
        .or_else(|| key.strip_prefix('+'))
        .unwrap_or(key)
        .trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

/// Build a nested mapping from dotted `key=value` assignments, later
/// assignments to the same path winning.
pub fn dotlist_tree(pairs: &[(String, String)]) -> Value {
    let mut tree = Value::Mapping(Default::default());
    for (key, value) in pairs {
        let segments: Vec<&str> = key.split('.').collect();
        let mut branch = parse_value(value);
        for segment in segments.iter().rev() {
            let mut map = serde_yaml::Mapping::new();
            map.insert(Value::String((*segment).to_string()), branch);
            branch = Value::Mapping(map);
        }
        tree = crate::config::deep_merge(tree, branch);
    }
    tree
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds() {
        let o = Override::parse("lr=0.1").unwrap();
        assert_eq!(o.kind, OverrideKind::Assign);
        assert_eq!(o.key, "lr");
        assert_eq!(o.value.as_deref(), Some("0.1"));

        assert_eq!(Override::parse("+a.b=1").unwrap().kind, OverrideKind::Append);
        assert_eq!(Override::parse("++a.b=1").unwrap().kind, OverrideKind::ForceAdd);

        let d = Override::parse("~db").unwrap();
        assert_eq!(d.kind, OverrideKind::Delete);
        assert_eq!(d.value, None);
        assert_eq!(d.to_string(), "~db");
    }

    #[test]
    fn test_parse_rejects_missing_equals() {
        assert!(matches!(
            Override::parse("lr"),
            Err(ComposeError::InvalidOverride(_))
        ));
        assert!(Override::parse("=5").is_err());
        assert!(Override::parse("~").is_err());
    }

    #[test]
    fn test_value_splits_on_first_equals() {
        let o = Override::parse("expr=a=b").unwrap();
        assert_eq!(o.key, "expr");
        assert_eq!(o.value.as_deref(), Some("a=b"));
    }

    #[test]
    fn test_parse_value_types() {
        assert_eq!(parse_value("5"), Value::from(5));
        assert_eq!(parse_value("true"), Value::Bool(true));
        assert_eq!(parse_value("null"), Value::Null);
        assert_eq!(parse_value("abc"), Value::from("abc"));
        assert_eq!(parse_value("'5'"), Value::from("5"));
        assert_eq!(parse_value(""), Value::from(""));
        assert_eq!(parse_value("a: b"), Value::from("a: b"));
        assert_eq!(
            parse_value("[1, 2]"),
            serde_yaml::from_str::<Value>("[1, 2]").unwrap()
        );
    }

    #[test]
    fn test_normalize_for_fallback() {
        assert_eq!(
            normalize_for_fallback("++x.y=3"),
            Some(("x.y".to_string(), "3".to_string()))
        );
        assert_eq!(
            normalize_for_fallback("+x=3"),
            Some(("x".to_string(), "3".to_string()))
        );
        assert_eq!(normalize_for_fallback("~x"), None);
        assert_eq!(normalize_for_fallback("~x=3"), None);
        assert_eq!(normalize_for_fallback("x"), None);
    }

    #[test]
    fn test_dotlist_tree() {
        let tree = dotlist_tree(&[
            ("a.b".to_string(), "1".to_string()),
            ("a.c".to_string(), "x".to_string()),
            ("a.b".to_string(), "2".to_string()),
        ]);
        assert_eq!(tree, serde_yaml::from_str::<Value>("a: {b: 2, c: x}").unwrap());
    }
}
