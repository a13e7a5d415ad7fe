//! `${...}` interpolation resolution.
//!
//! Supported forms:
//! - `${a.b.0.c}`: absolute reference into the composed document
//! - `${.sibling}`, `${..uncle}`: references relative to the containing node
//! - `${oc.env:VAR}` / `${oc.env:VAR,default}`: environment lookup
//! - `\${...}`: escaped, emitted literally
//!
//! Resolution is partial. A string whose interpolations cannot all be
//! resolved (unknown resolver, missing key, cycle) is left verbatim and
//! reported, while every other string is still resolved.

use super::overrides::parse_value;
use super::tree::get_path;
use serde_yaml::Value;
use std::fmt;

const MAX_DEPTH: usize = 64;

/// One string that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpolationFailure {
    /// Dotted path of the value holding the interpolation.
    pub location: String,
    /// The original text, left verbatim in the output.
    pub expression: String,
    pub reason: String,
}

impl fmt::Display for InterpolationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at '{}': {}", self.expression, self.location, self.reason)
    }
}

/// Result of resolving a document.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub value: Value,
    pub failures: Vec<InterpolationFailure>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Resolve all interpolations using the process environment.
pub fn resolve(doc: &Value) -> Resolution {
    resolve_with_env(doc, &|name| std::env::var(name).ok())
}

/// Resolve all interpolations with an explicit environment lookup.
pub fn resolve_with_env(doc: &Value, env: &dyn Fn(&str) -> Option<String>) -> Resolution {
    let mut resolver = Resolver {
        root: doc,
        env,
        stack: Vec::new(),
    };
    let mut failures = Vec::new();
    let mut path = Vec::new();
    let value = resolver.walk(doc, &mut path, &mut failures);
    Resolution { value, failures }
}

/// Whether a string contains an unescaped interpolation.
pub fn has_interpolation(s: &str) -> bool {
    matches!(split_pieces(s), Ok(pieces) if pieces.iter().any(|p| matches!(p, Piece::Interp(_))))
}

enum Piece<'s> {
    Text(&'s str),
    Interp(&'s str),
}

/// Split a string into literal text and `${...}` bodies, honouring nesting.
fn split_pieces(s: &str) -> Result<Vec<Piece<'_>>, String> {
    let bytes = s.as_bytes();
    let mut pieces = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < s.len() {
        let rest = &s[i..];
        if rest.starts_with("\\${") {
            if text_start < i {
                pieces.push(Piece::Text(&s[text_start..i]));
            }
            pieces.push(Piece::Text("${"));
            i += 3;
            text_start = i;
        } else if rest.starts_with("${") {
            if text_start < i {
                pieces.push(Piece::Text(&s[text_start..i]));
            }
            let body_start = i + 2;
            let mut depth = 1;
            let mut j = body_start;
            while j < s.len() && depth > 0 {
                if bytes[j..].starts_with(b"${") {
                    depth += 1;
                    j += 2;
                    continue;
                }
                if bytes[j] == b'}' {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                j += 1;
            }
            if depth != 0 {
                return Err(format!("unterminated interpolation in '{s}'"));
            }
            pieces.push(Piece::Interp(&s[body_start..j]));
            i = j + 1;
            text_start = i;
        } else {
            i += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    if text_start < s.len() {
        pieces.push(Piece::Text(&s[text_start..]));
    }
    Ok(pieces)
}

struct Resolver<'a> {
    root: &'a Value,
    env: &'a dyn Fn(&str) -> Option<String>,
    /// Absolute paths currently being resolved, for cycle detection.
    stack: Vec<String>,
}

impl Resolver<'_> {
    fn walk(
        &mut self,
        node: &Value,
        path: &mut Vec<String>,
        failures: &mut Vec<InterpolationFailure>,
    ) -> Value {
        match node {
            Value::String(s) if s.contains("${") => match self.resolve_string(s, path) {
                Ok(value) => value,
                Err(reason) => {
                    failures.push(InterpolationFailure {
                        location: path.join("."),
                        expression: s.clone(),
                        reason,
                    });
                    node.clone()
                }
            },
            Value::Mapping(map) => {
                let mut out = serde_yaml::Mapping::with_capacity(map.len());
                for (key, value) in map {
                    path.push(key_to_string(key));
                    let resolved = self.walk(value, path, failures);
                    path.pop();
                    out.insert(key.clone(), resolved);
                }
                Value::Mapping(out)
            }
            Value::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    path.push(index.to_string());
                    out.push(self.walk(item, path, failures));
                    path.pop();
                }
                Value::Sequence(out)
            }
            other => other.clone(),
        }
    }

    /// Resolve a referenced subtree; any failure fails the whole reference.
    fn resolve_strict(&mut self, node: &Value, path: &[String]) -> Result<Value, String> {
        match node {
            Value::String(s) if s.contains("${") => self.resolve_string(s, path),
            Value::Mapping(map) => {
                let mut out = serde_yaml::Mapping::with_capacity(map.len());
                for (key, value) in map {
                    let mut child = path.to_vec();
                    child.push(key_to_string(key));
                    out.insert(key.clone(), self.resolve_strict(value, &child)?);
                }
                Ok(Value::Mapping(out))
            }
            Value::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let mut child = path.to_vec();
                    child.push(index.to_string());
                    out.push(self.resolve_strict(item, &child)?);
                }
                Ok(Value::Sequence(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn resolve_string(&mut self, s: &str, here: &[String]) -> Result<Value, String> {
        let pieces = split_pieces(s)?;
        if let [Piece::Interp(expr)] = pieces.as_slice() {
            return self.eval(expr, here);
        }
        let mut out = String::new();
        for piece in pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Interp(expr) => out.push_str(&scalar_text(&self.eval(expr, here)?)?),
            }
        }
        Ok(Value::String(out))
    }

    fn eval(&mut self, expr: &str, here: &[String]) -> Result<Value, String> {
        if self.stack.len() >= MAX_DEPTH {
            return Err("interpolation nesting too deep".to_string());
        }
        // Nested interpolations inside the expression are expanded first.
        let expr = if expr.contains("${") {
            scalar_text(&self.resolve_string(expr, here)?)?
        } else {
            expr.to_string()
        };
        let expr = expr.trim();

        if let Some((name, args)) = split_resolver(expr) {
            return self.call_resolver(name, args, here);
        }

        let target = target_path(expr, here)?;
        let key = target.join(".");
        if self.stack.contains(&key) {
            return Err(format!("interpolation cycle through '{key}'"));
        }
        let segments: Vec<&str> = target.iter().map(String::as_str).collect();
        let node = get_path(self.root, &segments)
            .ok_or_else(|| format!("interpolation key '{key}' not found"))?;

        self.stack.push(key);
        let result = self.resolve_strict(node, &target);
        self.stack.pop();
        result
    }

    fn call_resolver(&mut self, name: &str, args: &str, _here: &[String]) -> Result<Value, String> {
        match name {
            "oc.env" | "env" => {
                let (var, default) = match args.split_once(',') {
                    Some((var, default)) => (var.trim(), Some(default.trim())),
                    None => (args.trim(), None),
                };
                match ((self.env)(var), default) {
                    (Some(value), _) => Ok(Value::String(value)),
                    (None, Some(default)) => Ok(parse_value(default)),
                    (None, None) => Err(format!("environment variable '{var}' is not set")),
                }
            }
            other => Err(format!("unsupported resolver '{other}'")),
        }
    }
}

/// `name:args` if `expr` is a resolver call.
fn split_resolver(expr: &str) -> Option<(&str, &str)> {
    let (name, args) = expr.split_once(':')?;
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    valid.then_some((name, args))
}

/// Absolute path targeted by a key expression evaluated at `here`.
fn target_path(expr: &str, here: &[String]) -> Result<Vec<String>, String> {
    let dots = expr.chars().take_while(|c| *c == '.').count();
    let rest = &expr[dots..];

    let mut base: Vec<String> = if dots == 0 {
        Vec::new()
    } else {
        // One dot is the containing node; each further dot climbs a level.
        let climb = dots;
        if climb > here.len() {
            return Err(format!("relative interpolation '{expr}' climbs above the root"));
        }
        here[..here.len() - climb].to_vec()
    };

    base.extend(rest.split('.').filter(|s| !s.is_empty()).map(str::to_string));
    if base.is_empty() && rest.is_empty() && dots == 0 {
        return Err("empty interpolation".to_string());
    }
    Ok(base)
}

fn key_to_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => scalar_text(other).unwrap_or_else(|_| format!("{other:?}")),
    }
}

fn scalar_text(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Mapping(_) | Value::Sequence(_) => {
            Err("cannot embed a mapping or sequence inside a string".to_string())
        }
    }
}
