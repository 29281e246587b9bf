//! Generic ordered configuration tree
//!
//! Keys are kept in insertion order. Paths are dotted (`loggers.root.level`);
//! a purely numeric segment addresses a list slot (`appenders.console.0.target`).
//!
//! Merge semantics (overlay onto base):
//! - Trees: merge by key (recursive)
//! - Lists: merge slot by slot, extra overlay slots are appended
//! - Null: never replaces an existing value
//! - Scalars: overlay wins
//! - A tree meeting a list (either way): base is kept, conflict is reported
//!
//! A list index may pad at most [`MAX_LIST_GAP`] `Null` slots past the end.

use crate::error::{LoghubError, Result};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::path::Path;

/// Largest number of `Null` slots a single indexed set may pad a list with
pub const MAX_LIST_GAP: usize = 1024;

/// A node of the configuration tree
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tree(ConfigTree),
}

impl Value {
    /// Render a scalar as a string. Lists and trees have no scalar form.
    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::Null => Some(String::new()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Str(s) => Some(s.clone()),
            Value::List(_) | Value::Tree(_) => None,
        }
    }

    /// Lenient boolean view: string scalars set from override strings are accepted
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Str(s) => parse_bool(s),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Lenient integer view
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(i) if *i >= 0 => Some(*i as u64),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&ConfigTree> {
        match self {
            Value::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<ConfigTree> for Value {
    fn from(tree: ConfigTree) -> Self {
        Value::Tree(tree)
    }
}

/// Parse the boolean spellings accepted for flags and config values
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Insertion-ordered mapping from key to [`Value`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigTree {
    entries: Vec<(String, Value)>,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over the direct children in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Direct child lookup, no path splitting
    pub fn get_key(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insert or replace a direct child, keeping its original position
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        *self.entry(&key) = value;
    }

    fn entry(&mut self, key: &str) -> &mut Value {
        let pos = match self.entries.iter().position(|(k, _)| k == key) {
            Some(pos) => pos,
            None => {
                self.entries.push((key.to_string(), Value::Null));
                self.entries.len() - 1
            }
        };
        &mut self.entries[pos].1
    }

    /// Look up a value by dotted path
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut node = self.get_key(first)?;
        for segment in segments {
            node = match node {
                Value::Tree(tree) => tree.get_key(segment)?,
                Value::List(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(node)
    }

    pub fn get_tree(&self, path: &str) -> Option<&ConfigTree> {
        self.get(path).and_then(Value::as_tree)
    }

    /// Scalar at `path` rendered as a string
    pub fn get_str(&self, path: &str) -> Option<String> {
        self.get(path).and_then(Value::as_string)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Set `value` at `path`.
    ///
    /// With `index >= 0` the node at `path` is treated as a list and slot
    /// `index` is created (padding with `Null`) or replaced. With `index == -1`
    /// the value is set directly at the unindexed path. Intermediate trees and
    /// lists are created as needed.
    ///
    /// A failed set leaves no new top-level key behind.
    pub fn set(&mut self, path: &str, index: i64, value: Value) -> Result<()> {
        let segments = split_path(path)?;
        let index = match index {
            -1 => None,
            i => Some(
                usize::try_from(i)
                    .map_err(|_| invalid_path(path, format!("index {} out of range", i)))?,
            ),
        };

        let created = self.get_key(segments[0]).is_none();
        let result = self
            .set_segments(&segments, index, value)
            .map_err(|reason| invalid_path(path, reason));
        if result.is_err() && created {
            self.entries.retain(|(k, _)| k != segments[0]);
        }
        result
    }

    fn set_segments(
        &mut self,
        segments: &[&str],
        index: Option<usize>,
        value: Value,
    ) -> std::result::Result<(), String> {
        let mut node = self.entry(segments[0]);
        for segment in &segments[1..] {
            node = descend(node, segment)?;
        }

        let Some(index) = index else {
            *node = value;
            return Ok(());
        };
        if node.is_null() {
            check_gap(0, index)?;
            *node = Value::List(Vec::new());
        }
        match node {
            Value::List(items) => {
                *list_slot(items, index)? = value;
                Ok(())
            }
            _ => Err("indexed set on a non-list value".to_string()),
        }
    }

    /// Convenience for string scalars, the form override strings produce
    pub fn set_str(&mut self, path: &str, index: i64, value: &str) -> Result<()> {
        self.set(path, index, Value::Str(value.to_string()))
    }

    /// Merge `overlay` into this tree; overlay wins per path.
    ///
    /// Paths where a tree meets a list keep the base value and are returned
    /// as [`LoghubError::InvalidPath`] conflicts.
    pub fn merge(&mut self, overlay: &ConfigTree) -> Vec<LoghubError> {
        let mut conflicts = Vec::new();
        self.merge_at("", overlay, &mut conflicts);
        conflicts
    }

    fn merge_at(&mut self, prefix: &str, overlay: &ConfigTree, conflicts: &mut Vec<LoghubError>) {
        for (key, value) in &overlay.entries {
            let path = join_path(prefix, key);
            merge_value(self.entry(key), value, &path, conflicts);
        }
    }

    /// Non-mutating form of [`ConfigTree::merge`], dropping conflicts
    pub fn merged(&self, overlay: &ConfigTree) -> ConfigTree {
        let mut merged = self.clone();
        merged.merge(overlay);
        merged
    }

    /// Flatten into `(path, leaf)` pairs in document order
    pub fn leaves(&self) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        for (key, value) in &self.entries {
            collect_leaves(key.clone(), value, &mut out);
        }
        out
    }

    /// Parse a YAML (or JSON, which YAML accepts) document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let raw: serde_yaml::Value = serde_yaml::from_str(content)
            .map_err(|e| LoghubError::ParseError(format!("Failed to parse YAML: {}", e)))?;
        root_tree(from_yaml(raw))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| LoghubError::ParseError(format!("Failed to parse JSON: {}", e)))?;
        root_tree(from_json(raw))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: toml::Value = toml::from_str(content)
            .map_err(|e| LoghubError::ParseError(format!("Failed to parse TOML: {}", e)))?;
        root_tree(from_toml(raw))
    }

    /// Load a tree from a file, choosing the format by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        match extension {
            "yaml" | "yml" => Self::from_yaml_str(&contents),
            "json" => Self::from_json_str(&contents),
            "toml" => Self::from_toml_str(&contents),
            _ => Err(LoghubError::ParseError(format!(
                "Unsupported file format: {}. Use .yaml, .yml, .json or .toml",
                extension
            ))),
        }
    }

    /// Render as YAML, used for diagnostics
    pub fn to_yaml_string(&self) -> String {
        serde_yaml::to_string(self).unwrap_or_else(|e| format!("<unprintable config: {}>", e))
    }
}

fn split_path(path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(invalid_path(path, "empty path segment"));
    }
    Ok(segments)
}

fn invalid_path(path: &str, reason: impl Into<String>) -> LoghubError {
    LoghubError::InvalidPath {
        path: path.to_string(),
        reason: reason.into(),
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn check_gap(len: usize, index: usize) -> std::result::Result<(), String> {
    if index > len && index - len > MAX_LIST_GAP {
        return Err(format!(
            "list index {} is more than {} slots past the end ({} items)",
            index, MAX_LIST_GAP, len
        ));
    }
    Ok(())
}

fn list_slot(items: &mut Vec<Value>, index: usize) -> std::result::Result<&mut Value, String> {
    check_gap(items.len(), index)?;
    if items.len() <= index {
        items.resize(index + 1, Value::Null);
    }
    Ok(&mut items[index])
}

fn descend<'a>(node: &'a mut Value, segment: &str) -> std::result::Result<&'a mut Value, String> {
    let index = segment.parse::<usize>().ok();
    if node.is_null() {
        *node = match index {
            Some(index) => {
                check_gap(0, index)?;
                Value::List(Vec::new())
            }
            None => Value::Tree(ConfigTree::new()),
        };
    }
    match node {
        Value::Tree(tree) => Ok(tree.entry(segment)),
        Value::List(items) => {
            let index = index.ok_or_else(|| format!("'{}' is not a list index", segment))?;
            list_slot(items, index)
        }
        _ => Err(format!("cannot descend into scalar at '{}'", segment)),
    }
}

fn merge_value(base: &mut Value, overlay: &Value, path: &str, conflicts: &mut Vec<LoghubError>) {
    match (base, overlay) {
        (Value::Tree(base), Value::Tree(overlay)) => base.merge_at(path, overlay, conflicts),
        (Value::List(base), Value::List(overlay)) => {
            for (i, item) in overlay.iter().enumerate() {
                match base.get_mut(i) {
                    Some(slot) => merge_value(slot, item, &join_path(path, &i.to_string()), conflicts),
                    None => base.push(item.clone()),
                }
            }
        }
        (_, Value::Null) => {}
        (Value::List(_), Value::Tree(_)) => {
            conflicts.push(invalid_path(path, "cannot merge a mapping into a list"))
        }
        (Value::Tree(_), Value::List(_)) => {
            conflicts.push(invalid_path(path, "cannot merge a list into a mapping"))
        }
        (slot, overlay) => *slot = overlay.clone(),
    }
}

fn collect_leaves(prefix: String, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Tree(tree) if !tree.is_empty() => {
            for (key, child) in &tree.entries {
                collect_leaves(format!("{}.{}", prefix, key), child, out);
            }
        }
        Value::List(items) if !items.is_empty() => {
            for (i, child) in items.iter().enumerate() {
                collect_leaves(format!("{}.{}", prefix, i), child, out);
            }
        }
        leaf => out.push((prefix, leaf.clone())),
    }
}

fn root_tree(value: Value) -> Result<ConfigTree> {
    match value {
        Value::Tree(tree) => Ok(tree),
        Value::Null => Ok(ConfigTree::new()),
        _ => Err(LoghubError::ParseError(
            "Top-level configuration must be a mapping".to_string(),
        )),
    }
}

fn from_yaml(raw: serde_yaml::Value) -> Value {
    match raw {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or_default()),
        },
        serde_yaml::Value::String(s) => Value::Str(s),
        serde_yaml::Value::Sequence(items) => {
            Value::List(items.into_iter().map(from_yaml).collect())
        }
        serde_yaml::Value::Mapping(map) => {
            let mut tree = ConfigTree::new();
            for (key, value) in map {
                let key = from_yaml(key).as_string().unwrap_or_default();
                tree.insert(key, from_yaml(value));
            }
            Value::Tree(tree)
        }
        serde_yaml::Value::Tagged(tagged) => from_yaml(tagged.value),
    }
}

fn from_json(raw: serde_json::Value) -> Value {
    match raw {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or_default()),
        },
        serde_json::Value::String(s) => Value::Str(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            let mut tree = ConfigTree::new();
            for (key, value) in map {
                tree.insert(key, from_json(value));
            }
            Value::Tree(tree)
        }
    }
}

fn from_toml(raw: toml::Value) -> Value {
    match raw {
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Integer(i) => Value::Int(i),
        toml::Value::Float(f) => Value::Float(f),
        toml::Value::String(s) => Value::Str(s),
        toml::Value::Datetime(d) => Value::Str(d.to_string()),
        toml::Value::Array(items) => Value::List(items.into_iter().map(from_toml).collect()),
        toml::Value::Table(table) => {
            let mut tree = ConfigTree::new();
            for (key, value) in table {
                tree.insert(key, from_toml(value));
            }
            Value::Tree(tree)
        }
    }
}

impl Serialize for ConfigTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Tree(tree) => tree.serialize(serializer),
        }
    }
}
