//! Generic document tree
//!
//! One tree type serves both the legacy manifest (parsed from JSON, nodes
//! carry the location they were read from) and the generated project
//! document (synthesized, no locations). Mappings keep insertion order.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::ConvertError;

/// Where a node was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// 1-based line
    pub line: usize,
    /// 1-based column
    pub column: usize,
    /// Logical path within the document, e.g. `assets.runtime['foo.dll']`
    pub path: String,
}

impl Location {
    pub fn new(line: usize, column: usize, path: impl Into<String>) -> Self {
        Self {
            line,
            column,
            path: path.into(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)?;
        if !self.path.is_empty() {
            write!(f, " ({})", self.path)?;
        }
        Ok(())
    }
}

/// How a scalar should be rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalarStyle {
    /// Rendered as-is; may be read back as a number or boolean
    #[default]
    Plain,
    /// Always a string
    Quoted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar {
    pub value: String,
    pub style: ScalarStyle,
}

/// Ordered mapping with unique keys
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mapping {
    entries: Vec<(String, Node)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert a value, merging into the existing value when the key is taken.
    pub fn insert(&mut self, key: impl Into<String>, value: Node) -> Result<(), ConvertError> {
        let key = key.into();
        match self.get_mut(&key) {
            Some(existing) => crate::merge::merge(existing, value),
            None => {
                self.entries.push((key, value));
                Ok(())
            }
        }
    }

    /// Remove a key, keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Node> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn push_unchecked(&mut self, key: String, value: Node) {
        self.entries.push((key, value));
    }
}

impl IntoIterator for Mapping {
    type Item = (String, Node);
    type IntoIter = std::vec::IntoIter<(String, Node)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Mapping(Mapping),
    Sequence(Vec<Node>),
    Scalar(Scalar),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Mapping(_) => "mapping",
            NodeKind::Sequence(_) => "sequence",
            NodeKind::Scalar(_) => "scalar",
        }
    }
}

/// A document node with optional source location
///
/// Equality compares content only; locations are diagnostics.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub location: Option<Location>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl From<Mapping> for Node {
    fn from(mapping: Mapping) -> Self {
        Node::new(NodeKind::Mapping(mapping))
    }
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            location: None,
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn mapping() -> Self {
        Mapping::new().into()
    }

    pub fn sequence(items: Vec<Node>) -> Self {
        Node::new(NodeKind::Sequence(items))
    }

    pub fn plain(value: impl Into<String>) -> Self {
        Node::new(NodeKind::Scalar(Scalar {
            value: value.into(),
            style: ScalarStyle::Plain,
        }))
    }

    pub fn quoted(value: impl Into<String>) -> Self {
        Node::new(NodeKind::Scalar(Scalar {
            value: value.into(),
            style: ScalarStyle::Quoted,
        }))
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match &self.kind {
            NodeKind::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match &mut self.kind {
            NodeKind::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Scalar text regardless of style
    pub fn as_scalar(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar(scalar) => Some(&scalar.value),
            _ => None,
        }
    }

    /// Scalar text, only for quoted (string) scalars
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar(Scalar {
                value,
                style: ScalarStyle::Quoted,
            }) => Some(value),
            _ => None,
        }
    }

    /// Look up a nested mapping value by a sequence of keys.
    pub fn pointer(&self, keys: &[&str]) -> Option<&Node> {
        keys.iter()
            .try_fold(self, |node, key| node.as_mapping()?.get(key))
    }

    /// True when no scalar is reachable from this node.
    pub fn is_structurally_empty(&self) -> bool {
        match &self.kind {
            NodeKind::Mapping(mapping) => mapping.iter().all(|(_, v)| v.is_structurally_empty()),
            NodeKind::Sequence(items) => items.iter().all(Node::is_structurally_empty),
            NodeKind::Scalar(_) => false,
        }
    }

    /// Convert a parsed YAML document into a tree.
    pub fn from_yaml(value: serde_yaml::Value) -> Result<Node, ConvertError> {
        use serde_yaml::Value;

        let node = match value {
            Value::Null => Node::plain("null"),
            Value::Bool(b) => Node::plain(b.to_string()),
            Value::Number(n) => Node::plain(n.to_string()),
            Value::String(s) => Node::quoted(s),
            Value::Sequence(items) => Node::sequence(
                items
                    .into_iter()
                    .map(Node::from_yaml)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Mapping(map) => {
                let mut mapping = Mapping::new();
                for (key, value) in map {
                    let key = match key {
                        Value::String(s) => s,
                        other => serde_yaml::to_string(&other)?.trim_end().to_string(),
                    };
                    mapping.insert(key, Node::from_yaml(value)?)?;
                }
                mapping.into()
            }
            Value::Tagged(tagged) => Node::from_yaml(tagged.value)?,
        };
        Ok(node)
    }

    /// Convert a parsed JSON value into a tree without locations.
    pub fn from_json(value: serde_json::Value) -> Node {
        use serde_json::Value;

        match value {
            Value::Null => Node::plain("null"),
            Value::Bool(b) => Node::plain(b.to_string()),
            Value::Number(n) => Node::plain(n.to_string()),
            Value::String(s) => Node::quoted(s),
            Value::Array(items) => Node::sequence(items.into_iter().map(Node::from_json).collect()),
            Value::Object(map) => {
                let mut mapping = Mapping::new();
                for (key, value) in map {
                    mapping.push_unchecked(key, Node::from_json(value));
                }
                mapping.into()
            }
        }
    }

    /// Convert back into JSON, reading plain scalars as JSON literals.
    pub fn to_json_value(&self) -> serde_json::Value {
        use serde_json::Value;

        match &self.kind {
            NodeKind::Mapping(mapping) => Value::Object(
                mapping
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_json_value()))
                    .collect(),
            ),
            NodeKind::Sequence(items) => {
                Value::Array(items.iter().map(Node::to_json_value).collect())
            }
            NodeKind::Scalar(Scalar {
                value,
                style: ScalarStyle::Quoted,
            }) => Value::String(value.clone()),
            NodeKind::Scalar(Scalar {
                value,
                style: ScalarStyle::Plain,
            }) => match serde_json::from_str::<Value>(value) {
                Ok(literal @ (Value::Null | Value::Bool(_) | Value::Number(_))) => literal,
                _ => Value::String(value.clone()),
            },
        }
    }
}

/// Append a mapping key to a logical path.
pub(crate) fn child_path(parent: &str, key: &str) -> String {
    let simple = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    match (parent.is_empty(), simple) {
        (true, true) => key.to_string(),
        (false, true) => format!("{parent}.{key}"),
        (_, false) => format!("{parent}['{}']", key.replace('\'', "\\'")),
    }
}

/// Append a sequence index to a logical path.
pub(crate) fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.kind {
            NodeKind::Mapping(mapping) => {
                let mut map = serializer.serialize_map(Some(mapping.len()))?;
                for (key, value) in mapping.iter() {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            NodeKind::Sequence(items) => serializer.collect_seq(items),
            NodeKind::Scalar(scalar) => scalar.serialize(serializer),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.style == ScalarStyle::Quoted {
            return serializer.serialize_str(&self.value);
        }

        match self.value.as_str() {
            "null" | "~" => return serializer.serialize_unit(),
            "true" => return serializer.serialize_bool(true),
            "false" => return serializer.serialize_bool(false),
            ".inf" | "+.inf" => return serializer.serialize_f64(f64::INFINITY),
            "-.inf" => return serializer.serialize_f64(f64::NEG_INFINITY),
            ".nan" => return serializer.serialize_f64(f64::NAN),
            _ => {}
        }

        if let Ok(int) = self.value.parse::<i64>() {
            return serializer.serialize_i64(int);
        }
        if let Ok(int) = self.value.parse::<u64>() {
            return serializer.serialize_u64(int);
        }

        // Non-finite spellings other than YAML's stay text
        if let Ok(float) = self.value.parse::<f64>()
            && float.is_finite()
        {
            return serializer.serialize_f64(float);
        }

        serializer.serialize_str(&self.value)
    }
}
