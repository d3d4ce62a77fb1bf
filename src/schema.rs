//! Schema tree types
//!
//! A fetched JSON-Schema document is held as a typed tree instead of raw
//! `serde_json::Value` so that optional keywords (`pattern`, `allOf`,
//! `defaultSnippets`, ...) are plain `Option` checks. Keywords the enhancers
//! do not touch are kept in a flattened `extra` map and written back out
//! unchanged.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::MalformedSchemaError;

/// Keyed child schemas, in document order
pub type SchemaMap = IndexMap<String, Schema>;

/// Prefix of local pointers into the definitions table
pub const DEFINITIONS_REF_PREFIX: &str = "#/definitions/";

/// A schema node: either a boolean schema or a schema object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Schema {
    Bool(bool),
    Object(Box<SchemaObject>),
}

/// The keywords of a schema object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaObject {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub meta_schema: Option<String>,

    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// `type` may be a single name or a list of names
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<SchemaMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_properties: Option<SchemaMap>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Schema>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Items>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<Schema>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<Schema>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Schema>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Editor completion candidates (not a validation keyword)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_snippets: Option<Vec<Snippet>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definitions: Option<SchemaMap>,

    /// Every other keyword, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `items` is either one schema for every element or a tuple of schemas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Items {
    Single(Schema),
    Tuple(Vec<Schema>),
}

/// One autocompletion candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub body: SnippetBody,
}

/// Snippet body: text with `$n` tab-stops, or a JSON template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnippetBody {
    Text(String),
    Template(Value),
}

impl Snippet {
    /// A labelled text snippet
    pub fn text(label: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            description: None,
            body: SnippetBody::Text(body.into()),
        }
    }

    pub fn body_text(&self) -> Option<&str> {
        match &self.body {
            SnippetBody::Text(text) => Some(text),
            SnippetBody::Template(_) => None,
        }
    }
}

impl Schema {
    /// A local pointer to a named definition
    pub fn definition_ref(name: &str) -> Self {
        Schema::Object(Box::new(SchemaObject {
            reference: Some(format!("{DEFINITIONS_REF_PREFIX}{name}")),
            ..Default::default()
        }))
    }

    pub fn as_object(&self) -> Option<&SchemaObject> {
        match self {
            Schema::Object(obj) => Some(obj),
            Schema::Bool(_) => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut SchemaObject> {
        match self {
            Schema::Object(obj) => Some(obj),
            Schema::Bool(_) => None,
        }
    }
}

impl From<SchemaObject> for Schema {
    fn from(obj: SchemaObject) -> Self {
        Schema::Object(Box::new(obj))
    }
}

impl SchemaObject {
    /// Parse a fetched document; the root must be a schema object
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn property(&self, name: &str) -> Option<&SchemaObject> {
        self.properties.as_ref()?.get(name)?.as_object()
    }

    pub fn property_mut(&mut self, name: &str) -> Option<&mut SchemaObject> {
        self.properties.as_mut()?.get_mut(name)?.as_object_mut()
    }

    /// Look up a `#/definitions/<name>` pointer in this node's definitions table
    pub fn resolve_definition_ref(
        &mut self,
        reference: &str,
    ) -> Result<&mut SchemaObject, MalformedSchemaError> {
        let unresolved = || MalformedSchemaError::UnresolvedRef {
            reference: reference.to_string(),
        };
        let name = definition_name(reference).ok_or_else(unresolved)?;
        self.definitions
            .as_mut()
            .and_then(|defs| defs.get_mut(name))
            .and_then(Schema::as_object_mut)
            .ok_or_else(unresolved)
    }

    /// Insert or replace a named definition
    pub fn set_definition(&mut self, name: impl Into<String>, schema: Schema) {
        self.definitions
            .get_or_insert_with(SchemaMap::new)
            .insert(name.into(), schema);
    }
}

/// The definition name a local pointer refers to, if it is one
pub fn definition_name(reference: &str) -> Option<&str> {
    reference
        .strip_prefix(DEFINITIONS_REF_PREFIX)
        .filter(|name| !name.is_empty())
}
