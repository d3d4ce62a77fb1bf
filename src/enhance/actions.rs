//! Action-snippet enhancer
//!
//! The site-script schema describes `actions` as an array whose items are an
//! `anyOf` over `#/definitions/<action>` pointers. Each referenced definition
//! becomes one snippet on the items node, anchored on the action's `verb`
//! value, with a tab-stop for every other required field. Required fields
//! constrained by an anchored alternation pattern also get one snippet per
//! alternative on their own node.

use tracing::{debug, info};

use super::snippets::{enum_snippets, variant_snippet, DISCRIMINATOR_FIELD};
use super::SchemaEnhancer;
use crate::error::{MalformedSchemaError, Result};
use crate::schema::{definition_name, Items, Schema, SchemaObject, Snippet};

const ITEMS_PATH: &str = "properties.actions.items";

/// Adds per-action snippets to the site-script actions schema
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionSnippetEnhancer;

impl SchemaEnhancer for ActionSnippetEnhancer {
    fn name(&self) -> &'static str {
        "action"
    }

    fn local_filename(&self) -> &'static str {
        "sitescript.schema.json"
    }

    fn configuration_key(&self) -> &'static str {
        "schema_url"
    }

    fn enhance(&self, mut root: SchemaObject) -> Result<SchemaObject> {
        let references = action_references(&root)?;

        let mut snippets = Vec::with_capacity(references.len());
        for reference in &references {
            let name = definition_name(reference).ok_or_else(|| MalformedSchemaError::UnresolvedRef {
                reference: reference.clone(),
            })?;
            let definition = root.resolve_definition_ref(reference)?;
            snippets.push(enhance_action(name, definition)?);
        }

        let count = snippets.len();
        action_items_mut(&mut root)?.default_snippets = Some(snippets);
        info!(variants = count, "action snippets generated");

        Ok(root)
    }
}

/// The `$ref` pointers of the actions `anyOf`, in source order
fn action_references(root: &SchemaObject) -> std::result::Result<Vec<String>, MalformedSchemaError> {
    let items = action_items(root)?;
    let any_of = items
        .any_of
        .as_ref()
        .ok_or_else(|| MalformedSchemaError::missing(format!("{ITEMS_PATH}.anyOf")))?;

    any_of
        .iter()
        .enumerate()
        .map(|(index, member)| {
            member
                .as_object()
                .and_then(|obj| obj.reference.clone())
                .ok_or(MalformedSchemaError::NotAReference { index })
        })
        .collect()
}

fn action_items(root: &SchemaObject) -> std::result::Result<&SchemaObject, MalformedSchemaError> {
    let actions = root
        .property("actions")
        .ok_or_else(|| MalformedSchemaError::missing("properties.actions"))?;
    match &actions.items {
        Some(Items::Single(Schema::Object(items))) => Ok(items),
        Some(_) => Err(unexpected_items()),
        None => Err(MalformedSchemaError::missing(ITEMS_PATH)),
    }
}

fn action_items_mut(root: &mut SchemaObject) -> std::result::Result<&mut SchemaObject, MalformedSchemaError> {
    let actions = root
        .property_mut("actions")
        .ok_or_else(|| MalformedSchemaError::missing("properties.actions"))?;
    match &mut actions.items {
        Some(Items::Single(Schema::Object(items))) => Ok(items),
        Some(_) => Err(unexpected_items()),
        None => Err(MalformedSchemaError::missing(ITEMS_PATH)),
    }
}

fn unexpected_items() -> MalformedSchemaError {
    MalformedSchemaError::UnexpectedShape {
        path: ITEMS_PATH.to_string(),
        expected: "a single schema object".to_string(),
    }
}

/// Build the snippet for one action and enrich its enum-like required fields
fn enhance_action(
    name: &str,
    definition: &mut SchemaObject,
) -> std::result::Result<Snippet, MalformedSchemaError> {
    let effective = effective_properties(name, definition)?;
    let required = effective.required.clone().unwrap_or_default();

    for field in &required {
        let node = effective
            .properties
            .as_mut()
            .and_then(|props| props.get_mut(field.as_str()));
        match node {
            Some(Schema::Object(node)) => attach_enum_snippets(node),
            Some(Schema::Bool(_)) => {}
            None if field == DISCRIMINATOR_FIELD => {}
            None => {
                return Err(MalformedSchemaError::MissingRequiredProperty {
                    definition: name.to_string(),
                    field: field.clone(),
                })
            }
        }
    }

    Ok(variant_snippet(name, required.iter().map(String::as_str)))
}

/// The node holding an action's own `properties`/`required`.
///
/// Actions that extend the base action via `allOf` declare their fields on the
/// first `allOf` member with `properties`. `additionalProperties` next to such
/// an `allOf` rejects the inherited base fields, so it is removed.
fn effective_properties<'a>(
    name: &str,
    definition: &'a mut SchemaObject,
) -> std::result::Result<&'a mut SchemaObject, MalformedSchemaError> {
    if definition.all_of.is_none() {
        return Ok(definition);
    }

    if definition.additional_properties.take().is_some() {
        debug!(definition = name, "removed additionalProperties alongside allOf");
    }

    definition
        .all_of
        .iter_mut()
        .flatten()
        .filter_map(Schema::as_object_mut)
        .find(|member| member.properties.is_some())
        .ok_or_else(|| MalformedSchemaError::NoPropertiesMember {
            definition: name.to_string(),
        })
}

fn attach_enum_snippets(node: &mut SchemaObject) {
    if let Some(snippets) = node.pattern.as_deref().and_then(enum_snippets) {
        node.default_snippets = Some(snippets);
    }
}
