//! Serve-configuration enhancer
//!
//! Installs the `gulp serve` configuration definitions into the serve schema
//! and links them from a top-level `serveConfigurations` property. Nothing in
//! the fetched document is inspected apart from its `properties` map.

use serde_json::{json, Value};
use tracing::info;

use super::SchemaEnhancer;
use crate::error::{MalformedSchemaError, Result};
use crate::schema::{Schema, SchemaObject};

/// Keys of custom actions are extension component GUIDs
pub const GUID_PATTERN: &str = "^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$";

/// Any key containing a lowercase letter names a serve configuration
pub const CONFIGURATION_NAME_PATTERN: &str = "[a-z]";

pub const CUSTOM_ACTION_DETAILS: &str = "customActionDetails";
pub const CUSTOM_ACTION: &str = "customAction";
pub const SERVE_CONFIGURATION: &str = "serveConfiguration";
pub const SERVE_CONFIGURATIONS: &str = "serveConfigurations";

/// Adds serve-configuration definitions to the serve schema
#[derive(Debug, Clone, Copy, Default)]
pub struct ServeConfigEnhancer;

impl SchemaEnhancer for ServeConfigEnhancer {
    fn name(&self) -> &'static str {
        "serve"
    }

    fn local_filename(&self) -> &'static str {
        "serve.schema.json"
    }

    fn configuration_key(&self) -> &'static str {
        "serve_schema_url"
    }

    fn enhance(&self, mut root: SchemaObject) -> Result<SchemaObject> {
        let mut link = SchemaObject::default();
        link.one_of = Some(vec![Schema::definition_ref(SERVE_CONFIGURATIONS)]);

        root.properties
            .as_mut()
            .ok_or_else(|| MalformedSchemaError::missing("properties"))?
            .insert(SERVE_CONFIGURATIONS.to_string(), link.into());

        for (name, definition) in serve_definitions() {
            root.set_definition(name, serde_json::from_value::<Schema>(definition)?);
        }

        info!("serve configuration definitions installed");
        Ok(root)
    }
}

/// The injected definitions, in installation order
pub fn serve_definitions() -> [(&'static str, Value); 4] {
    [
        (CUSTOM_ACTION_DETAILS, custom_action_details()),
        (CUSTOM_ACTION, custom_action()),
        (SERVE_CONFIGURATION, serve_configuration()),
        (SERVE_CONFIGURATIONS, serve_configurations()),
    ]
}

fn custom_action_details() -> Value {
    json!({
        "type": "object",
        "properties": {
            "location": {
                "type": "string",
                "description": "CustomAction type, or location of commands",
                "defaultSnippets": [
                    {
                        "description": "Application Customizer extension",
                        "body": "ClientSideExtension.ApplicationCustomizer"
                    },
                    {
                        "description": "The context menu of the item(s)",
                        "body": "ClientSideExtension.ListViewCommandSet.ContextMenu"
                    },
                    {
                        "description": "The top command set menu in a list or library",
                        "body": "ClientSideExtension.ListViewCommandSet.CommandBar"
                    },
                    {
                        "description": "Both the context menu and the command bar",
                        "body": "ClientSideExtension.ListViewCommandSet"
                    }
                ]
            },
            "properties": {
                "type": "object",
                "description": "An optional JSON object containing properties that are available via the 'this.properties' member."
            }
        },
        "required": ["location"]
    })
}

fn custom_action() -> Value {
    json!({
        "type": "object",
        "patternProperties": {
            GUID_PATTERN: {
                "description": "Simulates a custom action. When you deploy and register this component in a site, you'll create this CustomAction object and describe all the different properties you can set on it.",
                "oneOf": [
                    {"$ref": "#/definitions/customActionDetails"}
                ]
            }
        }
    })
}

fn serve_configuration() -> Value {
    json!({
        "type": "object",
        "description": "'gulp serve' configuration",
        "properties": {
            "pageUrl": {
                "type": "string",
                "description": "URL of the modern page that should be used to test the extension"
            },
            "customActions": {
                "description": "The list of extensions that should be loaded",
                "defaultSnippets": [
                    {
                        "label": "",
                        "description": "GUID of the extension",
                        "body": {"${1:Extension GUID}": {"location": "$2", "properties": {}}}
                    }
                ],
                "$ref": "#/definitions/customAction"
            },
            "fieldCustomizers": {
                "type": "object"
            }
        },
        "additionalProperties": false,
        "oneOf": [
            {"required": ["customActions"]},
            {"required": ["fieldCustomizers"]}
        ],
        "required": ["pageUrl"]
    })
}

fn serve_configurations() -> Value {
    json!({
        "type": "object",
        "description": "Configuration objects used as the '--config' parameter for local testing",
        "patternProperties": {
            CONFIGURATION_NAME_PATTERN: {
                "allOf": [
                    {"$ref": "#/definitions/serveConfiguration"}
                ]
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::Checksum;
    use crate::error::EnhancerError;
    use crate::schema::SnippetBody;
    use regex::Regex;

    fn input() -> SchemaObject {
        SchemaObject::from_value(json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "properties": {
                "port": {"type": "number"},
                "serveConfigurations": {"type": "string"}
            },
            "definitions": {
                "customAction": {"type": "string"},
                "unrelated": {"type": "boolean"}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_installs_definitions_and_link() {
        let out = ServeConfigEnhancer.enhance(input()).unwrap();
        let defs = out.definitions.as_ref().unwrap();

        for name in [CUSTOM_ACTION_DETAILS, CUSTOM_ACTION, SERVE_CONFIGURATION, SERVE_CONFIGURATIONS] {
            assert!(defs.contains_key(name), "missing {name}");
        }
        assert!(defs.contains_key("unrelated"));

        let custom_action = defs[CUSTOM_ACTION].as_object().unwrap();
        assert!(custom_action.pattern_properties.as_ref().unwrap().contains_key(GUID_PATTERN));

        let link = serde_json::to_value(&out.properties.as_ref().unwrap()[SERVE_CONFIGURATIONS]).unwrap();
        assert_eq!(link, json!({"oneOf": [{"$ref": "#/definitions/serveConfigurations"}]}));
        assert!(out.property("port").is_some());
    }

    #[test]
    fn test_location_snippets() {
        let out = ServeConfigEnhancer.enhance(input()).unwrap();
        let details = out.definitions.as_ref().unwrap()[CUSTOM_ACTION_DETAILS].as_object().unwrap();
        let location = details.property("location").unwrap();
        let snippets = location.default_snippets.as_ref().unwrap();

        assert_eq!(snippets.len(), 4);
        assert!(snippets.iter().all(|s| s.description.is_some() && s.label.is_none()));
        assert_eq!(snippets[0].body_text(), Some("ClientSideExtension.ApplicationCustomizer"));
        assert_eq!(details.required.as_deref(), Some(&["location".to_string()][..]));
    }

    #[test]
    fn test_custom_actions_template_snippet() {
        let out = ServeConfigEnhancer.enhance(input()).unwrap();
        let config = out.definitions.as_ref().unwrap()[SERVE_CONFIGURATION].as_object().unwrap();
        let custom_actions = config.property("customActions").unwrap();

        assert_eq!(custom_actions.reference.as_deref(), Some("#/definitions/customAction"));
        let snippet = &custom_actions.default_snippets.as_ref().unwrap()[0];
        assert_eq!(snippet.label.as_deref(), Some(""));
        match &snippet.body {
            SnippetBody::Template(body) => assert!(body.get("${1:Extension GUID}").is_some()),
            other => panic!("Expected template body, got {:?}", other),
        }
    }

    #[test]
    fn test_idempotent_injection() {
        let first = ServeConfigEnhancer.enhance(input()).unwrap();
        let second = ServeConfigEnhancer.enhance(input()).unwrap();
        assert_eq!(
            Checksum::of_json(&first.definitions).unwrap(),
            Checksum::of_json(&second.definitions).unwrap()
        );

        let again = ServeConfigEnhancer.enhance(first.clone()).unwrap();
        assert_eq!(
            serde_json::to_vec_pretty(&again).unwrap(),
            serde_json::to_vec_pretty(&first).unwrap()
        );
    }

    #[test]
    fn test_requires_properties_map() {
        let bare = SchemaObject::from_value(json!({"type": "object"})).unwrap();
        match ServeConfigEnhancer.enhance(bare) {
            Err(EnhancerError::MalformedSchema(MalformedSchemaError::MissingNode { path })) => {
                assert_eq!(path, "properties")
            }
            other => panic!("Expected missing properties, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_patterns_compile() {
        let guid = Regex::new(GUID_PATTERN).unwrap();
        assert!(guid.is_match("0b1c2d3e-4f50-6172-8394-a5b6c7d8e9f0"));
        assert!(!guid.is_match("not-a-guid"));

        let name = Regex::new(CONFIGURATION_NAME_PATTERN).unwrap();
        assert!(name.is_match("default"));
        assert!(!name.is_match("123"));
    }
}
