//! MCP tool catalog
//!
//! Maps the agent-facing tool names onto bridge commands. The socket backend
//! never sees this table; it only checks arguments on the agent side.

use std::sync::OnceLock;

use serde_json::{json, Value};

use scenebridge_protocol::Params;

use super::error::McpError;
use super::protocol::Tool;

/// One catalog entry
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Name the agent calls
    pub name: &'static str,
    /// Bridge command it translates to
    pub command: &'static str,
    pub description: &'static str,
    /// JSON Schema for the arguments
    pub input_schema: Value,
}

impl ToolSpec {
    /// Names listed under the schema's `required` key
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.input_schema["required"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
    }

    /// Reject arguments missing a required field
    ///
    /// Types are left to the handler on the host side.
    pub fn check_arguments(&self, arguments: &Params) -> Result<(), McpError> {
        let missing: Vec<&str> = self
            .required_fields()
            .filter(|field| arguments.get(*field).map_or(true, Value::is_null))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(McpError::InvalidParams(format!(
                "Missing required argument(s) for '{}': {}",
                self.name,
                missing.join(", ")
            )))
        }
    }

    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.into(),
            description: self.description.into(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// Static set of tools exposed by both transports
#[derive(Debug)]
pub struct ToolCatalog {
    specs: Vec<ToolSpec>,
}

impl ToolCatalog {
    /// The process-wide catalog
    pub fn global() -> &'static ToolCatalog {
        static CATALOG: OnceLock<ToolCatalog> = OnceLock::new();
        CATALOG.get_or_init(|| ToolCatalog {
            specs: tool_specs(),
        })
    }

    pub fn find(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Definitions as returned by `tools/list`
    pub fn tools(&self) -> Vec<Tool> {
        self.specs.iter().map(ToolSpec::to_tool).collect()
    }
}

fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "get_scene_info",
            command: "get_scene_info",
            description: "Get a lightweight overview of the current scene: the unit system and \
                every layer with its object count and up to 5 example objects with their metadata. \
                Use this first, before changing anything.",
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolSpec {
            name: "get_layers",
            command: "get_layers",
            description: "List the layers in the scene with visibility, lock state, color and object count",
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolSpec {
            name: "get_objects_with_metadata",
            command: "get_objects_with_metadata",
            description: "Get objects with the metadata recorded for them (short_id in DDHHMMSS \
                format, created_at, layer, type, bbox corners, name, description). Filter by layer \
                or name (wildcards like 'Wall*' allowed, case-insensitive) or by exact short_id, and \
                pick which metadata fields to return.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "filters": {
                        "type": "object",
                        "description": "Optional filters",
                        "properties": {
                            "layer": {
                                "type": "string",
                                "description": "Layer name, wildcards allowed"
                            },
                            "name": {
                                "type": "string",
                                "description": "Object name, wildcards allowed"
                            },
                            "short_id": {
                                "type": "string",
                                "description": "Exact short id (DDHHMMSS)"
                            }
                        }
                    },
                    "metadata_fields": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Metadata fields to return (default: all)"
                    }
                }
            }),
        },
        ToolSpec {
            name: "get_selected_objects",
            command: "get_selected_objects",
            description: "Get the objects currently selected in the scene, with their ids and metadata",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "include_lights": {
                        "type": "boolean",
                        "description": "Include light objects (default: false)"
                    },
                    "include_grips": {
                        "type": "boolean",
                        "description": "Include grip objects (default: false)"
                    }
                }
            }),
        },
        ToolSpec {
            name: "create_cube",
            command: "create_cube",
            description: "Create a cube centred on a location. Call add_object_metadata afterwards \
                so the object can be found again.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "size": {
                        "type": "number",
                        "description": "Edge length (default: 1.0)"
                    },
                    "location": {
                        "type": "array",
                        "items": { "type": "number" },
                        "minItems": 3,
                        "maxItems": 3,
                        "description": "Centre point [x, y, z] (default: origin)"
                    },
                    "name": {
                        "type": "string",
                        "description": "Object name (default: Cube)"
                    },
                    "layer": {
                        "type": "string",
                        "description": "Target layer, created if missing (default: current layer)"
                    }
                }
            }),
        },
        ToolSpec {
            name: "add_object_metadata",
            command: "add_object_metadata",
            description: "Attach standard metadata to an object: a DDHHMMSS short id, creation \
                time, layer, type, bounding box, and the given name and description. Always do \
                this after creating an object.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "object_id": {
                        "type": "string",
                        "description": "Object UUID"
                    },
                    "name": {
                        "type": "string",
                        "description": "Object name (default: <type>_<short_id>)"
                    },
                    "description": {
                        "type": "string",
                        "description": "What the object is for"
                    }
                },
                "required": ["object_id"]
            }),
        },
        ToolSpec {
            name: "execute_code",
            command: "execute_code",
            description: "Run a scene script on the host. One statement per line:\n\
                `layer <name>` adds a layer, `use <name>` makes it current,\n\
                `cube size=<n> at=<x>,<y>,<z> name=<name>` adds a cube (`$last` holds its id),\n\
                `select <pattern>` / `delete <pattern>` act on objects by name (wildcards),\n\
                `print <text>` adds a line to printed_output, `set result <value>` sets the result,\n\
                `fail <message>` aborts. Lines starting with # are comments.\n\
                Show the user the code you run, and add metadata to created objects.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "code": {
                        "type": "string",
                        "description": "Script to execute"
                    }
                },
                "required": ["code"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_names_are_unique() {
        let catalog = ToolCatalog::global();
        let names: HashSet<&str> = catalog.specs().iter().map(|s| s.name).collect();
        assert_eq!(names.len(), catalog.specs().len());
        assert_eq!(catalog.specs().len(), 7);
    }

    #[test]
    fn test_schemas_are_objects() {
        for spec in ToolCatalog::global().specs() {
            assert_eq!(spec.input_schema["type"], "object", "tool {}", spec.name);
            assert!(spec.input_schema["properties"].is_object(), "tool {}", spec.name);
            assert!(!spec.description.is_empty());
        }
    }

    #[test]
    fn test_find() {
        let catalog = ToolCatalog::global();
        assert_eq!(catalog.find("execute_code").unwrap().command, "execute_code");
        assert!(catalog.find("capture_viewport").is_none());
    }

    #[test]
    fn test_required_fields() {
        let spec = ToolCatalog::global().find("add_object_metadata").unwrap();
        assert_eq!(spec.required_fields().collect::<Vec<_>>(), vec!["object_id"]);

        let spec = ToolCatalog::global().find("get_layers").unwrap();
        assert_eq!(spec.required_fields().count(), 0);
    }

    #[test]
    fn test_check_arguments() {
        let spec = ToolCatalog::global().find("execute_code").unwrap();

        let mut args = Params::new();
        let err = spec.check_arguments(&args).unwrap_err();
        assert!(err.to_string().contains("code"));

        args.insert("code".into(), Value::Null);
        assert!(spec.check_arguments(&args).is_err());

        args.insert("code".into(), json!("print hi"));
        assert!(spec.check_arguments(&args).is_ok());
    }

    #[test]
    fn test_tools_serialize_with_input_schema() {
        let tools = ToolCatalog::global().tools();
        let json = serde_json::to_value(&tools).unwrap();
        assert!(json[0]["inputSchema"].is_object());
    }
}
