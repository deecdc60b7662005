//! Command handlers for the demo scene
//!
//! Each handler validates its own parameters; the bridge never looks inside
//! them.

use std::collections::BTreeMap;

use chrono::{Local, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use scenebridge_protocol::Params;

use crate::dispatch::{typed, CommandHandler, HandlerFault, HandlerRegistry, RegistryError};
use crate::scene::{wildcard_regex, ObjectKind, Scene, SceneObject};
use crate::script::{SceneScript, ScriptEngine};

/// Metadata fields every object reports
pub const REQUIRED_FIELDS: [&str; 4] = ["id", "name", "type", "layer"];

/// Metadata fields stored as user text
pub const OPTIONAL_FIELDS: [&str; 5] = ["short_id", "created_at", "bbox", "description", "user_text"];

/// Example objects listed per layer in `get_scene_info`
const EXAMPLES_PER_LAYER: usize = 5;

/// Result of `execute_code` when the script sets none
const DEFAULT_SCRIPT_RESULT: &str = "Code executed successfully";

/// Registry with every scene command and the built-in script engine
pub fn scene_registry() -> Result<HandlerRegistry<Scene>, RegistryError> {
    let mut registry = HandlerRegistry::new();
    register_scene_handlers(&mut registry, Box::new(SceneScript::new()))?;
    Ok(registry)
}

/// Register the scene commands, running `execute_code` through `engine`
pub fn register_scene_handlers(
    registry: &mut HandlerRegistry<Scene>,
    engine: Box<dyn ScriptEngine<Scene>>,
) -> Result<(), RegistryError> {
    registry.register("get_scene_info", typed(get_scene_info))?;
    registry.register("get_layers", typed(get_layers))?;
    registry.register("get_objects_with_metadata", typed(get_objects_with_metadata))?;
    registry.register("get_selected_objects", typed(get_selected_objects))?;
    registry.register("create_cube", typed(create_cube))?;
    registry.register("add_object_metadata", typed(add_object_metadata))?;
    registry.register("execute_code", ExecuteCode::new(engine))?;
    info!(commands = registry.len(), "Scene handlers registered");
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct NoParams {}

fn get_scene_info(scene: &mut Scene, _: NoParams) -> Result<Value, HandlerFault> {
    let layers: Vec<Value> = scene
        .layers()
        .iter()
        .map(|layer| {
            let objects: Vec<&SceneObject> = scene.objects_on_layer(&layer.name).collect();
            let examples: Vec<Value> = objects
                .iter()
                .take(EXAMPLES_PER_LAYER)
                .map(|obj| {
                    json!({
                        "id": obj.id.to_string(),
                        "name": obj.display_name(),
                        "type": obj.kind.type_name(),
                        "metadata": obj.user_text,
                    })
                })
                .collect();

            json!({
                "full_path": layer.name,
                "object_count": objects.len(),
                "is_visible": layer.visible,
                "is_locked": layer.locked,
                "example_objects": examples,
            })
        })
        .collect();

    Ok(json!({
        "unit_system": scene.units(),
        "layers": layers,
    }))
}

fn get_layers(scene: &mut Scene, _: NoParams) -> Result<Value, HandlerFault> {
    let layers: Vec<Value> = scene
        .layers()
        .iter()
        .map(|layer| {
            json!({
                "name": layer.name,
                "full_path": layer.name,
                "object_count": scene.objects_on_layer(&layer.name).count(),
                "is_visible": layer.visible,
                "is_locked": layer.locked,
                "color": layer.color,
            })
        })
        .collect();
    Ok(Value::Array(layers))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ObjectFilters {
    layer: Option<String>,
    name: Option<String>,
    short_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ObjectQuery {
    filters: Option<ObjectFilters>,
    metadata_fields: Option<Vec<String>>,
}

fn available_fields() -> Vec<&'static str> {
    REQUIRED_FIELDS.iter().chain(OPTIONAL_FIELDS.iter()).copied().collect()
}

/// User text with the typed fields decoded back from their string form
fn stored_metadata(obj: &SceneObject) -> Map<String, Value> {
    obj.user_text
        .iter()
        .map(|(key, value)| {
            let value = match key.as_str() {
                "bbox" => serde_json::from_str(value).unwrap_or_else(|_| json!([])),
                "created_at" => value.parse::<f64>().map(|v| json!(v)).unwrap_or_else(|_| json!(0)),
                _ => Value::String(value.clone()),
            };
            (key.clone(), value)
        })
        .collect()
}

fn get_objects_with_metadata(scene: &mut Scene, query: ObjectQuery) -> Result<Value, HandlerFault> {
    let fields = available_fields();

    if let Some(requested) = &query.metadata_fields {
        let invalid: Vec<&str> = requested
            .iter()
            .map(String::as_str)
            .filter(|f| !fields.contains(f))
            .collect();
        if !invalid.is_empty() {
            return Err(HandlerFault::new(format!(
                "Invalid metadata fields: {} (available: {})",
                invalid.join(", "),
                fields.join(", ")
            )));
        }
    }

    let filters = query.filters.unwrap_or_default();
    let compile = |pattern: &Option<String>| {
        pattern
            .as_deref()
            .map(wildcard_regex)
            .transpose()
            .map_err(|e| HandlerFault::invalid_params(format!("bad filter pattern: {}", e)))
    };
    let layer_re = compile(&filters.layer)?;
    let name_re = compile(&filters.name)?;

    let mut objects = Vec::new();
    for obj in scene.objects() {
        if let Some(re) = &layer_re {
            if !re.is_match(&obj.layer) {
                continue;
            }
        }
        if let Some(re) = &name_re {
            if !re.is_match(obj.name.as_deref().unwrap_or("")) {
                continue;
            }
        }
        if let Some(short_id) = &filters.short_id {
            if obj.user_text.get("short_id") != Some(short_id) {
                continue;
            }
        }

        let stored = stored_metadata(obj);
        let metadata: Map<String, Value> = match &query.metadata_fields {
            Some(requested) => requested
                .iter()
                .filter_map(|k| stored.get(k).map(|v| (k.clone(), v.clone())))
                .collect(),
            None => stored
                .iter()
                .filter(|(k, _)| !REQUIRED_FIELDS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };

        let mut entry = json!({
            "id": obj.id.to_string(),
            "name": obj.display_name(),
            "type": obj.kind.type_name(),
            "layer": obj.layer,
        });

        let wants_user_text = query
            .metadata_fields
            .as_ref()
            .map_or(true, |f| f.iter().any(|k| k == "user_text"));
        if wants_user_text {
            let user_text: Map<String, Value> = stored
                .iter()
                .filter(|(k, _)| !metadata.contains_key(k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if !user_text.is_empty() {
                entry["user_text"] = Value::Object(user_text);
            }
        }
        if !metadata.is_empty() {
            entry["metadata"] = Value::Object(metadata);
        }

        objects.push(entry);
    }

    debug!(count = objects.len(), "Objects matched filters");
    Ok(json!({
        "count": objects.len(),
        "objects": objects,
        "available_fields": fields,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SelectionQuery {
    include_lights: bool,
    include_grips: bool,
}

fn get_selected_objects(scene: &mut Scene, query: SelectionQuery) -> Result<Value, HandlerFault> {
    let selected: Vec<Value> = scene
        .selected()
        .filter(|obj| match obj.kind {
            ObjectKind::Light => query.include_lights,
            ObjectKind::Grip => query.include_grips,
            _ => true,
        })
        .map(|obj| {
            json!({
                "id": obj.id.to_string(),
                "name": obj.display_name(),
                "type": obj.kind.type_name(),
                "layer": obj.layer,
                "metadata": obj.user_text,
            })
        })
        .collect();

    Ok(json!({
        "count": selected.len(),
        "selected_objects": selected,
    }))
}

fn default_size() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct CubeParams {
    #[serde(default = "default_size")]
    size: f64,
    #[serde(default)]
    location: [f64; 3],
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    layer: Option<String>,
}

fn create_cube(scene: &mut Scene, params: CubeParams) -> Result<Value, HandlerFault> {
    if !params.size.is_finite() || params.size <= 0.0 {
        return Err(HandlerFault::invalid_params(format!(
            "size must be a positive number, got {}",
            params.size
        )));
    }

    let name = params.name.unwrap_or_else(|| "Cube".to_string());
    let id = scene.add_cube(
        params.size,
        params.location,
        Some(name.clone()),
        params.layer.as_deref(),
    );
    let layer = scene
        .find(id)
        .map(|obj| obj.layer.clone())
        .unwrap_or_default();

    info!(%id, size = params.size, layer = %layer, "Created cube");
    Ok(json!({
        "id": id.to_string(),
        "name": name,
        "layer": layer,
    }))
}

#[derive(Debug, Deserialize)]
struct MetadataParams {
    object_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

fn add_object_metadata(scene: &mut Scene, params: MetadataParams) -> Result<Value, HandlerFault> {
    let id = Uuid::parse_str(&params.object_id).map_err(|e| {
        HandlerFault::invalid_params(format!("object_id '{}': {}", params.object_id, e))
    })?;
    let obj = scene
        .find_mut(id)
        .ok_or_else(|| HandlerFault::new(format!("Object not found: {}", id)))?;

    let short_id = Local::now().format("%d%H%M%S").to_string();
    let created_at = Utc::now().timestamp_millis() as f64 / 1000.0;
    let bbox = serde_json::to_string(&obj.bbox.corners())
        .map_err(|e| HandlerFault::Unserializable(e.to_string()))?;
    let name = params
        .name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("{}_{}", obj.kind.type_name(), short_id));

    let mut metadata = BTreeMap::new();
    metadata.insert("short_id", short_id.clone());
    metadata.insert("created_at", created_at.to_string());
    metadata.insert("layer", obj.layer.clone());
    metadata.insert("type", obj.kind.type_name().to_string());
    metadata.insert("bbox", bbox);
    metadata.insert("name", name.clone());
    if let Some(description) = params.description.filter(|d| !d.is_empty()) {
        metadata.insert("description", description);
    }

    obj.name = Some(name.clone());
    for (key, value) in metadata {
        obj.user_text.insert(key.to_string(), value);
    }

    info!(%id, short_id = %short_id, "Object metadata added");
    Ok(json!({
        "short_id": short_id,
        "name": name,
    }))
}

/// `execute_code` handler backed by a script engine
pub struct ExecuteCode<D> {
    engine: Box<dyn ScriptEngine<D>>,
}

impl<D> ExecuteCode<D> {
    pub fn new(engine: Box<dyn ScriptEngine<D>>) -> Self {
        Self { engine }
    }
}

impl<D> CommandHandler<D> for ExecuteCode<D> {
    fn handle(&self, doc: &mut D, params: &Params) -> Result<Value, HandlerFault> {
        let code = params
            .get("code")
            .and_then(Value::as_str)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| HandlerFault::new("No code provided"))?;

        debug!(code = %code, "Executing code");
        let mut output = Vec::new();
        match self.engine.execute(doc, code, &mut output) {
            Ok(result) => Ok(json!({
                "result": result.unwrap_or_else(|| DEFAULT_SCRIPT_RESULT.to_string()),
                "printed_output": output,
            })),
            Err(e) if output.is_empty() => Err(HandlerFault::new(e.to_string())),
            Err(e) => Err(HandlerFault::new(format!(
                "{}\nPrinted output before failure:\n{}",
                e,
                output.join("\n")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::BoundingBox;
    use scenebridge_protocol::{Command, ErrorKind, Response};

    fn call(registry: &HandlerRegistry<Scene>, scene: &mut Scene, name: &str, params: Value) -> Response {
        registry.dispatch(scene, &Command::from_value(name, params).unwrap())
    }

    fn ok(response: Response) -> Value {
        match response {
            Response::Success { result } => result,
            other => panic!("Expected success, got {:?}", other),
        }
    }

    fn fault_message(response: Response) -> String {
        match response {
            Response::Failure { kind, message } => {
                assert_eq!(kind, ErrorKind::HandlerError);
                message
            }
            other => panic!("Expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_all_commands_registered() {
        let registry = scene_registry().unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "add_object_metadata",
                "create_cube",
                "execute_code",
                "get_layers",
                "get_objects_with_metadata",
                "get_scene_info",
                "get_selected_objects",
            ]
        );
    }

    #[test]
    fn test_get_layers_default_scene() {
        let registry = scene_registry().unwrap();
        let mut scene = Scene::new();

        let result = ok(call(&registry, &mut scene, "get_layers", json!({})));
        let layers = result.as_array().unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0]["name"], "Default");
        assert_eq!(layers[0]["object_count"], 0);
        assert_eq!(layers[0]["is_visible"], true);
    }

    #[test]
    fn test_get_scene_info_limits_examples() {
        let registry = scene_registry().unwrap();
        let mut scene = Scene::new();
        for i in 0..7 {
            scene.add_cube(1.0, [i as f64, 0.0, 0.0], Some(format!("c{}", i)), None);
        }

        let info = ok(call(&registry, &mut scene, "get_scene_info", json!({})));
        assert_eq!(info["unit_system"]["name"], "Millimeters");
        let layer = &info["layers"][0];
        assert_eq!(layer["full_path"], "Default");
        assert_eq!(layer["object_count"], 7);
        assert_eq!(layer["example_objects"].as_array().unwrap().len(), 5);
        assert_eq!(layer["example_objects"][0]["type"], "Brep");
    }

    #[test]
    fn test_create_cube_defaults() {
        let registry = scene_registry().unwrap();
        let mut scene = Scene::new();

        let result = ok(call(&registry, &mut scene, "create_cube", json!({})));
        assert_eq!(result["name"], "Cube");
        assert_eq!(result["layer"], "Default");

        let id = Uuid::parse_str(result["id"].as_str().unwrap()).unwrap();
        assert_eq!(scene.find(id).unwrap().bbox, BoundingBox::cube([0.0; 3], 1.0));
    }

    #[test]
    fn test_create_cube_rejects_bad_size() {
        let registry = scene_registry().unwrap();
        let mut scene = Scene::new();

        let message = fault_message(call(&registry, &mut scene, "create_cube", json!({"size": 0})));
        assert!(message.contains("size"));

        let message = fault_message(call(
            &registry,
            &mut scene,
            "create_cube",
            json!({"location": [1, 2]}),
        ));
        assert!(message.starts_with("Invalid parameters"));
        assert!(scene.objects().is_empty());
    }

    #[test]
    fn test_add_object_metadata() {
        let registry = scene_registry().unwrap();
        let mut scene = Scene::new();
        let id = scene.add_cube(2.0, [0.0; 3], None, Some("Walls"));

        let result = ok(call(
            &registry,
            &mut scene,
            "add_object_metadata",
            json!({"object_id": id.to_string(), "description": "north wall"}),
        ));
        let short_id = result["short_id"].as_str().unwrap().to_string();
        assert_eq!(short_id.len(), 8);
        assert!(short_id.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(result["name"], format!("Brep_{}", short_id));

        let obj = scene.find(id).unwrap();
        assert_eq!(obj.name.as_deref(), Some(format!("Brep_{}", short_id).as_str()));
        assert_eq!(obj.user_text["layer"], "Walls");
        assert_eq!(obj.user_text["description"], "north wall");
        assert!(obj.user_text["created_at"].parse::<f64>().is_ok());
        let bbox: Vec<[f64; 3]> = serde_json::from_str(&obj.user_text["bbox"]).unwrap();
        assert_eq!(bbox.len(), 8);
    }

    #[test]
    fn test_add_object_metadata_unknown_object() {
        let registry = scene_registry().unwrap();
        let mut scene = Scene::new();

        let message = fault_message(call(
            &registry,
            &mut scene,
            "add_object_metadata",
            json!({"object_id": Uuid::new_v4().to_string()}),
        ));
        assert!(message.starts_with("Object not found"));

        let message = fault_message(call(
            &registry,
            &mut scene,
            "add_object_metadata",
            json!({"object_id": "not-a-uuid"}),
        ));
        assert!(message.starts_with("Invalid parameters"));
    }

    fn tagged_scene(registry: &HandlerRegistry<Scene>) -> (Scene, Uuid) {
        let mut scene = Scene::new();
        scene.add_cube(1.0, [0.0; 3], Some("Column_A".into()), Some("Structure"));
        scene.add_cube(1.0, [0.0; 3], Some("Beam".into()), Some("Structure"));
        let tagged = scene.add_cube(1.0, [0.0; 3], Some("Window".into()), Some("Facade"));
        ok(call(
            registry,
            &mut scene,
            "add_object_metadata",
            json!({"object_id": tagged.to_string(), "name": "Window", "description": "glass"}),
        ));
        (scene, tagged)
    }

    #[test]
    fn test_objects_with_metadata_filters() {
        let registry = scene_registry().unwrap();
        let (mut scene, tagged) = tagged_scene(&registry);

        let all = ok(call(&registry, &mut scene, "get_objects_with_metadata", json!({})));
        assert_eq!(all["count"], 3);
        assert_eq!(all["available_fields"].as_array().unwrap().len(), 9);

        let by_layer = ok(call(
            &registry,
            &mut scene,
            "get_objects_with_metadata",
            json!({"filters": {"layer": "struct*"}}),
        ));
        assert_eq!(by_layer["count"], 2);

        let by_name = ok(call(
            &registry,
            &mut scene,
            "get_objects_with_metadata",
            json!({"filters": {"name": "*a*", "layer": "structure"}}),
        ));
        let names: Vec<&str> = by_name["objects"]
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Column_A", "Beam"]);

        let short_id = scene.find(tagged).unwrap().user_text["short_id"].clone();
        let by_id = ok(call(
            &registry,
            &mut scene,
            "get_objects_with_metadata",
            json!({"filters": {"short_id": short_id}}),
        ));
        assert_eq!(by_id["count"], 1);
        assert_eq!(by_id["objects"][0]["id"], tagged.to_string());
    }

    #[test]
    fn test_objects_with_metadata_default_fields() {
        let registry = scene_registry().unwrap();
        let (mut scene, tagged) = tagged_scene(&registry);

        let result = ok(call(
            &registry,
            &mut scene,
            "get_objects_with_metadata",
            json!({"filters": {"layer": "Facade"}}),
        ));
        let obj = &result["objects"][0];
        assert_eq!(obj["id"], tagged.to_string());
        // Required fields stay out of metadata and land in user_text
        assert!(obj["metadata"].get("layer").is_none());
        assert_eq!(obj["metadata"]["description"], "glass");
        assert!(obj["metadata"]["bbox"].is_array());
        assert!(obj["metadata"]["created_at"].is_f64());
        assert_eq!(obj["user_text"]["layer"], "Facade");
    }

    #[test]
    fn test_objects_with_metadata_selected_fields() {
        let registry = scene_registry().unwrap();
        let (mut scene, _) = tagged_scene(&registry);

        let result = ok(call(
            &registry,
            &mut scene,
            "get_objects_with_metadata",
            json!({"filters": {"layer": "Facade"}, "metadata_fields": ["short_id", "description"]}),
        ));
        let obj = &result["objects"][0];
        let metadata = obj["metadata"].as_object().unwrap();
        assert_eq!(metadata.len(), 2);
        assert!(metadata.contains_key("short_id"));
        assert!(obj.get("user_text").is_none());
    }

    #[test]
    fn test_objects_with_metadata_invalid_field() {
        let registry = scene_registry().unwrap();
        let mut scene = Scene::new();

        let message = fault_message(call(
            &registry,
            &mut scene,
            "get_objects_with_metadata",
            json!({"metadata_fields": ["colour", "name"]}),
        ));
        assert!(message.contains("Invalid metadata fields: colour"));
        assert!(message.contains("short_id"));
    }

    #[test]
    fn test_selected_objects_skip_lights() {
        let registry = scene_registry().unwrap();
        let mut scene = Scene::new();
        let cube = scene.add_cube(1.0, [0.0; 3], Some("Box".into()), None);
        let light = scene.add_object(
            ObjectKind::Light,
            BoundingBox::point([0.0, 0.0, 5.0]),
            Some("Sun".into()),
            None,
        );
        scene.select(cube, true);
        scene.select(light, true);

        let result = ok(call(&registry, &mut scene, "get_selected_objects", json!({})));
        assert_eq!(result["count"], 1);
        assert_eq!(result["selected_objects"][0]["name"], "Box");

        let result = ok(call(
            &registry,
            &mut scene,
            "get_selected_objects",
            json!({"include_lights": true}),
        ));
        assert_eq!(result["count"], 2);
    }

    #[test]
    fn test_execute_code() {
        let registry = scene_registry().unwrap();
        let mut scene = Scene::new();

        let result = ok(call(
            &registry,
            &mut scene,
            "execute_code",
            json!({"code": "cube name=A\nprint made one"}),
        ));
        assert_eq!(result["result"], DEFAULT_SCRIPT_RESULT);
        assert_eq!(result["printed_output"], json!(["made one"]));
        assert_eq!(scene.objects().len(), 1);
    }

    #[test]
    fn test_execute_code_empty() {
        let registry = scene_registry().unwrap();
        let mut scene = Scene::new();

        let message = fault_message(call(&registry, &mut scene, "execute_code", json!({"code": ""})));
        assert_eq!(message, "No code provided");
        let message = fault_message(call(&registry, &mut scene, "execute_code", json!({})));
        assert_eq!(message, "No code provided");
    }

    #[test]
    fn test_execute_code_failure_includes_output() {
        let registry = scene_registry().unwrap();
        let mut scene = Scene::new();

        let message = fault_message(call(
            &registry,
            &mut scene,
            "execute_code",
            json!({"code": "print step one\nfail bad geometry"}),
        ));
        assert!(message.starts_with("bad geometry"));
        assert!(message.contains("step one"));
    }
}
