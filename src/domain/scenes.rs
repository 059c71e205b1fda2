//! Reference host integration: an in-memory scene model
//!
//! Stands in for the host application's internal state. The transport never
//! touches this module directly; it reaches it through the registries built
//! by [`build_tool_registry`] and [`build_resource_registry`].

use std::sync::{Arc, RwLock};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::errors::AppError;
use crate::registry::{
    ResourceDescriptor, StaticResourceRegistry, StaticToolRegistry, ToolDescriptor,
};

pub const SCENES_RESOURCE_URI: &str = "resource://scenes";
pub const HOST_INFO_RESOURCE_URI: &str = "resource://host/info";

#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    pub path: String,
    pub kind: String,
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneInfo {
    pub name: String,
    pub nodes: Vec<NodeInfo>,
}

pub struct SceneModel {
    scenes: RwLock<Vec<SceneInfo>>,
}

impl SceneModel {
    pub fn new(scenes: Vec<SceneInfo>) -> Self {
        Self {
            scenes: RwLock::new(scenes),
        }
    }

    pub fn with_demo_scenes() -> Self {
        Self::new(vec![SceneInfo {
            name: "main".to_string(),
            nodes: vec![
                NodeInfo {
                    path: "/root".to_string(),
                    kind: "Root".to_string(),
                    properties: Map::from_iter([
                        ("visible".to_string(), json!(true)),
                        ("_internal_id".to_string(), json!("root-0")),
                    ]),
                },
                NodeInfo {
                    path: "/root/camera".to_string(),
                    kind: "Camera".to_string(),
                    properties: Map::from_iter([
                        ("fov".to_string(), json!(70.0)),
                        ("current".to_string(), json!(true)),
                    ]),
                },
            ],
        }])
    }

    /// Top-level listing, also used as the per-stream snapshot payload.
    pub fn scene_listing(&self) -> Value {
        let scenes = self.scenes.read().expect("scene model lock poisoned");
        let listing: Vec<Value> = scenes
            .iter()
            .map(|scene| json!({"name": scene.name, "node_count": scene.nodes.len()}))
            .collect();

        json!({
            "scenes": listing,
            "generated_at_utc": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }

    pub fn inspect_node(&self, scene: &str, path: &str) -> Result<Value, AppError> {
        let scenes = self.scenes.read().expect("scene model lock poisoned");
        let node = find_node(&scenes, scene, path)?;

        Ok(json!({
            "scene": scene,
            "node": node,
        }))
    }

    /// Guarded mutation: properties with a leading underscore are host
    /// internals and refuse writes.
    pub fn set_property(
        &self,
        scene: &str,
        path: &str,
        property: &str,
        value: Value,
    ) -> Result<Value, AppError> {
        if property.starts_with('_') {
            return Err(AppError::permission_denied("property is read-only")
                .with_detail(json!({"property": property})));
        }

        let mut scenes = self.scenes.write().expect("scene model lock poisoned");
        let node = find_node_mut(&mut scenes, scene, path)?;
        let previous = node.properties.get(property).cloned().ok_or_else(|| {
            AppError::not_found("unknown property")
                .with_detail(json!({"path": path, "property": property}))
        })?;
        node.properties.insert(property.to_string(), value.clone());

        Ok(json!({
            "scene": scene,
            "path": path,
            "property": property,
            "previous": previous,
            "current": value,
        }))
    }
}

fn find_node<'a>(
    scenes: &'a [SceneInfo],
    scene: &str,
    path: &str,
) -> Result<&'a NodeInfo, AppError> {
    scenes
        .iter()
        .find(|candidate| candidate.name == scene)
        .ok_or_else(|| {
            AppError::not_found("unknown scene").with_detail(json!({"scene": scene}))
        })?
        .nodes
        .iter()
        .find(|node| node.path == path)
        .ok_or_else(|| AppError::not_found("unknown node path").with_detail(json!({"path": path})))
}

fn find_node_mut<'a>(
    scenes: &'a mut [SceneInfo],
    scene: &str,
    path: &str,
) -> Result<&'a mut NodeInfo, AppError> {
    scenes
        .iter_mut()
        .find(|candidate| candidate.name == scene)
        .ok_or_else(|| {
            AppError::not_found("unknown scene").with_detail(json!({"scene": scene}))
        })?
        .nodes
        .iter_mut()
        .find(|node| node.path == path)
        .ok_or_else(|| AppError::not_found("unknown node path").with_detail(json!({"path": path})))
}

fn required_str(arguments: &Value, key: &str) -> Result<String, AppError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            AppError::invalid_argument(format!("arguments.{key} is required and must be a string"))
        })
}

pub fn build_tool_registry(model: Arc<SceneModel>) -> StaticToolRegistry {
    let mut tools = StaticToolRegistry::new();

    let list_model = Arc::clone(&model);
    tools.register(
        ToolDescriptor {
            name: "list_scenes".to_string(),
            description: "List loaded scenes and their node counts".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
        },
        move |_arguments| {
            let model = Arc::clone(&list_model);
            async move { Ok(model.scene_listing()) }
        },
    );

    let inspect_model = Arc::clone(&model);
    tools.register(
        ToolDescriptor {
            name: "inspect_node".to_string(),
            description: "Inspect one node of a loaded scene".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "scene": {"type": "string"},
                    "path": {"type": "string"},
                },
                "required": ["scene", "path"],
            }),
        },
        move |arguments| {
            let model = Arc::clone(&inspect_model);
            async move {
                let scene = required_str(&arguments, "scene")?;
                let path = required_str(&arguments, "path")?;
                model.inspect_node(&scene, &path)
            }
        },
    );

    let write_model = Arc::clone(&model);
    tools.register(
        ToolDescriptor {
            name: "set_property".to_string(),
            description: "Write one node property, returning the previous value".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "scene": {"type": "string"},
                    "path": {"type": "string"},
                    "property": {"type": "string"},
                    "value": {},
                },
                "required": ["scene", "path", "property", "value"],
            }),
        },
        move |arguments| {
            let model = Arc::clone(&write_model);
            async move {
                let scene = required_str(&arguments, "scene")?;
                let path = required_str(&arguments, "path")?;
                let property = required_str(&arguments, "property")?;
                let value = arguments
                    .get("value")
                    .cloned()
                    .ok_or_else(|| AppError::invalid_argument("arguments.value is required"))?;
                model.set_property(&scene, &path, &property, value)
            }
        },
    );

    tools
}

pub fn build_resource_registry(model: Arc<SceneModel>) -> StaticResourceRegistry {
    let mut resources = StaticResourceRegistry::new();

    let listing_model = Arc::clone(&model);
    resources.register(
        ResourceDescriptor {
            uri: SCENES_RESOURCE_URI.to_string(),
            name: "Scene Listing".to_string(),
            description: "Loaded scenes and their node counts".to_string(),
            mime_type: "application/json".to_string(),
        },
        move || {
            let model = Arc::clone(&listing_model);
            async move { Ok(model.scene_listing()) }
        },
    );

    resources.register(
        ResourceDescriptor {
            uri: HOST_INFO_RESOURCE_URI.to_string(),
            name: "Host Info".to_string(),
            description: "Identity of the embedding host process".to_string(),
            mime_type: "application/json".to_string(),
        },
        || async {
            Ok(json!({
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at_utc": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            }))
        },
    );

    resources
}
