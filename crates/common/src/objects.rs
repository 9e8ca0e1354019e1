//! Object models, the per-endpoint model cache and the resource tree built
//! from a registration's object links.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::path::Lwm2mPath;
use crate::{Error, Result};

/// Description of an LwM2M object as served by `api/objectspecs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectModel {
    pub id: u16,
    pub name: String,
    #[serde(default = "default_instance_type")]
    pub instancetype: String,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub resourcedefs: Vec<ResourceModel>,
}

impl ObjectModel {
    /// Placeholder for an object the server has no model for
    pub fn unknown(id: u16) -> Self {
        Self {
            id,
            name: format!("Object {}", id),
            instancetype: "multiple".to_string(),
            mandatory: false,
            description: String::new(),
            resourcedefs: Vec::new(),
        }
    }

    pub fn is_multiple(&self) -> bool {
        self.instancetype == "multiple"
    }
}

fn default_instance_type() -> String {
    "multiple".to_string()
}

/// Description of a resource within an object model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceModel {
    pub id: u16,
    pub name: String,
    #[serde(default)]
    pub operations: String,
    #[serde(default = "default_resource_instance_type")]
    pub instancetype: String,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub range: String,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub description: String,
}

fn default_resource_instance_type() -> String {
    "single".to_string()
}

impl ResourceModel {
    /// Placeholder for a resource missing from its object model
    pub fn unknown(id: u16) -> Self {
        Self {
            id,
            name: format!("Resource {}", id),
            operations: "RW".to_string(),
            instancetype: "single".to_string(),
            mandatory: false,
            kind: "opaque".to_string(),
            range: String::new(),
            units: String::new(),
            description: String::new(),
        }
    }
}

/// Where object models come from
#[async_trait]
pub trait ObjectSpecSource: Send + Sync {
    async fn fetch_object_specs(&self, endpoint: &str) -> Result<Vec<ObjectModel>>;
}

/// Caches the object models of the endpoint currently being inspected.
///
/// A request for another endpoint refetches and replaces the cached list.
#[derive(Default)]
pub struct ObjectSpecCache {
    cached: Mutex<Option<(String, Arc<Vec<ObjectModel>>)>>,
}

impl ObjectSpecCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Object models of `endpoint`, fetched from `source` on a miss
    pub async fn get(
        &self,
        endpoint: &str,
        source: &dyn ObjectSpecSource,
    ) -> Result<Vec<ObjectModel>> {
        let mut cached = self.cached.lock().await;
        if let Some((cached_endpoint, models)) = cached.as_ref() {
            if cached_endpoint == endpoint {
                return Ok(models.as_ref().clone());
            }
        }

        *cached = None;
        debug!(endpoint, "loading object specifications");
        let models = source.fetch_object_specs(endpoint).await.map_err(|e| {
            warn!(endpoint, error = %e, "unable to load object specifications");
            e
        })?;
        let models = Arc::new(models);
        *cached = Some((endpoint.to_string(), models.clone()));
        Ok(models.as_ref().clone())
    }

    /// Endpoint whose models are cached, if any
    pub async fn cached_endpoint(&self) -> Option<String> {
        self.cached.lock().await.as_ref().map(|(e, _)| e.clone())
    }

    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}

/// Link from a registration's object list, e.g. `</3/0>;rt="oma.lwm2m"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectLink {
    pub url: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl ObjectLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Display name announced by the device (`title`, then `rt`)
    fn display_name(&self) -> Option<String> {
        ["title", "rt"].iter().find_map(|key| {
            self.attributes.get(*key).map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        })
    }
}

/// Resource slot of an instance in the tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceNode {
    pub id: u16,
    pub def: ResourceModel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceNode {
    pub id: u16,
    pub name: String,
    pub resources: Vec<ResourceNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectNode {
    pub id: u16,
    pub name: String,
    pub unknown: bool,
    pub model: ObjectModel,
    pub instances: Vec<InstanceNode>,
}

/// Build the object/instance/resource tree a device announced.
///
/// Links outside `root_path` are taken as-is; links that are not LwM2M
/// paths are ignored. Objects come out sorted by id.
pub fn build_resource_tree(
    models: &[ObjectModel],
    root_path: &str,
    links: &[ObjectLink],
) -> Vec<ObjectNode> {
    let mut tree: Vec<ObjectNode> = Vec::new();

    for link in links {
        let relative = strip_root(&link.url, root_path);
        let path: Lwm2mPath = match relative.parse() {
            Ok(path) => path,
            Err(e) => {
                debug!(url = %link.url, error = %e, "ignoring object link");
                continue;
            }
        };
        let name = link.display_name();
        let ids = path.ids();

        match ids.as_slice() {
            [] => {}
            [object_id] => {
                let object = add_object(&mut tree, models, *object_id, name);
                if !object.model.is_multiple() {
                    add_instance(object, 0, None);
                }
            }
            [object_id, instance_id] => {
                let object = add_object(&mut tree, models, *object_id, None);
                add_instance(object, *instance_id, name);
            }
            [object_id, instance_id, resource_id, ..] => {
                let object = add_object(&mut tree, models, *object_id, None);
                let instance_index = add_instance(object, *instance_id, None);
                add_resource(object, instance_index, *resource_id, name);
            }
        }
    }

    tree.sort_by_key(|object| object.id);
    tree
}

fn strip_root<'a>(url: &'a str, root_path: &str) -> &'a str {
    let root = root_path.trim_end_matches('/');
    if root.is_empty() {
        return url;
    }
    match url.strip_prefix(root) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => url,
    }
}

fn add_object<'a>(
    tree: &'a mut Vec<ObjectNode>,
    models: &[ObjectModel],
    object_id: u16,
    name: Option<String>,
) -> &'a mut ObjectNode {
    let index = match tree.iter().position(|o| o.id == object_id) {
        Some(index) => index,
        None => {
            let (model, unknown) = match models.iter().find(|m| m.id == object_id) {
                Some(model) => (model.clone(), false),
                None => (ObjectModel::unknown(object_id), true),
            };
            tree.push(ObjectNode {
                id: object_id,
                name: model.name.clone(),
                unknown,
                model,
                instances: Vec::new(),
            });
            tree.len() - 1
        }
    };

    let object = &mut tree[index];
    if let Some(name) = name {
        object.name = name;
    }
    object
}

fn add_instance(object: &mut ObjectNode, instance_id: u16, name: Option<String>) -> usize {
    let index = match object.instances.iter().position(|i| i.id == instance_id) {
        Some(index) => index,
        None => {
            let resources = object
                .model
                .resourcedefs
                .iter()
                .map(|def| ResourceNode {
                    id: def.id,
                    def: def.clone(),
                })
                .collect();
            object.instances.push(InstanceNode {
                id: instance_id,
                name: format!("Instance {}", instance_id),
                resources,
            });
            object.instances.len() - 1
        }
    };

    if let Some(name) = name {
        object.instances[index].name = name;
    }
    index
}

fn add_resource(
    object: &mut ObjectNode,
    instance_index: usize,
    resource_id: u16,
    name: Option<String>,
) {
    if !object.model.resourcedefs.iter().any(|d| d.id == resource_id) {
        object.model.resourcedefs.push(ResourceModel::unknown(resource_id));
    }
    let def = object
        .model
        .resourcedefs
        .iter()
        .find(|d| d.id == resource_id)
        .cloned()
        .unwrap_or_else(|| ResourceModel::unknown(resource_id));

    let instance = &mut object.instances[instance_index];
    let resource = match instance.resources.iter().position(|r| r.id == resource_id) {
        Some(index) => &mut instance.resources[index],
        None => {
            instance.resources.push(ResourceNode { id: resource_id, def });
            let last = instance.resources.len() - 1;
            &mut instance.resources[last]
        }
    };
    if let Some(name) = name {
        resource.def.name = name;
    }
}

/// Instance addressed by an `/object/instance` path
pub fn find_instance<'a>(tree: &'a [ObjectNode], path: &str) -> Option<&'a InstanceNode> {
    let path: Lwm2mPath = path.parse().ok()?;
    if !path.is_object_instance() {
        return None;
    }
    tree.iter()
        .find(|o| Some(o.id) == path.object_id())?
        .instances
        .iter()
        .find(|i| Some(i.id) == path.object_instance_id())
}

/// Resource addressed by an `/object/instance/resource` path
pub fn find_resource<'a>(tree: &'a [ObjectNode], path: &str) -> Option<&'a ResourceNode> {
    let path: Lwm2mPath = path.parse().ok()?;
    if !path.is_resource() {
        return None;
    }
    let instance_path = path.to_object_instance_path()?.to_string();
    find_instance(tree, &instance_path)?
        .resources
        .iter()
        .find(|r| Some(r.id) == path.resource_id())
}

/// Convert operator input to a JSON value of the resource's type
pub fn typed_value(input: &str, kind: &str) -> Result<Value> {
    let invalid = || Error::InvalidConfig(format!("'{}' is not a valid {} value", input, kind));
    match kind.to_ascii_lowercase().as_str() {
        "integer" | "unsigned integer" => input
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid()),
        "float" => input
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(invalid),
        "boolean" => match input.trim() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        _ => Ok(Value::String(input.to_string())),
    }
}
