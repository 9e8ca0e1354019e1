//! Registered client commands

use anyhow::{bail, Result};
use clap::Subcommand;
use serde::Serialize;
use serde_json::Value;

use lwm2m_console_common::objects::{build_resource_tree, ObjectNode};
use lwm2m_console_common::store::{EndpointState, ResourceValue};
use lwm2m_console_common::types::Registration;
use lwm2m_console_common::{Lwm2mPath, ObjectSpecCache, ValueStore};

use crate::client::ConsoleClient;
use crate::output::{print_json, print_list, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum ClientCommands {
    /// List registered clients
    List,

    /// Show the objects, instances and resources a client announced
    Objects {
        /// Endpoint name
        endpoint: String,
    },

    /// Read a node on a client
    Read {
        /// Endpoint name
        endpoint: String,

        /// Path of the node, e.g. /3/0 or /3/0/1
        path: String,
    },
}

#[derive(Serialize)]
pub struct RegistrationDisplay {
    pub endpoint: String,
    pub registration_id: String,
    pub address: String,
    pub version: String,
    pub lifetime: Option<u64>,
    pub objects: usize,
    pub secure: bool,
}

impl From<&Registration> for RegistrationDisplay {
    fn from(reg: &Registration) -> Self {
        Self {
            endpoint: reg.endpoint.clone(),
            registration_id: reg.registration_id.clone(),
            address: reg.address.clone().unwrap_or_default(),
            version: reg.lwm2m_version.clone().unwrap_or_default(),
            lifetime: reg.lifetime,
            objects: reg.object_links.len(),
            secure: reg.secure,
        }
    }
}

impl TableDisplay for RegistrationDisplay {
    fn headers() -> Vec<&'static str> {
        vec![
            "Endpoint",
            "Registration ID",
            "Address",
            "Version",
            "Lifetime",
            "Links",
            "Secure",
        ]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.endpoint.clone(),
            self.registration_id.clone(),
            self.address.clone(),
            self.version.clone(),
            self.lifetime.map(|l| format!("{}s", l)).unwrap_or_default(),
            self.objects.to_string(),
            self.secure.to_string(),
        ]
    }
}

/// Flattened row of the resource tree
#[derive(Serialize)]
pub struct TreeRow {
    pub path: String,
    pub name: String,
    pub operations: String,
    pub kind: String,
}

impl TableDisplay for TreeRow {
    fn headers() -> Vec<&'static str> {
        vec!["Path", "Name", "Operations", "Type"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.path.clone(),
            self.name.clone(),
            self.operations.clone(),
            self.kind.clone(),
        ]
    }
}

pub fn tree_rows(tree: &[ObjectNode]) -> Vec<TreeRow> {
    let mut rows = Vec::new();
    for object in tree {
        let kind = if object.unknown { "unknown object" } else { "object" };
        rows.push(TreeRow {
            path: format!("/{}", object.id),
            name: object.name.clone(),
            operations: String::new(),
            kind: kind.to_string(),
        });
        for instance in &object.instances {
            rows.push(TreeRow {
                path: format!("/{}/{}", object.id, instance.id),
                name: instance.name.clone(),
                operations: String::new(),
                kind: "instance".to_string(),
            });
            for resource in &instance.resources {
                rows.push(TreeRow {
                    path: format!("/{}/{}/{}", object.id, instance.id, resource.id),
                    name: resource.def.name.clone(),
                    operations: resource.def.operations.clone(),
                    kind: resource.def.kind.clone(),
                });
            }
        }
    }
    rows
}

/// Cached value of one resource (or resource instance)
#[derive(Serialize)]
pub struct ValueRow {
    pub path: String,
    pub value: Value,
}

impl TableDisplay for ValueRow {
    fn headers() -> Vec<&'static str> {
        vec!["Path", "Value"]
    }

    fn row(&self) -> Vec<String> {
        let value = match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        vec![self.path.clone(), value]
    }
}

pub fn value_rows(state: &EndpointState) -> Vec<ValueRow> {
    let mut rows = Vec::new();
    for (path, value) in &state.data {
        match value {
            ResourceValue::Single { val, .. } => rows.push(ValueRow {
                path: path.clone(),
                value: val.clone(),
            }),
            ResourceValue::Multiple { vals, .. } => {
                for (id, instance) in vals {
                    rows.push(ValueRow {
                        path: format!("{}/{}", path, id),
                        value: instance.val.clone(),
                    });
                }
            }
        }
    }
    rows
}

pub async fn execute(
    cmd: ClientCommands,
    client: ConsoleClient,
    format: OutputFormat,
) -> Result<()> {
    match cmd {
        ClientCommands::List => {
            let registrations = client.list_clients().await?;
            let displays: Vec<RegistrationDisplay> =
                registrations.iter().map(RegistrationDisplay::from).collect();
            print_list(&displays, format);
        }

        ClientCommands::Objects { endpoint } => {
            let registration = client.get_client(&endpoint).await?;
            let cache = ObjectSpecCache::new();
            let models = cache.get(&endpoint, &client).await?;
            let tree = build_resource_tree(
                &models,
                &registration.root_path,
                &registration.object_links,
            );
            match format {
                OutputFormat::Json => print_json(&tree),
                _ => print_list(&tree_rows(&tree), format),
            }
        }

        ClientCommands::Read { endpoint, path } => {
            let path: Lwm2mPath = path.parse()?;
            let response = client.read(&endpoint, &path).await?;
            if !response.is_success() {
                bail!(
                    "read {} on '{}' failed: {} {}",
                    path,
                    endpoint,
                    response.status,
                    response.error_message.unwrap_or_default()
                );
            }

            let store = ValueStore::new();
            store.init_state(&endpoint);
            if let Some(node) = &response.content {
                store.new_node(&endpoint, &path.to_string(), node, false)?;
            }
            let rows = store
                .snapshot(&endpoint)
                .map(|state| value_rows(&state))
                .unwrap_or_default();
            print_list(&rows, format);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lwm2m_console_common::store::Node;
    use serde_json::json;

    #[test]
    fn test_value_rows_expand_instances() {
        let store = ValueStore::new();
        let node: Node = serde_json::from_value(json!({
            "kind": "instance",
            "id": 0,
            "resources": [
                { "kind": "singleResource", "id": 0, "value": "ACME" },
                { "kind": "multiResource", "id": 7, "values": { "0": 3800, "1": 5000 } }
            ]
        }))
        .unwrap();
        store.new_node("dev", "/3/0", &node, false).unwrap();

        let rows = value_rows(&store.snapshot("dev").unwrap());
        let paths: Vec<_> = rows.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/3/0/0", "/3/0/7/0", "/3/0/7/1"]);
        assert_eq!(rows[0].row()[1], "ACME");
        assert_eq!(rows[2].row()[1], "5000");
    }

    #[test]
    fn test_registration_display() {
        let reg: Registration = serde_json::from_value(json!({
            "endpoint": "sensor-1",
            "registrationId": "abc",
            "address": "127.0.0.1:5683",
            "lwM2mVersion": "1.1",
            "lifetime": 300,
            "rootPath": "/",
            "objectLinks": [
                { "url": "/1/0", "attributes": {} },
                { "url": "/3/0", "attributes": {} }
            ],
            "secure": false
        }))
        .unwrap();
        let row = RegistrationDisplay::from(&reg).row();
        assert_eq!(
            row,
            vec!["sensor-1", "abc", "127.0.0.1:5683", "1.1", "300s", "2", "false"]
        );
    }
}
