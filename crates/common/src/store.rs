//! Per-endpoint cache of resource values and observation flags.
//!
//! Every endpoint maps to an immutable [`EndpointState`] snapshot. Mutations
//! replace the snapshot (copy-on-write) and publish a [`StoreEvent`] to
//! subscribers, so a snapshot handed out earlier never changes under its
//! holder.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::path::split_resource_instance;
use crate::Result;

/// Capacity of the change notification channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// LwM2M node as carried in read responses and notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Node {
    SingleResource {
        id: u16,
        value: Value,
    },
    MultiResource {
        id: u16,
        /// Keyed by resource instance id
        values: BTreeMap<String, Value>,
    },
    ResourceInstance {
        id: u16,
        value: Value,
    },
    Instance {
        id: u16,
        #[serde(default)]
        resources: Vec<Node>,
    },
    #[serde(rename = "obj")]
    Object {
        id: u16,
        #[serde(default)]
        instances: Vec<Node>,
    },
}

impl Node {
    pub fn id(&self) -> u16 {
        match self {
            Node::SingleResource { id, .. }
            | Node::MultiResource { id, .. }
            | Node::ResourceInstance { id, .. }
            | Node::Instance { id, .. }
            | Node::Object { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Node::SingleResource { .. } => "singleResource",
            Node::MultiResource { .. } => "multiResource",
            Node::ResourceInstance { .. } => "resourceInstance",
            Node::Instance { .. } => "instance",
            Node::Object { .. } => "obj",
        }
    }
}

/// Value of one resource instance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceValue {
    pub val: Value,
    /// Set when the value was assumed locally rather than reported by the device
    pub supposed: bool,
}

/// Cached value of a resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceValue {
    Single {
        val: Value,
        supposed: bool,
    },
    Multiple {
        vals: BTreeMap<u16, InstanceValue>,
        supposed: bool,
    },
}

impl ResourceValue {
    pub fn is_single(&self) -> bool {
        matches!(self, ResourceValue::Single { .. })
    }

    pub fn supposed(&self) -> bool {
        match self {
            ResourceValue::Single { supposed, .. } | ResourceValue::Multiple { supposed, .. } => {
                *supposed
            }
        }
    }
}

/// Snapshot of everything known about one endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EndpointState {
    /// Resource path -> value
    pub data: BTreeMap<String, ResourceValue>,
    /// Node path -> observed flag
    pub observed: BTreeMap<String, bool>,
    /// Comma-joined path list -> composite observed flag
    pub composite_observed: BTreeMap<String, bool>,
}

impl EndpointState {
    fn set_single(&mut self, path: &str, val: Value, supposed: bool) {
        self.data
            .insert(path.to_string(), ResourceValue::Single { val, supposed });
    }

    fn set_multi(&mut self, path: &str, values: &BTreeMap<String, Value>, supposed: bool) {
        let mut vals = BTreeMap::new();
        for (key, val) in values {
            match key.parse::<u16>() {
                Ok(id) => {
                    vals.insert(
                        id,
                        InstanceValue {
                            val: val.clone(),
                            supposed,
                        },
                    );
                }
                Err(_) => warn!(path, key = %key, "ignoring non-numeric resource instance id"),
            }
        }
        self.data
            .insert(path.to_string(), ResourceValue::Multiple { vals, supposed });
    }

    fn set_resource_instance(&mut self, path: &str, instance_id: u16, val: Value, supposed: bool) {
        if let Some(ResourceValue::Multiple { vals, .. }) = self.data.get_mut(path) {
            vals.insert(instance_id, InstanceValue { val, supposed });
            return;
        }
        let mut vals = BTreeMap::new();
        vals.insert(instance_id, InstanceValue { val, supposed });
        self.data
            .insert(path.to_string(), ResourceValue::Multiple { vals, supposed });
    }

    fn set_resource(&mut self, path: &str, resource: &Node, supposed: bool) {
        match resource {
            Node::SingleResource { value, .. } => self.set_single(path, value.clone(), supposed),
            Node::MultiResource { values, .. } => self.set_multi(path, values, supposed),
            other => warn!(path, kind = other.kind(), "unsupported resource"),
        }
    }

    fn set_instance(&mut self, path: &str, resources: &[Node], supposed: bool, update: bool) {
        if !update {
            self.remove_under(path);
        }
        for resource in resources {
            self.set_resource(&child_path(path, resource.id()), resource, supposed);
        }
    }

    fn set_object(&mut self, path: &str, instances: &[Node], supposed: bool) {
        self.remove_under(path);
        for instance in instances {
            match instance {
                Node::Instance { id, resources } => {
                    self.set_instance(&child_path(path, *id), resources, supposed, false)
                }
                other => warn!(path, kind = other.kind(), "expected an object instance"),
            }
        }
    }

    fn remove_under(&mut self, path: &str) {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.data.retain(|p, _| !p.starts_with(&prefix));
    }
}

fn child_path(parent: &str, id: u16) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), id)
}

/// Key under which a composite observation is tracked
pub fn composite_key<S: AsRef<str>>(paths: &[S]) -> String {
    paths
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(",")
}

/// What changed in a [`StoreEvent`]
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEventKind {
    Initialized,
    Removed,
    DataChanged { path: String },
    ObservationChanged { key: String, observed: bool },
}

/// Change notification published by [`ValueStore`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoreEvent {
    pub endpoint: String,
    pub kind: StoreEventKind,
}

struct Inner {
    states: RwLock<HashMap<String, Arc<EndpointState>>>,
    events: broadcast::Sender<StoreEvent>,
}

/// Shared endpoint value store; clones share the same state
#[derive(Clone)]
pub struct ValueStore {
    inner: Arc<Inner>,
}

impl Default for ValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                states: RwLock::new(HashMap::new()),
                events,
            }),
        }
    }

    /// Receive every change made after this call
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    /// Reset an endpoint to an empty state
    pub fn init_state(&self, endpoint: &str) {
        self.inner
            .states
            .write()
            .insert(endpoint.to_string(), Arc::new(EndpointState::default()));
        self.publish(endpoint, StoreEventKind::Initialized);
    }

    /// Forget an endpoint
    pub fn remove_state(&self, endpoint: &str) -> bool {
        let removed = self.inner.states.write().remove(endpoint).is_some();
        if removed {
            self.publish(endpoint, StoreEventKind::Removed);
        }
        removed
    }

    /// Current snapshot of an endpoint
    pub fn snapshot(&self, endpoint: &str) -> Option<Arc<EndpointState>> {
        self.inner.states.read().get(endpoint).cloned()
    }

    /// Known endpoints, sorted
    pub fn endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = self.inner.states.read().keys().cloned().collect();
        endpoints.sort();
        endpoints
    }

    pub fn data(&self, endpoint: &str, path: &str) -> Option<ResourceValue> {
        self.snapshot(endpoint)
            .and_then(|state| state.data.get(path).cloned())
    }

    /// Store a single or multiple resource (`{id, value}` / `{id, values}`)
    pub fn new_resource_value(&self, endpoint: &str, path: &str, resource: &Node, supposed: bool) {
        self.update_data(endpoint, path, |state| {
            state.set_resource(path, resource, supposed)
        });
    }

    pub fn new_single_resource_value(
        &self,
        endpoint: &str,
        path: &str,
        val: Value,
        supposed: bool,
    ) {
        self.update_data(endpoint, path, |state| state.set_single(path, val, supposed));
    }

    pub fn new_multi_resource_value(
        &self,
        endpoint: &str,
        path: &str,
        values: &BTreeMap<String, Value>,
        supposed: bool,
    ) {
        self.update_data(endpoint, path, |state| state.set_multi(path, values, supposed));
    }

    /// Store a resource instance value addressed by its full path, e.g. `/3/0/11/1`
    pub fn new_resource_instance_value_from_path(
        &self,
        endpoint: &str,
        path: &str,
        val: Value,
        supposed: bool,
    ) -> Result<()> {
        let (resource_path, instance_id) = split_resource_instance(path)?;
        self.new_resource_instance_value(endpoint, &resource_path, instance_id, val, supposed);
        Ok(())
    }

    pub fn new_resource_instance_value(
        &self,
        endpoint: &str,
        path: &str,
        instance_id: u16,
        val: Value,
        supposed: bool,
    ) {
        self.update_data(endpoint, path, |state| {
            state.set_resource_instance(path, instance_id, val, supposed)
        });
    }

    /// Store the resources of an object instance. Without `update`, values
    /// previously cached under the instance are dropped first.
    pub fn new_instance_value(
        &self,
        endpoint: &str,
        path: &str,
        resources: &[Node],
        supposed: bool,
        update: bool,
    ) {
        self.update_data(endpoint, path, |state| {
            state.set_instance(path, resources, supposed, update)
        });
    }

    /// Replace everything cached under an object
    pub fn new_object_value(&self, endpoint: &str, path: &str, instances: &[Node], supposed: bool) {
        self.update_data(endpoint, path, |state| {
            state.set_object(path, instances, supposed)
        });
    }

    /// Store any node read from the device. A resource instance node needs a
    /// resource instance path; otherwise nothing is stored or published.
    pub fn new_node(
        &self,
        endpoint: &str,
        path: &str,
        node: &Node,
        supposed: bool,
    ) -> Result<()> {
        match node {
            Node::SingleResource { .. } | Node::MultiResource { .. } => {
                self.new_resource_value(endpoint, path, node, supposed)
            }
            Node::ResourceInstance { value, .. } => self.new_resource_instance_value_from_path(
                endpoint,
                path,
                value.clone(),
                supposed,
            )?,
            Node::Instance { resources, .. } => {
                self.new_instance_value(endpoint, path, resources, supposed, false)
            }
            Node::Object { instances, .. } => {
                self.new_object_value(endpoint, path, instances, supposed)
            }
        }
        Ok(())
    }

    /// Store several nodes keyed by path; stops at the first invalid path
    pub fn new_nodes<'a, I>(&self, endpoint: &str, nodes: I, supposed: bool) -> Result<()>
    where
        I: IntoIterator<Item = (&'a String, &'a Node)>,
    {
        for (path, node) in nodes {
            self.new_node(endpoint, path, node, supposed)?;
        }
        Ok(())
    }

    pub fn remove_instance_value(&self, endpoint: &str, path: &str) {
        self.update_data(endpoint, path, |state| state.remove_under(path));
    }

    pub fn remove_object_value(&self, endpoint: &str, path: &str) {
        self.update_data(endpoint, path, |state| state.remove_under(path));
    }

    pub fn set_observed(&self, endpoint: &str, path: &str, observed: bool) {
        self.update(
            endpoint,
            StoreEventKind::ObservationChanged {
                key: path.to_string(),
                observed,
            },
            |state| {
                state.observed.insert(path.to_string(), observed);
            },
        );
    }

    pub fn set_composite_paths_observed<S: AsRef<str>>(
        &self,
        endpoint: &str,
        paths: &[S],
        observed: bool,
    ) {
        let key = composite_key(paths);
        self.update(
            endpoint,
            StoreEventKind::ObservationChanged {
                key: key.clone(),
                observed,
            },
            |state| {
                state.composite_observed.insert(key, observed);
            },
        );
    }

    fn update_data<F>(&self, endpoint: &str, path: &str, f: F)
    where
        F: FnOnce(&mut EndpointState),
    {
        self.update(
            endpoint,
            StoreEventKind::DataChanged {
                path: path.to_string(),
            },
            f,
        );
    }

    fn update<F>(&self, endpoint: &str, kind: StoreEventKind, f: F)
    where
        F: FnOnce(&mut EndpointState),
    {
        {
            let mut states = self.inner.states.write();
            let state = states.entry(endpoint.to_string()).or_default();
            f(Arc::make_mut(state));
        }
        self.publish(endpoint, kind);
    }

    fn publish(&self, endpoint: &str, kind: StoreEventKind) {
        trace!(endpoint, ?kind, "store changed");
        // No subscribers is fine
        let _ = self.inner.events.send(StoreEvent {
            endpoint: endpoint.to_string(),
            kind,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single(id: u16, value: Value) -> Node {
        Node::SingleResource { id, value }
    }

    #[test]
    fn test_single_and_multi_values() {
        let store = ValueStore::new();
        store.init_state("dev1");

        store.new_single_resource_value("dev1", "/3/0/0", json!("ACME"), false);
        assert_eq!(
            store.data("dev1", "/3/0/0"),
            Some(ResourceValue::Single {
                val: json!("ACME"),
                supposed: false
            })
        );

        let mut values = BTreeMap::new();
        values.insert("0".to_string(), json!(1));
        values.insert("3".to_string(), json!(5));
        store.new_multi_resource_value("dev1", "/3/0/6", &values, true);
        match store.data("dev1", "/3/0/6").unwrap() {
            ResourceValue::Multiple { vals, supposed } => {
                assert!(supposed);
                assert_eq!(vals.keys().copied().collect::<Vec<_>>(), vec![0, 3]);
            }
            other => panic!("unexpected {:?}", other),
        }

        // single overwrites multiple
        store.new_single_resource_value("dev1", "/3/0/6", json!(9), false);
        assert!(store.data("dev1", "/3/0/6").unwrap().is_single());
    }

    #[test]
    fn test_resource_instance_from_path() {
        let store = ValueStore::new();
        store
            .new_resource_instance_value_from_path("dev1", "/3/0/11/1", json!(7), false)
            .unwrap();
        store
            .new_resource_instance_value_from_path("dev1", "/3/0/11/2", json!(8), true)
            .unwrap();

        match store.data("dev1", "/3/0/11").unwrap() {
            ResourceValue::Multiple { vals, .. } => {
                assert_eq!(vals[&1].val, json!(7));
                assert!(vals[&2].supposed);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(store
            .new_resource_instance_value_from_path("dev1", "/3/0", json!(1), false)
            .is_err());
    }

    #[test]
    fn test_instance_replace_and_update() {
        let store = ValueStore::new();
        let resources = [single(0, json!("a")), single(1, json!("b"))];
        store.new_instance_value("dev1", "/3/0", &resources, false, false);
        store.new_instance_value("dev1", "/3/0", &[single(2, json!("c"))], false, true);
        assert!(store.data("dev1", "/3/0/0").is_some());
        assert!(store.data("dev1", "/3/0/2").is_some());

        store.new_instance_value("dev1", "/3/0", &[single(2, json!("d"))], false, false);
        assert!(store.data("dev1", "/3/0/0").is_none());
        assert!(store.data("dev1", "/3/0/2").is_some());
    }

    #[test]
    fn test_object_node_replaces_object() {
        let store = ValueStore::new();
        store.new_single_resource_value("dev1", "/3/1/0", json!("stale"), false);
        store.new_single_resource_value("dev1", "/30/0/0", json!("other"), false);

        let node: Node = serde_json::from_value(json!({
            "kind": "obj",
            "id": 3,
            "instances": [{
                "kind": "instance",
                "id": 0,
                "resources": [
                    { "kind": "singleResource", "id": 0, "type": "STRING", "value": "ACME" },
                    { "kind": "multiResource", "id": 6, "type": "INTEGER",
                      "values": { "0": 1, "1": 5 } }
                ]
            }]
        }))
        .unwrap();
        store.new_node("dev1", "/3", &node, false).unwrap();

        let state = store.snapshot("dev1").unwrap();
        assert!(!state.data.contains_key("/3/1/0"));
        assert!(state.data.contains_key("/30/0/0"));
        assert!(state.data.contains_key("/3/0/0"));
        assert!(!state.data["/3/0/6"].is_single());
    }

    #[test]
    fn test_snapshots_are_immutable() {
        let store = ValueStore::new();
        store.new_single_resource_value("dev1", "/3/0/0", json!(1), false);
        let before = store.snapshot("dev1").unwrap();
        store.new_single_resource_value("dev1", "/3/0/0", json!(2), false);

        assert_eq!(
            before.data["/3/0/0"],
            ResourceValue::Single {
                val: json!(1),
                supposed: false
            }
        );
        assert_ne!(*before, *store.snapshot("dev1").unwrap());
    }

    #[test]
    fn test_observation_flags() {
        let store = ValueStore::new();
        store.set_observed("dev1", "/3/0/13", true);
        store.set_composite_paths_observed("dev1", &["/3/0/13", "/1/0/1"], true);
        store.set_observed("dev1", "/3/0/13", false);

        let state = store.snapshot("dev1").unwrap();
        assert_eq!(state.observed["/3/0/13"], false);
        assert_eq!(state.composite_observed["/3/0/13,/1/0/1"], true);
    }

    #[test]
    fn test_rejected_node_leaves_store_untouched() {
        let store = ValueStore::new();
        let mut rx = store.subscribe();
        let node = Node::ResourceInstance {
            id: 1,
            value: json!(7),
        };

        assert!(store.new_node("dev1", "/3/0", &node, false).is_err());
        assert!(store.snapshot("dev1").is_none());
        assert!(store.endpoints().is_empty());
        assert!(rx.try_recv().is_err());

        store.new_node("dev1", "/3/0/11/1", &node, false).unwrap();
        assert_eq!(
            rx.try_recv().unwrap().kind,
            StoreEventKind::DataChanged {
                path: "/3/0/11".to_string()
            }
        );
        match store.data("dev1", "/3/0/11").unwrap() {
            ResourceValue::Multiple { vals, .. } => assert_eq!(vals[&1].val, json!(7)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let store = ValueStore::new();
        let mut rx = store.subscribe();

        store.init_state("dev1");
        store.new_single_resource_value("dev1", "/3/0/0", json!(1), false);
        assert!(store.remove_state("dev1"));
        assert!(!store.remove_state("dev1"));

        assert_eq!(rx.recv().await.unwrap().kind, StoreEventKind::Initialized);
        assert_eq!(
            rx.recv().await.unwrap().kind,
            StoreEventKind::DataChanged {
                path: "/3/0/0".to_string()
            }
        );
        let removed = rx.recv().await.unwrap();
        assert_eq!(removed.endpoint, "dev1");
        assert_eq!(removed.kind, StoreEventKind::Removed);
        assert!(rx.try_recv().is_err());
    }
}
