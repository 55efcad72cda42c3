use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub type WorkflowId = u64;
pub type NodeId = u64;
pub type ConnectionId = u64;

/// Port name used when a connection does not name its source side
pub const DEFAULT_SOURCE_HANDLE: &str = "output";
/// Port name used when a connection does not name its target side
pub const DEFAULT_TARGET_HANDLE: &str = "input";

/// A named container of nodes and the connections between them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl Workflow {
    pub fn new(id: WorkflowId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn add_node(&mut self, mut node: NodeSpec) -> NodeId {
        node.workflow_id = self.id;
        let id = node.id;
        self.nodes.push(node);
        id
    }

    /// Connect two nodes on the default handles
    pub fn connect(&mut self, source: NodeId, target: NodeId) -> ConnectionId {
        self.connect_handles(source, DEFAULT_SOURCE_HANDLE, target, DEFAULT_TARGET_HANDLE)
    }

    pub fn connect_handles(
        &mut self,
        source: NodeId,
        source_handle: impl Into<String>,
        target: NodeId,
        target_handle: impl Into<String>,
    ) -> ConnectionId {
        let id = self.connections.len() as ConnectionId + 1;
        self.connections.push(Connection {
            id,
            workflow_id: self.id,
            source_node_id: source,
            target_node_id: target,
            source_handle: source_handle.into(),
            target_handle: target_handle.into(),
        });
        id
    }

    pub fn find_node(&self, id: NodeId) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Connections terminating at `node`, in declaration order
    pub fn incoming(&self, node: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections
            .iter()
            .filter(move |c| c.target_node_id == node)
    }

    /// Connections leaving `node`, in declaration order
    pub fn outgoing(&self, node: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections
            .iter()
            .filter(move |c| c.source_node_id == node)
    }

    /// Nodes without any incoming connection, in declaration order
    pub fn source_nodes(&self) -> Vec<&NodeSpec> {
        self.nodes
            .iter()
            .filter(|n| self.incoming(n.id).next().is_none())
            .collect()
    }
}

/// One step of a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    #[serde(default)]
    pub workflow_id: WorkflowId,
    pub node_type: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Configuration document as stored; parsed when the node executes.
    #[serde(default, with = "config_document")]
    pub config: String,
    #[serde(default)]
    pub position: Position,
}

impl NodeSpec {
    pub fn new(id: NodeId, node_type: impl Into<String>) -> Self {
        Self {
            id,
            workflow_id: 0,
            node_type: node_type.into(),
            name: None,
            config: String::new(),
            position: Position::default(),
        }
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config.to_string();
        self
    }

    /// Store configuration text verbatim, without checking it parses
    pub fn with_raw_config(mut self, config: impl Into<String>) -> Self {
        self.config = config.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }
}

/// Directed edge between named ports of two nodes in the same workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    #[serde(default)]
    pub id: ConnectionId,
    #[serde(default)]
    pub workflow_id: WorkflowId,
    pub source_node_id: NodeId,
    pub target_node_id: NodeId,
    #[serde(default = "default_source_handle")]
    pub source_handle: String,
    #[serde(default = "default_target_handle")]
    pub target_handle: String,
}

fn default_source_handle() -> String {
    DEFAULT_SOURCE_HANDLE.to_string()
}

fn default_target_handle() -> String {
    DEFAULT_TARGET_HANDLE.to_string()
}

/// Node position in visual editor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Catalog entry binding a node type key to an executor reference.
///
/// The schemas are for editor tooling and are not enforced at run time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTypeEntry {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_category")]
    pub category: String,
    /// Built-in executor name or `plugin:<path>` locator
    pub executor: String,
    #[serde(default)]
    pub config_schema: serde_json::Value,
    #[serde(default)]
    pub input_schema: serde_json::Value,
    #[serde(default)]
    pub output_schema: serde_json::Value,
}

fn default_category() -> String {
    "Uncategorized".to_string()
}

/// Workflow files carry node configuration inline as JSON, while the stored
/// form is text. Text that is not valid JSON is kept as a string.
mod config_document {
    use super::*;

    pub fn serialize<S: Serializer>(config: &str, serializer: S) -> Result<S::Ok, S::Error> {
        match serde_json::from_str::<serde_json::Value>(config) {
            Ok(json) => json.serialize(serializer),
            Err(_) => serializer.serialize_str(config),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(text) => text,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        })
    }
}
