use flowcore::{Connection, NodeId, NodeSpec, Workflow, WorkflowError};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Arena view of a workflow, validated for execution.
///
/// Nodes are indexed by identifier, connections are grouped per endpoint and
/// every node carries the number of connections terminating at it.
pub struct ExecutionPlan<'a> {
    workflow: &'a Workflow,
    index: HashMap<NodeId, usize>,
    incoming: Vec<Vec<&'a Connection>>,
    outgoing: Vec<Vec<&'a Connection>>,
    sources: Vec<NodeId>,
}

impl<'a> ExecutionPlan<'a> {
    /// Build the plan.
    ///
    /// Fails with `NoStartNode` when every node has an incoming connection,
    /// `DuplicateNode` when two nodes share an identifier, `NodeNotFound`
    /// when a connection names a node outside the workflow and
    /// `CyclicDependency` when the graph is not acyclic.
    pub fn build(workflow: &'a Workflow) -> Result<Self, WorkflowError> {
        let sources: Vec<NodeId> = workflow.source_nodes().iter().map(|n| n.id).collect();
        if sources.is_empty() {
            return Err(WorkflowError::NoStartNode);
        }

        let mut graph: DiGraph<NodeId, ()> = DiGraph::new();
        let mut index = HashMap::new();
        for node in &workflow.nodes {
            let idx = graph.add_node(node.id);
            if index.insert(node.id, idx.index()).is_some() {
                return Err(WorkflowError::DuplicateNode(node.id));
            }
        }

        let mut incoming = vec![Vec::new(); workflow.nodes.len()];
        let mut outgoing = vec![Vec::new(); workflow.nodes.len()];
        for conn in &workflow.connections {
            let from = *index
                .get(&conn.source_node_id)
                .ok_or(WorkflowError::NodeNotFound(conn.source_node_id))?;
            let to = *index
                .get(&conn.target_node_id)
                .ok_or(WorkflowError::NodeNotFound(conn.target_node_id))?;

            graph.add_edge(NodeIndex::new(from), NodeIndex::new(to), ());
            outgoing[from].push(conn);
            incoming[to].push(conn);
        }

        if let Err(cycle) = toposort(&graph, None) {
            return Err(WorkflowError::CyclicDependency(graph[cycle.node_id()]));
        }

        Ok(Self {
            workflow,
            index,
            incoming,
            outgoing,
            sources,
        })
    }

    pub fn workflow(&self) -> &'a Workflow {
        self.workflow
    }

    /// Start nodes in declaration order
    pub fn sources(&self) -> &[NodeId] {
        &self.sources
    }

    pub fn node(&self, id: NodeId) -> Option<&'a NodeSpec> {
        self.index.get(&id).map(|&i| &self.workflow.nodes[i])
    }

    /// Connections terminating at `id`, in declaration order
    pub fn incoming(&self, id: NodeId) -> &[&'a Connection] {
        self.index
            .get(&id)
            .map(|&i| self.incoming[i].as_slice())
            .unwrap_or(&[])
    }

    /// Connections leaving `id`, in declaration order
    pub fn outgoing(&self, id: NodeId) -> &[&'a Connection] {
        self.index
            .get(&id)
            .map(|&i| self.outgoing[i].as_slice())
            .unwrap_or(&[])
    }

    /// Number of connections each node waits on before it is ready
    pub fn pending_inputs(&self) -> HashMap<NodeId, usize> {
        self.workflow
            .nodes
            .iter()
            .map(|n| (n.id, self.incoming(n.id).len()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.workflow.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflow.nodes.is_empty()
    }
}
