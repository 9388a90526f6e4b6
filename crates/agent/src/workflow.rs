use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::client::{Agent, AgentError, AgentResponse, Runnable};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("workflow has no start executor set")]
    MissingStart,
    #[error("workflow node `{0}` is registered more than once")]
    DuplicateNode(String),
    #[error("workflow references unknown node `{0}`")]
    UnknownNode(String),
    #[error("workflow node `{0}` has more than one outgoing edge; only linear chains are supported")]
    Fork(String),
    #[error("workflow edges form a cycle through `{0}`")]
    Cycle(String),
    #[error("workflow node `{0}` is unreachable from the start executor")]
    Unreachable(String),
}

/// Assembles named agent nodes and directed edges into a validated workflow.
///
/// The samples only ever build linear chains (Writer -> Reviewer), so `build`
/// rejects forks, cycles, and unreachable nodes instead of executing them in
/// some surprising order.
pub struct WorkflowBuilder {
    name: String,
    agents: Vec<(String, Agent)>,
    start: Option<String>,
    edges: Vec<(String, String)>,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), agents: Vec::new(), start: None, edges: Vec::new() }
    }

    pub fn register_agent(mut self, name: impl Into<String>, agent: Agent) -> Self {
        self.agents.push((name.into(), agent));
        self
    }

    pub fn set_start_executor(mut self, name: impl Into<String>) -> Self {
        self.start = Some(name.into());
        self
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    pub fn build(self) -> Result<Workflow, WorkflowError> {
        let mut registered: HashMap<String, Agent> = HashMap::new();
        for (name, agent) in self.agents {
            if registered.insert(name.clone(), agent).is_some() {
                return Err(WorkflowError::DuplicateNode(name));
            }
        }

        let start = self.start.ok_or(WorkflowError::MissingStart)?;
        if !registered.contains_key(&start) {
            return Err(WorkflowError::UnknownNode(start));
        }

        let mut outgoing: HashMap<String, String> = HashMap::new();
        for (from, to) in self.edges {
            if !registered.contains_key(&from) {
                return Err(WorkflowError::UnknownNode(from));
            }
            if !registered.contains_key(&to) {
                return Err(WorkflowError::UnknownNode(to));
            }
            if outgoing.insert(from.clone(), to).is_some() {
                return Err(WorkflowError::Fork(from));
            }
        }

        let mut order = vec![start.clone()];
        let mut visited: HashSet<String> = HashSet::from([start.clone()]);
        let mut current = start;
        while let Some(next) = outgoing.get(&current) {
            if !visited.insert(next.clone()) {
                return Err(WorkflowError::Cycle(next.clone()));
            }
            order.push(next.clone());
            current = next.clone();
        }

        if let Some(unreached) = registered.keys().find(|name| !visited.contains(*name)) {
            return Err(WorkflowError::Unreachable(unreached.clone()));
        }

        let nodes = order
            .into_iter()
            .map(|name| {
                let agent = registered
                    .remove(&name)
                    .ok_or_else(|| WorkflowError::UnknownNode(name.clone()))?;
                Ok((name, agent))
            })
            .collect::<Result<Vec<_>, WorkflowError>>()?;

        Ok(Workflow { name: self.name, nodes })
    }
}

/// A validated linear chain of agents. Each node receives the previous node's
/// final text; all node output is aggregated into one response.
pub struct Workflow {
    name: String,
    nodes: Vec<(String, Agent)>,
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("nodes", &self.node_names())
            .finish()
    }
}

impl Workflow {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub async fn run(&self, input: &str) -> Result<AgentResponse, AgentError> {
        let mut messages = Vec::new();
        let mut current_input = input.to_string();

        for (name, agent) in &self.nodes {
            info!(
                event_name = "workflow.node.start",
                workflow = %self.name,
                node = %name,
                "executing workflow node"
            );

            let response = agent.run(&current_input).await?;
            if let Some(text) = response.final_text() {
                current_input = text.to_string();
            }
            messages.extend(response.messages);
        }

        Ok(AgentResponse { messages })
    }

    /// Lets a workflow be served anywhere a single agent is expected.
    pub fn into_agent(self) -> Arc<dyn Runnable> {
        Arc::new(self)
    }
}

#[async_trait]
impl Runnable for Workflow {
    fn name(&self) -> &str {
        Workflow::name(self)
    }

    async fn run(&self, input: &str) -> Result<AgentResponse, AgentError> {
        Workflow::run(self, input).await
    }
}
