use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use stayfinder_core::config::ProjectConfig;

use crate::credential::{CredentialError, CredentialProvider};
use crate::tools::{ToolRegistry, ToolSpec};

/// Upper bound on model/tool round trips per run. Prevents a confused model
/// from looping on tool calls forever.
const MAX_TOOL_TURNS: usize = 8;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("credential acquisition failed: {0}")]
    Credential(#[from] CredentialError),
    #[error("chat backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("chat backend returned an unexpected payload: {0}")]
    Protocol(String),
    #[error("agent `{agent}` exceeded {limit} tool turns without a final response")]
    TurnLimit { agent: String, limit: usize },
}

/// One entry in the conversation sent to the model.
#[derive(Clone, Debug)]
pub enum ChatMessage {
    System(String),
    User(String),
    Assistant { text: Option<String>, tool_calls: Vec<ToolCallRequest> },
    ToolResult { call_id: String, content: String },
}

/// A tool invocation requested by the model, arguments already decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// The model's reply to one completion request: either final text or a batch
/// of tool calls to execute and feed back.
#[derive(Clone, Debug)]
pub enum ChatTurn {
    Text(String),
    ToolCalls(Vec<ToolCallRequest>),
}

#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

/// The seam hiding the remote model service. The HTTP implementation below is
/// the production path; tests substitute scripted backends.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<ChatTurn, AgentError>;
}

/// Chat-completions client for the hosted project endpoint. Acquires a bearer
/// token per request through the injected credential provider, so token
/// lifetime stays scoped to the call.
pub struct HttpChatBackend {
    http: reqwest::Client,
    endpoint: String,
    api_version: String,
    credential: Arc<dyn CredentialProvider>,
}

impl HttpChatBackend {
    pub fn new(project: &ProjectConfig, credential: Arc<dyn CredentialProvider>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(project.request_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            http,
            endpoint: project.endpoint.trim_end_matches('/').to_string(),
            api_version: project.api_version.clone(),
            credential,
        }
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn complete(&self, request: ChatRequest) -> Result<ChatTurn, AgentError> {
        let token = self.credential.acquire().await?;

        let url = format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint, request.model
        );
        let payload = WireRequest::from_request(&request);

        let response = self
            .http
            .post(&url)
            .query(&[("api-version", self.api_version.as_str())])
            .bearer_auth(token.secret())
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        let body: WireResponse = response.json().await?;
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Protocol("response contained no choices".to_string()))?;

        if !choice.message.tool_calls.is_empty() {
            let calls = choice
                .message
                .tool_calls
                .into_iter()
                .map(ToolCallRequest::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(ChatTurn::ToolCalls(calls));
        }

        match choice.message.content {
            Some(text) => Ok(ChatTurn::Text(text)),
            None => Err(AgentError::Protocol(
                "message carried neither content nor tool calls".to_string(),
            )),
        }
    }
}

/// Factory for agents bound to one project endpoint and model deployment.
pub struct AgentClient {
    backend: Arc<dyn ChatBackend>,
    model_deployment: String,
}

impl AgentClient {
    pub fn new(backend: Arc<dyn ChatBackend>, model_deployment: impl Into<String>) -> Self {
        Self { backend, model_deployment: model_deployment.into() }
    }

    pub fn create_agent(&self, definition: AgentDefinition) -> Agent {
        info!(
            event_name = "agent.created",
            agent = %definition.name,
            tool_count = definition.tools.len(),
            "agent created"
        );

        Agent {
            name: definition.name,
            instructions: definition.instructions,
            tools: Arc::new(definition.tools),
            backend: Arc::clone(&self.backend),
            model: self.model_deployment.clone(),
            max_tool_turns: MAX_TOOL_TURNS,
        }
    }
}

/// Name, instructions, and optional tool list for a new agent.
pub struct AgentDefinition {
    pub name: String,
    pub instructions: String,
    pub tools: ToolRegistry,
}

impl AgentDefinition {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self { name: name.into(), instructions: instructions.into(), tools: ToolRegistry::default() }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }
}

/// A hosted conversational agent: instructions, an optional capability table,
/// and the backend that reaches the model.
#[derive(Clone)]
pub struct Agent {
    name: String,
    instructions: String,
    tools: Arc<ToolRegistry>,
    backend: Arc<dyn ChatBackend>,
    model: String,
    max_tool_turns: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub author: String,
    pub text: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub messages: Vec<AgentMessage>,
}

impl AgentResponse {
    /// Text of the last message, the conventional hand-off value.
    pub fn final_text(&self) -> Option<&str> {
        self.messages.last().map(|message| message.text.as_str())
    }
}

impl Agent {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs one message through the model, executing requested tools until the
    /// model produces plain text or the turn limit trips.
    pub async fn run(&self, input: &str) -> Result<AgentResponse, AgentError> {
        let mut messages = vec![
            ChatMessage::System(self.instructions.clone()),
            ChatMessage::User(input.to_string()),
        ];

        for turn in 0..self.max_tool_turns {
            let request = ChatRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                tools: self.tools.specs(),
            };

            match self.backend.complete(request).await? {
                ChatTurn::Text(text) => {
                    debug!(
                        event_name = "agent.run.completed",
                        agent = %self.name,
                        turns = turn + 1,
                        "run completed"
                    );
                    return Ok(AgentResponse {
                        messages: vec![AgentMessage { author: self.name.clone(), text }],
                    });
                }
                ChatTurn::ToolCalls(calls) => {
                    messages.push(ChatMessage::Assistant { text: None, tool_calls: calls.clone() });

                    for call in calls {
                        // Tool failures go back to the model as text; the run
                        // only aborts on transport-level problems.
                        let content = match self.tools.invoke(&call.name, call.arguments).await {
                            Ok(Value::String(text)) => text,
                            Ok(other) => other.to_string(),
                            Err(error) => format!("Error: {error}"),
                        };
                        debug!(
                            event_name = "agent.tool.invoked",
                            agent = %self.name,
                            tool = %call.name,
                            "tool result fed back"
                        );
                        messages.push(ChatMessage::ToolResult { call_id: call.id, content });
                    }
                }
            }
        }

        Err(AgentError::TurnLimit { agent: self.name.clone(), limit: self.max_tool_turns })
    }
}

/// Anything the server adapter can expose: a single agent or a whole workflow.
#[async_trait]
pub trait Runnable: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, input: &str) -> Result<AgentResponse, AgentError>;
}

#[async_trait]
impl Runnable for Agent {
    fn name(&self) -> &str {
        Agent::name(self)
    }

    async fn run(&self, input: &str) -> Result<AgentResponse, AgentError> {
        Agent::run(self, input).await
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

impl<'a> WireRequest<'a> {
    fn from_request(request: &'a ChatRequest) -> Self {
        Self {
            messages: request.messages.iter().map(WireMessage::from_message).collect(),
            tools: request
                .tools
                .iter()
                .map(|spec| WireTool { kind: "function", function: spec })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolSpec,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
}

impl WireMessage {
    fn from_message(message: &ChatMessage) -> Self {
        match message {
            ChatMessage::System(text) => Self {
                role: "system",
                content: Some(text.clone()),
                tool_call_id: None,
                tool_calls: Vec::new(),
            },
            ChatMessage::User(text) => Self {
                role: "user",
                content: Some(text.clone()),
                tool_call_id: None,
                tool_calls: Vec::new(),
            },
            ChatMessage::Assistant { text, tool_calls } => Self {
                role: "assistant",
                content: text.clone(),
                tool_call_id: None,
                tool_calls: tool_calls.iter().map(WireToolCall::from_request).collect(),
            },
            ChatMessage::ToolResult { call_id, content } => Self {
                role: "tool",
                content: Some(content.clone()),
                tool_call_id: Some(call_id.clone()),
                tool_calls: Vec::new(),
            },
        }
    }
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionCall,
}

impl WireToolCall {
    fn from_request(request: &ToolCallRequest) -> Self {
        Self {
            id: request.id.clone(),
            kind: "function".to_string(),
            function: WireFunctionCall {
                name: request.name.clone(),
                arguments: request.arguments.to_string(),
            },
        }
    }
}

/// Tool-call arguments arrive as a JSON-encoded string on the wire.
#[derive(Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

impl TryFrom<WireToolCall> for ToolCallRequest {
    type Error = AgentError;

    fn try_from(call: WireToolCall) -> Result<Self, Self::Error> {
        let arguments = serde_json::from_str(&call.function.arguments).map_err(|error| {
            AgentError::Protocol(format!(
                "tool call `{}` carried undecodable arguments: {error}",
                call.function.name
            ))
        })?;
        Ok(Self { id: call.id, name: call.function.name, arguments })
    }
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;

    use stayfinder_core::catalog::seattle_catalog;

    use crate::tools::{FindHotelsTool, ToolRegistry};

    use super::{
        AgentClient, AgentDefinition, AgentError, ChatBackend, ChatMessage, ChatRequest, ChatTurn,
        Runnable, ToolCallRequest,
    };

    /// Scripted backend: pops the next turn per request and records what the
    /// agent sent.
    struct ScriptedBackend {
        turns: Mutex<Vec<ChatTurn>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        fn new(mut turns: Vec<ChatTurn>) -> Arc<Self> {
            turns.reverse();
            Arc::new(Self { turns: Mutex::new(turns), requests: Mutex::new(Vec::new()) })
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().expect("request log").clone()
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn complete(&self, request: ChatRequest) -> Result<ChatTurn, AgentError> {
            self.requests.lock().expect("request log").push(request);
            self.turns
                .lock()
                .expect("scripted turns")
                .pop()
                .ok_or_else(|| AgentError::Protocol("script exhausted".to_string()))
        }
    }

    fn hotel_agent(backend: Arc<ScriptedBackend>) -> super::Agent {
        let mut tools = ToolRegistry::default();
        tools.register(FindHotelsTool::new(seattle_catalog()));

        let client = AgentClient::new(backend, "gpt-4.1-mini");
        client.create_agent(
            AgentDefinition::new("SeattleHotelAgent", "You are a helpful travel assistant.")
                .with_tools(tools),
        )
    }

    #[tokio::test]
    async fn plain_text_turn_completes_the_run() {
        let backend =
            ScriptedBackend::new(vec![ChatTurn::Text("Happy to help with hotels!".to_string())]);
        let agent = hotel_agent(Arc::clone(&backend));

        let response = agent.run("hello").await.expect("run should complete");

        assert_eq!(response.messages.len(), 1);
        assert_eq!(response.messages[0].author, "SeattleHotelAgent");
        assert_eq!(response.final_text(), Some("Happy to help with hotels!"));
    }

    #[tokio::test]
    async fn tool_call_result_is_fed_back_to_the_model() {
        let backend = ScriptedBackend::new(vec![
            ChatTurn::ToolCalls(vec![ToolCallRequest {
                id: "call-1".to_string(),
                name: "get_available_hotels".to_string(),
                arguments: json!({
                    "check_in_date": "2025-07-01",
                    "check_out_date": "2025-07-04",
                    "max_price": 200
                }),
            }]),
            ChatTurn::Text("Fabrikam Residences fits your budget.".to_string()),
        ]);
        let agent = hotel_agent(Arc::clone(&backend));

        let response = agent.run("find me a hotel").await.expect("run should complete");
        assert_eq!(response.final_text(), Some("Fabrikam Residences fits your budget."));

        let requests = backend.requests();
        assert_eq!(requests.len(), 2);

        // First request declares the tool schema.
        assert_eq!(requests[0].tools.len(), 1);
        assert_eq!(requests[0].tools[0].name, "get_available_hotels");

        // Second request carries the tool result with the computed total.
        let tool_result = requests[1]
            .messages
            .iter()
            .find_map(|message| match message {
                ChatMessage::ToolResult { content, .. } => Some(content.clone()),
                _ => None,
            })
            .expect("tool result should be present");
        assert!(tool_result.contains("$159/night (Total: $477)"));
    }

    #[tokio::test]
    async fn unknown_tool_request_becomes_an_error_payload() {
        let backend = ScriptedBackend::new(vec![
            ChatTurn::ToolCalls(vec![ToolCallRequest {
                id: "call-1".to_string(),
                name: "book_hotel".to_string(),
                arguments: json!({}),
            }]),
            ChatTurn::Text("Sorry, I cannot book rooms.".to_string()),
        ]);
        let agent = hotel_agent(Arc::clone(&backend));

        let response = agent.run("book it").await.expect("run should complete");
        assert_eq!(response.final_text(), Some("Sorry, I cannot book rooms."));

        let requests = backend.requests();
        let tool_result = requests[1]
            .messages
            .iter()
            .find_map(|message| match message {
                ChatMessage::ToolResult { content, .. } => Some(content.clone()),
                _ => None,
            })
            .expect("error payload should be fed back");
        assert!(tool_result.contains("unknown tool"));
    }

    #[tokio::test]
    async fn endless_tool_calls_hit_the_turn_limit() {
        let looping_call = || {
            ChatTurn::ToolCalls(vec![ToolCallRequest {
                id: "call-n".to_string(),
                name: "get_available_hotels".to_string(),
                arguments: json!({
                    "check_in_date": "2025-07-01",
                    "check_out_date": "2025-07-02"
                }),
            }])
        };
        let backend = ScriptedBackend::new((0..16).map(|_| looping_call()).collect());
        let agent = hotel_agent(backend);

        let error = agent.run("loop forever").await.expect_err("turn limit should trip");
        assert!(matches!(error, AgentError::TurnLimit { limit: 8, .. }));
    }

    #[tokio::test]
    async fn runnable_exposes_the_agent_name() {
        let backend = ScriptedBackend::new(vec![ChatTurn::Text("hi".to_string())]);
        let agent = hotel_agent(backend);
        let runnable: &dyn Runnable = &agent;

        assert_eq!(runnable.name(), "SeattleHotelAgent");
        let response = runnable.run("hello").await.expect("run should complete");
        assert_eq!(response.final_text(), Some("hi"));
    }
}
