use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use stayfinder_agent::{
    select_provider, Agent, AgentClient, AgentDefinition, ChatBackend, CredentialError,
    CredentialProvider, FindHotelsTool, HttpChatBackend, ToolRegistry, Workflow, WorkflowBuilder,
    WorkflowError,
};
use stayfinder_core::catalog::seattle_catalog;
use stayfinder_core::config::{AppConfig, ConfigError, LoadOptions};

const HOTEL_AGENT_INSTRUCTIONS: &str = "You are a helpful travel assistant specializing in finding hotels in Seattle, Washington.

When a user asks about hotels in Seattle:
1. Ask for their check-in and check-out dates if not provided
2. Ask about their budget preferences if not mentioned
3. Use the get_available_hotels tool to find available options
4. Present the results in a friendly, informative way
5. Offer to help with additional questions about the hotels or Seattle

Be conversational and helpful. If users ask about things outside of Seattle hotels,
politely let them know you specialize in Seattle hotel recommendations.";

const WRITER_INSTRUCTIONS: &str = "You are an excellent content writer. You create new content and edit contents based on the feedback.";

const REVIEWER_INSTRUCTIONS: &str = "You are an excellent content reviewer. Provide actionable feedback to the writer about the provided content in the most concise manner possible.";

pub struct Application {
    pub config: AppConfig,
    client: AgentClient,
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application").field("config", &self.config).finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("credential acquisition failed: {0}")]
    Credential(#[from] CredentialError),
    #[error("workflow assembly failed: {0}")]
    Workflow(#[from] WorkflowError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Config -> credential -> remote client. Credential failures surface here and
/// terminate startup; a sample program has nothing useful to do without one.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let credential: Arc<dyn CredentialProvider> =
        Arc::from(select_provider(config.credential.strategy));

    // Probe acquisition so a broken identity setup fails at startup rather
    // than on the first conversation. The probe token is dropped immediately;
    // the backend re-acquires per request.
    let probe = credential.acquire().await?;
    drop(probe);
    info!(event_name = "system.bootstrap.credential_ready", "credential acquisition verified");

    let backend: Arc<dyn ChatBackend> =
        Arc::new(HttpChatBackend::new(&config.project, Arc::clone(&credential)));
    let client = AgentClient::new(backend, config.project.model_deployment.clone());

    info!(
        event_name = "system.bootstrap.client_ready",
        endpoint = %config.project.endpoint,
        model_deployment = %config.project.model_deployment,
        "remote agent client constructed"
    );

    Ok(Application { config, client })
}

impl Application {
    /// The single-tool hotel finder sample agent.
    pub fn hotel_agent(&self) -> Agent {
        let mut tools = ToolRegistry::default();
        tools.register(FindHotelsTool::new(seattle_catalog()));

        self.client.create_agent(
            AgentDefinition::new("SeattleHotelAgent", HOTEL_AGENT_INSTRUCTIONS).with_tools(tools),
        )
    }

    /// The two-node Writer -> Reviewer workflow sample.
    pub fn writer_reviewer_workflow(&self) -> Result<Workflow, WorkflowError> {
        let writer = self.client.create_agent(AgentDefinition::new("Writer", WRITER_INSTRUCTIONS));
        let reviewer =
            self.client.create_agent(AgentDefinition::new("Reviewer", REVIEWER_INSTRUCTIONS));

        WorkflowBuilder::new("Writer-Reviewer")
            .register_agent("Writer", writer)
            .register_agent("Reviewer", reviewer)
            .set_start_executor("Writer")
            .add_edge("Writer", "Reviewer")
            .build()
    }
}
