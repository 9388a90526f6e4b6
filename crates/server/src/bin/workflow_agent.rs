//! Writer/Reviewer workflow sample - two agents wired Writer -> Reviewer and
//! served like a single agent. `--cli` runs one hardcoded prompt locally
//! instead of serving.

use anyhow::Result;
use clap::Parser;

use stayfinder_core::config::{AppConfig, LoadOptions};
use stayfinder_server::{bootstrap, logging, serve};

const SAMPLE_PROMPT: &str =
    "Create a slogan for a new electric SUV that is affordable and fun to drive.";

#[derive(Debug, Parser)]
#[command(name = "workflow-agent", about = "Writer/Reviewer multi-agent workflow sample")]
struct Cli {
    /// Run the sample prompt once and print the result instead of serving.
    #[arg(long)]
    cli: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let config = AppConfig::load(LoadOptions::default())?;
    logging::init(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let workflow = app.writer_reviewer_workflow()?;

    if args.cli {
        println!("Running workflow agent in CLI mode...");
        println!("\nUser: {SAMPLE_PROMPT}\n");

        let response = workflow.run(SAMPLE_PROMPT).await?;
        for message in response.messages {
            println!("{}: {}\n", message.author, message.text);
        }
        return Ok(());
    }

    println!("Starting workflow agent HTTP server...");
    serve::serve(workflow.into_agent(), &app.config.server).await
}
