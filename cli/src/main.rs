//! a2a-requester - delegates tasks to an a2a-gate executor

mod client;
mod context;

use a2a_gate::bootstrap;
use a2a_gate::envelope::{OutboundMetadata, RpcRequest, TaskMessage};
use a2a_gate::extension::EXTENSION_URI;
use a2a_gate::provider::{HttpProvider, MintRequest, PolicyProvider};
use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::client::ExecutorClient;
use crate::context::ContextOptions;

#[derive(Parser)]
#[command(name = "a2a-requester")]
#[command(about = "Requester agent that delegates tasks to a policy-gated executor")]
#[command(version)]
struct Cli {
    /// Executor base URL
    #[arg(short, long, env = "EXECUTOR_URL", default_value = "http://localhost:8001")]
    executor: String,

    /// Request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint a one-shot credential and delegate a task to the executor
    Delegate(DelegateArgs),

    /// Print the executor's agent card
    Card,
}

#[derive(Args)]
struct DelegateArgs {
    /// Identity & policy provider base URL
    #[arg(long, env = "PROVIDER_URL", default_value = "http://localhost:8080")]
    provider_url: String,

    /// Provider API key
    #[arg(long, env = "PROVIDER_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Prefix for well-known agent DIDs
    #[arg(long, env = "DID_PREFIX", default_value = "did:web:agents.example.com")]
    did_prefix: String,

    /// Name the requester registers under
    #[arg(short = 'n', long, env = "REQUESTER_NAME", default_value = "a2atriage")]
    name: String,

    /// Audience the one-shot credential is minted for
    #[arg(long, env = "PROVIDER_AUDIENCE", default_value = "https://api.example.com")]
    audience: String,

    #[arg(long, default_value = "infer")]
    action: String,

    #[arg(long, default_value = "llm://responses")]
    resource: String,

    /// Task the executor should run
    #[arg(short, long, default_value = "summarize")]
    task: String,

    /// Reference to the input document
    #[arg(short, long, default_value = "doc://case-123")]
    input_ref: String,

    #[arg(long, default_value = "gemini-1.5-pro")]
    model: String,

    #[arg(long, default_value = "US")]
    region: String,

    #[arg(long, default_value_t = 15)]
    estimated_cost_cents: u64,

    #[arg(long, default_value_t = 500)]
    budget_remaining_cents: u64,

    /// Flag the input as containing PII
    #[arg(long)]
    pii: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "a2a_gate_cli=info,a2a_gate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let timeout = Duration::from_secs(cli.timeout_secs);
    let executor = ExecutorClient::new(&cli.executor, timeout)?;

    match cli.command {
        Commands::Delegate(args) => run_delegate(&executor, args, timeout).await,
        Commands::Card => run_card(&executor).await,
    }
}

async fn run_delegate(executor: &ExecutorClient, args: DelegateArgs, timeout: Duration) -> Result<()> {
    let provider = HttpProvider::new(args.provider_url.as_str(), args.api_key.as_str(), timeout)?
        .with_did_prefix(args.did_prefix.as_str());

    let identity =
        bootstrap::register_identity(&provider, &args.name, &["delegate".to_string()]).await?;

    let credential = provider
        .mint_credential(MintRequest {
            identity: &identity,
            audience: &args.audience,
            action: Some(args.action.as_str()),
            resource: Some(args.resource.as_str()),
        })
        .await?
        .ok_or_else(|| anyhow!("Provider issued no one-shot credential for {}", identity.did))?;

    let context = ContextOptions {
        model: args.model,
        region: args.region,
        estimated_cost_cents: args.estimated_cost_cents,
        daily_budget_remaining_cents: args.budget_remaining_cents,
        pii_detected: args.pii,
        ..ContextOptions::default()
    }
    .build();

    let metadata = OutboundMetadata {
        action: args.action,
        resource: args.resource,
        context,
        auth_token: credential.into_token(),
        agent_did: identity.did.clone(),
    };
    let request = RpcRequest::task_execute(
        uuid::Uuid::new_v4().to_string(),
        TaskMessage::new(args.task, args.input_ref),
        &metadata,
    )?;

    tracing::info!("Delegating {} as {}", request.id, identity.did);
    let outcome = executor.delegate(&request).await?;

    println!("Status: {}", outcome.status);
    if outcome.activated {
        println!("Activated: {}", EXTENSION_URI);
    }
    println!("{}", serde_json::to_string_pretty(&outcome.body)?);

    if outcome.is_success() {
        Ok(())
    } else {
        Err(anyhow!("Delegation was not executed"))
    }
}

async fn run_card(executor: &ExecutorClient) -> Result<()> {
    let card = executor.fetch_card().await?;
    println!("{}", serde_json::to_string_pretty(&card)?);
    Ok(())
}
