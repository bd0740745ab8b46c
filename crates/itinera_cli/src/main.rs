use clap::{Parser, Subcommand};
use itinera_core::config::ItineraConfig;
use itinera_core::plan::TripParameters;
use itinera_gateway::GatewayServer;
use itinera_mcp::McpManager;
use itinera_reasoning::llm::{CompletionParams, LlmClient};
use itinera_reasoning::providers::create_client;
use itinera_reasoning::PlanOrchestrator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "itinera", author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "itinera.toml", env = "ITINERA_CONFIG", global = true)]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one travel plan and print it as JSON
    Plan {
        #[arg(long)]
        origin: String,
        #[arg(long)]
        destination: String,
        /// YYYY-MM-DD
        #[arg(long)]
        start_date: String,
        /// YYYY-MM-DD
        #[arg(long)]
        end_date: String,
        #[arg(long, default_value_t = 2)]
        travelers: u32,
        #[arg(long, default_value = "Medium")]
        budget: String,
        /// Comma-separated, e.g. "Art,History,Food"
        #[arg(long, value_delimiter = ',')]
        interests: Vec<String>,
        /// Override the configured step budget
        #[arg(long)]
        step_budget: Option<usize>,
    },
    /// Serve the planning HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,hyper=warn,reqwest=warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: &Path) -> anyhow::Result<ItineraConfig> {
    // An existing file that fails to parse is an error; a missing one is not.
    if path.exists() {
        ItineraConfig::load(path)
    } else {
        Ok(ItineraConfig::load_or_default(path))
    }
}

fn build_planner(config: &ItineraConfig, manager: &McpManager) -> PlanOrchestrator {
    let client: Option<Arc<dyn LlmClient>> = match create_client(&config.llm) {
        Ok(client) => Some(client),
        Err(e) => {
            warn!("LLM client unavailable, plans will fail: {:#}", e);
            None
        }
    };
    let params = CompletionParams {
        max_tokens: config.llm.max_tokens,
        temperature: config.llm.temperature,
    };
    PlanOrchestrator::with_llm(client, params, manager.providers(), config.planner.clone())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let mut config = load_config(&cli.config)?;
    info!(
        "Config: provider={} model={} providers={}",
        config.llm.provider,
        config.llm.model,
        config.providers.len()
    );
    let manager = McpManager::from_configs(&config.providers);

    match cli.command {
        Command::Plan {
            origin,
            destination,
            start_date,
            end_date,
            travelers,
            budget,
            interests,
            step_budget,
        } => {
            if let Some(n) = step_budget {
                config.planner.step_budget = n;
            }
            let planner = build_planner(&config, &manager);
            let trip = TripParameters {
                origin,
                destination,
                start_date,
                end_date,
                traveler_count: travelers,
                budget,
                interests,
            };
            let result = planner.generate_plan(&trip).await;
            manager.disconnect_all().await;

            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.is_success() {
                std::process::exit(1);
            }
        }
        Command::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            let port = port.unwrap_or(config.gateway.port);
            let planner = Arc::new(build_planner(&config, &manager));
            let server = GatewayServer::new(planner, &host, port);

            tokio::select! {
                result = server.serve() => result?,
                _ = tokio::signal::ctrl_c() => info!("Shutting down"),
            }
            manager.disconnect_all().await;
        }
    }

    Ok(())
}
