//! Financial Report Analyst CLI
//!
//! - `serve` runs the HTTP analysis service
//! - `schema` writes the report JSON Schema handed to the assistant
//! - `create-assistant` provisions the remote assistant
//! - `validate` checks a saved report against the schema
//! - `chat` asks free-form questions about local documents

use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use financial_report_analyst::assistant::prompts;
use financial_report_analyst::server::{router, AppState};
use financial_report_analyst::{
    validate_str, AnalysisResponse, AssistantApi, AssistantSpec, ChatSession, FunctionTool,
    OpenAiClient, RunOrchestrator, ServiceConfig,
};
use log::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "financial-report-analyst")]
#[command(about = "Structured financial analysis through a hosted AI assistant")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP analysis service
    Serve {
        /// Host address to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Largest accepted upload in megabytes
        #[arg(long, default_value = "25")]
        max_upload_mb: usize,
    },

    /// Write the report JSON Schema used as the assistant's function parameters
    Schema {
        /// Output file
        #[arg(short, long, default_value = "assistant_config/analysis_function.json")]
        output: PathBuf,

        /// Print to stdout instead of writing a file
        #[arg(long)]
        stdout: bool,
    },

    /// Create the remote assistant and print its id
    CreateAssistant {
        /// Instructions file for the structured-analysis assistant
        #[arg(long, default_value = "assistant_config/instructions.md")]
        instructions: PathBuf,

        #[arg(long, default_value = prompts::DEFAULT_ASSISTANT_MODEL)]
        model: String,

        #[arg(long)]
        name: Option<String>,

        /// Create a plain-text chat assistant (file search only, no analysis function)
        #[arg(long)]
        chat: bool,
    },

    /// Validate a saved report JSON file
    Validate { file: PathBuf },

    /// Chat about one or more documents
    Chat {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(level.into())
                .add_directive("tower_http=debug".parse()?),
        )
        .init();
    Ok(())
}

fn openai_client(config: &ServiceConfig) -> OpenAiClient {
    OpenAiClient::new(config.api_key.clone()).with_base_url(config.base_url.clone())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    match cli.command {
        Command::Serve {
            host,
            port,
            max_upload_mb,
        } => serve(host, port, max_upload_mb).await,
        Command::Schema { output, stdout } => write_schema(output, stdout),
        Command::CreateAssistant {
            instructions,
            model,
            name,
            chat,
        } => create_assistant(instructions, model, name, chat).await,
        Command::Validate { file } => validate_file(file),
        Command::Chat { files } => chat(files).await,
    }
}

async fn serve(host: String, port: u16, max_upload_mb: usize) -> anyhow::Result<()> {
    let config = ServiceConfig::from_env()?;
    let assistant_id = config.require_assistant_id()?.to_string();

    let client: Arc<dyn AssistantApi> = Arc::new(openai_client(&config));
    let orchestrator =
        RunOrchestrator::new(client, assistant_id.clone()).with_poll_settings(config.poll.clone());
    let app = router(AppState::new(orchestrator), max_upload_mb * 1024 * 1024);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Assistant ID: {}", assistant_id);
    info!(
        "Polling every {:?}, giving up after {:?}",
        config.poll.interval, config.poll.deadline
    );

    axum::serve(listener, app).await?;
    Ok(())
}

fn write_schema(output: PathBuf, stdout: bool) -> anyhow::Result<()> {
    let schema = AnalysisResponse::schema_as_json()?;
    if stdout {
        println!("{}", schema);
        return Ok(());
    }

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output, schema)
        .with_context(|| format!("Error writing JSON schema file {:?}", output))?;
    println!("Successfully generated JSON schema at: {}", output.display());
    Ok(())
}

async fn create_assistant(
    instructions: PathBuf,
    model: String,
    name: Option<String>,
    chat: bool,
) -> anyhow::Result<()> {
    let config = ServiceConfig::from_env()?;

    let spec = if chat {
        AssistantSpec {
            name: name.unwrap_or_else(|| prompts::CHAT_ASSISTANT_NAME.to_string()),
            model,
            instructions: prompts::CHAT_ASSISTANT_INSTRUCTIONS.to_string(),
            function: None,
            file_search: true,
        }
    } else {
        let instructions = std::fs::read_to_string(&instructions)
            .with_context(|| format!("Instructions file not found at {:?}", instructions))?;
        AssistantSpec {
            name: name.unwrap_or_else(|| prompts::DEFAULT_ASSISTANT_NAME.to_string()),
            model,
            instructions,
            function: Some(FunctionTool {
                name: prompts::ANALYSIS_FUNCTION_NAME.to_string(),
                description: prompts::ANALYSIS_FUNCTION_DESCRIPTION.to_string(),
                parameters: AnalysisResponse::function_parameters()?,
            }),
            file_search: true,
        }
    };

    info!(
        "Creating assistant '{}' with model '{}'...",
        spec.name, spec.model
    );
    let id = openai_client(&config).create_assistant(&spec).await?;

    println!("Assistant created successfully!");
    println!("Assistant ID: {}", id);
    println!("\nStore this ID in your .env file as ASSISTANT_ID");
    Ok(())
}

fn validate_file(file: PathBuf) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&file)
        .with_context(|| format!("Could not read {:?}", file))?;

    match validate_str(&raw) {
        Ok(report) => {
            println!(
                "✅ {} is a valid report for {} ({})",
                file.display(),
                report.municipality_name,
                report.fiscal_year
            );
            Ok(())
        }
        Err(err) => {
            eprintln!("❌ {} failed validation:", file.display());
            for violation in &err.violations {
                eprintln!("  - {}", violation);
            }
            Err(err.into())
        }
    }
}

async fn chat(files: Vec<PathBuf>) -> anyhow::Result<()> {
    let config = ServiceConfig::from_env()?;
    let assistant_id = config.require_assistant_id()?.to_string();
    let client: Arc<dyn AssistantApi> = Arc::new(openai_client(&config));

    let mut session =
        ChatSession::new(client, assistant_id).with_poll_settings(config.poll.clone());

    println!("☁️  Uploading documents...");
    let uploaded = session.add_document_paths(&files).await?;
    for name in &uploaded {
        println!("   - {}", name);
    }

    println!("\n🤖 Ready! Ask questions about your documents (type 'quit' to exit).");
    println!("------------------------------------------------------------------");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let prompt = input.trim();

        if prompt.eq_ignore_ascii_case("quit") || prompt.eq_ignore_ascii_case("exit") {
            break;
        }
        if prompt.is_empty() {
            continue;
        }

        println!("\nAnalysing...");
        match session.ask(prompt).await {
            Ok(response) => {
                println!("\n{}\n", response);
                println!("------------------------------------------------------------------");
            }
            Err(e) => eprintln!("❌ Error: {}", e),
        }
    }

    session.close().await;
    Ok(())
}
