use anyhow::Result;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use codex_rag::{logging, ApiServer, AppConfig, AppContext, JwtAuth, QueryRequest};

#[derive(Parser)]
#[command(name = "codex-rag")]
#[command(about = "WordPress documentation assistant with cached retrieval", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Override APP_HOST
        #[arg(long)]
        host: Option<String>,

        /// Override APP_PORT
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Answer one question and print the response as JSON
    Ask {
        question: String,

        /// Skip retrieval and answer from the model alone
        #[arg(long)]
        llm_only: bool,
    },

    /// Issue a token for the cache administration routes
    Token {
        subject: String,

        /// Lifetime in hours
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    logging::init(&config);

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.app_host = host;
            }
            if let Some(port) = port {
                config.app_port = port;
            }

            let ctx = AppContext::from_config(&config);
            ApiServer::new(config, ctx).start().await?;
        }

        Commands::Ask { question, llm_only } => {
            let ctx = AppContext::from_config(&config);
            let request = QueryRequest::new(question);
            let request_id = Uuid::new_v4().to_string();

            let response = if llm_only {
                ctx.llm_only.handle_query(&request, &request_id).await?
            } else {
                ctx.rag.handle_query(&request, &request_id).await?
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::Token { subject, hours } => {
            let token = JwtAuth::new(&config.jwt_secret).generate_token(&subject, Some(hours))?;
            println!("{}", token);
        }
    }

    Ok(())
}
