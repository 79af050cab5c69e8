use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use ragchat_core::{Config, StreamEvent, StreamRequest, StreamingChatClient};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "ragchat streaming chat CLI", long_about = None)]
struct Cli {
    /// Config file (JSON or TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Platform base URL; overrides the config file
    #[arg(long, global = true, env = "RAGCHAT_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask an assistant one question and stream the answer
    Chat {
        #[arg(long)]
        assistant: String,
        #[arg(short, long, help = "Question for the assistant")]
        message: String,
        #[arg(long, help = "Correlation id sent as X-Request-Id")]
        request_id: Option<String>,
        #[arg(long, help = "Print the final result as JSON instead of a source list")]
        json: bool,
    },
}

fn load_config(path: Option<PathBuf>, base_url: Option<String>) -> anyhow::Result<Config> {
    let mut cfg = match (path, &base_url) {
        (Some(p), _) => Config::from_path(&p)
            .with_context(|| format!("loading config from {}", p.display()))?,
        (None, Some(url)) => Config::with_base_url(url.clone()),
        (None, None) => bail!("either --config or --base-url (RAGCHAT_BASE_URL) is required"),
    };
    if let Some(url) = base_url {
        cfg.api.base_url = url;
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config, cli.base_url)?;
    let client = StreamingChatClient::from_config(&cfg)?;

    match cli.command {
        Commands::Chat {
            assistant,
            message,
            request_id,
            json,
        } => {
            let mut req = StreamRequest::new(assistant, message);
            if let Some(rid) = request_id {
                req = req.with_request_id(rid);
            }

            let mut stream = client.stream_chat(req);
            let mut saw_token = false;
            while let Some(ev) = stream.next().await {
                match ev {
                    StreamEvent::Token(txt) => {
                        saw_token = true;
                        print!("{txt}");
                        io::stdout().flush().ok();
                    }
                    StreamEvent::Complete(result) => {
                        if saw_token {
                            println!();
                        }
                        if json {
                            println!("{}", serde_json::to_string_pretty(&result)?);
                        } else if !result.source_urls.is_empty() {
                            println!("\nSources:");
                            for url in &result.source_urls {
                                println!("  {url}");
                            }
                        }
                    }
                    StreamEvent::Error(err) => {
                        if saw_token {
                            println!();
                        }
                        return Err(err.into());
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(())
}
