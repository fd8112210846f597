use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use slackgate::config::Config;
use slackgate::{gateway, logging, security};
use std::path::PathBuf;

/// Signed Slack Events ingress for a remote agent runtime.
#[derive(Parser, Debug)]
#[command(name = "slackgate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file path (default: platform config dir, slackgate/config.toml)
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Bind address (overrides [gateway] host)
        #[arg(long)]
        host: Option<String>,

        /// Port (overrides [gateway] port)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Compute Slack request signature headers for a body (for crafting test requests)
    Sign {
        /// Signing secret
        #[arg(long)]
        secret: String,

        /// Unix timestamp in seconds (default: now)
        #[arg(long)]
        timestamp: Option<i64>,

        /// Request body
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,

        /// Read the request body from a file
        #[arg(long, value_name = "PATH")]
        body_file: Option<PathBuf>,
    },

    /// Resolve the bot token and verify it with Slack `auth.test`
    Check,

    /// Print the effective configuration with credentials redacted
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            logging::init(&config.log_level)?;
            config.warn_ignored_keys();
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            config.validate()?;
            gateway::run_gateway(config).await
        }
        Commands::Sign {
            secret,
            timestamp,
            body,
            body_file,
        } => {
            let body = match (body, body_file) {
                (Some(body), _) => body,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read body file {}", path.display()))?,
                (None, None) => anyhow::bail!("Provide --body or --body-file"),
            };
            let timestamp = timestamp
                .unwrap_or_else(|| chrono::Utc::now().timestamp())
                .to_string();
            let signature = security::sign_request(&secret, &timestamp, &body)
                .context("Failed to compute request signature")?;
            println!("x-slack-request-timestamp: {timestamp}");
            println!("x-slack-signature: {signature}");
            Ok(())
        }
        Commands::Check => {
            logging::init(&config.log_level)?;
            config.warn_ignored_keys();
            if !gateway::check_slack_auth(&config).await? {
                anyhow::bail!("Slack auth.test failed for {}", config.slack.bot_token_param);
            }
            println!("✅ Slack bot token accepted by auth.test");
            Ok(())
        }
        Commands::Config => {
            for key in &config.ignored_keys {
                eprintln!("warning: ignoring unknown config key: {key}");
            }
            let rendered = toml::to_string_pretty(&config.redacted())
                .context("Failed to render configuration")?;
            print!("{rendered}");
            Ok(())
        }
    }
}
