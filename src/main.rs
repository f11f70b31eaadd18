//! `inst-access` command line tool.
//!
//! Keys and trusted issuers are read from `INST_ACCESS_*` environment
//! variables (or a `.env` file).

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use inst_access::config::{self, Config};
use inst_access::Token;
use std::io::Read;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "inst-access")]
#[command(author, version, about = "Issue and inspect service identity tokens", long_about = None)]
struct Cli {
    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a token for a user
    Issue(IssueArgs),

    /// Decrypt and verify a token, printing its claims
    Verify {
        /// Token string; read from stdin when omitted
        token: Option<String>,
    },

    /// Check whether a signed token looks like one of ours, without verifying it
    Probe {
        /// Token string; read from stdin when omitted
        token: Option<String>,
    },
}

#[derive(Args)]
struct IssueArgs {
    /// User uuid (sub)
    #[arg(long)]
    user: String,

    /// Account uuid (acct)
    #[arg(long)]
    account: String,

    /// Canvas domain the request originated from
    #[arg(long = "domain")]
    canvas_domain: Option<String>,

    /// Real user uuid when masquerading
    #[arg(long)]
    real_user: Option<String>,

    /// Shard of the real user when masquerading
    #[arg(long)]
    real_user_shard_id: Option<i64>,

    /// Global id of the user, recorded for debugging only
    #[arg(long)]
    user_global_id: Option<u64>,

    /// Global id of the real user, recorded for debugging only
    #[arg(long)]
    real_user_global_id: Option<u64>,

    #[arg(long)]
    region: Option<String>,

    #[arg(long)]
    client_id: Option<String>,

    /// Mark the token as issued to an internal service
    #[arg(long)]
    instructure_service: bool,

    /// Shard of the acting tenant
    #[arg(long)]
    canvas_shard_id: Option<i64>,

    /// Print the signed JWS without encrypting it
    #[arg(long)]
    unencrypted: bool,
}

impl IssueArgs {
    fn build_token(self) -> inst_access::Result<Token> {
        let mut builder = Token::for_user(self.user, self.account);
        if let Some(domain) = self.canvas_domain {
            builder = builder.canvas_domain(domain);
        }
        if let Some(real_user) = self.real_user {
            builder = builder.real_user_uuid(real_user);
        }
        if let Some(shard_id) = self.real_user_shard_id {
            builder = builder.real_user_shard_id(shard_id);
        }
        if let Some(global_id) = self.user_global_id {
            builder = builder.user_global_id(global_id);
        }
        if let Some(global_id) = self.real_user_global_id {
            builder = builder.real_user_global_id(global_id);
        }
        if let Some(region) = self.region {
            builder = builder.region(region);
        }
        if let Some(client_id) = self.client_id {
            builder = builder.client_id(client_id);
        }
        if self.instructure_service {
            builder = builder.instructure_service(true);
        }
        if let Some(shard_id) = self.canvas_shard_id {
            builder = builder.canvas_shard_id(shard_id);
        }
        builder.build()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = Config::from_env().context("Failed to load token configuration")?;
    config::init(config)?;

    match cli.command {
        Commands::Issue(args) => {
            let unencrypted = args.unencrypted;
            let token = args.build_token()?;

            let encoded = if unencrypted {
                token.to_unencrypted_token_string()?
            } else {
                token.to_token_string()?
            };
            info!(jti = token.jti(), unencrypted, "Issued token");
            println!("{}", encoded);
        }
        Commands::Verify { token } => {
            let input = token_input(token)?;
            let token = Token::from_token_string(&input)?;
            println!("{}", serde_json::to_string_pretty(token.claims())?);
        }
        Commands::Probe { token } => {
            let input = token_input(token)?;
            println!("{}", Token::is_token(&input));
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn token_input(arg: Option<String>) -> Result<String> {
    let input = match arg {
        Some(token) => token,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read token from stdin")?;
            buf
        }
    };

    let input = input.trim().to_string();
    if input.is_empty() {
        bail!("No token given");
    }
    Ok(input)
}
