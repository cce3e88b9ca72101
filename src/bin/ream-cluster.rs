//! REAM Cluster - discover cluster members from the container orchestrator
//!
//! `discover` runs a single poll and prints the candidate members as JSON.
//! `watch` runs the reconciliation loop with a dry-run membership manager that
//! logs every connect and disconnect it is asked for.

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use colored::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ream_cluster::{
    get_candidate_members, load_from_file, start_http_discovery, DirectoryClient, HttpDirectory,
    MemberId, MembershipManager, MembershipOutcome, SelfIdentity,
};

#[derive(Parser)]
#[command(
    name = "ream-cluster",
    version,
    about = "REAM Cluster - container orchestrator membership discovery",
    long_about = "Discovers the members of a REAM cluster from the running tasks of \
                  one or more orchestrator services and keeps the local membership \
                  in sync with them."
)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, default_value = "ream-cluster.toml")]
    config: PathBuf,

    /// Member identity of this process, excluded from discovery in ipv4 mode
    #[arg(long, global = true)]
    self_member: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one discovery poll and print the candidate members
    Discover,

    /// Keep membership reconciled until interrupted
    Watch,
}

/// Membership manager that only logs what it is asked to do
struct DryRunMembership {
    local: Option<MemberId>,
}

#[async_trait]
impl MembershipManager for DryRunMembership {
    async fn connect(&self, members: &[MemberId]) -> MembershipOutcome {
        for member in members {
            info!(member = %member, "connect");
        }
        MembershipOutcome::Ok
    }

    async fn disconnect(&self, members: &[MemberId]) -> MembershipOutcome {
        for member in members {
            info!(member = %member, "disconnect");
        }
        MembershipOutcome::Ok
    }

    fn local_member(&self) -> Option<MemberId> {
        self.local.clone()
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "ream_cluster=debug" } else { "ream_cluster=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(unix)]
fn local_hostname() -> Option<String> {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
}

#[cfg(not(unix))]
fn local_hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok()
}

fn parse_self_member(value: Option<&str>) -> anyhow::Result<Option<MemberId>> {
    value
        .map(|s| MemberId::parse(s).with_context(|| format!("invalid --self-member `{}`, expected prefix@address", s)))
        .transpose()
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    let file = load_from_file(&cli.config)?;
    let local = parse_self_member(cli.self_member.as_deref())?;
    let hostname = local_hostname();

    match cli.command {
        Commands::Discover => {
            let identity = SelfIdentity::for_mode(file.strategy.address_mode, local, hostname);
            let client = DirectoryClient::new(HttpDirectory::new(file.directory.clone())?);
            let members = get_candidate_members(&client, &file.strategy, &identity).await?;
            println!("{}", serde_json::to_string_pretty(&members)?);
        }
        Commands::Watch => {
            let handle = start_http_discovery(file, DryRunMembership { local }, hostname)?;
            tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
            info!("Interrupted, stopping discovery");
            handle.stop().await;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }
    init_tracing(cli.verbose);

    if let Err(e) = execute(cli).await {
        eprintln!("{} {:#}", "Error:".bright_red().bold(), e);
        process::exit(1);
    }
}
