// reconctl - Main Entry Point
//
// Command-line front end for the recon orchestrator:
// - One subcommand per capability, printing JSON on stdout
// - `serve` to run the HTTP API
//
// Logs go to stderr so stdout stays machine-readable.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use recon_orchestrator::config::Config;
use recon_orchestrator::logging::LoggingConfig;
use recon_orchestrator::metrics::ToolMetrics;
use recon_orchestrator::server::{self, AppState};
use recon_orchestrator::services::{ScanType, Toolkit};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// reconctl: orchestrate network reconnaissance tools
#[derive(Parser, Debug)]
#[command(name = "reconctl")]
#[command(author = "Recon Orchestrator Contributors")]
#[command(version)]
#[command(about = "Run reconnaissance tools and normalize their output", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: ~/.config/recon-orchestrator/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List local network interfaces
    Interfaces,
    /// ARP sweep for live hosts
    Discover {
        /// Interface to sweep from
        #[arg(short, long)]
        interface: Option<String>,
        /// CIDR range (default from config)
        #[arg(short, long)]
        range: Option<String>,
    },
    /// Port scan a target with nmap
    Scan {
        target: String,
        /// Port list or ranges, e.g. 21,22,80-90
        #[arg(short, long)]
        ports: Option<String>,
        /// syn, tcp or udp
        #[arg(short = 't', long, default_value = "syn")]
        scan_type: String,
    },
    /// Search Metasploit modules
    Search { query: String },
    /// Launch an exploit module against a target
    Exploit {
        module: String,
        rhosts: String,
        #[arg(long)]
        rport: Option<u32>,
        #[arg(long)]
        payload: Option<String>,
    },
    /// List open Metasploit sessions
    Sessions,
    /// Run one command inside an open session
    SessionExec { session_id: String, command: String },
    /// Pull crypt hashes from a session's shadow file
    ExtractHashes {
        session_id: String,
        #[arg(long)]
        shadow_path: Option<String>,
    },
    /// Start John the Ripper in the background
    Crack {
        hash_file: String,
        #[arg(short, long)]
        wordlist: Option<String>,
    },
    /// Show passwords cracked so far
    CrackStatus { hash_file: String },
    /// Serve the HTTP API
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match args.config {
        Some(ref path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            Config::load_from_path(path)?
        }
        None => Config::load()?,
    };

    LoggingConfig::from_settings(&config.logging)?
        .verbose(args.verbose)
        .init()
        .context("Failed to initialize logging")?;

    if let Commands::Serve { port } = args.command {
        if let Some(port) = port {
            config.server.port = port;
        }
        return serve(config).await;
    }

    let toolkit = Toolkit::from_config(&config, None);
    run_command(&toolkit, args.command).await
}

async fn run_command(toolkit: &Toolkit, command: Commands) -> Result<()> {
    match command {
        Commands::Interfaces => print_json(&toolkit.network.list_interfaces().await?),
        Commands::Discover { interface, range } => print_json(
            &toolkit
                .network
                .discover_hosts(interface.as_deref(), range.as_deref())
                .await?,
        ),
        Commands::Scan {
            target,
            ports,
            scan_type,
        } => {
            let scan_type: ScanType = scan_type.parse()?;
            print_json(
                &toolkit
                    .scanner
                    .scan_ports(&target, ports.as_deref(), scan_type)
                    .await?,
            )
        }
        Commands::Search { query } => print_json(&toolkit.metasploit.search_exploits(&query).await?),
        Commands::Exploit {
            module,
            rhosts,
            rport,
            payload,
        } => print_json(
            &toolkit
                .metasploit
                .run_exploit(&module, &rhosts, rport, payload.as_deref())
                .await?,
        ),
        Commands::Sessions => print_json(&toolkit.metasploit.list_sessions().await?),
        Commands::SessionExec {
            session_id,
            command,
        } => print_json(
            &toolkit
                .metasploit
                .run_session_command(&session_id, &command)
                .await?,
        ),
        Commands::ExtractHashes {
            session_id,
            shadow_path,
        } => print_json(
            &toolkit
                .metasploit
                .extract_credentials(&session_id, shadow_path.as_deref())
                .await?,
        ),
        Commands::Crack {
            hash_file,
            wordlist,
        } => print_json(
            &toolkit
                .cracking
                .start_cracking(&hash_file, wordlist.as_deref())
                .await?,
        ),
        Commands::CrackStatus { hash_file } => {
            print_json(&toolkit.cracking.get_cracking_status(&hash_file).await?)
        }
        Commands::Serve { .. } => bail!("serve is not a one-shot command"),
    }
}

async fn serve(config: Config) -> Result<()> {
    let metrics = Arc::new(ToolMetrics::new().context("Failed to create metrics registry")?);
    let toolkit = Toolkit::from_config(&config, Some(metrics.clone()));

    info!(
        "reconctl v{} serving on {}",
        env!("CARGO_PKG_VERSION"),
        config.server.bind_address()
    );
    server::serve(&config.server, AppState::new(toolkit, Some(metrics))).await
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
