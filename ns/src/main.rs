//! nodesync - controller and tools for cross-node synchronization primitives
//!
//! CLI entry point for serving the controller and inspecting it.

use std::fs;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use nodesync::cli::{Cli, Command, get_log_path};
use nodesync::config::Config;
use nodesync::{ControlAdapter, ControlServer, NodeClient};
use primitives::LocalEngine;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

// NodeClient drives its own runtime with block_on, so main stays synchronous
// and only `serve` builds a runtime.
fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Serve { bind, port } => cmd_serve(&config, bind, port),
        Command::Ping => cmd_ping(&config),
        Command::Proxies => cmd_proxies(&config),
        Command::Nodes => cmd_nodes(&config),
        Command::Terminate { id, exit_code } => cmd_terminate(&config, &id, exit_code),
    }
}

/// Run the controller with the in-memory engine until Ctrl-C
fn cmd_serve(config: &Config, bind: Option<String>, port: Option<u16>) -> Result<()> {
    let mut controller = config.controller.clone();
    if let Some(bind) = bind {
        controller.bind = bind;
    }
    if let Some(port) = port {
        controller.port = port;
    }
    let addr = controller.bind_address();
    debug!(%addr, "cmd_serve: called");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("nodesync-controller")
        .build()
        .context("Failed to build controller runtime")?;

    runtime.block_on(async {
        let adapter = ControlAdapter::new(Arc::new(LocalEngine::new())).with_connect_timeout(controller.connect_timeout());
        let server = ControlServer::bind(&addr, Arc::new(adapter)).await?;
        let local = server.local_addr()?;

        println!("{} controller listening on {}", "nodesync".bold(), local.to_string().green());
        println!("Press Ctrl-C to stop");

        server
            .run_until(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "cmd_serve: failed to listen for Ctrl-C");
                }
            })
            .await
    })?;

    println!("Controller stopped");
    Ok(())
}

fn cmd_ping(config: &Config) -> Result<()> {
    debug!("cmd_ping: called");
    let client = NodeClient::connect(config)?;
    match client.ping() {
        Ok(version) => {
            println!("{} {}", "Controller is alive".green(), config.controller.address());
            println!("Version: {}", version);
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "Controller not responding".red(), config.controller.address());
            Err(e).context("Ping failed")
        }
    }
}

fn cmd_proxies(config: &Config) -> Result<()> {
    debug!("cmd_proxies: called");
    let client = NodeClient::connect(config)?;
    let proxies = client.list_proxies().context("Failed to list join proxies")?;

    if proxies.is_empty() {
        println!("No join proxies parked");
        return Ok(());
    }

    println!("{:<38} {:<24} {:<20} {}", "KEY".bold(), "JOIN".bold(), "THREAD".bold(), "SINCE".bold());
    for proxy in proxies {
        println!(
            "{:<38} {:<24} {:<20} {}",
            proxy.key.to_string(),
            proxy.id.to_string(),
            proxy.thread_name,
            proxy.enlisted_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

fn cmd_nodes(config: &Config) -> Result<()> {
    debug!("cmd_nodes: called");
    let roster = config.require_roster()?;

    println!("{:<24} {}", "NODE".bold(), "ADDRESS".bold());
    for (id, address) in roster {
        println!("{:<24} {}", id, address);
    }
    Ok(())
}

fn cmd_terminate(config: &Config, id: &str, exit_code: i32) -> Result<()> {
    debug!(%id, exit_code, "cmd_terminate: called");
    let client = NodeClient::connect(config)?;
    client
        .terminate_node(id, exit_code)
        .context(format!("Failed to terminate node '{id}'"))?;
    println!("Sent halt to {} (exit code {})", id.yellow(), exit_code);
    Ok(())
}
