//! wu - a single-binary development server for microfrontend projects.

#![allow(dead_code)]

mod broker;
mod cache;
mod cjs;
mod config;
mod embed;
mod hmr;
mod http;
mod logger;
mod mime;
mod pipeline;
mod resolver;
mod router;
mod server;
mod transform;
mod utils;
mod watcher;
mod ws;

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use config::ProjectConfig;
use server::{DevServer, ServerContext};

/// wu microfrontend dev server CLI
#[derive(Parser, Debug)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve every micro-app from a single endpoint with hot reload
    #[command(visible_alias = "s")]
    Serve {
        /// Port to listen on (default: proxy.port from wu.config.json)
        #[arg(short, long)]
        port: Option<u16>,

        /// Interface to bind (e.g. 127.0.0.1, 0.0.0.0)
        #[arg(short = 'H', long)]
        host: Option<IpAddr>,

        /// Clear the compile cache before starting
        #[arg(short, long)]
        clean: bool,

        /// Verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            host,
            clean,
            verbose,
        } => serve(port, host, clean, verbose),
    }
}

fn serve(port: Option<u16>, host: Option<IpAddr>, clean: bool, verbose: bool) -> Result<()> {
    logger::set_verbose(verbose);

    let root = std::env::current_dir()?;
    if clean && let Err(e) = cache::clear_cache_dir(&root) {
        debug!("serve"; "failed to clear cache: {e}");
    }

    let project = ProjectConfig::load(&root)?;
    let port = port.unwrap_or(project.proxy.port);
    let host = host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    if !project.name.is_empty() {
        log!("serve"; "{} ({} apps)", project.name, project.apps.len());
    }

    let ctx = Arc::new(ServerContext::new(root, host, port, project));

    // The handler owns a clone of the context: flag, tear down, exit.
    let signal_ctx = Arc::clone(&ctx);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        signal_ctx.begin_shutdown();
        std::process::exit(0);
    })
    .map_err(|e| anyhow::anyhow!("failed to install signal handler: {e}"))?;

    DevServer::new(ctx).run()
}
