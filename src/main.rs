use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reprise::build::build_site;
use reprise::config::Config;
use reprise::serve::serve_site;
use reprise::template::Templates;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// As minimal a blog as possible.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the project file; by default `reprise.yaml` is searched for
    /// in the current directory and its parents.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the whole site into the public directory.
    Build,

    /// Serve the site, rendering every page on request.
    Serve {
        /// Address to listen on, overriding `serve.address`.
        #[arg(short, long)]
        address: Option<SocketAddr>,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "reprise starting");
    let config = match &cli.config {
        Some(path) => Config::from_project_file(path)?,
        None => {
            let cwd = std::env::current_dir().context("resolving the working directory")?;
            Config::from_directory(&cwd)?
        }
    };
    let theme = Some(config.theme_directory.as_path()).filter(|dir| dir.is_dir());
    let templates = Templates::load(theme)?;

    match cli.command {
        Command::Build => {
            build_site(&config, &templates)?;
        }
        Command::Serve { address } => {
            serve_site(&config, &templates, address.unwrap_or(config.serve_address))?;
        }
    }
    Ok(())
}
