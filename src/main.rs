//! BertUI CLI
//!
//! Thin command-line front end over the library: compile the project, run a
//! production build, or watch and rebuild in dev mode.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bertui_native::{build_project, compile_project, DevSession, NotificationHub, Project};
use clap::Parser;

/// Command-line interface for BertUI.
#[derive(Parser)]
#[command(name = "bertui", version, about = "File-routed React compiler")]
struct Cli {
    /// Project root (where bertui.toml lives)
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Compile sources and generate the router
    Compile,
    /// Production build with Server Island extraction
    Build,
    /// Compile, then watch and recompile on change
    Dev,
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project = Project::load(&cli.root)
        .with_context(|| format!("Failed to load project at {}", cli.root.display()))?;

    match cli.command {
        Commands::Compile => {
            let output = compile_project(&project).context("Compilation failed")?;
            if output.has_failures() {
                tracing::warn!("{} file(s) failed to compile", output.failures.len());
            }
        }
        Commands::Build => {
            let output = build_project(&project).context("Build failed")?;
            tracing::info!(manifest = %output.manifest_path.display(), "Wrote island manifest");
        }
        Commands::Dev => {
            let hub = Arc::new(NotificationHub::new());
            let session = DevSession::start(project, hub).context("Failed to start dev mode")?;
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl+C")?;
            tracing::info!("Stopping");
            session.shutdown().await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["bertui", "compile"]);
        assert_eq!(cli.root, PathBuf::from("."));
        assert_eq!(cli.verbose, 0);
        assert!(matches!(cli.command, Commands::Compile));
    }

    #[test]
    fn test_cli_root_and_verbosity() {
        let cli = Cli::parse_from(["bertui", "-vv", "--root", "site", "build"]);
        assert_eq!(cli.root, PathBuf::from("site"));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Build));
    }

    #[test]
    fn test_cli_dev() {
        let cli = Cli::parse_from(["bertui", "dev"]);
        assert!(matches!(cli.command, Commands::Dev));
    }
}
