//! Supplier scraper: entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use supplier_scraper::{scrape, ChromiumLauncher, ScraperConfig, Site};
use supplier_scraper_api::payload;
use supplier_scraper_api::rest::{self, AppState};

#[derive(Parser)]
#[command(
    name = "supplier-scraper-api",
    about = "Scrape product data from authenticated supplier portals",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Chromium binary (defaults to SUPPLIER_SCRAPER_CHROMIUM, then auto-discovery).
    #[arg(long, global = true)]
    chromium: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API (default).
    Serve {
        /// Listen address (host:port).
        #[arg(long, default_value = "127.0.0.1:8000")]
        addr: String,
    },

    /// Scrape one batch from a payload file and print the records as JSON.
    ///
    /// Examples:
    ///   supplier-scraper-api run eklor
    ///   supplier-scraper-api run voltaneo ./payloads/voltaneo.json --headed
    Run {
        /// Portal to scrape (eklor, powr-connect, voltaneo).
        site: Site,

        /// Payload file; defaults to payload_e.json, payload_pc.json or payload_v.json.
        payload: Option<PathBuf>,

        /// Show the browser window.
        #[arg(long)]
        headed: bool,
    },

    /// List supported portals.
    Sites,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   supplier-scraper-api completions bash > ~/.local/share/bash-completion/completions/supplier-scraper-api
    ///   supplier-scraper-api completions zsh > ~/.zfunc/_supplier-scraper-api
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = ScraperConfig::from_env();
    if let Some(path) = cli.chromium {
        config.chromium_path = Some(path);
    }

    match cli.command.unwrap_or(Commands::Serve {
        addr: "127.0.0.1:8000".to_string(),
    }) {
        Commands::Serve { addr } => {
            let launcher = Arc::new(ChromiumLauncher::new(config.chromium_path.clone()));
            tracing::info!("Supplier scraper API (headless: {})", config.headless);
            rest::start(&addr, AppState::new(launcher, config)).await?;
        }

        Commands::Run {
            site,
            payload: path,
            headed,
        } => {
            let path = payload::resolve_payload_path(site, path);
            let request = payload::load(&path)?;
            tracing::info!("Loaded {} items from {}", request.items.len(), path.display());

            if headed {
                config = config.with_headless(false);
            }
            let launcher = ChromiumLauncher::new(config.chromium_path.clone());
            let output = scrape(&launcher, site, &request, &config).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Commands::Sites => {
            for site in Site::ALL {
                let profile = site.profile();
                println!("{:<14} {:<14} {}", site.slug(), profile.name, profile.login_url);
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "supplier-scraper-api", &mut std::io::stdout());
        }
    }

    Ok(())
}
