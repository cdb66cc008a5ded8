use anyhow::{anyhow, Context, Result};
use clap::Parser;
use pagepeek::browser::{CdpTabService, ChromeInjector, FixedTab, SnapshotInjector};
use pagepeek::report::Report;
use pagepeek::config::get_config_path;
use pagepeek::{logger, Config, Orchestrator, ScriptInjector, Snapshot, TabReference, TabService};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "pagepeek", version, about = "Peek at the page open in your browser")]
struct Cli {
    /// Config file (defaults to config/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read a saved HTML page instead of the live browser
    #[arg(long)]
    html: Option<PathBuf>,

    /// URL the saved page came from, used to resolve relative image paths
    #[arg(long, requires = "html")]
    url: Option<String>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Seed for reproducible identifiers
    #[arg(long)]
    seed: Option<u64>,

    /// Write the effective configuration to the config path and exit
    #[arg(long, conflicts_with_all = ["html", "json"])]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[!] Configuration Error: {}", e);
            return Err(e);
        }
    };
    if cli.seed.is_some() {
        config.identifiers.seed = cli.seed;
    }

    if cli.init_config {
        let path = cli.config.clone().unwrap_or_else(get_config_path);
        config.save(&path)?;
        println!("Wrote configuration to {}", path.display());
        return Ok(());
    }

    if let Err(e) = logger::init(&config.general) {
        eprintln!("[!] Logging disabled: {}", e);
    }

    let snapshot = match &cli.html {
        Some(path) => {
            let url = match &cli.url {
                Some(u) => u.clone(),
                None => file_url(path)?,
            };
            let tab = TabReference::new("snapshot", url);
            run_pass(&config, FixedTab(Some(tab)), SnapshotInjector::from_file(path)?).await?
        }
        None => {
            run_pass(
                &config,
                CdpTabService::new(&config.browser),
                ChromeInjector::new(&config.browser),
            )
            .await?
        }
    };

    let report = Report::build(&snapshot, &config.extraction);
    if cli.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.to_text());
    }

    match snapshot.generation_error {
        Some(e) => Err::<(), _>(e).context("Identifier generation failed"),
        None => Ok(()),
    }
}

async fn run_pass<T: TabService, I: ScriptInjector>(
    config: &Config,
    tabs: T,
    injector: I,
) -> Result<Snapshot> {
    let mut orchestrator = Orchestrator::from_config(config, tabs, injector)?;
    let snapshot = orchestrator
        .run_settled()
        .await
        .context("Extraction pass did not complete")?;
    Ok(snapshot)
}

fn file_url(path: &Path) -> Result<String> {
    let absolute = path
        .canonicalize()
        .context(format!("Failed to resolve {:?}", path))?;
    url::Url::from_file_path(&absolute)
        .map(|u| u.to_string())
        .map_err(|_| anyhow!("Cannot express {:?} as a file URL", absolute))
}
