use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use dataverse_client::api::AuthManager;
use dataverse_client::cli::Cli;
use dataverse_client::config::{self, AppSettings};
use dataverse_client::driver::{DemoDriver, NoPause, Pause, TerminalPause};
use dataverse_client::session;
use is_terminal::IsTerminal;
use log::info;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        for cause in e.chain().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Initialize logger to file (truncate on each run)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&cli.log_file)
        .with_context(|| format!("Failed to open log file {}", cli.log_file.display()))?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    info!("Starting dataverse-client");

    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    dotenvy::dotenv().ok();

    let settings_path = config::discover_settings_path(cli.config.as_deref());
    let mut settings = AppSettings::load(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    settings.merge_env(std::env::vars_os());

    let client = session::open_record_client(
        &settings,
        &cli.connection,
        cli.transport,
        AuthManager::interactive(),
    )
    .await
    .with_context(|| format!("Failed to connect using '{}'", cli.connection))?;

    let pause: Box<dyn Pause> = if cli.yes {
        Box::new(NoPause)
    } else {
        Box::new(TerminalPause)
    };

    let mut driver = DemoDriver::new(client, pause).with_top(cli.top);
    let mut stdout = std::io::stdout();
    driver.run(&mut stdout).await?;

    info!("dataverse-client finished");
    Ok(())
}
