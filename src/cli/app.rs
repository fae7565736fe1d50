use crate::session::Transport;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dataverse-client")]
#[command(about = "Walk through create, update, retrieve, list and delete against a Dataverse environment")]
#[command(version)]
pub struct Cli {
    /// Settings file (default: ./appsettings.json, then the user config dir)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Name of the entry under ConnectionStrings
    #[arg(long, default_value = "MyEnv")]
    pub connection: String,

    /// How to talk to the environment
    #[arg(long, value_enum, default_value_t = Transport::Sdk)]
    pub transport: Transport,

    /// Maximum number of accounts to list
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    pub top: u32,

    /// Delete the demo account without waiting for a key press
    #[arg(short, long)]
    pub yes: bool,

    /// Log file, truncated on each run
    #[arg(long, value_name = "PATH", default_value = "dataverse-client.log")]
    pub log_file: PathBuf,
}
