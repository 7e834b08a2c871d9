mod session;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser};

/// Fetch a remote repository over smart HTTP and materialise its tree into
/// a plain directory, without keeping a local .git.
#[derive(Parser)]
#[command(name = "gitup", version, disable_help_flag = true)]
pub struct Cli {
    /// Section of the configuration file to use
    pub section: String,

    /// Path to the configuration file
    #[arg(long = "config", default_value = "./gitup.conf", value_name = "FILE")]
    pub config: PathBuf,

    /// Force a full clone even if remote state exists
    #[arg(short = 'c')]
    pub clone: bool,

    /// Override the 'have' commit id
    #[arg(short = 'h', value_name = "HEX")]
    pub have: Option<String>,

    /// Keep a copy of the fetched pack in the work directory
    #[arg(short = 'k')]
    pub keep_pack: bool,

    /// Load the pack from a file instead of fetching
    #[arg(short = 'u', value_name = "PATH")]
    pub use_pack: Option<PathBuf>,

    /// Verbosity: 0 silent, 1 normal, 2 debug
    #[arg(short = 'v', value_name = "LEVEL")]
    pub verbosity: Option<u8>,

    /// Override the 'want' commit id
    #[arg(short = 'w', value_name = "HEX")]
    pub want: Option<String>,

    /// Print help
    #[arg(long = "help", action = ArgAction::Help)]
    help: Option<bool>,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = session::run(cli) {
        eprintln!("fatal: {e:#}");
        process::exit(1);
    }
}
