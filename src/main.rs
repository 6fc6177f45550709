use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::io::BufReader;

use recon_rs::logging;
use recon_rs::menu::{Menu, MenuOptions, Session};
use recon_rs::state::DEFAULT_STATE_FILE;

/// recon-rs — Beginner-friendly interactive menu for nmap.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "recon-rs",
    version,
    about = "Beginner-friendly interactive menu for nmap with live output and progress.",
    long_about = None
)]
struct Cli {
    /// File that remembers the last scanned target.
    #[arg(long = "state-file", default_value = DEFAULT_STATE_FILE)]
    state_file: PathBuf,

    /// nmap program name or path.
    #[arg(long, default_value = "nmap")]
    nmap: String,

    /// Write the transcript of each finished scan as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Do not pause after error messages.
    #[arg(long = "no-pause", default_value_t = false)]
    no_pause: bool,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug", default_value_t = false)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.debug);

    let stdout = std::io::stdout();
    let options = MenuOptions {
        program: cli.nmap,
        output: cli.output,
        pauses: !cli.no_pause,
        clear_screen: stdout.is_terminal(),
    };
    tracing::debug!(state_file = %cli.state_file.display(), ?options, "Starting menu");

    let session = Session::load(&cli.state_file);
    let mut menu = Menu::new(BufReader::new(tokio::io::stdin()), stdout, session, options);
    menu.run().await?;

    // A pending stdin read (Ctrl-C at a prompt) would otherwise keep the runtime alive.
    std::process::exit(0);
}
