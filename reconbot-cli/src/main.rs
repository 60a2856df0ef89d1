use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use reconbot::{run_inbox, Layout};
use tracing::{error, info};

mod logging;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Generates SAP reconciliation acts for every request waiting in the inbox"
)]
struct Args {
    /// Folder holding config.json and data/requests
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Configuration file (default: <root>/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level: error, warn, info, debug or trace
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let layout = Layout::new(&args.root);
    logging::init_logging(&args.log_level, &layout.logs())?;

    let config_path = args.config.unwrap_or_else(|| layout.config_path());
    info!(
        "reconbot {} starting in {}",
        env!("CARGO_PKG_VERSION"),
        layout.root().display()
    );

    // Scripting objects are apartment-bound, so everything stays on this thread
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot build the async runtime")?;

    match runtime.block_on(run_inbox(layout, &config_path)) {
        Ok(summary) => {
            info!(
                "{} request(s) processed: {} succeeded, {} failed",
                summary.outcomes.len(),
                summary.succeeded(),
                summary.failed()
            );
            Ok(())
        }
        Err(e) => {
            error!("run aborted: {e}");
            Err(e.into())
        }
    }
}
