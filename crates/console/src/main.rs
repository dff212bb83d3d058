mod app;
mod cli;
mod config;
mod logging;
mod markup;
mod replay;
mod stream;
mod thread;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    logging::setup_logging(args.verbose);
    app::run(args).await
}
