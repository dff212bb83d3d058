use clap::Parser;
use std::path::PathBuf;

/// Define the application arguments
#[derive(Parser, Debug)]
#[command(version, about = "Console client for the agent backend", long_about = None)]
pub struct Args {
    /// Base URL of the agent backend (overrides the config file)
    #[arg(long)]
    pub backend_url: Option<String>,

    /// Thread to open on startup
    #[arg(long)]
    pub thread: Option<String>,

    /// Send a single message and exit instead of starting the prompt loop
    #[arg(short, long)]
    pub message: Option<String>,

    /// Enable verbose logging (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Record raw stream frames to a session file
    #[arg(long)]
    pub record: Option<PathBuf>,

    /// Play back a recorded session file instead of contacting a backend
    #[arg(long)]
    pub playback: Option<PathBuf>,

    /// Fast playback mode - ignore chunk timing when playing recordings
    #[arg(long)]
    pub fast_playback: bool,
}
