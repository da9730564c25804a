use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "ytcaps",
    about = "YouTube caption retrieval service",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Show extraction metadata on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve {
        /// Address to listen on (default from config, else 127.0.0.1:8080)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Fetch captions for one or more videos
    Fetch {
        /// YouTube video URL or video ID (reads from stdin if omitted)
        url: Option<String>,

        /// Preferred caption language
        #[arg(short, long)]
        lang: Option<String>,

        /// Interface language sent upstream
        #[arg(long)]
        hl: Option<String>,

        /// Preferred region, tried before the fallback regions
        #[arg(long)]
        gl: Option<String>,

        /// Output format: text (default), json
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Write output to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Don't fall back to yt-dlp if captions come back empty
        #[arg(long)]
        no_fallback: bool,
    },
}
