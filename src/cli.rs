use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "ytbrief",
    about = "Analyze a YouTube video from its captions with a language model",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// YouTube video URL or video ID (reads from stdin if omitted)
    pub url: Option<String>,

    /// Output format: text (default), json
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Force the analysis language instead of detecting it
    #[arg(short, long)]
    pub lang: Option<String>,

    /// Write output to file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the transcript and skip the model call
    #[arg(short, long)]
    pub transcript_only: bool,

    /// Chat model used for the analysis
    #[arg(long)]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible chat API
    #[arg(long)]
    pub api_url: Option<String>,

    /// Model call timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Show detection and retrieval details
    #[arg(short, long)]
    pub verbose: bool,
}
