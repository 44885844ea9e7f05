use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "graphscribe", about = "Metadata enrichment for outline markdown graphs")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan the graph and enrich video, social and PDF links
    Enrich {
        /// Graph root directory
        graph: PathBuf,

        /// Run the pipeline without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Skip the pre-apply backup
        #[arg(long)]
        no_backup: bool,

        /// Worker pool size
        #[arg(short = 'w', long)]
        max_concurrent: Option<usize>,

        /// Default quiet period (seconds) when Retry-After is absent
        #[arg(long)]
        retry_delay: Option<u64>,

        /// Admission bound across the priority queues
        #[arg(long)]
        max_queue_size: Option<usize>,

        /// Topic property key prefix and topic-index filename prefix
        #[arg(long)]
        property_prefix: Option<String>,

        /// Topics stamped per enriched item
        #[arg(long)]
        max_topics: Option<usize>,

        /// Minimum preview/caption characters before it feeds the analyzer
        #[arg(long)]
        min_preview_length: Option<usize>,

        /// Disable video link processing
        #[arg(long)]
        no_video: bool,

        /// Disable social link processing
        #[arg(long)]
        no_social: bool,

        /// Disable PDF link processing
        #[arg(long)]
        no_pdf: bool,

        /// Video platform API token (upgrades metadata)
        #[arg(long)]
        video_api_token: Option<String>,

        /// Social platform bearer token
        #[arg(long)]
        social_api_token: Option<String>,

        /// Whole-run timeout in seconds
        #[arg(long)]
        run_timeout: Option<u64>,
    },
    /// Restore the graph from a backup snapshot
    Restore {
        /// Graph root directory
        graph: PathBuf,

        /// Specific backup directory (defaults to the newest)
        #[arg(long)]
        backup: Option<PathBuf>,
    },
}
