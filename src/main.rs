mod cli;
mod enrich;
mod report;

use anyhow::Result;
use clap::Parser;
use tracing::{error, warn};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use graphscribe_apply::backup;
use graphscribe_core::AppConfig;

use crate::cli::{Cli, Commands};

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let code = runtime.block_on(async_main())?;
    std::process::exit(code);
}

async fn async_main() -> Result<i32> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config: AppConfig = match std::fs::read_to_string(&cli.config) {
        Ok(content) => toml::from_str(&content)?,
        Err(_) => {
            warn!(path = %cli.config, "config file not found, using defaults");
            AppConfig::default()
        }
    };

    match cli.command {
        Commands::Enrich {
            graph,
            dry_run,
            no_backup,
            max_concurrent,
            retry_delay,
            max_queue_size,
            property_prefix,
            max_topics,
            min_preview_length,
            no_video,
            no_social,
            no_pdf,
            video_api_token,
            social_api_token,
            run_timeout,
        } => {
            // flags override the config file
            if dry_run {
                config.general.dry_run = true;
            }
            if no_backup {
                config.general.backup_enabled = false;
            }
            if let Some(n) = max_concurrent {
                config.scheduler.max_concurrent = n.clamp(1, 64);
            }
            if let Some(s) = retry_delay {
                config.scheduler.retry_delay_seconds = s;
            }
            if let Some(n) = max_queue_size {
                config.scheduler.max_queue_size = n;
            }
            if let Some(p) = property_prefix {
                config.general.property_prefix = p;
            }
            if let Some(n) = max_topics {
                config.topics.max_topics_per_item = n;
            }
            if let Some(n) = min_preview_length {
                config.topics.min_preview_length = n;
            }
            if no_video {
                config.video.enabled = false;
            }
            if no_social {
                config.social.enabled = false;
            }
            if no_pdf {
                config.pdf.enabled = false;
            }
            if let Some(token) = video_api_token {
                config.video.api_token = Some(token);
            }
            if let Some(token) = social_api_token {
                config.social.api_token = Some(token);
            }
            if let Some(s) = run_timeout {
                config.scheduler.run_timeout_seconds = Some(s);
            }

            enrich::run_enrich(config, &graph).await
        }
        Commands::Restore { graph, backup: chosen } => {
            let Some(backup_dir) = chosen.or_else(|| backup::find_latest_backup(&graph)) else {
                error!(graph = %graph.display(), "no backup found to restore");
                return Ok(1);
            };
            let restored = backup::restore_backup(&graph, &backup_dir)?;
            println!("Restored {restored} files from {}", backup_dir.display());
            Ok(0)
        }
    }
}
