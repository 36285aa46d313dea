//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod crawl;
mod helpers;
mod reclean;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, ConfigError, CrawlMode, LoadOptions, Settings};

#[derive(Parser)]
#[command(name = "lotcrawl")]
#[command(about = "Auction listing crawler with proxy rotation")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Number of detail workers (default: 10 for crawl, 100 for reclean)
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// Directory for snapshots and the rejected-item file
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Route requests through the rotating proxy pool
    #[arg(long, global = true, overrides_with = "no_proxies")]
    proxies: bool,

    /// Connect directly even in reclean mode
    #[arg(long, global = true, overrides_with = "proxies")]
    no_proxies: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the listing site and read each lot's detail page
    Crawl {
        /// Search keyword (overrides config)
        #[arg(short, long)]
        keyword: Option<String>,
        /// Stop after this many listing pages
        #[arg(short = 'n', long)]
        max_pages: Option<u32>,
    },

    /// Re-process a previously exported CSV or XLSX table
    Reclean {
        /// Seed table (.csv, .xlsx or .xlsm)
        seed: PathBuf,
    },
}

impl Cli {
    pub fn mode(&self) -> CrawlMode {
        match self.command {
            Commands::Crawl { .. } => CrawlMode::Crawl,
            Commands::Reclean { .. } => CrawlMode::Reclean,
        }
    }

    fn use_proxies(&self) -> Option<bool> {
        match (self.proxies, self.no_proxies) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    /// Load settings from config and environment, then apply command-line
    /// overrides on top.
    pub async fn load_settings(&self) -> Result<Settings, ConfigError> {
        let options = LoadOptions {
            config_path: self.config.clone(),
            use_cwd: self.cwd,
        };
        let (mut settings, _config) = load_settings_with_options(options).await?;

        if let Some(workers) = self.workers {
            settings.workers = Some(workers);
        }
        if let Some(ref dir) = self.output_dir {
            settings.output_dir = dir.clone();
        }
        if let Some(ref file) = self.log_file {
            settings.log_file = Some(file.clone());
        }
        if let Some(use_proxies) = self.use_proxies() {
            settings.use_proxies = Some(use_proxies);
        }

        Ok(settings)
    }
}

/// Run the parsed command with already-loaded settings.
pub async fn run(cli: Cli, settings: Settings) -> anyhow::Result<()> {
    match cli.command {
        Commands::Crawl { keyword, max_pages } => {
            crawl::cmd_crawl(&settings, keyword, max_pages).await
        }
        Commands::Reclean { seed } => reclean::cmd_reclean(&settings, &seed).await,
    }
}
