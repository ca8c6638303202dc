//! officer-extract CLI entry point.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use officer_extract::config::{parse_viewport, ExtractConfig, RenderMode};
use officer_extract::pipeline::{fixed_clock, system_clock, Pipeline, RunSummary};
use officer_extract::renderer;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "officer-extract",
    about = "Extract the officer catalog from a script-rendered database site",
    version,
    after_help = "Settings fall back to OFFICER_* environment variables when a flag is not given."
)]
struct Cli {
    /// Print the run summary as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(flatten)]
    site: SiteArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SiteArgs {
    /// Base origin of the catalog site
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Path of the paginated list
    #[arg(long, global = true)]
    list_path: Option<String>,
    /// Directory for officers.json and officer_details.json
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// static or rendered
    #[arg(long, global = true)]
    mode: Option<RenderMode>,
    /// Navigation timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
    /// Network idle window that counts as settled
    #[arg(long, global = true)]
    settle_idle_ms: Option<u64>,
    /// Upper bound on settling and selector waits
    #[arg(long, global = true)]
    settle_timeout_ms: Option<u64>,
    /// Pause between list pages
    #[arg(long, global = true)]
    page_delay_ms: Option<u64>,
    /// Pause between detail pages
    #[arg(long, global = true)]
    item_delay_ms: Option<u64>,
    #[arg(long, global = true)]
    user_agent: Option<String>,
    /// Browser viewport, e.g. 1366x768
    #[arg(long, global = true, value_parser = parse_viewport)]
    viewport: Option<(u32, u32)>,
    /// Disable automation-detection countermeasures
    #[arg(long, global = true)]
    no_stealth: bool,
    /// Regex for background data calls to capture
    #[arg(long, global = true)]
    tap_pattern: Option<String>,
    /// Selector awaited before reading a page; empty disables the wait
    #[arg(long, global = true)]
    content_selector: Option<String>,
    /// Pin every timestamp to this RFC 3339 instant
    #[arg(long, global = true, value_parser = parse_timestamp)]
    fixed_timestamp: Option<DateTime<Utc>>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the paginated list and write officers.json
    List,
    /// Enrich officers.json into officer_details.json
    Details,
    /// List, then details
    Run,
    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
}

impl SiteArgs {
    fn apply(&self, cfg: &mut ExtractConfig) {
        if let Some(v) = &self.base_url {
            cfg.base_url = v.clone();
        }
        if let Some(v) = &self.list_path {
            cfg.list_path = v.clone();
        }
        if let Some(v) = &self.data_dir {
            cfg.data_dir = v.clone();
        }
        if let Some(v) = self.mode {
            cfg.mode = v;
        }
        if let Some(v) = self.timeout_ms {
            cfg.timeouts.navigation = Duration::from_millis(v);
        }
        if let Some(v) = self.settle_idle_ms {
            cfg.timeouts.settle_idle = Duration::from_millis(v);
        }
        if let Some(v) = self.settle_timeout_ms {
            cfg.timeouts.settle_timeout = Duration::from_millis(v);
        }
        if let Some(v) = self.page_delay_ms {
            cfg.page_delay = Duration::from_millis(v);
        }
        if let Some(v) = self.item_delay_ms {
            cfg.item_delay = Duration::from_millis(v);
        }
        if let Some(v) = &self.user_agent {
            cfg.identity.user_agent = v.clone();
        }
        if let Some(v) = self.viewport {
            cfg.identity.viewport = v;
        }
        if self.no_stealth {
            cfg.identity.stealth = false;
        }
        if let Some(v) = &self.tap_pattern {
            cfg.tap_pattern = v.clone();
        }
        if let Some(v) = &self.content_selector {
            cfg.content_selector = Some(v.trim().to_string()).filter(|s| !s.is_empty());
        }
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp '{s}': {e}"))
}

fn init_tracing(verbose: bool, log_json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let directive = format!("officer_extract={level}");
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&directive));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_summary(json: bool, summary: &RunSummary) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    println!(
        "discovered {}, enriched {}, skipped {}",
        summary.discovered,
        summary.enriched,
        summary.skipped.len()
    );
    for s in &summary.skipped {
        println!("  skipped {} ({}): {}", s.id, s.kind, s.reason);
    }
    Ok(())
}

async fn execute(cli: &Cli) -> Result<()> {
    let mut cfg = ExtractConfig::from_env();
    cli.site.apply(&mut cfg);

    let clock = match cli.site.fixed_timestamp {
        Some(ts) => fixed_clock(ts),
        None => system_clock(),
    };
    let pipeline = Pipeline::new(cfg, clock);
    let cfg = pipeline.config();

    match cli.command {
        Commands::List => {
            let client = renderer::connect(cfg).await.context("failed to open render client")?;
            let stubs = pipeline.run_list(client).await?;
            let summary = RunSummary {
                discovered: stubs.len(),
                ..Default::default()
            };
            print_summary(cli.json, &summary)
        }
        Commands::Details => {
            let client = renderer::connect(cfg).await.context("failed to open render client")?;
            let summary = pipeline.run_details(client).await?;
            print_summary(cli.json, &summary)
        }
        Commands::Run => {
            let summary = pipeline
                .run_all(|| renderer::connect(cfg))
                .await?;
            print_summary(cli.json, &summary)
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "officer-extract", &mut std::io::stdout());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let result = execute(&cli).await;

    // 0=success, 1=error
    if let Err(e) = &result {
        if cli.json {
            println!(
                "{}",
                serde_json::json!({ "error": true, "message": format!("{e:#}") })
            );
        } else {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
