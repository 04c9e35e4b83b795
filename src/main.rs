mod assets;
mod browser;
mod catalog;
mod dom;
mod error;
mod extract;
mod logging;
mod pipeline;
mod record;
mod session;
mod settings;
mod store;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::assets::AssetFetcher;
use crate::browser::BrowserSession;
use crate::pipeline::Pipeline;
use crate::session::HttpSession;
use crate::settings::{SessionKind, Settings};

#[derive(Parser)]
#[command(
    name = "catalog_scraper",
    about = "Extract product records and assets from a motor catalog"
)]
struct Cli {
    /// Max products to process (default: 10)
    #[arg(short = 'n', long)]
    limit: Option<usize>,
    /// Catalog listing URL to start from
    #[arg(long)]
    catalog_url: Option<String>,
    /// Output root for JSON documents and assets
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Settings file (default: ./catalog_scraper.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Page loader: headless browser (default) or plain HTTP
    #[arg(long, value_enum)]
    session: Option<SessionKind>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(limit) = cli.limit {
        settings.product_limit = limit;
    }
    if let Some(url) = cli.catalog_url {
        settings.catalog_url = url;
    }
    if let Some(output) = cli.output {
        settings.output_dir = output;
    }
    if let Some(session) = cli.session {
        settings.session = session;
    }

    let log_path = logging::init(&settings.log_dir, "catalog_scraper")?;
    info!(settings = ?settings, "Starting catalog scrape");

    let fetcher = AssetFetcher::new(&settings).context("Failed to build asset client")?;
    let summary = match settings.session {
        SessionKind::Browser => {
            let session = BrowserSession::launch(&settings)
                .await
                .context("Failed to start page session")?;
            let mut pipeline = Pipeline::new(session, settings, fetcher)?;
            let summary = pipeline.run().await;
            pipeline.into_session().close().await;
            summary?
        }
        SessionKind::Http => {
            let session = HttpSession::new(&settings).context("Failed to start page session")?;
            Pipeline::new(session, settings, fetcher)?.run().await?
        }
    };

    println!(
        "Saved {} of {} products ({} failed). Log: {}",
        summary.persisted,
        summary.attempted,
        summary.failed,
        log_path.display()
    );

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("Done in {}", format_duration(elapsed));
    }
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
