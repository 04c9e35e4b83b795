use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};
use url::Url;

use crate::assets::AssetFetcher;
use crate::catalog;
use crate::error::Result;
use crate::extract::parts::{self, RowSchema};
use crate::extract::{self, FieldSpec};
use crate::record::ProductRecord;
use crate::session::PageSession;
use crate::settings::Settings;
use crate::store::RecordStore;

/// Counts for one run, logged when the run ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    pub attempted: usize,
    pub persisted: usize,
    pub failed: usize,
}

/// Drives one session through the catalog, one product at a time.
pub struct Pipeline<S: PageSession> {
    session: S,
    settings: Settings,
    base: Url,
    catalog_url: Url,
    fields: Vec<FieldSpec>,
    schema: RowSchema,
    fetcher: AssetFetcher,
    store: RecordStore,
}

impl<S: PageSession> Pipeline<S> {
    pub fn new(session: S, settings: Settings, fetcher: AssetFetcher) -> anyhow::Result<Self> {
        Ok(Self {
            base: settings.base_url()?,
            catalog_url: settings.catalog_url()?,
            fields: extract::field_table(&settings),
            schema: RowSchema::standard(&settings.selectors.parts_rows),
            store: RecordStore::new(&settings.output_dir),
            session,
            settings,
            fetcher,
        })
    }

    /// Discover products, then process up to `product_limit` of them.
    /// Only discovery failure ends the run early; a failed product is
    /// logged and the next one is tried.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let urls = catalog::discover(
            &mut self.session,
            &self.catalog_url,
            &self.base,
            &self.settings.selectors,
        )
        .await
        .inspect_err(|e| error!("Failed to get all products: {}", e))?;

        let selected = &urls[..urls.len().min(self.settings.product_limit)];
        let mut summary = RunSummary {
            discovered: urls.len(),
            ..Default::default()
        };

        let pb = ProgressBar::new(selected.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        for url in selected {
            summary.attempted += 1;
            match self.process_product(url).await {
                Ok(_) => summary.persisted += 1,
                Err(e) => {
                    error!("Error extracting product from {}: {}", url, e);
                    summary.failed += 1;
                }
            }
            pb.inc(1);
        }

        pb.finish_and_clear();
        info!(
            "Run finished: {} discovered, {} attempted, {} saved, {} failed",
            summary.discovered, summary.attempted, summary.persisted, summary.failed
        );
        Ok(summary)
    }

    /// Hand the session back, e.g. to shut a browser down after the run.
    pub fn into_session(self) -> S {
        self.session
    }

    /// Navigate → fields → parts → assets → persist, for one product page.
    pub async fn process_product(&mut self, url: &Url) -> Result<PathBuf> {
        self.session.goto(url).await?;
        info!("Scraping product: {}", url);

        let fields = {
            let page = self.session.snapshot()?;
            extract::extract_fields(&page, &self.fields, &self.base)?
        };
        info!("Product ID: {}", fields.product_id);

        let bom = parts::extract_parts(
            &mut self.session,
            url,
            &self.settings.parts_fragment,
            &self.schema,
        )
        .await;

        let paths = self.store.asset_paths(
            &fields.product_id,
            fields.manual_url.is_some(),
            fields.image_url.is_some(),
        );
        self.store.prepare(&fields.product_id)?;
        if let (Some(src), Some(dest)) = (&fields.manual_url, &paths.manual) {
            self.fetcher.fetch_best_effort(src, Path::new(dest)).await;
        }
        if let (Some(src), Some(dest)) = (&fields.image_url, &paths.image) {
            self.fetcher.fetch_best_effort(src, Path::new(dest)).await;
        }

        let record = ProductRecord::assemble(fields, bom, paths);
        self.store.persist(&record)
    }
}
