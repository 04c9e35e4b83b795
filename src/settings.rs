use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use url::Url;

const DEFAULT_CONFIG_FILE: &str = "catalog_scraper";
const ENV_PREFIX: &str = "CATALOG_SCRAPER";

/// Run settings. Every key has a default, so an empty environment
/// reproduces the stock run against the Baldor motor catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub catalog_url: String,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Products processed per run, in discovery order.
    pub product_limit: usize,
    pub navigation_timeout_secs: u64,
    pub asset_timeout_secs: u64,
    pub user_agent: String,
    pub accept: String,
    /// Fragment that activates the parts tab on a product page.
    pub parts_fragment: String,
    /// Fields whose extraction failure aborts the product.
    pub required_fields: Vec<String>,
    pub selectors: Selectors,
    /// How pages are loaded: `browser` renders scripts, `http` does not.
    pub session: SessionKind,
    pub browser: BrowserSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Browser,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Chromium binary; found on `PATH` when unset.
    pub executable: Option<PathBuf>,
    pub no_sandbox: bool,
    /// How long the rendered page must stay unchanged to count as idle.
    pub idle_millis: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub listing: String,
    pub product_link: String,
    pub parts_rows: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "https://www.baldor.com".into(),
            catalog_url: "https://www.baldor.com/catalog/#category=69".into(),
            output_dir: PathBuf::from("output"),
            log_dir: PathBuf::from("logs"),
            product_limit: 10,
            navigation_timeout_secs: 60,
            asset_timeout_secs: 30,
            user_agent: "Mozilla/5.0".into(),
            accept: "application/pdf,image/*".into(),
            parts_fragment: r#"tab="parts""#.into(),
            required_fields: vec!["product_id".into(), "description".into()],
            selectors: Selectors::default(),
            session: SessionKind::Browser,
            browser: BrowserSettings::default(),
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            executable: None,
            no_sandbox: false,
            idle_millis: 500,
        }
    }
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            listing: "div.overview".into(),
            product_link: "h3 a".into(),
            parts_rows: ".tab-content .pane.active .data-table tbody tr".into(),
        }
    }
}

impl Settings {
    /// Defaults, then `catalog_scraper.toml` (or `path`) if present, then
    /// `CATALOG_SCRAPER_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("required_fields"),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).with_context(|| format!("Invalid base_url {}", self.base_url))
    }

    pub fn catalog_url(&self) -> Result<Url> {
        Url::parse(&self.catalog_url)
            .with_context(|| format!("Invalid catalog_url {}", self.catalog_url))
    }

    pub fn is_required(&self, field: &str) -> bool {
        self.required_fields.iter().any(|f| f == field)
    }
}
