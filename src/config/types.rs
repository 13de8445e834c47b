use crate::ExtractError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// On-disk configuration file for Grid-Harvest
///
/// Every section is optional; missing sections and keys fall back to the
/// defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum number of item workers running at once
    pub concurrency: usize,

    /// Per-request timeout handed to the HTTP client (seconds)
    pub request_timeout: u64,

    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            request_timeout: 30,
            user_agent: format!("grid-harvest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Remote site layout
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Origin every relative reference is resolved against
    pub base_url: String,

    /// Profile page path; `{username}` is substituted
    pub profile_path: String,

    /// Timeline batch path; `{username}`, `{cursor}` and `{batch}` are substituted
    pub timeline_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ifunny.co".to_string(),
            profile_path: "/user/{username}".to_string(),
            timeline_path: "/user/{username}/timeline/{cursor}?batch={batch}&mode=grid"
                .to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Folder that holds one sub-folder per harvested account
    pub save_folder: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_folder: PathBuf::from("./harvest"),
        }
    }
}

/// CSS selectors used by the selector extractor
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SelectorConfig {
    /// Anchors that reference item detail pages on a listing batch
    pub child_refs: String,

    /// Element carrying the next batch cursor
    pub next_cursor: String,

    /// Attribute of `next_cursor` holding the cursor value
    pub next_cursor_attr: String,

    /// Element whose text holds the abbreviated item count
    pub item_count: String,

    /// Media node carrying `data-type`, `data-source` and `data-webm-source`
    pub media: String,

    /// Tag labels on a detail page
    pub tags: String,

    /// Still image element on a detail page
    pub image: String,

    /// Icon whose class names the embedded video provider
    pub provider_icon: String,

    /// Link to the video's page on its provider
    pub provider_link: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            child_refs: ".post a[href]".to_string(),
            next_cursor: ".stream__item[data-next]".to_string(),
            next_cursor_attr: "data-next".to_string(),
            item_count: ".metaline__count".to_string(),
            media: ".post > div > .media".to_string(),
            tags: ".post .tagpanel__item span".to_string(),
            image: ".post .media__image".to_string(),
            provider_icon: ".post .media__icon".to_string(),
            provider_link: ".post .js-media-stopcontrol".to_string(),
        }
    }
}

/// Filesystem locations for one harvested account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub basedir: PathBuf,
    pub userdir: PathBuf,
    pub media: PathBuf,
    pub cache: PathBuf,
    pub database: PathBuf,
}

impl Paths {
    /// Derives every location from the save folder and username
    pub fn new(save_folder: &Path, username: &str) -> Self {
        let userdir = save_folder.join(username);
        Self {
            basedir: save_folder.to_path_buf(),
            media: userdir.join("media"),
            cache: userdir.join("cache"),
            database: userdir.join("database.json"),
            userdir,
        }
    }

    /// Creates the account, media and cache directories if missing
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.basedir, &self.userdir, &self.media, &self.cache] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }
}

/// Fully resolved and validated configuration for one run
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: Url,
    pub username: String,
    pub paths: Paths,
    pub crawler: CrawlerConfig,
    pub site: SiteConfig,
    pub selectors: SelectorConfig,
}

impl Config {
    /// Maximum number of concurrent item workers
    pub fn concurrency(&self) -> usize {
        self.crawler.concurrency
    }

    /// URL of the account's profile page, which is also listing batch 0
    pub fn profile_url(&self) -> Result<Url, url::ParseError> {
        let path = self.site.profile_path.replace("{username}", &self.username);
        self.base_url.join(&path)
    }

    /// URL of a listing batch
    ///
    /// Batch 0 has no cursor and is the profile page itself. The site numbers
    /// follow-up batches starting at 2, hence `batch_number + 2`.
    pub fn batch_url(&self, batch_number: u32, cursor: Option<&str>) -> Result<Url, url::ParseError> {
        match cursor {
            None => self.profile_url(),
            Some(cursor) => {
                let path = self
                    .site
                    .timeline_path
                    .replace("{username}", &self.username)
                    .replace("{cursor}", cursor)
                    .replace("{batch}", &(batch_number + 2).to_string());
                self.base_url.join(&path)
            }
        }
    }

    /// URL of an item detail page from its relative reference
    ///
    /// References that resolve to another host are rejected; only the
    /// site's own detail pages are fetched.
    pub fn item_url(&self, key: &str) -> Result<Url, ExtractError> {
        let invalid = |message: String| ExtractError::InvalidLocator {
            locator: key.to_string(),
            message,
        };

        let url = self.base_url.join(key).map_err(|e| invalid(e.to_string()))?;
        if url.origin() != self.base_url.origin() {
            return Err(invalid(format!("not on {}", self.base_url)));
        }
        Ok(url)
    }
}
