//! HTML extraction for listing, detail and profile pages
//!
//! This module turns fetched documents into structured data:
//! - Child item references and the next batch cursor (listing batches)
//! - Media attributes and tags (detail pages)
//! - The abbreviated item count (profile page)
//!
//! All markup knowledge lives in [`SelectorConfig`], so a site redesign only
//! needs new selectors.

use crate::config::SelectorConfig;
use crate::storage::{MediaBase, MediaRecord};
use crate::url::{media_basename, resolve_locator};
use crate::{ConfigError, ExtractError};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// References discovered on one listing batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Relative references to item detail pages, in document order
    pub child_refs: Vec<String>,

    /// Cursor of the following batch; `None` on the last batch
    pub next_cursor: Option<String>,
}

/// Unvalidated attributes scraped from a detail page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub data_type: Option<String>,
    pub source: Option<String>,
    pub webm_source: Option<String>,
    pub image_source: Option<String>,
    pub provider: Option<String>,
    pub provider_location: Option<String>,
    pub tags: Vec<String>,
}

impl RawRecord {
    /// Classifies the record and resolves its media locator
    ///
    /// # Classification
    ///
    /// | `data-type` | Kind | Locator |
    /// |-------------|------|---------|
    /// | `video` | video | `data-source` |
    /// | `image` | gif | `data-webm-source`, else `data-source` |
    /// | anything else | image | image `src` |
    ///
    /// `key` only labels errors.
    pub fn into_media_record(self, base: &Url, key: &str) -> Result<MediaRecord, ExtractError> {
        let missing = |field: &'static str| ExtractError::MissingField {
            field,
            context: key.to_string(),
        };

        match self.data_type.as_deref() {
            Some("video") => {
                let source = self.source.ok_or_else(|| missing("data-source"))?;
                let provider = self.provider.ok_or_else(|| missing("video provider"))?;
                Ok(MediaRecord::Video {
                    base: MediaBase {
                        locator: resolve_media(base, &source)?,
                        tags: self.tags,
                    },
                    provider,
                    provider_location: self.provider_location,
                })
            }
            Some("image") => {
                let source = self
                    .webm_source
                    .or(self.source)
                    .ok_or_else(|| missing("data-webm-source"))?;
                Ok(MediaRecord::Gif(MediaBase {
                    locator: resolve_media(base, &source)?,
                    tags: self.tags,
                }))
            }
            _ => {
                let source = self.image_source.ok_or_else(|| missing("image src"))?;
                Ok(MediaRecord::Image(MediaBase {
                    locator: resolve_media(base, &source)?,
                    tags: self.tags,
                }))
            }
        }
    }
}

/// Resolves a media reference that must end in a file name
fn resolve_media(base: &Url, reference: &str) -> Result<Url, ExtractError> {
    let url = resolve_locator(base, reference)?;
    if media_basename(&url).is_none() {
        return Err(ExtractError::InvalidLocator {
            locator: reference.to_string(),
            message: "no file name in path".to_string(),
        });
    }
    Ok(url)
}

/// Turns documents into structured data
pub trait Extractor: Send + Sync {
    /// Extracts child references and the next cursor from a listing batch
    fn extract_listing(&self, document: &str) -> Listing;

    /// Extracts the media attributes of a detail page
    fn extract_detail(&self, document: &str) -> Result<RawRecord, ExtractError>;

    /// Extracts the approximate item count from the profile page
    fn extract_profile_meta(&self, document: &str) -> Option<u64>;
}

/// [`Extractor`] driven by CSS selectors
#[derive(Debug, Clone)]
pub struct SelectorExtractor {
    child_refs: Selector,
    next_cursor: Selector,
    next_cursor_attr: String,
    item_count: Selector,
    media: Selector,
    tags: Selector,
    image: Selector,
    provider_icon: Selector,
    provider_link: Selector,
}

fn compile(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

impl SelectorExtractor {
    pub fn new(config: &SelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            child_refs: compile(&config.child_refs)?,
            next_cursor: compile(&config.next_cursor)?,
            next_cursor_attr: config.next_cursor_attr.clone(),
            item_count: compile(&config.item_count)?,
            media: compile(&config.media)?,
            tags: compile(&config.tags)?,
            image: compile(&config.image)?,
            provider_icon: compile(&config.provider_icon)?,
            provider_link: compile(&config.provider_link)?,
        })
    }

    fn first<'a>(&self, document: &'a Html, selector: &Selector) -> Option<ElementRef<'a>> {
        document.select(selector).next()
    }
}

/// Returns a trimmed, non-empty attribute value
fn attr(element: ElementRef<'_>, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl Extractor for SelectorExtractor {
    fn extract_listing(&self, document: &str) -> Listing {
        let document = Html::parse_document(document);

        let child_refs = document
            .select(&self.child_refs)
            .filter_map(|element| attr(element, "href"))
            .collect();

        let next_cursor = self
            .first(&document, &self.next_cursor)
            .and_then(|element| attr(element, &self.next_cursor_attr));

        Listing {
            child_refs,
            next_cursor,
        }
    }

    fn extract_detail(&self, document: &str) -> Result<RawRecord, ExtractError> {
        let document = Html::parse_document(document);

        let media = self.first(&document, &self.media);
        let image = self.first(&document, &self.image);
        if media.is_none() && image.is_none() {
            return Err(ExtractError::MissingField {
                field: "media",
                context: "detail page".to_string(),
            });
        }

        let tags = document
            .select(&self.tags)
            .map(|element| element.text().collect::<String>())
            .map(|text| text.trim().trim_start_matches('#').to_string())
            .filter(|tag| !tag.is_empty())
            .collect();

        Ok(RawRecord {
            data_type: media.and_then(|m| attr(m, "data-type")),
            source: media.and_then(|m| attr(m, "data-source")),
            webm_source: media.and_then(|m| attr(m, "data-webm-source")),
            image_source: image.and_then(|i| attr(i, "src")),
            provider: self
                .first(&document, &self.provider_icon)
                .and_then(|icon| attr(icon, "class"))
                .and_then(|class| provider_from_class(&class)),
            provider_location: self
                .first(&document, &self.provider_link)
                .and_then(|link| attr(link, "href")),
            tags,
        })
    }

    fn extract_profile_meta(&self, document: &str) -> Option<u64> {
        let document = Html::parse_document(document);
        let text: String = self.first(&document, &self.item_count)?.text().collect();
        parse_abbreviated_count(&text)
    }
}

/// Derives the provider name from the class list of a provider icon
///
/// `"media__icon media__icon_coub"` yields `coub`.
pub fn provider_from_class(class: &str) -> Option<String> {
    const PREFIX: &str = "media__icon";

    let mut provider = String::with_capacity(class.len());
    let mut rest = class;
    while let Some(pos) = rest.find(PREFIX) {
        provider.push_str(&rest[..pos]);
        rest = rest[pos + PREFIX.len()..].trim_start_matches('_');
    }
    provider.push_str(rest);
    provider.retain(|c| !c.is_whitespace());

    if provider.is_empty() {
        None
    } else {
        Some(provider)
    }
}

/// Parses an abbreviated count such as `"8.1K memes"`
///
/// Text around the number is ignored. A `K`/`M` written directly after the
/// number multiplies it by a thousand or a million. A count shown with decimals is rounded up by one unit of its last
/// digit, because the site may have rounded it down: `8.1K` becomes 8 200.
/// The result is an upper-bound estimate.
///
/// Returns `None` when the text holds no number.
pub fn parse_abbreviated_count(text: &str) -> Option<u64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(rest.len());
    let number: String = rest[..end].chars().filter(|c| *c != ',').collect();
    let number = number.trim_end_matches('.');

    // A unit letter only counts when it ends the numeric token: "2M" is a
    // million, "2 memes" is two.
    let mut after = rest[end..].chars();
    let unit = after.next();
    let unit_ends_token = after.next().map_or(true, |c| !c.is_alphanumeric());
    let magnitude: u128 = match unit {
        Some('k') | Some('K') if unit_ends_token => 1_000,
        Some('m') | Some('M') if unit_ends_token => 1_000_000,
        _ => 1,
    };

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    let whole: u128 = whole.parse().ok()?;

    let value = if fraction.is_empty() {
        whole * magnitude
    } else {
        let fraction_value: u128 = fraction.parse().ok()?;
        let scale = 10u128.checked_pow(u32::try_from(fraction.len()).ok()?)?;
        let shown = whole.checked_mul(scale)?.checked_add(fraction_value)? + 1;
        (shown * magnitude + scale - 1) / scale
    };

    u64::try_from(value).ok()
}
