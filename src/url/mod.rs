//! URL handling module for Grid-Harvest
//!
//! This module turns references found in markup into absolute locators and
//! derives the file names used by the fetch cache and the media directory.

mod normalize;

use crate::ExtractError;
use url::Url;

// Re-export main functions
pub use normalize::{cache_key, normalize_locator};

/// Resolves a reference found in a document against the site origin
///
/// Absolute references are returned unchanged; relative and protocol-relative
/// ones are joined onto `base`. Only http(s) results are accepted.
///
/// # Examples
///
/// ```
/// use grid_harvest::url::resolve_locator;
/// use url::Url;
///
/// let base = Url::parse("https://example.com").unwrap();
/// let url = resolve_locator(&base, "/media/a.png").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/media/a.png");
/// ```
pub fn resolve_locator(base: &Url, reference: &str) -> Result<Url, ExtractError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(ExtractError::InvalidLocator {
            locator: reference.to_string(),
            message: "empty reference".to_string(),
        });
    }

    let url = base.join(reference).map_err(|e| ExtractError::InvalidLocator {
        locator: reference.to_string(),
        message: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ExtractError::InvalidLocator {
            locator: reference.to_string(),
            message: format!("unsupported scheme '{}'", other),
        }),
    }
}

/// Returns the last path segment of a media locator
///
/// Query strings never leak into the result. Returns `None` when the path
/// ends in a slash or has no usable segment.
pub fn media_basename(url: &Url) -> Option<String> {
    url.path_segments()
        .and_then(|segments| segments.last())
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .map(|segment| segment.to_string())
}

/// Builds the media file name for an entry index
///
/// The index is zero-padded to four digits so directory listings sort in
/// feed order. An index below one keeps its sign inside the padding
/// (`-001-x.png`).
pub fn media_file_name(index: i64, basename: &str) -> String {
    format!("{:04}-{}", index, basename)
}
