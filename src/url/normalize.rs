use sha2::{Digest, Sha256};
use url::Url;

/// Longest cache key kept verbatim; longer keys are shortened and hashed
const MAX_KEY_LEN: usize = 200;

/// Length of the readable prefix kept in front of the digest of a long key
const HASHED_PREFIX_LEN: usize = MAX_KEY_LEN - 64 - 1;

/// Normalizes a locator for use as a cache identity
///
/// The fragment never reaches the server, so it is dropped; everything else
/// (including the query string, which carries the batch cursor) is kept.
pub fn normalize_locator(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

/// Computes the filesystem-safe cache key for a locator
///
/// Every character outside `[A-Za-z0-9]` becomes `_`. Keys longer than 200
/// characters keep a readable prefix followed by the SHA-256 digest of the
/// normalized locator, so distinct locators never share a file.
///
/// # Examples
///
/// ```
/// use grid_harvest::url::cache_key;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/p/1?x=2").unwrap();
/// assert_eq!(cache_key(&url), "https___example_com_p_1_x_2");
/// ```
pub fn cache_key(url: &Url) -> String {
    let normalized = normalize_locator(url);
    let slug: String = normalized
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    if slug.len() <= MAX_KEY_LEN {
        return slug;
    }

    let digest = hex::encode(Sha256::digest(normalized.as_bytes()));
    format!("{}_{}", &slug[..HASHED_PREFIX_LEN], digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_fragment_dropped() {
        assert_eq!(
            cache_key(&url("https://example.com/p/1#top")),
            cache_key(&url("https://example.com/p/1"))
        );
    }

    #[test]
    fn test_query_kept() {
        assert_ne!(
            cache_key(&url("https://example.com/t/a?batch=2")),
            cache_key(&url("https://example.com/t/a?batch=3"))
        );
    }

    #[test]
    fn test_only_alphanumerics_and_underscores() {
        let key = cache_key(&url("https://example.com/ü/a-b.c?d=e&f=g"));
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }

    #[test]
    fn test_long_key_is_bounded_and_unique() {
        let long_a = url(&format!("https://example.com/{}a", "x".repeat(300)));
        let long_b = url(&format!("https://example.com/{}b", "x".repeat(300)));

        let key_a = cache_key(&long_a);
        let key_b = cache_key(&long_b);

        assert_eq!(key_a.len(), MAX_KEY_LEN);
        assert_eq!(key_b.len(), MAX_KEY_LEN);
        assert_ne!(key_a, key_b);
    }
}
