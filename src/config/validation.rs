use crate::config::types::{ConfigFile, CrawlerConfig, SelectorConfig, SiteConfig};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration for the given account
pub fn validate(config: &ConfigFile, username: &str) -> Result<(), ConfigError> {
    validate_username(username)?;
    validate_crawler_config(&config.crawler)?;
    validate_site_config(&config.site)?;
    validate_selectors(&config.selectors)?;
    Ok(())
}

/// Validates the account name, which also becomes a directory name
fn validate_username(username: &str) -> Result<(), ConfigError> {
    if username.is_empty() {
        return Err(ConfigError::Validation(
            "username cannot be empty".to_string(),
        ));
    }

    if username == "." || username == ".." {
        return Err(ConfigError::Validation(format!(
            "username '{}' is not a valid directory name",
            username
        )));
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ConfigError::Validation(format!(
            "username must contain only alphanumeric characters, '-', '_' and '.', got '{}'",
            username
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout must be >= 1s, got {}s",
            config.request_timeout
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the site layout
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' has no host",
            config.base_url
        )));
    }

    require_placeholders("profile-path", &config.profile_path, &["{username}"])?;
    require_placeholders("timeline-path", &config.timeline_path, &["{cursor}"])?;

    Ok(())
}

fn require_placeholders(name: &str, template: &str, required: &[&str]) -> Result<(), ConfigError> {
    for placeholder in required {
        if !template.contains(placeholder) {
            return Err(ConfigError::Validation(format!(
                "{} '{}' must contain {}",
                name, template, placeholder
            )));
        }
    }
    Ok(())
}

/// Validates that every selector parses
fn validate_selectors(config: &SelectorConfig) -> Result<(), ConfigError> {
    for selector in [
        &config.child_refs,
        &config.next_cursor,
        &config.item_count,
        &config.media,
        &config.tags,
        &config.image,
        &config.provider_icon,
        &config.provider_link,
    ] {
        Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
            selector: selector.clone(),
            message: format!("{:?}", e),
        })?;
    }

    if config.next_cursor_attr.is_empty() {
        return Err(ConfigError::Validation(
            "next-cursor-attr cannot be empty".to_string(),
        ));
    }

    Ok(())
}
