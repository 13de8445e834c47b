use crate::config::types::{Config, ConfigFile, Paths};
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::{Path, PathBuf};
use url::Url;

/// Command-line values that take precedence over the configuration file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub save_folder: Option<PathBuf>,
    pub concurrency: Option<usize>,
}

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(ConfigFile)` - Successfully parsed file
/// * `Err(ConfigError)` - Failed to read or parse the file
pub fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let file: ConfigFile = toml::from_str(&content)?;
    Ok(file)
}

/// Resolves a parsed file, a username and CLI overrides into a validated [`Config`]
pub fn build_config(
    username: &str,
    mut file: ConfigFile,
    overrides: ConfigOverrides,
) -> Result<Config, ConfigError> {
    if let Some(save_folder) = overrides.save_folder {
        file.output.save_folder = save_folder;
    }
    if let Some(concurrency) = overrides.concurrency {
        file.crawler.concurrency = concurrency;
    }

    validate(&file, username)?;

    let base_url = Url::parse(&file.site.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    Ok(Config {
        base_url,
        username: username.to_string(),
        paths: Paths::new(&file.output.save_folder, username),
        crawler: file.crawler,
        site: file.site,
        selectors: file.selectors,
    })
}

/// Loads the configuration for a run
///
/// Without a file path the built-in defaults are used.
///
/// # Example
///
/// ```no_run
/// use grid_harvest::config::{load_config, ConfigOverrides};
///
/// let config = load_config(None, "alice", ConfigOverrides::default()).unwrap();
/// println!("Saving to {}", config.paths.userdir.display());
/// ```
pub fn load_config(
    path: Option<&Path>,
    username: &str,
    overrides: ConfigOverrides,
) -> Result<Config, ConfigError> {
    let file = match path {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };
    build_config(username, file, overrides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawler]
concurrency = 4
request-timeout = 15
user-agent = "TestHarvester/1.0"

[site]
base-url = "https://example.com"

[output]
save-folder = "/tmp/harvest-test"

[selectors]
child-refs = ".grid a[href]"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(Some(file.path()), "alice", ConfigOverrides::default()).unwrap();

        assert_eq!(config.concurrency(), 4);
        assert_eq!(config.crawler.request_timeout, 15);
        assert_eq!(config.crawler.user_agent, "TestHarvester/1.0");
        assert_eq!(config.base_url.as_str(), "https://example.com/");
        assert_eq!(config.selectors.child_refs, ".grid a[href]");
        // Unspecified selectors keep their defaults
        assert_eq!(config.selectors.item_count, ".metaline__count");
        assert_eq!(
            config.paths.database,
            PathBuf::from("/tmp/harvest-test/alice/database.json")
        );
    }

    #[test]
    fn test_defaults_without_file() {
        let config = load_config(None, "alice", ConfigOverrides::default()).unwrap();
        assert_eq!(config.concurrency(), 10);
        assert_eq!(config.base_url.as_str(), "https://ifunny.co/");
    }

    #[test]
    fn test_overrides_take_precedence() {
        let file = create_temp_config("[crawler]\nconcurrency = 4\n");
        let overrides = ConfigOverrides {
            save_folder: Some(PathBuf::from("/srv/out")),
            concurrency: Some(2),
        };
        let config = load_config(Some(file.path()), "bob", overrides).unwrap();

        assert_eq!(config.concurrency(), 2);
        assert_eq!(config.paths.userdir, PathBuf::from("/srv/out/bob"));
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(
            Some(Path::new("/nonexistent/config.toml")),
            "alice",
            ConfigOverrides::default(),
        );
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(Some(file.path()), "alice", ConfigOverrides::default());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let file = create_temp_config("[crawler]\nconcurrency = 0\n");
        let result = load_config(Some(file.path()), "alice", ConfigOverrides::default());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }
}
