use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use filmlist_crawler::config::load_config;
///
/// let config = load_config(Path::new("crawler.toml")).unwrap();
/// println!("Sources: {}", config.sources.len());
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Run summaries record it so a catalogue can be traced back to the feed
/// definitions that produced it.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

/// Loads a configuration and returns both the config and the hash of the
/// exact text that was parsed
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, hash_content(&content)))
}

fn hash_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::FetchKind;
    use crate::model::Source;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    const VALID_CONFIG: &str = r#"
[crawler]
worker-threads = 4
maximum-server-duration-minutes = 30
excluded-sources = ["zdf"]

[crawler.source-defaults]
maximum-units-per-task = 20
maximum-requests-per-second = 2.0

[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[output]
database-path = "./filmlist.db"
summary-path = "./summary.md"

[sources.ard]
maximum-requests-per-second = 5.0
seeds = ["https://api.example.com/ard/topics"]

[[sources.ard.discovery]]
kind = "json"
selector = "/items"

[sources.ard.detail]
kind = "json"

[sources.orf]
date-seeds = ["https://tvthek.example.com/schedule/{date}"]

[[sources.orf.discovery]]
kind = "document"
selector = "a.episode"
topic-from-text = true
page-parameter = "page"

[sources.orf.detail]
kind = "document"

[sources.zdf]
seeds = ["https://zdf.example.com/"]

[sources.zdf.detail]
kind = "json"
"#;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.worker_threads, 4);
        assert_eq!(config.user_agent.crawler_name, "TestCrawler");
        assert_eq!(config.sources.len(), 3);
        assert!(config.output.import_path.is_none());

        let orf = &config.sources["orf"];
        assert_eq!(orf.date_format, "%d.%m.%Y");
        assert_eq!(orf.discovery[0].kind, FetchKind::Document);
        assert!(orf.discovery[0].topic_from_text);
        assert_eq!(orf.discovery[0].page_parameter.as_deref(), Some("page"));
    }

    #[test]
    fn test_budget_from_config() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();
        let budget = config.budget();

        assert_eq!(budget.worker_threads, 4);
        assert_eq!(budget.time_limit, Some(Duration::from_secs(30 * 60)));
    }

    #[test]
    fn test_source_config_layers() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        let ard = config.source_config(Source::Ard);
        assert_eq!(ard.max_units_per_task, 20);
        assert_eq!(ard.max_requests_per_second, 5.0);
        assert_eq!(ard.max_subpages, 3);

        let orf = config.source_config(Source::Orf);
        assert_eq!(orf.max_requests_per_second, 2.0);
        assert_eq!(orf.socket_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_enabled_sources_respect_filters() {
        let file = create_temp_config(VALID_CONFIG);
        let config = load_config(file.path()).unwrap();

        let enabled: Vec<Source> = config
            .enabled_sources()
            .unwrap()
            .into_iter()
            .map(|(source, _)| source)
            .collect();
        assert_eq!(enabled, vec![Source::Ard, Source::Orf]);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/crawler.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_unknown_source() {
        let content = VALID_CONFIG.replace("[sources.zdf]", "[sources.nope]").replace(
            "[sources.zdf.detail]",
            "[sources.nope.detail]",
        );
        let file = create_temp_config(&content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::UnknownSource(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = VALID_CONFIG.replace("worker-threads = 4", "worker-threads = 0");
        let file = create_temp_config(&content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
