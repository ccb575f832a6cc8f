use crate::config::types::{
    Config, CrawlerConfig, DetailConfig, DiscoveryConfig, OutputConfig, SourceEntry, SourceLimits,
    UserAgentConfig,
};
use crate::crawler::FetchKind;
use crate::model::Source;
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Largest day window accepted in either direction, about ten years
const MAX_DAY_WINDOW: u32 = 3650;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    for (id, entry) in &config.sources {
        validate_source_entry(id, entry)?;
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.worker_threads < 1 || config.worker_threads > 256 {
        return Err(ConfigError::Validation(format!(
            "worker-threads must be between 1 and 256, got {}",
            config.worker_threads
        )));
    }

    for id in config
        .included_sources
        .iter()
        .chain(&config.excluded_sources)
    {
        id.parse::<Source>()?;
    }

    validate_limits("crawler.source-defaults", &config.source_defaults)
}

/// Validates a set of per-source limits
fn validate_limits(context: &str, limits: &SourceLimits) -> Result<(), ConfigError> {
    if let Some(rate) = limits.maximum_requests_per_second {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "{}: maximum-requests-per-second must be a positive number, got {}",
                context, rate
            )));
        }
    }

    if limits.socket_timeout_seconds == Some(0) {
        return Err(ConfigError::Validation(format!(
            "{}: socket-timeout-seconds must be >= 1",
            context
        )));
    }

    for (key, days) in [
        ("maximum-days-past", limits.maximum_days_past),
        ("maximum-days-future", limits.maximum_days_future),
    ] {
        if let Some(days) = days.filter(|days| *days > MAX_DAY_WINDOW) {
            return Err(ConfigError::Validation(format!(
                "{}: {} must be at most {}, got {}",
                context, key, MAX_DAY_WINDOW, days
            )));
        }
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary-path cannot be empty".to_string(),
        ));
    }

    match config.import_path.as_deref() {
        Some("") => {
            return Err(ConfigError::Validation(
                "import-path cannot be empty when set".to_string(),
            ));
        }
        Some(remote) if remote.starts_with("http://") || remote.starts_with("https://") => {
            Url::parse(remote)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid import-path: {}", e)))?;
        }
        _ => {}
    }

    Ok(())
}

/// Validates the feed definition of one source
fn validate_source_entry(id: &str, entry: &SourceEntry) -> Result<(), ConfigError> {
    let source: Source = id.parse()?;
    let context = format!("sources.{}", source.id());

    validate_limits(&context, &entry.limits)?;

    if entry.seeds.is_empty() && entry.date_seeds.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{} must have at least one seed or date-seed",
            context
        )));
    }

    for seed in &entry.seeds {
        validate_seed_url(seed)?;
    }

    for template in &entry.date_seeds {
        if !template.contains("{date}") {
            return Err(ConfigError::Validation(format!(
                "Date seed '{}' must contain a {{date}} placeholder",
                template
            )));
        }
        validate_seed_url(&template.replace("{date}", "01.01.2024"))?;
    }

    if entry.date_format.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "{}: date-format cannot be empty",
            context
        )));
    }

    for stage in &entry.discovery {
        validate_discovery(&context, stage)?;
    }

    validate_detail(&context, &entry.detail)
}

/// Validates a seed URL; plain HTTP is allowed since some broadcaster APIs still use it
fn validate_seed_url(seed: &str) -> Result<(), ConfigError> {
    let url = Url::parse(seed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::Validation(format!(
            "Seed URL '{}' must use the HTTP or HTTPS scheme",
            seed
        )));
    }

    Ok(())
}

fn validate_discovery(context: &str, stage: &DiscoveryConfig) -> Result<(), ConfigError> {
    validate_selector(context, stage.kind, &stage.selector)?;

    if let Some(parameter) = &stage.page_parameter {
        if parameter.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{}: page-parameter cannot be empty when set",
                context
            )));
        }
    }

    Ok(())
}

fn validate_detail(context: &str, detail: &DetailConfig) -> Result<(), ConfigError> {
    match &detail.selector {
        Some(selector) => validate_selector(context, detail.kind, selector),
        None => Ok(()),
    }
}

/// CSS selectors must parse; JSON pointers must be empty or start with '/'
fn validate_selector(context: &str, kind: FetchKind, selector: &str) -> Result<(), ConfigError> {
    match kind {
        FetchKind::Document => Selector::parse(selector)
            .map(|_| ())
            .map_err(|e| ConfigError::InvalidSelector(format!("{}: '{}': {}", context, selector, e))),
        FetchKind::Json => {
            if selector.is_empty() || selector.starts_with('/') {
                Ok(())
            } else {
                Err(ConfigError::InvalidSelector(format!(
                    "{}: JSON pointer '{}' must start with '/'",
                    context, selector
                )))
            }
        }
    }
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact-email cannot be empty".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
