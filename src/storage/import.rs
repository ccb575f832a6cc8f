//! Loading a previously persisted film list for import

use crate::model::Catalogue;
use crate::storage::{open_store, CatalogueStore};
use crate::CrawlerError;
use reqwest::Client;
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Where the list to import lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportLocation {
    File(PathBuf),
    /// A catalogue database served over HTTP(S)
    Url(Url),
}

impl ImportLocation {
    /// `http://` and `https://` values are URLs, anything else is a path
    pub fn parse(value: &str) -> Result<Self, CrawlerError> {
        if value.starts_with("http://") || value.starts_with("https://") {
            Ok(Self::Url(Url::parse(value)?))
        } else {
            Ok(Self::File(PathBuf::from(value)))
        }
    }
}

impl fmt::Display for ImportLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Loads the catalogue stored at `location`
///
/// A remote list is downloaded to `scratch` first and opened from there.
/// Returns `Ok(None)` when a local file does not exist or holds no list.
pub async fn load_import(
    location: &ImportLocation,
    client: &Client,
    scratch: &Path,
) -> Result<Option<Catalogue>, CrawlerError> {
    let path = match location {
        ImportLocation::File(path) => {
            if !path.exists() {
                tracing::warn!("Import list {} does not exist, skipping", path.display());
                return Ok(None);
            }
            path.as_path()
        }
        ImportLocation::Url(url) => {
            tracing::info!("Downloading import list from {}", url);
            let bytes = client
                .get(url.clone())
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            if let Some(parent) = scratch.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(scratch, &bytes)?;
            tracing::debug!("Stored {} bytes in {}", bytes.len(), scratch.display());
            scratch
        }
    };

    let catalogue = open_store(path)?.load()?;
    if catalogue.is_none() {
        tracing::warn!("No film list stored in {}", location);
    }
    Ok(catalogue)
}
