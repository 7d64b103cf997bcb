use super::checksum::{partial_checksum, partial_checksum_bytes, Checksum};
use super::domain_set::DomainSet;
use super::geosite::parse_geosite;
use super::plaintext::parse_plaintext;
use bypass_dns_domain::config::{DomainSourceConfig, SourceFormat};
use bypass_dns_domain::{DomainError, DomainSelector};
use bytes::Bytes;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
enum Location {
    Path(PathBuf),
    Url(String),
}

/// A parsed domain list together with the checksum of the artifact it came from.
#[derive(Debug, Clone, Default)]
pub struct LoadedList {
    pub set: DomainSet,
    pub checksum: Checksum,
}

/// Reads and parses the configured domain-source artifact.
#[derive(Debug, Clone)]
pub struct DomainSource {
    location: Location,
    format: SourceFormat,
    selectors: Vec<DomainSelector>,
    client: reqwest::Client,
}

impl DomainSource {
    pub fn from_config(config: &DomainSourceConfig) -> Result<Self, DomainError> {
        config.validate()?;
        let location = if config.is_remote() {
            Location::Url(config.locator.clone())
        } else {
            Location::Path(PathBuf::from(&config.locator))
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|e| DomainError::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            location,
            format: config.effective_format(),
            selectors: config.selectors()?,
            client,
        })
    }

    pub fn locator(&self) -> String {
        match &self.location {
            Location::Path(p) => p.display().to_string(),
            Location::Url(u) => u.clone(),
        }
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    async fn download(&self, url: &str) -> Result<Bytes, DomainError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DomainError::DomainSourceFetch(format!("{}: {}", url, e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(DomainError::DomainSourceFetch(format!(
                "{}: bad status code {}",
                url, status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DomainError::DomainSourceFetch(format!("{}: {}", url, e)))?;
        debug!(url = %url, bytes = body.len(), "Domain source downloaded");
        Ok(body)
    }

    async fn read(&self) -> Result<Bytes, DomainError> {
        match &self.location {
            Location::Path(path) => tokio::fs::read(path).await.map(Bytes::from).map_err(|e| {
                DomainError::DomainSourceFetch(format!("{}: {}", path.display(), e))
            }),
            Location::Url(url) => self.download(url).await,
        }
    }

    /// Checksum of the artifact as it is now.
    ///
    /// Files are sampled in place. URLs have to be downloaded, so the body is
    /// returned as well to avoid a second fetch if a reload follows.
    pub async fn current_checksum(&self) -> Result<(Checksum, Option<Bytes>), DomainError> {
        match &self.location {
            Location::Path(path) => {
                let path = path.clone();
                let sum = tokio::task::spawn_blocking(move || {
                    let mut file = std::fs::File::open(&path)?;
                    let size = file.metadata()?.len();
                    partial_checksum(&mut file, size)
                })
                .await
                .map_err(|e| DomainError::IoError(e.to_string()))?
                .map_err(|e| DomainError::DomainSourceFetch(format!("{}: {}", self.locator(), e)))?;
                Ok((sum, None))
            }
            Location::Url(url) => {
                let body = self.download(url).await?;
                Ok((partial_checksum_bytes(&body), Some(body)))
            }
        }
    }

    /// Parses an artifact body into a fresh set.
    pub fn parse(&self, data: &[u8]) -> Result<DomainSet, DomainError> {
        let mut set = DomainSet::new();
        match self.format {
            SourceFormat::Plaintext => {
                parse_plaintext(data, &mut set)?;
                for selector in &self.selectors {
                    if let DomainSelector::Domain(name) = selector {
                        set.insert(name)?;
                    }
                }
            }
            SourceFormat::Geosite => {
                let stats = parse_geosite(data, &self.selectors, &mut set)?;
                debug!(
                    added = stats.added,
                    skipped = stats.skipped,
                    "Geosite rules selected"
                );
            }
        }
        Ok(set)
    }

    /// Reads (or reuses `body`) and parses the artifact.
    pub async fn load_with(&self, body: Option<Bytes>) -> Result<LoadedList, DomainError> {
        let data = match body {
            Some(body) => body,
            None => self.read().await?,
        };
        let checksum = partial_checksum_bytes(&data);
        let set = self.parse(&data)?;
        info!(
            source = %self.locator(),
            format = self.format.as_str(),
            domains = set.len(),
            checksum = %checksum,
            "Domain list loaded"
        );
        Ok(LoadedList { set, checksum })
    }

    pub async fn load(&self) -> Result<LoadedList, DomainError> {
        self.load_with(None).await
    }
}
