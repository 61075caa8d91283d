//! IS-04 node API and IS-05 version discovery.
//!
//! Finds senders (and their SDP manifests) and receivers on a node, and
//! picks the newest API version each node advertises.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::api::{ApiError, ConnectionApi};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("unexpected document at {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("no API versions listed at {url}")]
    NoVersions { url: String },
    #[error("manifest_href was not found for sender {sender_id}")]
    MissingManifest { sender_id: String },
}

// ── Resources ───────────────────────────────────────────────────────

/// IS-04 sender, reduced to the fields needed to fetch its SDP.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Sender {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub manifest_href: Option<String>,
}

impl Sender {
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.label, self.id)
    }
}

/// IS-04 receiver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Receiver {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub format: String,
}

impl Receiver {
    pub fn display_name(&self) -> String {
        format!("{} ({}) - {}", self.label, self.id, self.format)
    }
}

// ── Versions ────────────────────────────────────────────────────────

fn parse_version(v: &str) -> Option<(u32, u32)> {
    let (major, minor) = v.strip_prefix('v')?.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Pick the newest `vMAJOR.MINOR` entry, without its trailing slash.
///
/// Versions compare numerically (`v1.10` > `v1.3`); entries that don't parse
/// rank below all parseable ones.
pub fn latest_version<S: AsRef<str>>(versions: &[S]) -> Option<String> {
    versions
        .iter()
        .map(|v| v.as_ref().trim_matches('/'))
        .filter(|v| !v.is_empty())
        .max_by_key(|v| (parse_version(v), *v))
        .map(str::to_string)
}

// ── Node API ────────────────────────────────────────────────────────

/// `/x-nmos/node/` on one host.
pub struct NodeApi<'a, C> {
    api: &'a C,
    root: String,
}

impl<'a, C: ConnectionApi> NodeApi<'a, C> {
    /// `root` is `http://host:port`.
    pub fn new(api: &'a C, root: impl Into<String>) -> Self {
        Self {
            api,
            root: root.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn version(&self) -> Result<String, DiscoveryError> {
        newest_version(self.api, &format!("{}/x-nmos/node/", self.root)).await
    }

    pub async fn senders(&self, version: &str) -> Result<Vec<Sender>, DiscoveryError> {
        let url = format!("{}/x-nmos/node/{version}/senders/", self.root);
        fetch_as(self.api, &url).await
    }

    pub async fn receivers(&self, version: &str) -> Result<Vec<Receiver>, DiscoveryError> {
        let url = format!("{}/x-nmos/node/{version}/receivers/", self.root);
        fetch_as(self.api, &url).await
    }
}

/// Newest IS-05 version served at `root`.
pub async fn connection_version<C: ConnectionApi>(
    api: &C,
    root: &str,
) -> Result<String, DiscoveryError> {
    let url = format!("{}/x-nmos/connection/", root.trim_end_matches('/'));
    newest_version(api, &url).await
}

/// Fetch the SDP a sender advertises through `manifest_href`.
pub async fn fetch_manifest<C: ConnectionApi>(
    api: &C,
    sender: &Sender,
) -> Result<String, DiscoveryError> {
    let href = sender
        .manifest_href
        .as_deref()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| DiscoveryError::MissingManifest {
            sender_id: sender.id.clone(),
        })?;
    tracing::info!(manifest_href = href, sender = %sender.id, "fetching SDP manifest");
    Ok(api.fetch_text(href).await?)
}

async fn newest_version<C: ConnectionApi>(api: &C, url: &str) -> Result<String, DiscoveryError> {
    let versions: Vec<String> = fetch_as(api, url).await?;
    let version = latest_version(&versions).ok_or_else(|| DiscoveryError::NoVersions {
        url: url.to_string(),
    })?;
    tracing::debug!(url, version = %version, "selected API version");
    Ok(version)
}

async fn fetch_as<C: ConnectionApi, T: DeserializeOwned>(
    api: &C,
    url: &str,
) -> Result<T, DiscoveryError> {
    let value = api.fetch_json(url).await?;
    serde_json::from_value(value).map_err(|source| DiscoveryError::Decode {
        url: url.to_string(),
        source,
    })
}
