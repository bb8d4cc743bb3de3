use crate::compat::VersionRange;
use crate::error::MirrorError;
use serde::Deserialize;
use std::collections::BTreeMap;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub code: String,
    pub name: String,
    pub releases: Vec<ProductRelease>,
}

impl Product {
    pub fn release(&self, version: &str) -> Option<&ProductRelease> {
        self.releases.iter().find(|release| release.version == version)
    }

    /// Releases arrive newest first; the list order is trusted.
    pub fn latest_release(&self) -> Option<&ProductRelease> {
        self.releases.first()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductRelease {
    pub date: String,
    #[serde(rename = "type")]
    pub release_type: String,
    pub version: String,
    pub build: String,
    /// Some releases are missing platforms, so lookups by OS key are
    /// fallible.
    #[serde(default)]
    pub downloads: BTreeMap<String, ReleaseDownload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseDownload {
    pub link: Url,
    pub size: u64,
    pub checksum_link: Url,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Plugin {
    pub id: u64,
    pub name: String,
}

/// One entry of a plugin's update history.
///
/// The raw `since`/`until` strings are validated while deserializing;
/// a malformed range rejects the whole payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawPluginUpdate")]
pub struct PluginUpdate {
    pub id: u64,
    pub version: String,
    pub timestamp_ms: u64,
    pub range: VersionRange,
}

#[derive(Debug, Deserialize)]
struct RawPluginUpdate {
    id: u64,
    version: String,
    #[serde(rename = "cdate")]
    timestamp_ms: u64,
    #[serde(default)]
    since: Option<String>,
    #[serde(default)]
    until: Option<String>,
}

impl TryFrom<RawPluginUpdate> for PluginUpdate {
    type Error = MirrorError;

    fn try_from(raw: RawPluginUpdate) -> Result<Self, Self::Error> {
        let range = VersionRange::parse(raw.since.as_deref(), raw.until.as_deref())?;

        Ok(Self {
            id: raw.id,
            version: raw.version,
            timestamp_ms: raw.timestamp_ms,
            range,
        })
    }
}
