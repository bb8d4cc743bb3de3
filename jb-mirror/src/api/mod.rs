mod models;
pub use models::*;

use crate::cache::ResponseCache;
use crate::error::MirrorError;
use crate::tracker::{UrlReport, UrlTracker};
use reqwest::redirect::Policy;
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt as _;

const DATA_URL: &str = "https://data.services.jetbrains.com/";
const PLUGIN_URL: &str = "https://plugins.jetbrains.com/";

const UPDATES_PAGE_SIZE: usize = 100;

/// Client for the vendor API.
///
/// JSON endpoints are routed through the response cache; binary
/// downloads never are. Every request and effective response URL is
/// recorded in the tracker, independent of call success.
pub struct JetbrainsApi {
    client: Client,
    cache: Box<dyn ResponseCache>,
    tracker: UrlTracker,
    data_base: Url,
    plugin_base: Url,
}

impl JetbrainsApi {
    /// Prepare the API client.
    pub fn new(cache: Box<dyn ResponseCache>) -> Result<Self, MirrorError> {
        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .redirect(Policy::limited(10))
            .hickory_dns(true)
            .build()?;

        let data_base = Url::parse(DATA_URL).unwrap();
        let plugin_base = Url::parse(PLUGIN_URL).unwrap();

        Ok(Self {
            client,
            cache,
            tracker: UrlTracker::default(),
            data_base,
            plugin_base,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(&mut self, product_id: &str) -> Result<Product, MirrorError> {
        let mut url = path(&self.data_base, ["products"]);
        url.query_pairs_mut()
            .append_pair("code", product_id)
            .append_pair("release.type", "release");

        let data = self.fetch_json(url).await?;

        // The products endpoint answers a single-code query with a
        // one-element array.
        let serde_json::Value::Array(items) = data else {
            return Err(MirrorError::UnrecognizedResponseShape(format!(
                "product {}",
                product_id
            )));
        };
        if items.len() != 1 {
            return Err(MirrorError::UnrecognizedResponseShape(format!(
                "product {}",
                product_id
            )));
        }

        let item = items.into_iter().next().unwrap();
        serde_json::from_value(item).map_err(MirrorError::from)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_plugin(&mut self, plugin_id: u64) -> Result<Plugin, MirrorError> {
        let plugin_id_str = plugin_id.to_string();
        let url = path(&self.plugin_base, ["api", "plugins", &plugin_id_str]);

        let data = self.fetch_json(url).await?;
        if !data.is_object() {
            return Err(MirrorError::UnrecognizedResponseShape(format!(
                "plugin {}",
                plugin_id
            )));
        }

        serde_json::from_value(data).map_err(MirrorError::from)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_plugin_updates(
        &mut self,
        plugin_id: u64,
        page: usize,
        page_size: usize,
    ) -> Result<Vec<PluginUpdate>, MirrorError> {
        let plugin_id_str = plugin_id.to_string();
        let mut url = path(&self.plugin_base, ["api", "plugins", &plugin_id_str, "updates"]);
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("size", &page_size.to_string());

        let data = self.fetch_json(url).await?;
        if !data.is_array() {
            return Err(MirrorError::UnrecognizedResponseShape(format!(
                "plugin updates for {}",
                plugin_id
            )));
        }

        serde_json::from_value(data).map_err(MirrorError::from)
    }

    /// Fetch the entire update history, page by page.
    ///
    /// Pagination continues while a page comes back full and stops on
    /// the first short page.
    #[tracing::instrument(skip(self))]
    pub async fn get_all_plugin_updates(
        &mut self,
        plugin_id: u64,
    ) -> Result<Vec<PluginUpdate>, MirrorError> {
        let mut page = 0;
        let mut updates = Vec::new();

        loop {
            let items = self
                .get_plugin_updates(plugin_id, page, UPDATES_PAGE_SIZE)
                .await?;
            tracing::debug!("Updates received: {}", items.len());

            let short_page = items.len() < UPDATES_PAGE_SIZE;
            updates.extend(items);

            if short_page {
                break;
            }
            page += 1;
        }

        Ok(updates)
    }

    #[tracing::instrument(skip(self, directory))]
    pub async fn download_plugin(
        &mut self,
        plugin_update_id: u64,
        directory: &Path,
    ) -> Result<PathBuf, MirrorError> {
        let mut url = path(&self.plugin_base, ["plugin", "download"]);
        url.query_pairs_mut()
            .append_pair("rel", "true")
            .append_pair("updateId", &plugin_update_id.to_string());

        self.download_file(url, directory).await
    }

    /// Download `url` into `directory`, named after the effective URL.
    ///
    /// If a file of that name already exists the transfer is skipped
    /// entirely. On any failure a partially written file is deleted
    /// before the error propagates, so a surviving file is always either
    /// complete or a previous run's validated copy.
    #[tracing::instrument(skip_all, fields(url = url.as_str()))]
    pub async fn download_file(
        &mut self,
        url: Url,
        directory: &Path,
    ) -> Result<PathBuf, MirrorError> {
        tracing::debug!("Downloading {} to {}", url, directory.display());
        tokio::fs::create_dir_all(directory).await?;

        self.tracker.record_request(&url);

        let response = self.client.get(url.clone()).send().await?;
        self.tracker.record_response(response.url());
        let mut response = response.error_for_status()?;

        let file_name = remote_file_name(response.url()).ok_or_else(|| {
            MirrorError::UnrecognizedResponseShape(format!("download URL {}", response.url()))
        })?;
        let target = directory.join(&file_name);

        let stored = persist_body(&target, &file_name, async || {
            response.chunk().await.map_err(MirrorError::from)
        })
        .await;

        if let Err(err) = stored {
            return Err(MirrorError::Download {
                url,
                file: target,
                source: Box::new(err),
            });
        }

        Ok(target)
    }

    pub fn url_report(&self) -> UrlReport {
        self.tracker.report()
    }

    /// Fetch a JSON endpoint through the response cache.
    ///
    /// A cache hit records only the request URL since no round-trip
    /// happened; a miss records request and response URLs and stores the
    /// decoded payload.
    async fn fetch_json(&mut self, url: Url) -> Result<serde_json::Value, MirrorError> {
        let key = format!("GET {}", url);

        self.tracker.record_request(&url);
        if let Some(cached) = self.cache.get(&key)? {
            return Ok(cached);
        }

        let response = self.client.get(url).send().await?;
        self.tracker.record_response(response.url());
        let response = response.error_for_status()?;

        let data = response.bytes().await?;
        let value: serde_json::Value = serde_json::from_slice(&data)?;

        self.cache.put(&key, &value)?;
        Ok(value)
    }
}

fn path(base: &Url, segments: impl IntoIterator<Item = impl AsRef<str>>) -> Url {
    let mut new_path = base.clone();
    new_path.path_segments_mut().unwrap().extend(segments);

    new_path
}

/// Filesystem half of a download.
///
/// A pre-existing target is kept untouched and the chunk source is
/// never pulled; otherwise the body is streamed into the target, and
/// any failure deletes the partial file before the error propagates.
async fn persist_body<C, F>(
    target: &Path,
    file_name: &str,
    mut next_chunk: F,
) -> Result<(), MirrorError>
where
    C: AsRef<[u8]>,
    F: AsyncFnMut() -> Result<Option<C>, MirrorError>,
{
    if tokio::fs::try_exists(target).await? {
        tracing::debug!("File {} already exists: skipping download", file_name);
        return Ok(());
    }

    tracing::info!("Downloading {}...", file_name);
    let write = async {
        let mut file = tokio::fs::File::create(target).await?;
        while let Some(chunk) = next_chunk().await? {
            file.write_all(chunk.as_ref()).await?;
        }
        file.flush().await?;

        Ok::<(), MirrorError>(())
    };

    if let Err(err) = write.await {
        let _ = tokio::fs::remove_file(target).await;
        return Err(err);
    }

    Ok(())
}

/// Last non-empty path segment of the effective URL.
fn remote_file_name(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .next_back()
        .map(ToOwned::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_comes_from_the_effective_url() {
        let url = Url::parse("https://cdn.example.test/files/7322/ideavim-2.5.0.zip?sig=abc").unwrap();
        assert_eq!(remote_file_name(&url).as_deref(), Some("ideavim-2.5.0.zip"));
    }

    #[test]
    fn root_urls_have_no_file_name() {
        let url = Url::parse("https://cdn.example.test/").unwrap();
        assert_eq!(remote_file_name(&url), None);
    }

    #[tokio::test]
    async fn existing_target_skips_the_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("archive.zip");
        std::fs::write(&target, b"previous contents").unwrap();

        let mut pulls = 0usize;
        persist_body(&target, "archive.zip", async || {
            pulls += 1;
            Ok::<_, MirrorError>(Some(b"new contents".to_vec()))
        })
        .await
        .unwrap();

        assert_eq!(pulls, 0);
        assert_eq!(std::fs::read(&target).unwrap(), b"previous contents");
    }

    #[tokio::test]
    async fn body_chunks_are_streamed_to_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("archive.zip");

        let mut chunks = vec![b"world".to_vec(), b"hello ".to_vec()];
        persist_body(&target, "archive.zip", async || {
            Ok::<_, MirrorError>(chunks.pop())
        })
        .await
        .unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn failed_transfer_purges_the_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("archive.zip");

        let mut sent_first = false;
        let result = persist_body(&target, "archive.zip", async || {
            if sent_first {
                Err(MirrorError::GenericIo(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset",
                )))
            } else {
                sent_first = true;
                Ok(Some(b"partial data".to_vec()))
            }
        })
        .await;

        assert!(result.is_err());
        assert!(!target.exists());
    }
}
