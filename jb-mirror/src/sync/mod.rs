mod output;

use crate::api::{JetbrainsApi, Plugin, PluginUpdate, Product, ProductRelease, ReleaseDownload};
use crate::args::MirrorArgs;
use crate::cache::{DiskCache, NoCache, ResponseCache};
use crate::compat::{self, BuildTuple};
use crate::config::{Config, ProductConfig};
use crate::error::MirrorError;
use crate::reconcile;
use crate::sync::output::{OsArtifacts, ProductsIndex};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

const PRODUCTS_DESTINATION: &str = "products";
const PLUGINS_DESTINATION: &str = "plugins";
const CACHE_DESTINATION: &str = "cache";
const UNKNOWN_FILES: &str = "unknown.txt";
const OPTION_CLEAN_UNKNOWN: &str = "--clean-unknown";

/// Drives one full mirror pass.
///
/// Owns the single API client (with its cache and URL tracker) and the
/// known-files set; everything is constructed once per run, no ambient
/// state.
pub struct MirrorProcessor {
    api: JetbrainsApi,
    destination: PathBuf,
    clean_unknown: bool,
    plugins: HashMap<u64, Plugin>,
    plugin_updates: HashMap<u64, Vec<PluginUpdate>>,
    known_files: HashSet<PathBuf>,
}

impl MirrorProcessor {
    /// Prepare the mirror processor.
    pub fn new(args: &MirrorArgs) -> Result<Self, MirrorError> {
        let cache: Box<dyn ResponseCache> = if args.cache_api {
            tracing::debug!("Caching API responses on disk at \"{}\"", CACHE_DESTINATION);
            Box::new(DiskCache::new(CACHE_DESTINATION)?)
        } else {
            Box::new(NoCache)
        };

        let api = JetbrainsApi::new(cache)?;

        Ok(Self {
            api,
            destination: args.dest.clone(),
            clean_unknown: args.clean_unknown,
            plugins: HashMap::new(),
            plugin_updates: HashMap::new(),
            known_files: HashSet::new(),
        })
    }

    pub async fn run(&mut self, config: &Config) -> Result<(), MirrorError> {
        std::fs::create_dir_all(&self.destination)?;

        self.known_files.clear();
        self.known_files.extend([
            self.destination.clone(),
            self.products_destination(),
            self.plugins_destination(),
        ]);

        self.load_plugin_information(&config.plugins).await?;

        let mut index = ProductsIndex::new();
        for (product_id, product_config) in &config.products {
            tracing::info!("Processing {}", product_id);
            let entry = self
                .process_product(product_id, product_config, &config.plugins)
                .await?;
            index.insert(product_id.clone(), entry);
        }

        let manifest_path = output::write_manifest(&self.destination, &index)?;
        self.known_files.insert(manifest_path);

        let report_path = output::write_url_report(&self.destination, &self.api.url_report())?;
        self.known_files.insert(report_path);

        self.manage_unknown_files()
    }

    async fn load_plugin_information(&mut self, plugin_ids: &[u64]) -> Result<(), MirrorError> {
        self.plugins.clear();
        self.plugin_updates.clear();

        for plugin_id in plugin_ids.iter().copied() {
            tracing::debug!("Getting plugin {} information...", plugin_id);
            let plugin = self.api.get_plugin(plugin_id).await?;
            let updates = self.api.get_all_plugin_updates(plugin_id).await?;
            tracing::info!(
                "Found {} releases of plugin \"{}\" (id={})",
                updates.len(),
                plugin.name,
                plugin_id
            );

            self.plugins.insert(plugin_id, plugin);
            self.plugin_updates.insert(plugin_id, updates);
        }

        Ok(())
    }

    async fn process_product(
        &mut self,
        product_id: &str,
        product_config: &ProductConfig,
        plugin_ids: &[u64],
    ) -> Result<output::ProductEntry, MirrorError> {
        let product = self.api.get_product(product_id).await?;
        let release = resolve_release(&product, product_config.version.as_deref())?;
        tracing::info!(
            "Product {} is \"{}\", and version {} is build {}",
            product_id,
            product.name,
            release.version,
            release.build
        );

        let build = BuildTuple::from_build(&release.build)?;

        let mut archives = BTreeMap::new();
        for os in &product_config.os {
            let download = release
                .downloads
                .get(os)
                .ok_or_else(|| MirrorError::UnknownOs(os.clone()))?;

            let (archive, hash_file) = self.download_release_artifact(download).await?;
            archives.insert(
                os.clone(),
                OsArtifacts {
                    archive: self.relative(&archive),
                    hash: self.relative(&hash_file),
                },
            );
            self.known_files.insert(archive);
            self.known_files.insert(hash_file);
        }

        let plugins = self.download_product_plugins(plugin_ids, &build).await?;

        Ok(output::ProductEntry { archives, plugins })
    }

    /// Download one OS archive and its detached checksum, then check
    /// the declared byte size and the digest. Either mismatch deletes
    /// the archive and fails the product.
    async fn download_release_artifact(
        &mut self,
        download: &ReleaseDownload,
    ) -> Result<(PathBuf, PathBuf), MirrorError> {
        let directory = self.products_destination();

        let archive = self
            .api
            .download_file(download.link.clone(), &directory)
            .await?;
        check_declared_size(&archive, download.size)?;

        let hash_file = self
            .api
            .download_file(download.checksum_link.clone(), &directory)
            .await?;
        check_archive_digest(&archive, &hash_file)?;

        tracing::info!(
            "Valid {} found on disk",
            archive.file_name().unwrap_or_default().to_string_lossy()
        );

        Ok((archive, hash_file))
    }

    /// Resolve and download the best update of every configured plugin
    /// for the given product build. A plugin without a compatible
    /// update is recorded as `None` and does not fail the product.
    async fn download_product_plugins(
        &mut self,
        plugin_ids: &[u64],
        build: &BuildTuple,
    ) -> Result<BTreeMap<u64, Option<String>>, MirrorError> {
        let mut entries = BTreeMap::new();
        let directory = self.plugins_destination();

        for plugin_id in plugin_ids.iter().copied() {
            let plugin_name = self
                .plugins
                .get(&plugin_id)
                .map(|plugin| plugin.name.clone())
                .unwrap_or_else(|| plugin_id.to_string());

            let chosen = self
                .plugin_updates
                .get(&plugin_id)
                .and_then(|updates| compat::select_update(updates, build))
                .map(|update| (update.id, update.version.clone()));

            let Some((update_id, version)) = chosen else {
                tracing::warn!(
                    "No matching plugin {} version for product build {}",
                    plugin_name,
                    build
                );
                entries.insert(plugin_id, None);
                continue;
            };

            tracing::info!("Found matching plugin {} version {}", plugin_name, version);
            let file = self.api.download_plugin(update_id, &directory).await?;
            entries.insert(plugin_id, Some(self.relative(&file)));
            self.known_files.insert(file);
        }

        Ok(entries)
    }

    fn manage_unknown_files(&self) -> Result<(), MirrorError> {
        tracing::info!(
            "Found {} files linked to the configuration",
            self.known_files.len()
        );

        let unknown = reconcile::diff(&self.destination, &self.known_files)?;
        if !unknown.is_empty() {
            reconcile::write_report(Path::new(UNKNOWN_FILES), &unknown)?;
            tracing::warn!(
                "Found {} unknown files or directories in {}",
                unknown.len(),
                self.destination.display()
            );
            tracing::warn!(
                "List of unknown items has been saved in `{}` for information",
                UNKNOWN_FILES
            );

            if self.clean_unknown {
                tracing::info!("Cleaning unknown files as requested...");
                reconcile::clean(&unknown);
            } else {
                tracing::warn!(
                    "To remove the unknown items, restart with {}",
                    OPTION_CLEAN_UNKNOWN
                );
            }
        }

        tracing::info!("Management of known/unknown files complete");
        Ok(())
    }

    fn products_destination(&self) -> PathBuf {
        self.destination.join(PRODUCTS_DESTINATION)
    }

    fn plugins_destination(&self) -> PathBuf {
        self.destination.join(PLUGINS_DESTINATION)
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.destination)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

fn resolve_release<'a>(
    product: &'a Product,
    version: Option<&str>,
) -> Result<&'a ProductRelease, MirrorError> {
    let release = match version {
        Some(version) => product.release(version),
        None => product.latest_release(),
    };

    release.ok_or_else(|| MirrorError::ReleaseNotFound {
        product: product.name.clone(),
        version: version.map(ToOwned::to_owned),
    })
}

/// The archive must match the API-declared byte size; a mismatch
/// deletes it so no partial artifact survives.
fn check_declared_size(archive: &Path, expected: u64) -> Result<(), MirrorError> {
    let actual = std::fs::metadata(archive)?.len();
    if actual != expected {
        std::fs::remove_file(archive)?;
        return Err(MirrorError::SizeMismatch {
            file: archive.to_path_buf(),
            expected,
            actual,
        });
    }

    Ok(())
}

/// The archive must match its detached checksum; a mismatch deletes it.
fn check_archive_digest(archive: &Path, hash_file: &Path) -> Result<(), MirrorError> {
    if !crate::digest::verify(archive, hash_file)? {
        std::fs::remove_file(archive)?;
        return Err(MirrorError::DigestMismatch {
            file: archive.to_path_buf(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // SHA-256 of b"hello world"
    const HELLO_WORLD_SHA256: &str =
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn release(version: &str, build: &str) -> ProductRelease {
        serde_json::from_value(serde_json::json!({
            "date": "2024-04-04",
            "type": "release",
            "version": version,
            "build": build
        }))
        .unwrap()
    }

    fn product(releases: Vec<ProductRelease>) -> Product {
        Product {
            code: "IIU".to_owned(),
            name: "IntelliJ IDEA Ultimate".to_owned(),
            releases,
        }
    }

    #[test]
    fn explicit_version_resolves_the_matching_release() {
        let product = product(vec![
            release("2024.1", "241.14494.240"),
            release("2023.3", "233.11799.241"),
        ]);

        let resolved = resolve_release(&product, Some("2023.3")).unwrap();
        assert_eq!(resolved.build, "233.11799.241");
    }

    #[test]
    fn unspecified_version_resolves_to_the_first_release() {
        let product = product(vec![
            release("2024.1", "241.14494.240"),
            release("2023.3", "233.11799.241"),
        ]);

        let resolved = resolve_release(&product, None).unwrap();
        assert_eq!(resolved.version, "2024.1");
    }

    #[test]
    fn missing_explicit_version_is_release_not_found() {
        let product = product(vec![release("2024.1", "241.14494.240")]);

        let result = resolve_release(&product, Some("2019.1"));
        assert!(matches!(
            result,
            Err(MirrorError::ReleaseNotFound { ref version, .. }) if version.as_deref() == Some("2019.1")
        ));
    }

    #[test]
    fn empty_release_list_is_release_not_found() {
        let product = product(Vec::new());
        assert!(matches!(
            resolve_release(&product, None),
            Err(MirrorError::ReleaseNotFound { .. })
        ));
    }

    #[test]
    fn size_mismatch_removes_the_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("ideaIU-2024.1.tar.gz");
        std::fs::write(&archive, b"truncated transfer").unwrap();

        let result = check_declared_size(&archive, 1_000_000);
        assert!(matches!(
            result,
            Err(MirrorError::SizeMismatch {
                expected: 1_000_000,
                actual: 18,
                ..
            })
        ));
        assert!(!archive.exists());
    }

    #[test]
    fn matching_size_keeps_the_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("ideaIU-2024.1.tar.gz");
        std::fs::write(&archive, b"hello world").unwrap();

        check_declared_size(&archive, 11).unwrap();
        assert!(archive.exists());
    }

    #[test]
    fn digest_mismatch_removes_the_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("ideaIU-2024.1.tar.gz");
        let hash_file = dir.path().join("ideaIU-2024.1.tar.gz.sha256");
        std::fs::write(&archive, b"tampered contents").unwrap();
        std::fs::write(
            &hash_file,
            format!("{} *ideaIU-2024.1.tar.gz", HELLO_WORLD_SHA256),
        )
        .unwrap();

        let result = check_archive_digest(&archive, &hash_file);
        assert!(matches!(result, Err(MirrorError::DigestMismatch { .. })));
        assert!(!archive.exists());
    }

    #[test]
    fn matching_digest_keeps_the_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("ideaIU-2024.1.tar.gz");
        let hash_file = dir.path().join("ideaIU-2024.1.tar.gz.sha256");
        std::fs::write(&archive, b"hello world").unwrap();
        std::fs::write(
            &hash_file,
            format!("{} *ideaIU-2024.1.tar.gz", HELLO_WORLD_SHA256),
        )
        .unwrap();

        check_archive_digest(&archive, &hash_file).unwrap();
        assert!(archive.exists());
    }
}
