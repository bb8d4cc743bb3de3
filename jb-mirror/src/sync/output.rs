use crate::error::MirrorError;
use crate::tracker::UrlReport;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "products.json";
pub const URL_REPORT_FILE: &str = "urls.json";

/// The per-run manifest: product id to its produced artifacts.
///
/// BTreeMap keys keep the serialized output byte-identical across runs
/// with an unchanged remote and configuration.
pub type ProductsIndex = BTreeMap<String, ProductEntry>;

#[derive(Debug, Serialize)]
pub struct ProductEntry {
    pub archives: BTreeMap<String, OsArtifacts>,
    /// `None` means resolution ran and found no compatible update,
    /// distinct from a plugin that was never attempted.
    pub plugins: BTreeMap<u64, Option<String>>,
}

#[derive(Debug, Serialize)]
pub struct OsArtifacts {
    pub archive: String,
    pub hash: String,
}

pub fn write_manifest(directory: &Path, index: &ProductsIndex) -> Result<PathBuf, MirrorError> {
    let manifest_path = directory.join(MANIFEST_FILE);

    let manifest_file = std::fs::File::create(&manifest_path)?;
    serde_json::to_writer_pretty(manifest_file, index)?;

    Ok(manifest_path)
}

pub fn write_url_report(directory: &Path, report: &UrlReport) -> Result<PathBuf, MirrorError> {
    let report_path = directory.join(URL_REPORT_FILE);

    let report_file = std::fs::File::create(&report_path)?;
    serde_json::to_writer_pretty(report_file, report)?;

    Ok(report_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> ProductsIndex {
        let mut archives = BTreeMap::new();
        archives.insert(
            "linux".to_owned(),
            OsArtifacts {
                archive: "products/ideaIU-2024.1.tar.gz".to_owned(),
                hash: "products/ideaIU-2024.1.tar.gz.sha256".to_owned(),
            },
        );

        let mut plugins = BTreeMap::new();
        plugins.insert(631u64, Some("plugins/python-241.zip".to_owned()));
        plugins.insert(7322u64, None);

        let mut index = ProductsIndex::new();
        index.insert("IIU".to_owned(), ProductEntry { archives, plugins });
        index
    }

    #[test]
    fn manifest_schema_matches_the_index_layout() {
        let rendered = serde_json::to_value(sample_index()).unwrap();

        assert_eq!(
            rendered,
            serde_json::json!({
                "IIU": {
                    "archives": {
                        "linux": {
                            "archive": "products/ideaIU-2024.1.tar.gz",
                            "hash": "products/ideaIU-2024.1.tar.gz.sha256"
                        }
                    },
                    "plugins": {
                        "631": "plugins/python-241.zip",
                        "7322": null
                    }
                }
            })
        );
    }

    #[test]
    fn manifest_writes_are_deterministic() {
        let dir = tempfile::tempdir().unwrap();

        write_manifest(dir.path(), &sample_index()).unwrap();
        let first = std::fs::read(dir.path().join(MANIFEST_FILE)).unwrap();

        write_manifest(dir.path(), &sample_index()).unwrap();
        let second = std::fs::read(dir.path().join(MANIFEST_FILE)).unwrap();

        assert_eq!(first, second);
    }
}
