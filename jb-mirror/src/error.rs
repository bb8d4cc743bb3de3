use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("an I/O error occurred: {0}")]
    GenericIo(#[from] std::io::Error),

    #[error("http client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("deserialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    ConfigError(#[from] serde_yaml::Error),

    #[error("build range `{0}` does not match the expected format")]
    InvalidRangeFormat(String),

    #[error("response for {0} is not in a recognized format")]
    UnrecognizedResponseShape(String),

    #[error("no release matching version {version:?} found for product {product}")]
    ReleaseNotFound {
        product: String,
        version: Option<String>,
    },

    #[error("downloaded {file} has the wrong size (expected {expected}, got {actual}) and was removed", file = .file.display())]
    SizeMismatch {
        file: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("downloaded {} has the wrong hash and was removed", .file.display())]
    DigestMismatch { file: PathBuf },

    #[error("unknown or unavailable OS {0}")]
    UnknownOs(String),

    #[error("could not write disk cache for key {key}: {source}")]
    CacheWrite {
        key: String,
        source: std::io::Error,
    },

    #[error("failed to read hash file {}: {source}", .file.display())]
    DigestRead {
        file: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to compute hash for {}: {source}", .file.display())]
    DigestCompute {
        file: PathBuf,
        source: std::io::Error,
    },

    #[error("unhandled hash identifier {0}")]
    UnsupportedHashAlgorithm(String),

    #[error("failed to download {url}, partially written {} was purged: {source}", .file.display())]
    Download {
        url: url::Url,
        file: PathBuf,
        source: Box<MirrorError>,
    },
}
