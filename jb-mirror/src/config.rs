use crate::error::MirrorError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ProductConfig {
    #[serde(default)]
    pub version: Option<String>,
    pub os: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub products: BTreeMap<String, ProductConfig>,
    pub plugins: Vec<u64>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, MirrorError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }
}
