use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;

use crate::ldap;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ldap: ldap::Config,
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = tokio::fs::read(path.as_ref()).await
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config = serde_yaml::from_slice(&config)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        return Ok(config);
    }
}
