use anyhow::bail;

use super::structure::{RagConfigInner, RagConfigTOML};
use std::{
    ops::{Deref, DerefMut},
    path::PathBuf,
};

#[derive(Debug, Clone)]
pub struct RagConfig {
    pub path: PathBuf,
    cached: RagConfigTOML,
}

impl RagConfig {
    /// Reads the config file, creating it with defaults when missing, then
    /// layers the process environment on top.
    pub fn read(path: PathBuf) -> Result<Self, anyhow::Error> {
        let mut config = Self::read_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());

        Ok(config)
    }

    fn read_file(path: PathBuf) -> Result<Self, anyhow::Error> {
        let path = match path.is_dir() {
            true => path.join("config.toml"),
            false => path,
        };

        if !path.exists() {
            return Self::new(path);
        }

        if !path.is_file() {
            bail!(
                "Given path exists and is not a file... either change the path or delete the file."
            );
        }

        let config_str = std::fs::read_to_string(&path)?;

        Ok(Self {
            path,
            cached: toml::from_str(&config_str)?,
        })
    }

    fn new(path: PathBuf) -> Result<Self, anyhow::Error> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let config = Self {
            path,
            cached: RagConfigTOML::default(),
        };

        config.save()?;

        Ok(config)
    }

    pub fn save(&self) -> Result<(), anyhow::Error> {
        std::fs::write(&self.path, toml::to_string(&self.cached)?)?;

        Ok(())
    }

    /// Secrets and endpoints usually come from the deployment environment
    /// rather than the file. API keys only fill in what the file left empty.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let config = &mut self.cached.config;

        if let Some(key) = lookup("GOOGLE_API_KEY").filter(|key| !key.is_empty()) {
            if config.llm.api_key.is_empty() {
                config.llm.api_key = key.clone();
            }
            if config.embedding.api_key.as_deref().is_none_or(str::is_empty) {
                config.embedding.api_key = Some(key);
            }
        }

        if let Some(url) = lookup("QDRANT_URL").filter(|url| !url.is_empty()) {
            config.store.url = url;
        }

        if let Some(key) = lookup("QDRANT_API_KEY").filter(|key| !key.is_empty()) {
            config.store.api_key = Some(key);
        }
    }
}

impl Deref for RagConfig {
    type Target = RagConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.cached.config
    }
}

impl DerefMut for RagConfig {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.cached.config
    }
}

impl PartialEq for RagConfig {
    fn eq(&self, other: &Self) -> bool {
        self.cached.config == other.cached.config
    }
}
