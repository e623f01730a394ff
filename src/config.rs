//! Site configuration (`site.toml`) with environment overrides.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "site.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("PORT must be a port number, got `{0}`")]
    InvalidPort(String),
}

/// What the header region says about the site owner.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name: String,
    pub headline: String,
    pub intro: String,
    /// Image URL; no image is rendered when empty.
    pub avatar: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: "Portfolio".to_string(),
            headline: "Software Developer".to_string(),
            intro: "Welcome! Here I share more about me and mainly my projects.".to_string(),
            avatar: "/static/avatar.png".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// Account whose public repositories are listed. Empty disables the
    /// lookup and the repository list resolves to nothing.
    pub user: String,
    pub api_base: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            api_base: "https://api.github.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub content_dir: PathBuf,
    pub port: u16,
    pub profile: Profile,
    pub github: GithubConfig,
    /// Set from `RUST_ENV`, never from the file.
    #[serde(skip)]
    pub is_development: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from("content"),
            port: 8080,
            profile: Profile::default(),
            github: GithubConfig::default(),
            is_development: false,
        }
    }
}

impl SiteConfig {
    /// Loads `SITE_CONFIG` (or `site.toml`) and applies the process
    /// environment on top.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("SITE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        let mut config = Self::from_path(Path::new(&path))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// A missing file means defaults; a malformed one is an error.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        }
        self.is_development = lookup("RUST_ENV").map_or(false, |v| v == "development");
        Ok(())
    }

    pub fn static_dir(&self) -> PathBuf {
        self.content_dir.join("static")
    }
}
