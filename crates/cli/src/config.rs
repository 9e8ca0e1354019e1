//! Console configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Console configuration, stored as TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// LwM2M server demo API
    pub server: EndpointConfig,

    /// Bootstrap server demo API
    pub bootstrap: EndpointConfig,

    /// HTTP client settings
    pub http: HttpConfig,
}

/// Base URL of a REST API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            server: EndpointConfig::default(),
            bootstrap: EndpointConfig {
                url: "http://localhost:8081".to_string(),
            },
            http: HttpConfig::default(),
        }
    }
}

impl ConsoleConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply command-line overrides
    pub fn with_overrides(
        mut self,
        server_url: Option<String>,
        bootstrap_url: Option<String>,
    ) -> Self {
        if let Some(url) = server_url {
            self.server.url = url;
        }
        if let Some(url) = bootstrap_url {
            self.bootstrap.url = url;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }
}
