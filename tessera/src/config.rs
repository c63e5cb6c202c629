//! Environment-driven settings.
//!
//! Each settings group reads the environment variables under its own prefix:
//!
//! | Group              | Prefix             |
//! |--------------------|--------------------|
//! | [`ClusterSettings`]| `TESSERA_CLUSTER_` |
//! | [`WorkerSettings`] | `TESSERA_WORKER_`  |
//! | [`HttpApiSettings`]| `HTTP_API_`        |
//! | [`ServiceSettings`]| `SERVICE_`         |
//!
//! For example `TESSERA_WORKER_HTTP_PORT=8001` sets `WorkerSettings::http_port`.

use figment::providers::Env;
use figment::Figment;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(#[source] Box<figment::Error>);

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self(Box::new(e))
    }
}

fn load<T: DeserializeOwned>(prefix: &str) -> Result<T, ConfigError> {
    Ok(Figment::new().merge(Env::prefixed(prefix)).extract()?)
}

/// Where the client finds the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSettings {
    /// Base URL of the worker's workflow API.
    pub host: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl ClusterSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        load("TESSERA_CLUSTER_")
    }
}

fn default_namespace() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSettings {
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default = "default_listen_host")]
    pub http_host: String,
    #[serde(default = "default_worker_port")]
    pub http_port: u16,
    /// Address the Callback-Emitting Service calls back, e.g.
    /// `http://worker:8001/callback`.
    pub http_callback: String,
}

impl WorkerSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        load("TESSERA_WORKER_")
    }

    /// Worker identity rendered as `pid@hostname#name`.
    pub fn identity(&self) -> String {
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());
        let name = self.identity.as_deref().unwrap_or("worker-name");
        format!("{}@{}#{}", std::process::id(), host, name)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

/// The Callback-Emitting Service, as seen by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpApiSettings {
    pub host: String,
    /// Outbound request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout: u64,
}

impl HttpApiSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        load("HTTP_API_")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

fn default_timeout_secs() -> u64 {
    60
}

/// Listen address of the simulated Callback-Emitting Service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSettings {
    #[serde(default = "default_listen_host")]
    pub http_host: String,
    #[serde(default = "default_service_port")]
    pub http_port: u16,
}

impl ServiceSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        load("SERVICE_")
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}

fn default_worker_port() -> u16 {
    8001
}

fn default_service_port() -> u16 {
    8000
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_worker_settings_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("TESSERA_WORKER_HTTP_PORT", "9001");
            jail.set_env("TESSERA_WORKER_HTTP_CALLBACK", "http://localhost:9001/callback");
            jail.set_env("TESSERA_WORKER_IDENTITY", "alpha");

            let settings = WorkerSettings::from_env().unwrap();
            assert_eq!(settings.http_port, 9001);
            assert_eq!(settings.http_host, "0.0.0.0");
            assert_eq!(settings.listen_addr(), "0.0.0.0:9001");
            assert!(settings.identity().ends_with("#alpha"));
            assert!(settings
                .identity()
                .starts_with(&format!("{}@", std::process::id())));
            Ok(())
        });
    }

    #[test]
    fn test_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("HTTP_API_HOST", "http://localhost:8000");
            jail.set_env("TESSERA_CLUSTER_HOST", "http://localhost:8001");

            let api = HttpApiSettings::from_env().unwrap();
            assert_eq!(api.timeout(), Duration::from_secs(60));

            let cluster = ClusterSettings::from_env().unwrap();
            assert_eq!(cluster.namespace, "default");

            let service = ServiceSettings::from_env().unwrap();
            assert_eq!(service.listen_addr(), "0.0.0.0:8000");
            Ok(())
        });
    }

    #[test]
    fn test_missing_required_field_fails() {
        Jail::expect_with(|_jail| {
            let err = WorkerSettings::from_env().unwrap_err();
            assert!(err.to_string().contains("http_callback"));
            Ok(())
        });
    }
}
