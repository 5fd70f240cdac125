//! Configuration module for the engine endpoint, timeouts and registry credentials

use crate::error::{DockerError, Result};
use crate::event::handle::DEFAULT_EVENT_TIMEOUT;
use crate::stream::handle::{DEFAULT_CLOSE_GRACE, DEFAULT_PIPE_CAPACITY, DEFAULT_READY_TIMEOUT};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use url::Url;

pub const DEFAULT_DOCKER_HOST: &str = "http://localhost:2375";

/// Credentials forwarded to the daemon in the `X-Registry-Auth` header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAuth {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(rename = "serveraddress", skip_serializing_if = "Option::is_none")]
    pub server_address: Option<String>,
}

impl RegistryAuth {
    pub fn header_value(&self) -> Result<String> {
        Ok(URL_SAFE.encode(serde_json::to_vec(self)?))
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub docker_host: String,
    pub ready_timeout: Duration,
    pub close_grace: Duration,
    pub event_timeout: Duration,
    pub pipe_capacity: usize,
    pub registry_auth: Option<RegistryAuth>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            docker_host: DEFAULT_DOCKER_HOST.to_string(),
            ready_timeout: DEFAULT_READY_TIMEOUT,
            close_grace: DEFAULT_CLOSE_GRACE,
            event_timeout: DEFAULT_EVENT_TIMEOUT,
            pipe_capacity: DEFAULT_PIPE_CAPACITY,
            registry_auth: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = env::var("DOCKER_HOST") {
            config.docker_host = parse_docker_host(&host)?;
        }
        if let Some(secs) = env_secs("DOCKER_READY_TIMEOUT_SECS")? {
            config.ready_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_secs("DOCKER_EVENT_TIMEOUT_SECS")? {
            config.event_timeout = Duration::from_secs(secs);
        }

        let auth = RegistryAuth {
            username: env::var("REGISTRY_USERNAME").ok(),
            password: env::var("REGISTRY_PASSWORD").ok(),
            server_address: env::var("REGISTRY_ADDRESS").ok(),
        };
        if auth.has_credentials() {
            config.registry_auth = Some(auth);
        }

        Ok(config)
    }

    pub fn with_docker_host(mut self, host: &str) -> Result<Self> {
        self.docker_host = parse_docker_host(host)?;
        Ok(self)
    }

    pub fn base_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.docker_host)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

fn env_secs(name: &str) -> Result<Option<u64>> {
    match env::var(name) {
        Ok(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|_| DockerError::Configuration(format!("{} must be a number of seconds", name))),
        Err(_) => Ok(None),
    }
}

/// Map a `DOCKER_HOST`-style value onto an HTTP base URL
pub fn parse_docker_host(host: &str) -> Result<String> {
    let host = host.trim();
    if host.is_empty() {
        return Err(DockerError::Configuration("Docker host cannot be empty".to_string()));
    }

    let candidate = if let Some(rest) = host.strip_prefix("tcp://") {
        format!("http://{}", rest)
    } else if host.starts_with("unix://") || host.starts_with("npipe://") {
        return Err(DockerError::Configuration(format!(
            "Socket endpoints are not supported, expose the daemon over TCP: {}",
            host
        )));
    } else if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    };

    let url = Url::parse(&candidate)?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(DockerError::Configuration(format!(
                "Unsupported Docker host scheme: {}",
                other
            )));
        }
    }
    if url.host_str().is_none() {
        return Err(DockerError::Configuration(format!("Docker host has no hostname: {}", host)));
    }

    Ok(candidate.trim_end_matches('/').to_string())
}
