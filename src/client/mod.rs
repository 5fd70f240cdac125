//! Docker Engine API transport
//!
//! [`DockerClient`] issues the HTTP requests and drives the stream handles: log
//! requests end in exactly one of `on_response_headers_received`/`on_request_failed`,
//! and progress requests end the event stream exactly once.

pub mod context;

use crate::config::ClientConfig;
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{DockerError, Result};
use crate::event::{EventClassifier, EventHandle, EventListener, Operation, drive};
use crate::stream::{LogHandle, OutputTarget};
use futures_util::TryStreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use std::path::Path;
use std::sync::Arc;
use tokio_util::io::StreamReader;
use tracing::{debug, info};
use url::Url;

const REGISTRY_AUTH_HEADER: &str = "X-Registry-Auth";

#[derive(Debug, Clone)]
pub struct LogOptions {
    pub follow: bool,
    pub timestamps: bool,
    pub stdout: bool,
    pub stderr: bool,
    /// Number of lines from the end, or `all`
    pub tail: Option<String>,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            follow: false,
            timestamps: false,
            stdout: true,
            stderr: true,
            tail: None,
        }
    }
}

impl LogOptions {
    fn query(&self) -> Vec<(&'static str, String)> {
        let flag = |value: bool| if value { "1" } else { "0" }.to_string();
        let mut query = vec![
            ("follow", flag(self.follow)),
            ("timestamps", flag(self.timestamps)),
            ("stdout", flag(self.stdout)),
            ("stderr", flag(self.stderr)),
        ];
        if let Some(tail) = &self.tail {
            query.push(("tail", tail.clone()));
        }
        query
    }
}

/// Split `name:tag`, leaving registry ports and digests intact
pub fn split_reference(image: &str) -> (&str, &str) {
    if image.contains('@') {
        return (image, "");
    }
    let name_start = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[name_start..].rfind(':') {
        Some(i) => (&image[..name_start + i], &image[name_start + i + 1..]),
        None => (image, "latest"),
    }
}

pub struct DockerClient {
    client: Client,
    base: Url,
    config: ClientConfig,
}

impl DockerClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base = config.base_url()?;
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    fn with_registry_auth(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let header = match &self.config.registry_auth {
            Some(auth) => auth.header_value()?,
            None => crate::config::RegistryAuth::default().header_value()?,
        };
        Ok(request.header(REGISTRY_AUTH_HEADER, header))
    }

    /// Stream a container's logs, returning once the daemon accepted the request.
    ///
    /// Only non-tty containers produce the multiplexed format.
    pub async fn container_logs(
        &self,
        container: &str,
        options: &LogOptions,
        output: OutputTarget,
        error: OutputTarget,
    ) -> Result<Arc<LogHandle>> {
        let handle = Arc::new(
            LogHandle::builder()
                .with_output(output)
                .with_error(error)
                .with_pipe_capacity(self.config.pipe_capacity)
                .with_ready_timeout(self.config.ready_timeout)
                .with_close_grace(self.config.close_grace)
                .build(),
        );

        let url = self.endpoint(&format!("containers/{}/logs", container))?;
        debug!("GET {} {:?}", url, options);
        let request = self.client.get(url).query(&options.query());

        let callback = Arc::clone(&handle);
        tokio::spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    let body = response.bytes_stream().map_err(std::io::Error::other);
                    callback.on_response_headers_received(StreamReader::new(Box::pin(body)));
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    callback.on_request_failed(HttpErrorHandler::handle_engine_error(
                        status,
                        &text,
                        "container logs",
                    ));
                }
                Err(e) => {
                    callback.on_request_failed(NetworkErrorHandler::describe(&e, "container logs"))
                }
            }
        });

        handle.wait_until_ready().await?;
        Ok(handle)
    }

    pub async fn pull_image(
        &self,
        image: &str,
        listener: Arc<dyn EventListener>,
    ) -> Result<Arc<EventHandle>> {
        let (name, tag) = split_reference(image);
        let mut query = vec![("fromImage", name)];
        if !tag.is_empty() {
            query.push(("tag", tag));
        }

        let request = self.client.post(self.endpoint("images/create")?).query(&query);
        let request = self.with_registry_auth(request)?;
        Ok(self.spawn_progress(Operation::Pull, request, listener))
    }

    pub async fn push_image(
        &self,
        image: &str,
        listener: Arc<dyn EventListener>,
    ) -> Result<Arc<EventHandle>> {
        let (name, tag) = split_reference(image);
        let mut request = self.client.post(self.endpoint(&format!("images/{}/push", name))?);
        if !tag.is_empty() {
            request = request.query(&[("tag", tag)]);
        }
        let request = self.with_registry_auth(request)?;
        Ok(self.spawn_progress(Operation::Push, request, listener))
    }

    /// Import a root filesystem from a URL, or from a local tarball uploaded as the body
    pub async fn import_image(
        &self,
        source: &str,
        repository: Option<&str>,
        tag: Option<&str>,
        listener: Arc<dyn EventListener>,
    ) -> Result<Arc<EventHandle>> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(repository) = repository {
            query.push(("repo", repository));
        }
        if let Some(tag) = tag {
            query.push(("tag", tag));
        }

        let request = self.client.post(self.endpoint("images/create")?);
        let request = if source.contains("://") {
            query.push(("fromSrc", source));
            request.query(&query)
        } else {
            let tarball = tokio::fs::read(source).await?;
            info!("Uploading {} bytes from {}", tarball.len(), source);
            query.push(("fromSrc", "-"));
            request
                .query(&query)
                .header(CONTENT_TYPE, "application/x-tar")
                .body(tarball)
        };

        Ok(self.spawn_progress(Operation::Import, request, listener))
    }

    pub async fn build_image(
        &self,
        context_dir: &Path,
        tag: Option<&str>,
        listener: Arc<dyn EventListener>,
    ) -> Result<Arc<EventHandle>> {
        let dir = context_dir.to_path_buf();
        let context = tokio::task::spawn_blocking(move || context::pack_context(&dir))
            .await
            .map_err(|e| DockerError::Worker(format!("Build context packing failed: {}", e)))??;
        info!("Sending build context ({} bytes)", context.len());

        let mut request = self
            .client
            .post(self.endpoint("build")?)
            .header(CONTENT_TYPE, "application/x-tar")
            .body(context);
        if let Some(tag) = tag {
            request = request.query(&[("t", tag)]);
        }

        Ok(self.spawn_progress(Operation::Build, request, listener))
    }

    fn spawn_progress(
        &self,
        operation: Operation,
        request: RequestBuilder,
        listener: Arc<dyn EventListener>,
    ) -> Arc<EventHandle> {
        let handle = Arc::new(EventHandle::new(
            operation,
            listener,
            self.config.event_timeout,
        ));

        let task_handle = Arc::clone(&handle);
        tokio::spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    drive(response.bytes_stream(), &task_handle).await;
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    task_handle.on_request_failed(HttpErrorHandler::handle_engine_error(
                        status,
                        &text,
                        operation.name(),
                    ));
                }
                Err(e) => {
                    task_handle.on_request_failed(NetworkErrorHandler::describe(&e, operation.name()))
                }
            }
        });

        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_reference() {
        assert_eq!(split_reference("alpine"), ("alpine", "latest"));
        assert_eq!(split_reference("alpine:3.19"), ("alpine", "3.19"));
        assert_eq!(
            split_reference("localhost:5000/team/app"),
            ("localhost:5000/team/app", "latest")
        );
        assert_eq!(
            split_reference("localhost:5000/team/app:v2"),
            ("localhost:5000/team/app", "v2")
        );
        assert_eq!(
            split_reference("alpine@sha256:0f2b5cd4"),
            ("alpine@sha256:0f2b5cd4", "")
        );
    }

    #[test]
    fn test_log_options_query() {
        let options = LogOptions {
            follow: true,
            tail: Some("100".to_string()),
            ..LogOptions::default()
        };
        let query = options.query();
        assert!(query.contains(&("follow", "1".to_string())));
        assert!(query.contains(&("timestamps", "0".to_string())));
        assert!(query.contains(&("stdout", "1".to_string())));
        assert!(query.contains(&("tail", "100".to_string())));
    }

    #[test]
    fn test_endpoint_joins_base() {
        let config = ClientConfig::default().with_docker_host("tcp://daemon:2375").unwrap();
        let client = DockerClient::new(config).unwrap();
        assert_eq!(
            client.endpoint("containers/web/logs").unwrap().as_str(),
            "http://daemon:2375/containers/web/logs"
        );
    }
}
