//! Runs one parsed command against the engine

use crate::cli::args::{Args, Command};
use crate::client::{DockerClient, LogOptions};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::event::{EventHandle, EventListener, Operation, ProgressEvent};
use crate::output::OutputManager;
use crate::stream::{LogHandle, OutputTarget};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Reports image operation progress on the console
struct ConsoleListener {
    output: OutputManager,
    operation: Operation,
}

impl EventListener for ConsoleListener {
    fn on_success(&self) {
        self.output.success(&format!("{} completed", self.operation));
    }

    fn on_error(&self, message: &str) {
        self.output.error(&format!("{} failed: {}", self.operation, message));
    }

    fn on_event(&self, event: &ProgressEvent) {
        self.output.event(event);
    }
}

pub struct Runner {
    args: Args,
    output: OutputManager,
}

impl Runner {
    pub fn new(args: Args) -> Result<Self> {
        args.validate()?;

        let output = if args.quiet {
            OutputManager::new_quiet()
        } else {
            OutputManager::new(args.verbose)
        };

        Ok(Self { args, output })
    }

    pub async fn run(&self) -> Result<()> {
        match &self.args.command {
            Command::Demux { file } => self.demux(file).await,
            Command::Logs {
                container,
                follow,
                timestamps,
                tail,
            } => {
                let options = LogOptions {
                    follow: *follow,
                    timestamps: *timestamps,
                    tail: tail.clone(),
                    ..LogOptions::default()
                };
                self.logs(container, &options).await
            }
            Command::Pull { image } => {
                let client = self.client()?;
                let handle = client.pull_image(image, self.listener(Operation::Pull)).await?;
                self.finish(handle).await
            }
            Command::Push { image } => {
                let client = self.client()?;
                let handle = client.push_image(image, self.listener(Operation::Push)).await?;
                self.finish(handle).await
            }
            Command::Import { source, repo, tag } => {
                let client = self.client()?;
                let handle = client
                    .import_image(
                        source,
                        repo.as_deref(),
                        tag.as_deref(),
                        self.listener(Operation::Import),
                    )
                    .await?;
                self.finish(handle).await
            }
            Command::Build { context, tag } => {
                let client = self.client()?;
                self.output.section(&format!("Building {}", context.display()));
                let handle = client
                    .build_image(context, tag.as_deref(), self.listener(Operation::Build))
                    .await?;
                self.finish(handle).await
            }
        }
    }

    fn client(&self) -> Result<DockerClient> {
        let mut config = ClientConfig::from_env()?;
        if let Some(host) = &self.args.host {
            config = config.with_docker_host(host)?;
        }
        if let Some(timeout) = self.args.timeout {
            config.event_timeout = Duration::from_secs(timeout);
        }
        self.output.verbose(&format!("Docker Engine: {}", config.docker_host));
        DockerClient::new(config)
    }

    fn listener(&self, operation: Operation) -> Arc<dyn EventListener> {
        self.output.section(&format!("Image {}", operation));
        Arc::new(ConsoleListener {
            output: self.output.clone(),
            operation,
        })
    }

    async fn finish(&self, handle: Arc<EventHandle>) -> Result<()> {
        let result = handle.wait().await;
        if let Err(e) = &result {
            if e.is_timeout() {
                self.output.warning(&format!(
                    "{} has not finished after {}, it may still be running on the daemon",
                    handle.operation(),
                    self.output.elapsed_time()
                ));
            }
        }
        result
    }

    async fn logs(&self, container: &str, options: &LogOptions) -> Result<()> {
        let client = self.client()?;
        let handle = client
            .container_logs(
                container,
                options,
                OutputTarget::writer(tokio::io::stdout()),
                OutputTarget::writer(tokio::io::stderr()),
            )
            .await?;

        if !options.follow {
            let frames = handle.wait_for_completion().await?;
            self.output.verbose(&format!("Received {} frames", frames));
            return Ok(());
        }

        tokio::select! {
            result = handle.wait_for_completion() => {
                let frames = result?;
                self.output.verbose(&format!("Log stream ended after {} frames", frames));
            }
            _ = tokio::signal::ctrl_c() => {
                self.output.verbose("Interrupted, closing log stream");
                handle.close().await?;
            }
        }
        Ok(())
    }

    async fn demux(&self, file: &Path) -> Result<()> {
        let source = tokio::fs::File::open(file).await?;
        let size = source.metadata().await?.len();
        self.output.verbose(&format!(
            "Demultiplexing {} ({})",
            file.display(),
            self.output.format_size(size)
        ));

        let handle = LogHandle::builder()
            .with_output(OutputTarget::writer(tokio::io::stdout()))
            .with_error(OutputTarget::writer(tokio::io::stderr()))
            .build();
        handle.on_response_headers_received(source);
        handle.wait_until_ready().await?;

        let frames = handle.wait_for_completion().await?;
        self.output.verbose(&format!(
            "Demultiplexed {} frames in {}",
            frames,
            self.output.elapsed_time()
        ));
        Ok(())
    }
}
