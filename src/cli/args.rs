//! Command-line argument parsing

use crate::error::handlers::ValidationErrorHandler;
use crate::error::{DockerError, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docker-stream")]
#[command(about = "Follow container logs and image operations on a Docker Engine")]
#[command(version, author)]
pub struct Args {
    /// Docker Engine endpoint
    #[arg(
        long = "host",
        short = 'H',
        global = true,
        help = "Docker Engine endpoint (tcp://host:port or http(s)://host:port), defaults to DOCKER_HOST"
    )]
    pub host: Option<String>,

    /// Verbose output
    #[arg(long = "verbose", short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Quiet mode
    #[arg(long = "quiet", short = 'q', global = true, help = "Only print errors")]
    pub quiet: bool,

    /// Completion timeout for image operations
    #[arg(
        long = "timeout",
        global = true,
        help = "Seconds to wait for an image operation to complete"
    )]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a container's stdout and stderr
    Logs {
        container: String,
        #[arg(long, short = 'f', help = "Keep streaming new output")]
        follow: bool,
        #[arg(long, help = "Prefix every line with its timestamp")]
        timestamps: bool,
        #[arg(long, help = "Number of lines from the end, or \"all\"")]
        tail: Option<String>,
    },
    /// Pull an image
    Pull { image: String },
    /// Push an image to its registry
    Push { image: String },
    /// Import a root filesystem tarball from a URL or a local file
    Import {
        source: String,
        #[arg(long)]
        repo: Option<String>,
        #[arg(long)]
        tag: Option<String>,
    },
    /// Build an image from a context directory
    Build {
        context: PathBuf,
        #[arg(long)]
        tag: Option<String>,
    },
    /// Demultiplex a captured log stream file onto stdout and stderr
    Demux { file: PathBuf },
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        if self.verbose && self.quiet {
            return Err(DockerError::Configuration(
                "--verbose and --quiet cannot be combined".to_string(),
            ));
        }

        if let Some(timeout) = self.timeout {
            ValidationErrorHandler::validate_timeout(timeout)?;
        }

        match &self.command {
            Command::Build { context, .. } => {
                ValidationErrorHandler::validate_directory(&context.to_string_lossy())
            }
            Command::Demux { file } if !file.is_file() => Err(DockerError::Configuration(format!(
                "Stream file does not exist: {}",
                file.display()
            ))),
            _ => Ok(()),
        }
    }
}
