//! Diagnostic logging using tracing
//!
//! Library code logs through `tracing` macros; the binary installs a stderr
//! subscriber so diagnostics never mix with demultiplexed stdout.
//! `DOCKER_STREAM_LOG` overrides the level chosen from the flags.
//!
//! ```bash
//! DOCKER_STREAM_LOG=docker_stream=trace docker-stream logs web --follow
//! ```

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const LOG_ENV: &str = "DOCKER_STREAM_LOG";

pub fn default_directive(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else if verbose {
        "docker_stream=debug,warn"
    } else {
        "warn"
    }
}

/// Initialize the logging subsystem. Safe to call more than once.
pub fn init(verbose: bool, quiet: bool) {
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_thread_ids(false),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false, true), "error");
        assert_eq!(default_directive(true, true), "error");
        assert_eq!(default_directive(true, false), "docker_stream=debug,warn");
        assert_eq!(default_directive(false, false), "warn");
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init(false, true);
        init(true, false);
    }
}
