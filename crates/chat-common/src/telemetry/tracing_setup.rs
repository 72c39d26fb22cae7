//! Tracing and logging setup
//!
//! Configures the `tracing` subscriber with environment-based filtering.

use tracing::{Level, Subscriber};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::Environment;

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Fallback level when `RUST_LOG` is unset
    pub level: Level,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Include span events (new, close)
    pub span_events: bool,
    /// Include file and line numbers
    pub file_line: bool,
    pub thread_names: bool,
    /// Route output through the test harness capture
    pub test_writer: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json: false,
            span_events: false,
            file_line: true,
            thread_names: false,
            test_writer: false,
        }
    }
}

impl TracingConfig {
    /// Pick a configuration for the deployment environment
    #[must_use]
    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Production => Self {
                json: true,
                file_line: false,
                ..Self::default()
            },
            Environment::Staging => Self::default(),
            Environment::Development => Self {
                level: Level::DEBUG,
                span_events: true,
                thread_names: true,
                ..Self::default()
            },
        }
    }

    /// Quiet output captured by the test harness
    #[must_use]
    pub fn test() -> Self {
        Self {
            level: Level::WARN,
            test_writer: true,
            ..Self::default()
        }
    }

    fn fmt_layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        let span_events = if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let layer = fmt::layer()
            .with_file(self.file_line)
            .with_line_number(self.file_line)
            .with_thread_names(self.thread_names)
            .with_span_events(span_events);

        match (self.json, self.test_writer) {
            (true, true) => layer.json().with_test_writer().boxed(),
            (true, false) => layer.json().boxed(),
            (false, true) => layer.with_test_writer().boxed(),
            (false, false) => layer.boxed(),
        }
    }
}

/// Initialize tracing, ignoring a subscriber that is already installed
///
/// Uses `RUST_LOG` for filtering if set, otherwise the configured level.
pub fn init_tracing(config: TracingConfig) {
    if try_init_tracing(config).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Try to initialize tracing with the given configuration
pub fn try_init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(config.fmt_layer())
        .try_init()
        .map_err(|_| TracingError::AlreadyInitialized)
}

/// Tracing initialization errors
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,
}
