//! Logging and tracing setup for the provider.
//!
//! All logs are written to **stderr**, filtered by `RUST_LOG`. Request and
//! response events of the platform client use the [`SDK_DEBUG_TARGET`]
//! target; once the provider is configured with `sdk_debug = true` they are
//! also appended to the SDK debug file in the configured format.
//!
//! # Quick Start
//!
//! ```ignore
//! use genesyscloud_provider::{init_logging, GenesysCloudProvider};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Initialize logging (reads RUST_LOG env var)
//!     init_logging();
//!
//!     tracing::info!("Starting provider");
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `debug`, `genesyscloud_provider=debug`)

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::Subscriber;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

use crate::config::{DebugFormat, SdkDebugConfig};
use crate::error::{ProviderError, Result};

/// Target of request/response events written to the SDK debug file.
pub const SDK_DEBUG_TARGET: &str = "sdk_debug";

/// Destination of SDK debug events, switched on at configure time.
#[derive(Debug, Clone, Default)]
pub struct SdkDebugSink {
    file: Arc<Mutex<Option<(DebugFormat, File)>>>,
}

impl SdkDebugSink {
    /// Start or stop writing SDK debug events.
    pub fn install(&self, config: &SdkDebugConfig) -> Result<()> {
        let next = if config.enabled {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&config.file_path)
                .map_err(|e| {
                    ProviderError::Configuration(format!(
                        "failed to open SDK debug log {}: {}",
                        config.file_path.display(),
                        e
                    ))
                })?;
            Some((config.format, file))
        } else {
            None
        };

        let mut guard = self
            .file
            .lock()
            .map_err(|_| ProviderError::Sdk("SDK debug log lock poisoned".to_string()))?;
        *guard = next;
        Ok(())
    }

    /// Writer for events rendered in `format`.
    pub fn writer(&self, format: DebugFormat) -> SdkDebugWriter {
        SdkDebugWriter {
            sink: self.clone(),
            format,
        }
    }

    /// Whether a file is currently open.
    pub fn is_active(&self) -> bool {
        self.file.lock().map(|g| g.is_some()).unwrap_or(false)
    }
}

/// Writes to the SDK debug file when it is open in the same format.
#[derive(Debug, Clone)]
pub struct SdkDebugWriter {
    sink: SdkDebugSink,
    format: DebugFormat,
}

impl Write for SdkDebugWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .sink
            .file
            .lock()
            .map_err(|_| io::Error::other("SDK debug log lock poisoned"))?;
        if let Some((format, file)) = guard.as_mut() {
            if *format == self.format {
                file.write_all(buf)?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .sink
            .file
            .lock()
            .map_err(|_| io::Error::other("SDK debug log lock poisoned"))?;
        match guard.as_mut() {
            Some((_, file)) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for SdkDebugWriter {
    type Writer = SdkDebugWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// The process-wide SDK debug sink used by [`init_logging`].
pub fn sdk_debug_sink() -> &'static SdkDebugSink {
    static SINK: OnceLock<SdkDebugSink> = OnceLock::new();
    SINK.get_or_init(SdkDebugSink::default)
}

/// Layers writing [`SDK_DEBUG_TARGET`] events to `sink`, one per format.
pub fn sdk_debug_layer<S>(sink: &SdkDebugSink) -> impl Layer<S> + Send + Sync + 'static
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let text = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(sink.writer(DebugFormat::Text))
        .with_filter(filter_fn(|meta| meta.target() == SDK_DEBUG_TARGET));
    let json = fmt::layer()
        .json()
        .with_current_span(false)
        .with_writer(sink.writer(DebugFormat::Json))
        .with_filter(filter_fn(|meta| meta.target() == SDK_DEBUG_TARGET));
    text.and_then(json)
}

fn subscriber(default_level: &str) -> impl Subscriber + Send + Sync + 'static {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_filter(filter),
        )
        .with(sdk_debug_layer(sdk_debug_sink()))
}

/// Initialize the default logging subscriber.
///
/// This sets up a `tracing` subscriber that:
/// - Writes to **stderr**
/// - Respects the `RUST_LOG` environment variable for filtering
/// - Defaults to `info` level if `RUST_LOG` is not set
/// - Forwards SDK debug events to the SDK debug file once it is installed
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    subscriber("info").init();
}

/// Initialize logging with a custom default level.
///
/// Like [`init_logging`], but allows specifying a default log level
/// that will be used if `RUST_LOG` is not set.
///
/// ```ignore
/// use genesyscloud_provider::init_logging_with_default;
///
/// // Default to debug level if RUST_LOG is not set
/// init_logging_with_default("debug");
/// ```
pub fn init_logging_with_default(default_level: &str) {
    subscriber(default_level).init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Unlike [`init_logging`], this function does not panic if a subscriber
/// has already been set.
pub fn try_init_logging() -> bool {
    subscriber("info").try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn debug_config(path: &Path, format: DebugFormat) -> SdkDebugConfig {
        SdkDebugConfig {
            enabled: true,
            format,
            file_path: path.to_path_buf(),
        }
    }

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("genesyscloud_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,sdk_debug=debug").is_ok());
    }

    #[test]
    fn test_sink_writes_only_matching_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sdk_debug.log");
        let sink = SdkDebugSink::default();
        sink.install(&debug_config(&path, DebugFormat::Json)).unwrap();
        assert!(sink.is_active());

        sink.writer(DebugFormat::Text).write_all(b"text line\n").unwrap();
        sink.writer(DebugFormat::Json).write_all(b"{\"a\":1}\n").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "{\"a\":1}\n");
    }

    #[test]
    fn test_disabled_sink_discards() {
        let sink = SdkDebugSink::default();
        sink.install(&SdkDebugConfig {
            enabled: false,
            format: DebugFormat::Text,
            file_path: "unused.log".into(),
        })
        .unwrap();
        assert!(!sink.is_active());
        assert_eq!(sink.writer(DebugFormat::Text).write(b"dropped").unwrap(), 7);
    }

    #[test]
    fn test_sdk_debug_events_reach_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sdk_debug.log");
        let sink = SdkDebugSink::default();
        sink.install(&debug_config(&path, DebugFormat::Text)).unwrap();

        let subscriber = tracing_subscriber::registry().with(sdk_debug_layer(&sink));
        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(target: SDK_DEBUG_TARGET, status = 200, "response");
            tracing::info!("not an sdk event");
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("response"));
        assert!(contents.contains("status=200"));
        assert!(!contents.contains("not an sdk event"));
    }

    #[test]
    fn test_unwritable_path_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SdkDebugSink::default();
        let err = sink
            .install(&debug_config(&dir.path().join("missing/dir/x.log"), DebugFormat::Text))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }
}
