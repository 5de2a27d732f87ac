//! Turning panics in lifecycle calls into logged errors.
//!
//! With `log_stack_traces` enabled, a panic inside a resource operation is
//! caught, its message and backtrace are appended to the stack trace file,
//! and the operation fails with an error instead of taking the provider
//! down. Without it panics propagate as usual.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fs::OpenOptions;
use std::future::Future;
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Once;

use futures::FutureExt;
use tracing::error;

use crate::config::ProviderConfig;
use crate::error::{ProviderError, Result};

thread_local! {
    static LAST_BACKTRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Capture the backtrace of every panic on the panicking thread, then
/// defer to the previously installed hook.
fn install_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let trace = Backtrace::force_capture().to_string();
            LAST_BACKTRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Catches panics and logs them to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicRecovery {
    file_path: PathBuf,
}

impl PanicRecovery {
    /// Recovery writing to `file_path`.
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        install_hook();
        Self {
            file_path: file_path.into(),
        }
    }

    /// Recovery for a configuration, if `log_stack_traces` is on.
    pub fn from_config(config: &ProviderConfig) -> Option<Self> {
        config
            .log_stack_traces
            .then(|| Self::new(&config.log_stack_traces_file_path))
    }

    /// Stack trace file.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Run `fut`, converting a panic into an error.
    pub async fn run<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                let trace = LAST_BACKTRACE
                    .with(|slot| slot.borrow_mut().take())
                    .unwrap_or_else(|| Backtrace::force_capture().to_string());
                error!(operation, panic = %message, "recovered from panic");

                if let Err(e) = self.write_report(operation, &message, &trace) {
                    error!(path = %self.file_path.display(), "failed to write stack trace: {}", e);
                }
                Err(ProviderError::Sdk(format!(
                    "{} panicked: {}. Stack trace logged to {}",
                    operation,
                    message,
                    self.file_path.display()
                )))
            },
        }
    }

    fn write_report(&self, operation: &str, message: &str, trace: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "panic in {}: {}", operation, message)?;
        writeln!(file, "{}", trace)?;
        file.flush()
    }
}

/// Run `fut` under `recovery` when there is one.
pub async fn recover<T, F>(recovery: Option<&PanicRecovery>, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match recovery {
        Some(recovery) => recovery.run(operation, fut).await,
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_panic_becomes_error_and_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genesyscloud_stack_traces.log");
        let recovery = PanicRecovery::new(&path);

        let result: Result<()> = recovery
            .run("create", async {
                let fail = true;
                if fail {
                    panic!("boom");
                }
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("create panicked: boom"));
        let logged = std::fs::read_to_string(&path).unwrap();
        assert!(logged.contains("panic in create: boom"));
    }

    #[tokio::test]
    async fn test_results_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let recovery = PanicRecovery::new(dir.path().join("traces.log"));

        let ok = recovery.run("read", async { Ok(7) }).await.unwrap();
        assert_eq!(ok, 7);

        let err = recover(Some(&recovery), "read", async {
            Err::<(), _>(ProviderError::NotFound("gone".into()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
        assert!(!dir.path().join("traces.log").exists());
    }

    #[test]
    fn test_panic_message_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let number: Box<dyn Any + Send> = Box::new(5);
        assert_eq!(panic_message(number.as_ref()), "unknown panic");
    }
}
