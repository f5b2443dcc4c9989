//! Tracing setup with a runtime-adjustable filter.

use std::sync::Mutex;

use tracing::{debug, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Handle used to swap the active log filter.
pub struct LogLevelHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    current: Mutex<String>,
}

impl LogLevelHandle {
    /// Apply a new filter directive.
    ///
    /// Returns `true` when the filter changed. Unchanged or unparsable
    /// directives leave the current filter in place.
    pub fn apply(&self, directive: &str) -> bool {
        let directive = directive.trim();
        if directive.is_empty() {
            return false;
        }

        let mut current = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *current == directive {
            return false;
        }

        let filter = match EnvFilter::try_new(directive) {
            Ok(filter) => filter,
            Err(e) => {
                warn!(directive = directive, error = %e, "Ignoring invalid log level");
                return false;
            }
        };

        match self.handle.reload(filter) {
            Ok(()) => {
                *current = directive.to_string();
                debug!(directive = directive, "Log level updated");
                true
            }
            Err(e) => {
                warn!(error = %e, "Cannot reload log filter");
                false
            }
        }
    }

    pub fn current(&self) -> String {
        match self.current.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Initialize the global subscriber.
///
/// The starting filter comes from `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() -> LogLevelHandle {
    let initial = std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|v| EnvFilter::try_new(v).is_ok())
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_new(&initial).unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();

    LogLevelHandle {
        handle,
        current: Mutex::new(initial),
    }
}
