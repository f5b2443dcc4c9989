//! Log Agent Library
//!
//! A supervised background agent that harvests application log files and
//! ships new content to a collection backend over HTTP:
//!
//! - **agent**: the run loop (collect, push, back off, sleep, check liveness)
//! - **retry**: the shared push interval and its backoff rule
//! - **liveness**: ancestor process checks and signal latching
//! - **source** / **file_source**: log categories and the file-backed source
//! - **client**: HTTP transport
//! - **control**: the shared control block written by the master process
//! - **config**: environment-based configuration
//! - **telemetry**: tracing setup with a reloadable filter
//!
//! # Example
//!
//! ```no_run
//! use log_agent::agent::Agent;
//! use log_agent::client::HttpTransport;
//! use log_agent::config::Config;
//! use log_agent::file_source::FileLogSource;
//! use log_agent::liveness::{LivenessMonitor, NixProcessTable, ShutdownSignal};
//! use log_agent::retry::RetrySchedule;
//! use log_agent::source::LogSource;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let transport = HttpTransport::new(&config).expect("Failed to create transport");
//!
//!     let sources: Vec<Box<dyn LogSource>> = FileLogSource::all_from_config(&config)
//!         .into_iter()
//!         .map(|s| Box::new(s) as Box<dyn LogSource>)
//!         .collect();
//!
//!     let supervisor = nix::unistd::getppid().as_raw() as u32;
//!     let monitor = LivenessMonitor::new(None, supervisor, ShutdownSignal::new(), NixProcessTable);
//!
//!     let reason = Agent::new(sources, transport, RetrySchedule::from_config(&config), monitor)
//!         .run()
//!         .await;
//!     println!("stopped: {}", reason);
//! }
//! ```

pub mod agent;
pub mod client;
pub mod config;
pub mod control;
pub mod file_source;
pub mod liveness;
pub mod retry;
pub mod source;
pub mod telemetry;

// Re-export commonly used types at crate root for convenience
pub use agent::{Agent, CycleReport};
pub use client::{BackendResponse, HttpTransport, Transport, TransportError};
pub use config::{Config, ConfigError};
pub use control::{ControlBlock, ControlError, ControlState, FileControlState};
pub use file_source::{FileLogSource, SourceSettings, StatusSnapshot};
pub use liveness::{LivenessMonitor, NixProcessTable, ProcessTable, ShutdownSignal, StopReason};
pub use retry::{next_interval, RetrySchedule};
pub use source::{LogCategory, LogSource, SourceError, SourceState};
