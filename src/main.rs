//! Log Agent - ships application logs to the collection backend
//!
//! Runs as a child of a supervisor process, itself started by a master
//! process. The agent polls the log directories, pushes new lines over HTTP,
//! backs off while the backend is failing, and exits with status 0 as soon
//! as either ancestor dies or SIGTERM/SIGINT arrives.
//!
//! ## Configuration
//!
//! See [`log_agent::config::Config`] for the `LOG_AGENT_*` environment
//! variables. `RUST_LOG` sets the initial log filter (default: info); the
//! control block may change it at runtime.

use nix::unistd::getppid;
use tracing::{error, info};

use log_agent::agent::Agent;
use log_agent::client::HttpTransport;
use log_agent::config::Config;
use log_agent::control::{ControlState, FileControlState};
use log_agent::file_source::FileLogSource;
use log_agent::liveness::{spawn_signal_listener, LivenessMonitor, NixProcessTable, ShutdownSignal};
use log_agent::retry::RetrySchedule;
use log_agent::source::LogSource;
use log_agent::telemetry::init_tracing;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let log_level = init_tracing();

    // Captured before anything else so a re-parented agent notices.
    let supervisor_pid = getppid().as_raw() as u32;

    info!(log_filter = %log_level.current(), "Starting log agent...");

    let config = match Config::from_env() {
        Ok(config) => {
            info!(
                backend_url = %config.backend_url,
                log_root = %config.log_root.display(),
                push_interval_secs = config.push_interval.as_secs(),
                max_interval_secs = config.max_interval.as_secs(),
                "Configuration loaded"
            );
            config
        }
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let shutdown = ShutdownSignal::new();
    if let Err(e) = spawn_signal_listener(shutdown.clone()) {
        error!(error = %e, "Failed to install signal handlers");
        std::process::exit(1);
    }

    let transport = match HttpTransport::new(&config) {
        Ok(transport) => {
            info!(
                timeout_secs = transport.timeout().as_secs(),
                "HTTP transport initialized"
            );
            transport
        }
        Err(e) => {
            error!(error = %e, "Failed to create HTTP transport");
            std::process::exit(1);
        }
    };

    let control = config.control_file.clone().map(FileControlState::new);
    let master_pid = control
        .as_ref()
        .and_then(|c| c.master_pid())
        .or(config.master_pid);

    let sources: Vec<Box<dyn LogSource>> = FileLogSource::all_from_config(&config)
        .into_iter()
        .map(|source| {
            info!(
                category = %source.category(),
                file = %source.get_active_log_file_path().display(),
                offset = source.offset(),
                last_post_time = ?source.last_post_time(),
                failed = source.state().is_failed(),
                enabled = source.get_collect_enable(),
                "Log source ready"
            );
            Box::new(source) as Box<dyn LogSource>
        })
        .collect();

    let monitor = LivenessMonitor::new(master_pid, supervisor_pid, shutdown, NixProcessTable);

    let mut agent = Agent::new(
        sources,
        transport,
        RetrySchedule::from_config(&config),
        monitor,
    )
    .with_startup_delay(config.startup_delay)
    .with_log_level(log_level);

    if let Some(control) = control {
        agent = agent.with_control(Box::new(control), config.disabled_categories.clone());
    }

    let reason = agent.run().await;
    info!(reason = %reason, "Log agent stopped");
    std::process::exit(0);
}
