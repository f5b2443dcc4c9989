//! Agent run loop.
//!
//! Each cycle walks every log source in declared order, pushes pending
//! content, and feeds every push outcome into the single shared
//! [`RetrySchedule`]. The cycle is followed by a sleep of the scheduled
//! number of one-second ticks; liveness is checked after every tick, and a
//! stop verdict ends the loop without starting another cycle.

use std::time::Duration;

use tracing::{debug, info};

use crate::client::{push_logs, Transport};
use crate::control::ControlState;
use crate::liveness::{Liveness, LivenessMonitor, ProcessTable, StopReason};
use crate::retry::RetrySchedule;
use crate::source::{LogCategory, LogSource};
use crate::telemetry::LogLevelHandle;

/// Length of one sleep tick.
const TICK: Duration = Duration::from_secs(1);

/// What happened to the sources during one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Pushes accepted by the backend
    pub pushed: usize,

    /// Pushes that failed
    pub failed: usize,

    /// Sources with nothing new to send
    pub idle: usize,

    /// Sources skipped because collection is off or the file is missing
    pub inactive: usize,

    /// Sources skipped because they are in the failed state
    pub errored: usize,
}

/// The log shipping agent.
pub struct Agent<T, P> {
    sources: Vec<Box<dyn LogSource>>,
    transport: T,
    schedule: RetrySchedule,
    monitor: LivenessMonitor<P>,
    control: Option<Box<dyn ControlState>>,
    static_disabled: Vec<LogCategory>,
    log_level: Option<LogLevelHandle>,
    startup_delay: Duration,
}

impl<T: Transport, P: ProcessTable> Agent<T, P> {
    pub fn new(
        sources: Vec<Box<dyn LogSource>>,
        transport: T,
        schedule: RetrySchedule,
        monitor: LivenessMonitor<P>,
    ) -> Self {
        Self {
            sources,
            transport,
            schedule,
            monitor,
            control: None,
            static_disabled: Vec::new(),
            log_level: None,
            startup_delay: Duration::ZERO,
        }
    }

    /// Re-read `control` before every cycle. Categories in `static_disabled`
    /// stay off whatever the control block says.
    pub fn with_control(
        mut self,
        control: Box<dyn ControlState>,
        static_disabled: Vec<LogCategory>,
    ) -> Self {
        self.control = Some(control);
        self.static_disabled = static_disabled;
        self
    }

    pub fn with_log_level(mut self, handle: LogLevelHandle) -> Self {
        self.log_level = Some(handle);
        self
    }

    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    /// Run until the liveness monitor says stop.
    pub async fn run(mut self) -> StopReason {
        info!(
            sources = self.sources.len(),
            base_interval_secs = self.schedule.base_secs(),
            "Log agent started"
        );
        tokio::time::sleep(self.startup_delay).await;

        loop {
            self.refresh_runtime_settings();

            let report = self.collect_once().await;
            debug!(
                pushed = report.pushed,
                failed = report.failed,
                idle = report.idle,
                inactive = report.inactive,
                errored = report.errored,
                interval_secs = self.schedule.current_secs(),
                "Collection cycle finished"
            );

            if let Some(reason) = self.sleep_phase().await {
                info!(reason = %reason, "Log agent stopping");
                return reason;
            }
        }
    }

    /// Best-effort refresh of log level and per-category switches.
    pub fn refresh_runtime_settings(&mut self) {
        let Some(control) = &self.control else {
            return;
        };
        let block = match control.read() {
            Ok(block) => block,
            Err(e) => {
                debug!(error = %e, "Control block unavailable, keeping current settings");
                return;
            }
        };

        if let (Some(handle), Some(level)) = (&self.log_level, block.log_level.as_deref()) {
            handle.apply(level);
        }

        for source in self.sources.iter_mut() {
            if source.has_error() {
                continue;
            }
            let category = source.category();
            let enabled = !self.static_disabled.contains(&category) && !block.is_disabled(category);
            source.set_collect_enable(enabled);
        }
    }

    /// Run one collection pass over all sources.
    pub async fn collect_once(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        for source in self.sources.iter_mut() {
            if source.has_error() {
                report.errored += 1;
                continue;
            }

            // Decided before reading so the old file's tail is shipped first.
            let rotate_due = source.need_rotate();

            if source.get_collect_enable() && source.get_active_log_file_path().exists() {
                source.determine_read_position();
                let url = source.get_complete_url();

                match source.get_post_body() {
                    Some(body) => {
                        let success = push_logs(&self.transport, &url, body).await;
                        if success {
                            source.commit_read_position();
                            source.commit_last_push_time();
                            source.persist_status_snapshot();
                            report.pushed += 1;
                        } else {
                            report.failed += 1;
                        }
                        let interval = self.schedule.record(success);
                        debug!(
                            category = %source.category(),
                            success = success,
                            interval_secs = interval,
                            "Push interval updated"
                        );
                    }
                    None => report.idle += 1,
                }
            } else {
                report.inactive += 1;
            }

            source.handle_rotation(rotate_due);
        }

        report
    }

    /// Sleep the scheduled number of ticks, checking liveness after each.
    async fn sleep_phase(&self) -> Option<StopReason> {
        for _ in 0..self.schedule.current_secs() {
            tokio::time::sleep(TICK).await;
            if let Liveness::Stop(reason) = self.monitor.check() {
                return Some(reason);
            }
        }
        None
    }
}
