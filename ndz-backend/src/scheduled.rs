//! Poll scheduler
//!
//! Drives reconciliation cycles at a fixed interval from a single task.
//! The task awaits each cycle before taking the next tick, so two cycles
//! never run at the same time; ticks that fall due during a slow cycle are
//! skipped rather than queued up.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::FeedConfig;
use crate::engine::{CycleReport, CycleRunner};
use crate::error::{NdzError, Result};

/// Configuration for the polling task
#[derive(Debug, Clone)]
pub struct ScheduledTaskConfig {
    /// Time between cycle starts
    pub poll_interval: Duration,

    /// A cycle running longer than this is abandoned
    pub cycle_timeout: Duration,

    /// Perform the first cycle immediately
    pub perform_initial_update: bool,
}

impl Default for ScheduledTaskConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            cycle_timeout: Duration::from_secs(60),
            perform_initial_update: true,
        }
    }
}

impl From<&FeedConfig> for ScheduledTaskConfig {
    fn from(feed: &FeedConfig) -> Self {
        Self {
            poll_interval: feed.poll_interval(),
            cycle_timeout: feed.cycle_timeout(),
            perform_initial_update: feed.initial_poll,
        }
    }
}

/// Scheduled task manager
pub struct ScheduledTaskManager {
    config: ScheduledTaskConfig,
    task_handles: Vec<JoinHandle<()>>,
}

impl ScheduledTaskManager {
    pub fn new(config: ScheduledTaskConfig) -> Self {
        Self {
            config,
            task_handles: Vec::new(),
        }
    }

    /// Move `runner` into the polling task and start it.
    pub fn start_polling(&mut self, runner: CycleRunner) {
        tracing::info!(
            "Scheduling poll task (interval: {:?}, cycle timeout: {:?}, initial: {})",
            self.config.poll_interval,
            self.config.cycle_timeout,
            self.config.perform_initial_update
        );

        let config = self.config.clone();
        let handle = tokio::spawn(async move {
            Self::poll_loop(runner, config).await;
        });
        self.task_handles.push(handle);
    }

    async fn poll_loop(mut runner: CycleRunner, config: ScheduledTaskConfig) {
        let mut ticker = interval(config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // The first tick completes immediately.
        if !config.perform_initial_update {
            ticker.tick().await;
        }

        loop {
            ticker.tick().await;

            if let Err(e) = Self::run_cycle(&mut runner, config.cycle_timeout).await {
                runner.record_failure(&e).await;
            }
        }
    }

    /// Run a single cycle, bounded by `timeout`
    pub async fn run_cycle(runner: &mut CycleRunner, timeout: Duration) -> Result<CycleReport> {
        match tokio::time::timeout(timeout, runner.run_cycle()).await {
            Ok(result) => result,
            Err(_) => Err(NdzError::CycleTimeout(timeout)),
        }
    }

    pub fn task_count(&self) -> usize {
        self.task_handles.len()
    }

    /// Stop all tasks. A cycle in flight is dropped and its result discarded.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down scheduled task manager...");

        for handle in self.task_handles {
            handle.abort();
        }

        tracing::info!("All scheduled tasks stopped");
    }
}
