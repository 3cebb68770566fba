//! Background upkeep: advance event statuses and send reminders

use chrono::Duration;
use std::future::Future;
use tracing::{debug, error, info};
use crate::config::SchedulerConfig;
use crate::services::event::EventLifecycle;
use crate::utils::clock::SharedClock;
use crate::utils::errors::Result;

/// What one pass of the scheduler did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub status_changes: usize,
    pub reminders_sent: usize,
}

#[derive(Clone)]
pub struct Scheduler {
    events: EventLifecycle,
    clock: SharedClock,
    interval: std::time::Duration,
    reminder_lead: Duration,
}

impl Scheduler {
    pub fn new(events: EventLifecycle, clock: SharedClock, config: &SchedulerConfig) -> Self {
        Self {
            events,
            clock,
            interval: std::time::Duration::from_secs(config.status_refresh_seconds),
            reminder_lead: Duration::minutes(config.reminder_lead_minutes),
        }
    }

    /// One pass: refresh statuses, then remind
    pub async fn tick(&self) -> Result<TickReport> {
        let status_changes = self.events.refresh_all().await?;
        let reminders_sent = self.events.send_reminders(self.clock.now(), self.reminder_lead).await?;
        Ok(TickReport {
            status_changes,
            reminders_sent,
        })
    }

    /// Tick on a fixed interval until `shutdown` resolves. A failed pass is
    /// logged and the loop carries on.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        info!(interval_secs = self.interval.as_secs(), "Scheduler started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(report) => debug!(?report, "Scheduler pass completed"),
                        Err(e) => error!(error = %e, code = e.code(), "Scheduler pass failed"),
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }
}
