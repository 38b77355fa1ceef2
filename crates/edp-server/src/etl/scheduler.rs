//! Scheduler state machine
//!
//! Owns the daily trigger and the process-wide `executing` gate. At most one
//! pipeline run is in flight at any time; every firing, scheduled or manual,
//! records exactly one outcome in a bounded most-recent-first history.
//!
//! Disarming the trigger never interrupts a run already in flight: scheduled
//! firings execute in their own task, so aborting the timer only prevents
//! future firings.

use anyhow::Context;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use serde::Serialize;
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::error::{EtlError, EtlResult};
use super::models::{RunOutcome, TriggerKind};
use super::orchestrator::Pipeline;
use crate::config::SchedulerConfig;

/// Pure read of the scheduler state.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub armed: bool,
    pub executing: bool,
    pub next_run: Option<DateTime<Utc>>,
    pub recent: Vec<RunOutcome>,
}

/// Scheduler over the pipeline: daily trigger, manual trigger, run history.
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

struct SchedulerInner {
    pipeline: Pipeline,
    config: SchedulerConfig,
    schedule: Schedule,
    executing: Arc<AtomicBool>,
    history: Mutex<VecDeque<RunOutcome>>,
}

/// Scoped hold on the `executing` gate; releases on every exit path.
struct RunGuard {
    gate: Arc<AtomicBool>,
}

impl RunGuard {
    fn try_acquire(gate: &Arc<AtomicBool>) -> Option<Self> {
        gate.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self {
                gate: Arc::clone(gate),
            })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.gate.store(false, Ordering::SeqCst);
    }
}

impl Scheduler {
    /// Build a scheduler for a daily `HH:MM` trigger in the configured
    /// timezone.
    pub fn new(pipeline: Pipeline, config: SchedulerConfig) -> anyhow::Result<Self> {
        let expression = format!("0 {} {} * * *", config.minute, config.hour);
        let schedule = Schedule::from_str(&expression).with_context(|| {
            format!("Invalid daily schedule {:02}:{:02}", config.hour, config.minute)
        })?;

        Ok(Self {
            inner: Arc::new(SchedulerInner {
                pipeline,
                config,
                schedule,
                executing: Arc::new(AtomicBool::new(false)),
                history: Mutex::new(VecDeque::new()),
            }),
            timer: Mutex::new(None),
        })
    }

    /// Trigger a manual run. The recorded outcome is returned as data for
    /// both success and failure; only a concurrent run is an error, so a
    /// human caller always gets explicit feedback.
    pub async fn run_now(&self) -> EtlResult<RunOutcome> {
        let Some(guard) = RunGuard::try_acquire(&self.inner.executing) else {
            return Err(EtlError::AlreadyRunning);
        };

        info!("Manual pipeline trigger accepted");
        Ok(self.inner.fire(TriggerKind::Manual, guard).await)
    }

    /// Arm the daily trigger. Idempotent: arming while armed is a no-op.
    pub fn start(&self) {
        let mut timer = lock(&self.timer);

        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            info!("Scheduler already armed; ignoring start");
            return;
        }

        let inner = Arc::clone(&self.inner);
        *timer = Some(tokio::spawn(timer_loop(inner)));
        info!(
            hour = self.inner.config.hour,
            minute = self.inner.config.minute,
            timezone = %self.inner.config.timezone,
            "Scheduler armed"
        );
    }

    /// Disarm the daily trigger. Idempotent; never cancels a run in flight.
    pub fn stop(&self) {
        let mut timer = lock(&self.timer);

        match timer.take() {
            Some(handle) => {
                handle.abort();
                info!("Scheduler disarmed");
            },
            None => info!("Scheduler already stopped; ignoring stop"),
        }
    }

    /// Whether the daily trigger is registered.
    pub fn is_armed(&self) -> bool {
        lock(&self.timer)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Whether a pipeline run is currently in flight.
    pub fn is_executing(&self) -> bool {
        self.inner.executing.load(Ordering::SeqCst)
    }

    /// Next occurrence of the daily trigger; informational only.
    pub fn next_scheduled_run(&self) -> Option<DateTime<Utc>> {
        self.inner
            .next_occurrence()
            .map(|at| at.with_timezone(&Utc))
    }

    /// Snapshot of the scheduler state with a capped view of recent
    /// outcomes.
    pub fn status(&self) -> SchedulerStatus {
        let history = lock(&self.inner.history);
        SchedulerStatus {
            armed: self.is_armed(),
            executing: self.is_executing(),
            next_run: self.next_scheduled_run(),
            recent: history
                .iter()
                .take(self.inner.config.status_history_cap)
                .cloned()
                .collect(),
        }
    }

    /// Full recorded history, most recent first.
    pub fn history(&self) -> Vec<RunOutcome> {
        lock(&self.inner.history).iter().cloned().collect()
    }
}

impl SchedulerInner {
    fn next_occurrence(&self) -> Option<DateTime<Tz>> {
        self.schedule.upcoming(self.config.timezone).next()
    }

    /// Execute one firing while holding the gate guard and record exactly
    /// one outcome.
    async fn fire(&self, trigger: TriggerKind, guard: RunGuard) -> RunOutcome {
        let timestamp = Utc::now();
        let started = std::time::Instant::now();

        let outcome = match self.pipeline.run_once().await {
            Ok(report) => RunOutcome {
                timestamp,
                success: true,
                duration_ms: report.duration_ms,
                records_loaded: Some(report.loaded),
                error: None,
                trigger,
            },
            Err(err) => {
                error!(error = %err, %trigger, "Pipeline run failed");
                RunOutcome {
                    timestamp,
                    success: false,
                    duration_ms: started.elapsed().as_millis() as u64,
                    records_loaded: None,
                    error: Some(err.to_string()),
                    trigger,
                }
            },
        };

        self.record(outcome.clone());
        drop(guard);
        outcome
    }

    fn record(&self, outcome: RunOutcome) {
        let mut history = lock(&self.history);
        history.push_front(outcome);
        history.truncate(self.config.history_cap);
    }
}

/// Timer task: sleep until the next daily occurrence, then fire. Firings run
/// in their own task so disarming never cancels a run in flight; a firing
/// that finds the gate held is skipped silently.
async fn timer_loop(inner: Arc<SchedulerInner>) {
    loop {
        let Some(next) = inner.next_occurrence() else {
            warn!("Schedule yields no upcoming occurrence; timer exiting");
            return;
        };

        let wait = (next.with_timezone(&Utc) - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        debug!(next = %next, wait_secs = wait.as_secs(), "Sleeping until next scheduled run");
        tokio::time::sleep(wait).await;

        match RunGuard::try_acquire(&inner.executing) {
            Some(guard) => {
                let inner = Arc::clone(&inner);
                tokio::spawn(async move {
                    inner.fire(TriggerKind::Scheduled, guard).await;
                });
            },
            None => info!("Scheduled firing skipped: a run is already in flight"),
        }

        // Settle past the fired occurrence so the same minute is not fired
        // twice.
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

/// Lock a mutex, recovering the data on poisoning.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_guard_is_exclusive_and_releases_on_drop() {
        let gate = Arc::new(AtomicBool::new(false));

        let guard = RunGuard::try_acquire(&gate).unwrap();
        assert!(RunGuard::try_acquire(&gate).is_none());

        drop(guard);
        assert!(RunGuard::try_acquire(&gate).is_some());
    }
}
