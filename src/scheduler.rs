//! Recurring task execution.
//!
//! The provider core only knows two capabilities: a [`Scheduler`] turns a
//! [`ScheduleDefinition`] into a [`TaskRunner`], and a runner registers a
//! named function to be called on that schedule. [`TokioScheduler`] is the
//! in-process implementation used by the binary; tests swap in runners that
//! fire on demand.
//!
//! ## Guarantees of [`TokioScheduler`]
//!
//! * One task per id. Registering an id twice is a configuration error.
//! * Ticks of one task never overlap: each tick is awaited before the next
//!   one is considered, and ticks missed meanwhile are skipped.
//! * A tick that outlives the schedule's timeout is dropped (and with it the
//!   in-flight cycle) and the task waits for its next tick.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::ScheduleDefinition;
use crate::error::{ProviderError, Result};

/// The function a task runs on every tick.
pub type TaskFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// A named function handed to a [`TaskRunner`].
#[derive(Clone)]
pub struct TaskInvocation {
    pub id: String,
    pub func: TaskFn,
}

impl TaskInvocation {
    pub fn new(id: impl Into<String>, func: TaskFn) -> Self {
        Self { id: id.into(), func }
    }
}

impl fmt::Debug for TaskInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskInvocation")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Registers functions to run on a fixed recurrence.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, task: TaskInvocation) -> Result<()>;
}

/// Creates task runners from recurrence definitions.
pub trait Scheduler: Send + Sync {
    fn create_recurring_task(&self, schedule: ScheduleDefinition) -> Result<Arc<dyn TaskRunner>>;
}

// ---------------------------------------------------------------------------
// Tokio implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SchedulerState {
    task_ids: Mutex<HashSet<String>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Runs every registered task on its own tokio task.
#[derive(Clone, Default)]
pub struct TokioScheduler {
    state: Arc<SchedulerState>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop every task started by this scheduler. In-flight ticks are
    /// dropped at their next suspension point.
    pub async fn shutdown(&self) {
        let handles = std::mem::take(&mut *self.state.handles.lock().await);
        info!(tasks = handles.len(), "stopping scheduled tasks");
        for handle in handles {
            handle.abort();
        }
        self.state.task_ids.lock().await.clear();
    }
}

impl Scheduler for TokioScheduler {
    fn create_recurring_task(&self, schedule: ScheduleDefinition) -> Result<Arc<dyn TaskRunner>> {
        // `tokio::time::interval` panics on a zero period, inside the spawned
        // task where nobody would see it.
        schedule.validate()?;
        Ok(Arc::new(TokioTaskRunner {
            schedule,
            state: Arc::clone(&self.state),
        }))
    }
}

/// A runner bound to one [`ScheduleDefinition`]. Shares the task registry of
/// the [`TokioScheduler`] that created it.
pub struct TokioTaskRunner {
    schedule: ScheduleDefinition,
    state: Arc<SchedulerState>,
}

#[async_trait]
impl TaskRunner for TokioTaskRunner {
    async fn run(&self, task: TaskInvocation) -> Result<()> {
        if !self.state.task_ids.lock().await.insert(task.id.clone()) {
            return Err(ProviderError::config(format!(
                "a task with id {} is already scheduled",
                task.id
            )));
        }

        let schedule = self.schedule;
        let TaskInvocation { id, func } = task;
        info!(
            task_id = %id,
            frequency_ms = schedule.frequency.as_millis() as u64,
            timeout_ms = schedule.timeout.as_millis() as u64,
            "scheduling recurring task"
        );

        let handle = tokio::spawn(async move {
            if let Some(delay) = schedule.initial_delay {
                tokio::time::sleep(delay).await;
            }
            let mut interval = tokio::time::interval(schedule.frequency);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                debug!(task_id = %id, "running scheduled task");
                if tokio::time::timeout(schedule.timeout, func()).await.is_err() {
                    warn!(
                        task_id = %id,
                        timeout_ms = schedule.timeout.as_millis() as u64,
                        "scheduled task timed out; run abandoned"
                    );
                }
            }
        });
        self.state.handles.lock().await.push(handle);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// One-shot runner
// ---------------------------------------------------------------------------

/// Runs each registered function exactly once, inline, during registration.
///
/// Used for single-pass runs (`--once`) where no recurrence is wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateTaskRunner;

#[async_trait]
impl TaskRunner for ImmediateTaskRunner {
    async fn run(&self, task: TaskInvocation) -> Result<()> {
        debug!(task_id = %task.id, "running task once");
        (task.func)().await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_task(id: &str, counter: Arc<AtomicUsize>) -> TaskInvocation {
        TaskInvocation::new(
            id,
            Arc::new(move || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                .boxed()
            }),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn fires_immediately_then_on_every_interval() {
        let scheduler = TokioScheduler::new();
        let runner = scheduler
            .create_recurring_task(ScheduleDefinition::new(
                Duration::from_secs(60),
                Duration::from_secs(10),
            ))
            .unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        runner.run(counting_task("p:run", Arc::clone(&counter))).await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn initial_delay_postpones_first_tick() {
        let scheduler = TokioScheduler::new();
        let runner = scheduler
            .create_recurring_task(
                ScheduleDefinition::new(Duration::from_secs(60), Duration::from_secs(10))
                    .with_initial_delay(Duration::from_secs(30)),
            )
            .unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        runner.run(counting_task("p:run", Arc::clone(&counter))).await.unwrap();

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_tick_does_not_stop_the_task() {
        let scheduler = TokioScheduler::new();
        let runner = scheduler
            .create_recurring_task(ScheduleDefinition::new(
                Duration::from_secs(60),
                Duration::from_secs(5),
            ))
            .unwrap();
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let (s, f) = (Arc::clone(&started), Arc::clone(&finished));

        runner
            .run(TaskInvocation::new(
                "slow:run",
                Arc::new(move || {
                    let (s, f) = (Arc::clone(&s), Arc::clone(&f));
                    async move {
                        s.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        f.fetch_add(1, Ordering::SeqCst);
                    }
                    .boxed()
                }),
            ))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(started.load(Ordering::SeqCst), 2);
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn duplicate_task_id_is_rejected() {
        let scheduler = TokioScheduler::new();
        let schedule = ScheduleDefinition::new(Duration::from_secs(3600), Duration::from_secs(10));
        let a = scheduler.create_recurring_task(schedule).unwrap();
        let b = scheduler.create_recurring_task(schedule).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        a.run(counting_task("same:run", Arc::clone(&counter))).await.unwrap();
        let err = b
            .run(counting_task("same:run", Arc::clone(&counter)))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Configuration(_)));
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn zero_durations_are_rejected_before_spawning() {
        let scheduler = TokioScheduler::new();
        for schedule in [
            ScheduleDefinition::new(Duration::ZERO, Duration::from_secs(180)),
            ScheduleDefinition::new(Duration::from_secs(60), Duration::ZERO),
        ] {
            let err = scheduler.create_recurring_task(schedule).err();
            assert!(matches!(err, Some(ProviderError::Configuration(_))), "{schedule:?}");
        }
        assert!(scheduler.state.handles.lock().await.is_empty());
    }

    #[tokio::test]
    async fn immediate_runner_runs_once_inline() {
        let counter = Arc::new(AtomicUsize::new(0));
        ImmediateTaskRunner
            .run(counting_task("once:run", Arc::clone(&counter)))
            .await
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
