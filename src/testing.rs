//! In-process fakes for the provider's collaborators. Test-only.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::ScheduleDefinition;
use crate::connection::{EntityProviderConnection, EntityProviderMutation};
use crate::error::Result;
use crate::scheduler::{Scheduler, TaskInvocation, TaskRunner};
use crate::source::EventTypeSource;

/// Serves queued fetch results in order; an empty batch once the queue is dry.
#[derive(Default)]
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<Vec<serde_json::Value>>>>,
    urls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new(responses: Vec<Result<Vec<serde_json::Value>>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            urls: Mutex::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.urls.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventTypeSource for ScriptedSource {
    async fn fetch(&self, base_url: &str) -> Result<Vec<serde_json::Value>> {
        self.urls.lock().unwrap().push(base_url.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Records every mutation; can be told to reject the next ones.
#[derive(Default)]
pub struct RecordingConnection {
    mutations: Mutex<Vec<EntityProviderMutation>>,
    failures_left: AtomicUsize,
}

impl RecordingConnection {
    pub fn failing(times: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(times),
            ..Self::default()
        }
    }

    pub fn mutations(&self) -> Vec<EntityProviderMutation> {
        self.mutations.lock().unwrap().clone()
    }
}

#[async_trait]
impl EntityProviderConnection for RecordingConnection {
    async fn apply_mutation(&self, mutation: EntityProviderMutation) -> anyhow::Result<()> {
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            anyhow::bail!("catalog rejected mutation");
        }
        self.mutations.lock().unwrap().push(mutation);
        Ok(())
    }
}

/// Keeps registered tasks and fires them only when asked.
#[derive(Default)]
pub struct ManualTaskRunner {
    tasks: Mutex<Vec<TaskInvocation>>,
}

impl ManualTaskRunner {
    pub fn task_ids(&self) -> Vec<String> {
        self.tasks.lock().unwrap().iter().map(|t| t.id.clone()).collect()
    }

    /// Run one tick of every registered task, in registration order.
    pub async fn tick(&self) {
        let tasks = self.tasks.lock().unwrap().clone();
        for task in tasks {
            (task.func)().await;
        }
    }
}

#[async_trait]
impl TaskRunner for ManualTaskRunner {
    async fn run(&self, task: TaskInvocation) -> Result<()> {
        self.tasks.lock().unwrap().push(task);
        Ok(())
    }
}

/// Hands out a fresh [`ManualTaskRunner`] per schedule and remembers them.
#[derive(Default)]
pub struct RecordingScheduler {
    created: Mutex<Vec<(ScheduleDefinition, Arc<ManualTaskRunner>)>>,
}

impl RecordingScheduler {
    pub fn created(&self) -> Vec<(ScheduleDefinition, Arc<ManualTaskRunner>)> {
        self.created.lock().unwrap().clone()
    }
}

impl Scheduler for RecordingScheduler {
    fn create_recurring_task(&self, schedule: ScheduleDefinition) -> Result<Arc<dyn TaskRunner>> {
        let runner = Arc::new(ManualTaskRunner::default());
        self.created
            .lock()
            .unwrap()
            .push((schedule, Arc::clone(&runner)));
        Ok(runner)
    }
}
