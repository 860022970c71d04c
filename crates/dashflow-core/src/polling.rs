//! Polling scheduler
//!
//! One timer task per registered poll. A task is created stopped; starting it
//! arms a timer only while the global switch is on, so toggling the switch
//! never loses per-task state. Each tick spawns the callback detached:
//! stopping a task or the global switch prevents new runs but never cancels
//! one already in flight.

use crate::error::PollingError;
use chrono::{DateTime, Utc};
use dashflow_types::{ComponentId, TaskId};
use dashmap::DashMap;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Work run on every tick
pub type PollCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Scheduler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    /// Shorter intervals are raised to this
    pub min_interval_ms: u64,
    /// Global switch state at startup
    pub global_enabled: bool,
    /// Delay before reconnecting a dropped socket trigger
    pub socket_retry_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            min_interval_ms: 2000,
            global_enabled: true,
            socket_retry_ms: 5000,
        }
    }
}

impl PollingSettings {
    #[must_use]
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

/// What to schedule
#[derive(Clone)]
pub struct PollingTaskSpec {
    pub component_id: ComponentId,
    pub interval: Duration,
    /// Fire once as soon as the timer is armed
    pub immediate: bool,
    pub callback: PollCallback,
}

impl std::fmt::Debug for PollingTaskSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingTaskSpec")
            .field("component_id", &self.component_id)
            .field("interval", &self.interval)
            .field("immediate", &self.immediate)
            .finish_non_exhaustive()
    }
}

impl PollingTaskSpec {
    pub fn new<F, Fut>(component_id: impl Into<ComponentId>, interval: Duration, callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            component_id: component_id.into(),
            interval,
            immediate: false,
            callback: Arc::new(move || Box::pin(callback())),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }
}

/// Snapshot of one task
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingTaskInfo {
    pub id: TaskId,
    pub component_id: ComponentId,
    pub interval_ms: u64,
    pub immediate: bool,
    /// Started by the caller
    pub running: bool,
    /// Timer currently armed
    pub armed: bool,
    pub executions: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Scheduler statistics
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollingStatistics {
    pub total_tasks: usize,
    pub running_tasks: usize,
    pub global_enabled: bool,
    pub average_interval_ms: u64,
    pub min_interval_ms: Option<u64>,
    pub total_executions: u64,
}

struct PollingTask {
    component_id: ComponentId,
    interval: Duration,
    immediate: bool,
    callback: PollCallback,
    running: bool,
    timer: Option<JoinHandle<()>>,
    executions: Arc<AtomicU64>,
    last_run: Arc<Mutex<Option<DateTime<Utc>>>>,
    created_at: DateTime<Utc>,
}

impl PollingTask {
    fn arm(&mut self, id: TaskId) {
        if self.timer.is_some() {
            return;
        }
        let callback = Arc::clone(&self.callback);
        let executions = Arc::clone(&self.executions);
        let last_run = Arc::clone(&self.last_run);
        let interval = self.interval;
        let start = if self.immediate {
            Instant::now()
        } else {
            Instant::now() + interval
        };

        self.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                executions.fetch_add(1, Ordering::Relaxed);
                *last_run.lock() = Some(Utc::now());
                debug!(task_id = %id, "Polling tick");
                tokio::spawn(callback());
            }
        }));
    }

    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn info(&self, id: TaskId) -> PollingTaskInfo {
        PollingTaskInfo {
            id,
            component_id: self.component_id.clone(),
            interval_ms: millis(self.interval),
            immediate: self.immediate,
            running: self.running,
            armed: self.timer.is_some(),
            executions: self.executions.load(Ordering::Relaxed),
            last_run: *self.last_run.lock(),
            created_at: self.created_at,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Timer-driven re-execution of widget pipelines
///
/// Arming timers spawns Tokio tasks, so `start_task` and
/// `enable_global_polling` must be called within a Tokio runtime.
pub struct PollingScheduler {
    settings: PollingSettings,
    tasks: DashMap<TaskId, PollingTask>,
    global_enabled: AtomicBool,
}

impl std::fmt::Debug for PollingScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingScheduler")
            .field("tasks", &self.tasks.len())
            .field("global_enabled", &self.is_global_enabled())
            .finish()
    }
}

impl Default for PollingScheduler {
    fn default() -> Self {
        Self::new(PollingSettings::default())
    }
}

impl PollingScheduler {
    #[must_use]
    pub fn new(settings: PollingSettings) -> Self {
        let global_enabled = AtomicBool::new(settings.global_enabled);
        Self {
            settings,
            tasks: DashMap::new(),
            global_enabled,
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &PollingSettings {
        &self.settings
    }

    /// Register a stopped task; intervals below the minimum are raised
    pub fn add_task(&self, spec: PollingTaskSpec) -> TaskId {
        let id = TaskId::new();
        let interval = spec
            .interval
            .max(Duration::from_millis(self.settings.min_interval_ms))
            .max(Duration::from_millis(1));
        debug!(
            task_id = %id,
            component_id = %spec.component_id,
            interval_ms = millis(interval),
            "Polling task added"
        );
        self.tasks.insert(
            id,
            PollingTask {
                component_id: spec.component_id,
                interval,
                immediate: spec.immediate,
                callback: spec.callback,
                running: false,
                timer: None,
                executions: Arc::new(AtomicU64::new(0)),
                last_run: Arc::new(Mutex::new(None)),
                created_at: Utc::now(),
            },
        );
        id
    }

    /// Mark running and arm the timer if global polling is on
    ///
    /// # Errors
    /// [`PollingError::UnknownTask`]
    pub fn start_task(&self, id: TaskId) -> Result<(), PollingError> {
        let mut task = self.tasks.get_mut(&id).ok_or(PollingError::UnknownTask(id))?;
        task.running = true;
        if self.is_global_enabled() {
            task.arm(id);
        }
        Ok(())
    }

    /// Mark stopped and disarm; in-flight runs complete
    ///
    /// # Errors
    /// [`PollingError::UnknownTask`]
    pub fn stop_task(&self, id: TaskId) -> Result<(), PollingError> {
        let mut task = self.tasks.get_mut(&id).ok_or(PollingError::UnknownTask(id))?;
        task.running = false;
        task.disarm();
        Ok(())
    }

    pub fn remove_task(&self, id: TaskId) -> bool {
        match self.tasks.remove(&id) {
            Some((_, mut task)) => {
                task.disarm();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn tasks_for_component(&self, component: &str) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|task| task.component_id.as_str() == component)
            .map(|task| *task.key())
            .collect()
    }

    /// Remove every task of `component`, returning how many were removed
    pub fn remove_component_tasks(&self, component: &str) -> usize {
        self.tasks_for_component(component)
            .into_iter()
            .filter(|id| self.remove_task(*id))
            .count()
    }

    pub fn stop_all_tasks(&self) {
        for mut task in self.tasks.iter_mut() {
            task.running = false;
            task.disarm();
        }
    }

    /// Disarm and forget every task
    pub fn clear_all_tasks(&self) {
        let count = self.tasks.len();
        for mut task in self.tasks.iter_mut() {
            task.disarm();
        }
        self.tasks.clear();
        info!(tasks = count, "Cleared polling tasks");
    }

    /// Arm every running task
    pub fn enable_global_polling(&self) {
        self.global_enabled.store(true, Ordering::SeqCst);
        for mut task in self.tasks.iter_mut() {
            if task.running {
                let id = *task.key();
                task.arm(id);
            }
        }
        info!("Global polling enabled");
    }

    /// Disarm every task, keeping their running state
    pub fn disable_global_polling(&self) {
        self.global_enabled.store(false, Ordering::SeqCst);
        for mut task in self.tasks.iter_mut() {
            task.disarm();
        }
        info!("Global polling disabled");
    }

    #[inline]
    #[must_use]
    pub fn is_global_enabled(&self) -> bool {
        self.global_enabled.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn task_info(&self, id: TaskId) -> Option<PollingTaskInfo> {
        self.tasks.get(&id).map(|task| task.info(id))
    }

    #[must_use]
    pub fn tasks(&self) -> Vec<PollingTaskInfo> {
        let mut tasks: Vec<PollingTaskInfo> = self
            .tasks
            .iter()
            .map(|task| task.info(*task.key()))
            .collect();
        tasks.sort_by_key(|info| info.id);
        tasks
    }

    #[must_use]
    pub fn statistics(&self) -> PollingStatistics {
        let intervals: Vec<u64> = self.tasks.iter().map(|task| millis(task.interval)).collect();
        let total_tasks = intervals.len();
        let average_interval_ms = if total_tasks == 0 {
            0
        } else {
            intervals.iter().sum::<u64>() / total_tasks as u64
        };
        PollingStatistics {
            total_tasks,
            running_tasks: self.tasks.iter().filter(|task| task.running).count(),
            global_enabled: self.is_global_enabled(),
            average_interval_ms,
            min_interval_ms: intervals.iter().copied().min(),
            total_executions: self
                .tasks
                .iter()
                .map(|task| task.executions.load(Ordering::Relaxed))
                .sum(),
        }
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        for mut task in self.tasks.iter_mut() {
            task.disarm();
        }
    }
}
