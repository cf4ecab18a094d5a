//! Background tasks that outlive the component observing them
//!
//! A host component (a screen, a window, a session) starts a long-running operation
//! and wants its results, but the host may be torn down and recreated while the
//! operation is still running. The operation must never hold on to a torn-down host.
//!
//! The operation is given a [`ListenerSlot`] instead of a listener. The host attaches
//! itself to the slot when it appears and detaches when it goes away; the operation
//! only ever reports through whatever the slot holds at that moment.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwapOption;
use tokio::task::JoinHandle;

/// Tag used by [`RetainedTasks::find_or_create_default`]
pub const DEFAULT_TAG: &str = "retained_task";

/// Shared, swappable reference to the current listener
pub struct ListenerSlot<L> {
    listener: Arc<ArcSwapOption<L>>,
}

impl<L> ListenerSlot<L> {
    /// Create an empty slot
    pub fn new() -> Self {
        Self {
            listener: Arc::new(ArcSwapOption::new(None)),
        }
    }

    /// Install a listener, replacing the previous one
    pub fn set(&self, listener: Arc<L>) {
        self.listener.store(Some(listener));
    }

    /// Remove the listener
    pub fn clear(&self) {
        self.listener.store(None);
    }

    /// Current listener, if any
    pub fn get(&self) -> Option<Arc<L>> {
        self.listener.load_full()
    }

    /// Whether a listener is attached
    pub fn is_attached(&self) -> bool {
        self.listener.load().is_some()
    }

    /// Run `f` against the current listener.
    ///
    /// Returns `false` without calling `f` when nothing is attached.
    pub fn with<F>(&self, f: F) -> bool
    where
        F: FnOnce(&L),
    {
        match self.listener.load().as_ref() {
            Some(listener) => {
                f(listener);
                true
            }
            None => false,
        }
    }
}

impl<L> Clone for ListenerSlot<L> {
    fn clone(&self) -> Self {
        Self {
            listener: self.listener.clone(),
        }
    }
}

impl<L> Default for ListenerSlot<L> {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds a running operation and routes its callbacks to the attached listener
pub struct RetainedTask<L> {
    slot: ListenerSlot<L>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<L: Send + Sync + 'static> RetainedTask<L> {
    /// Create a holder with no task and no listener
    pub fn new() -> Self {
        Self {
            slot: ListenerSlot::new(),
            handle: Mutex::new(None),
        }
    }

    /// Spawn `task`, handing it the slot it reports through.
    ///
    /// A task started earlier by this holder is aborted.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn set_task<F, Fut>(&self, task: F)
    where
        F: FnOnce(ListenerSlot<L>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task(self.slot.clone()));
        if let Some(previous) = self.lock_handle().replace(handle) {
            previous.abort();
        }
    }

    /// A host appeared; route callbacks to it
    pub fn on_attach(&self, listener: Arc<L>) {
        tracing::debug!("listener attached to retained task");
        self.slot.set(listener);
    }

    /// The host went away; drop every reference to it
    pub fn on_detach(&self) {
        tracing::debug!("listener detached from retained task");
        self.slot.clear();
    }

    /// Whether a task was started and has not finished
    pub fn is_task_running(&self) -> bool {
        self.lock_handle()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Abort the task, if one is running
    pub fn cancel(&self) {
        if let Some(handle) = self.lock_handle().take() {
            handle.abort();
        }
    }

    /// The slot handed to tasks
    pub fn slot(&self) -> &ListenerSlot<L> {
        &self.slot
    }

    fn lock_handle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<L: Send + Sync + 'static> Default for RetainedTask<L> {
    fn default() -> Self {
        Self::new()
    }
}

/// Tag-addressed set of retained tasks owned by a host's lifecycle manager
pub struct RetainedTasks<L> {
    tasks: Mutex<HashMap<String, Arc<RetainedTask<L>>>>,
}

impl<L: Send + Sync + 'static> RetainedTasks<L> {
    /// Create an empty set
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// The task registered under `tag`, created on first use
    pub fn find_or_create(&self, tag: &str) -> Arc<RetainedTask<L>> {
        self.lock_tasks()
            .entry(tag.to_string())
            .or_insert_with(|| Arc::new(RetainedTask::new()))
            .clone()
    }

    /// The task registered under [`DEFAULT_TAG`]
    pub fn find_or_create_default(&self) -> Arc<RetainedTask<L>> {
        self.find_or_create(DEFAULT_TAG)
    }

    /// The task registered under `tag`, if any
    pub fn get(&self, tag: &str) -> Option<Arc<RetainedTask<L>>> {
        self.lock_tasks().get(tag).cloned()
    }

    /// Forget the task under `tag` and abort it
    pub fn remove(&self, tag: &str) -> Option<Arc<RetainedTask<L>>> {
        let task = self.lock_tasks().remove(tag)?;
        task.cancel();
        Some(task)
    }

    /// Attach `listener` to every task
    pub fn attach_all(&self, listener: Arc<L>) {
        for task in self.lock_tasks().values() {
            task.on_attach(listener.clone());
        }
    }

    /// Detach the listener from every task
    pub fn detach_all(&self) {
        for task in self.lock_tasks().values() {
            task.on_detach();
        }
    }

    fn lock_tasks(&self) -> MutexGuard<'_, HashMap<String, Arc<RetainedTask<L>>>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<L: Send + Sync + 'static> Default for RetainedTasks<L> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::{mpsc, oneshot};

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<u32>>,
    }

    impl Recorder {
        fn record(&self, event: u32) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<u32> {
            self.events.lock().unwrap().clone()
        }
    }

    async fn wait_until_finished<L: Send + Sync + 'static>(task: &RetainedTask<L>) {
        while task.is_task_running() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn test_callbacks_follow_reattached_listener() {
        let task = RetainedTask::<Recorder>::new();
        let first = Arc::new(Recorder::default());
        task.on_attach(first.clone());

        let (step_tx, mut step_rx) = mpsc::channel(1);
        let (go_tx, go_rx) = oneshot::channel::<()>();
        task.set_task(move |slot| async move {
            slot.with(|l| l.record(1));
            let _ = step_tx.send(()).await;
            let _ = go_rx.await;
            slot.with(|l| l.record(2));
        });

        step_rx.recv().await.unwrap();
        assert!(task.is_task_running());

        // host recreated while the task is in flight
        task.on_detach();
        let second = Arc::new(Recorder::default());
        task.on_attach(second.clone());

        go_tx.send(()).unwrap();
        wait_until_finished(&task).await;

        assert_eq!(first.events(), vec![1]);
        assert_eq!(second.events(), vec![2]);
        assert!(!task.is_task_running());
    }

    #[tokio::test]
    async fn test_detached_callbacks_are_dropped() {
        let task = RetainedTask::<Recorder>::new();
        let (delivered_tx, delivered_rx) = oneshot::channel();

        task.set_task(move |slot| async move {
            let _ = delivered_tx.send(slot.with(|l| l.record(7)));
        });

        assert!(!delivered_rx.await.unwrap());
        assert!(!task.slot().is_attached());
    }

    #[tokio::test]
    async fn test_cancel_stops_task() {
        let task = RetainedTask::<Recorder>::new();
        assert!(!task.is_task_running());

        task.set_task(|_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        assert!(task.is_task_running());

        task.cancel();
        assert!(!task.is_task_running());
    }

    #[tokio::test]
    async fn test_find_or_create_is_per_tag() {
        let tasks = RetainedTasks::<Recorder>::new();
        let a = tasks.find_or_create_default();
        let b = tasks.find_or_create(DEFAULT_TAG);
        let other = tasks.find_or_create("upload");

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &other));
        assert!(tasks.get("missing").is_none());

        let host = Arc::new(Recorder::default());
        tasks.attach_all(host.clone());
        assert!(a.slot().is_attached());
        assert!(other.slot().is_attached());

        tasks.detach_all();
        assert!(!a.slot().is_attached());
        assert!(!other.slot().is_attached());

        assert!(tasks.remove("upload").is_some());
        assert!(tasks.get("upload").is_none());
    }
}
