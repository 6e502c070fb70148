//! The executor hook: the single place continuations are handed off to run.
//!
//! Every `then` callback goes through an [`Executor`], never inline on the
//! thread that completed the promise. The process-wide executor defaults to
//! [`ThreadExecutor`] and is meant to be installed once at startup, or for
//! the lifetime of one test through [`scoped`]. Swapping it while
//! continuations are in flight is not supported: a dispatch racing with
//! [`set_executor`] may land on either executor.
use parking_lot::{const_rwlock, Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use std::thread;

/// A unit of work handed to an executor.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Something that eventually runs a [`Task`], exactly once.
pub trait Executor: Send + Sync {
    fn execute(&self, task: Task);
}

impl<F> Executor for F
where
    F: Fn(Task) + Send + Sync,
{
    fn execute(&self, task: Task) {
        self(task)
    }
}

/// Runs every task on a freshly spawned, detached thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadExecutor;

impl Executor for ThreadExecutor {
    fn execute(&self, task: Task) {
        // Builder::spawn swallows the closure on failure, so the task waits
        // in a slot the caller can still reach.
        let slot = Arc::new(Mutex::new(Some(task)));
        let worker_slot = slot.clone();
        let spawned = thread::Builder::new()
            .name("deferred-continuation".into())
            .spawn(move || {
                log::trace!("continuation worker starting");
                if let Some(task) = worker_slot.lock().take() {
                    task();
                }
            });
        if let Err(err) = spawned {
            log::error!("failed to spawn continuation thread, running inline: {err}");
            if let Some(task) = slot.lock().take() {
                task();
            }
        }
    }
}

/// Runs every task immediately on the calling thread. Handy for
/// deterministic tests; it gives up the stack-depth bound of a real executor.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, task: Task) {
        task()
    }
}

static HOOK: RwLock<Option<Arc<dyn Executor>>> = const_rwlock(None);

/// Install `executor` as the process-wide hook.
pub fn set_executor(executor: impl Executor + 'static) {
    log::debug!("installing process-wide executor");
    *HOOK.write() = Some(Arc::new(executor));
}

/// Go back to the default [`ThreadExecutor`].
pub fn reset_executor() {
    log::debug!("resetting process-wide executor");
    *HOOK.write() = None;
}

/// The executor `then` dispatches through right now.
pub fn current() -> Arc<dyn Executor> {
    match HOOK.read().as_ref() {
        Some(executor) => executor.clone(),
        None => Arc::new(ThreadExecutor),
    }
}

/// Install `executor` until the returned guard is dropped, then put back
/// whatever was installed before.
///
/// ```
/// use deferred::executor::{self, InlineExecutor};
/// use deferred::Promise;
///
/// let _guard = executor::scoped(InlineExecutor);
/// let mut promise = Promise::<i32>::new();
/// let mut next = promise
///     .get_future()?
///     .then(|mut fut| Ok(fut.get()? * 2))?;
/// promise.set_value(21)?;
/// assert_eq!(next.get()?, 42);
/// # Ok::<(), deferred::Error>(())
/// ```
#[must_use = "the previous executor is restored when the guard is dropped"]
pub fn scoped(executor: impl Executor + 'static) -> ExecutorGuard {
    let previous = HOOK.write().replace(Arc::new(executor));
    log::debug!("installing scoped process-wide executor");
    ExecutorGuard { previous }
}

/// Restores the previously installed executor when dropped; see [`scoped`].
pub struct ExecutorGuard {
    previous: Option<Arc<dyn Executor>>,
}

impl Drop for ExecutorGuard {
    fn drop(&mut self) {
        log::debug!("restoring previous process-wide executor");
        *HOOK.write() = self.previous.take();
    }
}

impl fmt::Debug for ExecutorGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorGuard")
            .field("restores_default", &self.previous.is_none())
            .finish()
    }
}

/// Hand `task` to `executor`, or to the process-wide hook when `None`.
/// The hook's lock is released before the task is handed over.
pub(crate) fn dispatch(executor: Option<&Arc<dyn Executor>>, task: Task) {
    log::trace!("dispatching continuation");
    match executor {
        Some(executor) => executor.execute(task),
        None => current().execute(task),
    }
}
