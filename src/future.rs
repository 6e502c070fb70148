//! The reading end, and the `then`/`and_then` combinators that chain work
//! onto it through the executor hook.
use crate::cell::Cell;
use crate::executor::{dispatch, Executor};
use crate::Error;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Outcome of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureStatus {
    Ready,
    Timeout,
}

/// The reading end of a [`Promise`](crate::Promise).
///
/// A `Future` has exactly one reader: [`get`](Future::get) moves the result
/// out and leaves the handle invalid, and [`then`](Future::then) consumes it.
/// A default-constructed `Future` is invalid from the start.
///
/// # Examples
///
/// ```
/// use deferred::Promise;
/// use std::thread;
///
/// let mut promise = Promise::<String>::new();
/// let mut future = promise.get_future()?;
/// let task1 = thread::spawn(move || promise.set_value("🍓".into()));
/// assert_eq!(future.get()?, "🍓");
/// assert!(!future.valid());
/// task1.join().expect("The task1 thread has panicked.")?;
/// # Ok::<(), deferred::Error>(())
/// ```
#[derive(Debug)]
pub struct Future<T> {
    cell: Option<Arc<Cell<T>>>,
}

impl<T> Default for Future<T> {
    fn default() -> Self {
        Future { cell: None }
    }
}

impl<T> Future<T> {
    pub(crate) fn from_cell(cell: Arc<Cell<T>>) -> Self {
        Future { cell: Some(cell) }
    }

    /// A future that already holds `value`; no promise is involved.
    pub fn ready(value: T) -> Self {
        Future::from_cell(Arc::new(Cell::completed(Ok(value))))
    }

    /// A future that already holds `err`.
    pub fn failed(err: Error) -> Self {
        Future::from_cell(Arc::new(Cell::completed(Err(err))))
    }

    pub fn valid(&self) -> bool {
        self.cell.is_some()
    }

    fn cell(&self) -> Result<&Arc<Cell<T>>, Error> {
        self.cell.as_ref().ok_or(Error::NoState)
    }

    /// Whether the result has arrived, without blocking.
    pub fn is_ready(&self) -> Result<bool, Error> {
        Ok(self.cell()?.is_ready())
    }

    /// Block until the result arrives and move it out. The handle is invalid
    /// afterwards whether the result was a value or an error.
    pub fn get(&mut self) -> Result<T, Error> {
        let cell = self.cell.take().ok_or(Error::NoState)?;
        cell.take()
    }

    /// Block until the result arrives, without consuming it.
    pub fn wait(&self) -> Result<FutureStatus, Error> {
        Ok(self.cell()?.wait())
    }

    pub fn wait_for(&self, timeout: Duration) -> Result<FutureStatus, Error> {
        Ok(self.cell()?.wait_for(timeout))
    }

    pub fn wait_until(&self, deadline: Instant) -> Result<FutureStatus, Error> {
        Ok(self.cell()?.wait_until(deadline))
    }
}

impl<T: Send + 'static> Future<T> {
    /// Run `f` once this future completes, on the process-wide executor, and
    /// return a future of its output.
    ///
    /// `f` receives this future back, already complete, and decides itself
    /// whether to unwrap the value or pass the error on; `?` on
    /// [`get`](Future::get) does the latter. `f` never runs on the thread
    /// that completed the promise, nor inside this call, even when the
    /// result is already here. A panic in `f` completes the returned future
    /// with [`Error::Panicked`].
    ///
    /// ```
    /// use deferred::Future;
    ///
    /// let mut next = Future::ready(5).then(|mut fut| Ok(fut.get()? + 1))?;
    /// assert_eq!(next.get()?, 6);
    /// # Ok::<(), deferred::Error>(())
    /// ```
    pub fn then<U, F>(self, f: F) -> Result<Future<U>, Error>
    where
        U: Send + 'static,
        F: FnOnce(Future<T>) -> Result<U, Error> + Send + 'static,
    {
        self.chain(None, f)
    }

    /// [`then`](Future::then), dispatched through `executor` instead of the
    /// process-wide hook.
    pub fn then_on<U, F>(self, executor: Arc<dyn Executor>, f: F) -> Result<Future<U>, Error>
    where
        U: Send + 'static,
        F: FnOnce(Future<T>) -> Result<U, Error> + Send + 'static,
    {
        self.chain(Some(executor), f)
    }

    /// Like [`then`](Future::then) for a callback that itself returns a
    /// future. The result is flattened: the returned future completes with
    /// whatever the inner future completes with.
    ///
    /// ```
    /// use deferred::{Future, Promise};
    ///
    /// let mut inner = Promise::<f64>::new();
    /// let inner_future = inner.get_future()?;
    /// let mut next = Future::ready(10).and_then(move |mut fut| {
    ///     fut.get()?;
    ///     Ok(inner_future)
    /// })?;
    /// inner.set_value(5.5)?;
    /// assert_eq!(next.get()?, 5.5);
    /// # Ok::<(), deferred::Error>(())
    /// ```
    pub fn and_then<U, F>(self, f: F) -> Result<Future<U>, Error>
    where
        U: Send + 'static,
        F: FnOnce(Future<T>) -> Result<Future<U>, Error> + Send + 'static,
    {
        self.flat_chain(None, f)
    }

    /// [`and_then`](Future::and_then), dispatched through `executor`.
    pub fn and_then_on<U, F>(self, executor: Arc<dyn Executor>, f: F) -> Result<Future<U>, Error>
    where
        U: Send + 'static,
        F: FnOnce(Future<T>) -> Result<Future<U>, Error> + Send + 'static,
    {
        self.flat_chain(Some(executor), f)
    }

    fn chain<U, F>(self, executor: Option<Arc<dyn Executor>>, f: F) -> Result<Future<U>, Error>
    where
        U: Send + 'static,
        F: FnOnce(Future<T>) -> Result<U, Error> + Send + 'static,
    {
        self.schedule(executor, move |upstream, target| {
            publish(&target, guarded(move || f(upstream)));
        })
    }

    fn flat_chain<U, F>(self, executor: Option<Arc<dyn Executor>>, f: F) -> Result<Future<U>, Error>
    where
        U: Send + 'static,
        F: FnOnce(Future<T>) -> Result<Future<U>, Error> + Send + 'static,
    {
        let via = executor.clone();
        self.schedule(executor, move |upstream, target| {
            match guarded(move || f(upstream)) {
                Ok(inner) => forward(inner, target, via),
                Err(err) => publish(&target, Err(err)),
            }
        })
    }

    /// Allocate the downstream cell and arrange for `work` to be dispatched
    /// once this future's cell completes.
    fn schedule<U, W>(mut self, executor: Option<Arc<dyn Executor>>, work: W) -> Result<Future<U>, Error>
    where
        U: Send + 'static,
        W: FnOnce(Future<T>, Arc<Cell<U>>) + Send + 'static,
    {
        let upstream = self.cell.take().ok_or(Error::NoState)?;
        let target = Arc::new(Cell::new());
        let downstream = Future::from_cell(target.clone());
        upstream.register_continuation(Box::new(move |upstream: Arc<Cell<T>>| {
            dispatch(
                executor.as_ref(),
                Box::new(move || work(Future::from_cell(upstream), target)),
            );
        }));
        Ok(downstream)
    }
}

/// Pipe `inner`'s eventual result into `target`. The hand-off goes through
/// the executor so nested flattening never stacks `set_result` frames.
fn forward<U: Send + 'static>(
    mut inner: Future<U>,
    target: Arc<Cell<U>>,
    executor: Option<Arc<dyn Executor>>,
) {
    match inner.cell.take() {
        Some(cell) => cell.register_continuation(Box::new(move |cell: Arc<Cell<U>>| {
            dispatch(
                executor.as_ref(),
                Box::new(move || publish(&target, cell.take())),
            );
        })),
        None => publish(&target, Err(Error::NoState)),
    }
}

fn publish<U>(target: &Arc<Cell<U>>, result: Result<U, Error>) {
    // `target` is fresh and this is its only writer, so a failure here is a bug.
    if let Err(err) = target.set_result(result) {
        log::warn!("dropping continuation result: {err}");
    }
}

fn guarded<R>(f: impl FnOnce() -> Result<R, Error>) -> Result<R, Error> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(cause) => Err(Error::Panicked(panic_message(cause.as_ref()))),
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> String {
    if let Some(msg) = cause.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = cause.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

impl<T> std::future::Future for Future<T> {
    type Output = Result<T, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let poll = match self.cell {
            Some(ref cell) => cell.poll_take(cx.waker()),
            None => return Poll::Ready(Err(Error::NoState)),
        };
        if poll.is_ready() {
            self.cell = None;
        }
        poll
    }
}
