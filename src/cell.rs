//! The completion cell shared by one `Promise` and one `Future`.
//!
//! The cell holds the eventual result, the condition variable that blocked
//! readers sleep on, and at most one continuation (or one async waker) to
//! run when the result arrives.
use crate::{Error, FutureStatus};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::task::{Poll, Waker};
use std::time::{Duration, Instant};

/// Single-shot callback run with the cell once it leaves `Slot::Empty`.
pub(crate) type Continuation<T> = Box<dyn FnOnce(Arc<Cell<T>>) + Send>;

enum Slot<T> {
    Empty,
    Value(T),
    Error(Error),
    /// The result was moved out by the reader. Terminal.
    Retrieved,
}

struct Inner<T> {
    slot: Slot<T>,
    continuation: Option<Continuation<T>>,
    waker: Option<Waker>,
}

impl<T> Inner<T> {
    fn is_empty(&self) -> bool {
        matches!(self.slot, Slot::Empty)
    }

    fn take_slot(&mut self) -> Result<T, Error> {
        match std::mem::replace(&mut self.slot, Slot::Retrieved) {
            Slot::Value(value) => Ok(value),
            Slot::Error(err) => Err(err),
            Slot::Retrieved => Err(Error::NoState),
            Slot::Empty => {
                self.slot = Slot::Empty;
                Err(Error::NoState)
            }
        }
    }
}

pub(crate) struct Cell<T> {
    inner: Mutex<Inner<T>>,
    ready: Condvar,
}

impl<T> Cell<T> {
    pub(crate) fn new() -> Self {
        Cell {
            inner: Mutex::new(Inner {
                slot: Slot::Empty,
                continuation: None,
                waker: None,
            }),
            ready: Condvar::new(),
        }
    }

    /// A cell that is complete from birth.
    pub(crate) fn completed(result: Result<T, Error>) -> Self {
        let cell = Cell::new();
        cell.inner.lock().slot = match result {
            Ok(value) => Slot::Value(value),
            Err(err) => Slot::Error(err),
        };
        cell
    }

    /// Publish the result. The lock is dropped before waiters are woken and
    /// before the continuation runs, so a continuation may re-enter the cell.
    pub(crate) fn set_result(self: &Arc<Self>, result: Result<T, Error>) -> Result<(), Error> {
        let (continuation, waker) = {
            let mut inner = self.inner.lock();
            if !inner.is_empty() {
                return Err(Error::AlreadySatisfied);
            }
            inner.slot = match result {
                Ok(value) => Slot::Value(value),
                Err(err) => Slot::Error(err),
            };
            (inner.continuation.take(), inner.waker.take())
        };
        self.ready.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
        if let Some(continuation) = continuation {
            continuation(Arc::clone(self));
        }
        Ok(())
    }

    /// Store `continuation`, or run it right away if the result is already in.
    /// Either way it runs exactly once.
    pub(crate) fn register_continuation(self: &Arc<Self>, continuation: Continuation<T>) {
        {
            let mut inner = self.inner.lock();
            if inner.is_empty() {
                inner.continuation = Some(continuation);
                return;
            }
        }
        continuation(Arc::clone(self));
    }

    /// Block until the result is in, then move it out.
    pub(crate) fn take(&self) -> Result<T, Error> {
        let mut inner = self.inner.lock();
        self.ready.wait_while(&mut inner, |inner| inner.is_empty());
        inner.take_slot()
    }

    /// Move the result out if present, else remember `waker` for `set_result`.
    pub(crate) fn poll_take(&self, waker: &Waker) -> Poll<Result<T, Error>> {
        let mut inner = self.inner.lock();
        if inner.is_empty() {
            match inner.waker {
                Some(ref stored) if stored.will_wake(waker) => {}
                _ => inner.waker = Some(waker.clone()),
            }
            return Poll::Pending;
        }
        Poll::Ready(inner.take_slot())
    }

    pub(crate) fn is_ready(&self) -> bool {
        !self.inner.lock().is_empty()
    }

    pub(crate) fn wait(&self) -> FutureStatus {
        let mut inner = self.inner.lock();
        self.ready.wait_while(&mut inner, |inner| inner.is_empty());
        FutureStatus::Ready
    }

    pub(crate) fn wait_for(&self, timeout: Duration) -> FutureStatus {
        let mut inner = self.inner.lock();
        self.ready
            .wait_while_for(&mut inner, |inner| inner.is_empty(), timeout);
        Self::status(&inner)
    }

    pub(crate) fn wait_until(&self, deadline: Instant) -> FutureStatus {
        let mut inner = self.inner.lock();
        self.ready
            .wait_while_until(&mut inner, |inner| inner.is_empty(), deadline);
        Self::status(&inner)
    }

    fn status(inner: &Inner<T>) -> FutureStatus {
        if inner.is_empty() {
            FutureStatus::Timeout
        } else {
            FutureStatus::Ready
        }
    }
}

impl<T> fmt::Debug for Cell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        let state = match inner.slot {
            Slot::Empty => "Empty",
            Slot::Value(_) => "Value(_)",
            Slot::Error(_) => "Error(_)",
            Slot::Retrieved => "Retrieved",
        };
        f.debug_struct("Cell")
            .field("state", &state)
            .field("continuation", &inner.continuation.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
use super::Cell;
use crate::{Error, FutureStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_set_result_twice() {
    let cell = Arc::new(Cell::new());
    cell.set_result(Ok(5)).unwrap();
    assert!(matches!(cell.set_result(Ok(4)), Err(Error::AlreadySatisfied)));
    assert!(matches!(
        cell.set_result(Err(Error::payload("late"))),
        Err(Error::AlreadySatisfied)
    ));
    assert_eq!(cell.take().unwrap(), 5);
}

#[test]
fn test_retrieved_cell_stays_satisfied() {
    let cell = Arc::new(Cell::new());
    cell.set_result(Ok("🍓")).unwrap();
    assert_eq!(cell.take().unwrap(), "🍓");
    assert!(matches!(cell.set_result(Ok("🍇")), Err(Error::AlreadySatisfied)));
    assert!(matches!(cell.take(), Err(Error::NoState)));
}

#[test]
fn test_continuation_before_result() {
    let cell = Arc::new(Cell::<i32>::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    cell.register_continuation(Box::new(move |cell: Arc<Cell<i32>>| {
        assert_eq!(cell.take().unwrap(), 7);
        seen.fetch_add(1, Ordering::SeqCst);
    }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    cell.set_result(Ok(7)).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_continuation_after_result() {
    let cell = Arc::new(Cell::<i32>::new());
    cell.set_result(Err(Error::payload("boom"))).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    cell.register_continuation(Box::new(move |cell: Arc<Cell<i32>>| {
        assert!(cell.take().unwrap_err().is_payload());
        seen.fetch_add(1, Ordering::SeqCst);
    }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_continuation_may_reenter_cell() {
    let cell = Arc::new(Cell::<i32>::new());
    cell.register_continuation(Box::new(|cell: Arc<Cell<i32>>| {
        assert!(cell.is_ready());
        assert!(matches!(cell.set_result(Ok(1)), Err(Error::AlreadySatisfied)));
    }));
    cell.set_result(Ok(0)).unwrap();
}

#[test]
fn test_wait_for_times_out() {
    let cell = Cell::<i32>::new();
    assert_eq!(cell.wait_for(Duration::from_millis(1)), FutureStatus::Timeout);
    assert!(!cell.is_ready());
}

#[test]
fn test_take_blocks_until_set() {
    let cell = Arc::new(Cell::<String>::new());
    let producer = cell.clone();
    let task1 = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        producer.set_result(Ok("Hello, thread".to_owned())).unwrap();
    });
    assert_eq!(cell.wait(), FutureStatus::Ready);
    assert_eq!(cell.take().unwrap(), "Hello, thread");
    task1.join().expect("The task1 thread has panicked");
}

#[test]
fn test_completed_cell() {
    let cell = Cell::completed(Ok(3u8));
    assert!(cell.is_ready());
    assert_eq!(cell.wait_for(Duration::from_millis(1)), FutureStatus::Ready);
    assert!(format!("{:?}", cell).contains("Value"));
}
}
