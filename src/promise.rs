use crate::cell::Cell;
use crate::error::BoxError;
use crate::{Error, Future};
use std::sync::Arc;

/// The writing end: completes its one [`Future`] exactly once, with a value
/// or an error.
///
/// # Examples
///
/// ```
/// use deferred::Promise;
/// use std::thread;
///
/// let mut promise = Promise::<String>::new();
/// let mut future = promise.get_future()?;
/// let task1 = thread::spawn(move || future.get());
/// promise.set_value("Hi".into())?;
/// assert_eq!(task1.join().expect("The task1 thread has panicked.")?, "Hi");
/// # Ok::<(), deferred::Error>(())
/// ```
#[derive(Debug)]
pub struct Promise<T> {
    cell: Arc<Cell<T>>,
    future_retrieved: bool,
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Promise<T> {
    pub fn new() -> Self {
        Promise {
            cell: Arc::new(Cell::new()),
            future_retrieved: false,
        }
    }

    /// A promise together with its future, already retrieved.
    pub fn pair() -> (Self, Future<T>) {
        let mut promise = Self::new();
        promise.future_retrieved = true;
        let future = Future::from_cell(promise.cell.clone());
        (promise, future)
    }

    /// Hand out the one future bound to this promise. A second call fails
    /// with [`Error::FutureAlreadyRetrieved`].
    pub fn get_future(&mut self) -> Result<Future<T>, Error> {
        if self.future_retrieved {
            return Err(Error::FutureAlreadyRetrieved);
        }
        self.future_retrieved = true;
        Ok(Future::from_cell(self.cell.clone()))
    }

    /// Complete with `value`. Fails with [`Error::AlreadySatisfied`] if the
    /// promise was already completed, leaving the stored result untouched.
    pub fn set_value(&self, value: T) -> Result<(), Error> {
        self.cell.set_result(Ok(value))
    }

    /// Complete with a producer error; the reader gets it back as
    /// [`Error::Payload`].
    ///
    /// ```
    /// use deferred::{Error, Promise};
    ///
    /// let mut promise = Promise::<i32>::new();
    /// let mut future = promise.get_future()?;
    /// promise.set_exception("reject!!")?;
    /// match future.get() {
    ///     Err(Error::Payload(err)) => assert_eq!(err.to_string(), "reject!!"),
    ///     other => panic!("unexpected {:?}", other),
    /// }
    /// # Ok::<(), deferred::Error>(())
    /// ```
    pub fn set_exception(&self, err: impl Into<BoxError>) -> Result<(), Error> {
        self.set_error(Error::Payload(err.into()))
    }

    /// Complete with an already-built [`Error`], passed through verbatim.
    pub fn set_error(&self, err: Error) -> Result<(), Error> {
        self.cell.set_result(Err(err))
    }
}

#[cfg(test)]
mod tests {
#[allow(unused_imports)]
use futures::executor::block_on;
use super::Promise;
use crate::Error;
use std::thread;
use std::time::Duration;

#[test]
fn test_set_value_first() {
    let mut p = Promise::new();
    p.set_value(5).unwrap();
    let mut f = p.get_future().unwrap();
    assert_eq!(f.get().unwrap(), 5);
}

#[test]
fn test_set_value_second() {
    let mut p = Promise::new();
    let mut f = p.get_future().unwrap();
    p.set_value(5).unwrap();
    assert_eq!(f.get().unwrap(), 5);
}

#[test]
fn test_set_value_twice() {
    let mut p = Promise::new();
    let mut f = p.get_future().unwrap();
    p.set_value(5).unwrap();
    assert!(matches!(p.set_value(4), Err(Error::AlreadySatisfied)));
    assert!(matches!(p.set_exception("late"), Err(Error::AlreadySatisfied)));
    assert_eq!(f.get().unwrap(), 5);
}

#[test]
fn test_set_exception_twice() {
    let mut p = Promise::<i32>::new();
    let mut f = p.get_future().unwrap();
    p.set_exception("first").unwrap();
    assert!(matches!(p.set_exception("second"), Err(Error::AlreadySatisfied)));
    assert!(matches!(p.set_value(1), Err(Error::AlreadySatisfied)));
    assert_eq!(f.get().unwrap_err().to_string(), "first");
}

#[test]
fn test_set_after_get() {
    let mut p = Promise::new();
    let mut f = p.get_future().unwrap();
    p.set_value("🍓").unwrap();
    assert_eq!(f.get().unwrap(), "🍓");
    assert!(matches!(p.set_value("🍇"), Err(Error::AlreadySatisfied)));
}

#[test]
fn test_get_future_twice() {
    let mut p = Promise::<i32>::new();
    let _f = p.get_future().unwrap();
    assert!(matches!(p.get_future(), Err(Error::FutureAlreadyRetrieved)));
}

#[test]
fn test_get_future_twice_after_value() {
    let mut p = Promise::new();
    p.set_value(5).unwrap();
    let _f = p.get_future().unwrap();
    assert!(matches!(p.get_future(), Err(Error::FutureAlreadyRetrieved)));
}

#[test]
fn test_pair_future_is_retrieved() {
    let (mut p, mut f) = Promise::pair();
    assert!(matches!(p.get_future(), Err(Error::FutureAlreadyRetrieved)));
    p.set_value(3u8).unwrap();
    assert_eq!(f.get().unwrap(), 3);
}

#[test]
fn test_set_error_verbatim() {
    let (p, mut f) = Promise::<i32>::pair();
    p.set_error(Error::Panicked("worker".into())).unwrap();
    assert!(matches!(f.get(), Err(Error::Panicked(msg)) if msg == "worker"));
}

#[test]
fn test_promise_resolve_across_threads() {
    let mut op = Promise::<String>::new();
    let mut op_a = op.get_future().unwrap();
    let task1 = thread::spawn(move || op_a.get().unwrap());
    let task2 = thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        op.set_value(String::from("🍓")).unwrap();
    });
    assert_eq!(task1.join().expect("The task1 thread has panicked"), "🍓");
    task2.join().expect("The task2 thread has panicked");
}

#[test]
fn test_promise_reject_across_threads() {
    let (a, b) = Promise::<String>::pair();
    let task1 = thread::spawn(move || block_on(b));
    let task2 = thread::spawn(move || a.set_exception("reject!!").unwrap());
    task2.join().expect("The task2 thread has panicked");
    let err = task1.join().expect("The task1 thread has panicked").unwrap_err();
    assert_eq!(err.to_string(), "reject!!");
}

#[test]
fn test_unresolved_promise_times_out() {
    let mut p = Promise::<i32>::new();
    let f = p.get_future().unwrap();
    drop(p);
    assert_eq!(
        f.wait_for(Duration::from_millis(1)).unwrap(),
        crate::FutureStatus::Timeout
    );
}
}
