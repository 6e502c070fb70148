//! A promise/future pair for plain threads, with continuations.
//!
//! A [`Promise`] publishes one result, a value or an error, exactly once. Its
//! single [`Future`] reads that result by blocking ([`Future::get`],
//! [`Future::wait_for`], ...), by `.await`, or by chaining more work with
//! [`Future::then`] and [`Future::and_then`]. Chained callbacks are handed to
//! the [`executor`] hook and never run on the thread that completed the
//! promise.
//!
//! ```
//! use deferred::Promise;
//! use std::thread;
//! use std::time::Duration;
//!
//! let mut promise = Promise::<i32>::new();
//! let mut doubled = promise
//!     .get_future()?
//!     .then(|mut fut| Ok(fut.get()? * 2))?;
//!
//! let producer = thread::spawn(move || {
//!     thread::sleep(Duration::from_millis(10));
//!     promise.set_value(21)
//! });
//!
//! assert_eq!(doubled.get()?, 42);
//! producer.join().expect("The producer thread has panicked.")?;
//! # Ok::<(), deferred::Error>(())
//! ```
mod cell;
mod error;
pub mod executor;
mod future;
mod promise;

pub use error::{BoxError, Error};
pub use executor::Executor;
pub use future::{Future, FutureStatus};
pub use promise::Promise;

/// Create a promise and its future in one go.
pub fn pair<T>() -> (Promise<T>, Future<T>) {
    Promise::pair()
}
