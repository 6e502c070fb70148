use thiserror::Error;

/// Boxed error a producer stores with [`Promise::set_exception`](crate::Promise::set_exception).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// The promise was already completed with a value or an error.
    #[error("promise already satisfied")]
    AlreadySatisfied,
    /// `get_future` was called a second time on the same promise.
    #[error("future already retrieved")]
    FutureAlreadyRetrieved,
    /// The handle holds no shared state (default-constructed or already consumed).
    #[error("no associated state")]
    NoState,
    /// A continuation panicked instead of returning.
    #[error("continuation panicked: {0}")]
    Panicked(String),
    /// The error a producer deliberately stored.
    #[error(transparent)]
    Payload(BoxError),
}

impl Error {
    pub fn payload(err: impl Into<BoxError>) -> Self {
        Error::Payload(err.into())
    }

    pub fn is_payload(&self) -> bool {
        matches!(self, Error::Payload(_))
    }

    /// Borrow the producer's error as its concrete type, if it is one.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Error::Payload(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}
