use crate::{Error, Future};
use std::fmt;

/// The producer side of a [`Future`]: the only thing allowed to settle it.
///
/// # Examples
///
/// ```
/// use future_completer::{event_loop, Completer, Error};
///
/// let completer = Completer::<String, String>::new();
/// let future = completer.future();
///
/// completer.complete("Hi".into()).unwrap();
/// assert!(completer.is_completed());
/// assert!(matches!(completer.complete("again".into()), Err(Error::AlreadyCompleted)));
///
/// assert_eq!(event_loop::run_until(&future).unwrap(), Ok("Hi".to_string()));
/// ```
pub struct Completer<T, E> {
    future: Future<T, E>,
}

impl<T, E> Completer<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    pub fn new() -> Self {
        Self { future: Future::new() }
    }

    /// The future this completer settles.
    pub fn future(&self) -> Future<T, E> {
        self.future.clone()
    }

    /// Settles the future with `value`.
    ///
    /// Fails with [`Error::AlreadyCompleted`] if it was settled before.
    pub fn complete(&self, value: T) -> Result<(), Error> {
        self.future.settle(Ok(value))
    }

    /// Settles the future with `error`.
    ///
    /// Fails with [`Error::AlreadyCompleted`] if it was settled before.
    pub fn complete_error(&self, error: E) -> Result<(), Error> {
        self.future.settle(Err(error))
    }

    pub fn is_completed(&self) -> bool {
        !self.future.is_pending()
    }
}

impl<T, E> Default for Completer<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Completer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer").field("future", &self.future).finish()
    }
}
