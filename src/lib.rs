//! A single-threaded `Future` and its `Completer`.
//!
//! A [`Completer`] is handed to whoever produces a value; its
//! [`future`](Completer::future) goes to whoever consumes it. Consumers chain
//! continuations with [`Future::then`], [`Future::catch_error`] and
//! [`Future::when_complete`]; producers settle exactly once with
//! [`Completer::complete`] or [`Completer::complete_error`].
//!
//! Dispatch is deferred: continuations always run on a later turn of the
//! thread-local [`event_loop`], never inside the call that registered them
//! or the call that settled the future. The host drives the loop with
//! [`event_loop::run_until_idle`] or [`event_loop::run_until`].
//!
//! An error that reaches a future with no continuations is not dropped: the
//! turn that dispatches it fails with [`Error::Unhandled`].
//!
//! # Examples
//!
//! ```
//! use future_completer::{event_loop, Completer, Next};
//!
//! let completer = Completer::<u32, String>::new();
//! let message = completer
//!     .future()
//!     .then(|n| Ok(Next::Value(n + 2)))
//!     .then(|n| Ok(Next::Value(format!("got {}", n))));
//!
//! event_loop::defer(move || completer.complete(1));
//! assert_eq!(event_loop::run_until(&message).unwrap(), Ok("got 3".to_string()));
//! ```
use std::any::Any;
use std::fmt;

mod awaited;
mod combinators;
mod completer;
pub mod event_loop;
mod future;

pub use awaited::Awaited;
pub use completer::Completer;
pub use future::{ErrorHandler, Future, Next, ThenOptions};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Future already completed")]
    AlreadyCompleted,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unhandled error reached the end of a future chain")]
    Unhandled(Unhandled),
    #[error("event loop went idle before the future completed")]
    Stalled,
}

/// The payload of an error nobody handled, with its type erased.
pub struct Unhandled(Box<dyn Any>);

impl Unhandled {
    pub(crate) fn new<E: 'static>(error: E) -> Self {
        Unhandled(Box::new(error))
    }

    pub fn downcast_ref<E: 'static>(&self) -> Option<&E> {
        self.0.downcast_ref()
    }

    /// Recovers the original error, or hands `self` back if `E` is wrong.
    pub fn downcast<E: 'static>(self) -> Result<E, Self> {
        self.0.downcast().map(|error| *error).map_err(Unhandled)
    }
}

impl fmt::Debug for Unhandled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Unhandled { .. }")
    }
}
