use crate::{event_loop, Error, Unhandled};
use log::{debug, trace, warn};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A boxed continuation, consumed once with the settled outcome.
pub(crate) type Continuation<T, E> = Box<dyn FnOnce(Result<T, E>) -> Result<(), Error>>;

/// An error handler as stored by [`ThenOptions`].
pub type ErrorHandler<U, E> = Box<dyn FnOnce(E) -> Result<Next<U, E>, E>>;

/// What a handler hands to the future returned by `then`.
pub enum Next<U, E> {
    /// Settle with this value.
    Value(U),
    /// Adopt the eventual value or error of another future.
    Chain(Future<U, E>),
}

impl<U, E> fmt::Debug for Next<U, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Next::Value(_) => write!(f, "Next::Value(..)"),
            Next::Chain(future) => write!(f, "Next::Chain({:?})", future),
        }
    }
}

/// Structured options for [`Future::then_with`].
pub struct ThenOptions<U, E> {
    on_error: Option<ErrorHandler<U, E>>,
}

impl<U, E> ThenOptions<U, E> {
    pub fn new() -> Self {
        Self { on_error: None }
    }

    pub fn on_error<F>(mut self, on_error: F) -> Self
    where
        F: FnOnce(E) -> Result<Next<U, E>, E> + 'static,
    {
        self.on_error = Some(Box::new(on_error));
        self
    }
}

impl<U, E> Default for ThenOptions<U, E> {
    fn default() -> Self {
        Self::new()
    }
}

/// The eventual result of an asynchronous operation.
///
/// A `Future` is a handle; clones share the same state. Only its
/// [`Completer`](crate::Completer), or the chain that created it, can settle
/// it. Consumers register continuations with [`then`](Future::then) and
/// friends, each of which returns a new `Future`.
///
/// Dispatch is always deferred to the thread-local
/// [`event_loop`](crate::event_loop): a continuation runs on a later turn of
/// the queue even when the future is already settled.
///
/// # Examples
///
/// ```
/// use future_completer::{event_loop, Future, Next};
///
/// let doubled = Future::<u32, String>::value(21).then(|n| Ok(Next::Value(n * 2)));
///
/// assert_eq!(event_loop::run_until(&doubled).unwrap(), Ok(42));
/// ```
pub struct Future<T, E> {
    inner: Rc<RefCell<Inner<T, E>>>,
}

struct Inner<T, E> {
    outcome: Option<Result<T, E>>,
    dispatched: bool,
    continuations: Vec<Continuation<T, E>>,
}

// Can't derive Clone without forcing T: Clone and E: Clone on the handle.
impl<T, E> Clone for Future<T, E> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T, E> fmt::Debug for Future<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        let state = match inner.outcome {
            None => "pending",
            Some(Ok(_)) => "value",
            Some(Err(_)) => "error",
        };
        f.debug_struct("Future")
            .field("state", &state)
            .field("dispatched", &inner.dispatched)
            .field("continuations", &inner.continuations.len())
            .finish()
    }
}

impl<T, E> Future<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// A pending future with no continuations.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                outcome: None,
                dispatched: false,
                continuations: vec![],
            })),
        }
    }

    fn settled(outcome: Result<T, E>) -> Self {
        let future = Self::new();
        future.inner.borrow_mut().outcome = Some(outcome);
        future.schedule_dispatch();
        future
    }

    /// A future already settled with `value`.
    pub fn value(value: T) -> Self {
        Self::settled(Ok(value))
    }

    /// A future settled with the value `producer` returns, evaluated now.
    pub fn value_with<F: FnOnce() -> T>(producer: F) -> Self {
        Self::settled(Ok(producer()))
    }

    /// A future already settled with `error`.
    pub fn error(error: E) -> Self {
        Self::settled(Err(error))
    }

    pub fn error_with<F: FnOnce() -> E>(producer: F) -> Self {
        Self::settled(Err(producer()))
    }

    /// Runs `computation` now and settles with whatever it returns.
    ///
    /// ```
    /// use future_completer::{event_loop, Future};
    ///
    /// let parsed = Future::sync(|| "17".parse::<u8>());
    /// assert_eq!(event_loop::run_until(&parsed).unwrap(), Ok(17));
    /// ```
    pub fn sync<F: FnOnce() -> Result<T, E>>(computation: F) -> Self {
        Self::settled(computation())
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.inner.borrow().outcome.is_none()
    }

    /// Settles the future and queues its dispatch turn.
    pub(crate) fn settle(&self, outcome: Result<T, E>) -> Result<(), Error> {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.outcome.is_some() {
                return Err(Error::AlreadyCompleted);
            }
            debug!("completing future (error: {})", outcome.is_err());
            inner.outcome = Some(outcome);
        }
        self.schedule_dispatch();
        Ok(())
    }

    fn schedule_dispatch(&self) {
        let future = self.clone();
        event_loop::schedule(Box::new(move || future.dispatch()));
    }

    // Runs every continuation registered so far, in registration order.
    fn dispatch(&self) -> Result<(), Error> {
        let (outcome, continuations) = {
            let mut inner = self.inner.borrow_mut();
            inner.dispatched = true;
            let continuations = std::mem::take(&mut inner.continuations);
            if continuations.is_empty() {
                return match &inner.outcome {
                    Some(Err(error)) => {
                        warn!("error reached a future with no continuations");
                        Err(Error::Unhandled(Unhandled::new(error.clone())))
                    }
                    _ => Ok(()),
                };
            }
            match inner.outcome.clone() {
                Some(outcome) => (outcome, continuations),
                None => return Ok(()),
            }
        };

        trace!("dispatching {} continuation(s)", continuations.len());
        let mut result = Ok(());
        let mut continuations = continuations.into_iter().peekable();
        while let Some(continuation) = continuations.next() {
            let outcome = match continuations.peek() {
                Some(_) => outcome.clone(),
                None => return result.and(continuation(outcome)),
            };
            if let Err(err) = continuation(outcome) {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }
        result
    }

    /// Registers `continuation` to receive the settled outcome.
    ///
    /// Before the dispatch turn it joins the list; afterwards it gets a turn
    /// of its own.
    pub(crate) fn subscribe(&self, continuation: Continuation<T, E>) {
        let mut inner = self.inner.borrow_mut();
        if !inner.dispatched {
            inner.continuations.push(continuation);
            return;
        }
        if let Some(outcome) = inner.outcome.clone() {
            drop(inner);
            trace!("future already dispatched, scheduling late continuation");
            event_loop::schedule(Box::new(move || continuation(outcome)));
        }
    }

    fn register<U, F>(&self, on_value: F, on_error: Option<ErrorHandler<U, E>>) -> Future<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Next<U, E>, E> + 'static,
    {
        let result = Future::new();
        let target = result.clone();
        self.subscribe(Box::new(move |outcome| {
            let next = match outcome {
                Ok(value) => on_value(value),
                Err(error) => match on_error {
                    Some(on_error) => on_error(error),
                    None => Err(error),
                },
            };
            match next {
                Ok(Next::Value(value)) => target.settle(Ok(value)),
                Ok(Next::Chain(inner)) => {
                    inner.subscribe(Box::new(move |outcome| target.settle(outcome)));
                    Ok(())
                }
                Err(error) => target.settle(Err(error)),
            }
        }));
        result
    }

    /// Maps the settled value through `on_value`.
    ///
    /// An error skips `on_value` and settles the returned future with the
    /// same error.
    pub fn then<U, F>(&self, on_value: F) -> Future<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Next<U, E>, E> + 'static,
    {
        self.register(on_value, None)
    }

    /// Like [`then`](Future::then), with `on_error` handling an error.
    pub fn then_or_else<U, F, G>(&self, on_value: F, on_error: G) -> Future<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Next<U, E>, E> + 'static,
        G: FnOnce(E) -> Result<Next<U, E>, E> + 'static,
    {
        self.register(on_value, Some(Box::new(on_error)))
    }

    /// Like [`then_or_else`](Future::then_or_else), taking the error handler
    /// from `options`.
    ///
    /// Fails with [`Error::InvalidArgument`] when `options` carries no error
    /// handler.
    pub fn then_with<U, F>(&self, on_value: F, options: ThenOptions<U, E>) -> Result<Future<U, E>, Error>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Next<U, E>, E> + 'static,
    {
        let on_error = options
            .on_error
            .ok_or_else(|| Error::InvalidArgument("then options must provide an on_error handler".into()))?;
        Ok(self.register(on_value, Some(on_error)))
    }

    /// Observes the value without replacing it.
    pub fn inspect<F>(&self, on_value: F) -> Future<T, E>
    where
        F: FnOnce(&T) -> Result<(), E> + 'static,
    {
        self.then(move |value| {
            on_value(&value)?;
            Ok(Next::Value(value))
        })
    }

    /// Recovers from any error with the value `on_error` produces.
    pub fn catch_error<F>(&self, on_error: F) -> Future<T, E>
    where
        F: FnOnce(E) -> Result<Next<T, E>, E> + 'static,
    {
        self.then_or_else(|value| Ok(Next::Value(value)), on_error)
    }

    /// Recovers only from errors `test` accepts; the rest propagate as is.
    ///
    /// ```
    /// use future_completer::{event_loop, Future, Next};
    ///
    /// let recovered = Future::<i32, &str>::error("not found")
    ///     .catch_error_when(|_| Ok(Next::Value(-1)), |e| e.starts_with("timeout"))
    ///     .catch_error(|_| Ok(Next::Value(0)));
    ///
    /// assert_eq!(event_loop::run_until(&recovered).unwrap(), Ok(0));
    /// ```
    pub fn catch_error_when<F, P>(&self, on_error: F, test: P) -> Future<T, E>
    where
        F: FnOnce(E) -> Result<Next<T, E>, E> + 'static,
        P: FnOnce(&E) -> bool + 'static,
    {
        self.catch_error(move |error| if test(&error) { on_error(error) } else { Err(error) })
    }

    /// Runs `action` once this future settles, either way.
    ///
    /// The outcome passes through unchanged unless `action` fails, in which
    /// case its error takes over. Futures started by `action` are not waited
    /// for.
    pub fn when_complete<F>(&self, action: F) -> Future<T, E>
    where
        F: FnOnce() -> Result<(), E> + 'static,
    {
        let result = Future::new();
        let target = result.clone();
        self.subscribe(Box::new(move |outcome| match action() {
            Ok(()) => target.settle(outcome),
            Err(error) => target.settle(Err(error)),
        }));
        result
    }
}

impl<T, E> Default for Future<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
