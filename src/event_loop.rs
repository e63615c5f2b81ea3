//! The thread-local task queue that every continuation is dispatched through.
//!
//! Settling a future never runs its continuations inline. Instead a dispatch
//! task is queued here and runs on a later turn, once the host drains the
//! queue with [`run_until_idle`] or [`run_until`]. Handlers registered with
//! `then` are therefore never invoked before `then` returns.
//!
use crate::{Error, Future, Unhandled};
use log::{trace, warn};
use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::{Rc, Weak},
};

pub(crate) type Task = Box<dyn FnOnce() -> Result<(), Error>>;

thread_local! {
    static QUEUE: RefCell<VecDeque<Task>> = RefCell::new(VecDeque::new());
}

pub(crate) fn schedule(task: Task) {
    QUEUE.with(|queue| queue.borrow_mut().push_back(task));
}

fn next_task() -> Option<Task> {
    QUEUE.with(|queue| queue.borrow_mut().pop_front())
}

/// Queue a host task, the way a timer or an I/O callback would fire later.
///
/// # Examples
///
/// ```
/// use future_completer::{event_loop, Completer};
///
/// let completer = Completer::<u32, String>::new();
/// let future = completer.future();
/// event_loop::defer(move || completer.complete(1));
///
/// assert_eq!(event_loop::run_until(&future).unwrap(), Ok(1));
/// ```
pub fn defer<F>(task: F)
where
    F: FnOnce() -> Result<(), Error> + 'static,
{
    schedule(Box::new(task))
}

/// Runs queued tasks in FIFO order until the queue is empty.
///
/// Tasks queued while draining run in the same call. The first task that
/// fails stops the loop and its error is returned; tasks behind it stay
/// queued for the next call.
pub fn run_until_idle() -> Result<(), Error> {
    while let Some(task) = next_task() {
        task()?;
    }
    Ok(())
}

/// Drives the queue until `future` settles and returns its outcome.
///
/// An error `future` settles with counts as handled only while this call is
/// running; one that arrives after it returned surfaces as
/// [`Error::Unhandled`]. Fails with [`Error::Stalled`] when the queue runs
/// dry first.
pub fn run_until<T, E>(future: &Future<T, E>) -> Result<Result<T, E>, Error>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    let slot = Rc::new(Cell::new(None));
    let target = Rc::downgrade(&slot);
    future.subscribe(Box::new(move |outcome| deliver(&target, outcome, Cell::set)));

    loop {
        if let Some(outcome) = slot.take() {
            return Ok(outcome);
        }
        match next_task() {
            Some(task) => task()?,
            None => {
                trace!("event loop idle before the awaited future settled");
                return Err(Error::Stalled);
            }
        }
    }
}

/// Hands `outcome` to the slot behind `target`, or reports an error nobody
/// is left to receive.
pub(crate) fn deliver<S, T, E, F>(target: &Weak<S>, outcome: Result<T, E>, store: F) -> Result<(), Error>
where
    E: 'static,
    F: FnOnce(&S, Option<Result<T, E>>),
{
    match (target.upgrade(), outcome) {
        (Some(slot), outcome) => {
            store(&*slot, Some(outcome));
            Ok(())
        }
        (None, Err(error)) => {
            warn!("error settled a future whose receiver is gone");
            Err(Error::Unhandled(Unhandled::new(error)))
        }
        (None, Ok(_)) => Ok(()),
    }
}

/// True when no task is waiting to run.
pub fn is_idle() -> bool {
    pending_tasks() == 0
}

pub fn pending_tasks() -> usize {
    QUEUE.with(|queue| queue.borrow().len())
}
