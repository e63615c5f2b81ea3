//! `.await` support for [`Future`].
//!
use crate::{event_loop, Future};
use std::{
    cell::RefCell,
    future::{Future as StdFuture, IntoFuture},
    pin::Pin,
    rc::Rc,
    task::{Context, Poll, Waker},
};

/// A `std::future::Future` resolving to the outcome of a [`Future`].
///
/// The first poll registers a continuation, so an awaited error counts as
/// handled while the `Awaited` is alive; once it is dropped, a later error
/// surfaces as [`Error::Unhandled`](crate::Error::Unhandled). Progress still
/// needs the event loop to be driven. Polling again after `Ready` yields the
/// same outcome.
#[derive(Debug)]
pub struct Awaited<T, E> {
    future: Future<T, E>,
    slot: Option<Rc<RefCell<Slot<T, E>>>>,
}

#[derive(Debug)]
struct Slot<T, E> {
    outcome: Option<Result<T, E>>,
    waker: Option<Waker>,
}

impl<T, E> StdFuture for Awaited<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(slot) = &this.slot {
            let mut slot = slot.borrow_mut();
            if let Some(outcome) = slot.outcome.clone() {
                return Poll::Ready(outcome);
            }
            slot.waker = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let slot = Rc::new(RefCell::new(Slot {
            outcome: None,
            waker: Some(cx.waker().clone()),
        }));
        let target = Rc::downgrade(&slot);
        this.future.subscribe(Box::new(move |outcome| {
            event_loop::deliver(&target, outcome, |slot: &RefCell<Slot<T, E>>, outcome| {
                let waker = {
                    let mut slot = slot.borrow_mut();
                    slot.outcome = outcome;
                    slot.waker.take()
                };
                if let Some(waker) = waker {
                    waker.wake()
                }
            })
        }));
        this.slot = Some(slot);
        Poll::Pending
    }
}

impl<T, E> IntoFuture for Future<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    type Output = Result<T, E>;
    type IntoFuture = Awaited<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        Awaited { future: self, slot: None }
    }
}

#[cfg(test)]
mod tests {
    use crate::event_loop::run_until_idle;
    use crate::{Completer, Error, Future};
    use futures::task::noop_waker_ref;
    use futures::FutureExt;
    use std::future::IntoFuture;
    use std::task::{Context, Poll};

    #[test]
    fn test_awaited_resolves_after_the_loop_runs() {
        let completer = Completer::<u32, ()>::new();
        let mut awaited = completer.future().into_future();
        let mut cx = Context::from_waker(noop_waker_ref());

        assert_eq!(awaited.poll_unpin(&mut cx), Poll::Pending);
        completer.complete(7).unwrap();
        assert_eq!(awaited.poll_unpin(&mut cx), Poll::Pending);

        run_until_idle().unwrap();
        assert_eq!(awaited.poll_unpin(&mut cx), Poll::Ready(Ok(7)));
    }

    #[test]
    fn test_awaited_error_counts_as_handled() {
        let mut awaited = Future::<u32, &str>::error("nope").into_future();
        let mut cx = Context::from_waker(noop_waker_ref());

        assert_eq!(awaited.poll_unpin(&mut cx), Poll::Pending);
        run_until_idle().unwrap();
        assert_eq!(awaited.poll_unpin(&mut cx), Poll::Ready(Err("nope")));
    }

    #[test]
    fn test_awaited_repeats_its_outcome() {
        let mut awaited = Future::<u32, ()>::value(3).into_future();
        let mut cx = Context::from_waker(noop_waker_ref());

        assert_eq!(awaited.poll_unpin(&mut cx), Poll::Pending);
        run_until_idle().unwrap();
        assert_eq!(awaited.poll_unpin(&mut cx), Poll::Ready(Ok(3)));
        assert_eq!(awaited.poll_unpin(&mut cx), Poll::Ready(Ok(3)));
    }

    #[test]
    fn test_dropped_awaited_leaves_the_error_unhandled() {
        let completer = Completer::<u32, &str>::new();
        let mut awaited = completer.future().into_future();
        let mut cx = Context::from_waker(noop_waker_ref());
        assert_eq!(awaited.poll_unpin(&mut cx), Poll::Pending);
        drop(awaited);

        completer.complete_error("dropped").unwrap();
        match run_until_idle() {
            Err(Error::Unhandled(unhandled)) => {
                assert_eq!(unhandled.downcast_ref::<&str>(), Some(&"dropped"))
            }
            other => panic!("expected an unhandled error, got {:?}", other),
        }
    }
}
