use crate::{Completer, Future};
use log::trace;
use std::cell::RefCell;
use std::rc::Rc;

struct Gather<T> {
    remaining: usize,
    values: Vec<Option<T>>,
}

impl<T, E> Future<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Waits for every future in `futures`.
    ///
    /// Settles with the values in input order once all of them succeed, or
    /// with the first error any of them reports. Later errors are dropped.
    ///
    /// ```
    /// use future_completer::{event_loop, Future};
    ///
    /// let all = Future::wait(vec![Future::<u8, ()>::value(1), Future::value(2)]);
    /// assert_eq!(event_loop::run_until(&all).unwrap(), Ok(vec![1, 2]));
    /// ```
    pub fn wait<I>(futures: I) -> Future<Vec<T>, E>
    where
        I: IntoIterator<Item = Future<T, E>>,
    {
        let futures: Vec<_> = futures.into_iter().collect();
        if futures.is_empty() {
            return Future::value(vec![]);
        }

        trace!("waiting on {} futures", futures.len());
        let completer = Rc::new(Completer::new());
        let gather = Rc::new(RefCell::new(Gather {
            remaining: futures.len(),
            values: futures.iter().map(|_| None).collect(),
        }));

        for (index, future) in futures.into_iter().enumerate() {
            let completer = completer.clone();
            let gather = gather.clone();
            future.subscribe(Box::new(move |outcome| match outcome {
                Ok(value) => {
                    let values = {
                        let mut gather = gather.borrow_mut();
                        gather.values[index] = Some(value);
                        gather.remaining -= 1;
                        if gather.remaining > 0 {
                            return Ok(());
                        }
                        std::mem::take(&mut gather.values)
                    };
                    completer.complete(values.into_iter().flatten().collect())
                }
                Err(error) if !completer.is_completed() => completer.complete_error(error),
                Err(_) => Ok(()),
            }));
        }

        completer.future()
    }

    /// Maps every item to a future with `f` and waits for all of them.
    ///
    /// `f` runs in input order; results line up with `items`.
    pub fn for_each<I, F>(items: I, f: F) -> Future<Vec<T>, E>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Future<T, E>,
    {
        let futures: Vec<_> = items.into_iter().map(f).collect();
        Self::wait(futures)
    }
}
