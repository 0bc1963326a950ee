//! Deferred invocation on the owner thread.
//!
//! Hook mutations and calls into hooked objects belong on the thread that owns the object,
//! usually the thread running the UI event loop. Background event sources (a thread draining
//! a native event queue, a settings watcher) hand their work to that thread through an
//! [`OwnerQueue`] instead of touching the object directly.
//!
//! The queue is a `calloop` channel registered as an event source on the owner loop. Posted
//! calls run in posting order during the loop's next dispatch, with mutable access to the
//! loop's shared state.
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//! use calloop::EventLoop;
//! use shimhook::marshal::OwnerQueue;
//!
//! let mut event_loop: EventLoop<Vec<u32>> = EventLoop::try_new().unwrap();
//! let queue = OwnerQueue::new(&event_loop.handle())?;
//!
//! let remote = queue.clone();
//! std::thread::spawn(move || remote.post(|seen: &mut Vec<u32>| seen.push(7)))
//!     .join()
//!     .unwrap()?;
//!
//! let mut seen = Vec::new();
//! event_loop.dispatch(Some(Duration::from_millis(100)), &mut seen).unwrap();
//! assert_eq!(seen, vec![7]);
//! # Ok::<(), shimhook::Error>(())
//! ```

use calloop::{
    channel::{self, Sender},
    LoopHandle, RegistrationToken,
};

use crate::{Error, Result};

/// A call deferred to the owner thread.
pub type Deferred<S> = Box<dyn FnOnce(&mut S) + Send>;

/// Sending half of a deferred-call queue drained by an owner event loop.
pub struct OwnerQueue<S> {
    sender: Sender<Deferred<S>>,
    token: RegistrationToken,
}

impl<S: 'static> OwnerQueue<S> {
    /// Registers a new queue on the loop behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventLoop`] if the loop refuses the channel source.
    pub fn new(handle: &LoopHandle<'_, S>) -> Result<Self> {
        let (sender, channel) = channel::channel::<Deferred<S>>();
        let token = handle
            .insert_source(channel, |event, _, state| {
                let channel::Event::Msg(call) = event else {
                    return;
                };
                call(state);
            })
            .map_err(|e| Error::EventLoop(e.error.to_string()))?;

        tracing::debug!("registered owner queue");
        Ok(OwnerQueue { sender, token })
    }

    /// Queues `call` to run on the owner thread.
    ///
    /// May be called from any thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueClosed`] once the owner loop has dropped the queue.
    pub fn post<F>(&self, call: F) -> Result<()>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.sender.send(Box::new(call)).map_err(|_| {
            tracing::warn!("owner queue closed, dropping deferred call");
            Error::QueueClosed
        })
    }

    /// Removes the queue from the loop behind `handle`; later posts fail with
    /// [`Error::QueueClosed`].
    pub fn close(&self, handle: &LoopHandle<'_, S>) {
        handle.remove(self.token);
    }
}

impl<S> Clone for OwnerQueue<S> {
    fn clone(&self) -> Self {
        OwnerQueue {
            sender: self.sender.clone(),
            token: self.token,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use calloop::EventLoop;

    use super::*;

    #[test]
    fn test_posts_run_in_order_on_dispatch() {
        let mut event_loop: EventLoop<Vec<u32>> = EventLoop::try_new().unwrap();
        let queue = OwnerQueue::new(&event_loop.handle()).unwrap();

        for n in 0..4 {
            queue.post(move |seen: &mut Vec<u32>| seen.push(n)).unwrap();
        }

        let mut seen = Vec::new();
        event_loop
            .dispatch(Some(Duration::from_millis(100)), &mut seen)
            .unwrap();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_post_after_close_fails() {
        let event_loop: EventLoop<Vec<u32>> = EventLoop::try_new().unwrap();
        let queue = OwnerQueue::new(&event_loop.handle()).unwrap();
        queue.close(&event_loop.handle());

        assert!(matches!(
            queue.post(|seen: &mut Vec<u32>| seen.push(1)),
            Err(Error::QueueClosed)
        ));
    }
}
