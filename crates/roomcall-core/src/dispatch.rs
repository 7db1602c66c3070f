//! UI-thread marshaling
//!
//! Callbacks from the OS telephony integration and the media engine arrive on
//! their own threads. Anything with a UI-visible effect (navigation, closing
//! the call screen) is handed to a [`Dispatcher`] instead of being executed
//! inline on the callback thread.

use tracing::trace;

/// Executor boundary for UI-visible effects.
///
/// Implementations forward the task to whatever loop owns the UI. The
/// coordinator never runs these tasks inline.
pub trait Dispatcher: Send + Sync {
    /// Queue a task for execution on the UI-owning executor
    fn dispatch(&self, task: Box<dyn FnOnce() + Send>);
}

/// Default dispatcher that runs tasks on the tokio runtime.
///
/// Suitable for headless hosts and tests; GUI hosts supply their own
/// [`Dispatcher`] that posts to the main loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioDispatcher;

impl Dispatcher for TokioDispatcher {
    fn dispatch(&self, task: Box<dyn FnOnce() + Send>) {
        trace!("dispatching UI task onto runtime");
        tokio::spawn(async move {
            task();
        });
    }
}
