//! Hand-off of resource callbacks from the network tasks to a dedicated consumer thread.
//!
//! The dispatcher never runs user code itself: it enqueues a [`CallbackMessage`] without
//! waiting and returns to the client. A single thread named `resource-callback` dequeues the
//! messages and invokes each callback with `(uri, method, body)`. The queue is bounded; a
//! message that does not fit is dropped with a warning.

use std::fmt;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use http::Method;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

const THREAD_NAME: &str = "resource-callback";

/// User code notified about requests to a resource.
///
/// Runs on the relay thread, so it may block without stalling request handling.
pub trait ResourceCallback: Send + Sync + 'static {
    fn call(&self, uri: &str, method: &Method, body: &Bytes);
}

impl<F> ResourceCallback for F
where
    F: Fn(&str, &Method, &Bytes) + Send + Sync + 'static,
{
    fn call(&self, uri: &str, method: &Method, body: &Bytes) {
        self(uri, method, body);
    }
}

/// One pending callback invocation.
pub struct CallbackMessage {
    callback: Arc<dyn ResourceCallback>,
    uri: Arc<str>,
    method: Method,
    body: Bytes,
}

impl fmt::Debug for CallbackMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackMessage").field("uri", &self.uri).field("method", &self.method).field("body_len", &self.body.len()).finish()
    }
}

impl CallbackMessage {
    pub fn new(callback: Arc<dyn ResourceCallback>, uri: Arc<str>, method: Method, body: Bytes) -> Self {
        Self { callback, uri, method, body }
    }

    fn deliver(self) {
        let CallbackMessage { callback, uri, method, body } = self;
        debug!(uri = %uri, %method, body_len = body.len(), "invoking resource callback");

        if catch_unwind(AssertUnwindSafe(|| callback.call(&uri, &method, &body))).is_err() {
            error!(uri = %uri, %method, "resource callback panicked");
        }
    }
}

enum Command {
    Invoke(CallbackMessage),
    Shutdown,
}

pub struct CallbackRelay {
    sender: mpsc::Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for CallbackRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRelay").field("capacity", &self.sender.max_capacity()).field("closed", &self.sender.is_closed()).finish()
    }
}

impl CallbackRelay {
    /// Spawns the consumer thread with a queue of `capacity` messages.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn start(capacity: usize) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel(capacity);
        let worker = thread::Builder::new().name(THREAD_NAME.to_owned()).spawn(move || consume(receiver))?;

        info!(capacity, "callback relay started");
        Ok(Self { sender, worker: Mutex::new(Some(worker)) })
    }

    /// Enqueues `message` without waiting, returns whether it was accepted.
    pub fn hand_off(&self, message: CallbackMessage) -> bool {
        match self.sender.try_send(Command::Invoke(message)) {
            Ok(()) => true,
            Err(TrySendError::Full(Command::Invoke(message))) => {
                warn!(uri = %message.uri, method = %message.method, "callback relay is full, dropping callback");
                false
            }
            Err(TrySendError::Closed(_) | TrySendError::Full(Command::Shutdown)) => {
                warn!("callback relay is stopped, dropping callback");
                false
            }
        }
    }

    /// Delivers everything already queued, then stops the consumer thread.
    ///
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        if self.sender.send(Command::Shutdown).await.is_err() {
            debug!("callback relay consumer already gone");
        }

        match tokio::task::spawn_blocking(move || worker.join()).await {
            Ok(Ok(())) => info!("callback relay stopped"),
            Ok(Err(_panic)) => error!("callback relay thread panicked"),
            Err(e) => error!(cause = %e, "can't join callback relay thread"),
        }
    }
}

fn consume(mut receiver: mpsc::Receiver<Command>) {
    while let Some(command) = receiver.blocking_recv() {
        match command {
            Command::Invoke(message) => message.deliver(),
            Command::Shutdown => break,
        }
    }
    debug!("callback relay consumer finished");
}
