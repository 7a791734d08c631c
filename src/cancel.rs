// Cooperative cancellation shared by every pipeline stage

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{bounded, Receiver, Sender};

/// Clonable cancellation token. `done()` returns a channel that becomes
/// ready (disconnected) once `cancel()` has been called, so stages can wait
/// on it inside `crossbeam_channel::select!` next to their data channels.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    // Dropping the sender disconnects every clone of `done`
    trigger: Mutex<Option<Sender<()>>>,
    done: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(tx)),
                done: rx,
            }),
        }
    }

    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.inner.trigger.lock() {
            Ok(mut guard) => {
                guard.take();
            }
            Err(poisoned) => {
                poisoned.into_inner().take();
            }
        }
        log::debug!("cancellation requested");
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done
    }

    /// `Err(Cancelled)` once the token fired.
    pub fn check(&self) -> crate::error::Result<()> {
        if self.is_cancelled() {
            Err(crate::error::TakeoutError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Send `value` unless the token fires first. Returns false when the value
/// was not delivered (cancelled, or the receiver went away).
pub fn send_or_cancel<T>(tx: &Sender<T>, value: T, cancel: &CancelToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    crossbeam_channel::select! {
        send(tx, value) -> res => res.is_ok(),
        recv(cancel.done()) -> _ => false,
    }
}
