// Pipeline workers -- named threads feeding bounded channels.
//
// Every stage runs on its own thread and owns the sending half of its
// output channel. When the stage returns, the sender drops and the
// consumer sees the channel close.

use std::thread::JoinHandle;

use crossbeam_channel::{Iter, Receiver};

use crate::error::{Result, TakeoutError};

/// Spawn a named stage thread.
pub fn spawn_worker<F>(name: &str, f: F) -> Result<JoinHandle<Result<()>>>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let result = f();
            match &result {
                Ok(()) => log::debug!("{} finished", std::thread::current().name().unwrap_or("worker")),
                Err(TakeoutError::Cancelled) => {
                    log::debug!("{} cancelled", std::thread::current().name().unwrap_or("worker"))
                }
                Err(e) => log::error!("{}: {}", std::thread::current().name().unwrap_or("worker"), e),
            }
            result
        })
        .map_err(TakeoutError::Io)
}

/// Output of a running pipeline: the receiving end plus the threads
/// producing into it.
pub struct Stream<T> {
    receiver: Receiver<T>,
    workers: Vec<JoinHandle<Result<()>>>,
}

impl<T> Stream<T> {
    pub fn new(receiver: Receiver<T>, workers: Vec<JoinHandle<Result<()>>>) -> Self {
        Self { receiver, workers }
    }

    pub fn receiver(&self) -> &Receiver<T> {
        &self.receiver
    }

    /// Blocking iterator; ends when every producer is done.
    pub fn iter(&self) -> Iter<'_, T> {
        self.receiver.iter()
    }

    /// Split into the receiver and the worker handles, to chain another stage.
    pub fn into_parts(self) -> (Receiver<T>, Vec<JoinHandle<Result<()>>>) {
        (self.receiver, self.workers)
    }

    /// Drop the receiver and wait for the workers. Cancellation is reported
    /// as `Err(Cancelled)`, after any other failure.
    pub fn join(self) -> Result<()> {
        let Stream { receiver, workers } = self;
        drop(receiver);

        let mut cancelled = false;
        let mut failure = None;
        for handle in workers {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(TakeoutError::Cancelled)) => cancelled = true,
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                }
                Err(_) => {
                    failure.get_or_insert(TakeoutError::Other("pipeline worker panicked".to_string()));
                }
            }
        }
        match failure {
            Some(e) => Err(e),
            None if cancelled => Err(TakeoutError::Cancelled),
            None => Ok(()),
        }
    }
}
