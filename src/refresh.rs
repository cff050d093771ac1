//! Background refresh worker.
//!
//! A single long-lived thread runs refresh jobs. Submission goes through a
//! one-slot gate: a job can only be queued while holding the slot's
//! [`RefreshPermit`], and the permit is released when the job finishes (or
//! panics). While a job is queued or running every other submission is
//! rejected with [`SubmitError::Busy`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Default)]
struct Slot {
    busy: AtomicBool,
}

/// Proof that the caller owns the refresh slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct RefreshPermit {
    slot: Arc<Slot>,
}

impl Drop for RefreshPermit {
    fn drop(&mut self) {
        self.slot.busy.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("a refresh is already in flight")]
    Busy,
    #[error("refresh worker has shut down")]
    WorkerGone,
}

/// Owns the refresh thread. Dropping the worker closes its queue; the thread
/// exits after finishing the job it is running, if any.
#[derive(Debug)]
pub struct RefreshWorker {
    slot: Arc<Slot>,
    sender: Sender<(RefreshPermit, Job)>,
}

impl RefreshWorker {
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<(RefreshPermit, Job)>();

        thread::Builder::new().name(name.to_string()).spawn(move || {
            for (permit, job) in receiver {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    log::error!("refresh job panicked");
                }
                drop(permit);
            }
        })?;

        Ok(RefreshWorker {
            slot: Arc::new(Slot::default()),
            sender,
        })
    }

    /// Whether a job is queued or running.
    pub fn is_busy(&self) -> bool {
        self.slot.busy.load(Ordering::Acquire)
    }

    /// Queues `job` unless another one holds the slot.
    pub fn try_submit<F>(&self, job: F) -> Result<(), SubmitError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self
            .slot
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SubmitError::Busy);
        }
        let permit = RefreshPermit {
            slot: Arc::clone(&self.slot),
        };

        // On failure the permit comes back inside the error and is dropped
        // here, freeing the slot.
        self.sender
            .send((permit, Box::new(job)))
            .map_err(|_| SubmitError::WorkerGone)
    }
}
