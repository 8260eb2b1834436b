//! One-shot completion slots for asynchronous device work.
//!
//! Device callbacks (buffer mapping, queue work-done, device loss) fire from
//! inside `Device::poll`, possibly on another thread. They only record their
//! outcome here; the meshing pipeline inspects the slot on a later tick and
//! advances its state machine from the tick thread.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::engine_state::rendering::meshing::MeshingError;

type Slot<T> = Arc<Mutex<Option<Result<T, MeshingError>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Receiving side of a pending device operation.
pub struct Completion<T> {
    slot: Slot<T>,
}

/// Sending side of a pending device operation, handed to the device callback.
pub struct CompletionSignal<T> {
    slot: Slot<T>,
}

/// Creates a linked completion and signal pair.
pub fn completion<T>() -> (Completion<T>, CompletionSignal<T>) {
    let slot = Arc::new(Mutex::new(None));
    (
        Completion { slot: slot.clone() },
        CompletionSignal { slot },
    )
}

impl<T> Completion<T> {
    /// Takes the outcome if the operation has finished.
    ///
    /// Returns `None` while the operation is still pending. Once an outcome
    /// has been taken, later calls return `None` again.
    pub fn try_take(&self) -> Option<Result<T, MeshingError>> {
        lock(&self.slot).take()
    }

    /// Whether an outcome is waiting to be taken.
    pub fn is_resolved(&self) -> bool {
        lock(&self.slot).is_some()
    }
}

impl<T> CompletionSignal<T> {
    /// Marks the operation as finished successfully.
    pub fn resolve(self, value: T) {
        *lock(&self.slot) = Some(Ok(value));
    }

    /// Marks the operation as failed.
    pub fn reject(self, error: MeshingError) {
        *lock(&self.slot) = Some(Err(error));
    }
}

/// Sticky record of the first fatal device condition.
///
/// Cloned into the device-lost and uncaptured-error handlers; checked by the
/// backend on every poll.
#[derive(Clone, Default)]
pub struct DeviceFault {
    reason: Arc<Mutex<Option<String>>>,
}

impl DeviceFault {
    /// Records `reason` unless a fault was already recorded.
    pub fn record(&self, reason: String) {
        let mut slot = lock(&self.reason);
        if slot.is_none() {
            *slot = Some(reason);
        }
    }

    /// The recorded fault, if any.
    pub fn check(&self) -> Result<(), MeshingError> {
        match lock(&self.reason).as_ref() {
            Some(reason) => Err(MeshingError::DeviceUnavailable(reason.clone())),
            None => Ok(()),
        }
    }
}
