/*!
 * Reentrancy Guard
 * Entry-point guard and the single fault path for misuse
 *
 * Calls from other threads wait on the state lock. A call from the thread already
 * inside the allocator, i.e. from an eviction callback, is rejected before it can
 * deadlock on that lock.
 */

use super::{AllocatorState, GeneralMemoryAllocator};
use crate::memory::types::{MemoryError, MemoryResult};
use log::error;
use parking_lot::MutexGuard;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

/// No thread holds the guard
pub(super) const NO_OWNER: usize = 0;

static NEXT_THREAD_TOKEN: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    static THREAD_TOKEN: usize = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
}

fn current_thread() -> usize {
    THREAD_TOKEN.with(|token| *token)
}

/// Clears the owner on drop, unwinding included
struct OwnerGuard<'a>(&'a AtomicUsize);

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        self.0.store(NO_OWNER, Ordering::Release);
    }
}

/// Allocator state held for the span of one public call
///
/// Field order matters: the owner is cleared before the state lock is released.
pub(super) struct Entered<'a> {
    _owner: OwnerGuard<'a>,
    state: MutexGuard<'a, AllocatorState>,
}

impl Deref for Entered<'_> {
    type Target = AllocatorState;

    fn deref(&self) -> &AllocatorState {
        &self.state
    }
}

impl DerefMut for Entered<'_> {
    fn deref_mut(&mut self) -> &mut AllocatorState {
        &mut self.state
    }
}

impl GeneralMemoryAllocator {
    /// Take the guard for `operation`
    ///
    /// Waits for other threads; fails if the calling thread already holds it.
    pub(super) fn enter(&self, operation: &'static str) -> MemoryResult<Entered<'_>> {
        if self.is_locked() {
            return Err(self.fault(MemoryError::Reentrancy { operation }));
        }
        let state = self.state.lock();
        self.owner.store(current_thread(), Ordering::Release);
        Ok(Entered {
            _owner: OwnerGuard(&self.owner),
            state,
        })
    }

    /// Whether the calling thread is inside an allocator call
    pub fn is_locked(&self) -> bool {
        self.owner.load(Ordering::Acquire) == current_thread()
    }

    /// Report an error; misuse and reentrancy are logged and trapped when configured
    pub(super) fn fault(&self, error: MemoryError) -> MemoryError {
        if error.is_misuse() || error.is_reentrancy() {
            error!("Allocator fault: {}", error);
            if self.config.trap_misuse {
                panic!("allocator fault: {}", error);
            }
        }
        error
    }

    /// Sweep every region when `verify_invariants` is set
    ///
    /// Runs after a mutation has already landed, so a broken invariant cannot be handed
    /// back as an error without losing that mutation. Corruption always traps.
    pub(super) fn verify(&self, state: &AllocatorState) {
        if !self.config.verify_invariants {
            return;
        }
        if let Err(e) = state.check_invariants() {
            error!("Allocator state corrupted: {}", e);
            panic!("allocator state corrupted: {}", e);
        }
    }
}
