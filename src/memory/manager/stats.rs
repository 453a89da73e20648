/*!
 * Allocator Statistics
 * Region usage, cache counters and the debug stack check
 */

use super::GeneralMemoryAllocator;
use crate::core::limits::STACK_COLLISION_MARGIN;
use crate::core::types::Size;
use crate::memory::types::{MemoryError, MemoryPressure, MemoryResult, MemoryStats};
use log::warn;
use std::cell::Cell;
use std::sync::atomic::Ordering;

thread_local! {
    /// Shallowest stack position seen by `check_stack` on this thread
    static STACK_BASE: Cell<usize> = const { Cell::new(0) };
}

impl GeneralMemoryAllocator {
    /// Snapshot of every region plus the eviction counters
    pub fn stats(&self) -> MemoryResult<MemoryStats> {
        let state = self.enter("stats")?;
        let regions: Vec<_> = state.regions.iter().map(|region| region.stats()).collect();
        let total_memory: Size = regions.iter().map(|r| r.size).sum();
        let available_memory: Size = regions.iter().map(|r| r.free_bytes).sum();
        let used_memory = total_memory - available_memory;
        let usage_percentage = if total_memory > 0 {
            (used_memory as f64 / total_memory as f64) * 100.0
        } else {
            0.0
        };

        Ok(MemoryStats {
            regions,
            total_memory,
            used_memory,
            available_memory,
            usage_percentage,
            registered_stealables: state.cache.len(),
            queued_stealables: state.cache.queued_len(),
            cache: state.cache.stats(),
        })
    }

    pub fn memory_pressure(&self) -> MemoryResult<MemoryPressure> {
        let pressure = self.stats()?.memory_pressure();
        if pressure == MemoryPressure::Critical {
            warn!("Memory pressure {}", pressure);
        }
        Ok(pressure)
    }

    /// Explicit full consistency sweep, independent of `verify_invariants`
    pub fn check_invariants(&self) -> MemoryResult<()> {
        let state = self.enter("check_invariants")?;
        state.check_invariants().map_err(|e| self.fault(e))
    }

    /// Debug-build guard against nested calls and stack exhaustion
    ///
    /// Flags a call made while the allocator guard is held and records the deepest stack
    /// distance seen since the first check on this thread. Does nothing in release builds.
    pub fn check_stack(&self, caller: &str) -> MemoryResult<()> {
        if !cfg!(debug_assertions) {
            return Ok(());
        }
        if self.is_locked() {
            return Err(self.fault(MemoryError::Reentrancy {
                operation: "check_stack",
            }));
        }

        let marker = 0u8;
        let here = std::hint::black_box(&marker) as *const u8 as usize;
        let base = STACK_BASE.with(|base| {
            base.set(base.get().max(here));
            base.get()
        });
        let depth = base - here;
        self.deepest_stack.fetch_max(depth, Ordering::Relaxed);

        let headroom = self.config.stack_limit.saturating_sub(depth);
        if headroom < STACK_COLLISION_MARGIN {
            return Err(self.fault(MemoryError::StackCollision {
                caller: caller.to_string(),
                headroom,
            }));
        }
        Ok(())
    }

    /// Deepest stack distance recorded by `check_stack`
    pub fn deepest_stack_usage(&self) -> Size {
        self.deepest_stack.load(Ordering::Relaxed)
    }
}
