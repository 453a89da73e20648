/*!
 * Span Planning
 *
 * Pure queries that find contiguous runs of free and stealable blocks. Nothing is
 * mutated here: plans list the stealables whose eviction would open the span, and the
 * allocator decides whether to commit them. Which stealables are eligible is answered
 * by the caller's predicate.
 */

use super::{Block, BlockId, MemoryRegion};
use crate::core::types::{align_down, align_up, Address, Size};
use crate::memory::types::{MemoryResult, StealableId};

/// Contiguous run that becomes one free block once its victims are evicted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanPlan {
    pub start: Address,
    pub size: Size,
    pub victims: Vec<StealableId>,
}

/// Result of planning a span around an anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanSearch {
    Found(SpanPlan),
    /// Enough neighbours exist but taking them would exceed the victim bound
    VictimBound(Vec<StealableId>),
    /// Ineligible or live neighbours close the span off
    Blocked(Vec<StealableId>),
}

/// Planned in-place growth of a live block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionPlan {
    pub address: Address,
    pub min: Size,
    pub ideal: Size,
    pub left: Size,
    pub right: Size,
    pub victims: Vec<StealableId>,
    /// Stopped short because of the victim bound
    pub bounded: bool,
}

impl ExtensionPlan {
    #[inline]
    pub fn available(&self) -> Size {
        self.left + self.right
    }

    /// Whether committing would grow the block by at least `min` without passing `ideal`
    #[inline]
    pub fn satisfies_min(&self) -> bool {
        self.ideal > 0 && self.min <= self.ideal && self.available() >= self.min
    }
}

/// Which way a span grows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl MemoryRegion {
    fn neighbour(&self, span_start: Address, span_end: Address, side: Side) -> Option<Block> {
        match side {
            Side::Right => self.block_at(span_end).map(|(_, block)| block),
            Side::Left => span_start
                .checked_sub(1)
                .and_then(|last| self.block_covering(last))
                .map(|(_, block)| block)
                .filter(|block| block.end() == span_start),
        }
    }

    /// First stealable neighbour the predicate accepts, right side first
    fn eligible_neighbour<F>(
        &self,
        span_start: Address,
        span_end: Address,
        eligible: &mut F,
    ) -> Option<(Side, Block, StealableId)>
    where
        F: FnMut(StealableId) -> bool,
    {
        [Side::Right, Side::Left].into_iter().find_map(|side| {
            let n = self.neighbour(span_start, span_end, side)?;
            let id = n.kind.stealable()?;
            eligible(id).then_some((side, n, id))
        })
    }

    /// Plan a span of at least `needed` bytes around the stealable block `anchor`
    ///
    /// Free neighbours are absorbed first; an eligible stealable neighbour (right before
    /// left) is only taken when no free one is left, after which free neighbours are
    /// checked again.
    pub fn plan_span<F>(
        &self,
        anchor: BlockId,
        needed: Size,
        mut eligible: F,
        max_victims: usize,
    ) -> SpanSearch
    where
        F: FnMut(StealableId) -> bool,
    {
        let Some(block) = self.block(anchor) else {
            return SpanSearch::Blocked(Vec::new());
        };
        let Some(owner) = block.kind.stealable() else {
            return SpanSearch::Blocked(Vec::new());
        };

        if needed > self.capacity() {
            return SpanSearch::Blocked(Vec::new());
        }
        let needed = align_up(needed.max(1), self.granule());
        let mut start = block.address;
        let mut end = block.end();
        let mut victims = vec![owner];
        if victims.len() > max_victims {
            return SpanSearch::VictimBound(victims);
        }

        while end - start < needed {
            let free_side = [Side::Right, Side::Left].into_iter().find_map(|side| {
                self.neighbour(start, end, side)
                    .filter(|n| n.kind.is_free())
                    .map(|n| (side, n))
            });
            if let Some((side, n)) = free_side {
                match side {
                    Side::Right => end = n.end(),
                    Side::Left => start = n.address,
                }
                continue;
            }

            let Some((side, n, id)) = self.eligible_neighbour(start, end, &mut eligible) else {
                return SpanSearch::Blocked(victims);
            };
            if victims.len() >= max_victims {
                return SpanSearch::VictimBound(victims);
            }
            victims.push(id);
            match side {
                Side::Right => end = n.end(),
                Side::Left => start = n.address,
            }
        }

        SpanSearch::Found(SpanPlan {
            start,
            size: end - start,
            victims,
        })
    }

    /// Plan growing the live block at `address` by at least `min` and at most `ideal` bytes
    ///
    /// Free space on both sides is counted first. Stealable neighbours are only taken
    /// while the total is still short of `min`, right side before left. `min` is rounded
    /// up and `ideal` rounded down to the granule.
    pub fn plan_extension<F>(
        &self,
        address: Address,
        min: Size,
        ideal: Size,
        mut eligible: F,
        max_victims: usize,
    ) -> MemoryResult<ExtensionPlan>
    where
        F: FnMut(StealableId) -> bool,
    {
        let (_, block) = self.live_block(address)?;
        // Nothing beyond the region size is reachable
        let min = align_up(min.min(self.capacity()), self.granule());
        let ideal = align_down(ideal.min(self.capacity()), self.granule());

        let mut plan = ExtensionPlan {
            address,
            min,
            ideal,
            left: 0,
            right: 0,
            victims: Vec::new(),
            bounded: false,
        };

        let mut start = block.address;
        let mut end = block.end();
        let absorb_free = |start: &mut Address, end: &mut Address, plan: &mut ExtensionPlan| {
            for side in [Side::Right, Side::Left] {
                if let Some(n) = self.neighbour(*start, *end, side).filter(|n| n.kind.is_free()) {
                    match side {
                        Side::Right => {
                            *end = n.end();
                            plan.right += n.size;
                        }
                        Side::Left => {
                            *start = n.address;
                            plan.left += n.size;
                        }
                    }
                }
            }
        };

        absorb_free(&mut start, &mut end, &mut plan);
        while plan.available() < min {
            let Some((side, n, id)) = self.eligible_neighbour(start, end, &mut eligible) else {
                break;
            };
            if plan.victims.len() >= max_victims {
                plan.bounded = true;
                break;
            }
            plan.victims.push(id);
            match side {
                Side::Right => {
                    end = n.end();
                    plan.right += n.size;
                }
                Side::Left => {
                    start = n.address;
                    plan.left += n.size;
                }
            }
            absorb_free(&mut start, &mut end, &mut plan);
        }

        Ok(plan)
    }
}
