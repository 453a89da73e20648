/*!
 * Allocator Configuration
 *
 * Region layout and stealing bounds. The default layout is the fixed hardware
 * partitioning from `core::limits`; hosted tools and tests may build their own.
 */

use super::types::RegionTier;
use crate::core::errors::{ConfigError, ConfigResult};
use crate::core::limits::*;
use crate::core::types::{align_up, Address, AddressRange, Size};
use serde::{Deserialize, Serialize};

/// Geometry and placement tuning for one region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub tier: RegionTier,
    pub base: Address,
    pub size: Size,
    /// Block starts and sizes are multiples of this (power of two)
    pub granule: Size,
    /// Leftover at or below this is handed out instead of split off
    pub min_split: Size,
    /// Requests at or below this are carved from the end of a free block
    pub pivot: Size,
}

impl RegionConfig {
    /// Large-region defaults
    pub const fn new(tier: RegionTier, base: Address, size: Size) -> Self {
        Self {
            tier,
            base,
            size,
            granule: DEFAULT_GRANULE,
            min_split: DEFAULT_MIN_SPLIT,
            pivot: 0,
        }
    }

    /// Small-object region defaults: coarser granule, small requests packed at the end
    pub const fn small_objects(tier: RegionTier, base: Address, size: Size) -> Self {
        Self {
            tier,
            base,
            size,
            granule: SMALL_REGION_GRANULE,
            min_split: SMALL_REGION_MIN_SPLIT,
            pivot: SMALL_REGION_PIVOT,
        }
    }

    pub const fn with_granule(mut self, granule: Size) -> Self {
        self.granule = granule;
        self
    }

    pub const fn with_min_split(mut self, min_split: Size) -> Self {
        self.min_split = min_split;
        self
    }

    pub const fn with_pivot(mut self, pivot: Size) -> Self {
        self.pivot = pivot;
        self
    }

    pub const fn range(&self) -> AddressRange {
        AddressRange::new(self.base, self.size)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let tier = self.tier.name().to_string();
        if self.size == 0 {
            return Err(ConfigError::EmptyRegion { tier });
        }
        if self.base == 0 {
            return Err(ConfigError::NullBase { tier });
        }
        if !self.granule.is_power_of_two() {
            return Err(ConfigError::BadGranule {
                tier,
                granule: self.granule,
            });
        }
        if self.base % self.granule != 0 || self.size % self.granule != 0 {
            return Err(ConfigError::Misaligned {
                tier,
                base: self.base,
                granule: self.granule,
            });
        }
        Ok(())
    }
}

/// The five regions, indexed by tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLayout {
    regions: [RegionConfig; RegionTier::COUNT],
}

impl MemoryLayout {
    /// Build a layout from per-tier configs; order of the argument does not matter
    pub fn new(configs: [RegionConfig; RegionTier::COUNT]) -> ConfigResult<Self> {
        let mut regions = configs;
        regions.sort_by_key(|c| c.tier.index());
        for (i, config) in regions.iter().enumerate() {
            if config.tier.index() != i {
                return Err(ConfigError::DuplicateTier {
                    tier: config.tier.name().to_string(),
                });
            }
        }
        let layout = Self { regions };
        layout.validate()?;
        Ok(layout)
    }

    /// Compact layout for hosted use: regions packed back to back from `base`
    ///
    /// Sizes are given in table order (stealable, internal, external, small external,
    /// small internal).
    pub fn packed(base: Address, sizes: [Size; RegionTier::COUNT]) -> ConfigResult<Self> {
        let mut next = base;
        let configs = RegionTier::ALL.map(|tier| {
            let size = sizes[tier.index()];
            let config = match tier {
                RegionTier::ExternalSmall | RegionTier::InternalSmall => {
                    RegionConfig::small_objects(tier, next, size)
                }
                _ => RegionConfig::new(tier, next, size),
            };
            // Keep following bases aligned for the coarsest granule
            next = align_up(next + size, SMALL_REGION_GRANULE);
            config
        });
        Self::new(configs)
    }

    pub fn region(&self, tier: RegionTier) -> &RegionConfig {
        &self.regions[tier.index()]
    }

    pub fn region_mut(&mut self, tier: RegionTier) -> &mut RegionConfig {
        &mut self.regions[tier.index()]
    }

    pub fn regions(&self) -> impl Iterator<Item = &RegionConfig> {
        self.regions.iter()
    }

    pub fn total_size(&self) -> Size {
        self.regions.iter().map(|r| r.size).sum()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for config in &self.regions {
            config.validate()?;
        }
        for (i, a) in self.regions.iter().enumerate() {
            for b in &self.regions[i + 1..] {
                if a.range().overlaps(&b.range()) {
                    return Err(ConfigError::Overlap {
                        first: a.tier.name().to_string(),
                        second: b.tier.name().to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for MemoryLayout {
    /// Hardware partitioning: the top of SDRAM holds the small then general external
    /// reservations, everything between static data and those is stealable cache.
    fn default() -> Self {
        let external_small_end = EXTERNAL_MEMORY_END;
        let external_small_start = external_small_end - RESERVED_EXTERNAL_SMALL_ALLOCATOR;
        let external_end = external_small_start;
        let external_start = external_end - RESERVED_EXTERNAL_ALLOCATOR;
        let stealable_start = EXTERNAL_MEMORY_BEGIN + EXTERNAL_STATIC_RESERVED;
        let stealable_end = external_start;

        Self {
            regions: [
                RegionConfig::new(
                    RegionTier::Stealable,
                    stealable_start,
                    stealable_end - stealable_start,
                ),
                RegionConfig::new(
                    RegionTier::Internal,
                    INTERNAL_HEAP_BEGIN,
                    INTERNAL_HEAP_END - INTERNAL_HEAP_BEGIN,
                ),
                RegionConfig::new(RegionTier::External, external_start, external_end - external_start),
                RegionConfig::small_objects(
                    RegionTier::ExternalSmall,
                    external_small_start,
                    external_small_end - external_small_start,
                ),
                RegionConfig::small_objects(
                    RegionTier::InternalSmall,
                    INTERNAL_SMALL_BEGIN,
                    RESERVED_INTERNAL_SMALL,
                ),
            ],
        }
    }
}

/// Allocator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatorConfig {
    pub layout: MemoryLayout,
    /// Max stealables evicted for one request
    pub max_victims_per_steal: usize,
    /// Max queue entries examined as span anchors for one request
    pub max_candidates_per_steal: usize,
    /// Panic on misuse and reentrancy instead of returning the error
    pub trap_misuse: bool,
    /// Run the full region consistency check after every mutating call
    pub verify_invariants: bool,
    /// Stack budget `check_stack` measures against
    pub stack_limit: Size,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            layout: MemoryLayout::default(),
            max_victims_per_steal: MAX_VICTIMS_PER_STEAL,
            max_candidates_per_steal: MAX_CANDIDATES_PER_STEAL,
            trap_misuse: cfg!(debug_assertions),
            verify_invariants: false,
            stack_limit: PROGRAM_STACK_SIZE,
        }
    }
}

impl AllocatorConfig {
    /// Release firmware settings: never trap, no consistency sweeps
    pub fn firmware() -> Self {
        Self {
            trap_misuse: false,
            verify_invariants: false,
            ..Self::default()
        }
    }

    /// Alpha/test settings: trap misuse and verify every region after each mutation
    pub fn strict(layout: MemoryLayout) -> Self {
        Self {
            layout,
            trap_misuse: true,
            verify_invariants: true,
            ..Self::default()
        }
    }

    pub fn with_layout(mut self, layout: MemoryLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_max_victims(mut self, max_victims: usize) -> Self {
        self.max_victims_per_steal = max_victims;
        self
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates_per_steal = max_candidates;
        self
    }

    pub fn with_trap_misuse(mut self, trap: bool) -> Self {
        self.trap_misuse = trap;
        self
    }

    pub fn with_verify_invariants(mut self, verify: bool) -> Self {
        self.verify_invariants = verify;
        self
    }

    pub fn with_stack_limit(mut self, limit: Size) -> Self {
        self.stack_limit = limit;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.layout.validate()?;
        if self.max_victims_per_steal == 0 {
            return Err(ConfigError::ZeroBound {
                name: "max_victims_per_steal".to_string(),
            });
        }
        if self.max_candidates_per_steal == 0 {
            return Err(ConfigError::ZeroBound {
                name: "max_candidates_per_steal".to_string(),
            });
        }
        Ok(())
    }
}
