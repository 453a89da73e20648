/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::core::types::Address;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export MemoryError from memory module
pub use crate::memory::MemoryError;

/// Memory layout validation errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ConfigError {
    #[error("Region {tier} is empty")]
    #[diagnostic(
        code(config::empty_region),
        help("Every region needs a non-zero size. Check the layout constants.")
    )]
    EmptyRegion { tier: String },

    #[error("Region {tier} starts at the null address")]
    #[diagnostic(
        code(config::null_base),
        help("Address 0 is reserved for failed allocations. Move the region base.")
    )]
    NullBase { tier: String },

    #[error("Region {tier} base 0x{base:x} is not aligned to its granule {granule}")]
    #[diagnostic(
        code(config::misaligned_region),
        help("Region bases and sizes must be multiples of the region granule.")
    )]
    Misaligned {
        tier: String,
        base: Address,
        granule: usize,
    },

    #[error("Region {tier} granule {granule} is not a power of two")]
    #[diagnostic(code(config::bad_granule))]
    BadGranule { tier: String, granule: usize },

    #[error("Regions {first} and {second} overlap")]
    #[diagnostic(
        code(config::overlapping_regions),
        help("Each address may belong to exactly one region.")
    )]
    Overlap { first: String, second: String },

    #[error("Region {tier} is configured more than once")]
    #[diagnostic(code(config::duplicate_tier), help("A layout needs exactly one region per tier."))]
    DuplicateTier { tier: String },

    #[error("Stealing bound {name} must be at least 1")]
    #[diagnostic(code(config::zero_bound))]
    ZeroBound { name: String },
}

/// Result type for configuration
pub type ConfigResult<T> = Result<T, ConfigError>;
