//! Prior-result lookup across local and shared stores.

mod cascade;

pub use cascade::{CacheLookup, CacheTier, ThreeTierCache, TierStats};
