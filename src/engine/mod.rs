//! Engine Module - Query Engine
//!
//! Pure computations over the in-memory record collection: filtering,
//! statistics and random sampling. Nothing in here performs I/O.

pub mod filter;
pub mod sampler;
pub mod stats;

pub use filter::{apply, haversine_km, validate_geo};
pub use sampler::{resolve_count, Sample};
pub use stats::{compute, ClassDistribution, DatasetStats, FallCounts};
