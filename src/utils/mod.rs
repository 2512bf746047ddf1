//! Utils Module - Shared infrastructure
//!
//! Identity hashing, the dataset cache and service-wide constants.

pub mod cache;
pub mod constants;
pub mod identity;

pub use cache::*;
pub use constants::*;
pub use identity::*;
