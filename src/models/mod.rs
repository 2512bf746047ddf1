//! Models Module - Data Structures & Configuration
//!
//! Records, filters, configuration and the error taxonomy.

pub mod config;
pub mod errors;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
