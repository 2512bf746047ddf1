//! Providers Module - Remote data sources

pub mod firebase;

pub use firebase::{FirebaseStore, RecordStore};
