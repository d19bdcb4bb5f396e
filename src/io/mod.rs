//! Input/output helpers.
//!
//! - raw source CSV ingest (`ingest`)
//! - indicator exports (CSV/JSON) (`export`)
//! - reading an exported table back as canonical rows (`canonical`)

pub mod canonical;
pub mod export;
pub mod ingest;

pub use canonical::*;
pub use export::*;
pub use ingest::*;
