//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the group tag and canonical case rows (`Group`, `CaseRecord`)
//! - indicator outputs (`IndicatorRow`)
//! - the EPG risk bands and their threshold constants (`RiskBand`, `EPG_*`)

pub mod types;

pub use types::*;
