//! Indicator engine.
//!
//! Responsibilities:
//!
//! - trailing-window primitives (`rolling`)
//! - rho / ia_14 / EPG formulas for one area's series (`epg`)
//! - partitioning a combined table by (group, area) and computing all
//!   partitions in parallel (`engine`)

pub mod engine;
pub mod epg;
pub mod rolling;

pub use engine::*;
pub use epg::*;
pub use rolling::*;
