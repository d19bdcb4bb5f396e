//! `epg-monitor` library crate.
//!
//! Normalizes heterogeneous regional case-count CSVs into one canonical daily
//! table and derives the EPG (effective potential growth) indicators from it.
//!
//! The binary (`epg`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - sources can be added through configuration rather than code

pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod indicators;
pub mod io;
pub mod logging;
pub mod normalize;
pub mod population;
pub mod report;
