//! Core types and constants for trialstore
//!
//! This crate contains domain types shared across all other crates.

mod constants;
mod env_config;
mod error;
mod quality;
mod record;
mod stats;
mod trial;

pub use constants::*;
pub use env_config::*;
pub use error::*;
pub use quality::*;
pub use record::*;
pub use stats::*;
pub use trial::*;
