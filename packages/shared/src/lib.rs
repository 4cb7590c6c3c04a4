//! Utilities shared by the CareLink crates.

pub mod logger;
pub mod time;
