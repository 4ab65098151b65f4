//! CLI command implementations.

pub mod check;
pub mod config;
pub mod output;
pub mod status;
pub mod sync;
