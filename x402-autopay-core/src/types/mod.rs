//! Core types used across the X402 autopay crates.

mod amount;
mod common;

pub use amount::*;
pub use common::*;
