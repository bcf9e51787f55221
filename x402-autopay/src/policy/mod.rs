//! Payment policy: configuration, approval port and the ordered checks.

mod approval;
mod config;
mod engine;

pub use approval::*;
pub use config::*;
pub use engine::*;
