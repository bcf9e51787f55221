//! X402 autopay core library.
//!
//! This library provides the wire types and codecs shared by the paying client
//! and the resource-side paywall: payment requirements, opaque authorizations,
//! token amounts, and the outcome taxonomy.

pub mod concepts;
pub mod errors;
pub mod transport;
pub mod types;
