//! Shared service plumbing for the restaking binaries, mostly the tracing setup.

pub mod logging;

// Re-export tracing crate for convenience.
pub use tracing;
