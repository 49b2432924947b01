//! Shared helpers for binaries and retry paths.

pub mod bootstrap;
pub mod retry;
