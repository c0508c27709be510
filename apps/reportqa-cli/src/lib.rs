//! Shared wiring for the `reportqa-*` binaries.

pub mod bootstrap;
pub mod logging;
pub mod server;
