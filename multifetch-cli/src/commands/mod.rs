//! CLI command implementations.

pub mod assemble;
pub mod common;
pub mod fetch;
pub mod init;
pub mod probe;
