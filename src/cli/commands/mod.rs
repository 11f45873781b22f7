//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod encrypt;
pub mod export;
pub mod init;
pub mod validate;
