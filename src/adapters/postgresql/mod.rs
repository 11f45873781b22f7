//! PostgreSQL database integration
//!
//! This module provides integration with the PostgreSQL database that holds
//! scans, partner credentials and the delivery ledger.

pub mod adapter;
pub mod client;

pub use adapter::PostgreSQLAdapter;
pub use client::PostgreSQLClient;
