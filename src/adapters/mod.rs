//! External system integrations for scanfeed.
//!
//! This module provides adapters for integrating with external systems:
//!
//! - [`database`] - Trait seams for scans, credentials and the delivery ledger
//! - [`postgresql`] - PostgreSQL implementation of those traits
//! - [`sftp`] - SFTP transport built on libssh2
//!
//! # Design Pattern
//!
//! Adapters isolate external dependencies behind traits so the pipeline can
//! be tested with in-memory implementations:
//!
//! ```rust,no_run
//! use scanfeed::adapters::postgresql::PostgreSQLAdapter;
//! use scanfeed::adapters::database::ScanStore;
//! use scanfeed::config::load_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("scanfeed.toml")?;
//! let adapter = PostgreSQLAdapter::new(&config.database).await?;
//! adapter.test_connection().await?;
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod postgresql;
pub mod sftp;
