// Scanfeed - Scan export and SFTP delivery
// Copyright (c) 2025 Scanfeed Contributors
// Licensed under the MIT License

//! # Scanfeed - Scan export and SFTP delivery
//!
//! Scanfeed selects the scans captured at recently finished fairs, renders
//! them as per-team CSV files under a fixed column layout per scan type, and
//! delivers each team's files to its partner SFTP server.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Selecting** undelivered scans inside a time window evaluated in a
//!   reference time zone
//! - **Rendering** records under one of eight scan type profiles
//! - **Writing** one CSV file per team and profile
//! - **Decrypting** partner credentials stored as AES-256-CBC envelopes
//! - **Delivering** files over SFTP with a size check per file
//! - **Recording** every delivery in an append-only ledger so each scan is
//!   delivered at most once
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (profiles, fetch, transform, export, delivery)
//! - [`adapters`] - External integrations (PostgreSQL, SFTP)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scanfeed::config::load_config;
//! use scanfeed::core::export::{RunCoordinator, RunOptions, Services};
//! use scanfeed::core::profile::ScanType;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("scanfeed.toml")?;
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//!     let services = Services::from_config(&config).await?;
//!     let options = RunOptions {
//!         scan_types: ScanType::parse_list(&["all"])?,
//!         window_days: config.export.default_window_days,
//!         team: None,
//!         force: false,
//!         dry_run: false,
//!         as_of: None,
//!     };
//!
//!     let summary = RunCoordinator::new(config, services, shutdown_rx)
//!         .execute(&options)
//!         .await?;
//!
//!     println!(
//!         "{} files, {} deliveries succeeded",
//!         summary.files.len(),
//!         summary.successful_deliveries()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Credential Envelopes
//!
//! ```rust
//! use scanfeed::config::secret_string;
//! use scanfeed::core::credentials::Envelope;
//! use secrecy::ExposeSecret;
//!
//! let key = secret_string("base64:MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=".to_string());
//! let envelope = Envelope::new(&key, true).unwrap();
//!
//! let stored = envelope.encrypt("partner-password").unwrap();
//! let plain = envelope.decrypt(&stored).unwrap();
//! assert_eq!(plain.expose_secret().as_ref(), "partner-password");
//! ```
//!
//! ## Error Handling
//!
//! Scanfeed uses [`domain::ScanfeedError`] for all errors. Credential and
//! delivery failures carry their own typed errors so a partner's outcome can
//! name the step that failed.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
