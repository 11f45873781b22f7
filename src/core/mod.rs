//! Core business logic for scanfeed.
//!
//! # Modules
//!
//! - [`profile`] - Scan types and their column layouts
//! - [`fetch`] - Selection window, query building and record assembly
//! - [`transform`] - Rendering records and grouping them by team
//! - [`export`] - CSV writing, run coordination and reporting
//! - [`credentials`] - Partner credentials and the encrypted envelope
//! - [`delivery`] - SFTP upload of written files
//!
//! # Export Workflow
//!
//! 1. **Select**: Fetch undelivered scans for each profile inside the window
//! 2. **Transform**: Render rows and group them by team
//! 3. **Write**: One CSV per team and profile under `output/<team>/`
//! 4. **Deliver**: Upload each team's files with its decrypted credential
//! 5. **Record**: Write a ledger row per delivery and link the delivered scans
//!
//! # Example
//!
//! ```rust,no_run
//! use scanfeed::config::load_config;
//! use scanfeed::core::export::{RunCoordinator, RunOptions, Services};
//! use scanfeed::core::profile::ScanType;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("scanfeed.toml")?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let services = Services::from_config(&config).await?;
//! let coordinator = RunCoordinator::new(config, services, shutdown_rx);
//!
//! let options = RunOptions {
//!     scan_types: vec![ScanType::Student],
//!     window_days: 1,
//!     team: None,
//!     force: false,
//!     dry_run: true,
//!     as_of: None,
//! };
//! let summary = coordinator.execute(&options).await?;
//! println!("Files written: {}", summary.files.len());
//! # Ok(())
//! # }
//! ```

pub mod credentials;
pub mod delivery;
pub mod export;
pub mod fetch;
pub mod profile;
pub mod transform;
