//! Export orchestration and output
//!
//! This module provides the run-level logic for scanfeed, including:
//! - CSV file writing per team
//! - Run coordination across profiles and partners
//! - Summary and reporting

pub mod coordinator;
pub mod summary;
pub mod writer;

pub use coordinator::{RunCoordinator, RunOptions, Services};
pub use summary::{FileReport, PartnerOutcome, RunError, RunErrorType, RunSummary};
pub use writer::{CsvWriter, ExportedFile};
