//! Domain models and types for scanfeed.
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`TeamId`], [`ScanId`], [`FairId`], [`LedgerId`])
//! - **Scan records** ([`ScanRecord`], [`FieldValue`])
//! - **Delivery types** ([`SftpCredential`], [`UploadResult`])
//! - **Error types** ([`ScanfeedError`], [`CredentialError`], [`DeliveryError`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! Identifiers are newtypes so that a team id can never be passed where a
//! scan id is expected:
//!
//! ```rust
//! use scanfeed::domain::{ScanId, TeamId};
//!
//! let team = TeamId::new(12);
//! let scan = ScanId::new(12);
//! // let wrong: TeamId = scan;  // Compile error!
//! assert_eq!(team.get(), scan.get());
//! ```

pub mod delivery;
pub mod errors;
pub mod ids;
pub mod record;
pub mod result;

// Re-export commonly used types for convenience
pub use delivery::{SftpCredential, UploadResult, UploadStatus, UPLOAD_KIND};
pub use errors::{CredentialError, DeliveryError, ScanfeedError};
pub use ids::{CredentialId, FairId, LedgerId, ScanId, TeamId};
pub use record::{FieldKind, FieldValue, ScanRecord};
pub use result::Result;
