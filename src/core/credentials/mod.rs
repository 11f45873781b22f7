//! Partner credentials
//!
//! - [`envelope`] - AES-256-CBC envelope decryption and encryption
//! - [`store`] - loads credential rows and decrypts their secret columns

pub mod envelope;
pub mod store;

pub use envelope::Envelope;
pub use store::{CredentialOutcome, CredentialStore, DEFAULT_PORT};
