//! Database abstraction layer
//!
//! This module provides the trait seams between the pipeline and the
//! PostgreSQL backend, so the fetcher, credential store and coordinator can
//! run against in-memory fakes in tests.

pub mod traits;

pub use traits::{
    AttributeRow, CredentialRow, CredentialSource, DeliveryLedger, DemographicRow, ScanRow,
    ScanStore,
};
