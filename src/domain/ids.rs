//! Domain identifier types
//!
//! Newtype wrappers over the integer primary keys used by the scan database.
//! Each type keeps team, scan, fair and ledger identifiers from being mixed up
//! at call sites.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates a new identifier
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw integer value
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|e| format!("Invalid {} '{}': {}", $label, s, e))
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

integer_id!(
    /// Destination team (partner organization) identifier
    ///
    /// # Examples
    ///
    /// ```
    /// use scanfeed::domain::ids::TeamId;
    /// use std::str::FromStr;
    ///
    /// let team = TeamId::from_str("42").unwrap();
    /// assert_eq!(team.get(), 42);
    /// ```
    TeamId,
    "team id"
);

integer_id!(
    /// Scan identifier (row of `user_fair_students`)
    ScanId,
    "scan id"
);

integer_id!(
    /// Fair (event) identifier
    FairId,
    "fair id"
);

integer_id!(
    /// Delivery ledger entry identifier (row of `sftp_updates`)
    LedgerId,
    "ledger id"
);

integer_id!(
    /// Stored SFTP credential identifier
    CredentialId,
    "credential id"
);
