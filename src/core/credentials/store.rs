//! Partner credential loading
//!
//! Loads stored credential rows and decrypts their secret columns. A row
//! that fails to decrypt yields an error for that partner only.

use super::envelope::Envelope;
use crate::adapters::database::{CredentialRow, CredentialSource};
use crate::config::SecretString;
use crate::domain::result::Result;
use crate::domain::{CredentialError, CredentialId, ScanfeedError, SftpCredential, TeamId};
use std::sync::Arc;

/// Port used when the stored port is empty
pub const DEFAULT_PORT: u16 = 22;

/// Decrypted credential, or the reason it could not be produced
#[derive(Debug)]
pub struct CredentialOutcome {
    pub credential_id: CredentialId,
    pub team_id: TeamId,
    pub credential: std::result::Result<SftpCredential, CredentialError>,
}

/// Loads and decrypts partner credentials
pub struct CredentialStore {
    source: Arc<dyn CredentialSource>,
    envelope: Arc<Envelope>,
    default_upload_directory: String,
}

impl CredentialStore {
    pub fn new(
        source: Arc<dyn CredentialSource>,
        envelope: Arc<Envelope>,
        default_upload_directory: impl Into<String>,
    ) -> Self {
        Self {
            source,
            envelope,
            default_upload_directory: default_upload_directory.into(),
        }
    }

    /// Loads every credential, optionally for one team
    ///
    /// # Errors
    ///
    /// Returns `ScanfeedError::Credential(LoadFailed)` when the rows cannot
    /// be queried. Decryption failures are reported per outcome instead.
    pub async fn load(&self, team: Option<TeamId>) -> Result<Vec<CredentialOutcome>> {
        let rows = self.source.fetch_credentials(team).await.map_err(|e| {
            ScanfeedError::Credential(CredentialError::LoadFailed(e.to_string()))
        })?;

        let outcomes: Vec<CredentialOutcome> = rows
            .into_iter()
            .map(|row| {
                let credential_id = row.credential_id();
                let team_id = row.team();
                let credential = self.decrypt_row(row);
                if let Err(e) = &credential {
                    tracing::warn!(
                        credential_id = %credential_id,
                        team_id = %team_id,
                        error = %e,
                        "Failed to decrypt partner credential"
                    );
                }
                CredentialOutcome {
                    credential_id,
                    team_id,
                    credential,
                }
            })
            .collect();

        tracing::info!(
            credentials = outcomes.len(),
            usable = outcomes.iter().filter(|o| o.credential.is_ok()).count(),
            "Loaded partner credentials"
        );
        Ok(outcomes)
    }

    fn decrypt_row(&self, row: CredentialRow) -> std::result::Result<SftpCredential, CredentialError> {
        let password = self.decrypt_optional(row.password.as_deref())?;
        let ssh_key = self.decrypt_optional(row.ssh_key.as_deref())?;
        let ssh_key_passphrase = self.decrypt_optional(row.passphrase.as_deref())?;

        let port = match row.port.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_PORT,
            Some(port) => port
                .parse()
                .map_err(|_| CredentialError::InvalidPort(port.to_string()))?,
        };

        let upload_directory = row
            .upload_directory
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| self.default_upload_directory.clone());

        Ok(SftpCredential {
            id: CredentialId::new(row.id),
            team_id: TeamId::new(row.team_id),
            host: row.host,
            port,
            username: row.username,
            password,
            ssh_key,
            ssh_key_passphrase,
            upload_directory,
            notification_email: row.notification_email.filter(|e| !e.is_empty()),
        })
    }

    fn decrypt_optional(
        &self,
        stored: Option<&str>,
    ) -> std::result::Result<Option<SecretString>, CredentialError> {
        match stored.map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => self.envelope.decrypt(value).map(Some),
        }
    }
}
