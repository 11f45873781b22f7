//! Encrypt secret command implementation
//!
//! Produces an envelope for a partner password, private key or passphrase,
//! ready to store in `sftp_credentials`.

use crate::config::load_config_unvalidated;
use crate::core::credentials::Envelope;
use clap::Args;
use std::io::Read;

/// Arguments for the encrypt-secret command
#[derive(Args, Debug)]
pub struct EncryptArgs {
    /// Value to encrypt; read from stdin when omitted
    pub value: Option<String>,
}

impl EncryptArgs {
    /// Execute the encrypt-secret command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config_unvalidated(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("❌ Failed to load configuration file");
                eprintln!("   Error: {e}");
                return Ok(2);
            }
        };

        let envelope = match Envelope::from_config(&config.encryption) {
            Ok(envelope) => envelope,
            Err(e) => {
                eprintln!("❌ {e}");
                return Ok(2);
            }
        };

        let value = match &self.value {
            Some(value) => value.clone(),
            None => {
                let mut input = String::new();
                std::io::stdin().read_to_string(&mut input)?;
                input.trim_end_matches(['\r', '\n']).to_string()
            }
        };

        let encrypted = envelope.encrypt(&value)?;
        tracing::debug!(length = encrypted.len(), "Encrypted secret");
        println!("{encrypted}");
        Ok(0)
    }
}
