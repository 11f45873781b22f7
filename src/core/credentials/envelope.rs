//! Encrypted credential envelope
//!
//! Partner secrets are stored as the envelope produced by the web
//! application's encryptor: a JSON object `{iv, value, mac, tag}` where `iv`
//! and `value` are base64, encrypted with AES-256-CBC and PKCS#7 padding,
//! and `mac` is the hex HMAC-SHA256 of `iv || value` (the base64 strings).
//! The JSON is normally base64-wrapped; bare JSON is accepted too.

use crate::config::{secret_string, EncryptionConfig, SecretString};
use crate::domain::CredentialError;
use aes::Aes256;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

const KEY_LEN: usize = 32;
const BLOCK_LEN: usize = 16;
const KEY_PREFIX: &str = "base64:";

#[derive(Debug, Serialize, Deserialize)]
struct Payload {
    iv: String,
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mac: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
}

/// Decrypts and produces credential envelopes with one application key
pub struct Envelope {
    key: Zeroizing<Vec<u8>>,
    verify_mac: bool,
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("key", &"[REDACTED]")
            .field("verify_mac", &self.verify_mac)
            .finish()
    }
}

impl Envelope {
    /// Builds an envelope from an application key
    ///
    /// The key may carry a `base64:` prefix and must decode to 32 bytes.
    pub fn new(key: &SecretString, verify_mac: bool) -> Result<Self, CredentialError> {
        let raw: &str = key.expose_secret().as_ref();
        let encoded = raw.trim();
        let encoded = encoded.strip_prefix(KEY_PREFIX).unwrap_or(encoded);
        if encoded.is_empty() {
            return Err(CredentialError::MissingKey);
        }

        let key = Zeroizing::new(
            STANDARD
                .decode(encoded)
                .map_err(|e| CredentialError::InvalidKey(format!("not valid base64: {e}")))?,
        );
        if key.len() != KEY_LEN {
            return Err(CredentialError::InvalidKey(format!(
                "decodes to {} bytes, expected {KEY_LEN}",
                key.len()
            )));
        }

        Ok(Self { key, verify_mac })
    }

    /// Builds an envelope from the `[encryption]` section
    pub fn from_config(config: &EncryptionConfig) -> Result<Self, CredentialError> {
        let key = config.key.as_ref().ok_or(CredentialError::MissingKey)?;
        Self::new(key, config.verify_mac)
    }

    /// Decrypts one stored value
    pub fn decrypt(&self, stored: &str) -> Result<SecretString, CredentialError> {
        let payload = parse_payload(stored)?;

        if self.verify_mac {
            self.check_mac(&payload)?;
        }

        let iv = decode_field("iv", &payload.iv)?;
        if iv.len() != BLOCK_LEN {
            return Err(CredentialError::MalformedEnvelope(format!(
                "iv is {} bytes, expected {BLOCK_LEN}",
                iv.len()
            )));
        }

        let mut buffer = Zeroizing::new(decode_field("value", &payload.value)?);
        if buffer.is_empty() || buffer.len() % BLOCK_LEN != 0 {
            return Err(CredentialError::MalformedEnvelope(format!(
                "ciphertext is {} bytes, expected a positive multiple of {BLOCK_LEN}",
                buffer.len()
            )));
        }

        let decryptor = Aes256CbcDec::new_from_slices(&self.key, &iv)
            .map_err(|e| CredentialError::MalformedEnvelope(e.to_string()))?;
        let padded = decryptor
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .map_err(|_| CredentialError::InvalidPadding)?;
        let plaintext = strip_pkcs7(padded)?;

        let text = std::str::from_utf8(plaintext).map_err(|_| CredentialError::InvalidUtf8)?;
        Ok(secret_string(text.to_string()))
    }

    /// Encrypts a value into a base64-wrapped envelope
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CredentialError> {
        let mut iv = [0u8; BLOCK_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let encryptor = Aes256CbcEnc::new_from_slices(&self.key, &iv)
            .map_err(|e| CredentialError::MalformedEnvelope(e.to_string()))?;
        let ciphertext = encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        let iv = STANDARD.encode(iv);
        let value = STANDARD.encode(ciphertext);
        let mac = self.compute_mac(&iv, &value)?;

        let payload = Payload {
            iv,
            value,
            mac: Some(mac),
            tag: Some(String::new()),
        };
        let json = serde_json::to_string(&payload)
            .map_err(|e| CredentialError::MalformedEnvelope(e.to_string()))?;
        Ok(STANDARD.encode(json))
    }

    fn mac(&self) -> Result<HmacSha256, CredentialError> {
        <HmacSha256 as Mac>::new_from_slice(&self.key)
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))
    }

    fn compute_mac(&self, iv: &str, value: &str) -> Result<String, CredentialError> {
        let mut mac = self.mac()?;
        mac.update(iv.as_bytes());
        mac.update(value.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn check_mac(&self, payload: &Payload) -> Result<(), CredentialError> {
        let expected = payload
            .mac
            .as_deref()
            .filter(|m| !m.is_empty())
            .ok_or(CredentialError::MacMismatch)?;
        let expected = hex::decode(expected).map_err(|_| CredentialError::MacMismatch)?;

        let mut mac = self.mac()?;
        mac.update(payload.iv.as_bytes());
        mac.update(payload.value.as_bytes());
        mac.verify_slice(&expected)
            .map_err(|_| CredentialError::MacMismatch)
    }
}

/// Accepts bare JSON, or base64-wrapped JSON with whitespace trimmed and
/// missing `=` padding restored
fn parse_payload(stored: &str) -> Result<Payload, CredentialError> {
    let json: serde_json::Value = match serde_json::from_str(stored) {
        Ok(value) => value,
        Err(_) => {
            let mut wrapped = stored.trim().to_string();
            let remainder = wrapped.len() % 4;
            if remainder != 0 {
                wrapped.push_str(&"=".repeat(4 - remainder));
            }
            let mut decoded = STANDARD.decode(&wrapped).map_err(|e| {
                CredentialError::InvalidBase64 {
                    field: "envelope",
                    message: e.to_string(),
                }
            })?;
            let parsed = serde_json::from_slice(&decoded)
                .map_err(|e| CredentialError::MalformedEnvelope(format!("not JSON: {e}")));
            decoded.zeroize();
            parsed?
        }
    };

    if !json.is_object() {
        return Err(CredentialError::MalformedEnvelope(
            "expected a JSON object".to_string(),
        ));
    }

    serde_json::from_value(json).map_err(|e| CredentialError::MalformedEnvelope(e.to_string()))
}

fn decode_field(field: &'static str, value: &str) -> Result<Vec<u8>, CredentialError> {
    STANDARD
        .decode(value)
        .map_err(|e| CredentialError::InvalidBase64 {
            field,
            message: e.to_string(),
        })
}

/// Validates and removes PKCS#7 padding
fn strip_pkcs7(data: &[u8]) -> Result<&[u8], CredentialError> {
    let pad = *data.last().ok_or(CredentialError::InvalidPadding)? as usize;
    if pad == 0 || pad > BLOCK_LEN || pad > data.len() {
        return Err(CredentialError::InvalidPadding);
    }
    let (body, padding) = data.split_at(data.len() - pad);
    if padding.iter().any(|&b| b as usize != pad) {
        return Err(CredentialError::InvalidPadding);
    }
    Ok(body)
}
