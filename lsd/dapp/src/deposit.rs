//! Deposit-data and keystore file payloads.
//!
//! Both files are parsed locally and never leave the process. The deposit file
//! is validated at the boundary (hex lengths, non-empty) and is immutable once
//! parsed; the keystore keeps its password in a zeroizing buffer and redacts
//! itself from `Debug` output.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use zeroize::Zeroizing;

const PUBKEY_BYTES: usize = 48;
const SIGNATURE_BYTES: usize = 96;
const CREDENTIALS_BYTES: usize = 32;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DepositError {
    #[error("deposit data is not valid JSON: {0}")]
    Json(String),
    #[error("deposit data does not contain any entries")]
    Empty,
    #[error("deposit data field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("expected withdrawal credentials are not configured")]
    MissingExpectedCredentials,
    #[error("Incorrect withdrawal credentials")]
    CredentialsMismatch { expected: String, found: String },
    #[error("keystore is invalid: {0}")]
    InvalidKeystore(String),
}

/// One validator entry of a `deposit_data.json` file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DepositEntry {
    pub pubkey: String,
    pub withdrawal_credentials: String,
    pub signature: String,
    /// Deposit amount in gwei.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_message_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_data_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_name: Option<String>,
}

impl DepositEntry {
    fn validate(&self) -> Result<(), DepositError> {
        check_hex("pubkey", &self.pubkey, PUBKEY_BYTES)?;
        check_hex(
            "withdrawal_credentials",
            &self.withdrawal_credentials,
            CREDENTIALS_BYTES,
        )?;
        check_hex("signature", &self.signature, SIGNATURE_BYTES)
    }
}

fn check_hex(field: &'static str, value: &str, expected: usize) -> Result<(), DepositError> {
    let bytes = hex::decode(strip_0x(value)).map_err(|err| DepositError::InvalidField {
        field,
        reason: err.to_string(),
    })?;
    if bytes.len() != expected {
        return Err(DepositError::InvalidField {
            field,
            reason: format!("expected {expected} bytes, found {}", bytes.len()),
        });
    }
    Ok(())
}

/// Parsed deposit-data file. Always holds at least one entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepositObject {
    entries: Vec<DepositEntry>,
}

impl DepositObject {
    pub fn from_json(contents: &str) -> Result<Self, DepositError> {
        let entries: Vec<DepositEntry> =
            serde_json::from_str(contents).map_err(|err| DepositError::Json(err.to_string()))?;
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<DepositEntry>) -> Result<Self, DepositError> {
        if entries.is_empty() {
            return Err(DepositError::Empty);
        }
        for entry in &entries {
            entry.validate()?;
        }
        Ok(Self { entries })
    }

    /// The entry the dApp acts on; multi-entry files are handled one validator at a time.
    pub fn primary(&self) -> &DepositEntry {
        &self.entries[0]
    }

    pub fn entries(&self) -> &[DepositEntry] {
        &self.entries
    }

    /// Every entry must carry `expected` withdrawal credentials (hex, `0x` optional,
    /// case-insensitive).
    pub fn validate_credentials(&self, expected: &str) -> Result<(), DepositError> {
        let expected = normalize_hex(expected);
        if expected.is_empty() {
            return Err(DepositError::MissingExpectedCredentials);
        }
        for entry in &self.entries {
            let found = normalize_hex(&entry.withdrawal_credentials);
            if found != expected {
                return Err(DepositError::CredentialsMismatch {
                    expected: add_0x(&expected),
                    found: add_0x(&found),
                });
            }
        }
        Ok(())
    }
}

/// Encrypted signing keystore plus the password typed by the user.
#[derive(Clone)]
pub struct KeystoreObject {
    material: Value,
    password: Zeroizing<String>,
}

impl KeystoreObject {
    pub fn new(material: Value, password: impl Into<String>) -> Result<Self, DepositError> {
        if !material.get("crypto").map(Value::is_object).unwrap_or(false) {
            return Err(DepositError::InvalidKeystore(
                "missing `crypto` section".into(),
            ));
        }
        Ok(Self {
            material,
            password: Zeroizing::new(password.into()),
        })
    }

    pub fn from_json(contents: &str, password: impl Into<String>) -> Result<Self, DepositError> {
        let material: Value = serde_json::from_str(contents)
            .map_err(|err| DepositError::InvalidKeystore(err.to_string()))?;
        Self::new(material, password)
    }

    pub fn material(&self) -> &Value {
        &self.material
    }

    pub fn password(&self) -> &str {
        self.password.as_str()
    }

    /// Public key recorded in the keystore, when present.
    pub fn pubkey(&self) -> Option<&str> {
        self.material.get("pubkey").and_then(Value::as_str)
    }
}

impl fmt::Debug for KeystoreObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeystoreObject")
            .field("pubkey", &self.pubkey())
            .field("material", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

pub fn strip_0x(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

pub fn add_0x(value: &str) -> String {
    format!("0x{}", strip_0x(value))
}

fn normalize_hex(value: &str) -> String {
    strip_0x(value.trim()).to_ascii_lowercase()
}

/// Well-formed deposit and keystore payloads for tests.
#[cfg(any(test, feature = "mock"))]
pub mod fixtures {
    use super::*;

    pub const PUBKEY: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90";
    pub const CREDENTIALS: &str =
        "010000000000000000000000abcdefabcdefabcdefabcdefabcdefabcdefabcd";

    pub fn signature() -> String {
        "ab".repeat(SIGNATURE_BYTES)
    }

    pub fn entry(credentials: &str) -> DepositEntry {
        DepositEntry {
            pubkey: PUBKEY.to_string(),
            withdrawal_credentials: credentials.to_string(),
            signature: signature(),
            amount: Some(32_000_000_000),
            deposit_message_root: None,
            deposit_data_root: None,
            fork_version: Some("00001020".into()),
            network_name: Some("goerli".into()),
        }
    }

    pub fn keystore(password: &str) -> KeystoreObject {
        let material = serde_json::json!({
            "crypto": { "kdf": { "function": "scrypt" } },
            "pubkey": PUBKEY,
            "version": 4
        });
        KeystoreObject {
            material,
            password: Zeroizing::new(password.to_string()),
        }
    }
}
