//! WiFi credential record and its non-volatile store.
//!
//! Implements the fixed 64-byte record format:
//! - byte 0: magic marker `0x1A`
//! - bytes 1..32: SSID, NUL-terminated (31-byte field, 30 usable bytes)
//! - byte 32: magic marker `0x2B`
//! - bytes 33..64: password, same shape
//!
//! The magic markers only distinguish "previously written by this system"
//! from uninitialized or foreign storage content. The actual medium sits
//! behind [`CredentialBacking`]; on the board that is a flash page, on the
//! host an in-memory array.

use core::str::FromStr;

use heapless::String;
use log::warn;
use serde::{Deserialize, Serialize};

/// Total size of the persisted record in bytes.
pub const RECORD_SIZE: usize = 64;

/// Bytes reserved per text field, including the NUL terminator.
pub const FIELD_SIZE: usize = 31;

/// Maximum usable bytes per text field.
pub const MAX_FIELD_LEN: usize = FIELD_SIZE - 1;

const MAGIC1: u8 = 0x1A;
const MAGIC2: u8 = 0x2B;

const SSID_OFFSET: usize = 1;
const MAGIC2_OFFSET: usize = SSID_OFFSET + FIELD_SIZE;
const PASSWORD_OFFSET: usize = MAGIC2_OFFSET + 1;

/// WiFi network name and secret.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    pub ssid: String<MAX_FIELD_LEN>,
    pub password: String<MAX_FIELD_LEN>,
}

impl WifiCredentials {
    /// Builds credentials from arbitrary input, truncating each field to
    /// [`MAX_FIELD_LEN`] bytes (on a character boundary).
    pub fn new(ssid: &str, password: &str) -> Self {
        Self {
            ssid: truncate_field(ssid),
            password: truncate_field(password),
        }
    }

    /// Both fields non-empty. An incomplete record is treated as "not
    /// provisioned" by the connection glue.
    pub fn is_complete(&self) -> bool {
        !self.ssid.is_empty() && !self.password.is_empty()
    }

    /// Serializes to the 64-byte record, magic markers set and fields
    /// NUL-padded.
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];

        bytes[0] = MAGIC1;
        bytes[SSID_OFFSET..SSID_OFFSET + self.ssid.len()].copy_from_slice(self.ssid.as_bytes());

        bytes[MAGIC2_OFFSET] = MAGIC2;
        bytes[PASSWORD_OFFSET..PASSWORD_OFFSET + self.password.len()]
            .copy_from_slice(self.password.as_bytes());

        bytes
    }

    /// Parses a 64-byte record. Returns `None` when either magic marker is
    /// missing, i.e. the storage was never written by this system.
    pub fn from_bytes(bytes: &[u8; RECORD_SIZE]) -> Option<Self> {
        if bytes[0] != MAGIC1 || bytes[MAGIC2_OFFSET] != MAGIC2 {
            return None;
        }

        Some(Self {
            ssid: field_str(&bytes[SSID_OFFSET..SSID_OFFSET + FIELD_SIZE]),
            password: field_str(&bytes[PASSWORD_OFFSET..PASSWORD_OFFSET + FIELD_SIZE]),
        })
    }
}

/// Truncate to the field capacity without splitting a character.
fn truncate_field(input: &str) -> String<MAX_FIELD_LEN> {
    let mut out = String::new();
    for ch in input.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// Text up to the first NUL (or the full field if none); bytes that are
/// not valid UTF-8 read back as an empty field.
fn field_str(field: &[u8]) -> String<MAX_FIELD_LEN> {
    let len = field.iter().position(|&b| b == 0).unwrap_or(MAX_FIELD_LEN);
    match core::str::from_utf8(&field[..len]) {
        Ok(text) => String::from_str(text).unwrap_or_default(),
        Err(_) => String::new(),
    }
}

/// Non-volatile medium holding exactly one credential record.
pub trait CredentialBacking {
    type Error;

    /// Reads the record bytes from storage.
    fn load(&mut self, record: &mut [u8; RECORD_SIZE]) -> Result<(), Self::Error>;

    /// Writes the record bytes to storage.
    fn store(&mut self, record: &[u8; RECORD_SIZE]) -> Result<(), Self::Error>;
}

/// Credential persistence over an arbitrary backing medium.
///
/// Storage errors pass through as the backing's own error type; an intact
/// medium holding a record without the magic markers is not an error, just
/// "not provisioned".
pub struct CredentialStore<B: CredentialBacking> {
    backing: B,
}

impl<B: CredentialBacking> CredentialStore<B> {
    pub fn new(backing: B) -> Self {
        Self { backing }
    }

    /// Reads the stored credentials, or `None` when the magic markers are
    /// missing.
    pub fn read(&mut self) -> Result<Option<WifiCredentials>, B::Error> {
        let mut record = [0u8; RECORD_SIZE];
        self.backing.load(&mut record)?;

        let creds = WifiCredentials::from_bytes(&record);
        if creds.is_none() {
            warn!("Invalid credential record format");
        }
        Ok(creds)
    }

    /// Persists the credentials with the magic markers set.
    pub fn write(&mut self, creds: &WifiCredentials) -> Result<(), B::Error> {
        self.backing.store(&creds.to_bytes())
    }

    /// Overwrites the record with zeroes, clearing the magic markers so a
    /// subsequent [`read`](Self::read) yields `None`.
    pub fn reset(&mut self) -> Result<(), B::Error> {
        self.backing.store(&[0u8; RECORD_SIZE])
    }
}
