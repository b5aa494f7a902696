//! Credential record persistence in the ESP32's internal flash.

use capkit_core::creds::{CredentialBacking, RECORD_SIZE};
use embedded_storage::{ReadStorage, Storage};
use esp_storage::{FlashStorage, FlashStorageError};

/// Flash offset of the credential record. Sits in the region the stock
/// partition table reserves for NVS data, so the record survives app
/// updates.
pub const CREDENTIAL_OFFSET: u32 = 0x9000;

/// [`CredentialBacking`] over the chip's internal flash.
pub struct FlashCredentialBacking {
    flash: FlashStorage,
    offset: u32,
}

impl FlashCredentialBacking {
    pub fn new() -> Self {
        Self::with_offset(CREDENTIAL_OFFSET)
    }

    /// Places the record at a custom flash offset. Must not overlap the
    /// application image.
    pub fn with_offset(offset: u32) -> Self {
        Self {
            flash: FlashStorage::new(),
            offset,
        }
    }
}

impl Default for FlashCredentialBacking {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialBacking for FlashCredentialBacking {
    type Error = FlashStorageError;

    fn load(&mut self, record: &mut [u8; RECORD_SIZE]) -> Result<(), Self::Error> {
        self.flash.read(self.offset, record)
    }

    fn store(&mut self, record: &[u8; RECORD_SIZE]) -> Result<(), Self::Error> {
        self.flash.write(self.offset, record)
    }
}
