//! Serial provisioning prompt for WiFi credentials.
//!
//! Blocking, line-oriented dialogue over any [`embedded_io`] stream: ask
//! for the SSID, then the password, echoing each entry back. Used by the
//! firmware when the stored record is missing or incomplete.

use core::str::FromStr;

use embedded_io::{Read, Write};
use log::warn;

use crate::creds::WifiCredentials;

/// Longest accepted input line; anything past this is dropped, and the
/// credential fields truncate further on their own capacity.
const LINE_CAPACITY: usize = 64;

/// Prompts for an SSID and password on `serial` and returns the entered
/// credentials.
///
/// Blocks until both lines arrive. Empty input is accepted (and warned
/// about) so the caller can decide to re-prompt; the resulting record
/// simply stays incomplete.
pub fn prompt_credentials<S>(serial: &mut S) -> Result<WifiCredentials, S::Error>
where
    S: Read + Write,
{
    serial.write_all(b"Please enter wifi ssid name:\r\n")?;
    let ssid = read_line(serial)?;
    if ssid.is_empty() {
        warn!("Invalid ssid");
    }
    serial.write_all(ssid.as_bytes())?;
    serial.write_all(b"\r\n")?;

    serial.write_all(b"Please enter wifi password:\r\n")?;
    let password = read_line(serial)?;
    if password.is_empty() {
        warn!("Invalid password");
    }
    serial.write_all(password.as_bytes())?;
    serial.write_all(b"\r\n")?;

    Ok(WifiCredentials::new(&ssid, &password))
}

/// Reads bytes until a newline (or end of stream) and returns the line
/// with surrounding whitespace trimmed.
fn read_line<S: Read>(serial: &mut S) -> Result<heapless::String<LINE_CAPACITY>, S::Error> {
    let mut raw: heapless::Vec<u8, LINE_CAPACITY> = heapless::Vec::new();

    loop {
        let mut byte = [0u8; 1];
        if serial.read(&mut byte)? == 0 {
            // Stream ended before a newline; take what we have.
            break;
        }
        if byte[0] == b'\n' {
            break;
        }
        // Overlong input is silently truncated.
        let _ = raw.push(byte[0]);
    }

    let text = core::str::from_utf8(&raw).unwrap_or("");
    Ok(heapless::String::from_str(text.trim()).unwrap_or_default())
}
