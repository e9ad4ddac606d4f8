//! SCSI INQUIRY decoding
//!
//! Turns the raw standard INQUIRY response into an `Identity` and derives the
//! canonical short device name from the product identifier.

use serde::Serialize;

use super::constants::*;
use super::types::DeviceType;
use crate::error::{Result, TapeCtlError};

/// Device identity read once at open time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    device_type: DeviceType,
    peripheral_qualifier: u8,
    vendor: String,
    product: String,
    revision: String,
    short_name: String,
}

impl Identity {
    /// Decode a standard INQUIRY response
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() < INQUIRY_MIN_LEN {
            return Err(TapeCtlError::malformed(format!(
                "INQUIRY response too short: {} bytes, need {}",
                raw.len(),
                INQUIRY_MIN_LEN
            )));
        }

        let product_field =
            &raw[INQUIRY_PRODUCT_OFFSET..INQUIRY_PRODUCT_OFFSET + INQUIRY_PRODUCT_LEN];

        Ok(Self {
            device_type: DeviceType::from_peripheral_type(raw[0]),
            peripheral_qualifier: raw[0] >> 5,
            vendor: ascii_field(
                &raw[INQUIRY_VENDOR_OFFSET..INQUIRY_VENDOR_OFFSET + INQUIRY_VENDOR_LEN],
            ),
            product: ascii_field(product_field),
            revision: ascii_field(
                &raw[INQUIRY_REVISION_OFFSET..INQUIRY_REVISION_OFFSET + INQUIRY_REVISION_LEN],
            ),
            short_name: canonical_name(product_field, SHORT_NAME_MAX),
        })
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn peripheral_qualifier(&self) -> u8 {
        self.peripheral_qualifier
    }

    /// Vendor identifier without the wire padding
    pub fn vendor(&self) -> &str {
        self.vendor.trim_end()
    }

    /// Product identifier without the wire padding
    pub fn product(&self) -> &str {
        self.product.trim_end()
    }

    pub fn revision(&self) -> &str {
        self.revision.trim_end()
    }

    /// Vendor identifier exactly as the device padded it (8 characters)
    pub fn vendor_raw(&self) -> &str {
        &self.vendor
    }

    /// Product identifier exactly as the device padded it (16 characters)
    pub fn product_raw(&self) -> &str {
        &self.product
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }
}

/// Derive the canonical short device name from a product-identifier field.
///
/// Bytes are copied up to the first space (or NUL) within `width`, then any
/// trailing non-alphanumeric bytes are dropped.
pub fn canonical_name(field: &[u8], width: usize) -> String {
    let field = &field[..field.len().min(width)];
    let end = field
        .iter()
        .position(|&b| b == b' ' || b == 0)
        .unwrap_or(field.len());
    let mut name = &field[..end];

    while let Some((last, rest)) = name.split_last() {
        if last.is_ascii_alphanumeric() {
            break;
        }
        name = rest;
    }

    name.iter().map(|&b| printable(b)).collect()
}

fn ascii_field(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| printable(b)).collect()
}

fn printable(b: u8) -> char {
    if b.is_ascii_graphic() || b == b' ' {
        b as char
    } else if b == 0 {
        ' '
    } else {
        '?'
    }
}

#[cfg(test)]
pub(crate) fn inquiry_response(peripheral: u8, vendor: &str, product: &str) -> Vec<u8> {
    let mut raw = vec![0u8; INQUIRY_MIN_LEN];
    raw[0] = peripheral;
    raw[4] = (INQUIRY_MIN_LEN - 5) as u8;
    let pad = |dst: &mut [u8], text: &str| {
        dst.fill(b' ');
        dst[..text.len()].copy_from_slice(text.as_bytes());
    };
    pad(
        &mut raw[INQUIRY_VENDOR_OFFSET..INQUIRY_VENDOR_OFFSET + INQUIRY_VENDOR_LEN],
        vendor,
    );
    pad(
        &mut raw[INQUIRY_PRODUCT_OFFSET..INQUIRY_PRODUCT_OFFSET + INQUIRY_PRODUCT_LEN],
        product,
    );
    pad(
        &mut raw[INQUIRY_REVISION_OFFSET..INQUIRY_REVISION_OFFSET + INQUIRY_REVISION_LEN],
        "0100",
    );
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_dlt7000() {
        let raw = inquiry_response(0x01, "QUANTUM", "DLT7000 ");
        let identity = Identity::decode(&raw).unwrap();

        assert_eq!(identity.device_type(), DeviceType::Tape);
        assert_eq!(identity.short_name(), "DLT7000");
        assert_eq!(identity.vendor(), "QUANTUM");
        assert_eq!(identity.vendor_raw(), "QUANTUM ");
        assert_eq!(identity.product(), "DLT7000");
        assert_eq!(identity.product_raw().len(), 16);
        assert_eq!(identity.revision(), "0100");
    }

    #[test]
    fn test_decode_changer() {
        let raw = inquiry_response(0x08, "STK", "L180");
        let identity = Identity::decode(&raw).unwrap();
        assert_eq!(identity.device_type(), DeviceType::MediumChanger);
        assert!(identity.device_type().is_scsi_capable());
        assert_eq!(identity.short_name(), "L180");
    }

    #[test]
    fn test_decode_other_type() {
        let raw = inquiry_response(0x00, "SEAGATE", "ST3146855LC");
        let identity = Identity::decode(&raw).unwrap();
        assert_eq!(identity.device_type(), DeviceType::Other(0));
        assert!(!identity.device_type().is_scsi_capable());
    }

    #[test]
    fn test_decode_short_buffer() {
        let raw = [0x01u8; 20];
        assert!(matches!(
            Identity::decode(&raw),
            Err(TapeCtlError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_canonical_name_rules() {
        assert_eq!(canonical_name(b"ULT3580-TD5     ", 16), "ULT3580-TD5");
        assert_eq!(canonical_name(b"SDX-700C--      ", 16), "SDX-700C");
        assert_eq!(canonical_name(b"DLT7000 EXTRA   ", 16), "DLT7000");
        assert_eq!(canonical_name(b"DDS4\0\0\0\0", 8), "DDS4");
        assert_eq!(canonical_name(b"        ", 8), "");
        assert_eq!(canonical_name(b"--..", 4), "");
    }

    #[test]
    fn test_canonical_name_width_bound() {
        let field = b"ABCDEFGHIJKLMNOPQRST";
        assert_eq!(canonical_name(field, 16), "ABCDEFGHIJKLMNOP");
        assert_eq!(canonical_name(field, 4), "ABCD");
    }
}
