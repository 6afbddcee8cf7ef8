/// BLE advertisement (AD structure) parsing.
///
/// AD structure format: [length] [type] [data...]
/// Types we care about:
///   0x01      = Flags (discoverability and BR/EDR support bits)
///   0x02/0x03 = Incomplete/Complete list of 16-bit service UUIDs
///   0x08/0x09 = Shortened/Complete local name
///   0x16/0x20 = Service data, 16-bit / 32-bit UUID
///   0xFF      = Manufacturer specific data (first 2 bytes = company ID, little-endian)
///
/// The manufacturer and service-data structures are kept as whole slices,
/// header included, because that is the shape layouts are written against:
/// the company code or service UUID sits at bytes 2-3.
use heapless::Vec;

use crate::defaults::{
    AD_TYPE_COMPLETE_NAME, AD_TYPE_FLAGS, AD_TYPE_MANUFACTURER, AD_TYPE_SERVICE_DATA_16,
    AD_TYPE_SERVICE_DATA_32, AD_TYPE_SERVICE_UUIDS_16_COMPLETE,
    AD_TYPE_SERVICE_UUIDS_16_INCOMPLETE, AD_TYPE_SHORT_NAME, COMPANY_CODE_LEN,
};

/// Maximum number of 16-bit service UUIDs collected per advertisement
pub const MAX_SERVICE_UUIDS: usize = 8;

/// Parsed view over one advertisement payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanRecord<'a> {
    flags: Option<u8>,
    name: Option<&'a str>,
    service_uuids_16: Vec<u16, MAX_SERVICE_UUIDS>,
    manufacturer_id: Option<u16>,
    manufacturer_frame: Option<&'a [u8]>,
    service_frame: Option<&'a [u8]>,
}

impl<'a> ScanRecord<'a> {
    /// Walk the AD structures in `data`. Parsing stops at a zero length or a
    /// structure that runs past the end; whatever was parsed before is kept.
    pub fn parse(data: &'a [u8]) -> Self {
        let mut record = Self::default();

        let mut pos = 0;
        while pos < data.len() {
            let len = data[pos] as usize;
            if len == 0 || pos + 1 + len > data.len() {
                break;
            }

            let frame = &data[pos..pos + 1 + len];
            let ad_type = frame[1];
            let body = &frame[2..];

            match ad_type {
                AD_TYPE_FLAGS => record.flags = body.first().copied(),
                AD_TYPE_SERVICE_UUIDS_16_INCOMPLETE | AD_TYPE_SERVICE_UUIDS_16_COMPLETE => {
                    for pair in body.chunks_exact(2) {
                        let _ = record
                            .service_uuids_16
                            .push(u16::from_le_bytes([pair[0], pair[1]]));
                    }
                }
                AD_TYPE_SHORT_NAME | AD_TYPE_COMPLETE_NAME => {
                    // A complete name wins over a shortened one
                    if record.name.is_none() || ad_type == AD_TYPE_COMPLETE_NAME {
                        record.name = core::str::from_utf8(body).ok();
                    }
                }
                AD_TYPE_MANUFACTURER if body.len() >= COMPANY_CODE_LEN => {
                    if record.manufacturer_frame.is_none() {
                        record.manufacturer_id = Some(u16::from_le_bytes([body[0], body[1]]));
                        record.manufacturer_frame = Some(frame);
                    }
                }
                AD_TYPE_SERVICE_DATA_16 | AD_TYPE_SERVICE_DATA_32
                    if body.len() >= COMPANY_CODE_LEN =>
                {
                    if record.service_frame.is_none() {
                        record.service_frame = Some(frame);
                    }
                }
                _ => {}
            }

            pos += 1 + len;
        }

        record
    }

    /// Flags byte, if the advertiser sent one.
    pub fn flags(&self) -> Option<u8> {
        self.flags
    }

    pub fn name(&self) -> Option<&'a str> {
        self.name
    }

    pub fn service_uuids_16(&self) -> &[u16] {
        &self.service_uuids_16
    }

    /// Company ID of the first manufacturer-specific structure.
    pub fn manufacturer_id(&self) -> Option<u16> {
        self.manufacturer_id
    }

    /// First manufacturer-specific structure, starting at its length byte.
    pub fn manufacturer_frame(&self) -> Option<&'a [u8]> {
        self.manufacturer_frame
    }

    /// First service-data structure, starting at its length byte.
    pub fn service_frame(&self) -> Option<&'a [u8]> {
        self.service_frame
    }
}
