/// Layout-driven beacon codec.
///
/// Decoding searches a short range of alignments for the layout's matcher
/// bytes (scan records may carry a variable-length prefix such as a flags AD
/// structure), then slices every field at the found alignment. Encoding
/// writes a record back into a payload that excludes the 2-byte company
/// code; [`advertisement`] adds the framing for transmission.
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::beacon::BeaconRecord;
use crate::defaults::{
    AD_TYPE_MANUFACTURER, AD_TYPE_SERVICE_DATA_16, AD_TYPE_SERVICE_DATA_32,
    AD_TYPE_SERVICE_UUIDS_16_COMPLETE, AD_TYPE_SERVICE_UUIDS_32_COMPLETE, COMPANY_CODE_LEN,
    FIRST_ALIGNMENT, LAST_ALIGNMENT, MAX_SECTION_DATA_LEN,
};
use crate::error::EncodeError;
use crate::identifier::Identifier;
use crate::layout::{be_value, FieldKind, FieldSpec, LayoutDescriptor};

/// Decode raw advertisement bytes with `layout`.
///
/// Returns `None` when no alignment matches the layout's matcher (the buffer
/// is some other kind of advertisement) or when the buffer is too short for
/// the layout's fields.
pub fn decode(
    layout: &LayoutDescriptor,
    buf: &[u8],
    rssi: i16,
    address: Option<&str>,
    name: Option<&str>,
) -> Option<BeaconRecord> {
    let align = find_alignment(layout, buf)?;

    if align.checked_add(layout.last_offset())? >= buf.len() {
        log::debug!(
            "Layout '{}' matched at {} but buffer is only {} bytes",
            layout.source(),
            align,
            buf.len()
        );
        return None;
    }

    let mut identifiers = Vec::with_capacity(layout.identifier_count());
    let mut data_fields = Vec::with_capacity(layout.data_count());
    for field in layout.fields() {
        match field.kind {
            FieldKind::Identifier => {
                identifiers.push(Identifier::from_vec(field_bytes(buf, field, align)));
            }
            FieldKind::Data => data_fields.push(be_value(&field_bytes(buf, field, align))),
            FieldKind::Matcher | FieldKind::Power | FieldKind::ServiceUuid => {}
        }
    }

    // Two's complement: keep the low-order byte of the power field
    let tx_power = be_value(&field_bytes(buf, layout.power(), align)) as u8 as i8;

    let manufacturer = match window(buf, align, 0, COMPANY_CODE_LEN) {
        Some(&[lo, hi]) => u16::from_le_bytes([lo, hi]),
        _ => 0,
    };

    let record = BeaconRecord::new(identifiers, tx_power, rssi)
        .ok()?
        .with_data_fields(data_fields)
        .with_type_code(layout.type_code())
        .with_manufacturer(manufacturer)
        .with_service_uuid(layout.service_uuid_value())
        .with_address(address.map(String::from))
        .with_name(name.map(String::from));
    Some(record)
}

/// Encode `record` into a beacon payload for `layout`.
///
/// The payload starts at layout offset 2: the company code (or service UUID)
/// in bytes 0-1 is supplied by the caller or by [`advertisement`].
/// Identifiers longer than their field keep their low-order bytes; shorter
/// ones are zero-filled at the high-order end.
pub fn encode(layout: &LayoutDescriptor, record: &BeaconRecord) -> Result<Vec<u8>, EncodeError> {
    let expected = layout.identifier_count();
    if record.identifiers().len() != expected {
        return Err(EncodeError::IdentifierCount {
            expected,
            actual: record.identifiers().len(),
        });
    }
    let expected = layout.data_count();
    if record.data_fields().len() != expected {
        return Err(EncodeError::DataCount {
            expected,
            actual: record.data_fields().len(),
        });
    }

    let len = layout.last_offset().saturating_add(1);
    let mut out = vec![0u8; len.saturating_sub(COMPANY_CODE_LEN)];
    let mut identifiers = record.identifiers().iter();
    let mut data_fields = record.data_fields().iter();

    for field in layout.fields() {
        // Service UUIDs are framing, written by `Advertisement::sections`
        if field.kind == FieldKind::ServiceUuid {
            continue;
        }
        if field.start < COMPANY_CODE_LEN {
            return Err(EncodeError::FieldOverlapsHeader(field.start));
        }

        let width = field.width();
        let mut value = match field.kind {
            FieldKind::Matcher => fit(field.match_bytes.as_deref().unwrap_or_default(), width),
            FieldKind::Power => fit(&[record.tx_power() as u8], width),
            FieldKind::Identifier => match identifiers.next() {
                Some(id) => fit(id.as_bytes(), width),
                None => continue,
            },
            FieldKind::Data => match data_fields.next() {
                Some(value) => fit(&value.to_be_bytes(), width),
                None => continue,
            },
            FieldKind::ServiceUuid => continue,
        };
        if field.little_endian {
            value.reverse();
        }

        let start = field.start - COMPANY_CODE_LEN;
        out[start..start + width].copy_from_slice(&value);
    }

    Ok(out)
}

/// An encoded beacon ready for a radio advertiser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advertisement {
    /// Manufacturer-specific data: company code plus payload.
    Manufacturer { company_code: u16, payload: Vec<u8> },
    /// Service-UUID framed beacon (Eddystone style).
    Service { service_uuid: u32, payload: Vec<u8> },
}

/// A single AD structure: `[len][type][data...]` on the wire.
///
/// The length byte counts the type byte too, so data is limited to
/// [`MAX_SECTION_DATA_LEN`] bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdSection {
    ad_type: u8,
    data: Vec<u8>,
}

impl AdSection {
    pub fn new(ad_type: u8, data: Vec<u8>) -> Result<Self, EncodeError> {
        if data.len() > MAX_SECTION_DATA_LEN {
            return Err(EncodeError::PayloadTooLong(data.len()));
        }
        Ok(Self { ad_type, data })
    }

    pub fn ad_type(&self) -> u8 {
        self.ad_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.data.len() + 2);
        // Bounded by `new`
        bytes.push((self.data.len() + 1) as u8);
        bytes.push(self.ad_type);
        bytes.extend_from_slice(&self.data);
        bytes
    }
}

impl Advertisement {
    pub fn payload(&self) -> &[u8] {
        match self {
            Advertisement::Manufacturer { payload, .. } | Advertisement::Service { payload, .. } => {
                payload
            }
        }
    }

    /// AD sections to advertise.
    ///
    /// Manufacturer beacons are one 0xFF section. Service beacons are a
    /// complete service UUID list (type 0x03, or 0x05 for 32-bit UUIDs)
    /// followed by a service data section (type 0x16, or 0x20) whose data is
    /// the UUID followed by the payload. UUIDs are little-endian on the wire.
    ///
    /// Fails with [`EncodeError::PayloadTooLong`] when a section's data does
    /// not fit its length byte.
    pub fn sections(&self) -> Result<Vec<AdSection>, EncodeError> {
        match self {
            Advertisement::Manufacturer {
                company_code,
                payload,
            } => {
                let mut data = company_code.to_le_bytes().to_vec();
                data.extend_from_slice(payload);
                Ok(vec![AdSection::new(AD_TYPE_MANUFACTURER, data)?])
            }
            Advertisement::Service {
                service_uuid,
                payload,
            } => {
                let (uuid, list_type, data_type) = match u16::try_from(*service_uuid) {
                    Ok(short) => (
                        short.to_le_bytes().to_vec(),
                        AD_TYPE_SERVICE_UUIDS_16_COMPLETE,
                        AD_TYPE_SERVICE_DATA_16,
                    ),
                    Err(_) => (
                        service_uuid.to_le_bytes().to_vec(),
                        AD_TYPE_SERVICE_UUIDS_32_COMPLETE,
                        AD_TYPE_SERVICE_DATA_32,
                    ),
                };
                let mut data = uuid.clone();
                data.extend_from_slice(payload);
                Ok(vec![
                    AdSection::new(list_type, uuid)?,
                    AdSection::new(data_type, data)?,
                ])
            }
        }
    }

    /// All sections concatenated as AD structures.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        Ok(self.sections()?.iter().flat_map(AdSection::to_bytes).collect())
    }
}

/// Encode `record` and frame it for transmission.
///
/// Layouts with a service UUID produce [`Advertisement::Service`]; all others
/// use the record's manufacturer as company code. Payloads too long for one
/// AD section are rejected with [`EncodeError::PayloadTooLong`].
pub fn advertisement(
    layout: &LayoutDescriptor,
    record: &BeaconRecord,
) -> Result<Advertisement, EncodeError> {
    let payload = encode(layout, record)?;
    let adv = match layout.service_uuid_value() {
        Some(service_uuid) => Advertisement::Service {
            service_uuid,
            payload,
        },
        None => Advertisement::Manufacturer {
            company_code: record.manufacturer(),
            payload,
        },
    };
    adv.sections()?;
    Ok(adv)
}

/// First alignment in `FIRST_ALIGNMENT..=LAST_ALIGNMENT` at which the
/// matcher bytes (and the service UUID, if any) are present.
fn find_alignment(layout: &LayoutDescriptor, buf: &[u8]) -> Option<usize> {
    let matcher = layout.matcher();
    let type_code = matcher.match_bytes.as_deref()?;
    let service = layout
        .service_uuid()
        .and_then(|f| f.match_bytes.as_deref().map(|uuid| (f.start, uuid)));

    (FIRST_ALIGNMENT..=LAST_ALIGNMENT).find(|&align| {
        let type_matches = window(buf, align, matcher.start, type_code.len()) == Some(type_code);
        // Service UUIDs travel little-endian
        let service_matches = service.map_or(true, |(offset, uuid)| {
            window(buf, align, offset, uuid.len())
                .is_some_and(|bytes| bytes.iter().eq(uuid.iter().rev()))
        });
        type_matches && service_matches
    })
}

/// `len` bytes at `align + offset`, or `None` if out of range.
fn window(buf: &[u8], align: usize, offset: usize, len: usize) -> Option<&[u8]> {
    let start = align.checked_add(offset)?;
    buf.get(start..start.checked_add(len)?)
}

/// Field bytes at `align`, in big-endian order. Caller checks bounds.
fn field_bytes(buf: &[u8], field: &FieldSpec, align: usize) -> Vec<u8> {
    let mut bytes = buf[align + field.start..=align + field.end].to_vec();
    if field.little_endian {
        bytes.reverse();
    }
    bytes
}

/// Fit big-endian `src` into `width` bytes: truncate high-order bytes or
/// zero-fill them.
fn fit(src: &[u8], width: usize) -> Vec<u8> {
    if src.len() >= width {
        src[src.len() - width..].to_vec()
    } else {
        let mut out = vec![0u8; width - src.len()];
        out.extend_from_slice(src);
        out
    }
}
