/// Default layouts, constants and lookup tables.
///
/// Well-known layouts are the published AltBeacon, iBeacon and Eddystone-UID
/// formats expressed in the layout language. Company codes come from the
/// Bluetooth SIG assigned numbers list.
use alloc::vec::Vec;

use crate::error::LayoutError;
use crate::layout::{self, LayoutDescriptor};

/// AltBeacon: 16-byte ID1, 2-byte ID2/ID3, tx power, one reserved data byte.
pub const ALTBEACON_LAYOUT: &str = "m:2-3=beac,i:4-19,i:20-21,i:22-23,p:24-24,d:25-25";

/// iBeacon: proximity UUID, major, minor, measured power.
pub const IBEACON_LAYOUT: &str = "m:2-3=0215,i:4-19,i:20-21,i:22-23,p:24-24";

/// Eddystone-UID: 10-byte namespace, 6-byte instance, framed by service UUID 0xFEAA.
pub const EDDYSTONE_UID_LAYOUT: &str = "s:0-1=feaa,m:2-2=00,p:3-3,i:4-13,i:14-19";

/// A named layout shipped with the library.
#[derive(Debug, Clone, Copy)]
pub struct KnownLayout {
    pub name: &'static str,
    pub layout: &'static str,
    pub description: &'static str,
}

/// Layouts tried by default, in order.
pub static KNOWN_LAYOUTS: &[KnownLayout] = &[
    KnownLayout {
        name: "altbeacon",
        layout: ALTBEACON_LAYOUT,
        description: "AltBeacon open beacon format",
    },
    KnownLayout {
        name: "ibeacon",
        layout: IBEACON_LAYOUT,
        description: "Apple iBeacon",
    },
    KnownLayout {
        name: "eddystone_uid",
        layout: EDDYSTONE_UID_LAYOUT,
        description: "Eddystone UID frame",
    },
];

/// Compile every entry of [`KNOWN_LAYOUTS`].
pub fn compile_known_layouts() -> Result<Vec<LayoutDescriptor>, LayoutError> {
    KNOWN_LAYOUTS
        .iter()
        .map(|known| layout::compile(known.layout))
        .collect()
}

/// Look up a known layout by name.
pub fn known_layout(name: &str) -> Option<&'static KnownLayout> {
    KNOWN_LAYOUTS.iter().find(|known| known.name == name)
}

/// Bluetooth SIG company codes seen on common beacons.
pub static COMPANY_CODES: &[(u16, &str)] = &[
    (0x004C, "Apple"),
    (0x00E0, "Google"),
    (0x0059, "Nordic Semiconductor"),
    (0x0118, "Radius Networks"),
    (0x015D, "Estimote"),
    (0x0499, "Ruuvi Innovations"),
];

/// Vendor name for a company code, if known.
pub fn company_name(code: u16) -> Option<&'static str> {
    COMPANY_CODES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, name)| *name)
}

// ── Codec constants ──────────────────────────────────────────────────

/// Length of the company code (or 16-bit service UUID) preceding a payload.
pub const COMPANY_CODE_LEN: usize = 2;

/// Largest byte offset a layout term may name (extended advertising data).
pub const MAX_OFFSET: usize = 255;

/// Largest AD section body; the length byte also counts the type byte.
pub const MAX_SECTION_DATA_LEN: usize = u8::MAX as usize - 1;

/// Alignment search range for the matcher, inclusive.
pub const FIRST_ALIGNMENT: usize = 2;
pub const LAST_ALIGNMENT: usize = 5;

// ── Tracking constants ───────────────────────────────────────────────

/// A region is exited after this long without a matching sighting.
pub const DEFAULT_REGION_EXPIRATION_MS: u32 = 30_000;

/// A beacon drops out of the visible set after this long unseen.
pub const DEFAULT_OBJECT_EXPIRATION_MS: u32 = 5_000;

/// RSSI samples older than this are excluded from the running average.
pub const DEFAULT_RSSI_WINDOW_MS: u32 = 20_000;

/// Weakest RSSI accepted by the default filter config (dBm).
pub const DEFAULT_MIN_RSSI: i16 = -100;

// ── AD structure types ───────────────────────────────────────────────

pub const AD_TYPE_FLAGS: u8 = 0x01;
pub const AD_TYPE_SERVICE_UUIDS_16_INCOMPLETE: u8 = 0x02;
pub const AD_TYPE_SERVICE_UUIDS_16_COMPLETE: u8 = 0x03;
pub const AD_TYPE_SERVICE_UUIDS_32_COMPLETE: u8 = 0x05;
pub const AD_TYPE_SHORT_NAME: u8 = 0x08;
pub const AD_TYPE_COMPLETE_NAME: u8 = 0x09;
pub const AD_TYPE_SERVICE_DATA_16: u8 = 0x16;
pub const AD_TYPE_SERVICE_DATA_32: u8 = 0x20;
pub const AD_TYPE_MANUFACTURER: u8 = 0xFF;
