/// JSON message protocol between a beacon monitor and its host.
///
/// All messages are newline-delimited JSON (NDJSON).
/// Uses `heapless` types so messages can be built without an allocator.
use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

/// Maximum length for MAC address strings ("AA:BB:CC:DD:EE:FF")
pub type MacString = String<18>;

/// Maximum length for device name strings
pub type NameString = String<33>;

/// Maximum length for a rendered identifier ("0x" + 32 bytes of hex)
pub type IdString = String<66>;

/// Maximum number of identifiers reported per beacon
pub const MAX_IDS: usize = 4;

/// Rendered identifier list of one beacon
pub type IdList = Vec<IdString, MAX_IDS>;

/// Messages sent from the monitor to the host
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum DeviceMessage<'a> {
    /// A decoded beacon sighting
    #[serde(rename = "beacon")]
    Beacon {
        ids: &'a IdList,
        #[serde(skip_serializing_if = "Option::is_none")]
        mac: Option<&'a MacString>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<&'a NameString>,
        rssi: i16,
        /// Running average RSSI, rounded to whole dBm
        #[serde(skip_serializing_if = "Option::is_none")]
        avg: Option<i16>,
        /// Calibrated tx power
        tx: i8,
        /// Manufacturer company ID
        mfr: u16,
        /// Vendor name for `mfr`, if known
        #[serde(skip_serializing_if = "Option::is_none")]
        vendor: Option<&'static str>,
        /// Layout type code
        code: u64,
        /// Uptime in milliseconds when captured
        ts: u32,
    },
    /// A region became occupied
    #[serde(rename = "enter")]
    Enter { region: &'a str, ts: u32 },
    /// A region was vacated
    #[serde(rename = "exit")]
    Exit { region: &'a str, ts: u32 },
    /// Monitor status report
    #[serde(rename = "status")]
    Status {
        scanning: bool,
        /// Uptime in seconds
        uptime: u32,
        /// Beacons currently visible
        visible: u16,
        /// Regions currently occupied
        regions: u16,
        /// Library version
        version: &'static str,
    },
}

/// Commands sent from the host to the monitor.
///
/// Deserialized manually via [`RawCommand`] in `comm::parse_command()` because
/// `serde_json_core` does not support internally tagged enums (`deserialize_any`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// Start processing advertisements
    Start,
    /// Stop processing advertisements
    Stop,
    /// Request current status
    GetStatus,
    /// Update minimum RSSI threshold
    SetRssi {
        /// Minimum RSSI (negative dBm value)
        min_rssi: i16,
    },
    /// Update the RSSI running-average window
    SetWindow { window_ms: u32 },
}

/// Wire format for host commands. Flat struct that `serde_json_core` can
/// deserialize without `deserialize_any`. Converted to [`HostCommand`] in
/// `comm::parse_command()`.
#[derive(Deserialize)]
pub(crate) struct RawCommand {
    pub cmd: String<16>,
    #[serde(default)]
    pub min_rssi: Option<i16>,
    #[serde(default)]
    pub window_ms: Option<u32>,
}

/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 512;
