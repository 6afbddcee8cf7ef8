/// Admission filter for raw advertisements, plus the runtime config the host
/// can adjust without reflashing.
use crate::defaults::{
    DEFAULT_MIN_RSSI, DEFAULT_OBJECT_EXPIRATION_MS, DEFAULT_REGION_EXPIRATION_MS,
    DEFAULT_RSSI_WINDOW_MS,
};
use crate::protocol::MacString;

/// Runtime configuration for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterConfig {
    /// Minimum RSSI threshold (dBm). Weaker advertisements are ignored.
    pub min_rssi: i16,
    /// Running-average window for RSSI samples
    pub rssi_window_ms: u32,
    /// Region exit timeout
    pub region_expiration_ms: u32,
    /// Visible-beacon timeout
    pub object_expiration_ms: u32,
    /// Whether advertisements are processed at all
    pub scanning: bool,
}

impl FilterConfig {
    pub const fn new() -> Self {
        Self {
            min_rssi: DEFAULT_MIN_RSSI,
            rssi_window_ms: DEFAULT_RSSI_WINDOW_MS,
            region_expiration_ms: DEFAULT_REGION_EXPIRATION_MS,
            object_expiration_ms: DEFAULT_OBJECT_EXPIRATION_MS,
            scanning: true,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// One advertisement as delivered by the radio.
#[derive(Debug, Clone, Copy)]
pub struct AdvInput<'a> {
    pub mac: &'a [u8; 6],
    /// Raw advertisement payload (AD structures)
    pub data: &'a [u8],
    pub rssi: i16,
    /// Device name, if the radio layer already resolved one
    pub name: Option<&'a str>,
}

/// True if the advertisement should be handed to the decoder.
pub fn passes(input: &AdvInput, config: &FilterConfig) -> bool {
    config.scanning && input.rssi >= config.min_rssi
}

/// Format a 6-byte MAC address into "AA:BB:CC:DD:EE:FF"
pub fn format_mac(mac: &[u8; 6], buf: &mut MacString) {
    use core::fmt::Write;
    buf.clear();
    let _ = write!(
        buf,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
}
