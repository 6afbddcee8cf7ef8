/// Host communication: NDJSON serialization, command parsing and the byte
/// stream line reader.
///
/// The monitor streams beacon sightings and region transitions as
/// newline-delimited JSON. Commands arrive on the same transport.
use core::fmt::Write;

use crate::beacon::BeaconRecord;
use crate::defaults::company_name;
use crate::filter::FilterConfig;
use crate::protocol::{
    DeviceMessage, HostCommand, IdList, IdString, MacString, NameString, RawCommand, MAX_MSG_LEN,
};

// ── Serialization helpers ──────────────────────────────────────────────

/// Write `msg` into `buf` as one NDJSON line.
///
/// Returns the line length, newline included. None if the line does not fit;
/// a line is never emitted without its terminator.
pub fn serialize_message(msg: &DeviceMessage, buf: &mut [u8]) -> Option<usize> {
    let len = serde_json_core::to_slice(msg, buf).ok()?;
    *buf.get_mut(len)? = b'\n';
    Some(len + 1)
}

/// Render a record's identifiers. Returns None if the record has more
/// identifiers than a message carries or one of them is too long.
pub fn identifier_strings(record: &BeaconRecord) -> Option<IdList> {
    let mut ids = IdList::new();
    for id in record.identifiers() {
        let mut text = IdString::new();
        write!(text, "{id}").ok()?;
        ids.push(text).ok()?;
    }
    Some(ids)
}

/// Owned, bounded copy of the fields of a beacon message.
///
/// `DeviceMessage` borrows its strings; this holds them so a message can be
/// built from a [`BeaconRecord`].
#[derive(Debug, Clone)]
pub struct BeaconReport {
    ids: IdList,
    mac: Option<MacString>,
    name: Option<NameString>,
    rssi: i16,
    avg: Option<i16>,
    tx: i8,
    mfr: u16,
    code: u64,
    ts: u32,
}

impl BeaconReport {
    /// None if the identifiers don't fit. Oversized addresses and names are
    /// dropped from the report.
    pub fn from_record(record: &BeaconRecord, ts: u32) -> Option<Self> {
        Some(Self {
            ids: identifier_strings(record)?,
            mac: record.address().and_then(|a| MacString::try_from(a).ok()),
            name: record.name().and_then(|n| NameString::try_from(n).ok()),
            rssi: record.rssi(),
            avg: record.running_average_rssi().map(round_dbm),
            tx: record.tx_power(),
            mfr: record.manufacturer(),
            code: record.type_code(),
            ts,
        })
    }

    pub fn message(&self) -> DeviceMessage<'_> {
        DeviceMessage::Beacon {
            ids: &self.ids,
            mac: self.mac.as_ref(),
            name: self.name.as_ref(),
            rssi: self.rssi,
            avg: self.avg,
            tx: self.tx,
            mfr: self.mfr,
            vendor: company_name(self.mfr),
            code: self.code,
            ts: self.ts,
        }
    }
}

/// Round half away from zero to whole dBm.
fn round_dbm(value: f64) -> i16 {
    let bias = if value < 0.0 { -0.5 } else { 0.5 };
    (value + bias) as i16
}

// ── Command handling ───────────────────────────────────────────────────

/// Deserialize a HostCommand from a JSON byte slice.
///
/// Uses a flat [`RawCommand`] intermediate because `serde_json_core` does not
/// support internally tagged enums.
pub fn parse_command(data: &[u8]) -> Option<HostCommand> {
    let trimmed = data.trim_ascii();
    if trimmed.is_empty() {
        return None;
    }
    let (raw, _) = serde_json_core::from_slice::<RawCommand>(trimmed).ok()?;
    match raw.cmd.as_str() {
        "start" => Some(HostCommand::Start),
        "stop" => Some(HostCommand::Stop),
        "status" => Some(HostCommand::GetStatus),
        "set_rssi" => raw
            .min_rssi
            .map(|min_rssi| HostCommand::SetRssi { min_rssi }),
        "set_window" => raw
            .window_ms
            .map(|window_ms| HostCommand::SetWindow { window_ms }),
        other => {
            log::debug!("Unknown host command {:?}", other);
            None
        }
    }
}

/// Apply a host command to the runtime config.
/// Returns true when the host asked for a status report.
pub fn handle_command(cmd: HostCommand, config: &mut FilterConfig) -> bool {
    match cmd {
        HostCommand::Start => {
            config.scanning = true;
            log::info!("Scanning started by host command");
            false
        }
        HostCommand::Stop => {
            config.scanning = false;
            log::info!("Scanning stopped by host command");
            false
        }
        HostCommand::GetStatus => true,
        HostCommand::SetRssi { min_rssi } => {
            config.min_rssi = min_rssi;
            log::info!("RSSI threshold set to {}", min_rssi);
            false
        }
        HostCommand::SetWindow { window_ms } => {
            config.rssi_window_ms = window_ms;
            log::info!("RSSI window set to {} ms", window_ms);
            false
        }
    }
}

// ── NDJSON line reader ─────────────────────────────────────────────────

/// NDJSON reader state machine.
/// Accumulates bytes until a newline is found, then yields the line.
pub struct LineReader {
    buf: [u8; MAX_MSG_LEN],
    pos: usize,
    overflowed: bool,
}

impl LineReader {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_MSG_LEN],
            pos: 0,
            overflowed: false,
        }
    }

    /// Feed a byte into the reader. Returns a complete line (without newline)
    /// when one is detected. An oversized line is dropped whole.
    pub fn feed(&mut self, byte: u8) -> Option<&[u8]> {
        if byte == b'\n' || byte == b'\r' {
            let len = self.pos;
            let overflowed = self.overflowed;
            self.pos = 0;
            self.overflowed = false;
            if len > 0 && !overflowed {
                Some(&self.buf[..len])
            } else {
                None
            }
        } else if self.overflowed {
            None
        } else if self.pos < self.buf.len() {
            self.buf[self.pos] = byte;
            self.pos += 1;
            None
        } else {
            log::warn!("Dropping host line longer than {} bytes", MAX_MSG_LEN);
            self.overflowed = true;
            None
        }
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}
