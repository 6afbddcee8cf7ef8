/// End-to-end beacon monitoring: raw advertisement in, decoded and tracked
/// record out.
///
/// A [`BeaconMonitor`] owns the compiled layouts, one RSSI window keyed by
/// device address, a region-mode tracker over the caller's regions and an
/// object-mode tracker that sees every beacon.
///
/// Every method takes `&self`, so one monitor behind an `Arc` can be shared
/// between radio callbacks and the host link.
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::beacon::BeaconRecord;
use crate::clock::Clock;
use crate::codec;
use crate::comm::{handle_command, parse_command, serialize_message, BeaconReport, LineReader};
use crate::defaults::compile_known_layouts;
use crate::error::LayoutError;
use crate::filter::{format_mac, passes, AdvInput, FilterConfig};
use crate::layout::LayoutDescriptor;
use crate::protocol::{DeviceMessage, HostCommand, MacString, MAX_MSG_LEN, VERSION};
use crate::region::Region;
use crate::rssi::RssiWindow;
use crate::scanner::ScanRecord;
use crate::tracker::{TrackedKey, Tracker};

/// Transitions since the previous report, plus what is visible now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorReport {
    pub entered: Vec<Region>,
    pub exited: Vec<Region>,
    pub visible: Vec<BeaconRecord>,
}

impl MonitorReport {
    /// Stream the report as NDJSON lines: enter, then exit, then one beacon
    /// line per visible record, each stamped with `ts`. Lines that do not
    /// fit a message are skipped. Returns the number of lines emitted.
    pub fn write_ndjson(&self, ts: u32, mut emit: impl FnMut(&[u8])) -> usize {
        let mut buf = [0u8; MAX_MSG_LEN];
        let mut lines = 0;

        for region in &self.entered {
            let msg = DeviceMessage::Enter {
                region: region.unique_id(),
                ts,
            };
            lines += usize::from(send_line(&msg, &mut buf, &mut emit));
        }
        for region in &self.exited {
            let msg = DeviceMessage::Exit {
                region: region.unique_id(),
                ts,
            };
            lines += usize::from(send_line(&msg, &mut buf, &mut emit));
        }
        for record in &self.visible {
            let Some(report) = BeaconReport::from_record(record, ts) else {
                log::warn!("Beacon identifiers do not fit a message");
                continue;
            };
            lines += usize::from(send_line(&report.message(), &mut buf, &mut emit));
        }
        lines
    }
}

pub struct BeaconMonitor {
    layouts: Vec<LayoutDescriptor>,
    config: Mutex<FilterConfig>,
    host: Mutex<LineReader>,
    rssi: RssiWindow,
    regions: Tracker,
    objects: Tracker,
}

impl BeaconMonitor {
    pub fn new(
        layouts: Vec<LayoutDescriptor>,
        regions: Vec<Region>,
        config: FilterConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rssi = RssiWindow::new(millis(config.rssi_window_ms), clock.clone());
        let regions = Tracker::regions(regions, clock.clone())
            .with_expiration(millis(config.region_expiration_ms));
        let objects =
            Tracker::objects(clock).with_expiration(millis(config.object_expiration_ms));
        Self {
            layouts,
            config: Mutex::new(config),
            host: Mutex::new(LineReader::new()),
            rssi,
            regions,
            objects,
        }
    }

    /// Monitor decoding every layout in `defaults::KNOWN_LAYOUTS`.
    pub fn with_known_layouts(
        regions: Vec<Region>,
        config: FilterConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LayoutError> {
        Ok(Self::new(compile_known_layouts()?, regions, config, clock))
    }

    pub fn layouts(&self) -> &[LayoutDescriptor] {
        &self.layouts
    }

    /// Copy of the current config.
    pub fn config(&self) -> FilterConfig {
        *self.lock_config()
    }

    /// Replace the config. Applies to the next call of every method,
    /// including samples and keys already held.
    pub fn set_config(&self, config: FilterConfig) {
        let mut current = self.lock_config();
        self.apply(&config);
        *current = config;
    }

    /// Apply one host command. Returns true when the host asked for a
    /// status report.
    pub fn apply_command(&self, cmd: HostCommand) -> bool {
        let mut current = self.lock_config();
        let mut config = *current;
        let wants_status = handle_command(cmd, &mut config);
        self.apply(&config);
        *current = config;
        wants_status
    }

    /// Feed bytes from the host link. Complete lines are parsed and applied
    /// as commands; anything else is dropped. Returns true when any of them
    /// asked for a status report.
    pub fn feed_host(&self, bytes: &[u8]) -> bool {
        let mut reader = self.host.lock().unwrap_or_else(|e| e.into_inner());
        let mut wants_status = false;
        for &byte in bytes {
            let Some(line) = reader.feed(byte) else {
                continue;
            };
            match parse_command(line) {
                Some(cmd) => wants_status |= self.apply_command(cmd),
                None => log::warn!("Ignoring malformed host line"),
            }
        }
        wants_status
    }

    /// Decode and track one advertisement.
    ///
    /// Every layout is tried against the whole payload first, then against
    /// the manufacturer and service-data structures on their own. Returns
    /// the decoded record with address, name and running-average RSSI
    /// attached, or None if filtered out or no layout matched.
    pub fn process(&self, input: &AdvInput) -> Option<BeaconRecord> {
        if !passes(input, &self.config()) {
            return None;
        }

        let scan = ScanRecord::parse(input.data);
        let mut mac = MacString::new();
        format_mac(input.mac, &mut mac);
        let name = input.name.or(scan.name());

        let candidates = [
            Some(input.data),
            scan.manufacturer_frame(),
            scan.service_frame(),
        ];
        let address = Some(mac.as_str());
        let record = candidates.iter().flatten().find_map(|buf| {
            self.layouts
                .iter()
                .find_map(|layout| codec::decode(layout, buf, input.rssi, address, name))
        });
        let Some(record) = record else {
            log::debug!("No layout matched advertisement from {}", mac);
            return None;
        };

        let average = self.rssi.add(mac.as_str(), input.rssi);
        let record = record.with_running_average_rssi(Some(average));
        self.regions.track(&record);
        self.objects.track(&record);
        Some(record)
    }

    /// Expire stale regions, beacons and RSSI samples.
    pub fn purge_expired(&self) {
        self.regions.purge_expired();
        self.objects.purge_expired();
        self.rssi.purge();
    }

    /// Region transitions since the last report and the visible beacons.
    /// Clears the pending transitions.
    pub fn report(&self) -> MonitorReport {
        let (entered, exited) = self.regions.take_entered_and_exited();
        // Object-mode transitions are not reported; drop them with the rest
        self.objects.clear_added_and_removed();
        MonitorReport {
            entered: regions_of(entered),
            exited: regions_of(exited),
            visible: self.objects.visible_beacons(),
        }
    }

    pub fn visible_beacons(&self) -> Vec<BeaconRecord> {
        self.objects.visible_beacons()
    }

    pub fn occupied_regions(&self) -> Vec<Region> {
        self.regions.visible_regions()
    }

    pub fn status(&self, uptime_secs: u32) -> DeviceMessage<'static> {
        DeviceMessage::Status {
            scanning: self.config().scanning,
            uptime: uptime_secs,
            visible: saturate(self.objects.live_count()),
            regions: saturate(self.regions.live_count()),
            version: VERSION,
        }
    }

    /// Push window and expiration limits down to live state.
    fn apply(&self, config: &FilterConfig) {
        self.rssi.set_window(millis(config.rssi_window_ms));
        self.regions.set_expiration(millis(config.region_expiration_ms));
        self.objects.set_expiration(millis(config.object_expiration_ms));
    }

    fn lock_config(&self) -> MutexGuard<'_, FilterConfig> {
        self.config.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn send_line(msg: &DeviceMessage, buf: &mut [u8], emit: &mut impl FnMut(&[u8])) -> bool {
    match serialize_message(msg, buf) {
        Some(len) => {
            emit(&buf[..len]);
            true
        }
        None => {
            log::warn!("Dropping {:?}: message too long", msg);
            false
        }
    }
}

fn regions_of(keys: Vec<TrackedKey>) -> Vec<Region> {
    keys.into_iter()
        .filter_map(|key| match key {
            TrackedKey::Region(region) => Some(region),
            TrackedKey::Beacon(_) => None,
        })
        .collect()
}

fn millis(ms: u32) -> Duration {
    Duration::from_millis(u64::from(ms))
}

fn saturate(count: usize) -> u16 {
    u16::try_from(count).unwrap_or(u16::MAX)
}
