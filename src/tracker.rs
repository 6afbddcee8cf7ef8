/// Presence tracking for regions and individual beacons.
///
/// Every tracked key is either ABSENT (not in the live table) or PRESENT
/// (in the live table with a last-seen time). `track` moves keys to PRESENT
/// and `purge_expired` moves keys that have not been seen for longer than
/// the expiration back to ABSENT. Both transitions are recorded in pending
/// entered/exited sets until the caller clears them after reporting.
///
/// Nothing runs in the background: the caller decides when to purge.
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::beacon::BeaconRecord;
use crate::clock::Clock;
use crate::defaults::{DEFAULT_OBJECT_EXPIRATION_MS, DEFAULT_REGION_EXPIRATION_MS};
use crate::identifier::Identifier;
use crate::region::Region;

/// Unique id of the wildcard region seeded by [`Tracker::objects`].
pub const ALL_BEACONS_REGION: &str = "all-beacons";

/// What a tracker keys its state on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingMode {
    /// One key per matching region ("inside region X")
    Region,
    /// One key per beacon identity ("beacon Y is visible")
    Object,
}

impl TrackingMode {
    pub fn default_expiration(self) -> Duration {
        let ms = match self {
            TrackingMode::Region => DEFAULT_REGION_EXPIRATION_MS,
            TrackingMode::Object => DEFAULT_OBJECT_EXPIRATION_MS,
        };
        Duration::from_millis(u64::from(ms))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingMode::Region => "region",
            TrackingMode::Object => "object",
        }
    }
}

/// A PRESENT key, as reported through the entered/exited sets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrackedKey {
    Region(Region),
    /// Latest sighting of the beacon
    Beacon(BeaconRecord),
}

impl TrackedKey {
    fn id(&self) -> TrackedId {
        match self {
            TrackedKey::Region(region) => TrackedId::Region(String::from(region.unique_id())),
            TrackedKey::Beacon(record) => TrackedId::Beacon(record.identifiers().to_vec()),
        }
    }
}

impl fmt::Display for TrackedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackedKey::Region(region) => write!(f, "region {}", region.unique_id()),
            TrackedKey::Beacon(record) => {
                f.write_str("beacon")?;
                for id in record.identifiers() {
                    write!(f, " {id}")?;
                }
                Ok(())
            }
        }
    }
}

/// Identity half of a [`TrackedKey`], used as the live-table key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum TrackedId {
    Region(String),
    Beacon(Vec<Identifier>),
}

struct TrackedEntry {
    key: TrackedKey,
    last_seen: Instant,
}

struct TrackerState {
    expiration: Duration,
    live: HashMap<TrackedId, TrackedEntry>,
    entered: Vec<TrackedKey>,
    exited: Vec<TrackedKey>,
}

impl TrackerState {
    fn new(expiration: Duration) -> Self {
        Self {
            expiration,
            live: HashMap::new(),
            entered: Vec::new(),
            exited: Vec::new(),
        }
    }

    fn refresh(&mut self, key: TrackedKey, now: Instant) {
        let id = key.id();
        if let Some(entry) = self.live.get_mut(&id) {
            entry.key = key;
            entry.last_seen = now;
            return;
        }

        log::info!("Entered {}", key);
        if !self.entered.contains(&key) {
            self.entered.push(key.clone());
        }
        self.live.insert(id, TrackedEntry { key, last_seen: now });
    }

    /// Live entries ordered by identity.
    fn sorted_live(&self) -> Vec<(&TrackedId, &TrackedEntry)> {
        let mut live: Vec<_> = self.live.iter().collect();
        live.sort_by(|a, b| a.0.cmp(b.0));
        live
    }
}

/// Presence state machine over a fixed set of regions.
///
/// All methods take `&self`; state, expiration included, is behind a mutex
/// so one tracker can be shared between radio callback threads.
pub struct Tracker {
    mode: TrackingMode,
    regions: Vec<Region>,
    clock: Arc<dyn Clock>,
    state: Mutex<TrackerState>,
}

impl Tracker {
    /// Tracker with the mode's default expiration.
    pub fn new(mode: TrackingMode, regions: Vec<Region>, clock: Arc<dyn Clock>) -> Self {
        log::debug!(
            "Tracking in {} mode over {} regions",
            mode.as_str(),
            regions.len()
        );
        Self {
            mode,
            regions,
            clock,
            state: Mutex::new(TrackerState::new(mode.default_expiration())),
        }
    }

    /// Region-mode tracker ("entered/exited region" semantics).
    pub fn regions(regions: Vec<Region>, clock: Arc<dyn Clock>) -> Self {
        Self::new(TrackingMode::Region, regions, clock)
    }

    /// Object-mode tracker that sees every beacon.
    pub fn objects(clock: Arc<dyn Clock>) -> Self {
        Self::new(
            TrackingMode::Object,
            vec![Region::wildcard(ALL_BEACONS_REGION)],
            clock,
        )
    }

    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.state
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .expiration = expiration;
        self
    }

    /// Change the expiration. Live keys are judged against it on the next
    /// purge.
    pub fn set_expiration(&self, expiration: Duration) {
        self.lock().expiration = expiration;
    }

    pub fn mode(&self) -> TrackingMode {
        self.mode
    }

    pub fn expiration(&self) -> Duration {
        self.lock().expiration
    }

    pub fn monitored_regions(&self) -> &[Region] {
        &self.regions
    }

    /// Record a sighting. Returns true if any monitored region matched.
    pub fn track(&self, record: &BeaconRecord) -> bool {
        let mut matched = self
            .regions
            .iter()
            .filter(|region| region.matches_beacon(record))
            .peekable();
        if matched.peek().is_none() {
            return false;
        }

        let mut state = self.lock();
        // Read under the lock so sightings are stamped in lock order
        let now = self.clock.now();
        match self.mode {
            TrackingMode::Region => {
                for region in matched {
                    state.refresh(TrackedKey::Region(region.clone()), now);
                }
            }
            TrackingMode::Object => state.refresh(TrackedKey::Beacon(record.clone()), now),
        }
        true
    }

    /// Expire keys not seen for longer than the expiration.
    /// Returns how many keys exited.
    pub fn purge_expired(&self) -> usize {
        let mut state = self.lock();
        let now = self.clock.now();
        let expiration = state.expiration;

        let mut expired: Vec<TrackedId> = state
            .live
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_seen) > expiration)
            .map(|(id, _)| id.clone())
            .collect();
        expired.sort();

        for id in &expired {
            if let Some(entry) = state.live.remove(id) {
                log::info!("Exited {}", entry.key);
                if !state.exited.contains(&entry.key) {
                    state.exited.push(entry.key);
                }
            }
        }
        expired.len()
    }

    /// Reset the pending entered and exited sets. Call once per reporting
    /// cycle, after reading them.
    pub fn clear_added_and_removed(&self) {
        let mut state = self.lock();
        state.entered.clear();
        state.exited.clear();
    }

    /// Take the pending entered and exited sets in one step, leaving both
    /// empty.
    pub fn take_entered_and_exited(&self) -> (Vec<TrackedKey>, Vec<TrackedKey>) {
        let mut state = self.lock();
        (
            std::mem::take(&mut state.entered),
            std::mem::take(&mut state.exited),
        )
    }

    /// Latest sighting of every PRESENT beacon (object mode).
    pub fn visible_beacons(&self) -> Vec<BeaconRecord> {
        self.lock()
            .sorted_live()
            .into_iter()
            .filter_map(|(_, entry)| as_beacon(&entry.key))
            .collect()
    }

    /// Every PRESENT region (region mode).
    pub fn visible_regions(&self) -> Vec<Region> {
        self.lock()
            .sorted_live()
            .into_iter()
            .filter_map(|(_, entry)| as_region(&entry.key))
            .collect()
    }

    pub fn entered_regions(&self) -> Vec<Region> {
        self.lock().entered.iter().filter_map(as_region).collect()
    }

    pub fn exited_regions(&self) -> Vec<Region> {
        self.lock().exited.iter().filter_map(as_region).collect()
    }

    pub fn entered_beacons(&self) -> Vec<BeaconRecord> {
        self.lock().entered.iter().filter_map(as_beacon).collect()
    }

    pub fn exited_beacons(&self) -> Vec<BeaconRecord> {
        self.lock().exited.iter().filter_map(as_beacon).collect()
    }

    /// Number of PRESENT keys.
    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn as_region(key: &TrackedKey) -> Option<Region> {
    match key {
        TrackedKey::Region(region) => Some(region.clone()),
        TrackedKey::Beacon(_) => None,
    }
}

fn as_beacon(key: &TrackedKey) -> Option<BeaconRecord> {
    match key {
        TrackedKey::Beacon(record) => Some(record.clone()),
        TrackedKey::Region(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::thread;

    fn beacon(minor: u16, rssi: i16) -> BeaconRecord {
        let ids = vec![
            Identifier::parse("2f234454-cf6d-4a0f-adf2-f4911ba9ffa6").unwrap(),
            Identifier::from_u16(1),
            Identifier::from_u16(minor),
        ];
        BeaconRecord::new(ids, -59, rssi).unwrap()
    }

    fn object_tracker() -> (Arc<ManualClock>, Tracker) {
        let clock = Arc::new(ManualClock::new());
        let tracker = Tracker::objects(clock.clone());
        (clock, tracker)
    }

    // ── Object mode ─────────────────────────────────────────────────

    #[test]
    fn tracked_beacon_is_visible_and_entered() {
        let (_clock, tracker) = object_tracker();
        assert!(tracker.track(&beacon(2, -60)));

        assert_eq!(tracker.visible_beacons(), vec![beacon(2, -60)]);
        assert_eq!(tracker.entered_beacons(), vec![beacon(2, -60)]);
        assert!(tracker.exited_beacons().is_empty());
        assert!(tracker.entered_regions().is_empty());
    }

    #[test]
    fn refresh_keeps_latest_sighting_without_reentering() {
        let (_clock, tracker) = object_tracker();
        tracker.track(&beacon(2, -60));
        tracker.clear_added_and_removed();
        tracker.track(&beacon(2, -75));

        let visible = tracker.visible_beacons();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].rssi(), -75);
        assert!(tracker.entered_beacons().is_empty());
    }

    #[test]
    fn beacon_expires_after_object_timeout() {
        let (clock, tracker) = object_tracker();
        tracker.track(&beacon(2, -60));

        clock.advance(Duration::from_secs(5));
        assert_eq!(tracker.purge_expired(), 0);
        assert_eq!(tracker.live_count(), 1);

        clock.advance(Duration::from_millis(1));
        assert_eq!(tracker.purge_expired(), 1);
        assert!(tracker.visible_beacons().is_empty());
        assert_eq!(tracker.exited_beacons(), vec![beacon(2, -60)]);
    }

    #[test]
    fn sighting_extends_lifetime() {
        let (clock, tracker) = object_tracker();
        tracker.track(&beacon(2, -60));
        clock.advance(Duration::from_secs(4));
        tracker.track(&beacon(2, -60));
        clock.advance(Duration::from_secs(4));
        tracker.purge_expired();
        assert_eq!(tracker.visible_beacons().len(), 1);
    }

    #[test]
    fn visible_beacons_are_ordered_by_identity() {
        let (_clock, tracker) = object_tracker();
        tracker.track(&beacon(9, -60));
        tracker.track(&beacon(3, -60));
        tracker.track(&beacon(5, -60));
        let minors: Vec<u16> = tracker
            .visible_beacons()
            .iter()
            .map(|b| b.identifier(2).unwrap().to_u16().unwrap())
            .collect();
        assert_eq!(minors, [3, 5, 9]);
    }

    #[test]
    fn clear_resets_pending_sets_only() {
        let (clock, tracker) = object_tracker();
        tracker.track(&beacon(1, -60));
        tracker.track(&beacon(2, -60));
        clock.advance(Duration::from_secs(3));
        tracker.track(&beacon(2, -60));
        clock.advance(Duration::from_secs(3));
        tracker.purge_expired();

        assert_eq!(tracker.entered_beacons().len(), 2);
        assert_eq!(tracker.exited_beacons(), vec![beacon(1, -60)]);

        tracker.clear_added_and_removed();
        assert!(tracker.entered_beacons().is_empty());
        assert!(tracker.exited_beacons().is_empty());
        assert_eq!(tracker.visible_beacons(), vec![beacon(2, -60)]);
    }

    #[test]
    fn exited_beacon_reenters_on_next_sighting() {
        let (clock, tracker) = object_tracker();
        tracker.track(&beacon(1, -60));
        clock.advance(Duration::from_secs(6));
        tracker.purge_expired();
        tracker.clear_added_and_removed();

        tracker.track(&beacon(1, -60));
        assert_eq!(tracker.entered_beacons(), vec![beacon(1, -60)]);
    }

    #[test]
    fn take_returns_and_clears_transitions() {
        let (clock, tracker) = object_tracker();
        tracker.track(&beacon(1, -60));
        clock.advance(Duration::from_secs(6));
        tracker.purge_expired();

        let (entered, exited) = tracker.take_entered_and_exited();
        assert_eq!(entered, vec![TrackedKey::Beacon(beacon(1, -60))]);
        assert_eq!(exited, vec![TrackedKey::Beacon(beacon(1, -60))]);
        assert!(tracker.entered_beacons().is_empty());
        assert!(tracker.exited_beacons().is_empty());
    }

    // ── Region mode ─────────────────────────────────────────────────

    #[test]
    fn region_enter_and_exit() {
        let clock = Arc::new(ManualClock::new());
        let store = Region::new("store", None, Some(Identifier::from_u16(1)), None);
        let other = Region::new("other", None, Some(Identifier::from_u16(7)), None);
        let tracker = Tracker::regions(vec![store.clone(), other], clock.clone());
        assert_eq!(tracker.expiration(), Duration::from_secs(30));

        assert!(tracker.track(&beacon(2, -60)));
        assert_eq!(tracker.entered_regions(), vec![store.clone()]);
        assert_eq!(tracker.visible_regions(), vec![store.clone()]);
        assert!(tracker.visible_beacons().is_empty());

        clock.advance(Duration::from_secs(31));
        tracker.purge_expired();
        assert_eq!(tracker.exited_regions(), vec![store]);
        assert!(tracker.visible_regions().is_empty());
    }

    #[test]
    fn every_matching_region_enters() {
        let clock = Arc::new(ManualClock::new());
        let regions = vec![
            Region::wildcard("everything"),
            Region::new("minor-2", None, None, Some(Identifier::from_u16(2))),
        ];
        let tracker = Tracker::regions(regions, clock);
        tracker.track(&beacon(2, -60));
        let ids: Vec<String> = tracker
            .entered_regions()
            .iter()
            .map(|r| String::from(r.unique_id()))
            .collect();
        assert_eq!(ids, ["everything", "minor-2"]);
    }

    #[test]
    fn unmatched_record_is_ignored() {
        let clock = Arc::new(ManualClock::new());
        let region = Region::new("r", None, Some(Identifier::from_u16(42)), None);
        let tracker = Tracker::regions(vec![region], clock);
        assert!(!tracker.track(&beacon(2, -60)));
        assert_eq!(tracker.live_count(), 0);
        assert!(tracker.entered_regions().is_empty());
    }

    #[test]
    fn custom_expiration() {
        let clock = Arc::new(ManualClock::new());
        let tracker = Tracker::objects(clock.clone()).with_expiration(Duration::from_secs(1));
        tracker.track(&beacon(1, -60));
        clock.advance(Duration::from_millis(1500));
        assert_eq!(tracker.purge_expired(), 1);

        tracker.set_expiration(Duration::from_secs(10));
        assert_eq!(tracker.expiration(), Duration::from_secs(10));
        tracker.track(&beacon(1, -60));
        clock.advance(Duration::from_secs(9));
        assert_eq!(tracker.purge_expired(), 0);
        assert_eq!(tracker.mode(), TrackingMode::Object);
        assert_eq!(tracker.monitored_regions()[0].unique_id(), ALL_BEACONS_REGION);
    }

    // ── Concurrency ─────────────────────────────────────────────────

    #[test]
    fn concurrent_tracking_and_purging() {
        let (_clock, tracker) = object_tracker();
        let tracker = Arc::new(tracker);

        let handles: Vec<_> = (0..8u16)
            .map(|t| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || {
                    for i in 0..50u16 {
                        tracker.track(&beacon(t * 50 + i, -60));
                        tracker.purge_expired();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.visible_beacons().len(), 400);
        assert_eq!(tracker.entered_beacons().len(), 400);
    }

    #[test]
    fn expiration_changes_from_another_thread() {
        let (clock, tracker) = object_tracker();
        let tracker = Arc::new(tracker);
        tracker.track(&beacon(1, -60));

        let remote = Arc::clone(&tracker);
        thread::spawn(move || remote.set_expiration(Duration::from_secs(1)))
            .join()
            .unwrap();

        clock.advance(Duration::from_secs(2));
        assert_eq!(tracker.purge_expired(), 1);
    }

    #[test]
    fn sightings_stamped_after_a_purge_survive_it() {
        let (clock, tracker) = object_tracker();
        let tracker = Arc::new(tracker);
        tracker.track(&beacon(1, -60));
        clock.advance(Duration::from_secs(6));

        // Whichever takes the lock first, the sighting is stamped no earlier
        // than the purge's time and the beacon stays live
        let tracking = {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || tracker.track(&beacon(1, -60)))
        };
        tracker.purge_expired();
        tracking.join().unwrap();

        tracker.purge_expired();
        assert_eq!(tracker.live_count(), 1);
    }

    #[test]
    fn key_display() {
        let key = TrackedKey::Region(Region::wildcard("lobby"));
        assert_eq!(key.to_string(), "region lobby");
        let key = TrackedKey::Beacon(beacon(2, -60));
        assert_eq!(
            key.to_string(),
            "beacon 2f234454-cf6d-4a0f-adf2-f4911ba9ffa6 1 2"
        );
    }
}
