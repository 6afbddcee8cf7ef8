/// Time-windowed running average of RSSI readings, per device key.
///
/// Samples are pruned by age against the clock's current time on every read
/// and write, so an idle key decays to empty even if nothing new arrives.
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::defaults::DEFAULT_RSSI_WINDOW_MS;

/// One timestamped RSSI reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RssiSample {
    pub timestamp: Instant,
    pub rssi: i16,
}

struct WindowState {
    window: Duration,
    samples: HashMap<String, VecDeque<RssiSample>>,
}

/// Shared by reference: the window length and samples sit behind one mutex.
pub struct RssiWindow {
    clock: Arc<dyn Clock>,
    state: Mutex<WindowState>,
}

impl RssiWindow {
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(WindowState {
                window,
                samples: HashMap::new(),
            }),
        }
    }

    /// Window of [`DEFAULT_RSSI_WINDOW_MS`].
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::new(
            Duration::from_millis(u64::from(DEFAULT_RSSI_WINDOW_MS)),
            clock,
        )
    }

    pub fn window(&self) -> Duration {
        self.lock().window
    }

    /// Change the window length. Samples already held are re-judged
    /// against the new window on the next read.
    pub fn set_window(&self, window: Duration) {
        self.lock().window = window;
    }

    /// Record a reading for `key` and return the updated average.
    pub fn add(&self, key: &str, rssi: i16) -> f64 {
        let mut state = self.lock();
        let now = self.clock.now();
        let window = state.window;
        let entry = state.samples.entry(String::from(key)).or_default();
        entry.push_back(RssiSample {
            timestamp: now,
            rssi,
        });
        prune(entry, now, window);
        mean(entry)
    }

    /// Mean of the samples inside the window.
    ///
    /// Returns `0.0` when no samples survive. Callers cannot tell that apart
    /// from a genuine zero average; check [`RssiWindow::count`] if it matters.
    pub fn running_average(&self, key: &str) -> f64 {
        self.with_pruned(key, mean).unwrap_or(0.0)
    }

    /// Number of samples inside the window.
    pub fn count(&self, key: &str) -> usize {
        self.with_pruned(key, VecDeque::len).unwrap_or(0)
    }

    /// Prune every key, dropping keys left without samples.
    pub fn purge(&self) {
        let mut state = self.lock();
        let now = self.clock.now();
        let window = state.window;
        state.samples.retain(|_, entry| {
            prune(entry, now, window);
            !entry.is_empty()
        });
    }

    /// Number of keys currently holding samples.
    pub fn key_count(&self) -> usize {
        self.lock().samples.len()
    }

    fn with_pruned<T>(&self, key: &str, f: impl FnOnce(&VecDeque<RssiSample>) -> T) -> Option<T> {
        let mut state = self.lock();
        let now = self.clock.now();
        let window = state.window;
        let entry = state.samples.get_mut(key)?;
        prune(entry, now, window);
        if entry.is_empty() {
            state.samples.remove(key);
            return None;
        }
        Some(f(entry))
    }

    fn lock(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RssiWindow {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

fn prune(entry: &mut VecDeque<RssiSample>, now: Instant, window: Duration) {
    entry.retain(|s| now.saturating_duration_since(s.timestamp) <= window);
}

fn mean(entry: &VecDeque<RssiSample>) -> f64 {
    if entry.is_empty() {
        return 0.0;
    }
    let sum: f64 = entry.iter().map(|s| f64::from(s.rssi)).sum();
    sum / entry.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::thread;

    fn window() -> (Arc<ManualClock>, RssiWindow) {
        let clock = Arc::new(ManualClock::new());
        let window = RssiWindow::with_clock(clock.clone());
        (clock, window)
    }

    #[test]
    fn add_returns_running_average() {
        let (_clock, window) = window();
        assert_eq!(window.add("a", -60), -60.0);
        assert_eq!(window.add("a", -70), -65.0);
        assert_eq!(window.running_average("a"), -65.0);
        assert_eq!(window.count("a"), 2);
    }

    #[test]
    fn empty_window_averages_zero() {
        let (_clock, window) = window();
        assert_eq!(window.running_average("missing"), 0.0);
        assert_eq!(window.count("missing"), 0);
    }

    #[test]
    fn old_samples_are_excluded() {
        let (clock, window) = window();
        window.add("a", -90);
        clock.advance(Duration::from_secs(15));
        window.add("a", -50);
        assert_eq!(window.running_average("a"), -70.0);

        // First sample is now 21s old
        clock.advance(Duration::from_secs(6));
        assert_eq!(window.running_average("a"), -50.0);
        assert_eq!(window.count("a"), 1);
    }

    #[test]
    fn sample_exactly_at_window_edge_is_kept() {
        let (clock, window) = window();
        window.add("a", -40);
        clock.advance(Duration::from_secs(20));
        assert_eq!(window.count("a"), 1);
        clock.advance(Duration::from_millis(1));
        assert_eq!(window.count("a"), 0);
    }

    #[test]
    fn expired_key_is_dropped() {
        let (clock, window) = window();
        window.add("a", -40);
        clock.advance(Duration::from_secs(30));
        assert_eq!(window.running_average("a"), 0.0);
        assert_eq!(window.key_count(), 0);
    }

    #[test]
    fn keys_are_independent() {
        let (_clock, window) = window();
        window.add("a", -40);
        window.add("b", -80);
        assert_eq!(window.running_average("a"), -40.0);
        assert_eq!(window.running_average("b"), -80.0);
    }

    #[test]
    fn purge_removes_stale_keys() {
        let (clock, window) = window();
        window.add("old", -40);
        clock.advance(Duration::from_secs(25));
        window.add("new", -60);
        window.purge();
        assert_eq!(window.key_count(), 1);
        assert_eq!(window.count("new"), 1);
    }

    #[test]
    fn custom_window_length() {
        let clock = Arc::new(ManualClock::new());
        let window = RssiWindow::new(Duration::from_secs(1), clock.clone());
        window.add("a", -40);
        clock.advance(Duration::from_secs(2));
        assert_eq!(window.count("a"), 0);
        assert_eq!(window.window(), Duration::from_secs(1));
    }

    #[test]
    fn shrinking_window_drops_older_samples() {
        let (clock, window) = window();
        window.add("a", -80);
        clock.advance(Duration::from_secs(5));
        window.add("a", -40);
        window.set_window(Duration::from_secs(2));
        assert_eq!(window.running_average("a"), -40.0);
    }

    #[test]
    fn window_resized_from_another_thread() {
        let (clock, window) = window();
        let window = Arc::new(window);
        window.add("a", -80);
        clock.advance(Duration::from_secs(5));

        let remote = Arc::clone(&window);
        thread::spawn(move || remote.set_window(Duration::from_secs(1)))
            .join()
            .unwrap();

        assert_eq!(window.window(), Duration::from_secs(1));
        assert_eq!(window.add("a", -40), -40.0);
    }

    #[test]
    fn concurrent_adds_are_serialized() {
        let (_clock, window) = window();
        let window = Arc::new(window);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let window = Arc::clone(&window);
                thread::spawn(move || {
                    for _ in 0..100 {
                        window.add("shared", -40 - i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(window.count("shared"), 800);
        assert_eq!(window.running_average("shared"), -43.5);
    }
}
