//! Rolling presence history for the plain and compressed variants.
//!
//! Each lookup shifts one bit per variant into an 8-bit history: `1` if the
//! variant was seen, `0` otherwise. A variant not probed on that lookup is
//! recorded as absent. The histories only decide which variant is stat'ed
//! first; they never change which variant is served.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// The two variants a static resource can exist in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Variant {
    Plain,
    Compressed,
}

impl Variant {
    pub fn other(self) -> Self {
        match self {
            Self::Plain => Self::Compressed,
            Self::Compressed => Self::Plain,
        }
    }
}

/// Number of bits set in an 8-bit history.
///
/// ```rust
/// use kestrel::count_set_bits;
/// assert_eq!(count_set_bits(0b1011_0001), 4);
/// assert_eq!(count_set_bits(0), 0);
/// ```
pub fn count_set_bits(value: u8) -> u8 {
    let mut w = value;
    let mut n = 0;
    while w != 0 {
        w &= w - 1;
        n += 1;
    }
    n
}

/// Lock-free probe-order statistics shared by every request on a handler.
///
/// Updates are relaxed and racy by intent: two concurrent lookups may lose a
/// bit, which only perturbs a hint.
#[derive(Debug)]
pub struct VariantStats {
    compressed: AtomicU8,
    plain: AtomicU8,
    recorded: AtomicU8,
    enabled: AtomicBool,
}

impl VariantStats {
    pub fn new() -> Self {
        Self {
            compressed: AtomicU8::new(0),
            plain: AtomicU8::new(0),
            recorded: AtomicU8::new(0),
            enabled: AtomicBool::new(true),
        }
    }

    /// Records the outcome of one lookup.
    pub fn record(&self, compressed_found: bool, plain_found: bool) {
        if !self.is_enabled() {
            return;
        }
        shift_in(&self.compressed, compressed_found);
        shift_in(&self.plain, plain_found);
        let n = self.recorded.load(Ordering::Relaxed);
        if n < 8 {
            self.recorded.store(n + 1, Ordering::Relaxed);
        }
    }

    pub fn compressed_history(&self) -> u8 { self.compressed.load(Ordering::Relaxed) }
    pub fn plain_history(&self) -> u8 { self.plain.load(Ordering::Relaxed) }

    /// Lookups currently held in the history, at most 8.
    pub fn recorded(&self) -> u8 { self.recorded.load(Ordering::Relaxed) }

    /// The variant to probe first, or `None` when the history gives no
    /// majority and the caller should fall back to its own preference.
    ///
    /// A variant leads when more than half of the recorded lookups saw it and
    /// it was seen more often than the other variant.
    pub fn likely_present(&self) -> Option<Variant> {
        if !self.is_enabled() {
            return None;
        }
        let recorded = self.recorded();
        let gz = count_set_bits(self.compressed_history());
        let plain = count_set_bits(self.plain_history());
        let majority = |n: u8| 2 * n > recorded;

        if gz > plain && majority(gz) {
            Some(Variant::Compressed)
        } else if plain > gz && majority(plain) {
            Some(Variant::Plain)
        } else {
            None
        }
    }

    pub fn is_enabled(&self) -> bool { self.enabled.load(Ordering::Relaxed) }

    /// Turning the statistics off also clears them.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        if !enabled {
            self.reset();
        }
    }

    pub fn reset(&self) {
        self.compressed.store(0, Ordering::Relaxed);
        self.plain.store(0, Ordering::Relaxed);
        self.recorded.store(0, Ordering::Relaxed);
    }
}

impl Default for VariantStats {
    fn default() -> Self { Self::new() }
}

fn shift_in(history: &AtomicU8, bit: bool) {
    let old = history.load(Ordering::Relaxed);
    history.store((old << 1) | u8::from(bit), Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_bits() {
        for v in 0..=u8::MAX {
            assert_eq!(count_set_bits(v), v.count_ones() as u8);
        }
    }

    #[test]
    fn empty_history_has_no_opinion() {
        assert_eq!(VariantStats::new().likely_present(), None);
    }

    #[test]
    fn history_is_eight_lookups_wide() {
        let stats = VariantStats::new();
        for _ in 0..10 {
            stats.record(true, false);
        }
        assert_eq!(stats.compressed_history(), 0xff);
        assert_eq!(stats.plain_history(), 0);
        assert_eq!(stats.recorded(), 8);
        assert_eq!(stats.likely_present(), Some(Variant::Compressed));
    }

    #[test]
    fn majority_flips_after_recent_misses() {
        let stats = VariantStats::new();
        for _ in 0..8 {
            stats.record(true, false);
        }
        for _ in 0..5 {
            stats.record(false, true);
        }
        assert_eq!(count_set_bits(stats.plain_history()), 5);
        assert_eq!(stats.likely_present(), Some(Variant::Plain));
    }

    #[test]
    fn even_split_has_no_majority() {
        let stats = VariantStats::new();
        stats.record(true, false);
        stats.record(false, true);
        assert_eq!(stats.likely_present(), None);
    }

    #[test]
    fn disabled_stats_ignore_records() {
        let stats = VariantStats::new();
        stats.record(true, false);
        stats.set_enabled(false);
        stats.record(true, false);
        assert_eq!(stats.recorded(), 0);
        assert_eq!(stats.likely_present(), None);
    }
}
