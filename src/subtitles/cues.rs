//! Subtitle cue index
//!
//! Answers "which line is on screen at time t" on every player tick. Cues are
//! sorted by start; a running maximum of end times lets overlapping cues be
//! found with two binary searches, so lookups stay O(log n).

use parking_lot::RwLock;
use std::sync::Arc;

use crate::models::SubtitleCue;

/// Immutable, lookup-ready cue list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CueIndex {
    cues: Vec<SubtitleCue>,
    /// `max_end[i]` = greatest end time among `cues[..=i]`
    max_end: Vec<f64>,
}

impl CueIndex {
    /// Drop cues with `start > end` (or non-finite times) and sort by start
    pub fn new(mut cues: Vec<SubtitleCue>) -> Self {
        cues.retain(|c| c.start.is_finite() && c.end.is_finite() && c.start <= c.end);
        cues.sort_by(|a, b| a.start.total_cmp(&b.start));

        let max_end = cues
            .iter()
            .scan(f64::NEG_INFINITY, |acc, cue| {
                *acc = acc.max(cue.end);
                Some(*acc)
            })
            .collect();

        Self { cues, max_end }
    }

    pub fn cues(&self) -> &[SubtitleCue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Cue shown at playback time `t`
    pub fn lookup(&self, t: f64) -> Option<&SubtitleCue> {
        self.lookup_counted(t).0
    }

    /// Cue shown at `playback_time` with a user offset (positive delays text)
    pub fn lookup_at(&self, playback_time: f64, offset: f64) -> Option<&SubtitleCue> {
        self.lookup(playback_time - offset)
    }

    /// `lookup` plus the number of cue comparisons it took
    pub fn lookup_counted(&self, t: f64) -> (Option<&SubtitleCue>, usize) {
        let mut steps = 0;
        if t.is_nan() {
            return (None, steps);
        }

        // Cues [0, started) have start <= t
        let started = partition(self.cues.len(), &mut steps, |i| self.cues[i].start <= t);
        // First cue whose running max end reaches t must itself end at or after t
        let reaching = partition(started, &mut steps, |i| self.max_end[i] < t);

        (self.cues.get(reaching).filter(|_| reaching < started), steps)
    }
}

/// Binary search for the first index in `0..len` where `pred` turns false
fn partition(len: usize, steps: &mut usize, pred: impl Fn(usize) -> bool) -> usize {
    let (mut lo, mut hi) = (0, len);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        *steps += 1;
        if pred(mid) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Currently loaded cues plus the user's sync offset
///
/// Reloading swaps the whole index, so a lookup running on a snapshot is
/// never affected by a concurrent reload.
#[derive(Debug, Default)]
pub struct SubtitleTrack {
    index: RwLock<Arc<CueIndex>>,
    offset: RwLock<f64>,
}

impl SubtitleTrack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, cues: Vec<SubtitleCue>) {
        let index = Arc::new(CueIndex::new(cues));
        *self.index.write() = index;
    }

    pub fn clear(&self) {
        *self.index.write() = Arc::new(CueIndex::default());
    }

    pub fn snapshot(&self) -> Arc<CueIndex> {
        self.index.read().clone()
    }

    pub fn set_offset(&self, seconds: f64) {
        *self.offset.write() = seconds;
    }

    pub fn offset(&self) -> f64 {
        *self.offset.read()
    }

    /// Text on screen at `playback_time`
    pub fn text_at(&self, playback_time: f64) -> Option<String> {
        let offset = self.offset();
        self.snapshot()
            .lookup_at(playback_time, offset)
            .map(|cue| cue.text.clone())
    }
}
