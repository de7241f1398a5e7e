//! Cursor bookkeeping for the record and play sides of the ring buffer.

/// Forward distance from `last` to `current` on a circular buffer of `length` frames.
///
/// Both positions must be in `0..length`.
pub fn wrap_delta(current: usize, last: usize, length: usize) -> usize {
    if current >= last { current - last } else { current + length - last }
}

/// Turns successive cursor snapshots into a monotonic frame count.
#[derive(Debug, Clone, Default)]
pub struct CursorCounter {
    last_pos: usize, // Last observed cursor, mod buffer length
    total: u64,      // Frames moved since the counter started
}

impl CursorCounter {
    /// Record a new cursor position and return how far it moved.
    pub fn advance(&mut self, position: usize, length: usize) -> usize {
        let delta = wrap_delta(position, self.last_pos, length);
        self.last_pos = position;
        self.total += delta as u64;
        delta
    }

    pub fn last_pos(&self) -> usize {
        self.last_pos
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Counts recorded frames and learns the recording driver's delivery granularity.
///
/// Some drivers hand over data in large chunks. When one chunk is bigger than
/// the desired latency, playback has to wait for at least a whole chunk or it
/// underruns immediately, so the adjusted latency is raised to match.
#[derive(Debug, Clone)]
pub struct RecordTracker {
    cursor: CursorCounter,
    min_record_delta: Option<usize>, // Smallest nonzero delta seen so far
    desired_latency: u32,
    adjusted_latency: u32,
}

impl RecordTracker {
    pub fn new(desired_latency: u32) -> Self {
        Self { cursor: CursorCounter::default(), min_record_delta: None, desired_latency, adjusted_latency: desired_latency }
    }

    /// Account for a new write-cursor snapshot.
    ///
    /// # Arguments
    /// * `position` - Current write cursor, `0..length`
    /// * `length` - Ring buffer length in frames
    ///
    /// # Returns
    /// Frames recorded since the previous poll.
    pub fn poll(&mut self, position: usize, length: usize) -> usize {
        let delta = self.cursor.advance(position, length);

        if delta != 0 && self.min_record_delta.is_none_or(|min| delta < min) {
            self.min_record_delta = Some(delta);
            self.adjusted_latency = self.desired_latency.max(u32::try_from(delta).unwrap_or(u32::MAX));
        }
        delta
    }

    pub fn samples_recorded(&self) -> u64 {
        self.cursor.total()
    }

    pub fn last_pos(&self) -> usize {
        self.cursor.last_pos()
    }

    pub fn min_record_delta(&self) -> Option<usize> {
        self.min_record_delta
    }

    pub fn desired_latency(&self) -> u32 {
        self.desired_latency
    }

    pub fn adjusted_latency(&self) -> u32 {
        self.adjusted_latency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_delta_matches_forward_distance() {
        let length = 17;
        for last in 0..length {
            for current in 0..length {
                let expected = (current + length - last) % length;
                assert_eq!(wrap_delta(current, last, length), expected, "last={} current={}", last, current);
            }
        }
    }

    #[test]
    fn test_wrap_delta_boundaries() {
        assert_eq!(wrap_delta(5, 5, 48000), 0);
        assert_eq!(wrap_delta(0, 47999, 48000), 1);
        assert_eq!(wrap_delta(47999, 0, 48000), 47999);
    }

    #[test]
    fn test_counter_is_monotonic_across_wraparound() {
        let mut counter = CursorCounter::default();
        let mut previous = 0;
        for position in [30, 90, 10, 10, 70, 5, 99, 0] {
            counter.advance(position, 100);
            assert!(counter.total() >= previous);
            previous = counter.total();
        }
        // 30 + 60 + 20 + 0 + 60 + 35 + 94 + 1
        assert_eq!(counter.total(), 300);
        assert_eq!(counter.last_pos(), 0);
    }

    #[test]
    fn test_granularity_tracks_minimum_delta() {
        let mut tracker = RecordTracker::new(220);
        let mut position = 0;
        let mut adjusted = Vec::new();
        for delta in [0, 400, 0, 0, 600] {
            position = (position + delta) % 48000;
            assert_eq!(tracker.poll(position, 48000), delta);
            adjusted.push(tracker.adjusted_latency());
        }
        assert_eq!(adjusted, vec![220, 400, 400, 400, 400]);
        assert_eq!(tracker.min_record_delta(), Some(400));
        assert_eq!(tracker.samples_recorded(), 1000);
    }

    #[test]
    fn test_smaller_delta_lowers_adjusted_latency_but_not_below_desired() {
        let mut tracker = RecordTracker::new(220);
        tracker.poll(400, 48000);
        assert_eq!(tracker.adjusted_latency(), 400);
        tracker.poll(700, 48000);
        assert_eq!(tracker.adjusted_latency(), 300);
        tracker.poll(800, 48000);
        assert_eq!(tracker.adjusted_latency(), 220);
        assert_eq!(tracker.min_record_delta(), Some(100));
    }

    #[test]
    fn test_desired_latency_kept_for_fine_granularity() {
        let mut tracker = RecordTracker::new(2400);
        tracker.poll(480, 48000);
        assert_eq!(tracker.adjusted_latency(), 2400);
        assert_eq!(tracker.desired_latency(), 2400);
    }
}
