//! Per-channel sample buffer with front eviction

use crate::protocol::TelemetryFrame;
use std::collections::VecDeque;

/// One plotted point: (timestamp in ms since epoch, value)
pub type Sample = (u64, f64);

/// Rolling per-channel sample store for one selected node
///
/// Samples arrive in transport order, so within a channel the timestamps
/// are non-decreasing and eviction only ever pops from the front. The
/// channel list grows to match the widest frame seen; it never shrinks.
#[derive(Debug)]
pub struct SampleBuffer {
    node_id: u32,
    channels: Vec<VecDeque<Sample>>,
}

impl SampleBuffer {
    /// Create an empty buffer accepting frames from `node_id`
    pub fn new(node_id: u32) -> Self {
        Self {
            node_id,
            channels: Vec::new(),
        }
    }

    /// Node whose frames this buffer accepts
    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    /// Number of channels seen so far
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples of channel `index`, oldest first
    pub fn channel(&self, index: usize) -> Option<&VecDeque<Sample>> {
        self.channels.get(index)
    }

    /// Iterate over all channels, oldest samples first
    pub fn channels(&self) -> impl Iterator<Item = &VecDeque<Sample>> {
        self.channels.iter()
    }

    /// Total number of stored samples across channels
    pub fn sample_count(&self) -> usize {
        self.channels.iter().map(|c| c.len()).sum()
    }

    /// Append one decoded frame, one sample per channel
    ///
    /// Frames from other nodes are discarded silently; the transport may be
    /// broadcast, so this is normal filtering, not an error. Returns whether
    /// the frame was consumed.
    pub fn ingest(&mut self, frame: &TelemetryFrame) -> bool {
        if frame.node_id != self.node_id {
            return false;
        }

        while self.channels.len() < frame.values.len() {
            self.channels.push(VecDeque::new());
        }

        for (i, &value) in frame.values.iter().enumerate() {
            self.channels[i].push_back((frame.timestamp_ms, value));
        }

        true
    }

    /// Drop all samples strictly older than `cutoff_ms`
    ///
    /// Runs before each ingest batch so the buffer stays bounded while the
    /// connection is open.
    pub fn evict_older_than(&mut self, cutoff_ms: u64) {
        for channel in &mut self.channels {
            while channel.front().is_some_and(|&(t, _)| t < cutoff_ms) {
                channel.pop_front();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(node_id: u32, timestamp_ms: u64, values: &[f64]) -> TelemetryFrame {
        TelemetryFrame {
            timestamp_ms,
            node_id,
            values: values.to_vec(),
        }
    }

    #[test]
    fn test_ingest_appends_per_channel() {
        let mut buf = SampleBuffer::new(1);

        assert!(buf.ingest(&frame(1, 100, &[1.0, 10.0])));
        assert!(buf.ingest(&frame(1, 200, &[2.0, 20.0])));

        assert_eq!(buf.channel_count(), 2);
        assert_eq!(
            buf.channel(0).unwrap().iter().copied().collect::<Vec<_>>(),
            vec![(100, 1.0), (200, 2.0)]
        );
        assert_eq!(
            buf.channel(1).unwrap().iter().copied().collect::<Vec<_>>(),
            vec![(100, 10.0), (200, 20.0)]
        );
    }

    #[test]
    fn test_other_node_filtered_out() {
        let mut buf = SampleBuffer::new(1);
        buf.ingest(&frame(1, 100, &[1.0]));

        assert!(!buf.ingest(&frame(2, 200, &[9.0, 9.0, 9.0])));

        // Channel layout and contents untouched by the foreign frame
        assert_eq!(buf.channel_count(), 1);
        assert_eq!(buf.sample_count(), 1);
        assert_eq!(buf.channel(0).unwrap().back(), Some(&(100, 1.0)));
    }

    #[test]
    fn test_channel_growth_to_widest_frame() {
        let mut buf = SampleBuffer::new(1);

        buf.ingest(&frame(1, 100, &[1.0]));
        buf.ingest(&frame(1, 200, &[2.0, 20.0, 200.0]));
        // Narrower frame later leaves the extra channels without new points
        buf.ingest(&frame(1, 300, &[3.0]));

        assert_eq!(buf.channel_count(), 3);
        assert_eq!(buf.channel(0).unwrap().len(), 3);
        assert_eq!(buf.channel(1).unwrap().len(), 1);
        assert_eq!(buf.channel(2).unwrap().len(), 1);
    }

    #[test]
    fn test_eviction_is_strict() {
        let mut buf = SampleBuffer::new(1);
        buf.ingest(&frame(1, 100, &[1.0]));
        buf.ingest(&frame(1, 150, &[1.5]));
        buf.ingest(&frame(1, 200, &[2.0]));

        buf.evict_older_than(150);

        // Strictly-older samples go; the boundary sample stays.
        assert_eq!(
            buf.channel(0).unwrap().iter().copied().collect::<Vec<_>>(),
            vec![(150, 1.5), (200, 2.0)]
        );
    }

    #[test]
    fn test_evict_then_ingest_scenario() {
        let mut buf = SampleBuffer::new(1);
        buf.ingest(&frame(1, 100, &[1.0, 10.0]));
        buf.ingest(&frame(1, 200, &[2.0, 20.0]));
        buf.ingest(&frame(1, 300, &[3.0, 30.0]));

        buf.evict_older_than(150);

        for i in 0..2 {
            let timestamps: Vec<u64> =
                buf.channel(i).unwrap().iter().map(|&(t, _)| t).collect();
            assert_eq!(timestamps, vec![200, 300]);
        }
    }

    #[test]
    fn test_evict_empty_buffer_is_noop() {
        let mut buf = SampleBuffer::new(1);
        buf.evict_older_than(1_000);
        assert_eq!(buf.channel_count(), 0);
    }
}
