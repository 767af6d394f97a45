//! Render sink seam
//!
//! The session hands each redraw tick to a [`RenderSink`]; the sink owns
//! all visual presentation. The built-in [`LogSink`] just summarizes what a
//! charting frontend would draw.

use crate::discovery::SeriesStyle;
use crate::scope::SampleBuffer;
use log::{debug, info};

/// Everything a frontend needs for one redraw
pub struct RenderFrame<'a> {
    /// Per-channel sample sequences, oldest first
    pub buffer: &'a SampleBuffer,
    /// Visible x-axis range `(min_ms, max_ms)`; "now" sits at 90%
    pub bounds: (u64, u64),
    /// Per-channel display overrides from the node, may be shorter than
    /// the channel list
    pub styles: &'a [SeriesStyle],
}

/// Consumer of redraw ticks
pub trait RenderSink: Send {
    fn render(&mut self, frame: &RenderFrame<'_>);
}

/// Sink that logs a one-line summary per redraw
pub struct LogSink {
    renders: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self { renders: 0 }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSink for LogSink {
    fn render(&mut self, frame: &RenderFrame<'_>) {
        self.renders += 1;

        let latest: Vec<String> = frame
            .buffer
            .channels()
            .enumerate()
            .map(|(i, channel)| {
                let label = frame
                    .styles
                    .get(i)
                    .and_then(|s| s.label.as_deref())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("ch{}", i));
                match channel.back() {
                    Some(&(_, v)) => format!("{}={:.3}", label, v),
                    None => format!("{}=-", label),
                }
            })
            .collect();

        debug!(
            "Redraw #{}: window [{}..{}], {} samples, {}",
            self.renders,
            frame.bounds.0,
            frame.bounds.1,
            frame.buffer.sample_count(),
            latest.join(" ")
        );

        if self.renders % 100 == 0 {
            info!(
                "Plotted {} redraws, currently {} channels / {} samples in window",
                self.renders,
                frame.buffer.channel_count(),
                frame.buffer.sample_count()
            );
        }
    }
}
